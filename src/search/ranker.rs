use crate::config::PaginationConfig;
use crate::db::models::{Recipe, RecipeFilter};
use crate::db::{recipes, DbPool};
use crate::error::{Error, Result};
use crate::search::SearchIndex;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Ids per `IN (...)` lookup, well below SQLite's variable limit
const ID_CHUNK_SIZE: usize = 500;

/// A validated-on-use search request
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub term: Option<String>,
    pub tags: Vec<String>,
    pub limit: i64,
    pub page: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedRecipe {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub similarity_score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub results: Vec<RankedRecipe>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// Ranks public recipes by text relevance, rating and recency
#[derive(Clone)]
pub struct SearchRanker {
    pool: DbPool,
    index: Arc<SearchIndex>,
    pagination: PaginationConfig,
    max_search_results: usize,
}

impl SearchRanker {
    pub fn new(
        pool: DbPool,
        index: Arc<SearchIndex>,
        pagination: PaginationConfig,
        max_search_results: usize,
    ) -> Self {
        Self {
            pool,
            index,
            pagination,
            max_search_results,
        }
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResults> {
        if query.limit < 1 {
            return Err(Error::QueryValidation(
                "limit must be at least 1".to_string(),
            ));
        }
        let limit = query.limit.min(self.pagination.api_max_limit as i64);

        if query.page < 1 || query.page > self.pagination.max_pages as i64 {
            return Err(Error::QueryValidation(format!(
                "page must be between 1 and {}",
                self.pagination.max_pages
            )));
        }
        let offset = (query.page - 1) * limit;

        let filter = RecipeFilter {
            any_tags: query
                .tags
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        };

        let term = query
            .term
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        let (results, total) = match term {
            Some(term) => self.search_term(term, &filter, limit, offset).await?,
            None => {
                let total = recipes::count_visible_recipes(&self.pool, &filter).await?;
                let rows = recipes::list_visible_recipes(&self.pool, &filter, limit, offset).await?;
                let results = rows
                    .into_iter()
                    .map(|recipe| RankedRecipe {
                        recipe,
                        similarity_score: 0.0,
                    })
                    .collect();
                (results, total)
            }
        };

        debug!(
            "Search term={:?} tags={:?} matched {} recipes",
            term, filter.any_tags, total
        );

        Ok(SearchResults {
            results,
            page: query.page,
            limit,
            total,
            total_pages: (total + limit - 1) / limit,
        })
    }

    /// Collect filtered term matches in score order, up to
    /// `max_search_results` of them, then page through the ranked set
    async fn search_term(
        &self,
        term: &str,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<RankedRecipe>, i64)> {
        let window = self.max_search_results.max(1);
        let mut ranked = Vec::new();
        let mut scanned = 0;

        loop {
            let hits = self.index.score_page(term, window, scanned)?;
            let exhausted = hits.len() < window;
            scanned += hits.len();

            let scores: HashMap<Uuid, f32> = hits.into_iter().collect();
            let ids: Vec<_> = scores.keys().copied().collect();
            for chunk in ids.chunks(ID_CHUNK_SIZE) {
                let rows = recipes::get_visible_recipes_by_ids(&self.pool, chunk, filter).await?;
                ranked.extend(rows.into_iter().map(|recipe| RankedRecipe {
                    similarity_score: scores.get(&recipe.id).copied().unwrap_or_default(),
                    recipe,
                }));
            }

            if exhausted || ranked.len() >= window {
                break;
            }
        }

        ranked.sort_by(compare_ranked);
        ranked.truncate(window);
        let total = ranked.len() as i64;

        let page = ranked
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }
}

/// Score desc, rating desc (unrated last), newest first, then id
fn compare_ranked(a: &RankedRecipe, b: &RankedRecipe) -> Ordering {
    b.similarity_score
        .total_cmp(&a.similarity_score)
        .then_with(|| match (a.recipe.rating, b.recipe.rating) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| b.recipe.created_at.cmp(&a.recipe.created_at))
        .then_with(|| a.recipe.id.cmp(&b.recipe.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::NewRecipe;
    use crate::db::{init_pool, run_migrations};

    async fn setup() -> (DbPool, Arc<SearchIndex>, SearchRanker) {
        setup_with_cap(1000).await
    }

    async fn setup_with_cap(max_search_results: usize) -> (DbPool, Arc<SearchIndex>, SearchRanker) {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let index = Arc::new(SearchIndex::in_memory().unwrap());
        let pagination = PaginationConfig {
            api_max_limit: 50,
            api_default_limit: 20,
            max_request_body_size: 1024,
            max_pages: 100,
        };
        let ranker = SearchRanker::new(pool.clone(), index.clone(), pagination, max_search_results);
        (pool, index, ranker)
    }

    async fn add(
        pool: &DbPool,
        index: &SearchIndex,
        name: &str,
        tags: &[&str],
        rating: Option<f64>,
    ) -> Recipe {
        let recipe = recipes::create_recipe(
            pool,
            &NewRecipe {
                name: name.to_string(),
                description: None,
                prep_time_minutes: None,
                cook_time_minutes: None,
                total_time_minutes: None,
                servings: None,
                ingredients: vec!["salt".to_string()],
                directions: vec!["Cook.".to_string()],
                tags: tags.iter().map(|t| t.to_string()).collect(),
                source_repository: None,
                original_filename: None,
                import_batch_id: None,
                rating,
            },
        )
        .await
        .unwrap();
        index.add_recipe(&recipe).unwrap();
        recipe
    }

    fn query(term: Option<&str>, tags: &[&str]) -> SearchQuery {
        SearchQuery {
            term: term.map(str::to_string),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            limit: 20,
            page: 1,
        }
    }

    #[tokio::test]
    async fn test_term_and_tags_compose() {
        let (pool, index, ranker) = setup().await;
        for i in 0..3 {
            add(&pool, &index, &format!("Quick Chicken {i}"), &["Quick"], None).await;
        }
        add(&pool, &index, "Slow Chicken", &["Slow"], None).await;
        add(&pool, &index, "Quick Salad", &["Quick"], None).await;
        index.commit().unwrap();

        let results = ranker.search(&query(Some("chicken"), &["Quick"])).await.unwrap();
        assert_eq!(results.total, 3);
        assert!(results
            .results
            .iter()
            .all(|r| r.recipe.name.starts_with("Quick Chicken") && r.similarity_score > 0.0));
    }

    #[tokio::test]
    async fn test_tag_match_below_result_cap_is_found() {
        let (pool, index, ranker) = setup_with_cap(5).await;
        for i in 0..5 {
            add(&pool, &index, &format!("Chicken Chicken {i}"), &["Slow"], None).await;
        }
        let quick = add(&pool, &index, "Roast Chicken With Lemon And Thyme", &["Quick"], None).await;
        index.commit().unwrap();

        let results = ranker.search(&query(Some("chicken"), &["Quick"])).await.unwrap();
        assert_eq!(results.total, 1);
        assert_eq!(results.results[0].recipe.id, quick.id);
    }

    #[tokio::test]
    async fn test_hidden_matches_do_not_use_up_result_cap() {
        let (pool, index, ranker) = setup_with_cap(3).await;
        for i in 0..4 {
            let hidden = add(&pool, &index, &format!("Stew Stew {i}"), &[], None).await;
            recipes::set_recipe_visibility(&pool, hidden.id, false)
                .await
                .unwrap();
        }
        for i in 0..5 {
            add(&pool, &index, &format!("Beef Stew With Carrots {i}"), &[], None).await;
        }
        index.commit().unwrap();

        let results = ranker.search(&query(Some("stew"), &[])).await.unwrap();
        assert_eq!(results.total, 3);
        assert!(results.results.iter().all(|r| r.recipe.is_public));
    }

    #[tokio::test]
    async fn test_empty_query_orders_by_rating() {
        let (pool, index, ranker) = setup().await;
        let unrated = add(&pool, &index, "Unrated", &[], None).await;
        let good = add(&pool, &index, "Good", &[], Some(4.0)).await;
        let best = add(&pool, &index, "Best", &[], Some(5.0)).await;
        index.commit().unwrap();

        let results = ranker.search(&query(None, &[])).await.unwrap();
        let ids: Vec<_> = results.results.iter().map(|r| r.recipe.id).collect();
        assert_eq!(ids, vec![best.id, good.id, unrated.id]);
        assert!(results.results.iter().all(|r| r.similarity_score == 0.0));
        assert_eq!(results.total_pages, 1);
    }

    #[tokio::test]
    async fn test_hidden_recipes_are_excluded() {
        let (pool, index, ranker) = setup().await;
        let hidden = add(&pool, &index, "Secret Stew", &[], None).await;
        add(&pool, &index, "Public Stew", &[], None).await;
        index.commit().unwrap();
        recipes::set_recipe_visibility(&pool, hidden.id, false)
            .await
            .unwrap();

        let results = ranker.search(&query(Some("stew"), &[])).await.unwrap();
        assert_eq!(results.total, 1);
        assert_eq!(results.results[0].recipe.name, "Public Stew");

        let results = ranker.search(&query(None, &[])).await.unwrap();
        assert_eq!(results.total, 1);
    }

    #[tokio::test]
    async fn test_pagination_bounds() {
        let (pool, index, ranker) = setup().await;
        for i in 0..5 {
            add(&pool, &index, &format!("Bread {i}"), &[], None).await;
        }
        index.commit().unwrap();

        let mut q = query(Some("bread"), &[]);
        q.limit = 2;
        q.page = 3;
        let results = ranker.search(&q).await.unwrap();
        assert_eq!(results.results.len(), 1);
        assert_eq!(results.total, 5);
        assert_eq!(results.total_pages, 3);

        q.limit = 500;
        q.page = 1;
        assert_eq!(ranker.search(&q).await.unwrap().limit, 50);

        q.limit = 0;
        assert!(matches!(ranker.search(&q).await, Err(Error::QueryValidation(_))));

        q.limit = 10;
        q.page = 0;
        assert!(matches!(ranker.search(&q).await, Err(Error::QueryValidation(_))));

        q.page = 101;
        assert!(matches!(ranker.search(&q).await, Err(Error::QueryValidation(_))));
    }

    #[tokio::test]
    async fn test_no_match_is_empty() {
        let (pool, index, ranker) = setup().await;
        add(&pool, &index, "Risotto", &[], None).await;
        index.commit().unwrap();

        let results = ranker.search(&query(Some("sushi"), &[])).await.unwrap();
        assert_eq!(results.total, 0);
        assert_eq!(results.total_pages, 0);
        assert!(results.results.is_empty());
    }
}

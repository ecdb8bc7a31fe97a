use crate::db::models::Recipe;
use crate::error::{Error, Result};
use crate::search::schema::RecipeSchema;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::OwnedValue;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info, warn};
use uuid::Uuid;

const WRITER_MEMORY_BYTES: usize = 50_000_000;
const NAME_BOOST: f32 = 2.0;

/// Full-text index over recipe names and descriptions.
///
/// Added documents become searchable only after [`SearchIndex::commit`].
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    schema: RecipeSchema,
}

impl SearchIndex {
    /// Open the index at `index_path`, creating it when absent
    pub fn new<P: AsRef<Path>>(index_path: P) -> Result<Self> {
        let schema = RecipeSchema::new();
        let index_path = index_path.as_ref();

        std::fs::create_dir_all(index_path)?;

        let index = if index_path.join("meta.json").exists() {
            Index::open_in_dir(index_path)?
        } else {
            Index::create_in_dir(index_path, schema.schema.clone())?
        };

        Self::from_index(index, schema)
    }

    /// Index held entirely in memory
    pub fn in_memory() -> Result<Self> {
        let schema = RecipeSchema::new();
        let index = Index::create_in_ram(schema.schema.clone());
        Self::from_index(index, schema)
    }

    fn from_index(index: Index, schema: RecipeSchema) -> Result<Self> {
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        let writer = index.writer_with_num_threads(1, WRITER_MEMORY_BYTES)?;

        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            schema,
        })
    }

    fn lock_writer(&self) -> Result<std::sync::MutexGuard<'_, IndexWriter>> {
        self.writer
            .lock()
            .map_err(|_| Error::Search("Index writer lock poisoned".to_string()))
    }

    /// Stage a recipe, replacing any earlier document with the same id
    pub fn add_recipe(&self, recipe: &Recipe) -> Result<()> {
        let writer = self.lock_writer()?;
        let id = recipe.id.to_string();

        writer.delete_term(Term::from_field_text(self.schema.id, &id));
        writer.add_document(doc!(
            self.schema.id => id,
            self.schema.name => recipe.name.clone(),
            self.schema.description => recipe.description.clone().unwrap_or_default(),
        ))?;

        debug!("Staged recipe {} for indexing", recipe.id);
        Ok(())
    }

    pub fn delete_recipe(&self, recipe_id: Uuid) -> Result<()> {
        let writer = self.lock_writer()?;
        writer.delete_term(Term::from_field_text(
            self.schema.id,
            &recipe_id.to_string(),
        ));
        Ok(())
    }

    /// Commit staged changes and make them visible to searches
    pub fn commit(&self) -> Result<()> {
        let mut writer = self.lock_writer()?;
        writer.commit()?;
        drop(writer);

        self.reader.reload()?;
        Ok(())
    }

    /// Replace the whole index content with `recipes`
    pub fn rebuild(&self, recipes: &[Recipe]) -> Result<()> {
        {
            let writer = self.lock_writer()?;
            writer.delete_all_documents()?;
        }

        for recipe in recipes {
            self.add_recipe(recipe)?;
        }

        self.commit()?;
        info!("Rebuilt search index with {} recipes", recipes.len());
        Ok(())
    }

    /// Number of committed documents
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Relevance score of every recipe matching `term`, best `limit` only
    pub fn score_term(&self, term: &str, limit: usize) -> Result<HashMap<Uuid, f32>> {
        Ok(self.score_page(term, limit, 0)?.into_iter().collect())
    }

    /// Hits for `term` in descending score order, skipping the first `offset`
    pub fn score_page(&self, term: &str, limit: usize, offset: usize) -> Result<Vec<(Uuid, f32)>> {
        let searcher = self.reader.searcher();

        let mut query_parser =
            QueryParser::for_index(&self.index, vec![self.schema.name, self.schema.description]);
        query_parser.set_field_boost(self.schema.name, NAME_BOOST);

        let (query, errors) = query_parser.parse_query_lenient(term);
        if !errors.is_empty() {
            debug!("Ignored {} malformed parts of query {:?}", errors.len(), term);
        }

        let collector = TopDocs::with_limit(limit.max(1)).and_offset(offset);
        let top_docs = searcher.search(&query, &collector)?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let document: TantivyDocument = searcher.doc(doc_address)?;
            let Some(OwnedValue::Str(id)) = document.get_first(self.schema.id) else {
                continue;
            };
            match Uuid::parse_str(id) {
                Ok(id) => hits.push((id, score)),
                Err(_) => warn!("Search index holds a malformed recipe id: {}", id),
            }
        }

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use sqlx::types::Json;

    fn recipe(name: &str, description: Option<&str>) -> Recipe {
        let now = Utc::now();
        Recipe {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.map(str::to_string),
            prep_time_minutes: None,
            cook_time_minutes: None,
            total_time_minutes: None,
            servings: None,
            ingredients: Json(Vec::new()),
            directions: Json(Vec::new()),
            tags: Json(Vec::new()),
            source_repository: None,
            original_filename: None,
            import_batch_id: None,
            rating: None,
            is_public: true,
            created_at: now - Duration::seconds(1),
            updated_at: now,
        }
    }

    #[test]
    fn test_search_index_creation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let index = SearchIndex::new(temp_dir.path());
        assert!(index.is_ok());
    }

    #[test]
    fn test_reopen_existing_index() {
        let temp_dir = tempfile::tempdir().unwrap();
        let soup = recipe("Tomato Soup", None);
        {
            let index = SearchIndex::new(temp_dir.path()).unwrap();
            index.add_recipe(&soup).unwrap();
            index.commit().unwrap();
        }

        let index = SearchIndex::new(temp_dir.path()).unwrap();
        assert_eq!(index.num_docs(), 1);
        assert!(index.score_term("tomato", 10).unwrap().contains_key(&soup.id));
    }

    #[test]
    fn test_uncommitted_documents_are_invisible() {
        let index = SearchIndex::in_memory().unwrap();
        let soup = recipe("Chicken Soup", None);

        index.add_recipe(&soup).unwrap();
        assert!(index.score_term("chicken", 10).unwrap().is_empty());

        index.commit().unwrap();
        assert_eq!(index.score_term("chicken", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_name_matches_outrank_description_matches() {
        let index = SearchIndex::in_memory().unwrap();
        let in_name = recipe("Chicken Curry", Some("A spicy dinner"));
        let in_description = recipe("Weeknight Curry", Some("Made with chicken thighs"));

        index.add_recipe(&in_name).unwrap();
        index.add_recipe(&in_description).unwrap();
        index.commit().unwrap();

        let scores = index.score_term("chicken", 10).unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores[&in_name.id] > scores[&in_description.id]);
    }

    #[test]
    fn test_add_replaces_existing_document() {
        let index = SearchIndex::in_memory().unwrap();
        let mut dish = recipe("Pancakes", None);

        index.add_recipe(&dish).unwrap();
        index.commit().unwrap();

        dish.name = "Waffles".to_string();
        index.add_recipe(&dish).unwrap();
        index.commit().unwrap();

        assert_eq!(index.num_docs(), 1);
        assert!(index.score_term("pancakes", 10).unwrap().is_empty());
        assert!(index.score_term("waffles", 10).unwrap().contains_key(&dish.id));
    }

    #[test]
    fn test_delete_and_rebuild() {
        let index = SearchIndex::in_memory().unwrap();
        let a = recipe("Lemon Tart", None);
        let b = recipe("Lemon Cake", None);

        index.add_recipe(&a).unwrap();
        index.add_recipe(&b).unwrap();
        index.commit().unwrap();

        index.delete_recipe(a.id).unwrap();
        index.commit().unwrap();
        assert_eq!(index.score_term("lemon", 10).unwrap().len(), 1);

        index.rebuild(&[a.clone()]).unwrap();
        let scores = index.score_term("lemon", 10).unwrap();
        assert_eq!(scores.len(), 1);
        assert!(scores.contains_key(&a.id));
    }

    #[test]
    fn test_score_pages_are_disjoint_and_ordered() {
        let index = SearchIndex::in_memory().unwrap();
        for i in 0..5 {
            index.add_recipe(&recipe(&format!("Bean Dish {i}"), None)).unwrap();
        }
        index.add_recipe(&recipe("Bean Bean Bean", None)).unwrap();
        index.commit().unwrap();

        let first = index.score_page("bean", 2, 0).unwrap();
        let rest = index.score_page("bean", 10, 2).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(rest.len(), 4);
        assert!(first.iter().all(|(id, _)| rest.iter().all(|(other, _)| other != id)));
        assert!(first[0].1 >= first[1].1);
        assert!(first[1].1 >= rest[0].1);
    }

    #[test]
    fn test_lenient_query_syntax() {
        let index = SearchIndex::in_memory().unwrap();
        index.add_recipe(&recipe("Fish (Baked)", None)).unwrap();
        index.commit().unwrap();

        assert!(index.score_term("fish (", 10).is_ok());
    }
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    api::models::*,
    config::Settings,
    db::{self, models::BatchStatus, models::ImportBatch},
    import::Importer,
    search::{SearchIndex, SearchQuery, SearchRanker},
    Error, Result,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: db::DbPool,
    pub importer: Importer,
    pub ranker: SearchRanker,
    pub search_index: Arc<SearchIndex>,
    pub settings: Settings,
}

impl AppState {
    pub fn new(pool: db::DbPool, search_index: Arc<SearchIndex>, settings: Settings) -> Self {
        let importer = Importer::new(
            pool.clone(),
            search_index.clone(),
            settings.importer.clone(),
            settings.github.clone(),
        );
        let ranker = SearchRanker::new(
            pool.clone(),
            search_index.clone(),
            settings.pagination.clone(),
            settings.search.max_search_results,
        );

        Self {
            pool,
            importer,
            ranker,
            search_index,
            settings,
        }
    }
}

/// POST /api/imports - Start importing a repository
pub async fn create_import(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> Result<(StatusCode, Json<ImportAccepted>)> {
    let batch_id = state
        .importer
        .start_import(&request.repository_url, request.created_by)
        .await?;
    info!("Accepted import {} for {}", batch_id, request.repository_url.trim());

    Ok((
        StatusCode::ACCEPTED,
        Json(ImportAccepted {
            batch_id,
            status: BatchStatus::Pending,
        }),
    ))
}

/// GET /api/imports/:id - Batch status
pub async fn get_import(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ImportBatch>> {
    debug!("Get import request: {}", id);

    let batch = state.importer.get_status(id).await?;
    Ok(Json(batch))
}

/// GET /api/imports - Most recent batches first
pub async fn list_imports(
    State(state): State<AppState>,
    Query(params): Query<BatchListParams>,
) -> Result<Json<BatchesResponse>> {
    debug!("List imports request: {:?}", params);

    let pagination = &state.settings.pagination;
    let limit = params
        .limit
        .unwrap_or(pagination.api_default_limit as i64)
        .clamp(1, pagination.api_max_limit as i64);
    if params.page < 1 || params.page > pagination.max_pages as i64 {
        return Err(Error::Validation(format!(
            "page must be between 1 and {}",
            pagination.max_pages
        )));
    }
    let offset = (params.page - 1) * limit;

    let batches = state.importer.list_batches(limit, offset).await?;
    let total = db::batches::count_batches(&state.pool).await?;

    Ok(Json(BatchesResponse {
        batches,
        pagination: Pagination {
            page: params.page,
            limit,
            total,
            total_pages: (total + limit - 1) / limit,
        },
    }))
}

/// GET /api/search - Search recipes
pub async fn search_recipes(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    debug!("Search request: {:?}", params);

    let query = SearchQuery {
        term: params.q.clone(),
        tags: params.tag_list(),
        limit: params
            .limit
            .unwrap_or(state.settings.pagination.api_default_limit as i64),
        page: params.page.unwrap_or(1),
    };

    let results = state.ranker.search(&query).await?;

    Ok(Json(SearchResponse {
        pagination: Pagination {
            page: results.page,
            limit: results.limit,
            total: results.total,
            total_pages: results.total_pages,
        },
        results: results.results.into_iter().map(RecipeCard::from).collect(),
    }))
}

/// GET /api/recipes/:id - Get recipe details
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RecipeDetail>> {
    debug!("Get recipe request: {}", id);

    let recipe = db::recipes::get_recipe(&state.pool, id).await?;
    if !recipe.is_public {
        return Err(Error::NotFound(format!("Recipe {id} not found")));
    }

    Ok(Json(RecipeDetail::from(recipe)))
}

/// GET /api/tags - Tag usage over public recipes
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<TagsResponse>> {
    let tags = db::tags::get_tags_with_count(&state.pool)
        .await?
        .into_iter()
        .map(|(name, count)| TagCount { name, count })
        .collect();

    Ok(Json(TagsResponse { tags }))
}

/// GET /api/stats - Get system statistics
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<Stats>> {
    debug!("Get stats request");

    let pool = &state.pool;
    Ok(Json(Stats {
        total_recipes: db::recipes::count_all_recipes(pool).await?,
        total_tags: db::tags::count_tags(pool).await?,
        total_batches: db::batches::count_batches(pool).await?,
        pending_batches: db::batches::count_batches_by_status(pool, BatchStatus::Pending).await?,
        in_progress_batches: db::batches::count_batches_by_status(pool, BatchStatus::InProgress)
            .await?,
        completed_batches: db::batches::count_batches_by_status(pool, BatchStatus::Completed)
            .await?,
        failed_batches: db::batches::count_batches_by_status(pool, BatchStatus::Failed).await?,
        indexed_documents: state.search_index.num_docs(),
    }))
}

/// GET /health - Health check endpoint
pub async fn health_check() -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}

/// GET /ready - Readiness check endpoint
pub async fn readiness_check(State(state): State<AppState>) -> Result<Json<ReadinessResponse>> {
    let db_healthy = sqlx::query("SELECT 1").fetch_one(&state.pool).await.is_ok();

    // A searcher can always be acquired from an opened index
    let index_healthy = true;

    let ready = db_healthy && index_healthy;

    Ok(Json(ReadinessResponse {
        ready,
        database: if db_healthy { "ok" } else { "error" }.to_string(),
        search_index: if index_healthy { "ok" } else { "error" }.to_string(),
    }))
}

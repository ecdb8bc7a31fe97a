use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::{BatchStatus, ImportBatch, Recipe};
use crate::search::RankedRecipe;

/// POST /api/imports body
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
    pub repository_url: String,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Reply to an accepted import
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportAccepted {
    pub batch_id: Uuid,
    pub status: BatchStatus,
}

/// Batch list query parameters
#[derive(Debug, Clone, Deserialize)]
pub struct BatchListParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default)]
    pub limit: Option<i64>,
}

fn default_page() -> i64 {
    1
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchesResponse {
    pub batches: Vec<ImportBatch>,
    pub pagination: Pagination,
}

/// Search request parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: Option<String>,
    /// Comma-separated tag list
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl SearchParams {
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Search response
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<RecipeCard>,
    pub pagination: Pagination,
}

/// Recipe card for search results
#[derive(Debug, Clone, Serialize)]
pub struct RecipeCard {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub prep_time_minutes: Option<i64>,
    pub cook_time_minutes: Option<i64>,
    pub total_time_minutes: Option<i64>,
    pub servings: Option<i64>,
    pub tags: Vec<String>,
    pub source_repository: Option<String>,
    pub rating: Option<f64>,
    pub similarity_score: f32,
}

impl From<RankedRecipe> for RecipeCard {
    fn from(ranked: RankedRecipe) -> Self {
        let recipe = ranked.recipe;
        Self {
            id: recipe.id,
            name: recipe.name,
            description: recipe.description,
            prep_time_minutes: recipe.prep_time_minutes,
            cook_time_minutes: recipe.cook_time_minutes,
            total_time_minutes: recipe.total_time_minutes,
            servings: recipe.servings,
            tags: recipe.tags.0,
            source_repository: recipe.source_repository,
            rating: recipe.rating,
            similarity_score: ranked.similarity_score,
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// Full recipe details
#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub prep_time_minutes: Option<i64>,
    pub cook_time_minutes: Option<i64>,
    pub total_time_minutes: Option<i64>,
    pub servings: Option<i64>,
    pub ingredients: Vec<String>,
    pub directions: Vec<String>,
    pub tags: Vec<String>,
    pub source_repository: Option<String>,
    pub original_filename: Option<String>,
    pub import_batch_id: Option<Uuid>,
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Recipe> for RecipeDetail {
    fn from(recipe: Recipe) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name,
            description: recipe.description,
            prep_time_minutes: recipe.prep_time_minutes,
            cook_time_minutes: recipe.cook_time_minutes,
            total_time_minutes: recipe.total_time_minutes,
            servings: recipe.servings,
            ingredients: recipe.ingredients.0,
            directions: recipe.directions.0,
            tags: recipe.tags.0,
            source_repository: recipe.source_repository,
            original_filename: recipe.original_filename,
            import_batch_id: recipe.import_batch_id,
            rating: recipe.rating,
            created_at: recipe.created_at,
            updated_at: recipe.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TagCount {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagsResponse {
    pub tags: Vec<TagCount>,
}

/// System statistics
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_recipes: i64,
    pub total_tags: i64,
    pub total_batches: i64,
    pub pending_batches: i64,
    pub in_progress_batches: i64,
    pub completed_batches: i64,
    pub failed_batches: i64,
    pub indexed_documents: u64,
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Readiness check response
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub database: String,
    pub search_index: String,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::normalizer::NormalizedRecipe;

/// Lifecycle state of an import batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::InProgress => "inProgress",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ImportBatch {
    pub id: Uuid,
    pub repository_url: String,
    pub status: BatchStatus,
    pub total_recipes: Option<i64>,
    pub successful_imports: i64,
    pub failed_imports: i64,
    pub error_log: Json<Vec<String>>,
    pub created_by: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewImportBatch {
    pub repository_url: String,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recipe {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub prep_time_minutes: Option<i64>,
    pub cook_time_minutes: Option<i64>,
    pub total_time_minutes: Option<i64>,
    pub servings: Option<i64>,
    pub ingredients: Json<Vec<String>>,
    pub directions: Json<Vec<String>>,
    pub tags: Json<Vec<String>>,
    pub source_repository: Option<String>,
    pub original_filename: Option<String>,
    pub import_batch_id: Option<Uuid>,
    pub rating: Option<f64>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecipe {
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
}

impl NewRecipe {
    /// Attach provenance to a normalized recipe
    pub fn from_normalized(
        recipe: NormalizedRecipe,
        source_repository: Option<String>,
        original_filename: Option<String>,
        import_batch_id: Option<Uuid>,
    ) -> Self {
        Self {
            name: recipe.name,
            description: recipe.description,
            prep_time_minutes: recipe.prep_time_minutes,
            cook_time_minutes: recipe.cook_time_minutes,
            total_time_minutes: recipe.total_time_minutes,
            servings: recipe.servings,
            ingredients: recipe.ingredients,
            directions: recipe.directions,
            tags: recipe.tags,
            source_repository,
            original_filename,
            import_batch_id,
            rating: recipe.rating,
        }
    }
}

/// Optional tag filter shared by the candidate queries
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    /// Recipes must carry at least one of these tags (empty = no filter)
    pub any_tags: Vec<String>,
}

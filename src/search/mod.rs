pub mod index;
pub mod ranker;
pub mod schema;

pub use index::SearchIndex;
pub use ranker::{RankedRecipe, SearchQuery, SearchRanker, SearchResults};
pub use schema::RecipeSchema;

use crate::db::{recipes, DbPool};
use crate::error::{Error, Result};
use std::sync::Arc;

/// Rebuild `index` from every stored recipe, returning the number indexed
pub async fn reindex(pool: &DbPool, index: Arc<SearchIndex>) -> Result<usize> {
    let recipes = recipes::list_all_recipes(pool).await?;
    let count = recipes.len();

    tokio::task::spawn_blocking(move || index.rebuild(&recipes))
        .await
        .map_err(|e| Error::Internal(format!("Reindex task failed: {e}")))??;

    Ok(count)
}

use crate::db::{models::*, DbPool};
use crate::error::{Error, Result};
use chrono::Utc;
use sqlx::types::Json;
use uuid::Uuid;

/// Create a new recipe.
///
/// All columns, including the ingredient/direction/tag arrays, are written by
/// one INSERT so concurrent readers never see a partially stored recipe.
pub async fn create_recipe(pool: &DbPool, new_recipe: &NewRecipe) -> Result<Recipe> {
    if new_recipe.name.trim().is_empty() {
        return Err(Error::Validation("Recipe name must not be empty".to_string()));
    }

    let now = Utc::now();

    let recipe = sqlx::query_as::<_, Recipe>(
        r#"
        INSERT INTO recipes (
            id, name, description, prep_time_minutes, cook_time_minutes,
            total_time_minutes, servings, ingredients, directions, tags,
            source_repository, original_filename, import_batch_id, rating,
            is_public, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&new_recipe.name)
    .bind(&new_recipe.description)
    .bind(new_recipe.prep_time_minutes)
    .bind(new_recipe.cook_time_minutes)
    .bind(new_recipe.total_time_minutes)
    .bind(new_recipe.servings)
    .bind(Json(&new_recipe.ingredients))
    .bind(Json(&new_recipe.directions))
    .bind(Json(&new_recipe.tags))
    .bind(&new_recipe.source_repository)
    .bind(&new_recipe.original_filename)
    .bind(new_recipe.import_batch_id)
    .bind(new_recipe.rating)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(recipe)
}

/// Get recipe by ID
pub async fn get_recipe(pool: &DbPool, recipe_id: Uuid) -> Result<Recipe> {
    let recipe = sqlx::query_as::<_, Recipe>("SELECT * FROM recipes WHERE id = ?")
        .bind(recipe_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Recipe {recipe_id} not found")))?;

    Ok(recipe)
}

/// List recipes created by one import batch
pub async fn list_recipes_by_batch(pool: &DbPool, batch_id: Uuid) -> Result<Vec<Recipe>> {
    let recipes = sqlx::query_as::<_, Recipe>(
        "SELECT * FROM recipes WHERE import_batch_id = ? ORDER BY created_at, id",
    )
    .bind(batch_id)
    .fetch_all(pool)
    .await?;

    Ok(recipes)
}

/// Count recipes created by one import batch
pub async fn count_recipes_by_batch(pool: &DbPool, batch_id: Uuid) -> Result<i64> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE import_batch_id = ?")
        .bind(batch_id)
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

/// Count all recipes
pub async fn count_all_recipes(pool: &DbPool) -> Result<i64> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes")
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

/// Change the public visibility flag (owned by external collaborators)
pub async fn set_recipe_visibility(pool: &DbPool, recipe_id: Uuid, is_public: bool) -> Result<()> {
    let result = sqlx::query("UPDATE recipes SET is_public = ?, updated_at = ? WHERE id = ?")
        .bind(is_public)
        .bind(Utc::now())
        .bind(recipe_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Recipe {recipe_id} not found")));
    }
    Ok(())
}

/// Set or clear the rating (owned by external collaborators)
pub async fn set_recipe_rating(pool: &DbPool, recipe_id: Uuid, rating: Option<f64>) -> Result<()> {
    if let Some(value) = rating {
        if !(0.0..=5.0).contains(&value) {
            return Err(Error::Validation(format!(
                "Rating must be between 0 and 5, got {value}"
            )));
        }
    }

    let result = sqlx::query("UPDATE recipes SET rating = ?, updated_at = ? WHERE id = ?")
        .bind(rating)
        .bind(Utc::now())
        .bind(recipe_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Recipe {recipe_id} not found")));
    }
    Ok(())
}

/// Delete recipe
pub async fn delete_recipe(pool: &DbPool, recipe_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM recipes WHERE id = ?")
        .bind(recipe_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// All recipes, oldest first (index rebuilds)
pub async fn list_all_recipes(pool: &DbPool) -> Result<Vec<Recipe>> {
    let recipes = sqlx::query_as::<_, Recipe>("SELECT * FROM recipes ORDER BY created_at, id")
        .fetch_all(pool)
        .await?;

    Ok(recipes)
}

/// Build the `AND EXISTS (...)` clause for a tag-overlap filter
fn tag_clause(filter: &RecipeFilter) -> String {
    if filter.any_tags.is_empty() {
        return String::new();
    }

    let placeholders = vec!["?"; filter.any_tags.len()].join(",");
    format!(
        " AND EXISTS (SELECT 1 FROM json_each(recipes.tags) AS t WHERE t.value IN ({placeholders}))"
    )
}

/// List public recipes in browse order (rating desc, newest first)
pub async fn list_visible_recipes(
    pool: &DbPool,
    filter: &RecipeFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Recipe>> {
    let query_str = format!(
        r#"
        SELECT * FROM recipes
        WHERE is_public = 1{}
        ORDER BY rating IS NULL, rating DESC, created_at DESC, id
        LIMIT ? OFFSET ?
        "#,
        tag_clause(filter)
    );

    let mut query = sqlx::query_as::<_, Recipe>(&query_str);
    for tag in &filter.any_tags {
        query = query.bind(tag);
    }

    let recipes = query.bind(limit).bind(offset).fetch_all(pool).await?;
    Ok(recipes)
}

/// Count public recipes matching the filter
pub async fn count_visible_recipes(pool: &DbPool, filter: &RecipeFilter) -> Result<i64> {
    let query_str = format!(
        "SELECT COUNT(*) FROM recipes WHERE is_public = 1{}",
        tag_clause(filter)
    );

    let mut query = sqlx::query_as::<_, (i64,)>(&query_str);
    for tag in &filter.any_tags {
        query = query.bind(tag);
    }

    let count = query.fetch_one(pool).await?;
    Ok(count.0)
}

/// Load the public recipes among `recipe_ids` that also match the filter
/// (batch loading to avoid N+1)
pub async fn get_visible_recipes_by_ids(
    pool: &DbPool,
    recipe_ids: &[Uuid],
    filter: &RecipeFilter,
) -> Result<Vec<Recipe>> {
    if recipe_ids.is_empty() {
        return Ok(Vec::new());
    }

    let id_placeholders = vec!["?"; recipe_ids.len()].join(",");
    let query_str = format!(
        "SELECT * FROM recipes WHERE is_public = 1 AND id IN ({id_placeholders}){}",
        tag_clause(filter)
    );

    let mut query = sqlx::query_as::<_, Recipe>(&query_str);
    for id in recipe_ids {
        query = query.bind(id);
    }
    for tag in &filter.any_tags {
        query = query.bind(tag);
    }

    let recipes = query.fetch_all(pool).await?;
    Ok(recipes)
}

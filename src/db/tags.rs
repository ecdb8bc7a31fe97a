use crate::db::DbPool;
use crate::error::Result;

/// Get all tags of public recipes with usage count
pub async fn get_tags_with_count(pool: &DbPool) -> Result<Vec<(String, i64)>> {
    let tags: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT t.value AS name, COUNT(*) AS count
        FROM recipes r, json_each(r.tags) AS t
        WHERE r.is_public = 1
        GROUP BY t.value
        ORDER BY count DESC, name
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(tags)
}

/// Count distinct tags across public recipes
pub async fn count_tags(pool: &DbPool) -> Result<i64> {
    let count: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(DISTINCT t.value)
        FROM recipes r, json_each(r.tags) AS t
        WHERE r.is_public = 1
        "#,
    )
    .fetch_one(pool)
    .await?;
    Ok(count.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::NewRecipe;
    use crate::db::{init_pool, recipes, run_migrations};

    fn tagged(name: &str, tags: &[&str]) -> NewRecipe {
        NewRecipe {
            name: name.to_string(),
            description: None,
            prep_time_minutes: None,
            cook_time_minutes: None,
            total_time_minutes: None,
            servings: None,
            ingredients: Vec::new(),
            directions: Vec::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            source_repository: None,
            original_filename: None,
            import_batch_id: None,
            rating: None,
        }
    }

    #[tokio::test]
    async fn test_tags_with_count() {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        recipes::create_recipe(&pool, &tagged("Cookies", &["dessert", "baking"]))
            .await
            .unwrap();
        recipes::create_recipe(&pool, &tagged("Brownies", &["dessert"]))
            .await
            .unwrap();
        let hidden = recipes::create_recipe(&pool, &tagged("Secret", &["hidden"]))
            .await
            .unwrap();
        recipes::set_recipe_visibility(&pool, hidden.id, false)
            .await
            .unwrap();

        let tags = get_tags_with_count(&pool).await.unwrap();
        assert_eq!(
            tags,
            vec![("dessert".to_string(), 2), ("baking".to_string(), 1)]
        );
        assert_eq!(count_tags(&pool).await.unwrap(), 2);
    }
}

use tantivy::schema::{Field, Schema, STORED, STRING, TEXT};

/// Schema for the recipe full-text index
#[derive(Clone)]
pub struct RecipeSchema {
    pub schema: Schema,
    pub id: Field,
    pub name: Field,
    pub description: Field,
}

impl RecipeSchema {
    pub fn new() -> Self {
        let mut schema_builder = Schema::builder();

        // Recipe UUID (exact match for deletes, stored to map hits back)
        let id = schema_builder.add_text_field("id", STRING | STORED);

        // Name (searchable, stored, boosted at query time)
        let name = schema_builder.add_text_field("name", TEXT | STORED);

        let description = schema_builder.add_text_field("description", TEXT);

        let schema = schema_builder.build();

        Self {
            schema,
            id,
            name,
            description,
        }
    }
}

impl Default for RecipeSchema {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_creation() {
        let schema = RecipeSchema::new();
        assert!(schema.schema.get_field("id").is_ok());
        assert!(schema.schema.get_field("name").is_ok());
        assert!(schema.schema.get_field("description").is_ok());
    }
}

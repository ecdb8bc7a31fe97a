use super::time::minutes_from_value;
use super::{parse_servings, split_tags, strip_list_marker, NormalizationError, PayloadFormat, RecipeDraft};
use serde_json::{Map, Value};

const NAME_FIELDS: &[&str] = &["name", "title"];
const DESCRIPTION_FIELDS: &[&str] = &["description", "summary"];
const INGREDIENT_FIELDS: &[&str] = &["ingredients", "ingredient_list", "recipeIngredient"];
const DIRECTION_FIELDS: &[&str] = &[
    "directions",
    "instructions",
    "steps",
    "method",
    "recipeInstructions",
];
const PREP_FIELDS: &[&str] = &["prep_time", "prepTime", "prep_time_minutes"];
const COOK_FIELDS: &[&str] = &["cook_time", "cookTime", "cook_time_minutes"];
const SERVING_FIELDS: &[&str] = &["servings", "yield", "recipeYield", "serves"];
const TAG_FIELDS: &[&str] = &["tags", "keywords", "categories", "recipeCategory"];

// Keys of a structured ingredient object
const QUANTITY_KEYS: &[&str] = &["quantity", "amount", "qty"];
const UNIT_KEYS: &[&str] = &["unit", "units", "measure"];
const INGREDIENT_NAME_KEYS: &[&str] = &["name", "ingredient", "item", "food"];
const TEXT_KEYS: &[&str] = &["text", "original", "step", "description", "instruction"];

pub(super) fn parse_json(content: &str) -> Result<RecipeDraft, NormalizationError> {
    let value: Value = serde_json::from_str(content).map_err(|e| NormalizationError::Malformed {
        format: PayloadFormat::Json,
        message: e.to_string(),
    })?;
    draft_from_value(&value, PayloadFormat::Json)
}

pub(super) fn parse_yaml(content: &str) -> Result<RecipeDraft, NormalizationError> {
    let value: Value = serde_yaml::from_str(content).map_err(|e| NormalizationError::Malformed {
        format: PayloadFormat::Yaml,
        message: e.to_string(),
    })?;
    draft_from_value(&value, PayloadFormat::Yaml)
}

/// Map an arbitrary object layout onto the draft fields
pub(super) fn draft_from_value(
    value: &Value,
    format: PayloadFormat,
) -> Result<RecipeDraft, NormalizationError> {
    let obj = value.as_object().ok_or_else(|| NormalizationError::Malformed {
        format,
        message: "expected a recipe object".to_string(),
    })?;

    let mut tags = Vec::new();
    for key in TAG_FIELDS {
        if let Some(value) = obj.get(*key) {
            tags.extend(string_list(value, true));
        }
    }

    Ok(RecipeDraft {
        name: field(obj, NAME_FIELDS).and_then(scalar_string),
        description: field(obj, DESCRIPTION_FIELDS).and_then(scalar_string),
        prep_time_minutes: field(obj, PREP_FIELDS).and_then(minutes_from_value),
        cook_time_minutes: field(obj, COOK_FIELDS).and_then(minutes_from_value),
        servings: field(obj, SERVING_FIELDS).and_then(servings_from_value),
        ingredients: field(obj, INGREDIENT_FIELDS)
            .map(ingredient_list)
            .unwrap_or_default(),
        directions: field(obj, DIRECTION_FIELDS)
            .map(direction_list)
            .unwrap_or_default(),
        tags,
        rating: rating_from_object(obj),
    })
}

/// First alias present with a non-null value
fn field<'a>(obj: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|key| obj.get(*key))
        .find(|v| !v.is_null())
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn servings_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => parse_servings(s),
        // recipeYield is sometimes ["4", "4 servings"]
        Value::Array(items) => items.iter().find_map(servings_from_value),
        _ => None,
    }
}

fn rating_from_object(obj: &Map<String, Value>) -> Option<f64> {
    let value = match obj.get("rating") {
        Some(Value::Object(inner)) => inner.get("ratingValue").or_else(|| inner.get("value")),
        Some(value) => Some(value),
        None => obj
            .get("aggregateRating")
            .and_then(|agg| agg.get("ratingValue")),
    }?;

    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Strings from a list or a delimited blob
fn string_list(value: &Value, comma_separated: bool) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_string).collect(),
        Value::String(s) if comma_separated => split_tags(s),
        Value::String(s) => split_blob(s),
        _ => Vec::new(),
    }
}

fn split_blob(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_list_marker)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn ingredient_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(render_ingredient).collect(),
        Value::String(s) => split_blob(s),
        _ => Vec::new(),
    }
}

/// Render one ingredient entry as a single display string
fn render_ingredient(value: &Value) -> Option<String> {
    match value {
        Value::Object(obj) => {
            if let Some(name) = field(obj, INGREDIENT_NAME_KEYS).and_then(scalar_string) {
                let parts: Vec<String> = [
                    field(obj, QUANTITY_KEYS).and_then(scalar_string),
                    field(obj, UNIT_KEYS).and_then(scalar_string),
                    Some(name),
                ]
                .into_iter()
                .flatten()
                .filter(|p| !p.is_empty())
                .collect();
                Some(parts.join(" "))
            } else {
                field(obj, TEXT_KEYS).and_then(scalar_string)
            }
        }
        other => scalar_string(other).map(|s| strip_list_marker(&s).to_string()),
    }
}

fn direction_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => {
            let mut steps = Vec::new();
            for item in items {
                match item {
                    Value::Object(obj) => {
                        // HowToSection nests its steps
                        if let Some(nested) = obj.get("itemListElement") {
                            steps.extend(direction_list(nested));
                        } else if let Some(text) = field(obj, TEXT_KEYS).and_then(scalar_string) {
                            steps.push(text);
                        }
                    }
                    other => {
                        if let Some(text) = scalar_string(other) {
                            steps.push(strip_list_marker(&text).to_string());
                        }
                    }
                }
            }
            steps
        }
        Value::String(s) => split_blob(s),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(value: Value) -> RecipeDraft {
        draft_from_value(&value, PayloadFormat::Json).unwrap()
    }

    #[test]
    fn test_canonical_fields() {
        let recipe = draft(json!({
            "name": "Pancakes",
            "description": "Fluffy",
            "prep_time": 10,
            "cook_time": "15 minutes",
            "servings": 4,
            "ingredients": ["1 cup flour", "1 egg"],
            "directions": ["Mix", "Fry"],
            "tags": ["Breakfast", "Quick"],
            "rating": 4.5
        }))
        .finish()
        .unwrap();

        assert_eq!(recipe.name, "Pancakes");
        assert_eq!(recipe.description.as_deref(), Some("Fluffy"));
        assert_eq!(recipe.prep_time_minutes, Some(10));
        assert_eq!(recipe.cook_time_minutes, Some(15));
        assert_eq!(recipe.total_time_minutes, Some(25));
        assert_eq!(recipe.servings, Some(4));
        assert_eq!(recipe.ingredients, vec!["1 cup flour", "1 egg"]);
        assert_eq!(recipe.directions, vec!["Mix", "Fry"]);
        assert_eq!(recipe.tags, vec!["Breakfast", "Quick"]);
        assert_eq!(recipe.rating, Some(4.5));
    }

    #[test]
    fn test_schema_org_aliases() {
        let recipe = draft(json!({
            "@type": "Recipe",
            "title": "Chili",
            "summary": "<p>Spicy &amp; warm</p>",
            "prepTime": "PT15M",
            "cookTime": "PT1H",
            "recipeYield": ["6", "6 bowls"],
            "recipeIngredient": ["1 lb beef", "2 cans beans"],
            "recipeInstructions": [
                {"@type": "HowToStep", "text": "Brown the beef."},
                {"@type": "HowToSection", "itemListElement": [
                    {"@type": "HowToStep", "text": "Add beans."},
                    {"@type": "HowToStep", "text": "Simmer."}
                ]}
            ],
            "keywords": "Spicy, Dinner",
            "recipeCategory": ["Dinner", "Stew"],
            "aggregateRating": {"ratingValue": "4.2", "ratingCount": 10}
        }))
        .finish()
        .unwrap();

        assert_eq!(recipe.name, "Chili");
        assert_eq!(recipe.description.as_deref(), Some("Spicy & warm"));
        assert_eq!(recipe.total_time_minutes, Some(75));
        assert_eq!(recipe.servings, Some(6));
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(
            recipe.directions,
            vec!["Brown the beef.", "Add beans.", "Simmer."]
        );
        assert_eq!(recipe.tags, vec!["Spicy", "Dinner", "Stew"]);
        assert_eq!(recipe.rating, Some(4.2));
    }

    #[test]
    fn test_structured_ingredients() {
        let recipe = draft(json!({
            "name": "Bread",
            "ingredients": [
                {"quantity": 500, "unit": "g", "name": "flour"},
                {"amount": "1", "ingredient": "egg"},
                {"text": "a pinch of salt"},
                "- 300 ml water"
            ]
        }))
        .finish()
        .unwrap();

        assert_eq!(
            recipe.ingredients,
            vec!["500 g flour", "1 egg", "a pinch of salt", "300 ml water"]
        );
    }

    #[test]
    fn test_text_blob_fields() {
        let recipe = draft(json!({
            "name": "Tea",
            "ingredients": "1 tea bag\n\n1 cup water",
            "instructions": "1. Boil water\n2. Steep"
        }))
        .finish()
        .unwrap();

        assert_eq!(recipe.ingredients, vec!["1 tea bag", "1 cup water"]);
        assert_eq!(recipe.directions, vec!["Boil water", "Steep"]);
    }

    #[test]
    fn test_missing_name() {
        let result = draft(json!({"ingredients": ["salt"]})).finish();
        assert_eq!(result, Err(NormalizationError::MissingName));
    }

    #[test]
    fn test_unparseable_optional_fields_dropped() {
        let recipe = draft(json!({
            "name": "Mystery",
            "prep_time": {"weird": true},
            "servings": "some",
            "rating": "great"
        }))
        .finish()
        .unwrap();

        assert_eq!(recipe.prep_time_minutes, None);
        assert_eq!(recipe.servings, None);
        assert_eq!(recipe.rating, None);
    }

    #[test]
    fn test_non_object_is_malformed() {
        let result = parse_json("[1, 2, 3]");
        assert!(matches!(
            result,
            Err(NormalizationError::Malformed {
                format: PayloadFormat::Json,
                ..
            })
        ));
        assert!(parse_json("{not json").is_err());
    }

    #[test]
    fn test_yaml_payload() {
        let content = r#"
title: Lemonade
prep_time: 5 min
servings: 2
ingredients:
  - 2 lemons
  - 1 tbsp sugar
steps:
  - Squeeze lemons
  - Stir in sugar
tags: [Drinks, Summer]
"#;
        let recipe = parse_yaml(content).unwrap().finish().unwrap();
        assert_eq!(recipe.name, "Lemonade");
        assert_eq!(recipe.prep_time_minutes, Some(5));
        assert_eq!(recipe.total_time_minutes, None);
        assert_eq!(recipe.ingredients, vec!["2 lemons", "1 tbsp sugar"]);
        assert_eq!(recipe.directions.len(), 2);
        assert_eq!(recipe.tags, vec!["Drinks", "Summer"]);
    }
}

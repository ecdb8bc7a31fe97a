use super::{parse_servings, NormalizationError, PayloadFormat, RecipeDraft};
use cooklang::{Content, Converter, CooklangParser, Extensions, Item};
use std::path::Path;
use tracing::{debug, warn};

/// Parse a Cooklang recipe file.
///
/// Metadata comes from the recipe's `>>` lines or front matter, each step
/// becomes one direction and every distinct ingredient is listed once.
/// The title defaults to the file stem.
pub(super) fn parse_cooklang(content: &str, location: &str) -> Result<RecipeDraft, NormalizationError> {
    debug!("Parsing Cooklang recipe {}", location);

    let converter = Converter::default();
    let parser = CooklangParser::new(Extensions::empty(), Converter::default());
    let parsed = parser.parse(content);

    if parsed.report().has_warnings() {
        for warning in parsed.report().warnings() {
            warn!("Cooklang warning in {}: {}", location, warning);
        }
    }

    let (recipe, _warnings) = parsed
        .into_result()
        .map_err(|report| NormalizationError::Malformed {
            format: PayloadFormat::Cooklang,
            message: report.to_string(),
        })?;

    let mut draft = RecipeDraft::default();

    let meta = &recipe.metadata;
    for (key, value) in &meta.map {
        let Some(key) = key.as_str() else {
            continue;
        };
        let value = value
            .as_str()
            .map(str::to_string)
            .or_else(|| value.as_i64().map(|n| n.to_string()))
            .or_else(|| value.as_f64().map(|n| n.to_string()));
        if let Some(value) = value {
            draft.apply_metadata(key, &value);
        }
    }

    if let Some(tags) = meta.tags() {
        draft.tags.extend(tags.iter().map(|t| t.to_string()));
    }
    if let Some(servings) = meta.servings() {
        draft.servings = parse_servings(&format!("{servings}")).or(draft.servings);
    }
    if let Some(cooklang::metadata::RecipeTime::Composed {
        prep_time,
        cook_time,
    }) = meta.time(&converter)
    {
        if let Some(prep) = prep_time.and_then(|m| i64::try_from(m).ok()) {
            draft.prep_time_minutes = Some(prep);
        }
        if let Some(cook) = cook_time.and_then(|m| i64::try_from(m).ok()) {
            draft.cook_time_minutes = Some(cook);
        }
    }

    let mut seen = Vec::new();
    for ingredient in &recipe.ingredients {
        let name = ingredient.name.to_string();
        if seen.contains(&name) {
            continue;
        }

        let amount = ingredient
            .quantity
            .as_ref()
            .map(|q| amount_text(q.value(), q.unit()))
            .unwrap_or_default();
        draft.ingredients.push(if amount.is_empty() {
            name.clone()
        } else {
            format!("{amount} {name}")
        });
        seen.push(name);
    }

    for section in &recipe.sections {
        for content in &section.content {
            // Text blocks are notes, not steps
            let Content::Step(step) = content else {
                continue;
            };

            let mut text = String::new();
            for item in &step.items {
                match item {
                    Item::Text { value } => text.push_str(value),
                    Item::Ingredient { index } => {
                        if let Some(ingredient) = recipe.ingredients.get(*index) {
                            text.push_str(&ingredient.name);
                        }
                    }
                    Item::Cookware { index } => {
                        if let Some(cookware) = recipe.cookware.get(*index) {
                            text.push_str(&cookware.name);
                        }
                    }
                    Item::Timer { index } => {
                        if let Some(quantity) = recipe.timers.get(*index).and_then(|t| t.quantity.as_ref()) {
                            text.push_str(&amount_text(quantity.value(), quantity.unit()));
                        }
                    }
                    Item::InlineQuantity { index } => {
                        if let Some(quantity) = recipe.inline_quantities.get(*index) {
                            text.push_str(&amount_text(quantity.value(), quantity.unit()));
                        }
                    }
                }
            }

            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !text.is_empty() {
                draft.directions.push(text);
            }
        }
    }

    if draft.name.is_none() {
        draft.name = Path::new(location)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(|stem| stem.replace(['-', '_'], " "));
    }

    Ok(draft)
}

/// `200 g`, `1-2`, `a pinch`
fn amount_text(value: &cooklang::Value, unit: Option<&str>) -> String {
    [format_value(value), unit.map(str::to_string)]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_value(value: &cooklang::Value) -> Option<String> {
    match value {
        cooklang::Value::Number(num) => Some(format_number(num.value())),
        cooklang::Value::Range { start, end } => Some(format!(
            "{}-{}",
            format_number(start.value()),
            format_number(end.value())
        )),
        cooklang::Value::Text(t) => Some(t.to_string()),
    }
}

fn format_number(value: f64) -> String {
    format!("{value:.2}")
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

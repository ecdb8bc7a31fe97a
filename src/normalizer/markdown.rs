use super::{strip_list_marker, NormalizationError, RecipeDraft};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Preamble,
    Ingredients,
    Directions,
    Tags,
    Other,
}

fn classify_heading(heading: &str) -> Section {
    let heading = heading
        .trim()
        .trim_end_matches(':')
        .trim()
        .to_lowercase();

    match heading.as_str() {
        "ingredients" | "ingredient list" | "you will need" => Section::Ingredients,
        "directions" | "instructions" | "method" | "steps" | "preparation" | "procedure" => {
            Section::Directions
        }
        "tags" | "categories" | "keywords" => Section::Tags,
        _ => Section::Other,
    }
}

/// Split `Key: value`, also accepting `**Key:** value` and `- Key: value`
fn metadata_pair(line: &str) -> Option<(String, &str)> {
    let line = strip_list_marker(line);
    let (key, value) = line.split_once(':')?;
    let key = key.trim().trim_matches('*').trim().to_string();
    let value = value.trim().trim_start_matches('*').trim();

    if key.is_empty() || key.split_whitespace().count() > 3 || value.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Apply one body line to the draft for the current section
fn apply_line(draft: &mut RecipeDraft, section: Section, line: &str, description: &mut Vec<String>) {
    match section {
        Section::Preamble => {
            let applied = metadata_pair(line)
                .map(|(key, value)| draft.apply_metadata(&key, value))
                .unwrap_or(false);
            if !applied {
                description.push(line.to_string());
            }
        }
        Section::Ingredients => draft.ingredients.push(strip_list_marker(line).to_string()),
        Section::Directions => draft.directions.push(strip_list_marker(line).to_string()),
        Section::Tags => draft.tags.extend(super::split_tags(strip_list_marker(line))),
        Section::Other => {}
    }
}

/// Parse a markdown recipe: `# Title`, metadata lines, `## Ingredients`
/// and `## Directions` sections
pub(super) fn parse_markdown(content: &str) -> Result<RecipeDraft, NormalizationError> {
    let mut draft = RecipeDraft::default();
    let mut description = Vec::new();
    let mut section = Section::Preamble;
    let mut in_code_block = false;

    for raw_line in content.lines() {
        let line = raw_line.trim();

        if line.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block || line.is_empty() {
            continue;
        }

        if let Some(title) = line.strip_prefix("# ") {
            if draft.name.is_none() {
                draft.name = Some(title.trim().to_string());
            }
            continue;
        }

        if line.starts_with("##") {
            section = classify_heading(line.trim_start_matches('#'));
            continue;
        }

        if draft.name.is_none() && section == Section::Preamble {
            // Front matter or text before the title
            if let Some((key, value)) = metadata_pair(line) {
                draft.apply_metadata(&key, value);
            }
            continue;
        }

        apply_line(&mut draft, section, line, &mut description);
    }

    if draft.description.is_none() && !description.is_empty() {
        draft.description = Some(description.join(" "));
    }

    if draft.name.is_none() {
        return Err(NormalizationError::MissingName);
    }

    Ok(draft)
}

/// Parse a plain text recipe: first line is the title, `Ingredients:` and
/// `Directions:` headers delimit sections
pub(super) fn parse_plain_text(content: &str) -> Result<RecipeDraft, NormalizationError> {
    let mut draft = RecipeDraft::default();
    let mut description = Vec::new();
    let mut section = Section::Preamble;

    for raw_line in content.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if draft.name.is_none() {
            draft.name = Some(line.to_string());
            continue;
        }

        let heading = classify_heading(line);
        if heading != Section::Other && line.split_whitespace().count() <= 3 {
            section = heading;
            continue;
        }

        // Inline section header such as "Tags: quick, easy"
        if let Some((key, value)) = line.split_once(':') {
            let inline = classify_heading(key);
            if inline != Section::Other && section == Section::Preamble {
                for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                    apply_line(&mut draft, inline, part, &mut description);
                }
                continue;
            }
        }

        apply_line(&mut draft, section, line, &mut description);
    }

    if draft.description.is_none() && !description.is_empty() {
        draft.description = Some(description.join(" "));
    }

    Ok(draft)
}

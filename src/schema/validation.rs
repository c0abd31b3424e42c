use crate::extract::compile_selector;
use crate::schema::types::{
    ButtonStop, FieldSpec, FieldType, PaginationSpec, Schema, ScrollStop, MAX_URL_PAGES,
};
use crate::ConfigError;
use std::collections::HashSet;

/// Validates a schema, its nested schemas and its pagination block
///
/// Detects duplicate field names, malformed selectors and inconsistent list
/// configuration before any request is made.
pub fn validate_schema(schema: &Schema) -> Result<(), ConfigError> {
    compile_selector(&schema.base_selector)?;
    validate_fields(&schema.fields)?;

    if let Some(pagination) = &schema.pagination {
        validate_pagination(pagination)?;
    }

    Ok(())
}

/// Validates one level of fields (a schema's fields or a list's subfields)
fn validate_fields(fields: &[FieldSpec]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for field in fields {
        if field.name.is_empty() {
            return Err(ConfigError::Validation(
                "field name cannot be empty".to_string(),
            ));
        }

        if !seen.insert(field.name.as_str()) {
            return Err(ConfigError::DuplicateField(field.name.clone()));
        }

        validate_field(field)?;
    }

    Ok(())
}

fn validate_field(field: &FieldSpec) -> Result<(), ConfigError> {
    if let Some(selector) = &field.selector {
        compile_selector(selector)?;
    }

    if let Some(attribute) = &field.attribute {
        if attribute.is_empty() {
            return Err(ConfigError::Validation(format!(
                "field '{}' has an empty attribute name",
                field.name
            )));
        }
    }

    let has_subfields = field.list_subfields.is_some();
    let has_formatter = field.list_formatter.is_some();

    if field.field_type == FieldType::List {
        // Exactly one of the two list shapes
        if has_subfields == has_formatter {
            return Err(ConfigError::ListShape(field.name.clone()));
        }
        if field.follow_schema.is_some() {
            return Err(ConfigError::Validation(format!(
                "list field '{}' cannot follow links; put follow_schema on a subfield",
                field.name
            )));
        }
    } else if has_subfields || has_formatter {
        return Err(ConfigError::Validation(format!(
            "field '{}' sets list options but has type '{}'",
            field.name,
            field.field_type.as_str()
        )));
    }

    if let Some(subfields) = &field.list_subfields {
        validate_fields(subfields)?;
    }

    if let Some(nested) = &field.follow_schema {
        if nested.pagination.is_some() {
            return Err(ConfigError::Unsupported(format!(
                "follow_schema of field '{}' cannot paginate",
                field.name
            )));
        }
        validate_schema(nested)?;
    }

    Ok(())
}

fn validate_pagination(pagination: &PaginationSpec) -> Result<(), ConfigError> {
    match pagination {
        PaginationSpec::UrlTemplate(url) => {
            if url.page_placeholder.is_empty() {
                return Err(ConfigError::Validation(
                    "page_placeholder cannot be empty".to_string(),
                ));
            }
            if url.start_page > url.end_page {
                return Err(ConfigError::Validation(format!(
                    "start_page ({}) must not exceed end_page ({})",
                    url.start_page, url.end_page
                )));
            }
            if url.page_count() > u64::from(MAX_URL_PAGES) {
                return Err(ConfigError::Validation(format!(
                    "url pagination spans {} pages, more than the limit of {}",
                    url.page_count(),
                    MAX_URL_PAGES
                )));
            }
        }
        PaginationSpec::ButtonClick(button) => {
            compile_selector(&button.button_selector)?;
            match &button.stop_condition {
                ButtonStop::NoButton => {}
                ButtonStop::Count(clicks) => positive_count("click_count", *clicks)?,
                ButtonStop::Element(selector) => {
                    compile_selector(selector)?;
                }
            }
            if let Some(container) = &button.scroll_selector {
                compile_selector(container)?;
            }
        }
        PaginationSpec::InfiniteScroll(scroll) => {
            if scroll.scroll_distance == 0 {
                return Err(ConfigError::Validation(
                    "scroll_distance cannot be 0".to_string(),
                ));
            }
            match &scroll.stop_condition {
                ScrollStop::NoNewElements => {}
                ScrollStop::Count(scrolls) => positive_count("scroll_count", *scrolls)?,
                ScrollStop::Element(selector) => {
                    compile_selector(selector)?;
                }
            }
            if let Some(container) = &scroll.scroll_selector {
                compile_selector(container)?;
            }
        }
    }

    Ok(())
}

fn positive_count(name: &str, count: u32) -> Result<(), ConfigError> {
    if count == 0 {
        return Err(ConfigError::Validation(format!("{} must be >= 1", name)));
    }
    Ok(())
}

/// Checks that a start URL is usable with the schema's URL template
pub fn validate_start_url(url: &str, schema: &Schema) -> Result<(), ConfigError> {
    if let Some(PaginationSpec::UrlTemplate(template)) = &schema.pagination {
        if !url.contains(&template.page_placeholder) {
            return Err(ConfigError::InvalidUrl(format!(
                "'{}' does not contain the page placeholder '{}'",
                url, template.page_placeholder
            )));
        }
        let first_page = url.replace(&template.page_placeholder, &template.start_page.to_string());
        url::Url::parse(&first_page)
            .map_err(|e| ConfigError::InvalidUrl(format!("'{}': {}", first_page, e)))?;
    } else {
        url::Url::parse(url).map_err(|e| ConfigError::InvalidUrl(format!("'{}': {}", url, e)))?;
    }

    Ok(())
}

//! Column preparation: unique headers and contiguous indices

use crate::error::{ExportError, Result};
use crate::types::{Column, FieldDescriptor};
use std::collections::HashSet;

/// Id of the synthetic submission date column
pub const SUBMISSION_DATE_COLUMN_ID: &str = "submission_date";

/// Tracks headers already handed out, compared case-insensitively
#[derive(Debug, Default)]
pub struct HeaderRegistry {
    used: HashSet<String>,
    fallback_counter: u32,
}

impl HeaderRegistry {
    pub fn new() -> Self {
        HeaderRegistry {
            used: HashSet::new(),
            fallback_counter: 1,
        }
    }

    /// Register `label`, suffixing `" (2)"`, `" (3)"`, ... on collision
    pub fn register(&mut self, label: &str) -> String {
        let label = label.trim();
        let base = if label.is_empty() {
            format!("Column_{}", self.used.len() + 1)
        } else {
            label.to_string()
        };

        let mut candidate = base.clone();
        let mut suffix = 2;
        while self.used.contains(&candidate.to_lowercase()) {
            candidate = format!("{} ({})", base, suffix);
            suffix += 1;
        }

        self.used.insert(candidate.to_lowercase());
        candidate
    }

    /// Header for a field: its label, else its key, else `Column_N`
    pub fn register_field(&mut self, field: &FieldDescriptor) -> String {
        let label = [field.label.trim(), field.key.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                let label = format!("Column_{}", self.fallback_counter);
                self.fallback_counter += 1;
                label
            });
        self.register(&label)
    }
}

/// Build the column list for a form: submission date first, then every field.
pub fn prepare_columns(fields: &[FieldDescriptor], date_header: &str) -> Vec<Column> {
    let mut registry = HeaderRegistry::new();
    let mut columns = Vec::with_capacity(fields.len() + 1);

    columns.push(Column {
        id: SUBMISSION_DATE_COLUMN_ID.to_string(),
        index: 1,
        header: registry.register(date_header),
        field: None,
    });

    for field in fields {
        let index = columns.len() as u32 + 1;
        columns.push(Column {
            id: format!("field_{}", field.id),
            index,
            header: registry.register_field(field),
            field: Some(field.clone()),
        });
    }

    columns
}

/// Keep the columns whose ids are in `selected`, preserving column order,
/// and re-index them `1..=N`.
pub fn select_columns<S: AsRef<str>>(columns: &[Column], selected: &[S]) -> Result<Vec<Column>> {
    if columns.is_empty() {
        return Err(ExportError::NoColumns);
    }

    let wanted: HashSet<&str> = selected.iter().map(|s| s.as_ref()).collect();
    let chosen: Vec<Column> = columns
        .iter()
        .filter(|c| wanted.contains(c.id.as_str()))
        .cloned()
        .collect();

    if chosen.is_empty() {
        return Err(ExportError::NoColumnsSelected);
    }

    Ok(reindex(chosen))
}

/// Assign contiguous 1-based indices in the given order
pub fn reindex(mut columns: Vec<Column>) -> Vec<Column> {
    for (i, column) in columns.iter_mut().enumerate() {
        column.index = i as u32 + 1;
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(id: u64, key: &str, label: &str) -> FieldDescriptor {
        FieldDescriptor::new(id, key, label)
    }

    #[test]
    fn test_duplicate_labels_get_suffixes() {
        let mut registry = HeaderRegistry::new();
        let headers: Vec<String> = ["Name", "Name", "Name"]
            .iter()
            .map(|l| registry.register(l))
            .collect();
        assert_eq!(headers, vec!["Name", "Name (2)", "Name (3)"]);
    }

    #[test]
    fn test_collisions_ignore_case() {
        let mut registry = HeaderRegistry::new();
        assert_eq!(registry.register("Email"), "Email");
        assert_eq!(registry.register("EMAIL"), "EMAIL (2)");
    }

    #[test]
    fn test_field_header_fallbacks() {
        let columns = prepare_columns(
            &[
                field(10, "first_name", "First name"),
                field(11, "email_key", "  "),
                field(12, "", ""),
                field(13, "", ""),
            ],
            "Submission Date",
        );
        let headers: Vec<&str> = columns.iter().map(|c| c.header.as_str()).collect();
        assert_eq!(
            headers,
            vec!["Submission Date", "First name", "email_key", "Column_1", "Column_2"]
        );
        assert!(columns[0].is_submission_date());
        assert_eq!(columns[1].id, "field_10");
    }

    #[test]
    fn test_selection_reindexes_contiguously() {
        let columns = prepare_columns(
            &[field(7, "a", "A"), field(30, "b", "B"), field(99, "c", "C")],
            "Submission Date",
        );
        let selected = select_columns(&columns, &["field_99", "submission_date", "field_7"]).unwrap();
        let ids: Vec<&str> = selected.iter().map(|c| c.id.as_str()).collect();
        let indices: Vec<u32> = selected.iter().map(|c| c.index).collect();
        assert_eq!(ids, vec!["submission_date", "field_7", "field_99"]);
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn test_selection_errors() {
        let none: Vec<Column> = Vec::new();
        assert!(matches!(
            select_columns(&none, &["x"]),
            Err(ExportError::NoColumns)
        ));

        let columns = prepare_columns(&[field(1, "a", "A")], "Submission Date");
        let empty: [&str; 0] = [];
        assert!(matches!(
            select_columns(&columns, &empty),
            Err(ExportError::NoColumnsSelected)
        ));
        assert!(matches!(
            select_columns(&columns, &["field_404"]),
            Err(ExportError::NoColumnsSelected)
        ));
    }
}

//! Named formatting strategies for headers and cells, keyed by field.

use std::collections::HashMap;
use std::fmt;

use crate::schema::Field;
use crate::table::{SortDirection, SortState};

pub type CellFormatter = fn(&str) -> String;

#[derive(Clone)]
pub struct CellRenderers {
    formatters: HashMap<Field, (&'static str, CellFormatter)>,
    fallback: CellFormatter,
}

impl Default for CellRenderers {
    fn default() -> Self {
        let mut renderers = Self {
            formatters: HashMap::new(),
            fallback: single_line,
        };
        renderers.register(Field::Age, "number", number);
        renderers.register(Field::Id, "number", number);
        renderers.register(Field::Email, "lowercase", lowercase);
        renderers
    }
}

// Lists the strategy name per field in schema order.
impl fmt::Debug for CellRenderers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(Field::ALL.iter().map(|&field| (field.name(), self.strategy(field))))
            .finish()
    }
}

impl CellRenderers {
    pub fn register(&mut self, field: Field, name: &'static str, formatter: CellFormatter) {
        self.formatters.insert(field, (name, formatter));
    }

    /// Name of the strategy used for a field.
    pub fn strategy(&self, field: Field) -> &'static str {
        self.formatters
            .get(&field)
            .map(|(name, _)| *name)
            .unwrap_or("text")
    }

    pub fn cell(&self, field: Field, value: &str) -> String {
        match self.formatters.get(&field) {
            Some((_, formatter)) => formatter(value),
            None => (self.fallback)(value),
        }
    }

    /// Column label with a sort marker.
    pub fn header(&self, field: Field, sort: Option<SortState>) -> String {
        let marker = match sort {
            Some(s) if s.field == field => match s.direction {
                SortDirection::Ascending => " ▲",
                SortDirection::Descending => " ▼",
            },
            _ => " ↕",
        };
        format!("{}{}", field.label(), marker)
    }
}

fn single_line(value: &str) -> String {
    value.replace("\r\n", " ↵ ").replace('\n', " ↵ ")
}

fn number(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        "∅".to_string()
    } else {
        single_line(trimmed)
    }
}

fn lowercase(value: &str) -> String {
    single_line(value).to_lowercase()
}

/// Shorten to `width` characters, marking the cut with `...`.
pub fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    if width < 3 {
        return value.chars().take(width).collect();
    }
    let mut reduced: String = value.chars().take(width - 3).collect();
    reduced.push_str("...");
    reduced
}

#![forbid(unsafe_code)]

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
};

use fc_types::{Row, Scalar};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("page size must be at least 1")]
    ZeroPageSize,
    #[error("sort column {0:?} is not one of the table's columns")]
    UnknownSortColumn(String),
    #[error("invalid view config: {0}")]
    Config(#[from] serde_json::Error),
}

/// Column list of a row set, taken from the first row's keys in alphabetical
/// order. Use `Table::columns` from the loader to keep source header order.
#[must_use]
pub fn columns_of(rows: &[Row]) -> Vec<String> {
    rows.first()
        .map(|row| row.columns().map(str::to_owned).collect())
        .unwrap_or_default()
}

/// Header labels keyed by raw column name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayNames {
    names: BTreeMap<String, String>,
}

impl DisplayNames {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, label: impl Into<String>) -> Self {
        self.names.insert(column.into(), label.into());
        self
    }

    /// Falls back to the raw column name when no label is configured.
    #[must_use]
    pub fn get<'a>(&'a self, column: &'a str) -> &'a str {
        self.names.get(column).map_or(column, String::as_str)
    }
}

/// Columns a role is not allowed to see.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnVisibility {
    hidden: BTreeSet<String>,
}

impl ColumnVisibility {
    #[must_use]
    pub fn new(hidden: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            hidden: hidden.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn is_visible(&self, column: &str) -> bool {
        !self.hidden.contains(column)
    }

    /// Columns the role may see, in their original order.
    #[must_use]
    pub fn permitted(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .filter(|column| self.is_visible(column))
            .cloned()
            .collect()
    }

    /// The user's own selection intersected with what the role may see.
    #[must_use]
    pub fn export_columns(&self, visible: &[String]) -> Vec<String> {
        self.permitted(visible)
    }
}

/// Adds `column` to the selection, or removes it if already present.
#[must_use]
pub fn toggle_column(visible: &[String], column: &str) -> Vec<String> {
    if visible.iter().any(|c| c == column) {
        visible.iter().filter(|c| *c != column).cloned().collect()
    } else {
        let mut out = visible.to_vec();
        out.push(column.to_owned());
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortConfig {
    #[must_use]
    pub fn ascending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    #[must_use]
    pub fn descending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Clicking the same header again flips direction; a new header starts
    /// ascending.
    #[must_use]
    pub fn toggled(previous: Option<&SortConfig>, column: &str) -> Self {
        match previous {
            Some(prev) if prev.column == column => Self {
                column: prev.column.clone(),
                direction: prev.direction.reversed(),
            },
            _ => Self::ascending(column),
        }
    }
}

fn present(value: Option<&Scalar>) -> Option<&Scalar> {
    value.filter(|v| !v.is_missing())
}

fn number_of(value: &Scalar) -> Option<f64> {
    Some(value.to_number()).filter(|n| !n.is_nan())
}

fn compare_cells(left: &Scalar, right: &Scalar) -> Ordering {
    match (number_of(left), number_of(right)) {
        (Some(l), Some(r)) => l.total_cmp(&r),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => {
            let (l, r) = (left.to_text(), right.to_text());
            l.to_lowercase()
                .cmp(&r.to_lowercase())
                .then_with(|| l.cmp(&r))
        }
    }
}

/// Stable sort on one column. Missing cells go last whatever the direction.
/// Numeric cells rank ahead of text cells; numbers compare as numbers and
/// text compares case-insensitively.
#[must_use]
pub fn sort_rows(rows: &[Row], sort: &SortConfig) -> Vec<Row> {
    let mut out = rows.to_vec();
    out.sort_by(|a, b| {
        match (present(a.get(&sort.column)), present(b.get(&sort.column))) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(left), Some(right)) => {
                let ord = compare_cells(left, right);
                match sort.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            }
        }
    });
    out
}

/// Bounds of one page over `total` items. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
    pub start: usize,
    pub end: usize,
}

impl PageWindow {
    /// Out-of-range page numbers are clamped to the first or last page.
    pub fn new(total: usize, page: usize, page_size: usize) -> Result<Self, ViewError> {
        if page_size == 0 {
            return Err(ViewError::ZeroPageSize);
        }

        let total_pages = total.div_ceil(page_size).max(1);
        let page = page.clamp(1, total_pages);
        let start = ((page - 1) * page_size).min(total);
        let end = (start + page_size).min(total);

        Ok(Self {
            page,
            page_size,
            total,
            total_pages,
            start,
            end,
        })
    }

    #[must_use]
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let end = self.end.min(items.len());
        let start = self.start.min(end);
        &items[start..end]
    }

    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Presentation settings for one table view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default)]
    pub display_names: DisplayNames,
    #[serde(default)]
    pub hidden_columns: ColumnVisibility,
    #[serde(default)]
    pub visible_columns: Option<Vec<String>>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub sort: Option<SortConfig>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            display_names: DisplayNames::default(),
            hidden_columns: ColumnVisibility::default(),
            visible_columns: None,
            page_size: DEFAULT_PAGE_SIZE,
            sort: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub window: PageWindow,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl ViewConfig {
    pub fn from_json_str(input: &str) -> Result<Self, ViewError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ViewError> {
        if self.page_size == 0 {
            return Err(ViewError::ZeroPageSize);
        }
        Ok(())
    }

    /// Columns to show or export: the configured selection (or every
    /// column) minus anything the role may not see.
    #[must_use]
    pub fn resolve_columns(&self, all_columns: &[String]) -> Vec<String> {
        let selected = self.visible_columns.as_deref().unwrap_or(all_columns);
        self.hidden_columns.export_columns(selected)
    }

    /// Sorts according to the config and cuts out one page.
    pub fn page(
        &self,
        rows: &[Row],
        all_columns: &[String],
        page: usize,
    ) -> Result<PageView, ViewError> {
        let sorted = match &self.sort {
            Some(sort) => {
                if !all_columns.is_empty() && !all_columns.contains(&sort.column) {
                    return Err(ViewError::UnknownSortColumn(sort.column.clone()));
                }
                sort_rows(rows, sort)
            }
            None => rows.to_vec(),
        };

        let window = PageWindow::new(sorted.len(), page, self.page_size)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            page = window.page,
            total_pages = window.total_pages,
            rows = sorted.len(),
            "paged table view"
        );

        Ok(PageView {
            window,
            columns: self.resolve_columns(all_columns),
            rows: window.slice(&sorted).to_vec(),
        })
    }
}

#![forbid(unsafe_code)]

//! Ordered filter chains over tabular rows.
//!
//! A [`FilterChain`] is a list of column/operator/value predicates, each one
//! joined to everything before it by its own AND or OR. Chains fold strictly
//! left to right: `a OR b AND c` keeps a row when `(a OR b) AND c`. Edits
//! (append, remove, reorder, connector toggles) return new chains, and
//! [`evaluate`] returns the matching rows without touching its input.
//!
//! ```
//! use filterchain::{FilterChain, Predicate, Row, evaluate};
//!
//! let rows = vec![
//!     Row::new().with("name", "Acme").with("revenue", 120_i64),
//!     Row::new().with("name", "Beta").with("revenue", 40_i64),
//! ];
//! let chain = FilterChain::new()
//!     .append(Predicate::new("name", "contains", "ac"))
//!     .append(Predicate::new("revenue", "less-than", "50"))
//!     .toggle_connector(1);
//!
//! assert_eq!(evaluate(&rows, &chain).len(), 2);
//! ```

pub use fc_chain::{Connector, FilterChain, FilterEntry, LogicMode, Operator, Predicate};
pub use fc_eval::{
    TableQuery, evaluate, evaluate_indices, evaluate_mask, matches, matches_chain,
    row_matches_search, search,
};
pub use fc_io::{
    IoError, Table, read_chain_json, read_csv_str, read_json_str, read_json_tables, read_path,
    write_csv_string,
};
pub use fc_types::{Row, Scalar, parse_number};
pub use fc_view::{
    ColumnVisibility, DEFAULT_PAGE_SIZE, DisplayNames, PageView, PageWindow, SortConfig,
    SortDirection, ViewConfig, ViewError, columns_of, sort_rows, toggle_column,
};

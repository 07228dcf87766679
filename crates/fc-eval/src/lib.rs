#![forbid(unsafe_code)]

use fc_chain::{Connector, FilterChain, Operator, Predicate};
use fc_types::{Row, parse_number};
use serde::{Deserialize, Serialize};

/// Predicate with its comparison operand lower-cased and parsed once, so a
/// chain can be folded over many rows without redoing that work per row.
#[derive(Debug)]
struct PreparedPredicate<'a> {
    column: &'a str,
    operator: &'a Operator,
    needle: String,
    needle_number: f64,
}

impl<'a> PreparedPredicate<'a> {
    fn new(predicate: &'a Predicate) -> Self {
        let needle = predicate.value.to_lowercase();
        let needle_number = parse_number(&needle);
        Self {
            column: &predicate.column,
            operator: &predicate.operator,
            needle,
            needle_number,
        }
    }

    fn matches(&self, row: &Row) -> bool {
        let cell = row.text(self.column).to_lowercase();
        match self.operator {
            Operator::Equals => cell == self.needle,
            Operator::NotEquals => cell != self.needle,
            Operator::Contains => cell.contains(self.needle.as_str()),
            // NaN on either side makes both orderings false.
            Operator::GreaterThan => parse_number(&cell) > self.needle_number,
            Operator::LessThan => parse_number(&cell) < self.needle_number,
            Operator::Other(_raw) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(operator = %_raw, column = self.column, "unknown operator passes row");
                true
            }
        }
    }
}

#[derive(Debug)]
struct PreparedChain<'a> {
    steps: Vec<(Connector, PreparedPredicate<'a>)>,
}

impl<'a> PreparedChain<'a> {
    fn new(chain: &'a FilterChain) -> Self {
        let steps = chain
            .iter()
            .map(|entry| {
                (
                    entry.effective_connector(),
                    PreparedPredicate::new(&entry.predicate),
                )
            })
            .collect();
        Self { steps }
    }

    fn matches(&self, row: &Row) -> bool {
        let Some(((_, head), rest)) = self.steps.split_first() else {
            return true;
        };

        // The head connector is never consulted.
        let mut result = head.matches(row);
        for (connector, predicate) in rest {
            let current = predicate.matches(row);
            result = connector.combine(result, current);
        }
        result
    }
}

/// Tests one row against one predicate.
///
/// Missing cells read as empty text. `equals`, `not-equals` and `contains`
/// compare lower-cased text; `greater-than` and `less-than` compare the
/// permissively parsed numbers and are false when either side is not
/// numeric. Unknown operators always match.
#[must_use]
pub fn matches(row: &Row, predicate: &Predicate) -> bool {
    PreparedPredicate::new(predicate).matches(row)
}

/// Folds the whole chain over one row, strictly left to right with no
/// precedence between AND and OR. An empty chain matches everything.
#[must_use]
pub fn matches_chain(row: &Row, chain: &FilterChain) -> bool {
    PreparedChain::new(chain).matches(row)
}

/// Rows that satisfy `chain`, in their original order. The input slice is
/// left untouched.
#[must_use]
pub fn evaluate(rows: &[Row], chain: &FilterChain) -> Vec<Row> {
    if chain.is_empty() {
        return rows.to_vec();
    }

    let prepared = PreparedChain::new(chain);
    let out: Vec<Row> = rows
        .iter()
        .filter(|row| prepared.matches(row))
        .cloned()
        .collect();

    #[cfg(feature = "tracing")]
    tracing::debug!(
        rows_in = rows.len(),
        rows_out = out.len(),
        chain_len = chain.len(),
        "evaluated filter chain"
    );

    out
}

/// One flag per input row.
#[must_use]
pub fn evaluate_mask(rows: &[Row], chain: &FilterChain) -> Vec<bool> {
    let prepared = PreparedChain::new(chain);
    rows.iter().map(|row| prepared.matches(row)).collect()
}

/// Positions of the rows that satisfy `chain`.
#[must_use]
pub fn evaluate_indices(rows: &[Row], chain: &FilterChain) -> Vec<usize> {
    let prepared = PreparedChain::new(chain);
    rows.iter()
        .enumerate()
        .filter_map(|(idx, row)| prepared.matches(row).then_some(idx))
        .collect()
}

/// True when any cell's text contains `term`, ignoring case. A blank term
/// matches every row.
#[must_use]
pub fn row_matches_search(row: &Row, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    let needle = term.to_lowercase();
    row_contains_lowered(row, &needle)
}

fn row_contains_lowered(row: &Row, needle: &str) -> bool {
    row.values()
        .any(|value| value.to_text().to_lowercase().contains(needle))
}

/// Free-text pre-filter across every column.
#[must_use]
pub fn search(rows: &[Row], term: &str) -> Vec<Row> {
    if term.is_empty() {
        return rows.to_vec();
    }
    let needle = term.to_lowercase();
    rows.iter()
        .filter(|row| row_contains_lowered(row, &needle))
        .cloned()
        .collect()
}

/// What a table view asks for: a search term applied first, then a chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub chain: FilterChain,
}

impl TableQuery {
    #[must_use]
    pub fn new(search: impl Into<String>, chain: FilterChain) -> Self {
        Self {
            search: search.into(),
            chain,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.search.is_empty() && self.chain.is_empty()
    }

    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        row_matches_search(row, &self.search) && matches_chain(row, &self.chain)
    }

    #[must_use]
    pub fn apply(&self, rows: &[Row]) -> Vec<Row> {
        let searched = search(rows, &self.search);
        evaluate(&searched, &self.chain)
    }
}

#[cfg(test)]
mod tests {
    use fc_chain::{Connector, FilterChain, FilterEntry, Operator, Predicate};
    use fc_types::{Row, Scalar};
    use proptest::prelude::*;

    use super::{
        TableQuery, evaluate, evaluate_indices, evaluate_mask, matches, matches_chain, search,
    };

    fn flags(a: i64, b: i64, c: i64) -> Row {
        Row::new().with("a", a).with("b", b).with("c", c)
    }

    fn is_one(column: &str) -> Predicate {
        Predicate::new(column, Operator::Equals, "1")
    }

    #[test]
    fn equals_ignores_case() {
        let row = Row::new().with("name", "Foo");
        assert!(matches(&row, &Predicate::new("name", "equals", "foo")));
        assert!(matches(&row, &Predicate::new("name", "equals", "FOO")));
        assert!(!matches(&row, &Predicate::new("name", "equals", "fo")));
    }

    #[test]
    fn not_equals_and_contains_ignore_case() {
        let row = Row::new().with("domain", "Example.COM");
        assert!(matches(&row, &Predicate::new("domain", "contains", "example.c")));
        assert!(!matches(&row, &Predicate::new("domain", "contains", "org")));
        assert!(matches(&row, &Predicate::new("domain", "not-equals", "example.org")));
        assert!(!matches(&row, &Predicate::new("domain", "not-equals", "example.com")));
    }

    #[test]
    fn missing_column_reads_as_empty_text() {
        let row = Row::new().with("name", "Foo");
        assert!(matches(&row, &Predicate::new("absent", "equals", "")));
        assert!(matches(&row, &Predicate::new("absent", "contains", "")));
        assert!(!matches(&row, &Predicate::new("absent", "equals", "foo")));

        let null_row = Row::new().with("name", Scalar::Null);
        assert!(matches(&null_row, &Predicate::new("name", "equals", "")));
    }

    #[test]
    fn numeric_comparisons_coerce_both_sides() {
        let row = Row::new().with("count", "12").with("ratio", 0.5);
        assert!(matches(&row, &Predicate::new("count", "greater-than", "5")));
        assert!(!matches(&row, &Predicate::new("count", "less-than", "5")));
        assert!(matches(&row, &Predicate::new("ratio", "less-than", "1")));
        // lexical comparison would say "12" < "5"
        assert!(!matches(&row, &Predicate::new("count", "less-than", "5")));
    }

    #[test]
    fn non_numeric_operand_never_satisfies_ordering() {
        let row = Row::new().with("value", "abc");
        assert!(!matches(&row, &Predicate::new("value", "greater-than", "5")));
        assert!(!matches(&row, &Predicate::new("value", "less-than", "5")));

        let row = Row::new().with("value", 10_i64);
        assert!(!matches(&row, &Predicate::new("value", "greater-than", "five")));
        assert!(!matches(&row, &Predicate::new("value", "less-than", "five")));
    }

    #[test]
    fn blank_cell_compares_as_zero() {
        let row = Row::new();
        assert!(matches(&row, &Predicate::new("amount", "less-than", "5")));
        assert!(!matches(&row, &Predicate::new("amount", "greater-than", "0")));
    }

    #[test]
    fn unknown_operator_passes_every_row() {
        let rows = vec![
            Row::new().with("name", "a"),
            Row::new().with("other", 3_i64),
            Row::new(),
        ];
        let chain = FilterChain::new().append(Predicate::new("name", "bogus", "x"));
        assert_eq!(evaluate(&rows, &chain), rows);
    }

    #[test]
    fn empty_chain_is_identity() {
        let rows = vec![flags(1, 0, 0), flags(0, 1, 0), flags(0, 0, 1)];
        assert_eq!(evaluate(&rows, &FilterChain::new()), rows);
        assert_eq!(evaluate_mask(&rows, &FilterChain::new()), vec![true; 3]);
        assert!(matches_chain(&Row::new(), &FilterChain::new()));
    }

    #[test]
    fn chain_folds_left_to_right_without_precedence() {
        // a OR b AND c  ==  (a OR b) AND c
        let rows = vec![
            flags(1, 0, 0),
            flags(0, 1, 1),
            flags(1, 1, 1),
            flags(0, 0, 1),
        ];
        let chain = FilterChain::new()
            .append(is_one("a"))
            .append(is_one("b"))
            .append(is_one("c"))
            .toggle_connector(1);
        assert_eq!(chain.get(1).map(|e| e.connector), Some(Some(Connector::Or)));

        let left_to_right: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                let (a, b, c) = (
                    row.text("a") == "1",
                    row.text("b") == "1",
                    row.text("c") == "1",
                );
                (a || b) && c
            })
            .map(|(idx, _)| idx)
            .collect();
        let conventional: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                let (a, b, c) = (
                    row.text("a") == "1",
                    row.text("b") == "1",
                    row.text("c") == "1",
                );
                a || (b && c)
            })
            .map(|(idx, _)| idx)
            .collect();

        assert_eq!(left_to_right, vec![1, 2]);
        assert_eq!(conventional, vec![0, 1, 2]);
        assert_eq!(evaluate_indices(&rows, &chain), left_to_right);
        assert_eq!(evaluate(&rows, &chain), vec![rows[1].clone(), rows[2].clone()]);
    }

    #[test]
    fn head_connector_is_ignored() {
        let rows = vec![flags(0, 1, 0), flags(1, 1, 0)];
        let chain = FilterChain::from_entries(vec![
            FilterEntry::new(is_one("a"), Some(Connector::Or)),
            FilterEntry::new(is_one("b"), None),
        ]);
        // OR on the head would let the first row through; absent reads as AND.
        assert_eq!(evaluate_mask(&rows, &chain), vec![false, true]);
    }

    #[test]
    fn evaluation_is_repeatable() {
        let rows = vec![flags(1, 0, 1), flags(0, 1, 0), flags(1, 1, 0)];
        let chain = FilterChain::new()
            .append(is_one("a"))
            .append(is_one("b"))
            .toggle_connector(1);
        let first = evaluate(&rows, &chain);
        let second = evaluate(&rows, &chain);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn search_matches_any_column_ignoring_case() {
        let rows = vec![
            Row::new().with("name", "Alpha").with("code", 101_i64),
            Row::new().with("name", "beta").with("code", 202_i64),
            Row::new().with("name", Scalar::Null),
        ];
        assert_eq!(search(&rows, "ALP"), vec![rows[0].clone()]);
        assert_eq!(search(&rows, "02"), vec![rows[1].clone()]);
        assert_eq!(search(&rows, ""), rows);
        assert!(search(&rows, "null").is_empty());
    }

    #[test]
    fn table_query_applies_search_before_chain() {
        let rows = vec![
            Row::new().with("name", "alpha").with("tier", "gold"),
            Row::new().with("name", "beta").with("tier", "gold"),
            Row::new().with("name", "gamma").with("tier", "silver"),
        ];
        let chain = FilterChain::new().append(Predicate::new("tier", "equals", "gold"));
        let query = TableQuery::new("ta", chain);
        assert_eq!(query.apply(&rows), vec![rows[1].clone()]);
        assert!(query.matches(&rows[1]));
        assert!(!query.matches(&rows[0]));
        assert!(TableQuery::default().is_empty());
    }

    #[test]
    fn table_query_deserializes_with_defaults() {
        let query: TableQuery =
            serde_json::from_str(r#"{"chain":[{"column":"a","operator":"equals","value":"1"}]}"#)
                .expect("query json");
        assert_eq!(query.search, "");
        assert_eq!(query.chain.len(), 1);
    }

    fn row_strategy() -> impl Strategy<Value = Row> {
        (0_i64..4, 0_i64..4, prop::option::of(0_i64..4)).prop_map(|(a, b, c)| {
            Row::new().with("a", a).with("b", b.to_string()).with("c", c)
        })
    }

    fn predicate_strategy() -> impl Strategy<Value = Predicate> {
        (
            prop::sample::select(vec!["a", "b", "c", "missing"]),
            prop::sample::select(vec![
                "equals",
                "not-equals",
                "contains",
                "greater-than",
                "less-than",
                "bogus",
            ]),
            prop::sample::select(vec!["0", "1", "2", "3", "", "x"]),
        )
            .prop_map(|(column, op, value)| Predicate::new(column, op, value))
    }

    fn chain_strategy() -> impl Strategy<Value = FilterChain> {
        prop::collection::vec(
            (predicate_strategy(), prop::option::of(any::<bool>())),
            0..6,
        )
        .prop_map(|steps| {
            FilterChain::from_entries(
                steps
                    .into_iter()
                    .map(|(predicate, connector)| {
                        let connector =
                            connector.map(|or| if or { Connector::Or } else { Connector::And });
                        FilterEntry::new(predicate, connector)
                    })
                    .collect(),
            )
        })
    }

    proptest! {
        #[test]
        fn global_and_mode_is_all(
            rows in prop::collection::vec(row_strategy(), 0..12),
            predicates in prop::collection::vec(predicate_strategy(), 1..5),
        ) {
            let chain = FilterChain::with_logic(predicates.clone(), Connector::And);
            let expected: Vec<bool> = rows
                .iter()
                .map(|row| predicates.iter().all(|p| matches(row, p)))
                .collect();
            prop_assert_eq!(evaluate_mask(&rows, &chain), expected);
        }

        #[test]
        fn global_or_mode_is_any(
            rows in prop::collection::vec(row_strategy(), 0..12),
            predicates in prop::collection::vec(predicate_strategy(), 1..5),
        ) {
            let chain = FilterChain::with_logic(predicates.clone(), Connector::Or);
            let expected: Vec<bool> = rows
                .iter()
                .map(|row| predicates.iter().any(|p| matches(row, p)))
                .collect();
            prop_assert_eq!(evaluate_mask(&rows, &chain), expected);
        }

        #[test]
        fn normalizing_never_changes_results(
            rows in prop::collection::vec(row_strategy(), 0..12),
            chain in chain_strategy(),
        ) {
            prop_assert_eq!(
                evaluate_mask(&rows, &chain),
                evaluate_mask(&rows, &chain.normalized())
            );
        }

        #[test]
        fn evaluate_agrees_with_mask_and_preserves_order(
            rows in prop::collection::vec(row_strategy(), 0..12),
            chain in chain_strategy(),
        ) {
            let mask = evaluate_mask(&rows, &chain);
            let expected: Vec<Row> = rows
                .iter()
                .zip(&mask)
                .filter(|(_, keep)| **keep)
                .map(|(row, _)| row.clone())
                .collect();
            prop_assert_eq!(evaluate(&rows, &chain), expected);
        }
    }
}

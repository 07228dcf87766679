#![forbid(unsafe_code)]

use std::{convert::Infallible, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Comparison applied by a single predicate.
///
/// Operators outside the known vocabulary are kept verbatim in
/// [`Operator::Other`]; they match every row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    Other(String),
}

impl Operator {
    pub const VOCABULARY: [Operator; 5] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::Contains,
        Operator::GreaterThan,
        Operator::LessThan,
    ];

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not-equals",
            Self::Contains => "contains",
            Self::GreaterThan => "greater-than",
            Self::LessThan => "less-than",
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Human label for pickers and chips.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Equals => "Equals",
            Self::NotEquals => "Not equals",
            Self::Contains => "Contains",
            Self::GreaterThan => "Greater than",
            Self::LessThan => "Less than",
            Self::Other(raw) => raw.as_str(),
        }
    }

    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<String> for Operator {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "equals" => Self::Equals,
            "not-equals" => Self::NotEquals,
            "contains" => Self::Contains,
            "greater-than" => Self::GreaterThan,
            "less-than" => Self::LessThan,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for Operator {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_owned())
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        match op {
            Operator::Other(raw) => raw,
            known => known.as_str().to_owned(),
        }
    }
}

impl FromStr for Operator {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Links a predicate to the accumulated result of everything before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Connector {
    #[default]
    And,
    Or,
}

impl Connector {
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::And => Self::Or,
            Self::Or => Self::And,
        }
    }

    #[must_use]
    pub fn combine(self, acc: bool, current: bool) -> bool {
        match self {
            Self::And => acc && current,
            Self::Or => acc || current,
        }
    }
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::And => "AND",
            Self::Or => "OR",
        })
    }
}

/// A single connector applied between every pair of predicates.
pub type LogicMode = Connector;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Predicate {
    pub column: String,
    pub operator: Operator,
    pub value: String,
}

impl Predicate {
    pub fn new(
        column: impl Into<String>,
        operator: impl Into<Operator>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {:?}", self.column, self.operator, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterEntry {
    #[serde(flatten)]
    pub predicate: Predicate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector: Option<Connector>,
}

impl FilterEntry {
    #[must_use]
    pub fn new(predicate: Predicate, connector: Option<Connector>) -> Self {
        Self {
            predicate,
            connector,
        }
    }

    /// Connector as the evaluator reads it: absent means AND.
    #[must_use]
    pub fn effective_connector(&self) -> Connector {
        self.connector.unwrap_or_default()
    }
}

/// Ordered predicates folded left to right.
///
/// The entry at position 0 carries no connector; every later entry carries
/// one (absent reads as AND). Every edit returns a new chain and leaves
/// `self` untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterChain {
    entries: Vec<FilterEntry>,
}

impl FilterChain {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Wraps entries exactly as given. See [`FilterChain::normalized`] for
    /// input that may not respect the connector placement.
    #[must_use]
    pub fn from_entries(entries: Vec<FilterEntry>) -> Self {
        Self { entries }
    }

    /// Builds a chain where every predicate is joined by the same connector.
    #[must_use]
    pub fn with_logic(predicates: impl IntoIterator<Item = Predicate>, logic: LogicMode) -> Self {
        let entries = predicates
            .into_iter()
            .enumerate()
            .map(|(idx, predicate)| FilterEntry::new(predicate, (idx > 0).then_some(logic)))
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[FilterEntry] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&FilterEntry> {
        self.entries.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FilterEntry> {
        self.entries.iter()
    }

    /// The connector shared by every joined entry, if the chain uses one.
    /// Chains with fewer than two entries have nothing to join.
    #[must_use]
    pub fn uniform_logic(&self) -> Option<LogicMode> {
        let mut joined = self.entries.iter().skip(1).map(FilterEntry::effective_connector);
        let first = joined.next()?;
        joined.all(|connector| connector == first).then_some(first)
    }

    #[must_use]
    pub fn append(&self, predicate: Predicate) -> Self {
        let connector = (!self.entries.is_empty()).then_some(Connector::And);
        let mut entries = self.entries.clone();
        entries.push(FilterEntry::new(predicate, connector));
        Self { entries }
    }

    #[must_use]
    pub fn remove_at(&self, index: usize) -> Self {
        if index >= self.entries.len() {
            return self.clone();
        }

        let mut entries = self.entries.clone();
        entries.remove(index);
        if index == 0 {
            if let Some(head) = entries.first_mut() {
                head.connector = None;
            }
        }
        Self { entries }
    }

    #[must_use]
    pub fn toggle_connector(&self, index: usize) -> Self {
        match self.entries.get(index) {
            Some(entry) if index > 0 => {
                self.set_connector(index, entry.effective_connector().flipped())
            }
            _ => self.clone(),
        }
    }

    #[must_use]
    pub fn set_connector(&self, index: usize, connector: Connector) -> Self {
        if index == 0 || index >= self.entries.len() {
            return self.clone();
        }

        let mut entries = self.entries.clone();
        entries[index].connector = Some(connector);
        Self { entries }
    }

    /// Moves the entry at `from` so it ends up at `to`, then restores the
    /// connector placement for the new head.
    #[must_use]
    pub fn move_entry(&self, from: usize, to: usize) -> Self {
        let len = self.entries.len();
        if from >= len || to >= len || from == to {
            return self.clone();
        }

        let mut entries = self.entries.clone();
        let entry = entries.remove(from);
        entries.insert(to, entry);
        Self { entries }.normalized()
    }

    #[must_use]
    pub fn clear(&self) -> Self {
        Self::new()
    }

    /// Strips the head connector and spells out every implicit AND.
    /// Evaluation results are unchanged.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let entries = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                let connector = (idx > 0).then(|| entry.effective_connector());
                FilterEntry::new(entry.predicate.clone(), connector)
            })
            .collect();
        Self { entries }
    }
}

impl<'a> IntoIterator for &'a FilterChain {
    type Item = &'a FilterEntry;
    type IntoIter = std::slice::Iter<'a, FilterEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<Predicate> for FilterChain {
    fn from_iter<I: IntoIterator<Item = Predicate>>(iter: I) -> Self {
        Self::with_logic(iter, Connector::And)
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return f.write_str("<all rows>");
        }
        for (idx, entry) in self.entries.iter().enumerate() {
            if idx > 0 {
                write!(f, " {} ", entry.effective_connector())?;
            }
            write!(f, "{}", entry.predicate)?;
        }
        Ok(())
    }
}

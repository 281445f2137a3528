// src/selection/mod.rs
//! Caller-owned selection state: which value columns to sum and which rows to keep.

use serde::{Deserialize, Serialize};

use crate::aggregate::{year_columns, TieBreak};
use crate::dataset::{utils::eq_ignore_case, Dataset};

/// Constraint value meaning "no constraint on this field".
pub const ALL: &str = "all";

/// Placeholder total row in the province dataset that double-counts if summed.
pub const NOT_STATED_TOTAL: &str = "Province/territory not stated Total";

pub fn is_all(value: &str) -> bool {
    eq_ignore_case(value, ALL)
}

/// `field == value`, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEquals {
    pub field: String,
    pub value: String,
}

/// `field ∈ values` (allow) or `field ∉ values` (deny), compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSet {
    pub field: String,
    pub values: Vec<String>,
}

impl FieldSet {
    pub fn new<S: Into<String>>(field: &str, values: impl IntoIterator<Item = S>) -> Self {
        Self {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, cell: &str) -> bool {
        self.values.iter().any(|v| eq_ignore_case(v, cell))
    }
}

/// Conjunction of row constraints used by `filter_rows`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PredicateSpec {
    pub equals: Vec<FieldEquals>,
    pub allow: Vec<FieldSet>,
    pub deny: Vec<FieldSet>,
}

impl PredicateSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_equals(mut self, field: &str, value: &str) -> Self {
        self.equals.push(FieldEquals {
            field: field.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn with_allow<S: Into<String>>(
        mut self,
        field: &str,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        self.allow.push(FieldSet::new(field, values));
        self
    }

    pub fn with_deny<S: Into<String>>(
        mut self,
        field: &str,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        self.deny.push(FieldSet::new(field, values));
        self
    }

    /// Every constraint of `self` and `other`.
    pub fn union(&self, other: &PredicateSpec) -> PredicateSpec {
        let mut out = self.clone();
        out.equals.extend(other.equals.iter().cloned());
        out.allow.extend(other.allow.iter().cloned());
        out.deny.extend(other.deny.iter().cloned());
        out
    }

    pub fn is_empty(&self) -> bool {
        self.equals.is_empty() && self.allow.is_empty() && self.deny.is_empty()
    }
}

/// One view's selection, as a UI would hold it between user inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct SelectionSpec {
    /// A single value column, or `all`.
    pub year: Option<String>,
    /// Columns summed for "all years"; every numeric-named column when unset.
    pub year_keys: Option<Vec<String>>,
    pub filter_field: Option<String>,
    pub filter_value: Option<String>,
    pub filters: Vec<FieldEquals>,
    pub allow: Vec<FieldSet>,
    /// Category values dropped before summing.
    pub exclude: Vec<String>,
    pub group_field: Option<String>,
    pub top_k: Option<usize>,
    pub tie_break: TieBreak,
}

impl SelectionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_year(mut self, year: &str) -> Self {
        self.year = Some(year.to_string());
        self
    }

    pub fn with_year_keys<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.year_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_filter(mut self, field: &str, value: &str) -> Self {
        self.filters.push(FieldEquals {
            field: field.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn with_allow<S: Into<String>>(
        mut self,
        field: &str,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        self.allow.push(FieldSet::new(field, values));
        self
    }

    pub fn with_exclude<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.exclude.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_group_field(mut self, field: &str) -> Self {
        self.group_field = Some(field.to_string());
        self
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    /// Row constraints implied by this selection. `filterField`/`filterValue`
    /// only apply when both are set.
    pub fn predicate(&self) -> PredicateSpec {
        let mut spec = PredicateSpec::new();
        if let (Some(field), Some(value)) = (&self.filter_field, &self.filter_value) {
            spec = spec.with_equals(field, value);
        }
        spec.equals.extend(self.filters.iter().cloned());
        spec.allow.extend(self.allow.iter().cloned());
        spec
    }

    /// Columns to sum for this selection against `dataset`.
    pub fn value_fields(&self, dataset: &Dataset) -> Vec<String> {
        match &self.year {
            Some(year) if !is_all(year) => vec![year.trim().to_string()],
            _ => self
                .year_keys
                .clone()
                .unwrap_or_else(|| year_columns(dataset)),
        }
    }
}

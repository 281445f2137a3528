// src/view/mod.rs
//! One chart's data request. The caller owns the [`View`] (and its
//! [`SelectionSpec`]), updates it on user input, then calls [`run`] for a
//! fresh [`AggregationResult`].

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::aggregate::{
    bucket_by_thresholds, category_records, category_series, filter_rows, rank::sort_ranked,
    select_relationship, sum_by_category, sum_fields, sum_grouped, top_n, AggregationResult,
    Rank, TieBreak,
};
use crate::dataset::Dataset;
use crate::error::{AggregateError, Result};
use crate::selection::SelectionSpec;

/// Default number of sources kept by relationship views.
pub const RELATIONSHIP_TOP_K: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum View {
    /// Category → total (bar, pie).
    ByCategory {
        category_field: String,
        #[serde(default)]
        selection: SelectionSpec,
    },
    /// Group → category → total. The group column comes from `selection.groupField`.
    Grouped {
        category_field: String,
        #[serde(default)]
        selection: SelectionSpec,
    },
    /// Grouped totals as a named tree (treemap).
    Hierarchy {
        category_field: String,
        root: String,
        #[serde(default)]
        selection: SelectionSpec,
    },
    /// One entry per row (bubble).
    Records {
        category_field: String,
        #[serde(default)]
        subcategory_field: Option<String>,
        #[serde(default)]
        selection: SelectionSpec,
    },
    /// Source → fixed target flows (chord). `topK` defaults to 5.
    Relationship {
        source_field: String,
        target: String,
        #[serde(default)]
        allowed_sources: Option<Vec<String>>,
        #[serde(default)]
        selection: SelectionSpec,
    },
    /// Value field → total (donut by year). `category_field` is only needed
    /// for `selection.exclude` to have something to match against.
    FieldTotals {
        #[serde(default)]
        category_field: Option<String>,
        #[serde(default)]
        selection: SelectionSpec,
    },
    /// Per-category points across value fields (trend lines).
    Series {
        category_field: String,
        #[serde(default)]
        selection: SelectionSpec,
    },
    /// Category totals classified by thresholds (choropleth legend).
    Buckets {
        category_field: String,
        thresholds: Vec<f64>,
        #[serde(default)]
        selection: SelectionSpec,
    },
}

impl View {
    pub fn selection(&self) -> &SelectionSpec {
        match self {
            View::ByCategory { selection, .. }
            | View::Grouped { selection, .. }
            | View::Hierarchy { selection, .. }
            | View::Records { selection, .. }
            | View::Relationship { selection, .. }
            | View::FieldTotals { selection, .. }
            | View::Series { selection, .. }
            | View::Buckets { selection, .. } => selection,
        }
    }

    pub fn selection_mut(&mut self) -> &mut SelectionSpec {
        match self {
            View::ByCategory { selection, .. }
            | View::Grouped { selection, .. }
            | View::Hierarchy { selection, .. }
            | View::Records { selection, .. }
            | View::Relationship { selection, .. }
            | View::FieldTotals { selection, .. }
            | View::Series { selection, .. }
            | View::Buckets { selection, .. } => selection,
        }
    }

    /// Field that `selection.exclude` applies to, if the view has one.
    fn category_field(&self) -> Option<&str> {
        match self {
            View::ByCategory { category_field, .. }
            | View::Grouped { category_field, .. }
            | View::Hierarchy { category_field, .. }
            | View::Records { category_field, .. }
            | View::Series { category_field, .. }
            | View::Buckets { category_field, .. } => Some(category_field.as_str()),
            View::Relationship { source_field, .. } => Some(source_field.as_str()),
            View::FieldTotals { category_field, .. } => category_field.as_deref(),
        }
    }
}

fn group_field(selection: &SelectionSpec) -> Result<&str> {
    selection
        .group_field
        .as_deref()
        .ok_or_else(|| AggregateError::MissingSelection {
            setting: "groupField".to_string(),
        })
}

/// `topK` truncation when the selection sets one.
fn limit<R: Rank>(result: R, top_k: Option<usize>, tie: TieBreak) -> R {
    match top_k {
        Some(k) => top_n(&result, k, tie),
        None => result,
    }
}

/// Apply the view's selection to `dataset` and aggregate.
#[instrument(level = "debug", skip(dataset, view), fields(rows = dataset.len()))]
pub fn run(dataset: &Dataset, view: &View) -> Result<AggregationResult> {
    let selection = view.selection();

    let mut predicate = selection.predicate();
    if let Some(field) = view.category_field() {
        if !selection.exclude.is_empty() {
            predicate = predicate.with_deny(field, selection.exclude.iter().cloned());
        }
    }
    let rows = filter_rows(dataset, &predicate)?;
    let fields = selection.value_fields(dataset);
    let tie = selection.tie_break;
    debug!(value_fields = ?fields, kept = rows.len(), "selection applied");

    let top_k = selection.top_k;
    let result = match view {
        View::ByCategory { category_field, .. } => {
            let totals = sum_by_category(&rows, category_field, &fields, &selection.exclude)?;
            AggregationResult::Totals(limit(totals, top_k, tie))
        }
        View::Grouped { category_field, .. } => {
            let grouped = sum_grouped(&rows, group_field(selection)?, category_field, &fields)?;
            AggregationResult::Grouped(limit(grouped, top_k, tie))
        }
        View::Hierarchy {
            category_field,
            root,
            ..
        } => {
            let grouped = sum_grouped(&rows, group_field(selection)?, category_field, &fields)?;
            AggregationResult::Hierarchy(limit(grouped, top_k, tie).to_hierarchy(root))
        }
        View::Records {
            category_field,
            subcategory_field,
            ..
        } => {
            let mut entries =
                category_records(&rows, category_field, subcategory_field.as_deref(), &fields)?;
            // bubble layouts place the largest first
            sort_ranked(&mut entries, tie, |e| e.value, |e| e.category.as_str());
            AggregationResult::Entries(limit(entries, top_k, tie))
        }
        View::Relationship {
            source_field,
            target,
            allowed_sources,
            ..
        } => {
            let mut links = select_relationship(
                &rows,
                source_field,
                target,
                &fields,
                allowed_sources.as_deref(),
            )?;
            sort_ranked(&mut links, tie, |l| l.value, |l| l.source.as_str());
            let k = top_k.unwrap_or(RELATIONSHIP_TOP_K);
            AggregationResult::Links(top_n(&links, k, tie))
        }
        View::FieldTotals { .. } => {
            AggregationResult::Totals(limit(sum_fields(&rows, &fields)?, top_k, tie))
        }
        View::Series { category_field, .. } => {
            let series = category_series(&rows, category_field, &fields)?;
            AggregationResult::Series(limit(series, top_k, tie))
        }
        View::Buckets {
            category_field,
            thresholds,
            ..
        } => {
            if top_k.is_some() {
                return Err(AggregateError::UnsupportedSelection {
                    setting: "topK".to_string(),
                    view: "buckets".to_string(),
                });
            }
            let no_exclusions: &[&str] = &[];
            let totals = sum_by_category(&rows, category_field, &fields, no_exclusions)?;
            AggregationResult::Buckets(bucket_by_thresholds(&totals, thresholds))
        }
    };
    Ok(result)
}

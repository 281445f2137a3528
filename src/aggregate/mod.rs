// src/aggregate/mod.rs
//! Stateless aggregation over a [`Dataset`]: every function borrows the
//! dataset read-only and returns a freshly built result.
//!
//! Numeric cells are parsed on demand. A cell that is empty or does not parse
//! contributes zero and never fails the call; only a missing column does.

use tracing::{debug, warn};

use crate::dataset::{
    utils::{clean_str, eq_ignore_case, is_numeric_key},
    Dataset, Row,
};
use crate::error::Result;
use crate::selection::{is_all, PredicateSpec};

pub mod rank;
pub mod result;

pub use rank::{top_n, Rank, TieBreak};
pub use result::{
    AggregationResult, Buckets, Entry, GroupedTotals, Hierarchy, Link, Point, Series, Totals,
};

/// Counts non-empty cells that failed to parse during one call.
#[derive(Default)]
struct CellAudit {
    unparsed: usize,
}

impl CellAudit {
    fn value(&mut self, row: &Row<'_>, pos: usize) -> Option<f64> {
        let parsed = row.number_at(pos);
        if parsed.is_none() {
            let raw = row.at(pos);
            if !clean_str(raw).is_empty() {
                debug!(cell = raw, "non-numeric cell counted as zero");
                self.unparsed += 1;
            }
        }
        parsed
    }

    fn row_sum(&mut self, row: &Row<'_>, positions: &[usize]) -> f64 {
        positions
            .iter()
            .map(|&p| self.value(row, p).unwrap_or(0.0))
            .sum()
    }

    fn report(&self, op: &str) {
        if self.unparsed > 0 {
            warn!(op, cells = self.unparsed, "unparseable numeric cells counted as zero");
        }
    }
}

fn is_listed<S: AsRef<str>>(value: &str, list: &[S]) -> bool {
    list.iter().any(|v| eq_ignore_case(v.as_ref(), value))
}

/// Column keys that name numbers (e.g. `2015`), in schema order.
pub fn year_columns(dataset: &Dataset) -> Vec<String> {
    dataset
        .columns()
        .iter()
        .filter(|c| is_numeric_key(c))
        .cloned()
        .collect()
}

/// Sum `value_fields` per row into a total keyed by the row's `category_field`.
///
/// Rows whose category is in `exclude_values` are skipped before any parsing.
/// Keys keep first-seen order.
pub fn sum_by_category<V, E>(
    dataset: &Dataset,
    category_field: &str,
    value_fields: &[V],
    exclude_values: &[E],
) -> Result<Totals>
where
    V: AsRef<str>,
    E: AsRef<str>,
{
    let schema = dataset.schema();
    let cat = schema.require(category_field)?;
    let values = schema.require_all(value_fields)?;

    let mut audit = CellAudit::default();
    let mut totals = Totals::new();
    for row in dataset.rows() {
        let key = clean_str(row.at(cat));
        if is_listed(key, exclude_values) {
            continue;
        }
        let sum = audit.row_sum(&row, &values);
        totals.add(key, sum);
    }
    audit.report("sum_by_category");
    Ok(totals)
}

/// Two-level totals: rows grouped by `group_field`, then summed per `category_field`.
pub fn sum_grouped<V: AsRef<str>>(
    dataset: &Dataset,
    group_field: &str,
    category_field: &str,
    value_fields: &[V],
) -> Result<GroupedTotals> {
    let schema = dataset.schema();
    let group = schema.require(group_field)?;
    let cat = schema.require(category_field)?;
    let values = schema.require_all(value_fields)?;

    let mut audit = CellAudit::default();
    let mut grouped = GroupedTotals::new();
    for row in dataset.rows() {
        let sum = audit.row_sum(&row, &values);
        grouped
            .group_mut(clean_str(row.at(group)))
            .add(clean_str(row.at(cat)), sum);
    }
    audit.report("sum_grouped");
    Ok(grouped)
}

enum Constraint<'p> {
    Equals(&'p str),
    Allow(&'p [String]),
    Deny(&'p [String]),
}

/// Rows satisfying every constraint of `predicate`, in their original order.
///
/// Constraint values equal to `all` are ignored, as is an allow-list that
/// contains `all`.
pub fn filter_rows(dataset: &Dataset, predicate: &PredicateSpec) -> Result<Dataset> {
    let schema = dataset.schema();
    let mut active: Vec<(usize, Constraint<'_>)> = Vec::new();
    for eq in &predicate.equals {
        if is_all(&eq.value) {
            continue;
        }
        active.push((schema.require(&eq.field)?, Constraint::Equals(&eq.value)));
    }
    for set in &predicate.allow {
        if set.values.iter().any(|v| is_all(v)) {
            continue;
        }
        active.push((schema.require(&set.field)?, Constraint::Allow(&set.values)));
    }
    for set in &predicate.deny {
        active.push((schema.require(&set.field)?, Constraint::Deny(&set.values)));
    }

    let keep = dataset.rows().enumerate().filter_map(|(idx, row)| {
        let ok = active.iter().all(|(pos, c)| {
            let cell = row.at(*pos);
            match c {
                Constraint::Equals(v) => eq_ignore_case(cell, v),
                Constraint::Allow(vs) => is_listed(cell, *vs),
                Constraint::Deny(vs) => !is_listed(cell, *vs),
            }
        });
        ok.then_some(idx)
    });
    let kept: Vec<usize> = keep.collect();
    debug!(kept = kept.len(), of = dataset.len(), "filter_rows");
    Ok(dataset.select(kept))
}

/// Per-source totals paired with a fixed `target`, sorted by value descending
/// (ties keep first-seen order).
///
/// `allowed_sources` of `None` admits every source; an empty list admits none.
/// Truncation is left to the caller via [`top_n`].
pub fn select_relationship<V, A>(
    dataset: &Dataset,
    source_field: &str,
    target: &str,
    value_fields: &[V],
    allowed_sources: Option<&[A]>,
) -> Result<Vec<Link>>
where
    V: AsRef<str>,
    A: AsRef<str>,
{
    let schema = dataset.schema();
    let src = schema.require(source_field)?;
    let values = schema.require_all(value_fields)?;

    let mut audit = CellAudit::default();
    let mut sums = Totals::new();
    for row in dataset.rows() {
        let source = clean_str(row.at(src));
        if let Some(allowed) = allowed_sources {
            if !is_listed(source, allowed) {
                continue;
            }
        }
        let sum = audit.row_sum(&row, &values);
        sums.add(source, sum);
    }
    audit.report("select_relationship");

    let mut links: Vec<Link> = sums
        .iter()
        .map(|(source, value)| Link {
            source: source.to_string(),
            target: target.to_string(),
            value,
        })
        .collect();
    links.sort_by(|a, b| b.value.total_cmp(&a.value));
    Ok(links)
}

/// Total of each value field across all rows, keyed by field.
pub fn sum_fields<V: AsRef<str>>(dataset: &Dataset, value_fields: &[V]) -> Result<Totals> {
    let positions = dataset.schema().require_all(value_fields)?;

    let mut audit = CellAudit::default();
    let mut totals = Totals::new();
    for field in value_fields {
        totals.add(field.as_ref().trim(), 0.0);
    }
    for row in dataset.rows() {
        for (field, &pos) in value_fields.iter().zip(&positions) {
            let v = audit.value(&row, pos).unwrap_or(0.0);
            totals.add(field.as_ref().trim(), v);
        }
    }
    audit.report("sum_fields");
    Ok(totals)
}

/// One entry per row: its category, optional subcategory and the row's own sum.
pub fn category_records<V: AsRef<str>>(
    dataset: &Dataset,
    category_field: &str,
    subcategory_field: Option<&str>,
    value_fields: &[V],
) -> Result<Vec<Entry>> {
    let schema = dataset.schema();
    let cat = schema.require(category_field)?;
    let sub = subcategory_field.map(|f| schema.require(f)).transpose()?;
    let values = schema.require_all(value_fields)?;

    let mut audit = CellAudit::default();
    let entries: Vec<Entry> = dataset
        .rows()
        .map(|row| Entry {
            category: clean_str(row.at(cat)).to_string(),
            subcategory: sub.map(|p| clean_str(row.at(p)).to_string()),
            value: audit.row_sum(&row, &values),
        })
        .collect();
    audit.report("category_records");
    Ok(entries)
}

/// Per-category points across `value_fields`, merging rows of the same category.
pub fn category_series<V: AsRef<str>>(
    dataset: &Dataset,
    category_field: &str,
    value_fields: &[V],
) -> Result<Vec<Series>> {
    let schema = dataset.schema();
    let cat = schema.require(category_field)?;
    let values = schema.require_all(value_fields)?;

    let mut audit = CellAudit::default();
    let mut order = indexmap::IndexMap::<String, Vec<Option<f64>>>::new();
    for row in dataset.rows() {
        let slots = order
            .entry(clean_str(row.at(cat)).to_string())
            .or_insert_with(|| vec![None; values.len()]);
        for (slot, &pos) in slots.iter_mut().zip(&values) {
            if let Some(v) = audit.value(&row, pos) {
                *slot = Some(slot.unwrap_or(0.0) + v);
            }
        }
    }
    audit.report("category_series");

    Ok(order
        .into_iter()
        .map(|(category, slots)| {
            let points: Vec<Point> = value_fields
                .iter()
                .zip(slots)
                .map(|(field, value)| Point {
                    key: field.as_ref().trim().to_string(),
                    value,
                })
                .collect();
            let total = points.iter().filter_map(|p| p.value).sum();
            Series {
                category,
                points,
                total,
            }
        })
        .collect())
}

/// Classify totals against ascending `thresholds`: a value lands in the bucket
/// equal to the number of thresholds at or below it, so `thresholds.len() + 1`
/// buckets exist. Non-finite thresholds are ignored.
pub fn bucket_by_thresholds(totals: &Totals, thresholds: &[f64]) -> Buckets {
    let mut sorted: Vec<f64> = thresholds.iter().copied().filter(|t| t.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);

    let mut buckets = Buckets::with_buckets(sorted.len() + 1);
    for (category, value) in totals.iter() {
        let bucket = sorted.partition_point(|t| *t <= value);
        buckets.push(bucket, category);
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AggregateError;

    fn provinces() -> Dataset {
        Dataset::from_rows(vec![
            vec![("Province", "Ontario"), ("2015", "100"), ("2016", "150")],
            vec![("Province", "Quebec"), ("2015", "50"), ("2016", "60")],
        ])
        .unwrap()
    }

    const NOT_STATED: &str = "Province/territory not stated Total";

    fn level_row<'a>(cells: [&'a str; 5]) -> Vec<(&'a str, &'a str)> {
        ["study level", "Province", "Sex", "2015", "2016"]
            .into_iter()
            .zip(cells)
            .collect()
    }

    fn study_level_rows() -> Vec<[&'static str; 5]> {
        vec![
            ["College", "Ontario", "Male", "10", "20"],
            ["College", "Quebec", "Female", "5", ""],
            ["University", "Ontario", "Female", "40", "N/A"],
            ["College", "Ontario", "Another gender", "1", "2"],
            ["University", NOT_STATED, "Male", "999", "999"],
        ]
    }

    fn study_levels() -> Dataset {
        Dataset::from_rows(study_level_rows().into_iter().map(level_row)).unwrap()
    }

    fn pairs(t: &Totals) -> Vec<(&str, f64)> {
        t.iter().collect()
    }

    const NONE: &[&str] = &[];

    #[test]
    fn sum_by_category_example() {
        let totals = sum_by_category(&provinces(), "Province", &["2015", "2016"], NONE).unwrap();
        assert_eq!(pairs(&totals), vec![("Ontario", 250.0), ("Quebec", 110.0)]);
    }

    #[test]
    fn sum_by_category_missing_cell_is_zero() {
        let ds = Dataset::from_rows(vec![
            vec![("Province", "Ontario"), ("2015", "N/A"), ("2016", "7")],
        ])
        .unwrap();
        let totals = sum_by_category(&ds, "Province", &["2015", "2016"], NONE).unwrap();
        assert_eq!(totals.get("Ontario"), Some(7.0));
    }

    #[test]
    fn sum_by_category_missing_column() {
        let err = sum_by_category(&provinces(), "Year", &["2015"], NONE).unwrap_err();
        assert_eq!(err, AggregateError::InvalidColumn { column: "Year".into() });

        let err = sum_by_category(&provinces(), "Province", &["2015", "2030"], NONE).unwrap_err();
        assert_eq!(err, AggregateError::InvalidColumn { column: "2030".into() });
    }

    #[test]
    fn sum_by_category_excludes_sentinel_rows() {
        let ds = study_levels();
        let totals = sum_by_category(
            &ds,
            "Province",
            &["2015", "2016"],
            &["province/territory NOT STATED total"],
        )
        .unwrap();
        assert_eq!(pairs(&totals), vec![("Ontario", 73.0), ("Quebec", 5.0)]);
    }

    #[test]
    fn sum_by_category_total_matches_cells() {
        let ds = study_levels();
        let fields = ["2015", "2016"];
        let totals = sum_by_category(&ds, "Province", &fields, NONE).unwrap();
        let expected: f64 = ds
            .rows()
            .map(|r| fields.iter().map(|f| r.number(f).unwrap_or(0.0)).sum::<f64>())
            .sum();
        assert_eq!(totals.total(), expected);
    }

    #[test]
    fn sum_by_category_is_idempotent() {
        let ds = study_levels();
        let a = sum_by_category(&ds, "Province", &["2015", "2016"], NONE).unwrap();
        let b = sum_by_category(&ds, "Province", &["2015", "2016"], NONE).unwrap();
        let bits = |t: &Totals| {
            t.iter()
                .map(|(k, v)| (k.to_string(), v.to_bits()))
                .collect::<Vec<_>>()
        };
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn sum_by_category_ignores_row_order() {
        let fields = ["2015", "2016"];
        let forward = sum_by_category(&study_levels(), "Province", &fields, NONE).unwrap();

        let mut rows = study_level_rows();
        rows.reverse();
        let reversed = Dataset::from_rows(rows.into_iter().map(level_row)).unwrap();
        let backward = sum_by_category(&reversed, "Province", &fields, NONE).unwrap();

        let keys = |t: &Totals| t.iter().map(|(k, _)| k.to_string()).collect::<Vec<_>>();
        assert_eq!(keys(&forward), vec!["Ontario", "Quebec", NOT_STATED]);
        assert_eq!(keys(&backward), vec![NOT_STATED, "Ontario", "Quebec"]);
        for (key, value) in forward.iter() {
            assert_eq!(backward.get(key), Some(value));
        }
        assert_eq!(forward.len(), backward.len());
    }

    #[test]
    fn sum_by_category_without_fields_is_zero() {
        let totals = sum_by_category(&provinces(), "Province", NONE, NONE).unwrap();
        assert_eq!(pairs(&totals), vec![("Ontario", 0.0), ("Quebec", 0.0)]);
    }

    #[test]
    fn sum_grouped_matches_per_group_totals() {
        let ds = study_levels();
        let fields = ["2015", "2016"];
        let grouped = sum_grouped(&ds, "study level", "Province", &fields).unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(
            pairs(grouped.group("College").unwrap()),
            vec![("Ontario", 33.0), ("Quebec", 5.0)]
        );

        for (group, inner) in grouped.iter() {
            let only_group = PredicateSpec::new().with_equals("study level", group);
            let rows = filter_rows(&ds, &only_group).unwrap();
            let direct = sum_by_category(&rows, "Province", &fields, NONE).unwrap();
            assert_eq!(inner.total(), direct.total());
            assert_eq!(pairs(inner), pairs(&direct));
        }
    }

    #[test]
    fn filter_rows_equality_and_allow_list() {
        let ds = study_levels();
        let pred = PredicateSpec::new()
            .with_equals("Province", "ONTARIO")
            .with_allow("Sex", ["Male", "Female"]);
        let out = filter_rows(&ds, &pred).unwrap();
        let sexes: Vec<_> = out.rows().map(|r| r.get("Sex").unwrap()).collect();
        assert_eq!(sexes, vec!["Male", "Female"]);
    }

    #[test]
    fn filter_rows_all_is_no_constraint() {
        let ds = study_levels();
        let pred = PredicateSpec::new()
            .with_equals("Sex", "All")
            .with_allow("Province", ["all"]);
        assert_eq!(filter_rows(&ds, &pred).unwrap(), ds);
    }

    #[test]
    fn filter_rows_composes() {
        let ds = study_levels();
        let a = PredicateSpec::new().with_equals("study level", "college");
        let b = PredicateSpec::new()
            .with_equals("Province", "Ontario")
            .with_deny("Sex", ["Another gender"]);
        let twice = filter_rows(&filter_rows(&ds, &a).unwrap(), &b).unwrap();
        let once = filter_rows(&ds, &a.union(&b)).unwrap();
        assert_eq!(twice, once);
        assert_eq!(once.len(), 1);
    }

    #[test]
    fn filter_rows_missing_field() {
        let pred = PredicateSpec::new().with_equals("Gender", "Male");
        assert_eq!(
            filter_rows(&study_levels(), &pred).unwrap_err(),
            AggregateError::InvalidColumn { column: "Gender".into() }
        );
    }

    #[test]
    fn select_relationship_top_two() {
        let ds = Dataset::from_rows(vec![
            vec![("Country of Citizenship", "A"), ("2015", "100"), ("2016", "200")],
            vec![("Country of Citizenship", "B"), ("2015", "250"), ("2016", "250")],
            vec![("Country of Citizenship", "C"), ("2015", "200"), ("2016", "0")],
        ])
        .unwrap();
        let allowed = ["A", "B", "C"];
        let links = select_relationship(
            &ds,
            "Country of Citizenship",
            "Canada",
            &["2015", "2016"],
            Some(&allowed[..]),
        )
        .unwrap();
        let top = top_n(&links, 2, TieBreak::FirstSeen);
        let got: Vec<_> = top.iter().map(|l| (l.source.as_str(), l.value)).collect();
        assert_eq!(got, vec![("B", 500.0), ("A", 300.0)]);
        assert!(top.iter().all(|l| l.target == "Canada"));

        let none: &[&str] = &[];
        let source = "Country of Citizenship";
        let empty = select_relationship(&ds, source, "Canada", &["2015"], Some(none)).unwrap();
        assert!(empty.is_empty());

        let all = select_relationship(&ds, source, "Canada", &["2015"], None::<&[&str]>).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].source, "B");
    }

    #[test]
    fn year_columns_discovers_numeric_keys() {
        assert_eq!(year_columns(&study_levels()), vec!["2015", "2016"]);
    }

    #[test]
    fn sum_fields_per_year() {
        let totals = sum_fields(&provinces(), &["2015", "2016"]).unwrap();
        assert_eq!(pairs(&totals), vec![("2015", 150.0), ("2016", 210.0)]);
    }

    #[test]
    fn category_records_one_per_row() {
        let fields = ["2015", "2016"];
        let entries = category_records(&study_levels(), "Province", Some("Sex"), &fields).unwrap();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].category, "Ontario");
        assert_eq!(entries[0].subcategory.as_deref(), Some("Male"));
        assert_eq!(entries[0].value, 30.0);
        assert_eq!(entries[2].value, 40.0);
    }

    #[test]
    fn category_series_merges_and_flags_missing() {
        let ds = Dataset::from_rows(vec![
            vec![("Country", "India"), ("2015", "10"), ("2016", "")],
            vec![("Country", "Chile"), ("2015", "0"), ("2016", "")],
            vec![("Country", "India"), ("2015", "5"), ("2016", "")],
        ])
        .unwrap();
        let series = category_series(&ds, "Country", &["2015", "2016"]).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].category, "India");
        assert_eq!(series[0].points[0].value, Some(15.0));
        assert_eq!(series[0].points[1].value, None);
        assert_eq!(series[0].total, 15.0);
        assert!(series[0].has_data());
        assert!(!series[1].has_data());
    }

    #[test]
    fn bucket_by_thresholds_threshold_semantics() {
        let totals: Totals = vec![
            ("Chile".to_string(), 0.0),
            ("Peru".to_string(), 99.0),
            ("India".to_string(), 120_000.0),
            ("Nepal".to_string(), 100.0),
        ]
        .into_iter()
        .collect();
        let buckets = bucket_by_thresholds(&totals, &[0.0, 100.0, 1000.0, 100_000.0]);
        assert_eq!(buckets.len(), 5);
        assert!(buckets.get(0).unwrap().is_empty());
        assert_eq!(buckets.get(1).unwrap(), ["Chile", "Peru"]);
        assert_eq!(buckets.bucket_of("Nepal"), Some(2));
        assert_eq!(buckets.bucket_of("India"), Some(4));
    }
}

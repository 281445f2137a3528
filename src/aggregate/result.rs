// src/aggregate/result.rs
use indexmap::IndexMap;
use serde::Serialize;

/// Category → numeric total, in first-seen key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Totals(IndexMap<String, f64>);

impl Totals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` to `key`, inserting the key at the end if unseen.
    pub fn add(&mut self, key: &str, value: f64) {
        match self.0.get_mut(key) {
            Some(total) => *total += value,
            None => {
                self.0.insert(key.to_string(), value);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Sum across every key.
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }
}

impl FromIterator<(String, f64)> for Totals {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut totals = Totals::new();
        for (k, v) in iter {
            totals.add(&k, v);
        }
        totals
    }
}

/// Group → (category → total), both levels in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GroupedTotals(IndexMap<String, Totals>);

impl GroupedTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group_mut(&mut self, group: &str) -> &mut Totals {
        self.0.entry(group.to_string()).or_default()
    }

    pub fn group(&self, group: &str) -> Option<&Totals> {
        self.0.get(group)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Totals)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn total(&self) -> f64 {
        self.0.values().map(Totals::total).sum()
    }

    /// Root → group → category tree for treemap-style layouts. Every node's
    /// value is the sum of its children; children are ordered by value,
    /// descending, ties keeping first-seen order.
    pub fn to_hierarchy(&self, root: &str) -> Hierarchy {
        let children = self
            .0
            .iter()
            .map(|(group, totals)| {
                let leaves = totals
                    .iter()
                    .map(|(name, value)| Hierarchy::leaf(name, value))
                    .collect();
                Hierarchy::branch(group, leaves)
            })
            .collect();
        Hierarchy::branch(root, children)
    }
}

impl FromIterator<(String, Totals)> for GroupedTotals {
    fn from_iter<I: IntoIterator<Item = (String, Totals)>>(iter: I) -> Self {
        let mut grouped = GroupedTotals::new();
        for (group, totals) in iter {
            let slot = grouped.group_mut(&group);
            for (category, value) in totals.iter() {
                slot.add(category, value);
            }
        }
        grouped
    }
}

/// One record ready for direct chart binding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    pub value: f64,
}

/// A source → target flow with its weight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub source: String,
    pub target: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub key: String,
    /// `None` when every contributing cell was missing.
    pub value: Option<f64>,
}

/// Per-category values across the value fields, e.g. one line of a trend chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub category: String,
    pub points: Vec<Point>,
    pub total: f64,
}

impl Series {
    /// False when the series sums to zero ("data not available").
    pub fn has_data(&self) -> bool {
        self.total != 0.0
    }
}

/// Threshold bucket index → categories falling in it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Buckets(IndexMap<usize, Vec<String>>);

impl Buckets {
    pub(crate) fn with_buckets(count: usize) -> Self {
        Self((0..count).map(|b| (b, Vec::new())).collect())
    }

    pub(crate) fn push(&mut self, bucket: usize, category: &str) {
        self.0.entry(bucket).or_default().push(category.to_string());
    }

    pub fn get(&self, bucket: usize) -> Option<&[String]> {
        self.0.get(&bucket).map(Vec::as_slice)
    }

    /// Bucket holding `category`, if any.
    pub fn bucket_of(&self, category: &str) -> Option<usize> {
        self.0
            .iter()
            .find(|(_, cats)| cats.iter().any(|c| c == category))
            .map(|(b, _)| *b)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.0.iter().map(|(b, c)| (*b, c.as_slice()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hierarchy {
    pub name: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Hierarchy>,
}

impl Hierarchy {
    pub fn leaf(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
            children: Vec::new(),
        }
    }

    pub fn branch(name: &str, mut children: Vec<Hierarchy>) -> Self {
        children.sort_by(|a, b| b.value.total_cmp(&a.value));
        Self {
            name: name.to_string(),
            value: children.iter().map(|c| c.value).sum(),
            children,
        }
    }
}

/// The summarized shape handed to a rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", content = "data", rename_all = "snake_case")]
pub enum AggregationResult {
    Totals(Totals),
    Grouped(GroupedTotals),
    Entries(Vec<Entry>),
    Links(Vec<Link>),
    Series(Vec<Series>),
    Buckets(Buckets),
    Hierarchy(Hierarchy),
}

impl AggregationResult {
    /// Sum of every value carried by the result.
    pub fn total(&self) -> f64 {
        match self {
            AggregationResult::Totals(t) => t.total(),
            AggregationResult::Grouped(g) => g.total(),
            AggregationResult::Entries(e) => e.iter().map(|e| e.value).sum(),
            AggregationResult::Links(l) => l.iter().map(|l| l.value).sum(),
            AggregationResult::Series(s) => s.iter().map(|s| s.total).sum(),
            AggregationResult::Buckets(_) => 0.0,
            AggregationResult::Hierarchy(h) => h.value,
        }
    }

    /// Empty, or totalling zero: the rendering layer shows "data not available".
    pub fn is_blank(&self) -> bool {
        let empty = match self {
            AggregationResult::Totals(t) => t.is_empty(),
            AggregationResult::Grouped(g) => g.is_empty(),
            AggregationResult::Entries(e) => e.is_empty(),
            AggregationResult::Links(l) => l.is_empty(),
            AggregationResult::Series(s) => s.is_empty(),
            AggregationResult::Buckets(b) => b.iter().all(|(_, c)| c.is_empty()),
            AggregationResult::Hierarchy(h) => h.children.is_empty(),
        };
        empty || (!matches!(self, AggregationResult::Buckets(_)) && self.total() == 0.0)
    }
}

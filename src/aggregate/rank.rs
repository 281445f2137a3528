// src/aggregate/rank.rs
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::result::{Entry, GroupedTotals, Link, Series, Totals};

/// How equal values are ordered when ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Keep first-seen (insertion) order. Legends rely on this being stable.
    #[default]
    FirstSeen,
    /// Ascending by key.
    Key,
}

/// Results that can be truncated to their `n` highest-valued entries.
pub trait Rank: Sized {
    /// When `n` covers every entry the result comes back unchanged; otherwise
    /// entries are stable-sorted by value, descending, and cut to `n`.
    fn top_n(&self, n: usize, tie_break: TieBreak) -> Self;
}

pub fn top_n<R: Rank>(result: &R, n: usize, tie_break: TieBreak) -> R {
    result.top_n(n, tie_break)
}

/// Stable sort by value, descending; equal values ordered per `tie_break`.
pub fn sort_ranked<T, V, K>(items: &mut [T], tie_break: TieBreak, value: V, key: K)
where
    V: Fn(&T) -> f64,
    K: Fn(&T) -> &str,
{
    items.sort_by(|a, b| match (value(b).total_cmp(&value(a)), tie_break) {
        (Ordering::Equal, TieBreak::Key) => key(a).cmp(key(b)),
        (ord, _) => ord,
    });
}

fn ranked<T, V, K>(items: &[T], n: usize, tie_break: TieBreak, value: V, key: K) -> Vec<T>
where
    T: Clone,
    V: Fn(&T) -> f64,
    K: Fn(&T) -> &str,
{
    if n >= items.len() {
        return items.to_vec();
    }
    let mut sorted = items.to_vec();
    sort_ranked(&mut sorted, tie_break, value, key);
    sorted.truncate(n);
    sorted
}

impl Rank for Totals {
    fn top_n(&self, n: usize, tie_break: TieBreak) -> Self {
        let entries: Vec<(String, f64)> = self.iter().map(|(k, v)| (k.to_string(), v)).collect();
        ranked(&entries, n, tie_break, |e| e.1, |e| e.0.as_str())
            .into_iter()
            .collect()
    }
}

impl Rank for Vec<Entry> {
    fn top_n(&self, n: usize, tie_break: TieBreak) -> Self {
        ranked(self, n, tie_break, |e| e.value, |e| e.category.as_str())
    }
}

impl Rank for Vec<Link> {
    fn top_n(&self, n: usize, tie_break: TieBreak) -> Self {
        ranked(self, n, tie_break, |l| l.value, |l| l.source.as_str())
    }
}

/// Keeps the `n` groups with the largest overall totals; kept groups are untouched.
impl Rank for GroupedTotals {
    fn top_n(&self, n: usize, tie_break: TieBreak) -> Self {
        let groups: Vec<(String, Totals)> = self
            .iter()
            .map(|(g, t)| (g.to_string(), t.clone()))
            .collect();
        ranked(&groups, n, tie_break, |g| g.1.total(), |g| g.0.as_str())
            .into_iter()
            .collect()
    }
}

impl Rank for Vec<Series> {
    fn top_n(&self, n: usize, tie_break: TieBreak) -> Self {
        ranked(self, n, tie_break, |s| s.total, |s| s.category.as_str())
    }
}

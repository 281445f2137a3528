//! Aggregation of tabular international-student statistics into the series
//! that bar, donut, bubble, chord, choropleth and treemap charts bind to.
//!
//! A [`Dataset`](dataset::Dataset) is loaded once and never mutated. Each
//! chart keeps a [`View`](view::View) describing its current selection and
//! recomputes its [`AggregationResult`](aggregate::AggregationResult) through
//! the stateless functions in [`aggregate`] whenever the selection changes.

pub mod aggregate;
pub mod config;
pub mod dataset;
pub mod error;
pub mod selection;
pub mod view;

pub use aggregate::{AggregationResult, TieBreak, Totals};
pub use dataset::{Dataset, Row, Schema};
pub use error::{AggregateError, DatasetError};
pub use selection::{PredicateSpec, SelectionSpec};
pub use view::View;

//! Episode aggregation.
//!
//! - [`record::EpisodeRecord`] / [`record::ViewSeries`] -- the immutable
//!   per-demonstration record handed to persistence.
//! - [`aggregator::EpisodeAggregator`] -- folds the ordered frame-bundle
//!   stream of one episode into a record.

pub mod aggregator;
pub mod record;

pub use aggregator::EpisodeAggregator;
pub use record::{EpisodeRecord, ViewSeries};

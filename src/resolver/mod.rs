/// Status resolution and group aggregation
pub mod group_aggregator;
pub mod status_resolver;

pub use group_aggregator::{GroupAggregator, GroupCounts};
pub use status_resolver::{ResolverSettings, StatusResolver};

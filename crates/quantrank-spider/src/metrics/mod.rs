pub mod fetch;
pub mod fields;
pub mod normalize;
pub mod payload;

pub use fetch::{MetricGroup, MetricsFetcher, METRIC_GROUPS};
pub use normalize::RecordNormalizer;
pub use payload::MetricsResponse;

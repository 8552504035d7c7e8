// Ingestion throughput over time
//
// Upload timestamps are resampled into fixed-width, gapless buckets and the
// per-bucket counts are classified into average/best/worst scenarios that
// can be held against the projected consumer capacity.

mod buckets;
mod scenario;

pub use buckets::{resample, Bucket, BucketSeries, BucketWidth};
pub use scenario::{classify, classify_series, RateProjection, Scenario, ScenarioReport};

#[cfg(test)]
mod tests;

pub mod gear;
pub mod props;
pub mod reconcile;
pub mod snapshot;
pub mod tracker;

pub use reconcile::{diff, diff_all, DeltaRecord};
pub use snapshot::{StatisticsSnapshot, TypedStatValue};
pub use tracker::{SessionReport, StatsTracker};

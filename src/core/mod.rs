mod analysis;
mod run;
mod snapshot;

pub use analysis::{ActionItem, AnalysisResult, Confidence};
pub use run::{RunOutcome, RunReport};
pub use snapshot::{SNAPSHOT_SCHEMA_VERSION, Snapshot, SnapshotMeta};

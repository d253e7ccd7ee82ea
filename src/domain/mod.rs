pub mod error;
pub mod interests;
pub mod item;
pub mod types;

pub use error::PipelineError;
pub use interests::{InterestSet, InterestStore};
pub use item::{Item, Verdict};
pub use types::{PipelineStats, QueueSnapshot, ReportEvent, ReportKind};

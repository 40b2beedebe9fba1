pub mod engine;
pub mod locks;
pub mod report;

pub use engine::SyncEngine;
pub use locks::UserLocks;
pub use report::{SyncFailure, SyncReport, SyncStage};

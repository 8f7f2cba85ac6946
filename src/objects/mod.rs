//! Plain data types shared across components (§3 Data Model).
pub mod snapshot;

pub use snapshot::Snapshot;

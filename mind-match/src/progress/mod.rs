//! Progression
//!
//! - `store`: key/value persistence behind the `ProgressStore` trait
//! - `controller`: monotonic unlock driven by session outcomes

pub mod store;
pub mod controller;

pub use store::{JsonFileStore, MemoryStore, ProgressStore, StoreError, PROGRESS_KEY};
pub use controller::{ProgressController, ProgressRecord};

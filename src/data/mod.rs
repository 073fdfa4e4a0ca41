//! Data module - CSV loading, joining and metric derivation

mod loader;
mod processor;

pub use loader::{DataLoader, SnapTables};
pub use processor::{title_case, DataProcessor, JoinedRecord, ProcessorError, ValueColumns};

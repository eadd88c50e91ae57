pub mod batch;
pub mod discover;
pub mod export;
pub mod registry;

pub use batch::{run_batch, write_summary, BatchConfig, BatchSummary, FileOutcome, FileStatus};
pub use discover::{discover, DiscoveredFile, Discovery};
pub use export::{CleanedRecording, CsvExporter, Exporter, RawExporter};
pub use registry::{read_registry, CohortRegistry, MetaValue, Subject};

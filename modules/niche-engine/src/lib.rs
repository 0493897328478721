pub mod config;
pub mod engine;
pub mod error;
pub mod file_config;
pub mod normalize;
pub mod settings;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use engine::RunEngine;
pub use error::{EngineError, EngineResult};
pub use file_config::{load_config, FileConfig};
pub use settings::EngineSettings;
pub use traits::{ApifyJobProvider, JobProvider, Spreadsheet};
pub use types::{CancelAck, ColumnHeaders, ProgressSummary, RowOutcome, RowReport, RunSpec};

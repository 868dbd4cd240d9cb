pub mod config;
pub mod download;
pub mod error;
pub mod http;
pub mod logging;
pub mod output;
pub mod parsing;
pub mod pipeline;
pub mod run;
pub mod settings;

pub use error::{IngestError, Result};

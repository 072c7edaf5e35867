pub mod cleanup;
pub mod config;
pub mod constants;
pub mod error;
pub mod injector;
pub mod logging;
pub mod matcher;
pub mod metadata;
pub mod metrics;
pub mod parser;
pub mod pipeline;
pub mod types;
pub mod unmatched;
pub mod validate;

pub use config::LinkerConfig;
pub use error::{LinkerError, Result};
pub use matcher::{MatchMode, Matcher};
pub use pipeline::Pipeline;

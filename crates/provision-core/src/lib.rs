pub mod config;
pub mod detect;
pub mod enrich;
pub mod env_context;
pub mod error;
pub mod generators;
pub mod git;
pub mod inject;
pub mod io;
pub mod paths;
pub mod sync;
pub mod templates;
pub mod types;

pub use error::{ProvisionError, Result};
pub use types::StackId;

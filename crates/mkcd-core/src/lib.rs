pub mod config;
pub mod documents;
pub mod editor;
pub mod error;
pub mod io;
pub mod orchestrator;
pub mod paths;
pub mod report;
pub mod safety;
pub mod settings;
pub mod vcs;

pub use error::{MkcdError, Result};

pub mod boundary;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod git;
pub mod lookup;
pub mod oci;
pub mod package;
pub mod publish;
pub mod resolver;
pub mod telemetry;
pub mod ui;

pub use error::{ReleaseToolError, Result};

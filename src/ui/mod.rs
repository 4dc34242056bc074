//! User interface module - contract output and formatting.

pub mod formatter;

// Re-export formatter functions for convenience
pub use formatter::{
    display_error, write_boundary_warning, write_plain, write_status, write_success,
};

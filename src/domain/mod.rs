//! Domain logic - pure naming and versioning rules independent of git operations

pub mod branch;
pub mod release_line;
pub mod version;

pub use branch::{BranchContext, ReleaseState};
pub use release_line::ReleaseLine;
pub use version::{Version, VersionBump};

pub mod orchestration;

pub use orchestration::{
    run_oci, run_oci_with, run_publish, run_version, OciArgs, PublishArgs, VersionArgs,
};

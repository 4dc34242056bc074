use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use release_tool::cli::{self, OciArgs, PublishArgs, VersionArgs};
use release_tool::{config, telemetry, ui};

#[derive(Parser)]
#[command(
    name = "release-tool",
    version,
    about = "Cut release branches, tag versions per release line, and publish directories as OCI images"
)]
struct Args {
    #[arg(short, long, global = true, help = "Custom configuration file path")]
    config: Option<String>,

    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "Increase log verbosity (-v info, -vv debug)")]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Publish the next version of a release line
    Publish {
        #[arg(help = "Release line name")]
        name: String,

        #[arg(help = "Only consider history touching these paths (relative to the repository root)")]
        paths: Vec<PathBuf>,

        #[arg(short, long, help = "Remote to list and push to")]
        remote: Option<String>,
    },

    /// Print the release line's version tagged on HEAD
    Version {
        #[arg(help = "Release line name")]
        name: String,
    },

    /// Publish a directory as a single-layer OCI image
    Oci {
        #[arg(help = "Image reference, e.g. localhost:5000/app:latest")]
        image: String,

        #[arg(help = "Directory to package")]
        directory: PathBuf,

        #[arg(short, long, help = "Resolve the version from this release line's tags")]
        line: Option<String>,

        #[arg(long = "version", value_name = "X.Y.Z", help = "Use this version instead of resolving one")]
        version_override: Option<String>,

        #[arg(long, help = "Use plain HTTP and skip TLS verification")]
        insecure: bool,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    telemetry::init_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui::display_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = config::load_config(args.config.as_deref())?;
    let mut out = io::stdout().lock();

    match args.command {
        Command::Publish {
            name,
            paths,
            remote,
        } => {
            let args = PublishArgs {
                name,
                paths,
                remote,
                repo_path: PathBuf::from("."),
            };
            cli::run_publish(&args, &config, &mut out)?;
        }
        Command::Version { name } => {
            let args = VersionArgs {
                name,
                repo_path: PathBuf::from("."),
            };
            cli::run_version(&args, &mut out)?;
        }
        Command::Oci {
            image,
            directory,
            line,
            version_override,
            insecure,
        } => {
            let args = OciArgs {
                image,
                directory,
                line,
                version: version_override,
                insecure,
            };
            cli::run_oci(&args, &config, &mut out)?;
        }
    }

    Ok(())
}

/// CLI argument parsing

use clap::Parser;
use std::path::PathBuf;

// Build timestamp injected at compile time
pub const BUILD_TIMESTAMP: &str = env!("BUILD_TIMESTAMP");
pub const VERSION_WITH_BUILD: &str = concat!(env!("CARGO_PKG_VERSION"), " (built: ", env!("BUILD_TIMESTAMP"), ")");

/// Raw command-line flags. Selection rules (exactly one of `--volume` / `--all`)
/// are enforced by `BackupConfig::resolve`, not by clap, so the same checks
/// apply no matter where the flags came from.
#[derive(Parser, Debug)]
#[command(name = "volume-backup")]
#[command(author, version = VERSION_WITH_BUILD, about, long_about = None)]
pub struct Cli {
    /// Back up a single named volume
    #[arg(long, value_name = "NAME")]
    pub volume: Option<String>,

    /// Back up every volume known to Docker
    #[arg(long)]
    pub all: bool,

    /// Directory the archives are written to
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Directory for the run log and JSON summary (default: <out>/logs)
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Stop containers using the volume while it is archived
    #[arg(long, overrides_with = "no_stop")]
    pub stop: bool,

    /// Leave dependent containers running (default)
    #[arg(long, overrides_with = "stop")]
    pub no_stop: bool,

    /// Print the backup plan without touching any container or file
    #[arg(long)]
    pub dry_run: bool,

    /// Write a JSON summary next to the run log
    #[arg(long)]
    pub json: bool,

    /// Image used for the helper container that runs tar
    #[arg(long, value_name = "IMAGE")]
    pub image: Option<String>,

    /// Seconds Docker waits for a container to stop before killing it
    #[arg(long, value_name = "SECS")]
    pub stop_timeout: Option<u64>,

    /// Alternate config file (default: ~/.config/volume-backup/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Whether containers should be stopped. `--no-stop` is the default.
    pub fn stop_containers(&self) -> bool {
        self.stop && !self.no_stop
    }
}

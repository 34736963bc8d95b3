use chrono::Local;
use clap::error::ErrorKind;
use clap::Parser;
use std::process::ExitCode;

use volume_backup::app::App;
use volume_backup::cli::Cli;
use volume_backup::core::{BackupConfig, BackupError, DockerRuntime, RunLog};
use volume_backup::utils::{run_timestamp, AppConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => return fail_early(BackupError::from(err)),
    };

    let app_config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return fail_early(BackupError::Configuration(format!("{:#}", e))),
    };

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            return fail_early(BackupError::Environment(format!(
                "cannot determine current directory: {}",
                e
            )))
        }
    };

    let config = match BackupConfig::resolve(&cli, &app_config, &cwd) {
        Ok(config) => config,
        Err(err) => return fail_early(err),
    };

    let started_at = Local::now();

    // Dry runs leave no trace on disk, not even a log file
    let mut log = if config.dry_run {
        RunLog::console()
    } else {
        RunLog::deferred(&config.log_file_path(&run_timestamp(started_at)))
    };

    let runtime = match DockerRuntime::connect(config.stop_timeout_secs) {
        Ok(runtime) => runtime,
        Err(e) => {
            let err = BackupError::Environment(format!("{:#}", e));
            log.error(err.to_string());
            return ExitCode::from(err.exit_code());
        }
    };

    let app = App::new(&runtime, &config, started_at);
    match app.run(&mut log).await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(err) => {
            log.error(err.to_string());
            ExitCode::from(err.exit_code())
        }
    }
}

/// Report an error raised before the run log exists
fn fail_early(err: BackupError) -> ExitCode {
    RunLog::console().error(err.to_string());
    if matches!(err, BackupError::Configuration(_)) {
        eprintln!("Run 'volume-backup --help' for usage.");
    }
    ExitCode::from(err.exit_code())
}

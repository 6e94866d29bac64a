use std::fs::{File, OpenOptions};
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, Command, ExitCode, ExitStatus};

use anyhow::{bail, Context, Result};
use clap::Parser;
use fs2::FileExt;

use latelog::capture::StdCapture;
use latelog::cli::Cli;
use latelog::config::{Config, LogConfig};
use latelog::logging::init_tracing;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    cli.apply(&mut config);
    config.validate()?;

    let Some((program, args)) = cli.program() else {
        bail!("No command given");
    };

    init_tracing(&config.logging.level);

    // From here on stdout/stderr are pipes; dropping `capture` on an early
    // return puts the terminal back.
    let capture =
        StdCapture::start(&config.capture).context("Failed to capture standard streams")?;
    tracing::info!(
        command = program,
        streams = ?capture.stream_names(),
        "starting command, output is buffered until the log is open"
    );

    let child = Command::new(program)
        .args(args)
        .spawn()
        .with_context(|| format!("Failed to start '{}'", program))?;
    let child = scopeguard::guard(child, |mut child: Child| {
        let _ = child.kill();
        let _ = child.wait();
    });

    let log = open_log(&config.log)?;
    capture
        .attach(&log)
        .with_context(|| format!("Failed to write to '{}'", config.log.path.display()))?;

    let status = scopeguard::ScopeGuard::into_inner(child)
        .wait()
        .with_context(|| format!("Failed to wait for '{}'", program))?;
    tracing::info!(%status, "command finished");

    let report = capture.finish();
    for (stream, err) in report.errors() {
        eprintln!("latelog: {} capture failed: {}", stream, err);
    }
    let undelivered = report.undelivered();
    if undelivered > 0 {
        eprintln!("latelog: {} bytes never reached the log", undelivered);
    }

    // The log is closed only after every sink is.
    if config.log.lock {
        if let Err(err) = FileExt::unlock(&log) {
            tracing::debug!(path = %config.log.path.display(), "unlocking log failed: {}", err);
        }
    }
    drop(log);

    Ok(exit_code(status))
}

fn open_log(config: &LogConfig) -> Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    if config.append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }

    let file = options
        .open(&config.path)
        .with_context(|| format!("Failed to open log file '{}'", config.path.display()))?;

    if config.lock {
        FileExt::try_lock_exclusive(&file).with_context(|| {
            format!(
                "Log file '{}' is locked by another process",
                config.path.display()
            )
        })?;
    }

    tracing::debug!(path = %config.path.display(), append = config.append, "log file open");
    Ok(file)
}

fn exit_code(status: ExitStatus) -> ExitCode {
    match (status.code(), status.signal()) {
        (Some(code), _) => ExitCode::from(code.clamp(0, 255) as u8),
        (None, Some(signal)) => ExitCode::from((128 + signal).clamp(0, 255) as u8),
        (None, None) => ExitCode::from(1),
    }
}

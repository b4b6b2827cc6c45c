//! drizzle - stream Markdown to the terminal as it arrives

mod cli;

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::tty::IsTty;
use drizzle_core::config::DEFAULT_WIDTH;
use drizzle_core::inject::prepare_query;
use drizzle_core::{
    pipeline, ByteSource, CommandSource, ConfigFile, Error, ReaderSource, StreamCancellation,
};
use tracing::{debug, info};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Mode};

/// Conventional exit status after SIGINT
const EXIT_INTERRUPTED: u8 = 130;

/// Initialize tracing on stderr; stdout belongs to the rendered stream.
///
/// Warnings are always shown. `-v` adds INFO, `-vv` DEBUG, `-vvv` TRACE.
/// `RUST_LOG` replaces the whole filter.
fn init_tracing(verbose: u8) {
    let directives = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "warn".to_string(),
            1 => "warn,drizzle=info,drizzle_core=info".to_string(),
            2 => "warn,drizzle=debug,drizzle_core=debug".to_string(),
            _ => "debug,drizzle=trace,drizzle_core=trace".to_string(),
        },
    };
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(verbose >= 2)
                .with_writer(io::stderr)
                .compact(),
        )
        .init();
}

fn terminal_width() -> usize {
    match crossterm::terminal::size() {
        Ok((cols, _)) if cols > 0 => cols as usize,
        _ => DEFAULT_WIDTH,
    }
}

async fn open_source(mode: Mode, llm_cmd: Option<&str>, inject: bool) -> Result<Box<dyn ByteSource>> {
    let source: Box<dyn ByteSource> = match mode {
        Mode::File(path) => Box::new(ReaderSource::open_file(&path).await?),
        Mode::Command(cmd) => Box::new(CommandSource::shell(&cmd)?),
        Mode::Query(query) => {
            let llm_cmd = llm_cmd.ok_or(Error::MissingLlmCommand)?;
            Box::new(CommandSource::query(llm_cmd, &prepare_query(&query, inject))?)
        }
        Mode::Stdin => Box::new(ReaderSource::stdin()),
    };
    Ok(source)
}

async fn stream(cli: Cli) -> Result<()> {
    let config_dir = ConfigFile::config_dir();
    let file = ConfigFile::load().unwrap_or_default();

    let config = cli.stream_config(&file, terminal_width());
    let theme = cli
        .theme(&file, config_dir.as_deref())
        .context("failed to load theme")?;
    let mode = cli.mode(io::stdin().is_tty())?;
    debug!(?mode, ?config, "Resolved settings");

    let mut source = open_source(mode, config.llm_cmd.as_deref(), config.inject).await?;

    let cancel = StreamCancellation::new();
    cancel.cancel_on_ctrl_c();

    let stdout = io::stdout();
    let summary = pipeline::run(source.as_mut(), &config, theme, stdout.lock(), &cancel).await?;
    info!(
        bytes_in = summary.bytes_in,
        bytes_out = summary.bytes_out,
        chunks = summary.chunks,
        "Done"
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start the runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let result = runtime.block_on(stream(cli));
    // A blocking stdin read cannot be cancelled; don't wait for it on exit
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if matches!(e.downcast_ref::<Error>(), Some(Error::Interrupted)) {
                return ExitCode::from(EXIT_INTERRUPTED);
            }
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

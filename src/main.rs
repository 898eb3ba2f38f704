//! CLI entry point for netmanager.

use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use netmanager_core::net::{EnvironmentProxy, FixedProxy, NoProxy};
use netmanager_core::{
    BlockingClient, CertificatePolicy, FileSink, ProxyPolicy, RequestDescriptor, Transport,
    TransportConfig,
};
use serde::Serialize;
use tracing::{debug, info};

mod app_config;
mod cli;
mod terminal;

use app_config::{FileConfig, load_default_file_config};
use cli::{Args, Command};
use terminal::TerminalInteraction;

/// Machine-readable result of one command (`--json`).
#[derive(Debug, Serialize)]
struct OutcomeReport {
    command: &'static str,
    url: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let loaded = load_default_file_config()?;
    let file_config = loaded.config.clone().unwrap_or_default();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config verbosity > info
    let default_level = if args.quiet {
        "error"
    } else {
        match (args.verbose, file_config.verbosity) {
            (0, Some(verbosity)) => verbosity.log_level(),
            (0, None) => "info",
            (1, _) => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, config_path = ?loaded.path, "CLI arguments parsed");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let assume_yes = matches!(args.command, Command::Save { yes: true, .. });
    let interaction = Arc::new(TerminalInteraction::new(assume_yes, loaded.path.clone()));

    let transport = Transport::builder()
        .config(transport_config(&args, &file_config))
        .proxy_policy(proxy_policy(&args, &file_config))
        .interaction(interaction.clone())
        .build(runtime.handle().clone())
        .context("Failed to build network transport")?;

    let mut sink = FileSink::new(interaction);
    if let Some(dir) = &file_config.scratch_dir {
        sink = sink.with_scratch_dir(dir);
    }
    let mut client = BlockingClient::new(transport, sink);
    if let Some(limit) = file_config.max_buffer_bytes {
        client = client.with_max_buffer_bytes(limit);
    }

    let report = run(&args, &client)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    // A save that produced no file is not an error.
    match report.error {
        Some(error) => Err(anyhow!("{} failed: {error}", report.command)),
        None => Ok(()),
    }
}

fn transport_config(args: &Args, file_config: &FileConfig) -> TransportConfig {
    let mut config = TransportConfig::default();
    if let Some(secs) = file_config.connect_timeout_secs {
        config.connect_timeout = Duration::from_secs(secs);
    }
    config.timeout = args
        .timeout
        .or(file_config.timeout_secs)
        .map(Duration::from_secs);
    config.certificate_policy = if args.strict_certificates {
        CertificatePolicy::Strict
    } else {
        file_config.certificate_policy.unwrap_or_default()
    };
    config
}

fn proxy_policy(args: &Args, file_config: &FileConfig) -> Arc<dyn ProxyPolicy> {
    if args.no_proxy {
        return Arc::new(NoProxy);
    }
    match args.proxy.clone().or_else(|| file_config.proxy.clone()) {
        Some(proxy) => Arc::new(FixedProxy::new(proxy)),
        None => Arc::new(EnvironmentProxy),
    }
}

fn spinner(args: &Args, message: String) -> ProgressBar {
    if args.quiet || args.json || !io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
        bar.set_style(style);
    }
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn run(args: &Args, client: &BlockingClient) -> Result<OutcomeReport> {
    let command = &args.command;
    let mut report = OutcomeReport {
        command: command.name(),
        url: command.url().to_string(),
        ok: false,
        bytes: None,
        path: None,
        error: None,
    };

    match command {
        Command::Get { url, output } => {
            let bar = spinner(args, format!("GET {url}"));
            let result = client.fetch_to_buffer(url);
            bar.finish_and_clear();
            match result {
                Ok(body) => {
                    report.ok = true;
                    report.bytes = Some(body.len());
                    if let Some(path) = output {
                        fs::write(path, &body)
                            .with_context(|| format!("Failed to write '{}'", path.display()))?;
                        report.path = Some(path.clone());
                    } else if !args.json {
                        io::stdout().write_all(&body)?;
                    }
                }
                Err(error) => report.error = Some(error.to_string()),
            }
        }
        Command::GetToFile { url } => {
            let bar = spinner(args, format!("GET {url}"));
            let result = client.fetch_to_file(url);
            bar.finish_and_clear();
            match result {
                Ok(path) => {
                    report.ok = true;
                    if !args.json {
                        println!("{}", path.display());
                    }
                    report.path = Some(path);
                }
                Err(error) => report.error = Some(error.to_string()),
            }
        }
        Command::Post { url, body_file } => {
            let body = read_body(body_file.as_ref())?;
            let bar = spinner(args, format!("POST {url} ({} bytes)", body.len()));
            let result = client.post_and_wait(url, body);
            bar.finish_and_clear();
            match result {
                Ok(reply) => {
                    report.ok = true;
                    report.bytes = Some(reply.len());
                    if !args.json {
                        io::stdout().write_all(&reply)?;
                    }
                }
                Err(error) => report.error = Some(error.to_string()),
            }
        }
        Command::Save { url, .. } => {
            if let Some(path) = client.download_and_save(RequestDescriptor::get(url.as_str())) {
                info!(path = %path.display(), "Saved");
                report.ok = true;
                report.path = Some(path);
            }
        }
    }
    Ok(report)
}

fn read_body(body_file: Option<&PathBuf>) -> Result<Vec<u8>> {
    match body_file {
        Some(path) => {
            fs::read(path).with_context(|| format!("Failed to read body file '{}'", path.display()))
        }
        None => {
            let mut buffer = Vec::new();
            if !io::stdin().is_terminal() {
                io::stdin().read_to_end(&mut buffer)?;
            }
            Ok(buffer)
        }
    }
}

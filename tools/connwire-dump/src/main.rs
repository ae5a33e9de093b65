// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! connwire-dump - Encode connection snapshots and inspect payloads.
//!
//! Usage:
//!   connwire-dump encode --input snapshot.json --output conns.bin
//!   connwire-dump encode --input snapshot.json --output conns.json --format json
//!   connwire-dump decode --input conns.bin
//!   connwire-dump decode --input blob --content-type application/json
//!   connwire-dump gen-config --output connwire.toml

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use connwire::{
    codec, CodecOptions, ConnectionSnapshot, EncoderConfig, Format, MemoryRegistry, Registry,
    WirePayload,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "connwire-dump")]
#[command(about = "Encode connection snapshots and inspect connwire payloads")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encode a JSON connection snapshot
    Encode {
        /// Snapshot file (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output payload file
        #[arg(short, long)]
        output: PathBuf,

        /// Wire format (binary, json); overrides the config file
        #[arg(short, long)]
        format: Option<Format>,

        /// Encoder configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Decode a payload and print it as JSON
    Decode {
        /// Payload file
        #[arg(short, long)]
        input: PathBuf,

        /// Wire format (binary, json, auto)
        #[arg(short, long, default_value = "auto")]
        format: String,

        /// Content type the payload was received with
        #[arg(long, conflicts_with = "format")]
        content_type: Option<String>,
    },

    /// Write the default encoder configuration
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "connwire.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match args.command {
        Commands::Encode {
            input,
            output,
            format,
            config,
        } => cmd_encode(&input, &output, format, config.as_deref()),
        Commands::Decode {
            input,
            format,
            content_type,
        } => cmd_decode(&input, &format, content_type.as_deref()),
        Commands::GenConfig { output } => cmd_gen_config(&output),
    }
}

fn cmd_encode(
    input: &Path,
    output: &Path,
    format: Option<Format>,
    config: Option<&Path>,
) -> Result<()> {
    let mut config = match config {
        Some(path) => EncoderConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EncoderConfig::default(),
    };
    if let Some(format) = format {
        config.format = format;
    }

    let snapshot = read_snapshot(input)?;
    if snapshot.is_empty() {
        warn!("Snapshot {} holds no data; writing an empty payload", input.display());
    }
    let registry = Arc::new(MemoryRegistry::new());
    let encoder = config.build_codec(Some(registry.clone() as Arc<dyn Registry>))?;

    let bytes = encoder.encode(&snapshot)?;
    std::fs::write(output, &bytes).with_context(|| format!("writing {}", output.display()))?;

    info!(
        "Encoded {} connections, {} HTTP flows -> {} ({} bytes, {})",
        snapshot.conns.len(),
        snapshot.http.len(),
        output.display(),
        bytes.len(),
        encoder.content_type()
    );
    for ((name, labels), series) in registry.snapshot() {
        debug!("metric {} {:?} = {}", name, labels, series.sum);
    }
    Ok(())
}

fn cmd_decode(input: &Path, format: &str, content_type: Option<&str>) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let format = resolve_format(format, content_type, &bytes)?;

    let decoder = codec(format, CodecOptions::default());
    let payload = decoder
        .decode(&bytes)
        .with_context(|| format!("decoding {} as {}", input.display(), format))?;

    println!("{}", serde_json::to_string_pretty(&payload)?);
    println!("{}", summary(format, &payload));
    Ok(())
}

fn cmd_gen_config(output: &Path) -> Result<()> {
    let text = EncoderConfig::default().to_toml()?;
    std::fs::write(output, text).with_context(|| format!("writing {}", output.display()))?;
    info!("Generated configuration: {}", output.display());
    Ok(())
}

fn read_snapshot(path: &Path) -> Result<ConnectionSnapshot> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let snapshot = serde_json::from_str(&content)
        .with_context(|| format!("parsing snapshot {}", path.display()))?;
    Ok(snapshot)
}

/// Pick the decode format from an explicit name, a content type, or the bytes.
fn resolve_format(name: &str, content_type: Option<&str>, bytes: &[u8]) -> Result<Format> {
    if let Some(ct) = content_type {
        return match Format::from_content_type(ct) {
            Some(format) => Ok(format),
            None => bail!("unsupported content type: {}", ct),
        };
    }
    if name.eq_ignore_ascii_case("auto") {
        return match Format::sniff(bytes) {
            Some(format) => Ok(format),
            None => bail!("cannot detect payload format; pass --format"),
        };
    }
    name.parse::<Format>().map_err(anyhow::Error::msg)
}

fn summary(format: Format, payload: &WirePayload) -> String {
    let linked = payload
        .connections
        .iter()
        .filter(|c| c.http_key_idx.is_some())
        .count();
    format!(
        "{}: {} connections, {} domains, {} HTTP flows ({} linked connections), {} DNS entries",
        format,
        payload.connections.len(),
        payload.domains.len(),
        payload.http_keys.len(),
        linked,
        payload.dns.entries.len()
    )
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Tracing setup for the transport.
//!
//! PPPP has no per-command spans worth capturing into structured JSON
//! fields, so this stays a plain `tracing_subscriber::Registry` + `EnvFilter`
//! + optional rolling file appender (see DESIGN.md), returning a
//! `WorkerGuard` the caller must hold for the lifetime of the process.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, fmt, fmt::time::ChronoLocal, layer::SubscriberExt, util::SubscriberInitExt};

/// Where log lines go.
#[derive(Debug, Clone)]
pub enum LogTarget {
    Stdout,
    File { directory: String, file_name_prefix: String },
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// `tracing_subscriber::EnvFilter` directive string, e.g. `"pppp_fleet_transport=debug"`.
    pub filter: String,
    pub target: LogTarget,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            target: LogTarget::Stdout,
        }
    }
}

/// Installs the global subscriber. The returned guard must be kept alive for
/// the duration of the process when `target` is `File` (it owns the
/// non-blocking writer thread).
pub fn init_logger(cfg: &LoggerConfig) -> Result<WorkerGuard> {
    let filter = EnvFilter::try_new(&cfg.filter).context("invalid log filter directive")?;

    let (writer, guard) = match &cfg.target {
        LogTarget::Stdout => non_blocking(std::io::stdout()),
        LogTarget::File { directory, file_name_prefix } => {
            let appender = rolling::daily(Path::new(directory), file_name_prefix);
            non_blocking(appender)
        },
    };

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_ansi(matches!(cfg.target, LogTarget::Stdout))
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}

//! Logging setup for capture tools.
//!
//! [`LogSpec`] holds a default level plus per-module overrides, written as
//! comma separated directives: a bare level sets the default and
//! `module=level` overrides it for that module path and its children, e.g.
//! `warn,target_capture_gate=trace`. The same string in [`LOG_ENV`] drives
//! both the stderr logger and, with the `tracing` feature, the subscriber
//! filter.

use std::io::{self, Write};
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::prelude::*;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable read by [`LogSpec::from_env`] and `init_tracing`.
pub const LOG_ENV: &str = "TARGET_CAPTURE_LOG";

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LogSpecError {
    #[error("unknown log level {0:?}")]
    Level(String),
    #[error("directive {0:?} has no module name")]
    Module(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct LogSpec {
    default: LevelFilter,
    /// Longest module path first.
    modules: Vec<(String, LevelFilter)>,
}

impl LogSpec {
    pub fn new(default: LevelFilter) -> Self {
        Self {
            default,
            modules: Vec::new(),
        }
    }

    pub fn with_module(mut self, module: impl Into<String>, level: LevelFilter) -> Self {
        let module = module.into();
        self.modules.retain(|(m, _)| *m != module);
        self.modules.push((module, level));
        self.modules.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        self
    }

    /// Parse directives; `default` applies when no bare level is given.
    pub fn parse(directives: &str, default: LevelFilter) -> Result<Self, LogSpecError> {
        let mut spec = Self::new(default);
        for directive in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match directive.split_once('=') {
                Some((module, level)) => {
                    let module = module.trim();
                    if module.is_empty() {
                        return Err(LogSpecError::Module(directive.to_string()));
                    }
                    spec = spec.with_module(module, parse_level(level)?);
                }
                None => spec.default = parse_level(directive)?,
            }
        }
        Ok(spec)
    }

    /// Directives from [`LOG_ENV`], or just `default` when it is unset or blank.
    pub fn from_env(default: LevelFilter) -> Result<Self, LogSpecError> {
        match std::env::var(LOG_ENV) {
            Ok(directives) => Self::parse(&directives, default),
            Err(_) => Ok(Self::new(default)),
        }
    }

    /// Level for a record target, from the most specific matching module.
    pub fn level_for(&self, target: &str) -> LevelFilter {
        self.modules
            .iter()
            .find(|(module, _)| {
                target
                    .strip_prefix(module.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
            })
            .map_or(self.default, |(_, level)| *level)
    }

    /// Most verbose level any target can reach.
    pub fn max_level(&self) -> LevelFilter {
        self.modules
            .iter()
            .map(|(_, level)| *level)
            .fold(self.default, Ord::max)
    }
}

fn parse_level(s: &str) -> Result<LevelFilter, LogSpecError> {
    LevelFilter::from_str(s.trim()).map_err(|_| LogSpecError::Level(s.trim().to_string()))
}

/// One log line: `elapsed LEVEL target: message`.
pub fn write_record(out: &mut impl Write, elapsed: Duration, record: &Record) -> io::Result<()> {
    writeln!(
        out,
        "{:>8.3}s {:<5} {}: {}",
        elapsed.as_secs_f64(),
        record.level(),
        record.target(),
        record.args()
    )
}

struct CaptureLogger {
    spec: LogSpec,
    started: Instant,
}

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.spec.level_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = write_record(&mut io::stderr().lock(), self.started.elapsed(), record);
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

static LOGGER: OnceLock<CaptureLogger> = OnceLock::new();

/// Install the stderr logger. Later calls keep the first spec.
pub fn init(spec: LogSpec) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let max = spec.max_level();
    let logger = LOGGER.get_or_init(|| CaptureLogger {
        spec,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(max);
    Ok(())
}

pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    init(LogSpec::new(level))
}

/// Install a `tracing` fmt subscriber on stderr, filtered by [`LOG_ENV`],
/// then `RUST_LOG`, then `info`.
///
/// Only spans and events are captured; `log` records need a bridge such as
/// `tracing_log::LogTracer`. Later calls leave the first subscriber in place.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_span_events(FmtSpan::CLOSE);
    let layer = if json {
        layer.json().flatten_event(true).boxed()
    } else {
        layer.with_timer(fmt::time::Uptime::default()).boxed()
    };
    let subscriber = tracing_subscriber::registry().with(filter).with(layer);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        log::debug!("tracing subscriber already installed");
    }
}

use std::fmt;
use std::io::{self, IsTerminal};
use std::sync::Mutex;
use std::time::SystemTime;

use anyhow::{bail, Context, Result};
use fern::colors::{Color, ColoredLevelConfig};
use log::{Level, LevelFilter};

pub fn init(level: &str) -> Result<()> {
    let level = parse_level(level)?;

    let stdout = io::stdout();
    let colors = stdout.is_terminal().then(|| {
        ColoredLevelConfig::new()
            .info(Color::Green)
            .debug(Color::Magenta)
    });

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] {message}",
                humantime::format_rfc3339_millis(SystemTime::now()),
                level_tag(colors.as_ref(), record.level())
            ))
        })
        .level(level)
        // Keep the HTTP stacks quiet unless something goes wrong
        .level_for("actix_server", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .level_for("hyper_util", LevelFilter::Warn)
        .chain(stdout)
        .apply()
        .context("init logger")?;

    Ok(())
}

/// Colors are only used when writing to a terminal.
fn level_tag(colors: Option<&ColoredLevelConfig>, level: Level) -> String {
    match colors {
        Some(colors) => colors.color(level).to_string(),
        None => level.to_string(),
    }
}

pub fn parse_level(level: &str) -> Result<LevelFilter> {
    Ok(match level {
        "error" => LevelFilter::Error,
        "warning" | "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        _ => bail!("unknown log level '{}'", level),
    })
}

/// Logging capability handed to the decision pipeline.
///
/// Nothing in the pipeline reaches for a global logger; whoever builds it
/// decides where the messages go. Without one, logging is a no-op.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, args: fmt::Arguments);

    fn debug(&self, args: fmt::Arguments) {
        self.log(Level::Debug, args);
    }

    fn info(&self, args: fmt::Arguments) {
        self.log(Level::Info, args);
    }

    fn warning(&self, args: fmt::Arguments) {
        self.log(Level::Warn, args);
    }

    fn error(&self, args: fmt::Arguments) {
        self.log(Level::Error, args);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: Level, _args: fmt::Arguments) {}
}

/// Forwards to the `log` facade, so messages end up wherever [`init`] sent them.
#[derive(Debug, Default, Clone, Copy)]
pub struct FacadeLogger;

impl Logger for FacadeLogger {
    fn log(&self, level: Level, args: fmt::Arguments) {
        log::log!(target: "porton", level, "{}", args);
    }
}

/// Keeps every message in memory. Handy for asserting what was logged.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Level, String)> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns true if any message at `level` contains `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.records()
            .iter()
            .any(|(l, msg)| *l == level && msg.contains(needle))
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: Level, args: fmt::Arguments) {
        let msg = args.to_string();
        match self.records.lock() {
            Ok(mut records) => records.push((level, msg)),
            Err(poisoned) => poisoned.into_inner().push((level, msg)),
        }
    }
}

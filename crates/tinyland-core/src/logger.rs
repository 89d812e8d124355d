//! Stderr logging with per-module levels.
//!
//! A [`LogSpec`] is written like `info,tinyland_calib=debug,tinyland::app=trace`:
//! a bare level sets the default and `target=level` overrides it for a module
//! and everything below it. [`init_logging`] installs a `log` backend that
//! prints
//!
//! ```text
//! [  1.234s  INFO calib::detector] calibration: hull simplified to 4 vertices
//! ```
//!
//! With the `tracing` feature, [`init_tracing`] installs a `tracing-subscriber`
//! driven by the same spec instead.

use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::EnvFilter;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LogSpecError {
    #[error("unknown log level `{0}`")]
    Level(String),
    #[error("empty module name in `{0}`")]
    Target(String),
}

/// Default level plus per-module overrides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogSpec {
    default: LevelFilter,
    /// Longest target first, so the first prefix match is the most specific.
    overrides: Vec<(String, LevelFilter)>,
}

impl Default for LogSpec {
    fn default() -> Self {
        Self::new(LevelFilter::Info)
    }
}

impl LogSpec {
    pub fn new(default: LevelFilter) -> Self {
        Self {
            default,
            overrides: Vec::new(),
        }
    }

    /// Set the level for `target` and its submodules.
    pub fn with(mut self, target: impl Into<String>, level: LevelFilter) -> Self {
        let target = target.into();
        self.overrides.retain(|(t, _)| *t != target);
        self.overrides.push((target, level));
        self.overrides
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        self
    }

    pub fn default_level(&self) -> LevelFilter {
        self.default
    }

    /// Level in effect for records from `target`.
    pub fn level_for(&self, target: &str) -> LevelFilter {
        self.overrides
            .iter()
            .find(|(prefix, _)| covers(prefix, target))
            .map_or(self.default, |(_, level)| *level)
    }

    /// Most verbose level any target may log at.
    pub fn max_level(&self) -> LevelFilter {
        self.overrides
            .iter()
            .map(|(_, level)| *level)
            .fold(self.default, Ord::max)
    }
}

fn covers(prefix: &str, target: &str) -> bool {
    target
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

fn parse_level(name: &str) -> Result<LevelFilter, LogSpecError> {
    LevelFilter::from_str(name.trim()).map_err(|_| LogSpecError::Level(name.trim().to_string()))
}

impl FromStr for LogSpec {
    type Err = LogSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut spec = LogSpec::default();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('=') {
                Some((target, level)) => {
                    let target = target.trim();
                    if target.is_empty() {
                        return Err(LogSpecError::Target(part.to_string()));
                    }
                    spec = spec.with(target, parse_level(level)?);
                }
                None => spec.default = parse_level(part)?,
            }
        }
        Ok(spec)
    }
}

/// Renders in the syntax [`FromStr`] accepts, which is also `EnvFilter`'s.
impl fmt::Display for LogSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.default.as_str().to_ascii_lowercase())?;
        for (target, level) in self.overrides.iter().rev() {
            write!(f, ",{target}={}", level.as_str().to_ascii_lowercase())?;
        }
        Ok(())
    }
}

/// Drop the workspace prefix from a module path: `tinyland_calib::detector`
/// prints as `calib::detector`, `tinyland::app` as `app`.
fn short_target(target: &str) -> &str {
    target
        .strip_prefix("tinyland::")
        .or_else(|| target.strip_prefix("tinyland_"))
        .unwrap_or(target)
}

struct StderrLogger {
    spec: LogSpec,
    started: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.spec.level_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(
            self.started.elapsed().as_secs_f64(),
            record.level(),
            record.target(),
            record.args(),
        );
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {}
}

fn format_line(elapsed: f64, level: log::Level, target: &str, args: &fmt::Arguments) -> String {
    format!("[{elapsed:7.3}s {level:>5} {}] {args}", short_target(target))
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger. Later calls keep the first spec.
pub fn init_logging(spec: LogSpec) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let max = spec.max_level();
    let logger = LOGGER.get_or_init(|| StderrLogger {
        spec,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(max);
    Ok(())
}

/// Install a `tracing` subscriber filtered by `spec`; `RUST_LOG`, when set,
/// takes precedence. Span closings are logged with their timings.
#[cfg(feature = "tracing")]
pub fn init_tracing(spec: &LogSpec, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(spec.to_string()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE);
    let installed = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(tracing_subscriber::fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
    if installed.is_err() {
        log::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_level_sets_the_default() {
        let spec: LogSpec = "DEBUG".parse().unwrap();
        assert_eq!(spec.default_level(), LevelFilter::Debug);
        assert_eq!(spec.level_for("anything"), LevelFilter::Debug);
        assert_eq!("".parse::<LogSpec>().unwrap(), LogSpec::default());
    }

    #[test]
    fn most_specific_module_wins() {
        let spec: LogSpec = "warn,tinyland_calib=debug,tinyland_calib::rings=trace"
            .parse()
            .unwrap();
        assert_eq!(spec.level_for("tinyland_calib::rings"), LevelFilter::Trace);
        assert_eq!(spec.level_for("tinyland_calib::detector"), LevelFilter::Debug);
        assert_eq!(spec.level_for("tinyland_calib"), LevelFilter::Debug);
        assert_eq!(spec.level_for("tinyland_calibration"), LevelFilter::Warn);
        assert_eq!(spec.level_for("tinyland::app"), LevelFilter::Warn);
        assert_eq!(spec.max_level(), LevelFilter::Trace);
    }

    #[test]
    fn overrides_can_be_quieter_than_the_default() {
        let spec = LogSpec::new(LevelFilter::Debug).with("tinyland::render", LevelFilter::Off);
        assert_eq!(spec.level_for("tinyland::render::osc"), LevelFilter::Off);
        assert_eq!(spec.max_level(), LevelFilter::Debug);
    }

    #[test]
    fn bad_directives_are_rejected() {
        assert_eq!(
            "chatty".parse::<LogSpec>(),
            Err(LogSpecError::Level("chatty".into()))
        );
        assert_eq!(
            "info,=debug".parse::<LogSpec>(),
            Err(LogSpecError::Target("=debug".into()))
        );
    }

    #[test]
    fn display_parses_back_to_the_same_spec() {
        let spec: LogSpec = "info, tinyland::app = debug".parse().unwrap();
        assert_eq!(spec.to_string(), "info,tinyland::app=debug");
        assert_eq!(spec.to_string().parse::<LogSpec>().unwrap(), spec);
    }

    #[test]
    fn lines_carry_uptime_level_and_short_module() {
        let line = format_line(
            1.5,
            log::Level::Info,
            "tinyland_calib::detector",
            &format_args!("found {} rings", 4),
        );
        assert_eq!(line, "[  1.500s  INFO calib::detector] found 4 rings");
        assert_eq!(short_target("tinyland::app"), "app");
        assert_eq!(short_target("ureq::pool"), "ureq::pool");
    }
}

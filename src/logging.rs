//! Log backend setup.
//!
//! Every record goes to a log file that rolls over at UTC midnight
//! (`<logfile>.YYYY-MM-DD`, 750 backups kept). Records are written as CSV so
//! they line up with measurement records:
//!
//! ```text
//! 2026-10-19T10:00:00.123Z,8123.456,INFO,fancontrol::drivers::devices,fan,true
//! ```
//!
//! Warnings and errors are echoed to stderr. Without a log file, stderr
//! takes every record in the CSV format instead.

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use env_logger::{Target, WriteStyle};
use log::{LevelFilter, Log, Metadata, Record};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::clock::{BootClock, Clock};

/// Today's file plus 750 days of backups.
pub const MAX_LOG_FILES: usize = 751;

/// Everything after the timestamp.
fn record_tail(uptime: f64, record: &Record<'_>) -> String {
    format!(
        "{uptime:.3},{},{},{}",
        record.level(),
        record.target(),
        record.args()
    )
}

/// Parse `off`, `error`, `warn`, `info`, `debug` or `trace` (any case).
pub fn parse_level(level: &str) -> anyhow::Result<LevelFilter> {
    level
        .parse::<LevelFilter>()
        .with_context(|| format!("unknown log level '{level}'"))
}

fn csv_builder(level: LevelFilter, env_filter: Option<&str>) -> env_logger::Builder {
    let clock = BootClock::new();
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if let Some(filters) = env_filter {
        builder.parse_filters(filters);
    }
    builder.format(move |buf, record| {
        let ts = buf.timestamp_millis();
        writeln!(buf, "{ts},{}", record_tail(clock.uptime(), record))
    });
    builder
}

fn daily_file(path: &Path) -> anyhow::Result<RollingFileAppender> {
    let name = path
        .file_name()
        .with_context(|| format!("{} does not name a file", path.display()))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(name.to_string_lossy())
        .max_log_files(MAX_LOG_FILES)
        .build(dir)?;
    Ok(appender)
}

/// File logger plus stderr logger behind one `log::Log`.
struct Loggers {
    file: Option<env_logger::Logger>,
    console: env_logger::Logger,
}

impl Loggers {
    fn new(
        level: LevelFilter,
        logfile: Option<&Path>,
        env_filter: Option<&str>,
    ) -> anyhow::Result<Self> {
        let Some(path) = logfile else {
            return Ok(Self {
                file: None,
                console: csv_builder(level, env_filter).target(Target::Stderr).build(),
            });
        };

        let file = csv_builder(level, env_filter)
            .target(Target::Pipe(Box::new(daily_file(path)?)))
            .write_style(WriteStyle::Never)
            .build();
        let console = env_logger::Builder::new()
            .filter_level(LevelFilter::Warn)
            .target(Target::Stderr)
            .format(|buf, record| {
                let ts = buf.timestamp_seconds();
                writeln!(buf, "{ts}: {}: {}", record.level(), record.args())
            })
            .build();
        Ok(Self {
            file: Some(file),
            console,
        })
    }

    fn max_level(&self) -> LevelFilter {
        let file = self.file.as_ref().map_or(LevelFilter::Off, env_logger::Logger::filter);
        file.max(self.console.filter())
    }
}

impl Log for Loggers {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.console.enabled(metadata) || self.file.as_ref().is_some_and(|f| f.enabled(metadata))
    }

    fn log(&self, record: &Record<'_>) {
        if let Some(file) = &self.file {
            file.log(record);
        }
        self.console.log(record);
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            file.flush();
        }
        self.console.flush();
    }
}

/// Install the loggers at `level`; `RUST_LOG` takes precedence.
pub fn init(level: LevelFilter, logfile: Option<&Path>) -> anyhow::Result<()> {
    let env_filter = std::env::var(env_logger::DEFAULT_FILTER_ENV).ok();
    let loggers = Loggers::new(level, logfile, env_filter.as_deref())?;
    let max = loggers.max_level();
    log::set_boxed_logger(Box::new(loggers))?;
    log::set_max_level(max);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_is_csv() {
        let line = record_tail(
            12.3456,
            &Record::builder()
                .args(format_args!("fan,{}", true))
                .level(log::Level::Info)
                .target("fancontrol::app::fan")
                .build(),
        );
        assert_eq!(line, "12.346,INFO,fancontrol::app::fan,fan,true");
    }

    #[test]
    fn levels_parse_like_the_config_file() {
        assert_eq!(parse_level("DEBUG").unwrap(), LevelFilter::Debug);
        assert_eq!(parse_level("off").unwrap(), LevelFilter::Off);
        let err = parse_level("loud").unwrap_err();
        assert!(err.to_string().contains("loud"));
    }

    #[test]
    fn records_land_in_the_dated_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let logdir = dir.path().join("log");
        let loggers = Loggers::new(LevelFilter::Info, Some(&logdir.join("fancontrol.log")), None)
            .unwrap();
        assert_eq!(loggers.console.filter(), LevelFilter::Warn);
        assert_eq!(loggers.max_level(), LevelFilter::Info);

        loggers.log(
            &Record::builder()
                .args(format_args!("fan,{}", true))
                .level(log::Level::Info)
                .target("fancontrol::app::fan")
                .build(),
        );
        loggers.log(
            &Record::builder()
                .args(format_args!("not written"))
                .level(log::Level::Debug)
                .target("fancontrol::app::fan")
                .build(),
        );
        loggers.flush();

        let files: Vec<_> = std::fs::read_dir(&logdir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("fancontrol.log."), "{name}");

        let text = std::fs::read_to_string(&files[0]).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1, "{text}");
        assert!(lines[0].ends_with(",INFO,fancontrol::app::fan,fan,true"), "{text}");
    }

    #[test]
    fn without_a_file_stderr_takes_every_level() {
        let loggers = Loggers::new(LevelFilter::Debug, None, None).unwrap();
        assert!(loggers.file.is_none());
        assert_eq!(loggers.max_level(), LevelFilter::Debug);
    }

    #[test]
    fn env_filter_overrides_the_level() {
        let dir = tempfile::tempdir().unwrap();
        let loggers =
            Loggers::new(LevelFilter::Info, Some(&dir.path().join("f.log")), Some("trace")).unwrap();
        assert_eq!(loggers.max_level(), LevelFilter::Trace);
    }
}

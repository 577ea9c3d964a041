//! Three-stream logger built on `tracing`
//!
//! A [`Logger`] fans every enabled event out to a stdout stream, a stderr
//! stream and a logfile stream. Lines look like
//!
//! ```text
//! 20260102:03:04:05 testProgram:004242-[INFO]:-Connected to testdb
//! ```
//!
//! Installing a logger makes it the current thread's default dispatcher
//! until the returned [`LoggerGuard`] is dropped.

mod buffer;

pub use buffer::CaptureBuffer;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MutexGuardWriter};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

use crate::operating::{self, FileWriter};

/// Logger verbosity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Informational messages and warnings
    #[default]
    Info,
    /// Adds `debug!` events
    Verbose,
    /// Everything, including `trace!` events
    Debug,
}

impl LogLevel {
    /// The tracing filter this verbosity corresponds to
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::ERROR,
            Self::Info => LevelFilter::INFO,
            Self::Verbose => LevelFilter::DEBUG,
            Self::Debug => LevelFilter::TRACE,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Info => write!(f, "info"),
            Self::Verbose => write!(f, "verbose"),
            Self::Debug => write!(f, "debug"),
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "verbose" => Self::Verbose,
            "debug" => Self::Debug,
            _ => Self::Info,
        }
    }
}

fn level_label(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "VERBOSE",
        Level::TRACE => "DEBUG",
    }
}

/// Line format shared by all three streams
struct LineFormat {
    program: String,
    pid: u32,
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = operating::now().format("%Y%m%d:%H:%M:%S");
        write!(
            writer,
            "{} {}:{:06}-[{}]:-",
            timestamp,
            self.program,
            self.pid,
            level_label(event.metadata().level())
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Logger writing to stdout, stderr and logfile streams
pub struct Logger {
    stdout: BoxMakeWriter,
    stderr: BoxMakeWriter,
    logfile: BoxMakeWriter,
    program: String,
    level: LogLevel,
}

impl Logger {
    pub fn new<O, E, F>(
        stdout: O,
        stderr: E,
        logfile: F,
        program: impl Into<String>,
        level: LogLevel,
    ) -> Self
    where
        O: for<'a> MakeWriter<'a> + Send + Sync + 'static,
        E: for<'a> MakeWriter<'a> + Send + Sync + 'static,
        F: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        Self {
            stdout: BoxMakeWriter::new(stdout),
            stderr: BoxMakeWriter::new(stderr),
            logfile: BoxMakeWriter::new(logfile),
            program: program.into(),
            level,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Build the tracing dispatcher without installing it
    pub fn into_dispatch(self) -> tracing::Dispatch {
        let pid = std::process::id();
        let format = |program: &str| LineFormat {
            program: program.to_string(),
            pid,
        };

        let subscriber = tracing_subscriber::registry()
            .with(self.level.level_filter())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .event_format(format(&self.program))
                    .with_writer(self.stdout),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .event_format(format(&self.program))
                    .with_writer(self.stderr),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .event_format(format(&self.program))
                    .with_writer(self.logfile),
            );

        tracing::Dispatch::new(subscriber)
    }

    /// Make this the current thread's logger
    ///
    /// Any previously installed logger comes back when the guard drops.
    pub fn install(self) -> LoggerGuard {
        let dispatch = self.into_dispatch();
        LoggerGuard {
            _guard: tracing::dispatcher::set_default(&dispatch),
        }
    }
}

/// Keeps a [`Logger`] installed for as long as it lives
#[derive(Debug)]
pub struct LoggerGuard {
    _guard: DefaultGuard,
}

/// Log file opened through [`operating::open_file_write`]
pub struct LogFile {
    path: PathBuf,
    writer: Mutex<FileWriter>,
}

impl LogFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = MutexGuardWriter<'a, FileWriter>;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer.make_writer()
    }
}

/// Open (appending) `<dir>/<program>_<YYYYMMDD>.log`
pub fn open_log_file(dir: &Path, program: &str) -> io::Result<LogFile> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }

    let date = operating::now().format("%Y%m%d");
    let path = dir.join(format!("{}_{}.log", program, date));
    let writer = operating::open_file_write(&path, OpenOptions::new().create(true).append(true))?;

    Ok(LogFile {
        path,
        writer: Mutex::new(writer),
    })
}

//! Utility items shared between assertflow crates.

use ansi_term::Colour;
use std::{env, io};
use tracing::{Level, Metadata};
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::MakeWriter,
};

pub fn println_green(txt: &str) {
    println_std_out(txt, Colour::Green);
}

pub fn println_yellow(txt: &str) {
    println_std_out(txt, Colour::Yellow);
}

pub fn println_yellow_err(txt: &str) {
    println_std_err(txt, Colour::Yellow);
}

pub fn println_red_err(txt: &str) {
    println_std_err(txt, Colour::Red);
}

fn println_std_out(txt: &str, color: Colour) {
    tracing::info!("{}", color.paint(txt));
}

fn println_std_err(txt: &str, color: Colour) {
    tracing::error!("{}", color.paint(txt));
}

const LOG_FILTER: &str = "RUST_LOG";

// ERROR and WARN level logs go to stderr and everything else to stdout.
struct StdioTracingWriter {
    writer_mode: TracingWriterMode,
}

impl<'a> MakeWriter<'a> for StdioTracingWriter {
    type Writer = Box<dyn io::Write>;

    fn make_writer(&'a self) -> Self::Writer {
        if self.writer_mode == TracingWriterMode::Stderr {
            Box::new(io::stderr())
        } else {
            // Used when there's no metadata to go by.
            Box::new(io::stdout())
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        if self.writer_mode == TracingWriterMode::Stderr
            || (self.writer_mode == TracingWriterMode::Stdio && meta.level() <= &Level::WARN)
        {
            return Box::new(io::stderr());
        }
        Box::new(io::stdout())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingWriterMode {
    /// Write ERROR and WARN to stderr and everything else to stdout.
    Stdio,
    /// Write everything to stdout.
    Stdout,
    /// Write everything to stderr.
    Stderr,
}

#[derive(Default)]
pub struct TracingSubscriberOptions {
    pub verbosity: Option<u8>,
    pub silent: Option<bool>,
    pub log_level: Option<LevelFilter>,
    pub writer_mode: Option<TracingWriterMode>,
}

impl TracingSubscriberOptions {
    /// The level filter requested explicitly, overriding `RUST_LOG`.
    ///
    /// An explicit log level wins over the verbosity count, which wins over silent mode.
    pub fn level_filter(&self) -> Option<LevelFilter> {
        self.log_level
            .or_else(|| {
                self.verbosity.and_then(|verbosity| match verbosity {
                    0 => None,
                    1 => Some(LevelFilter::DEBUG), // -v
                    _ => Some(LevelFilter::TRACE), // -vv and more
                })
            })
            .or_else(|| self.silent.filter(|silent| *silent).map(|_| LevelFilter::OFF))
    }
}

/// A subscriber built from the default `tracing_subscriber::fmt::SubscriberBuilder`, set up so
/// that `info!` output reads like plain `println!` output.
///
/// The `RUST_LOG` environment variable sets the minimum level, default is `INFO`.  An invalid
/// `RUST_LOG` is reported and ignored.  Installing a second global subscriber is a no-op.
pub fn init_tracing_subscriber(options: TracingSubscriberOptions) {
    let mut invalid_filter = None;
    let env_filter = match env::var_os(LOG_FILTER) {
        Some(_) => EnvFilter::try_from_default_env().unwrap_or_else(|err| {
            invalid_filter = Some(err.to_string());
            EnvFilter::new("info")
        }),
        None => EnvFilter::new("info"),
    };

    let builder = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_ansi(true)
        .with_level(false)
        .with_file(false)
        .with_line_number(false)
        .without_time()
        .with_target(false)
        .with_writer(StdioTracingWriter {
            writer_mode: options.writer_mode.unwrap_or(TracingWriterMode::Stdio),
        });

    // If log level, verbosity, or silent mode is set, it overrides the RUST_LOG setting.
    let installed = match options.level_filter() {
        Some(level_filter) => builder.with_max_level(level_filter).try_init(),
        None => builder.try_init(),
    };

    if installed.is_ok() {
        if let Some(err) = invalid_filter {
            tracing::warn!("Ignoring invalid `{LOG_FILTER}`: {err}");
        }
    }
}

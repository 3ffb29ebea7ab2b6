use std::fmt::Write;

use jiff::{Zoned, tz::TimeZone};
use log::{Level, Record};
use logforth::{
    append::{FastraceEvent, Stdout},
    diagnostic::FastraceDiagnostic,
    layout::{JsonLayout, Layout},
};

use crate::args::{Args, LogStyle};

/// `<UTC timestamp> <LEVEL> <target>: <message>`, the level colored on a TTY.
#[derive(Debug, Clone)]
struct RelayTextLayout {
    color: bool,
}

impl RelayTextLayout {
    fn colored() -> Self {
        Self { color: true }
    }

    fn plain() -> Self {
        Self { color: false }
    }
}

fn ansi_color(level: Level) -> &'static str {
    match level {
        Level::Error => "31",
        Level::Warn => "33",
        Level::Info => "32",
        Level::Debug => "34",
        Level::Trace => "35",
    }
}

impl Layout for RelayTextLayout {
    fn format(
        &self,
        record: &Record<'_>,
        _diagnostics: &[Box<dyn logforth::diagnostic::Diagnostic>],
    ) -> anyhow::Result<Vec<u8>> {
        let mut output = String::new();
        let now = Zoned::now().with_time_zone(TimeZone::UTC);

        write!(output, "{} ", now.strftime("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        if self.color {
            write!(output, "\x1b[{}m{:>5}\x1b[0m ", ansi_color(record.level()), record.level())?;
        } else {
            write!(output, "{:>5} ", record.level())?;
        }

        write!(output, "{}: {}", record.target(), record.args())?;

        Ok(output.into_bytes())
    }
}

pub(super) fn init(args: &Args) {
    logforth::builder()
        .dispatch(|d| d.filter(args.log_level.env_filter()).append(FastraceEvent::default()))
        .dispatch(|d| {
            let d = d
                .diagnostic(FastraceDiagnostic::default())
                .filter(args.log_level.env_filter());

            match args.log_style {
                LogStyle::Color => d.append(Stdout::default().with_layout(RelayTextLayout::colored())),
                LogStyle::Text => d.append(Stdout::default().with_layout(RelayTextLayout::plain())),
                LogStyle::Json => d.append(Stdout::default().with_layout(JsonLayout::default())),
            }
        })
        .apply();
}

//! Console log formatting for the control client binary.
//!
//! Matches the operator console layout used by the rest of the control
//! room tooling: `[timestamp] [service] [level] message`, with ANSI
//! colors when writing to a terminal.

use std::fmt;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_CYAN: &str = "\x1b[36m";
const COLOR_GREEN: &str = "\x1b[32m";
const COLOR_BRIGHT_YELLOW: &str = "\x1b[93m";
const COLOR_BRIGHT_RED: &str = "\x1b[91m";
const COLOR_BRIGHT_GRAY: &str = "\x1b[90m";

const SERVICE_NAME_WIDTH: usize = 12;
const LOG_LEVEL_WIDTH: usize = 7;

/// Fixed-column console formatter
pub struct ConsoleLogFormatter {
    service_name: String,
    color_enabled: bool,
}

impl ConsoleLogFormatter {
    pub fn new(service_name: String) -> Self {
        let color_enabled = is_terminal();
        Self {
            service_name,
            color_enabled,
        }
    }

    fn format_service_name(&self) -> String {
        if self.service_name.len() > SERVICE_NAME_WIDTH {
            format!("{}…", &self.service_name[..SERVICE_NAME_WIDTH - 1])
        } else {
            format!("{:<width$}", self.service_name, width = SERVICE_NAME_WIDTH)
        }
    }

    fn format_log_level(&self, level: &tracing::Level) -> String {
        let level_str = match *level {
            tracing::Level::ERROR => "✗ ERROR",
            tracing::Level::WARN => "⚠ WARN",
            tracing::Level::INFO => "ℹ INFO",
            tracing::Level::DEBUG => "◦ DEBUG",
            tracing::Level::TRACE => "◦ TRACE",
        };
        format!("{:<width$}", level_str, width = LOG_LEVEL_WIDTH + 2)
    }

    fn get_color_for_level(&self, level: &tracing::Level) -> &'static str {
        if !self.color_enabled {
            return "";
        }

        match *level {
            tracing::Level::ERROR => COLOR_BRIGHT_RED,
            tracing::Level::WARN => COLOR_BRIGHT_YELLOW,
            tracing::Level::INFO => COLOR_GREEN,
            tracing::Level::DEBUG => COLOR_BRIGHT_GRAY,
            tracing::Level::TRACE => COLOR_BRIGHT_GRAY,
        }
    }
}

impl<S, N> FormatEvent<S, N> for ConsoleLogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let now = chrono::Local::now();
        let timestamp = now.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

        let level = event.metadata().level();

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let color = self.get_color_for_level(level);
        let reset_color = if self.color_enabled { COLOR_RESET } else { "" };
        let cyan_color = if self.color_enabled { COLOR_CYAN } else { "" };

        write!(
            writer,
            "{}[{}] [{}] [{}{}{}] ",
            cyan_color,
            timestamp,
            self.format_service_name(),
            color,
            self.format_log_level(level),
            reset_color
        )?;

        writeln!(writer, "{}{}", visitor.message, reset_color)?;
        Ok(())
    }
}

/// Extracts the `message` field from an event
#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
            if self.message.starts_with('"') && self.message.ends_with('"') {
                self.message = self.message[1..self.message.len() - 1].to_string();
            }
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn is_terminal() -> bool {
    if std::env::var("TERM").unwrap_or_default() == "dumb" {
        return false;
    }
    std::env::var("TERM").is_ok()
}

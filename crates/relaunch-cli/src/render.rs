use std::io::IsTerminal;
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum NotificationLevel {
    Info,
    Warning,
    Error,
}

impl NotificationLevel {
    fn badge(self) -> &'static str {
        match self {
            Self::Info => "[..]",
            Self::Warning => "[WARN]",
            Self::Error => "[ERR]",
        }
    }

    fn style(self) -> Style {
        let color = match self {
            Self::Info => AnsiColor::BrightCyan,
            Self::Warning => AnsiColor::BrightYellow,
            Self::Error => AnsiColor::BrightRed,
        };
        Style::new().fg_color(Some(color.into())).effects(Effects::BOLD)
    }
}

/// User-visible messages. Rendering stays outside the launch logic.
pub(crate) trait Notifier {
    fn notify(&self, level: NotificationLevel, message: &str);

    /// Shows `message` for as long as the returned guard lives.
    fn begin(&self, message: &str) -> ActivityGuard;
}

/// Ends the activity it was created for when dropped.
#[derive(Debug, Default)]
pub(crate) struct ActivityGuard {
    progress_bar: Option<ProgressBar>,
}

impl ActivityGuard {
    pub(crate) fn silent() -> Self {
        Self::default()
    }
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalNotifier {
    style: OutputStyle,
}

impl TerminalNotifier {
    pub(crate) fn new(style: OutputStyle) -> Self {
        Self { style }
    }
}

impl Notifier for TerminalNotifier {
    fn notify(&self, level: NotificationLevel, message: &str) {
        match level {
            NotificationLevel::Info => info!("{message}"),
            NotificationLevel::Warning => warn!("{message}"),
            NotificationLevel::Error => error!("{message}"),
        }
        eprintln!("{}", render_notification(self.style, level, message));
    }

    fn begin(&self, message: &str) -> ActivityGuard {
        info!("{message}");
        if self.style == OutputStyle::Plain {
            eprintln!("{message}");
            return ActivityGuard::silent();
        }

        let progress_bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg} {elapsed}") {
            progress_bar.set_style(style.tick_chars(".:;* "));
        }
        progress_bar.set_message(message.to_string());
        progress_bar.enable_steady_tick(Duration::from_millis(80));
        ActivityGuard {
            progress_bar: Some(progress_bar),
        }
    }
}

pub(crate) fn current_output_style() -> OutputStyle {
    if std::env::var_os("NO_COLOR").is_some() || !std::io::stderr().is_terminal() {
        return OutputStyle::Plain;
    }
    OutputStyle::Rich
}

pub(crate) fn render_status_line(style: OutputStyle, level: NotificationLevel, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", level.badge()),
    }
}

fn render_notification(style: OutputStyle, level: NotificationLevel, message: &str) -> String {
    let line = render_status_line(style, level, message);
    match style {
        OutputStyle::Plain => line,
        OutputStyle::Rich => colorize(level.style(), &line),
    }
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

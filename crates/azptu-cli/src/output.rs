use std::io::{self, BufRead, IsTerminal, Write};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Human rendering of a command result.
pub trait Render {
    fn render(&self, w: &mut dyn WriteColor) -> io::Result<()>;
}

/// Where command results go: pretty JSON with `--json`, text otherwise.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn emit<T: Serialize + Render>(&self, value: &T) -> anyhow::Result<()> {
        if self.json {
            let s = serde_json::to_string_pretty(value)?;
            println!("{s}");
            return Ok(());
        }
        let mut stdout = StandardStream::stdout(color_choice());
        value.render(&mut stdout)?;
        stdout.flush()?;
        Ok(())
    }

    /// Side remarks go to stderr so stdout stays parseable.
    pub fn note(&self, msg: &str) {
        if !self.json {
            let _ = writeln!(io::stderr(), "{msg}");
        }
    }

    pub fn spinner(&self, msg: impl Into<String>) -> ProgressBar {
        if self.json {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} ({elapsed})") {
            pb.set_style(style);
        }
        pb.set_message(msg.into());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Asks on stderr and reads one line from stdin. Anything but y/yes is no.
    pub fn confirm(&self, prompt: &str) -> anyhow::Result<bool> {
        let mut err = io::stderr();
        write!(err, "{prompt} [y/N] ")?;
        err.flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

fn color_choice() -> ColorChoice {
    if io::stdout().is_terminal() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

pub fn heading(w: &mut dyn WriteColor, text: &str) -> io::Result<()> {
    w.set_color(ColorSpec::new().set_bold(true))?;
    writeln!(w, "{text}")?;
    w.reset()
}

pub fn field(w: &mut dyn WriteColor, label: &str, value: &str) -> io::Result<()> {
    w.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
    write!(w, "  {label}: ")?;
    w.reset()?;
    writeln!(w, "{value}")
}

pub fn dim(w: &mut dyn WriteColor, text: &str) -> io::Result<()> {
    w.set_color(ColorSpec::new().set_dimmed(true))?;
    writeln!(w, "{text}")?;
    w.reset()
}

pub fn success(w: &mut dyn WriteColor, text: &str) -> io::Result<()> {
    w.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
    writeln!(w, "{text}")?;
    w.reset()
}

#[cfg(test)]
pub(crate) fn render_to_string<T: Render>(value: &T) -> String {
    let mut buf = termcolor::NoColor::new(Vec::new());
    value.render(&mut buf).unwrap();
    String::from_utf8(buf.into_inner()).unwrap()
}

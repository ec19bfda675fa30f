use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

static JSON_MODE: AtomicBool = AtomicBool::new(false);

pub fn init(json: bool) {
    JSON_MODE.store(json, Ordering::Relaxed);
}

pub fn is_json() -> bool {
    JSON_MODE.load(Ordering::Relaxed)
}

/// Print `value` as pretty JSON on stdout.
pub fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    println!("{s}");
    Ok(())
}

pub fn eprintln_line(msg: &str) {
    let _ = writeln!(io::stderr(), "{msg}");
}

pub fn stdout() -> StandardStream {
    StandardStream::stdout(ColorChoice::Auto)
}

#[derive(Debug, Clone, Copy)]
pub enum Tone {
    Ok,
    Warn,
    Fail,
    Plain,
}

/// Write `label` in the tone's color followed by plain `rest`.
pub fn line(out: &mut StandardStream, tone: Tone, label: &str, rest: &str) -> io::Result<()> {
    let color = match tone {
        Tone::Ok => Some(Color::Green),
        Tone::Warn => Some(Color::Yellow),
        Tone::Fail => Some(Color::Red),
        Tone::Plain => None,
    };
    out.set_color(ColorSpec::new().set_fg(color).set_bold(color.is_some()))?;
    write!(out, "{label}")?;
    out.reset()?;
    writeln!(out, " {rest}")
}

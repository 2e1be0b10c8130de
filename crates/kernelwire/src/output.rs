use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use kernelwire_message::{ErrorContent, IoPubContent};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// One JSON document per line.
pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

/// Print one piece of broadcast output as it arrives.
pub fn print_output(content: &IoPubContent, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(content),
        OutputFormat::Raw => match content {
            IoPubContent::Stream(stream) => write_stream(&stream.name, &stream.text),
            IoPubContent::ExecuteResult(result) => print_plain(&result.data),
            IoPubContent::DisplayData(display) | IoPubContent::UpdateDisplayData(display) => {
                print_plain(&display.data)
            }
            IoPubContent::Error(error) => print_error(error),
            _ => {}
        },
        OutputFormat::Table | OutputFormat::Pretty => match content {
            IoPubContent::Stream(stream) => write_stream(&stream.name, &stream.text),
            IoPubContent::ExecuteResult(result) => {
                if let Some(text) = plain_text(&result.data) {
                    println!("Out[{}]: {text}", result.execution_count);
                }
            }
            IoPubContent::DisplayData(display) | IoPubContent::UpdateDisplayData(display) => {
                match plain_text(&display.data) {
                    Some(text) => println!("{text}"),
                    None => {
                        let kinds: Vec<&str> = display.data.keys().map(String::as_str).collect();
                        println!("<display {}>", kinds.join(", "));
                    }
                }
            }
            IoPubContent::Error(error) => print_error(error),
            IoPubContent::Unknown { msg_type, .. } => {
                tracing::debug!(msg_type = %msg_type, "unrendered output");
            }
            _ => {}
        },
    }
}

/// The `text/plain` representation of a MIME bundle.
///
/// Notebook files store multi-line text as an array of lines.
pub fn plain_text(data: &Map<String, Value>) -> Option<String> {
    match data.get("text/plain")? {
        Value::String(text) => Some(text.clone()),
        Value::Array(lines) => Some(
            lines
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .concat(),
        ),
        _ => None,
    }
}

/// Remove terminal color sequences (`ESC [ ... letter`) from kernel tracebacks.
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

fn print_plain(data: &Map<String, Value>) {
    if let Some(text) = plain_text(data) {
        println!("{text}");
    }
}

fn print_error(error: &ErrorContent) {
    if error.traceback.is_empty() {
        eprintln!("{}: {}", error.ename, error.evalue);
        return;
    }
    for line in &error.traceback {
        eprintln!("{}", strip_ansi(line));
    }
}

fn write_stream(name: &str, text: &str) {
    if name == "stderr" {
        let mut err = std::io::stderr();
        let _ = err.write_all(text.as_bytes());
        let _ = err.flush();
    } else {
        let mut out = std::io::stdout();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

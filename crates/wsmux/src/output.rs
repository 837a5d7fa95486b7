use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;
use wsmux::client::Event;

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

#[derive(Serialize)]
struct EventOutput<'a> {
    subscription: u64,
    event: &'a Value,
    timestamp: String,
}

/// Print a call result.
pub fn print_result(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{value}"),
        OutputFormat::Pretty => println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        ),
        OutputFormat::Table => println!("{}", value_table(value)),
        OutputFormat::Raw => print_raw(value),
    }
}

/// Print one subscription event.
pub fn print_event(event: &Event, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = EventOutput {
                subscription: event.id,
                event: &event.payload,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SUBSCRIPTION", "EVENT"])
                .add_row(vec![event.id.to_string(), event.payload.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("subscription={} event={}", event.id, event.payload);
        }
        OutputFormat::Raw => print_raw(&event.payload),
    }
}

/// Strings are written bare; everything else as compact JSON.
pub fn print_raw(value: &Value) {
    let mut out = std::io::stdout();
    let _ = match value {
        Value::String(text) => writeln!(out, "{text}"),
        other => writeln!(out, "{other}"),
    };
    let _ = out.flush();
}

fn value_table(value: &Value) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    match value {
        Value::Object(map) => {
            table.set_header(vec!["KEY", "VALUE"]);
            for (key, value) in map {
                table.add_row(vec![key.clone(), cell(value)]);
            }
        }
        Value::Array(items) => {
            table.set_header(vec!["INDEX", "VALUE"]);
            for (index, value) in items.iter().enumerate() {
                table.add_row(vec![index.to_string(), cell(value)]);
            }
        }
        other => {
            table.set_header(vec!["VALUE"]);
            table.add_row(vec![cell(other)]);
        }
    }
    table
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

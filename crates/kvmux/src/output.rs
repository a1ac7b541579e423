use std::io::{IsTerminal, Write};
use std::time::Duration;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use kvmux_client::Value;
use serde::Serialize;

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
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// JSON view of a value: nil is `null`, the OK acknowledgement is `"OK"`.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Nil => serde_json::Value::Null,
        Value::Okay => serde_json::Value::String("OK".to_string()),
        Value::Int(n) => serde_json::Value::from(*n),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => items.iter().map(value_to_json).collect(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Nil => "nil",
        Value::Okay => "status",
        Value::Int(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(_) => value_to_json(value).to_string(),
        other => other.to_string(),
    }
}

pub fn print_value(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", value_to_json(value)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);
            match value {
                Value::Array(items) => {
                    table.set_header(vec!["#", "TYPE", "VALUE"]);
                    for (i, item) in items.iter().enumerate() {
                        table.add_row(vec![
                            (i + 1).to_string(),
                            type_name(item).to_string(),
                            cell(item),
                        ]);
                    }
                }
                other => {
                    table
                        .set_header(vec!["TYPE", "VALUE"])
                        .add_row(vec![type_name(other).to_string(), cell(other)]);
                }
            }
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{value}"),
        OutputFormat::Raw => match value {
            Value::String(s) => print_raw(s.as_bytes()),
            other => print_raw(format!("{other}\n").as_bytes()),
        },
    }
}

/// Print a transaction result. `None` means the peer aborted it.
pub fn print_batch(values: Option<&[Value]>, format: OutputFormat) {
    match values {
        Some(values) => print_value(&Value::Array(values.to_vec()), format),
        None => match format {
            OutputFormat::Json => println!("{}", serde_json::json!({ "aborted": true })),
            _ => println!("(transaction aborted)"),
        },
    }
}

#[derive(Serialize)]
struct PingOutput {
    count: usize,
    min_us: u128,
    avg_us: u128,
    max_us: u128,
}

pub fn print_ping(samples: &[Duration], format: OutputFormat) {
    let count = samples.len();
    let min = samples.iter().min().copied().unwrap_or_default();
    let max = samples.iter().max().copied().unwrap_or_default();
    let total: Duration = samples.iter().sum();
    let avg = if count == 0 {
        Duration::ZERO
    } else {
        total / count as u32
    };

    match format {
        OutputFormat::Json => {
            let out = PingOutput {
                count,
                min_us: min.as_micros(),
                avg_us: avg.as_micros(),
                max_us: max.as_micros(),
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
                .set_header(vec!["COUNT", "MIN", "AVG", "MAX"])
                .add_row(vec![
                    count.to_string(),
                    format!("{min:?}"),
                    format!("{avg:?}"),
                    format!("{max:?}"),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!("{count} pings: min={min:?} avg={avg:?} max={max:?}");
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

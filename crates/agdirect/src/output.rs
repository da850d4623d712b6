use std::io::IsTerminal;

use agdirect_link::ServerInfo;
use agdirect_wire::{Sequence, Value};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::json;

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

#[derive(Serialize)]
struct CallOutput<'a> {
    operation: &'a str,
    style: &'a str,
    peer: &'a str,
    results: Vec<serde_json::Value>,
}

/// Print the results of one call.
pub fn print_results(operation: &str, style: &str, peer: &str, values: &[Value], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = CallOutput {
                operation,
                style,
                peer,
                results: values.iter().map(value_to_json).collect(),
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
                .set_header(vec!["#", "KIND", "VALUE"]);
            for (index, value) in values.iter().enumerate() {
                table.add_row(vec![
                    index.to_string(),
                    value.kind_name().to_string(),
                    value.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{operation} ({style}) -> {} result(s)", values.len());
            for (index, value) in values.iter().enumerate() {
                println!("  [{index}] {}: {value}", value.kind_name());
            }
        }
        OutputFormat::Raw => {
            for value in values {
                println!("{value}");
            }
        }
    }
}

pub fn print_server_info(info: &ServerInfo, peer: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = json!({
                "peer": peer,
                "version": info.version,
                "server_level": info.server_level,
                "verified": true,
            });
            println!("{out}");
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Server:");
            println!("  Peer:         {peer}");
            println!("  Version:      {}", info.version);
            match info.server_level {
                Some(level) => println!("  Server level: {level}"),
                None => println!("  Server level: unknown"),
            }
        }
        OutputFormat::Raw => println!("{}", info.version),
    }
}

/// JSON rendering of a wire value. Floats that JSON cannot carry become
/// strings; bytes become lowercase hex.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Integer(n) => json!(n),
        Value::Byte(n) => json!(n),
        Value::Short(n) => json!(n),
        Value::Int(n) => json!(n),
        Value::Char(unit) => json!(String::from_utf16_lossy(&[*unit])),
        Value::Float(f) => float_to_json(f64::from(*f)),
        Value::Double(f) => float_to_json(*f),
        Value::Text(text) => json!(text.to_string_lossy()),
        Value::Bytes(bytes) => json!(hex(bytes)),
        Value::Upi(upi) => json!({ "upi": upi.to_string() }),
        Value::Sequence(seq) => sequence_to_json(seq),
    }
}

fn sequence_to_json(seq: &Sequence) -> serde_json::Value {
    json!({
        "kind": seq.kind().as_str(),
        "items": seq.to_values().iter().map(value_to_json).collect::<Vec<_>>(),
    })
}

fn float_to_json(f: f64) -> serde_json::Value {
    serde_json::Number::from_f64(f)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|| json!(f.to_string()))
}

pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agdirect_wire::Upi;

    #[test]
    fn scalars_map_to_plain_json() {
        assert_eq!(value_to_json(&Value::Integer(42)), json!(42));
        assert_eq!(value_to_json(&Value::from("hi")), json!("hi"));
        assert_eq!(value_to_json(&Value::Null), serde_json::Value::Null);
        assert_eq!(value_to_json(&Value::Char(u16::from(b'x'))), json!("x"));
        assert_eq!(value_to_json(&Value::Double(f64::NAN)), json!("NaN"));
    }

    #[test]
    fn composite_values() {
        let upi = Upi::from_bytes([0; 12]);
        assert_eq!(
            value_to_json(&Value::Upi(upi)),
            json!({ "upi": "000000000000000000000000" })
        );
        let seq = Sequence::Int(vec![1, 2]);
        assert_eq!(
            value_to_json(&Value::Sequence(seq)),
            json!({ "kind": "int", "items": [1, 2] })
        );
        assert_eq!(
            value_to_json(&Value::Bytes(bytes::Bytes::from_static(&[0xde, 0xad]))),
            json!("dead")
        );
    }
}

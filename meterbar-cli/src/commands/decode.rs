//! Decode command - dump the field tree of an undocumented binary blob.
//!
//! No schema is involved: length-delimited payloads are shown as text when
//! they read as printable UTF-8, as a nested message when they decode as
//! one, and as hex otherwise.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::Args;
use meterbar_core::wire::{self, RawValue, WireMessage};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::output::JsonFormatter;
use crate::{Cli, ExitCode, OutputFormat};

/// Nested messages deeper than this are shown as bytes.
const MAX_DEPTH: usize = 16;

/// Hex output is cut after this many bytes.
const MAX_HEX_BYTES: usize = 64;

/// Arguments for the decode command.
#[derive(Args)]
pub struct DecodeArgs {
    /// File holding the encoded blob.
    pub file: PathBuf,

    /// The file holds base64 text rather than raw bytes.
    #[arg(long)]
    pub base64: bool,
}

// ============================================================================
// Field Tree
// ============================================================================

/// One decoded field occurrence.
#[derive(Debug, Serialize)]
struct FieldNode {
    field: u32,
    wire_type: String,
    #[serde(flatten)]
    value: NodeValue,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum NodeValue {
    Varint { value: u64, zigzag: i64 },
    Fixed64 { hex: String, double: f64 },
    Fixed32 { hex: String, float: f32 },
    Text { len: usize, text: String },
    Message { len: usize, fields: Vec<FieldNode> },
    Bytes { len: usize, hex: String },
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().min(MAX_HEX_BYTES) * 2 + 3);
    for b in bytes.iter().take(MAX_HEX_BYTES) {
        let _ = write!(out, "{b:02x}");
    }
    if bytes.len() > MAX_HEX_BYTES {
        out.push_str("...");
    }
    out
}

/// Printable means valid UTF-8 with no control characters besides tab.
fn printable(bytes: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(bytes).ok()?;
    let ok = !text.is_empty() && text.chars().all(|c| c == '\t' || !c.is_control());
    ok.then_some(text)
}

fn node_value(value: &RawValue, depth: usize) -> NodeValue {
    match value {
        RawValue::Varint(v) => NodeValue::Varint {
            value: *v,
            zigzag: value.as_i64_zigzag().unwrap_or_default(),
        },
        RawValue::Fixed64(raw) => NodeValue::Fixed64 {
            hex: hex(raw),
            double: value.as_f64().unwrap_or_default(),
        },
        RawValue::Fixed32(raw) => NodeValue::Fixed32 {
            hex: hex(raw),
            float: value.as_f32().unwrap_or_default(),
        },
        RawValue::Bytes(bytes) => {
            if let Some(text) = printable(bytes) {
                return NodeValue::Text {
                    len: bytes.len(),
                    text: text.to_string(),
                };
            }
            if depth < MAX_DEPTH {
                if let Ok(nested) = wire::decode(bytes) {
                    if !nested.is_empty() {
                        return NodeValue::Message {
                            len: bytes.len(),
                            fields: tree(&nested, depth + 1),
                        };
                    }
                }
            }
            NodeValue::Bytes {
                len: bytes.len(),
                hex: hex(bytes),
            }
        }
    }
}

fn tree(message: &WireMessage, depth: usize) -> Vec<FieldNode> {
    message
        .iter()
        .flat_map(|(field, values)| {
            values.iter().map(move |value| FieldNode {
                field,
                wire_type: value.wire_type().to_string(),
                value: node_value(value, depth),
            })
        })
        .collect()
}

fn render_text(nodes: &[FieldNode], indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    for node in nodes {
        let _ = write!(out, "{pad}{} ({}): ", node.field, node.wire_type);
        match &node.value {
            NodeValue::Varint { value, zigzag } => {
                let _ = writeln!(out, "{value} (zigzag {zigzag})");
            }
            NodeValue::Fixed64 { hex, double } => {
                let _ = writeln!(out, "{hex} (double {double})");
            }
            NodeValue::Fixed32 { hex, float } => {
                let _ = writeln!(out, "{hex} (float {float})");
            }
            NodeValue::Text { len, text } => {
                let _ = writeln!(out, "[{len}] {text:?}");
            }
            NodeValue::Message { len, fields } => {
                let _ = writeln!(out, "[{len}] {{");
                render_text(fields, indent + 1, out);
                let _ = writeln!(out, "{pad}}}");
            }
            NodeValue::Bytes { len, hex } => {
                let _ = writeln!(out, "[{len}] 0x{hex}");
            }
        }
    }
}

// ============================================================================
// Command
// ============================================================================

fn read_input(raw: Vec<u8>, base64: bool) -> Result<Vec<u8>> {
    if !base64 {
        return Ok(raw);
    }
    let text = String::from_utf8(raw).context("Base64 input is not UTF-8 text")?;
    let cleaned: String = text.split_whitespace().collect();
    STANDARD.decode(cleaned).context("Invalid base64 input")
}

/// Runs the decode command.
pub async fn run(args: &DecodeArgs, cli: &Cli) -> Result<ExitCode> {
    let raw = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let bytes = read_input(raw, args.base64)?;
    debug!(bytes = bytes.len(), file = %args.file.display(), "Decoding blob");

    let message = match wire::decode(&bytes) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "Blob does not decode");
            if !cli.quiet {
                eprintln!("Error: {e}");
            }
            return Ok(ExitCode::ParseError);
        }
    };
    let nodes = tree(&message, 0);

    match cli.format {
        OutputFormat::Text => {
            let mut out = String::new();
            render_text(&nodes, 0, &mut out);
            print!("{out}");
        }
        OutputFormat::Json => {
            println!("{}", JsonFormatter::new(cli.pretty).format(&nodes)?);
        }
    }
    Ok(ExitCode::Success)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // field 1 varint 150, field 2 bytes "hi", field 3 message { 1: 7 }
    const BLOB: &[u8] = &[0x08, 0x96, 0x01, 0x12, 0x02, b'h', b'i', 0x1a, 0x02, 0x08, 0x07];

    #[test]
    fn test_tree_shapes() {
        let message = wire::decode(BLOB).unwrap();
        let nodes = tree(&message, 0);
        assert_eq!(nodes.len(), 3);

        assert!(matches!(nodes[0].value, NodeValue::Varint { value: 150, .. }));
        assert!(matches!(&nodes[1].value, NodeValue::Text { text, .. } if text == "hi"));
        let NodeValue::Message { fields, .. } = &nodes[2].value else {
            panic!("expected nested message");
        };
        assert!(matches!(fields[0].value, NodeValue::Varint { value: 7, .. }));
    }

    #[test]
    fn test_undecodable_bytes_fall_back_to_hex() {
        // field 1 bytes [0xff, 0xff]: neither text nor a message
        let message = wire::decode(&[0x0a, 0x02, 0xff, 0xff]).unwrap();
        let nodes = tree(&message, 0);
        let NodeValue::Bytes { len, hex } = &nodes[0].value else {
            panic!("expected raw bytes");
        };
        assert_eq!(*len, 2);
        assert_eq!(hex, "ffff");
    }

    #[test]
    fn test_render_text() {
        let message = wire::decode(BLOB).unwrap();
        let mut out = String::new();
        render_text(&tree(&message, 0), 0, &mut out);
        assert!(out.contains("1 (varint): 150"));
        assert!(out.contains("2 (bytes): [2] \"hi\""));
        assert!(out.contains("  1 (varint): 7"));
    }

    #[test]
    fn test_json_tree() {
        let message = wire::decode(BLOB).unwrap();
        let json = serde_json::to_value(tree(&message, 0)).unwrap();
        assert_eq!(json[0]["kind"], "varint");
        assert_eq!(json[0]["field"], 1);
        assert_eq!(json[2]["kind"], "message");
        assert_eq!(json[2]["fields"][0]["value"], 7);
    }

    #[test]
    fn test_base64_input() {
        let encoded = STANDARD.encode(BLOB);
        let wrapped = format!("{}\n{}\n", &encoded[..4], &encoded[4..]);
        assert_eq!(read_input(wrapped.into_bytes(), true).unwrap(), BLOB);
        assert!(read_input(b"!!!".to_vec(), true).is_err());
        assert_eq!(read_input(BLOB.to_vec(), false).unwrap(), BLOB);
    }

    #[test]
    fn test_hex_is_truncated() {
        let long = vec![0xab; MAX_HEX_BYTES + 1];
        assert!(hex(&long).ends_with("..."));
        assert_eq!(hex(&[0x01, 0x2f]), "012f");
    }
}

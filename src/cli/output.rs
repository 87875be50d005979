//! Rendering of documents and frames for terminal output

use colored_json::prelude::*;
use std::fmt::Write as _;

use crate::bson::{Bson, Document};
use crate::wire::{Framed, WireMessage};

/// Formats documents as relaxed Extended JSON
pub struct DocumentPrinter {
    use_colors: bool,
    pretty: bool,
}

impl DocumentPrinter {
    /// Create a printer
    ///
    /// # Arguments
    /// * `use_colors` - Colorize pretty output when the terminal supports it
    /// * `pretty` - Indent output instead of one document per line
    pub fn new(use_colors: bool, pretty: bool) -> Self {
        Self { use_colors, pretty }
    }

    pub fn format_document(&self, doc: &Document) -> String {
        let value = doc.clone().into_relaxed_json();
        let json_str = if self.pretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        }
        .unwrap_or_else(|_| format!("{doc:?}"));

        // compact output stays plain for piping
        if self.use_colors && self.pretty {
            json_str.to_colored_json_auto().unwrap_or(json_str)
        } else {
            json_str
        }
    }

    pub fn format_value(&self, value: &Bson) -> String {
        let json = value.clone().into_relaxed_json();
        serde_json::to_string(&json).unwrap_or_else(|_| format!("{value:?}"))
    }
}

/// Describe a framed message: header fields followed by hex rows
pub fn describe_frame(message: &WireMessage<Framed>) -> String {
    let header = message.header();
    let mut out = format!(
        "{} messageLength={} requestID={} responseTo={}\n",
        header.op_code, header.message_length, header.request_id, header.response_to
    );
    for (row, chunk) in message.as_bytes().chunks(16).enumerate() {
        let _ = writeln!(out, "{:08x}  {}", row * 16, hex::encode(chunk));
    }
    out
}

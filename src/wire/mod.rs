//! MongoDB legacy wire protocol
//!
//! This module frames requests and parses replies:
//! - Standard 16-byte message header and opcodes
//! - Typed message lifecycle (built, framed, sent)
//! - Request bodies for insert, query, get-more, update, delete and
//!   kill-cursors
//! - `OP_REPLY` parsing with correlation checks
//!
//! Framing never performs I/O; see [`crate::transport`] for that.

mod client;
mod header;
mod message;
mod ops;
mod reply;
mod request_id;

pub use client::WireClient;
pub use header::{HEADER_LEN, MessageHeader, OpCode};
pub use message::{Built, Framed, Sent, WireMessage};
pub use ops::{
    DeleteFlags, InsertFlags, Namespace, Operation, QueryFlags, QueryOptions, ReplyFlags, UpdateFlags,
    build_delete_message, build_get_more_message, build_insert_message, build_kill_cursors_message,
    build_query_message, build_update_message, parse_request,
};
pub use reply::{Reply, parse_reply};
pub use request_id::RequestIdGenerator;

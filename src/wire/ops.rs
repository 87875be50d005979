//! Request operations and their bodies
//!
//! Each builder assembles one operation's body, wraps it in a
//! [`WireMessage`] and frames it. [`parse_request`] reads a framed request
//! back into an [`Operation`] for inspection.

use std::fmt;
use std::ops::BitOr;

use tracing::debug;

use super::header::{HEADER_LEN, MessageHeader, OpCode, read_i32};
use super::message::{Framed, WireMessage};
use crate::bson::{Document, Encoder, FieldPath, decode_document_prefix};
use crate::error::{CodecError, ProtocolError, Result};

/// Full collection name, `database.collection`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    full: String,
    dot: usize,
}

impl Namespace {
    /// Validate a namespace string
    ///
    /// # Returns
    /// * `InvalidNamespace` when the database or collection part is empty,
    ///   the dot is missing, or the text contains NUL
    pub fn parse(text: &str) -> Result<Self> {
        if text.contains('\0') {
            return Err(ProtocolError::InvalidNamespace(text.replace('\0', "\\0")).into());
        }
        match text.find('.') {
            Some(dot) if dot > 0 && dot + 1 < text.len() => Ok(Self {
                full: text.to_string(),
                dot,
            }),
            _ => Err(ProtocolError::InvalidNamespace(text.to_string()).into()),
        }
    }

    pub fn database(&self) -> &str {
        &self.full[..self.dot]
    }

    pub fn collection(&self) -> &str {
        &self.full[self.dot + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.full
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl std::str::FromStr for Namespace {
    type Err = crate::error::WireError;

    fn from_str(s: &str) -> Result<Self> {
        Namespace::parse(s)
    }
}

macro_rules! wire_flags {
    ($(#[$meta:meta])* $name:ident { $($(#[$fmeta:meta])* $flag:ident = $bit:expr),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $name(i32);

        impl $name {
            pub const NONE: Self = Self(0);
            $( $(#[$fmeta])* pub const $flag: Self = Self($bit); )*

            pub const fn from_bits(bits: i32) -> Self {
                Self(bits)
            }

            pub const fn bits(self) -> i32 {
                self.0
            }

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }
    };
}

wire_flags!(
    /// `OP_INSERT` flags
    InsertFlags {
        /// Keep inserting after a failed document
        CONTINUE_ON_ERROR = 1,
    }
);

wire_flags!(
    /// `OP_QUERY` flags
    QueryFlags {
        TAILABLE_CURSOR = 1 << 1,
        SLAVE_OK = 1 << 2,
        OPLOG_REPLAY = 1 << 3,
        NO_CURSOR_TIMEOUT = 1 << 4,
        AWAIT_DATA = 1 << 5,
        EXHAUST = 1 << 6,
        PARTIAL = 1 << 7,
    }
);

wire_flags!(
    /// `OP_UPDATE` flags
    UpdateFlags {
        UPSERT = 1,
        MULTI_UPDATE = 1 << 1,
    }
);

wire_flags!(
    /// `OP_DELETE` flags
    DeleteFlags {
        SINGLE_REMOVE = 1,
    }
);

wire_flags!(
    /// `OP_REPLY` response flags
    ReplyFlags {
        CURSOR_NOT_FOUND = 1,
        QUERY_FAILURE = 1 << 1,
        SHARD_CONFIG_STALE = 1 << 2,
        AWAIT_CAPABLE = 1 << 3,
    }
);

/// Optional parts of an `OP_QUERY`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    pub flags: QueryFlags,
    pub skip: i32,

    /// 0 lets the server pick the batch size; negative closes the cursor
    /// after one batch
    pub number_to_return: i32,

    pub field_selector: Option<Document>,
}

/// A request operation with its body fields
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Insert {
        flags: InsertFlags,
        namespace: Namespace,
        documents: Vec<Document>,
    },
    Query {
        namespace: Namespace,
        query: Document,
        options: QueryOptions,
    },
    GetMore {
        namespace: Namespace,
        number_to_return: i32,
        cursor_id: i64,
    },
    Update {
        namespace: Namespace,
        flags: UpdateFlags,
        selector: Document,
        update: Document,
    },
    Delete {
        namespace: Namespace,
        flags: DeleteFlags,
        selector: Document,
    },
    KillCursors {
        cursor_ids: Vec<i64>,
    },
}

impl Operation {
    pub fn op_code(&self) -> OpCode {
        match self {
            Operation::Insert { .. } => OpCode::Insert,
            Operation::Query { .. } => OpCode::Query,
            Operation::GetMore { .. } => OpCode::GetMore,
            Operation::Update { .. } => OpCode::Update,
            Operation::Delete { .. } => OpCode::Delete,
            Operation::KillCursors { .. } => OpCode::KillCursors,
        }
    }

    pub fn namespace(&self) -> Option<&Namespace> {
        match self {
            Operation::Insert { namespace, .. }
            | Operation::Query { namespace, .. }
            | Operation::GetMore { namespace, .. }
            | Operation::Update { namespace, .. }
            | Operation::Delete { namespace, .. } => Some(namespace),
            Operation::KillCursors { .. } => None,
        }
    }

    /// Assemble the body and frame it
    pub fn into_message(self, request_id: i32) -> Result<WireMessage<Framed>> {
        let body = match &self {
            Operation::Insert {
                flags,
                namespace,
                documents,
            } => insert_body(*flags, namespace, documents)?,
            Operation::Query {
                namespace,
                query,
                options,
            } => query_body(namespace, query, options)?,
            Operation::GetMore {
                namespace,
                number_to_return,
                cursor_id,
            } => get_more_body(namespace, *number_to_return, *cursor_id)?,
            Operation::Update {
                namespace,
                flags,
                selector,
                update,
            } => update_body(namespace, *flags, selector, update)?,
            Operation::Delete {
                namespace,
                flags,
                selector,
            } => delete_body(namespace, *flags, selector)?,
            Operation::KillCursors { cursor_ids } => kill_cursors_body(cursor_ids)?,
        };
        frame(self.op_code(), request_id, body)
    }
}

fn frame(op_code: OpCode, request_id: i32, body: Vec<u8>) -> Result<WireMessage<Framed>> {
    let framed = WireMessage::new(op_code, request_id, body).frame()?;
    debug!(op = %op_code, request_id, length = framed.len(), "built request");
    Ok(framed)
}

fn write_namespace(encoder: &mut Encoder, namespace: &Namespace) -> Result<()> {
    encoder.write_cstring(namespace.as_str(), &FieldPath::Root)
}

fn insert_body(flags: InsertFlags, namespace: &Namespace, documents: &[Document]) -> Result<Vec<u8>> {
    if documents.is_empty() {
        return Err(CodecError::InvalidState(format!("insert into {namespace} needs at least one document")).into());
    }
    let mut encoder = Encoder::new();
    encoder.write_i32(flags.bits());
    write_namespace(&mut encoder, namespace)?;
    for doc in documents {
        encoder.write_document(doc, &FieldPath::Root)?;
    }
    Ok(encoder.into_bytes())
}

fn query_body(namespace: &Namespace, query: &Document, options: &QueryOptions) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new();
    encoder.write_i32(options.flags.bits());
    write_namespace(&mut encoder, namespace)?;
    encoder.write_i32(options.skip);
    encoder.write_i32(options.number_to_return);
    encoder.write_document(query, &FieldPath::Root)?;
    if let Some(fields) = &options.field_selector {
        encoder.write_document(fields, &FieldPath::Root)?;
    }
    Ok(encoder.into_bytes())
}

fn get_more_body(namespace: &Namespace, number_to_return: i32, cursor_id: i64) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new();
    encoder.write_i32(0);
    write_namespace(&mut encoder, namespace)?;
    encoder.write_i32(number_to_return);
    encoder.write_i64(cursor_id);
    Ok(encoder.into_bytes())
}

fn update_body(namespace: &Namespace, flags: UpdateFlags, selector: &Document, update: &Document) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new();
    encoder.write_i32(0);
    write_namespace(&mut encoder, namespace)?;
    encoder.write_i32(flags.bits());
    encoder.write_document(selector, &FieldPath::Root)?;
    encoder.write_document(update, &FieldPath::Root)?;
    Ok(encoder.into_bytes())
}

fn delete_body(namespace: &Namespace, flags: DeleteFlags, selector: &Document) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new();
    encoder.write_i32(0);
    write_namespace(&mut encoder, namespace)?;
    encoder.write_i32(flags.bits());
    encoder.write_document(selector, &FieldPath::Root)?;
    Ok(encoder.into_bytes())
}

fn kill_cursors_body(cursor_ids: &[i64]) -> Result<Vec<u8>> {
    if cursor_ids.is_empty() {
        return Err(CodecError::InvalidState("kill cursors needs at least one cursor id".to_string()).into());
    }
    let count = i32::try_from(cursor_ids.len())
        .map_err(|_| CodecError::InvalidState(format!("{} cursor ids do not fit one message", cursor_ids.len())))?;
    let mut encoder = Encoder::new();
    encoder.write_i32(0);
    encoder.write_i32(count);
    for id in cursor_ids {
        encoder.write_i64(*id);
    }
    Ok(encoder.into_bytes())
}

/// Build a framed `OP_INSERT`
///
/// # Arguments
/// * `request_id` - Id the reply (if any) will answer to
/// * `namespace` - Target collection, `database.collection`
/// * `documents` - One or more documents, written back to back
/// * `flags` - `InsertFlags::CONTINUE_ON_ERROR` or none
pub fn build_insert_message(
    request_id: i32,
    namespace: &str,
    documents: &[Document],
    flags: InsertFlags,
) -> Result<WireMessage<Framed>> {
    let namespace = Namespace::parse(namespace)?;
    frame(OpCode::Insert, request_id, insert_body(flags, &namespace, documents)?)
}

/// Build a framed `OP_QUERY`
pub fn build_query_message(
    request_id: i32,
    namespace: &str,
    query: &Document,
    options: &QueryOptions,
) -> Result<WireMessage<Framed>> {
    let namespace = Namespace::parse(namespace)?;
    frame(OpCode::Query, request_id, query_body(&namespace, query, options)?)
}

/// Build a framed `OP_GET_MORE` for an open cursor
pub fn build_get_more_message(
    request_id: i32,
    namespace: &str,
    number_to_return: i32,
    cursor_id: i64,
) -> Result<WireMessage<Framed>> {
    let namespace = Namespace::parse(namespace)?;
    frame(
        OpCode::GetMore,
        request_id,
        get_more_body(&namespace, number_to_return, cursor_id)?,
    )
}

/// Build a framed `OP_UPDATE`
pub fn build_update_message(
    request_id: i32,
    namespace: &str,
    selector: &Document,
    update: &Document,
    flags: UpdateFlags,
) -> Result<WireMessage<Framed>> {
    let namespace = Namespace::parse(namespace)?;
    frame(OpCode::Update, request_id, update_body(&namespace, flags, selector, update)?)
}

/// Build a framed `OP_DELETE`
pub fn build_delete_message(
    request_id: i32,
    namespace: &str,
    selector: &Document,
    flags: DeleteFlags,
) -> Result<WireMessage<Framed>> {
    let namespace = Namespace::parse(namespace)?;
    frame(OpCode::Delete, request_id, delete_body(&namespace, flags, selector)?)
}

/// Build a framed `OP_KILL_CURSORS`
pub fn build_kill_cursors_message(request_id: i32, cursor_ids: &[i64]) -> Result<WireMessage<Framed>> {
    frame(OpCode::KillCursors, request_id, kill_cursors_body(cursor_ids)?)
}

/// Parse a complete framed request
///
/// # Returns
/// * `Framing` when the length prefix disagrees with `bytes`, the opcode is
///   `OP_REPLY`, or the body does not match its operation's layout
pub fn parse_request(bytes: &[u8]) -> Result<(MessageHeader, Operation)> {
    let header = MessageHeader::parse(bytes)?;
    if header.message_length as usize != bytes.len() {
        return Err(ProtocolError::Framing(format!(
            "length prefix {} does not match {} bytes",
            header.message_length,
            bytes.len()
        ))
        .into());
    }
    let mut body = BodyReader::new(&bytes[HEADER_LEN..]);

    let operation = match header.op_code {
        OpCode::Insert => {
            let flags = InsertFlags::from_bits(body.i32()?);
            let namespace = body.namespace()?;
            let mut documents = Vec::new();
            while !body.is_done() {
                documents.push(body.document()?);
            }
            if documents.is_empty() {
                return Err(ProtocolError::Framing("insert carries no documents".to_string()).into());
            }
            Operation::Insert {
                flags,
                namespace,
                documents,
            }
        }
        OpCode::Query => {
            let flags = QueryFlags::from_bits(body.i32()?);
            let namespace = body.namespace()?;
            let skip = body.i32()?;
            let number_to_return = body.i32()?;
            let query = body.document()?;
            let field_selector = if body.is_done() { None } else { Some(body.document()?) };
            Operation::Query {
                namespace,
                query,
                options: QueryOptions {
                    flags,
                    skip,
                    number_to_return,
                    field_selector,
                },
            }
        }
        OpCode::GetMore => {
            body.i32()?;
            Operation::GetMore {
                namespace: body.namespace()?,
                number_to_return: body.i32()?,
                cursor_id: body.i64()?,
            }
        }
        OpCode::Update => {
            body.i32()?;
            Operation::Update {
                namespace: body.namespace()?,
                flags: UpdateFlags::from_bits(body.i32()?),
                selector: body.document()?,
                update: body.document()?,
            }
        }
        OpCode::Delete => {
            body.i32()?;
            Operation::Delete {
                namespace: body.namespace()?,
                flags: DeleteFlags::from_bits(body.i32()?),
                selector: body.document()?,
            }
        }
        OpCode::KillCursors => {
            body.i32()?;
            let count = body.i32()?;
            let count = usize::try_from(count)
                .map_err(|_| ProtocolError::Framing(format!("negative cursor count {count}")))?;
            let mut cursor_ids = Vec::with_capacity(count.min(body.remaining() / 8));
            for _ in 0..count {
                cursor_ids.push(body.i64()?);
            }
            Operation::KillCursors { cursor_ids }
        }
        OpCode::Reply => {
            return Err(ProtocolError::Framing("OP_REPLY is not a request".to_string()).into());
        }
    };

    if !body.is_done() {
        return Err(ProtocolError::Framing(format!(
            "{} trailing bytes after {} body",
            body.remaining(),
            header.op_code
        ))
        .into());
    }
    Ok((header, operation))
}

/// Cursor over a message body
pub(crate) struct BodyReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BodyReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.pos == self.buf.len()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(ProtocolError::Framing(format!(
                "body ends at {} while reading {what} at offset {}",
                self.buf.len(),
                self.pos
            ))
            .into());
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub(crate) fn i32(&mut self) -> Result<i32> {
        let bytes = self.take(4, "i32")?;
        Ok(read_i32(bytes, 0))
    }

    pub(crate) fn i64(&mut self) -> Result<i64> {
        let bytes = self.take(8, "i64")?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(raw))
    }

    fn namespace(&mut self) -> Result<Namespace> {
        let rest = &self.buf[self.pos..];
        let Some(nul) = rest.iter().position(|&b| b == 0) else {
            return Err(ProtocolError::Framing("unterminated namespace".to_string()).into());
        };
        let text = std::str::from_utf8(&rest[..nul])
            .map_err(|_| ProtocolError::Framing("namespace is not valid UTF-8".to_string()))?;
        let namespace = Namespace::parse(text)?;
        self.pos += nul + 1;
        Ok(namespace)
    }

    /// Read one document; a document running past the body is a framing error
    pub(crate) fn document(&mut self) -> Result<Document> {
        let rest = &self.buf[self.pos..];
        let declared = if rest.len() >= 4 { read_i32(rest, 0) } else { -1 };
        if declared < 0 || declared as usize > rest.len() {
            return Err(ProtocolError::Framing(format!(
                "document at body offset {} does not fit the {} remaining bytes",
                self.pos,
                rest.len()
            ))
            .into());
        }
        let (doc, used) = decode_document_prefix(rest)?;
        self.pos += used;
        Ok(doc)
    }
}

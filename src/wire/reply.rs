//! `OP_REPLY` parsing
//!
//! Layout after the standard header:
//!
//! ```text
//! i32 responseFlags | i64 cursorID | i32 startingFrom | i32 numberReturned | document*
//! ```

use tracing::{debug, warn};

use super::header::{HEADER_LEN, MessageHeader, OpCode};
use super::ops::{BodyReader, ReplyFlags};
use crate::bson::{BsonShape, Document, Encoder, FieldPath, from_document};
use crate::error::{ProtocolError, Result};

const REPLY_PREFIX_LEN: usize = 20;

/// A parsed server reply
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub header: MessageHeader,
    pub flags: ReplyFlags,
    pub cursor_id: i64,
    pub starting_from: i32,
    pub documents: Vec<Document>,
}

impl Reply {
    /// Parse a complete reply message without interpreting its flags
    ///
    /// # Returns
    /// * `Framing` when the length prefix disagrees with `bytes`, the opcode
    ///   is not `OP_REPLY`, or `numberReturned` disagrees with the
    ///   documents actually present
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let header = MessageHeader::parse(bytes)?;
        if header.message_length as usize != bytes.len() {
            return Err(ProtocolError::Framing(format!(
                "length prefix {} does not match {} received bytes",
                header.message_length,
                bytes.len()
            ))
            .into());
        }
        if header.op_code != OpCode::Reply {
            return Err(ProtocolError::Framing(format!("expected OP_REPLY, got {}", header.op_code)).into());
        }
        if bytes.len() < HEADER_LEN + REPLY_PREFIX_LEN {
            return Err(ProtocolError::Framing(format!("reply of {} bytes is too short", bytes.len())).into());
        }

        let mut body = BodyReader::new(&bytes[HEADER_LEN..]);
        let flags = ReplyFlags::from_bits(body.i32()?);
        let cursor_id = body.i64()?;
        let starting_from = body.i32()?;
        let number_returned = body.i32()?;

        let mut documents = Vec::new();
        while !body.is_done() {
            documents.push(body.document()?);
        }
        if usize::try_from(number_returned).ok() != Some(documents.len()) {
            return Err(ProtocolError::Framing(format!(
                "numberReturned is {number_returned} but the body holds {} documents",
                documents.len()
            ))
            .into());
        }

        debug!(
            response_to = header.response_to,
            cursor_id,
            returned = documents.len(),
            flags = flags.bits(),
            "parsed reply"
        );

        Ok(Self {
            header,
            flags,
            cursor_id,
            starting_from,
            documents,
        })
    }

    /// Turn error flags into errors
    ///
    /// # Returns
    /// * `QueryFailure` carrying the first document when the query failed
    /// * `CursorNotFound` when the cursor named in a get-more is gone
    pub fn into_result(self) -> Result<Self> {
        if self.flags.contains(ReplyFlags::QUERY_FAILURE) {
            let detail = self.documents.into_iter().next().unwrap_or_default();
            warn!(response_to = self.header.response_to, "query failure reply");
            return Err(ProtocolError::QueryFailure(detail).into());
        }
        if self.flags.contains(ReplyFlags::CURSOR_NOT_FOUND) {
            return Err(ProtocolError::CursorNotFound(self.cursor_id).into());
        }
        Ok(self)
    }

    /// Check that this reply answers `request_id`
    pub fn check_response_to(&self, request_id: i32) -> Result<()> {
        if self.header.response_to != request_id {
            return Err(ProtocolError::CorrelationMismatch {
                expected: request_id,
                found: self.header.response_to,
            }
            .into());
        }
        Ok(())
    }

    pub fn request_id(&self) -> i32 {
        self.header.request_id
    }

    pub fn response_to(&self) -> i32 {
        self.header.response_to
    }

    pub fn number_returned(&self) -> usize {
        self.documents.len()
    }

    /// Whether the server closed the cursor
    pub fn is_exhausted(&self) -> bool {
        self.cursor_id == 0
    }

    /// Serialize the reply, recomputing `messageLength`
    ///
    /// Used by servers and test doubles; clients only parse replies.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut body = Encoder::new();
        body.write_i32(self.flags.bits());
        body.write_i64(self.cursor_id);
        body.write_i32(self.starting_from);
        body.write_i32(i32::try_from(self.documents.len()).map_err(|_| {
            ProtocolError::Framing(format!("{} documents do not fit one reply", self.documents.len()))
        })?);
        for doc in &self.documents {
            body.write_document(doc, &FieldPath::Root)?;
        }
        let body = body.into_bytes();

        let total = HEADER_LEN + body.len();
        let header = MessageHeader {
            message_length: i32::try_from(total)
                .map_err(|_| ProtocolError::Framing(format!("reply of {total} bytes exceeds the length field")))?,
            op_code: OpCode::Reply,
            ..self.header
        };
        let mut out = Vec::with_capacity(total);
        header.write_to(&mut out);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// A successful reply answering `request_id`
    pub fn answering(request_id: i32, cursor_id: i64, documents: Vec<Document>) -> Self {
        Self {
            header: MessageHeader {
                message_length: 0,
                request_id: 0,
                response_to: request_id,
                op_code: OpCode::Reply,
            },
            flags: ReplyFlags::NONE,
            cursor_id,
            starting_from: 0,
            documents,
        }
    }

    /// Decode every returned document into `T`
    pub fn decode<T: BsonShape>(self) -> Result<Vec<T>> {
        self.documents.into_iter().map(from_document).collect()
    }
}

/// Parse a reply and surface its error flags
pub fn parse_reply(bytes: &[u8]) -> Result<Reply> {
    Reply::parse(bytes)?.into_result()
}

//! Standard message header
//!
//! Every message starts with four little-endian `i32`s:
//! `messageLength | requestID | responseTo | opCode`.

use std::fmt;

use crate::error::{ProtocolError, Result, WireError};

/// Header size in bytes
pub const HEADER_LEN: usize = 16;

/// Legacy operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum OpCode {
    Reply = 1,
    Update = 2001,
    Insert = 2002,
    // 2003 is reserved
    Query = 2004,
    GetMore = 2005,
    Delete = 2006,
    KillCursors = 2007,
}

impl OpCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            OpCode::Reply => "OP_REPLY",
            OpCode::Update => "OP_UPDATE",
            OpCode::Insert => "OP_INSERT",
            OpCode::Query => "OP_QUERY",
            OpCode::GetMore => "OP_GET_MORE",
            OpCode::Delete => "OP_DELETE",
            OpCode::KillCursors => "OP_KILL_CURSORS",
        }
    }

    /// Whether the server answers this operation with an `OP_REPLY`
    pub fn expects_reply(self) -> bool {
        matches!(self, OpCode::Query | OpCode::GetMore)
    }
}

impl TryFrom<i32> for OpCode {
    type Error = WireError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            1 => Ok(OpCode::Reply),
            2001 => Ok(OpCode::Update),
            2002 => Ok(OpCode::Insert),
            2004 => Ok(OpCode::Query),
            2005 => Ok(OpCode::GetMore),
            2006 => Ok(OpCode::Delete),
            2007 => Ok(OpCode::KillCursors),
            other => Err(ProtocolError::Framing(format!("unknown opcode {other}")).into()),
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Total message size, including the header itself
    pub message_length: i32,

    /// Identifier for this message
    pub request_id: i32,

    /// `request_id` of the message being answered (0 for requests)
    pub response_to: i32,

    pub op_code: OpCode,
}

impl MessageHeader {
    /// Parse a header off the front of `buf`
    ///
    /// Only the header itself is validated here; callers compare
    /// `message_length` with the bytes they actually hold.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(ProtocolError::Framing(format!(
                "message of {} bytes is shorter than the {HEADER_LEN}-byte header",
                buf.len()
            ))
            .into());
        }
        let message_length = read_i32(buf, 0);
        if message_length < HEADER_LEN as i32 {
            return Err(ProtocolError::Framing(format!("declared message length {message_length} is below {HEADER_LEN}")).into());
        }
        Ok(Self {
            message_length,
            request_id: read_i32(buf, 4),
            response_to: read_i32(buf, 8),
            op_code: OpCode::try_from(read_i32(buf, 12))?,
        })
    }

    /// Append the header's wire form to `out`
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.message_length.to_le_bytes());
        out.extend_from_slice(&self.request_id.to_le_bytes());
        out.extend_from_slice(&self.response_to.to_le_bytes());
        out.extend_from_slice(&self.op_code.as_i32().to_le_bytes());
    }

    pub fn body_len(&self) -> usize {
        self.message_length as usize - HEADER_LEN
    }
}

pub(crate) fn read_i32(buf: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_values() {
        assert_eq!(OpCode::Reply.as_i32(), 1);
        assert_eq!(OpCode::Update.as_i32(), 2001);
        assert_eq!(OpCode::Insert.as_i32(), 2002);
        assert_eq!(OpCode::Query.as_i32(), 2004);
        assert_eq!(OpCode::GetMore.as_i32(), 2005);
        assert_eq!(OpCode::Delete.as_i32(), 2006);
        assert_eq!(OpCode::KillCursors.as_i32(), 2007);
    }

    #[test]
    fn test_unknown_opcode_is_framing_error() {
        for code in [0, 2003, 2013] {
            let err = OpCode::try_from(code).unwrap_err();
            assert!(matches!(err.as_protocol(), Some(ProtocolError::Framing(_))));
        }
    }

    #[test]
    fn test_header_round_trip() {
        let header = MessageHeader {
            message_length: 36,
            request_id: 7,
            response_to: 0,
            op_code: OpCode::Query,
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf);
        assert_eq!(buf.len(), HEADER_LEN);
        assert_eq!(&buf[12..16], &2004i32.to_le_bytes());
        assert_eq!(MessageHeader::parse(&buf).unwrap(), header);
        assert_eq!(header.body_len(), 20);
    }

    #[test]
    fn test_short_header() {
        let err = MessageHeader::parse(&[0; 15]).unwrap_err();
        assert!(matches!(err.as_protocol(), Some(ProtocolError::Framing(_))));
    }

    #[test]
    fn test_declared_length_below_header() {
        let mut buf = Vec::new();
        MessageHeader {
            message_length: 8,
            request_id: 1,
            response_to: 0,
            op_code: OpCode::Reply,
        }
        .write_to(&mut buf);
        assert!(MessageHeader::parse(&buf).is_err());
    }
}

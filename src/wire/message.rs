//! Message lifecycle
//!
//! A request moves through three states, each a distinct type:
//!
//! ```text
//! WireMessage<Built> --frame()--> WireMessage<Framed> --Transport::send--> WireMessage<Sent>
//! ```
//!
//! Every transition consumes its input, so a framed message cannot be
//! rebuilt and a sent message cannot be sent again.

use std::fmt;
use std::marker::PhantomData;

use tracing::trace;

use super::header::{HEADER_LEN, MessageHeader, OpCode};
use crate::error::{ProtocolError, Result};

/// Header fields and body assembled; length not yet computed
#[derive(Debug)]
pub struct Built;

/// Length written into the header; bytes ready for the transport
#[derive(Debug)]
pub struct Framed;

/// Handed to the transport
#[derive(Debug)]
pub struct Sent;

/// One outbound message in state `S`
///
/// While `Built`, `buf` holds only the body. Once `Framed`, it holds the
/// complete message, header included.
pub struct WireMessage<S> {
    op_code: OpCode,
    request_id: i32,
    response_to: i32,
    buf: Vec<u8>,
    _state: PhantomData<S>,
}

impl<S> WireMessage<S> {
    pub fn op_code(&self) -> OpCode {
        self.op_code
    }

    pub fn request_id(&self) -> i32 {
        self.request_id
    }

    pub fn response_to(&self) -> i32 {
        self.response_to
    }

    fn into_state<T>(self) -> WireMessage<T> {
        WireMessage {
            op_code: self.op_code,
            request_id: self.request_id,
            response_to: self.response_to,
            buf: self.buf,
            _state: PhantomData,
        }
    }
}

impl WireMessage<Built> {
    pub fn new(op_code: OpCode, request_id: i32, body: Vec<u8>) -> Self {
        Self {
            op_code,
            request_id,
            response_to: 0,
            buf: body,
            _state: PhantomData,
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.buf
    }

    /// Compute the length and prepend the header
    ///
    /// # Returns
    /// * `Framing` if header plus body does not fit the 32-bit length field
    pub fn frame(self) -> Result<WireMessage<Framed>> {
        let total = HEADER_LEN + self.buf.len();
        let message_length = i32::try_from(total)
            .map_err(|_| ProtocolError::Framing(format!("message of {total} bytes exceeds the 32-bit length field")))?;

        let header = MessageHeader {
            message_length,
            request_id: self.request_id,
            response_to: self.response_to,
            op_code: self.op_code,
        };
        let mut bytes = Vec::with_capacity(total);
        header.write_to(&mut bytes);
        bytes.extend_from_slice(&self.buf);

        trace!(
            op = %self.op_code,
            request_id = self.request_id,
            length = total,
            "framed message"
        );

        let mut framed = self.into_state::<Framed>();
        framed.buf = bytes;
        Ok(framed)
    }
}

impl WireMessage<Framed> {
    /// The complete message as it goes on the wire
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn header(&self) -> MessageHeader {
        MessageHeader {
            message_length: self.buf.len() as i32,
            request_id: self.request_id,
            response_to: self.response_to,
            op_code: self.op_code,
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.buf[HEADER_LEN..]
    }

    /// Record that a transport wrote every byte of this message
    pub fn mark_sent(self) -> WireMessage<Sent> {
        self.into_state()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl WireMessage<Sent> {
    /// Bytes written
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn expects_reply(&self) -> bool {
        self.op_code.expects_reply()
    }
}

impl<S> fmt::Debug for WireMessage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WireMessage")
            .field("state", &std::any::type_name::<S>().rsplit("::").next().unwrap_or("?"))
            .field("op_code", &self.op_code)
            .field("request_id", &self.request_id)
            .field("len", &self.buf.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_writes_exact_length() {
        let built = WireMessage::new(OpCode::Insert, 9, vec![1, 2, 3, 4, 5]);
        assert_eq!(built.body(), &[1, 2, 3, 4, 5]);

        let framed = built.frame().unwrap();
        let bytes = framed.as_bytes();
        assert_eq!(bytes.len(), 21);
        assert_eq!(&bytes[0..4], &21i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &9i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &0i32.to_le_bytes());
        assert_eq!(&bytes[12..16], &2002i32.to_le_bytes());
        assert_eq!(framed.body(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_header_matches_bytes() {
        let framed = WireMessage::new(OpCode::Query, 3, vec![0; 10]).frame().unwrap();
        let parsed = MessageHeader::parse(framed.as_bytes()).unwrap();
        assert_eq!(parsed, framed.header());
        assert_eq!(parsed.message_length as usize, framed.len());
    }

    #[test]
    fn test_sent_keeps_identity() {
        let sent = WireMessage::new(OpCode::GetMore, 11, Vec::new())
            .frame()
            .unwrap()
            .mark_sent();
        assert_eq!(sent.request_id(), 11);
        assert_eq!(sent.len(), HEADER_LEN);
        assert!(sent.expects_reply());
        assert!(format!("{sent:?}").contains("Sent"));
    }
}

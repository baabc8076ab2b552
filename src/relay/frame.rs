//! Transport-neutral frames and close reasons.
//!
//! The client side speaks axum's WebSocket types, the upstream side speaks
//! tungstenite's. The session only ever sees [`Frame`] and [`CloseReason`].

use axum::body::Bytes;
use axum::extract::ws;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Utf8Bytes;

/// An opaque data frame.
///
/// Payloads are reference-counted buffers shared with the transports, so
/// relaying a frame never copies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(Utf8Bytes),
    Binary(Bytes),
}

impl Frame {
    pub fn text(text: impl Into<Utf8Bytes>) -> Self {
        Frame::Text(text.into())
    }

    pub fn binary(data: impl Into<Bytes>) -> Self {
        Frame::Binary(data.into())
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Status code and reason of a close frame, passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} ({})", self.code, self.reason)
        }
    }
}

/// What a received message means to the relay.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    Data(Frame),
    Close(Option<CloseReason>),
    /// Ping/pong; answered by the transport itself.
    Control,
}

/// Both `Utf8Bytes` types wrap `Bytes`; moving between them keeps the buffer.
fn text_from_client(text: ws::Utf8Bytes) -> Utf8Bytes {
    let bytes = Bytes::from(text);
    Utf8Bytes::try_from(bytes.clone())
        .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned().into())
}

fn text_to_client(text: Utf8Bytes) -> ws::Utf8Bytes {
    let bytes = Bytes::from(text);
    ws::Utf8Bytes::try_from(bytes.clone())
        .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned().into())
}

pub fn from_client(message: ws::Message) -> Inbound {
    match message {
        ws::Message::Text(text) => Inbound::Data(Frame::Text(text_from_client(text))),
        ws::Message::Binary(data) => Inbound::Data(Frame::Binary(data)),
        ws::Message::Close(frame) => Inbound::Close(frame.map(|f| CloseReason {
            code: f.code,
            reason: f.reason.as_str().to_owned(),
        })),
        ws::Message::Ping(_) | ws::Message::Pong(_) => Inbound::Control,
    }
}

pub fn from_upstream(message: tungstenite::Message) -> Inbound {
    match message {
        tungstenite::Message::Text(text) => Inbound::Data(Frame::Text(text)),
        tungstenite::Message::Binary(data) => Inbound::Data(Frame::Binary(data)),
        tungstenite::Message::Close(frame) => Inbound::Close(frame.map(|f| CloseReason {
            code: u16::from(f.code),
            reason: f.reason.as_str().to_owned(),
        })),
        tungstenite::Message::Ping(_)
        | tungstenite::Message::Pong(_)
        | tungstenite::Message::Frame(_) => Inbound::Control,
    }
}

pub fn to_client(frame: Frame) -> ws::Message {
    match frame {
        Frame::Text(text) => ws::Message::Text(text_to_client(text)),
        Frame::Binary(data) => ws::Message::Binary(data),
    }
}

pub fn close_to_client(close: Option<CloseReason>) -> ws::Message {
    ws::Message::Close(close.map(|c| ws::CloseFrame {
        code: c.code,
        reason: c.reason.into(),
    }))
}

pub fn to_upstream(frame: Frame) -> tungstenite::Message {
    match frame {
        Frame::Text(text) => tungstenite::Message::Text(text),
        Frame::Binary(data) => tungstenite::Message::Binary(data),
    }
}

pub fn close_to_upstream(close: Option<CloseReason>) -> tungstenite::Message {
    tungstenite::Message::Close(close.map(|c| tungstenite::protocol::CloseFrame {
        code: CloseCode::from(c.code),
        reason: c.reason.into(),
    }))
}

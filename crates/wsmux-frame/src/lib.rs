//! Wire message model and text framing for wsmux.
//!
//! Two concerns live here:
//! - The JSON message shapes exchanged with the peer: flat outbound request
//!   frames carrying an `id` and a `type`, and the inbound response/event
//!   classification the reader loop dispatches on.
//! - A length-prefixed text-frame codec for transports that only provide a
//!   byte stream (Unix sockets, TCP). Message-oriented transports such as
//!   WebSocket already deliver discrete frames and do not need it.
//!
//! Every stream frame is laid out as:
//! - A 2-byte magic number ("WX") for stream synchronization
//! - A 4-byte little-endian payload length
//! - A UTF-8 payload

pub mod codec;
pub mod error;
pub mod kind;
pub mod message;

pub use codec::{
    decode_frame, encode_frame, FrameConfig, TextFrameCodec, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use kind::{
    registers_early, KIND_EVENT, KIND_PING, KIND_PONG, KIND_RENDER_TEMPLATE, KIND_RESULT,
    KIND_SUBSCRIBE_EVENTS, KIND_SUBSCRIBE_TRIGGER, KIND_UNSUBSCRIBE_EVENTS,
};
pub use message::{
    decode_inbound, ApiError, EventMessage, InboundMessage, Request, ResponseMessage,
    UNKNOWN_ERROR_CODE, UNKNOWN_ERROR_MESSAGE,
};

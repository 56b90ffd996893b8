//! Protocol module: framing, the result text grammar, and the frame image codec.
//!
//! Wire format, identical in both directions:
//! ```text
//! [payload_len:4 big-endian][payload:N]
//! ```
//! Client → server payloads are JPEG images; server → client payloads are
//! UTF-8 result strings (see [`grammar`]).

pub mod frame_codec;
pub mod framing;
pub mod grammar;

pub use frame_codec::{decode_frame, encode_frame, CodecError};
pub use framing::{write_frame, FramedStream, TransportError};
pub use grammar::{decode_detections, decode_result_payload, encode_detections, GrammarError};

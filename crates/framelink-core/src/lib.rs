//! # framelink-core
//!
//! Shared library for FrameLink containing the wire protocol, the frame image
//! codec, and the domain entities exchanged between the edge client and the
//! processing server.
//!
//! This crate is used by both the server and client applications.
//! It has no dependencies on sockets, cameras, or inference runtimes; the
//! transport functions are generic over `tokio::io` reader/writer traits.
//!
//! # Architecture overview
//!
//! FrameLink streams camera frames from an edge device to a processing node
//! and returns the objects detected in each frame so the edge device can
//! overlay them (with a depth-derived distance) on its own display.
//!
//! - **`protocol`** – How bytes travel over the network.  Every message is a
//!   4-byte big-endian length prefix followed by the payload.  Frames travel
//!   as JPEG; results travel as a small whitespace-delimited text grammar.
//!
//! - **`domain`** – Plain data types with no I/O: [`Frame`], [`Detection`],
//!   [`BoundingBox`] and [`Point3D`].

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `framelink_core::Detection` instead of `framelink_core::domain::detection::Detection`.
pub use domain::depth::{format_distance_label, Point3D};
pub use domain::detection::{BoundingBox, Detection};
pub use domain::frame::Frame;
pub use protocol::frame_codec::{decode_frame, encode_frame, CodecError, DEFAULT_JPEG_QUALITY};
pub use protocol::framing::{FramedStream, TransportError};
pub use protocol::grammar::{decode_detections, decode_result_payload, encode_detections, GrammarError};

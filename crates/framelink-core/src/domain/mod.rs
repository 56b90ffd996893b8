//! Domain entities for FrameLink.
//!
//! This module contains plain data types with no infrastructure dependencies.
//! Nothing here performs I/O; the types can be constructed and tested on any
//! machine without a camera, a model, or a network.
//!
//! - **`frame`** – one acquired colour image.
//! - **`detection`** – one model output (class, confidence, bounding box).
//! - **`depth`** – a 3-D point from the depth sensor and the distance label
//!   rendered next to each detection on the client.

pub mod depth;
pub mod detection;
pub mod frame;

//! Infrastructure layer for framelink-client: the TCP connection, the
//! synthetic camera and the log-based overlay sink.

pub mod annotator;
pub mod camera;
pub mod connection;

pub use annotator::LogAnnotator;
pub use camera::SyntheticCamera;
pub use connection::connect;

//! Evidence capture and capture reading

pub mod acquire;
pub mod reader;

pub use acquire::{evidence_filename, has_capture_extension, CaptureAcquirer, CaptureRequest, CAPTURE_EXTENSION};
pub use reader::{CaptureReader, TcpdumpReader, TrafficFilter};

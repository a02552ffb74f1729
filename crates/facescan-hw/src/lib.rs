//! facescan-hw: hardware abstraction for camera capture.
//!
//! Provides V4L2-based camera access and decoding of captured buffers
//! (YUYV, MJPG, GREY) into RGB frames.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, FrameStream, PixelFormat};
pub use frame::{Frame, FrameError};

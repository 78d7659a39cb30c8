//! Plateblur Frame Model
//!
//! Defines the data contracts shared by the processing and render crates:
//! - **BoundingBox:** Integer pixel rectangle around a plate
//! - **VideoFrame:** One decoded frame with its timing and RGB pixels
//! - **SessionConfig:** Validated per-file processing settings
//!
//! Coordinates are absolute pixels in the decoded frame, origin top-left.

pub mod bbox;
pub mod frame;
pub mod session;

pub use bbox::*;
pub use frame::*;
pub use session::*;

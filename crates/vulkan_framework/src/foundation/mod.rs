//! Foundation utilities shared by every layer
//!
//! Logging setup and the math types used by cameras and transforms.

pub mod logging;
pub mod math;

//! Rendering: the frame controller and its backends

pub mod backends;
pub mod frame;

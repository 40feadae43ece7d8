//! Render pass recording.

pub mod motion_blur;

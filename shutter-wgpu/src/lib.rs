//! WebGPU backend for the tile-max motion blur pipeline.
//!
//! [`WgpuBackend`] owns the device-level state (programs, pipelines, samplers and a
//! pool of transient targets) and is what [`shutter_render::MotionBlurPass::new`] is
//! built against, once. Each frame, open a [`Recorder`] on a command encoder, import the
//! frame's textures and let the pass record into it; the host submits the encoder.

pub mod backend;
pub mod passes;
pub mod pipeline;
pub mod render_targets;

pub use backend::{Recorder, WgpuBackend};

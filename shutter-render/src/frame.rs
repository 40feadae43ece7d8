//! Per-invocation frame description.

use crate::error::MotionBlurError;
use crate::format::TextureFormat;

/// Size of a 2D image in texels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Integer division of both dimensions, floored at one texel.
    pub fn div(self, divisor: u32) -> Self {
        Self {
            width: (self.width / divisor).max(1),
            height: (self.height / divisor).max(1),
        }
    }

    pub fn texel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// The frame being blurred. Immutable for the duration of one pipeline run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameDescriptor {
    pub width: u32,
    pub height: u32,
    pub color_format: TextureFormat,
}

impl FrameDescriptor {
    pub fn new(width: u32, height: u32, color_format: TextureFormat) -> Self {
        Self {
            width,
            height,
            color_format,
        }
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.width, self.height)
    }

    pub fn validate(&self) -> Result<(), MotionBlurError> {
        if self.width == 0 || self.height == 0 {
            return Err(MotionBlurError::InvalidFrame {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// What kind of camera the frame was rendered for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CameraKind {
    /// Regular player/game camera.
    #[default]
    Game,
    /// Editor scene view.
    SceneView,
    /// Asset or material preview.
    Preview,
}

impl CameraKind {
    /// Only game cameras receive motion blur.
    pub fn receives_motion_blur(self) -> bool {
        matches!(self, CameraKind::Game)
    }
}

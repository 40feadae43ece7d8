//! Volume-style settings with per-parameter override tracking.
//!
//! A host typically stacks several volumes and blends them; this module only models a
//! single resolved volume. Collapse the stack with [`MotionBlurSettings::interpolate`],
//! then hand [`MotionBlurSettings::parameters`] to the pipeline.

use crate::params::EffectParameters;

pub const SHUTTER_ANGLE_MIN: f32 = 0.0;
pub const SHUTTER_ANGLE_MAX: f32 = 360.0;
pub const SAMPLE_COUNT_MIN: u32 = 4;
pub const SAMPLE_COUNT_MAX: u32 = 32;
pub const DEFAULT_SAMPLE_COUNT: u32 = 8;

/// Float parameter clamped to a fixed range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClampedFloat {
    value: f32,
    min: f32,
    max: f32,
    /// Set once a volume writes the value.
    pub overridden: bool,
}

impl ClampedFloat {
    pub fn new(value: f32, min: f32, max: f32) -> Self {
        Self {
            value: value.clamp(min, max),
            min,
            max,
            overridden: false,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn set(&mut self, value: f32) {
        self.value = value.clamp(self.min, self.max);
        self.overridden = true;
    }
}

/// Integer parameter clamped to a fixed range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClampedInt {
    value: u32,
    min: u32,
    max: u32,
    pub overridden: bool,
}

impl ClampedInt {
    pub fn new(value: u32, min: u32, max: u32) -> Self {
        Self {
            value: value.clamp(min, max),
            min,
            max,
            overridden: false,
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn set(&mut self, value: u32) {
        self.value = value.clamp(self.min, self.max);
        self.overridden = true;
    }
}

/// Motion blur volume component.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionBlurSettings {
    pub active: bool,
    pub shutter_angle: ClampedFloat,
    pub sample_count: ClampedInt,
}

impl Default for MotionBlurSettings {
    fn default() -> Self {
        Self {
            active: true,
            shutter_angle: ClampedFloat::new(0.0, SHUTTER_ANGLE_MIN, SHUTTER_ANGLE_MAX),
            sample_count: ClampedInt::new(DEFAULT_SAMPLE_COUNT, SAMPLE_COUNT_MIN, SAMPLE_COUNT_MAX),
        }
    }
}

impl MotionBlurSettings {
    /// Settings with both parameters overridden.
    pub fn with_shutter(shutter_angle: f32, sample_count: u32) -> Self {
        let mut settings = Self::default();
        settings.shutter_angle.set(shutter_angle);
        settings.sample_count.set(sample_count);
        settings
    }

    /// The effect only runs when the shutter angle was explicitly overridden to a
    /// positive value; a volume that leaves it at its default keeps blur off.
    pub fn is_active(&self) -> bool {
        self.active
            && self.shutter_angle.overridden
            && self.shutter_angle.value() > 0.0
            && self.sample_count.value() > 0
    }

    pub fn parameters(&self) -> EffectParameters {
        EffectParameters {
            shutter_angle: self.shutter_angle.value(),
            sample_count: self.sample_count.value(),
            enabled: self.is_active(),
        }
    }

    /// Blend towards `other` by `t` in [0, 1]. Only overridden parameters of `other`
    /// take part, mirroring how a volume stack layers partial overrides.
    pub fn interpolate(&self, other: &Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mut out = *self;
        out.active = self.active || other.active;

        if other.shutter_angle.overridden {
            let from = self.shutter_angle.value();
            let to = other.shutter_angle.value();
            out.shutter_angle.set(from + (to - from) * t);
        }
        if other.sample_count.overridden {
            let from = self.sample_count.value() as f32;
            let to = other.sample_count.value() as f32;
            out.sample_count.set((from + (to - from) * t).round() as u32);
        }
        out
    }
}

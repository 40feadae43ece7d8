//! Effect parameters passed explicitly to every pipeline run.

/// Smallest loop count the reconstruction pass runs with.
pub const MIN_LOOP_COUNT: u32 = 1;
/// Ceiling on the reconstruction loop count, independent of the sample-count range.
pub const MAX_LOOP_COUNT: u32 = 64;

/// Shutter and sampling configuration for one invocation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectParameters {
    /// Degrees of the frame interval the virtual shutter is open, in [0, 360].
    pub shutter_angle: f32,
    /// Reconstruction samples per pixel, nominally in [4, 32].
    pub sample_count: u32,
    /// Whether the effect should run at all.
    pub enabled: bool,
}

impl Default for EffectParameters {
    fn default() -> Self {
        Self {
            shutter_angle: 0.0,
            sample_count: 8,
            enabled: false,
        }
    }
}

impl EffectParameters {
    /// Enabled parameters for the given shutter angle and sample count.
    pub fn new(shutter_angle: f32, sample_count: u32) -> Self {
        Self {
            shutter_angle,
            sample_count,
            enabled: true,
        }
    }

    /// True when a run would change the image. A zero shutter angle or sample
    /// count disables the effect even if `enabled` is set.
    pub fn is_effective(&self) -> bool {
        self.enabled && self.shutter_angle > 0.0 && self.sample_count > 0
    }

    /// Fraction of the frame interval covered by the exposure.
    pub fn velocity_scale(&self) -> f32 {
        self.shutter_angle / 360.0
    }

    /// Reconstruction iterations; each produces two mirrored samples.
    pub fn loop_count(&self) -> u32 {
        (self.sample_count / 2).clamp(MIN_LOOP_COUNT, MAX_LOOP_COUNT)
    }
}

use crate::odf_io::{OdfReader, OdfWriter};
use std::ops::RangeInclusive;

pub const AMPLITUDE_RANGE: RangeInclusive<f32> = 0.0..=1000.0;
pub const GAIN_RANGE: RangeInclusive<f32> = -120.0..=40.0;
pub const PITCH_TUNING_RANGE: RangeInclusive<f32> = -1800.0..=1800.0;
pub const PITCH_CORRECTION_RANGE: RangeInclusive<f32> = -1800.0..=1800.0;
pub const TRACKER_DELAY_RANGE: RangeInclusive<i32> = 0..=10000;

/// Voicing attributes shared by the organ, windchest groups, ranks and
/// pipes. Amplitude is a percentage, gain is in dB, tuning and correction
/// are in cents and tracker delay is in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcousticAttributes {
    pub amplitude: f32,
    pub gain: f32,
    pub pitch_tuning: f32,
    pub pitch_correction: f32,
    pub tracker_delay: u32,
}

impl Default for AcousticAttributes {
    fn default() -> Self {
        Self {
            amplitude: 100.0,
            gain: 0.0,
            pitch_tuning: 0.0,
            pitch_correction: 0.0,
            tracker_delay: 0,
        }
    }
}

impl AcousticAttributes {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Forces every value into its ODF range.
    pub fn clamped(&self) -> Self {
        Self {
            amplitude: self.amplitude.clamp(*AMPLITUDE_RANGE.start(), *AMPLITUDE_RANGE.end()),
            gain: self.gain.clamp(*GAIN_RANGE.start(), *GAIN_RANGE.end()),
            pitch_tuning: self.pitch_tuning.clamp(*PITCH_TUNING_RANGE.start(), *PITCH_TUNING_RANGE.end()),
            pitch_correction: self
                .pitch_correction
                .clamp(*PITCH_CORRECTION_RANGE.start(), *PITCH_CORRECTION_RANGE.end()),
            tracker_delay: self.tracker_delay.min(*TRACKER_DELAY_RANGE.end() as u32),
        }
    }

    /// Writes the non-default attributes as `{prefix}AmplitudeLevel`,
    /// `{prefix}Gain`, ... keys.
    pub fn write(&self, w: &mut OdfWriter, prefix: &str) {
        let defaults = Self::default();
        if self.amplitude != defaults.amplitude {
            w.add_decimal(&format!("{}AmplitudeLevel", prefix), self.amplitude);
        }
        if self.gain != defaults.gain {
            w.add_decimal(&format!("{}Gain", prefix), self.gain);
        }
        if self.pitch_tuning != defaults.pitch_tuning {
            w.add_decimal(&format!("{}PitchTuning", prefix), self.pitch_tuning);
        }
        if self.pitch_correction != defaults.pitch_correction {
            w.add_decimal(&format!("{}PitchCorrection", prefix), self.pitch_correction);
        }
        if self.tracker_delay != defaults.tracker_delay {
            w.add_key(&format!("{}TrackerDelay", prefix), self.tracker_delay);
        }
    }

    pub fn read(reader: &OdfReader, section: &str, prefix: &str) -> Self {
        let defaults = Self::default();
        Self {
            amplitude: reader.read_float(section, &format!("{}AmplitudeLevel", prefix), AMPLITUDE_RANGE, defaults.amplitude),
            gain: reader.read_float(section, &format!("{}Gain", prefix), GAIN_RANGE, defaults.gain),
            pitch_tuning: reader.read_float(
                section,
                &format!("{}PitchTuning", prefix),
                PITCH_TUNING_RANGE,
                defaults.pitch_tuning,
            ),
            pitch_correction: reader.read_float(
                section,
                &format!("{}PitchCorrection", prefix),
                PITCH_CORRECTION_RANGE,
                defaults.pitch_correction,
            ),
            tracker_delay: reader.read_int(
                section,
                &format!("{}TrackerDelay", prefix),
                TRACKER_DELAY_RANGE,
                defaults.tracker_delay as i32,
            ) as u32,
        }
    }
}

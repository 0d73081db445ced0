//! Voice activity detection on the raw capture stream.
//!
//! Each analysis tick scores one fixed window of samples: RMS energy relative
//! to an adaptive noise floor, plus a zero-crossing-rate term that helps with
//! unvoiced consonants. The speaking flag only flips after a run of
//! consecutive ticks on the other side of the threshold, and the release side
//! uses a lower threshold and a longer run than the attack side so the
//! detector neither chatters on noise nor clips trailing speech.

/// Tunables for the detector. Everything that varied between deployments is a
/// field here; nothing is hard-coded at call sites.
#[derive(Debug, Clone, Copy)]
pub struct VadConfig {
    /// Samples per analysis tick.
    pub frame_size: usize,
    /// Score above this attacks toward speaking.
    pub threshold_ratio: f32,
    /// Release threshold as a fraction of `threshold_ratio`.
    pub release_ratio: f32,
    /// Consecutive above-threshold ticks before `Start` fires.
    pub attack_frames: u32,
    /// Consecutive below-release ticks before `End` fires.
    pub release_frames: u32,
    /// Weight of the zero-crossing-rate term in the score.
    pub zcr_weight: f32,
    /// EMA coefficient for noise-floor adaptation (only applied while silent).
    pub noise_floor_alpha: f32,
    /// RMS values above this do not pull the noise floor up.
    pub noise_floor_cap: f32,
    /// Lower bound keeping the floor away from zero.
    pub noise_floor_min: f32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            frame_size: 2048,
            threshold_ratio: 2.5,
            release_ratio: 0.6,
            attack_frames: 3,
            release_frames: 8,
            zcr_weight: 0.5,
            noise_floor_alpha: 0.05,
            noise_floor_cap: 0.1,
            noise_floor_min: 1e-4,
        }
    }
}

/// What one tick produced. `Start` and `End` are edge-triggered: they fire
/// once per transition and are never held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadEvent {
    Start,
    End,
    None,
}

/// Mutable detector state, advanced once per tick.
#[derive(Debug, Clone, Copy)]
pub struct VadState {
    pub speaking: bool,
    pub noise_floor: f32,
    pub speak_hold_count: u32,
    pub silence_hold_count: u32,
}

pub struct VoiceActivityDetector {
    config: VadConfig,
    state: VadState,
}

impl VoiceActivityDetector {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            state: VadState {
                speaking: false,
                noise_floor: config.noise_floor_min,
                speak_hold_count: 0,
                silence_hold_count: 0,
            },
        }
    }

    pub fn state(&self) -> VadState {
        self.state
    }

    pub fn frame_size(&self) -> usize {
        self.config.frame_size
    }

    /// Advance the detector by one analysis frame. An empty or missing frame
    /// scores zero and counts as silence; this function never panics.
    pub fn tick(&mut self, frame: &[f32]) -> VadEvent {
        let score = self.score(frame);

        if self.state.speaking {
            if score < self.config.threshold_ratio * self.config.release_ratio {
                self.state.silence_hold_count += 1;
                if self.state.silence_hold_count >= self.config.release_frames {
                    self.state.speaking = false;
                    self.state.silence_hold_count = 0;
                    self.state.speak_hold_count = 0;
                    return VadEvent::End;
                }
            } else {
                self.state.silence_hold_count = 0;
            }
        } else {
            if score > self.config.threshold_ratio {
                self.state.speak_hold_count += 1;
                if self.state.speak_hold_count >= self.config.attack_frames {
                    self.state.speaking = true;
                    self.state.speak_hold_count = 0;
                    self.state.silence_hold_count = 0;
                    return VadEvent::Start;
                }
            } else {
                self.state.speak_hold_count = 0;
            }
        }

        VadEvent::None
    }

    fn score(&mut self, frame: &[f32]) -> f32 {
        if frame.is_empty() {
            return 0.0;
        }

        let rms = rms(frame);

        // The floor only adapts while silent, so it cannot ride up during
        // speech and mask the speaker.
        if !self.state.speaking {
            let capped = rms.min(self.config.noise_floor_cap);
            let alpha = self.config.noise_floor_alpha;
            self.state.noise_floor = ((1.0 - alpha) * self.state.noise_floor + alpha * capped)
                .max(self.config.noise_floor_min);
        }

        rms / self.state.noise_floor.max(self.config.noise_floor_min)
            + self.config.zcr_weight * zero_crossing_rate(frame)
    }
}

/// Root-mean-square energy of a frame of samples in [-1, 1].
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum: f64 = frame.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum / frame.len() as f64).sqrt() as f32
}

/// Fraction of adjacent sample pairs whose signs differ.
pub fn zero_crossing_rate(frame: &[f32]) -> f32 {
    if frame.len() < 2 {
        return 0.0;
    }
    let crossings = frame
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f32 / (frame.len() - 1) as f32
}

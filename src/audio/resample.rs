//! Sample-rate conversion for the capture and playback paths.
//!
//! Plain linear interpolation, no anti-aliasing filter. For the near-integer
//! ratios this pipeline runs at (48000→16000 up, 24000→48000 down) the
//! aliasing cost is inaudible on speech and the latency cost is zero, which
//! is the tradeoff we want here.

/// Convert `samples` from `from_rate` to `to_rate`.
///
/// Equal rates return the input as-is. Output length is
/// `round(len * to_rate / from_rate)`; each output sample is the linear
/// blend of its two nearest source neighbors.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let out_len =
        ((samples.len() as f64) * f64::from(to_rate) / f64::from(from_rate)).round() as usize;
    if out_len == 0 {
        return Vec::new();
    }
    if samples.len() == 1 || out_len == 1 {
        return vec![samples[0]; out_len];
    }

    let step = (samples.len() - 1) as f64 / (out_len - 1) as f64;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let x = i as f64 * step;
        let i0 = x.floor() as usize;
        let i1 = (i0 + 1).min(samples.len() - 1);
        let frac = (x - i0 as f64) as f32;
        out.push(samples[i0] + (samples[i1] - samples[i0]) * frac);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(len: usize, freq_hz: f32, rate: u32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq_hz * i as f32 / rate as f32).sin())
            .collect()
    }

    #[test]
    fn identity_when_rates_match() {
        let x = sine(480, 440.0, 48000);
        for rate in [16000, 24000, 44100, 48000] {
            assert_eq!(resample(&x, rate, rate), x);
        }
    }

    #[test]
    fn output_length_follows_ratio() {
        let x = sine(4800, 200.0, 48000);
        assert_eq!(resample(&x, 48000, 16000).len(), 1600);
        assert_eq!(resample(&x, 48000, 24000).len(), 2400);
        assert_eq!(resample(&x, 24000, 48000).len(), 9600);
    }

    #[test]
    fn roundtrip_error_is_bounded() {
        // A low-frequency tone survives down-and-up conversion between the
        // rates the pipeline actually uses.
        let x = sine(4410, 300.0, 44100);
        for (a, b) in [(44100u32, 48000u32), (48000, 16000), (16000, 24000), (24000, 48000)] {
            let back = resample(&resample(&x, a, b), b, a);
            assert_eq!(back.len(), x.len());
            let mae: f32 =
                x.iter().zip(&back).map(|(p, q)| (p - q).abs()).sum::<f32>() / x.len() as f32;
            assert!(mae < 0.05, "mean abs error {mae} too large for {a}->{b}->{a}");
        }
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(resample(&[], 48000, 16000).is_empty());
    }

    #[test]
    fn single_sample_is_replicated() {
        let out = resample(&[0.5], 16000, 48000);
        assert_eq!(out, vec![0.5; 3]);
    }

    #[test]
    fn endpoints_are_preserved() {
        let x = vec![0.0, 0.25, 0.5, 0.75, 1.0];
        let out = resample(&x, 16000, 48000);
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[out.len() - 1] - 1.0).abs() < 1e-6);
    }
}

//! Property-based tests for cricket-core primitives.
//!
//! Tests ADPCM error bounds, resampler identity and chunking, ramp timing
//! and clamping using proptest for randomized input generation.

use cricket_core::adpcm;
use cricket_core::{
    FIXED_MAX, Sample, VolumeMatrix, clamp, ramp_frames, stereo_pan, volume::stereo_pan_ramp,
};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// The encoder never does worse than predicting silence: the decoded
    /// mean squared error is bounded by the mean signal power.
    #[test]
    fn adpcm_error_bounded_by_signal_power(
        pcm in prop::collection::vec(any::<i16>(), 1..400),
    ) {
        let decoded = adpcm::decode(&adpcm::encode(&pcm, 1), 1);
        prop_assert!(decoded.len() >= pcm.len());

        let n = pcm.len() as f64;
        let power: f64 = pcm.iter().map(|&s| f64::from(s).powi(2)).sum::<f64>() / n;
        let mse: f64 = pcm
            .iter()
            .zip(&decoded)
            .map(|(&a, &b)| (f64::from(a) - f64::from(b)).powi(2))
            .sum::<f64>()
            / n;
        prop_assert!(mse <= power * (1.0 + 1e-5) + 1e-9, "mse {} > power {}", mse, power);
    }

    /// Equal input and output frame counts pass samples through untouched.
    #[test]
    fn resample_unity_is_identity(
        frames in prop::collection::vec((-1.0f32..=1.0f32, -1.0f32..=1.0f32), 1..256),
        stereo in any::<bool>(),
    ) {
        let channels = if stereo { 2 } else { 1 };
        let input: Vec<f32> = frames
            .iter()
            .flat_map(|&(l, r)| if stereo { vec![l, r] } else { vec![l] })
            .collect();
        let n = frames.len();

        let mut out = vec![0.0f32; input.len()];
        let mut state = [0.0f32; 2];
        f32::resample(&mut state, &input, n, &mut out, n, channels);
        prop_assert_eq!(&out, &input);

        let fixed: Vec<i32> = input.iter().map(|&s| i32::from_f32(s)).collect();
        let mut out = vec![0i32; fixed.len()];
        let mut state = [0i32; 2];
        i32::resample(&mut state, &fixed, n, &mut out, n, channels);
        prop_assert_eq!(out, fixed);
    }

    /// Feeding a stream in chunks at a fixed 2:1 or 1:2 ratio gives the
    /// same output as one call over the whole stream.
    #[test]
    fn resample_chunked_matches_single_call(
        input in prop::collection::vec(-1.0f32..=1.0f32, 2..128),
        chunk in 1usize..16,
        upsample in any::<bool>(),
    ) {
        let (num, den) = if upsample { (2, 1) } else { (1, 2) };
        let frames = input.len() / den * den;
        let input = &input[..frames];

        let mut whole = vec![0.0f32; frames * num / den];
        let mut state = [0.0f32; 2];
        f32::resample(&mut state, input, frames, &mut whole, frames * num / den, 1);

        let mut pieces = Vec::new();
        let mut state = [0.0f32; 2];
        for part in input.chunks(chunk * den) {
            let mut out = vec![0.0f32; part.len() * num / den];
            f32::resample(&mut state, part, part.len(), &mut out, part.len() * num / den, 1);
            pieces.extend(out);
        }
        prop_assert_eq!(&pieces, &whole);

        let fixed: Vec<i32> = input.iter().map(|&s| i32::from_f32(s)).collect();
        let mut whole = vec![0i32; frames * num / den];
        let mut state = [0i32; 2];
        i32::resample(&mut state, &fixed, frames, &mut whole, frames * num / den, 1);
        let mut pieces = Vec::new();
        let mut state = [0i32; 2];
        for part in fixed.chunks(chunk * den) {
            let mut out = vec![0i32; part.len() * num / den];
            i32::resample(&mut state, part, part.len(), &mut out, part.len() * num / den, 1);
            pieces.extend(out);
        }
        prop_assert_eq!(pieces, whole);
    }

    /// Doubling the rate and halving it again recovers the input.
    #[test]
    fn resample_up_then_down_recovers_input(
        input in prop::collection::vec(-1.0f32..=1.0f32, 1..128),
    ) {
        let n = input.len();
        let mut up = vec![0.0f32; n * 2];
        f32::resample(&mut [0.0; 2], &input, n, &mut up, n * 2, 1);
        let mut down = vec![0.0f32; n];
        f32::resample(&mut [0.0; 2], &up, n * 2, &mut down, n, 1);
        prop_assert_eq!(&down, &input);

        let fixed: Vec<i32> = input.iter().map(|&s| i32::from_f32(s)).collect();
        let mut up = vec![0i32; n * 2];
        i32::resample(&mut [0; 2], &fixed, n, &mut up, n * 2, 1);
        let mut down = vec![0i32; n];
        i32::resample(&mut [0; 2], &up, n * 2, &mut down, n, 1);
        prop_assert_eq!(down, fixed);
    }

    /// A ramp lasts `max(ceil(|diff| / rate))` frames, capped at the block,
    /// and lands exactly on the target when it completes.
    #[test]
    fn ramp_length_formula(
        from in prop::array::uniform4(0.0f32..=1.0f32),
        to in prop::array::uniform4(0.0f32..=1.0f32),
        rate in 0.001f32..0.5f32,
        frames in 1usize..512,
    ) {
        let mut vol = VolumeMatrix::new(from[0], from[1], from[2], from[3]);
        let target = VolumeMatrix::new(to[0], to[1], to[2], to[3]);
        let expected = (0..4)
            .map(|k| ramp_frames(to[k] - from[k], rate))
            .max()
            .unwrap_or(0);

        let mut buf = vec![0.5f32; frames * 2];
        let ramped = stereo_pan_ramp(&mut buf, frames, &target, &mut vol, rate);
        prop_assert_eq!(ramped, expected.min(frames));
        if expected <= frames {
            prop_assert_eq!(vol, target);
        }
    }

    /// Once current equals target, panning is a pure function of the input.
    #[test]
    fn converged_ramp_is_noop_on_state(
        pan in -1.0f32..=1.0f32,
        input in prop::collection::vec(-1.0f32..=1.0f32, 2..128),
    ) {
        let mut target = VolumeMatrix::IDENTITY;
        target.set_stereo_pan(pan);
        let mut vol = target;
        let frames = input.len() / 2;
        let mut buf = input.clone();
        stereo_pan(&mut buf, frames, &target, &mut vol, 0.01);
        prop_assert_eq!(vol, target);
    }

    /// Clamping keeps every fixed-point sample within full scale and
    /// reports clipping exactly when something was out of range.
    #[test]
    fn fixed_clamp_bounds(input in prop::collection::vec(any::<i32>(), 0..256)) {
        let mut out = vec![0i32; input.len()];
        let clipped = clamp(&input, &mut out);
        prop_assert!(out.iter().all(|&s| (-FIXED_MAX..=FIXED_MAX).contains(&s)));
        let any_out = input.iter().any(|&s| !(-FIXED_MAX..=FIXED_MAX).contains(&s));
        prop_assert_eq!(clipped, any_out);
    }
}

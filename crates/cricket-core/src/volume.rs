//! Stereo volume matrix and ramped panning.
//!
//! A [`VolumeMatrix`] maps an input frame to an output frame:
//!
//! ```text
//! outL = inL·ll + inR·lr
//! outR = inL·rl + inR·rr
//! ```
//!
//! Mono input only uses the diagonal (`ll` for the left output, `rr` for the
//! right).
//!
//! # Ramping
//!
//! Sources keep a current and a target matrix. When they differ by more than
//! `0.001` in any coefficient, [`stereo_pan`] and [`mono_pan`] move each
//! coefficient linearly toward its target at `rate` per frame. Coefficient `k`
//! needs `ceil(|target_k - current_k| / rate)` frames; the ramp runs for the
//! longest of these (capped at the block length), a coefficient stops moving
//! once its own frame count has elapsed, and is pinned exactly to its target
//! at the end. Frames past the ramp use the updated matrix statically.

use core::ops::{Add, AddAssign, Div, Mul, MulAssign, Sub, SubAssign};

use crate::sample::Sample;

/// Default tolerance for matrix comparisons.
pub const VOLUME_TOLERANCE: f32 = 0.001;

#[inline]
fn approx(a: f32, b: f32, tol: f32) -> bool {
    libm::fabsf(a - b) <= tol
}

/// 2×2 gain matrix applied to stereo frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeMatrix {
    /// Left input to left output.
    pub ll: f32,
    /// Right input to left output.
    pub lr: f32,
    /// Left input to right output.
    pub rl: f32,
    /// Right input to right output.
    pub rr: f32,
}

impl Default for VolumeMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl VolumeMatrix {
    /// Unity gain, no cross-feed.
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0);

    /// Silence.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Creates a matrix from all four coefficients.
    pub const fn new(ll: f32, lr: f32, rl: f32, rr: f32) -> Self {
        Self { ll, lr, rl, rr }
    }

    /// Diagonal matrix.
    pub const fn diagonal(ll: f32, rr: f32) -> Self {
        Self::new(ll, 0.0, 0.0, rr)
    }

    /// `s` on the diagonal.
    pub const fn scalar(s: f32) -> Self {
        Self::diagonal(s, s)
    }

    /// Whether this is the identity within `tol`.
    pub fn is_identity(&self, tol: f32) -> bool {
        approx(self.ll, 1.0, tol)
            && approx(self.lr, 0.0, tol)
            && approx(self.rl, 0.0, tol)
            && approx(self.rr, 1.0, tol)
    }

    /// Whether this is a scalar matrix within `tol`.
    pub fn is_scalar(&self, tol: f32) -> bool {
        approx(self.ll, self.rr, tol) && approx(self.lr, 0.0, tol) && approx(self.rl, 0.0, tol)
    }

    /// Whether the cross-feed terms are zero within `tol`.
    pub fn is_diagonal(&self, tol: f32) -> bool {
        approx(self.lr, 0.0, tol) && approx(self.rl, 0.0, tol)
    }

    /// Whether all coefficients are zero within `tol`.
    pub fn is_zero(&self, tol: f32) -> bool {
        approx(self.ll, 0.0, tol)
            && approx(self.lr, 0.0, tol)
            && approx(self.rl, 0.0, tol)
            && approx(self.rr, 0.0, tol)
    }

    /// Coefficient-wise comparison within `tol`.
    pub fn approx_eq(&self, other: &Self, tol: f32) -> bool {
        approx(self.ll, other.ll, tol)
            && approx(self.lr, other.lr, tol)
            && approx(self.rl, other.rl, tol)
            && approx(self.rr, other.rr, tol)
    }

    /// Equal-power mono pan in `[-1, 1]` (MIDI RP-036 curve).
    pub fn set_pan(&mut self, pan: f32) {
        let pan = pan.clamp(-1.0, 1.0);
        let x = core::f32::consts::FRAC_PI_4 * (pan + 1.0);
        self.ll = libm::cosf(x);
        self.rr = libm::sinf(x);
        self.lr = 0.0;
        self.rl = 0.0;
    }

    /// Recovers the pan of a matrix built with [`set_pan`](Self::set_pan).
    pub fn pan(&self) -> f32 {
        let power = self.rr * self.rr + self.ll * self.ll;
        if power < 0.0001 {
            return 0.0;
        }
        let r_norm = libm::fabsf(self.rr) / libm::sqrtf(power);
        libm::asinf(r_norm) / core::f32::consts::FRAC_PI_4 - 1.0
    }

    /// Stereo balance in `[-1, 1]`.
    ///
    /// Panning left folds the right input into the left output while fading
    /// the right output; panning right does the mirror image. The result is
    /// scaled by 0.5 so a full-scale input cannot clip.
    pub fn set_stereo_pan(&mut self, pan: f32) {
        let pan = pan.clamp(-1.0, 1.0);
        let x = core::f32::consts::FRAC_PI_2 * pan;
        *self = if pan < 0.0 {
            Self::new(1.0, -libm::sinf(x), 0.0, libm::cosf(x))
        } else {
            Self::new(libm::cosf(x), 0.0, libm::sinf(x), 1.0)
        };
        *self *= 0.5;
    }

    /// Recovers the balance of a matrix built with
    /// [`set_stereo_pan`](Self::set_stereo_pan).
    pub fn stereo_pan(&self) -> f32 {
        let power = self.power();
        if power < 0.0001 {
            return 0.0;
        }
        let scale_sq = 0.5 / power;
        let right = (self.rr * self.rr + self.rl * self.rl) * scale_sq;
        if right > 0.25 {
            libm::asinf(libm::sqrtf(4.0 * right - 1.0)) / core::f32::consts::FRAC_PI_2
        } else {
            -libm::acosf(libm::sqrtf(4.0 * right)) / core::f32::consts::FRAC_PI_2
        }
    }

    /// Sum of squared coefficients.
    pub fn power(&self) -> f32 {
        self.ll * self.ll + self.lr * self.lr + self.rl * self.rl + self.rr * self.rr
    }
}

impl Add for VolumeMatrix {
    type Output = Self;
    fn add(self, o: Self) -> Self {
        Self::new(self.ll + o.ll, self.lr + o.lr, self.rl + o.rl, self.rr + o.rr)
    }
}

impl AddAssign for VolumeMatrix {
    fn add_assign(&mut self, o: Self) {
        *self = *self + o;
    }
}

impl Sub for VolumeMatrix {
    type Output = Self;
    fn sub(self, o: Self) -> Self {
        Self::new(self.ll - o.ll, self.lr - o.lr, self.rl - o.rl, self.rr - o.rr)
    }
}

impl SubAssign for VolumeMatrix {
    fn sub_assign(&mut self, o: Self) {
        *self = *self - o;
    }
}

impl Mul<f32> for VolumeMatrix {
    type Output = Self;
    fn mul(self, s: f32) -> Self {
        Self::new(self.ll * s, self.lr * s, self.rl * s, self.rr * s)
    }
}

impl MulAssign<f32> for VolumeMatrix {
    fn mul_assign(&mut self, s: f32) {
        *self = *self * s;
    }
}

impl Div<f32> for VolumeMatrix {
    type Output = Self;
    fn div(self, s: f32) -> Self {
        Self::new(self.ll / s, self.lr / s, self.rl / s, self.rr / s)
    }
}

/// Per-frame volume change for a ramp of `ramp_ms` at `sample_rate`.
///
/// Ramps no longer than one sample yield `10.0`, which completes any
/// realistic change in a single frame.
pub fn volume_rate(ramp_ms: f32, sample_rate: f32) -> f32 {
    let ramp_samples = ramp_ms * 0.001 * sample_rate;
    if ramp_samples <= 1.0 {
        10.0
    } else {
        1.0 / ramp_samples
    }
}

/// Frames coefficient change `diff` needs at `rate`.
#[inline]
pub fn ramp_frames(diff: f32, rate: f32) -> usize {
    if rate <= 0.0 {
        return 0;
    }
    libm::ceilf(libm::fabsf(diff) / rate) as usize
}

/// Applies `volume` to `frames` interleaved stereo frames.
pub fn stereo_pan_static<T: Sample>(buf: &mut [T], frames: usize, volume: &VolumeMatrix) {
    let ll = T::coeff(volume.ll);
    let lr = T::coeff(volume.lr);
    let rl = T::coeff(volume.rl);
    let rr = T::coeff(volume.rr);
    for frame in buf[..frames * 2].chunks_exact_mut(2) {
        let (l, r) = (frame[0], frame[1]);
        frame[0] = T::weighted_sum(l, ll, r, lr);
        frame[1] = T::weighted_sum(l, rl, r, rr);
    }
}

/// Ramps `volume` toward `target` over at most `frames` stereo frames.
///
/// Returns the number of frames processed.
pub fn stereo_pan_ramp<T: Sample>(
    buf: &mut [T],
    frames: usize,
    target: &VolumeMatrix,
    volume: &mut VolumeMatrix,
    rate: f32,
) -> usize {
    let diff = *target - *volume;
    let n = [
        ramp_frames(diff.ll, rate),
        ramp_frames(diff.lr, rate),
        ramp_frames(diff.rl, rate),
        ramp_frames(diff.rr, rate),
    ];
    let d = [diff.ll, diff.lr, diff.rl, diff.rr];
    let ramp = n.iter().copied().max().unwrap_or(0).min(frames);

    let inc: [T::Coeff; 4] =
        core::array::from_fn(|k| T::coeff(if n[k] > 0 { d[k] / n[k] as f32 } else { 0.0 }));
    let mut c = [
        T::coeff(volume.ll),
        T::coeff(volume.lr),
        T::coeff(volume.rl),
        T::coeff(volume.rr),
    ];

    for (i, frame) in buf[..ramp * 2].chunks_exact_mut(2).enumerate() {
        let (l, r) = (frame[0], frame[1]);
        frame[0] = T::weighted_sum(l, c[0], r, c[1]);
        frame[1] = T::weighted_sum(l, c[2], r, c[3]);
        for k in 0..4 {
            if i < n[k] {
                c[k] = c[k] + inc[k];
            }
        }
    }

    let settle = |k: usize, t: f32| if ramp >= n[k] { t } else { T::coeff_to_f32(c[k]) };
    volume.ll = settle(0, target.ll);
    volume.lr = settle(1, target.lr);
    volume.rl = settle(2, target.rl);
    volume.rr = settle(3, target.rr);

    ramp
}

/// Applies a stereo volume matrix in place, ramping from `volume` to
/// `target` at `rate` per frame.
///
/// A settled scalar matrix takes a plain scale, skipped entirely at unity.
pub fn stereo_pan<T: Sample>(
    buf: &mut [T],
    frames: usize,
    target: &VolumeMatrix,
    volume: &mut VolumeMatrix,
    rate: f32,
) {
    if target.approx_eq(volume, VOLUME_TOLERANCE) {
        *volume = *target;
        if volume.is_scalar(VOLUME_TOLERANCE) {
            let s = (volume.ll + volume.rr) * 0.5;
            if !approx(s, 1.0, VOLUME_TOLERANCE) {
                crate::mix::scale(&mut buf[..frames * 2], s);
            }
        } else {
            stereo_pan_static(buf, frames, volume);
        }
    } else {
        let ramped = stereo_pan_ramp(buf, frames, target, volume, rate);
        if ramped < frames {
            stereo_pan_static(&mut buf[ramped * 2..], frames - ramped, volume);
        }
    }
}

/// Pans `frames` mono samples into stereo with a fixed matrix diagonal.
pub fn mono_pan_static<T: Sample>(
    input: &[T],
    output: &mut [T],
    frames: usize,
    volume: &VolumeMatrix,
) {
    let l = T::coeff(volume.ll);
    let r = T::coeff(volume.rr);
    for (frame, &s) in output[..frames * 2].chunks_exact_mut(2).zip(&input[..frames]) {
        frame[0] = s.scale(l);
        frame[1] = s.scale(r);
    }
}

/// Ramps the diagonal of `volume` toward `target` while panning mono into
/// stereo. The cross-feed terms are unused for mono input and are set to
/// their targets. Returns the number of frames processed.
pub fn mono_pan_ramp<T: Sample>(
    input: &[T],
    output: &mut [T],
    frames: usize,
    target: &VolumeMatrix,
    volume: &mut VolumeMatrix,
    rate: f32,
) -> usize {
    let l_diff = target.ll - volume.ll;
    let r_diff = target.rr - volume.rr;
    let l_frames = ramp_frames(l_diff, rate);
    let r_frames = ramp_frames(r_diff, rate);
    let ramp = l_frames.max(r_frames).min(frames);

    let l_inc = T::coeff(if l_frames > 0 { l_diff / l_frames as f32 } else { 0.0 });
    let r_inc = T::coeff(if r_frames > 0 { r_diff / r_frames as f32 } else { 0.0 });
    let mut l = T::coeff(volume.ll);
    let mut r = T::coeff(volume.rr);

    for (i, (frame, &s)) in output[..ramp * 2]
        .chunks_exact_mut(2)
        .zip(&input[..ramp])
        .enumerate()
    {
        frame[0] = s.scale(l);
        frame[1] = s.scale(r);
        if i < l_frames {
            l = l + l_inc;
        }
        if i < r_frames {
            r = r + r_inc;
        }
    }

    volume.ll = if ramp >= l_frames { target.ll } else { T::coeff_to_f32(l) };
    volume.rr = if ramp >= r_frames { target.rr } else { T::coeff_to_f32(r) };
    volume.lr = target.lr;
    volume.rl = target.rl;

    ramp
}

/// Pans mono `input` into stereo `output`, ramping from `volume` to
/// `target` at `rate` per frame.
///
/// Only the diagonal is compared. A settled, balanced diagonal takes the
/// plain upmix (unity) or scaled upmix path.
pub fn mono_pan<T: Sample>(
    input: &[T],
    output: &mut [T],
    frames: usize,
    target: &VolumeMatrix,
    volume: &mut VolumeMatrix,
    rate: f32,
) {
    if approx(volume.ll, target.ll, VOLUME_TOLERANCE) && approx(volume.rr, target.rr, VOLUME_TOLERANCE)
    {
        *volume = *target;
        if approx(volume.ll, volume.rr, VOLUME_TOLERANCE) {
            if approx(volume.ll, 1.0, VOLUME_TOLERANCE) {
                crate::mix::convert_to_stereo(&input[..frames], &mut output[..frames * 2]);
            } else {
                crate::mix::convert_to_stereo_scaled(
                    &input[..frames],
                    &mut output[..frames * 2],
                    (volume.ll + volume.rr) * 0.5,
                );
            }
        } else {
            mono_pan_static(input, output, frames, volume);
        }
    } else {
        let ramped = mono_pan_ramp(input, output, frames, target, volume, rate);
        if ramped < frames {
            mono_pan_static(&input[ramped..], &mut output[ramped * 2..], frames - ramped, volume);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_pan_is_equal_power() {
        let mut m = VolumeMatrix::IDENTITY;
        m.set_pan(0.0);
        assert!((m.ll - m.rr).abs() < 1e-6);
        assert!((m.power() - 1.0).abs() < 1e-5);
        assert!(m.pan().abs() < 1e-3);

        m.set_pan(-1.0);
        assert!((m.ll - 1.0).abs() < 1e-6 && m.rr.abs() < 1e-6);
        m.set_pan(0.5);
        assert!((m.pan() - 0.5).abs() < 1e-3);
    }

    #[test]
    fn stereo_pan_balance() {
        let mut m = VolumeMatrix::IDENTITY;
        m.set_stereo_pan(0.0);
        assert!(m.approx_eq(&VolumeMatrix::scalar(0.5), 1e-6));
        m.set_stereo_pan(1.0);
        assert!(m.approx_eq(&VolumeMatrix::new(0.0, 0.0, 0.5, 0.5), 1e-6));
        m.set_stereo_pan(-1.0);
        assert!(m.approx_eq(&VolumeMatrix::new(0.5, 0.5, 0.0, 0.0), 1e-6));
        m.set_stereo_pan(0.3);
        assert!((m.stereo_pan() - 0.3).abs() < 1e-3);
    }

    #[test]
    fn volume_rate_rules() {
        assert_eq!(volume_rate(0.0, 44100.0), 10.0);
        assert_eq!(volume_rate(0.01, 44100.0), 10.0);
        assert!((volume_rate(40.0, 44100.0) - 1.0 / 1764.0).abs() < 1e-9);
    }

    #[test]
    fn ramp_length_uses_ceiling() {
        let mut buf = [1.0f32; 200];
        let mut vol = VolumeMatrix::IDENTITY;
        let target = VolumeMatrix::new(0.0, 0.0, 0.0, 0.5);
        // ll needs ceil(1.0 / 0.03) = 34 frames, rr ceil(0.5 / 0.03) = 17
        let ramped = stereo_pan_ramp(&mut buf, 100, &target, &mut vol, 0.03);
        assert_eq!(ramped, 34);
        assert_eq!(vol, target);
    }

    #[test]
    fn ramp_is_capped_and_resumes() {
        let mut buf = [1.0f32; 20];
        let mut vol = VolumeMatrix::IDENTITY;
        let target = VolumeMatrix::ZERO;
        let ramped = stereo_pan_ramp(&mut buf, 10, &target, &mut vol, 0.05);
        assert_eq!(ramped, 10);
        assert!((vol.ll - 0.5).abs() < 1e-4);
        assert_eq!(vol.lr, 0.0);
        assert!(buf[0] == 1.0 && buf[18] < 0.6);
    }

    #[test]
    fn settled_identity_is_noop() {
        let mut buf = [0.25f32, -0.5, 0.75, 1.0];
        let before = buf;
        let mut vol = VolumeMatrix::IDENTITY;
        stereo_pan(&mut buf, 2, &VolumeMatrix::IDENTITY, &mut vol, 0.01);
        assert_eq!(buf, before);
    }

    #[test]
    fn mono_pan_fast_paths() {
        let input = [0.5f32, -0.5];
        let mut out = [0.0f32; 4];
        let mut vol = VolumeMatrix::IDENTITY;
        mono_pan(&input, &mut out, 2, &VolumeMatrix::IDENTITY, &mut vol, 0.01);
        assert_eq!(out, [0.5, 0.5, -0.5, -0.5]);

        let mut vol = VolumeMatrix::scalar(0.5);
        mono_pan(&input, &mut out, 2, &VolumeMatrix::scalar(0.5), &mut vol, 0.01);
        assert_eq!(out, [0.25, 0.25, -0.25, -0.25]);

        let mut vol = VolumeMatrix::diagonal(1.0, 0.0);
        mono_pan(&input, &mut out, 2, &VolumeMatrix::diagonal(1.0, 0.0), &mut vol, 0.01);
        assert_eq!(out, [0.5, 0.0, -0.5, 0.0]);
    }

    #[test]
    fn mono_ramp_pins_cross_terms() {
        let input = [1 << 24; 8];
        let mut out = [0i32; 16];
        let mut vol = VolumeMatrix::IDENTITY;
        let target = VolumeMatrix::new(0.0, 0.3, 0.3, 1.0);
        mono_pan(&input, &mut out, 8, &target, &mut vol, 0.25);
        assert_eq!(vol, target);
        assert_eq!(out[0], 1 << 24);
        assert_eq!(out[8], 0);
        assert_eq!(out[9], 1 << 24);
    }
}

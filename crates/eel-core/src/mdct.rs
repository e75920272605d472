//! Unscaled MDCT/IMDCT plans.
//!
//! For an `n`-point block the forward transform produces `n/2` outputs:
//!
//! ```text
//! X[k] = Σ x[i] · cos(2π/n · (i + ½ + n/4) · (k + ½))
//! ```
//!
//! and the inverse is the transpose of that sum. Neither direction scales,
//! so sine-windowed overlap-add at hop `n/2` reconstructs the input times
//! `n/4`.
//!
//! Short blocks use the cosine sum directly. Longer blocks fold the input
//! into a DCT-IV of length `n/2`, which is evaluated with an `n/4`-point
//! complex FFT.
//!
//! Transforms never touch the heap: working buffers live on the stack,
//! sized for the largest block (about 32 KiB per call).

use std::f64::consts::PI;
use std::ops::{Add, Mul, Sub};

use crate::constants::{DIRECT_MAX_LEN, MDCT_MAX_LEN};

/// Smallest length a plan can be built for.
pub const PLAN_MIN_LEN: usize = 16;

const MAX_HALF: usize = MDCT_MAX_LEN / 2;
const MAX_QUARTER: usize = MDCT_MAX_LEN / 4;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Complex {
    re: f64,
    im: f64,
}

impl Complex {
    fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    /// `exp(-iθ)`.
    fn expi_neg(theta: f64) -> Self {
        Self::new(theta.cos(), -theta.sin())
    }
}

impl Add for Complex {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl Sub for Complex {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Mul for Complex {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

/// Tables for the FFT path.
#[derive(Debug)]
struct FftTables {
    /// Bit-reversal permutation of `0..n/4`.
    bitrev: Vec<usize>,
    /// `exp(-2πi·k/(n/4))` for `k < n/8`.
    twiddle: Vec<Complex>,
    /// `exp(-iπ·m/(n/2))`, applied before the FFT.
    pre: Vec<Complex>,
    /// `exp(-iπ·(k + ¼)/(n/2))`, applied after it.
    post: Vec<Complex>,
}

#[derive(Debug)]
enum Engine {
    /// Row-major `n/2 × n` cosine matrix.
    Direct(Vec<f64>),
    Fft(FftTables),
}

/// Precomputed state for one block length. Immutable once built, so a plan
/// can be shared freely between threads.
#[derive(Debug)]
pub struct MdctPlan {
    n: usize,
    window: Vec<f64>,
    engine: Engine,
}

impl MdctPlan {
    /// Build a plan for `n`-point blocks. `n` must be a power of two between
    /// [`PLAN_MIN_LEN`] and the largest supported block.
    pub fn new(n: usize) -> Option<Self> {
        if !n.is_power_of_two() || !(PLAN_MIN_LEN..=MDCT_MAX_LEN).contains(&n) {
            return None;
        }
        Some(Self::build(n))
    }

    /// [`new`](Self::new) for a length the caller has already validated.
    pub(crate) fn build(n: usize) -> Self {
        let window = (0..n)
            .map(|i| (PI * (i as f64 + 0.5) / n as f64).sin())
            .collect();
        let engine = if n <= DIRECT_MAX_LEN {
            Engine::Direct(cosine_matrix(n))
        } else {
            Engine::Fft(FftTables::new(n))
        };
        tracing::debug!(n, direct = n <= DIRECT_MAX_LEN, "built mdct plan");
        Self { n, window, engine }
    }

    /// Input length of the forward transform.
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// `out[i] = input[i] · sin(π(i + ½)/n)`. Both slices are `n` long.
    pub fn apply_window(&self, input: &[f64], out: &mut [f64]) {
        for ((o, x), w) in out.iter_mut().zip(input).zip(&self.window) {
            *o = x * w;
        }
    }

    /// Multiply the first `n` samples of `buf` by the window.
    pub fn window_in_place(&self, buf: &mut [f64]) {
        for (x, w) in buf.iter_mut().zip(&self.window) {
            *x *= w;
        }
    }

    /// Forward transform: `n` inputs to `n/2` outputs.
    pub fn forward(&self, input: &[f64], out: &mut [f64]) {
        let (n, m) = (self.n, self.n / 2);
        debug_assert!(input.len() >= n && out.len() >= m);
        match &self.engine {
            Engine::Direct(cos) => {
                for (k, o) in out[..m].iter_mut().enumerate() {
                    let row = &cos[k * n..(k + 1) * n];
                    *o = row.iter().zip(input).map(|(c, x)| c * x).sum();
                }
            }
            Engine::Fft(tables) => {
                // Fold [a b c d] to (-c_r - d, a - b_r).
                let q = n / 4;
                let mut folded = [0.0; MAX_HALF];
                let folded = &mut folded[..m];
                for j in 0..q {
                    folded[j] = -input[3 * q - 1 - j] - input[3 * q + j];
                    folded[q + j] = input[j] - input[2 * q - 1 - j];
                }
                tables.dct4(folded, &mut out[..m]);
            }
        }
    }

    /// Inverse transform: `n/2` inputs to `n` outputs.
    pub fn inverse(&self, input: &[f64], out: &mut [f64]) {
        let (n, m) = (self.n, self.n / 2);
        debug_assert!(input.len() >= m && out.len() >= n);
        match &self.engine {
            Engine::Direct(cos) => {
                out[..n].fill(0.0);
                for (k, &x) in input[..m].iter().enumerate() {
                    let row = &cos[k * n..(k + 1) * n];
                    for (o, c) in out.iter_mut().zip(row) {
                        *o += c * x;
                    }
                }
            }
            Engine::Fft(tables) => {
                // Unfold DCT-IV output (w1, w2) to (w2, -w2_r, -w1_r, -w1).
                let q = n / 4;
                let mut w = [0.0; MAX_HALF];
                let w = &mut w[..m];
                tables.dct4(&input[..m], w);
                for j in 0..q {
                    out[j] = w[q + j];
                    out[2 * q - 1 - j] = -w[q + j];
                    out[3 * q - 1 - j] = -w[j];
                    out[3 * q + j] = -w[j];
                }
            }
        }
    }

    /// Reference O(n²) forward sum, independent of the plan's engine.
    pub fn forward_direct(&self, input: &[f64], out: &mut [f64]) {
        let n = self.n;
        for (k, o) in out[..n / 2].iter_mut().enumerate() {
            *o = input[..n]
                .iter()
                .enumerate()
                .map(|(i, x)| x * basis(n, i, k))
                .sum();
        }
    }

    /// Reference O(n²) inverse sum.
    pub fn inverse_direct(&self, input: &[f64], out: &mut [f64]) {
        let n = self.n;
        for (i, o) in out[..n].iter_mut().enumerate() {
            *o = input[..n / 2]
                .iter()
                .enumerate()
                .map(|(k, x)| x * basis(n, i, k))
                .sum();
        }
    }
}

fn basis(n: usize, i: usize, k: usize) -> f64 {
    let phase = 2.0 * PI / n as f64 * (i as f64 + 0.5 + n as f64 / 4.0) * (k as f64 + 0.5);
    phase.cos()
}

fn cosine_matrix(n: usize) -> Vec<f64> {
    let mut cos = Vec::with_capacity(n * n / 2);
    for k in 0..n / 2 {
        cos.extend((0..n).map(|i| basis(n, i, k)));
    }
    cos
}

impl FftTables {
    fn new(n: usize) -> Self {
        let m = n / 2;
        let l = n / 4;
        let bits = l.trailing_zeros();
        let bitrev = (0..l)
            .map(|i| if bits == 0 { 0 } else { i.reverse_bits() >> (usize::BITS - bits) })
            .collect();
        let twiddle = (0..l / 2)
            .map(|k| Complex::expi_neg(2.0 * PI * k as f64 / l as f64))
            .collect();
        let pre = (0..l)
            .map(|j| Complex::expi_neg(PI * j as f64 / m as f64))
            .collect();
        let post = (0..l)
            .map(|k| Complex::expi_neg(PI * (k as f64 + 0.25) / m as f64))
            .collect();
        Self {
            bitrev,
            twiddle,
            pre,
            post,
        }
    }

    /// Unscaled DCT-IV of length `m = 2·l`:
    /// `out[k] = Σ v[j] · cos(π/m · (j + ½)(k + ½))`.
    fn dct4(&self, v: &[f64], out: &mut [f64]) {
        let l = self.bitrev.len();
        let m = 2 * l;
        let mut scratch = [Complex::default(); MAX_QUARTER];
        let buf = &mut scratch[..l];
        for (j, &r) in self.bitrev.iter().enumerate() {
            buf[r] = Complex::new(v[2 * j], v[m - 1 - 2 * j]) * self.pre[j];
        }
        self.fft_in_place(buf);
        for (k, (z, t)) in buf.iter().zip(&self.post).enumerate() {
            let s = *z * *t;
            out[2 * k] = s.re;
            out[m - 1 - 2 * k] = -s.im;
        }
    }

    /// Radix-2 decimation-in-time FFT over input already in bit-reversed
    /// order.
    fn fft_in_place(&self, buf: &mut [Complex]) {
        let l = buf.len();
        let mut size = 2;
        while size <= l {
            let half = size / 2;
            let stride = l / size;
            for start in (0..l).step_by(size) {
                for k in 0..half {
                    let w = self.twiddle[k * stride];
                    let a = buf[start + k];
                    let b = buf[start + k + half] * w;
                    buf[start + k] = a + b;
                    buf[start + k + half] = a - b;
                }
            }
            size *= 2;
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn signal(rng: &mut SmallRng, len: usize) -> Vec<f64> {
        (0..len).map(|_| rng.random_range(-1.0..1.0)).collect()
    }

    #[test]
    fn test_plan_lengths() {
        assert!(MdctPlan::new(8).is_none());
        assert!(MdctPlan::new(16).is_some());
        assert!(MdctPlan::new(100).is_none());
        assert!(MdctPlan::new(4096).is_some());
        assert!(MdctPlan::new(8192).is_none());
        assert_eq!(MdctPlan::new(256).unwrap().len(), 256);
    }

    #[test]
    fn test_fast_matches_direct() {
        let mut rng = SmallRng::seed_from_u64(42);
        for n in [16, 64, 128, 256, 1024] {
            let plan = MdctPlan::new(n).unwrap();
            let x = signal(&mut rng, n);

            let mut fast = vec![0.0; n / 2];
            let mut slow = vec![0.0; n / 2];
            plan.forward(&x, &mut fast);
            plan.forward_direct(&x, &mut slow);
            for (a, b) in fast.iter().zip(&slow) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
            }

            let spectrum = signal(&mut rng, n / 2);
            let mut fast = vec![0.0; n];
            let mut slow = vec![0.0; n];
            plan.inverse(&spectrum, &mut fast);
            plan.inverse_direct(&spectrum, &mut slow);
            for (a, b) in fast.iter().zip(&slow) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_window_is_power_complementary() {
        let plan = MdctPlan::new(64).unwrap();
        let ones = vec![1.0; 64];
        let mut w = vec![0.0; 64];
        plan.apply_window(&ones, &mut w);
        for i in 0..32 {
            assert_abs_diff_eq!(w[i] * w[i] + w[i + 32] * w[i + 32], 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(w[i], w[63 - i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_overlap_add_reconstructs() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut n = 64;
        while n <= MDCT_MAX_LEN {
            let plan = MdctPlan::new(n).unwrap();
            let hop = n / 2;
            let x = signal(&mut rng, 3 * hop);
            let mut recon = vec![0.0; 3 * hop];

            for block in 0..2 {
                let start = block * hop;
                let mut windowed = vec![0.0; n];
                plan.apply_window(&x[start..start + n], &mut windowed);
                let mut spectrum = vec![0.0; hop];
                plan.forward(&windowed, &mut spectrum);
                let mut back = vec![0.0; n];
                plan.inverse(&spectrum, &mut back);
                let mut rewindowed = vec![0.0; n];
                plan.apply_window(&back, &mut rewindowed);
                for (r, v) in recon[start..start + n].iter_mut().zip(&rewindowed) {
                    *r += v;
                }
            }

            // Only the middle hop is covered by two blocks.
            let scale = n as f64 / 4.0;
            for i in hop..2 * hop {
                assert_abs_diff_eq!(recon[i], x[i] * scale, epsilon = 1e-9 * scale);
            }
            n *= 2;
        }
    }
}

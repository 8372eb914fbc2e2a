//! Fixed-width vector helpers for child selection.
//!
//! Child statistics are stored in batches of `LANES` floats so a whole batch
//! can be scored with one group of lane-wise operations. `F32x8` is a plain
//! array wrapper the optimizer can vectorize; the two operations that need
//! real instructions to be fast (`reciprocal_sqrt`, `nth_bit_set`) have an
//! explicit scalar fallback.

use std::ops::{Add, Div, Index, Mul};

/// Batch width shared by arena buffers and score columns.
pub const LANES: usize = 8;

/// Eight `f32` lanes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct F32x8(pub [f32; LANES]);

impl F32x8 {
    /// Broadcast one value to every lane.
    #[inline]
    #[must_use]
    pub const fn splat(value: f32) -> Self {
        Self([value; LANES])
    }

    /// Load up to `LANES` values; missing lanes are zero.
    #[inline]
    #[must_use]
    pub fn load_partial(values: &[f32]) -> Self {
        let mut lanes = [0.0; LANES];
        let len = values.len().min(LANES);
        lanes[..len].copy_from_slice(&values[..len]);
        Self(lanes)
    }

    /// Lane-wise maximum.
    #[inline]
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        let mut out = self.0;
        for (a, b) in out.iter_mut().zip(other.0) {
            *a = a.max(b);
        }
        Self(out)
    }

    /// Apply `f` to every lane.
    #[inline]
    #[must_use]
    pub fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Self(self.0.map(f))
    }

    #[inline]
    #[must_use]
    pub fn to_array(self) -> [f32; LANES] {
        self.0
    }
}

macro_rules! lane_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait for F32x8 {
            type Output = Self;

            #[inline]
            fn $method(self, rhs: Self) -> Self {
                let mut out = self.0;
                for (a, b) in out.iter_mut().zip(rhs.0) {
                    *a = *a $op b;
                }
                Self(out)
            }
        }

        impl $trait<f32> for F32x8 {
            type Output = Self;

            #[inline]
            fn $method(self, rhs: f32) -> Self {
                self.$method(F32x8::splat(rhs))
            }
        }
    };
}

lane_op!(Add, add, +);
lane_op!(Mul, mul, *);
lane_op!(Div, div, /);

impl Index<usize> for F32x8 {
    type Output = f32;

    #[inline]
    fn index(&self, index: usize) -> &f32 {
        &self.0[index]
    }
}

/// Index of the maximum among the first `len` lanes.
///
/// Ties go to the later lane. `len` is clamped to `1..=LANES`.
#[inline]
#[must_use]
pub fn hmax_index(v: F32x8, len: usize) -> usize {
    let len = len.clamp(1, LANES);
    let mut best = 0;
    for i in 1..len {
        if v.0[i] >= v.0[best] {
            best = i;
        }
    }
    best
}

/// Approximate lane-wise `1 / sqrt(x)`.
///
/// Uses `rsqrtps` (about 12 bits of precision) on x86_64 and the exact
/// formula elsewhere.
#[inline]
#[must_use]
pub fn reciprocal_sqrt(v: F32x8) -> F32x8 {
    #[cfg(target_arch = "x86_64")]
    {
        use std::arch::x86_64::{_mm_loadu_ps, _mm_rsqrt_ps, _mm_storeu_ps};

        let mut out = [0.0f32; LANES];
        // SAFETY: SSE is part of the x86_64 baseline, and both halves of the
        // 8-lane arrays are valid for unaligned 4-lane loads and stores.
        unsafe {
            let lo = _mm_rsqrt_ps(_mm_loadu_ps(v.0.as_ptr()));
            let hi = _mm_rsqrt_ps(_mm_loadu_ps(v.0.as_ptr().add(4)));
            _mm_storeu_ps(out.as_mut_ptr(), lo);
            _mm_storeu_ps(out.as_mut_ptr().add(4), hi);
        }
        F32x8(out)
    }

    #[cfg(not(target_arch = "x86_64"))]
    {
        reciprocal_sqrt_exact(v)
    }
}

/// Exact lane-wise `1 / sqrt(x)`.
#[inline]
#[must_use]
pub fn reciprocal_sqrt_exact(v: F32x8) -> F32x8 {
    v.map(|x| 1.0 / x.sqrt())
}

/// Position of the `n`-th (zero-based) set bit of `value`.
///
/// Returns `None` when `value` has `n` or fewer bits set.
#[inline]
#[must_use]
pub fn nth_bit_set(value: u32, n: usize) -> Option<u32> {
    if n >= value.count_ones() as usize {
        return None;
    }

    #[cfg(all(target_arch = "x86_64", target_feature = "bmi2"))]
    {
        // SAFETY: guarded by the bmi2 target feature.
        let deposited = unsafe { std::arch::x86_64::_pdep_u32(1u32 << n, value) };
        Some(deposited.trailing_zeros())
    }

    #[cfg(not(all(target_arch = "x86_64", target_feature = "bmi2")))]
    {
        let mut bits = value;
        for _ in 0..n {
            bits &= bits - 1;
        }
        Some(bits.trailing_zeros())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmax_index_respects_len() {
        let v = F32x8([0.1, 0.5, 0.2, 0.3, 9.0, 0.0, 0.0, 0.0]);
        assert_eq!(hmax_index(v, 4), 1);
        assert_eq!(hmax_index(v, 5), 4);
        assert_eq!(hmax_index(v, 1), 0);
    }

    #[test]
    fn test_hmax_index_ties_go_to_later_lane() {
        let v = F32x8([0.5, 0.5, 0.2, 0.5, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(hmax_index(v, 3), 1);
        assert_eq!(hmax_index(v, 4), 3);
        assert_eq!(hmax_index(F32x8::splat(0.0), LANES), LANES - 1);
    }

    #[test]
    fn test_reciprocal_sqrt_is_close() {
        let v = F32x8([1.0, 4.0, 16.0, 25.0, 100.0, 2.0, 3.0, 1e6]);
        let approx = reciprocal_sqrt(v);
        let exact = reciprocal_sqrt_exact(v);
        for i in 0..LANES {
            let rel = (approx[i] - exact[i]).abs() / exact[i];
            assert!(rel < 1e-3, "lane {} off by {}", i, rel);
        }
        assert_eq!(exact[1], 0.5);
    }

    #[test]
    fn test_lane_ops() {
        let a = F32x8::load_partial(&[1.0, 2.0, 3.0]);
        let b = F32x8::splat(2.0);
        assert_eq!((a + b).to_array(), [3.0, 4.0, 5.0, 2.0, 2.0, 2.0, 2.0, 2.0]);
        assert_eq!((a * 2.0).to_array(), [2.0, 4.0, 6.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!((a / b)[2], 1.5);
        assert_eq!(a.max(b).to_array(), [2.0, 2.0, 3.0, 2.0, 2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_nth_bit_set() {
        let value = 0b1011_0100u32;
        assert_eq!(nth_bit_set(value, 0), Some(2));
        assert_eq!(nth_bit_set(value, 1), Some(4));
        assert_eq!(nth_bit_set(value, 2), Some(5));
        assert_eq!(nth_bit_set(value, 3), Some(7));
        assert_eq!(nth_bit_set(value, 4), None);
        assert_eq!(nth_bit_set(0, 0), None);
        assert_eq!(nth_bit_set(u32::MAX, 31), Some(31));
    }
}

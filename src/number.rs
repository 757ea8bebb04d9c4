//! Integer-to-float conversions shared by layout building and live decoding.
//!
//! Both directions must go through the same functions: normalization parameters
//! are derived at layout-build time by running these once on the logical bounds,
//! and live values are decoded by running them on every read. Intermediate math
//! is done in `f64` since `i32::MAX`/`u32::MAX` are not representable in `f32`.

/// Map `value` from `[min, max]` to `[0, 1]`, clamping outside the range.
///
/// Values `<= min` return exactly `0.0`, values `>= max` exactly `1.0`.
#[inline]
pub fn int_to_normalized_float(value: i64, min: i64, max: i64) -> f32 {
    int_to_normalized_f64(value, min, max) as f32
}

/// Unsigned counterpart of [`int_to_normalized_float`].
#[inline]
pub fn uint_to_normalized_float(value: u64, min: u64, max: u64) -> f32 {
    uint_to_normalized_f64(value, min, max) as f32
}

#[inline]
pub(crate) fn int_to_normalized_f64(value: i64, min: i64, max: i64) -> f64 {
    if value <= min {
        return 0.0;
    }
    if value >= max {
        return 1.0;
    }
    (value as f64 - min as f64) / (max as f64 - min as f64)
}

#[inline]
pub(crate) fn uint_to_normalized_f64(value: u64, min: u64, max: u64) -> f64 {
    if value <= min {
        return 0.0;
    }
    if value >= max {
        return 1.0;
    }
    (value as f64 - min as f64) / (max as f64 - min as f64)
}

/// Relative float comparison with an absolute floor near zero.
pub fn approximately(a: f32, b: f32) -> bool {
    let scale = a.abs().max(b.abs());
    (b - a).abs() < (1e-6 * scale).max(f32::EPSILON * 8.0)
}

/// Signed storage range for a two's-complement field of `bits` width.
pub(crate) fn signed_range(bits: u32) -> (i64, i64) {
    let bits = bits.clamp(1, 32);
    (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
}

/// Largest unsigned value storable in `bits`.
pub(crate) fn unsigned_max(bits: u32) -> u64 {
    let bits = bits.clamp(1, 32);
    (1u64 << bits) - 1
}

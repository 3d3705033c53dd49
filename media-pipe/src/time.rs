//! Timestamp conversion between stream time bases.
//!
//! Timestamps are `Option<i64>`: `None` is the "unknown" value
//! (`AV_NOPTS_VALUE` on the FFmpeg side) and is never rescaled.

use std::cmp::Ordering;

use ffmpeg_next::{Rational, Rescale, Rounding};

/// Microsecond time base, FFmpeg's `AV_TIME_BASE_Q`.
pub const MICROSECONDS: Rational = Rational(1, 1_000_000);

/// Rescales a pts or dts from `src` to `dst`.
///
/// Rounds to nearest with ties away from zero. `None` and the `i64`
/// extremes pass through untouched. An invalid (zero) time base yields
/// `None`.
pub fn rescale_ts(ts: Option<i64>, src: Rational, dst: Rational) -> Option<i64> {
    let value = ts?;
    if value == i64::MIN || value == i64::MAX {
        return Some(value);
    }
    valid_pair(src, dst).then(|| value.rescale_with(src, dst, Rounding::NearestInfinity))
}

/// Rescales a duration from `src` to `dst`, truncating toward zero.
///
/// An invalid (zero) time base yields a zero duration.
pub fn rescale_duration(duration: i64, src: Rational, dst: Rational) -> i64 {
    if !valid_pair(src, dst) {
        return 0;
    }
    duration.rescale_with(src, dst, Rounding::Zero)
}

/// Orders two timestamps expressed in different time bases, without
/// rounding either into the other's base.
pub fn compare_ts(a: i64, a_tb: Rational, b: i64, b_tb: Rational) -> Ordering {
    let order = unsafe { ffmpeg_next::ffi::av_compare_ts(a, a_tb.into(), b, b_tb.into()) };
    order.cmp(&0)
}

// av_rescale_q_rnd returns INT64_MIN for a zero or negative divisor
fn valid_pair(src: Rational, dst: Rational) -> bool {
    let divisor = dst.numerator() as i64 * src.denominator() as i64;
    let multiplier = src.numerator() as i64 * dst.denominator() as i64;
    divisor > 0 && multiplier >= 0
}

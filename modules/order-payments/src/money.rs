//! Currency helpers
//!
//! Amounts travel over the wire as decimal currency values and are carried
//! everywhere else as `i64` minor units (cents). Conversion rounds half away
//! from zero, so every comparison and write happens on exact cents.

/// Largest amount accepted in a single payment or allocation, in minor units
/// (ten trillion in currency). Sums over many such rows still fit in `i64`.
pub const MAX_AMOUNT_MINOR: i64 = 1_000_000_000_000_000;

/// Convert a decimal currency value to minor units, rounding to the cent.
///
/// Rounding applies to the parsed `f64`, not to the decimal text the caller
/// sent: `1.005` is stored as `1.00499999...` and becomes 100, not 101.
/// Values outside the `i64` range saturate; callers bound their input first.
pub fn to_minor(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

/// Convert minor units back to a decimal currency value.
pub fn from_minor(minor: i64) -> f64 {
    minor as f64 / 100.0
}

/// Round a decimal currency value to the nearest cent.
pub fn round_currency(value: f64) -> f64 {
    from_minor(to_minor(value))
}

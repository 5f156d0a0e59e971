//! Open and half-open interval edges over an inclusive range primitive.
//!
//! The range index only answers inclusive `[lower, upper]` score queries. A
//! strict edge such as `score < x` is expressed as `score <= next_down(x)`,
//! where `next_down(x)` is the adjacent representable `f64` below `x`. The step
//! is taken on the bit pattern, so it scales with the magnitude of `x` and
//! stays exact near zero and in the subnormal range.

/// Smallest representable `f64` strictly greater than `x`.
///
/// `+inf` and NaN are returned unchanged. Both zeros step to the smallest
/// positive subnormal.
pub fn next_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f64::from_bits(1);
    }

    let bits = x.to_bits();
    if x > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

/// Largest representable `f64` strictly less than `x`.
pub fn next_down(x: f64) -> f64 {
    -next_up(-x)
}

/// Inclusive lower edge equivalent to the exclusive edge `score > x`.
pub fn exclusive_lower(x: f64) -> f64 {
    next_up(x)
}

/// Inclusive upper edge equivalent to the exclusive edge `score < x`.
pub fn exclusive_upper(x: f64) -> f64 {
    next_down(x)
}

#![forbid(unsafe_code)]

//! Arithmetic over counts that may be unknown.
//!
//! A count of `None` is missing information, never zero. Every place that
//! combines counts goes through these helpers so an unknown operand always
//! yields an unknown result.

/// A count that is either known exactly or unknown.
pub type Count = Option<usize>;

/// Sums two counts; unknown unless both are known.
#[inline]
#[must_use]
pub fn add_known(a: Count, b: Count) -> Count {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + b),
        _ => None,
    }
}

/// Signed offset from index `from` to index `to`.
#[inline]
#[must_use]
pub fn signed_distance(from: Option<usize>, to: Option<usize>) -> Option<isize> {
    match (from, to) {
        (Some(from), Some(to)) => Some(to as isize - from as isize),
        _ => None,
    }
}

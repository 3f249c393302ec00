use num_traits::Float;

/// Truncates `value` to a grid of `1 / scale`, e.g. `scale = 100` keeps two
/// decimal places. Rounds toward negative infinity.
pub fn truncate_digits<T: Float>(value: T, scale: T) -> T {
    (value * scale).floor() / scale
}

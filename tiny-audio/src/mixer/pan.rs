//! Linear panning and 16-bit clipping

/// Apply a linear pan to one scaled sample pair.
///
/// `pan` runs from -1.0 (full left) to 1.0 (full right):
///   - pan < 0: left passes through, right is attenuated by |pan| and bleeds
///     that share into the left
///   - pan = 0: both channels pass through unaltered
///   - pan > 0: mirror image
///
/// This is constant-gain, not constant-power: the sum of the weights on
/// each input is always 1.
#[inline]
pub fn apply_pan(left: f64, right: f64, pan: f64) -> (f64, f64) {
    if pan == 0.0 {
        return (left, right);
    }

    let ll = if pan <= 0.0 { 1.0 } else { 1.0 - pan };
    let lr = if pan <= 0.0 { pan.abs() } else { 0.0 };
    let rl = if pan >= 0.0 { pan } else { 0.0 };
    let rr = if pan >= 0.0 { 1.0 } else { 1.0 - pan.abs() };

    (ll * left + lr * right, rl * left + rr * right)
}

/// Convert a mixed accumulator to a 16-bit sample: truncate toward zero,
/// then clamp to [-32768, 32767].
#[inline]
pub fn clip(value: f64) -> i16 {
    // `as` saturates and maps NaN to 0
    value.trunc().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

pub const fn pad_to_multiple(x: usize, multiple: usize) -> usize {
    if multiple == 0 { x } else { x.div_ceil(multiple) * multiple }
}

#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

// inverse of sigmoid, x in (0, 1)
#[inline]
pub fn logit(x: f32) -> f32 {
    -(1.0 / x - 1.0).ln()
}

// ties round toward +inf, -1.5 -> -1
#[inline]
pub fn round_half_up(x: f32) -> f32 {
    (x + 0.5).floor()
}

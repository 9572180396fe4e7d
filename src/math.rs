use num_traits::Float;

/// Rounds half away from zero to `places` decimal places.
#[inline]
pub fn round_to<T: Float + From<u8>>(value: T, places: i32) -> T {
    let scale = <T as From<u8>>::from(10).powi(places);

    (value * scale).round() / scale
}

/// Arithmetic mean, `None` for an empty input.
pub fn mean<T, I>(values: I) -> Option<f64>
where
    T: Into<f64>,
    I: IntoIterator<Item = T>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0f64, 0usize), |(s, n), v| (s + v.into(), n + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_round_to() {
        assert_abs_diff_eq!(round_to(0.83456f32, 3), 0.835f32);
        assert_abs_diff_eq!(round_to(105.24f32, 1), 105.2f32);
        assert_abs_diff_eq!(round_to(1.0f64 / 3.0, 2), 0.33f64);
        assert_abs_diff_eq!(round_to(-2.25f64, 1), -2.3f64);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(Vec::<f32>::new()), None);
        assert_abs_diff_eq!(mean(vec![0.5f32, 1.0]).unwrap(), 0.75);
    }
}

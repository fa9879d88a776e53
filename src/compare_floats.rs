pub fn min_of_2<T: PartialOrd + Copy>(first: T, second: T) -> T {
    if first < second {
        first
    } else {
        second
    }
}

pub fn max_of_2<T: PartialOrd + Copy>(first: T, second: T) -> T {
    if first > second {
        first
    } else {
        second
    }
}

/// Clamp a value into `[lower, upper]`. A NaN lands on the lower bound so that clamping is total
/// and repeated clamping is stable.
pub(crate) fn clamp_to_range(value: f64, lower: f64, upper: f64) -> f64 {
    if value.is_nan() {
        return lower;
    }
    min_of_2(max_of_2(value, lower), upper)
}

/// Largest value of a series, or zero for an empty series.
///
/// The series handled here are sums of non-negative contributions, so zero is the natural floor.
pub(crate) fn max_or_zero(values: impl IntoIterator<Item = f64>) -> f64 {
    values.into_iter().fold(0., max_of_2)
}

pub const WATTS_PER_KILOWATT: u32 = 1_000;
pub const WATT_HOURS_PER_KILOWATT_HOUR: u32 = 1_000;
pub const MINUTES_PER_HOUR: u32 = 60;
pub const HOURS_PER_DAY: u32 = 24;
pub(crate) const PERCENT: f64 = 100.;

/// Lowest power factor a record may carry; also stands in for a zero power factor when deriving
/// apparent power.
pub const MIN_POWER_FACTOR: f64 = 0.01;
pub const MAX_POWER_FACTOR: f64 = 1.0;

/// Turn a 0-100 percentage into a 0-1 fraction.
pub(crate) fn percent_to_fraction(percentage: f64) -> f64 {
    percentage / PERCENT
}

pub fn watt_hours_to_kilowatt_hours(energy_wh: f64) -> f64 {
    energy_wh / WATT_HOURS_PER_KILOWATT_HOUR as f64
}

pub fn watts_to_kilowatts(power_w: f64) -> f64 {
    power_w / WATTS_PER_KILOWATT as f64
}

pub(crate) fn round_to_decimal_places(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Render an hour-of-day offset as a `HH:MM` wall clock time, wrapping at midnight.
pub(crate) fn hours_to_clock_time(hours: f64) -> String {
    let total_minutes = (hours * MINUTES_PER_HOUR as f64).round() as i64;
    let minutes_per_day = (HOURS_PER_DAY * MINUTES_PER_HOUR) as i64;
    let wrapped = total_minutes.rem_euclid(minutes_per_day);

    format!(
        "{:02}:{:02}",
        wrapped / MINUTES_PER_HOUR as i64,
        wrapped % MINUTES_PER_HOUR as i64
    )
}

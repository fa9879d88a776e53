use crate::core::units::{hours_to_clock_time, HOURS_PER_DAY};
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use thiserror::Error;

pub const DEFAULT_INTERVAL_COUNT: usize = 12;
pub const DEFAULT_INTERVAL_HOURS: f64 = 2.;

/// Describes how a day is sliced into the fixed intervals an appliance schedule refers to.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, Validate)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct IntervalConfig {
    /// Hour of day at which the first interval starts.
    #[serde(default)]
    #[validate(minimum = 0.)]
    #[validate(exclusive_maximum = 24.)]
    pub start_hour: f64,
    /// Length of every interval in hours; scales per-interval power into energy.
    #[serde(default = "default_interval_hours")]
    #[validate(exclusive_minimum = 0.)]
    pub interval_hours: f64,
    /// At most one interval per minute of the day.
    #[serde(default = "default_interval_count")]
    #[validate(minimum = 1)]
    #[validate(maximum = 1440)]
    pub count: usize,
    /// Explicit labels; generated from the start hour and span when absent.
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

fn default_interval_hours() -> f64 {
    DEFAULT_INTERVAL_HOURS
}

fn default_interval_count() -> usize {
    DEFAULT_INTERVAL_COUNT
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            start_hour: 0.,
            interval_hours: DEFAULT_INTERVAL_HOURS,
            count: DEFAULT_INTERVAL_COUNT,
            labels: None,
        }
    }
}

impl IntervalConfig {
    pub fn new(start_hour: f64, interval_hours: f64, count: usize) -> Result<Self, IntervalConfigError> {
        let config = Self {
            start_hour,
            interval_hours,
            count,
            labels: None,
        };
        config.check()?;
        Ok(config)
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Result<Self, IntervalConfigError> {
        self.labels = Some(labels);
        self.check()?;
        Ok(self)
    }

    /// Check the bounds declared on the fields plus the label count.
    pub fn check(&self) -> Result<(), IntervalConfigError> {
        self.validate()
            .map_err(|errors| IntervalConfigError::OutOfBounds(errors.to_string()))?;
        if let Some(labels) = &self.labels {
            if labels.len() != self.count {
                return Err(IntervalConfigError::LabelCountMismatch {
                    expected: self.count,
                    actual: labels.len(),
                });
            }
        }
        Ok(())
    }

    /// Labels of the intervals in schedule order, e.g. `00:00–02:00` ... `22:00–00:00`.
    pub fn labels(&self) -> Vec<String> {
        match &self.labels {
            Some(labels) => labels.clone(),
            None => (0..self.count)
                .map(|idx| {
                    let start = self.start_hour + idx as f64 * self.interval_hours;
                    format!(
                        "{}–{}",
                        hours_to_clock_time(start),
                        hours_to_clock_time(start + self.interval_hours)
                    )
                })
                .collect(),
        }
    }

    /// Whether the intervals add up to exactly one day.
    pub fn covers_whole_day(&self) -> bool {
        is_close!(
            self.count as f64 * self.interval_hours,
            HOURS_PER_DAY as f64,
            abs_tol = 1e-9
        )
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum IntervalConfigError {
    #[error("Interval configuration out of bounds: {0}")]
    OutOfBounds(String),
    #[error("Interval configuration has {actual} labels but {expected} intervals")]
    LabelCountMismatch { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    fn should_generate_default_two_hour_labels_wrapping_to_midnight() {
        let labels = IntervalConfig::default().labels();

        assert_eq!(labels.len(), 12);
        assert_eq!(labels[0], "00:00–02:00");
        assert_eq!(labels[5], "10:00–12:00");
        assert_eq!(labels[11], "22:00–00:00");
    }

    #[rstest]
    fn should_generate_hourly_labels_from_offset_start() {
        let labels = IntervalConfig::new(6., 1., 24).unwrap().labels();

        assert_eq!(labels[0], "06:00–07:00");
        assert_eq!(labels[18], "00:00–01:00");
        assert_eq!(labels[23], "05:00–06:00");
    }

    #[rstest]
    fn should_report_whether_the_day_is_covered() {
        assert!(IntervalConfig::default().covers_whole_day());
        assert!(!IntervalConfig::new(0., 2., 6).unwrap().covers_whole_day());
    }

    #[rstest]
    #[case(0., 0., 12)]
    #[case(0., -1., 12)]
    #[case(0., 2., 0)]
    #[case(24., 2., 12)]
    #[case(0., 1., 1441)]
    #[case(0., 1., 4_000_000_000)]
    fn should_reject_out_of_bounds_configuration(
        #[case] start_hour: f64,
        #[case] interval_hours: f64,
        #[case] count: usize,
    ) {
        assert!(matches!(
            IntervalConfig::new(start_hour, interval_hours, count),
            Err(IntervalConfigError::OutOfBounds(_))
        ));
    }

    #[rstest]
    fn should_accept_one_interval_per_minute() {
        let config = IntervalConfig::new(0., 1. / 60., 1440).unwrap();

        assert!(config.covers_whole_day());
        assert_eq!(config.labels()[1439], "23:59–00:00");
    }

    #[rstest]
    fn should_reject_oversized_count_when_deserialised() {
        let config: IntervalConfig = serde_json::from_str(r#"{"count": 4000000000}"#).unwrap();

        assert!(matches!(config.check(), Err(IntervalConfigError::OutOfBounds(_))));
    }

    #[rstest]
    fn should_reject_wrong_number_of_labels() {
        let result = IntervalConfig::new(0., 12., 2)
            .unwrap()
            .with_labels(vec!["day".into()]);

        assert_eq!(
            result,
            Err(IntervalConfigError::LabelCountMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[rstest]
    fn should_use_explicit_labels() {
        let config = IntervalConfig::new(0., 12., 2)
            .unwrap()
            .with_labels(vec!["night".into(), "day".into()])
            .unwrap();

        assert_eq!(config.labels(), vec!["night".to_string(), "day".to_string()]);
    }

    #[rstest]
    fn should_fill_defaults_when_deserialising_partial_config() {
        let config: IntervalConfig = serde_json::from_str(r#"{"interval_hours": 1, "count": 24}"#).unwrap();

        assert_eq!(config.start_hour, 0.);
        assert_eq!(config.interval_hours, 1.);
        assert_eq!(config.count, 24);
        assert_eq!(config.labels, None);
    }
}

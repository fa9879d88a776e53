use crate::compare_floats::max_or_zero;
use crate::core::appliance::{ApplianceRecord, Priority};
use crate::core::intervals::IntervalConfig;
use crate::core::units::percent_to_fraction;
use indexmap::IndexMap;
use serde::Serialize;
use strum::IntoEnumIterator;
use thiserror::Error;

/// Energy in Wh drawn by one record in each interval.
///
/// Both derating factors apply here: duty cycle and use time.
pub fn interval_energy(record: &ApplianceRecord, interval_hours: f64) -> Vec<f64> {
    let duty = percent_to_fraction(record.duty_cycle_pct);
    let use_time = percent_to_fraction(record.use_time_pct);

    (0..record.schedule.len())
        .map(|t_idx| interval_hours * record.total_power_watts() * duty * use_time * record.is_on(t_idx))
        .collect()
}

/// Average power in W of one record in each interval.
///
/// This is nameplate draw while scheduled on. Unlike [`interval_energy`] it is not scaled by duty
/// cycle or use time; the time series and comparison profiles are calibrated to that.
pub fn average_power(record: &ApplianceRecord) -> Vec<f64> {
    (0..record.schedule.len())
        .map(|t_idx| record.total_power_watts() * record.is_on(t_idx))
        .collect()
}

/// Instantaneous power per interval, which for two-state schedules is the average power.
pub fn instantaneous_power(record: &ApplianceRecord) -> Vec<f64> {
    average_power(record)
}

pub fn daily_energy(record: &ApplianceRecord, interval_hours: f64) -> f64 {
    interval_energy(record, interval_hours).iter().sum()
}

/// Peak system loads: the largest per-interval sum over a set of records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PeakLoads {
    pub real_w: f64,
    pub apparent_va: f64,
}

/// Peak real and apparent load of the records as scheduled, not adjusted for use time.
pub fn peak_loads<'a>(
    records: impl IntoIterator<Item = &'a ApplianceRecord> + Clone,
    interval_count: usize,
) -> PeakLoads {
    PeakLoads {
        real_w: peak_of(records.clone(), interval_count, |record| record.total_power_watts()),
        apparent_va: peak_of(records, interval_count, |record| record.total_apparent_power_va()),
    }
}

/// Peak real and apparent load with every record's draw scaled by its use time.
///
/// Summaries over priority-filtered subsets use this variant.
pub fn use_time_adjusted_peak_loads<'a>(
    records: impl IntoIterator<Item = &'a ApplianceRecord> + Clone,
    interval_count: usize,
) -> PeakLoads {
    PeakLoads {
        real_w: peak_of(records.clone(), interval_count, |record| {
            record.total_power_watts() * percent_to_fraction(record.use_time_pct)
        }),
        apparent_va: peak_of(records, interval_count, |record| {
            record.total_apparent_power_va() * percent_to_fraction(record.use_time_pct)
        }),
    }
}

/// Per-interval sum of a per-record draw over the records scheduled on.
pub(crate) fn interval_sums<'a>(
    records: impl IntoIterator<Item = &'a ApplianceRecord> + Clone,
    interval_count: usize,
    draw: impl Fn(&ApplianceRecord) -> f64,
) -> Vec<f64> {
    (0..interval_count)
        .map(|t_idx| {
            records
                .clone()
                .into_iter()
                .map(|record| draw(record) * record.is_on(t_idx))
                .sum::<f64>()
        })
        .collect()
}

fn peak_of<'a>(
    records: impl IntoIterator<Item = &'a ApplianceRecord> + Clone,
    interval_count: usize,
    draw: impl Fn(&ApplianceRecord) -> f64,
) -> f64 {
    max_or_zero(interval_sums(records, interval_count, draw))
}

/// Reject a batch where any schedule does not have one entry per configured interval.
pub fn check_schedules(records: &[ApplianceRecord], interval_count: usize) -> Result<(), CatalogueError> {
    match records
        .iter()
        .enumerate()
        .find(|(_, record)| record.schedule.len() != interval_count)
    {
        Some((index, record)) => Err(CatalogueError::ScheduleLengthMismatch {
            index,
            name: record.name.clone(),
            expected: interval_count,
            actual: record.schedule.len(),
        }),
        None => Ok(()),
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum CatalogueError {
    #[error("Appliance '{name}' (record {index}) has a schedule of {actual} intervals but {expected} are configured")]
    ScheduleLengthMismatch {
        index: usize,
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// A validated record together with everything derived from it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ApplianceLoad {
    #[serde(flatten)]
    pub record: ApplianceRecord,
    pub apparent_power_va: f64,
    pub energy_wh: Vec<f64>,
    pub average_power_w: Vec<f64>,
    pub total_daily_energy_wh: f64,
}

impl ApplianceLoad {
    fn new(record: &ApplianceRecord, interval_hours: f64) -> Self {
        let energy_wh = interval_energy(record, interval_hours);
        let total_daily_energy_wh = energy_wh.iter().sum::<f64>();
        Self {
            record: record.clone(),
            apparent_power_va: record.apparent_power_va(),
            average_power_w: average_power(record),
            energy_wh,
            total_daily_energy_wh,
        }
    }
}

/// Energy and power series for a whole validated catalogue.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoadProfile {
    interval_labels: Vec<String>,
    interval_hours: f64,
    appliances: Vec<ApplianceLoad>,
}

impl LoadProfile {
    /// Derive per-interval energy and power for every record.
    ///
    /// Records are expected to have been through the validator already.
    pub fn calculate(records: &[ApplianceRecord], intervals: &IntervalConfig) -> Result<Self, CatalogueError> {
        check_schedules(records, intervals.count)?;

        Ok(Self {
            interval_labels: intervals.labels(),
            interval_hours: intervals.interval_hours,
            appliances: records
                .iter()
                .map(|record| ApplianceLoad::new(record, intervals.interval_hours))
                .collect(),
        })
    }

    pub fn interval_labels(&self) -> &[String] {
        &self.interval_labels
    }

    pub fn interval_count(&self) -> usize {
        self.interval_labels.len()
    }

    pub fn interval_hours(&self) -> f64 {
        self.interval_hours
    }

    pub fn appliances(&self) -> &[ApplianceLoad] {
        &self.appliances
    }

    pub fn records(&self) -> impl Iterator<Item = &ApplianceRecord> + Clone {
        self.appliances.iter().map(|appliance| &appliance.record)
    }

    pub fn total_energy_wh(&self) -> f64 {
        self.appliances
            .iter()
            .map(|appliance| appliance.total_daily_energy_wh)
            .sum()
    }

    /// Energy per interval summed over all records.
    pub fn total_energy_profile(&self) -> Vec<f64> {
        (0..self.interval_count())
            .map(|t_idx| {
                self.appliances
                    .iter()
                    .map(|appliance| appliance.energy_wh[t_idx])
                    .sum::<f64>()
            })
            .collect()
    }

    /// Average power per interval summed over all records.
    pub fn total_load_profile(&self) -> Vec<f64> {
        (0..self.interval_count())
            .map(|t_idx| {
                self.appliances
                    .iter()
                    .map(|appliance| appliance.average_power_w[t_idx])
                    .sum::<f64>()
            })
            .collect()
    }

    /// Peak loads over the entire, unfiltered catalogue.
    pub fn peak_loads(&self) -> PeakLoads {
        peak_loads(self.records(), self.interval_count())
    }

    /// Names of appliances that use no energy over the day.
    pub fn zero_energy_appliances(&self) -> Vec<&str> {
        self.appliances
            .iter()
            .filter(|appliance| appliance.total_daily_energy_wh == 0.)
            .map(|appliance| appliance.record.name.as_str())
            .collect()
    }

    /// Average power rows of the appliances whose priority is among those given.
    pub fn filtered_average_power(&self, priorities: &[Priority]) -> Vec<&ApplianceLoad> {
        self.appliances
            .iter()
            .filter(|appliance| appliance.record.has_priority_in(priorities))
            .collect()
    }

    /// Daily energy summed per priority, with every priority present.
    pub fn energy_by_priority(&self) -> IndexMap<Priority, f64> {
        Priority::iter()
            .map(|priority| {
                let energy = self
                    .appliances
                    .iter()
                    .filter(|appliance| appliance.record.priority == priority)
                    .map(|appliance| appliance.total_daily_energy_wh)
                    .sum::<f64>();
                (priority, energy)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    const INTERVALS: usize = 12;

    fn schedule_on(intervals: &[usize]) -> Vec<bool> {
        (0..INTERVALS).map(|t_idx| intervals.contains(&t_idx)).collect()
    }

    #[fixture]
    fn lamp() -> ApplianceRecord {
        ApplianceRecord {
            name: "Lamp".into(),
            quantity: 1,
            power_watts: 100.,
            duty_cycle_pct: 100.,
            power_factor: 1.,
            use_time_pct: 50.,
            schedule: schedule_on(&[0]),
            priority: Priority::Essential,
            room: "Living Room".into(),
        }
    }

    #[fixture]
    fn fridge() -> ApplianceRecord {
        ApplianceRecord {
            name: "Fridge".into(),
            quantity: 1,
            power_watts: 300.,
            duty_cycle_pct: 40.,
            power_factor: 0.85,
            use_time_pct: 100.,
            schedule: vec![true; INTERVALS],
            priority: Priority::Essential,
            room: "Kitchen".into(),
        }
    }

    #[fixture]
    fn kettle() -> ApplianceRecord {
        ApplianceRecord {
            name: "Kettle".into(),
            quantity: 1,
            power_watts: 2000.,
            duty_cycle_pct: 100.,
            power_factor: 1.,
            use_time_pct: 5.,
            schedule: schedule_on(&[0, 3, 6, 8]),
            priority: Priority::NonEssential,
            room: "Kitchen".into(),
        }
    }

    #[rstest]
    fn should_apply_duty_cycle_and_use_time_to_energy(lamp: ApplianceRecord) {
        let energy = interval_energy(&lamp, 2.);

        assert_eq!(energy[0], 100.);
        assert!(energy[1..].iter().all(|&e| e == 0.));
    }

    #[rstest]
    fn should_not_scale_average_power(lamp: ApplianceRecord) {
        let power = average_power(&lamp);

        assert_eq!(power[0], 100.);
        assert!(power[1..].iter().all(|&p| p == 0.));
        assert_eq!(instantaneous_power(&lamp), power);
    }

    #[rstest]
    fn should_scale_energy_by_interval_length(fridge: ApplianceRecord) {
        // 300 W * 0.4 duty * 1 h per interval
        assert_relative_eq!(interval_energy(&fridge, 1.)[5], 120.);
        assert_relative_eq!(daily_energy(&fridge, 2.), 2. * 300. * 0.4 * 12.);
    }

    #[rstest]
    fn should_contribute_nothing_with_zero_quantity(mut fridge: ApplianceRecord) {
        fridge.quantity = 0;
        let records = [fridge];

        assert_eq!(daily_energy(&records[0], 2.), 0.);
        assert!(average_power(&records[0]).iter().all(|&p| p == 0.));
        assert_eq!(peak_loads(&records, INTERVALS), PeakLoads::default());
        assert_eq!(use_time_adjusted_peak_loads(&records, INTERVALS), PeakLoads::default());
    }

    #[rstest]
    fn should_contribute_nothing_when_never_scheduled(mut kettle: ApplianceRecord) {
        kettle.schedule = vec![false; INTERVALS];
        let records = [kettle];

        assert_eq!(daily_energy(&records[0], 2.), 0.);
        assert_eq!(peak_loads(&records, INTERVALS), PeakLoads::default());
    }

    #[rstest]
    fn should_find_peak_at_busiest_interval(lamp: ApplianceRecord, fridge: ApplianceRecord, kettle: ApplianceRecord) {
        let records = [lamp, fridge, kettle];
        let peaks = peak_loads(&records, INTERVALS);

        // interval 0 has everything on
        assert_relative_eq!(peaks.real_w, 100. + 300. + 2000.);
        assert_relative_eq!(peaks.apparent_va, 100. + 352.9 + 2000.);
    }

    #[rstest]
    fn should_scale_adjusted_peaks_by_use_time(lamp: ApplianceRecord, kettle: ApplianceRecord) {
        let records = [lamp, kettle];
        let peaks = use_time_adjusted_peak_loads(&records, INTERVALS);

        assert_relative_eq!(peaks.real_w, 50. + 100.);
        assert_relative_eq!(peaks.apparent_va, 50. + 100.);
    }

    #[rstest]
    fn should_give_zero_peaks_for_empty_batch() {
        let records: Vec<ApplianceRecord> = vec![];

        assert_eq!(peak_loads(&records, INTERVALS), PeakLoads::default());
    }

    #[rstest]
    fn should_reject_schedule_of_wrong_length(lamp: ApplianceRecord, mut kettle: ApplianceRecord) {
        kettle.schedule.pop();
        let result = LoadProfile::calculate(&[lamp, kettle], &IntervalConfig::default());

        assert_eq!(
            result,
            Err(CatalogueError::ScheduleLengthMismatch {
                index: 1,
                name: "Kettle".into(),
                expected: 12,
                actual: 11,
            })
        );
    }

    #[rstest]
    fn should_build_profile_for_catalogue(lamp: ApplianceRecord, fridge: ApplianceRecord, kettle: ApplianceRecord) {
        let profile = LoadProfile::calculate(&[lamp, fridge, kettle], &IntervalConfig::default()).unwrap();

        assert_eq!(profile.interval_count(), 12);
        assert_eq!(profile.appliances()[0].total_daily_energy_wh, 100.);
        assert_eq!(profile.appliances()[1].apparent_power_va, 352.9);
        assert_relative_eq!(profile.appliances()[2].total_daily_energy_wh, 4. * 2. * 2000. * 0.05);
        assert_relative_eq!(profile.total_energy_wh(), 100. + 2880. + 800.);
        assert_relative_eq!(profile.total_energy_profile().iter().sum::<f64>(), profile.total_energy_wh());
    }

    #[rstest]
    fn should_take_peak_real_load_as_max_of_total_load_profile(
        lamp: ApplianceRecord,
        fridge: ApplianceRecord,
        kettle: ApplianceRecord,
    ) {
        let profile = LoadProfile::calculate(&[lamp, fridge, kettle], &IntervalConfig::default()).unwrap();
        let total_load = profile.total_load_profile();

        assert_eq!(total_load[1], 300.);
        assert_eq!(total_load[3], 2300.);
        assert_eq!(max_or_zero(total_load), profile.peak_loads().real_w);
    }

    #[rstest]
    fn should_list_zero_energy_appliances(lamp: ApplianceRecord, mut kettle: ApplianceRecord) {
        kettle.use_time_pct = 0.;
        let profile = LoadProfile::calculate(&[lamp, kettle], &IntervalConfig::default()).unwrap();

        assert_eq!(profile.zero_energy_appliances(), vec!["Kettle"]);
    }

    #[rstest]
    fn should_filter_power_rows_by_priority(lamp: ApplianceRecord, kettle: ApplianceRecord) {
        let profile = LoadProfile::calculate(&[lamp, kettle], &IntervalConfig::default()).unwrap();

        let names = |priorities: &[Priority]| {
            profile
                .filtered_average_power(priorities)
                .iter()
                .map(|appliance| appliance.record.name.clone())
                .collect::<Vec<_>>()
        };

        assert_eq!(names(&[Priority::Essential]), vec!["Lamp"]);
        assert_eq!(names(&[Priority::Medium, Priority::NonEssential]), vec!["Kettle"]);
        assert!(names(&[]).is_empty());
    }

    #[rstest]
    fn should_break_down_energy_by_priority(lamp: ApplianceRecord, fridge: ApplianceRecord, kettle: ApplianceRecord) {
        let profile = LoadProfile::calculate(&[lamp, fridge, kettle], &IntervalConfig::default()).unwrap();
        let breakdown = profile.energy_by_priority();

        assert_relative_eq!(breakdown[&Priority::Essential], 100. + 2880.);
        assert_eq!(breakdown[&Priority::Medium], 0.);
        assert_relative_eq!(breakdown[&Priority::NonEssential], 800.);
    }

    #[rstest]
    fn should_give_identical_results_on_repeated_runs(lamp: ApplianceRecord, fridge: ApplianceRecord, kettle: ApplianceRecord) {
        let records = [lamp, fridge, kettle];
        let first = LoadProfile::calculate(&records, &IntervalConfig::default()).unwrap();
        let second = LoadProfile::calculate(&records, &IntervalConfig::default()).unwrap();

        assert_eq!(first, second);
    }
}

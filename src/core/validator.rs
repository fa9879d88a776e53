use crate::compare_floats::{clamp_to_range, max_of_2};
use crate::core::appliance::ApplianceRecord;
use crate::core::units::{MAX_POWER_FACTOR, MIN_POWER_FACTOR, PERCENT};

/// Clamp every record of a catalogue into physically plausible ranges.
///
/// Returns a fresh batch; the input stays untouched so callers can diff the edited snapshot
/// against what they started with. Never fails: out-of-range values are clamped, not rejected.
pub fn validate(records: &[ApplianceRecord]) -> Vec<ApplianceRecord> {
    records.iter().map(validate_record).collect()
}

/// Clamp the numeric fields of one record independently of each other.
pub fn validate_record(record: &ApplianceRecord) -> ApplianceRecord {
    ApplianceRecord {
        use_time_pct: clamp_to_range(record.use_time_pct, 0., PERCENT),
        power_watts: clamp_to_range(record.power_watts, 0., f64::INFINITY),
        duty_cycle_pct: clamp_to_range(record.duty_cycle_pct, 0., PERCENT),
        power_factor: clamp_to_range(record.power_factor, MIN_POWER_FACTOR, MAX_POWER_FACTOR),
        quantity: max_of_2(record.quantity, 0),
        ..record.clone()
    }
}

/// Indices of records that validation altered.
pub fn clamped_indices(raw: &[ApplianceRecord], validated: &[ApplianceRecord]) -> Vec<usize> {
    raw.iter()
        .zip(validated)
        .enumerate()
        .filter(|(_, (before, after))| !same_values(before, after))
        .map(|(idx, _)| idx)
        .collect()
}

// NaN never equals itself, so compare bit patterns for the float fields
fn same_values(before: &ApplianceRecord, after: &ApplianceRecord) -> bool {
    before.quantity == after.quantity
        && before.power_watts.to_bits() == after.power_watts.to_bits()
        && before.duty_cycle_pct.to_bits() == after.duty_cycle_pct.to_bits()
        && before.power_factor.to_bits() == after.power_factor.to_bits()
        && before.use_time_pct.to_bits() == after.use_time_pct.to_bits()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::appliance::Priority;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn out_of_range() -> ApplianceRecord {
        ApplianceRecord {
            name: "Broken Heater".into(),
            quantity: -2,
            power_watts: -1500.,
            duty_cycle_pct: 140.,
            power_factor: 0.,
            use_time_pct: -10.,
            schedule: vec![true, false, true],
            priority: Priority::NonEssential,
            room: "Garage".into(),
        }
    }

    #[fixture]
    fn in_range() -> ApplianceRecord {
        ApplianceRecord {
            name: "Router".into(),
            quantity: 1,
            power_watts: 10.,
            duty_cycle_pct: 100.,
            power_factor: 0.6,
            use_time_pct: 100.,
            schedule: vec![true, true, true],
            priority: Priority::Essential,
            room: "Living Room".into(),
        }
    }

    #[rstest]
    fn should_clamp_each_field_into_range(out_of_range: ApplianceRecord) {
        let validated = validate_record(&out_of_range);

        assert_eq!(validated.quantity, 0);
        assert_eq!(validated.power_watts, 0.);
        assert_eq!(validated.duty_cycle_pct, 100.);
        assert_eq!(validated.power_factor, 0.01);
        assert_eq!(validated.use_time_pct, 0.);
    }

    #[rstest]
    fn should_clamp_upper_bounds(in_range: ApplianceRecord) {
        let record = ApplianceRecord {
            power_factor: 1.7,
            use_time_pct: 250.,
            ..in_range
        };
        let validated = validate_record(&record);

        assert_eq!(validated.power_factor, 1.);
        assert_eq!(validated.use_time_pct, 100.);
    }

    #[rstest]
    fn should_pass_descriptive_fields_through(out_of_range: ApplianceRecord) {
        let validated = validate_record(&out_of_range);

        assert_eq!(validated.name, out_of_range.name);
        assert_eq!(validated.schedule, out_of_range.schedule);
        assert_eq!(validated.priority, out_of_range.priority);
        assert_eq!(validated.room, out_of_range.room);
    }

    #[rstest]
    fn should_leave_input_untouched(out_of_range: ApplianceRecord, in_range: ApplianceRecord) {
        let raw = vec![out_of_range.clone(), in_range.clone()];
        let validated = validate(&raw);

        assert_eq!(raw, vec![out_of_range, in_range]);
        assert_eq!(validated.len(), raw.len());
    }

    #[rstest]
    fn should_be_idempotent(out_of_range: ApplianceRecord, in_range: ApplianceRecord) {
        let nan_record = ApplianceRecord {
            power_watts: f64::NAN,
            ..in_range.clone()
        };
        let once = validate(&[out_of_range, in_range, nan_record]);
        let twice = validate(&once);

        assert_eq!(twice, once);
    }

    #[rstest]
    fn should_keep_apparent_power_at_least_real_power(out_of_range: ApplianceRecord, in_range: ApplianceRecord) {
        for record in validate(&[out_of_range, in_range]) {
            assert!(record.apparent_power_va() >= record.power_watts);
        }
    }

    #[rstest]
    fn should_report_clamped_records(out_of_range: ApplianceRecord, in_range: ApplianceRecord) {
        let raw = vec![in_range, out_of_range];
        let validated = validate(&raw);

        assert_eq!(clamped_indices(&raw, &validated), vec![1]);
    }

    #[rstest]
    fn should_validate_empty_batch() {
        assert!(validate(&[]).is_empty());
    }
}

mod compare_floats;
pub mod core;
pub mod errors;
pub mod input;
pub mod output;

#[macro_use]
extern crate is_close;

use crate::core::aggregator::{check_schedules, ApplianceLoad, LoadProfile, PeakLoads};
use crate::core::appliance::{ApplianceRecord, Priority};
use crate::core::tiers::{comparison_profiles, summarise_tiers, TierSummary};
use crate::core::units::watt_hours_to_kilowatt_hours;
use crate::core::validator::{clamped_indices, validate};
use crate::errors::{CalculationError, LoadProfileError, PostprocessingError};
use crate::input::{ingest_for_processing, Configuration, Input, InputForProcessing};
use crate::output::Output;
use bitflags::bitflags;
use csv::WriterBuilder;
use indexmap::IndexMap;
use serde::Serialize;
use std::io::{Read, Write};
use tracing::{debug, info, instrument, warn};

bitflags! {
    /// Options controlling what a run calculates and writes out.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ProjectFlags: u8 {
        /// Only clamp the catalogue and write it back out, skipping the load calculation.
        const VALIDATE_ONLY = 0b1;
        /// Also write the per-appliance energy and average power tables.
        const DETAILED_OUTPUT = 0b10;
    }
}

/// Run a calculation from a JSON input document.
#[instrument(skip_all)]
pub fn run_project(
    input: impl Read,
    output: impl Output,
    flags: &ProjectFlags,
    priority_filter: Option<&[Priority]>,
) -> Result<CalculationResults, LoadProfileError> {
    run_project_from_input(ingest_for_processing(input)?, output, flags, priority_filter)
}

/// Run a calculation from a CSV appliance catalogue.
#[instrument(skip_all)]
pub fn run_project_with_catalogue_csv(
    csv: impl Read,
    configuration: Configuration,
    output: impl Output,
    flags: &ProjectFlags,
    priority_filter: Option<&[Priority]>,
) -> Result<CalculationResults, LoadProfileError> {
    run_project_from_input(
        InputForProcessing::init_with_catalogue_csv(csv, configuration)?,
        output,
        flags,
        priority_filter,
    )
}

/// Run a calculation from input that has already been read, e.g. after replacing its
/// configuration.
#[instrument(skip_all)]
pub fn run_project_from_input(
    input: InputForProcessing,
    output: impl Output,
    flags: &ProjectFlags,
    priority_filter: Option<&[Priority]>,
) -> Result<CalculationResults, LoadProfileError> {
    calculate(input.finalize()?, output, flags, priority_filter)
}

fn calculate(
    input: Input,
    output: impl Output,
    flags: &ProjectFlags,
    priority_filter: Option<&[Priority]>,
) -> Result<CalculationResults, LoadProfileError> {
    let Input {
        configuration,
        appliances: raw,
    } = input;
    info!("Ingested {} appliance records", raw.len());
    if !configuration.intervals.covers_whole_day() {
        warn!(
            "{} intervals of {} h do not cover a whole day",
            configuration.intervals.count, configuration.intervals.interval_hours
        );
    }

    let appliances = validate(&raw);
    let clamped_appliances = clamped_indices(&raw, &appliances)
        .into_iter()
        .map(|idx| appliances[idx].name.clone())
        .collect::<Vec<_>>();
    if !clamped_appliances.is_empty() {
        warn!(
            "{} appliance records had values clamped into range: {}",
            clamped_appliances.len(),
            clamped_appliances.join(", ")
        );
    }

    check_schedules(&appliances, configuration.intervals.count)
        .map_err(|e| CalculationError::new(e.into()))?;

    let interval_labels = configuration.intervals.labels();

    if flags.contains(ProjectFlags::VALIDATE_ONLY) {
        write_appliances_file(&output, &interval_labels, &appliances, None)
            .map_err(postprocessing_error)?;
        return Ok(CalculationResults {
            appliances,
            clamped_appliances,
            load: None,
        });
    }

    let profile = LoadProfile::calculate(&appliances, &configuration.intervals)
        .map_err(|e| CalculationError::new(e.into()))?;

    let zero_energy_appliances = profile
        .zero_energy_appliances()
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();
    if !zero_energy_appliances.is_empty() {
        warn!(
            "Appliances with zero daily energy: {}",
            zero_energy_appliances.join(", ")
        );
    }

    let tier_summaries = summarise_tiers(&profile, &configuration.tiers);
    for summary in &tier_summaries {
        debug!(
            "Tier {}: {} Wh over {} appliances, peak {} W / {} VA, {}% of system peak",
            summary.key,
            summary.total_energy_wh,
            summary.record_count,
            summary.peak_real_w,
            summary.peak_apparent_va,
            summary.load_allocation_pct
        );
    }

    let load = LoadResults {
        total_energy_wh: profile.total_energy_wh(),
        peak_loads: profile.peak_loads(),
        total_load_profile: profile.total_load_profile(),
        energy_by_priority: profile.energy_by_priority(),
        comparison_profiles: comparison_profiles(&profile, &configuration.tiers),
        zero_energy_appliances,
        tier_summaries,
        profile,
    };
    info!(
        "Calculated {:.3} kWh per day with a peak load of {} W",
        watt_hours_to_kilowatt_hours(load.total_energy_wh),
        load.peak_loads.real_w
    );

    if !output.is_noop() {
        write_results(&output, flags, priority_filter, &appliances, &load)
            .map_err(postprocessing_error)?;
    }

    Ok(CalculationResults {
        appliances,
        clamped_appliances,
        load: Some(load),
    })
}

fn postprocessing_error(error: anyhow::Error) -> LoadProfileError {
    LoadProfileError::ErrorInPostprocessing(PostprocessingError::new(error))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalculationResults {
    /// The catalogue after clamping.
    pub appliances: Vec<ApplianceRecord>,
    /// Names of appliances that had at least one value clamped.
    pub clamped_appliances: Vec<String>,
    /// Absent when only validating.
    pub load: Option<LoadResults>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoadResults {
    pub profile: LoadProfile,
    pub total_energy_wh: f64,
    pub peak_loads: PeakLoads,
    pub total_load_profile: Vec<f64>,
    pub energy_by_priority: IndexMap<Priority, f64>,
    pub zero_energy_appliances: Vec<String>,
    pub tier_summaries: Vec<TierSummary>,
    pub comparison_profiles: IndexMap<String, Vec<f64>>,
}

fn write_results(
    output: &impl Output,
    flags: &ProjectFlags,
    priority_filter: Option<&[Priority]>,
    appliances: &[ApplianceRecord],
    load: &LoadResults,
) -> anyhow::Result<()> {
    let interval_labels = load.profile.interval_labels();

    write_appliances_file(output, interval_labels, appliances, Some(&load.profile))?;
    if flags.contains(ProjectFlags::DETAILED_OUTPUT) {
        write_energy_file(output, &load.profile)?;
        write_average_power_file(output, &load.profile, load)?;
    }
    write_summary_file(output, &load.tier_summaries)?;
    write_priority_energy_file(output, &load.energy_by_priority)?;
    write_comparison_file(output, interval_labels, &load.comparison_profiles)?;
    if let Some(priorities) = priority_filter {
        write_filtered_power_file(
            output,
            interval_labels,
            &load.profile.filtered_average_power(priorities),
        )?;
    }

    Ok(())
}

fn csv_writer<'a>(
    output: &'a impl Output,
    location_key: &'a str,
) -> anyhow::Result<csv::Writer<Box<dyn Write + 'a>>> {
    info!("Writing out {location_key}");
    let writer: Box<dyn Write + 'a> =
        Box::new(output.writer_for_location_key(location_key, "csv")?);
    Ok(WriterBuilder::new().from_writer(writer))
}

fn write_appliances_file(
    output: &impl Output,
    interval_labels: &[String],
    appliances: &[ApplianceRecord],
    profile: Option<&LoadProfile>,
) -> anyhow::Result<()> {
    let mut writer = csv_writer(output, "appliances")?;

    let mut headings: Vec<String> = [
        "Appliance",
        "Quantity",
        "Power (W)",
        "Duty Cycle (%)",
        "Power Factor",
        "Use Time (%)",
    ]
    .map(String::from)
    .into();
    headings.extend(interval_labels.iter().cloned());
    headings.extend(["Priority", "Room", "Apparent Power (VA)"].map(String::from));
    if profile.is_some() {
        headings.push("Total Daily Energy (Wh)".into());
    }
    writer.write_record(&headings)?;

    for (idx, record) in appliances.iter().enumerate() {
        let mut row = vec![
            record.name.clone(),
            record.quantity.to_string(),
            record.power_watts.to_string(),
            record.duty_cycle_pct.to_string(),
            record.power_factor.to_string(),
            record.use_time_pct.to_string(),
        ];
        row.extend(record.schedule.iter().map(|on| on.to_string()));
        row.push(record.priority.to_string());
        row.push(record.room.clone());
        row.push(record.apparent_power_va().to_string());
        if let Some(profile) = profile {
            row.push(profile.appliances()[idx].total_daily_energy_wh.to_string());
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

fn write_energy_file(output: &impl Output, profile: &LoadProfile) -> anyhow::Result<()> {
    let mut writer = csv_writer(output, "energy")?;

    let mut headings = vec!["Appliance".to_string()];
    headings.extend(profile.interval_labels().iter().cloned());
    headings.push("Total (Wh)".into());
    writer.write_record(&headings)?;

    for appliance in profile.appliances() {
        let mut row = vec![appliance.record.name.clone()];
        row.extend(appliance.energy_wh.iter().map(f64::to_string));
        row.push(appliance.total_daily_energy_wh.to_string());
        writer.write_record(&row)?;
    }

    let mut totals = vec!["Total".to_string()];
    totals.extend(profile.total_energy_profile().iter().map(f64::to_string));
    totals.push(profile.total_energy_wh().to_string());
    writer.write_record(&totals)?;

    writer.flush()?;
    Ok(())
}

fn write_average_power_file(
    output: &impl Output,
    profile: &LoadProfile,
    load: &LoadResults,
) -> anyhow::Result<()> {
    let mut writer = csv_writer(output, "average_power")?;

    let mut headings = vec!["Appliance".to_string()];
    headings.extend(profile.interval_labels().iter().cloned());
    writer.write_record(&headings)?;

    for appliance in profile.appliances() {
        let mut row = vec![appliance.record.name.clone()];
        row.extend(appliance.average_power_w.iter().map(f64::to_string));
        writer.write_record(&row)?;
    }

    let mut totals = vec!["Total Load (W)".to_string()];
    totals.extend(load.total_load_profile.iter().map(f64::to_string));
    writer.write_record(&totals)?;

    writer.flush()?;
    Ok(())
}

fn write_summary_file(output: &impl Output, tier_summaries: &[TierSummary]) -> anyhow::Result<()> {
    let mut writer = csv_writer(output, "summary")?;

    writer.write_record([
        "Tier",
        "Description",
        "Appliances",
        "Total Energy (Wh)",
        "Total Energy (kWh)",
        "Peak Real Power (W)",
        "Peak Real Power (kW)",
        "Peak Apparent Power (VA)",
        "Peak Apparent Power (kVA)",
        "Load Allocation (%)",
    ])?;

    for summary in tier_summaries {
        writer.write_record([
            summary.key.clone(),
            summary.label.clone(),
            summary.record_count.to_string(),
            summary.total_energy_wh.to_string(),
            summary.total_energy_kwh().to_string(),
            summary.peak_real_w.to_string(),
            summary.peak_real_kw().to_string(),
            summary.peak_apparent_va.to_string(),
            summary.peak_apparent_kva().to_string(),
            summary.load_allocation_pct.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn write_priority_energy_file(
    output: &impl Output,
    energy_by_priority: &IndexMap<Priority, f64>,
) -> anyhow::Result<()> {
    let mut writer = csv_writer(output, "priority_energy")?;

    writer.write_record(["Priority", "Total Energy (Wh)", "Total Energy (kWh)"])?;
    for (priority, energy_wh) in energy_by_priority {
        writer.write_record([
            priority.to_string(),
            energy_wh.to_string(),
            watt_hours_to_kilowatt_hours(*energy_wh).to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn write_comparison_file(
    output: &impl Output,
    interval_labels: &[String],
    comparison_profiles: &IndexMap<String, Vec<f64>>,
) -> anyhow::Result<()> {
    let mut writer = csv_writer(output, "comparison")?;

    let mut headings = vec!["Interval".to_string()];
    headings.extend(comparison_profiles.keys().map(|label| format!("{label} (W)")));
    writer.write_record(&headings)?;

    for (t_idx, interval_label) in interval_labels.iter().enumerate() {
        let mut row = vec![interval_label.clone()];
        row.extend(
            comparison_profiles
                .values()
                .map(|profile| profile[t_idx].to_string()),
        );
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

fn write_filtered_power_file(
    output: &impl Output,
    interval_labels: &[String],
    appliances: &[&ApplianceLoad],
) -> anyhow::Result<()> {
    let mut writer = csv_writer(output, "filtered_power")?;

    let mut headings = vec!["Appliance".to_string(), "Priority".to_string()];
    headings.extend(interval_labels.iter().cloned());
    writer.write_record(&headings)?;

    for appliance in appliances {
        let mut row = vec![
            appliance.record.name.clone(),
            appliance.record.priority.to_string(),
        ];
        row.extend(appliance.average_power_w.iter().map(f64::to_string));
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

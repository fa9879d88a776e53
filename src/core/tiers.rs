use crate::core::aggregator::{interval_sums, use_time_adjusted_peak_loads, LoadProfile, PeakLoads};
use crate::core::appliance::{ApplianceRecord, Priority};
use crate::core::units::{watt_hours_to_kilowatt_hours, watts_to_kilowatts, PERCENT};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which records a tier summarises.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum TierFilter {
    /// The whole catalogue. Peaks are taken as scheduled, without use time adjustment.
    All,
    /// Records with one of the listed priorities. Peaks are use time adjusted.
    Priorities { priorities: Vec<Priority> },
}

impl TierFilter {
    pub fn includes(&self, record: &ApplianceRecord) -> bool {
        match self {
            TierFilter::All => true,
            TierFilter::Priorities { priorities } => record.has_priority_in(priorities),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct TierConfig {
    pub key: String,
    pub label: String,
    pub filter: TierFilter,
    /// Name fragments (case-insensitive) left out of this tier's comparison profile only.
    #[serde(default)]
    pub profile_exclusions: Vec<String>,
    #[serde(default)]
    pub profile_label: Option<String>,
}

impl TierConfig {
    fn profile_label(&self) -> &str {
        self.profile_label.as_deref().unwrap_or(&self.label)
    }
}

/// The three tiers reported by default: everything, essential plus medium, essential only.
pub fn default_tiers() -> Vec<TierConfig> {
    vec![
        TierConfig {
            key: "all".into(),
            label: "All Appliances (Off-Grid)".into(),
            filter: TierFilter::All,
            profile_exclusions: vec![],
            profile_label: None,
        },
        TierConfig {
            key: "essential_medium".into(),
            label: "Essential + Medium Priority".into(),
            filter: TierFilter::Priorities {
                priorities: vec![Priority::Essential, Priority::Medium],
            },
            profile_exclusions: vec!["geyser".into(), "stove".into()],
            profile_label: Some("Essential + Medium (No Heating)".into()),
        },
        TierConfig {
            key: "essential".into(),
            label: "Essential Only".into(),
            filter: TierFilter::Priorities {
                priorities: vec![Priority::Essential],
            },
            profile_exclusions: vec![],
            profile_label: Some("Essentials Only".into()),
        },
    ]
}

/// Check that tier keys are unique and non-empty.
pub fn check_tiers(tiers: &[TierConfig]) -> Result<(), TierConfigError> {
    if let Some(tier) = tiers.iter().find(|tier| tier.key.trim().is_empty()) {
        return Err(TierConfigError::EmptyKey(tier.label.clone()));
    }
    if let Some(key) = tiers.iter().map(|tier| &tier.key).duplicates().next() {
        return Err(TierConfigError::DuplicateKey(key.clone()));
    }
    Ok(())
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum TierConfigError {
    #[error("Tier '{0}' has an empty key")]
    EmptyKey(String),
    #[error("Tier key '{0}' is used more than once")]
    DuplicateKey(String),
}

/// Energy and peak figures for one tier.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TierSummary {
    pub key: String,
    pub label: String,
    pub total_energy_wh: f64,
    pub peak_real_w: f64,
    pub peak_apparent_va: f64,
    /// Tier peak apparent power as a percentage of the whole-catalogue peak apparent power.
    pub load_allocation_pct: f64,
    pub record_count: usize,
}

impl TierSummary {
    pub fn total_energy_kwh(&self) -> f64 {
        watt_hours_to_kilowatt_hours(self.total_energy_wh)
    }

    pub fn peak_real_kw(&self) -> f64 {
        watts_to_kilowatts(self.peak_real_w)
    }

    pub fn peak_apparent_kva(&self) -> f64 {
        watts_to_kilowatts(self.peak_apparent_va)
    }
}

/// Share of the system peak, guarding against a zero system peak.
pub fn load_allocation_pct(tier_peak_apparent_va: f64, system_peak_apparent_va: f64) -> f64 {
    if system_peak_apparent_va > 0. {
        tier_peak_apparent_va / system_peak_apparent_va * PERCENT
    } else {
        0.
    }
}

/// Summarise every configured tier over one load profile.
///
/// Each tier is computed independently from the records its filter selects; an empty tier gives a
/// summary of zeros.
pub fn summarise_tiers(profile: &LoadProfile, tiers: &[TierConfig]) -> Vec<TierSummary> {
    let system_peaks = profile.peak_loads();

    tiers
        .iter()
        .map(|tier| summarise_tier(profile, tier, system_peaks))
        .collect()
}

fn summarise_tier(profile: &LoadProfile, tier: &TierConfig, system_peaks: PeakLoads) -> TierSummary {
    let members = profile
        .appliances()
        .iter()
        .filter(|appliance| tier.filter.includes(&appliance.record))
        .collect::<Vec<_>>();

    let total_energy_wh = members
        .iter()
        .map(|appliance| appliance.total_daily_energy_wh)
        .sum::<f64>();

    let peaks = match tier.filter {
        TierFilter::All => system_peaks,
        TierFilter::Priorities { .. } => use_time_adjusted_peak_loads(
            members.iter().map(|appliance| &appliance.record),
            profile.interval_count(),
        ),
    };

    TierSummary {
        key: tier.key.clone(),
        label: tier.label.clone(),
        total_energy_wh,
        peak_real_w: peaks.real_w,
        peak_apparent_va: peaks.apparent_va,
        load_allocation_pct: load_allocation_pct(peaks.apparent_va, system_peaks.apparent_va),
        record_count: members.len(),
    }
}

/// Per-interval power of each tier as scheduled, after dropping the tier's excluded names.
///
/// Keyed by the tier's profile label, in tier order.
pub fn comparison_profiles(profile: &LoadProfile, tiers: &[TierConfig]) -> IndexMap<String, Vec<f64>> {
    tiers
        .iter()
        .map(|tier| {
            let members = profile.records().filter(|record| {
                tier.filter.includes(record) && !record.name_contains_any(&tier.profile_exclusions)
            });
            (
                tier.profile_label().to_string(),
                interval_sums(members, profile.interval_count(), |record| {
                    record.total_power_watts()
                }),
            )
        })
        .collect()
}

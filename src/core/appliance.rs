use crate::compare_floats::max_of_2;
use crate::core::units::{round_to_decimal_places, MIN_POWER_FACTOR};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// How important it is to keep an appliance running when supply is constrained.
#[derive(
    Clone, Copy, Debug, Display, EnumIter, EnumString, Eq, Hash, IntoStaticStr, PartialEq,
)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[strum(ascii_case_insensitive)]
pub enum Priority {
    #[strum(serialize = "essential")]
    Essential,
    #[strum(serialize = "medium")]
    Medium,
    #[strum(to_string = "non-essential", serialize = "non_essential")]
    NonEssential,
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let name: &'static str = self.into();
        serializer.serialize_str(name)
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Priority::from_str(raw.trim()).map_err(|_| {
            serde::de::Error::custom(format!(
                "unknown priority '{raw}', expected one of essential, medium, non-essential"
            ))
        })
    }
}

#[cfg(feature = "schemars")]
impl schemars::JsonSchema for Priority {
    fn schema_name() -> String {
        "Priority".into()
    }

    fn json_schema(generator: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        <String as schemars::JsonSchema>::json_schema(generator)
    }
}

/// One row of the appliance catalogue.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct ApplianceRecord {
    #[serde(alias = "Appliance")]
    pub name: String,
    /// Number of units; fractional counts are rounded as the CSV catalogue reader does.
    #[serde(alias = "Quantity", deserialize_with = "deserialize_quantity")]
    #[cfg_attr(feature = "schemars", schemars(with = "f64"))]
    pub quantity: i64,
    #[serde(alias = "Power (W)")]
    pub power_watts: f64,
    #[serde(alias = "Duty Cycle (%)")]
    pub duty_cycle_pct: f64,
    #[serde(alias = "Power Factor")]
    pub power_factor: f64,
    #[serde(alias = "Use Time (%)", default = "default_use_time_pct")]
    pub use_time_pct: f64,
    /// Whether the appliance is scheduled on, one entry per configured interval.
    #[serde(alias = "Schedule")]
    pub schedule: Vec<bool>,
    #[serde(alias = "Priority")]
    pub priority: Priority,
    #[serde(alias = "Room", default)]
    pub room: String,
}

pub const DEFAULT_USE_TIME_PCT: f64 = 50.;

/// Round a fractional unit count to the nearest whole number of units.
pub(crate) fn quantity_from_f64(quantity: f64) -> Option<i64> {
    quantity.is_finite().then(|| quantity.round() as i64)
}

fn deserialize_quantity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Quantity {
        Whole(i64),
        Fractional(f64),
    }

    match Quantity::deserialize(deserializer)? {
        Quantity::Whole(quantity) => Ok(quantity),
        Quantity::Fractional(quantity) => quantity_from_f64(quantity).ok_or_else(|| {
            serde::de::Error::custom(format!("quantity {quantity} is not a finite number"))
        }),
    }
}

fn default_use_time_pct() -> f64 {
    DEFAULT_USE_TIME_PCT
}

impl ApplianceRecord {
    /// Apparent power per unit in VA, to one decimal place.
    ///
    /// A power factor at or below zero is read as the validator floor. The result never drops below
    /// the real power, which rounding alone could otherwise cause.
    pub fn apparent_power_va(&self) -> f64 {
        let power_factor = if self.power_factor > 0. {
            self.power_factor
        } else {
            MIN_POWER_FACTOR
        };
        max_of_2(
            round_to_decimal_places(self.power_watts / power_factor, 1),
            self.power_watts,
        )
    }

    /// Combined nameplate draw of all units.
    pub(crate) fn total_power_watts(&self) -> f64 {
        self.quantity as f64 * self.power_watts
    }

    pub(crate) fn total_apparent_power_va(&self) -> f64 {
        self.quantity as f64 * self.apparent_power_va()
    }

    pub(crate) fn is_on(&self, interval_idx: usize) -> f64 {
        if self.schedule[interval_idx] {
            1.
        } else {
            0.
        }
    }

    pub fn has_priority_in(&self, priorities: &[Priority]) -> bool {
        priorities.contains(&self.priority)
    }

    /// Case-insensitive substring match against the appliance name.
    pub fn name_contains_any(&self, patterns: &[String]) -> bool {
        let name = self.name.to_lowercase();
        patterns
            .iter()
            .any(|pattern| name.contains(&pattern.to_lowercase()))
    }
}

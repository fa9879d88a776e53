use crate::core::appliance::{quantity_from_f64, ApplianceRecord, Priority, DEFAULT_USE_TIME_PCT};
use crate::core::intervals::IntervalConfig;
use crate::core::tiers::{check_tiers, default_tiers, TierConfig};
use anyhow::{anyhow, bail, Context};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, Read};
use std::str::FromStr;

pub fn ingest_for_processing(json: impl Read) -> Result<InputForProcessing, anyhow::Error> {
    InputForProcessing::init_with_json(json)
}

/// A complete calculation request: how the day is sliced and summarised, and the catalogue itself.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Input {
    #[serde(default)]
    pub configuration: Configuration,
    pub appliances: Vec<ApplianceRecord>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    #[serde(default)]
    pub intervals: IntervalConfig,
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierConfig>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            intervals: Default::default(),
            tiers: default_tiers(),
        }
    }
}

impl Configuration {
    pub fn check(&self) -> anyhow::Result<()> {
        self.intervals.check()?;
        check_tiers(&self.tiers)?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct InputForProcessing {
    input: Input,
}

impl InputForProcessing {
    pub fn init_with_json(json: impl Read) -> Result<Self, anyhow::Error> {
        let reader = BufReader::new(json);

        let input: Input = serde_json::from_reader(reader)?;

        Ok(Self { input })
    }

    /// Start from a CSV catalogue, using the given configuration to find the interval columns.
    pub fn init_with_catalogue_csv(
        catalogue: impl Read,
        configuration: Configuration,
    ) -> Result<Self, anyhow::Error> {
        configuration.check()?;
        let appliances = read_catalogue_csv(catalogue, &configuration.intervals)?;

        Ok(Self {
            input: Input {
                configuration,
                appliances,
            },
        })
    }

    /// Check the configuration and hand over the input for calculation.
    pub fn finalize(self) -> anyhow::Result<Input> {
        self.input
            .configuration
            .check()
            .context("Invalid configuration")?;
        Ok(self.input)
    }

    pub fn configuration(&self) -> &Configuration {
        &self.input.configuration
    }

    /// Replace the configuration the input was read with; it is checked again on finalize.
    pub fn set_configuration(&mut self, configuration: Configuration) -> &Self {
        self.input.configuration = configuration;
        self
    }

    pub fn appliance_count(&self) -> usize {
        self.input.appliances.len()
    }
}

const APPLIANCE_COLUMN: &str = "Appliance";
const QUANTITY_COLUMN: &str = "Quantity";
const POWER_COLUMN: &str = "Power (W)";
const DUTY_CYCLE_COLUMN: &str = "Duty Cycle (%)";
const POWER_FACTOR_COLUMN: &str = "Power Factor";
const USE_TIME_COLUMN: &str = "Use Time (%)";
const PRIORITY_COLUMN: &str = "Priority";
const ROOM_COLUMN: &str = "Room";

/// Read an appliance catalogue laid out as a table with one column per interval.
///
/// Columns not needed for the calculation (ids, derived figures) are ignored.
pub fn read_catalogue_csv(
    catalogue: impl Read,
    intervals: &IntervalConfig,
) -> anyhow::Result<Vec<ApplianceRecord>> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(catalogue);
    let headers = reader.headers()?.clone();
    let columns = CatalogueColumns::locate(&headers, &intervals.labels())?;

    reader
        .records()
        .enumerate()
        .map(|(row_idx, row)| {
            let row = row?;
            columns
                .parse_row(&row)
                .with_context(|| format!("Could not read catalogue row {}", row_idx + 1))
        })
        .collect()
}

struct CatalogueColumns {
    name: usize,
    quantity: usize,
    power_watts: usize,
    duty_cycle_pct: usize,
    power_factor: usize,
    use_time_pct: Option<usize>,
    priority: usize,
    room: Option<usize>,
    schedule: Vec<(String, usize)>,
}

impl CatalogueColumns {
    fn locate(headers: &StringRecord, interval_labels: &[String]) -> anyhow::Result<Self> {
        let find = |title: &str| headers.iter().position(|header| header == title);
        let require = |title: &str| {
            find(title).ok_or_else(|| anyhow!("Catalogue is missing the '{title}' column"))
        };

        let schedule = interval_labels
            .iter()
            .map(|label| {
                interval_header_candidates(label)
                    .iter()
                    .find_map(|candidate| find(candidate.as_str()))
                    .map(|idx| (label.clone(), idx))
                    .ok_or_else(|| anyhow!("Catalogue is missing the '{label}' interval column"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            name: require(APPLIANCE_COLUMN)?,
            quantity: require(QUANTITY_COLUMN)?,
            power_watts: require(POWER_COLUMN)?,
            duty_cycle_pct: require(DUTY_CYCLE_COLUMN)?,
            power_factor: require(POWER_FACTOR_COLUMN)?,
            use_time_pct: find(USE_TIME_COLUMN),
            priority: require(PRIORITY_COLUMN)?,
            room: find(ROOM_COLUMN),
            schedule,
        })
    }

    fn parse_row(&self, row: &StringRecord) -> anyhow::Result<ApplianceRecord> {
        let field = |idx: usize| row.get(idx).unwrap_or_default();

        Ok(ApplianceRecord {
            name: field(self.name).to_string(),
            quantity: parse_quantity(field(self.quantity))?,
            power_watts: parse_number(field(self.power_watts), POWER_COLUMN)?,
            duty_cycle_pct: parse_number(field(self.duty_cycle_pct), DUTY_CYCLE_COLUMN)?,
            power_factor: parse_number(field(self.power_factor), POWER_FACTOR_COLUMN)?,
            use_time_pct: match self.use_time_pct {
                Some(idx) => parse_number(field(idx), USE_TIME_COLUMN)?,
                None => DEFAULT_USE_TIME_PCT,
            },
            schedule: self
                .schedule
                .iter()
                .map(|(label, idx)| parse_flag(field(*idx), label))
                .collect::<anyhow::Result<Vec<_>>>()?,
            priority: Priority::from_str(field(self.priority))
                .map_err(|_| anyhow!("Unknown priority '{}'", field(self.priority)))?,
            room: self.room.map(|idx| field(idx).to_string()).unwrap_or_default(),
        })
    }
}

/// Header titles that may hold the column for an interval label.
///
/// Older catalogues ended the last interval at `24:00` rather than `00:00`, and plain hyphens show
/// up in place of the en dash.
fn interval_header_candidates(label: &str) -> Vec<String> {
    let mut candidates = vec![label.to_string(), label.replace('–', "-")];
    if let Some(start) = label.strip_suffix("–00:00") {
        candidates.push(format!("{start}–24:00"));
        candidates.push(format!("{start}-24:00"));
    }
    candidates
}

fn parse_number(raw: &str, column: &str) -> anyhow::Result<f64> {
    let value = raw
        .parse::<f64>()
        .with_context(|| format!("'{raw}' is not a number in column '{column}'"))?;
    if !value.is_finite() {
        bail!("'{raw}' is not a finite number in column '{column}'");
    }
    Ok(value)
}

fn parse_quantity(raw: &str) -> anyhow::Result<i64> {
    match raw.parse::<i64>() {
        Ok(quantity) => Ok(quantity),
        Err(_) => quantity_from_f64(parse_number(raw, QUANTITY_COLUMN)?)
            .ok_or_else(|| anyhow!("'{raw}' is not a finite number in column '{QUANTITY_COLUMN}'")),
    }
}

fn parse_flag(raw: &str, column: &str) -> anyhow::Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(anyhow!(
            "'{raw}' in interval column '{column}' is not one of true/false/1/0/yes/no"
        )),
    }
}

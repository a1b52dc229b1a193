use crate::config::{ConditionSplit, TrialLogColumns};
use crate::error::{PsychError, Result};
use crate::processing::analysis::ConditionRun;
use crate::processing::staircase::TrialObservation;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

// -----------------------------------------------------------------------------
// READING TRIAL LOGS
// -----------------------------------------------------------------------------

/// A session log: `#key: value` parameter lines followed by a CSV table.
/// Lines starting with `##` are section banners and carry no parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialLog {
    pub params: BTreeMap<String, String>,
    pub observations: Vec<TrialObservation>,
    /// Per-row values of the split column, when the columns name a split.
    pub split_values: Vec<f64>,
}

impl TrialLog {
    pub fn read<P: AsRef<Path>>(path: P, columns: &TrialLogColumns) -> Result<Self> {
        let file = File::open(path)?;
        Self::parse(file, columns)
    }

    pub fn parse<R: Read>(reader: R, columns: &TrialLogColumns) -> Result<Self> {
        let mut params = BTreeMap::new();
        let mut table = String::new();
        let mut in_header = true;

        for line in BufReader::new(reader).lines() {
            let line = line?;
            if in_header {
                if line.starts_with("##") {
                    continue;
                }
                if let Some(entry) = line.strip_prefix('#') {
                    if let Some((key, value)) = entry.split_once(':') {
                        params.insert(key.trim().to_string(), value.trim().to_string());
                    }
                    continue;
                }
                in_header = false;
            }
            table.push_str(&line);
            table.push('\n');
        }

        let offset = match &columns.offset_param {
            Some(key) => param_f64(&params, key)?,
            None => 0.0,
        };

        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(table.as_bytes());
        let headers = csv_reader.headers()?.clone();
        let intensity_index = column_index(&headers, &columns.intensity)?;
        let correct_index = column_index(&headers, &columns.correct)?;
        let split_index = match &columns.split {
            Some(split) => Some(column_index(&headers, &split.column)?),
            None => None,
        };

        let mut observations = Vec::new();
        let mut split_values = Vec::new();
        for (row, record) in csv_reader.records().enumerate() {
            let record = record?;
            let intensity = record
                .get(intensity_index)
                .ok_or_else(|| missing_field(row, &columns.intensity))?;
            let correct = record
                .get(correct_index)
                .ok_or_else(|| missing_field(row, &columns.correct))?;

            let intensity = parse_number(intensity, row, &columns.intensity)?;
            observations.push(TrialObservation::new(
                intensity - offset,
                parse_correct(correct, row)?,
            ));

            if let (Some(index), Some(split)) = (split_index, &columns.split) {
                let value = record
                    .get(index)
                    .ok_or_else(|| missing_field(row, &split.column))?;
                split_values.push(parse_number(value, row, &split.column)?);
            }
        }

        Ok(Self {
            params,
            observations,
            split_values,
        })
    }

    /// Separate the trials into the two conditions of `split`, subtracting
    /// each condition's own offset parameter.
    pub fn conditions(&self, split: &ConditionSplit) -> Result<Vec<ConditionRun>> {
        if self.split_values.len() != self.observations.len() {
            return Err(PsychError::TrialLog(format!(
                "log was read without the split column '{}'",
                split.column
            )));
        }

        let mut runs = Vec::with_capacity(2);
        for (condition, below_cut) in [(&split.below, true), (&split.at_or_above, false)] {
            let offset = match &condition.offset_param {
                Some(key) => self.param_f64(key)?,
                None => 0.0,
            };
            let observations = self
                .observations
                .iter()
                .zip(&self.split_values)
                .filter(|(_, value)| (**value < split.cut) == below_cut)
                .map(|(observation, _)| {
                    TrialObservation::new(observation.intensity - offset, observation.correct)
                })
                .collect();
            runs.push(ConditionRun {
                label: condition.label.clone(),
                observations,
            });
        }
        Ok(runs)
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn param_f64(&self, key: &str) -> Result<f64> {
        param_f64(&self.params, key)
    }
}

fn param_f64(params: &BTreeMap<String, String>, key: &str) -> Result<f64> {
    let value = params
        .get(key)
        .ok_or_else(|| PsychError::TrialLog(format!("missing header parameter '{}'", key)))?;
    value.parse().map_err(|_| {
        PsychError::TrialLog(format!("header parameter '{}' is not numeric: '{}'", key, value))
    })
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|header| header == name)
        .ok_or_else(|| PsychError::TrialLog(format!("missing column '{}'", name)))
}

fn missing_field(row: usize, name: &str) -> PsychError {
    PsychError::TrialLog(format!("row {}: missing field '{}'", row + 1, name))
}

fn parse_number(value: &str, row: usize, name: &str) -> Result<f64> {
    value.parse().map_err(|_| {
        PsychError::TrialLog(format!("row {}: bad {} '{}'", row + 1, name, value))
    })
}

fn parse_correct(value: &str, row: usize) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => match other.parse::<f64>() {
            Ok(number) if number == 0.0 || number == 1.0 => Ok(number == 1.0),
            _ => Err(PsychError::TrialLog(format!(
                "row {}: bad correct value '{}'",
                row + 1,
                value
            ))),
        },
    }
}

// -----------------------------------------------------------------------------
// WRITING TRIAL LOGS
// -----------------------------------------------------------------------------

pub struct TrialLogWriter {
    writer: csv::Writer<File>,
}

impl TrialLogWriter {
    /// Create the log, write the parameter block and the column header row.
    pub fn create<P: AsRef<Path>>(path: P, params: &BTreeMap<String, String>) -> Result<Self> {
        let mut file = File::create(path)?;
        for (key, value) in params {
            writeln!(file, "#{}: {}", key, value)?;
        }

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(["trial", "intensity", "correct"])?;
        Ok(Self { writer })
    }

    pub fn write_trial(&mut self, trial: usize, observation: &TrialObservation) -> Result<()> {
        self.writer.write_record([
            trial.to_string(),
            observation.intensity.to_string(),
            (observation.correct as u8).to_string(),
        ])?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

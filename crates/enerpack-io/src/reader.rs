//! Row-level CSV readers for the resource categories.
//!
//! Readers are deliberately schema-light: element tables carry unknown,
//! variable columns, so every cell is sniffed into a JSON value (inline
//! JSON objects/arrays, booleans, numbers, strings) and typed later by the
//! facade constructors. Sequences are the exception: their columns are
//! always floats keyed by a shared `timeindex` column.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use enerpack_core::TimeIndex;
use enerpack_ts::{PeriodRow, TemporalWeights, TsaParameters, TsaPeriod};

/// A raw row of an elements resource, before foreign-key resolution.
#[derive(Debug, Clone)]
pub struct ElementRow {
    pub name: String,
    pub type_tag: String,
    /// Bus names feeding this element (input edges)
    pub predecessors: Vec<String>,
    /// Bus names fed by this element (output edges)
    pub successors: Vec<String>,
    /// Flat per-node parameters, `node_parameters` JSON merged in
    pub parameters: BTreeMap<String, Value>,
    /// Per-edge parameter bag from the `edge_parameters` column
    pub edge_parameters: BTreeMap<String, Value>,
}

/// A parsed sequences resource: shared time index plus named float columns.
#[derive(Debug, Clone)]
pub struct SequenceTable {
    pub name: String,
    pub timeindex: TimeIndex,
    pub columns: BTreeMap<String, Vec<f64>>,
}

/// A row of a hubs/buses resource.
#[derive(Debug, Clone)]
pub struct HubRow {
    pub name: String,
    pub type_tag: String,
    pub balanced: bool,
}

/// A raw row of a constraints resource.
#[derive(Debug, Clone)]
pub struct ConstraintRow {
    pub name: String,
    pub type_tag: String,
    pub parameters: BTreeMap<String, Value>,
}

/// Sniff one CSV cell into a JSON value. Inline JSON (object/array
/// prefixed) is parsed strictly; malformed inline JSON is a cast error.
pub(crate) fn parse_cell(raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .with_context(|| format!("malformed inline JSON '{}'", trimmed));
    }
    match trimmed {
        "true" | "True" => return Ok(Value::Bool(true)),
        "false" | "False" => return Ok(Value::Bool(false)),
        _ => {}
    }
    if let Ok(number) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(number) {
            return Ok(Value::Number(n));
        }
    }
    Ok(Value::String(trimmed.to_string()))
}

/// Accepted timestamp formats for timeindex columns.
pub(crate) fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let trimmed = raw.trim().trim_end_matches('Z');
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }
    Err(anyhow!("unparsable timestamp '{}'", raw))
}

/// Split a comma-separated node list, trimming entries.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening '{}'", path.display()))
}

/// Read an elements resource into raw rows.
pub fn read_elements(path: &Path) -> Result<Vec<ElementRow>> {
    let mut reader = open_reader(path)?;
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for (offset, record) in reader.records().enumerate() {
        let row_number = offset + 2; // header is row 1
        let record = record.with_context(|| format!("row {}", row_number))?;

        let mut name = None;
        let mut type_tag = None;
        let mut predecessors = Vec::new();
        let mut successors = Vec::new();
        let mut parameters = BTreeMap::new();
        let mut edge_parameters = BTreeMap::new();

        for (header, cell) in headers.iter().zip(record.iter()) {
            match header {
                "name" => name = Some(cell.trim().to_string()),
                "type" => type_tag = Some(cell.trim().to_string()),
                "predecessors" => predecessors = split_list(cell),
                "successors" => successors = split_list(cell),
                "node_parameters" => {
                    let value = parse_cell(cell)
                        .with_context(|| format!("row {}, column 'node_parameters'", row_number))?;
                    match value {
                        Value::Object(map) => parameters.extend(map),
                        Value::Null => {}
                        other => bail!(
                            "row {}: 'node_parameters' must be a JSON object, got {}",
                            row_number,
                            other
                        ),
                    }
                }
                "edge_parameters" => {
                    let value = parse_cell(cell)
                        .with_context(|| format!("row {}, column 'edge_parameters'", row_number))?;
                    match value {
                        Value::Object(map) => edge_parameters.extend(map),
                        Value::Null => {}
                        other => bail!(
                            "row {}: 'edge_parameters' must be a JSON object, got {}",
                            row_number,
                            other
                        ),
                    }
                }
                _ => {
                    let value = parse_cell(cell)
                        .with_context(|| format!("row {}, column '{}'", row_number, header))?;
                    if !value.is_null() {
                        parameters.insert(header.to_string(), value);
                    }
                }
            }
        }

        let name = name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| anyhow!("row {}: missing 'name'", row_number))?;
        let type_tag = type_tag
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("row {}: missing 'type'", row_number))?;

        rows.push(ElementRow {
            name,
            type_tag,
            predecessors,
            successors,
            parameters,
            edge_parameters,
        });
    }
    Ok(rows)
}

/// Read a sequences resource: a `timeindex` column plus float columns.
pub fn read_sequences(path: &Path, name: &str) -> Result<SequenceTable> {
    let mut reader = open_reader(path)?;
    let headers = reader.headers()?.clone();
    let timeindex_col = headers
        .iter()
        .position(|h| h == "timeindex")
        .ok_or_else(|| anyhow!("sequences resource has no 'timeindex' column"))?;

    let mut steps = Vec::new();
    let mut columns: BTreeMap<String, Vec<f64>> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != timeindex_col)
        .map(|(_, h)| (h.to_string(), Vec::new()))
        .collect();

    for (offset, record) in reader.records().enumerate() {
        let row_number = offset + 2;
        let record = record.with_context(|| format!("row {}", row_number))?;
        for (i, cell) in record.iter().enumerate() {
            if i == timeindex_col {
                let ts = parse_timestamp(cell)
                    .with_context(|| format!("row {}, column 'timeindex'", row_number))?;
                steps.push(ts);
            } else if let Some(header) = headers.get(i) {
                let value = cell.trim().parse::<f64>().with_context(|| {
                    format!("row {}, column '{}': non-numeric value '{}'", row_number, header, cell)
                })?;
                if let Some(column) = columns.get_mut(header) {
                    column.push(value);
                }
            }
        }
    }

    let timeindex = TimeIndex::new(steps)
        .map_err(|e| anyhow!("invalid timeindex in sequences resource: {}", e))?;
    Ok(SequenceTable {
        name: name.to_string(),
        timeindex,
        columns,
    })
}

/// Read a periods resource (`timeindex`, `timeincrement`, `periods`).
pub fn read_periods(path: &Path) -> Result<Vec<PeriodRow>> {
    let mut reader = open_reader(path)?;
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for (offset, record) in reader.records().enumerate() {
        let row_number = offset + 2;
        let record = record.with_context(|| format!("row {}", row_number))?;
        let mut timeindex = None;
        let mut timeincrement = 1.0;
        let mut period = None;

        for (header, cell) in headers.iter().zip(record.iter()) {
            match header {
                "timeindex" => {
                    timeindex = Some(parse_timestamp(cell).with_context(|| {
                        format!("row {}, column 'timeindex'", row_number)
                    })?)
                }
                "timeincrement" => {
                    timeincrement = cell.trim().parse::<f64>().with_context(|| {
                        format!("row {}: non-numeric timeincrement '{}'", row_number, cell)
                    })?
                }
                "periods" => {
                    period = Some(cell.trim().parse::<usize>().with_context(|| {
                        format!("row {}: non-integer period '{}'", row_number, cell)
                    })?)
                }
                _ => {}
            }
        }

        rows.push(PeriodRow {
            timeindex: timeindex
                .ok_or_else(|| anyhow!("row {}: missing 'timeindex'", row_number))?,
            timeincrement,
            period: period.ok_or_else(|| anyhow!("row {}: missing 'periods'", row_number))?,
        });
    }
    Ok(rows)
}

/// Read a hubs/buses resource.
pub fn read_hubs(path: &Path) -> Result<Vec<HubRow>> {
    let mut reader = open_reader(path)?;
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for (offset, record) in reader.records().enumerate() {
        let row_number = offset + 2;
        let record = record.with_context(|| format!("row {}", row_number))?;
        let mut name = None;
        let mut type_tag = "bus".to_string();
        let mut balanced = true;

        for (header, cell) in headers.iter().zip(record.iter()) {
            match header {
                "name" => name = Some(cell.trim().to_string()),
                "type" => {
                    if !cell.trim().is_empty() {
                        type_tag = cell.trim().to_string();
                    }
                }
                "balanced" => match parse_cell(cell)? {
                    Value::Bool(b) => balanced = b,
                    Value::Null => {}
                    other => bail!(
                        "row {}: 'balanced' must be a boolean, got {}",
                        row_number,
                        other
                    ),
                },
                _ => {}
            }
        }

        rows.push(HubRow {
            name: name
                .filter(|n| !n.is_empty())
                .ok_or_else(|| anyhow!("row {}: missing 'name'", row_number))?,
            type_tag,
            balanced,
        });
    }
    Ok(rows)
}

/// Read a constraints resource into raw rows.
pub fn read_constraints(path: &Path) -> Result<Vec<ConstraintRow>> {
    let mut reader = open_reader(path)?;
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for (offset, record) in reader.records().enumerate() {
        let row_number = offset + 2;
        let record = record.with_context(|| format!("row {}", row_number))?;
        let mut name = None;
        let mut type_tag = None;
        let mut parameters = BTreeMap::new();

        for (header, cell) in headers.iter().zip(record.iter()) {
            match header {
                "name" => name = Some(cell.trim().to_string()),
                "type" => type_tag = Some(cell.trim().to_string()),
                _ => {
                    let value = parse_cell(cell)
                        .with_context(|| format!("row {}, column '{}'", row_number, header))?;
                    if !value.is_null() {
                        parameters.insert(header.to_string(), value);
                    }
                }
            }
        }

        rows.push(ConstraintRow {
            name: name
                .filter(|n| !n.is_empty())
                .ok_or_else(|| anyhow!("row {}: missing 'name'", row_number))?,
            type_tag: type_tag
                .filter(|t| !t.is_empty())
                .ok_or_else(|| anyhow!("row {}: missing 'type'", row_number))?,
            parameters,
        });
    }
    Ok(rows)
}

/// Read a temporal weighting resource (`timeindex` plus a weight column).
pub fn read_temporal(path: &Path) -> Result<TemporalWeights> {
    let mut reader = open_reader(path)?;
    let headers = reader.headers()?.clone();
    let weight_col = headers
        .iter()
        .find(|h| *h == "weighting" || *h == "weight")
        .map(str::to_string)
        .ok_or_else(|| anyhow!("temporal resource has no 'weighting' column"))?;

    let mut steps = Vec::new();
    let mut weights = Vec::new();
    for (offset, record) in reader.records().enumerate() {
        let row_number = offset + 2;
        let record = record.with_context(|| format!("row {}", row_number))?;
        for (header, cell) in headers.iter().zip(record.iter()) {
            if header == "timeindex" {
                steps.push(parse_timestamp(cell).with_context(|| {
                    format!("row {}, column 'timeindex'", row_number)
                })?);
            } else if header == weight_col {
                weights.push(cell.trim().parse::<f64>().with_context(|| {
                    format!("row {}: non-numeric weight '{}'", row_number, cell)
                })?);
            }
        }
    }

    let index =
        TimeIndex::new(steps).map_err(|e| anyhow!("invalid temporal timeindex: {}", e))?;
    TemporalWeights::new(index, weights).map_err(|e| anyhow!("{}", e))
}

/// Read a tsa_parameters resource keyed by period.
pub fn read_tsa_parameters(path: &Path) -> Result<TsaParameters> {
    let mut reader = open_reader(path)?;
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for (offset, record) in reader.records().enumerate() {
        let row_number = offset + 2;
        let record = record.with_context(|| format!("row {}", row_number))?;
        let mut period = None;
        let mut typical_periods = None;
        let mut hours_per_period = None;
        let mut segmentation = false;

        for (header, cell) in headers.iter().zip(record.iter()) {
            let cell = cell.trim();
            match header {
                "period" => period = Some(cell.parse::<usize>().with_context(|| {
                    format!("row {}: non-integer period '{}'", row_number, cell)
                })?),
                "typical_periods" => {
                    typical_periods = Some(cell.parse::<usize>().with_context(|| {
                        format!("row {}: non-integer typical_periods '{}'", row_number, cell)
                    })?)
                }
                "hours_per_period" => {
                    hours_per_period = Some(cell.parse::<f64>().with_context(|| {
                        format!("row {}: non-numeric hours_per_period '{}'", row_number, cell)
                    })?)
                }
                "segmentation" => {
                    segmentation = matches!(parse_cell(cell)?, Value::Bool(true));
                }
                _ => {}
            }
        }

        rows.push(TsaPeriod {
            period: period.ok_or_else(|| anyhow!("row {}: missing 'period'", row_number))?,
            typical_periods: typical_periods
                .ok_or_else(|| anyhow!("row {}: missing 'typical_periods'", row_number))?,
            hours_per_period: hours_per_period
                .ok_or_else(|| anyhow!("row {}: missing 'hours_per_period'", row_number))?,
            segmentation,
        });
    }
    Ok(TsaParameters::new(rows))
}

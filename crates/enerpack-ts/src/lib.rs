//! Time index assembly and multi-period value expansion.
//!
//! A deserialized system gets exactly one time index, picked from four
//! possible sources in priority order: an explicit temporal weighting
//! resource, a periods resource, the shared index of the sequence
//! resources, or a one-step default anchored at today. The selection
//! itself happens in `enerpack-io`, which holds the parsed resources; this
//! crate provides the pieces: reconciliation across sequences, period
//! grouping, weighted indices, and the multi-period expansion rules for
//! list-valued attributes.

use chrono::NaiveTime;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use enerpack_core::{EnerpackError, EnerpackResult, Periods, TimeIndex};

/// Attributes whose per-period lists stay literal (one value per period).
static PERIODIC_ATTRIBUTES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "capacity",
        "capacity_cost",
        "capacity_potential",
        "storage_capacity",
    ])
});

/// Attributes expanded to one value per calendar year, held constant until
/// the next period boundary.
static YEARLY_ATTRIBUTES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["fixed_costs", "marginal_cost"]));

/// All sequence resources of a single-period package must agree on one
/// index. Returns `None` when no sequences exist.
pub fn reconcile_sequence_indices(
    indices: &[(String, TimeIndex)],
) -> EnerpackResult<Option<TimeIndex>> {
    let mut it = indices.iter();
    let (first_name, first) = match it.next() {
        Some(entry) => entry,
        None => return Ok(None),
    };
    for (name, index) in it {
        if index != first {
            return Err(EnerpackError::Validation(format!(
                "timeindices in resources differ: '{}' and '{}' disagree",
                first_name, name
            )));
        }
    }
    Ok(Some(first.clone()))
}

/// One-step fallback index anchored at today midnight, for packages with
/// no sequence data at all.
pub fn default_timeindex() -> TimeIndex {
    let today = chrono::Local::now().date_naive();
    TimeIndex::single(today.and_time(NaiveTime::MIN))
}

/// One row of a periods resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRow {
    pub timeindex: chrono::NaiveDateTime,
    pub timeincrement: f64,
    pub period: usize,
}

/// Group period rows into per-period indices plus the concatenated horizon
/// index. Rows must be grouped by non-decreasing period number.
pub fn periods_from_rows(rows: &[PeriodRow]) -> EnerpackResult<(TimeIndex, Periods)> {
    if rows.is_empty() {
        return Err(EnerpackError::Validation(
            "periods resource contains no rows".into(),
        ));
    }

    let mut indices: Vec<TimeIndex> = Vec::new();
    let mut years: Vec<i32> = Vec::new();
    let mut timeincrement: Vec<f64> = Vec::with_capacity(rows.len());
    let mut current: Vec<chrono::NaiveDateTime> = Vec::new();
    let mut current_period = rows[0].period;

    for row in rows {
        if row.period < current_period {
            return Err(EnerpackError::Validation(format!(
                "periods resource is not grouped: period {} follows period {}",
                row.period, current_period
            )));
        }
        if row.period > current_period {
            push_period(&mut indices, &mut years, std::mem::take(&mut current))?;
            current_period = row.period;
        }
        current.push(row.timeindex);
        timeincrement.push(row.timeincrement);
    }
    push_period(&mut indices, &mut years, current)?;

    let periods = Periods::new(indices, timeincrement, years)?;
    let full = periods.full_index()?;
    Ok((full, periods))
}

fn push_period(
    indices: &mut Vec<TimeIndex>,
    years: &mut Vec<i32>,
    steps: Vec<chrono::NaiveDateTime>,
) -> EnerpackResult<()> {
    use chrono::Datelike;
    let index = TimeIndex::new(steps)?;
    let year = index
        .first()
        .map(|ts| ts.year())
        .ok_or_else(|| EnerpackError::Validation("empty period in periods resource".into()))?;
    indices.push(index);
    years.push(year);
    Ok(())
}

/// A reduced, weighted time index for temporally aggregated (clustered)
/// models: each step stands in for `weight` original steps.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalWeights {
    index: TimeIndex,
    weights: Vec<f64>,
}

impl TemporalWeights {
    pub fn new(index: TimeIndex, weights: Vec<f64>) -> EnerpackResult<Self> {
        if index.len() != weights.len() {
            return Err(EnerpackError::Validation(format!(
                "temporal resource has {} steps but {} weights",
                index.len(),
                weights.len()
            )));
        }
        Ok(Self { index, weights })
    }

    pub fn index(&self) -> &TimeIndex {
        &self.index
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Number of original steps represented by the reduced index.
    pub fn represented_steps(&self) -> f64 {
        self.weights.iter().sum()
    }
}

/// Per-period time-series-aggregation metadata (tsa_parameters resource).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TsaPeriod {
    pub period: usize,
    /// Number of typical periods the original data was clustered into
    pub typical_periods: usize,
    /// Length of one typical period in hours
    pub hours_per_period: f64,
    /// Whether intra-period segmentation was applied
    pub segmentation: bool,
}

/// Aggregation metadata keyed by period, paired with a periods resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TsaParameters {
    rows: Vec<TsaPeriod>,
}

impl TsaParameters {
    pub fn new(mut rows: Vec<TsaPeriod>) -> Self {
        rows.sort_by_key(|row| row.period);
        Self { rows }
    }

    pub fn rows(&self) -> &[TsaPeriod] {
        &self.rows
    }

    pub fn for_period(&self, period: usize) -> Option<&TsaPeriod> {
        self.rows.iter().find(|row| row.period == period)
    }
}

/// How a list-valued attribute is unpacked in a multi-period model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionRule {
    /// One literal value per period
    Periodic,
    /// One value per calendar year, constant until the next period boundary
    Yearly,
    /// Broadcast across each period's full step count
    Timeseries,
}

/// Classification is a fixed name list, not a principled rule; it mirrors
/// the observed parameter semantics and must not be generalized silently.
pub fn classify(attribute: &str) -> ExpansionRule {
    if PERIODIC_ATTRIBUTES.contains(attribute) {
        ExpansionRule::Periodic
    } else if YEARLY_ATTRIBUTES.contains(attribute) {
        ExpansionRule::Yearly
    } else {
        ExpansionRule::Timeseries
    }
}

/// A multi-period attribute after unpacking.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedValue {
    pub rule: ExpansionRule,
    pub values: Vec<f64>,
}

impl ExpandedValue {
    /// Yearly and timeseries expansion apply a heuristic not every
    /// parameter supports; callers surface a warning for those.
    pub fn is_heuristic(&self) -> bool {
        self.rule != ExpansionRule::Periodic
    }
}

/// Unpack a per-period value list according to the attribute's rule.
///
/// The list length must equal the period count.
pub fn expand_periodic_value(
    attribute: &str,
    values: &[f64],
    periods: &Periods,
) -> EnerpackResult<ExpandedValue> {
    if values.len() != periods.count() {
        return Err(EnerpackError::Validation(format!(
            "attribute '{}' supplies {} periodic values for {} periods",
            attribute,
            values.len(),
            periods.count()
        )));
    }

    let rule = classify(attribute);
    let values = match rule {
        ExpansionRule::Periodic => values.to_vec(),
        ExpansionRule::Yearly => {
            let spans = periods.year_spans();
            let mut out = Vec::with_capacity(spans.iter().sum());
            for (value, span) in values.iter().zip(spans) {
                out.extend(std::iter::repeat(*value).take(span));
            }
            out
        }
        ExpansionRule::Timeseries => {
            let steps = periods.steps_per_period();
            let mut out = Vec::with_capacity(periods.total_steps());
            for (value, count) in values.iter().zip(steps) {
                out.extend(std::iter::repeat(*value).take(count));
            }
            out
        }
    };
    Ok(ExpandedValue { rule, values })
}

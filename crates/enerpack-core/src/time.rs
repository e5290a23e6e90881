//! Time index and period data structures.
//!
//! A [`TimeIndex`] is the ordered sequence of timestamps every sequence
//! resource and every flow profile is keyed by. [`Periods`] extends it for
//! multi-period investment models: one sub-index per period plus per-step
//! time increments and the calendar years spanned by each period.
//!
//! The assembly logic that reconciles time indices from different resources
//! lives in the `enerpack-ts` crate; this module only holds the data types
//! and their ordering/uniqueness invariants.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{EnerpackError, EnerpackResult};

/// An ordered, duplicate-free sequence of timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeIndex {
    steps: Vec<NaiveDateTime>,
}

impl TimeIndex {
    /// Build a time index, enforcing strict ascending order.
    pub fn new(steps: Vec<NaiveDateTime>) -> EnerpackResult<Self> {
        for pair in steps.windows(2) {
            if pair[1] <= pair[0] {
                return Err(EnerpackError::Validation(format!(
                    "time index must be strictly increasing ({} followed by {})",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(Self { steps })
    }

    /// A single-step index anchored at the given timestamp.
    pub fn single(step: NaiveDateTime) -> Self {
        Self { steps: vec![step] }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[NaiveDateTime] {
        &self.steps
    }

    pub fn first(&self) -> Option<NaiveDateTime> {
        self.steps.first().copied()
    }

    pub fn last(&self) -> Option<NaiveDateTime> {
        self.steps.last().copied()
    }

    /// Hours between consecutive steps, one value per step.
    ///
    /// The final step reuses the previous increment (a single-step index
    /// defaults to one hour).
    pub fn increments_hours(&self) -> Vec<f64> {
        if self.steps.len() < 2 {
            return vec![1.0; self.steps.len()];
        }
        let mut out = Vec::with_capacity(self.steps.len());
        for pair in self.steps.windows(2) {
            let secs = (pair[1] - pair[0]).num_seconds() as f64;
            out.push(secs / 3600.0);
        }
        // Last step has no successor
        let tail = *out.last().unwrap_or(&1.0);
        out.push(tail);
        out
    }

    /// Concatenate another index after this one, revalidating ordering.
    pub fn concat(&self, other: &TimeIndex) -> EnerpackResult<TimeIndex> {
        let mut steps = self.steps.clone();
        steps.extend_from_slice(&other.steps);
        TimeIndex::new(steps)
    }
}

/// Per-period time data for multi-period investment models.
///
/// `timeincrement` is concatenated across all periods (one entry per step of
/// the full horizon). `years` holds the calendar year each period starts in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Periods {
    indices: Vec<TimeIndex>,
    timeincrement: Vec<f64>,
    years: Vec<i32>,
}

impl Periods {
    pub fn new(
        indices: Vec<TimeIndex>,
        timeincrement: Vec<f64>,
        years: Vec<i32>,
    ) -> EnerpackResult<Self> {
        if indices.len() != years.len() {
            return Err(EnerpackError::Validation(format!(
                "period count mismatch: {} indices vs {} years",
                indices.len(),
                years.len()
            )));
        }
        let total: usize = indices.iter().map(|ix| ix.len()).sum();
        if timeincrement.len() != total {
            return Err(EnerpackError::Validation(format!(
                "timeincrement length {} does not cover {} steps",
                timeincrement.len(),
                total
            )));
        }
        Ok(Self {
            indices,
            timeincrement,
            years,
        })
    }

    pub fn count(&self) -> usize {
        self.indices.len()
    }

    pub fn indices(&self) -> &[TimeIndex] {
        &self.indices
    }

    pub fn timeincrement(&self) -> &[f64] {
        &self.timeincrement
    }

    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn total_steps(&self) -> usize {
        self.indices.iter().map(|ix| ix.len()).sum()
    }

    /// Number of steps in each period.
    pub fn steps_per_period(&self) -> Vec<usize> {
        self.indices.iter().map(|ix| ix.len()).collect()
    }

    /// Calendar years covered by each period: the gap to the next period's
    /// start year, with the final period counting as one year.
    pub fn year_spans(&self) -> Vec<usize> {
        let mut spans = Vec::with_capacity(self.years.len());
        for (i, year) in self.years.iter().enumerate() {
            let span = match self.years.get(i + 1) {
                Some(next) => (next - year).max(1) as usize,
                None => 1,
            };
            spans.push(span);
        }
        spans
    }

    /// The full horizon index: all period indices concatenated.
    pub fn full_index(&self) -> EnerpackResult<TimeIndex> {
        let mut it = self.indices.iter();
        let first = match it.next() {
            Some(ix) => ix.clone(),
            None => return Err(EnerpackError::Validation("no periods defined".into())),
        };
        it.try_fold(first, |acc, ix| acc.concat(ix))
    }
}

//! Cron expression evaluation
//!
//! This module provides parsing and next-occurrence search for 5-field
//! cron expressions (minute, hour, day-of-month, month, day-of-week).
//!
//! Field syntax per position: `*`, single values, ranges `a-b`, steps
//! `*/n` and `a-b/n`, and comma lists. Day-of-week treats 0 and 7 as
//! Sunday.
//!
//! Day-of-month and day-of-week are combined with AND: a candidate
//! instant must satisfy both fields. This differs from the traditional
//! cron OR and is relied upon by the dispatch layer.

use chrono::{DateTime, Datelike, Duration, DurationRound, Timelike, Utc};
use std::collections::BTreeSet;

mod error;

pub use error::{CronError, CronResult};

/// Search horizon for the next occurrence: one year of minutes
const SEARCH_HORIZON_MINUTES: i64 = 366 * 24 * 60;

// ============================================================================
// Field Set
// ============================================================================

/// Set of values accepted by one cron field
#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldSet {
    /// Wildcard `*`: any value matches
    Any,
    /// Explicit allowed values
    Values(BTreeSet<u32>),
}

impl FieldSet {
    fn contains(&self, value: u32) -> bool {
        match self {
            FieldSet::Any => true,
            FieldSet::Values(values) => values.contains(&value),
        }
    }
}

/// Positional metadata for parsing one field
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
}

const MINUTE: FieldSpec = FieldSpec { name: "minute", min: 0, max: 59 };
const HOUR: FieldSpec = FieldSpec { name: "hour", min: 0, max: 23 };
const DAY_OF_MONTH: FieldSpec = FieldSpec { name: "day-of-month", min: 1, max: 31 };
const MONTH: FieldSpec = FieldSpec { name: "month", min: 1, max: 12 };
const DAY_OF_WEEK: FieldSpec = FieldSpec { name: "day-of-week", min: 0, max: 7 };

impl FieldSpec {
    /// Parse one whole field (possibly a comma list)
    fn parse(&self, field: &str) -> CronResult<FieldSet> {
        if field == "*" {
            return Ok(FieldSet::Any);
        }

        let mut values = BTreeSet::new();
        for part in field.split(',') {
            self.parse_part(part, &mut values)?;
        }

        if values.is_empty() {
            return Err(CronError::invalid_field(self.name, field, "empty value list"));
        }

        Ok(FieldSet::Values(values))
    }

    /// Parse a single list element: `*`, `a`, `a-b`, `*/n`, `a-b/n`
    fn parse_part(&self, part: &str, values: &mut BTreeSet<u32>) -> CronResult<()> {
        let (base, step) = match part.split_once('/') {
            Some((base, step_str)) => {
                let step: u32 = step_str.parse().map_err(|_| {
                    CronError::invalid_field(self.name, part, "step is not a number")
                })?;
                if step == 0 {
                    return Err(CronError::invalid_field(self.name, part, "step must be positive"));
                }
                (base, Some(step))
            }
            None => (part, None),
        };

        let (start, end) = if base == "*" {
            if step.is_none() {
                return Err(CronError::invalid_field(self.name, part, "bare '*' in list"));
            }
            (self.min, self.max)
        } else if let Some((a, b)) = base.split_once('-') {
            let start = self.parse_value(a, part)?;
            let end = self.parse_value(b, part)?;
            if start > end {
                return Err(CronError::invalid_field(self.name, part, "reversed range"));
            }
            (start, end)
        } else {
            let value = self.parse_value(base, part)?;
            if step.is_some() {
                // Steps only apply to `*` or an explicit range
                return Err(CronError::invalid_field(self.name, part, "step on single value"));
            }
            (value, value)
        };

        let step = step.unwrap_or(1);
        let mut v = start;
        while v <= end {
            values.insert(self.normalize(v));
            v += step;
        }

        Ok(())
    }

    fn parse_value(&self, text: &str, part: &str) -> CronResult<u32> {
        let value: u32 = text
            .parse()
            .map_err(|_| CronError::invalid_field(self.name, part, "not a number"))?;
        if value < self.min || value > self.max {
            return Err(CronError::invalid_field(
                self.name,
                part,
                format!("value {} outside {}-{}", value, self.min, self.max),
            ));
        }
        Ok(value)
    }

    /// Day-of-week 7 is an alias for Sunday (0)
    fn normalize(&self, value: u32) -> u32 {
        if self.name == DAY_OF_WEEK.name && value == 7 {
            0
        } else {
            value
        }
    }
}

// ============================================================================
// Cron Expression
// ============================================================================

/// Parsed 5-field cron expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    minute: FieldSet,
    hour: FieldSet,
    day_of_month: FieldSet,
    month: FieldSet,
    day_of_week: FieldSet,
}

impl CronExpr {
    /// Parse an expression, validating the 5-field structure
    pub fn parse(expression: &str) -> CronResult<Self> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::WrongFieldCount { found: fields.len() });
        }

        Ok(Self {
            minute: MINUTE.parse(fields[0])?,
            hour: HOUR.parse(fields[1])?,
            day_of_month: DAY_OF_MONTH.parse(fields[2])?,
            month: MONTH.parse(fields[3])?,
            day_of_week: DAY_OF_WEEK.parse(fields[4])?,
        })
    }

    /// Check whether an instant satisfies all five fields
    pub fn matches(&self, t: DateTime<Utc>) -> bool {
        self.minute.contains(t.minute())
            && self.hour.contains(t.hour())
            && self.day_of_month.contains(t.day())
            && self.month.contains(t.month())
            && self.day_of_week.contains(t.weekday().num_days_from_sunday())
    }

    /// Find the earliest instant strictly after `reference` matching the
    /// expression, scanning at minute granularity within a one-year horizon
    pub fn next_after(&self, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
        // Truncate seconds, then start one minute later
        let floor = reference.duration_trunc(Duration::minutes(1)).ok()?;
        let mut candidate = floor + Duration::minutes(1);

        for _ in 0..SEARCH_HORIZON_MINUTES {
            if self.matches(candidate) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }

        None
    }
}

/// Parse an expression and compute the next occurrence in one step
///
/// Both a malformed expression and an empty search window surface as
/// errors: the caller must treat either as a stalled scheduler rather
/// than silently rescheduling.
pub fn next_run(expression: &str, reference: DateTime<Utc>) -> CronResult<DateTime<Utc>> {
    let expr = CronExpr::parse(expression)?;
    expr.next_after(reference)
        .ok_or_else(|| CronError::no_match(expression))
}

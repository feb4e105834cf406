//! Value Comparison and Matching
//!
//! Operator semantics per attribute type:
//!
//! - string: case-sensitive iff `caseExact`, otherwise case-insensitive
//! - integer/decimal: numeric
//! - boolean: an unassigned boolean compares as `false`
//! - dateTime: both sides parsed as ISO 8601 and compared as instants
//! - reference/binary: case-sensitive byte equality
//! - complex: never equal via `eq` (the compatibility matrix rejects it);
//!   matched via identity sub-attributes instead
//! - multi-valued scalar: `eq v` is satisfied when any element equals `v`
//!
//! Type mismatches between the property and the comparison value are not
//! errors; they simply do not match.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde_json::Value;

use crate::error::{Result, ScimError};

use super::{Property, PropertyData};

/// Parse an ISO 8601 dateTime, with optional fractional seconds and
/// timezone. A missing timezone is read as UTC.
pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc().fixed_offset())
        .map_err(|_| ScimError::invalid_value(format!("'{}' is not an ISO 8601 dateTime", s)))
}

fn fold_eq(a: &str, b: &str, case_exact: bool) -> bool {
    if case_exact {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

impl Property {
    /// Whether this property equals `value` under the `eq` semantics of
    /// its type.
    pub fn eq_value(&self, value: &Value) -> Result<bool> {
        match &self.data {
            PropertyData::Str(v) => Ok(match (v, value.as_str()) {
                (Some(mine), Some(theirs)) => fold_eq(mine, theirs, self.attr().case_exact),
                (None, _) => value.is_null(),
                _ => false,
            }),
            PropertyData::Integer(v) => Ok(match (v, value.as_i64()) {
                (Some(mine), Some(theirs)) => *mine == theirs,
                (None, _) => value.is_null(),
                _ => false,
            }),
            PropertyData::Decimal(v) => Ok(match (v, value.as_f64()) {
                (Some(mine), Some(theirs)) => *mine == theirs,
                (None, _) => value.is_null(),
                _ => false,
            }),
            // An unassigned boolean equals `false`.
            PropertyData::Boolean(v) => Ok(match value.as_bool() {
                Some(theirs) => v.unwrap_or(false) == theirs,
                None => v.is_none() && value.is_null(),
            }),
            PropertyData::DateTime(v) => match (v, value.as_str()) {
                (Some(mine), Some(theirs)) => {
                    let mine = parse_datetime(mine)?;
                    let theirs = parse_datetime(theirs)?;
                    Ok(mine == theirs)
                }
                (None, _) => Ok(value.is_null()),
                _ => Ok(false),
            },
            PropertyData::Reference(v) | PropertyData::Binary(v) => {
                Ok(match (v, value.as_str()) {
                    (Some(mine), Some(theirs)) => mine == theirs,
                    (None, _) => value.is_null(),
                    _ => false,
                })
            }
            // The compatibility matrix rejects eq on complex; reaching here
            // (e.g. through a multi-valued sweep) simply does not match.
            PropertyData::Complex(_) => Ok(false),
            PropertyData::Multi { elements, .. } => {
                for elem in elements {
                    if elem.eq_value(value)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Ordering of this property against `value`, for `gt`/`ge`/`lt`/`le`.
    ///
    /// Defined for string (lexicographic, case folding per `caseExact`),
    /// integer, decimal, and dateTime. `None` when the property is
    /// unassigned, the value type does not match, or the type is not
    /// orderable.
    pub fn cmp_value(&self, value: &Value) -> Result<Option<Ordering>> {
        match &self.data {
            PropertyData::Str(Some(mine)) => Ok(value.as_str().map(|theirs| {
                if self.attr().case_exact {
                    mine.as_str().cmp(theirs)
                } else {
                    mine.to_lowercase().cmp(&theirs.to_lowercase())
                }
            })),
            PropertyData::Integer(Some(mine)) => Ok(value.as_i64().map(|theirs| mine.cmp(&theirs))),
            PropertyData::Decimal(Some(mine)) => {
                Ok(value.as_f64().and_then(|theirs| mine.partial_cmp(&theirs)))
            }
            PropertyData::DateTime(Some(mine)) => match value.as_str() {
                Some(theirs) => {
                    let mine = parse_datetime(mine)?;
                    let theirs = parse_datetime(theirs)?;
                    Ok(Some(mine.cmp(&theirs)))
                }
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    /// Substring operators `sw`/`ew`/`co` for string-shaped properties.
    pub fn string_op(&self, value: &Value, op: StringOp) -> bool {
        let mine = match &self.data {
            PropertyData::Str(Some(s)) | PropertyData::Reference(Some(s)) => s.as_str(),
            _ => return false,
        };
        let Some(theirs) = value.as_str() else {
            return false;
        };
        let (mine, theirs) = if self.attr().case_exact {
            (mine.to_string(), theirs.to_string())
        } else {
            (mine.to_lowercase(), theirs.to_lowercase())
        };
        match op {
            StringOp::StartsWith => mine.starts_with(&theirs),
            StringOp::EndsWith => mine.ends_with(&theirs),
            StringOp::Contains => mine.contains(&theirs),
        }
    }

    /// Structural matching, used for deduplication and element targeting.
    ///
    /// Scalars match by equality (both-unassigned matches); complex
    /// properties match when all identity sub-properties match;
    /// multi-valued properties match when they have the same length and
    /// elements match pairwise, falling back to an order-insensitive set
    /// match when the positional pass fails.
    pub fn matches(&self, other: &Property) -> bool {
        if !self.attr().same_as(other.attr()) {
            return false;
        }
        match (&self.data, &other.data) {
            (PropertyData::Complex(_), PropertyData::Complex(_)) => self
                .attr()
                .identity_subs()
                .iter()
                .all(|sub| match (self.sub(&sub.name), other.sub(&sub.name)) {
                    (Some(a), Some(b)) => a.matches(b),
                    _ => false,
                }),
            (
                PropertyData::Multi { elements: a, .. },
                PropertyData::Multi { elements: b, .. },
            ) => {
                if a.len() != b.len() {
                    return false;
                }
                if a.iter().zip(b).all(|(x, y)| x.matches(y)) {
                    return true;
                }
                // Positional pass failed; O(n²) set match.
                let mut used = vec![false; b.len()];
                for x in a {
                    let Some(slot) = b
                        .iter()
                        .enumerate()
                        .position(|(j, y)| !used[j] && x.matches(y))
                    else {
                        return false;
                    };
                    used[slot] = true;
                }
                true
            }
            _ => {
                if self.is_unassigned() && other.is_unassigned() {
                    return true;
                }
                if self.is_unassigned() != other.is_unassigned() {
                    return false;
                }
                self.eq_value(&other.raw()).unwrap_or(false)
            }
        }
    }
}

/// The three substring operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOp {
    StartsWith,
    EndsWith,
    Contains,
}

// =============================================================================
// Tests
// =============================================================================

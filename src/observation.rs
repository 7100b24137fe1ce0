// 📝 Observation - the only mutable record in the store
//
// Identity and content (id, text, module, criticality, created_at) never change.
// Lifecycle fields (status, closed_at, resurfaced_at) are a projection of the
// latest transitions; full history lives in the observation_events table.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::catalog::Catalog;
use crate::error::{ObservationError, Result};

// ============================================================================
// CRITICALITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Criticality {
    Vital,
    Essential,
    Desirable,
}

impl Criticality {
    pub const ALL: [Criticality; 3] = [
        Criticality::Vital,
        Criticality::Essential,
        Criticality::Desirable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Criticality::Vital => "Vital",
            Criticality::Essential => "Essential",
            Criticality::Desirable => "Desirable",
        }
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Criticality {
    type Err = ObservationError;

    fn from_str(s: &str) -> Result<Self> {
        Criticality::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ObservationError::validation(format!("Unknown criticality: {}", s)))
    }
}

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Open,
    Resurfaced,
    Closed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Open => "OPEN",
            Status::Resurfaced => "RESURFACED",
            Status::Closed => "CLOSED",
        }
    }

    /// OPEN and RESURFACED both mean "still needs attention"
    pub fn is_open_like(&self) -> bool {
        !matches!(self, Status::Closed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ObservationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Ok(Status::Open),
            "RESURFACED" => Ok(Status::Resurfaced),
            "CLOSED" => Ok(Status::Closed),
            other => Err(ObservationError::validation(format!("Unknown status: {}", other))),
        }
    }
}

// ============================================================================
// OBSERVATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: i64,
    pub text: String,
    pub module_id: i64,
    pub criticality: Criticality,
    pub status: Status,
    pub created_at: NaiveDateTime,
    pub closed_at: Option<NaiveDateTime>,
    pub resurfaced_at: Option<NaiveDateTime>,
}

impl Observation {
    pub fn is_vital(&self) -> bool {
        self.criticality == Criticality::Vital
    }

    /// The latest resurfacing, if it actually reopened a closed observation.
    ///
    /// Resurfacing something that was never closed leaves it open, so it does
    /// not count as a reopening.
    pub fn reopened_at(&self) -> Option<NaiveDateTime> {
        self.resurfaced_at.filter(|_| self.closed_at.is_some())
    }

    /// Reconstruct whether this observation was open-like at `at`.
    ///
    /// Creation counts from `at` itself; a close or resurfacing stamped exactly
    /// at `at` has not happened yet, since the period buckets pick it up.
    /// Only the latest close and latest resurfacing are known, so the answer is
    /// the state implied by the most recent of those before `at` (or OPEN if
    /// neither had happened yet). Ties go to the current status. When the only
    /// known reopening lies at or after `at` and was closed again, the close it
    /// reopened is lost and the observation counts as closed.
    pub fn was_open_at(&self, at: NaiveDateTime) -> bool {
        if self.created_at > at {
            return false;
        }

        let closed = self.closed_at.filter(|t| *t < at);
        let resurfaced = self.reopened_at().filter(|t| *t < at);

        match (closed, resurfaced) {
            (None, _) => !matches!(
                (self.closed_at, self.reopened_at()),
                (Some(c), Some(r)) if at <= r && r < c
            ),
            (Some(_), None) => false,
            (Some(c), Some(r)) if r > c => true,
            (Some(c), Some(r)) if c > r => false,
            _ => self.status.is_open_like(),
        }
    }
}

// ============================================================================
// NEW OBSERVATION (creation request)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewObservation {
    pub text: String,
    pub module_id: i64,
    pub criticality: Criticality,
}

impl NewObservation {
    /// Build from loosely-typed request fields, rejecting missing values
    pub fn from_parts(
        text: Option<&str>,
        module_id: Option<i64>,
        criticality: Option<&str>,
    ) -> Result<Self> {
        let text = text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ObservationError::validation("Missing observation"))?;
        let module_id =
            module_id.ok_or_else(|| ObservationError::validation("Missing module_id"))?;
        let criticality = criticality
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ObservationError::validation("Missing criticality"))?
            .parse()?;

        Ok(NewObservation {
            text: text.to_string(),
            module_id,
            criticality,
        })
    }

    /// Check the module reference against the reference catalog
    pub fn validate(&self, catalog: &Catalog) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(ObservationError::validation("Missing observation"));
        }
        if catalog.module(self.module_id).is_none() {
            return Err(ObservationError::validation(format!(
                "Unknown module_id: {}",
                self.module_id
            )));
        }
        Ok(())
    }
}

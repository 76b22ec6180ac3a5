//! Result types of the computation pipelines.
//!
//! A pipeline either has enough input to run ([`Outcome::Ready`]) or it
//! doesn't ([`Outcome::Insufficient`]). A ready report may still have left
//! lines out; each omission is recorded as a [`Diagnostic`].

use std::sync::Arc;

use serde::Serialize;

use crate::{CityId, GradeLevelId, Placement, RuleId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "report", rename_all = "snake_case")]
pub enum Outcome<T> {
    Ready(Arc<T>),
    Insufficient(InsufficientInput),
}

impl<T> Outcome<T> {
    /// The report, if the pipeline ran.
    #[must_use]
    pub fn ready(&self) -> Option<&Arc<T>> {
        match self {
            Self::Ready(report) => Some(report),
            Self::Insufficient(_) => None,
        }
    }

    #[must_use]
    pub fn insufficient(&self) -> Option<&InsufficientInput> {
        match self {
            Self::Ready(_) => None,
            Self::Insufficient(reason) => Some(reason),
        }
    }
}

/// Required input that was missing or unusable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum InsufficientInput {
    #[error("no remuneration rates supplied")]
    NoRemunerations,
    #[error("no grade level supplied")]
    NoGradeLevel,
    #[error("catalog has no cities")]
    NoCities,
    #[error("catalog has no allowance rules")]
    NoAllowances,
    #[error("takeoff city missing")]
    MissingTakeoff,
    #[error("destination city missing")]
    MissingDestination,
    #[error("city {city_id} not in catalog")]
    UnknownCity { city_id: CityId },
    #[error("trip ends before it starts")]
    InvertedDates,
    #[error("trip dates out of range")]
    DatesOutOfRange,
    #[error("catalog has no journal type rules")]
    NoJournalRules,
    #[error("payment amounts exceed the decimal range")]
    AmountOverflow,
}

/// A line the pipeline left out, and why.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// No remuneration rate for the allowance at the grade level.
    MissingRemuneration {
        allowance_id: RuleId,
        grade_level_id: GradeLevelId,
        placement: Placement,
    },
    /// No accommodation or out-of-pocket rule applied to the trip.
    MissingAccommodationRule { city_id: CityId },
    /// A flight trip had no airport, so no shuttle or fare was selected.
    MissingAirport,
    /// No shuttle or fare rule matched the trip.
    MissingTransportRule { placement: Placement },
    /// Distance was unknown for a per-km allowance; its amount is zero.
    DistanceUnknown { allowance_id: RuleId },
    /// The line amount of an allowance exceeded the decimal range.
    AmountOverflow { allowance_id: RuleId },
    /// A requested journal rule id is not in the catalog.
    MissingJournalRule { rule_id: RuleId },
    /// A deduction rule followed one with a higher precedence.
    PrecedenceOutOfOrder { rule_id: RuleId, precedence: u32 },
}

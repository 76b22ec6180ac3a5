//! Allowance selection.
//!
//! Decides which allowance rules apply to a trip and over which dates. The
//! trip is bracketed by a travel day (the day before `start_date`) and a
//! return day (the day after `end_date`); transport legs are paid on those
//! days, accommodation and intracity allowances over the stay.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    AllowanceLabel, AllowanceRule, City, CityId, DateWindow, Diagnostic, GradeLevelId,
    InsufficientInput, RemunerationRate, Route, RuleCatalog, TravelMode,
    dates::{return_date, travel_date},
};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Airport {
    pub id: u64,
    pub name: String,
}

/// Parameters of a travel claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripRequest {
    #[serde(default)]
    pub remunerations: Vec<RemunerationRate>,
    #[serde(default)]
    pub grade_level_id: Option<GradeLevelId>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub takeoff: Option<CityId>,
    #[serde(default)]
    pub destination: Option<CityId>,
    pub mode: TravelMode,
    #[serde(default)]
    pub is_resident: bool,
    /// Road distance in kilometres, when known.
    #[serde(default)]
    pub distance: Option<Decimal>,
    pub route: Route,
    #[serde(default)]
    pub airport: Option<Airport>,
}

/// Where in the trip an allowance instance is paid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Placement {
    /// Home to departure terminal.
    Takeoff,
    /// Arrival terminal back home.
    Returned,
    Accommodation,
    AirportHotel,
    HotelAirport,
    /// Outbound flight.
    Departure,
    /// Return flight.
    Arrival,
    Allowance,
}

/// An allowance rule placed on the trip's timeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComputableAllowance {
    pub rule: AllowanceRule,
    pub placement: Placement,
    pub meta: DateWindow,
}

impl ComputableAllowance {
    fn new(rule: &AllowanceRule, placement: Placement, meta: DateWindow) -> Self {
        Self {
            rule: rule.clone(),
            placement,
            meta,
        }
    }
}

/// Allowances selected for a trip, with the resolved cities.
#[derive(Debug)]
pub struct Selection<'a> {
    pub takeoff: &'a City,
    pub destination: &'a City,
    pub grade_level_id: GradeLevelId,
    pub allowances: Vec<ComputableAllowance>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Select the allowances a trip is entitled to.
///
/// Returns [`InsufficientInput`] instead of failing when any required input
/// is missing; never panics.
pub fn select_allowances<'a>(
    catalog: &'a RuleCatalog,
    trip: &TripRequest,
) -> Result<Selection<'a>, InsufficientInput> {
    if trip.remunerations.is_empty() {
        return Err(InsufficientInput::NoRemunerations);
    }
    let grade_level_id = trip.grade_level_id.ok_or(InsufficientInput::NoGradeLevel)?;
    if catalog.cities().is_empty() {
        return Err(InsufficientInput::NoCities);
    }
    if catalog.allowances().is_empty() {
        return Err(InsufficientInput::NoAllowances);
    }
    let takeoff_id = trip.takeoff.ok_or(InsufficientInput::MissingTakeoff)?;
    let destination_id = trip.destination.ok_or(InsufficientInput::MissingDestination)?;
    let takeoff = catalog
        .city(takeoff_id)
        .ok_or(InsufficientInput::UnknownCity { city_id: takeoff_id })?;
    let destination = catalog
        .city(destination_id)
        .ok_or(InsufficientInput::UnknownCity {
            city_id: destination_id,
        })?;
    if trip.end_date < trip.start_date {
        return Err(InsufficientInput::InvertedDates);
    }
    let travel = travel_date(trip.start_date).ok_or(InsufficientInput::DatesOutOfRange)?;
    let returned = return_date(trip.end_date).ok_or(InsufficientInput::DatesOutOfRange)?;

    let eligible: Vec<&AllowanceRule> = catalog
        .allowances()
        .iter()
        .filter(|rule| rule.component.admits(trip.mode, trip.is_resident))
        .collect();

    let mut out = Vec::new();
    let mut diagnostics = Vec::new();
    let round_trip = trip.route == Route::Return;

    match trip.mode {
        TravelMode::Flight if trip.airport.is_some() => {
            let shuttle = pick_shuttle(
                &eligible,
                AllowanceLabel::AirportShuttle,
                takeoff.id,
                destination.id,
            );
            let fare = eligible
                .iter()
                .copied()
                .find(|r| r.label == AllowanceLabel::FlightFare && r.is_generic());

            let outbound = DateWindow::single_day(travel);
            let inbound = DateWindow::single_day(returned);
            match shuttle {
                Some(rule) => out.push(ComputableAllowance::new(rule, Placement::Takeoff, outbound)),
                None => diagnostics.push(Diagnostic::MissingTransportRule {
                    placement: Placement::Takeoff,
                }),
            }
            match fare {
                Some(rule) => {
                    out.push(ComputableAllowance::new(rule, Placement::Departure, outbound));
                }
                None => diagnostics.push(Diagnostic::MissingTransportRule {
                    placement: Placement::Departure,
                }),
            }
            if let Some(rule) = shuttle {
                out.push(ComputableAllowance::new(rule, Placement::AirportHotel, outbound));
            }
            if round_trip {
                if let Some(rule) = shuttle {
                    out.push(ComputableAllowance::new(rule, Placement::HotelAirport, inbound));
                }
                if let Some(rule) = fare {
                    out.push(ComputableAllowance::new(rule, Placement::Arrival, inbound));
                }
                if let Some(rule) = shuttle {
                    out.push(ComputableAllowance::new(rule, Placement::Returned, inbound));
                }
            }
        }
        TravelMode::Flight => diagnostics.push(Diagnostic::MissingAirport),
        TravelMode::Road => {
            match pick_shuttle(
                &eligible,
                AllowanceLabel::InterStateShuttle,
                takeoff.id,
                destination.id,
            ) {
                Some(rule) => {
                    out.push(ComputableAllowance::new(
                        rule,
                        Placement::Takeoff,
                        DateWindow::single_day(travel),
                    ));
                    if round_trip {
                        out.push(ComputableAllowance::new(
                            rule,
                            Placement::Returned,
                            DateWindow::single_day(returned),
                        ));
                    }
                }
                None => diagnostics.push(Diagnostic::MissingTransportRule {
                    placement: Placement::Takeoff,
                }),
            }
        }
    }

    // Residents and non-residents count accommodation days differently:
    // residents from the start date, exclusive; non-residents from the travel
    // day, inclusive.
    if trip.is_resident {
        match eligible
            .iter()
            .find(|r| r.label == AllowanceLabel::OutOfPocketAllowance)
        {
            Some(rule) => out.push(ComputableAllowance::new(
                rule,
                Placement::Allowance,
                DateWindow::exclusive(trip.start_date, returned),
            )),
            None => diagnostics.push(Diagnostic::MissingAccommodationRule {
                city_id: destination.id,
            }),
        }
    } else {
        let linked = destination
            .allowance_id
            .and_then(|id| eligible.iter().find(|r| r.id == id));
        match linked {
            Some(rule) => out.push(ComputableAllowance::new(
                rule,
                Placement::Accommodation,
                DateWindow::inclusive(travel, returned),
            )),
            None => diagnostics.push(Diagnostic::MissingAccommodationRule {
                city_id: destination.id,
            }),
        }
    }

    if let Some(rule) = eligible
        .iter()
        .find(|r| r.label == AllowanceLabel::Intracity)
    {
        out.push(ComputableAllowance::new(
            rule,
            Placement::Allowance,
            DateWindow::working_days(trip.start_date, trip.end_date),
        ));
    }

    tracing::debug!(
        selected = out.len(),
        omitted = diagnostics.len(),
        mode = trip.mode.as_str(),
        "allowances selected"
    );

    Ok(Selection {
        takeoff,
        destination,
        grade_level_id,
        allowances: out,
        diagnostics,
    })
}

/// A route-specific shuttle if one serves `departure → destination`,
/// otherwise the generic rule for the label.
fn pick_shuttle<'a>(
    eligible: &[&'a AllowanceRule],
    label: AllowanceLabel,
    departure: CityId,
    destination: CityId,
) -> Option<&'a AllowanceRule> {
    eligible
        .iter()
        .copied()
        .find(|r| r.label == label && r.serves(departure, destination))
        .or_else(|| {
            eligible
                .iter()
                .copied()
                .find(|r| r.label == label && r.is_generic())
        })
}

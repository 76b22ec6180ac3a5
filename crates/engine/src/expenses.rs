//! Expense line items.
//!
//! Turns a [`Selection`] into priced lines using the trip's remuneration
//! rates. Allowances without a rate for the grade level are omitted and
//! recorded as [`Diagnostic::MissingRemuneration`].

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    ComputableAllowance, Currency, Diagnostic, Money, PaymentBasis, Placement,
    RemunerationId, Rounding, RuleId, Selection, TravelMode, TripRequest,
};

/// A payable line of a travel claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExpenseLineItem {
    pub allowance_id: RuleId,
    pub remuneration_id: RemunerationId,
    pub placement: Placement,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub num_of_days: i64,
    pub unit_price: Money,
    pub total_amount_spent: Money,
    pub total_distance_covered: Decimal,
    pub currency: Currency,
    pub description: String,
    // Filled in by the approval workflow.
    pub cleared_amount: Money,
    pub audited_amount: Money,
    pub total_amount_paid: Money,
    pub variation: Money,
}

/// Lines computed for a trip.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExpenseReport {
    pub lines: Vec<ExpenseLineItem>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ExpenseReport {
    /// Sum of all line amounts, or `None` if it overflows.
    #[must_use]
    pub fn total(&self) -> Option<Money> {
        Money::checked_sum(self.lines.iter().map(|l| l.total_amount_spent))
    }
}

/// Price every selected allowance.
#[must_use]
pub fn build_expense_lines(selection: Selection<'_>, trip: &TripRequest) -> ExpenseReport {
    let Selection {
        takeoff,
        destination,
        grade_level_id,
        allowances,
        mut diagnostics,
    } = selection;

    let names = RouteNames {
        takeoff: &takeoff.name,
        destination: &destination.name,
        airport: trip.airport.as_ref().map(|a| a.name.as_str()),
    };

    let mut lines = Vec::with_capacity(allowances.len());
    for allowance in &allowances {
        let Some(rate) = trip
            .remunerations
            .iter()
            .find(|r| r.allowance_id == allowance.rule.id && r.grade_level_id == grade_level_id)
        else {
            tracing::debug!(
                allowance_id = allowance.rule.id,
                grade_level_id,
                "no remuneration rate, skipping allowance"
            );
            diagnostics.push(Diagnostic::MissingRemuneration {
                allowance_id: allowance.rule.id,
                grade_level_id,
                placement: allowance.placement,
            });
            continue;
        };

        let per_km =
            allowance.rule.payment_basis == PaymentBasis::Km && trip.mode == TravelMode::Road;
        let (total, distance) = if per_km {
            match trip.distance {
                Some(km) => (rate.amount.checked_times(km), km),
                None => {
                    diagnostics.push(Diagnostic::DistanceUnknown {
                        allowance_id: allowance.rule.id,
                    });
                    (Some(Money::ZERO), Decimal::ZERO)
                }
            }
        } else {
            (
                rate.amount
                    .checked_times(Decimal::from(allowance.meta.num_of_days)),
                Decimal::ZERO,
            )
        };
        let Some(total) = total else {
            tracing::warn!(
                allowance_id = allowance.rule.id,
                unit_price = %rate.amount,
                "line amount overflowed, skipping allowance"
            );
            diagnostics.push(Diagnostic::AmountOverflow {
                allowance_id: allowance.rule.id,
            });
            continue;
        };

        lines.push(ExpenseLineItem {
            allowance_id: allowance.rule.id,
            remuneration_id: rate.id,
            placement: allowance.placement,
            start_date: allowance.meta.start_date,
            end_date: allowance.meta.end_date,
            num_of_days: allowance.meta.num_of_days,
            unit_price: rate.amount,
            total_amount_spent: total.round(rate.currency, Rounding::HalfUp),
            total_distance_covered: distance,
            currency: rate.currency,
            description: describe(allowance, trip.mode, &names),
            cleared_amount: Money::ZERO,
            audited_amount: Money::ZERO,
            total_amount_paid: Money::ZERO,
            variation: Money::ZERO,
        });
    }

    ExpenseReport { lines, diagnostics }
}

struct RouteNames<'a> {
    takeoff: &'a str,
    destination: &'a str,
    airport: Option<&'a str>,
}

fn describe(allowance: &ComputableAllowance, mode: TravelMode, names: &RouteNames<'_>) -> String {
    let RouteNames {
        takeoff,
        destination,
        airport,
    } = *names;
    let airport = airport.unwrap_or(takeoff);

    match (mode, allowance.placement) {
        (TravelMode::Flight, Placement::Takeoff) => {
            format!("Airport Shuttle from {takeoff} to {airport} Airport")
        }
        (TravelMode::Flight, Placement::Departure) => {
            format!("Flight Fare from {takeoff} to {destination} via {airport} Airport")
        }
        (TravelMode::Flight, Placement::AirportHotel) => {
            format!("Airport Shuttle to Hotel in {destination}")
        }
        (TravelMode::Flight, Placement::HotelAirport) => {
            format!("Hotel to Airport Shuttle in {destination}")
        }
        (TravelMode::Flight, Placement::Arrival) => {
            format!("Flight Fare from {destination} to {takeoff} via {airport} Airport")
        }
        (TravelMode::Flight, Placement::Returned) => {
            format!("Airport Shuttle from {airport} Airport to {takeoff}")
        }
        (TravelMode::Road, Placement::Takeoff) => format!("Transit from {takeoff} to {destination}"),
        (TravelMode::Road, Placement::Returned) => format!("Transit from {destination} to {takeoff}"),
        (_, Placement::Accommodation) => format!("Accommodation in {destination}"),
        _ => allowance.rule.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{
        Airport, AllowanceLabel, AllowanceRule, CatalogSnapshot, City, RemunerationRate, Route,
        RuleCatalog, select_allowances,
    };

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn rule(id: u64, name: &str, label: AllowanceLabel, basis: PaymentBasis) -> AllowanceRule {
        AllowanceRule {
            id,
            name: name.to_string(),
            component: "both-both".parse().unwrap(),
            label,
            departure_city_id: None,
            destination_city_id: None,
            payment_basis: basis,
            parent_id: None,
        }
    }

    fn rate(id: u64, allowance_id: u64, amount: Decimal) -> RemunerationRate {
        RemunerationRate {
            id,
            allowance_id,
            grade_level_id: 9,
            amount: Money::new(amount),
            currency: Currency::Ngn,
        }
    }

    fn catalog() -> RuleCatalog {
        RuleCatalog::new(CatalogSnapshot {
            allowances: vec![
                rule(1, "Inter-state shuttle", AllowanceLabel::InterStateShuttle, PaymentBasis::Km),
                rule(2, "Airport shuttle", AllowanceLabel::AirportShuttle, PaymentBasis::Flat),
                rule(3, "Flight fare", AllowanceLabel::FlightFare, PaymentBasis::Flat),
                rule(4, "Hotel", AllowanceLabel::Accommodation, PaymentBasis::Flat),
                rule(5, "Intracity transport", AllowanceLabel::Intracity, PaymentBasis::Flat),
            ],
            journal_types: vec![],
            cities: vec![
                City {
                    id: 1,
                    name: "Kano".to_string(),
                    allowance_id: None,
                },
                City {
                    id: 2,
                    name: "Enugu".to_string(),
                    allowance_id: Some(4),
                },
            ],
        })
        .unwrap()
    }

    fn trip(mode: TravelMode) -> TripRequest {
        TripRequest {
            remunerations: vec![
                rate(100, 1, dec!(25.5)),
                rate(101, 2, dec!(5000)),
                rate(102, 3, dec!(85000)),
                rate(103, 4, dec!(20000)),
            ],
            grade_level_id: Some(9),
            start_date: d(2024, 3, 4),
            end_date: d(2024, 3, 6),
            takeoff: Some(1),
            destination: Some(2),
            mode,
            is_resident: false,
            distance: Some(dec!(340)),
            route: Route::Return,
            airport: Some(Airport {
                id: 8,
                name: "Mallam Aminu Kano".to_string(),
            }),
        }
    }

    fn build(trip: &TripRequest) -> ExpenseReport {
        let cat = catalog();
        let selection = select_allowances(&cat, trip).unwrap();
        build_expense_lines(selection, trip)
    }

    #[test]
    fn road_per_km_lines_multiply_distance() {
        let report = build(&trip(TravelMode::Road));
        let transit: Vec<_> = report.lines.iter().filter(|l| l.allowance_id == 1).collect();
        assert_eq!(transit.len(), 2);
        assert_eq!(transit[0].total_amount_spent, Money::new(dec!(8670)));
        assert_eq!(transit[0].total_distance_covered, dec!(340));
        assert_eq!(transit[0].description, "Transit from Kano to Enugu");
        assert_eq!(transit[1].description, "Transit from Enugu to Kano");
        assert!(transit.iter().all(|l| l.cleared_amount.is_zero() && l.variation.is_zero()));
    }

    #[test]
    fn flat_lines_multiply_days() {
        let report = build(&trip(TravelMode::Road));
        let hotel = report.lines.iter().find(|l| l.allowance_id == 4).unwrap();
        // Travel day 3rd through return day 7th, inclusive.
        assert_eq!(hotel.num_of_days, 5);
        assert_eq!(hotel.total_amount_spent, Money::new(dec!(100000)));
        assert_eq!(hotel.description, "Accommodation in Enugu");
    }

    #[test]
    fn missing_rate_skips_line_with_diagnostic() {
        let report = build(&trip(TravelMode::Road));
        assert!(report.lines.iter().all(|l| l.allowance_id != 5));
        assert!(report.diagnostics.contains(&Diagnostic::MissingRemuneration {
            allowance_id: 5,
            grade_level_id: 9,
            placement: Placement::Allowance,
        }));
    }

    #[test]
    fn unknown_distance_zeroes_per_km_lines() {
        let mut t = trip(TravelMode::Road);
        t.distance = None;
        let report = build(&t);
        let transit = report.lines.iter().find(|l| l.allowance_id == 1).unwrap();
        assert!(transit.total_amount_spent.is_zero());
        assert!(report
            .diagnostics
            .contains(&Diagnostic::DistanceUnknown { allowance_id: 1 }));
    }

    #[test]
    fn overflowing_line_is_skipped_with_diagnostic() {
        let mut t = trip(TravelMode::Road);
        t.remunerations[0].amount = Money::new(Decimal::from(10u64.pow(16)));
        t.distance = Some(Decimal::from(10u64.pow(14)));
        let report = build(&t);
        assert!(report.lines.iter().all(|l| l.allowance_id != 1));
        assert!(report
            .diagnostics
            .contains(&Diagnostic::AmountOverflow { allowance_id: 1 }));
        // The other lines are still priced.
        assert!(report.lines.iter().any(|l| l.allowance_id == 4));
    }

    #[test]
    fn flight_lines_use_flight_templates() {
        let report = build(&trip(TravelMode::Flight));
        let fare = report
            .lines
            .iter()
            .find(|l| l.placement == Placement::Departure)
            .unwrap();
        assert_eq!(
            fare.description,
            "Flight Fare from Kano to Enugu via Mallam Aminu Kano Airport"
        );
        assert_eq!(fare.total_amount_spent, Money::new(dec!(85000)));
        let returned = report
            .lines
            .iter()
            .find(|l| l.placement == Placement::Returned)
            .unwrap();
        assert_eq!(
            returned.description,
            "Airport Shuttle from Mallam Aminu Kano Airport to Kano"
        );
    }
}

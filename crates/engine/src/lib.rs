//! Rule-driven computation of travel expenses and payment transaction lines.
//!
//! The [`Engine`] holds a read-only [`RuleCatalog`] and one
//! [`ComputationCache`] per pipeline:
//!
//! - [`Engine::compute_expenses`] turns a [`TripRequest`] into priced
//!   [`ExpenseLineItem`]s.
//! - [`Engine::compute_transaction_lines`] turns a [`Payment`] into its gross,
//!   deduction, reimbursement and net [`TransactionLine`]s.
//!
//! Both are pure over their inputs; repeated identical requests inside the
//! cache TTL return the same [`Arc`].

use std::sync::Arc;

use chrono::{NaiveDate, TimeDelta};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

pub use allowance::{
    Airport, ComputableAllowance, Placement, Selection, TripRequest, select_allowances,
};
pub use cache::{CacheStats, Clock, ComputationCache, EntryStats, ManualClock, SystemClock};
pub use catalog::{CatalogSnapshot, RuleCatalog};
pub use currency::Currency;
pub use dates::{DateWindow, count_weekdays};
pub use distance::{DistanceResolver, DistanceTable};
pub use error::EngineError;
pub use expenses::{ExpenseLineItem, ExpenseReport, build_expense_lines};
pub use lines::{LineBuilder, LineSpec, Posting, Side, TrailBalance, TransactionLine};
pub use money::{Money, Rate, Rounding};
pub use outcome::{Diagnostic, InsufficientInput, Outcome};
pub use rules::*;
pub use tax::{
    AmountColumn, ColumnSelection, LineSource, Payee, PayeeKind, Payment, PaymentId,
    TransactionReport, compute_transaction_lines,
};

mod allowance;
mod cache;
mod catalog;
mod currency;
mod dates;
mod distance;
mod error;
mod expenses;
mod lines;
mod money;
mod outcome;
mod rules;
mod tax;

type ResultEngine<T> = Result<T, EngineError>;

/// Default lifetime of cached results.
pub const DEFAULT_TTL: TimeDelta = TimeDelta::minutes(5);

#[derive(Debug)]
pub struct Engine {
    catalog: Arc<RuleCatalog>,
    expenses: ComputationCache<ExpenseReport>,
    transactions: ComputationCache<TransactionReport>,
}

/// Cache introspection for both pipelines.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EngineCacheStats {
    pub expenses: CacheStats,
    pub transactions: CacheStats,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    #[must_use]
    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    /// Compute the expense lines of a trip.
    ///
    /// The only error is a failure to build the cache key; missing input is
    /// reported as [`Outcome::Insufficient`].
    pub fn compute_expenses(&self, trip: &TripRequest) -> ResultEngine<Outcome<ExpenseReport>> {
        let key = Self::expense_key(trip)?;
        let computed = self.expenses.get_or_try_compute(key, || {
            select_allowances(&self.catalog, trip)
                .map(|selection| build_expense_lines(selection, trip))
        });

        Ok(match computed {
            Ok(report) => Outcome::Ready(report),
            Err(reason) => {
                tracing::debug!(%reason, "expense computation skipped");
                Outcome::Insufficient(reason)
            }
        })
    }

    /// Compute the transaction lines of a payment with the journal rules
    /// `rule_ids`, applied in the given order.
    ///
    /// Ids not found in the catalog are skipped and reported as
    /// [`Diagnostic::MissingJournalRule`].
    pub fn compute_transaction_lines(
        &self,
        payment: &Payment,
        rule_ids: &[RuleId],
        columns: ColumnSelection,
    ) -> ResultEngine<Outcome<TransactionReport>> {
        if self.catalog.journal_types().is_empty() {
            return Ok(Outcome::Insufficient(InsufficientInput::NoJournalRules));
        }

        let key = Self::transaction_key(payment, rule_ids, columns)?;
        let computed = self.transactions.get_or_try_compute(key, || {
            let mut diagnostics = Vec::new();
            let rules: Vec<&JournalTypeRule> = rule_ids
                .iter()
                .filter_map(|id| {
                    let rule = self.catalog.journal_type(*id);
                    if rule.is_none() {
                        diagnostics.push(Diagnostic::MissingJournalRule { rule_id: *id });
                    }
                    rule
                })
                .collect();
            let mut report = compute_transaction_lines(&self.catalog, payment, &rules, columns)?;
            diagnostics.append(&mut report.diagnostics);
            report.diagnostics = diagnostics;
            Ok(report)
        });

        Ok(match computed {
            Ok(report) => Outcome::Ready(report),
            Err(reason) => {
                tracing::debug!(
                    %reason,
                    payment_id = payment.id,
                    "transaction computation skipped"
                );
                Outcome::Insufficient(reason)
            }
        })
    }

    /// Resolve the distance of a road trip if it doesn't carry one.
    ///
    /// Other travel modes are returned untouched. Leaves `distance` as `None`
    /// when either city is unknown or the resolver fails.
    pub async fn with_resolved_distance<R: DistanceResolver>(
        &self,
        mut trip: TripRequest,
        resolver: &R,
    ) -> TripRequest {
        if trip.distance.is_some() || trip.mode != TravelMode::Road {
            return trip;
        }
        let origin = trip.takeoff.and_then(|id| self.catalog.city(id));
        let destination = trip.destination.and_then(|id| self.catalog.city(id));
        if let (Some(origin), Some(destination)) = (origin, destination) {
            trip.distance = resolver.resolve(&origin.name, &destination.name).await;
            if trip.distance.is_none() {
                tracing::warn!(
                    origin = %origin.name,
                    destination = %destination.name,
                    "distance unknown"
                );
            }
        }
        trip
    }

    pub fn invalidate_expenses(&self, trip: &TripRequest) -> ResultEngine<bool> {
        Ok(self.expenses.invalidate(&Self::expense_key(trip)?))
    }

    pub fn invalidate_transactions(
        &self,
        payment: &Payment,
        rule_ids: &[RuleId],
        columns: ColumnSelection,
    ) -> ResultEngine<bool> {
        Ok(self
            .transactions
            .invalidate(&Self::transaction_key(payment, rule_ids, columns)?))
    }

    /// Drop every cached result of both pipelines.
    pub fn clear_caches(&self) {
        self.expenses.clear();
        self.transactions.clear();
    }

    #[must_use]
    pub fn cache_stats(&self) -> EngineCacheStats {
        EngineCacheStats {
            expenses: self.expenses.stats(),
            transactions: self.transactions.stats(),
        }
    }

    fn expense_key(trip: &TripRequest) -> ResultEngine<String> {
        ComputationCache::<ExpenseReport>::key(&ExpenseKey::from(trip))
    }

    fn transaction_key(
        payment: &Payment,
        rule_ids: &[RuleId],
        columns: ColumnSelection,
    ) -> ResultEngine<String> {
        ComputationCache::<TransactionReport>::key(&TransactionKey {
            payment_id: payment.id,
            payee: payment.payee.kind,
            payee_id: payment.payee.id,
            currency: payment.currency,
            payment_method: payment.payment_method.as_deref(),
            approved: payment.total_approved_amount.normalize(),
            taxable: payment.total_taxable_amount.normalize(),
            spent: payment.total_amount_spent.normalize(),
            paid: payment.total_amount_paid.normalize(),
            attached: payment.transactions.iter().map(|l| l.reference).collect(),
            rule_ids,
            payable: columns.payable,
            taxable_column: columns.taxable,
        })
    }
}

/// Cache key of an expense computation. Amounts are normalized so that
/// `1000` and `1000.00` address the same entry.
#[derive(Serialize)]
struct ExpenseKey<'a> {
    grade_level_id: Option<GradeLevelId>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    takeoff: Option<CityId>,
    destination: Option<CityId>,
    mode: TravelMode,
    is_resident: bool,
    distance: Option<Decimal>,
    route: Route,
    airport_id: Option<u64>,
    airport_name: Option<&'a str>,
    remunerations: Vec<(RemunerationId, RuleId, GradeLevelId, Money, Currency)>,
}

impl<'a> From<&'a TripRequest> for ExpenseKey<'a> {
    fn from(trip: &'a TripRequest) -> Self {
        Self {
            grade_level_id: trip.grade_level_id,
            start_date: trip.start_date,
            end_date: trip.end_date,
            takeoff: trip.takeoff,
            destination: trip.destination,
            mode: trip.mode,
            is_resident: trip.is_resident,
            distance: trip.distance.map(|d| d.normalize()),
            route: trip.route,
            airport_id: trip.airport.as_ref().map(|a| a.id),
            airport_name: trip.airport.as_ref().map(|a| a.name.as_str()),
            remunerations: trip
                .remunerations
                .iter()
                .map(|r| {
                    (
                        r.id,
                        r.allowance_id,
                        r.grade_level_id,
                        r.amount.normalize(),
                        r.currency,
                    )
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct TransactionKey<'a> {
    payment_id: PaymentId,
    payee: PayeeKind,
    payee_id: u64,
    currency: Currency,
    payment_method: Option<&'a str>,
    approved: Money,
    taxable: Money,
    spent: Money,
    paid: Money,
    attached: Vec<Uuid>,
    rule_ids: &'a [RuleId],
    payable: Option<AmountColumn>,
    taxable_column: Option<AmountColumn>,
}

#[derive(Debug)]
pub struct EngineBuilder {
    catalog: Arc<RuleCatalog>,
    expenses_ttl: TimeDelta,
    transactions_ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            catalog: Arc::new(RuleCatalog::empty()),
            expenses_ttl: DEFAULT_TTL,
            transactions_ttl: DEFAULT_TTL,
            clock: Arc::new(SystemClock),
        }
    }
}

impl EngineBuilder {
    /// Pass the rule catalog snapshot.
    pub fn catalog(mut self, catalog: impl Into<Arc<RuleCatalog>>) -> EngineBuilder {
        self.catalog = catalog.into();
        self
    }

    pub fn expenses_ttl(mut self, ttl: TimeDelta) -> EngineBuilder {
        self.expenses_ttl = ttl;
        self
    }

    pub fn transactions_ttl(mut self, ttl: TimeDelta) -> EngineBuilder {
        self.transactions_ttl = ttl;
        self
    }

    /// Time source for cache expiry.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> EngineBuilder {
        self.clock = clock;
        self
    }

    /// Construct `Engine`
    pub fn build(self) -> Engine {
        Engine {
            catalog: self.catalog,
            expenses: ComputationCache::new("expenses", self.expenses_ttl, Arc::clone(&self.clock)),
            transactions: ComputationCache::new("transactions", self.transactions_ttl, self.clock),
        }
    }
}

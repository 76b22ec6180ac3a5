//! Tax and deduction pipeline.
//!
//! Evaluates journal type rules against a payment and produces its
//! accounting lines: the gross remittance, one or two lines per applied
//! rule, the taxable reimbursement and the non-taxable net pay.
//!
//! VAT is backed out of the taxable amount (the amount is VAT-inclusive).
//! Deductions are taken on what remains, in the order the rules are given.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    Benefactor, BaseSelector, Currency, Diagnostic, EngineError, EntryType, InsufficientInput,
    JournalTypeRule, LineBuilder, LineSpec, Money, Posting, RateType, RuleCatalog, RuleContext,
    RuleState, Side, TrailBalance, TransactionLine, VAT_CODE,
};

pub type PaymentId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayeeKind {
    Staff,
    ThirdParty,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Payee {
    pub kind: PayeeKind,
    pub id: u64,
}

/// A payment awaiting its accounting lines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub payment_method: Option<String>,
    pub payee: Payee,
    pub total_approved_amount: Money,
    #[serde(default)]
    pub total_taxable_amount: Money,
    #[serde(default)]
    pub total_amount_spent: Money,
    #[serde(default)]
    pub total_amount_paid: Money,
    /// Lines already attached to the payment.
    #[serde(default)]
    pub transactions: Vec<TransactionLine>,
}

impl Payment {
    #[must_use]
    pub fn amount(&self, column: AmountColumn) -> Money {
        match column {
            AmountColumn::TotalApprovedAmount => self.total_approved_amount,
            AmountColumn::TotalTaxableAmount => self.total_taxable_amount,
            AmountColumn::TotalAmountSpent => self.total_amount_spent,
            AmountColumn::TotalAmountPaid => self.total_amount_paid,
        }
    }
}

/// Payment amount a computation reads from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountColumn {
    #[default]
    TotalApprovedAmount,
    TotalTaxableAmount,
    TotalAmountSpent,
    TotalAmountPaid,
}

impl AmountColumn {
    pub const ALL: [Self; 4] = [
        Self::TotalApprovedAmount,
        Self::TotalTaxableAmount,
        Self::TotalAmountSpent,
        Self::TotalAmountPaid,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TotalApprovedAmount => "total_approved_amount",
            Self::TotalTaxableAmount => "total_taxable_amount",
            Self::TotalAmountSpent => "total_amount_spent",
            Self::TotalAmountPaid => "total_amount_paid",
        }
    }
}

impl FromStr for AmountColumn {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|column| column.as_str() == name)
            .ok_or_else(|| EngineError::tag("amount column", name))
    }
}

/// Column overrides for a computation. Any override forces recomputation of
/// a payment that already has lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnSelection {
    #[serde(default)]
    pub payable: Option<AmountColumn>,
    /// Ignored for staff payees, who are always taxed on
    /// `total_taxable_amount`.
    #[serde(default)]
    pub taxable: Option<AmountColumn>,
}

impl ColumnSelection {
    #[must_use]
    pub fn payable(column: AmountColumn) -> Self {
        Self {
            payable: Some(column),
            taxable: None,
        }
    }

    #[must_use]
    pub fn is_override(&self) -> bool {
        self.payable.is_some() || self.taxable.is_some()
    }
}

/// Whether the lines were computed or read from the payment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSource {
    Attached,
    Computed,
}

/// Lines of one payment grouped by role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransactionReport {
    pub gross: Option<TransactionLine>,
    pub components: Vec<TransactionLine>,
    pub reimbursement: Option<TransactionLine>,
    pub net: Option<TransactionLine>,
    pub source: LineSource,
    pub vat: Money,
    pub total_deductions: Money,
    pub diagnostics: Vec<Diagnostic>,
}

impl TransactionReport {
    fn empty(source: LineSource) -> Self {
        Self {
            gross: None,
            components: Vec::new(),
            reimbursement: None,
            net: None,
            source,
            vat: Money::ZERO,
            total_deductions: Money::ZERO,
            diagnostics: Vec::new(),
        }
    }

    /// Sum of debit-side component amounts, or `None` if it overflows.
    #[must_use]
    pub fn component_debits(&self) -> Option<Money> {
        Money::checked_sum(
            self.components
                .iter()
                .filter(|l| l.side == Side::Debit)
                .map(|l| l.amount),
        )
    }

    /// Every line in posting order.
    pub fn lines(&self) -> impl Iterator<Item = &TransactionLine> {
        self.gross
            .iter()
            .chain(self.components.iter())
            .chain(self.reimbursement.iter())
            .chain(self.net.iter())
    }
}

/// Compute (or classify) the lines of a payment.
///
/// When the payment already carries lines and no column override is given,
/// those lines are grouped by journal type and returned as they are.
///
/// Fails with [`InsufficientInput::AmountOverflow`] when an intermediate
/// amount exceeds the decimal range.
pub fn compute_transaction_lines(
    catalog: &RuleCatalog,
    payment: &Payment,
    rules: &[&JournalTypeRule],
    columns: ColumnSelection,
) -> Result<TransactionReport, InsufficientInput> {
    if !payment.transactions.is_empty() && !columns.is_override() {
        return Ok(classify(catalog, &payment.transactions));
    }

    let staff = payment.payee.kind == PayeeKind::Staff;
    let payable_column = columns.payable.unwrap_or_default();
    let taxable_column = match columns.taxable {
        Some(column) if !staff => column,
        _ => AmountColumn::TotalTaxableAmount,
    };
    let approved = payment.amount(payable_column);
    let taxable = payment.amount(taxable_column);
    let currency = payment.currency;
    let builder = LineBuilder::new(payment);

    let mut report = TransactionReport::empty(LineSource::Computed);

    report.gross = catalog.gross().map(|rule| {
        builder.line(LineSpec::new(
            rule,
            approved,
            Side::Debit,
            Posting::Remittance,
            TrailBalance::Left,
        ))
    });

    let overflow = || {
        tracing::warn!(payment_id = payment.id, "payment amount overflowed");
        InsufficientInput::AmountOverflow
    };

    let actual_vat = match catalog.vat() {
        Some(vat) if !staff && taxable.is_positive() => taxable
            .checked_inclusive_portion(vat.rate)
            .ok_or_else(overflow)?
            .round(currency, vat.rounding),
        _ => Money::ZERO,
    };
    let base_taxable = taxable.checked_sub(actual_vat).ok_or_else(overflow)?;
    let non_taxable = approved.checked_sub(taxable).ok_or_else(overflow)?;
    report.vat = actual_vat;

    let mut highest_precedence: Option<u32> = None;
    for rule in rules.iter().copied().filter(|r| r.state != RuleState::Fixed) {
        match highest_precedence {
            Some(highest) if rule.precedence < highest => {
                report.diagnostics.push(Diagnostic::PrecedenceOutOfOrder {
                    rule_id: rule.id,
                    precedence: rule.precedence,
                });
            }
            _ => highest_precedence = Some(rule.precedence),
        }

        if rule.is_code(VAT_CODE) {
            if actual_vat.is_positive() {
                report
                    .components
                    .push(builder.line(LineSpec::suspense(rule, actual_vat)));
                report
                    .components
                    .push(builder.line(LineSpec::payable(rule, actual_vat)));
            }
            continue;
        }

        let deduction = deduction(rule, approved, base_taxable, non_taxable)
            .ok_or_else(overflow)?
            .round(currency, rule.rounding);
        report.total_deductions = report
            .total_deductions
            .checked_add(deduction)
            .ok_or_else(overflow)?;

        let to_beneficiary = rule.benefactor == Benefactor::Beneficiary;
        match rule.entry_type {
            EntryType::Both => {
                report
                    .components
                    .push(builder.line(LineSpec::suspense(rule, deduction)));
                report
                    .components
                    .push(builder.line(LineSpec::payable(rule, deduction)));
            }
            EntryType::Debit => report.components.push(
                builder.line(LineSpec::suspense(rule, deduction).with_beneficiary(to_beneficiary)),
            ),
            EntryType::Credit => report.components.push(
                builder.line(LineSpec::payable(rule, deduction).with_beneficiary(to_beneficiary)),
            ),
        }
    }

    let reimbursable = taxable
        .checked_sub(report.total_deductions)
        .ok_or_else(overflow)?;
    if reimbursable.is_positive() {
        report.reimbursement = catalog.reimbursement().map(|rule| {
            builder.line(
                LineSpec::payable(rule, reimbursable)
                    .with_beneficiary(rule.benefactor == Benefactor::Beneficiary),
            )
        });
    }

    if non_taxable.is_positive() {
        report.net = catalog.net().map(|rule| {
            builder.line(
                LineSpec::payable(rule, non_taxable)
                    .with_beneficiary(rule.benefactor == Benefactor::Beneficiary),
            )
        });
    }

    tracing::debug!(
        payment_id = payment.id,
        components = report.components.len(),
        vat = %report.vat,
        deductions = %report.total_deductions,
        "transaction lines computed"
    );

    Ok(report)
}

/// Amount a single rule deducts, `None` on overflow.
///
/// Holding rules withhold the whole approved amount.
fn deduction(
    rule: &JournalTypeRule,
    approved: Money,
    base_taxable: Money,
    non_taxable: Money,
) -> Option<Money> {
    if rule.context == RuleContext::Holding {
        return Some(approved);
    }
    match rule.rate_type {
        RateType::Fixed => Some(rule.rate.as_money()),
        RateType::Percent => {
            let base = match rule.base_selector {
                BaseSelector::Gross => approved,
                BaseSelector::NonTaxable => non_taxable,
                BaseSelector::Taxable | BaseSelector::Custom => base_taxable,
            };
            base.checked_percent(rule.rate)
        }
    }
}

fn classify(catalog: &RuleCatalog, lines: &[TransactionLine]) -> TransactionReport {
    let gross_id = catalog.gross().map(|r| r.id);
    let reimbursement_id = catalog.reimbursement().map(|r| r.id);
    let net_id = catalog.net().map(|r| r.id);

    let mut report = TransactionReport::empty(LineSource::Attached);
    for line in lines {
        let id = Some(line.journal_type_id);
        if id == gross_id {
            report.gross = Some(line.clone());
        } else if id == reimbursement_id {
            report.reimbursement = Some(line.clone());
        } else if id == net_id {
            report.net = Some(line.clone());
        } else {
            report.components.push(line.clone());
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{CatalogSnapshot, Deductible, Flag, JournalKind, Rate, Rounding, RuleId};

    fn rule(id: RuleId, code: &str, rate: Decimal) -> JournalTypeRule {
        JournalTypeRule {
            id,
            code: code.to_string(),
            kind: JournalKind::Deduct,
            base_selector: BaseSelector::Taxable,
            rate: Rate::new(rate),
            rate_type: RateType::Percent,
            tax_rate: Rate::ZERO,
            precedence: id as u32,
            rounding: Rounding::HalfUp,
            state: RuleState::Optional,
            entry_type: EntryType::Both,
            context: RuleContext::Tax,
            benefactor: Benefactor::Entity,
            flag: Flag::Payable,
            deductible: Deductible::Taxable,
            chart_of_account_id: None,
        }
    }

    fn fixed(id: RuleId, code: &str, context: RuleContext) -> JournalTypeRule {
        JournalTypeRule {
            state: RuleState::Fixed,
            context,
            benefactor: Benefactor::Beneficiary,
            ..rule(id, code, Decimal::ZERO)
        }
    }

    fn catalog(extra: Vec<JournalTypeRule>) -> RuleCatalog {
        let mut journal_types = vec![
            fixed(1, "GRP", RuleContext::Gross),
            fixed(2, "REIM", RuleContext::Reimbursement),
            fixed(3, "NET", RuleContext::Net),
        ];
        journal_types.extend(extra);
        RuleCatalog::new(CatalogSnapshot {
            journal_types,
            ..Default::default()
        })
        .unwrap()
    }

    fn payment(kind: PayeeKind, approved: Decimal, taxable: Decimal) -> Payment {
        Payment {
            id: 5,
            currency: Currency::Ngn,
            payment_method: None,
            payee: Payee { kind, id: 31 },
            total_approved_amount: Money::new(approved),
            total_taxable_amount: Money::new(taxable),
            total_amount_spent: Money::ZERO,
            total_amount_paid: Money::ZERO,
            transactions: vec![],
        }
    }

    fn subset<'c>(catalog: &'c RuleCatalog, ids: &[RuleId]) -> Vec<&'c JournalTypeRule> {
        ids.iter().filter_map(|id| catalog.journal_type(*id)).collect()
    }

    #[test]
    fn vat_is_backed_out_before_deductions() {
        let cat = catalog(vec![
            JournalTypeRule {
                rate: Rate::new(dec!(15)),
                ..rule(10, "VAT", Decimal::ZERO)
            },
            rule(11, "WHT", dec!(5)),
        ]);
        let p = payment(PayeeKind::ThirdParty, dec!(11500), dec!(11500));
        let report =
            compute_transaction_lines(&cat, &p, &subset(&cat, &[10, 11]), ColumnSelection::default())
                .unwrap();

        assert_eq!(report.vat, Money::new(dec!(1500)));
        // 5% of 10 000.
        assert_eq!(report.total_deductions, Money::new(dec!(500)));
        let narrations: Vec<_> = report.components.iter().map(|l| l.narration.as_str()).collect();
        assert_eq!(narrations, vec!["VAT Suspense", "VAT", "WHT Suspense", "WHT"]);
        assert_eq!(report.reimbursement.as_ref().unwrap().amount, Money::new(dec!(11000)));
        assert!(report.net.is_none());
    }

    #[test]
    fn staff_payees_pay_no_vat() {
        let cat = catalog(vec![JournalTypeRule {
            rate: Rate::new(dec!(7.5)),
            ..rule(10, "VAT", Decimal::ZERO)
        }]);
        let p = payment(PayeeKind::Staff, dec!(5000), dec!(5000));
        let columns = ColumnSelection {
            payable: None,
            taxable: Some(AmountColumn::TotalAmountPaid),
        };
        let report = compute_transaction_lines(&cat, &p, &subset(&cat, &[10]), columns).unwrap();
        assert!(report.vat.is_zero());
        assert!(report.components.is_empty());
        // Taxable column forced back to total_taxable_amount.
        assert_eq!(report.reimbursement.as_ref().unwrap().amount, Money::new(dec!(5000)));
    }

    #[test]
    fn holding_withholds_the_full_approved_amount() {
        let cat = catalog(vec![JournalTypeRule {
            context: RuleContext::Holding,
            entry_type: EntryType::Credit,
            benefactor: Benefactor::Beneficiary,
            ..rule(12, "HLD", dec!(1))
        }]);
        let p = payment(PayeeKind::ThirdParty, dec!(9000), dec!(4000));
        let report =
            compute_transaction_lines(&cat, &p, &subset(&cat, &[12]), ColumnSelection::default())
                .unwrap();

        assert_eq!(report.total_deductions, Money::new(dec!(9000)));
        assert_eq!(report.components.len(), 1);
        let hold = &report.components[0];
        assert_eq!(hold.side, Side::Credit);
        assert_eq!(hold.posting, Posting::Expense);
        assert_eq!(hold.beneficiary.as_ref().map(|b| b.id), Some(31));
        assert!(report.reimbursement.is_none());
        assert_eq!(report.net.as_ref().unwrap().amount, Money::new(dec!(5000)));
        assert_eq!(report.net.as_ref().unwrap().narration, "NET Payable");
    }

    #[test]
    fn single_debit_rule_posts_to_suspense() {
        let cat = catalog(vec![JournalTypeRule {
            entry_type: EntryType::Debit,
            rate_type: RateType::Fixed,
            ..rule(13, "STAMP", dec!(50))
        }]);
        let p = payment(PayeeKind::ThirdParty, dec!(1000), dec!(1000));
        let report =
            compute_transaction_lines(&cat, &p, &subset(&cat, &[13]), ColumnSelection::default())
                .unwrap();
        assert_eq!(report.components.len(), 1);
        assert_eq!(report.components[0].narration, "STAMP Suspense");
        assert_eq!(report.components[0].trail_balance, TrailBalance::Left);
        assert_eq!(report.components[0].amount, Money::new(dec!(50)));
        assert!(report.components[0].beneficiary.is_none());
    }

    #[test]
    fn base_selector_picks_deduction_base() {
        let cat = catalog(vec![
            JournalTypeRule {
                base_selector: BaseSelector::Gross,
                ..rule(14, "CMS", dec!(10))
            },
            JournalTypeRule {
                base_selector: BaseSelector::NonTaxable,
                ..rule(15, "LEVY", dec!(10))
            },
        ]);
        let p = payment(PayeeKind::ThirdParty, dec!(1000), dec!(600));
        let report = compute_transaction_lines(
            &cat,
            &p,
            &subset(&cat, &[14, 15]),
            ColumnSelection::default(),
        )
        .unwrap();
        assert_eq!(report.total_deductions, Money::new(dec!(140)));
    }

    #[test]
    fn deductions_round_with_rule_strategy() {
        let cat = catalog(vec![JournalTypeRule {
            rounding: Rounding::Bankers,
            ..rule(16, "WHT", dec!(2.5))
        }]);
        // 2.5% of 100.2 = 2.505 and 2.5% of 100.6 = 2.515 both round to even.
        let p = payment(PayeeKind::ThirdParty, dec!(100.2), dec!(100.2));
        let report =
            compute_transaction_lines(&cat, &p, &subset(&cat, &[16]), ColumnSelection::default())
                .unwrap();
        assert_eq!(report.total_deductions, Money::new(dec!(2.50)));
        let p = payment(PayeeKind::ThirdParty, dec!(100.6), dec!(100.6));
        let report =
            compute_transaction_lines(&cat, &p, &subset(&cat, &[16]), ColumnSelection::default())
                .unwrap();
        assert_eq!(report.total_deductions, Money::new(dec!(2.52)));
    }

    #[test]
    fn out_of_order_precedence_is_reported_but_applied() {
        let cat = catalog(vec![rule(20, "A", dec!(1)), rule(18, "B", dec!(1))]);
        let p = payment(PayeeKind::ThirdParty, dec!(100), dec!(100));
        let report = compute_transaction_lines(
            &cat,
            &p,
            &subset(&cat, &[20, 18]),
            ColumnSelection::default(),
        )
        .unwrap();
        assert_eq!(report.components.len(), 4);
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::PrecedenceOutOfOrder {
                rule_id: 18,
                precedence: 18
            }]
        );
    }

    #[test]
    fn attached_lines_pass_through_unless_overridden() {
        let cat = catalog(vec![rule(11, "WHT", dec!(5))]);
        let fresh = payment(PayeeKind::ThirdParty, dec!(2000), dec!(1000));
        let computed = compute_transaction_lines(
            &cat,
            &fresh,
            &subset(&cat, &[11]),
            ColumnSelection::default(),
        )
        .unwrap();

        let mut attached = fresh.clone();
        attached.transactions = computed.lines().cloned().collect();
        let classified = compute_transaction_lines(
            &cat,
            &attached,
            &subset(&cat, &[11]),
            ColumnSelection::default(),
        )
        .unwrap();
        assert_eq!(classified.source, LineSource::Attached);
        assert_eq!(classified.gross, computed.gross);
        assert_eq!(classified.components, computed.components);
        assert_eq!(classified.reimbursement, computed.reimbursement);
        assert_eq!(classified.net, computed.net);

        let recomputed = compute_transaction_lines(
            &cat,
            &attached,
            &subset(&cat, &[11]),
            ColumnSelection::payable(AmountColumn::TotalApprovedAmount),
        )
        .unwrap();
        assert_eq!(recomputed.source, LineSource::Computed);
        assert_ne!(recomputed.gross, computed.gross);
    }

    #[test]
    fn amount_column_parses_names() {
        assert_eq!(
            "total_amount_paid".parse::<AmountColumn>().unwrap(),
            AmountColumn::TotalAmountPaid
        );
        for column in AmountColumn::ALL {
            assert_eq!(column.as_str().parse::<AmountColumn>().unwrap(), column);
        }
        assert!("total".parse::<AmountColumn>().is_err());
    }

    #[test]
    fn overflowing_amounts_are_insufficient() {
        let cat = catalog(vec![
            JournalTypeRule {
                rate: Rate::new(dec!(7.5)),
                ..rule(10, "VAT", Decimal::ZERO)
            },
            rule(11, "WHT", dec!(5)),
        ]);
        let p = payment(PayeeKind::ThirdParty, Decimal::MAX, Decimal::MAX);
        let err = compute_transaction_lines(
            &cat,
            &p,
            &subset(&cat, &[10, 11]),
            ColumnSelection::default(),
        )
        .unwrap_err();
        assert_eq!(err, InsufficientInput::AmountOverflow);

        // Negative taxable amount pushes approved - taxable past the range.
        let p = payment(PayeeKind::Staff, Decimal::MAX, -Decimal::ONE);
        let err =
            compute_transaction_lines(&cat, &p, &subset(&cat, &[11]), ColumnSelection::default())
                .unwrap_err();
        assert_eq!(err, InsufficientInput::AmountOverflow);
    }
}

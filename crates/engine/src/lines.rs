//! Accounting transaction lines.
//!
//! [`LineBuilder`] is the only place lines are created. Every line gets a
//! fresh reference, so no two lines ever share one.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    ChartOfAccountId, Currency, Flag, JournalTypeRule, Money, NET_CODE, Payee, Payment, PaymentId,
    RuleId,
};

/// Posting direction of a single line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

/// Trail balance side of a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailBalance {
    Left,
    Right,
}

/// What a line stands for in the payment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Posting {
    /// Held pending settlement.
    Suspense,
    /// Owed to a third party or the payee.
    Expense,
    /// The full remitted amount.
    Remittance,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLine {
    pub reference: Uuid,
    pub journal_type_id: RuleId,
    pub payment_id: PaymentId,
    pub narration: String,
    #[serde(rename = "type")]
    pub side: Side,
    pub posting: Posting,
    pub amount: Money,
    pub currency: Currency,
    #[serde(default)]
    pub payment_method: Option<String>,
    pub trail_balance: TrailBalance,
    pub flag: Flag,
    #[serde(default)]
    pub chart_of_account_id: Option<ChartOfAccountId>,
    /// Set when the line is posted to the payee rather than the entity.
    #[serde(default)]
    pub beneficiary: Option<Payee>,
}

/// Parameters of one line.
#[derive(Clone, Copy, Debug)]
pub struct LineSpec<'r> {
    pub rule: &'r JournalTypeRule,
    pub amount: Money,
    pub side: Side,
    pub posting: Posting,
    pub trail_balance: TrailBalance,
    pub add_beneficiary: bool,
    pub flag: Option<Flag>,
    pub chart_of_account_id: Option<ChartOfAccountId>,
}

impl<'r> LineSpec<'r> {
    /// A line on the rule's own flag and ledger, without beneficiary.
    #[must_use]
    pub fn new(
        rule: &'r JournalTypeRule,
        amount: Money,
        side: Side,
        posting: Posting,
        trail_balance: TrailBalance,
    ) -> Self {
        Self {
            rule,
            amount,
            side,
            posting,
            trail_balance,
            add_beneficiary: false,
            flag: None,
            chart_of_account_id: None,
        }
    }

    /// Debit a suspense account (left side).
    #[must_use]
    pub fn suspense(rule: &'r JournalTypeRule, amount: Money) -> Self {
        Self::new(rule, amount, Side::Debit, Posting::Suspense, TrailBalance::Left)
    }

    /// Credit a payable account (right side).
    #[must_use]
    pub fn payable(rule: &'r JournalTypeRule, amount: Money) -> Self {
        Self::new(rule, amount, Side::Credit, Posting::Expense, TrailBalance::Right)
    }

    #[must_use]
    pub fn with_beneficiary(mut self, add: bool) -> Self {
        self.add_beneficiary = add;
        self
    }

    #[must_use]
    pub fn flag(mut self, flag: Flag) -> Self {
        self.flag = Some(flag);
        self
    }

    #[must_use]
    pub fn chart_of_account(mut self, id: ChartOfAccountId) -> Self {
        self.chart_of_account_id = Some(id);
        self
    }
}

/// Creates lines for one payment.
#[derive(Clone, Copy, Debug)]
pub struct LineBuilder<'p> {
    payment: &'p Payment,
}

impl<'p> LineBuilder<'p> {
    #[must_use]
    pub fn new(payment: &'p Payment) -> Self {
        Self { payment }
    }

    #[must_use]
    pub fn line(&self, spec: LineSpec<'_>) -> TransactionLine {
        let rule = spec.rule;
        TransactionLine {
            reference: Uuid::new_v4(),
            journal_type_id: rule.id,
            payment_id: self.payment.id,
            narration: narration(rule, spec.posting),
            side: spec.side,
            posting: spec.posting,
            amount: spec.amount,
            currency: self.payment.currency,
            payment_method: self.payment.payment_method.clone(),
            trail_balance: spec.trail_balance,
            flag: spec.flag.unwrap_or(rule.flag),
            chart_of_account_id: spec.chart_of_account_id.or(rule.chart_of_account_id),
            beneficiary: spec.add_beneficiary.then(|| self.payment.payee.clone()),
        }
    }
}

fn narration(rule: &JournalTypeRule, posting: Posting) -> String {
    match posting {
        Posting::Remittance => "Gross".to_string(),
        Posting::Suspense => format!("{} Suspense", rule.code),
        Posting::Expense if rule.is_code(NET_CODE) => format!("{} Payable", rule.code),
        Posting::Expense => rule.code.clone(),
    }
}

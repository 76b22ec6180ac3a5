//! Rule records held by a [`RuleCatalog`](crate::RuleCatalog).
//!
//! Every string-valued attribute of a rule is a closed enum here. Unknown
//! values are rejected when a snapshot is deserialized, except for
//! [`AllowanceLabel`], which keeps unrecognised labels as
//! [`AllowanceLabel::Other`] so that catalogs can carry entitlements this
//! engine doesn't select on.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{EngineError, Money, Rate, Rounding};

pub type RuleId = u64;
pub type CityId = u64;
pub type GradeLevelId = u64;
pub type RemunerationId = u64;
pub type ChartOfAccountId = u64;

/// Journal code of the gross remittance rule.
pub const GROSS_CODE: &str = "GRP";
/// Journal code of the value-added tax rule.
pub const VAT_CODE: &str = "VAT";
/// Journal code of the net pay rule.
pub const NET_CODE: &str = "NET";
/// Journal code of the reimbursement rule.
pub const REIMBURSEMENT_CODE: &str = "REIM";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    Flight,
    Road,
}

impl TravelMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flight => "flight",
            Self::Road => "road",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Route {
    OneWay,
    Return,
}

/// Mode half of a [`Component`] key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModeKey {
    Flight,
    Road,
    Both,
}

/// Residency half of a [`Component`] key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResidencyKey {
    Resident,
    NonResident,
    Both,
}

/// Mode × residency compatibility key of an allowance rule, written
/// `{mode}-{residency}` (e.g. `road-resident`, `flight-non-resident`,
/// `both-both`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Component {
    pub mode: ModeKey,
    pub residency: ResidencyKey,
}

impl Component {
    #[must_use]
    pub const fn new(mode: ModeKey, residency: ResidencyKey) -> Self {
        Self { mode, residency }
    }

    /// `true` when the key is one of `{mode}-{residency}`, `{mode}-both`,
    /// `both-{residency}` or `both-both` for the given trip.
    #[must_use]
    pub fn admits(self, mode: TravelMode, is_resident: bool) -> bool {
        let mode_ok = match (self.mode, mode) {
            (ModeKey::Both, _) => true,
            (ModeKey::Flight, TravelMode::Flight) | (ModeKey::Road, TravelMode::Road) => true,
            _ => false,
        };
        let residency_ok = match self.residency {
            ResidencyKey::Both => true,
            ResidencyKey::Resident => is_resident,
            ResidencyKey::NonResident => !is_resident,
        };
        mode_ok && residency_ok
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            ModeKey::Flight => "flight",
            ModeKey::Road => "road",
            ModeKey::Both => "both",
        };
        let residency = match self.residency {
            ResidencyKey::Resident => "resident",
            ResidencyKey::NonResident => "non-resident",
            ResidencyKey::Both => "both",
        };
        write!(f, "{mode}-{residency}")
    }
}

impl FromStr for Component {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::tag("component", s);
        let (mode, residency) = s.trim().split_once('-').ok_or_else(invalid)?;
        let mode = match mode {
            "flight" => ModeKey::Flight,
            "road" => ModeKey::Road,
            "both" => ModeKey::Both,
            _ => return Err(invalid()),
        };
        let residency = match residency {
            "resident" => ResidencyKey::Resident,
            "non-resident" => ResidencyKey::NonResident,
            "both" => ResidencyKey::Both,
            _ => return Err(invalid()),
        };
        Ok(Self { mode, residency })
    }
}

impl TryFrom<String> for Component {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Component> for String {
    fn from(value: Component) -> Self {
        value.to_string()
    }
}

/// Semantic kind of an allowance rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllowanceLabel {
    AirportShuttle,
    InterStateShuttle,
    FlightFare,
    OutOfPocketAllowance,
    Accommodation,
    PerDiem,
    Intracity,
    #[serde(other)]
    Other,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentBasis {
    Km,
    #[default]
    Flat,
}

/// A configurable entitlement (shuttle, per-diem, flight fare, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceRule {
    pub id: RuleId,
    pub name: String,
    pub component: Component,
    pub label: AllowanceLabel,
    #[serde(default)]
    pub departure_city_id: Option<CityId>,
    #[serde(default)]
    pub destination_city_id: Option<CityId>,
    #[serde(default)]
    pub payment_basis: PaymentBasis,
    #[serde(default)]
    pub parent_id: Option<RuleId>,
}

impl AllowanceRule {
    /// A rule bound to neither a departure nor a destination city.
    #[must_use]
    pub fn is_generic(&self) -> bool {
        self.departure_city_id.is_none() && self.destination_city_id.is_none()
    }

    #[must_use]
    pub fn serves(&self, departure: CityId, destination: CityId) -> bool {
        self.departure_city_id == Some(departure) && self.destination_city_id == Some(destination)
    }
}

/// City lookup row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub id: CityId,
    pub name: String,
    /// Accommodation allowance paid to non-residents travelling here.
    #[serde(default)]
    pub allowance_id: Option<RuleId>,
}

/// Amount payable for an allowance at a grade level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemunerationRate {
    pub id: RemunerationId,
    pub allowance_id: RuleId,
    pub grade_level_id: GradeLevelId,
    pub amount: Money,
    #[serde(default)]
    pub currency: crate::Currency,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalKind {
    Add,
    Deduct,
    Info,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseSelector {
    #[serde(rename = "GROSS")]
    Gross,
    #[default]
    #[serde(rename = "TAXABLE")]
    Taxable,
    #[serde(rename = "NON-TAXABLE")]
    NonTaxable,
    #[serde(rename = "CUSTOM")]
    Custom,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateType {
    #[default]
    Percent,
    Fixed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleState {
    Fixed,
    Optional,
}

/// Posting direction(s) a journal rule produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Credit,
    Debit,
    Both,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleContext {
    Tax,
    Stamp,
    Commission,
    Holding,
    Gross,
    Net,
    Reimbursement,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Benefactor {
    Beneficiary,
    Entity,
}

/// Downstream posting-routing hint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flag {
    Payable,
    Ledger,
    Retire,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Deductible {
    Total,
    Taxable,
    NonTaxable,
}

/// A configurable accounting rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalTypeRule {
    pub id: RuleId,
    pub code: String,
    pub kind: JournalKind,
    #[serde(default)]
    pub base_selector: BaseSelector,
    #[serde(default)]
    pub rate: Rate,
    #[serde(default)]
    pub rate_type: RateType,
    #[serde(default)]
    pub tax_rate: Rate,
    #[serde(default)]
    pub precedence: u32,
    #[serde(default)]
    pub rounding: Rounding,
    pub state: RuleState,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub context: RuleContext,
    pub benefactor: Benefactor,
    pub flag: Flag,
    pub deductible: Deductible,
    #[serde(default)]
    pub chart_of_account_id: Option<ChartOfAccountId>,
}

impl JournalTypeRule {
    #[must_use]
    pub fn is_code(&self, code: &str) -> bool {
        self.code.eq_ignore_ascii_case(code)
    }
}

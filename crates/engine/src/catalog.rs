//! Read-only rule catalog.
//!
//! A [`RuleCatalog`] is built once from a [`CatalogSnapshot`] supplied by an
//! external data source and never mutated afterwards. Construction checks the
//! singleton journal codes so the pipelines can look them up by code.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    AllowanceRule, City, CityId, EngineError, GROSS_CODE, JournalTypeRule, NET_CODE,
    REIMBURSEMENT_CODE, RuleId, VAT_CODE,
};

/// Raw catalog contents as delivered by the data source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub allowances: Vec<AllowanceRule>,
    #[serde(default)]
    pub journal_types: Vec<JournalTypeRule>,
    #[serde(default)]
    pub cities: Vec<City>,
}

#[derive(Clone, Debug)]
pub struct RuleCatalog {
    allowances: Vec<AllowanceRule>,
    journal_types: Vec<JournalTypeRule>,
    cities: Vec<City>,
    journal_index: HashMap<RuleId, usize>,
    gross: Option<usize>,
    vat: Option<usize>,
    net: Option<usize>,
    reimbursement: Option<usize>,
}

impl RuleCatalog {
    /// Validate a snapshot and index it.
    ///
    /// Fails when a singleton code (`GRP`, `VAT`, `NET`, `REIM`) or a journal
    /// rule id appears more than once.
    pub fn new(snapshot: CatalogSnapshot) -> Result<Self, EngineError> {
        let CatalogSnapshot {
            allowances,
            journal_types,
            cities,
        } = snapshot;

        let mut journal_index = HashMap::with_capacity(journal_types.len());
        for (pos, rule) in journal_types.iter().enumerate() {
            if journal_index.insert(rule.id, pos).is_some() {
                return Err(EngineError::InvalidCatalog(format!(
                    "journal type id {} appears more than once",
                    rule.id
                )));
            }
        }

        let singleton = |code: &str| -> Result<Option<usize>, EngineError> {
            let mut found = journal_types
                .iter()
                .enumerate()
                .filter(|(_, r)| r.is_code(code))
                .map(|(pos, _)| pos);
            let first = found.next();
            if found.next().is_some() {
                return Err(EngineError::InvalidCatalog(format!(
                    "journal code {code} must be unique"
                )));
            }
            Ok(first)
        };

        let gross = singleton(GROSS_CODE)?;
        let vat = singleton(VAT_CODE)?;
        let net = singleton(NET_CODE)?;
        let reimbursement = singleton(REIMBURSEMENT_CODE)?;

        Ok(Self {
            allowances,
            journal_types,
            cities,
            journal_index,
            gross,
            vat,
            net,
            reimbursement,
        })
    }

    /// A catalog without any rule or city.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            allowances: Vec::new(),
            journal_types: Vec::new(),
            cities: Vec::new(),
            journal_index: HashMap::new(),
            gross: None,
            vat: None,
            net: None,
            reimbursement: None,
        }
    }

    #[must_use]
    pub fn allowances(&self) -> &[AllowanceRule] {
        &self.allowances
    }

    #[must_use]
    pub fn journal_types(&self) -> &[JournalTypeRule] {
        &self.journal_types
    }

    #[must_use]
    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    #[must_use]
    pub fn city(&self, id: CityId) -> Option<&City> {
        self.cities.iter().find(|c| c.id == id)
    }

    #[must_use]
    pub fn allowance(&self, id: RuleId) -> Option<&AllowanceRule> {
        self.allowances.iter().find(|a| a.id == id)
    }

    #[must_use]
    pub fn journal_type(&self, id: RuleId) -> Option<&JournalTypeRule> {
        self.journal_index.get(&id).map(|pos| &self.journal_types[*pos])
    }

    /// The `GRP` rule.
    #[must_use]
    pub fn gross(&self) -> Option<&JournalTypeRule> {
        self.gross.map(|pos| &self.journal_types[pos])
    }

    /// The `VAT` rule.
    #[must_use]
    pub fn vat(&self) -> Option<&JournalTypeRule> {
        self.vat.map(|pos| &self.journal_types[pos])
    }

    /// The `NET` rule.
    #[must_use]
    pub fn net(&self) -> Option<&JournalTypeRule> {
        self.net.map(|pos| &self.journal_types[pos])
    }

    /// The `REIM` rule.
    #[must_use]
    pub fn reimbursement(&self) -> Option<&JournalTypeRule> {
        self.reimbursement.map(|pos| &self.journal_types[pos])
    }
}

impl TryFrom<CatalogSnapshot> for RuleCatalog {
    type Error = EngineError;

    fn try_from(value: CatalogSnapshot) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::CoreError;

/// Semantic fields the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    TransactionDate,
    Symbol,
    Action,
    Quantity,
    Price,
    NetAmount,
    /// Optional: absent means a single implicit account
    Account,
    /// Optional: absent means every row is a candidate trade
    ActivityType,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 8] = [
        CanonicalField::TransactionDate,
        CanonicalField::Symbol,
        CanonicalField::Action,
        CanonicalField::Quantity,
        CanonicalField::Price,
        CanonicalField::NetAmount,
        CanonicalField::Account,
        CanonicalField::ActivityType,
    ];

    pub fn is_required(&self) -> bool {
        !matches!(self, CanonicalField::Account | CanonicalField::ActivityType)
    }

    /// Canonical snake_case name, also the preferred header label.
    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::TransactionDate => "transaction_date",
            CanonicalField::Symbol => "symbol",
            CanonicalField::Action => "action",
            CanonicalField::Quantity => "quantity",
            CanonicalField::Price => "price",
            CanonicalField::NetAmount => "net_amount",
            CanonicalField::Account => "account",
            CanonicalField::ActivityType => "activity_type",
        }
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for CanonicalField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "transaction_date" | "date" => Ok(CanonicalField::TransactionDate),
            "symbol" => Ok(CanonicalField::Symbol),
            "action" => Ok(CanonicalField::Action),
            "quantity" | "qty" => Ok(CanonicalField::Quantity),
            "price" => Ok(CanonicalField::Price),
            "net_amount" | "amount" => Ok(CanonicalField::NetAmount),
            "account" => Ok(CanonicalField::Account),
            "activity_type" | "activity" => Ok(CanonicalField::ActivityType),
            _ => Err(CoreError::Validation(format!("Unknown field '{s}'"))),
        }
    }
}

/// Explicit canonical field → source column assignment.
///
/// Column names refer to the *normalized* header labels. This is the only
/// schema input the core pipeline consumes; how it was produced (automatic
/// resolution, user picks, or both) is the caller's business.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    columns: BTreeMap<CanonicalField, String>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign (or override) the source column for a field.
    pub fn set(&mut self, field: CanonicalField, column: impl Into<String>) -> &mut Self {
        self.columns.insert(field, column.into());
        self
    }

    /// Builder-style variant of [`ColumnMapping::set`].
    pub fn with(mut self, field: CanonicalField, column: impl Into<String>) -> Self {
        self.set(field, column);
        self
    }

    pub fn remove(&mut self, field: CanonicalField) -> Option<String> {
        self.columns.remove(&field)
    }

    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.columns.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.columns.contains_key(&field)
    }

    /// Required fields with no assigned column.
    pub fn missing_required(&self) -> Vec<CanonicalField> {
        CanonicalField::ALL
            .into_iter()
            .filter(|f| f.is_required() && !self.contains(*f))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, &str)> {
        self.columns.iter().map(|(f, c)| (*f, c.as_str()))
    }
}

/// Outcome of automatic header matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnResolution {
    /// Fields that resolved to exactly one column
    pub mapping: ColumnMapping,

    /// Fields with several plausible columns; the user has to pick one
    pub ambiguous: BTreeMap<CanonicalField, Vec<String>>,

    /// Fields with no plausible column at all
    pub missing: Vec<CanonicalField>,
}

impl ColumnResolution {
    /// True when every required field resolved to a single column.
    pub fn is_complete(&self) -> bool {
        self.mapping.missing_required().is_empty()
    }

    /// Required fields the user must still map by hand.
    pub fn unresolved_required(&self) -> Vec<CanonicalField> {
        self.mapping.missing_required()
    }

    /// Accept the automatic mapping, failing if a required field is unresolved.
    pub fn into_mapping(self) -> Result<ColumnMapping, CoreError> {
        let unresolved = self.mapping.missing_required();
        if unresolved.is_empty() {
            return Ok(self.mapping);
        }

        let details: Vec<String> = unresolved
            .iter()
            .map(|field| match self.ambiguous.get(field) {
                Some(candidates) => format!("{field} (ambiguous: {})", candidates.join(", ")),
                None => format!("{field} (no matching column)"),
            })
            .collect();
        Err(CoreError::Schema(format!(
            "Cannot resolve required fields: {}",
            details.join("; ")
        )))
    }
}

use std::collections::HashSet;

use tracing::debug;

use crate::models::mapping::{CanonicalField, ColumnResolution};
use crate::models::table::RawTable;

/// Header-matching rule for one canonical field.
struct FieldRule {
    field: CanonicalField,
    /// Exact labels, in priority order
    synonyms: &'static [&'static str],
    /// Fallback substring
    keyword: &'static str,
}

const RULES: &[FieldRule] = &[
    FieldRule {
        field: CanonicalField::TransactionDate,
        synonyms: &["transaction_date", "trade_date", "date", "activity_date", "run_date"],
        keyword: "date",
    },
    FieldRule {
        field: CanonicalField::Symbol,
        synonyms: &["symbol", "ticker", "instrument"],
        keyword: "symbol",
    },
    FieldRule {
        field: CanonicalField::Action,
        synonyms: &["action", "side", "buy_sell", "transaction_type"],
        keyword: "action",
    },
    FieldRule {
        field: CanonicalField::Quantity,
        synonyms: &["quantity", "qty", "shares", "units"],
        keyword: "quantity",
    },
    FieldRule {
        field: CanonicalField::Price,
        synonyms: &["price", "trade_price", "fill_price", "execution_price"],
        keyword: "price",
    },
    FieldRule {
        field: CanonicalField::NetAmount,
        synonyms: &["net_amount", "amount", "net", "net_proceeds"],
        keyword: "amount",
    },
    FieldRule {
        field: CanonicalField::Account,
        synonyms: &["account_#", "account", "account_number", "account_id"],
        keyword: "account",
    },
    FieldRule {
        field: CanonicalField::ActivityType,
        synonyms: &["activity_type", "activity", "record_type"],
        keyword: "activity",
    },
];

/// Guesses column roles from normalized header labels.
///
/// Two passes: exact synonyms for every field first, then a substring
/// match over the columns nobody claimed. A field with several substring
/// hits is reported as ambiguous instead of picking one silently.
pub struct ColumnResolver;

impl ColumnResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve against a table whose labels are already normalized.
    pub fn resolve(&self, table: &RawTable) -> ColumnResolution {
        let mut resolution = ColumnResolution::default();
        let mut claimed: HashSet<&str> = HashSet::new();
        let mut pending = Vec::new();

        // Pass 1: exact synonyms
        for rule in RULES {
            let hit = rule
                .synonyms
                .iter()
                .find(|s| !table.column_positions(s).is_empty());
            match hit {
                Some(label) if table.column_positions(label).len() == 1 => {
                    resolution.mapping.set(rule.field, *label);
                    claimed.insert(*label);
                }
                Some(label) => {
                    // Same label twice after normalization
                    let copies = table.column_positions(label).len();
                    resolution
                        .ambiguous
                        .insert(rule.field, vec![label.to_string(); copies]);
                    claimed.insert(*label);
                }
                None => pending.push(rule),
            }
        }

        // Pass 2: keyword substring over unclaimed columns
        for rule in pending {
            let candidates: Vec<&str> = table
                .columns
                .iter()
                .map(String::as_str)
                .filter(|c| !claimed.contains(c) && c.contains(rule.keyword))
                .collect();

            match candidates.as_slice() {
                [] => resolution.missing.push(rule.field),
                [column] => {
                    resolution.mapping.set(rule.field, *column);
                    claimed.insert(*column);
                }
                _ => {
                    let names = candidates.iter().map(|c| c.to_string()).collect();
                    resolution.ambiguous.insert(rule.field, names);
                }
            }
        }

        debug!(
            resolved = resolution.mapping.iter().count(),
            ambiguous = resolution.ambiguous.len(),
            missing = resolution.missing.len(),
            "Resolved column roles"
        );
        resolution
    }
}

impl Default for ColumnResolver {
    fn default() -> Self {
        Self::new()
    }
}

//! Entity types and the per-session intelligence set.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of intelligence an entity carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Phone,
    BankAccount,
    PaymentHandle,
    Url,
    Email,
    /// Free-form `label: value` intelligence that fits no fixed type.
    OtherLabeled,
}

impl EntityType {
    /// Every fixed type, in report order.
    pub const ALL: [EntityType; 6] = [
        EntityType::Phone,
        EntityType::BankAccount,
        EntityType::PaymentHandle,
        EntityType::Url,
        EntityType::Email,
        EntityType::OtherLabeled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::BankAccount => "bank_account",
            Self::PaymentHandle => "payment_handle",
            Self::Url => "url",
            Self::Email => "email",
            Self::OtherLabeled => "other_labeled",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    /// Accepts the canonical names plus the aliases oracles tend to emit.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "phone" | "phone_number" | "mobile" | "phonenumber" => Ok(Self::Phone),
            "bank_account" | "bank" | "account" | "account_number" | "bankaccount" => {
                Ok(Self::BankAccount)
            }
            "payment_handle" | "upi" | "upi_id" | "vpa" | "upiid" => Ok(Self::PaymentHandle),
            "url" | "link" | "phishing_link" | "website" => Ok(Self::Url),
            "email" | "email_address" | "mail" => Ok(Self::Email),
            "other_labeled" | "other" => Ok(Self::OtherLabeled),
            other => Err(format!("unknown entity type: '{other}'")),
        }
    }
}

/// Where a candidate entity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityOrigin {
    Deterministic,
    Oracle,
}

/// One candidate piece of intelligence.
///
/// Built unvalidated by extractors; `validate::validate` fills in
/// `normalized_value` and flips `accepted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub entity_type: EntityType,
    pub raw_value: String,
    /// Only meaningful for `OtherLabeled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_value: Option<String>,
    pub origin: EntityOrigin,
    #[serde(default)]
    pub accepted: bool,
}

impl ExtractedEntity {
    /// Create an unvalidated candidate.
    pub fn candidate(
        entity_type: EntityType,
        raw_value: impl Into<String>,
        origin: EntityOrigin,
    ) -> Self {
        Self {
            entity_type,
            raw_value: raw_value.into(),
            label: None,
            normalized_value: None,
            origin,
            accepted: false,
        }
    }

    /// Create an unvalidated `OtherLabeled` candidate.
    pub fn labeled(
        label: impl Into<String>,
        raw_value: impl Into<String>,
        origin: EntityOrigin,
    ) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::candidate(EntityType::OtherLabeled, raw_value, origin)
        }
    }
}

/// Canonical deduplicated intelligence for one session.
///
/// Append-only: there is no removal API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Intelligence {
    entries: BTreeMap<EntityType, BTreeSet<String>>,
}

impl Intelligence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a normalized value. Returns true if the set grew.
    pub fn insert(&mut self, entity_type: EntityType, normalized: impl Into<String>) -> bool {
        self.entries
            .entry(entity_type)
            .or_default()
            .insert(normalized.into())
    }

    pub fn contains(&self, entity_type: EntityType, normalized: &str) -> bool {
        self.entries
            .get(&entity_type)
            .is_some_and(|set| set.contains(normalized))
    }

    pub fn has_type(&self, entity_type: EntityType) -> bool {
        self.count(entity_type) > 0
    }

    pub fn count(&self, entity_type: EntityType) -> usize {
        self.entries.get(&entity_type).map_or(0, BTreeSet::len)
    }

    pub fn total(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Types that hold at least one value.
    pub fn present_types(&self) -> Vec<EntityType> {
        EntityType::ALL
            .into_iter()
            .filter(|t| self.has_type(*t))
            .collect()
    }

    /// True if every value in `other` is also in `self`.
    pub fn is_superset_of(&self, other: &Intelligence) -> bool {
        other.entries.iter().all(|(t, values)| {
            values.is_empty()
                || self
                    .entries
                    .get(t)
                    .is_some_and(|mine| mine.is_superset(values))
        })
    }

    /// Set union in place. Returns the number of newly added values.
    pub fn union_with(&mut self, other: &Intelligence) -> usize {
        let mut added = 0;
        for (t, values) in &other.entries {
            for v in values {
                if self.insert(*t, v.clone()) {
                    added += 1;
                }
            }
        }
        added
    }

    /// Plain map view for callers, types with no values omitted.
    pub fn to_map(&self) -> BTreeMap<EntityType, Vec<String>> {
        self.entries
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(t, values)| (*t, values.iter().cloned().collect()))
            .collect()
    }
}

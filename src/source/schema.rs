//! Closed set of document metadata schemas.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Metadata shape of a document, selected by its source collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVariant {
    Contracts,
    Invoices,
    Personnel,
    Legal,
    Policies,
    Correspondence,
    Engineering,
}

impl SchemaVariant {
    pub const ALL: [SchemaVariant; 7] = [
        Self::Contracts,
        Self::Invoices,
        Self::Personnel,
        Self::Legal,
        Self::Policies,
        Self::Correspondence,
        Self::Engineering,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contracts => "contracts",
            Self::Invoices => "invoices",
            Self::Personnel => "personnel",
            Self::Legal => "legal",
            Self::Policies => "policies",
            Self::Correspondence => "correspondence",
            Self::Engineering => "engineering",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "contracts" => Some(Self::Contracts),
            "invoices" => Some(Self::Invoices),
            "personnel" => Some(Self::Personnel),
            "legal" => Some(Self::Legal),
            "policies" => Some(Self::Policies),
            "correspondence" => Some(Self::Correspondence),
            "engineering" => Some(Self::Engineering),
            _ => None,
        }
    }
}

impl fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

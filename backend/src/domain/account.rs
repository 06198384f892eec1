//! Accounts, enterprises and the per-enterprise storm settings.
//!
//! These are read models owned by external collaborators (onboarding,
//! contract billing, authentication). The storm core only consumes them.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Bandrate;

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw identifier.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Raw identifier value.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

pub(crate) use integer_id;

integer_id! {
    /// Identifier of an [`Account`].
    AccountId
}

integer_id! {
    /// Identifier of an [`Enterprise`].
    EnterpriseId
}

/// Capability held by an account inside its enterprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May administer storm accounts for the whole enterprise.
    Owner,
    /// Any other member.
    General,
}

impl Role {
    /// Single predicate for the owner capability.
    #[must_use]
    pub fn is_owner(self) -> bool {
        matches!(self, Self::Owner)
    }

    /// Parse the persisted role label; unknown labels carry no capability.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "owner" => Self::Owner,
            _ => Self::General,
        }
    }

    /// Persisted role label.
    #[must_use]
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::General => "general",
        }
    }
}

/// A member account of exactly one enterprise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub enterprise_id: EnterpriseId,
    pub role: Role,
}

/// Storm feature flag and default bandrate for one enterprise.
///
/// Explicit value object instead of a nested settings map; merging partial
/// overrides is the settings collaborator's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StormSettings {
    pub storm_enabled: bool,
    pub default_bandrate: Bandrate,
}

impl Default for StormSettings {
    fn default() -> Self {
        Self {
            storm_enabled: false,
            default_bandrate: Bandrate::ZERO,
        }
    }
}

/// Enterprise quota and storm state.
///
/// ## Invariants
/// - `registered_storm_accounts` equals the number of storm accounts owned by
///   the enterprise's members whenever no mutation is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enterprise {
    pub id: EnterpriseId,
    pub settings: StormSettings,
    pub max_storm_accounts: u32,
    pub registered_storm_accounts: u32,
}

impl Enterprise {
    /// Whether another storm account fits in the quota.
    #[must_use]
    pub fn has_storm_capacity(&self) -> bool {
        self.registered_storm_accounts < self.max_storm_accounts
    }
}

//! Storm tier entities: servers, storm accounts and bandrates.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::account::integer_id;
use super::{AccountId, EnterpriseId};

/// Integer bandwidth allocation of a storm account.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use storm_backend::domain::Bandrate;
///
/// assert_eq!(Bandrate::from_json(&json!(100)).map(Bandrate::get), Ok(100));
/// assert!(Bandrate::from_json(&json!("100")).is_err());
/// assert!(Bandrate::from_json(&json!(1.5)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bandrate(u64);

/// Reasons a raw JSON value is not a bandrate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BandrateError {
    /// The field was not supplied.
    #[error("bandrate is required")]
    Missing,
    /// The value is not an integer (string, float, bool, ...).
    #[error("bandrate must be an integer, got {found}")]
    NotInteger { found: String },
    /// The value is a negative integer.
    #[error("bandrate must not be negative")]
    Negative,
    /// The value does not fit the registry's signed 64-bit column.
    #[error("bandrate must not exceed {max}")]
    TooLarge { max: u64 },
}

impl Bandrate {
    /// A zero allocation.
    pub const ZERO: Self = Self(0);

    /// Largest allocation the registry can store.
    pub const MAX: Self = Self(i64::MAX.unsigned_abs());

    /// Wrap a raw allocation.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw allocation value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Validate an untyped request field.
    ///
    /// Numeric strings and floats are rejected even when they denote an
    /// integral value.
    pub fn from_json(value: &Value) -> Result<Self, BandrateError> {
        match value {
            Value::Null => Err(BandrateError::Missing),
            Value::Number(number) if number.is_u64() => match number.as_u64() {
                Some(raw) if raw <= Self::MAX.0 => Ok(Self(raw)),
                Some(_) => Err(BandrateError::TooLarge { max: Self::MAX.0 }),
                None => Err(BandrateError::Negative),
            },
            Value::Number(number) if number.is_i64() => Err(BandrateError::Negative),
            other => Err(BandrateError::NotInteger {
                found: json_kind(other).to_owned(),
            }),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl fmt::Display for Bandrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

integer_id! {
    /// Identifier of a [`StormServer`].
    StormServerId
}

integer_id! {
    /// Identifier of a [`StormAccount`].
    StormAccountId
}

/// A remote storm server and the staging root it shares with this service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StormServer {
    pub id: StormServerId,
    /// Base URL of the provisioning API.
    pub endpoint: url::Url,
    /// Directory holding content mid-transfer.
    pub staging_root: PathBuf,
}

/// Opaque identifier the remote service assigned to a storm user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteUserId(String);

impl RemoteUserId {
    /// Wrap a remote identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Accept the identifier in whatever JSON shape the remote returned it.
    ///
    /// The remote service answers with either a number or a string.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => Some(Self(number.to_string())),
            Value::String(text) if !text.trim().is_empty() => Some(Self(text.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RemoteUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Login name of a storm user, used by the remote service in callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StormUserName(String);

impl StormUserName {
    /// Derive the name for the storm user owned by `account_id`.
    #[must_use]
    pub fn for_account(account_id: AccountId) -> Self {
        Self(format!("acct-{account_id}"))
    }

    /// Parse a name supplied by a caller; blank names are rejected.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_owned()))
    }

    /// Borrow the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StormUserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry row mapping an account to its remote storm identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StormAccount {
    pub id: StormAccountId,
    pub account_id: AccountId,
    pub enterprise_id: EnterpriseId,
    pub storm_server_id: StormServerId,
    pub remote_user_id: RemoteUserId,
    pub name: StormUserName,
    pub bandrate: Bandrate,
}

/// A storm account that has been provisioned remotely but not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStormAccount {
    pub account_id: AccountId,
    pub enterprise_id: EnterpriseId,
    pub storm_server_id: StormServerId,
    pub remote_user_id: RemoteUserId,
    pub name: StormUserName,
    pub bandrate: Bandrate,
}

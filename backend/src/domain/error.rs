//! Domain-level error types.
//!
//! These errors are transport agnostic. Inbound adapters map them to HTTP
//! responses carrying the stable machine-readable `code`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TraceId;

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request is malformed or fails validation.
    InvalidRequest,
    /// Authentication failed or is missing.
    Unauthorized,
    /// The target account does not exist.
    AccountNotFound,
    /// The requester may not act on the target account.
    UnpermittedAccount,
    /// The enterprise has not enabled the storm tier.
    UnpermittedEnterprise,
    /// The enterprise storm account quota is exhausted.
    StormUserCountReached,
    /// The target account already owns a storm account.
    AlreadyExists,
    /// The supplied bandrate is not a non-negative integer.
    InvalidBandrate,
    /// The target account owns no storm account.
    StormUserNotFound,
    /// The remote service refused to create the storm user.
    CreateStormUserError,
    /// The remote service refused to destroy the storm user.
    DestroyStormUserError,
    /// The remote service refused to update the storm user.
    UpdateStormUserError,
    /// The remote service refused the bulk bandrate update.
    BulkUpdateStormUsersError,
    /// The remote service refused a transfer request.
    MoveToStormError,
    /// No storm user carries the supplied name.
    UserNotFound,
    /// The job id is blank or cannot be decoded.
    InvalidJid,
    /// The entry name is blank or not a single path component.
    InvalidName,
    /// The staging path is blank or escapes the staging root.
    InvalidPath,
    /// The callback action is unknown or does not match the job.
    InvalidAction,
    /// No pending transfer job carries the supplied id.
    JobNotFound,
    /// The content to move no longer exists.
    TransferSourceNotFound,
    /// The transfer destination is missing or has the wrong kind.
    TransferDestinationNotFound,
    /// The remote service reported a transfer failure.
    StormServerError,
    /// A dependency is temporarily unavailable.
    ServiceUnavailable,
    /// An unexpected error occurred inside the domain.
    InternalError,
}

impl ErrorCode {
    /// Whether the failure originates from a refused remote call.
    pub fn is_remote(self) -> bool {
        matches!(
            self,
            Self::CreateStormUserError
                | Self::DestroyStormUserError
                | Self::UpdateStormUserError
                | Self::BulkUpdateStormUsersError
                | Self::MoveToStormError
        )
    }
}

/// Domain error payload.
///
/// ## Invariants
/// - `message` must be non-empty once trimmed when built through
///   [`Error::try_new`] or deserialised.
///
/// # Examples
/// ```
/// use storm_backend::domain::{Error, ErrorCode};
///
/// let err = Error::account_not_found("account 7 does not exist");
/// assert_eq!(err.code(), ErrorCode::AccountNotFound);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ErrorDto", into = "ErrorDto")]
pub struct Error {
    code: ErrorCode,
    message: String,
    trace_id: Option<String>,
    details: Option<Value>,
}

/// Validation errors emitted by the fallible constructors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorValidationError {
    /// The message is blank.
    #[error("error message must not be empty")]
    EmptyMessage,
    /// The trace identifier is blank.
    #[error("trace identifier must not be empty")]
    EmptyTraceId,
}

macro_rules! code_constructors {
    ($($(#[$meta:meta])* $name:ident => $code:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            pub fn $name(message: impl Into<String>) -> Self {
                Self::new(ErrorCode::$code, message)
            }
        )*
    };
}

impl Error {
    /// Create a new error, capturing the in-scope trace identifier.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            trace_id: TraceId::current().map(|id| id.to_string()),
            details: None,
        }
    }

    /// Fallible constructor that validates the message content.
    pub fn try_new(
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Result<Self, ErrorValidationError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(ErrorValidationError::EmptyMessage);
        }
        Ok(Self::new(code, message))
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message returned to adapters.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Correlation identifier captured when the error was raised.
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Supplementary error details for adapters.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Attach a trace identifier to the error.
    pub fn with_trace_id(mut self, id: impl Into<String>) -> Self {
        self.trace_id = Some(id.into());
        self
    }

    /// Attach a trace identifier, rejecting blank values.
    pub fn try_with_trace_id(self, id: impl Into<String>) -> Result<Self, ErrorValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ErrorValidationError::EmptyTraceId);
        }
        Ok(self.with_trace_id(id))
    }

    /// Attach structured details to the error.
    ///
    /// # Examples
    /// ```
    /// use storm_backend::domain::Error;
    /// use serde_json::json;
    ///
    /// let err = Error::storm_server_error("transfer failed")
    ///     .with_details(json!({ "remote_error": "disk full" }));
    /// assert!(err.details().is_some());
    /// ```
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    code_constructors! {
        /// Convenience constructor for [`ErrorCode::InvalidRequest`].
        invalid_request => InvalidRequest,
        /// Convenience constructor for [`ErrorCode::Unauthorized`].
        unauthorized => Unauthorized,
        /// Convenience constructor for [`ErrorCode::AccountNotFound`].
        account_not_found => AccountNotFound,
        /// Convenience constructor for [`ErrorCode::UnpermittedAccount`].
        unpermitted_account => UnpermittedAccount,
        /// Convenience constructor for [`ErrorCode::UnpermittedEnterprise`].
        unpermitted_enterprise => UnpermittedEnterprise,
        /// Convenience constructor for [`ErrorCode::StormUserCountReached`].
        storm_user_count_reached => StormUserCountReached,
        /// Convenience constructor for [`ErrorCode::AlreadyExists`].
        already_exists => AlreadyExists,
        /// Convenience constructor for [`ErrorCode::InvalidBandrate`].
        invalid_bandrate => InvalidBandrate,
        /// Convenience constructor for [`ErrorCode::StormUserNotFound`].
        storm_user_not_found => StormUserNotFound,
        /// Convenience constructor for [`ErrorCode::CreateStormUserError`].
        create_storm_user_error => CreateStormUserError,
        /// Convenience constructor for [`ErrorCode::DestroyStormUserError`].
        destroy_storm_user_error => DestroyStormUserError,
        /// Convenience constructor for [`ErrorCode::UpdateStormUserError`].
        update_storm_user_error => UpdateStormUserError,
        /// Convenience constructor for [`ErrorCode::BulkUpdateStormUsersError`].
        bulk_update_storm_users_error => BulkUpdateStormUsersError,
        /// Convenience constructor for [`ErrorCode::MoveToStormError`].
        move_to_storm_error => MoveToStormError,
        /// Convenience constructor for [`ErrorCode::UserNotFound`].
        user_not_found => UserNotFound,
        /// Convenience constructor for [`ErrorCode::InvalidJid`].
        invalid_jid => InvalidJid,
        /// Convenience constructor for [`ErrorCode::InvalidName`].
        invalid_name => InvalidName,
        /// Convenience constructor for [`ErrorCode::InvalidPath`].
        invalid_path => InvalidPath,
        /// Convenience constructor for [`ErrorCode::InvalidAction`].
        invalid_action => InvalidAction,
        /// Convenience constructor for [`ErrorCode::JobNotFound`].
        job_not_found => JobNotFound,
        /// Convenience constructor for [`ErrorCode::TransferSourceNotFound`].
        transfer_source_not_found => TransferSourceNotFound,
        /// Convenience constructor for [`ErrorCode::TransferDestinationNotFound`].
        transfer_destination_not_found => TransferDestinationNotFound,
        /// Convenience constructor for [`ErrorCode::StormServerError`].
        storm_server_error => StormServerError,
        /// Convenience constructor for [`ErrorCode::ServiceUnavailable`].
        service_unavailable => ServiceUnavailable,
        /// Convenience constructor for [`ErrorCode::InternalError`].
        internal => InternalError,
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ErrorDto {
    code: ErrorCode,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl From<Error> for ErrorDto {
    fn from(value: Error) -> Self {
        Self {
            code: value.code,
            message: value.message,
            trace_id: value.trace_id,
            details: value.details,
        }
    }
}

impl TryFrom<ErrorDto> for Error {
    type Error = ErrorValidationError;

    fn try_from(value: ErrorDto) -> Result<Self, Self::Error> {
        let ErrorDto {
            code,
            message,
            trace_id,
            details,
        } = value;

        if message.trim().is_empty() {
            return Err(ErrorValidationError::EmptyMessage);
        }
        if trace_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(ErrorValidationError::EmptyTraceId);
        }
        Ok(Self {
            code,
            message,
            trace_id,
            details,
        })
    }
}

#[cfg(test)]
mod tests;

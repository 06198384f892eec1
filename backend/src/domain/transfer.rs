//! Transfer jobs moving content between the primary tier and the storm tier.
//!
//! A primary-tier resource is addressed by a [`ResourceId`]: the URL-safe,
//! unpadded base64 encoding of its path relative to the primary root. A
//! transfer job is identified by the resource id of its primary-tier
//! endpoint (the file leaving for toStorm, the destination folder for
//! toPrimary).

use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{AccountId, StormServerId, StormUserName};

/// Validation failures for transfer path and name inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferInputError {
    /// Value is blank.
    #[error("{field} must not be blank")]
    Blank { field: &'static str },
    /// Resource id is not valid base64 or not UTF-8.
    #[error("resource id is not a valid encoded path")]
    Undecodable,
    /// A path component is absolute, `.`/`..`, or otherwise unsafe.
    #[error("{field} must be a relative path without parent components")]
    Escapes { field: &'static str },
    /// An entry name contains a separator.
    #[error("name must be a single path component")]
    NotSingleComponent,
}

fn relative_components(raw: &str, field: &'static str) -> Result<Vec<String>, TransferInputError> {
    let trimmed = raw.trim_start_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    Path::new(trimmed)
        .components()
        .map(|component| match component {
            Component::Normal(part) => part
                .to_str()
                .map(str::to_owned)
                .ok_or(TransferInputError::Escapes { field }),
            _ => Err(TransferInputError::Escapes { field }),
        })
        .collect()
}

/// A path relative to the primary-tier root; empty means the root itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrimaryPath(Vec<String>);

impl PrimaryPath {
    /// Parse a `/`-separated path. Leading slashes are ignored.
    pub fn parse(raw: &str) -> Result<Self, TransferInputError> {
        relative_components(raw, "path").map(Self)
    }

    /// Whether this is the primary root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Final component, if any.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Append one validated entry name.
    #[must_use]
    pub fn join(&self, name: &EntryName) -> Self {
        let mut components = self.0.clone();
        components.push(name.as_str().to_owned());
        Self(components)
    }

    /// Relative path usable with a capability-scoped directory; the root is `.`.
    #[must_use]
    pub fn to_relative(&self) -> String {
        if self.is_root() {
            ".".to_owned()
        } else {
            self.0.join("/")
        }
    }
}

impl fmt::Display for PrimaryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0.join("/"))
    }
}

impl TryFrom<String> for PrimaryPath {
    type Error = TransferInputError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PrimaryPath> for String {
    fn from(value: PrimaryPath) -> Self {
        value.to_string()
    }
}

/// Opaque public identifier of a primary-tier file or folder.
///
/// # Examples
/// ```
/// use storm_backend::domain::{PrimaryPath, ResourceId};
///
/// let path = PrimaryPath::parse("/projects/report.pdf").expect("valid path");
/// let id = ResourceId::encode(&path);
/// assert_eq!(id.decode().expect("decodes"), path);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Encode a primary path.
    #[must_use]
    pub fn encode(path: &PrimaryPath) -> Self {
        Self(URL_SAFE_NO_PAD.encode(path.to_string()))
    }

    /// Accept a caller-supplied id without decoding it yet.
    pub fn parse(raw: &str) -> Result<Self, TransferInputError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TransferInputError::Blank { field: "jid" });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Decode back into the primary path.
    pub fn decode(&self) -> Result<PrimaryPath, TransferInputError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(self.0.as_bytes())
            .map_err(|_| TransferInputError::Undecodable)?;
        let text = String::from_utf8(bytes).map_err(|_| TransferInputError::Undecodable)?;
        PrimaryPath::parse(&text)
    }

    /// Borrow the encoded form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier correlating a transfer initiation with its completion callback.
pub type JobId = ResourceId;

/// Single path component naming a file or folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryName(String);

impl EntryName {
    /// Validate a name.
    pub fn parse(raw: &str) -> Result<Self, TransferInputError> {
        if raw.trim().is_empty() {
            return Err(TransferInputError::Blank { field: "name" });
        }
        match relative_components(raw, "name")?.as_slice() {
            [single] if single == raw => Ok(Self(single.clone())),
            _ => Err(TransferInputError::NotSingleComponent),
        }
    }

    /// Borrow the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Non-empty path relative to a storm server's staging root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StagingPath(String);

impl StagingPath {
    /// Validate a staging path; it must stay inside the staging root.
    pub fn parse(raw: &str) -> Result<Self, TransferInputError> {
        if raw.trim().is_empty() {
            return Err(TransferInputError::Blank { field: "path" });
        }
        let components = relative_components(raw, "path")?;
        if components.is_empty() {
            return Err(TransferInputError::Blank { field: "path" });
        }
        Ok(Self(components.join("/")))
    }

    /// Borrow the normalised relative path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StagingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Direction content travels in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// Staged content arrives from storm and lands in a primary folder.
    ToPrimary,
    /// A primary file leaves for the storm tier.
    ToStorm,
}

impl TransferDirection {
    /// Action label used on the callback wire.
    #[must_use]
    pub fn action(self) -> &'static str {
        match self {
            Self::ToPrimary => "move_to_primary",
            Self::ToStorm => "move_to_storm",
        }
    }
}

/// Unknown callback action label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown transfer action `{0}`")]
pub struct UnknownTransferAction(pub String);

impl FromStr for TransferDirection {
    type Err = UnknownTransferAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "move_to_primary" => Ok(Self::ToPrimary),
            "move_to_storm" => Ok(Self::ToStorm),
            other => Err(UnknownTransferAction(other.to_owned())),
        }
    }
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action())
    }
}

/// Pending transfer recorded at initiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    pub id: JobId,
    pub direction: TransferDirection,
    pub account_id: AccountId,
    pub storm_user: StormUserName,
    pub storm_server_id: StormServerId,
    /// File leaving (toStorm) or destination folder (toPrimary).
    pub primary_path: PrimaryPath,
    pub name: EntryName,
    /// Known up front for toPrimary; supplied by the callback for toStorm.
    pub staging_path: Option<StagingPath>,
}

impl TransferJob {
    /// Key under which the job is pending.
    #[must_use]
    pub fn key(&self) -> TransferJobKey {
        TransferJobKey {
            jid: self.id.clone(),
            staging_path: self.staging_path.clone(),
        }
    }
}

/// Identity of a pending transfer.
///
/// Several uploads may target one folder, so toPrimary jobs are told apart
/// by their staged path. toStorm jobs carry none.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransferJobKey {
    pub jid: JobId,
    pub staging_path: Option<StagingPath>,
}

impl fmt::Display for TransferJobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.staging_path {
            Some(staged) => write!(f, "{} ({staged})", self.jid),
            None => self.jid.fmt(f),
        }
    }
}

/// How a transfer job was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOutcome {
    Completed,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/a/b.txt", "a/b.txt")]
    #[case("a/b.txt", "a/b.txt")]
    #[case("/", ".")]
    fn primary_paths_normalise(#[case] raw: &str, #[case] relative: &str) {
        let path = PrimaryPath::parse(raw).expect("valid path");
        assert_eq!(path.to_relative(), relative);
    }

    #[rstest]
    #[case("../etc/passwd")]
    #[case("a/../../b")]
    #[case("./a")]
    fn primary_paths_reject_parent_components(#[case] raw: &str) {
        assert!(PrimaryPath::parse(raw).is_err());
    }

    #[rstest]
    fn resource_ids_decode_to_the_encoded_path() {
        let path = PrimaryPath::parse("/folder/report.pdf").expect("valid path");
        let id = ResourceId::encode(&path);
        assert!(!id.as_str().contains('='));
        assert_eq!(id.decode().expect("decodes"), path);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn blank_resource_ids_are_rejected(#[case] raw: &str) {
        assert_eq!(
            ResourceId::parse(raw),
            Err(TransferInputError::Blank { field: "jid" })
        );
    }

    #[rstest]
    fn garbage_resource_ids_fail_to_decode() {
        let id = ResourceId::parse("***").expect("non-blank");
        assert_eq!(id.decode(), Err(TransferInputError::Undecodable));
    }

    #[rstest]
    #[case("report.pdf", true)]
    #[case("a/b", false)]
    #[case("..", false)]
    #[case("", false)]
    fn entry_names_are_single_components(#[case] raw: &str, #[case] valid: bool) {
        assert_eq!(EntryName::parse(raw).is_ok(), valid);
    }

    #[rstest]
    #[case("job-1/file.bin", true)]
    #[case("/", false)]
    #[case("../outside", false)]
    fn staging_paths_stay_inside_the_root(#[case] raw: &str, #[case] valid: bool) {
        assert_eq!(StagingPath::parse(raw).is_ok(), valid);
    }

    #[rstest]
    #[case("move_to_primary", Some(TransferDirection::ToPrimary))]
    #[case("move_to_storm", Some(TransferDirection::ToStorm))]
    #[case("foobar", None)]
    fn actions_parse(#[case] raw: &str, #[case] expected: Option<TransferDirection>) {
        assert_eq!(raw.parse::<TransferDirection>().ok(), expected);
    }
}

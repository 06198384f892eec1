//! Service configuration loaded via OrthoConfig.
//!
//! Values come from `STORM_*` environment variables, configuration files and
//! command-line flags, in OrthoConfig's usual precedence.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use actix_web::cookie::Key;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::warn;
use zeroize::Zeroize;

const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 8080);
const DEFAULT_PRIMARY_ROOT: &str = "/var/lib/storm/primary";
const DEFAULT_SESSION_KEY_FILE: &str = "/var/run/secrets/session_key";
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;
const SESSION_KEY_MIN_LEN: usize = 64;
const FINGERPRINT_BYTES: usize = 8;

/// Configuration for the storm backend.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "STORM")]
pub struct ServiceSettings {
    /// Socket address the HTTP server binds to.
    pub bind_addr: Option<SocketAddr>,
    /// PostgreSQL URL of the registry. Absent selects the in-memory registry.
    pub database_url: Option<String>,
    /// Root directory of the primary tier.
    pub primary_root: Option<PathBuf>,
    /// Timeout for calls to the storm servers, in seconds.
    pub remote_timeout_secs: Option<u64>,
    /// File holding the session signing key shared with the login service.
    pub session_key_file: Option<PathBuf>,
    /// Mark session cookies `Secure`.
    pub cookie_secure: Option<bool>,
    /// Allow a generated session key when the key file is unreadable.
    pub allow_ephemeral_key: Option<bool>,
    /// JSON seed for the in-memory registry.
    pub seed_file: Option<PathBuf>,
}

/// Failure turning settings into runtime values.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Reading the session key file failed.
    #[error("failed to read session key at {path}: {source}")]
    KeyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The session key is too short to derive signing and encryption keys.
    #[error("session key at {path} too short: need >= {min_len} bytes, got {length}")]
    KeyTooShort {
        path: PathBuf,
        length: usize,
        min_len: usize,
    },
}

impl ServiceSettings {
    /// Return the bind address, falling back to `0.0.0.0:8080`.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr.unwrap_or(DEFAULT_BIND_ADDR)
    }

    /// Return the primary root, falling back to `/var/lib/storm/primary`.
    #[must_use]
    pub fn primary_root(&self) -> PathBuf {
        self.primary_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PRIMARY_ROOT))
    }

    /// Return the session key path.
    #[must_use]
    pub fn session_key_file(&self) -> PathBuf {
        self.session_key_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_KEY_FILE))
    }

    /// Return the remote call timeout, falling back to 30 seconds.
    #[must_use]
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs.unwrap_or(DEFAULT_REMOTE_TIMEOUT_SECS))
    }

    /// Whether session cookies carry the `Secure` flag. Defaults to `true`.
    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure.unwrap_or(true)
    }

    /// Whether a generated session key may stand in for an unreadable file.
    #[must_use]
    pub fn allow_ephemeral_key(&self) -> bool {
        self.allow_ephemeral_key.unwrap_or(false)
    }

    /// Load the session key.
    ///
    /// An unreadable file yields a generated key only in debug builds or
    /// when `allow_ephemeral_key` is set; sessions issued by the login
    /// service will not validate against it.
    ///
    /// # Errors
    ///
    /// [`SettingsError::KeyRead`] when the file cannot be read and no
    /// fallback is allowed; [`SettingsError::KeyTooShort`] when it holds
    /// fewer than 64 bytes.
    pub fn session_key(&self) -> Result<Key, SettingsError> {
        let path = self.session_key_file();
        let allow_ephemeral = cfg!(debug_assertions) || self.allow_ephemeral_key();
        read_session_key(&path, allow_ephemeral)
    }
}

/// Truncated SHA-256 of the key's signing half, as 16 hex characters.
///
/// Logged at startup so operators can confirm this service and the login
/// service share a key without exposing it.
#[must_use]
pub fn key_fingerprint(key: &Key) -> String {
    let digest = Sha256::digest(key.signing());
    digest
        .get(..FINGERPRINT_BYTES)
        .map(hex::encode)
        .unwrap_or_default()
}

fn read_session_key(path: &Path, allow_ephemeral: bool) -> Result<Key, SettingsError> {
    match std::fs::read(path) {
        Ok(mut bytes) if bytes.len() < SESSION_KEY_MIN_LEN => {
            let length = bytes.len();
            bytes.zeroize();
            Err(SettingsError::KeyTooShort {
                path: path.to_path_buf(),
                length,
                min_len: SESSION_KEY_MIN_LEN,
            })
        }
        Ok(mut bytes) => {
            let key = Key::derive_from(&bytes);
            bytes.zeroize();
            Ok(key)
        }
        Err(source) if allow_ephemeral => {
            warn!(
                path = %path.display(),
                error = %source,
                "using temporary session key (dev only)"
            );
            Ok(Key::generate())
        }
        Err(source) => Err(SettingsError::KeyRead {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for settings parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 8] = [
        "STORM_BIND_ADDR",
        "STORM_DATABASE_URL",
        "STORM_PRIMARY_ROOT",
        "STORM_REMOTE_TIMEOUT_SECS",
        "STORM_SESSION_KEY_FILE",
        "STORM_COOKIE_SECURE",
        "STORM_ALLOW_EPHEMERAL_KEY",
        "STORM_SEED_FILE",
    ];

    fn load_from_empty_args() -> ServiceSettings {
        ServiceSettings::load_from_iter([OsString::from("storm-backend")])
            .expect("config should load")
    }

    #[rstest]
    fn default_values_are_used_when_missing() {
        let _guard = lock_env(VARS.map(|name| (name, None::<String>)));

        let settings = load_from_empty_args();
        assert_eq!(settings.bind_addr(), DEFAULT_BIND_ADDR);
        assert!(settings.database_url.is_none());
        assert_eq!(settings.primary_root(), PathBuf::from(DEFAULT_PRIMARY_ROOT));
        assert_eq!(settings.remote_timeout(), Duration::from_secs(30));
        assert_eq!(
            settings.session_key_file(),
            PathBuf::from(DEFAULT_SESSION_KEY_FILE)
        );
        assert!(settings.cookie_secure());
        assert!(!settings.allow_ephemeral_key());
        assert!(settings.seed_file.is_none());
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("STORM_BIND_ADDR", Some("127.0.0.1:9000".to_owned())),
            (
                "STORM_DATABASE_URL",
                Some("postgres://localhost/storm".to_owned()),
            ),
            ("STORM_PRIMARY_ROOT", Some("/srv/primary".to_owned())),
            ("STORM_REMOTE_TIMEOUT_SECS", Some("5".to_owned())),
            ("STORM_SESSION_KEY_FILE", Some("/tmp/key".to_owned())),
            ("STORM_COOKIE_SECURE", Some("false".to_owned())),
            ("STORM_ALLOW_EPHEMERAL_KEY", None),
            ("STORM_SEED_FILE", Some("/tmp/seed.json".to_owned())),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(
            settings.bind_addr(),
            "127.0.0.1:9000".parse::<SocketAddr>().expect("address")
        );
        assert_eq!(
            settings.database_url.as_deref(),
            Some("postgres://localhost/storm")
        );
        assert_eq!(settings.primary_root(), PathBuf::from("/srv/primary"));
        assert_eq!(settings.remote_timeout(), Duration::from_secs(5));
        assert_eq!(settings.session_key_file(), PathBuf::from("/tmp/key"));
        assert!(!settings.cookie_secure());
        assert_eq!(settings.seed_file, Some(PathBuf::from("/tmp/seed.json")));
    }

    #[rstest]
    #[case(None, true)]
    #[case(Some("true"), true)]
    #[case(Some("false"), false)]
    fn session_cookies_are_secure_unless_disabled(
        #[case] raw: Option<&str>,
        #[case] expected: bool,
    ) {
        let _guard = lock_env(VARS.map(|name| {
            let value = (name == "STORM_COOKIE_SECURE")
                .then(|| raw.map(str::to_owned))
                .flatten();
            (name, value)
        }));

        let settings = load_from_empty_args();

        assert_eq!(settings.cookie_secure(), expected);
        assert!(!settings.allow_ephemeral_key());
    }

    #[rstest]
    fn session_keys_must_be_long_enough() {
        let dir = tempfile::tempdir().expect("tempdir");
        let short = dir.path().join("short");
        std::fs::write(&short, [b'k'; 16]).expect("write short key");
        let long = dir.path().join("long");
        std::fs::write(&long, [b'k'; 64]).expect("write long key");

        assert!(matches!(
            read_session_key(&short, true),
            Err(SettingsError::KeyTooShort { length: 16, .. })
        ));
        assert!(read_session_key(&long, false).is_ok());
    }

    #[rstest]
    fn fingerprints_identify_the_key() {
        let key = Key::derive_from(&[b'a'; 64]);

        let fingerprint = key_fingerprint(&key);

        assert_eq!(fingerprint.len(), FINGERPRINT_BYTES * 2);
        assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fingerprint, key_fingerprint(&Key::derive_from(&[b'a'; 64])));
        assert_ne!(fingerprint, key_fingerprint(&Key::derive_from(&[b'b'; 64])));
    }

    #[rstest]
    #[case(true, true)]
    #[case(false, false)]
    fn missing_keys_fall_back_only_when_allowed(#[case] allow: bool, #[case] loads: bool) {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("absent");

        let result = read_session_key(&missing, allow);

        assert_eq!(result.is_ok(), loads);
        if !loads {
            assert!(matches!(result, Err(SettingsError::KeyRead { .. })));
        }
    }
}

//! Admission controller for storm account mutations.
//!
//! Pure validation over state the caller has already loaded. Checks run in a
//! fixed order so the first failing rule decides the error code:
//!
//! 1. target account exists (`account_not_found`);
//! 2. requester holds the owner capability (`unpermitted_account`);
//! 3. target shares the requester's enterprise (`unpermitted_account`);
//! 4. the enterprise has storm enabled (`unpermitted_enterprise`);
//! 5. create only: quota has room (`storm_user_count_reached`);
//! 6. create only: no storm account yet (`already_exists`);
//! 7. any supplied bandrate is a non-negative integer (`invalid_bandrate`).

use serde_json::{Value, json};

use super::{Account, Bandrate, BandrateError, Enterprise, EnterpriseId, Error, StormAccount};

/// State consulted when admitting a per-account mutation.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionState<'a> {
    /// Account the session belongs to.
    pub requester: &'a Account,
    /// Account whose storm identity is being changed, if it exists.
    pub target: Option<&'a Account>,
    /// The requester's enterprise, if the registry knows it.
    pub enterprise: Option<&'a Enterprise>,
}

impl AdmissionState<'_> {
    fn check_common(&self) -> Result<&Enterprise, Error> {
        let target = self
            .target
            .ok_or_else(|| Error::account_not_found("target account does not exist"))?;
        if !self.requester.role.is_owner() {
            return Err(Error::unpermitted_account(
                "only enterprise owners may manage storm users",
            ));
        }
        if target.enterprise_id != self.requester.enterprise_id {
            return Err(Error::unpermitted_account(
                "target account belongs to another enterprise",
            ));
        }
        storm_enabled(self.enterprise)
    }
}

fn storm_enabled(enterprise: Option<&Enterprise>) -> Result<&Enterprise, Error> {
    match enterprise {
        Some(enterprise) if enterprise.settings.storm_enabled => Ok(enterprise),
        _ => Err(Error::unpermitted_enterprise(
            "storm is not enabled for this enterprise",
        )),
    }
}

/// Map a raw bandrate field to the typed value or `invalid_bandrate`.
pub fn parse_bandrate(raw: &Value) -> Result<Bandrate, Error> {
    Bandrate::from_json(raw).map_err(|err| {
        let found = match &err {
            BandrateError::NotInteger { found } => Some(found.clone()),
            BandrateError::Missing
            | BandrateError::Negative
            | BandrateError::TooLarge { .. } => None,
        };
        Error::invalid_bandrate(err.to_string()).with_details(json!({
            "field": "bandrate",
            "found": found,
        }))
    })
}

/// Admit a create. An absent bandrate falls back to the enterprise default.
pub fn admit_create(
    state: &AdmissionState<'_>,
    existing: Option<&StormAccount>,
    bandrate: &Value,
) -> Result<Bandrate, Error> {
    let enterprise = state.check_common()?;
    if !enterprise.has_storm_capacity() {
        return Err(
            Error::storm_user_count_reached("storm user quota reached").with_details(json!({
                "max_storm_accounts": enterprise.max_storm_accounts,
                "registered_storm_accounts": enterprise.registered_storm_accounts,
            })),
        );
    }
    if existing.is_some() {
        return Err(Error::already_exists(
            "a storm user already exists for this account",
        ));
    }
    if bandrate.is_null() {
        return Ok(enterprise.settings.default_bandrate);
    }
    parse_bandrate(bandrate)
}

/// Admit a destroy.
pub fn admit_destroy(state: &AdmissionState<'_>) -> Result<(), Error> {
    state.check_common().map(|_| ())
}

/// Admit a single-account bandrate update.
pub fn admit_update(state: &AdmissionState<'_>, bandrate: &Value) -> Result<Bandrate, Error> {
    state.check_common()?;
    parse_bandrate(bandrate)
}

/// Admit an enterprise-wide bandrate update.
///
/// The addressed enterprise must be the requester's own.
pub fn admit_bulk_update(
    requester: &Account,
    enterprise_id: EnterpriseId,
    enterprise: Option<&Enterprise>,
    bandrate: &Value,
) -> Result<Bandrate, Error> {
    if !requester.role.is_owner() {
        return Err(Error::unpermitted_account(
            "only enterprise owners may manage storm users",
        ));
    }
    if requester.enterprise_id != enterprise_id {
        return Err(Error::unpermitted_enterprise(
            "enterprise does not match the requester",
        ));
    }
    storm_enabled(enterprise)?;
    parse_bandrate(bandrate)
}

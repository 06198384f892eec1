//! Shared HTTP adapter state.
//!
//! Handlers accept this state via `actix_web::web::Data` so they only depend
//! on the driving ports and stay testable without I/O.

use std::sync::Arc;

use crate::domain::ports::{
    FixtureStormAccountCommand, FixtureStormTransferCommand, StormAccountCommand,
    StormTransferCommand,
};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub storm_users: Arc<dyn StormAccountCommand>,
    pub transfers: Arc<dyn StormTransferCommand>,
}

impl HttpState {
    /// Construct state from the two driving ports.
    ///
    /// # Examples
    /// ```no_run
    /// use std::sync::Arc;
    ///
    /// use storm_backend::domain::ports::{
    ///     FixtureStormAccountCommand, FixtureStormTransferCommand,
    /// };
    /// use storm_backend::inbound::http::state::HttpState;
    ///
    /// let state = HttpState::new(
    ///     Arc::new(FixtureStormAccountCommand),
    ///     Arc::new(FixtureStormTransferCommand),
    /// );
    /// let _users = state.storm_users.clone();
    /// ```
    pub fn new(
        storm_users: Arc<dyn StormAccountCommand>,
        transfers: Arc<dyn StormTransferCommand>,
    ) -> Self {
        Self {
            storm_users,
            transfers,
        }
    }
}

impl Default for HttpState {
    fn default() -> Self {
        Self::new(
            Arc::new(FixtureStormAccountCommand),
            Arc::new(FixtureStormTransferCommand),
        )
    }
}

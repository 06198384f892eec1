//! Diesel table definitions for the storm registry schema.
//!
//! These definitions must match `migrations/` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Enterprises mirrored from the onboarding service, with storm settings
    /// and the denormalised storm account counter.
    enterprises (id) {
        id -> Int8,
        storm_enabled -> Bool,
        default_bandrate -> Int8,
        max_storm_accounts -> Int4,
        registered_storm_accounts -> Int4,
    }
}

diesel::table! {
    /// Accounts mirrored from the authentication service.
    accounts (id) {
        id -> Int8,
        enterprise_id -> Int8,
        role -> Varchar,
    }
}

diesel::table! {
    /// Remote storm servers.
    storm_servers (id) {
        id -> Int8,
        endpoint -> Text,
        staging_root -> Text,
    }
}

diesel::table! {
    /// One row per provisioned storm user.
    storm_accounts (id) {
        id -> Int8,
        account_id -> Int8,
        enterprise_id -> Int8,
        storm_server_id -> Int8,
        remote_user_id -> Text,
        name -> Varchar,
        bandrate -> Int8,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(accounts -> enterprises (enterprise_id));
diesel::joinable!(storm_accounts -> enterprises (enterprise_id));
diesel::joinable!(storm_accounts -> storm_servers (storm_server_id));

diesel::allow_tables_to_appear_in_same_query!(
    enterprises,
    accounts,
    storm_servers,
    storm_accounts,
);

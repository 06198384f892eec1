//! HTTP implementation of the `StormProvisioningClient` port.

mod dto;
mod http_client;

pub use http_client::HttpStormProvisioningClient;

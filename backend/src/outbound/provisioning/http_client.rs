//! Reqwest-backed storm provisioning client.
//!
//! The adapter owns transport details only: URL construction, JSON bodies,
//! timeout and transport error mapping. It returns remote statuses verbatim
//! and decodes reply bodies only for successful statuses.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response, Url};
use serde::Serialize;
use tracing::debug;

use super::dto::{
    BulkUpdateBody, BulkUpdateReplyDto, CreateUserBody, CreateUserReplyDto, MoveBody,
    UpdateUserBody,
};
use crate::domain::ports::{
    BulkUpdateReply, CreateRemoteUser, CreateUserReply, RemoteMoveRequest,
    StormProvisioningClient, StormProvisioningError,
};
use crate::domain::{Bandrate, RemoteUserId, StormServer};

const DEFAULT_USER_AGENT: &str = "storm-backend/0.1";

/// Provisioning client issuing one JSON request per call.
#[derive(Debug, Clone)]
pub struct HttpStormProvisioningClient {
    client: Client,
}

impl HttpStormProvisioningClient {
    /// Build a client whose every call is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<Response, StormProvisioningError> {
        debug!(%method, %url, "calling storm server");
        let mut request = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(map_transport_error)
    }
}

fn endpoint_url(server: &StormServer, segments: &[&str]) -> Result<Url, StormProvisioningError> {
    let mut url = server.endpoint.clone();
    url.path_segments_mut()
        .map_err(|()| {
            StormProvisioningError::transport(format!(
                "storm server {} endpoint {} cannot carry a path",
                server.id, server.endpoint
            ))
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn map_transport_error(error: reqwest::Error) -> StormProvisioningError {
    if error.is_timeout() {
        StormProvisioningError::timeout(error.to_string())
    } else if error.is_decode() {
        StormProvisioningError::decode(error.to_string())
    } else {
        StormProvisioningError::transport(error.to_string())
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, StormProvisioningError> {
    serde_json::from_slice(body).map_err(|error| {
        StormProvisioningError::decode(format!("invalid storm reply payload: {error}"))
    })
}

fn parse_create_reply(status: u16, body: &[u8]) -> Result<CreateUserReply, StormProvisioningError> {
    let user_id = if (200..300).contains(&status) {
        decode::<CreateUserReplyDto>(body)?.into_user_id()
    } else {
        None
    };
    Ok(CreateUserReply { status, user_id })
}

fn parse_bulk_reply(status: u16, body: &[u8]) -> Result<BulkUpdateReply, StormProvisioningError> {
    if !(200..300).contains(&status) || body.is_empty() {
        return Ok(BulkUpdateReply {
            status,
            bandrate: None,
            bandwidth: None,
        });
    }
    let dto: BulkUpdateReplyDto = decode(body)?;
    Ok(BulkUpdateReply {
        status,
        bandrate: dto.bandrate(),
        bandwidth: dto.bandwidth,
    })
}

#[async_trait]
impl StormProvisioningClient for HttpStormProvisioningClient {
    async fn create_user(
        &self,
        server: &StormServer,
        request: &CreateRemoteUser,
    ) -> Result<CreateUserReply, StormProvisioningError> {
        let body = CreateUserBody {
            name: request.name.as_str(),
            bandrate: request.bandrate.get(),
        };
        let response = self
            .send(Method::POST, endpoint_url(server, &["users"])?, Some(&body))
            .await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        parse_create_reply(status, bytes.as_ref())
    }

    async fn destroy_user(
        &self,
        server: &StormServer,
        user_id: &RemoteUserId,
    ) -> Result<u16, StormProvisioningError> {
        let url = endpoint_url(server, &["users", user_id.as_str()])?;
        let response = self.send::<()>(Method::DELETE, url, None).await?;
        Ok(response.status().as_u16())
    }

    async fn update_user(
        &self,
        server: &StormServer,
        user_id: &RemoteUserId,
        bandrate: Bandrate,
    ) -> Result<u16, StormProvisioningError> {
        let url = endpoint_url(server, &["users", user_id.as_str()])?;
        let body = UpdateUserBody {
            bandrate: bandrate.get(),
        };
        let response = self.send(Method::PATCH, url, Some(&body)).await?;
        Ok(response.status().as_u16())
    }

    async fn bulk_update_users(
        &self,
        server: &StormServer,
        user_ids: &[RemoteUserId],
        bandrate: Bandrate,
    ) -> Result<BulkUpdateReply, StormProvisioningError> {
        let body = BulkUpdateBody {
            user_ids: user_ids.iter().map(RemoteUserId::as_str).collect(),
            bandrate: bandrate.get(),
        };
        let response = self
            .send(
                Method::PATCH,
                endpoint_url(server, &["users"])?,
                Some(&body),
            )
            .await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        parse_bulk_reply(status, bytes.as_ref())
    }

    async fn move_to_storm(
        &self,
        server: &StormServer,
        request: &RemoteMoveRequest,
    ) -> Result<u16, StormProvisioningError> {
        let body = MoveBody {
            jid: &request.jid,
            name: &request.name,
            user: request.user.as_str(),
        };
        let response = self
            .send(Method::POST, endpoint_url(server, &["moves"])?, Some(&body))
            .await?;
        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    //! Non-network coverage for URL construction and reply decoding.

    use std::path::PathBuf;

    use super::*;
    use crate::domain::StormServerId;
    use rstest::rstest;

    fn server(endpoint: &str) -> StormServer {
        StormServer {
            id: StormServerId::new(1),
            endpoint: Url::parse(endpoint).expect("valid url"),
            staging_root: PathBuf::from("/srv"),
        }
    }

    #[rstest]
    #[case("http://storm:8080", "http://storm:8080/users/42")]
    #[case("http://storm:8080/", "http://storm:8080/users/42")]
    #[case("http://storm:8080/api/", "http://storm:8080/api/users/42")]
    fn urls_append_segments(#[case] endpoint: &str, #[case] expected: &str) {
        let url = endpoint_url(&server(endpoint), &["users", "42"]).expect("url");
        assert_eq!(url.as_str(), expected);
    }

    #[rstest]
    fn remote_ids_are_escaped() {
        let url = endpoint_url(&server("http://storm/"), &["users", "a/b"]).expect("url");
        assert_eq!(url.as_str(), "http://storm/users/a%2Fb");
    }

    #[rstest]
    fn opaque_endpoints_are_rejected() {
        let err = endpoint_url(&server("mailto:ops@storm.invalid"), &["users"])
            .expect_err("cannot be a base");
        assert!(matches!(err, StormProvisioningError::Transport { .. }));
    }

    #[rstest]
    #[case(br#"{"user_id": 42}"#.as_slice(), Some("42"))]
    #[case(br#"{"user_id": "u-7"}"#.as_slice(), Some("u-7"))]
    #[case(br#"{}"#.as_slice(), None)]
    fn create_replies_accept_numeric_and_string_ids(
        #[case] body: &[u8],
        #[case] expected: Option<&str>,
    ) {
        let reply = parse_create_reply(201, body).expect("decodes");
        assert_eq!(reply.user_id.as_ref().map(RemoteUserId::as_str), expected);
    }

    #[rstest]
    fn failed_creates_skip_decoding() {
        let reply = parse_create_reply(500, b"<html>oops</html>").expect("no decode");
        assert_eq!(reply.status, 500);
        assert!(reply.user_id.is_none());
    }

    #[rstest]
    fn malformed_success_bodies_are_decode_errors() {
        let err = parse_create_reply(201, b"not json").expect_err("decode");
        assert!(matches!(err, StormProvisioningError::Decode { .. }));
    }

    #[rstest]
    fn bulk_replies_carry_bandwidth() {
        let reply =
            parse_bulk_reply(200, br#"{"bandrate": 30, "bandwidth": 900}"#).expect("decodes");
        assert_eq!(reply.bandrate, Some(Bandrate::new(30)));
        assert_eq!(reply.bandwidth, Some(900));
    }
}

//! The access-control collaborator interface (spec.md §6
//! `AccessClient.HasVehiclePermissions`). The real service is an external
//! gRPC dependency outside this repo's scope; `HttpAccessClient` is the
//! thin adapter both the ingestion pipeline and the control plane call
//! through the trait object so neither depends on the transport.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{AssetDid, DevLicense};

pub const PRIVILEGE_NON_LOCATION_HISTORY: &str = "GetNonLocationHistory";
pub const PRIVILEGE_LOCATION_HISTORY: &str = "GetLocationHistory";

#[derive(Error, Debug)]
pub enum AccessError {
    #[error("access-control request failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait AccessClient: Send + Sync {
    async fn has_vehicle_permissions(
        &self,
        asset_did: &AssetDid,
        owner: &DevLicense,
        privileges: &[&str],
    ) -> Result<bool, AccessError>;
}

/// Adapter over the access-grant collaborator addressed by
/// `Config::access_grpc_addr`. Despite the config key's name the wire
/// contract exposed to this crate is a simple JSON/HTTP check endpoint;
/// the gRPC service sits behind it.
pub struct HttpAccessClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAccessClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into() }
    }
}

#[derive(serde::Serialize)]
struct PermissionRequest<'a> {
    #[serde(rename = "assetDid")]
    asset_did: String,
    #[serde(rename = "ownerAddr")]
    owner_addr: &'a str,
    privileges: &'a [&'a str],
}

#[derive(serde::Deserialize)]
struct PermissionResponse {
    granted: bool,
}

#[async_trait]
impl AccessClient for HttpAccessClient {
    async fn has_vehicle_permissions(
        &self,
        asset_did: &AssetDid,
        owner: &DevLicense,
        privileges: &[&str],
    ) -> Result<bool, AccessError> {
        let url = format!("{}/v1/permissions/check", self.base_url);
        let body = PermissionRequest {
            asset_did: asset_did.to_string(),
            owner_addr: owner.as_str(),
            privileges,
        };
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AccessError::Transport(e.to_string()))?;
        let parsed: PermissionResponse =
            resp.json().await.map_err(|e| AccessError::Transport(e.to_string()))?;
        Ok(parsed.granted)
    }
}

#[cfg(any(test, feature = "test-util"))]
pub struct StaticAccessClient {
    pub granted: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "test-util"))]
impl StaticAccessClient {
    pub fn allow() -> Self {
        Self { granted: std::sync::atomic::AtomicBool::new(true) }
    }

    pub fn deny() -> Self {
        Self { granted: std::sync::atomic::AtomicBool::new(false) }
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl AccessClient for StaticAccessClient {
    async fn has_vehicle_permissions(
        &self,
        _asset_did: &AssetDid,
        _owner: &DevLicense,
        _privileges: &[&str],
    ) -> Result<bool, AccessError> {
        Ok(self.granted.load(std::sync::atomic::Ordering::SeqCst))
    }
}

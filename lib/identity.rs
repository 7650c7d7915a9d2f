//! The vehicle-identity collaborator interface (spec.md §6
//! `IdentityClient.GetSharedVehicles`), used by `SubscribeAllShared` to
//! resolve the set of assets an owner currently has sharing access to.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{AssetDid, DevLicense};

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("identity request failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn get_shared_vehicles(&self, owner: &DevLicense) -> Result<Vec<AssetDid>, IdentityError>;
}

pub struct HttpIdentityClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIdentityClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into() }
    }
}

#[derive(serde::Deserialize)]
struct SharedVehiclesResponse {
    #[serde(rename = "assetDids")]
    asset_dids: Vec<String>,
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn get_shared_vehicles(&self, owner: &DevLicense) -> Result<Vec<AssetDid>, IdentityError> {
        let url = format!("{}/v1/shared-vehicles/{}", self.base_url, owner.as_str());
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;
        let parsed: SharedVehiclesResponse =
            resp.json().await.map_err(|e| IdentityError::Transport(e.to_string()))?;
        parsed
            .asset_dids
            .into_iter()
            .map(|s| s.parse().map_err(|e: crate::types::AssetDidError| IdentityError::Transport(e.to_string())))
            .collect()
    }
}

#[cfg(any(test, feature = "test-util"))]
pub struct StaticIdentityClient {
    pub shared: Vec<AssetDid>,
}

#[cfg(any(test, feature = "test-util"))]
impl StaticIdentityClient {
    pub fn new(shared: Vec<AssetDid>) -> Self {
        Self { shared }
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl IdentityClient for StaticIdentityClient {
    async fn get_shared_vehicles(&self, _owner: &DevLicense) -> Result<Vec<AssetDid>, IdentityError> {
        Ok(self.shared.clone())
    }
}

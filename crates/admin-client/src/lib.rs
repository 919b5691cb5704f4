//! HTTP client for the cluster admin API (`/v2/*` endpoints).

use common::{
    AdminApi, ApiError, ApiResult, ApplyLayoutResult, ClusterLayout, ClusterStatus,
    ConnectNodeResult, LayoutVersion, LayoutVersionBody, UpdateLayoutBody,
};
use futures::future::{BoxFuture, FutureExt};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

pub mod config;

pub use config::AdminConfig;

/// [`AdminApi`] over HTTP. Requests are never retried automatically.
#[derive(Debug, Clone)]
pub struct HttpAdminClient {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl HttpAdminClient {
    pub fn new(config: &AdminConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| ApiError::transport(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            token: config.admin_token.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/v2/{}", self.base_url, endpoint)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResult<T> {
        let request = self.authorize(self.client.get(self.url(endpoint)));
        self.send(endpoint, request).await
    }

    async fn post<B, T>(&self, endpoint: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.authorize(self.client.post(self.url(endpoint)).json(body));
        self.send(endpoint, request).await
    }

    async fn send<T: DeserializeOwned>(&self, endpoint: &str, request: RequestBuilder) -> ApiResult<T> {
        debug!(endpoint, "admin request");
        let response = request.send().await.map_err(|err| {
            warn!(endpoint, error = %err, "admin request failed");
            ApiError::transport(err.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.trim().is_empty() {
                body = status.canonical_reason().unwrap_or_default().to_string();
            }
            let err = ApiError::from_response(status.as_u16(), &body);
            warn!(endpoint, status = status.as_u16(), error = %err.message(), "admin request rejected");
            return Err(err);
        }

        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::decode(format!("{endpoint}: {err}")))
    }
}

impl AdminApi for HttpAdminClient {
    fn cluster_status(&self) -> BoxFuture<'_, ApiResult<ClusterStatus>> {
        self.get("GetClusterStatus").boxed()
    }

    fn cluster_layout(&self) -> BoxFuture<'_, ApiResult<ClusterLayout>> {
        self.get("GetClusterLayout").boxed()
    }

    fn update_layout(&self, body: UpdateLayoutBody) -> BoxFuture<'_, ApiResult<ClusterLayout>> {
        async move { self.post("UpdateClusterLayout", &body).await }.boxed()
    }

    /// The controller expects the version being created on the wire.
    fn apply_layout(&self, version: LayoutVersion) -> BoxFuture<'_, ApiResult<ApplyLayoutResult>> {
        async move {
            let body = LayoutVersionBody {
                version: version.next(),
            };
            self.post("ApplyClusterLayout", &body).await
        }
        .boxed()
    }

    fn revert_layout(&self, version: LayoutVersion) -> BoxFuture<'_, ApiResult<ClusterLayout>> {
        async move {
            let body = LayoutVersionBody {
                version: version.next(),
            };
            self.post("RevertClusterLayout", &body).await
        }
        .boxed()
    }

    fn connect_nodes(
        &self,
        peers: Vec<String>,
    ) -> BoxFuture<'_, ApiResult<Vec<ConnectNodeResult>>> {
        async move { self.post("ConnectClusterNodes", &peers).await }.boxed()
    }
}

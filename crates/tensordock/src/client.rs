//! TensorDock API client.
//!
//! Each operation follows the same pipeline: build parameters, marshal the
//! form body for writes, send through the [`Transport`], [`normalize`] the
//! raw response, check the envelope and decode the typed result.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{Config, Credentials};
use crate::error::{Result, TensorDockError};
use crate::marshal::{DeploySpec, FormBody, ModifySpec};
use crate::models::{
    BillingResponse, CpuStockResponse, DeployServerResponse, Envelope, GetServerResponse,
    GpuStockResponse, ListServersResponse, ServerStatusResponse,
};
use crate::normalize::{decode, normalize};
use crate::transport::{ApiRequest, HttpTransport, Transport, USER_AGENT};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// TensorDock API client.
///
/// Built once at startup; holds no mutable state.
pub struct TensorDock<T = HttpTransport> {
    /// Request transport.
    transport: T,
    /// Credentials added to authenticated calls.
    credentials: Credentials,
}

impl TensorDock<HttpTransport> {
    /// Create a client talking HTTP to the configured service URL.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::new(&config.service_url, config.debug)?;
        Ok(Self::new(transport, config.credentials.clone()))
    }
}

impl<T: Transport> TensorDock<T> {
    /// Create a client over an arbitrary transport.
    pub fn new(transport: T, credentials: Credentials) -> Self {
        Self {
            transport,
            credentials,
        }
    }

    fn auth_fields(&self) -> FormBody {
        let mut fields = FormBody::new();
        fields.push("api_key", &self.credentials.api_key);
        fields.push("api_token", &self.credentials.api_token);
        fields
    }

    /// GET with parameters in the query string.
    async fn get<R: DeserializeOwned>(&self, path: &str, params: FormBody, auth: bool) -> Result<R> {
        let mut query = if auth { self.auth_fields() } else { FormBody::new() };
        query.extend(params);

        let mut request = ApiRequest::new(Method::GET, path);
        request.query = query.into_pairs();
        request
            .headers
            .push(("User-Agent".to_string(), USER_AGENT.to_string()));

        self.execute(request).await
    }

    /// POST with a form-encoded body.
    async fn post<R: DeserializeOwned>(&self, path: &str, body: FormBody, auth: bool) -> Result<R> {
        let mut form = if auth { self.auth_fields() } else { FormBody::new() };
        form.extend(body);

        let mut request = ApiRequest::new(Method::POST, path);
        request.headers = vec![
            ("User-Agent".to_string(), USER_AGENT.to_string()),
            ("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string()),
        ];
        request.body = Some(form.encode().into_bytes());

        self.execute(request).await
    }

    async fn execute<R: DeserializeOwned>(&self, request: ApiRequest) -> Result<R> {
        let path = request.path.clone();
        let raw = self.transport.send(request).await?;
        debug!(path = %path, status = raw.status, content_type = %raw.content_type, "API response");

        let document = normalize(&raw)?;
        let envelope = Envelope::deserialize(&document).map_err(TensorDockError::Decode)?;
        if !envelope.success {
            return Err(TensorDockError::api(&envelope.error));
        }

        decode(document)
    }

    fn server_param(server: &str) -> FormBody {
        let mut params = FormBody::new();
        params.push("server", server);
        params
    }

    /// List all servers on the account.
    ///
    /// # Errors
    /// Returns error on transport, normalization, API or decode failure.
    pub async fn list_servers(&self) -> Result<ListServersResponse> {
        self.get("list", FormBody::new(), true).await
    }

    /// Get one server.
    ///
    /// # Errors
    /// Returns error on transport, normalization, API or decode failure.
    pub async fn get_server(&self, server: &str) -> Result<GetServerResponse> {
        self.get("get/single", Self::server_param(server), true).await
    }

    /// Power on a stopped server.
    ///
    /// # Errors
    /// Returns error on transport, normalization, API or decode failure.
    pub async fn start_server(&self, server: &str) -> Result<Envelope> {
        info!(server = %server, "Starting server");
        self.get("start/single", Self::server_param(server), true).await
    }

    /// Power off a running server.
    ///
    /// # Errors
    /// Returns error on transport, normalization, API or decode failure.
    pub async fn stop_server(&self, server: &str) -> Result<Envelope> {
        info!(server = %server, "Stopping server");
        self.get("stop/single", Self::server_param(server), true).await
    }

    /// Restart a running server.
    ///
    /// # Errors
    /// Returns error on transport, normalization, API or decode failure.
    pub async fn restart_server(&self, server: &str) -> Result<Envelope> {
        info!(server = %server, "Restarting server");
        self.get("restart/single", Self::server_param(server), true)
            .await
    }

    /// Delete a server.
    ///
    /// # Errors
    /// Returns error on transport, normalization, API or decode failure.
    pub async fn delete_server(&self, server: &str) -> Result<Envelope> {
        info!(server = %server, "Deleting server");
        self.get("delete/single", Self::server_param(server), true)
            .await
    }

    /// Deploy a new server.
    ///
    /// # Errors
    /// Returns [`TensorDockError::Validation`] before any request for an
    /// unknown instance type, otherwise the usual call failures.
    pub async fn deploy_server(&self, spec: &DeploySpec) -> Result<DeployServerResponse> {
        let body = spec.to_form()?;
        info!(name = %spec.name, instance_type = %spec.instance_type, location = %spec.location, "Deploying server");

        let response: DeployServerResponse = self.post("deploy/single/custom", body, true).await?;
        info!(server = %response.server.id, "Server deployed");
        Ok(response)
    }

    /// Change a server's hardware.
    ///
    /// Only the fields present in `spec` are sent. The API has been seen to
    /// require the full configuration; use [`ModifySpec::restate`] to fill
    /// the gaps from the current server.
    ///
    /// # Errors
    /// Returns [`TensorDockError::Validation`] before any request for an
    /// unknown instance type, otherwise the usual call failures.
    pub async fn modify_server(&self, server_id: &str, spec: &ModifySpec) -> Result<Envelope> {
        let mut body = FormBody::new();
        body.push("server_id", server_id);
        body.extend(spec.to_form()?);
        info!(server = %server_id, fields = body.len() - 1, "Modifying server");

        self.post("modify/single/custom", body, true).await
    }

    /// Deployment status of a server.
    ///
    /// # Errors
    /// Returns error on transport, normalization, API or decode failure.
    pub async fn server_status(&self, server: &str) -> Result<ServerStatusResponse> {
        self.post("deploy/status", Self::server_param(server), true)
            .await
    }

    /// Account balance and spend rate.
    ///
    /// # Errors
    /// Returns error on transport, normalization, API or decode failure.
    pub async fn billing(&self) -> Result<BillingResponse> {
        self.get("billing", FormBody::new(), true).await
    }

    /// GPU stock per model and region. Public, no credentials sent.
    ///
    /// # Errors
    /// Returns error on transport, normalization, API or decode failure.
    pub async fn gpu_stock(&self) -> Result<GpuStockResponse> {
        self.get("stock/list", FormBody::new(), false).await
    }

    /// CPU stock per model and region. Public, no credentials sent.
    ///
    /// # Errors
    /// Returns error on transport, normalization, API or decode failure.
    pub async fn cpu_stock(&self) -> Result<CpuStockResponse> {
        self.get("stock/cpu/list", FormBody::new(), false).await
    }
}

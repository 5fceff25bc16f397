use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::auth::{self, TokenCache};
use crate::config::{AuthMode, ServerConfig};
use crate::error::{FhirError, FhirResult};
use crate::types::{Bundle, ResourceType, SearchParams};

pub const FHIR_JSON: &str = "application/fhir+json";

/// A configuration together with the token obtained for it. Replaced as a
/// whole so a config switch can never pair the new server with an old token.
#[derive(Debug)]
struct Session {
    config: ServerConfig,
    tokens: TokenCache,
}

impl Session {
    fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            tokens: TokenCache::default(),
        })
    }
}

/// REST client for one FHIR server at a time.
///
/// Each request snapshots the active session when it starts; switching
/// servers only affects requests issued afterwards.
pub struct FhirClient {
    http: reqwest::Client,
    session: RwLock<Arc<Session>>,
}

impl FhirClient {
    pub fn new(config: ServerConfig) -> FhirResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(FhirError::transport)?;
        Ok(Self::with_http_client(http, config))
    }

    pub fn with_http_client(http: reqwest::Client, config: ServerConfig) -> Self {
        Self {
            http,
            session: RwLock::new(Session::new(config)),
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        self.session.read().config.clone()
    }

    /// Switches to another server and drops any cached token.
    pub fn set_server(&self, config: ServerConfig) {
        debug!(base_url = %config.base_url, name = %config.name, "switching FHIR server");
        *self.session.write() = Session::new(config);
    }

    /// Replaces the authentication of the current server and drops any
    /// cached token.
    pub fn set_authentication(&self, auth: AuthMode) {
        let mut session = self.session.write();
        let config = session.config.with_auth(auth);
        *session = Session::new(config);
    }

    fn session(&self) -> Arc<Session> {
        self.session.read().clone()
    }

    async fn request(&self, session: &Session, method: Method, path: &str) -> RequestBuilder {
        let url = endpoint(&session.config.base_url, path);
        debug!(%method, %url, "FHIR request");
        let builder = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, FHIR_JSON)
            .header(ACCEPT, FHIR_JSON);
        match auth::authorization(&self.http, &session.config.auth, &session.tokens).await {
            Some(value) => builder.header(AUTHORIZATION, value),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, session: &Session, path: &str) -> FhirResult<T> {
        let builder = self.request(session, Method::GET, path).await;
        read_json(send(builder).await?).await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> FhirResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = encode(body)?;
        let session = self.session();
        let builder = self.request(&session, method, path).await.body(body);
        read_json(send(builder).await?).await
    }

    pub async fn get_resource(&self, resource_type: ResourceType, id: &str) -> FhirResult<Value> {
        self.get_json(&self.session(), &instance_path(resource_type, id))
            .await
    }

    /// Fetches an absolute address. Addresses under the configured base go
    /// through the authenticated client; anything else is fetched bare so
    /// credentials never reach a foreign host.
    pub async fn get_resource_by_url(&self, url: &str) -> FhirResult<Value> {
        let session = self.session();
        if let Some(path) = relative_path(&session.config.base_url, url) {
            return self.get_json(&session, path).await;
        }
        debug!(%url, "fetching foreign FHIR address without credentials");
        let builder = self.http.get(url).header(ACCEPT, FHIR_JSON);
        read_json(send(builder).await?).await
    }

    /// Follows a reference as found in a record: either an absolute
    /// address or a `Type/id` path relative to the current server.
    pub async fn resolve_reference(&self, reference: &str) -> FhirResult<Value> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return self.get_resource_by_url(reference).await;
        }
        let path = reference.trim_start_matches('/');
        if path.is_empty() || path.starts_with('#') {
            return Err(FhirError::precondition(format!(
                "reference {reference:?} does not point at a server resource"
            )));
        }
        self.get_json(&self.session(), &format!("/{path}")).await
    }

    pub async fn search(
        &self,
        resource_type: ResourceType,
        params: &SearchParams,
    ) -> FhirResult<Bundle> {
        let session = self.session();
        let builder = self
            .request(&session, Method::GET, &format!("/{resource_type}"))
            .await
            .query(&params.to_query_pairs());
        read_json(send(builder).await?).await
    }

    /// Posts a record to the endpoint of its own `resourceType`.
    pub async fn create_resource(&self, resource: &Value) -> FhirResult<Value> {
        let resource_type = declared_type(resource)?;
        self.send_json(Method::POST, &format!("/{resource_type}"), resource)
            .await
    }

    pub async fn update_resource(&self, resource: &Value) -> FhirResult<Value> {
        let id = resource
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| FhirError::precondition("Resource ID is required for updates"))?;
        let resource_type = declared_type(resource)?;
        self.send_json(Method::PUT, &instance_path(resource_type, id), resource)
            .await
    }

    pub async fn delete_resource(&self, resource_type: ResourceType, id: &str) -> FhirResult<()> {
        let session = self.session();
        let builder = self
            .request(&session, Method::DELETE, &instance_path(resource_type, id))
            .await;
        send(builder).await?;
        Ok(())
    }

    pub async fn capability_statement(&self) -> FhirResult<Value> {
        self.get_json(&self.session(), "/metadata").await
    }

    /// Pings `/metadata`; any failure reads as `false`.
    pub async fn test_connection(&self) -> bool {
        match self.capability_statement().await {
            Ok(_) => true,
            Err(err) => {
                debug!(error = %err, "connection test failed");
                false
            }
        }
    }

    /// Posts a batch or transaction bundle to the server root. The response
    /// comes back untouched; entries are not checked.
    pub async fn execute_batch(&self, bundle: &Bundle) -> FhirResult<Value> {
        self.send_json(Method::POST, "/", bundle).await
    }

    pub async fn search_patients(&self, params: &SearchParams) -> FhirResult<Bundle> {
        self.search(ResourceType::Patient, params).await
    }

    pub async fn get_patient(&self, id: &str) -> FhirResult<Value> {
        self.get_resource(ResourceType::Patient, id).await
    }

    pub async fn search_observations(&self, params: &SearchParams) -> FhirResult<Bundle> {
        self.search(ResourceType::Observation, params).await
    }

    pub async fn get_patient_observations(&self, patient_id: &str) -> FhirResult<Bundle> {
        let params = SearchParams::new().with("patient", patient_id);
        self.search(ResourceType::Observation, &params).await
    }

    pub async fn get_observation(&self, id: &str) -> FhirResult<Value> {
        self.get_resource(ResourceType::Observation, id).await
    }
}

/// `/Type/id` with the id escaped as a single path segment.
fn instance_path(resource_type: ResourceType, id: &str) -> String {
    format!("/{resource_type}/{}", urlencoding::encode(id))
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// The part of `url` after `base_url`, when `url` lives under it. The
/// remainder must start a new path segment or query so that
/// `https://a/fhir` does not claim `https://a/fhir-other`.
fn relative_path<'a>(base_url: &str, url: &'a str) -> Option<&'a str> {
    let base = base_url.trim_end_matches('/');
    if base.is_empty() {
        return None;
    }
    let rest = url.strip_prefix(base)?;
    if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') {
        Some(rest)
    } else {
        None
    }
}

fn declared_type(resource: &Value) -> FhirResult<ResourceType> {
    let name = resource
        .get("resourceType")
        .and_then(Value::as_str)
        .ok_or_else(|| FhirError::precondition("Resource has no resourceType"))?;
    name.parse::<ResourceType>()
        .map_err(|err| FhirError::precondition(err.to_string()))
}

fn encode<B: Serialize + ?Sized>(body: &B) -> FhirResult<Vec<u8>> {
    serde_json::to_vec(body)
        .map_err(|err| FhirError::precondition(format!("could not encode request body: {err}")))
}

async fn send(builder: RequestBuilder) -> FhirResult<Response> {
    let response = builder.send().await.map_err(FhirError::transport)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.unwrap_or_default();
    Err(FhirError::from_response(status, &body))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> FhirResult<T> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(FhirError::transport)?;
    serde_json::from_slice(&bytes).map_err(|err| FhirError::invalid_body(status, &err))
}

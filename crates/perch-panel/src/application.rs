//! Application API client (admin "application" key).
//!
//! Covers user CRUD, server listings and creation, and the catalog
//! lookups (nodes, nests, eggs, allocations). Catalog and passthrough
//! listings degrade to empty results on provider failure so UI
//! composition survives partial outages; mutations and the owner-server
//! listing propagate errors because callers act on them.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::types::{
    Allocation, CreateServerRequest, Egg, EggVariable, EggWithVariables, ErrorEnvelope,
    ListEnvelope, Nest, Node, Pagination, PanelUser, Server, Wrapped,
};
use crate::{PanelCredentials, PanelError};

const PER_PAGE: u32 = 50;

/// Request body for creating a panel account.
#[derive(Debug, Clone, Serialize)]
pub struct CreateUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Partial-update body for a panel account.
///
/// Unset fields are stripped before sending so the provider only sees the
/// keys being changed; in particular the password is never transmitted
/// unless explicitly set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Application API client.
#[derive(Debug, Clone)]
pub struct ApplicationClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApplicationClient {
    /// Create a new Application API client.
    pub fn new(credentials: &PanelCredentials) -> Result<Self, PanelError> {
        let (http, base_url) = build_client(credentials)?;
        Ok(Self { http, base_url })
    }

    /// Build the Application API URL for a given path.
    pub(crate) fn api_url(&self, path: &str) -> String {
        format!("{}/api/application{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, PanelError> {
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(resp.json().await?)
    }

    /// Fetch a list endpoint and unwrap the attribute envelopes.
    async fn get_list<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, PanelError> {
        let envelope: ListEnvelope<T> = self.get_json(url).await?;
        Ok(envelope.data.into_iter().map(|w| w.attributes).collect())
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// List panel accounts, one page at a time. Degrades to an empty page
    /// on provider failure.
    pub async fn list_users(&self, page: u32) -> (Vec<PanelUser>, Option<Pagination>) {
        let url = self.api_url(&format!("/users?page={page}&per_page={PER_PAGE}"));
        match self.get_json::<ListEnvelope<PanelUser>>(&url).await {
            Ok(envelope) => (
                envelope.data.into_iter().map(|w| w.attributes).collect(),
                envelope.meta.map(|m| m.pagination),
            ),
            Err(e) => {
                warn!(error = %e, page, "Panel user listing failed; returning empty page");
                (Vec::new(), None)
            }
        }
    }

    /// Find a panel account by email, `None` on failure or no match.
    pub async fn get_user_by_email(&self, email: &str) -> Option<PanelUser> {
        let url = self.api_url(&format!("/users?filter%5Bemail%5D={}", urlencode(email)));
        match self.get_list::<PanelUser>(&url).await {
            Ok(mut users) if !users.is_empty() => Some(users.remove(0)),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Panel user lookup by email failed");
                None
            }
        }
    }

    /// Create a panel account.
    pub async fn create_user(&self, user: &CreateUser) -> Result<PanelUser, PanelError> {
        let url = self.api_url("/users");
        let resp = self.http.post(&url).json(user).send().await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        let wrapped: Wrapped<PanelUser> = resp.json().await?;
        Ok(wrapped.attributes)
    }

    /// Partially update a panel account. Unset fields are not sent.
    pub async fn update_user(&self, id: u64, update: &UserUpdate) -> Result<PanelUser, PanelError> {
        let url = self.api_url(&format!("/users/{id}"));
        let resp = self.http.patch(&url).json(update).send().await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        let wrapped: Wrapped<PanelUser> = resp.json().await?;
        Ok(wrapped.attributes)
    }

    /// Delete a panel account.
    pub async fn delete_user(&self, id: u64) -> Result<(), PanelError> {
        let url = self.api_url(&format!("/users/{id}"));
        let resp = self.http.delete(&url).send().await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(())
    }

    // =========================================================================
    // Servers
    // =========================================================================

    /// List every server owned by the given panel account.
    ///
    /// The provider's owner filter is unreliable on the Application API,
    /// so this drains all pages and filters client-side. O(total servers
    /// in the panel) per call; callers accept that bound. Errors propagate
    /// because admission decisions depend on this listing.
    pub async fn list_servers_by_owner(&self, owner_id: u64) -> Result<Vec<Server>, PanelError> {
        let mut owned = Vec::new();
        let mut page: u64 = 1;
        loop {
            let url = self.api_url(&format!("/servers?page={page}&per_page={PER_PAGE}"));
            let envelope: ListEnvelope<Server> = self.get_json(&url).await?;
            let fetched = envelope.data.len();
            owned.extend(
                envelope
                    .data
                    .into_iter()
                    .map(|w| w.attributes)
                    .filter(|s| s.user == owner_id),
            );
            match envelope.meta.map(|m| m.pagination) {
                Some(p) if p.current_page < p.total_pages => page = p.current_page + 1,
                Some(_) => break,
                // No pagination metadata: a short page means we are done.
                None if fetched == PER_PAGE as usize => page += 1,
                None => break,
            }
        }
        Ok(owned)
    }

    /// List all servers, one page at a time (admin views). Degrades to an
    /// empty page on provider failure.
    pub async fn list_all_servers(&self, page: u32) -> (Vec<Server>, Option<Pagination>) {
        let url = self.api_url(&format!("/servers?page={page}&per_page={PER_PAGE}"));
        match self.get_json::<ListEnvelope<Server>>(&url).await {
            Ok(envelope) => (
                envelope.data.into_iter().map(|w| w.attributes).collect(),
                envelope.meta.map(|m| m.pagination),
            ),
            Err(e) => {
                warn!(error = %e, page, "Panel server listing failed; returning empty page");
                (Vec::new(), None)
            }
        }
    }

    /// Create a server.
    pub async fn create_server(&self, req: &CreateServerRequest) -> Result<Server, PanelError> {
        let url = self.api_url("/servers");
        let resp = self.http.post(&url).json(req).send().await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        let wrapped: Wrapped<Server> = resp.json().await?;
        Ok(wrapped.attributes)
    }

    /// Delete a server, optionally forcing removal.
    pub async fn delete_server(&self, id: u64, force: bool) -> Result<(), PanelError> {
        let suffix = if force { "/force" } else { "" };
        let url = self.api_url(&format!("/servers/{id}{suffix}"));
        let resp = self.http.delete(&url).send().await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(())
    }

    // =========================================================================
    // Catalog / inventory
    // =========================================================================

    /// List nodes. Degrades to empty on provider failure.
    pub async fn list_nodes(&self) -> Vec<Node> {
        self.catalog_list("/nodes", "nodes").await
    }

    /// List nests. Degrades to empty on provider failure.
    pub async fn list_nests(&self) -> Vec<Nest> {
        self.catalog_list("/nests", "nests").await
    }

    /// List eggs within a nest. Degrades to empty on provider failure.
    pub async fn list_eggs(&self, nest_id: u64) -> Vec<Egg> {
        self.catalog_list(&format!("/nests/{nest_id}/eggs"), "eggs")
            .await
    }

    /// List the startup variables declared by an egg. Degrades to empty on
    /// provider failure. The variables ride along as an included
    /// relationship on the egg resource.
    pub async fn list_egg_variables(&self, nest_id: u64, egg_id: u64) -> Vec<EggVariable> {
        let url = self.api_url(&format!("/nests/{nest_id}/eggs/{egg_id}?include=variables"));
        match self.get_json::<Wrapped<EggWithVariables>>(&url).await {
            Ok(wrapped) => wrapped
                .attributes
                .relationships
                .and_then(|r| r.variables)
                .map(|v| v.data.into_iter().map(|w| w.attributes).collect())
                .unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, nest_id, egg_id, "Panel egg-variable listing failed; returning empty");
                Vec::new()
            }
        }
    }

    /// List allocations on a node. Degrades to empty on provider failure.
    pub async fn list_allocations(&self, node_id: u64) -> Vec<Allocation> {
        self.catalog_list(&format!("/nodes/{node_id}/allocations"), "allocations")
            .await
    }

    async fn catalog_list<T: DeserializeOwned>(&self, path: &str, what: &str) -> Vec<T> {
        let url = self.api_url(path);
        match self.get_list(&url).await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "Panel {what} listing failed; returning empty");
                Vec::new()
            }
        }
    }
}

/// Build a reqwest client with the bearer key and a bounded per-request
/// timeout. Reads are retry-safe under timeout; the single create mutation
/// is never retried by callers.
pub(crate) fn build_client(
    credentials: &PanelCredentials,
) -> Result<(reqwest::Client, String), PanelError> {
    if credentials.base_url.is_empty() {
        return Err(PanelError::Config("base_url is empty".into()));
    }
    if credentials.api_key.is_empty() {
        return Err(PanelError::Config("api_key is empty".into()));
    }

    let mut headers = HeaderMap::new();
    let token_val = HeaderValue::from_str(&format!("Bearer {}", credentials.api_key))
        .map_err(|_| PanelError::Config("Invalid API key format".into()))?;
    headers.insert(AUTHORIZATION, token_val);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let http = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(10))
        .build()?;

    let base_url = credentials.base_url.trim_end_matches('/').to_string();
    Ok((http, base_url))
}

/// Decode a non-2xx panel response into `PanelError::Api`, concatenating
/// the provider's error details.
pub(crate) async fn api_error(resp: reqwest::Response) -> PanelError {
    let status = resp.status();
    let message = match resp.json::<ErrorEnvelope>().await {
        Ok(envelope) if !envelope.errors.is_empty() => envelope
            .errors
            .into_iter()
            .map(|e| e.detail)
            .collect::<Vec<_>>()
            .join(", "),
        _ => status.canonical_reason().unwrap_or("Unknown").to_string(),
    };
    PanelError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Percent-encode the handful of characters that matter in an email query.
pub(crate) fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => out.push(c),
            _ => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).as_bytes() {
                    out.push_str(&format!("%{byte:02X}"));
                }
            }
        }
    }
    out
}

//! Panel API response and request types.
//!
//! The panel wraps every row in an attribute envelope
//! (`{"object": ..., "attributes": {...}}`) and lists in
//! `{"data": [...], "meta": {"pagination": {...}}}`; the structs here
//! model those envelopes so the clients can unwrap them in one place.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Attribute envelope around a single resource.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Wrapped<T> {
    pub attributes: T,
}

/// List envelope with optional pagination metadata.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListEnvelope<T> {
    pub data: Vec<Wrapped<T>>,
    #[serde(default)]
    pub meta: Option<ListMeta>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListMeta {
    pub pagination: Pagination,
}

/// Pagination block returned by list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u64,
    pub count: u64,
    pub per_page: u64,
    pub current_page: u64,
    pub total_pages: u64,
}

/// Error body returned by the panel on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorEnvelope {
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(default)]
    pub detail: String,
}

/// Panel account (Application API user).
#[derive(Debug, Clone, Deserialize)]
pub struct PanelUser {
    pub id: u64,
    pub uuid: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub root_admin: bool,
}

/// Resource limits on a server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerLimits {
    pub memory: i64,
    pub swap: i64,
    pub disk: i64,
    pub io: i64,
    pub cpu: i64,
}

/// Feature limits on a server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureLimits {
    pub databases: u32,
    pub allocations: u32,
    pub backups: u32,
}

/// Server as seen through the Application API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: u64,
    pub uuid: String,
    /// Short identifier used by the Client API and console endpoints.
    pub identifier: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub suspended: bool,
    pub limits: ServerLimits,
    pub feature_limits: FeatureLimits,
    /// Owning panel account id.
    pub user: u64,
    pub node: u64,
    pub allocation: u64,
    pub nest: u64,
    pub egg: u64,
}

/// Node as seen through the Application API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub fqdn: String,
    #[serde(default)]
    pub scheme: String,
    #[serde(default)]
    pub maintenance_mode: bool,
    #[serde(default)]
    pub memory: i64,
    #[serde(default)]
    pub disk: i64,
}

/// Server-software category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nest {
    pub id: u64,
    pub uuid: String,
    #[serde(default)]
    pub author: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Installable image/config within a nest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Egg {
    pub id: u64,
    pub uuid: String,
    pub name: String,
    pub nest: u64,
    pub docker_image: String,
    pub startup: String,
}

/// Startup variable declared by an egg.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EggVariable {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub env_variable: String,
    #[serde(default)]
    pub default_value: String,
    #[serde(default)]
    pub user_viewable: bool,
    #[serde(default)]
    pub user_editable: bool,
    #[serde(default)]
    pub rules: String,
}

/// Relationship block nested under an egg fetched with `?include=variables`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EggWithVariables {
    #[serde(default)]
    pub relationships: Option<EggRelationships>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EggRelationships {
    #[serde(default)]
    pub variables: Option<VariableList>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct VariableList {
    pub data: Vec<Wrapped<EggVariable>>,
}

/// IP:port pair on a node, assignable to exactly one server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub id: u64,
    pub ip: String,
    #[serde(default)]
    pub alias: Option<String>,
    pub port: u16,
    #[serde(default)]
    pub notes: Option<String>,
    pub assigned: bool,
}

impl perch_core::policy::AllocationView for Allocation {
    fn is_assigned(&self) -> bool {
        self.assigned
    }
}

/// Allocation selection block inside a server-creation payload.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationSelection {
    pub default: u64,
}

/// Server-creation payload for the Application API.
#[derive(Debug, Clone, Serialize)]
pub struct CreateServerRequest {
    pub name: String,
    /// Owning panel account id.
    pub user: u64,
    pub egg: u64,
    pub docker_image: String,
    pub startup: String,
    pub limits: ServerLimits,
    pub feature_limits: FeatureLimits,
    pub allocation: AllocationSelection,
    pub environment: HashMap<String, String>,
    pub start_on_completion: bool,
}

/// Power signal accepted by the Client API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSignal {
    Start,
    Stop,
    Restart,
    Kill,
}

impl PowerSignal {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Kill => "kill",
        }
    }
}

/// Ephemeral console credentials issued per server, per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleCredentials {
    /// Bearer token for the console socket.
    pub token: String,
    /// WebSocket URL to connect to.
    pub socket: String,
}

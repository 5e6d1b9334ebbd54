//! Free-tier server provisioning pipeline.
//!
//! A linear sequence of reads against the panel, every admission gate
//! applied in order, then a single mutation (`create_server`). Any failure
//! is terminal for the request; nothing is rolled back because nothing was
//! written before the final step.
//!
//! Concurrent requests against the same node are serialised through a
//! per-node advisory lock held from the capacity read through the create
//! call, so two in-flight requests in this process cannot both pass a
//! capacity check with one free slot. Other processes writing to the same
//! panel can still overshoot; the panel remains the authority.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use perch_core::policy::{
    self, Admission, DenyReason, NodePolicy, node_usage, select_free_allocation,
};
use perch_panel::application::ApplicationClient;
use perch_panel::types::{
    Allocation, AllocationSelection, CreateServerRequest, Egg, EggVariable, FeatureLimits, Server,
    ServerLimits,
};
use perch_panel::PanelError;

use crate::storage::Settings;

/// Fixed feature limits handed to every free-tier server.
const FREE_FEATURE_LIMITS: FeatureLimits = FeatureLimits {
    databases: 2,
    allocations: 1,
    backups: 4,
};

const FREE_SWAP_MB: i64 = 0;
const FREE_IO_WEIGHT: i64 = 500;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("{0}")]
    Denied(DenyReason),

    #[error("Egg not found")]
    EggNotFound,

    #[error("No free allocations available on this node")]
    NoFreeAllocation,

    #[error(transparent)]
    Panel(#[from] PanelError),
}

/// What the caller asked for, already validated at the HTTP layer.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub name: String,
    pub node_id: u64,
    pub nest_id: u64,
    pub egg_id: u64,
}

/// Read/write access to the panel's inventory.
///
/// The pipeline only ever talks to the panel through this seam, so the
/// admission logic is testable against a canned inventory.
pub trait Inventory: Send + Sync {
    fn servers_by_owner(
        &self,
        owner_id: u64,
    ) -> impl Future<Output = Result<Vec<Server>, PanelError>> + Send;

    fn eggs(&self, nest_id: u64) -> impl Future<Output = Result<Vec<Egg>, PanelError>> + Send;

    fn egg_variables(
        &self,
        nest_id: u64,
        egg_id: u64,
    ) -> impl Future<Output = Result<Vec<EggVariable>, PanelError>> + Send;

    fn allocations(
        &self,
        node_id: u64,
    ) -> impl Future<Output = Result<Vec<Allocation>, PanelError>> + Send;

    fn create_server(
        &self,
        request: CreateServerRequest,
    ) -> impl Future<Output = Result<Server, PanelError>> + Send;
}

impl Inventory for ApplicationClient {
    async fn servers_by_owner(&self, owner_id: u64) -> Result<Vec<Server>, PanelError> {
        self.list_servers_by_owner(owner_id).await
    }

    async fn eggs(&self, nest_id: u64) -> Result<Vec<Egg>, PanelError> {
        Ok(self.list_eggs(nest_id).await)
    }

    async fn egg_variables(
        &self,
        nest_id: u64,
        egg_id: u64,
    ) -> Result<Vec<EggVariable>, PanelError> {
        Ok(self.list_egg_variables(nest_id, egg_id).await)
    }

    async fn allocations(&self, node_id: u64) -> Result<Vec<Allocation>, PanelError> {
        Ok(self.list_allocations(node_id).await)
    }

    async fn create_server(&self, request: CreateServerRequest) -> Result<Server, PanelError> {
        ApplicationClient::create_server(self, &request).await
    }
}

/// Advisory per-node locks serialising in-process creations.
#[derive(Default)]
pub struct NodeLocks {
    locks: std::sync::Mutex<HashMap<u64, Arc<Mutex<()>>>>,
}

impl NodeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn for_node(&self, node_id: u64) -> Arc<Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(locks.entry(node_id).or_default())
    }
}

/// Run the full admission-and-create pipeline for one request.
pub async fn provision_server<I: Inventory>(
    inventory: &I,
    locks: &NodeLocks,
    settings: &Settings,
    panel_user_id: u64,
    request: &ProvisionRequest,
) -> Result<Server, ProvisionError> {
    // 1. Quota gate, from the caller's live server list.
    let owned = inventory.servers_by_owner(panel_user_id).await?;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let server_limit = settings.server_limit.max(0) as u32;
    if let Admission::Deny(reason) = policy::can_create_server(owned.len(), server_limit) {
        return Err(ProvisionError::Denied(reason));
    }

    // 2. Node-policy membership. Pure, so it runs before any further
    //    panel reads; capacity is re-checked under the lock with live
    //    usage.
    let policy = NodePolicy::parse(&settings.allowed_nodes);
    if !policy.is_empty() && policy.limit_for(request.node_id).is_none() {
        warn!(node_id = request.node_id, "Node not in free-tier policy");
        return Err(ProvisionError::Denied(DenyReason::NodeNotAllowed));
    }

    // 3. Egg resolution before taking the node lock; it does not depend
    //    on node state.
    let eggs = inventory.eggs(request.nest_id).await?;
    let egg = eggs
        .into_iter()
        .find(|e| e.id == request.egg_id)
        .ok_or(ProvisionError::EggNotFound)?;

    // 4. Environment from egg variable defaults, no user overrides.
    let environment: HashMap<String, String> = inventory
        .egg_variables(request.nest_id, request.egg_id)
        .await?
        .into_iter()
        .map(|v| (v.env_variable, v.default_value))
        .collect();

    // Capacity read through create must not interleave with another
    // request targeting the same node.
    let node_lock = locks.for_node(request.node_id);
    let _guard = node_lock.lock().await;

    // 5. Capacity gate against live usage.
    let allocations = inventory.allocations(request.node_id).await?;
    let usage = node_usage(&allocations);
    if let Admission::Deny(reason) = policy::can_place_on_node(request.node_id, &policy, usage) {
        warn!(node_id = request.node_id, usage, %reason, "Node admission denied");
        return Err(ProvisionError::Denied(reason));
    }

    // 6. First-fit free allocation.
    let allocation = select_free_allocation(&allocations).ok_or(ProvisionError::NoFreeAllocation)?;

    // 7. The sole mutation.
    let created = inventory
        .create_server(CreateServerRequest {
            name: request.name.clone(),
            user: panel_user_id,
            egg: egg.id,
            docker_image: egg.docker_image,
            startup: egg.startup,
            limits: ServerLimits {
                memory: settings.free_server_memory,
                swap: FREE_SWAP_MB,
                disk: settings.free_server_disk,
                io: FREE_IO_WEIGHT,
                cpu: settings.free_server_cpu,
            },
            feature_limits: FREE_FEATURE_LIMITS,
            allocation: AllocationSelection {
                default: allocation.id,
            },
            environment,
            start_on_completion: true,
        })
        .await?;

    info!(
        server_id = created.id,
        identifier = %created.identifier,
        node_id = request.node_id,
        panel_user_id,
        "Provisioned free-tier server"
    );

    Ok(created)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;

    struct StubInventory {
        owned: Vec<Server>,
        eggs: Vec<Egg>,
        variables: Vec<EggVariable>,
        allocations: Vec<Allocation>,
        created: StdMutex<Vec<CreateServerRequest>>,
    }

    impl StubInventory {
        fn new() -> Self {
            Self {
                owned: Vec::new(),
                eggs: vec![test_egg(5)],
                variables: vec![EggVariable {
                    name: "Server Jar".into(),
                    description: String::new(),
                    env_variable: "SERVER_JARFILE".into(),
                    default_value: "server.jar".into(),
                    user_viewable: true,
                    user_editable: true,
                    rules: "required".into(),
                }],
                allocations: vec![
                    test_allocation(1, true),
                    test_allocation(2, false),
                    test_allocation(3, false),
                ],
                created: StdMutex::new(Vec::new()),
            }
        }
    }

    impl Inventory for StubInventory {
        async fn servers_by_owner(&self, _owner_id: u64) -> Result<Vec<Server>, PanelError> {
            Ok(self.owned.clone())
        }

        async fn eggs(&self, _nest_id: u64) -> Result<Vec<Egg>, PanelError> {
            Ok(self.eggs.clone())
        }

        async fn egg_variables(
            &self,
            _nest_id: u64,
            _egg_id: u64,
        ) -> Result<Vec<EggVariable>, PanelError> {
            Ok(self.variables.clone())
        }

        async fn allocations(&self, _node_id: u64) -> Result<Vec<Allocation>, PanelError> {
            Ok(self.allocations.clone())
        }

        async fn create_server(
            &self,
            request: CreateServerRequest,
        ) -> Result<Server, PanelError> {
            self.created.lock().unwrap().push(request.clone());
            Ok(test_server(100, 7))
        }
    }

    fn test_egg(id: u64) -> Egg {
        Egg {
            id,
            uuid: format!("egg-{id}"),
            name: "Paper".into(),
            nest: 1,
            docker_image: "ghcr.io/pterodactyl/yolks:java_17".into(),
            startup: "java -jar {{SERVER_JARFILE}}".into(),
        }
    }

    fn test_allocation(id: u64, assigned: bool) -> Allocation {
        Allocation {
            id,
            ip: "10.0.0.1".into(),
            alias: None,
            port: 25565,
            notes: None,
            assigned,
        }
    }

    fn test_server(id: u64, owner: u64) -> Server {
        Server {
            id,
            uuid: format!("srv-{id}"),
            identifier: format!("ident{id}"),
            name: "my server".into(),
            description: String::new(),
            status: None,
            suspended: false,
            limits: ServerLimits {
                memory: 4096,
                swap: 0,
                disk: 10240,
                io: 500,
                cpu: 100,
            },
            feature_limits: FREE_FEATURE_LIMITS,
            user: owner,
            node: 1,
            allocation: 2,
            nest: 1,
            egg: 5,
        }
    }

    fn test_settings() -> Settings {
        Settings {
            id: "site-settings".into(),
            site_title: "Perch".into(),
            site_description: String::new(),
            favicon_url: String::new(),
            dashboard_greeting: String::new(),
            announcement_text: String::new(),
            show_announcement: false,
            captcha_enabled: false,
            captcha_site_key: String::new(),
            captcha_secret_key: String::new(),
            free_server_memory: 4096,
            free_server_disk: 10240,
            free_server_cpu: 100,
            server_limit: 2,
            allowed_nodes: String::new(),
            panel_client_key: String::new(),
            updated_at: 0,
        }
    }

    fn request() -> ProvisionRequest {
        ProvisionRequest {
            name: "my server".into(),
            node_id: 5,
            nest_id: 1,
            egg_id: 5,
        }
    }

    #[tokio::test]
    async fn happy_path_builds_request_from_egg_and_settings() {
        let inventory = StubInventory::new();
        let locks = NodeLocks::new();

        provision_server(&inventory, &locks, &test_settings(), 7, &request())
            .await
            .unwrap();

        let created = inventory.created.lock().unwrap();
        let req = &created[0];
        assert_eq!(req.user, 7);
        assert_eq!(req.docker_image, "ghcr.io/pterodactyl/yolks:java_17");
        assert_eq!(req.startup, "java -jar {{SERVER_JARFILE}}");
        assert_eq!(req.limits.memory, 4096);
        assert_eq!(req.limits.swap, 0);
        assert_eq!(req.limits.io, 500);
        assert_eq!(req.feature_limits.databases, 2);
        assert_eq!(req.feature_limits.backups, 4);
        // First free allocation in listing order, skipping the assigned one.
        assert_eq!(req.allocation.default, 2);
        assert_eq!(
            req.environment.get("SERVER_JARFILE").map(String::as_str),
            Some("server.jar")
        );
        assert!(req.start_on_completion);
    }

    #[tokio::test]
    async fn quota_gate_uses_live_server_count() {
        let mut inventory = StubInventory::new();
        inventory.owned = vec![test_server(1, 7), test_server(2, 7)];
        let locks = NodeLocks::new();

        let result =
            provision_server(&inventory, &locks, &test_settings(), 7, &request()).await;
        match result {
            Err(ProvisionError::Denied(DenyReason::QuotaExceeded { limit })) => {
                assert_eq!(limit, 2);
            }
            other => panic!("expected quota denial, got {other:?}"),
        }
        assert!(inventory.created.lock().unwrap().is_empty());

        // One below the limit is still admitted.
        let mut inventory = StubInventory::new();
        inventory.owned = vec![test_server(1, 7)];
        provision_server(&inventory, &locks, &test_settings(), 7, &request())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn node_policy_gates_placement() {
        let inventory = StubInventory::new();
        let locks = NodeLocks::new();
        let mut settings = test_settings();
        settings.allowed_nodes = "1:50".into();

        // Node 5 is absent from a non-empty policy.
        let result = provision_server(&inventory, &locks, &settings, 7, &request()).await;
        assert!(matches!(
            result,
            Err(ProvisionError::Denied(DenyReason::NodeNotAllowed))
        ));
    }

    #[tokio::test]
    async fn node_capacity_counts_assigned_allocations() {
        let mut inventory = StubInventory::new();
        // One assigned allocation on node 5, limit 1 -> full.
        inventory.allocations = vec![test_allocation(1, true), test_allocation(2, false)];
        let locks = NodeLocks::new();
        let mut settings = test_settings();
        settings.allowed_nodes = "5:1".into();

        let result = provision_server(&inventory, &locks, &settings, 7, &request()).await;
        assert!(matches!(
            result,
            Err(ProvisionError::Denied(DenyReason::NodeAtCapacity { limit: 1 }))
        ));

        settings.allowed_nodes = "5:2".into();
        provision_server(&inventory, &locks, &settings, 7, &request())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn node_policy_is_checked_before_egg_resolution() {
        let inventory = StubInventory::new();
        let locks = NodeLocks::new();
        let mut settings = test_settings();
        settings.allowed_nodes = "1:50".into();
        let mut req = request();
        req.egg_id = 999;

        // Both gates would fail; the node denial must win.
        let result = provision_server(&inventory, &locks, &settings, 7, &req).await;
        assert!(matches!(
            result,
            Err(ProvisionError::Denied(DenyReason::NodeNotAllowed))
        ));
    }

    #[tokio::test]
    async fn unknown_egg_is_rejected_before_any_mutation() {
        let inventory = StubInventory::new();
        let locks = NodeLocks::new();
        let mut req = request();
        req.egg_id = 999;

        let result = provision_server(&inventory, &locks, &test_settings(), 7, &req).await;
        assert!(matches!(result, Err(ProvisionError::EggNotFound)));
        assert!(inventory.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fully_assigned_node_has_no_free_allocation() {
        let mut inventory = StubInventory::new();
        inventory.allocations = vec![test_allocation(1, true), test_allocation(2, true)];
        let locks = NodeLocks::new();

        let result =
            provision_server(&inventory, &locks, &test_settings(), 7, &request()).await;
        assert!(matches!(result, Err(ProvisionError::NoFreeAllocation)));
    }
}

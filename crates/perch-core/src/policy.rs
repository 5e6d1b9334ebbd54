//! Free-tier admission policy.
//!
//! Pure decision logic gating server creation: per-user server quotas and
//! per-node allocation capacity. No I/O of its own; callers supply the
//! settings values and live inventory snapshots.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-node server limit meaning "listed but unrestricted".
///
/// Distinct from a node being absent from the policy, which means the node
/// is excluded from the free tier entirely.
pub const UNLIMITED: u32 = 9999;

/// Parsed free-tier node policy.
///
/// Wire encoding is a comma-separated list of `nodeId` or `nodeId:limit`
/// entries (`"1:50, 2"`). An *empty* policy permits every node without
/// restriction; a *non-empty* policy excludes any node it does not list.
/// That asymmetry is deliberate and must not be normalized away.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePolicy {
    entries: BTreeMap<u64, u32>,
}

impl NodePolicy {
    /// Parse the textual encoding. Never fails: entries whose node id does
    /// not parse are discarded; a missing or unparseable limit token
    /// defaults to [`UNLIMITED`].
    pub fn parse(raw: &str) -> Self {
        let mut entries = BTreeMap::new();
        for part in raw.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let mut tokens = part.splitn(2, ':');
            let Some(id_token) = tokens.next() else {
                continue;
            };
            let Ok(id) = id_token.trim().parse::<u64>() else {
                continue;
            };
            let limit = tokens
                .next()
                .and_then(|t| t.trim().parse::<u32>().ok())
                .unwrap_or(UNLIMITED);
            entries.insert(id, limit);
        }
        Self { entries }
    }

    /// Whether the policy lists no nodes at all (all nodes permitted).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Server limit for a node, or `None` when the node is not part of the
    /// free tier.
    pub fn limit_for(&self, node_id: u64) -> Option<u32> {
        self.entries.get(&node_id).copied()
    }

    /// Iterate over `(node_id, limit)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u32)> + '_ {
        self.entries.iter().map(|(id, limit)| (*id, *limit))
    }
}

impl fmt::Display for NodePolicy {
    /// Serialize back to the wire encoding. Round-trips through
    /// [`NodePolicy::parse`]: unlimited entries are written as a bare id.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (id, limit) in &self.entries {
            if !first {
                write!(f, ",")?;
            }
            first = false;
            if *limit == UNLIMITED {
                write!(f, "{id}")?;
            } else {
                write!(f, "{id}:{limit}")?;
            }
        }
        Ok(())
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Deny(DenyReason),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Why an admission check denied the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// The user already owns `limit` servers.
    QuotaExceeded { limit: u32 },
    /// The node is not listed in a non-empty free-tier policy.
    NodeNotAllowed,
    /// The node has `limit` or more assigned allocations.
    NodeAtCapacity { limit: u32 },
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuotaExceeded { limit } => write!(
                f,
                "You have reached your server limit ({limit}). Upgrade or delete a server to create more."
            ),
            Self::NodeNotAllowed => {
                write!(f, "This node is not available for free server deployment.")
            }
            Self::NodeAtCapacity { limit } => write!(
                f,
                "This node has reached its capacity ({limit} servers). Please choose another node."
            ),
        }
    }
}

/// Read-only view of a panel allocation, implemented by the adapter's type.
pub trait AllocationView {
    fn is_assigned(&self) -> bool;
}

/// Count of allocations currently assigned to a server on a node.
pub fn node_usage<A: AllocationView>(allocations: &[A]) -> usize {
    allocations.iter().filter(|a| a.is_assigned()).count()
}

/// First free allocation in listing order, or `None`.
///
/// Strict first-fit: no randomization, no balancing across ports.
pub fn select_free_allocation<A: AllocationView>(allocations: &[A]) -> Option<&A> {
    allocations.iter().find(|a| !a.is_assigned())
}

/// Per-user quota gate: deny once the user owns `server_limit` servers.
pub fn can_create_server(existing_count: usize, server_limit: u32) -> Admission {
    if existing_count >= server_limit as usize {
        Admission::Deny(DenyReason::QuotaExceeded {
            limit: server_limit,
        })
    } else {
        Admission::Allow
    }
}

/// Per-node capacity gate.
///
/// An empty policy permits every node without restriction (the
/// administrators have not configured the free tier yet). A non-empty
/// policy denies nodes it does not list, and denies listed nodes whose
/// current usage has reached their configured limit.
pub fn can_place_on_node(node_id: u64, policy: &NodePolicy, current_usage: usize) -> Admission {
    if policy.is_empty() {
        return Admission::Allow;
    }
    match policy.limit_for(node_id) {
        None => Admission::Deny(DenyReason::NodeNotAllowed),
        Some(limit) if current_usage >= limit as usize => {
            Admission::Deny(DenyReason::NodeAtCapacity { limit })
        }
        Some(_) => Admission::Allow,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Alloc {
        id: u64,
        assigned: bool,
    }

    impl AllocationView for Alloc {
        fn is_assigned(&self) -> bool {
            self.assigned
        }
    }

    #[test]
    fn parse_mixed_entries() {
        let policy = NodePolicy::parse("1:50, 2, abc:10");
        assert_eq!(policy.limit_for(1), Some(50));
        assert_eq!(policy.limit_for(2), Some(UNLIMITED));
        // "abc" has no parseable id and is dropped entirely.
        assert_eq!(policy.iter().count(), 2);
    }

    #[test]
    fn parse_tolerates_whitespace_and_empty_parts() {
        let policy = NodePolicy::parse(" 3 : 7 ,, 9 ,");
        assert_eq!(policy.limit_for(3), Some(7));
        assert_eq!(policy.limit_for(9), Some(UNLIMITED));
        assert_eq!(policy.iter().count(), 2);
    }

    #[test]
    fn parse_unparseable_limit_defaults_to_unlimited() {
        let policy = NodePolicy::parse("4:lots");
        assert_eq!(policy.limit_for(4), Some(UNLIMITED));
    }

    #[test]
    fn display_round_trips() {
        let policy = NodePolicy::parse("1:50,2,7:3");
        assert_eq!(NodePolicy::parse(&policy.to_string()), policy);
        assert_eq!(policy.to_string(), "1:50,2,7:3");
    }

    #[test]
    fn empty_policy_round_trips() {
        let policy = NodePolicy::parse("");
        assert!(policy.is_empty());
        assert_eq!(policy.to_string(), "");
        assert_eq!(NodePolicy::parse(&policy.to_string()), policy);
    }

    #[test]
    fn quota_denies_at_limit() {
        assert!(matches!(
            can_create_server(2, 2),
            Admission::Deny(DenyReason::QuotaExceeded { limit: 2 })
        ));
        assert!(can_create_server(1, 2).is_allowed());
    }

    #[test]
    fn node_capacity_gate() {
        let policy = NodePolicy::parse("5:10");
        assert!(matches!(
            can_place_on_node(5, &policy, 10),
            Admission::Deny(DenyReason::NodeAtCapacity { limit: 10 })
        ));
        assert!(can_place_on_node(5, &policy, 9).is_allowed());
        // Node 7 is missing from a non-empty policy: excluded regardless of usage.
        assert!(matches!(
            can_place_on_node(7, &policy, 0),
            Admission::Deny(DenyReason::NodeNotAllowed)
        ));
    }

    #[test]
    fn empty_policy_allows_every_node() {
        let policy = NodePolicy::parse("");
        assert!(can_place_on_node(42, &policy, 10_000).is_allowed());
    }

    #[test]
    fn unlimited_entry_never_hits_capacity() {
        let policy = NodePolicy::parse("1");
        assert!(can_place_on_node(1, &policy, 9998).is_allowed());
    }

    #[test]
    fn usage_counts_assigned_only() {
        let allocs = vec![
            Alloc {
                id: 1,
                assigned: true,
            },
            Alloc {
                id: 2,
                assigned: false,
            },
            Alloc {
                id: 3,
                assigned: true,
            },
        ];
        assert_eq!(node_usage(&allocs), 2);
    }

    #[test]
    fn first_fit_allocation_selection() {
        let allocs = vec![
            Alloc {
                id: 1,
                assigned: true,
            },
            Alloc {
                id: 2,
                assigned: false,
            },
            Alloc {
                id: 3,
                assigned: false,
            },
        ];
        let selected = select_free_allocation(&allocs).unwrap();
        assert_eq!(selected.id, 2);
    }

    #[test]
    fn no_free_allocation() {
        let allocs = vec![Alloc {
            id: 1,
            assigned: true,
        }];
        assert!(select_free_allocation(&allocs).is_none());
    }
}

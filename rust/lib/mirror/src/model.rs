use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Hierarchy ───────────────────────────────────────────────────────

/// Kind of a node in the organization hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Root,
    OrganizationalUnit,
    Account,
}

impl NodeKind {
    /// Accounts can never hold children.
    pub fn is_leaf(self) -> bool {
        matches!(self, NodeKind::Account)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Root => write!(f, "root"),
            NodeKind::OrganizationalUnit => write!(f, "organizational unit"),
            NodeKind::Account => write!(f, "account"),
        }
    }
}

/// Child type filter used when listing the children of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildKind {
    OrganizationalUnit,
    Account,
}

impl ChildKind {
    /// Listing order: OUs before accounts.
    pub const ALL: [ChildKind; 2] = [ChildKind::OrganizationalUnit, ChildKind::Account];

    pub fn node_kind(self) -> NodeKind {
        match self {
            ChildKind::OrganizationalUnit => NodeKind::OrganizationalUnit,
            ChildKind::Account => NodeKind::Account,
        }
    }
}

/// One child as returned by a listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildNode {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
}

/// Result of describing a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescription {
    pub kind: NodeKind,
    pub name: String,
}

/// A materialized hierarchy node.
///
/// Built fresh from the organization source for every pass and never mutated
/// afterwards. `children` holds OUs first, then accounts, each group in the
/// source's listing order. Accounts always have no children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyNode {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    pub fn leaf(id: impl Into<String>, kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(HierarchyNode::node_count).sum::<usize>()
    }
}

// ── Policies ────────────────────────────────────────────────────────

/// Control policy family. Every walk runs for exactly one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PolicyType {
    #[serde(rename = "SERVICE_CONTROL_POLICY")]
    ServiceControl,
    #[serde(rename = "RESOURCE_CONTROL_POLICY")]
    ResourceControl,
}

impl PolicyType {
    pub const ALL: [PolicyType; 2] = [PolicyType::ServiceControl, PolicyType::ResourceControl];

    /// Filter name used by the organization API and the manifest.
    pub fn api_name(self) -> &'static str {
        match self {
            PolicyType::ServiceControl => "SERVICE_CONTROL_POLICY",
            PolicyType::ResourceControl => "RESOURCE_CONTROL_POLICY",
        }
    }

    /// File extension used in the mirror.
    pub fn short_name(self) -> &'static str {
        match self {
            PolicyType::ServiceControl => "scp",
            PolicyType::ResourceControl => "rcp",
        }
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

impl FromStr for PolicyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scp" | "SERVICE_CONTROL_POLICY" => Ok(PolicyType::ServiceControl),
            "rcp" | "RESOURCE_CONTROL_POLICY" => Ok(PolicyType::ResourceControl),
            other => Err(format!(
                "unsupported policy type {other:?}; expected scp, rcp, \
                 SERVICE_CONTROL_POLICY or RESOURCE_CONTROL_POLICY"
            )),
        }
    }
}

/// A policy as listed by the organization source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl PolicySummary {
    /// Description, falling back to the policy name when blank.
    pub fn effective_description(&self) -> &str {
        if self.description.is_empty() {
            &self.name
        } else {
            &self.description
        }
    }
}

/// How a policy attachment is treated by the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    /// Platform-owned (default-allow or guardrail). Never counted or resolved.
    ExternallyManaged,
    /// Attached at two or more nodes; content lives in the shared pool.
    Shared,
    /// Attached at exactly one node; content lives next to that node.
    Owned,
}

impl AttachmentKind {
    pub fn is_customer(self) -> bool {
        !matches!(self, AttachmentKind::ExternallyManaged)
    }
}

// ── Attachment map ──────────────────────────────────────────────────

/// One resolved policy: where its content lives and where it is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentMapEntry {
    pub policy_name: String,
    pub policy_type: PolicyType,
    pub canonical_path: PathBuf,
    /// Node ids in traversal order, without duplicates.
    pub targets: Vec<String>,
}

/// Ordered output of a completed walk for one policy type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentMap {
    pub policy_type: PolicyType,
    pub entries: Vec<AttachmentMapEntry>,
}

impl AttachmentMap {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, policy_name: &str) -> Option<&AttachmentMapEntry> {
        self.entries.iter().find(|e| e.policy_name == policy_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttachmentMapEntry> {
        self.entries.iter()
    }
}

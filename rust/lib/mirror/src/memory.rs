use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MirrorError, SourceError};
use crate::model::{ChildKind, ChildNode, NodeDescription, NodeKind, PolicySummary, PolicyType};
use crate::traits::{OrgSource, Page};

const DEFAULT_PAGE_SIZE: usize = 20;

/// A point-in-time export of an organization.
///
/// ```json
/// {
///   "root_id": "r-ab12",
///   "organizational_units": [{"id": "ou-ab12-1", "name": "Security", "parent_id": "r-ab12"}],
///   "accounts": [{"id": "111111111111", "name": "audit", "parent_id": "ou-ab12-1"}],
///   "policies": [{
///     "id": "p-1", "name": "Deny-Root-User", "description": "",
///     "policy_type": "SERVICE_CONTROL_POLICY",
///     "content": {"Version": "2012-10-17", "Statement": []},
///     "targets": ["ou-ab12-1", "111111111111"]
///   }]
/// }
/// ```
///
/// Listing order is the order of the arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrgSnapshot {
    pub root_id: String,
    #[serde(default = "default_root_name")]
    pub root_name: String,
    #[serde(default)]
    pub organizational_units: Vec<SnapshotNode>,
    #[serde(default)]
    pub accounts: Vec<SnapshotNode>,
    #[serde(default)]
    pub policies: Vec<SnapshotPolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: String,
    pub name: String,
    pub parent_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPolicy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub policy_type: PolicyType,
    pub content: serde_json::Value,
    /// Attachment targets, in attachment order.
    #[serde(default)]
    pub targets: Vec<String>,
}

fn default_root_name() -> String {
    "Root".to_string()
}

impl OrgSnapshot {
    pub fn new(root_id: impl Into<String>) -> Self {
        Self {
            root_id: root_id.into(),
            root_name: default_root_name(),
            ..Default::default()
        }
    }

    pub fn with_ou(mut self, id: &str, name: &str, parent_id: &str) -> Self {
        self.organizational_units.push(SnapshotNode {
            id: id.to_string(),
            name: name.to_string(),
            parent_id: parent_id.to_string(),
        });
        self
    }

    pub fn with_account(mut self, id: &str, name: &str, parent_id: &str) -> Self {
        self.accounts.push(SnapshotNode {
            id: id.to_string(),
            name: name.to_string(),
            parent_id: parent_id.to_string(),
        });
        self
    }

    pub fn with_policy(
        mut self,
        id: &str,
        name: &str,
        policy_type: PolicyType,
        targets: &[&str],
    ) -> Self {
        self.policies.push(SnapshotPolicy {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            policy_type,
            content: serde_json::json!({
                "Version": "2012-10-17",
                "Statement": [{"Sid": name, "Effect": "Deny", "Action": "*", "Resource": "*"}],
            }),
            targets: targets.iter().map(|t| t.to_string()).collect(),
        });
        self
    }
}

impl OrgSnapshot {
    /// Check that the nodes form a tree under the root: ids are unique and
    /// every parent chain ends at the root.
    pub fn validate(&self) -> Result<(), SourceError> {
        let mut ids = BTreeSet::from([self.root_id.as_str()]);
        for node in self.organizational_units.iter().chain(&self.accounts) {
            if !ids.insert(node.id.as_str()) {
                return Err(SourceError::Other(format!("duplicate node id {}", node.id)));
            }
        }

        let ou_parents: BTreeMap<&str, &str> = self
            .organizational_units
            .iter()
            .map(|n| (n.id.as_str(), n.parent_id.as_str()))
            .collect();
        for node in self.organizational_units.iter().chain(&self.accounts) {
            let mut chain = BTreeSet::from([node.id.as_str()]);
            let mut parent = node.parent_id.as_str();
            while parent != self.root_id {
                let Some(&next) = ou_parents.get(parent) else {
                    return Err(SourceError::Other(format!(
                        "node {} has parent {} which is neither the root nor an OU",
                        node.id, parent
                    )));
                };
                if !chain.insert(parent) {
                    return Err(SourceError::Other(format!(
                        "node {} sits in a parent cycle through {}",
                        node.id, parent
                    )));
                }
                parent = next;
            }
        }
        Ok(())
    }
}

/// InMemoryOrg serves an [`OrgSnapshot`] through [`OrgSource`], splitting
/// every listing into pages of `page_size` items.
#[derive(Debug, Clone)]
pub struct InMemoryOrg {
    snapshot: OrgSnapshot,
    page_size: usize,
}

impl InMemoryOrg {
    pub fn new(snapshot: OrgSnapshot) -> Self {
        Self {
            snapshot,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Load a JSON snapshot from disk.
    pub fn from_path(path: &Path) -> Result<Self, MirrorError> {
        let content = std::fs::read_to_string(path).map_err(|e| MirrorError::io(path, e))?;
        let snapshot: OrgSnapshot = serde_json::from_str(&content)
            .map_err(|e| MirrorError::Serialization(format!("{}: {}", path.display(), e)))?;
        snapshot.validate()?;
        Ok(Self::new(snapshot))
    }

    pub fn snapshot(&self) -> &OrgSnapshot {
        &self.snapshot
    }

    fn paginate<T: Clone>(&self, items: &[T], token: Option<&str>) -> Result<Page<T>, SourceError> {
        let start = match token {
            None => 0,
            Some(t) => t
                .parse::<usize>()
                .map_err(|_| SourceError::Other(format!("invalid pagination token {t:?}")))?,
        };
        let end = (start + self.page_size).min(items.len());
        let page_items = items.get(start..end).unwrap_or_default().to_vec();
        let next_token = (end < items.len()).then(|| end.to_string());
        Ok(Page {
            items: page_items,
            next_token,
        })
    }

    fn node_exists(&self, node_id: &str) -> bool {
        node_id == self.snapshot.root_id
            || self.snapshot.organizational_units.iter().any(|n| n.id == node_id)
            || self.snapshot.accounts.iter().any(|n| n.id == node_id)
    }

    fn summary(policy: &SnapshotPolicy) -> PolicySummary {
        PolicySummary {
            id: policy.id.clone(),
            name: policy.name.clone(),
            description: policy.description.clone(),
        }
    }
}

impl OrgSource for InMemoryOrg {
    fn roots(&self) -> Result<Vec<String>, SourceError> {
        Ok(vec![self.snapshot.root_id.clone()])
    }

    fn describe_node(&self, node_id: &str) -> Result<NodeDescription, SourceError> {
        if node_id == self.snapshot.root_id {
            return Ok(NodeDescription {
                kind: NodeKind::Root,
                name: self.snapshot.root_name.clone(),
            });
        }
        if let Some(ou) = self.snapshot.organizational_units.iter().find(|n| n.id == node_id) {
            return Ok(NodeDescription {
                kind: NodeKind::OrganizationalUnit,
                name: ou.name.clone(),
            });
        }
        if let Some(acct) = self.snapshot.accounts.iter().find(|n| n.id == node_id) {
            return Ok(NodeDescription {
                kind: NodeKind::Account,
                name: acct.name.clone(),
            });
        }
        Err(SourceError::NotFound(format!("node {node_id}")))
    }

    fn children_page(
        &self,
        parent_id: &str,
        kind: ChildKind,
        token: Option<&str>,
    ) -> Result<Page<ChildNode>, SourceError> {
        if !self.node_exists(parent_id) {
            return Err(SourceError::NotFound(format!("parent {parent_id}")));
        }
        let pool = match kind {
            ChildKind::OrganizationalUnit => &self.snapshot.organizational_units,
            ChildKind::Account => &self.snapshot.accounts,
        };
        let children: Vec<ChildNode> = pool
            .iter()
            .filter(|n| n.parent_id == parent_id)
            .map(|n| ChildNode {
                id: n.id.clone(),
                kind: kind.node_kind(),
                name: n.name.clone(),
            })
            .collect();
        self.paginate(&children, token)
    }

    fn policies_for_target_page(
        &self,
        target_id: &str,
        policy_type: PolicyType,
        token: Option<&str>,
    ) -> Result<Page<PolicySummary>, SourceError> {
        if !self.node_exists(target_id) {
            return Err(SourceError::NotFound(format!("target {target_id}")));
        }
        let attached: Vec<PolicySummary> = self
            .snapshot
            .policies
            .iter()
            .filter(|p| p.policy_type == policy_type && p.targets.iter().any(|t| t == target_id))
            .map(Self::summary)
            .collect();
        self.paginate(&attached, token)
    }

    fn policies_page(
        &self,
        policy_type: PolicyType,
        token: Option<&str>,
    ) -> Result<Page<PolicySummary>, SourceError> {
        let all: Vec<PolicySummary> = self
            .snapshot
            .policies
            .iter()
            .filter(|p| p.policy_type == policy_type)
            .map(Self::summary)
            .collect();
        self.paginate(&all, token)
    }

    fn policy_content(&self, policy_id: &str) -> Result<String, SourceError> {
        let policy = self
            .snapshot
            .policies
            .iter()
            .find(|p| p.id == policy_id)
            .ok_or_else(|| SourceError::NotFound(format!("policy {policy_id}")))?;
        serde_json::to_string(&policy.content).map_err(|e| SourceError::Other(e.to_string()))
    }
}

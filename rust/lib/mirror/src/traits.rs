use crate::error::SourceError;
use crate::model::{ChildKind, ChildNode, NodeDescription, PolicySummary, PolicyType};

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token for the next page; `None` on the last page.
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

/// OrgSource is the read interface to the live organization.
///
/// Implementors provide the page-level calls; the `list_*` methods drain
/// pagination so callers always see fully materialized lists. Errors are
/// reported as [`SourceError`] and never retried here.
pub trait OrgSource {
    /// Ids of the organization roots.
    fn roots(&self) -> Result<Vec<String>, SourceError>;

    /// Kind and display name of a node.
    fn describe_node(&self, node_id: &str) -> Result<NodeDescription, SourceError>;

    /// One page of the children of `parent_id` of the given kind.
    fn children_page(
        &self,
        parent_id: &str,
        kind: ChildKind,
        token: Option<&str>,
    ) -> Result<Page<ChildNode>, SourceError>;

    /// One page of the policies of `policy_type` attached directly to `target_id`.
    fn policies_for_target_page(
        &self,
        target_id: &str,
        policy_type: PolicyType,
        token: Option<&str>,
    ) -> Result<Page<PolicySummary>, SourceError>;

    /// One page of every policy of `policy_type` in the organization.
    fn policies_page(
        &self,
        policy_type: PolicyType,
        token: Option<&str>,
    ) -> Result<Page<PolicySummary>, SourceError>;

    /// Raw JSON document of a policy.
    fn policy_content(&self, policy_id: &str) -> Result<String, SourceError>;

    /// All children of `parent_id`: OUs first, then accounts.
    fn list_children(&self, parent_id: &str) -> Result<Vec<ChildNode>, SourceError> {
        let mut children = Vec::new();
        for kind in ChildKind::ALL {
            children.extend(drain_pages(|token| {
                self.children_page(parent_id, kind, token)
            })?);
        }
        Ok(children)
    }

    fn list_attachments(
        &self,
        target_id: &str,
        policy_type: PolicyType,
    ) -> Result<Vec<PolicySummary>, SourceError> {
        drain_pages(|token| self.policies_for_target_page(target_id, policy_type, token))
    }

    fn list_policies(&self, policy_type: PolicyType) -> Result<Vec<PolicySummary>, SourceError> {
        drain_pages(|token| self.policies_page(policy_type, token))
    }
}

/// Follow `next_token` until the last page.
pub fn drain_pages<T, F>(mut fetch: F) -> Result<Vec<T>, SourceError>
where
    F: FnMut(Option<&str>) -> Result<Page<T>, SourceError>,
{
    let mut items = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = fetch(token.as_deref())?;
        items.extend(page.items);
        match page.next_token {
            Some(next) => token = Some(next),
            None => return Ok(items),
        }
    }
}

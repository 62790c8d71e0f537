use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Naming;
use crate::error::{MirrorError, SourceError};
use crate::frequency::AttachmentFrequency;
use crate::layout::{MirrorFile, MirrorLayout, MirrorMarker};
use crate::model::{HierarchyNode, PolicySummary, PolicyType};
use crate::traits::OrgSource;

/// An attachment as reported by some source.
pub trait Attached {
    fn policy_name(&self) -> &str;
    fn is_externally_managed(&self, naming: &Naming) -> bool;
}

impl Attached for PolicySummary {
    fn policy_name(&self) -> &str {
        &self.name
    }

    fn is_externally_managed(&self, naming: &Naming) -> bool {
        naming.is_externally_managed(&self.name)
    }
}

impl Attached for MirrorFile {
    fn policy_name(&self) -> &str {
        &self.policy_name
    }

    fn is_externally_managed(&self, _naming: &Naming) -> bool {
        self.marker == MirrorMarker::Placeholder
    }
}

/// Where the walk reads each node's attachments from.
pub trait AttachmentSource {
    type Attachment: Attached;

    fn attachments(
        &self,
        node: &HierarchyNode,
        location: &Path,
    ) -> Result<Vec<Self::Attachment>, MirrorError>;
}

/// Attachments as listed by the organization API.
pub struct LiveAttachments<'a, S: OrgSource + ?Sized> {
    source: &'a S,
    policy_type: PolicyType,
}

impl<'a, S: OrgSource + ?Sized> LiveAttachments<'a, S> {
    pub fn new(source: &'a S, policy_type: PolicyType) -> Self {
        Self {
            source,
            policy_type,
        }
    }
}

impl<S: OrgSource + ?Sized> AttachmentSource for LiveAttachments<'_, S> {
    type Attachment = PolicySummary;

    fn attachments(
        &self,
        node: &HierarchyNode,
        _location: &Path,
    ) -> Result<Vec<PolicySummary>, MirrorError> {
        Ok(self.source.list_attachments(&node.id, self.policy_type)?)
    }
}

/// Attachments as found in the mirror directory of each node.
pub struct MirrorAttachments<'a> {
    layout: &'a MirrorLayout,
    policy_type: PolicyType,
}

impl<'a> MirrorAttachments<'a> {
    pub fn new(layout: &'a MirrorLayout, policy_type: PolicyType) -> Self {
        Self {
            layout,
            policy_type,
        }
    }
}

impl AttachmentSource for MirrorAttachments<'_> {
    type Attachment = MirrorFile;

    fn attachments(
        &self,
        node: &HierarchyNode,
        location: &Path,
    ) -> Result<Vec<MirrorFile>, MirrorError> {
        self.layout.read_node(node, location, self.policy_type)
    }
}

/// One step of a walk.
pub struct NodeVisit<'a, A> {
    pub node: &'a HierarchyNode,
    /// Mirror directory of the node.
    pub location: &'a Path,
    pub attachments: Vec<A>,
}

/// Materialize the hierarchy under `root_id`.
///
/// Children are listed OUs first, then accounts. Accounts are never asked
/// for children. A node reached twice means the source reports a cycle or a
/// duplicate id, and fails the fetch.
pub fn fetch_hierarchy<S: OrgSource + ?Sized>(
    source: &S,
    root_id: &str,
) -> Result<HierarchyNode, MirrorError> {
    let description = source.describe_node(root_id)?;
    let mut root = HierarchyNode::leaf(root_id, description.kind, description.name);
    let mut seen = BTreeSet::from([root_id.to_string()]);
    fill_children(source, &mut root, &mut seen)?;
    debug!("fetched hierarchy under {} ({} nodes)", root_id, root.node_count());
    Ok(root)
}

fn fill_children<S: OrgSource + ?Sized>(
    source: &S,
    node: &mut HierarchyNode,
    seen: &mut BTreeSet<String>,
) -> Result<(), MirrorError> {
    if node.kind.is_leaf() {
        return Ok(());
    }
    for child in source.list_children(&node.id)? {
        if !seen.insert(child.id.clone()) {
            return Err(SourceError::Other(format!(
                "node {} is listed more than once under {}",
                child.id, node.id
            ))
            .into());
        }
        let mut child_node = HierarchyNode::leaf(child.id, child.kind, child.name);
        fill_children(source, &mut child_node, seen)?;
        node.children.push(child_node);
    }
    Ok(())
}

/// Id of the first organization root.
pub fn first_root<S: OrgSource + ?Sized>(source: &S) -> Result<String, MirrorError> {
    source
        .roots()?
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::NotFound("organization root".to_string()).into())
}

/// Pre-order walk of `root`, calling `visit` for every node before its
/// children. Order is deterministic: it follows `children` exactly.
pub fn walk<S, F>(
    root: &HierarchyNode,
    layout: &MirrorLayout,
    source: &S,
    visit: &mut F,
) -> Result<(), MirrorError>
where
    S: AttachmentSource,
    F: FnMut(NodeVisit<'_, S::Attachment>) -> Result<(), MirrorError>,
{
    walk_node(root, layout.root_location(), layout, source, visit)
}

fn walk_node<S, F>(
    node: &HierarchyNode,
    location: PathBuf,
    layout: &MirrorLayout,
    source: &S,
    visit: &mut F,
) -> Result<(), MirrorError>
where
    S: AttachmentSource,
    F: FnMut(NodeVisit<'_, S::Attachment>) -> Result<(), MirrorError>,
{
    let attachments = source.attachments(node, &location)?;
    visit(NodeVisit {
        node,
        location: &location,
        attachments,
    })?;

    if node.kind.is_leaf() {
        return Ok(());
    }
    for child in &node.children {
        let child_location = layout.child_location(&location, child);
        walk_node(child, child_location, layout, source, visit)?;
    }
    Ok(())
}

/// Counting pass: attachment points per customer policy name.
pub fn count_frequency<S: AttachmentSource>(
    root: &HierarchyNode,
    layout: &MirrorLayout,
    source: &S,
) -> Result<AttachmentFrequency, MirrorError> {
    let naming = layout.naming();
    let mut frequency = AttachmentFrequency::new();
    walk(root, layout, source, &mut |visit: NodeVisit<'_, S::Attachment>| {
        for attachment in &visit.attachments {
            if !attachment.is_externally_managed(naming) {
                frequency.record(attachment.policy_name());
            }
        }
        Ok(())
    })?;
    debug!("counted {} distinct policies", frequency.len());
    Ok(frequency)
}

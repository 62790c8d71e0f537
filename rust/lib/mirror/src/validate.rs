use std::path::Path;

use tracing::info;

use crate::config::AttachmentLimits;
use crate::error::MirrorError;
use crate::model::{AttachmentKind, HierarchyNode, NodeKind, PolicyType};

impl NodeKind {
    /// Slots the platform reserves on nodes of this kind. Guardrails are only
    /// auto-attached to OUs.
    pub fn reserved_slots(self, limits: &AttachmentLimits) -> usize {
        match self {
            NodeKind::OrganizationalUnit => limits.reserved_ou_slots,
            NodeKind::Root | NodeKind::Account => 0,
        }
    }
}

/// Enforces per-node attachment bounds. Stateless; a failure aborts the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentCountValidator {
    limits: AttachmentLimits,
}

impl AttachmentCountValidator {
    pub fn new(limits: AttachmentLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &AttachmentLimits {
        &self.limits
    }

    /// Customer attachments allowed on a node of `kind`.
    pub fn allowed(&self, kind: NodeKind) -> usize {
        self.limits
            .max_attachments
            .saturating_sub(kind.reserved_slots(&self.limits))
    }

    /// Check the attachments present at one node. Externally managed
    /// attachments are not counted.
    pub fn check(
        &self,
        node: &HierarchyNode,
        location: &Path,
        policy_type: PolicyType,
        kinds: &[AttachmentKind],
    ) -> Result<(), MirrorError> {
        let count = kinds.iter().filter(|k| k.is_customer()).count();

        for allowed in [self.limits.max_attachments, self.allowed(node.kind)] {
            if count > allowed {
                return Err(MirrorError::StructuralViolation {
                    path: location.to_path_buf(),
                    node_id: node.id.clone(),
                    kind: node.kind,
                    policy_type,
                    count,
                    allowed,
                });
            }
        }

        info!(
            "validated {} {} attachment(s) for {}",
            count,
            policy_type,
            location.display()
        );
        Ok(())
    }
}

use tracing::{debug, info};

use crate::builder::AttachmentMapBuilder;
use crate::config::MirrorConfig;
use crate::error::MirrorError;
use crate::frequency::AttachmentFrequency;
use crate::layout::{MirrorFile, MirrorLayout, MirrorMarker};
use crate::model::{AttachmentKind, AttachmentMap, HierarchyNode, PolicyType};
use crate::resolver::{AttachmentRegistry, PolicyReference, SharedPolicyResolver};
use crate::traits::OrgSource;
use crate::validate::AttachmentCountValidator;
use crate::walker::{count_frequency, fetch_hierarchy, first_root, walk, MirrorAttachments, NodeVisit};

/// MirrorTreeWalker resolves the mirror into an attachment map.
///
/// The live hierarchy supplies node ids and the expected directory of every
/// node; the mirror supplies the attachments and is authoritative for
/// attachment frequency.
pub struct MirrorTreeWalker<'a, S: OrgSource + ?Sized> {
    source: &'a S,
    layout: MirrorLayout,
    validator: AttachmentCountValidator,
}

impl<'a, S: OrgSource + ?Sized> MirrorTreeWalker<'a, S> {
    pub fn new(source: &'a S, config: &MirrorConfig) -> Self {
        Self {
            source,
            layout: config.layout(),
            validator: AttachmentCountValidator::new(config.limits),
        }
    }

    pub fn resolve(&self, policy_type: PolicyType) -> Result<AttachmentMap, MirrorError> {
        let root_id = first_root(self.source)?;
        let hierarchy = fetch_hierarchy(self.source, &root_id)?;
        self.resolve_hierarchy(&hierarchy, policy_type)
    }

    pub fn resolve_hierarchy(
        &self,
        hierarchy: &HierarchyNode,
        policy_type: PolicyType,
    ) -> Result<AttachmentMap, MirrorError> {
        let layout = &self.layout;
        let mirror = MirrorAttachments::new(layout, policy_type);
        let frequency = count_frequency(hierarchy, layout, &mirror)?;

        let resolver = SharedPolicyResolver::new(layout, &frequency);
        let mut registry = AttachmentRegistry::new(policy_type);

        info!(
            "scanning {} for {} attachments",
            layout.root_location().display(),
            policy_type
        );
        walk(hierarchy, layout, &mirror, &mut |visit: NodeVisit<'_, MirrorFile>| {
            self.resolve_node(&visit, policy_type, &frequency, &resolver, &mut registry)
        })?;

        let map = AttachmentMapBuilder::build(registry);
        info!("resolved {} {} policies", map.len(), policy_type);
        Ok(map)
    }

    fn resolve_node(
        &self,
        visit: &NodeVisit<'_, MirrorFile>,
        policy_type: PolicyType,
        frequency: &AttachmentFrequency,
        resolver: &SharedPolicyResolver<'_>,
        registry: &mut AttachmentRegistry,
    ) -> Result<(), MirrorError> {
        let mut kinds = Vec::with_capacity(visit.attachments.len());
        for file in &visit.attachments {
            let kind = match file.marker {
                MirrorMarker::Placeholder => AttachmentKind::ExternallyManaged,
                MirrorMarker::SharedPointer => AttachmentKind::Shared,
                MirrorMarker::Direct if frequency.is_shared(&file.policy_name) => {
                    AttachmentKind::Shared
                }
                MirrorMarker::Direct => AttachmentKind::Owned,
            };
            if kind.is_customer() && file.policy_name.chars().any(char::is_whitespace) {
                return Err(MirrorError::InvalidPolicyName {
                    name: file.policy_name.clone(),
                    policy_type,
                    path: file.path.clone(),
                });
            }
            kinds.push(kind);
        }
        self.validator
            .check(visit.node, visit.location, policy_type, &kinds)?;

        for file in &visit.attachments {
            let reference = match file.marker {
                MirrorMarker::Placeholder => {
                    debug!("skipping externally managed {}", file.path.display());
                    continue;
                }
                MirrorMarker::Direct => PolicyReference::Direct {
                    content_path: &file.path,
                },
                MirrorMarker::SharedPointer => PolicyReference::SharedPointer,
            };
            resolver.resolve(registry, &file.policy_name, reference, &visit.node.id)?;
        }
        Ok(())
    }
}

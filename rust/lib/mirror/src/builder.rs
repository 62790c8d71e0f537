use crate::model::AttachmentMap;
use crate::resolver::AttachmentRegistry;

/// Turns the registry of a completed walk into the ordered attachment map.
///
/// No validation happens here; every entry already passed the count and
/// resolution checks during the walk.
pub struct AttachmentMapBuilder;

impl AttachmentMapBuilder {
    /// One entry per distinct policy name, ascending by name.
    pub fn build(registry: AttachmentRegistry) -> AttachmentMap {
        let policy_type = registry.policy_type();
        let mut entries: Vec<_> = registry.into_entries().collect();
        // Registry iteration is already name-ordered; keep the guarantee local.
        entries.sort_by(|a, b| a.policy_name.cmp(&b.policy_name));
        AttachmentMap {
            policy_type,
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Naming;
    use crate::frequency::AttachmentFrequency;
    use crate::layout::MirrorLayout;
    use crate::model::PolicyType;
    use crate::resolver::{PolicyReference, SharedPolicyResolver};

    #[test]
    fn builds_sorted_map_with_type() {
        let layout = MirrorLayout::new("m", Naming::default());
        let freq: AttachmentFrequency = ["b", "b", "a"].into_iter().collect();
        let resolver = SharedPolicyResolver::new(&layout, &freq);
        let mut registry = AttachmentRegistry::new(PolicyType::ResourceControl);
        resolver
            .resolve(&mut registry, "b", PolicyReference::SharedPointer, "ou-2")
            .unwrap();
        resolver
            .resolve(&mut registry, "b", PolicyReference::SharedPointer, "ou-1")
            .unwrap();
        resolver
            .resolve(&mut registry, "a", PolicyReference::SharedPointer, "ou-1")
            .unwrap();

        let map = AttachmentMapBuilder::build(registry);
        assert_eq!(map.policy_type, PolicyType::ResourceControl);
        let names: Vec<_> = map.iter().map(|e| e.policy_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(map.get("b").unwrap().targets, vec!["ou-2", "ou-1"]);
        assert!(map.iter().all(|e| e.policy_type == PolicyType::ResourceControl));
    }

    #[test]
    fn empty_registry_builds_empty_map() {
        let map = AttachmentMapBuilder::build(AttachmentRegistry::new(PolicyType::ServiceControl));
        assert!(map.is_empty());
    }
}

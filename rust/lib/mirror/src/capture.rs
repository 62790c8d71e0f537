use std::collections::BTreeSet;
use std::path::Path;

use tracing::info;

use crate::builder::AttachmentMapBuilder;
use crate::config::MirrorConfig;
use crate::error::MirrorError;
use crate::frequency::AttachmentFrequency;
use crate::layout::{MirrorLayout, MirrorMarker, PolicyDocument};
use crate::model::{AttachmentKind, AttachmentMap, HierarchyNode, PolicySummary, PolicyType};
use crate::resolver::{AttachmentRegistry, PolicyReference, SharedPolicyResolver};
use crate::traits::OrgSource;
use crate::validate::AttachmentCountValidator;
use crate::walker::{count_frequency, fetch_hierarchy, first_root, walk, LiveAttachments, NodeVisit};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Only refresh externally managed placeholders; leave customer content
    /// and shared pointers untouched.
    pub skip_customer_refresh: bool,
}

/// One existing attachment, for import into the infrastructure state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentImport {
    pub policy_name: String,
    pub policy_id: String,
    pub target_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    pub map: AttachmentMap,
    /// Every customer policy of the type, attached or not.
    pub policies: Vec<PolicySummary>,
    /// Attachments in traversal order.
    pub imports: Vec<AttachmentImport>,
    pub files_written: usize,
    /// Stale customer artifacts deleted from node directories and the pool.
    pub files_removed: usize,
}

/// OrgTreeWalker captures the live organization into the mirror.
pub struct OrgTreeWalker<'a, S: OrgSource + ?Sized> {
    source: &'a S,
    layout: MirrorLayout,
    validator: AttachmentCountValidator,
    options: CaptureOptions,
}

impl<'a, S: OrgSource + ?Sized> OrgTreeWalker<'a, S> {
    pub fn new(source: &'a S, config: &MirrorConfig, options: CaptureOptions) -> Self {
        Self {
            source,
            layout: config.layout(),
            validator: AttachmentCountValidator::new(config.limits),
            options,
        }
    }

    /// Capture one policy type, fetching the hierarchy first.
    pub fn capture(&self, policy_type: PolicyType) -> Result<CaptureReport, MirrorError> {
        let root_id = first_root(self.source)?;
        let hierarchy = fetch_hierarchy(self.source, &root_id)?;
        self.capture_hierarchy(&hierarchy, policy_type)
    }

    /// Capture one policy type over an already fetched hierarchy.
    pub fn capture_hierarchy(
        &self,
        hierarchy: &HierarchyNode,
        policy_type: PolicyType,
    ) -> Result<CaptureReport, MirrorError> {
        let layout = &self.layout;
        let naming = layout.naming();
        layout.ensure_dir(layout.root())?;
        layout.ensure_dir(&layout.shared_dir())?;

        let policies: Vec<PolicySummary> = self
            .source
            .list_policies(policy_type)?
            .into_iter()
            .filter(|p| !naming.is_externally_managed(&p.name))
            .collect();

        let live = LiveAttachments::new(self.source, policy_type);
        let frequency = count_frequency(hierarchy, layout, &live)?;
        info!(
            "capturing {} {} policies ({} attached) into {}",
            policies.len(),
            policy_type,
            frequency.len(),
            layout.root().display()
        );

        let resolver = SharedPolicyResolver::new(layout, &frequency);
        let mut registry = AttachmentRegistry::new(policy_type);
        let mut state = CaptureState::default();

        walk(hierarchy, layout, &live, &mut |visit: NodeVisit<'_, PolicySummary>| {
            self.capture_node(
                &visit,
                policy_type,
                &frequency,
                &resolver,
                &mut registry,
                &mut state,
            )
        })?;

        if !self.options.skip_customer_refresh {
            for file in layout.shared_files(policy_type)? {
                if !state.shared_written.contains(&file.policy_name) {
                    info!("removing stale shared content {}", file.path.display());
                    layout.remove_file(&file.path)?;
                    state.files_removed += 1;
                }
            }
        }

        info!(
            "captured {} {} policies, wrote {} files, removed {}",
            registry.len(),
            policy_type,
            state.files_written,
            state.files_removed
        );
        Ok(CaptureReport {
            map: AttachmentMapBuilder::build(registry),
            policies,
            imports: state.imports,
            files_written: state.files_written,
            files_removed: state.files_removed,
        })
    }

    fn capture_node(
        &self,
        visit: &NodeVisit<'_, PolicySummary>,
        policy_type: PolicyType,
        frequency: &AttachmentFrequency,
        resolver: &SharedPolicyResolver<'_>,
        registry: &mut AttachmentRegistry,
        state: &mut CaptureState,
    ) -> Result<(), MirrorError> {
        let layout = &self.layout;
        let node = visit.node;
        let location = visit.location;

        let classified: Vec<(&PolicySummary, AttachmentKind)> = visit
            .attachments
            .iter()
            .map(|p| (p, frequency.classify(&p.name, layout.naming())))
            .collect();
        let kinds: Vec<AttachmentKind> = classified.iter().map(|(_, k)| *k).collect();
        self.validator.check(node, location, policy_type, &kinds)?;

        layout.ensure_dir(location)?;
        let refresh = !self.options.skip_customer_refresh;
        if refresh {
            state.files_removed += self.prune_node(node, location, policy_type, &classified)?;
        }

        for (policy, kind) in classified {
            match kind {
                AttachmentKind::ExternallyManaged => {
                    let path = layout.placeholder_path(location, &policy.name);
                    info!("adding externally managed placeholder {}", path.display());
                    layout.write_file(&path, &placeholder_text(policy, layout))?;
                    state.files_written += 1;
                    continue;
                }
                AttachmentKind::Shared => {
                    if refresh {
                        let pointer = layout.shared_pointer_path(location, &policy.name, policy_type);
                        layout.write_file(
                            &pointer,
                            &format!("# This is a placeholder for shared Control Policy {}", policy.name),
                        )?;
                        state.files_written += 1;
                        if state.shared_written.insert(policy.name.clone()) {
                            let target = layout.shared_content_path(&policy.name, policy_type);
                            self.write_content(policy, &target)?;
                            state.files_written += 1;
                        }
                    }
                    resolver.resolve(registry, &policy.name, PolicyReference::SharedPointer, &node.id)?;
                }
                AttachmentKind::Owned => {
                    let target = layout.direct_content_path(location, &policy.name, policy_type);
                    if refresh {
                        self.write_content(policy, &target)?;
                        state.files_written += 1;
                    }
                    resolver.resolve(
                        registry,
                        &policy.name,
                        PolicyReference::Direct { content_path: &target },
                        &node.id,
                    )?;
                }
            }

            state.imports.push(AttachmentImport {
                policy_name: policy.name.clone(),
                policy_id: policy.id.clone(),
                target_id: node.id.clone(),
            });
        }
        Ok(())
    }

    /// Delete customer artifacts the live node no longer calls for: policies
    /// detached since the last capture, and the other form of a policy whose
    /// sharing state changed. Placeholders are left alone.
    fn prune_node(
        &self,
        node: &HierarchyNode,
        location: &Path,
        policy_type: PolicyType,
        classified: &[(&PolicySummary, AttachmentKind)],
    ) -> Result<usize, MirrorError> {
        let mut removed = 0;
        for file in self.layout.read_node(node, location, policy_type)? {
            let live = classified
                .iter()
                .find(|(p, _)| p.name == file.policy_name)
                .map(|(_, kind)| *kind);
            let keep = match file.marker {
                MirrorMarker::Placeholder => true,
                MirrorMarker::Direct => live == Some(AttachmentKind::Owned),
                MirrorMarker::SharedPointer => live == Some(AttachmentKind::Shared),
            };
            if !keep {
                info!("removing stale {}", file.path.display());
                self.layout.remove_file(&file.path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn write_content(&self, policy: &PolicySummary, target: &Path) -> Result<(), MirrorError> {
        let raw = self.source.policy_content(&policy.id)?;
        let document = PolicyDocument {
            policy: serde_json::from_str(&raw).map_err(|e| {
                MirrorError::Serialization(format!("policy {} content: {}", policy.name, e))
            })?,
            description: policy.effective_description().to_string(),
        };
        info!("writing control policy to {}", target.display());
        self.layout.write_file(target, &document.to_pretty_json()?)
    }
}

#[derive(Debug, Default)]
struct CaptureState {
    shared_written: BTreeSet<String>,
    imports: Vec<AttachmentImport>,
    files_written: usize,
    files_removed: usize,
}

fn placeholder_text(policy: &PolicySummary, layout: &MirrorLayout) -> String {
    if policy.name == layout.naming().default_allow_policy {
        format!("# Placeholder for {}", policy.name)
    } else {
        format!("# This is a placeholder for the guardrail policy {}", policy.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::error_code;
    use crate::memory::{InMemoryOrg, OrgSnapshot};
    use std::fs;

    const SCP: PolicyType = PolicyType::ServiceControl;

    fn org() -> InMemoryOrg {
        let snapshot = OrgSnapshot::new("r-1")
            .with_ou("ou-a", "A", "r-1")
            .with_ou("ou-b", "B", "r-1")
            .with_account("111111111111", "audit", "ou-a")
            .with_policy("p-1", "Deny-Root-User", SCP, &["ou-a", "ou-b"])
            .with_policy("p-2", "Baseline", SCP, &["r-1"])
            .with_policy("p-3", "FullAWSAccess", SCP, &["r-1", "ou-a", "ou-b", "111111111111"])
            .with_policy("p-4", "aws-guardrails-x1", SCP, &["ou-a"])
            .with_policy("p-5", "Unattached", SCP, &[]);
        InMemoryOrg::new(snapshot).with_page_size(2)
    }

    fn config(root: &Path) -> MirrorConfig {
        MirrorConfig {
            mirror_dir: root.join("mirror"),
            ..Default::default()
        }
    }

    #[test]
    fn capture_writes_mirror_layout() {
        let dir = tempfile::tempdir().unwrap();
        let org = org();
        let config = config(dir.path());
        let walker = OrgTreeWalker::new(&org, &config, CaptureOptions::default());
        let report = walker.capture(SCP).unwrap();

        let m = config.mirror_dir.clone();
        assert!(m.join("ROOT/Baseline.scp").is_file());
        assert!(m.join("ROOT/FullAWSAccess.placeholder").is_file());
        assert!(m.join("ROOT/A/Deny-Root-User.scp.shared").is_file());
        assert!(m.join("ROOT/B/Deny-Root-User.scp.shared").is_file());
        assert!(m.join("ROOT/A/aws-guardrails-x1.guardrail").is_file());
        assert!(m.join("ROOT/A/audit_ACCOUNT/FullAWSAccess.placeholder").is_file());
        assert!(m.join("SHARED/Deny-Root-User.scp").is_file());
        assert!(!m.join("ROOT/A/Deny-Root-User.scp").exists());

        let doc: PolicyDocument =
            serde_json::from_str(&fs::read_to_string(m.join("ROOT/Baseline.scp")).unwrap()).unwrap();
        assert_eq!(doc.description, "Baseline");
        assert_eq!(doc.policy["Version"], "2012-10-17");

        assert_eq!(report.map.len(), 2);
        let shared = report.map.get("Deny-Root-User").unwrap();
        assert_eq!(shared.canonical_path, m.join("SHARED/Deny-Root-User.scp"));
        assert_eq!(shared.targets, vec!["ou-a", "ou-b"]);
        assert_eq!(
            report.map.get("Baseline").unwrap().canonical_path,
            m.join("ROOT/Baseline.scp")
        );

        let names: Vec<_> = report.policies.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Deny-Root-User", "Baseline", "Unattached"]);
        let imports: Vec<_> = report
            .imports
            .iter()
            .map(|i| (i.target_id.as_str(), i.policy_id.as_str()))
            .collect();
        assert_eq!(imports, vec![("r-1", "p-2"), ("ou-a", "p-1"), ("ou-b", "p-1")]);
        // 4 placeholders + 1 guardrail + Baseline + 2 pointers + 1 shared body
        assert_eq!(report.files_written, 9);
    }

    #[test]
    fn skip_customer_refresh_only_writes_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let org = org();
        let config = config(dir.path());
        let options = CaptureOptions {
            skip_customer_refresh: true,
        };
        let report = OrgTreeWalker::new(&org, &config, options)
            .capture(SCP)
            .unwrap();
        let m = config.mirror_dir.clone();
        assert!(m.join("ROOT/FullAWSAccess.placeholder").is_file());
        assert!(!m.join("ROOT/Baseline.scp").exists());
        assert!(!m.join("SHARED/Deny-Root-User.scp").exists());
        assert_eq!(report.files_written, 5);
    }

    #[test]
    fn overfull_ou_aborts_capture() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = OrgSnapshot::new("r-1")
            .with_ou("ou-a", "A", "r-1")
            .with_policy("p-1", "One", SCP, &["ou-a"])
            .with_policy("p-2", "Two", SCP, &["ou-a"])
            .with_policy("p-3", "Three", SCP, &["ou-a"]);
        let org = InMemoryOrg::new(snapshot);
        let config = config(dir.path());
        let err = OrgTreeWalker::new(&org, &config, CaptureOptions::default())
            .capture(SCP)
            .unwrap_err();
        assert_eq!(err.error_code(), error_code::STRUCTURAL_VIOLATION);
        assert!(!config.mirror_dir.join("ROOT/A").exists());
    }
}

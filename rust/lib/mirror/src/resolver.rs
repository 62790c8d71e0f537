use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::MirrorError;
use crate::frequency::AttachmentFrequency;
use crate::layout::MirrorLayout;
use crate::model::{AttachmentMapEntry, PolicyType};

/// How a node refers to a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyReference<'a> {
    /// The node holds the content at `content_path`.
    Direct { content_path: &'a Path },
    /// The node holds only a pointer into the shared pool.
    SharedPointer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RegistryEntry {
    canonical_path: PathBuf,
    targets: Vec<String>,
    /// First direct content source seen, if any.
    direct_source: Option<PathBuf>,
}

impl RegistryEntry {
    fn new(canonical_path: PathBuf) -> Self {
        Self {
            canonical_path,
            targets: Vec::new(),
            direct_source: None,
        }
    }
}

/// Accumulates resolved attachments for one walk of one policy type.
///
/// Owned by the walk and passed down by `&mut`, so targets found in sibling
/// subtrees land in the same entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRegistry {
    policy_type: PolicyType,
    entries: BTreeMap<String, RegistryEntry>,
}

impl AttachmentRegistry {
    pub fn new(policy_type: PolicyType) -> Self {
        Self {
            policy_type,
            entries: BTreeMap::new(),
        }
    }

    pub fn policy_type(&self) -> PolicyType {
        self.policy_type
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn canonical_path(&self, policy_name: &str) -> Option<&Path> {
        self.entries
            .get(policy_name)
            .map(|e| e.canonical_path.as_path())
    }

    pub fn targets(&self, policy_name: &str) -> Option<&[String]> {
        self.entries.get(policy_name).map(|e| e.targets.as_slice())
    }

    /// Entries in ascending policy-name order.
    pub(crate) fn into_entries(self) -> impl Iterator<Item = AttachmentMapEntry> {
        let policy_type = self.policy_type;
        self.entries
            .into_iter()
            .map(move |(policy_name, entry)| AttachmentMapEntry {
                policy_name,
                policy_type,
                canonical_path: entry.canonical_path,
                targets: entry.targets,
            })
    }
}

/// Folds direct and shared references into a single canonical entry per
/// policy name.
///
/// - A policy attached at more than one node resolves to the shared pool,
///   whichever form each node uses.
/// - A policy attached once resolves to its direct content file.
/// - Two direct content files for one name are a
///   [`MirrorError::DuplicateCanonicalSource`].
/// - A node may attach a policy only once ([`MirrorError::DuplicateTarget`]).
#[derive(Debug, Clone, Copy)]
pub struct SharedPolicyResolver<'a> {
    layout: &'a MirrorLayout,
    frequency: &'a AttachmentFrequency,
}

impl<'a> SharedPolicyResolver<'a> {
    pub fn new(layout: &'a MirrorLayout, frequency: &'a AttachmentFrequency) -> Self {
        Self { layout, frequency }
    }

    pub fn resolve(
        &self,
        registry: &mut AttachmentRegistry,
        policy_name: &str,
        reference: PolicyReference<'_>,
        target_id: &str,
    ) -> Result<(), MirrorError> {
        let policy_type = registry.policy_type;
        let shared_path = self.layout.shared_content_path(policy_name, policy_type);

        if let Some(existing) = registry.entries.get(policy_name) {
            if existing.targets.iter().any(|t| t == target_id) {
                return Err(MirrorError::DuplicateTarget {
                    policy: policy_name.to_string(),
                    policy_type,
                    target: target_id.to_string(),
                });
            }
            if let (PolicyReference::Direct { content_path }, Some(first)) =
                (reference, existing.direct_source.as_ref())
            {
                return Err(MirrorError::DuplicateCanonicalSource {
                    policy: policy_name.to_string(),
                    policy_type,
                    first: first.clone(),
                    second: content_path.to_path_buf(),
                });
            }
        }

        let entry = match reference {
            PolicyReference::Direct { content_path } => {
                let canonical = if self.frequency.is_shared(policy_name) {
                    shared_path
                } else {
                    content_path.to_path_buf()
                };
                let entry = registry
                    .entries
                    .entry(policy_name.to_string())
                    .or_insert_with(|| RegistryEntry::new(canonical));
                entry.direct_source = Some(content_path.to_path_buf());
                entry
            }
            PolicyReference::SharedPointer => {
                if !self.frequency.is_shared(policy_name) {
                    warn!(
                        "{} {} is referenced through the shared pool but attached only once",
                        policy_type, policy_name
                    );
                }
                registry
                    .entries
                    .entry(policy_name.to_string())
                    .or_insert_with(|| RegistryEntry::new(shared_path))
            }
        };

        entry.targets.push(target_id.to_string());
        debug!(
            "resolved {} {} for {} -> {}",
            policy_type,
            policy_name,
            target_id,
            entry.canonical_path.display()
        );
        Ok(())
    }
}

use std::collections::BTreeMap;

use crate::config::Naming;
use crate::model::AttachmentKind;

/// Number of attachment points per policy name across a whole tree.
///
/// Built once by the counting pass and reused by the classifying pass:
/// whether a policy is shared cannot be decided at a single node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentFrequency {
    counts: BTreeMap<String, usize>,
}

impl AttachmentFrequency {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, policy_name: &str) {
        *self.counts.entry(policy_name.to_string()).or_insert(0) += 1;
    }

    pub fn count(&self, policy_name: &str) -> usize {
        self.counts.get(policy_name).copied().unwrap_or(0)
    }

    pub fn is_shared(&self, policy_name: &str) -> bool {
        self.count(policy_name) > 1
    }

    /// Number of distinct policy names seen.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn classify(&self, policy_name: &str, naming: &Naming) -> AttachmentKind {
        if naming.is_externally_managed(policy_name) {
            AttachmentKind::ExternallyManaged
        } else if self.is_shared(policy_name) {
            AttachmentKind::Shared
        } else {
            AttachmentKind::Owned
        }
    }
}

impl<'a> FromIterator<&'a str> for AttachmentFrequency {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut freq = AttachmentFrequency::new();
        for name in iter {
            freq.record(name);
        }
        freq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_count_and_name() {
        let naming = Naming::default();
        let freq: AttachmentFrequency = ["Deny-Root-User", "Deny-Root-User", "Baseline"]
            .into_iter()
            .collect();
        assert_eq!(freq.len(), 2);
        assert_eq!(freq.count("Deny-Root-User"), 2);
        assert_eq!(freq.count("missing"), 0);
        assert_eq!(freq.classify("Deny-Root-User", &naming), AttachmentKind::Shared);
        assert_eq!(freq.classify("Baseline", &naming), AttachmentKind::Owned);
        assert_eq!(
            freq.classify("FullAWSAccess", &naming),
            AttachmentKind::ExternallyManaged
        );
    }
}

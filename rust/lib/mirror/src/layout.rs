use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Naming;
use crate::error::MirrorError;
use crate::model::{HierarchyNode, NodeKind, PolicyType};

const SHARED_EXT: &str = "shared";
const PLACEHOLDER_EXT: &str = "placeholder";
const GUARDRAIL_EXT: &str = "guardrail";

/// MirrorLayout maps hierarchy nodes and policies onto the mirror directory:
///
/// ```text
/// control_policies_ou_structure/
/// ├── SHARED/Deny-Root-User.scp             → shared pool content
/// └── ROOT/
///     ├── FullAWSAccess.placeholder         → externally managed
///     ├── Baseline.scp                      → direct content
///     ├── Security/
///     │   ├── aws-guardrails-x1.guardrail   → externally managed
///     │   └── Deny-Root-User.scp.shared     → pointer into SHARED
///     └── audit_ACCOUNT/
///         └── Deny-Root-User.scp.shared
/// ```
///
/// Content files hold a [`PolicyDocument`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorLayout {
    root: PathBuf,
    naming: Naming,
}

/// What a file in a node directory stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorMarker {
    /// `<name>.<type>`: the node holds the policy content.
    Direct,
    /// `<name>.<type>.shared`: content lives in the shared pool.
    SharedPointer,
    /// `<name>.placeholder` / `<name>.guardrail`: externally managed.
    Placeholder,
}

/// One attachment artifact found in a node directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorFile {
    pub policy_name: String,
    pub marker: MirrorMarker,
    pub path: PathBuf,
}

/// On-disk body of a content file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub policy: serde_json::Value,
    pub description: String,
}

impl PolicyDocument {
    /// Pretty JSON with four-space indentation.
    pub fn to_pretty_json(&self) -> Result<String, MirrorError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)
            .map_err(|e| MirrorError::Serialization(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| MirrorError::Serialization(e.to_string()))
    }
}

impl MirrorLayout {
    pub fn new(root: impl Into<PathBuf>, naming: Naming) -> Self {
        Self {
            root: root.into(),
            naming,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn naming(&self) -> &Naming {
        &self.naming
    }

    pub fn shared_dir(&self) -> PathBuf {
        self.root.join(&self.naming.shared_dir)
    }

    /// Directory of the hierarchy root.
    pub fn root_location(&self) -> PathBuf {
        self.root.join(&self.naming.root_dir)
    }

    /// Directory of `child` under its parent's directory.
    pub fn child_location(&self, parent: &Path, child: &HierarchyNode) -> PathBuf {
        match child.kind {
            NodeKind::Account => {
                parent.join(format!("{}{}", child.name, self.naming.account_suffix))
            }
            NodeKind::OrganizationalUnit | NodeKind::Root => parent.join(&child.name),
        }
    }

    pub fn shared_content_path(&self, policy_name: &str, policy_type: PolicyType) -> PathBuf {
        self.shared_dir()
            .join(format!("{}.{}", policy_name, policy_type.short_name()))
    }

    pub fn direct_content_path(
        &self,
        location: &Path,
        policy_name: &str,
        policy_type: PolicyType,
    ) -> PathBuf {
        location.join(format!("{}.{}", policy_name, policy_type.short_name()))
    }

    pub fn shared_pointer_path(
        &self,
        location: &Path,
        policy_name: &str,
        policy_type: PolicyType,
    ) -> PathBuf {
        location.join(format!(
            "{}.{}.{}",
            policy_name,
            policy_type.short_name(),
            SHARED_EXT
        ))
    }

    /// Placeholder file for an externally managed policy.
    pub fn placeholder_path(&self, location: &Path, policy_name: &str) -> PathBuf {
        if policy_name == self.naming.default_allow_policy {
            location.join(format!("{}.{}", policy_name, PLACEHOLDER_EXT))
        } else {
            location.join(format!("{}.{}", policy_name, GUARDRAIL_EXT))
        }
    }

    /// Classify a file name found in a node directory. Files of the other
    /// policy type and unrelated files yield `None`.
    pub fn classify_file_name(
        &self,
        file_name: &str,
        policy_type: PolicyType,
    ) -> Option<(String, MirrorMarker)> {
        let short = policy_type.short_name();
        if let Some(stem) = file_name
            .strip_suffix(SHARED_EXT)
            .and_then(|s| s.strip_suffix('.'))
            .and_then(|s| s.strip_suffix(short))
            .and_then(|s| s.strip_suffix('.'))
        {
            return non_empty(stem).map(|n| (n, MirrorMarker::SharedPointer));
        }
        if let Some(stem) = file_name
            .strip_suffix(short)
            .and_then(|s| s.strip_suffix('.'))
        {
            return non_empty(stem).map(|n| (n, MirrorMarker::Direct));
        }
        for ext in [PLACEHOLDER_EXT, GUARDRAIL_EXT] {
            if let Some(stem) = file_name.strip_suffix(ext).and_then(|s| s.strip_suffix('.')) {
                return non_empty(stem).map(|n| (n, MirrorMarker::Placeholder));
            }
        }
        None
    }

    /// List the attachment artifacts of one node, sorted by file name.
    ///
    /// A missing directory is a [`MirrorError::MissingMirrorNode`], never an
    /// empty attachment set.
    pub fn read_node(
        &self,
        node: &HierarchyNode,
        location: &Path,
        policy_type: PolicyType,
    ) -> Result<Vec<MirrorFile>, MirrorError> {
        if !location.is_dir() {
            return Err(MirrorError::MissingMirrorNode {
                node_id: node.id.clone(),
                expected: location.to_path_buf(),
            });
        }
        self.list_files(location, policy_type)
    }

    /// Content files of the shared pool for one policy type. A pool that
    /// does not exist yet is empty.
    pub fn shared_files(&self, policy_type: PolicyType) -> Result<Vec<MirrorFile>, MirrorError> {
        let dir = self.shared_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = self.list_files(&dir, policy_type)?;
        files.retain(|f| f.marker == MirrorMarker::Direct);
        Ok(files)
    }

    fn list_files(
        &self,
        location: &Path,
        policy_type: PolicyType,
    ) -> Result<Vec<MirrorFile>, MirrorError> {
        let entries = fs::read_dir(location).map_err(|e| MirrorError::io(location, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MirrorError::io(location, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
                debug!("skipping non UTF-8 file name {:?}", path);
                continue;
            };
            if let Some((policy_name, marker)) = self.classify_file_name(file_name, policy_type) {
                files.push(MirrorFile {
                    policy_name,
                    marker,
                    path,
                });
            }
        }

        // read_dir order is platform dependent.
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    pub(crate) fn ensure_dir(&self, dir: &Path) -> Result<(), MirrorError> {
        fs::create_dir_all(dir).map_err(|e| MirrorError::io(dir, e))
    }

    pub(crate) fn remove_file(&self, path: &Path) -> Result<(), MirrorError> {
        debug!("removing {}", path.display());
        fs::remove_file(path).map_err(|e| MirrorError::io(path, e))
    }

    pub(crate) fn write_file(&self, path: &Path, contents: &str) -> Result<(), MirrorError> {
        debug!("writing {}", path.display());
        fs::write(path, contents).map_err(|e| MirrorError::io(path, e))
    }
}

fn non_empty(stem: &str) -> Option<String> {
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

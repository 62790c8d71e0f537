use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MirrorError;
use crate::layout::MirrorLayout;

/// Maximum custom policies the provider lets you attach to one target.
pub const MAX_CUSTOM_POLICY_ATTACHMENTS: usize = 4;

/// Slots the guardrail system takes on every OU.
pub const RESERVED_OU_GUARDRAIL_SLOTS: usize = 2;

pub const DEFAULT_MIRROR_DIR: &str = "control_policies_ou_structure";

/// Mirror configuration, read from `orgcp.toml`.
///
/// ```toml
/// mirror_dir = "control_policies_ou_structure"
///
/// [limits]
/// max_attachments = 4
/// reserved_ou_slots = 2
///
/// [naming]
/// account_suffix = "_ACCOUNT"
/// ```
///
/// Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Root directory of the mirror.
    pub mirror_dir: PathBuf,
    pub limits: AttachmentLimits,
    pub naming: Naming,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            mirror_dir: PathBuf::from(DEFAULT_MIRROR_DIR),
            limits: AttachmentLimits::default(),
            naming: Naming::default(),
        }
    }
}

/// Per-node attachment bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentLimits {
    /// Global ceiling `C`.
    pub max_attachments: usize,
    /// Reserved slots `R`; OUs are capped at `C - R`.
    pub reserved_ou_slots: usize,
}

impl Default for AttachmentLimits {
    fn default() -> Self {
        Self {
            max_attachments: MAX_CUSTOM_POLICY_ATTACHMENTS,
            reserved_ou_slots: RESERVED_OU_GUARDRAIL_SLOTS,
        }
    }
}

/// Naming conventions shared by both passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Naming {
    pub root_dir: String,
    pub shared_dir: String,
    /// Appended to account directory names so they never collide with OUs.
    pub account_suffix: String,
    pub default_allow_policy: String,
    pub guardrail_prefix: String,
}

impl Default for Naming {
    fn default() -> Self {
        Self {
            root_dir: "ROOT".to_string(),
            shared_dir: "SHARED".to_string(),
            account_suffix: "_ACCOUNT".to_string(),
            default_allow_policy: "FullAWSAccess".to_string(),
            guardrail_prefix: "aws-guardrails".to_string(),
        }
    }
}

impl Naming {
    /// Default-allow and guardrail policies are owned by the platform.
    pub fn is_externally_managed(&self, policy_name: &str) -> bool {
        policy_name == self.default_allow_policy
            || policy_name.starts_with(&self.guardrail_prefix)
    }
}

impl MirrorConfig {
    /// Load config from disk, or return the defaults if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, MirrorError> {
        if !path.exists() {
            debug!("config {:?} does not exist, using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| MirrorError::io(path, e))?;
        let config: MirrorConfig = toml::from_str(&content)
            .map_err(|e| MirrorError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MirrorError> {
        let limits = &self.limits;
        if limits.max_attachments == 0 {
            return Err(MirrorError::Config(
                "limits.max_attachments must be at least 1".to_string(),
            ));
        }
        if limits.reserved_ou_slots > limits.max_attachments {
            return Err(MirrorError::Config(format!(
                "limits.reserved_ou_slots ({}) exceeds limits.max_attachments ({})",
                limits.reserved_ou_slots, limits.max_attachments
            )));
        }
        for (key, value) in [
            ("naming.root_dir", &self.naming.root_dir),
            ("naming.shared_dir", &self.naming.shared_dir),
        ] {
            if value.is_empty() || value.contains(['/', '\\']) {
                return Err(MirrorError::Config(format!(
                    "{key} must be a single non-empty path component, got {value:?}"
                )));
            }
        }
        if self.naming.root_dir == self.naming.shared_dir {
            return Err(MirrorError::Config(
                "naming.root_dir and naming.shared_dir must differ".to_string(),
            ));
        }
        Ok(())
    }

    pub fn layout(&self) -> MirrorLayout {
        MirrorLayout::new(self.mirror_dir.clone(), self.naming.clone())
    }
}

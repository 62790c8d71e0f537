//! Resolve command: mirror into attachment modules.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use orgcp_mirror::manifest::render_attachment_modules;
use orgcp_mirror::{MirrorConfig, MirrorTreeWalker, PolicyType};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Manifest(PathBuf),
    Json,
}

pub fn run(
    config: &MirrorConfig,
    org_path: &Path,
    policy_types: &[PolicyType],
    output: &Output,
) -> Result<()> {
    let (org, hierarchy) = super::load_org(org_path)?;
    let walker = MirrorTreeWalker::new(&org, config);

    let mut maps = Vec::with_capacity(policy_types.len());
    for &policy_type in policy_types {
        let map = walker
            .resolve_hierarchy(&hierarchy, policy_type)
            .with_context(|| format!("resolving {policy_type}"))?;
        maps.push(map);
    }

    match output {
        Output::Json => {
            println!("{}", serde_json::to_string_pretty(&maps)?);
        }
        Output::Manifest(path) => {
            let body: String = maps.iter().map(render_attachment_modules).collect();
            super::write_generated(path, &body)?;
            let total: usize = maps.iter().map(|m| m.len()).sum();
            info!("wrote {} attachment modules to {}", total, path.display());
        }
    }
    Ok(())
}

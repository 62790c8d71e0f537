//! Capture command: organization into mirror, plus import blocks.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use orgcp_mirror::manifest::{render_attachment_imports, render_policy_imports};
use orgcp_mirror::{CaptureOptions, MirrorConfig, OrgTreeWalker, PolicyType};
use tracing::info;

/// Destinations of the generated import blocks.
#[derive(Debug, Clone)]
pub struct ImportFiles {
    pub attachments: PathBuf,
    pub policies: PathBuf,
}

pub fn run(
    config: &MirrorConfig,
    org_path: &Path,
    policy_types: &[PolicyType],
    skip_customer_refresh: bool,
    imports: Option<&ImportFiles>,
) -> Result<()> {
    let (org, hierarchy) = super::load_org(org_path)?;
    let options = CaptureOptions {
        skip_customer_refresh,
    };
    let walker = OrgTreeWalker::new(&org, config, options);

    let mut attachment_imports = String::new();
    let mut policy_imports = String::new();
    for &policy_type in policy_types {
        let report = walker
            .capture_hierarchy(&hierarchy, policy_type)
            .with_context(|| format!("capturing {policy_type}"))?;
        println!(
            "{}: {} attached policies, {} files written, {} stale files removed under {}",
            policy_type,
            report.map.len(),
            report.files_written,
            report.files_removed,
            config.mirror_dir.display()
        );
        attachment_imports.push_str(&render_attachment_imports(&report.imports, policy_type));
        policy_imports.push_str(&render_policy_imports(&report.policies, policy_type));
    }

    if let Some(files) = imports {
        super::write_generated(&files.attachments, &attachment_imports)?;
        super::write_generated(&files.policies, &policy_imports)?;
        info!(
            "wrote import blocks to {} and {}",
            files.attachments.display(),
            files.policies.display()
        );
    }
    Ok(())
}

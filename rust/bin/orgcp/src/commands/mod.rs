pub mod capture;
pub mod resolve;

use std::path::Path;

use anyhow::{Context, Result};
use orgcp_mirror::walker::first_root;
use orgcp_mirror::{fetch_hierarchy, HierarchyNode, InMemoryOrg};

/// Load the organization snapshot and fetch its hierarchy once for every
/// policy type of the run.
fn load_org(path: &Path) -> Result<(InMemoryOrg, HierarchyNode)> {
    let org = InMemoryOrg::from_path(path)
        .with_context(|| format!("loading organization snapshot {}", path.display()))?;
    let root_id = first_root(&org)?;
    let hierarchy = fetch_hierarchy(&org, &root_id)?;
    Ok((org, hierarchy))
}

/// Write generated text behind the standard header.
fn write_generated(path: &Path, body: &str) -> Result<()> {
    let text = format!("{}{}", orgcp_mirror::manifest::GENERATED_HEADER, body);
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

//! Infrastructure-as-code text for a resolved attachment map.
//!
//! Pure templating: the attachment map and capture report already carry
//! every decision.

use std::path::Path;

use crate::capture::AttachmentImport;
use crate::model::{AttachmentMap, PolicySummary, PolicyType};

pub const GENERATED_HEADER: &str =
    "# This file was automatically generated by orgcp and may require manual review\n";

/// Module name for a policy; spaces are not valid in identifiers.
pub fn module_name(policy_name: &str) -> String {
    policy_name.replace(' ', "_")
}

/// Content path as written in the manifest, with forward slashes. Relative
/// paths are anchored at the working directory; absolute ones are kept.
fn manifest_path(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    if path.is_absolute() {
        text
    } else {
        format!("./{text}")
    }
}

/// One `module` block per entry, plus a byte-size output.
pub fn render_attachment_modules(map: &AttachmentMap) -> String {
    let mut out = String::new();
    for entry in map.iter() {
        let path = manifest_path(&entry.canonical_path);
        let targets = entry
            .targets
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let name = module_name(&entry.policy_name);
        out.push_str(&format!(
            r#"
module "{name}" {{
  source         = "./control_policy_module"
  cp_name        = "{policy}"
  cp_desc        = jsondecode(file("{path}")).description
  cp_policy      = jsonencode(jsondecode(file("{path}")).policy)
  cp_target_list = [{targets}]
  policy_type    = "{policy_type}"
}}

output "{name}_byte_size" {{
  value = module.{name}.cp_byte_size
}}
"#,
            policy = entry.policy_name,
            policy_type = entry.policy_type,
        ));
    }
    out
}

/// `import` blocks adopting existing policies into their modules.
pub fn render_policy_imports(policies: &[PolicySummary], policy_type: PolicyType) -> String {
    let mut out = String::new();
    for policy in policies {
        out.push_str(&format!(
            r#"
import {{
  to = module.{module}.aws_organizations_policy.{policy_type}
  id = "{id}"
}}
"#,
            module = module_name(&policy.name),
            id = policy.id,
        ));
    }
    out
}

/// `import` blocks adopting existing attachments, keyed by target id.
pub fn render_attachment_imports(imports: &[AttachmentImport], policy_type: PolicyType) -> String {
    let short = policy_type.short_name();
    let mut out = String::new();
    for import in imports {
        out.push_str(&format!(
            r#"
import {{
  to = module.{module}.aws_organizations_policy_attachment.attach_{short}["{target}"]
  id = "{target}:{id}"
}}
"#,
            module = module_name(&import.policy_name),
            target = import.target_id,
            id = import.policy_id,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::model::AttachmentMapEntry;

    #[test]
    fn module_block_lists_targets_in_order() {
        let map = AttachmentMap {
            policy_type: PolicyType::ServiceControl,
            entries: vec![AttachmentMapEntry {
                policy_name: "Deny-Root-User".into(),
                policy_type: PolicyType::ServiceControl,
                canonical_path: PathBuf::from("mirror/SHARED/Deny-Root-User.scp"),
                targets: vec!["ou-A".into(), "ou-B".into(), "ou-C".into()],
            }],
        };
        let text = render_attachment_modules(&map);
        assert!(text.contains("module \"Deny-Root-User\" {"));
        assert!(text.contains("cp_target_list = [\"ou-A\", \"ou-B\", \"ou-C\"]"));
        assert!(text.contains("file(\"./mirror/SHARED/Deny-Root-User.scp\")"));
        assert!(text.contains("policy_type    = \"SERVICE_CONTROL_POLICY\""));
        assert!(text.contains("value = module.Deny-Root-User.cp_byte_size"));
    }

    #[test]
    fn absolute_content_paths_are_not_anchored() {
        let map = AttachmentMap {
            policy_type: PolicyType::ServiceControl,
            entries: vec![AttachmentMapEntry {
                policy_name: "Baseline".into(),
                policy_type: PolicyType::ServiceControl,
                canonical_path: PathBuf::from("/srv/mirror/ROOT/Baseline.scp"),
                targets: vec!["r-1".into()],
            }],
        };
        let text = render_attachment_modules(&map);
        assert!(text.contains("file(\"/srv/mirror/ROOT/Baseline.scp\")"));
        assert!(!text.contains(".//"));
    }

    #[test]
    fn import_blocks() {
        let policies = vec![PolicySummary {
            id: "p-123".into(),
            name: "Legacy Deny".into(),
            description: String::new(),
        }];
        let text = render_policy_imports(&policies, PolicyType::ResourceControl);
        assert!(text.contains(
            "to = module.Legacy_Deny.aws_organizations_policy.RESOURCE_CONTROL_POLICY"
        ));
        assert!(text.contains("id = \"p-123\""));

        let imports = vec![AttachmentImport {
            policy_name: "Baseline".into(),
            policy_id: "p-9".into(),
            target_id: "ou-1".into(),
        }];
        let text = render_attachment_imports(&imports, PolicyType::ServiceControl);
        assert!(text.contains(
            "to = module.Baseline.aws_organizations_policy_attachment.attach_scp[\"ou-1\"]"
        ));
        assert!(text.contains("id = \"ou-1:p-9\""));
    }
}

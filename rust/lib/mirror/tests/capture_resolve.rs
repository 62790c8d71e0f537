use std::fs;
use std::path::Path;

use orgcp_mirror::{
    fetch_hierarchy, CaptureOptions, InMemoryOrg, MirrorConfig, MirrorError, MirrorTreeWalker,
    OrgSnapshot, OrgTreeWalker, PolicyType,
};

const SCP: PolicyType = PolicyType::ServiceControl;
const RCP: PolicyType = PolicyType::ResourceControl;

fn organization() -> InMemoryOrg {
    let snapshot = OrgSnapshot::new("r-ab12")
        .with_ou("ou-sec", "Security", "r-ab12")
        .with_ou("ou-wl", "Workloads", "r-ab12")
        .with_ou("ou-prod", "Prod", "ou-wl")
        .with_account("111111111111", "Security", "ou-sec")
        .with_account("222222222222", "app", "ou-prod")
        .with_account("333333333333", "management", "r-ab12")
        .with_policy("p-root", "Baseline", SCP, &["r-ab12"])
        .with_policy("p-deny", "Deny-Root-User", SCP, &["ou-sec", "ou-prod", "222222222222"])
        .with_policy("p-region", "Region-Lock", SCP, &["ou-wl"])
        .with_policy("p-full", "FullAWSAccess", SCP, &["r-ab12", "ou-sec", "ou-wl", "ou-prod"])
        .with_policy("p-gr", "aws-guardrails-q1", SCP, &["ou-sec", "ou-wl"])
        .with_policy("p-s3", "Deny-Public-S3", RCP, &["ou-wl", "333333333333"]);
    InMemoryOrg::new(snapshot).with_page_size(1)
}

fn config(root: &Path) -> MirrorConfig {
    MirrorConfig {
        mirror_dir: root.join("control_policies_ou_structure"),
        ..Default::default()
    }
}

#[test]
fn captured_mirror_resolves_to_the_same_map() {
    let dir = tempfile::tempdir().unwrap();
    let org = organization();
    let config = config(dir.path());

    let capture = OrgTreeWalker::new(&org, &config, CaptureOptions::default());
    let resolve = MirrorTreeWalker::new(&org, &config);
    for policy_type in PolicyType::ALL {
        let report = capture.capture(policy_type).unwrap();
        let resolved = resolve.resolve(policy_type).unwrap();
        assert_eq!(report.map, resolved, "{policy_type}");
    }

    let resolved = resolve.resolve(SCP).unwrap();
    // Distinct customer policy names across the tree.
    assert_eq!(resolved.len(), 3);
    let deny = resolved.get("Deny-Root-User").unwrap();
    assert_eq!(
        deny.canonical_path,
        config.mirror_dir.join("SHARED/Deny-Root-User.scp")
    );
    assert_eq!(deny.targets, vec!["ou-sec", "ou-prod", "222222222222"]);

    // Attached once: never in the shared pool.
    let region = resolved.get("Region-Lock").unwrap();
    assert_eq!(
        region.canonical_path,
        config.mirror_dir.join("ROOT/Workloads/Region-Lock.scp")
    );
    assert!(!config.mirror_dir.join("SHARED/Region-Lock.scp").exists());

    let rcps = resolve.resolve(RCP).unwrap();
    let s3 = rcps.get("Deny-Public-S3").unwrap();
    assert_eq!(s3.targets, vec!["ou-wl", "333333333333"]);
    assert!(config
        .mirror_dir
        .join("ROOT/management_ACCOUNT/Deny-Public-S3.rcp.shared")
        .is_file());
}

#[test]
fn account_and_ou_with_the_same_name_do_not_collide() {
    let dir = tempfile::tempdir().unwrap();
    let org = organization();
    let config = config(dir.path());
    OrgTreeWalker::new(&org, &config, CaptureOptions::default())
        .capture(SCP)
        .unwrap();
    let m = &config.mirror_dir;
    assert!(m.join("ROOT/Security").is_dir());
    assert!(m.join("ROOT/Security/Security_ACCOUNT").is_dir());
}

#[test]
fn resolve_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let org = organization();
    let config = config(dir.path());
    OrgTreeWalker::new(&org, &config, CaptureOptions::default())
        .capture(SCP)
        .unwrap();

    let hierarchy = fetch_hierarchy(&org, "r-ab12").unwrap();
    let walker = MirrorTreeWalker::new(&org, &config);
    let a = walker.resolve_hierarchy(&hierarchy, SCP).unwrap();
    let b = walker.resolve_hierarchy(&hierarchy, SCP).unwrap();
    assert_eq!(
        serde_json::to_vec(&a).unwrap(),
        serde_json::to_vec(&b).unwrap()
    );
}

#[test]
fn deleted_ou_directory_asks_for_a_new_capture() {
    let dir = tempfile::tempdir().unwrap();
    let org = organization();
    let config = config(dir.path());
    OrgTreeWalker::new(&org, &config, CaptureOptions::default())
        .capture(SCP)
        .unwrap();
    let removed = config.mirror_dir.join("ROOT/Workloads/Prod");
    fs::remove_dir_all(&removed).unwrap();

    let err = MirrorTreeWalker::new(&org, &config).resolve(SCP).unwrap_err();
    match &err {
        MirrorError::MissingMirrorNode { node_id, expected } => {
            assert_eq!(node_id, "ou-prod");
            assert_eq!(expected, &removed);
        }
        other => panic!("expected MissingMirrorNode, got {other:?}"),
    }
    assert!(err.to_string().contains("capture"));
}

#[test]
fn hand_added_third_policy_on_an_ou_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let org = organization();
    let config = config(dir.path());
    OrgTreeWalker::new(&org, &config, CaptureOptions::default())
        .capture(SCP)
        .unwrap();
    // Workloads already holds Region-Lock; two more exceed the OU bound.
    let wl = config.mirror_dir.join("ROOT/Workloads");
    fs::write(wl.join("Extra-One.scp"), "{}").unwrap();
    fs::write(wl.join("Extra-Two.scp"), "{}").unwrap();

    let err = MirrorTreeWalker::new(&org, &config).resolve(SCP).unwrap_err();
    match err {
        MirrorError::StructuralViolation {
            node_id,
            count,
            allowed,
            ..
        } => {
            assert_eq!(node_id, "ou-wl");
            assert_eq!(count, 3);
            assert_eq!(allowed, 2);
        }
        other => panic!("expected StructuralViolation, got {other:?}"),
    }
}

fn sandbox_org(targets: &[&str]) -> InMemoryOrg {
    let snapshot = OrgSnapshot::new("r-1")
        .with_ou("ou-a", "A", "r-1")
        .with_ou("ou-b", "B", "r-1")
        .with_policy("p-1", "P", SCP, targets);
    InMemoryOrg::new(snapshot)
}

#[test]
fn recapture_after_policy_becomes_shared() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let m = &config.mirror_dir;

    let before = sandbox_org(&["ou-a"]);
    OrgTreeWalker::new(&before, &config, CaptureOptions::default())
        .capture(SCP)
        .unwrap();
    assert!(m.join("ROOT/A/P.scp").is_file());

    let after = sandbox_org(&["ou-a", "ou-b"]);
    let report = OrgTreeWalker::new(&after, &config, CaptureOptions::default())
        .capture(SCP)
        .unwrap();
    assert_eq!(report.files_removed, 1);
    assert!(!m.join("ROOT/A/P.scp").exists());
    assert!(m.join("ROOT/A/P.scp.shared").is_file());

    let resolved = MirrorTreeWalker::new(&after, &config).resolve(SCP).unwrap();
    assert_eq!(resolved, report.map);
    let entry = resolved.get("P").unwrap();
    assert_eq!(entry.canonical_path, m.join("SHARED/P.scp"));
    assert_eq!(entry.targets, vec!["ou-a", "ou-b"]);
}

#[test]
fn recapture_after_policy_is_detached() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let m = &config.mirror_dir;

    let before = sandbox_org(&["ou-a"]);
    OrgTreeWalker::new(&before, &config, CaptureOptions::default())
        .capture(SCP)
        .unwrap();

    let after = sandbox_org(&[]);
    let report = OrgTreeWalker::new(&after, &config, CaptureOptions::default())
        .capture(SCP)
        .unwrap();
    assert!(report.map.is_empty());
    assert!(!m.join("ROOT/A/P.scp").exists());

    let resolved = MirrorTreeWalker::new(&after, &config).resolve(SCP).unwrap();
    assert!(resolved.is_empty());
}

#[test]
fn recapture_after_policy_stops_being_shared() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let m = &config.mirror_dir;

    let before = sandbox_org(&["ou-a", "ou-b"]);
    OrgTreeWalker::new(&before, &config, CaptureOptions::default())
        .capture(SCP)
        .unwrap();
    assert!(m.join("SHARED/P.scp").is_file());

    let after = sandbox_org(&["ou-b"]);
    let report = OrgTreeWalker::new(&after, &config, CaptureOptions::default())
        .capture(SCP)
        .unwrap();
    // Two pointers and the pool copy.
    assert_eq!(report.files_removed, 3);
    assert!(!m.join("ROOT/A/P.scp.shared").exists());
    assert!(!m.join("ROOT/B/P.scp.shared").exists());
    assert!(!m.join("SHARED/P.scp").exists());

    let resolved = MirrorTreeWalker::new(&after, &config).resolve(SCP).unwrap();
    let entry = resolved.get("P").unwrap();
    assert_eq!(entry.canonical_path, m.join("ROOT/B/P.scp"));
    assert_eq!(entry.targets, vec!["ou-b"]);
}

#[test]
fn skipping_customer_refresh_keeps_existing_content() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let m = &config.mirror_dir;

    OrgTreeWalker::new(&sandbox_org(&["ou-a"]), &config, CaptureOptions::default())
        .capture(SCP)
        .unwrap();
    let options = CaptureOptions {
        skip_customer_refresh: true,
    };
    let report = OrgTreeWalker::new(&sandbox_org(&[]), &config, options)
        .capture(SCP)
        .unwrap();
    assert_eq!(report.files_removed, 0);
    assert!(m.join("ROOT/A/P.scp").is_file());
}

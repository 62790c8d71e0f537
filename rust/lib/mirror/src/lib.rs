//! Reconciles an organization's policy-attachment hierarchy with its local
//! filesystem mirror.
//!
//! - [`OrgTreeWalker`] captures the live organization into the mirror.
//! - [`MirrorTreeWalker`] resolves the mirror into an [`AttachmentMap`].

pub mod builder;
pub mod capture;
pub mod config;
pub mod error;
pub mod frequency;
pub mod layout;
pub mod manifest;
pub mod memory;
pub mod model;
pub mod resolve;
pub mod resolver;
pub mod traits;
pub mod validate;
pub mod walker;

pub use builder::AttachmentMapBuilder;
pub use capture::{AttachmentImport, CaptureOptions, CaptureReport, OrgTreeWalker};
pub use config::{AttachmentLimits, MirrorConfig, Naming};
pub use error::{MirrorError, SourceError};
pub use frequency::AttachmentFrequency;
pub use layout::{MirrorFile, MirrorLayout, MirrorMarker, PolicyDocument};
pub use memory::{InMemoryOrg, OrgSnapshot};
pub use model::{
    AttachmentKind, AttachmentMap, AttachmentMapEntry, ChildKind, ChildNode, HierarchyNode,
    NodeDescription, NodeKind, PolicySummary, PolicyType,
};
pub use resolve::MirrorTreeWalker;
pub use resolver::{AttachmentRegistry, PolicyReference, SharedPolicyResolver};
pub use traits::{OrgSource, Page};
pub use validate::AttachmentCountValidator;
pub use walker::fetch_hierarchy;

//! Surface classification: can the engine safely own this surface?
//!
//! The verdict is computed once per session from structure alone. When in
//! doubt the classifier refuses direct mutation, because frameworks that
//! keep their own model of the document undo or desynchronize from edits
//! they did not make.

use std::fmt;

use crate::surface::{NodeId, Surface, Target, descendants};

/// Sites whose editors are managed by a rich-text framework.
const FRAMEWORK_DOMAINS: &[&str] = &[
    "docs.google.com",
    "notion.so",
    "notion.site",
    "app.slack.com",
    "discord.com",
    "x.com",
    "twitter.com",
    "web.whatsapp.com",
    "facebook.com",
    "messenger.com",
    "linkedin.com",
    "office.com",
    "feishu.cn",
    "larksuite.com",
];

/// Class names left behind by known editor frameworks.
const FRAMEWORK_CLASSES: &[&str] = &[
    "ProseMirror",
    "ql-editor",
    "DraftEditor-root",
    "DraftEditor-editorContainer",
    "public-DraftEditor-content",
    "cke_editable",
    "mce-content-body",
    "monaco-editor",
    "cm-content",
    "CodeMirror",
];

/// Attributes left behind by known editor frameworks.
const FRAMEWORK_ATTRIBUTES: &[&str] = &[
    "data-lexical-editor",
    "data-slate-editor",
    "data-slate-node",
    "data-contents",
    "data-offset-key",
];

/// Structural shape of the surface, resolved once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceShape {
    FlatBuffer,
    StructuredSingleNode,
    StructuredComplex,
}

/// How the session applies the translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Live, throttled replacement on every increment.
    Direct,
    /// One checked replacement of the final text.
    Verified,
    /// Never mutate; hand the text to the user.
    CopyFallback,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Direct => write!(f, "direct"),
            Strategy::Verified => write!(f, "verified"),
            Strategy::CopyFallback => write!(f, "copy_fallback"),
        }
    }
}

/// Whether direct mutation is safe, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationVerdict {
    pub direct_allowed: bool,
    pub shape: SurfaceShape,
    pub reason: String,
}

impl MutationVerdict {
    fn new(direct_allowed: bool, shape: SurfaceShape, reason: impl Into<String>) -> Self {
        Self {
            direct_allowed,
            shape,
            reason: reason.into(),
        }
    }

    pub fn strategy(&self) -> Strategy {
        match (self.direct_allowed, self.shape) {
            (true, SurfaceShape::FlatBuffer | SurfaceShape::StructuredSingleNode) => {
                Strategy::Direct
            }
            (false, SurfaceShape::StructuredSingleNode) => Strategy::Verified,
            _ => Strategy::CopyFallback,
        }
    }
}

/// Classifies `target` on `surface`. Pure; never mutates.
pub fn classify(surface: &dyn Surface, target: Target) -> MutationVerdict {
    let host = match target {
        Target::Control(_) => {
            return MutationVerdict::new(true, SurfaceShape::FlatBuffer, "flat text control");
        }
        Target::Editable { host, .. } => host,
    };

    let text_nodes = text_bearing_nodes(surface, host);
    if text_nodes.len() != 1 {
        return MutationVerdict::new(
            false,
            SurfaceShape::StructuredComplex,
            format!(
                "editing host has {} text-bearing nodes",
                text_nodes.len()
            ),
        );
    }

    if let Some(domain) = framework_domain(surface.origin()) {
        return MutationVerdict::new(
            false,
            SurfaceShape::StructuredSingleNode,
            format!("{domain} hosts a framework-managed editor"),
        );
    }
    if let Some(marker) = framework_fingerprint(surface, host) {
        return MutationVerdict::new(
            false,
            SurfaceShape::StructuredSingleNode,
            format!("editor framework marker `{marker}`"),
        );
    }

    MutationVerdict::new(
        true,
        SurfaceShape::StructuredSingleNode,
        "single text node editing host",
    )
}

/// Text nodes with non-empty data under `host`, in document order.
pub fn text_bearing_nodes(surface: &dyn Surface, host: NodeId) -> Vec<NodeId> {
    descendants(surface, host)
        .into_iter()
        .filter(|node| surface.is_text(*node) && !surface.text_content(*node).is_empty())
        .collect()
}

fn framework_domain(origin: &str) -> Option<&'static str> {
    let origin = origin.trim_end_matches('.').to_ascii_lowercase();
    FRAMEWORK_DOMAINS.iter().copied().find(|domain| {
        origin == *domain
            || origin
                .strip_suffix(domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// First framework marker found on `host` or any descendant element.
fn framework_fingerprint(surface: &dyn Surface, host: NodeId) -> Option<String> {
    std::iter::once(host)
        .chain(descendants(surface, host))
        .filter(|node| !surface.is_text(*node))
        .find_map(|node| {
            let class = surface
                .class_list(node)
                .into_iter()
                .find(|class| FRAMEWORK_CLASSES.contains(&class.as_str()));
            class.or_else(|| {
                surface
                    .attribute_names(node)
                    .into_iter()
                    .find(|name| FRAMEWORK_ATTRIBUTES.contains(&name.as_str()))
            })
        })
}

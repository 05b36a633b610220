//! Mutation applier: direct replacement, verified replacement, copy
//! fallback and rollback.

use std::fmt;

use crate::classify::text_bearing_nodes;
use crate::range::{RangeKind, TextRange};
use crate::surface::{Anchor, DomRange, NodeId, Surface, char_slice, contains};

/// A direct replacement could not be performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationError {
    /// The target left the document.
    Detached,
    /// The target could not take focus.
    FocusFailed,
    /// The range could not be selected.
    SelectionRejected,
    /// The insertion primitive is unavailable or refused the edit.
    PrimitiveFailed,
}

impl fmt::Display for MutationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationError::Detached => write!(f, "surface detached"),
            MutationError::FocusFailed => write!(f, "surface could not be focused"),
            MutationError::SelectionRejected => write!(f, "range could not be selected"),
            MutationError::PrimitiveFailed => write!(f, "text insertion unavailable"),
        }
    }
}

impl std::error::Error for MutationError {}

/// Why a verified replacement was refused or undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyFailure {
    NotStructured,
    MultipleNodes,
    Detached,
    OutsideHost,
    NotSingleTextNode,
    OutOfBounds,
    PrimitiveFailed,
    Mismatch,
}

impl fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            VerifyFailure::NotStructured => "range is not anchored in the document",
            VerifyFailure::MultipleNodes => "range spans multiple nodes",
            VerifyFailure::Detached => "text node detached",
            VerifyFailure::OutsideHost => "text node outside host",
            VerifyFailure::NotSingleTextNode => "host no longer has a single text node",
            VerifyFailure::OutOfBounds => "offset out of bounds",
            VerifyFailure::PrimitiveFailed => "primitive failed",
            VerifyFailure::Mismatch => "verification mismatch",
        };
        f.write_str(reason)
    }
}

impl std::error::Error for VerifyFailure {}

/// Pre-session content, captured before any mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub surface_id: NodeId,
    pub original_text: String,
}

impl Snapshot {
    /// Captures the current text of a control or editing host.
    pub fn capture(surface: &dyn Surface, surface_id: NodeId) -> Self {
        let original_text = surface
            .control_value(surface_id)
            .unwrap_or_else(|| surface.text_content(surface_id));
        Self {
            surface_id,
            original_text,
        }
    }
}

/// Where the selection ended up after a copy fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackSelection {
    /// The original range was re-selected.
    Original,
    /// The whole host content was selected.
    WholeHost,
    /// Nothing could be selected.
    Unchanged,
}

/// Replaces `range` with `new_text` through the insertion primitive and
/// grows `range` to cover the inserted text.
///
/// # Errors
/// Returns a [`MutationError`] when the surface cannot be focused, selected
/// or mutated. The caller must roll back.
pub fn apply_direct(
    surface: &mut dyn Surface,
    range: &mut TextRange,
    new_text: &str,
) -> Result<(), MutationError> {
    let inserted = new_text.chars().count();
    match range.kind {
        RangeKind::Flat { element } => {
            if !surface.is_attached(element) {
                return Err(MutationError::Detached);
            }
            if !surface.focus(element) {
                return Err(MutationError::FocusFailed);
            }
            if !surface.set_control_selection(element, range.start, range.end) {
                return Err(MutationError::SelectionRejected);
            }
            if !surface.insert_text_at_selection(new_text) {
                return Err(MutationError::PrimitiveFailed);
            }
            range.end = range.start + inserted;
        }
        RangeKind::Structured { host, start, end } => {
            if start.node != end.node {
                return Err(MutationError::SelectionRejected);
            }
            if !surface.is_attached(start.node) || !contains(surface, host, start.node) {
                return Err(MutationError::Detached);
            }
            if !surface.focus(host) {
                return Err(MutationError::FocusFailed);
            }
            if !surface.set_selection(&DomRange::new(start, end)) {
                return Err(MutationError::SelectionRejected);
            }
            if !surface.insert_text_at_selection(new_text) {
                return Err(MutationError::PrimitiveFailed);
            }
            let end = Anchor::new(start.node, start.offset + inserted);
            range.kind = RangeKind::Structured { host, start, end };
            range.end = range.start + inserted;
        }
    }
    Ok(())
}

/// Replaces `range` inside a single-text-node `host` and checks the result.
///
/// The host's text afterwards is either the exact expected string or its
/// text before the call.
///
/// # Errors
/// Returns the [`VerifyFailure`] that stopped or undid the replacement.
pub fn apply_verified(
    surface: &mut dyn Surface,
    host: NodeId,
    range: &TextRange,
    new_text: &str,
) -> Result<(), VerifyFailure> {
    let RangeKind::Structured { start, end, .. } = range.kind else {
        return Err(VerifyFailure::NotStructured);
    };
    if start.node != end.node || !surface.is_text(start.node) {
        return Err(VerifyFailure::MultipleNodes);
    }
    let node = start.node;
    if !surface.is_attached(node) {
        return Err(VerifyFailure::Detached);
    }
    if !contains(surface, host, node) {
        return Err(VerifyFailure::OutsideHost);
    }
    if text_bearing_nodes(surface, host) != [node] {
        return Err(VerifyFailure::NotSingleTextNode);
    }
    let before = surface.text_content(host);
    let len = before.chars().count();
    if start.offset > end.offset || end.offset > len {
        return Err(VerifyFailure::OutOfBounds);
    }

    let mut expected = char_slice(&before, 0, start.offset);
    expected.push_str(new_text);
    expected.push_str(&char_slice(&before, end.offset, len));

    let inserted = surface.focus(host)
        && surface.set_selection(&DomRange::new(start, end))
        && surface.insert_text_at_selection(new_text);
    if !inserted {
        restore_host_text(surface, host, node, &before);
        return Err(VerifyFailure::PrimitiveFailed);
    }
    if surface.text_content(host) != expected {
        restore_host_text(surface, host, node, &before);
        return Err(VerifyFailure::Mismatch);
    }
    Ok(())
}

/// Prepares the surface for a manual paste: re-selects the original range
/// when its anchors are still attached, otherwise the whole host.
pub fn prepare_copy_fallback(
    surface: &mut dyn Surface,
    host: NodeId,
    range: &TextRange,
) -> FallbackSelection {
    match range.kind {
        RangeKind::Flat { element } => {
            if surface.is_attached(element)
                && surface.focus(element)
                && surface.set_control_selection(element, range.start, range.end)
            {
                FallbackSelection::Original
            } else {
                FallbackSelection::Unchanged
            }
        }
        RangeKind::Structured { start, end, .. } => {
            if surface.is_attached(start.node)
                && surface.is_attached(end.node)
                && surface.set_selection(&DomRange::new(start, end))
            {
                FallbackSelection::Original
            } else if surface.is_attached(host) && surface.select_node_contents(host) {
                FallbackSelection::WholeHost
            } else {
                FallbackSelection::Unchanged
            }
        }
    }
}

/// Restores the snapshot's text and re-selects the original range.
///
/// Returns whether the surface now holds the original text.
pub fn restore(surface: &mut dyn Surface, snapshot: &Snapshot, original: &TextRange) -> bool {
    let id = snapshot.surface_id;
    if !surface.is_attached(id) {
        return false;
    }
    match original.kind {
        RangeKind::Flat { element } => {
            surface.set_control_value(id, &snapshot.original_text);
            surface.set_control_selection(element, original.start, original.end);
        }
        RangeKind::Structured { start, end, .. } => {
            match text_bearing_nodes(surface, id).as_slice() {
                [node] if *node == start.node => {
                    surface.replace_text_content(*node, &snapshot.original_text);
                }
                _ => {
                    surface.replace_text_content(id, &snapshot.original_text);
                }
            }
            if surface.is_attached(start.node) && surface.is_attached(end.node) {
                surface.set_selection(&DomRange::new(start, end));
            }
        }
    }
    Snapshot::capture(surface, id).original_text == snapshot.original_text
}

fn restore_host_text(surface: &mut dyn Surface, host: NodeId, node: NodeId, before: &str) {
    if surface.is_attached(node) && contains(surface, host, node) {
        surface.replace_text_content(node, before);
        if surface.text_content(host) == before {
            return;
        }
    }
    surface.replace_text_content(host, before);
}

//! Range extraction: what to translate and where to put the result.

use crate::classify::text_bearing_nodes;
use crate::surface::{
    Anchor, DomRange, NodeId, Surface, Target, char_slice, contains, offset_within,
};

/// How a [`TextRange`] is addressed on its surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    /// Char offsets into a control's value.
    Flat { element: NodeId },
    /// Anchors into the document; `start`/`end` are host-relative offsets.
    Structured {
        host: NodeId,
        start: Anchor,
        end: Anchor,
    },
}

/// The span being translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
    pub source_text: String,
    pub kind: RangeKind,
}

impl TextRange {
    /// The anchors as a selectable range, for structured surfaces.
    pub fn dom_range(&self) -> Option<DomRange> {
        match self.kind {
            RangeKind::Structured { start, end, .. } => Some(DomRange::new(start, end)),
            RangeKind::Flat { .. } => None,
        }
    }

    /// Whether both anchors sit in the same text node.
    pub fn is_single_node(&self) -> bool {
        match self.kind {
            RangeKind::Flat { .. } => true,
            RangeKind::Structured { start, end, .. } => start.node == end.node,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Computes the range to translate for `target`.
///
/// A non-empty selection wins regardless of `max_chars`. Otherwise the
/// range is the trailing window of at most `max_chars` chars before the
/// caret; on structured surfaces the caret must sit in a text node. Returns
/// `None` when the resulting text is blank. Never mutates the surface.
pub fn extract(surface: &dyn Surface, target: Target, max_chars: usize) -> Option<TextRange> {
    let range = match target {
        Target::Control(element) => extract_flat(surface, element, max_chars)?,
        Target::Editable { host, .. } => extract_structured(surface, host, max_chars)?,
    };
    if range.source_text.trim().is_empty() {
        return None;
    }
    Some(range)
}

fn extract_flat(surface: &dyn Surface, element: NodeId, max_chars: usize) -> Option<TextRange> {
    let value = surface.control_value(element)?;
    let len = value.chars().count();
    let (selection_start, selection_end) = surface.control_selection(element)?;
    let (start, end) = if selection_start == selection_end {
        let caret = selection_end.min(len);
        (caret.saturating_sub(max_chars), caret)
    } else {
        (
            selection_start.min(selection_end),
            selection_start.max(selection_end).min(len),
        )
    };
    Some(TextRange {
        start,
        end,
        source_text: char_slice(&value, start, end),
        kind: RangeKind::Flat { element },
    })
}

fn extract_structured(surface: &dyn Surface, host: NodeId, max_chars: usize) -> Option<TextRange> {
    let selection = surface.selection()?;
    if !contains(surface, host, selection.start.node) || !contains(surface, host, selection.end.node)
    {
        return None;
    }

    let (start, end) = if selection.is_collapsed() {
        let node = selection.start.node;
        if !surface.is_text(node) {
            return None;
        }
        let caret = selection
            .start
            .offset
            .min(surface.text_content(node).chars().count());
        (
            Anchor::new(node, caret.saturating_sub(max_chars)),
            Anchor::new(node, caret),
        )
    } else {
        let a = offset_within(surface, host, selection.start)?;
        let b = offset_within(surface, host, selection.end)?;
        let (start, end) = if a <= b {
            (selection.start, selection.end)
        } else {
            (selection.end, selection.start)
        };
        onto_single_text_node(surface, host, start, end).unwrap_or((start, end))
    };

    let range = DomRange::new(start, end);
    Some(TextRange {
        start: offset_within(surface, host, start)?,
        end: offset_within(surface, host, end)?,
        source_text: surface.range_to_string(&range),
        kind: RangeKind::Structured { host, start, end },
    })
}

/// Re-anchors an element-boundary selection (select-all, for instance) onto
/// the host's only text node, with char offsets.
fn onto_single_text_node(
    surface: &dyn Surface,
    host: NodeId,
    start: Anchor,
    end: Anchor,
) -> Option<(Anchor, Anchor)> {
    if surface.is_text(start.node) && surface.is_text(end.node) {
        return None;
    }
    let [node] = text_bearing_nodes(surface, host)[..] else {
        return None;
    };
    let base = offset_within(surface, host, Anchor::new(node, 0))?;
    let len = surface.text_content(node).chars().count();
    let local = |anchor: Anchor| {
        offset_within(surface, host, anchor).map(|offset| offset.saturating_sub(base).min(len))
    };
    Some((
        Anchor::new(node, local(start)?),
        Anchor::new(node, local(end)?),
    ))
}

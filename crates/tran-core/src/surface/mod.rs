//! The host environment the engine mutates.
//!
//! A [`Surface`] is anything that can answer questions about a focused
//! document and perform a single text-insertion primitive. All offsets are
//! Unicode scalar (char) offsets.

pub mod dom;

/// Opaque handle to a node of the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// A boundary point: a char offset inside a text node, or a child index
/// inside an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub node: NodeId,
    pub offset: usize,
}

impl Anchor {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A structured selection between two anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomRange {
    pub start: Anchor,
    pub end: Anchor,
}

impl DomRange {
    pub fn new(start: Anchor, end: Anchor) -> Self {
        Self { start, end }
    }

    /// A collapsed range (caret) at `offset` in `node`.
    pub fn caret(node: NodeId, offset: usize) -> Self {
        let anchor = Anchor::new(node, offset);
        Self::new(anchor, anchor)
    }

    /// A range inside a single text node.
    pub fn within(node: NodeId, start: usize, end: usize) -> Self {
        Self::new(Anchor::new(node, start), Anchor::new(node, end))
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// Kinds of flat-buffer form controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// `<input>`; its `type` attribute decides whether it holds free text.
    Input,
    TextArea,
}

/// An `input` event as dispatched by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    /// Element the event was dispatched on.
    pub target: NodeId,
    /// Fired while an IME composition was in progress.
    pub is_composing: bool,
}

/// Input types whose value is free text.
const TEXT_INPUT_TYPES: &[&str] = &["text", "search", "url", "email", "tel"];

/// Host environment contract.
pub trait Surface {
    /// Host name of the document's origin (e.g. `docs.google.com`).
    fn origin(&self) -> &str;

    fn active_element(&self) -> Option<NodeId>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn children(&self, node: NodeId) -> Vec<NodeId>;

    fn is_text(&self, node: NodeId) -> bool;

    /// Whether the node is still reachable from the document root.
    fn is_attached(&self, node: NodeId) -> bool;

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;

    fn attribute_names(&self, node: NodeId) -> Vec<String>;

    fn class_list(&self, node: NodeId) -> Vec<String> {
        self.attribute(node, "class")
            .map(|classes| classes.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Whether the node's own `contenteditable` attribute makes it editable.
    fn is_content_editable(&self, node: NodeId) -> bool {
        matches!(
            self.attribute(node, "contenteditable")
                .map(str::to_ascii_lowercase)
                .as_deref(),
            Some("" | "true" | "plaintext-only")
        )
    }

    /// Concatenated data of every descendant text node.
    fn text_content(&self, node: NodeId) -> String;

    fn control_kind(&self, node: NodeId) -> Option<ControlKind>;

    fn control_value(&self, node: NodeId) -> Option<String>;

    /// `(start, end)` of the control's selection; equal when collapsed.
    fn control_selection(&self, node: NodeId) -> Option<(usize, usize)>;

    fn set_control_selection(&mut self, node: NodeId, start: usize, end: usize) -> bool;

    /// Replaces a control's value without going through the insertion
    /// primitive. Rollback only.
    fn set_control_value(&mut self, node: NodeId, value: &str) -> bool;

    /// The document's structured selection, if any.
    fn selection(&self) -> Option<DomRange>;

    fn set_selection(&mut self, range: &DomRange) -> bool;

    fn select_node_contents(&mut self, node: NodeId) -> bool;

    fn range_to_string(&self, range: &DomRange) -> String;

    fn focus(&mut self, node: NodeId) -> bool;

    /// Replaces the current selection with `text` the way a user edit would.
    ///
    /// Returns `false` when the primitive is unavailable or rejected.
    fn insert_text_at_selection(&mut self, text: &str) -> bool;

    /// Sets a text node's data, or replaces an element's children with a
    /// single text node. Rollback only.
    fn replace_text_content(&mut self, node: NodeId, text: &str) -> bool;

    /// Input events dispatched since the last drain, oldest first.
    fn drain_input_events(&mut self) -> Vec<InputEvent>;
}

/// What the user is typing into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// A flat-buffer `<input>` or `<textarea>`.
    Control(NodeId),
    /// An element inside a rich editable region.
    Editable { element: NodeId, host: NodeId },
}

impl Target {
    /// The node whose text is snapshotted and watched for input.
    pub fn surface_id(self) -> NodeId {
        match self {
            Target::Control(node) => node,
            Target::Editable { host, .. } => host,
        }
    }
}

/// Resolves the focused element into a translation target.
///
/// Password fields and non-text inputs are never targets.
pub fn resolve_target(surface: &dyn Surface) -> Option<Target> {
    let active = surface.active_element()?;
    if surface.control_kind(active).is_some() {
        return is_flat_buffer(surface, active).then_some(Target::Control(active));
    }
    if !is_editable(surface, active) {
        return None;
    }
    let host = editing_host(surface, active)?;
    Some(Target::Editable {
        element: active,
        host,
    })
}

/// Whether `node` is a text-holding form control.
pub fn is_flat_buffer(surface: &dyn Surface, node: NodeId) -> bool {
    match surface.control_kind(node) {
        Some(ControlKind::TextArea) => true,
        Some(ControlKind::Input) => {
            let input_type = surface
                .attribute(node, "type")
                .map_or_else(|| "text".to_string(), str::to_ascii_lowercase);
            TEXT_INPUT_TYPES.contains(&input_type.as_str())
        }
        None => false,
    }
}

/// Whether `node` is editable, honoring inherited and explicit
/// `contenteditable="false"` states.
pub fn is_editable(surface: &dyn Surface, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(id) = current {
        match surface
            .attribute(id, "contenteditable")
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("false") => return false,
            Some("" | "true" | "plaintext-only") => return true,
            // Missing or invalid values inherit.
            _ => {}
        }
        current = surface.parent(id);
    }
    false
}

/// Finds the editing host enclosing `node`: the nearest explicitly editable
/// ancestor (inclusive), extended upward through editable parents.
pub fn editing_host(surface: &dyn Surface, node: NodeId) -> Option<NodeId> {
    let mut current = Some(node);
    let mut host = None;
    while let Some(id) = current {
        if surface.is_content_editable(id) {
            host = Some(id);
        } else if host.is_some() {
            break;
        }
        current = surface.parent(id);
    }
    host
}

/// Whether `node` is `ancestor` or one of its descendants.
pub fn contains(surface: &dyn Surface, ancestor: NodeId, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(id) = current {
        if id == ancestor {
            return true;
        }
        current = surface.parent(id);
    }
    false
}

/// Descendants of `node` in document order, excluding `node` itself.
pub fn descendants(surface: &dyn Surface, node: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = surface.children(node).into_iter().rev().collect();
    while let Some(id) = stack.pop() {
        out.push(id);
        stack.extend(surface.children(id).into_iter().rev());
    }
    out
}

/// Char offset of `anchor` within the text content of `root`.
///
/// Returns `None` when the anchor is not inside `root`.
pub fn offset_within(surface: &dyn Surface, root: NodeId, anchor: Anchor) -> Option<usize> {
    let mut count = 0;
    walk_offset(surface, root, anchor, &mut count)
}

fn walk_offset(
    surface: &dyn Surface,
    node: NodeId,
    anchor: Anchor,
    count: &mut usize,
) -> Option<usize> {
    if surface.is_text(node) {
        let len = surface.text_content(node).chars().count();
        if node == anchor.node {
            return Some(*count + anchor.offset.min(len));
        }
        *count += len;
        return None;
    }
    for (index, child) in surface.children(node).into_iter().enumerate() {
        if node == anchor.node && index == anchor.offset {
            return Some(*count);
        }
        if let Some(found) = walk_offset(surface, child, anchor, count) {
            return Some(found);
        }
    }
    (node == anchor.node).then_some(*count)
}

/// Slices `text` by char offsets, clamping to its length.
pub(crate) fn char_slice(text: &str, start: usize, end: usize) -> String {
    text.chars()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect()
}

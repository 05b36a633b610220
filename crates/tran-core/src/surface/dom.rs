//! In-memory document host.
//!
//! `MemoryDocument` is an arena of element and text nodes with form
//! controls, `contenteditable` regions, a structured selection and a
//! configurable insertion primitive. The CLI runs sessions against it and
//! every engine test uses it as the surface.

use super::{
    Anchor, ControlKind, DomRange, InputEvent, NodeId, Surface, char_slice, descendants,
    editing_host, offset_within,
};

/// How [`Surface::insert_text_at_selection`] behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertMode {
    /// Replaces the selection like a native text insertion.
    #[default]
    Native,
    /// The primitive is missing; every call fails without mutating.
    Unavailable,
    /// A framework re-applies the insertion, leaving the text doubled.
    Duplicating,
}

#[derive(Debug, Clone)]
struct ControlState {
    kind: ControlKind,
    value: String,
    selection: (usize, usize),
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        control: Option<ControlState>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// An in-memory document implementing [`Surface`].
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    origin: String,
    nodes: Vec<Node>,
    root: NodeId,
    active: Option<NodeId>,
    selection: Option<DomRange>,
    insert_mode: InsertMode,
    composing: bool,
    events: Vec<InputEvent>,
}

impl MemoryDocument {
    /// Creates an empty document with a `<body>` root.
    pub fn new(origin: impl Into<String>) -> Self {
        let body = Node {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Element {
                tag: "body".to_string(),
                attributes: Vec::new(),
                control: None,
            },
        };
        Self {
            origin: origin.into(),
            nodes: vec![body],
            root: NodeId::from_raw(0),
            active: None,
            selection: None,
            insert_mode: InsertMode::Native,
            composing: false,
            events: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn set_insert_mode(&mut self, mode: InsertMode) {
        self.insert_mode = mode;
    }

    /// Appends an element. `input` and `textarea` become form controls.
    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let tag = tag.to_ascii_lowercase();
        let control = match tag.as_str() {
            "input" => Some(ControlKind::Input),
            "textarea" => Some(ControlKind::TextArea),
            _ => None,
        }
        .map(|kind| ControlState {
            kind,
            value: String::new(),
            selection: (0, 0),
        });
        self.push(
            parent,
            NodeKind::Element {
                tag,
                attributes: Vec::new(),
                control,
            },
        )
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(parent, NodeKind::Text(text.to_string()))
    }

    /// Sets or replaces an attribute. Ignored on text nodes.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(Node {
            kind: NodeKind::Element { attributes, .. },
            ..
        }) = self.nodes.get_mut(node.index())
        {
            let name = name.to_ascii_lowercase();
            match attributes.iter_mut().find(|(key, _)| *key == name) {
                Some(entry) => entry.1 = value.to_string(),
                None => attributes.push((name, value.to_string())),
            }
        }
    }

    /// Removes `node` from its parent. The subtree stays addressable.
    pub fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.nodes.get(node.index()).and_then(|n| n.parent) else {
            return;
        };
        self.nodes[parent.index()].children.retain(|child| *child != node);
        self.nodes[node.index()].parent = None;
        if self.active.is_some_and(|active| !self.is_attached(active)) {
            self.active = None;
        }
    }

    /// Starts an IME composition; input events fired until
    /// [`end_composition`](Self::end_composition) are flagged as composing.
    pub fn begin_composition(&mut self) {
        self.composing = true;
    }

    pub fn end_composition(&mut self) {
        self.composing = false;
    }

    /// Simulates the user typing `text` over the current selection.
    ///
    /// Always uses native insertion and dispatches an input event.
    pub fn type_text(&mut self, text: &str) -> bool {
        let mode = std::mem::replace(&mut self.insert_mode, InsertMode::Native);
        let inserted = self.insert_text_at_selection(text);
        self.insert_mode = mode;
        inserted
    }

    /// Dispatches an input event on `target` without changing content.
    pub fn dispatch_input(&mut self, target: NodeId) {
        self.events.push(InputEvent {
            target,
            is_composing: self.composing,
        });
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId::from_raw(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        if let Some(parent) = self.nodes.get_mut(parent.index()) {
            parent.children.push(id);
        }
        id
    }

    fn node(&self, node: NodeId) -> Option<&Node> {
        self.nodes.get(node.index())
    }

    fn control(&self, node: NodeId) -> Option<&ControlState> {
        match &self.node(node)?.kind {
            NodeKind::Element { control, .. } => control.as_ref(),
            NodeKind::Text(_) => None,
        }
    }

    fn control_mut(&mut self, node: NodeId) -> Option<&mut ControlState> {
        match &mut self.nodes.get_mut(node.index())?.kind {
            NodeKind::Element { control, .. } => control.as_mut(),
            NodeKind::Text(_) => None,
        }
    }

    fn text_data_mut(&mut self, node: NodeId) -> Option<&mut String> {
        match &mut self.nodes.get_mut(node.index())?.kind {
            NodeKind::Text(data) => Some(data),
            NodeKind::Element { .. } => None,
        }
    }

    fn insertion_text(&self, text: &str) -> String {
        match self.insert_mode {
            InsertMode::Duplicating => text.repeat(2),
            InsertMode::Native | InsertMode::Unavailable => text.to_string(),
        }
    }

    fn insert_into_control(&mut self, node: NodeId, text: &str) -> bool {
        let text = self.insertion_text(text);
        let Some(control) = self.control_mut(node) else {
            return false;
        };
        let (start, end) = control.selection;
        let len = control.value.chars().count();
        if start > end || end > len {
            return false;
        }
        let mut value = char_slice(&control.value, 0, start);
        value.push_str(&text);
        value.push_str(&char_slice(&control.value, end, len));
        control.value = value;
        let caret = start + text.chars().count();
        control.selection = (caret, caret);
        self.dispatch_input(node);
        true
    }

    fn insert_into_text(&mut self, range: DomRange, text: &str) -> bool {
        if !self.is_text(range.start.node)
            || !self.is_text(range.end.node)
            || !self.is_attached(range.start.node)
            || !self.is_attached(range.end.node)
        {
            return false;
        }
        let text = self.insertion_text(text);
        let inserted_len = text.chars().count();

        let (start, end) = if range.start.node == range.end.node {
            (range.start, range.end)
        } else {
            let Some(scope) = editing_host(self, range.start.node) else {
                return false;
            };
            let (Some(a), Some(b)) = (
                offset_within(self, scope, range.start),
                offset_within(self, scope, range.end),
            ) else {
                return false;
            };
            if a <= b {
                (range.start, range.end)
            } else {
                (range.end, range.start)
            }
        };

        if start.node == end.node {
            let (lo, hi) = (start.offset.min(end.offset), start.offset.max(end.offset));
            let Some(data) = self.text_data_mut(start.node) else {
                return false;
            };
            let len = data.chars().count();
            if hi > len {
                return false;
            }
            let mut next = char_slice(data, 0, lo);
            next.push_str(&text);
            next.push_str(&char_slice(data, hi, len));
            *data = next;
            self.selection = Some(DomRange::caret(start.node, lo + inserted_len));
        } else {
            let Some(scope) = editing_host(self, start.node) else {
                return false;
            };
            let between: Vec<NodeId> = descendants(self, scope)
                .into_iter()
                .filter(|id| self.is_text(*id))
                .skip_while(|id| *id != start.node)
                .skip(1)
                .take_while(|id| *id != end.node)
                .collect();
            let start_data = self.text_content(start.node);
            let end_data = self.text_content(end.node);
            if start.offset > start_data.chars().count() || end.offset > end_data.chars().count()
            {
                return false;
            }
            let mut head = char_slice(&start_data, 0, start.offset);
            head.push_str(&text);
            let tail = char_slice(&end_data, end.offset, end_data.chars().count());
            for id in between {
                if let Some(data) = self.text_data_mut(id) {
                    data.clear();
                }
            }
            if let Some(data) = self.text_data_mut(start.node) {
                *data = head;
            }
            if let Some(data) = self.text_data_mut(end.node) {
                *data = tail;
            }
            self.selection = Some(DomRange::caret(start.node, start.offset + inserted_len));
        }

        let target = editing_host(self, start.node)
            .or(self.active)
            .unwrap_or(start.node);
        self.dispatch_input(target);
        true
    }
}

impl Surface for MemoryDocument {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn active_element(&self) -> Option<NodeId> {
        self.active
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn is_text(&self, node: NodeId) -> bool {
        matches!(
            self.node(node),
            Some(Node {
                kind: NodeKind::Text(_),
                ..
            })
        )
    }

    fn is_attached(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == self.root {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.node(node)?.kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    fn attribute_names(&self, node: NodeId) -> Vec<String> {
        match self.node(node).map(|n| &n.kind) {
            Some(NodeKind::Element { attributes, .. }) => {
                attributes.iter().map(|(key, _)| key.clone()).collect()
            }
            _ => Vec::new(),
        }
    }

    fn text_content(&self, node: NodeId) -> String {
        match self.node(node).map(|n| &n.kind) {
            Some(NodeKind::Text(data)) => data.clone(),
            Some(NodeKind::Element { .. }) => descendants(self, node)
                .into_iter()
                .filter_map(|id| match &self.nodes[id.index()].kind {
                    NodeKind::Text(data) => Some(data.as_str()),
                    NodeKind::Element { .. } => None,
                })
                .collect(),
            None => String::new(),
        }
    }

    fn control_kind(&self, node: NodeId) -> Option<ControlKind> {
        self.control(node).map(|control| control.kind)
    }

    fn control_value(&self, node: NodeId) -> Option<String> {
        self.control(node).map(|control| control.value.clone())
    }

    fn control_selection(&self, node: NodeId) -> Option<(usize, usize)> {
        self.control(node).map(|control| control.selection)
    }

    fn set_control_selection(&mut self, node: NodeId, start: usize, end: usize) -> bool {
        let Some(control) = self.control_mut(node) else {
            return false;
        };
        if start > end || end > control.value.chars().count() {
            return false;
        }
        control.selection = (start, end);
        true
    }

    fn set_control_value(&mut self, node: NodeId, value: &str) -> bool {
        let Some(control) = self.control_mut(node) else {
            return false;
        };
        control.value = value.to_string();
        let len = control.value.chars().count();
        control.selection = (len, len);
        true
    }

    fn selection(&self) -> Option<DomRange> {
        self.selection
    }

    fn set_selection(&mut self, range: &DomRange) -> bool {
        if !self.is_attached(range.start.node) || !self.is_attached(range.end.node) {
            return false;
        }
        self.selection = Some(*range);
        true
    }

    fn select_node_contents(&mut self, node: NodeId) -> bool {
        let Some(n) = self.node(node) else {
            return false;
        };
        let end = match &n.kind {
            NodeKind::Text(data) => data.chars().count(),
            NodeKind::Element { .. } => n.children.len(),
        };
        self.set_selection(&DomRange::new(Anchor::new(node, 0), Anchor::new(node, end)))
    }

    fn range_to_string(&self, range: &DomRange) -> String {
        let (Some(a), Some(b)) = (
            offset_within(self, self.root, range.start),
            offset_within(self, self.root, range.end),
        ) else {
            return String::new();
        };
        char_slice(&self.text_content(self.root), a.min(b), a.max(b))
    }

    fn focus(&mut self, node: NodeId) -> bool {
        if self.is_text(node) || !self.is_attached(node) {
            return false;
        }
        self.active = Some(node);
        true
    }

    fn insert_text_at_selection(&mut self, text: &str) -> bool {
        if self.insert_mode == InsertMode::Unavailable {
            return false;
        }
        if let Some(active) = self.active
            && self.control(active).is_some()
        {
            return self.insert_into_control(active, text);
        }
        match self.selection {
            Some(range) => self.insert_into_text(range, text),
            None => false,
        }
    }

    fn replace_text_content(&mut self, node: NodeId, text: &str) -> bool {
        if let Some(data) = self.text_data_mut(node) {
            *data = text.to_string();
            return true;
        }
        if self.control(node).is_some() {
            return self.set_control_value(node, text);
        }
        let Some(n) = self.nodes.get_mut(node.index()) else {
            return false;
        };
        let old_children = std::mem::take(&mut n.children);
        for child in old_children {
            self.nodes[child.index()].parent = None;
        }
        self.append_text(node, text);
        true
    }

    fn drain_input_events(&mut self) -> Vec<InputEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editable(doc: &mut MemoryDocument) -> NodeId {
        let root = doc.root();
        let div = doc.append_element(root, "div");
        doc.set_attribute(div, "contenteditable", "true");
        div
    }

    #[test]
    fn test_control_insertion_replaces_selection() {
        let mut doc = MemoryDocument::new("example.com");
        let root = doc.root();
        let input = doc.append_element(root, "textarea");
        doc.set_control_value(input, "hello 你好世界");
        doc.focus(input);
        assert!(doc.set_control_selection(input, 6, 10));

        assert!(doc.insert_text_at_selection("hello world"));
        assert_eq!(doc.control_value(input).as_deref(), Some("hello hello world"));
        assert_eq!(doc.control_selection(input), Some((17, 17)));
        assert_eq!(
            doc.drain_input_events(),
            vec![InputEvent {
                target: input,
                is_composing: false
            }]
        );
        assert!(doc.drain_input_events().is_empty());
    }

    #[test]
    fn test_text_node_insertion_and_range_string() {
        let mut doc = MemoryDocument::new("example.com");
        let div = editable(&mut doc);
        let text = doc.append_text(div, "abc木def");
        doc.focus(div);
        let range = DomRange::within(text, 3, 4);
        assert_eq!(doc.range_to_string(&range), "木");

        doc.set_selection(&range);
        assert!(doc.insert_text_at_selection("wood"));
        assert_eq!(doc.text_content(div), "abcwooddef");
        assert_eq!(doc.selection(), Some(DomRange::caret(text, 7)));
        assert_eq!(doc.drain_input_events()[0].target, div);
    }

    #[test]
    fn test_insertion_across_text_nodes() {
        let mut doc = MemoryDocument::new("example.com");
        let div = editable(&mut doc);
        let first = doc.append_text(div, "one ");
        let bold = doc.append_element(div, "b");
        doc.append_text(bold, "two");
        let last = doc.append_text(div, " three");
        doc.focus(div);

        let range = DomRange::new(Anchor::new(first, 2), Anchor::new(last, 3));
        assert_eq!(doc.range_to_string(&range), "e two th");
        doc.set_selection(&range);
        assert!(doc.insert_text_at_selection("X"));
        assert_eq!(doc.text_content(div), "onXree");
    }

    #[test]
    fn test_unavailable_and_duplicating_modes() {
        let mut doc = MemoryDocument::new("example.com");
        let div = editable(&mut doc);
        let text = doc.append_text(div, "abc");
        doc.focus(div);
        doc.set_selection(&DomRange::within(text, 0, 3));

        doc.set_insert_mode(InsertMode::Unavailable);
        assert!(!doc.insert_text_at_selection("x"));
        assert_eq!(doc.text_content(div), "abc");
        assert!(doc.drain_input_events().is_empty());

        doc.set_insert_mode(InsertMode::Duplicating);
        assert!(doc.insert_text_at_selection("x"));
        assert_eq!(doc.text_content(div), "xx");
    }

    #[test]
    fn test_detach_and_replace_text_content() {
        let mut doc = MemoryDocument::new("example.com");
        let div = editable(&mut doc);
        let a = doc.append_text(div, "a");
        let b = doc.append_text(div, "b");
        doc.detach(b);
        assert!(!doc.is_attached(b));
        assert_eq!(doc.text_content(div), "a");
        assert!(!doc.set_selection(&DomRange::caret(b, 0)));

        assert!(doc.replace_text_content(div, "restored"));
        assert!(!doc.is_attached(a));
        assert_eq!(doc.text_content(div), "restored");
        assert_eq!(doc.children(div).len(), 1);
    }

    #[test]
    fn test_composition_flags_events() {
        let mut doc = MemoryDocument::new("example.com");
        let root = doc.root();
        let input = doc.append_element(root, "input");
        doc.focus(input);
        doc.begin_composition();
        doc.type_text("n");
        doc.end_composition();
        doc.type_text("i");

        let events = doc.drain_input_events();
        assert!(events[0].is_composing);
        assert!(!events[1].is_composing);
        assert_eq!(doc.control_value(input).as_deref(), Some("ni"));
    }
}

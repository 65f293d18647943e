//! Virtual document tree data structures.
//!
//! A [`VgTree`] is produced fresh for every render pass and is read-only to the
//! renderer. Nodes link to their first child and next sibling only; the parent of
//! a node is known from traversal state, never stored on the node.

mod position;

pub use position::PositionId;

use vg_core::RenderError;
use vg_core::RenderResult;

/// ID used to address nodes in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Opaque token identifying a producer-side event handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
    Document,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Element => "element",
            Self::Text => "text",
            Self::Comment => "comment",
            Self::Document => "document",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

/// A listener the producer wants attached at a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEventHandlerSpec {
    pub event_type: String,
    pub capture: bool,
    pub passive: bool,
    pub handler: HandlerId,
}

impl DomEventHandlerSpec {
    pub fn new(event_type: impl Into<String>, handler: HandlerId) -> Self {
        Self {
            event_type: event_type.into(),
            capture: false,
            passive: false,
            handler,
        }
    }

    pub fn with_capture(mut self, capture: bool) -> Self {
        self.capture = capture;
        self
    }

    pub fn with_passive(mut self, passive: bool) -> Self {
        self.passive = passive;
        self
    }
}

/// A node in the virtual document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VgNode {
    pub kind: NodeKind,
    /// Tag name for elements, raw content for text and comments.
    pub data: String,
    pub attrs: Vec<Attribute>,
    pub event_handlers: Vec<DomEventHandlerSpec>,
    /// Raw markup override; when set, children are not synchronized.
    pub inner_html: Option<String>,
    first_child: Option<NodeId>,
    next_sibling: Option<NodeId>,
    last_child: Option<NodeId>,
    attached: bool,
}

impl VgNode {
    fn new(kind: NodeKind, data: String) -> Self {
        Self {
            kind,
            data,
            attrs: Vec::new(),
            event_handlers: Vec::new(),
            inner_html: None,
            first_child: None,
            next_sibling: None,
            last_child: None,
            attached: false,
        }
    }

    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next_sibling
    }

    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }

    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    /// Case-insensitive tag comparison for element nodes.
    pub fn is_tag(&self, tag: &str) -> bool {
        self.is_element() && self.data.eq_ignore_ascii_case(tag)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|attr| attr.key == key)
            .map(|attr| attr.value.as_str())
    }

    /// True for text nodes made only of whitespace.
    pub fn is_blank_text(&self) -> bool {
        self.kind == NodeKind::Text && self.data.trim().is_empty()
    }
}

/// Arena holding every node of one render pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VgTree {
    nodes: Vec<VgNode>,
}

impl VgTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn element(&mut self, tag: impl Into<String>) -> NodeId {
        self.push(VgNode::new(NodeKind::Element, tag.into()))
    }

    pub fn text(&mut self, content: impl Into<String>) -> NodeId {
        self.push(VgNode::new(NodeKind::Text, content.into()))
    }

    pub fn comment(&mut self, content: impl Into<String>) -> NodeId {
        self.push(VgNode::new(NodeKind::Comment, content.into()))
    }

    pub fn document(&mut self) -> NodeId {
        self.push(VgNode::new(NodeKind::Document, String::new()))
    }

    fn push(&mut self, node: VgNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&VgNode> {
        self.nodes.get(id.index())
    }

    pub fn node(&self, id: NodeId) -> RenderResult<&VgNode> {
        self.get(id).ok_or_else(|| {
            RenderError::new(
                "tree.node_missing",
                format!("node {} is not in the tree ({} nodes)", id.0, self.nodes.len()),
            )
        })
    }

    fn node_mut(&mut self, id: NodeId) -> RenderResult<&mut VgNode> {
        let len = self.nodes.len();
        self.nodes.get_mut(id.index()).ok_or_else(|| {
            RenderError::new(
                "tree.node_missing",
                format!("node {} is not in the tree ({len} nodes)", id.0),
            )
        })
    }

    /// Appends `child` as the last child of `parent` in O(1).
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> RenderResult<()> {
        if parent == child {
            return Err(RenderError::new(
                "tree.self_append",
                format!("node {} cannot be appended to itself", parent.0),
            ));
        }

        let parent_kind = self.node(parent)?.kind;
        if !matches!(parent_kind, NodeKind::Element | NodeKind::Document) {
            return Err(RenderError::new(
                "tree.parent_not_container",
                format!("{} nodes cannot have children", parent_kind.as_str()),
            ));
        }

        if self.subtree_contains(child, parent)? {
            return Err(RenderError::new(
                "tree.cycle",
                format!(
                    "appending node {} under node {} would make it its own ancestor",
                    child.0, parent.0
                ),
            ));
        }

        let child_node = self.node_mut(child)?;
        if child_node.attached {
            return Err(RenderError::new(
                "tree.already_attached",
                format!("node {} already has a parent", child.0),
            ));
        }
        child_node.attached = true;

        let previous_last = self.node(parent)?.last_child;
        match previous_last {
            Some(last) => self.node_mut(last)?.next_sibling = Some(child),
            None => self.node_mut(parent)?.first_child = Some(child),
        }
        self.node_mut(parent)?.last_child = Some(child);
        Ok(())
    }

    /// True when `target` is a descendant of `root`. Appends never close a
    /// cycle, so the walk always terminates.
    fn subtree_contains(&self, root: NodeId, target: NodeId) -> RenderResult<bool> {
        let mut pending = vec![self.node(root)?.first_child];
        while let Some(next) = pending.pop() {
            let Some(id) = next else {
                continue;
            };
            if id == target {
                return Ok(true);
            }
            let node = self.node(id)?;
            pending.push(node.first_child);
            pending.push(node.next_sibling);
        }
        Ok(false)
    }

    /// Sets an attribute, replacing the value in place when the key exists.
    pub fn set_attr(
        &mut self,
        node: NodeId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> RenderResult<()> {
        let key = key.into();
        let value = value.into();
        let target = self.element_mut(node, "attributes")?;
        match target.attrs.iter_mut().find(|attr| attr.key == key) {
            Some(existing) => existing.value = value,
            None => target.attrs.push(Attribute { key, value }),
        }
        Ok(())
    }

    pub fn add_event_handler(&mut self, node: NodeId, spec: DomEventHandlerSpec) -> RenderResult<()> {
        self.element_mut(node, "event handlers")?
            .event_handlers
            .push(spec);
        Ok(())
    }

    pub fn set_inner_html(&mut self, node: NodeId, markup: impl Into<String>) -> RenderResult<()> {
        self.element_mut(node, "inner HTML")?.inner_html = Some(markup.into());
        Ok(())
    }

    fn element_mut(&mut self, node: NodeId, what: &str) -> RenderResult<&mut VgNode> {
        let target = self.node_mut(node)?;
        if target.kind != NodeKind::Element {
            return Err(RenderError::new(
                "tree.not_element",
                format!("{} nodes cannot carry {what}", target.kind.as_str()),
            ));
        }
        Ok(target)
    }

    /// Iterates the children of `node` in sibling order.
    pub fn children(&self, node: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.get(node).and_then(VgNode::first_child),
        }
    }
}

/// Forward iterator over a node's children.
#[derive(Debug, Clone)]
pub struct Children<'a> {
    tree: &'a VgTree,
    next: Option<NodeId>,
}

impl<'a> Iterator for Children<'a> {
    type Item = (NodeId, &'a VgNode);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let node = self.tree.get(id)?;
        self.next = node.next_sibling;
        Some((id, node))
    }
}

/// Output of one render pass of the producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOut {
    pub tree: VgTree,
    pub doc: NodeId,
}

impl BuildOut {
    pub fn new(tree: VgTree, doc: NodeId) -> Self {
        Self { tree, doc }
    }

    /// Checks that `doc` exists and is an element.
    pub fn validate(&self) -> RenderResult<&VgNode> {
        let doc = self.tree.get(self.doc).ok_or_else(|| {
            RenderError::new(
                "render.doc_missing",
                format!("BuildOut.doc ({}) is not in the tree", self.doc.0),
            )
        })?;

        if doc.kind != NodeKind::Element {
            return Err(RenderError::new(
                "render.doc_not_element",
                format!("BuildOut.doc kind is {}, not element", doc.kind.as_str()),
            ));
        }

        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::BuildOut;
    use super::DomEventHandlerSpec;
    use super::HandlerId;
    use super::NodeKind;
    use super::VgTree;

    #[test]
    fn children_iterate_in_append_order() {
        let mut tree = VgTree::new();
        let root = tree.element("ul");
        let first = tree.element("li");
        let second = tree.text("between");
        let third = tree.comment("last");
        for child in [first, second, third] {
            assert!(tree.append_child(root, child).is_ok());
        }

        let kinds: Vec<NodeKind> = tree.children(root).map(|(_, node)| node.kind).collect();
        assert_eq!(
            kinds,
            vec![NodeKind::Element, NodeKind::Text, NodeKind::Comment]
        );
        let ids: Vec<_> = tree.children(root).map(|(id, _)| id).collect();
        assert_eq!(ids, vec![first, second, third]);
    }

    #[test]
    fn set_attr_replaces_existing_key_in_place() {
        let mut tree = VgTree::new();
        let div = tree.element("div");
        assert!(tree.set_attr(div, "id", "a").is_ok());
        assert!(tree.set_attr(div, "class", "b").is_ok());
        assert!(tree.set_attr(div, "id", "c").is_ok());

        let node = tree.node(div).unwrap_or_else(|_| unreachable!());
        let keys: Vec<&str> = node.attrs.iter().map(|attr| attr.key.as_str()).collect();
        assert_eq!(keys, vec!["id", "class"]);
        assert_eq!(node.attr("id"), Some("c"));
    }

    #[test]
    fn rejects_reattaching_a_child() {
        let mut tree = VgTree::new();
        let a = tree.element("div");
        let b = tree.element("div");
        let child = tree.element("span");
        assert!(tree.append_child(a, child).is_ok());
        let result = tree.append_child(b, child);
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "tree.already_attached");
        }
    }

    #[test]
    fn rejects_appending_an_ancestor() {
        let mut tree = VgTree::new();
        let root = tree.element("div");
        let middle = tree.element("section");
        let leaf = tree.element("span");
        assert!(tree.append_child(root, middle).is_ok());
        assert!(tree.append_child(middle, leaf).is_ok());

        for (parent, child) in [(middle, root), (leaf, root), (leaf, middle)] {
            let result = tree.append_child(parent, child);
            assert!(result.is_err());
            if let Err(error) = result {
                assert_eq!(error.code, "tree.cycle");
            }
        }
        let walk: Vec<_> = tree.children(middle).map(|(id, _)| id).collect();
        assert_eq!(walk, vec![leaf]);
        assert!(tree.children(leaf).next().is_none());
    }

    #[test]
    fn node_ids_are_arena_indices() {
        let mut tree = VgTree::new();
        let ids: Vec<_> = (0..3).map(|_| tree.element("p")).collect();
        let indices: Vec<usize> = ids.iter().map(|id| id.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn text_nodes_cannot_hold_children_or_attributes() {
        let mut tree = VgTree::new();
        let text = tree.text("hi");
        let child = tree.element("b");
        assert!(tree.append_child(text, child).is_err());
        assert!(tree.set_attr(text, "id", "x").is_err());
        assert!(
            tree.add_event_handler(text, DomEventHandlerSpec::new("click", HandlerId(1)))
                .is_err()
        );
    }

    #[test]
    fn build_out_requires_element_root() {
        let mut tree = VgTree::new();
        let text = tree.text("just text");
        let result = BuildOut::new(tree, text).validate().map(|_| ());
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "render.doc_not_element");
        }
    }

    #[test]
    fn build_out_rejects_foreign_node_id() {
        let mut other = VgTree::new();
        other.element("div");
        let stray = other.element("div");
        let result = BuildOut::new(VgTree::new(), stray).validate().map(|_| ());
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "render.doc_missing");
        }
    }
}

//! Arena DOM that applies decoded instructions.

use crate::decode::Op;
use crate::decode::decode_batch;
use vg_core::RenderError;
use vg_core::RenderResult;
use vg_instr::BatchSink;

const HEAD_MARKER_ATTR: &str = "data-vg-head";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostListener {
    pub position_id: String,
    pub event_type: String,
    pub capture: bool,
    pub passive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostNodeKind {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        listeners: Vec<HostListener>,
        inner_html: Option<String>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostNode {
    pub kind: HostNodeKind,
    children: Vec<HostId>,
    parent: Option<HostId>,
}

/// Host document with `<html>`, `<head>` and `<body>` present from the start.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    nodes: Vec<HostNode>,
    html: HostId,
    head: HostId,
    body: HostId,
    root: Option<HostId>,
    path: Vec<(HostId, usize)>,
    touched_attrs: Vec<String>,
    touched_listeners: Vec<(String, bool)>,
    claimed_head: Vec<HostId>,
    mount_points: Vec<(String, HostId)>,
    ops: Vec<Op>,
    batch_sizes: Vec<usize>,
    failing: bool,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            html: HostId(0),
            head: HostId(0),
            body: HostId(0),
            root: None,
            path: Vec::new(),
            touched_attrs: Vec::new(),
            touched_listeners: Vec::new(),
            claimed_head: Vec::new(),
            mount_points: Vec::new(),
            ops: Vec::new(),
            batch_sizes: Vec::new(),
            failing: false,
        };
        doc.html = doc.create_element("html");
        doc.head = doc.create_element("head");
        doc.body = doc.create_element("body");
        doc.append_child(doc.html, doc.head);
        doc.append_child(doc.html, doc.body);
        doc
    }

    /// Document whose body holds one `<tag id="id">` mount point.
    pub fn with_mount_point(tag: &str, id: &str) -> (Self, HostId) {
        let mut doc = Self::new();
        let mount = doc.create_element(tag);
        doc.set_host_attr(mount, "id", id);
        doc.append_child(doc.body, mount);
        (doc, mount)
    }

    pub fn html(&self) -> HostId {
        self.html
    }

    pub fn head(&self) -> HostId {
        self.head
    }

    pub fn body(&self) -> HostId {
        self.body
    }

    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    /// Every instruction applied so far, in order.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<Op> {
        std::mem::take(&mut self.ops)
    }

    pub fn batch_sizes(&self) -> &[usize] {
        &self.batch_sizes
    }

    pub fn create_element(&mut self, tag: &str) -> HostId {
        self.push(HostNodeKind::Element {
            tag: tag.to_owned(),
            attrs: Vec::new(),
            listeners: Vec::new(),
            inner_html: None,
        })
    }

    pub fn create_text(&mut self, content: &str) -> HostId {
        self.push(HostNodeKind::Text(content.to_owned()))
    }

    fn push(&mut self, kind: HostNodeKind) -> HostId {
        let id = HostId(self.nodes.len());
        self.nodes.push(HostNode {
            kind,
            children: Vec::new(),
            parent: None,
        });
        id
    }

    /// Appends host-owned content outside the instruction stream.
    pub fn append_child(&mut self, parent: HostId, child: HostId) {
        self.detach(child);
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
    }

    pub fn set_host_attr(&mut self, node: HostId, key: &str, value: &str) {
        if let HostNodeKind::Element { attrs, .. } = &mut self.nodes[node.0].kind {
            match attrs.iter_mut().find(|(existing, _)| existing == key) {
                Some(slot) => slot.1 = value.to_owned(),
                None => attrs.push((key.to_owned(), value.to_owned())),
            }
        }
    }

    pub fn node(&self, id: HostId) -> &HostNode {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: HostId) -> &[HostId] {
        &self.nodes[id.0].children
    }

    pub fn tag(&self, id: HostId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            HostNodeKind::Element { tag, .. } => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn attr(&self, id: HostId, key: &str) -> Option<&str> {
        match &self.nodes[id.0].kind {
            HostNodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(existing, _)| existing == key)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn listeners(&self, id: HostId) -> &[HostListener] {
        match &self.nodes[id.0].kind {
            HostNodeKind::Element { listeners, .. } => listeners,
            _ => &[],
        }
    }

    pub fn is_attached(&self, id: HostId) -> bool {
        let mut current = id;
        loop {
            if current == self.html {
                return true;
            }
            match self.nodes[current.0].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// True when an attached element carries a listener tagged with this position.
    pub fn has_listener(&self, position_id: &str, event_type: &str) -> bool {
        self.descendants(self.html).into_iter().any(|id| {
            self.listeners(id).iter().any(|listener| {
                listener.position_id == position_id && listener.event_type == event_type
            })
        })
    }

    /// Resolves `#id` or a bare tag name against attached elements.
    pub fn find(&self, selector: &str) -> Option<HostId> {
        let candidates = self.descendants(self.html);
        match selector.strip_prefix('#') {
            Some(id) => candidates
                .into_iter()
                .find(|node| self.attr(*node, "id") == Some(id)),
            None => candidates.into_iter().find(|node| {
                self.tag(*node)
                    .is_some_and(|tag| tag.eq_ignore_ascii_case(selector))
            }),
        }
    }

    fn descendants(&self, from: HostId) -> Vec<HostId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            out.push(id);
            for child in self.nodes[id.0].children.iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Serializes `id` as markup; attributes appear in insertion order.
    pub fn outer_html(&self, id: HostId) -> String {
        match &self.nodes[id.0].kind {
            HostNodeKind::Element {
                tag,
                attrs,
                inner_html,
                ..
            } => {
                let mut out = format!("<{tag}");
                for (key, value) in attrs {
                    out.push_str(&format!(" {key}=\"{value}\""));
                }
                out.push('>');
                match inner_html {
                    Some(markup) => out.push_str(markup),
                    None => out.push_str(&self.inner_html(id)),
                }
                out.push_str(&format!("</{tag}>"));
                out
            }
            HostNodeKind::Text(content) => content.clone(),
            HostNodeKind::Comment(content) => format!("<!--{content}-->"),
        }
    }

    pub fn inner_html(&self, id: HostId) -> String {
        self.nodes[id.0]
            .children
            .iter()
            .map(|child| self.outer_html(*child))
            .collect()
    }

    fn detach(&mut self, child: HostId) {
        if let Some(parent) = self.nodes[child.0].parent.take() {
            self.nodes[parent.0].children.retain(|id| *id != child);
        }
    }

    fn replace_node(&mut self, old: HostId, new: HostId) {
        if let Some(parent) = self.nodes[old.0].parent.take() {
            if let Some(slot) = self.nodes[parent.0]
                .children
                .iter_mut()
                .find(|id| **id == old)
            {
                *slot = new;
            }
            self.nodes[new.0].parent = Some(parent);
        }
        for (_, mapped) in &mut self.mount_points {
            if *mapped == old {
                *mapped = new;
            }
        }
    }

    fn reset_touched(&mut self) {
        self.touched_attrs.clear();
        self.touched_listeners.clear();
    }

    fn current(&self) -> RenderResult<Option<HostId>> {
        match self.path.last() {
            None => self.root.map(Some).ok_or_else(|| violation("no cursor selected")),
            Some((parent, index)) => Ok(self.nodes[parent.0].children.get(*index).copied()),
        }
    }

    fn current_element(&self) -> RenderResult<HostId> {
        let id = self
            .current()?
            .ok_or_else(|| violation("cursor is on an empty slot"))?;
        if self.tag(id).is_none() {
            return Err(violation("cursor is not on an element"));
        }
        Ok(id)
    }

    fn place(&mut self, new: HostId) -> RenderResult<()> {
        match self.path.last().copied() {
            None => {
                let old = self.root.ok_or_else(|| violation("no cursor selected"))?;
                self.replace_node(old, new);
                self.root = Some(new);
            }
            Some((parent, index)) => {
                let len = self.nodes[parent.0].children.len();
                if index < len {
                    let old = self.nodes[parent.0].children[index];
                    self.nodes[old.0].parent = None;
                    self.nodes[parent.0].children[index] = new;
                } else if index == len {
                    self.nodes[parent.0].children.push(new);
                } else {
                    return Err(violation("cursor slot is past the end of its parent"));
                }
                self.nodes[new.0].parent = Some(parent);
            }
        }
        Ok(())
    }

    fn element_parts(
        &mut self,
        id: HostId,
    ) -> RenderResult<(
        &mut Vec<(String, String)>,
        &mut Vec<HostListener>,
        &mut Option<String>,
    )> {
        match &mut self.nodes[id.0].kind {
            HostNodeKind::Element {
                attrs,
                listeners,
                inner_html,
                ..
            } => Ok((attrs, listeners, inner_html)),
            _ => Err(violation("cursor is not on an element")),
        }
    }

    fn apply(&mut self, op: &Op) -> RenderResult<()> {
        match op {
            Op::ClearElement => {
                self.root = None;
                self.path.clear();
                self.claimed_head.clear();
                self.reset_touched();
            }
            Op::SelectMountPoint { selector, tag } => {
                let remembered = self
                    .mount_points
                    .iter()
                    .find(|(known, id)| known == selector && self.is_attached(*id))
                    .map(|(_, id)| *id);
                let found = remembered.or_else(|| self.find(selector));
                let id = match found {
                    Some(id) if self.tag(id).is_some_and(|t| t.eq_ignore_ascii_case(tag)) => id,
                    Some(id) => {
                        let new = self.create_element(tag);
                        self.replace_node(id, new);
                        new
                    }
                    None => {
                        let new = self.create_element(tag);
                        if let Some(id_attr) = selector.strip_prefix('#') {
                            self.set_host_attr(new, "id", id_attr);
                        }
                        self.append_child(self.body, new);
                        new
                    }
                };
                self.mount_points.retain(|(known, _)| known != selector);
                self.mount_points.push((selector.clone(), id));
                self.root = Some(id);
                self.path.clear();
                self.reset_touched();
            }
            Op::SelectHeadElement {
                tag,
                key_attr,
                key_value,
            } => {
                let existing = self.nodes[self.head.0].children.iter().copied().find(|id| {
                    self.tag(*id).is_some_and(|t| t.eq_ignore_ascii_case(tag))
                        && (key_attr.is_empty()
                            || self.attr(*id, key_attr) == Some(key_value.as_str()))
                });
                let id = match existing {
                    Some(id) => id,
                    None => {
                        let new = self.create_element(tag);
                        self.append_child(self.head, new);
                        new
                    }
                };
                self.claimed_head.push(id);
                self.root = Some(id);
                self.path.clear();
                self.reset_touched();
            }
            Op::RemoveUnclaimedHeadElements => {
                let stale: Vec<HostId> = self.nodes[self.head.0]
                    .children
                    .iter()
                    .copied()
                    .filter(|id| {
                        self.attr(*id, HEAD_MARKER_ATTR).is_some()
                            && !self.claimed_head.contains(id)
                    })
                    .collect();
                for id in stale {
                    self.detach(id);
                }
            }
            Op::SetElement { tag } => {
                let current = self.current()?;
                let reuse = current.filter(|id| {
                    self.tag(*id)
                        .is_some_and(|existing| existing.eq_ignore_ascii_case(tag))
                });
                if reuse.is_none() {
                    let new = self.create_element(tag);
                    self.place(new)?;
                }
                self.reset_touched();
            }
            Op::SetText { content } => {
                if let Some(id) = self.current()? {
                    if let HostNodeKind::Text(existing) = &mut self.nodes[id.0].kind {
                        *existing = content.clone();
                        return Ok(());
                    }
                }
                let new = self.create_text(content);
                self.place(new)?;
            }
            Op::SetComment { content } => {
                if let Some(id) = self.current()? {
                    if let HostNodeKind::Comment(existing) = &mut self.nodes[id.0].kind {
                        *existing = content.clone();
                        return Ok(());
                    }
                }
                let new = self.push(HostNodeKind::Comment(content.clone()));
                self.place(new)?;
            }
            Op::SetAttr { key, value } => {
                let id = self.current_element()?;
                self.set_host_attr(id, key, value);
                self.touched_attrs.push(key.clone());
            }
            Op::RemoveOtherAttrs => {
                let id = self.current_element()?;
                let touched = std::mem::take(&mut self.touched_attrs);
                let (attrs, _, _) = self.element_parts(id)?;
                attrs.retain(|(key, _)| touched.contains(key));
                self.touched_attrs = touched;
            }
            Op::SetEventListener {
                position_id,
                event_type,
                capture,
                passive,
            } => {
                let id = self.current_element()?;
                let (_, listeners, _) = self.element_parts(id)?;
                match listeners
                    .iter_mut()
                    .find(|l| l.event_type == *event_type && l.capture == *capture)
                {
                    Some(existing) => {
                        existing.position_id = position_id.clone();
                        existing.passive = *passive;
                    }
                    None => listeners.push(HostListener {
                        position_id: position_id.clone(),
                        event_type: event_type.clone(),
                        capture: *capture,
                        passive: *passive,
                    }),
                }
                self.touched_listeners.push((event_type.clone(), *capture));
            }
            Op::RemoveOtherEventListeners { .. } => {
                let id = self.current_element()?;
                let touched = std::mem::take(&mut self.touched_listeners);
                let (_, listeners, _) = self.element_parts(id)?;
                listeners.retain(|l| touched.contains(&(l.event_type.clone(), l.capture)));
                self.touched_listeners = touched;
            }
            Op::SetInnerHtml { markup } => {
                let id = self.current_element()?;
                for child in std::mem::take(&mut self.nodes[id.0].children) {
                    self.nodes[child.0].parent = None;
                }
                let (_, _, inner_html) = self.element_parts(id)?;
                *inner_html = Some(markup.clone());
            }
            Op::MoveToFirstChild => {
                let id = self.current_element()?;
                let (_, _, inner_html) = self.element_parts(id)?;
                *inner_html = None;
                self.path.push((id, 0));
                self.reset_touched();
            }
            Op::MoveToNextSibling => {
                let slot = self
                    .path
                    .last_mut()
                    .ok_or_else(|| violation("MoveToNextSibling at the selected root"))?;
                slot.1 += 1;
                self.reset_touched();
            }
            Op::MoveToParent => {
                let (parent, index) = self
                    .path
                    .pop()
                    .ok_or_else(|| violation("MoveToParent at the selected root"))?;
                let extra: Vec<HostId> = self.nodes[parent.0]
                    .children
                    .iter()
                    .skip(index)
                    .copied()
                    .collect();
                for child in extra {
                    self.detach(child);
                }
                self.reset_touched();
            }
        }
        Ok(())
    }
}

impl BatchSink for MemoryDocument {
    fn execute(&mut self, batch: &[u8]) -> RenderResult<()> {
        if self.failing {
            return Err(RenderError::new(
                "host.execute_failed",
                "memory document is set to reject batches",
            ));
        }

        self.batch_sizes.push(batch.len());
        for op in decode_batch(batch)? {
            self.apply(&op)?;
            self.ops.push(op);
        }
        Ok(())
    }
}

fn violation(message: &str) -> RenderError {
    RenderError::new("host.protocol_violation", message)
}

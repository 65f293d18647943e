//! Depth-first reconciliation of a virtual tree into cursor instructions.

use vg_core::RenderError;
use vg_core::RenderResult;
use vg_event::PositionTable;
use vg_instr::BatchSink;
use vg_instr::Instruction;
use vg_instr::InstructionList;
use vg_tree::BuildOut;
use vg_tree::NodeId;
use vg_tree::NodeKind;
use vg_tree::PositionId;
use vg_tree::VgNode;
use vg_tree::VgTree;

/// Walks one [`BuildOut`] and writes the instructions that bring the host
/// document into agreement with it.
///
/// Every visited element gets its attributes and listeners re-asserted followed
/// by an unconditional remove-others, so a single pass converges from any prior
/// host state without comparing against the previous tree.
pub struct Reconciler<'a, S> {
    pub(crate) list: &'a mut InstructionList<S>,
    pub(crate) build_out: &'a BuildOut,
    pub(crate) mount_selector: &'a str,
    pub(crate) table: PositionTable,
}

impl<'a, S: BatchSink> Reconciler<'a, S> {
    pub fn new(
        list: &'a mut InstructionList<S>,
        build_out: &'a BuildOut,
        mount_selector: &'a str,
    ) -> Self {
        Self {
            list,
            build_out,
            mount_selector,
            table: PositionTable::new(),
        }
    }

    /// Handlers registered while visiting, keyed by position.
    pub fn into_table(self) -> PositionTable {
        self.table
    }

    pub(crate) fn tree(&self) -> &'a VgTree {
        &self.build_out.tree
    }

    pub fn visit_first(&mut self) -> RenderResult<()> {
        let root = self.build_out.validate()?;

        if root.is_tag("head") || root.is_tag("body") {
            return Err(RenderError::new(
                "render.root_tag_forbidden",
                format!("<{}> cannot be the root of a render pass; use <html>", root.data),
            ));
        }

        self.list.write(Instruction::ClearElement)?;

        let position = PositionId::root();
        if root.is_tag("html") {
            return self.visit_html(self.build_out.doc, &position);
        }

        self.visit_mount(self.build_out.doc, &position)
    }

    pub(crate) fn visit_mount(&mut self, id: NodeId, position: &PositionId) -> RenderResult<()> {
        if self.mount_selector.is_empty() {
            return Err(RenderError::new(
                "render.mount_selector_missing",
                "a mount selector is required unless the root element is <html>",
            ));
        }

        let node = self.tree().node(id)?;
        self.list.write(Instruction::SelectMountPoint {
            selector: self.mount_selector,
            tag: &node.data,
        })?;
        self.visit_sync_element_etc(id, position)
    }

    fn visit_sync_node(&mut self, id: NodeId, position: &PositionId) -> RenderResult<()> {
        let node = self.tree().node(id)?;
        match node.kind {
            NodeKind::Element => {
                self.list.write(Instruction::SetElement { tag: &node.data })?;
            }
            NodeKind::Text => {
                return self.list.write(Instruction::SetText {
                    content: &node.data,
                });
            }
            NodeKind::Comment => {
                return self.list.write(Instruction::SetComment {
                    content: &node.data,
                });
            }
            NodeKind::Document => {
                return Err(RenderError::new(
                    "render.node_type_unexpected",
                    format!("document node found at position {position}"),
                ));
            }
        }

        // only elements carry attributes, listeners and children
        self.visit_sync_element_etc(id, position)
    }

    /// Syncs everything that only applies to elements.
    pub(crate) fn visit_sync_element_etc(
        &mut self,
        id: NodeId,
        position: &PositionId,
    ) -> RenderResult<()> {
        let node = self.tree().node(id)?;
        self.write_attrs(node, true, None)?;
        self.write_listeners(node, position)?;
        self.visit_content(id, position)
    }

    pub(crate) fn write_attrs(
        &mut self,
        node: &VgNode,
        remove_others: bool,
        marker: Option<(&str, &str)>,
    ) -> RenderResult<()> {
        for attr in &node.attrs {
            self.list.write(Instruction::SetAttr {
                key: &attr.key,
                value: &attr.value,
            })?;
        }

        if let Some((key, value)) = marker {
            self.list.write(Instruction::SetAttr { key, value })?;
        }

        if remove_others {
            self.list.write(Instruction::RemoveOtherAttrs)?;
        }
        Ok(())
    }

    pub(crate) fn write_listeners(&mut self, node: &VgNode, position: &PositionId) -> RenderResult<()> {
        for spec in &node.event_handlers {
            self.list.write(Instruction::SetEventListener {
                position_id: position.as_bytes(),
                event_type: &spec.event_type,
                capture: spec.capture,
                passive: spec.passive,
            })?;
            self.table
                .insert(position.clone(), spec.event_type.as_str(), spec.capture, spec.handler);
        }

        // always written so listeners from earlier passes are taken away
        self.list.write(Instruction::RemoveOtherEventListeners {
            position_id: position.as_bytes(),
        })
    }

    /// Raw markup or children of an element whose own state is already synced.
    pub(crate) fn visit_content(&mut self, id: NodeId, position: &PositionId) -> RenderResult<()> {
        let node = self.tree().node(id)?;
        if let Some(markup) = &node.inner_html {
            return self.list.write(Instruction::SetInnerHtml { markup });
        }

        if !node.has_children() {
            return Ok(());
        }

        self.list.write(Instruction::MoveToFirstChild)?;
        for (index, (child, _)) in self.tree().children(id).enumerate() {
            let child_position = position.child(index + 1);
            self.visit_sync_node(child, &child_position)?;
            self.list.write(Instruction::MoveToNextSibling)?;
        }
        self.list.write(Instruction::MoveToParent)
    }
}

//! Whole-page rendering rooted at `<html>`.
//!
//! Host-owned document structure is preserved: `html` and `body` attributes are
//! only ever added or overwritten, and head children are addressed by a natural
//! key so existing metadata, scripts and the title are updated in place rather
//! than duplicated. Head elements without a natural key carry a marker
//! attribute; marked elements not claimed in a pass are removed.

use crate::visitor::Reconciler;
use std::collections::HashSet;
use vg_core::RenderError;
use vg_core::RenderResult;
use vg_instr::BatchSink;
use vg_instr::Instruction;
use vg_tree::NodeId;
use vg_tree::NodeKind;
use vg_tree::PositionId;
use vg_tree::VgNode;

const HEAD_MARKER_ATTR: &str = "data-vg-head";

const META_KEY_ATTRS: [&str; 4] = ["name", "property", "http-equiv", "charset"];

/// How a producer-declared head element is matched against host content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum HeadKey<'a> {
    /// First head child with the tag.
    Singleton,
    Attr(&'static str, &'a str),
    Marker(String),
}

fn head_key<'a>(node: &'a VgNode, position: &PositionId) -> HeadKey<'a> {
    let tag = node.data.to_ascii_lowercase();
    match tag.as_str() {
        "title" => HeadKey::Singleton,
        "meta" => META_KEY_ATTRS
            .iter()
            .find_map(|&key| node.attr(key).map(|value| HeadKey::Attr(key, value)))
            .unwrap_or_else(|| HeadKey::Marker(position.to_string())),
        "link" => match node.attr("href") {
            Some(href) => HeadKey::Attr("href", href),
            None => HeadKey::Marker(position.to_string()),
        },
        "script" => match node.attr("src") {
            Some(src) => HeadKey::Attr("src", src),
            None => HeadKey::Marker(position.to_string()),
        },
        _ => HeadKey::Marker(position.to_string()),
    }
}

impl<S: BatchSink> Reconciler<'_, S> {
    pub(crate) fn visit_html(&mut self, id: NodeId, position: &PositionId) -> RenderResult<()> {
        let html = self.tree().node(id)?;
        self.sync_structural_attrs(html, "html")?;

        let mut seen_head = false;
        let mut seen_body = false;
        for (index, (child_id, child)) in self.tree().children(id).enumerate() {
            if child.is_blank_text() {
                continue;
            }

            let child_position = position.child(index + 1);
            if child.is_tag("head") {
                claim_once(&mut seen_head, "head")?;
                self.visit_head(child_id, &child_position)?;
            } else if child.is_tag("body") {
                claim_once(&mut seen_body, "body")?;
                self.visit_body(child_id, &child_position)?;
            } else {
                return Err(RenderError::new(
                    "render.unexpected_html_child",
                    format!(
                        "unexpected {} `{}` inside <html>; only <head> and <body> are allowed",
                        child.kind.as_str(),
                        child.data
                    ),
                ));
            }
        }

        if !seen_head {
            // marked elements from earlier passes are unclaimed now
            self.list.write(Instruction::RemoveUnclaimedHeadElements)?;
        }
        Ok(())
    }

    /// `html` and `head` accept attributes but never listeners or raw markup.
    fn sync_structural_attrs(&mut self, node: &VgNode, tag: &str) -> RenderResult<()> {
        if !node.event_handlers.is_empty() {
            return Err(RenderError::new(
                "render.structural_listener",
                format!("event listeners are not supported on <{tag}>"),
            ));
        }
        if node.inner_html.is_some() {
            return Err(RenderError::new(
                "render.structural_inner_html",
                format!("raw inner HTML is not supported on <{tag}>"),
            ));
        }
        if node.attrs.is_empty() {
            return Ok(());
        }

        self.list.write(Instruction::SelectMountPoint { selector: tag, tag })?;
        self.write_attrs(node, false, None)
    }

    fn visit_head(&mut self, id: NodeId, position: &PositionId) -> RenderResult<()> {
        let head = self.tree().node(id)?;
        self.sync_structural_attrs(head, "head")?;

        let mut claimed: HashSet<(String, HeadKey<'_>)> = HashSet::new();
        for (index, (child_id, child)) in self.tree().children(id).enumerate() {
            if child.is_blank_text() {
                continue;
            }
            if child.kind != NodeKind::Element {
                return Err(RenderError::new(
                    "render.unexpected_head_child",
                    format!(
                        "{} nodes are not allowed directly inside <head>",
                        child.kind.as_str()
                    ),
                ));
            }

            let child_position = position.child(index + 1);
            let key = head_key(child, &child_position);
            if !claimed.insert((child.data.to_ascii_lowercase(), key.clone())) {
                return Err(RenderError::new(
                    "render.duplicate_head_key",
                    format!(
                        "<{}> at position {child_position} duplicates an earlier head element",
                        child.data
                    ),
                ));
            }

            let (key_attr, key_value, marker) = match &key {
                HeadKey::Singleton => ("", "", None),
                HeadKey::Attr(attr, value) => (*attr, *value, None),
                HeadKey::Marker(value) => (
                    HEAD_MARKER_ATTR,
                    value.as_str(),
                    Some((HEAD_MARKER_ATTR, value.as_str())),
                ),
            };

            self.list.write(Instruction::SelectHeadElement {
                tag: &child.data,
                key_attr,
                key_value,
            })?;
            self.write_attrs(child, true, marker)?;
            self.write_listeners(child, &child_position)?;
            self.visit_content(child_id, &child_position)?;
        }

        self.list.write(Instruction::RemoveUnclaimedHeadElements)
    }

    fn visit_body(&mut self, id: NodeId, position: &PositionId) -> RenderResult<()> {
        let body = self.tree().node(id)?;
        self.list.write(Instruction::SelectMountPoint {
            selector: "body",
            tag: "body",
        })?;
        self.write_attrs(body, false, None)?;
        self.write_listeners(body, position)?;

        if self.mount_selector.is_empty() {
            return self.visit_content(id, position);
        }

        if body.inner_html.is_some() {
            log::warn!("inner HTML on <body> is ignored while mounting at `{}`", self.mount_selector);
        }

        let mut mounted = false;
        for (index, (child_id, child)) in self.tree().children(id).enumerate() {
            if mounted || !child.is_element() {
                if !child.is_blank_text() {
                    log::warn!(
                        "ignoring {} `{}` in <body>; only the first element is mounted at `{}`",
                        child.kind.as_str(),
                        child.data,
                        self.mount_selector
                    );
                }
                continue;
            }

            mounted = true;
            self.visit_mount(child_id, &position.child(index + 1))?;
        }

        if !mounted {
            log::debug!("<body> has no element to mount at `{}`", self.mount_selector);
        }
        Ok(())
    }
}

fn claim_once(seen: &mut bool, tag: &str) -> RenderResult<()> {
    if *seen {
        return Err(RenderError::new(
            "render.duplicate_structural_child",
            format!("<html> contains more than one <{tag}>"),
        ));
    }
    *seen = true;
    Ok(())
}

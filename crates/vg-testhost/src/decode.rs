//! Instruction stream decoding.

use vg_core::RenderError;
use vg_core::RenderResult;
use vg_instr::OpCode;
use vg_instr::STRING_PREFIX_BYTES;

/// Owned form of one decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    ClearElement,
    SelectMountPoint { selector: String, tag: String },
    SetElement { tag: String },
    SetText { content: String },
    SetComment { content: String },
    SetAttr { key: String, value: String },
    RemoveOtherAttrs,
    SetEventListener {
        position_id: String,
        event_type: String,
        capture: bool,
        passive: bool,
    },
    RemoveOtherEventListeners { position_id: String },
    SetInnerHtml { markup: String },
    MoveToFirstChild,
    MoveToNextSibling,
    MoveToParent,
    SelectHeadElement {
        tag: String,
        key_attr: String,
        key_value: String,
    },
    RemoveUnclaimedHeadElements,
}

impl Op {
    pub fn set_attr(key: &str, value: &str) -> Self {
        Self::SetAttr {
            key: key.to_owned(),
            value: value.to_owned(),
        }
    }
}

/// Decodes one flushed batch into instructions.
pub fn decode_batch(batch: &[u8]) -> RenderResult<Vec<Op>> {
    let mut offset = 0_usize;
    let mut out = Vec::new();
    while offset < batch.len() {
        out.push(decode_one(batch, &mut offset)?);
    }
    Ok(out)
}

fn decode_one(batch: &[u8], offset: &mut usize) -> RenderResult<Op> {
    let raw = read_exact(batch, offset, 1, "opcode")?[0];
    let opcode = OpCode::from_byte(raw).ok_or_else(|| {
        RenderError::new(
            "host.opcode_unknown",
            format!("unknown opcode `{raw}` at byte {}", *offset - 1),
        )
    })?;

    let op = match opcode {
        OpCode::ClearElement => Op::ClearElement,
        OpCode::SelectMountPoint => Op::SelectMountPoint {
            selector: read_string(batch, offset, "selector")?,
            tag: read_string(batch, offset, "tag")?,
        },
        OpCode::SetElement => Op::SetElement {
            tag: read_string(batch, offset, "tag")?,
        },
        OpCode::SetText => Op::SetText {
            content: read_string(batch, offset, "content")?,
        },
        OpCode::SetComment => Op::SetComment {
            content: read_string(batch, offset, "content")?,
        },
        OpCode::SetAttr => Op::SetAttr {
            key: read_string(batch, offset, "key")?,
            value: read_string(batch, offset, "value")?,
        },
        OpCode::RemoveOtherAttrs => Op::RemoveOtherAttrs,
        OpCode::SetEventListener => Op::SetEventListener {
            position_id: read_string(batch, offset, "position_id")?,
            event_type: read_string(batch, offset, "event_type")?,
            capture: read_bool(batch, offset, "capture")?,
            passive: read_bool(batch, offset, "passive")?,
        },
        OpCode::RemoveOtherEventListeners => Op::RemoveOtherEventListeners {
            position_id: read_string(batch, offset, "position_id")?,
        },
        OpCode::SetInnerHtml => Op::SetInnerHtml {
            markup: read_string(batch, offset, "markup")?,
        },
        OpCode::MoveToFirstChild => Op::MoveToFirstChild,
        OpCode::MoveToNextSibling => Op::MoveToNextSibling,
        OpCode::MoveToParent => Op::MoveToParent,
        OpCode::SelectHeadElement => Op::SelectHeadElement {
            tag: read_string(batch, offset, "tag")?,
            key_attr: read_string(batch, offset, "key_attr")?,
            key_value: read_string(batch, offset, "key_value")?,
        },
        OpCode::RemoveUnclaimedHeadElements => Op::RemoveUnclaimedHeadElements,
    };
    Ok(op)
}

fn read_bool(batch: &[u8], offset: &mut usize, field: &str) -> RenderResult<bool> {
    match read_exact(batch, offset, 1, field)?[0] {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RenderError::new(
            "host.field_invalid",
            format!("invalid flag `{other}` for `{field}`; expected 0 or 1"),
        )),
    }
}

fn read_string(batch: &[u8], offset: &mut usize, field: &str) -> RenderResult<String> {
    let len_bytes = read_exact(batch, offset, STRING_PREFIX_BYTES, field)?;
    let len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
    let bytes = read_exact(batch, offset, len, field)?;
    String::from_utf8(bytes.to_vec()).map_err(|error| {
        RenderError::new(
            "host.utf8_invalid",
            format!("instruction field `{field}` is not valid UTF-8: {error}"),
        )
    })
}

fn read_exact<'a>(
    batch: &'a [u8],
    offset: &mut usize,
    len: usize,
    field: &str,
) -> RenderResult<&'a [u8]> {
    let end = offset.saturating_add(len);
    if end > batch.len() {
        return Err(RenderError::new(
            "host.batch_truncated",
            format!("batch ended while reading `{field}` (need {len} bytes)"),
        ));
    }

    let out = &batch[*offset..end];
    *offset = end;
    Ok(out)
}

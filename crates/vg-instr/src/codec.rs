//! Binary encoding of individual instructions.

use vg_core::RenderError;
use vg_core::RenderResult;

/// Byte length of the big-endian prefix written before every string argument.
pub const STRING_PREFIX_BYTES: usize = 4;

/// Wire opcodes. Zero is never emitted so a zeroed buffer is not a valid stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    ClearElement = 1,
    SelectMountPoint = 2,
    SetElement = 3,
    SetText = 4,
    SetComment = 5,
    SetAttr = 6,
    RemoveOtherAttrs = 7,
    SetEventListener = 8,
    RemoveOtherEventListeners = 9,
    SetInnerHtml = 10,
    MoveToFirstChild = 11,
    MoveToNextSibling = 12,
    MoveToParent = 13,
    SelectHeadElement = 14,
    RemoveUnclaimedHeadElements = 15,
}

impl OpCode {
    pub fn from_byte(raw: u8) -> Option<Self> {
        Some(match raw {
            1 => Self::ClearElement,
            2 => Self::SelectMountPoint,
            3 => Self::SetElement,
            4 => Self::SetText,
            5 => Self::SetComment,
            6 => Self::SetAttr,
            7 => Self::RemoveOtherAttrs,
            8 => Self::SetEventListener,
            9 => Self::RemoveOtherEventListeners,
            10 => Self::SetInnerHtml,
            11 => Self::MoveToFirstChild,
            12 => Self::MoveToNextSibling,
            13 => Self::MoveToParent,
            14 => Self::SelectHeadElement,
            15 => Self::RemoveUnclaimedHeadElements,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClearElement => "ClearElement",
            Self::SelectMountPoint => "SelectMountPoint",
            Self::SetElement => "SetElement",
            Self::SetText => "SetText",
            Self::SetComment => "SetComment",
            Self::SetAttr => "SetAttr",
            Self::RemoveOtherAttrs => "RemoveOtherAttrs",
            Self::SetEventListener => "SetEventListener",
            Self::RemoveOtherEventListeners => "RemoveOtherEventListeners",
            Self::SetInnerHtml => "SetInnerHTML",
            Self::MoveToFirstChild => "MoveToFirstChild",
            Self::MoveToNextSibling => "MoveToNextSibling",
            Self::MoveToParent => "MoveToParent",
            Self::SelectHeadElement => "SelectHeadElement",
            Self::RemoveUnclaimedHeadElements => "RemoveUnclaimedHeadElements",
        }
    }
}

/// One tree-synchronization instruction, borrowing its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction<'a> {
    ClearElement,
    SelectMountPoint {
        selector: &'a str,
        tag: &'a str,
    },
    SetElement {
        tag: &'a str,
    },
    SetText {
        content: &'a str,
    },
    SetComment {
        content: &'a str,
    },
    SetAttr {
        key: &'a str,
        value: &'a str,
    },
    RemoveOtherAttrs,
    SetEventListener {
        position_id: &'a [u8],
        event_type: &'a str,
        capture: bool,
        passive: bool,
    },
    RemoveOtherEventListeners {
        position_id: &'a [u8],
    },
    SetInnerHtml {
        markup: &'a str,
    },
    MoveToFirstChild,
    MoveToNextSibling,
    MoveToParent,
    /// Resolve or create a direct child of `<head>` identified by tag and one
    /// key attribute. An empty `key_attr` matches the first child with `tag`.
    SelectHeadElement {
        tag: &'a str,
        key_attr: &'a str,
        key_value: &'a str,
    },
    RemoveUnclaimedHeadElements,
}

impl Instruction<'_> {
    pub fn opcode(&self) -> OpCode {
        match self {
            Self::ClearElement => OpCode::ClearElement,
            Self::SelectMountPoint { .. } => OpCode::SelectMountPoint,
            Self::SetElement { .. } => OpCode::SetElement,
            Self::SetText { .. } => OpCode::SetText,
            Self::SetComment { .. } => OpCode::SetComment,
            Self::SetAttr { .. } => OpCode::SetAttr,
            Self::RemoveOtherAttrs => OpCode::RemoveOtherAttrs,
            Self::SetEventListener { .. } => OpCode::SetEventListener,
            Self::RemoveOtherEventListeners { .. } => OpCode::RemoveOtherEventListeners,
            Self::SetInnerHtml { .. } => OpCode::SetInnerHtml,
            Self::MoveToFirstChild => OpCode::MoveToFirstChild,
            Self::MoveToNextSibling => OpCode::MoveToNextSibling,
            Self::MoveToParent => OpCode::MoveToParent,
            Self::SelectHeadElement { .. } => OpCode::SelectHeadElement,
            Self::RemoveUnclaimedHeadElements => OpCode::RemoveUnclaimedHeadElements,
        }
    }

    /// Exact number of bytes [`encode_instruction`] writes for this instruction.
    pub fn encoded_len(&self) -> usize {
        let strings = |parts: &[&[u8]]| {
            parts
                .iter()
                .map(|part| STRING_PREFIX_BYTES + part.len())
                .sum::<usize>()
        };

        1 + match self {
            Self::ClearElement
            | Self::RemoveOtherAttrs
            | Self::MoveToFirstChild
            | Self::MoveToNextSibling
            | Self::MoveToParent
            | Self::RemoveUnclaimedHeadElements => 0,
            Self::SelectMountPoint { selector, tag } => {
                strings(&[selector.as_bytes(), tag.as_bytes()])
            }
            Self::SetElement { tag } => strings(&[tag.as_bytes()]),
            Self::SetText { content } | Self::SetComment { content } => {
                strings(&[content.as_bytes()])
            }
            Self::SetAttr { key, value } => strings(&[key.as_bytes(), value.as_bytes()]),
            Self::SetEventListener {
                position_id,
                event_type,
                ..
            } => strings(&[*position_id, event_type.as_bytes()]) + 2,
            Self::RemoveOtherEventListeners { position_id } => strings(&[*position_id]),
            Self::SetInnerHtml { markup } => strings(&[markup.as_bytes()]),
            Self::SelectHeadElement {
                tag,
                key_attr,
                key_value,
            } => strings(&[tag.as_bytes(), key_attr.as_bytes(), key_value.as_bytes()]),
        }
    }
}

/// Encodes `instruction` at the start of `out`, returning the bytes written.
///
/// `out` must hold at least [`Instruction::encoded_len`] bytes.
pub fn encode_instruction(instruction: &Instruction<'_>, out: &mut [u8]) -> RenderResult<usize> {
    let needed = instruction.encoded_len();
    if out.len() < needed {
        return Err(RenderError::new(
            "instr.encode_short_buffer",
            format!(
                "{} needs {needed} bytes but only {} are available",
                instruction.opcode().as_str(),
                out.len()
            ),
        ));
    }

    let mut offset = 0_usize;
    write_u8(out, &mut offset, instruction.opcode() as u8);
    match instruction {
        Instruction::ClearElement
        | Instruction::RemoveOtherAttrs
        | Instruction::MoveToFirstChild
        | Instruction::MoveToNextSibling
        | Instruction::MoveToParent
        | Instruction::RemoveUnclaimedHeadElements => {}
        Instruction::SelectMountPoint { selector, tag } => {
            write_bytes(out, &mut offset, selector.as_bytes(), "selector")?;
            write_bytes(out, &mut offset, tag.as_bytes(), "tag")?;
        }
        Instruction::SetElement { tag } => {
            write_bytes(out, &mut offset, tag.as_bytes(), "tag")?;
        }
        Instruction::SetText { content } | Instruction::SetComment { content } => {
            write_bytes(out, &mut offset, content.as_bytes(), "content")?;
        }
        Instruction::SetAttr { key, value } => {
            write_bytes(out, &mut offset, key.as_bytes(), "key")?;
            write_bytes(out, &mut offset, value.as_bytes(), "value")?;
        }
        Instruction::SetEventListener {
            position_id,
            event_type,
            capture,
            passive,
        } => {
            write_bytes(out, &mut offset, position_id, "position_id")?;
            write_bytes(out, &mut offset, event_type.as_bytes(), "event_type")?;
            write_u8(out, &mut offset, u8::from(*capture));
            write_u8(out, &mut offset, u8::from(*passive));
        }
        Instruction::RemoveOtherEventListeners { position_id } => {
            write_bytes(out, &mut offset, position_id, "position_id")?;
        }
        Instruction::SetInnerHtml { markup } => {
            write_bytes(out, &mut offset, markup.as_bytes(), "markup")?;
        }
        Instruction::SelectHeadElement {
            tag,
            key_attr,
            key_value,
        } => {
            write_bytes(out, &mut offset, tag.as_bytes(), "tag")?;
            write_bytes(out, &mut offset, key_attr.as_bytes(), "key_attr")?;
            write_bytes(out, &mut offset, key_value.as_bytes(), "key_value")?;
        }
    }

    Ok(offset)
}

fn write_u8(out: &mut [u8], offset: &mut usize, value: u8) {
    out[*offset] = value;
    *offset += 1;
}

fn write_bytes(out: &mut [u8], offset: &mut usize, bytes: &[u8], field: &str) -> RenderResult<()> {
    let len_u32 = u32::try_from(bytes.len()).map_err(|_| {
        RenderError::new(
            "instr.string_too_large",
            format!("`{field}` length does not fit in the 32-bit string prefix"),
        )
    })?;

    let start = *offset;
    out[start..start + STRING_PREFIX_BYTES].copy_from_slice(&len_u32.to_be_bytes());
    let body = start + STRING_PREFIX_BYTES;
    out[body..body + bytes.len()].copy_from_slice(bytes);
    *offset = body + bytes.len();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Instruction;
    use super::OpCode;
    use super::encode_instruction;

    fn encode(instruction: Instruction<'_>) -> Vec<u8> {
        let mut out = vec![0_u8; instruction.encoded_len()];
        let written = encode_instruction(&instruction, &mut out).unwrap_or_else(|_| unreachable!());
        assert_eq!(written, out.len());
        out
    }

    #[test]
    fn navigation_instructions_are_single_bytes() {
        assert_eq!(encode(Instruction::MoveToFirstChild), vec![11]);
        assert_eq!(encode(Instruction::MoveToNextSibling), vec![12]);
        assert_eq!(encode(Instruction::MoveToParent), vec![13]);
        assert_eq!(encode(Instruction::ClearElement), vec![1]);
    }

    #[test]
    fn set_attr_writes_length_prefixed_strings() {
        let bytes = encode(Instruction::SetAttr {
            key: "id",
            value: "main",
        });
        assert_eq!(
            bytes,
            vec![6, 0, 0, 0, 2, b'i', b'd', 0, 0, 0, 4, b'm', b'a', b'i', b'n']
        );
    }

    #[test]
    fn event_listener_flags_follow_strings() {
        let bytes = encode(Instruction::SetEventListener {
            position_id: b"0_1",
            event_type: "click",
            capture: true,
            passive: false,
        });
        assert_eq!(bytes[0], OpCode::SetEventListener as u8);
        assert_eq!(&bytes[bytes.len() - 2..], &[1, 0]);
        assert_eq!(bytes.len(), 1 + 4 + 3 + 4 + 5 + 2);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let mut out = [0_u8; 3];
        let result = encode_instruction(&Instruction::SetText { content: "hello" }, &mut out);
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "instr.encode_short_buffer");
        }
    }

    #[test]
    fn opcode_bytes_map_back() {
        for raw in 1..=15_u8 {
            let opcode = OpCode::from_byte(raw);
            assert!(opcode.is_some());
            assert_eq!(opcode.map(|op| op as u8), Some(raw));
        }
        assert_eq!(OpCode::from_byte(0), None);
        assert_eq!(OpCode::from_byte(16), None);
    }
}

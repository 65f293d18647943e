//! Fixed-capacity instruction buffer with automatic flushing.

use crate::codec::Instruction;
use crate::codec::encode_instruction;
use vg_core::RenderError;
use vg_core::RenderResult;

/// Receives each filled buffer prefix in one call.
pub trait BatchSink {
    fn execute(&mut self, batch: &[u8]) -> RenderResult<()>;
}

impl<S: BatchSink + ?Sized> BatchSink for &mut S {
    fn execute(&mut self, batch: &[u8]) -> RenderResult<()> {
        (**self).execute(batch)
    }
}

/// Counters accumulated since the list was created or last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstructionStats {
    pub instructions: usize,
    pub bytes: usize,
    pub flushes: usize,
}

/// Append-only instruction channel to a host executor.
///
/// Instructions are never split across flushes, and the list tracks the host
/// cursor's depth so navigation past the selected root fails before anything is
/// sent.
#[derive(Debug)]
pub struct InstructionList<S> {
    buffer: Vec<u8>,
    pos: usize,
    cursor_depth: Option<usize>,
    stats: InstructionStats,
    sink: S,
}

impl<S: BatchSink> InstructionList<S> {
    pub fn new(capacity: usize, sink: S) -> RenderResult<Self> {
        if capacity == 0 {
            return Err(RenderError::new(
                "instr.capacity_invalid",
                "instruction buffer capacity must be greater than zero",
            ));
        }

        Ok(Self {
            buffer: vec![0; capacity],
            pos: 0,
            cursor_depth: None,
            stats: InstructionStats::default(),
            sink,
        })
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn pending_bytes(&self) -> usize {
        self.pos
    }

    /// Depth of the host cursor below the selected root, `None` when cleared.
    pub fn cursor_depth(&self) -> Option<usize> {
        self.cursor_depth
    }

    pub fn stats(&self) -> InstructionStats {
        self.stats
    }

    pub fn take_stats(&mut self) -> InstructionStats {
        std::mem::take(&mut self.stats)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Appends one instruction, flushing first when the buffer lacks room.
    pub fn write(&mut self, instruction: Instruction<'_>) -> RenderResult<()> {
        let next_depth = self.next_cursor_depth(&instruction)?;

        let needed = instruction.encoded_len();
        if needed > self.buffer.len() {
            return Err(RenderError::new(
                "instr.buffer_overflow",
                format!(
                    "{} needs {needed} bytes, more than the whole buffer ({} bytes)",
                    instruction.opcode().as_str(),
                    self.buffer.len()
                ),
            ));
        }

        if self.buffer.len() - self.pos < needed {
            self.flush()?;
        }

        let written = encode_instruction(&instruction, &mut self.buffer[self.pos..])?;
        self.pos += written;
        self.cursor_depth = next_depth;
        self.stats.instructions += 1;
        self.stats.bytes += written;
        Ok(())
    }

    /// Hands the pending prefix to the sink and rewinds the buffer.
    pub fn flush(&mut self) -> RenderResult<()> {
        if self.pos == 0 {
            return Ok(());
        }

        log::trace!("flushing {} instruction bytes", self.pos);
        let result = self.sink.execute(&self.buffer[..self.pos]);
        self.pos = 0;
        self.stats.flushes += 1;
        result
    }

    /// Drops pending instructions without sending them and forgets the cursor.
    pub fn discard_pending(&mut self) {
        if self.pos > 0 {
            log::debug!("discarding {} unflushed instruction bytes", self.pos);
        }
        self.pos = 0;
        self.cursor_depth = None;
    }

    fn next_cursor_depth(&self, instruction: &Instruction<'_>) -> RenderResult<Option<usize>> {
        match instruction {
            Instruction::ClearElement => Ok(None),
            Instruction::SelectMountPoint { .. } | Instruction::SelectHeadElement { .. } => {
                Ok(Some(0))
            }
            Instruction::RemoveUnclaimedHeadElements => Ok(self.cursor_depth),
            Instruction::MoveToFirstChild => {
                let depth = self.require_cursor(instruction)?;
                Ok(Some(depth + 1))
            }
            Instruction::MoveToNextSibling => {
                let depth = self.require_cursor(instruction)?;
                if depth == 0 {
                    return Err(cursor_at_root(instruction));
                }
                Ok(Some(depth))
            }
            Instruction::MoveToParent => {
                let depth = self.require_cursor(instruction)?;
                if depth == 0 {
                    return Err(cursor_at_root(instruction));
                }
                Ok(Some(depth - 1))
            }
            _ => {
                self.require_cursor(instruction)?;
                Ok(self.cursor_depth)
            }
        }
    }

    fn require_cursor(&self, instruction: &Instruction<'_>) -> RenderResult<usize> {
        self.cursor_depth.ok_or_else(|| {
            RenderError::new(
                "instr.no_cursor",
                format!(
                    "{} written before a mount point was selected",
                    instruction.opcode().as_str()
                ),
            )
        })
    }
}

fn cursor_at_root(instruction: &Instruction<'_>) -> RenderError {
    RenderError::new(
        "instr.cursor_at_root",
        format!(
            "{} is not valid while the cursor is at the selected root",
            instruction.opcode().as_str()
        ),
    )
}

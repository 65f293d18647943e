//! DOM synchronization instruction protocol.
//!
//! The renderer never touches host nodes directly. It writes a stream of
//! cursor-relative instructions into a fixed buffer and hands the filled prefix
//! to the host in one call per flush.

mod codec;
mod list;

pub use codec::Instruction;
pub use codec::OpCode;
pub use codec::STRING_PREFIX_BYTES;
pub use codec::encode_instruction;
pub use list::BatchSink;
pub use list::InstructionList;
pub use list::InstructionStats;

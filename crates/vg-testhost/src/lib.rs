//! In-memory host document for exercising the instruction protocol in tests.
//!
//! [`MemoryDocument`] decodes every batch it receives and applies it to a small
//! arena DOM, following the cursor policy the browser host implements: moving
//! past the last child yields an empty slot the next node instruction fills, and
//! moving to the parent drops every child from the cursor slot onwards.

mod decode;
mod document;

pub use decode::Op;
pub use decode::decode_batch;
pub use document::HostId;
pub use document::HostListener;
pub use document::HostNode;
pub use document::HostNodeKind;
pub use document::MemoryDocument;

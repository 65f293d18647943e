//! Host event decoding and position-based dispatch.
//!
//! The host never passes node references back. It writes a self-contained event
//! record into a shared [`EventBuffer`] and signals; the [`EventRouter`] resolves
//! the record's position to the handlers registered during the latest pass.

mod buffer;
mod router;

pub use buffer::DomEvent;
pub use buffer::EVENT_HEADER_BYTES;
pub use buffer::EventBuffer;
pub use buffer::EventPhase;
pub use buffer::EventResponse;
pub use router::EventDispatcher;
pub use router::EventRouter;
pub use router::PositionTable;
pub use router::RouteOutcome;

//! Position-keyed handler lookup and dispatch.

use crate::buffer::DomEvent;
use crate::buffer::EventBuffer;
use crate::buffer::EventPhase;
use crate::buffer::EventResponse;
use std::collections::HashMap;
use vg_core::RenderResult;
use vg_tree::HandlerId;
use vg_tree::PositionId;

/// Producer-side handler invocation.
pub trait EventDispatcher {
    fn dispatch(&mut self, handler: HandlerId, event: &DomEvent) -> RenderResult<EventResponse>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HandlerEntry {
    handler: HandlerId,
    capture: bool,
}

/// Handlers registered during one render pass, keyed by (position, event type).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionTable {
    entries: HashMap<(PositionId, String), Vec<HandlerEntry>>,
}

impl PositionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        position_id: PositionId,
        event_type: impl Into<String>,
        capture: bool,
        handler: HandlerId,
    ) {
        self.entries
            .entry((position_id, event_type.into()))
            .or_default()
            .push(HandlerEntry { handler, capture });
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Handlers at `position_id` for `event_type` that listen in `phase`.
    pub fn resolve(
        &self,
        position_id: &PositionId,
        event_type: &str,
        phase: EventPhase,
    ) -> Vec<HandlerId> {
        let key = (position_id.clone(), event_type.to_owned());
        let Some(entries) = self.entries.get(&key) else {
            return Vec::new();
        };

        entries
            .iter()
            .filter(|entry| match phase {
                EventPhase::Capturing => entry.capture,
                EventPhase::AtTarget => true,
                EventPhase::Bubbling => !entry.capture,
            })
            .map(|entry| entry.handler)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The host signalled without writing a record.
    NoEvent,
    /// No handler is registered for the event's position and type.
    Unrouted,
    Dispatched { handlers: usize },
}

/// Resolves host events against the latest pass's [`PositionTable`].
#[derive(Debug, Default)]
pub struct EventRouter {
    table: PositionTable,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self) -> &PositionTable {
        &self.table
    }

    pub fn install_table(&mut self, table: PositionTable) {
        self.table = table;
    }

    pub fn clear(&mut self) {
        self.table = PositionTable::new();
    }

    /// Decodes the pending record in `buffer`, dispatches it and writes the
    /// merged response back for the host.
    pub fn handle(
        &mut self,
        buffer: &mut EventBuffer,
        dispatcher: &mut dyn EventDispatcher,
    ) -> RenderResult<RouteOutcome> {
        let event = match buffer.read_event() {
            Ok(Some(event)) => event,
            Ok(None) => {
                log::warn!("event signalled with an empty event buffer");
                return Ok(RouteOutcome::NoEvent);
            }
            Err(error) => {
                buffer.complete(EventResponse::default());
                return Err(error);
            }
        };

        let handlers = self
            .table
            .resolve(&event.position_id, &event.event_type, event.phase);
        if handlers.is_empty() {
            log::debug!(
                "no handler for `{}` at position {}",
                event.event_type,
                event.position_id
            );
            buffer.complete(EventResponse::default());
            return Ok(RouteOutcome::Unrouted);
        }

        let mut response = EventResponse::default();
        for handler in &handlers {
            match dispatcher.dispatch(*handler, &event) {
                Ok(next) => response = response.merge(next),
                Err(error) => {
                    buffer.complete(response);
                    return Err(error);
                }
            }
        }

        buffer.complete(response);
        Ok(RouteOutcome::Dispatched {
            handlers: handlers.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::EventDispatcher;
    use super::EventRouter;
    use super::PositionTable;
    use super::RouteOutcome;
    use crate::buffer::DomEvent;
    use crate::buffer::EventBuffer;
    use crate::buffer::EventPhase;
    use crate::buffer::EventResponse;
    use vg_core::RenderError;
    use vg_core::RenderResult;
    use vg_tree::HandlerId;
    use vg_tree::PositionId;

    #[derive(Debug, Default)]
    struct Recorder {
        calls: Vec<(HandlerId, String)>,
        prevent: bool,
        fail: bool,
    }

    impl EventDispatcher for Recorder {
        fn dispatch(&mut self, handler: HandlerId, event: &DomEvent) -> RenderResult<EventResponse> {
            if self.fail {
                return Err(RenderError::new("event.handler_failed", "handler refused"));
            }
            self.calls.push((handler, event.event_type.clone()));
            Ok(EventResponse {
                prevent_default: self.prevent,
                stop_propagation: false,
            })
        }
    }

    fn pending(position: PositionId, event_type: &str, phase: EventPhase) -> EventBuffer {
        let mut buffer = EventBuffer::new(128).unwrap_or_else(|_| unreachable!());
        let mut event = DomEvent::new(position, event_type);
        event.phase = phase;
        assert!(buffer.write_event(&event).is_ok());
        buffer
    }

    #[test]
    fn routes_to_handler_registered_at_position() {
        let mut table = PositionTable::new();
        table.insert(PositionId::root().child(1), "click", false, HandlerId(7));
        table.insert(PositionId::root().child(2), "click", false, HandlerId(8));
        let mut router = EventRouter::new();
        router.install_table(table);

        let mut buffer = pending(PositionId::root().child(2), "click", EventPhase::AtTarget);
        let mut recorder = Recorder {
            prevent: true,
            ..Recorder::default()
        };
        let outcome = router.handle(&mut buffer, &mut recorder);
        assert_eq!(outcome, Ok(RouteOutcome::Dispatched { handlers: 1 }));
        assert_eq!(recorder.calls, vec![(HandlerId(8), "click".to_owned())]);
        assert!(buffer.response().prevent_default);
        assert!(!buffer.has_pending());
    }

    #[test]
    fn unknown_position_is_unrouted() {
        let mut router = EventRouter::new();
        let mut buffer = pending(PositionId::root(), "click", EventPhase::AtTarget);
        let mut recorder = Recorder::default();
        let outcome = router.handle(&mut buffer, &mut recorder);
        assert_eq!(outcome, Ok(RouteOutcome::Unrouted));
        assert!(recorder.calls.is_empty());
        assert!(!buffer.has_pending());
    }

    #[test]
    fn phase_selects_capture_or_bubble_listeners() {
        let mut table = PositionTable::new();
        let position = PositionId::root();
        table.insert(position.clone(), "click", true, HandlerId(1));
        table.insert(position.clone(), "click", false, HandlerId(2));

        assert_eq!(
            table.resolve(&position, "click", EventPhase::Capturing),
            vec![HandlerId(1)]
        );
        assert_eq!(
            table.resolve(&position, "click", EventPhase::Bubbling),
            vec![HandlerId(2)]
        );
        assert_eq!(
            table.resolve(&position, "click", EventPhase::AtTarget),
            vec![HandlerId(1), HandlerId(2)]
        );
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn cleared_router_drops_events() {
        let mut table = PositionTable::new();
        table.insert(PositionId::root(), "click", false, HandlerId(1));
        let mut router = EventRouter::new();
        router.install_table(table);
        router.clear();

        let mut buffer = pending(PositionId::root(), "click", EventPhase::AtTarget);
        let outcome = router.handle(&mut buffer, &mut Recorder::default());
        assert_eq!(outcome, Ok(RouteOutcome::Unrouted));
    }

    #[test]
    fn empty_signal_is_reported() {
        let mut router = EventRouter::new();
        let mut buffer = EventBuffer::new(64).unwrap_or_else(|_| unreachable!());
        let outcome = router.handle(&mut buffer, &mut Recorder::default());
        assert_eq!(outcome, Ok(RouteOutcome::NoEvent));
    }

    #[test]
    fn handler_failure_propagates_and_consumes_record() {
        let mut table = PositionTable::new();
        table.insert(PositionId::root(), "click", false, HandlerId(1));
        let mut router = EventRouter::new();
        router.install_table(table);

        let mut buffer = pending(PositionId::root(), "click", EventPhase::AtTarget);
        let mut recorder = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let outcome = router.handle(&mut buffer, &mut recorder);
        assert!(outcome.is_err());
        assert!(!buffer.has_pending());
    }
}

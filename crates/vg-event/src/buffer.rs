//! Shared event buffer layout.
//!
//! | offset | field |
//! |---|---|
//! | 0 | response flags written back after dispatch |
//! | 1..5 | big-endian u32 record length, 0 when nothing is pending |
//! | 5.. | position id, event type, phase byte, payload JSON |
//!
//! Strings are a big-endian u32 length followed by UTF-8 bytes.

use serde_json::Map;
use serde_json::Value;
use vg_core::RenderError;
use vg_core::RenderResult;
use vg_tree::PositionId;

pub const EVENT_HEADER_BYTES: usize = 5;

const RESPONSE_PREVENT_DEFAULT: u8 = 0b01;
const RESPONSE_STOP_PROPAGATION: u8 = 0b10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    Capturing,
    AtTarget,
    Bubbling,
}

impl EventPhase {
    fn to_byte(self) -> u8 {
        match self {
            Self::Capturing => 1,
            Self::AtTarget => 2,
            Self::Bubbling => 3,
        }
    }

    fn from_byte(raw: u8) -> RenderResult<Self> {
        match raw {
            1 => Ok(Self::Capturing),
            2 => Ok(Self::AtTarget),
            3 => Ok(Self::Bubbling),
            other => Err(RenderError::new(
                "event.phase_invalid",
                format!("invalid event phase `{other}`; expected 1, 2 or 3"),
            )),
        }
    }
}

/// A decoded host event.
#[derive(Debug, Clone, PartialEq)]
pub struct DomEvent {
    pub position_id: PositionId,
    pub event_type: String,
    pub phase: EventPhase,
    pub payload: Map<String, Value>,
}

impl DomEvent {
    pub fn new(position_id: PositionId, event_type: impl Into<String>) -> Self {
        Self {
            position_id,
            event_type: event_type.into(),
            phase: EventPhase::AtTarget,
            payload: Map::new(),
        }
    }

    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

/// What the handlers asked the host to do with the native event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventResponse {
    pub prevent_default: bool,
    pub stop_propagation: bool,
}

impl EventResponse {
    pub fn merge(self, other: Self) -> Self {
        Self {
            prevent_default: self.prevent_default || other.prevent_default,
            stop_propagation: self.stop_propagation || other.stop_propagation,
        }
    }

    fn to_flags(self) -> u8 {
        let mut flags = 0;
        if self.prevent_default {
            flags |= RESPONSE_PREVENT_DEFAULT;
        }
        if self.stop_propagation {
            flags |= RESPONSE_STOP_PROPAGATION;
        }
        flags
    }

    fn from_flags(flags: u8) -> Self {
        Self {
            prevent_default: flags & RESPONSE_PREVENT_DEFAULT != 0,
            stop_propagation: flags & RESPONSE_STOP_PROPAGATION != 0,
        }
    }
}

/// Fixed-capacity region the host fills before signalling an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBuffer {
    bytes: Vec<u8>,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> RenderResult<Self> {
        if capacity <= EVENT_HEADER_BYTES {
            return Err(RenderError::new(
                "event.capacity_invalid",
                format!("event buffer capacity must exceed the {EVENT_HEADER_BYTES}-byte header"),
            ));
        }
        Ok(Self {
            bytes: vec![0; capacity],
        })
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Raw access for hosts that write records directly.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn record_len(&self) -> usize {
        let mut len_bytes = [0_u8; 4];
        len_bytes.copy_from_slice(&self.bytes[1..EVENT_HEADER_BYTES]);
        u32::from_be_bytes(len_bytes) as usize
    }

    pub fn has_pending(&self) -> bool {
        self.record_len() > 0
    }

    pub fn response(&self) -> EventResponse {
        EventResponse::from_flags(self.bytes[0])
    }

    /// Writes `event` the way a host would, clearing any previous response.
    pub fn write_event(&mut self, event: &DomEvent) -> RenderResult<()> {
        let payload = if event.payload.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&event.payload).map_err(|error| {
                RenderError::new(
                    "event.payload_invalid",
                    format!("event payload could not be serialized: {error}"),
                )
            })?
        };

        let mut record = Vec::new();
        push_string(&mut record, event.position_id.as_bytes(), "position_id")?;
        push_string(&mut record, event.event_type.as_bytes(), "event_type")?;
        record.push(event.phase.to_byte());
        push_string(&mut record, payload.as_bytes(), "payload")?;

        if EVENT_HEADER_BYTES + record.len() > self.bytes.len() {
            return Err(RenderError::new(
                "event.record_too_large",
                format!(
                    "event record needs {} bytes, buffer holds {}",
                    EVENT_HEADER_BYTES + record.len(),
                    self.bytes.len()
                ),
            ));
        }

        let len_u32 = u32::try_from(record.len()).map_err(|_| {
            RenderError::new(
                "event.record_too_large",
                "event record length does not fit in 32 bits",
            )
        })?;
        self.bytes[0] = 0;
        self.bytes[1..EVENT_HEADER_BYTES].copy_from_slice(&len_u32.to_be_bytes());
        self.bytes[EVENT_HEADER_BYTES..EVENT_HEADER_BYTES + record.len()].copy_from_slice(&record);
        Ok(())
    }

    /// Decodes the pending record, if any.
    pub fn read_event(&self) -> RenderResult<Option<DomEvent>> {
        let record_len = self.record_len();
        if record_len == 0 {
            return Ok(None);
        }

        let end = EVENT_HEADER_BYTES.saturating_add(record_len);
        if end > self.bytes.len() {
            return Err(RenderError::new(
                "event.record_length_invalid",
                format!(
                    "event record length {record_len} exceeds buffer capacity {}",
                    self.bytes.len()
                ),
            ));
        }

        let record = &self.bytes[EVENT_HEADER_BYTES..end];
        let mut offset = 0_usize;
        let position_id = PositionId::from_bytes(read_bytes(record, &mut offset, "position_id")?);
        if position_id.as_bytes().is_empty() {
            return Err(RenderError::new(
                "event.position_missing",
                "event record has an empty position id",
            ));
        }
        let event_type = read_string(record, &mut offset, "event_type")?;
        let phase = EventPhase::from_byte(read_u8(record, &mut offset, "phase")?)?;
        let payload_raw = read_string(record, &mut offset, "payload")?;
        let payload = parse_payload(&payload_raw)?;

        if offset != record.len() {
            return Err(RenderError::new(
                "event.trailing_bytes",
                format!("event record has trailing bytes (decoded {offset} of {record_len})"),
            ));
        }

        Ok(Some(DomEvent {
            position_id,
            event_type,
            phase,
            payload,
        }))
    }

    /// Publishes the response flags and marks the record consumed.
    pub(crate) fn complete(&mut self, response: EventResponse) {
        self.bytes[0] = response.to_flags();
        self.bytes[1..EVENT_HEADER_BYTES].copy_from_slice(&0_u32.to_be_bytes());
    }
}

fn parse_payload(raw: &str) -> RenderResult<Map<String, Value>> {
    if raw.is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(RenderError::new(
            "event.payload_invalid",
            format!("event payload must be a JSON object, got `{other}`"),
        )),
        Err(error) => Err(RenderError::new(
            "event.payload_invalid",
            format!("event payload is not valid JSON: {error}"),
        )),
    }
}

fn push_string(out: &mut Vec<u8>, bytes: &[u8], field: &str) -> RenderResult<()> {
    let len_u32 = u32::try_from(bytes.len()).map_err(|_| {
        RenderError::new(
            "event.record_too_large",
            format!("`{field}` length does not fit in 32 bits"),
        )
    })?;
    out.extend_from_slice(&len_u32.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn read_u8(record: &[u8], offset: &mut usize, field: &str) -> RenderResult<u8> {
    let bytes = read_exact(record, offset, 1, field)?;
    Ok(bytes[0])
}

fn read_bytes<'a>(record: &'a [u8], offset: &mut usize, field: &str) -> RenderResult<&'a [u8]> {
    let len_bytes = read_exact(record, offset, 4, field)?;
    let len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
    read_exact(record, offset, len, field)
}

fn read_string(record: &[u8], offset: &mut usize, field: &str) -> RenderResult<String> {
    let bytes = read_bytes(record, offset, field)?;
    String::from_utf8(bytes.to_vec()).map_err(|error| {
        RenderError::new(
            "event.utf8_invalid",
            format!("event field `{field}` is not valid UTF-8: {error}"),
        )
    })
}

fn read_exact<'a>(
    record: &'a [u8],
    offset: &mut usize,
    len: usize,
    field: &str,
) -> RenderResult<&'a [u8]> {
    let end = offset.saturating_add(len);
    if end > record.len() {
        return Err(RenderError::new(
            "event.truncated",
            format!("event record ended while reading `{field}` (need {len} bytes)"),
        ));
    }

    let out = &record[*offset..end];
    *offset = end;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::DomEvent;
    use super::EVENT_HEADER_BYTES;
    use super::EventBuffer;
    use super::EventPhase;
    use super::EventResponse;
    use serde_json::Value;
    use vg_tree::PositionId;

    fn buffer() -> EventBuffer {
        EventBuffer::new(256).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn host_written_event_decodes() {
        let mut buffer = buffer();
        let mut event = DomEvent::new(PositionId::root().child(2), "input");
        event.phase = EventPhase::Bubbling;
        event
            .payload
            .insert("target.value".to_owned(), Value::String("hello".to_owned()));
        assert!(buffer.write_event(&event).is_ok());
        assert!(buffer.has_pending());

        let decoded = buffer.read_event();
        assert_eq!(decoded, Ok(Some(event)));
    }

    #[test]
    fn empty_buffer_has_no_event() {
        assert_eq!(buffer().read_event(), Ok(None));
    }

    #[test]
    fn record_length_past_capacity_is_rejected() {
        let mut buffer = buffer();
        buffer.as_mut_slice()[1..EVENT_HEADER_BYTES].copy_from_slice(&1000_u32.to_be_bytes());
        let result = buffer.read_event();
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "event.record_length_invalid");
        }
    }

    #[test]
    fn truncated_record_is_rejected() {
        let mut buffer = buffer();
        let bytes = buffer.as_mut_slice();
        bytes[1..EVENT_HEADER_BYTES].copy_from_slice(&6_u32.to_be_bytes());
        bytes[EVENT_HEADER_BYTES..EVENT_HEADER_BYTES + 6].copy_from_slice(&[0, 0, 0, 1, b'0', 0]);
        let result = buffer.read_event();
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "event.truncated");
        }
    }

    /// Hand-encoded record, bypassing the checks in `write_event`.
    fn raw_record(position_id: &[u8], phase: u8, payload: &[u8]) -> Vec<u8> {
        let mut record = Vec::new();
        for part in [position_id, &b"click"[..]] {
            record.extend_from_slice(&(part.len() as u32).to_be_bytes());
            record.extend_from_slice(part);
        }
        record.push(phase);
        record.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        record.extend_from_slice(payload);
        record
    }

    fn load(record: &[u8]) -> EventBuffer {
        let mut buffer = buffer();
        let bytes = buffer.as_mut_slice();
        bytes[1..EVENT_HEADER_BYTES].copy_from_slice(&(record.len() as u32).to_be_bytes());
        bytes[EVENT_HEADER_BYTES..EVENT_HEADER_BYTES + record.len()].copy_from_slice(record);
        buffer
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let result = load(&raw_record(b"0", 2, b"[1]")).read_event();
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "event.payload_invalid");
        }
    }

    #[test]
    fn unknown_phase_is_rejected() {
        let result = load(&raw_record(b"0_1", 7, b"")).read_event();
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "event.phase_invalid");
        }
    }

    #[test]
    fn empty_position_is_rejected() {
        let result = load(&raw_record(b"", 2, b"")).read_event();
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "event.position_missing");
        }
    }

    #[test]
    fn bytes_after_payload_are_rejected() {
        let mut record = raw_record(b"0_1", 2, b"{}");
        record.push(0);
        let result = load(&record).read_event();
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "event.trailing_bytes");
        }
    }

    #[test]
    fn complete_writes_flags_and_clears_record() {
        let mut buffer = buffer();
        assert!(
            buffer
                .write_event(&DomEvent::new(PositionId::root(), "submit"))
                .is_ok()
        );
        buffer.complete(EventResponse {
            prevent_default: true,
            stop_propagation: false,
        });
        assert!(!buffer.has_pending());
        assert!(buffer.response().prevent_default);
        assert!(!buffer.response().stop_propagation);
    }

    #[test]
    fn oversized_event_does_not_fit() {
        let mut buffer = EventBuffer::new(16).unwrap_or_else(|_| unreachable!());
        let result = buffer.write_event(&DomEvent::new(PositionId::root(), "pointerdown"));
        assert!(result.is_err());
    }
}

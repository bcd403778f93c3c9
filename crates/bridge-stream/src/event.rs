use bridge_parse::ParsedEvent;
use serde::Serialize;
use uuid::Uuid;

/// One event as delivered to a subscriber: a [`ParsedEvent`] tagged with its
/// stream and a monotonic sequence number (§6's WS/SSE frame schema).
#[derive(Debug, Clone, Serialize)]
pub struct EventFrame {
    pub stream_id: Uuid,
    pub seq: u64,
    #[serde(flatten)]
    pub event: ParsedEvent,
}

pub(crate) fn lag_warning() -> ParsedEvent {
    ParsedEvent::Warning {
        message: "subscriber lag".to_string(),
    }
}

pub(crate) fn is_lag_warning(event: &ParsedEvent) -> bool {
    matches!(event, ParsedEvent::Warning { message } if message == "subscriber lag")
}

pub(crate) fn history_truncated_warning() -> ParsedEvent {
    ParsedEvent::Warning {
        message: "history truncated".to_string(),
    }
}

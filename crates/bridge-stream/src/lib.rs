//! Stream Manager & Event Bus: registers in-flight invocations, fans their
//! parsed events out to many subscribers with bounded, per-subscriber
//! backpressure, and retains a recent-history ring buffer for late joiners
//! (§4.6). Transport-agnostic — delivering a [`Subscriber`]'s frames over a
//! WebSocket or SSE connection is the HTTP collaborator's job, not this
//! crate's.

mod error;
mod event;
mod manager;
mod ring;
mod stream;
mod subscriber;

pub use error::StreamError;
pub use event::EventFrame;
pub use manager::{StreamManager, StreamManagerConfig, DEFAULT_FINISH_GRACE};
pub use stream::Stream;
pub use subscriber::{BackpressurePolicy, Subscriber};

//! Event-driven observability for orchestration decisions.

mod run_event;
mod sink;

pub use run_event::RunEvent;
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

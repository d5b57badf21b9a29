//! The archiving engine: one [`Engine`] per command, wiring configuration,
//! git capability, clock and event sink together.

mod backup;
mod engine;
pub mod event;

pub use engine::Engine;
pub use event::{CollectingSink, Event, EventSink, NullSink};

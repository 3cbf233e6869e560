//! Cache-aware bidirectional path search over a remote link graph.
//!
//! The [`PathFinder`] facade owns the shared pieces (upstream client,
//! segment cache, durable store) and spawns an isolated task per request,
//! streaming typed events back to the single subscriber.

pub mod events;
pub mod extractor;
pub mod frontier;
mod lifecycle;
mod search;
mod service;

pub use events::{channel, EventSink, EventStream};
pub use extractor::{Accepted, DiversePathExtractor};
pub use frontier::{Direction, Frontier};
pub use lifecycle::{start, start_with_source, EngineHandle, EngineOptions};
pub use service::{PathFinder, SearchHandle};

//! Consumer-side dispatch and the producer-side writer.
//!
//! A [`Session`] negotiates capabilities between a producer offer and a
//! [`Backend`] request, sets up one channel per worker, and runs a worker
//! thread per channel that decodes every buffer into the backend's
//! [`EventHandler`].

pub mod handler;
pub mod registry;
pub mod session;
pub mod source;
pub mod worker;
pub mod writer;

pub use handler::{EventHandler, NullHandler};
pub use registry::{kinds_only, null_backend, Backend, BackendRegistry, EventCounts, SimpleCount};
pub use session::{RunSummary, ServeHandle, Session, TransportContext};
pub use source::{full_offer, EventSource, SyntheticEvent, SyntheticSource};
pub use worker::{drain_channel, WorkerReport};
pub use writer::EventWriter;

pub mod Cleanup;
pub mod Config;
pub mod SharedMemory;
pub mod error;
pub mod futex;

pub use Cleanup::{fatal, CleanupRegistry};
pub use Config::TransportConfig;
pub use SharedMemory::{
    attach_shared_memory, create_shared_memory, heap_memory, RawHandle, SharedMemoryBackend,
};
pub use error::{
    ConfigError, EncodeError, NegotiationError, ProtocolError, Result, TransportError,
};

use std::fmt;

use crate::Channel::{BufferArena, ConsumerEnd, ProducerEnd};
use crate::Core::CleanupRegistry;
use crate::Dispatch::EventWriter;

/// Debug function for CleanupRegistry
///
/// Shows the artifact directory and whether cleanup already ran.
pub fn debug_cleanup_registry(registry: &CleanupRegistry, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CleanupRegistry")
        .field("dir", &registry.dir())
        .field("artifacts", &registry.artifact_count())
        .field("cleaned", &registry.is_cleaned())
        .finish()
}

/// Debug function for BufferArena
///
/// Shows the mapping address and layout without touching buffer contents.
pub fn debug_buffer_arena(arena: &BufferArena, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BufferArena")
        .field("memory", &format_args!("{:p}", arena.memory().as_ptr()))
        .field("handle", &arena.memory().raw_handle())
        .field("layout", arena.layout())
        .finish()
}

pub fn debug_producer_end(producer: &ProducerEnd, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ProducerEnd")
        .field("worker", &producer.worker())
        .field("buffers", &producer.buffers())
        .field("current", &producer.current_index())
        .field("in_flight", &producer.in_flight())
        .field("flushed", &producer.flushed())
        .field("finished", &producer.is_finished())
        .finish_non_exhaustive()
}

pub fn debug_consumer_end(consumer: &ConsumerEnd, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ConsumerEnd")
        .field("worker", &consumer.worker())
        .field("buffers", &consumer.buffers())
        .field("acquired", &consumer.acquired())
        .field("finished", &consumer.is_finished())
        .field("paths", &consumer.paths())
        .finish_non_exhaustive()
}

/// Debug function for EventWriter
///
/// Event bytes are opaque; only the counters and active FieldConfig are shown.
pub fn debug_event_writer(writer: &EventWriter, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EventWriter")
        .field("channel", writer.channel())
        .field("field_config", writer.field_config())
        .field("buffered", &writer.buffered())
        .field("events", &writer.events_written())
        .finish()
}

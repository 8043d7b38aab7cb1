// Sequential decode of one buffer's event bytes.

use std::ops::AddAssign;

use crate::Codec::Events::{CompEvent, ConfigChange, CxtEvent, EventRecord, MemEvent, SyncEvent};
use crate::Codec::FieldConfig::FieldConfig;
use crate::Codec::Primitive::{CompFormat, CxtType, EventKind, MemType, OpType, SyncType, SUBTYPE_MASK};
use crate::Core::error::ProtocolError;
use crate::Dispatch::EventHandler;

/// Counters for one or more decoded buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeStats {
    /// Every record read, Config records and the End terminator included.
    pub records: usize,
    /// Records handed to an event handler.
    pub dispatched: usize,
    /// Bytes consumed, End byte included.
    pub bytes: usize,
}

impl AddAssign for DecodeStats {
    fn add_assign(&mut self, rhs: Self) {
        self.records += rhs.records;
        self.dispatched += rhs.dispatched;
        self.bytes += rhs.bytes;
    }
}

/// Iterator over the records of one buffer.
///
/// Config records are applied to the borrowed [`FieldConfig`] before they
/// are yielded, so the change outlives this buffer. Iteration stops after
/// the End record or the first error.
pub struct Decoder<'a, 'c> {
    buf: &'a [u8],
    pos: usize,
    cfg: &'c mut FieldConfig,
    done: bool,
}

impl<'a, 'c> Decoder<'a, 'c> {
    pub fn new(buf: &'a [u8], cfg: &'c mut FieldConfig) -> Self {
        Self {
            buf,
            pos: 0,
            cfg,
            done: false,
        }
    }

    /// Offset of the next record.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn slice_at(&self, offset: usize, len: usize) -> Result<&'a [u8], ProtocolError> {
        let buf: &'a [u8] = self.buf;
        let available = buf.len() - offset;
        if available < len {
            return Err(ProtocolError::Truncated {
                offset,
                needed: len,
                available,
            });
        }
        Ok(&buf[offset..offset + len])
    }

    fn next_record(&mut self) -> Result<(EventRecord<'a>, usize), ProtocolError> {
        let offset = self.pos;
        let header = self.slice_at(offset, 1)?[0];
        let tag = EventKind::tag_of(header);
        let kind = EventKind::from_tag(tag).ok_or(ProtocolError::UnknownKind { tag, offset })?;
        let subtype = header & SUBTYPE_MASK;
        let unknown = |kind: &'static str, value: u8| ProtocolError::UnknownSubtype { kind, value, offset };

        match kind {
            EventKind::Memory => {
                let cfg = self.cfg.memory();
                let bytes = self.slice_at(offset, cfg.len())?;
                let mem_type = (header >> 3) & 0x3;
                if cfg.has_type() && MemType::from_u8(mem_type).is_none() {
                    return Err(unknown("memory type", mem_type));
                }
                Ok((EventRecord::Memory(MemEvent { bytes, cfg }), bytes.len()))
            }
            EventKind::Compute => {
                let cfg = self.cfg.compute();
                let base = self.slice_at(offset, cfg.base_len())?;
                let arity = if cfg.has_arity() { (base[1] & 0x3) + 1 } else { 1 };
                let bytes = self.slice_at(offset, cfg.len(arity))?;

                let format = (header >> 3) & 0x3;
                if cfg.has_format() && CompFormat::from_u8(format).is_none() {
                    return Err(unknown("compute format", format));
                }
                if cfg.has_op() {
                    let op = bytes[1] >> 2;
                    if OpType::from_u8(op).is_none() {
                        return Err(unknown("compute op", op));
                    }
                }
                Ok((EventRecord::Compute(CompEvent { bytes, cfg }), bytes.len()))
            }
            EventKind::Sync => {
                let sync_type = SyncType::from_u8(subtype).ok_or_else(|| unknown("sync", subtype))?;
                let bytes = self.slice_at(offset, 1 + 8 * sync_type.data_words())?;
                Ok((EventRecord::Sync(SyncEvent { bytes, sync_type }), bytes.len()))
            }
            EventKind::Context => {
                let cxt_type = CxtType::from_u8(subtype).ok_or_else(|| unknown("context", subtype))?;
                let len = if cxt_type.carries_name() {
                    // stored as len - 1, so every byte value is a legal 1..=256
                    2 + self.slice_at(offset, 2)?[1] as usize + 1
                } else {
                    8
                };
                let bytes = self.slice_at(offset, len)?;
                Ok((EventRecord::Context(CxtEvent { bytes, cxt_type }), len))
            }
            EventKind::ControlFlow => Err(ProtocolError::ReservedKind { offset }),
            EventKind::Config => {
                let bytes = self.slice_at(offset, 2)?;
                let target_tag = (header >> 2) & 0x7;
                let target = EventKind::from_tag(target_tag)
                    .filter(|k| k.is_configurable() || *k == EventKind::ControlFlow)
                    .ok_or_else(|| unknown("config target", target_tag))?;
                let change = ConfigChange {
                    target,
                    bits: bytes[1],
                };
                // control-flow has no fields yet; its config is accepted and ignored
                if target != EventKind::ControlFlow {
                    self.cfg
                        .apply(change.target, change.bits)
                        .map_err(|_| unknown("config target", target_tag))?;
                }
                Ok((EventRecord::Config(change), 2))
            }
            EventKind::End => Ok((EventRecord::End, 1)),
        }
    }
}

impl<'a, 'c> Iterator for Decoder<'a, 'c> {
    type Item = Result<EventRecord<'a>, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok((record, len)) => {
                self.pos += len;
                if matches!(record, EventRecord::End) {
                    self.done = true;
                }
                Some(Ok(record))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Decode `events` and call `handler` once per dispatched record.
///
/// `timestamps[i]`, when present, is delivered through
/// [`EventHandler::on_timestamp`] right before the i-th dispatched event.
pub fn decode_and_dispatch<H: EventHandler + ?Sized>(
    events: &[u8],
    timestamps: &[u64],
    cfg: &mut FieldConfig,
    handler: &mut H,
) -> Result<DecodeStats, ProtocolError> {
    let mut stats = DecodeStats::default();
    let mut ts = timestamps.iter();
    let mut decoder = Decoder::new(events, cfg);

    for record in decoder.by_ref() {
        let record = record?;
        stats.records += 1;
        if record.is_dispatched() {
            stats.dispatched += 1;
            if let Some(&t) = ts.next() {
                handler.on_timestamp(t);
            }
        }
        match record {
            EventRecord::Memory(ev) => handler.on_memory(&ev),
            EventRecord::Compute(ev) => handler.on_compute(&ev),
            EventRecord::Sync(ev) => handler.on_sync(&ev),
            EventRecord::Context(ev) => handler.on_context(&ev),
            EventRecord::Config(_) | EventRecord::End => {}
        }
    }
    stats.bytes = decoder.position();

    if timestamps.len() > stats.dispatched {
        return Err(ProtocolError::TimestampMismatch {
            timestamps: timestamps.len(),
            events: stats.dispatched,
        });
    }
    Ok(stats)
}

use crate::Capability::{Availability, CapabilityField, CapabilityVector};
use crate::Codec::Encoder::Encode;
use crate::Codec::Events::{ComputeOp, ContextMark, MemAccess, SyncOp};
use crate::Codec::FieldConfig::FieldConfig;
use crate::Codec::Primitive::{CompFormat, MemType, OpType, SyncType, MAX_ADDRESS};
use crate::Core::error::{EncodeError, Result};
use crate::Dispatch::writer::EventWriter;

/// An in-process event producer.
pub trait EventSource: Send {
    /// What this source can generate.
    fn offered(&self) -> CapabilityVector;

    /// Write the whole stream. The caller finishes the writer afterwards.
    fn run(&mut self, writer: &mut EventWriter) -> Result<()>;
}

/// Every field available but omittable; control flow unavailable.
pub fn full_offer() -> CapabilityVector {
    CapabilityVector::filled(Availability::Enabled)
        .with(CapabilityField::ControlFlow, Availability::Unavailable)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticEvent {
    Memory(MemAccess),
    Compute(ComputeOp),
    Sync(SyncOp),
    Context(ContextMark<'static>),
}

impl SyntheticEvent {
    pub fn write_to(&self, writer: &mut EventWriter) -> Result<()> {
        match self {
            SyntheticEvent::Memory(ev) => writer.memory(ev),
            SyntheticEvent::Compute(ev) => writer.compute(ev),
            SyntheticEvent::Sync(ev) => writer.sync(ev),
            SyntheticEvent::Context(ev) => writer.context(ev),
        }
    }

    pub fn append_to(&self, cfg: &FieldConfig, out: &mut Vec<u8>) -> std::result::Result<usize, EncodeError> {
        match self {
            SyntheticEvent::Memory(ev) => ev.append_to(cfg, out),
            SyntheticEvent::Compute(ev) => ev.append_to(cfg, out),
            SyntheticEvent::Sync(ev) => ev.append_to(cfg, out),
            SyntheticEvent::Context(ev) => ev.append_to(cfg, out),
        }
    }
}

const FUNCTION_NAMES: [&[u8]; 4] = [b"main", b"worker_loop", b"aCoolFunctionBeingProfiled", b"memcpy"];

fn mix(mut x: u64) -> u64 {
    // splitmix64
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// A deterministic stream of `count` events cycling through every kind.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    count: u64,
    seed: u64,
    offered: CapabilityVector,
}

impl SyntheticSource {
    pub fn new(count: u64) -> Self {
        Self {
            count,
            seed: 0,
            offered: full_offer(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_offer(mut self, offered: CapabilityVector) -> Self {
        self.offered = offered;
        self
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn event_at(&self, i: u64) -> SyntheticEvent {
        let r = mix(self.seed ^ i.wrapping_mul(0x2545_F491_4F6C_DD1D));
        match i % 8 {
            0..=2 => SyntheticEvent::Memory(MemAccess {
                mem_type: if r & 1 == 0 { MemType::Load } else { MemType::Store },
                size_class: (r >> 1) as u8 % 4,
                address: (r >> 3) & MAX_ADDRESS,
                id: (r >> 59) as u8,
            }),
            3 | 4 => {
                let arity = 1 + (r >> 8) as u8 % 4;
                let ids = (r >> 16).to_le_bytes();
                SyntheticEvent::Compute(ComputeOp::new(
                    if i % 8 == 3 { CompFormat::Integer } else { CompFormat::Float },
                    (r >> 2) as u8 % 5,
                    OpType::from_u8(1 + (r >> 5) as u8 % 6).unwrap_or_default(),
                    &ids[..arity as usize],
                ))
            }
            5 => {
                let sync_type = SyncType::ALL[(r % SyncType::ALL.len() as u64) as usize];
                SyntheticEvent::Sync(SyncOp {
                    sync_type,
                    data: r,
                    data2: if sync_type == SyncType::CondWait { !r } else { 0 },
                })
            }
            6 => {
                let id = (r >> 8) & MAX_ADDRESS;
                SyntheticEvent::Context(match r % 3 {
                    0 => ContextMark::Instruction(id),
                    1 => ContextMark::BasicBlock(id),
                    _ => ContextMark::Thread(id),
                })
            }
            _ => {
                let name = FUNCTION_NAMES[(r % FUNCTION_NAMES.len() as u64) as usize];
                SyntheticEvent::Context(if r & 0x100 == 0 {
                    ContextMark::FunctionEnter(name)
                } else {
                    ContextMark::FunctionExit(name)
                })
            }
        }
    }

    pub fn events(&self) -> impl Iterator<Item = SyntheticEvent> + '_ {
        (0..self.count).map(move |i| self.event_at(i))
    }
}

impl EventSource for SyntheticSource {
    fn offered(&self) -> CapabilityVector {
        self.offered
    }

    fn run(&mut self, writer: &mut EventWriter) -> Result<()> {
        for i in 0..self.count {
            writer.timestamp(i);
            self.event_at(i).write_to(writer)?;
        }
        Ok(())
    }
}

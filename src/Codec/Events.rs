// Event descriptors (what a producer writes) and zero-copy views (what a
// consumer reads).
//
// A view borrows the bytes of one encoded event inside a received buffer
// together with the field configuration that was active when it was
// decoded. Accessors for fields switched off in that configuration return
// `None`.

use crate::Codec::FieldConfig::{CompFieldConfig, MemFieldConfig};
use crate::Codec::Primitive::{
    read_u56, read_u64, CompFormat, CxtType, EventKind, MemType, OpType, SyncType,
};

/// A memory access to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemAccess {
    pub mem_type: MemType,
    /// Access size as `log2(bytes)`.
    pub size_class: u8,
    pub address: u64,
    pub id: u8,
}

impl MemAccess {
    pub fn load(size_class: u8, address: u64) -> Self {
        Self {
            mem_type: MemType::Load,
            size_class,
            address,
            id: 0,
        }
    }

    pub fn store(size_class: u8, address: u64) -> Self {
        Self {
            mem_type: MemType::Store,
            size_class,
            address,
            id: 0,
        }
    }

    pub fn with_id(mut self, id: u8) -> Self {
        self.id = id;
        self
    }

    /// Copy with every field the configuration drops reset to its default,
    /// i.e. what a decoder sees after a round trip.
    pub fn masked(mut self, cfg: MemFieldConfig) -> Self {
        if !cfg.has_type() {
            self.mem_type = MemType::Undefined;
        }
        if !cfg.has_size() {
            self.size_class = 0;
        }
        if !cfg.has_address() {
            self.address = 0;
        }
        if !cfg.has_id() {
            self.id = 0;
        }
        self
    }
}

/// A compute operation to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeOp {
    pub format: CompFormat,
    /// Operand width as `log2(bytes)`.
    pub width_class: u8,
    pub op: OpType,
    /// Operand count, 1..=4.
    pub arity: u8,
    /// Operand ids; only the first `arity` are meaningful.
    pub ids: [u8; 4],
}

impl Default for ComputeOp {
    fn default() -> Self {
        Self {
            format: CompFormat::Undefined,
            width_class: 0,
            op: OpType::Undefined,
            arity: 1,
            ids: [0; 4],
        }
    }
}

impl ComputeOp {
    pub fn new(format: CompFormat, width_class: u8, op: OpType, ids: &[u8]) -> Self {
        let mut packed = [0u8; 4];
        let n = ids.len().min(packed.len());
        packed[..n].copy_from_slice(&ids[..n]);
        Self {
            format,
            width_class,
            op,
            arity: ids.len().min(u8::MAX as usize) as u8,
            ids: packed,
        }
    }

    pub fn operand_ids(&self) -> &[u8] {
        &self.ids[..(self.arity as usize).min(self.ids.len())]
    }

    pub fn masked(mut self, cfg: CompFieldConfig) -> Self {
        if !cfg.has_format() {
            self.format = CompFormat::Undefined;
        }
        if !cfg.has_width() {
            self.width_class = 0;
        }
        if !cfg.has_op() {
            self.op = OpType::Undefined;
        }
        if !cfg.has_arity() {
            self.arity = 1;
        }
        if !cfg.has_ids() {
            self.ids = [0; 4];
        } else {
            for id in self.ids.iter_mut().skip(self.arity as usize) {
                *id = 0;
            }
        }
        self
    }
}

/// A synchronization event to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOp {
    pub sync_type: SyncType,
    pub data: u64,
    /// Second word, only carried by `CondWait`.
    pub data2: u64,
}

impl SyncOp {
    pub fn new(sync_type: SyncType, data: u64) -> Self {
        Self {
            sync_type,
            data,
            data2: 0,
        }
    }

    pub fn cond_wait(cond: u64, mutex: u64) -> Self {
        Self {
            sync_type: SyncType::CondWait,
            data: cond,
            data2: mutex,
        }
    }
}

/// A context marker to encode. Function names are raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMark<'a> {
    Instruction(u64),
    BasicBlock(u64),
    Thread(u64),
    FunctionEnter(&'a [u8]),
    FunctionExit(&'a [u8]),
}

impl<'a> ContextMark<'a> {
    pub fn cxt_type(&self) -> CxtType {
        match self {
            ContextMark::Instruction(_) => CxtType::Instruction,
            ContextMark::BasicBlock(_) => CxtType::BasicBlock,
            ContextMark::Thread(_) => CxtType::Thread,
            ContextMark::FunctionEnter(_) => CxtType::FunctionEnter,
            ContextMark::FunctionExit(_) => CxtType::FunctionExit,
        }
    }

    pub fn from_id(kind: CxtType, id: u64) -> Option<Self> {
        match kind {
            CxtType::Instruction => Some(ContextMark::Instruction(id)),
            CxtType::BasicBlock => Some(ContextMark::BasicBlock(id)),
            CxtType::Thread => Some(ContextMark::Thread(id)),
            _ => None,
        }
    }

    pub fn from_name(kind: CxtType, name: &'a [u8]) -> Option<Self> {
        match kind {
            CxtType::FunctionEnter => Some(ContextMark::FunctionEnter(name)),
            CxtType::FunctionExit => Some(ContextMark::FunctionExit(name)),
            _ => None,
        }
    }
}

/// Replaces the bitset of one kind for every following event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigChange {
    pub target: EventKind,
    pub bits: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct MemEvent<'a> {
    pub(crate) bytes: &'a [u8],
    pub(crate) cfg: MemFieldConfig,
}

impl<'a> MemEvent<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn mem_type(&self) -> Option<MemType> {
        self.cfg
            .has_type()
            .then(|| MemType::from_u8((self.bytes[0] >> 3) & 0x3))
            .flatten()
    }

    pub fn is_load(&self) -> bool {
        self.mem_type() == Some(MemType::Load)
    }

    pub fn is_store(&self) -> bool {
        self.mem_type() == Some(MemType::Store)
    }

    pub fn size_class(&self) -> Option<u8> {
        self.cfg.has_size().then(|| self.bytes[0] & 0x7)
    }

    pub fn accessed_bytes(&self) -> Option<u32> {
        self.size_class().map(|class| 1u32 << class)
    }

    pub fn address(&self) -> Option<u64> {
        self.cfg.has_address().then(|| read_u56(&self.bytes[1..]))
    }

    pub fn id(&self) -> Option<u8> {
        self.cfg.has_id().then(|| self.bytes[self.cfg.id_offset()])
    }

    pub fn to_access(&self) -> MemAccess {
        MemAccess {
            mem_type: self.mem_type().unwrap_or_default(),
            size_class: self.size_class().unwrap_or(0),
            address: self.address().unwrap_or(0),
            id: self.id().unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CompEvent<'a> {
    pub(crate) bytes: &'a [u8],
    pub(crate) cfg: CompFieldConfig,
}

impl<'a> CompEvent<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn format(&self) -> Option<CompFormat> {
        self.cfg
            .has_format()
            .then(|| CompFormat::from_u8((self.bytes[0] >> 3) & 0x3))
            .flatten()
    }

    pub fn is_integer(&self) -> bool {
        self.format() == Some(CompFormat::Integer)
    }

    pub fn is_float(&self) -> bool {
        self.format() == Some(CompFormat::Float)
    }

    pub fn width_class(&self) -> Option<u8> {
        self.cfg.has_width().then(|| self.bytes[0] & 0x7)
    }

    pub fn width_bytes(&self) -> Option<u32> {
        self.width_class().map(|class| 1u32 << class)
    }

    pub fn op(&self) -> Option<OpType> {
        self.cfg
            .has_op()
            .then(|| OpType::from_u8(self.bytes[1] >> 2))
            .flatten()
    }

    pub fn arity(&self) -> Option<u8> {
        self.cfg.has_arity().then(|| (self.bytes[1] & 0x3) + 1)
    }

    pub fn ids(&self) -> Option<&'a [u8]> {
        let arity = self.arity()? as usize;
        let base = self.cfg.base_len();
        self.cfg.has_ids().then(|| &self.bytes[base..base + arity])
    }

    pub fn to_op(&self) -> ComputeOp {
        let mut op = ComputeOp {
            format: self.format().unwrap_or_default(),
            width_class: self.width_class().unwrap_or(0),
            op: self.op().unwrap_or_default(),
            arity: self.arity().unwrap_or(1),
            ids: [0; 4],
        };
        if let Some(ids) = self.ids() {
            op.ids[..ids.len()].copy_from_slice(ids);
        }
        op
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SyncEvent<'a> {
    pub(crate) bytes: &'a [u8],
    pub(crate) sync_type: SyncType,
}

impl<'a> SyncEvent<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn sync_type(&self) -> SyncType {
        self.sync_type
    }

    pub fn data(&self) -> u64 {
        read_u64(&self.bytes[1..])
    }

    pub fn data2(&self) -> Option<u64> {
        (self.sync_type.data_words() == 2).then(|| read_u64(&self.bytes[9..]))
    }

    pub fn to_op(&self) -> SyncOp {
        SyncOp {
            sync_type: self.sync_type,
            data: self.data(),
            data2: self.data2().unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CxtEvent<'a> {
    pub(crate) bytes: &'a [u8],
    pub(crate) cxt_type: CxtType,
}

impl<'a> CxtEvent<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn cxt_type(&self) -> CxtType {
        self.cxt_type
    }

    pub fn id(&self) -> Option<u64> {
        (!self.cxt_type.carries_name()).then(|| read_u56(&self.bytes[1..]))
    }

    pub fn name(&self) -> Option<&'a [u8]> {
        self.cxt_type.carries_name().then(|| &self.bytes[2..])
    }

    /// The function name, if it is valid UTF-8.
    pub fn name_str(&self) -> Option<&'a str> {
        self.name().and_then(|n| std::str::from_utf8(n).ok())
    }

    pub fn to_mark(&self) -> ContextMark<'a> {
        let id = || read_u56(&self.bytes[1..]);
        match self.cxt_type {
            CxtType::Instruction => ContextMark::Instruction(id()),
            CxtType::BasicBlock => ContextMark::BasicBlock(id()),
            CxtType::Thread => ContextMark::Thread(id()),
            CxtType::FunctionEnter => ContextMark::FunctionEnter(&self.bytes[2..]),
            CxtType::FunctionExit => ContextMark::FunctionExit(&self.bytes[2..]),
        }
    }
}

/// One decoded record. Lives no longer than the buffer it views.
#[derive(Debug, Clone, Copy)]
pub enum EventRecord<'a> {
    Memory(MemEvent<'a>),
    Compute(CompEvent<'a>),
    Sync(SyncEvent<'a>),
    Context(CxtEvent<'a>),
    Config(ConfigChange),
    End,
}

impl<'a> EventRecord<'a> {
    pub fn kind(&self) -> EventKind {
        match self {
            EventRecord::Memory(_) => EventKind::Memory,
            EventRecord::Compute(_) => EventKind::Compute,
            EventRecord::Sync(_) => EventKind::Sync,
            EventRecord::Context(_) => EventKind::Context,
            EventRecord::Config(_) => EventKind::Config,
            EventRecord::End => EventKind::End,
        }
    }

    /// Whether the record reaches an event handler.
    pub fn is_dispatched(&self) -> bool {
        !matches!(self, EventRecord::Config(_) | EventRecord::End)
    }
}

// Wire-level enumerations and constants.

/// Header bits above this shift carry the event kind.
pub const KIND_SHIFT: u8 = 5;
/// Low five header bits: subtype for sync/context events, type+class for
/// memory/compute events.
pub const SUBTYPE_MASK: u8 = 0x1F;

pub const ADDRESS_BITS: u32 = 56;
pub const ADDRESS_BYTES: usize = 7;
pub const MAX_ADDRESS: u64 = (1u64 << ADDRESS_BITS) - 1;

pub const MAX_NAME_LEN: usize = 256;
/// Longest single event: a function marker with a full-length name.
pub const MAX_EVENT_LEN: usize = 2 + MAX_NAME_LEN;
pub const MAX_ARITY: u8 = 4;
pub const MAX_SIZE_CLASS: u8 = 7;

/// The one-byte stream terminator.
pub const END_BYTE: u8 = (EventKind::End as u8) << KIND_SHIFT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    Memory = 0,
    Compute = 1,
    Sync = 2,
    Context = 3,
    ControlFlow = 4,
    Config = 5,
    End = 6,
}

impl EventKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => EventKind::Memory,
            1 => EventKind::Compute,
            2 => EventKind::Sync,
            3 => EventKind::Context,
            4 => EventKind::ControlFlow,
            5 => EventKind::Config,
            6 => EventKind::End,
            _ => return None,
        })
    }

    #[inline]
    pub fn tag_of(header: u8) -> u8 {
        header >> KIND_SHIFT
    }

    #[inline]
    pub fn header(self) -> u8 {
        (self as u8) << KIND_SHIFT
    }

    /// Kinds a Config event may retarget.
    pub fn is_configurable(self) -> bool {
        matches!(
            self,
            EventKind::Memory | EventKind::Compute | EventKind::Sync | EventKind::Context
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum MemType {
    #[default]
    Undefined = 0,
    Load = 1,
    Store = 2,
}

impl MemType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(MemType::Undefined),
            1 => Some(MemType::Load),
            2 => Some(MemType::Store),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum CompFormat {
    #[default]
    Undefined = 0,
    Integer = 1,
    Float = 2,
}

impl CompFormat {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(CompFormat::Undefined),
            1 => Some(CompFormat::Integer),
            2 => Some(CompFormat::Float),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum OpType {
    #[default]
    Undefined = 0,
    Add = 1,
    Sub = 2,
    Mult = 3,
    Div = 4,
    Shift = 5,
    Move = 6,
}

impl OpType {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => OpType::Undefined,
            1 => OpType::Add,
            2 => OpType::Sub,
            3 => OpType::Mult,
            4 => OpType::Div,
            5 => OpType::Shift,
            6 => OpType::Move,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SyncType {
    Create = 1,
    Join = 2,
    Barrier = 3,
    Sync = 4,
    Swap = 5,
    Lock = 6,
    Unlock = 7,
    CondWait = 8,
    CondSignal = 9,
    CondBroadcast = 10,
    SpinLock = 11,
    SpinUnlock = 12,
}

impl SyncType {
    pub const ALL: [SyncType; 12] = [
        SyncType::Create,
        SyncType::Join,
        SyncType::Barrier,
        SyncType::Sync,
        SyncType::Swap,
        SyncType::Lock,
        SyncType::Unlock,
        SyncType::CondWait,
        SyncType::CondSignal,
        SyncType::CondBroadcast,
        SyncType::SpinLock,
        SyncType::SpinUnlock,
    ];

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1..=12 => Some(Self::ALL[(v - 1) as usize]),
            _ => None,
        }
    }

    /// Condition waits carry the mutex as a second data word.
    pub fn data_words(self) -> usize {
        match self {
            SyncType::CondWait => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CxtType {
    Instruction = 1,
    BasicBlock = 2,
    FunctionEnter = 3,
    FunctionExit = 4,
    Thread = 5,
}

impl CxtType {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            1 => CxtType::Instruction,
            2 => CxtType::BasicBlock,
            3 => CxtType::FunctionEnter,
            4 => CxtType::FunctionExit,
            5 => CxtType::Thread,
            _ => return None,
        })
    }

    /// Function markers carry a name instead of a packed id.
    pub fn carries_name(self) -> bool {
        matches!(self, CxtType::FunctionEnter | CxtType::FunctionExit)
    }
}

/// Little-endian load of the 7-byte packed field starting at `bytes[0]`.
#[inline]
pub(crate) fn read_u56(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw[..ADDRESS_BYTES].copy_from_slice(&bytes[..ADDRESS_BYTES]);
    u64::from_le_bytes(raw)
}

#[inline]
pub(crate) fn write_u56(out: &mut [u8], value: u64) {
    out[..ADDRESS_BYTES].copy_from_slice(&value.to_le_bytes()[..ADDRESS_BYTES]);
}

#[inline]
pub(crate) fn read_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(raw)
}

// Active wire field configuration, one bitset per configurable kind.

use crate::Capability::{CapabilityField, ResolvedCapabilities};
use crate::Codec::Primitive::EventKind;
use crate::Core::error::EncodeError;

pub mod mem_bits {
    pub const LDST_TYPE: u8 = 0x80;
    pub const SIZE: u8 = 0x40;
    pub const ADDRESS: u8 = 0x20;
    pub const ID: u8 = 0x10;
}

pub mod comp_bits {
    pub const INT_FLT: u8 = 0x80;
    pub const WIDTH: u8 = 0x40;
    pub const OP: u8 = 0x20;
    pub const ARITY: u8 = 0x10;
    pub const IDS: u8 = 0x08;
}

pub mod sync_bits {
    pub const TYPE: u8 = 0x80;
    pub const ARGS: u8 = 0x40;
}

pub mod cxt_bits {
    pub const INSTRUCTION: u8 = 0x80;
    pub const BASIC_BLOCK: u8 = 0x40;
    pub const FUNCTION: u8 = 0x20;
    pub const THREAD: u8 = 0x10;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemFieldConfig(u8);

impl MemFieldConfig {
    pub fn new(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn has_type(self) -> bool {
        self.0 & mem_bits::LDST_TYPE != 0
    }

    pub fn has_size(self) -> bool {
        self.0 & mem_bits::SIZE != 0
    }

    pub fn has_address(self) -> bool {
        self.0 & mem_bits::ADDRESS != 0
    }

    pub fn has_id(self) -> bool {
        self.0 & mem_bits::ID != 0
    }

    /// Offset of the id byte, when present.
    pub fn id_offset(self) -> usize {
        if self.has_address() {
            8
        } else {
            1
        }
    }

    pub fn len(self) -> usize {
        match (self.has_address(), self.has_id()) {
            (true, true) => 9,
            (true, false) => 8,
            (false, true) => 2,
            (false, false) => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompFieldConfig(u8);

impl CompFieldConfig {
    pub fn new(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn has_format(self) -> bool {
        self.0 & comp_bits::INT_FLT != 0
    }

    pub fn has_width(self) -> bool {
        self.0 & comp_bits::WIDTH != 0
    }

    pub fn has_op(self) -> bool {
        self.0 & comp_bits::OP != 0
    }

    pub fn has_arity(self) -> bool {
        self.0 & comp_bits::ARITY != 0
    }

    /// Ids are only meaningful with an arity to count them.
    pub fn has_ids(self) -> bool {
        self.has_arity() && self.0 & comp_bits::IDS != 0
    }

    /// Header plus the optional op/arity byte.
    pub fn base_len(self) -> usize {
        if self.has_op() || self.has_arity() {
            2
        } else {
            1
        }
    }

    pub fn len(self, arity: u8) -> usize {
        if self.has_ids() {
            self.base_len() + arity as usize
        } else {
            self.base_len()
        }
    }
}

/// Bitsets for the four configurable kinds.
///
/// Owned by one channel end (or one decode context) and changed only by
/// in-stream Config events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldConfig {
    mem: MemFieldConfig,
    comp: CompFieldConfig,
    sync: u8,
    cxt: u8,
}

impl FieldConfig {
    /// Set the bit of every field that resolved to `Enabled`.
    pub fn from_resolved(caps: &ResolvedCapabilities) -> Self {
        let bit = |field: CapabilityField, mask: u8| if caps.is_enabled(field) { mask } else { 0 };

        let mem = bit(CapabilityField::MemoryLoadStoreType, mem_bits::LDST_TYPE)
            | bit(CapabilityField::MemoryAccessSize, mem_bits::SIZE)
            | bit(CapabilityField::MemoryAddress, mem_bits::ADDRESS)
            | bit(CapabilityField::MemoryId, mem_bits::ID);
        let comp = bit(CapabilityField::ComputeIntOrFloat, comp_bits::INT_FLT)
            | bit(CapabilityField::ComputeWidth, comp_bits::WIDTH)
            | bit(CapabilityField::ComputeOp, comp_bits::OP)
            | bit(CapabilityField::ComputeArity, comp_bits::ARITY)
            | bit(CapabilityField::ComputeId, comp_bits::IDS);
        let sync = bit(CapabilityField::SyncType, sync_bits::TYPE)
            | bit(CapabilityField::SyncArgs, sync_bits::ARGS);
        let cxt = bit(CapabilityField::ContextInstruction, cxt_bits::INSTRUCTION)
            | bit(CapabilityField::ContextBasicBlock, cxt_bits::BASIC_BLOCK)
            | bit(CapabilityField::ContextFunction, cxt_bits::FUNCTION)
            | bit(CapabilityField::ContextThread, cxt_bits::THREAD);

        Self::from_bytes([mem, comp, sync, cxt])
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            mem: MemFieldConfig::new(bytes[0]),
            comp: CompFieldConfig::new(bytes[1]),
            sync: bytes[2],
            cxt: bytes[3],
        }
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        [self.mem.bits(), self.comp.bits(), self.sync, self.cxt]
    }

    pub fn memory(&self) -> MemFieldConfig {
        self.mem
    }

    pub fn compute(&self) -> CompFieldConfig {
        self.comp
    }

    pub fn sync_bits(&self) -> u8 {
        self.sync
    }

    pub fn context_bits(&self) -> u8 {
        self.cxt
    }

    pub fn bits(&self, target: EventKind) -> Option<u8> {
        match target {
            EventKind::Memory => Some(self.mem.bits()),
            EventKind::Compute => Some(self.comp.bits()),
            EventKind::Sync => Some(self.sync),
            EventKind::Context => Some(self.cxt),
            _ => None,
        }
    }

    /// Replace the whole bitset of `target`.
    pub fn apply(&mut self, target: EventKind, bits: u8) -> Result<(), EncodeError> {
        match target {
            EventKind::Memory => self.mem = MemFieldConfig::new(bits),
            EventKind::Compute => self.comp = CompFieldConfig::new(bits),
            EventKind::Sync => self.sync = bits,
            EventKind::Context => self.cxt = bits,
            _ => return Err(EncodeError::ConfigTarget),
        }
        Ok(())
    }
}

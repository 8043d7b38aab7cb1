//! Event capability negotiation.
//!
//! A producer advertises which optional event fields it can generate
//! (`offered`), a consumer states which ones it needs (`requested`), and
//! [`resolve`] combines the two into the single [`ResolvedCapabilities`]
//! that drives both the producer's encoder and the consumer's decoder.

use std::fmt;
use std::str::FromStr;

use crate::Core::error::{ConfigError, NegotiationError};

/// Number of negotiable fields.
pub const CAPABILITY_COUNT: usize = 19;

/// One optional event feature, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CapabilityField {
    MemoryEnabled = 0,
    MemoryLoadStoreType,
    MemoryAccessSize,
    MemoryAddress,
    MemoryId,

    ComputeEnabled,
    ComputeIntOrFloat,
    ComputeWidth,
    ComputeOp,
    ComputeArity,
    ComputeId,

    // reserved, no wire encoding yet
    ControlFlow,

    SyncEnabled,
    SyncType,
    SyncArgs,

    ContextInstruction,
    ContextBasicBlock,
    ContextFunction,
    ContextThread,
}

impl CapabilityField {
    pub const ALL: [CapabilityField; CAPABILITY_COUNT] = [
        CapabilityField::MemoryEnabled,
        CapabilityField::MemoryLoadStoreType,
        CapabilityField::MemoryAccessSize,
        CapabilityField::MemoryAddress,
        CapabilityField::MemoryId,
        CapabilityField::ComputeEnabled,
        CapabilityField::ComputeIntOrFloat,
        CapabilityField::ComputeWidth,
        CapabilityField::ComputeOp,
        CapabilityField::ComputeArity,
        CapabilityField::ComputeId,
        CapabilityField::ControlFlow,
        CapabilityField::SyncEnabled,
        CapabilityField::SyncType,
        CapabilityField::SyncArgs,
        CapabilityField::ContextInstruction,
        CapabilityField::ContextBasicBlock,
        CapabilityField::ContextFunction,
        CapabilityField::ContextThread,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            CapabilityField::MemoryEnabled => "memory",
            CapabilityField::MemoryLoadStoreType => "memory-ldst-type",
            CapabilityField::MemoryAccessSize => "memory-access-size",
            CapabilityField::MemoryAddress => "memory-address",
            CapabilityField::MemoryId => "memory-id",
            CapabilityField::ComputeEnabled => "compute",
            CapabilityField::ComputeIntOrFloat => "compute-int-or-float",
            CapabilityField::ComputeWidth => "compute-width",
            CapabilityField::ComputeOp => "compute-op",
            CapabilityField::ComputeArity => "compute-arity",
            CapabilityField::ComputeId => "compute-id",
            CapabilityField::ControlFlow => "control-flow",
            CapabilityField::SyncEnabled => "sync",
            CapabilityField::SyncType => "sync-type",
            CapabilityField::SyncArgs => "sync-args",
            CapabilityField::ContextInstruction => "context-instruction",
            CapabilityField::ContextBasicBlock => "context-basic-block",
            CapabilityField::ContextFunction => "context-function",
            CapabilityField::ContextThread => "context-thread",
        }
    }
}

impl fmt::Display for CapabilityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How available a field is, from one side's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Availability {
    /// The producer cannot generate this field at all.
    #[default]
    Unavailable = 0,
    Disabled = 1,
    Enabled = 2,
    /// The producer always emits this field and cannot be told to omit it.
    Always = 3,
}

impl Availability {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Availability::Unavailable),
            1 => Some(Availability::Disabled),
            2 => Some(Availability::Enabled),
            3 => Some(Availability::Always),
            _ => None,
        }
    }
}

/// Ordered mapping from every [`CapabilityField`] to an [`Availability`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CapabilityVector([Availability; CAPABILITY_COUNT]);

impl Default for CapabilityVector {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityVector {
    /// Every field `Unavailable`.
    pub fn new() -> Self {
        Self([Availability::Unavailable; CAPABILITY_COUNT])
    }

    /// Every field set to `availability`.
    pub fn filled(availability: Availability) -> Self {
        Self([availability; CAPABILITY_COUNT])
    }

    pub fn get(&self, field: CapabilityField) -> Availability {
        self.0[field.index()]
    }

    pub fn set(&mut self, field: CapabilityField, availability: Availability) -> &mut Self {
        self.0[field.index()] = availability;
        self
    }

    pub fn with(mut self, field: CapabilityField, availability: Availability) -> Self {
        self.set(field, availability);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (CapabilityField, Availability)> + '_ {
        CapabilityField::ALL.iter().map(move |&f| (f, self.get(f)))
    }

    /// Raw bytes, one availability value per field, in field order.
    pub fn to_bytes(&self) -> [u8; CAPABILITY_COUNT] {
        let mut out = [0u8; CAPABILITY_COUNT];
        for (slot, a) in out.iter_mut().zip(self.0.iter()) {
            *slot = *a as u8;
        }
        out
    }

    pub fn from_bytes(bytes: &[u8; CAPABILITY_COUNT]) -> Option<Self> {
        let mut v = Self::new();
        for (slot, &b) in v.0.iter_mut().zip(bytes.iter()) {
            *slot = Availability::from_u8(b)?;
        }
        Some(v)
    }
}

/// Renders as one digit per field, e.g. `"2222200000000000000"`.
impl fmt::Display for CapabilityVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for a in self.0.iter() {
            write!(f, "{}", *a as u8)?;
        }
        Ok(())
    }
}

impl FromStr for CapabilityVector {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != CAPABILITY_COUNT {
            return Err(ConfigError::CapabilityString {
                reason: format!("expected {} digits, got {}", CAPABILITY_COUNT, s.len()),
            });
        }
        let mut v = Self::new();
        for (i, c) in s.chars().enumerate() {
            let a = c
                .to_digit(10)
                .and_then(|d| Availability::from_u8(d as u8))
                .ok_or_else(|| ConfigError::CapabilityString {
                    reason: format!("invalid availability `{}` for `{}`", c, CapabilityField::ALL[i]),
                })?;
            v.0[i] = a;
        }
        Ok(v)
    }
}

/// Outcome of a negotiation. Immutable once computed.
///
/// Every field is either `Enabled` or `Disabled`; the only way to obtain one
/// is [`resolve`] (or reading it back from a segment header written by the
/// side that resolved it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedCapabilities(CapabilityVector);

impl ResolvedCapabilities {
    pub fn is_enabled(&self, field: CapabilityField) -> bool {
        self.0.get(field) == Availability::Enabled
    }

    pub fn vector(&self) -> &CapabilityVector {
        &self.0
    }

    /// Accepts only vectors that a resolution could have produced.
    pub(crate) fn from_wire(bytes: &[u8; CAPABILITY_COUNT]) -> Option<Self> {
        let v = CapabilityVector::from_bytes(bytes)?;
        let resolved_only = v
            .iter()
            .all(|(_, a)| matches!(a, Availability::Enabled | Availability::Disabled));
        resolved_only.then_some(Self(v))
    }
}

fn resolve_field(
    field: CapabilityField,
    offered: Availability,
    requested: Availability,
) -> Result<Availability, NegotiationError> {
    if requested == Availability::Enabled {
        if offered == Availability::Unavailable {
            return Err(NegotiationError::Insufficient { field });
        }
        Ok(Availability::Enabled)
    } else if offered == Availability::Always {
        Ok(Availability::Enabled)
    } else {
        Ok(Availability::Disabled)
    }
}

/// Combine a producer's offer with a consumer's request.
///
/// Fails on the first field the consumer needs but the producer marks
/// `Unavailable`.
pub fn resolve(
    offered: &CapabilityVector,
    requested: &CapabilityVector,
) -> Result<ResolvedCapabilities, NegotiationError> {
    let mut out = CapabilityVector::new();
    for field in CapabilityField::ALL {
        let a = resolve_field(field, offered.get(field), requested.get(field))?;
        out.set(field, a);
    }
    Ok(ResolvedCapabilities(out))
}

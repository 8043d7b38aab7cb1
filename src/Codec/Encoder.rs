// Bit-level encoding of events into byte slices.
//
// Every encoder writes the kind tag into the top three header bits, packs
// the kind-specific header bits with shifts and masks, then appends only
// the extension bytes the active FieldConfig enables.

use crate::Codec::Events::{ComputeOp, ConfigChange, ContextMark, MemAccess, SyncOp};
use crate::Codec::FieldConfig::FieldConfig;
use crate::Codec::Primitive::{
    write_u56, EventKind, ADDRESS_BYTES, END_BYTE, MAX_ADDRESS, MAX_ARITY, MAX_NAME_LEN,
    MAX_SIZE_CLASS,
};
use crate::Core::error::EncodeError;

pub trait Encode {
    /// Bytes this event occupies under `cfg`.
    fn encoded_len(&self, cfg: &FieldConfig) -> usize;

    /// Write the event to the front of `out`, returning its length.
    fn encode_into(&self, cfg: &FieldConfig, out: &mut [u8]) -> Result<usize, EncodeError>;

    fn append_to(&self, cfg: &FieldConfig, out: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let start = out.len();
        out.resize(start + self.encoded_len(cfg), 0);
        match self.encode_into(cfg, &mut out[start..]) {
            Ok(n) => Ok(n),
            Err(e) => {
                out.truncate(start);
                Err(e)
            }
        }
    }
}

fn check_room(len: usize, out: &[u8]) -> Result<(), EncodeError> {
    if out.len() < len {
        return Err(EncodeError::EventTooLarge {
            len,
            capacity: out.len(),
        });
    }
    Ok(())
}

fn check_class(class: u8) -> Result<u8, EncodeError> {
    if class > MAX_SIZE_CLASS {
        return Err(EncodeError::SizeClass { class });
    }
    Ok(class)
}

fn check_u56(value: u64) -> Result<u64, EncodeError> {
    if value > MAX_ADDRESS {
        return Err(EncodeError::AddressOverflow { value });
    }
    Ok(value)
}

impl Encode for MemAccess {
    fn encoded_len(&self, cfg: &FieldConfig) -> usize {
        cfg.memory().len()
    }

    fn encode_into(&self, cfg: &FieldConfig, out: &mut [u8]) -> Result<usize, EncodeError> {
        let mem = cfg.memory();
        let len = mem.len();
        check_room(len, out)?;

        let mut header = EventKind::Memory.header();
        if mem.has_type() {
            header |= (self.mem_type as u8) << 3;
        }
        if mem.has_size() {
            header |= check_class(self.size_class)?;
        }
        if mem.has_address() {
            write_u56(&mut out[1..], check_u56(self.address)?);
        }
        if mem.has_id() {
            out[mem.id_offset()] = self.id;
        }
        out[0] = header;
        Ok(len)
    }
}

impl Encode for ComputeOp {
    fn encoded_len(&self, cfg: &FieldConfig) -> usize {
        cfg.compute().len(self.arity)
    }

    fn encode_into(&self, cfg: &FieldConfig, out: &mut [u8]) -> Result<usize, EncodeError> {
        let comp = cfg.compute();
        if self.arity == 0 || self.arity > MAX_ARITY {
            return Err(EncodeError::Arity { arity: self.arity });
        }
        let len = comp.len(self.arity);
        check_room(len, out)?;

        let mut header = EventKind::Compute.header();
        if comp.has_format() {
            header |= (self.format as u8) << 3;
        }
        if comp.has_width() {
            header |= check_class(self.width_class)?;
        }
        out[0] = header;

        if comp.base_len() == 2 {
            let mut ext = 0u8;
            if comp.has_op() {
                ext |= (self.op as u8) << 2;
            }
            if comp.has_arity() {
                ext |= self.arity - 1;
            }
            out[1] = ext;
        }
        if comp.has_ids() {
            let base = comp.base_len();
            out[base..len].copy_from_slice(self.operand_ids());
        }
        Ok(len)
    }
}

impl Encode for SyncOp {
    fn encoded_len(&self, _cfg: &FieldConfig) -> usize {
        1 + 8 * self.sync_type.data_words()
    }

    fn encode_into(&self, cfg: &FieldConfig, out: &mut [u8]) -> Result<usize, EncodeError> {
        let len = self.encoded_len(cfg);
        check_room(len, out)?;

        out[0] = EventKind::Sync.header() | self.sync_type as u8;
        out[1..9].copy_from_slice(&self.data.to_le_bytes());
        if self.sync_type.data_words() == 2 {
            out[9..17].copy_from_slice(&self.data2.to_le_bytes());
        }
        Ok(len)
    }
}

impl<'a> Encode for ContextMark<'a> {
    fn encoded_len(&self, _cfg: &FieldConfig) -> usize {
        match self {
            ContextMark::FunctionEnter(name) | ContextMark::FunctionExit(name) => 2 + name.len(),
            _ => 1 + ADDRESS_BYTES,
        }
    }

    fn encode_into(&self, cfg: &FieldConfig, out: &mut [u8]) -> Result<usize, EncodeError> {
        let header = EventKind::Context.header() | self.cxt_type() as u8;
        match *self {
            ContextMark::Instruction(id) | ContextMark::BasicBlock(id) | ContextMark::Thread(id) => {
                let id = check_u56(id)?;
                let len = self.encoded_len(cfg);
                check_room(len, out)?;
                out[0] = header;
                write_u56(&mut out[1..], id);
                Ok(len)
            }
            ContextMark::FunctionEnter(name) | ContextMark::FunctionExit(name) => {
                if name.is_empty() || name.len() > MAX_NAME_LEN {
                    return Err(EncodeError::NameLength { len: name.len() });
                }
                let len = self.encoded_len(cfg);
                check_room(len, out)?;
                out[0] = header;
                out[1] = (name.len() - 1) as u8;
                out[2..len].copy_from_slice(name);
                Ok(len)
            }
        }
    }
}

impl Encode for ConfigChange {
    fn encoded_len(&self, _cfg: &FieldConfig) -> usize {
        2
    }

    fn encode_into(&self, _cfg: &FieldConfig, out: &mut [u8]) -> Result<usize, EncodeError> {
        if !self.target.is_configurable() {
            return Err(EncodeError::ConfigTarget);
        }
        check_room(2, out)?;
        out[0] = EventKind::Config.header() | (self.target as u8) << 2;
        out[1] = self.bits;
        Ok(2)
    }
}

impl ConfigChange {
    pub fn new(target: EventKind, bits: u8) -> Self {
        Self { target, bits }
    }

    /// Encode the change and apply it to `cfg` in one step.
    pub fn append_and_apply(&self, cfg: &mut FieldConfig, out: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let n = self.append_to(cfg, out)?;
        cfg.apply(self.target, self.bits)?;
        Ok(n)
    }
}

/// Write the stream terminator.
pub fn encode_end(out: &mut [u8]) -> Result<usize, EncodeError> {
    check_room(1, out)?;
    out[0] = END_BYTE;
    Ok(1)
}

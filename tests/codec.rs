// Wire format tests: exact byte layouts, the reference fixture stream,
// in-stream reconfiguration and the protocol errors a corrupt buffer
// must produce.

use evpipe::Codec::Decoder::Decoder;
use evpipe::Codec::FieldConfig::{comp_bits, cxt_bits, mem_bits, sync_bits};
use evpipe::Codec::{
    decode_and_dispatch, encode_end, CompEvent, CompFormat, ComputeOp, ConfigChange, ContextMark,
    CxtEvent, CxtType, Encode, EventKind, EventRecord, MemAccess, MemEvent, MemType, OpType,
    SyncEvent, SyncOp, SyncType, END_BYTE,
};
use evpipe::Codec::Primitive::{MAX_ADDRESS, MAX_NAME_LEN, MAX_SIZE_CLASS};
use evpipe::{EncodeError, EventHandler, FieldConfig, ProtocolError};

const ALL_MEM: u8 = mem_bits::LDST_TYPE | mem_bits::SIZE | mem_bits::ADDRESS | mem_bits::ID;
const ALL_COMP: u8 = comp_bits::INT_FLT | comp_bits::WIDTH | comp_bits::OP | comp_bits::ARITY | comp_bits::IDS;

fn full_config() -> FieldConfig {
    FieldConfig::from_bytes([
        ALL_MEM,
        ALL_COMP,
        sync_bits::TYPE | sync_bits::ARGS,
        cxt_bits::INSTRUCTION | cxt_bits::BASIC_BLOCK | cxt_bits::FUNCTION | cxt_bits::THREAD,
    ])
}

/// Records every callback in order.
#[derive(Default)]
struct Recorder {
    log: Vec<String>,
    stores: usize,
    addresses: Vec<Option<u64>>,
    names: Vec<String>,
    timestamps: Vec<u64>,
}

impl EventHandler for Recorder {
    fn on_memory(&mut self, ev: &MemEvent<'_>) {
        if ev.is_store() {
            self.stores += 1;
        }
        self.addresses.push(ev.address());
        self.log.push("mem".into());
    }

    fn on_compute(&mut self, ev: &CompEvent<'_>) {
        self.log.push(format!("comp:{:?}:{:?}", ev.op(), ev.ids()));
    }

    fn on_sync(&mut self, ev: &SyncEvent<'_>) {
        self.log.push(format!("sync:{:?}", ev.sync_type()));
    }

    fn on_context(&mut self, ev: &CxtEvent<'_>) {
        if let Some(name) = ev.name_str() {
            self.names.push(name.to_string());
        }
        self.log.push(format!("cxt:{:?}", ev.cxt_type()));
    }

    fn on_timestamp(&mut self, ts: u64) {
        self.timestamps.push(ts);
    }
}

#[test]
fn test_memory_store_scenario() {
    let cfg = full_config();
    let mut buf = Vec::new();
    let access = MemAccess::store(1, 0xADBEEFBAADF00D).with_id(12);
    assert_eq!(access.append_to(&cfg, &mut buf).unwrap(), 9);

    let mut dec_cfg = cfg;
    buf.push(END_BYTE);
    let records: Vec<_> = Decoder::new(&buf, &mut dec_cfg).collect::<Result<_, _>>().unwrap();
    assert_eq!(records.len(), 2);
    match records[0] {
        EventRecord::Memory(ev) => {
            assert!(ev.is_store());
            assert!(!ev.is_load());
            assert_eq!(ev.address(), Some(0xADBEEFBAADF00D));
            assert_eq!(ev.accessed_bytes(), Some(2));
            assert_eq!(ev.id(), Some(12));
            assert_eq!(ev.to_access(), access);
        }
        other => panic!("expected memory record, got {:?}", other),
    }
    assert!(matches!(records[1], EventRecord::End));
}

#[test]
fn test_memory_byte_layout() {
    let cfg = full_config();
    let mut buf = Vec::new();
    MemAccess::load(3, 0x0011_2233_4455_6677).with_id(0x42).append_to(&cfg, &mut buf).unwrap();
    // kind 0, type Load (1) in bits 4-3, class 3 in bits 2-0
    assert_eq!(buf[0], 0b000_01_011);
    assert_eq!(&buf[1..8], &[0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]);
    assert_eq!(buf[8], 0x42);
}

#[test]
fn test_memory_length_per_config() {
    let cases = [
        (ALL_MEM, 9),
        (mem_bits::ADDRESS, 8),
        (mem_bits::ID, 2),
        (mem_bits::LDST_TYPE | mem_bits::SIZE, 1),
        (0, 1),
    ];
    for (bits, len) in cases {
        let cfg = FieldConfig::from_bytes([bits, 0, 0, 0]);
        let access = MemAccess::store(2, 0x1000).with_id(7);
        assert_eq!(access.encoded_len(&cfg), len, "bits {:#x}", bits);

        let mut buf = Vec::new();
        access.append_to(&cfg, &mut buf).unwrap();
        buf.push(END_BYTE);
        let mut dec_cfg = cfg;
        let first = Decoder::new(&buf, &mut dec_cfg).next().unwrap().unwrap();
        match first {
            EventRecord::Memory(ev) => {
                assert_eq!(ev.as_bytes().len(), len);
                assert_eq!(ev.to_access(), access.masked(cfg.memory()));
            }
            other => panic!("expected memory record, got {:?}", other),
        }
    }
}

#[test]
fn test_compute_layout_and_ids_need_arity() {
    let op = ComputeOp::new(CompFormat::Float, 3, OpType::Mult, &[9, 8, 7]);

    let cfg = full_config();
    let mut buf = Vec::new();
    assert_eq!(op.append_to(&cfg, &mut buf).unwrap(), 5);
    assert_eq!(buf[0], 0x20 | (2 << 3) | 3);
    assert_eq!(buf[1], (3 << 2) | 2);
    assert_eq!(&buf[2..5], &[9, 8, 7]);

    // ids without arity are dropped
    let cfg = FieldConfig::from_bytes([0, comp_bits::OP | comp_bits::IDS, 0, 0]);
    assert!(!cfg.compute().has_ids());
    assert_eq!(op.encoded_len(&cfg), 2);

    let cfg = FieldConfig::from_bytes([0, comp_bits::INT_FLT | comp_bits::WIDTH, 0, 0]);
    assert_eq!(op.encoded_len(&cfg), 1);
}

#[test]
fn test_sync_and_context_lengths() {
    let cfg = FieldConfig::default();
    assert_eq!(SyncOp::new(SyncType::Lock, 1).encoded_len(&cfg), 9);
    assert_eq!(SyncOp::cond_wait(1, 2).encoded_len(&cfg), 17);
    assert_eq!(ContextMark::Thread(5).encoded_len(&cfg), 8);
    assert_eq!(ContextMark::FunctionExit(b"abc").encoded_len(&cfg), 5);

    let mut buf = Vec::new();
    SyncOp::cond_wait(0xAA, 0xBB).append_to(&cfg, &mut buf).unwrap();
    ContextMark::FunctionEnter(b"abc").append_to(&cfg, &mut buf).unwrap();
    assert_eq!(buf[0], 0x40 | 8);
    assert_eq!(buf[17], 0x60 | 3);
    // name length is stored minus one
    assert_eq!(buf[18], 2);

    buf.push(END_BYTE);
    let mut dec_cfg = cfg;
    let records: Vec<_> = Decoder::new(&buf, &mut dec_cfg).collect::<Result<_, _>>().unwrap();
    match records[0] {
        EventRecord::Sync(ev) => {
            assert_eq!(ev.data(), 0xAA);
            assert_eq!(ev.data2(), Some(0xBB));
        }
        other => panic!("expected sync record, got {:?}", other),
    }
    match records[1] {
        EventRecord::Context(ev) => {
            assert_eq!(ev.cxt_type(), CxtType::FunctionEnter);
            assert_eq!(ev.name(), Some(&b"abc"[..]));
            assert_eq!(ev.id(), None);
        }
        other => panic!("expected context record, got {:?}", other),
    }
}

#[test]
fn test_name_length_limits() {
    let cfg = FieldConfig::default();
    let long = vec![b'x'; 256];
    let mut buf = Vec::new();
    assert_eq!(ContextMark::FunctionEnter(&long).append_to(&cfg, &mut buf).unwrap(), 258);
    assert_eq!(buf[1], 255);

    let too_long = vec![b'x'; 257];
    let mut buf = Vec::new();
    assert_eq!(
        ContextMark::FunctionEnter(&too_long).append_to(&cfg, &mut buf),
        Err(EncodeError::NameLength { len: 257 })
    );
    assert!(buf.is_empty());
    assert_eq!(
        ContextMark::FunctionExit(b"").append_to(&cfg, &mut buf),
        Err(EncodeError::NameLength { len: 0 })
    );
}

#[test]
fn test_encode_rejects_out_of_range_values() {
    let cfg = full_config();
    let mut buf = Vec::new();
    assert_eq!(
        MemAccess::load(0, 1 << 56).append_to(&cfg, &mut buf),
        Err(EncodeError::AddressOverflow { value: 1 << 56 })
    );
    assert_eq!(
        MemAccess::load(8, 0).append_to(&cfg, &mut buf),
        Err(EncodeError::SizeClass { class: 8 })
    );
    assert_eq!(
        ComputeOp::new(CompFormat::Integer, 0, OpType::Add, &[1, 2, 3, 4, 5]).append_to(&cfg, &mut buf),
        Err(EncodeError::Arity { arity: 5 })
    );
    assert_eq!(
        ConfigChange::new(EventKind::End, 0).append_to(&cfg, &mut buf),
        Err(EncodeError::ConfigTarget)
    );
    assert!(buf.is_empty());

    let mut small = [0u8; 4];
    assert!(matches!(
        MemAccess::load(0, 0).encode_into(&cfg, &mut small),
        Err(EncodeError::EventTooLarge { len: 9, capacity: 4 })
    ));
}

/// Config(mem) Config(comp) Mem Comp Sync(create) FunctionEnter(27)
/// BasicBlock Instruction Config(mem) Mem End.
fn reference_stream() -> Vec<u8> {
    let mut cfg = FieldConfig::default();
    let mut buf = Vec::new();
    ConfigChange::new(EventKind::Memory, ALL_MEM).append_and_apply(&mut cfg, &mut buf).unwrap();
    ConfigChange::new(EventKind::Compute, ALL_COMP).append_and_apply(&mut cfg, &mut buf).unwrap();
    MemAccess::store(2, 0xDEAD_BEEF).with_id(3).append_to(&cfg, &mut buf).unwrap();
    ComputeOp::new(CompFormat::Integer, 2, OpType::Add, &[1, 2]).append_to(&cfg, &mut buf).unwrap();
    SyncOp::new(SyncType::Create, 77).append_to(&cfg, &mut buf).unwrap();
    ContextMark::FunctionEnter(b"aCoolFunctionBeingProfiled!").append_to(&cfg, &mut buf).unwrap();
    ContextMark::BasicBlock(0x1234).append_to(&cfg, &mut buf).unwrap();
    ContextMark::Instruction(0x5678).append_to(&cfg, &mut buf).unwrap();
    ConfigChange::new(EventKind::Memory, mem_bits::LDST_TYPE | mem_bits::SIZE)
        .append_and_apply(&mut cfg, &mut buf)
        .unwrap();
    MemAccess::load(0, 0xFFFF).append_to(&cfg, &mut buf).unwrap();
    let at = buf.len();
    buf.push(0);
    encode_end(&mut buf[at..]).unwrap();
    buf
}

#[test]
fn test_reference_fixture() {
    let buf = reference_stream();
    assert_eq!(buf.len(), 75);

    let mut cfg = FieldConfig::default();
    let mut rec = Recorder::default();
    let stats = decode_and_dispatch(&buf, &[], &mut cfg, &mut rec).unwrap();

    assert_eq!(stats.records, 11);
    assert_eq!(stats.dispatched, 7);
    assert_eq!(stats.bytes, 75);
    assert_eq!(
        rec.log,
        vec![
            "mem",
            "comp:Some(Add):Some([1, 2])",
            "sync:Create",
            "cxt:FunctionEnter",
            "cxt:BasicBlock",
            "cxt:Instruction",
            "mem",
        ]
    );
    assert_eq!(rec.names, vec!["aCoolFunctionBeingProfiled!".to_string()]);
    assert_eq!(rec.stores, 1);
    // the second memory event was written after the address bit was cleared
    assert_eq!(rec.addresses, vec![Some(0xDEAD_BEEF), None]);
    // the reconfiguration outlives the buffer
    assert_eq!(cfg.memory().bits(), mem_bits::LDST_TYPE | mem_bits::SIZE);
    assert_eq!(cfg.compute().bits(), ALL_COMP);
}

#[test]
fn test_timestamps_precede_events() {
    let buf = reference_stream();
    let ts: Vec<u64> = (100..107).collect();

    let mut cfg = FieldConfig::default();
    let mut rec = Recorder::default();
    decode_and_dispatch(&buf, &ts, &mut cfg, &mut rec).unwrap();
    assert_eq!(rec.timestamps, ts);

    let too_many: Vec<u64> = (0..8).collect();
    let mut cfg = FieldConfig::default();
    assert_eq!(
        decode_and_dispatch(&buf, &too_many, &mut cfg, &mut Recorder::default()),
        Err(ProtocolError::TimestampMismatch { timestamps: 8, events: 7 })
    );
}

#[test]
fn test_missing_end_is_truncated() {
    let mut buf = reference_stream();
    buf.pop();
    let mut cfg = FieldConfig::default();
    let err = decode_and_dispatch(&buf, &[], &mut cfg, &mut Recorder::default()).unwrap_err();
    assert_eq!(
        err,
        ProtocolError::Truncated {
            offset: 74,
            needed: 1,
            available: 0
        }
    );
}

#[test]
fn test_short_event_is_truncated() {
    let cfg = full_config();
    let mut buf = Vec::new();
    MemAccess::load(0, 1).append_to(&cfg, &mut buf).unwrap();
    buf.truncate(5);

    let mut dec_cfg = cfg;
    let err = Decoder::new(&buf, &mut dec_cfg).next().unwrap().unwrap_err();
    assert_eq!(
        err,
        ProtocolError::Truncated {
            offset: 0,
            needed: 9,
            available: 5
        }
    );
}

#[test]
fn test_corrupt_headers() {
    let mut cfg = FieldConfig::default();
    let decode = |bytes: &[u8], cfg: &mut FieldConfig| Decoder::new(bytes, cfg).next().unwrap().unwrap_err();

    assert_eq!(decode(&[0xE0, END_BYTE], &mut cfg), ProtocolError::UnknownKind { tag: 7, offset: 0 });
    assert_eq!(decode(&[0x80, END_BYTE], &mut cfg), ProtocolError::ReservedKind { offset: 0 });
    assert_eq!(
        decode(&[0x40 | 13, END_BYTE], &mut cfg),
        ProtocolError::UnknownSubtype {
            kind: "sync",
            value: 13,
            offset: 0
        }
    );
    assert_eq!(
        decode(&[0x60, END_BYTE], &mut cfg),
        ProtocolError::UnknownSubtype {
            kind: "context",
            value: 0,
            offset: 0
        }
    );
    // Config targeting End
    assert_eq!(
        decode(&[0xA0 | (6 << 2), 0, END_BYTE], &mut cfg),
        ProtocolError::UnknownSubtype {
            kind: "config target",
            value: 6,
            offset: 0
        }
    );

    // memory type 3 only matters when the type bits are on
    let mut typed = FieldConfig::from_bytes([mem_bits::LDST_TYPE, 0, 0, 0]);
    assert_eq!(
        decode(&[0x18, END_BYTE], &mut typed),
        ProtocolError::UnknownSubtype {
            kind: "memory type",
            value: 3,
            offset: 0
        }
    );
    let mut untyped = FieldConfig::default();
    assert!(Decoder::new(&[0x18, END_BYTE], &mut untyped).all(|r| r.is_ok()));
}

#[test]
fn test_control_flow_config_is_ignored() {
    let mut cfg = full_config();
    let before = cfg;
    let buf = [0xA0 | (4 << 2), 0xFF, END_BYTE];
    let records: Vec<_> = Decoder::new(&buf, &mut cfg).collect::<Result<_, _>>().unwrap();
    assert_eq!(records.len(), 2);
    assert!(matches!(
        records[0],
        EventRecord::Config(ConfigChange { target: EventKind::ControlFlow, bits: 0xFF })
    ));
    assert_eq!(cfg, before);
}

#[test]
fn test_decode_stops_at_end() {
    let mut cfg = FieldConfig::default();
    // trailing garbage after End is never read
    let buf = [END_BYTE, 0xFF, 0xFF];
    let records: Vec<_> = Decoder::new(&buf, &mut cfg).collect();
    assert_eq!(records.len(), 1);
    assert!(matches!(records[0], Ok(EventRecord::End)));

    let stats = decode_and_dispatch(&buf, &[], &mut cfg, &mut Recorder::default()).unwrap();
    assert_eq!(stats.records, 1);
    assert_eq!(stats.dispatched, 0);
    assert_eq!(stats.bytes, 1);
}

#[test]
fn test_memory_type_values() {
    let cfg = FieldConfig::from_bytes([mem_bits::LDST_TYPE, 0, 0, 0]);
    let mut buf = Vec::new();
    MemAccess::default().append_to(&cfg, &mut buf).unwrap();
    MemAccess::load(0, 0).append_to(&cfg, &mut buf).unwrap();
    buf.push(END_BYTE);

    let mut dec_cfg = cfg;
    let types: Vec<_> = Decoder::new(&buf, &mut dec_cfg)
        .filter_map(|r| match r.unwrap() {
            EventRecord::Memory(ev) => ev.mem_type(),
            _ => None,
        })
        .collect();
    assert_eq!(types, vec![MemType::Undefined, MemType::Load]);
}

#[test]
fn test_random_bytes_never_panic() {
    // any byte soup either decodes or fails with a protocol error
    let mut rng = fastrand::Rng::with_seed(0xC0DEC);
    for _ in 0..2_000 {
        let len = rng.usize(0..96);
        let buf: Vec<u8> = (0..len).map(|_| rng.u8(..)).collect();
        let mut cfg = full_config();
        let _ = decode_and_dispatch(&buf, &[], &mut cfg, &mut evpipe::Dispatch::NullHandler);
    }
}

#[test]
fn test_random_truncation_of_valid_stream() {
    let cfg = full_config();
    let mut buf = Vec::new();
    for i in 0..32u64 {
        MemAccess::store(3, 0x1000 + i).append_to(&cfg, &mut buf).unwrap();
        SyncOp::cond_wait(i, i + 1).append_to(&cfg, &mut buf).unwrap();
    }
    buf.push(END_BYTE);

    let mut rng = fastrand::Rng::with_seed(7);
    for _ in 0..200 {
        let cut = rng.usize(0..buf.len());
        let mut dec = cfg;
        let result = decode_and_dispatch(&buf[..cut], &[], &mut dec, &mut evpipe::Dispatch::NullHandler);
        assert!(result.is_err(), "cut at {} decoded without an End", cut);
    }
}

const MEM_TYPES: [MemType; 3] = [MemType::Undefined, MemType::Load, MemType::Store];
const FORMATS: [CompFormat; 3] = [CompFormat::Undefined, CompFormat::Integer, CompFormat::Float];
const OPS: [OpType; 7] = [
    OpType::Undefined,
    OpType::Add,
    OpType::Sub,
    OpType::Mult,
    OpType::Div,
    OpType::Shift,
    OpType::Move,
];

fn random_access(rng: &mut fastrand::Rng) -> MemAccess {
    MemAccess {
        mem_type: MEM_TYPES[rng.usize(..MEM_TYPES.len())],
        size_class: rng.u8(0..=MAX_SIZE_CLASS),
        address: rng.u64(0..=MAX_ADDRESS),
        id: rng.u8(..),
    }
}

fn random_op(rng: &mut fastrand::Rng) -> ComputeOp {
    let ids: Vec<u8> = (0..rng.usize(1..=4)).map(|_| rng.u8(..)).collect();
    ComputeOp::new(
        FORMATS[rng.usize(..FORMATS.len())],
        rng.u8(0..=MAX_SIZE_CLASS),
        OPS[rng.usize(..OPS.len())],
        &ids,
    )
}

fn random_sync(rng: &mut fastrand::Rng) -> SyncOp {
    let sync_type = SyncType::ALL[rng.usize(..SyncType::ALL.len())];
    if sync_type == SyncType::CondWait {
        SyncOp::cond_wait(rng.u64(..), rng.u64(..))
    } else {
        SyncOp::new(sync_type, rng.u64(..))
    }
}

/// Owned copies of everything dispatched.
#[derive(Default)]
struct Collected {
    memory: Vec<MemAccess>,
    compute: Vec<ComputeOp>,
    sync: Vec<SyncOp>,
    context: Vec<(CxtType, Option<u64>, Option<Vec<u8>>)>,
}

impl EventHandler for Collected {
    fn on_memory(&mut self, ev: &MemEvent<'_>) {
        self.memory.push(ev.to_access());
    }

    fn on_compute(&mut self, ev: &CompEvent<'_>) {
        self.compute.push(ev.to_op());
    }

    fn on_sync(&mut self, ev: &SyncEvent<'_>) {
        self.sync.push(ev.to_op());
    }

    fn on_context(&mut self, ev: &CxtEvent<'_>) {
        self.context.push((ev.cxt_type(), ev.id(), ev.name().map(<[u8]>::to_vec)));
    }
}

#[test]
fn test_round_trip_every_field_config() {
    let mut rng = fastrand::Rng::with_seed(0x5EED_F1E1D);

    for mem_set in 0..16u8 {
        for comp_set in 0..32u8 {
            let cfg = FieldConfig::from_bytes([
                mem_set << 4,
                comp_set << 3,
                rng.u8(..) & (sync_bits::TYPE | sync_bits::ARGS),
                rng.u8(..) & 0xF0,
            ]);
            let what = format!("mem {:#04x} comp {:#04x}", mem_set << 4, comp_set << 3);

            // widest values first, then random ones
            let mut accesses = vec![MemAccess {
                mem_type: MemType::Store,
                size_class: MAX_SIZE_CLASS,
                address: MAX_ADDRESS,
                id: u8::MAX,
            }];
            accesses.extend((0..6).map(|_| random_access(&mut rng)));
            let mut ops = vec![ComputeOp::new(CompFormat::Float, MAX_SIZE_CLASS, OpType::Move, &[u8::MAX; 4])];
            ops.extend((0..6).map(|_| random_op(&mut rng)));
            let mut syncs = vec![SyncOp::cond_wait(u64::MAX, u64::MAX)];
            syncs.extend((0..3).map(|_| random_sync(&mut rng)));
            let name: Vec<u8> = (0..rng.usize(1..=MAX_NAME_LEN)).map(|_| rng.u8(..)).collect();
            let instruction = rng.u64(0..=MAX_ADDRESS);
            let marks = [
                ContextMark::Thread(MAX_ADDRESS),
                ContextMark::Instruction(instruction),
                ContextMark::FunctionExit(&name),
            ];

            let mut buf = Vec::new();
            for a in &accesses {
                assert_eq!(a.append_to(&cfg, &mut buf).unwrap(), cfg.memory().len(), "{}", what);
            }
            for op in &ops {
                op.append_to(&cfg, &mut buf).unwrap();
            }
            for s in &syncs {
                s.append_to(&cfg, &mut buf).unwrap();
            }
            for m in &marks {
                m.append_to(&cfg, &mut buf).unwrap();
            }
            buf.push(END_BYTE);

            let mut dec_cfg = cfg;
            let mut got = Collected::default();
            let stats = decode_and_dispatch(&buf, &[], &mut dec_cfg, &mut got).unwrap();
            assert_eq!(stats.bytes, buf.len(), "{}", what);

            let memory: Vec<_> = accesses.iter().map(|a| a.masked(cfg.memory())).collect();
            let compute: Vec<_> = ops.iter().map(|op| op.masked(cfg.compute())).collect();
            assert_eq!(got.memory, memory, "{}", what);
            assert_eq!(got.compute, compute, "{}", what);
            assert_eq!(got.sync, syncs, "{}", what);
            assert_eq!(
                got.context,
                vec![
                    (CxtType::Thread, Some(MAX_ADDRESS), None),
                    (CxtType::Instruction, Some(instruction), None),
                    (CxtType::FunctionExit, None, Some(name.clone())),
                ],
                "{}",
                what
            );
        }
    }
}

#[test]
fn test_compute_ids_across_configs() {
    let op = ComputeOp::new(CompFormat::Integer, 3, OpType::Add, &[7, 0, u8::MAX]);
    // (bits, encoded length, decoded ids)
    let cases: [(u8, usize, Option<&[u8]>); 5] = [
        (0, 1, None),
        (comp_bits::IDS, 1, None),
        (comp_bits::ARITY, 2, None),
        (comp_bits::ARITY | comp_bits::IDS, 5, Some(&[7u8, 0, u8::MAX][..])),
        (comp_bits::OP | comp_bits::ARITY | comp_bits::IDS, 5, Some(&[7u8, 0, u8::MAX][..])),
    ];
    for (bits, len, ids) in cases {
        let cfg = FieldConfig::from_bytes([0, bits, 0, 0]);
        let mut buf = Vec::new();
        assert_eq!(op.append_to(&cfg, &mut buf).unwrap(), len, "bits {:#04x}", bits);
        buf.push(END_BYTE);

        let mut dec_cfg = cfg;
        match Decoder::new(&buf, &mut dec_cfg).next().unwrap().unwrap() {
            EventRecord::Compute(ev) => {
                assert_eq!(ev.ids(), ids, "bits {:#04x}", bits);
                assert_eq!(ev.arity(), cfg.compute().has_arity().then_some(3));
            }
            other => panic!("expected a compute event, got {:?}", other),
        }
    }
}

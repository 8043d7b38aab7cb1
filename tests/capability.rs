// Capability negotiation: per-field resolution, failure on the first
// unmet requirement, and the digit-string form used by CLIs and env vars.

use evpipe::Capability::{resolve, Availability, CapabilityField, CapabilityVector, CAPABILITY_COUNT};
use evpipe::{ConfigError, NegotiationError};

#[test]
fn test_resolution_table() {
    use Availability::*;

    // (offered, requested, resolved)
    let cases = [
        (Unavailable, Disabled, Some(Disabled)),
        (Unavailable, Always, Some(Disabled)),
        (Unavailable, Enabled, None),
        (Disabled, Disabled, Some(Disabled)),
        (Disabled, Enabled, Some(Enabled)),
        (Enabled, Disabled, Some(Disabled)),
        (Enabled, Enabled, Some(Enabled)),
        (Enabled, Always, Some(Disabled)),
        (Always, Disabled, Some(Enabled)),
        (Always, Unavailable, Some(Enabled)),
        (Always, Enabled, Some(Enabled)),
    ];

    for (offered, requested, expected) in cases {
        let o = CapabilityVector::new().with(CapabilityField::SyncArgs, offered);
        let r = CapabilityVector::new().with(CapabilityField::SyncArgs, requested);
        match (resolve(&o, &r), expected) {
            (Ok(caps), Some(want)) => {
                assert_eq!(
                    caps.vector().get(CapabilityField::SyncArgs),
                    want,
                    "offered {:?} requested {:?}",
                    offered,
                    requested
                );
            }
            (Err(e), None) => {
                assert_eq!(e, NegotiationError::Insufficient { field: CapabilityField::SyncArgs });
            }
            (got, want) => panic!("offered {:?} requested {:?}: got {:?}, want {:?}", offered, requested, got, want),
        }
    }
}

#[test]
fn test_resolved_fields_are_enabled_or_disabled() {
    let offered: CapabilityVector = "0123012301230123012".parse().unwrap();
    let requested = CapabilityVector::new();
    let caps = resolve(&offered, &requested).unwrap();

    for (field, a) in caps.vector().iter() {
        assert!(
            matches!(a, Availability::Enabled | Availability::Disabled),
            "{} resolved to {:?}",
            field,
            a
        );
        let always = offered.get(field) == Availability::Always;
        assert_eq!(caps.is_enabled(field), always, "{}", field);
    }
}

#[test]
fn test_insufficient_names_first_field() {
    let offered = CapabilityVector::filled(Availability::Enabled)
        .with(CapabilityField::MemoryId, Availability::Unavailable)
        .with(CapabilityField::ContextThread, Availability::Unavailable);
    let requested = CapabilityVector::filled(Availability::Enabled);

    let err = resolve(&offered, &requested).unwrap_err();
    assert_eq!(err, NegotiationError::Insufficient { field: CapabilityField::MemoryId });
    assert!(err.to_string().contains("memory-id"));
}

#[test]
fn test_capability_string_round_trip() {
    let text = "2222200000000000000";
    let v: CapabilityVector = text.parse().unwrap();
    assert_eq!(v.to_string(), text);
    assert_eq!(v.get(CapabilityField::MemoryId), Availability::Enabled);
    assert_eq!(v.get(CapabilityField::ComputeEnabled), Availability::Unavailable);
    assert_eq!(v.to_bytes().len(), CAPABILITY_COUNT);
    assert_eq!(CapabilityVector::from_bytes(&v.to_bytes()), Some(v));
}

#[test]
fn test_capability_string_rejects_bad_input() {
    assert!(matches!(
        "222".parse::<CapabilityVector>(),
        Err(ConfigError::CapabilityString { .. })
    ));
    assert!(matches!(
        "2222200000000000004".parse::<CapabilityVector>(),
        Err(ConfigError::CapabilityString { .. })
    ));
    assert!(matches!(
        "22222000000000000x0".parse::<CapabilityVector>(),
        Err(ConfigError::CapabilityString { .. })
    ));
}

#[test]
fn test_field_order_matches_wire_index() {
    for (i, field) in CapabilityField::ALL.iter().enumerate() {
        assert_eq!(field.index(), i);
    }
    assert_eq!(CapabilityField::ControlFlow.index(), 11);
    assert_eq!(CapabilityField::ContextThread.index(), CAPABILITY_COUNT - 1);
}

//! Black-box checks of the binary artifact format: header framing,
//! disassembly, and structural round-trips.

use rex::bytecode::{FormatError, HEADER_SIZE, Header, Opcode, Operand, disassemble};
use rex::{CompareOp, Condition, compile_document};

const DOCUMENT: &str = r#"[
    {
        "name": "cooling",
        "priority": 10,
        "conditions": {"all": [
            {"fact": "temperature", "operator": "greaterThan", "value": 30},
            {"any": [
                {"fact": "humidity", "operator": "lessThan", "value": 40},
                {"fact": "room_occupied", "operator": "equal", "value": true}
            ]}
        ]},
        "event": {"eventType": "climate", "actions": [
            {"type": "updateFact", "target": "ac_status", "value": true},
            {"type": "sendMessage", "target": "ops", "value": "ac engaged"}
        ]}
    },
    {
        "name": "label",
        "conditions": {"all": [
            {"fact": "status", "operator": "contains", "value": "fault"}
        ]},
        "event": {"eventType": "alert", "actions": [
            {"type": "updateFact", "target": "alarm", "value": true}
        ]}
    }
]"#;

#[test]
fn artifact_header_is_well_formed() {
    let unit = compile_document(DOCUMENT).unwrap();
    let header = Header::parse(&unit.bytecode).unwrap();

    assert_eq!(header.version, 1);
    assert_eq!(header.const_pool_size, 0);
    assert_eq!(header.num_rules, 2);
    assert_eq!(
        header.bytecode_size as usize,
        unit.bytecode.len() - HEADER_SIZE
    );
}

#[test]
fn corrupted_body_fails_checksum() {
    let unit = compile_document(DOCUMENT).unwrap();
    let mut blob = unit.bytecode;
    let last = blob.len() - 1;
    blob[last] ^= 0x01;
    assert!(matches!(
        Header::parse(&blob),
        Err(FormatError::ChecksumMismatch { .. })
    ));
}

#[test]
fn body_disassembles_completely() {
    let unit = compile_document(DOCUMENT).unwrap();
    let instrs = disassemble(&unit.bytecode[HEADER_SIZE..]).unwrap();
    assert!(!instrs.is_empty());
    // No LABEL and no ERROR in compiler output.
    assert!(instrs.iter().all(|i| i.opcode != Opcode::Error));
}

#[test]
fn fact_indices_match_interning_order() {
    let unit = compile_document(DOCUMENT).unwrap();
    // temperature is the first fact the first rule consumes.
    assert_eq!(unit.context.get("temperature"), Some(0));
    assert_eq!(unit.context.get("humidity"), Some(1));
    assert_eq!(unit.context.get("room_occupied"), Some(2));
    assert_eq!(unit.context.get("ac_status"), Some(3));
    assert_eq!(unit.context.get("status"), Some(4));
    assert_eq!(unit.context.get("alarm"), Some(5));

    let instrs = disassemble(&unit.bytecode[HEADER_SIZE..]).unwrap();
    let first_load = instrs.iter().find(|i| i.opcode == Opcode::LoadFact).unwrap();
    assert_eq!(first_load.operand, Operand::FactIndex(0));
}

#[test]
fn disassembly_reconstructs_condition_structure() {
    // Structural round-trip: every leaf of the source tree appears in the
    // bytecode as a load of its fact index, a constant of its type, and a
    // comparison opcode consistent with its operator.
    let unit = compile_document(DOCUMENT).unwrap();
    let instrs = disassemble(&unit.bytecode[HEADER_SIZE..]).unwrap();

    let leaves = [
        ("temperature", CompareOp::Gt, Opcode::GtInt),
        ("humidity", CompareOp::Lt, Opcode::LtInt),
        ("room_occupied", CompareOp::Eq, Opcode::EqBool),
        ("status", CompareOp::Contains, Opcode::ContainsString),
    ];
    for (fact, _, cmp) in leaves {
        let index = unit.context.get(fact).unwrap();
        let found = instrs.iter().enumerate().any(|(i, instr)| {
            instr.opcode == Opcode::LoadFact
                && instr.operand == Operand::FactIndex(index)
                && instrs.get(i + 2).is_some_and(|third| third.opcode == cmp)
        });
        assert!(found, "no quadruple found for leaf on '{fact}'");
    }
}

#[test]
fn condition_helpers_expose_leaves() {
    // The model side of the structural round-trip.
    let leaf = Condition::leaf("temperature", CompareOp::Gt, 30_i64);
    match leaf {
        Condition::Leaf { ref fact, op, .. } => {
            assert_eq!(fact, "temperature");
            assert_eq!(op, CompareOp::Gt);
        }
        Condition::Nested(_) => panic!("expected leaf"),
    }
}

#[test]
fn empty_document_produces_empty_body() {
    let unit = compile_document("[]").unwrap();
    let header = Header::parse(&unit.bytecode).unwrap();
    assert_eq!(header.num_rules, 0);
    assert_eq!(header.bytecode_size, 0);
    assert_eq!(unit.bytecode.len(), HEADER_SIZE);
}

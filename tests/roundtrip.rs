// property tests: canonical text survives parse -> print unchanged

use proptest::prelude::*;

use qgate::asm::Codec;
use qgate::ir::instr::AccessorElem;

// --- text generators ---

fn value_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,5}".prop_map(|s| format!("%{}", s))
}

fn accessor_elem() -> impl Strategy<Value = String> {
    prop_oneof![
        (-64i64..64).prop_map(|n| n.to_string()),
        value_name(),
    ]
}

fn accessor_list() -> impl Strategy<Value = String> {
    prop::collection::vec(accessor_elem(), 0..=3).prop_map(|elems| {
        if elems.is_empty() {
            String::new()
        } else {
            format!("[{}]", elems.join(", "))
        }
    })
}

fn register_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("qubit".to_owned()),
        Just("register<>".to_owned()),
        (2u32..64).prop_map(|n| format!("register<{}>", n)),
    ]
}

fn register_operand() -> impl Strategy<Value = (String, String)> {
    (value_name(), accessor_list(), register_type()).prop_map(|(v, acc, ty)| (format!("{}{}", v, acc), ty))
}

fn join_operands(ops: &[(String, String)]) -> (String, String) {
    let text: Vec<&str> = ops.iter().map(|(o, _)| o.as_str()).collect();
    let types: Vec<&str> = ops.iter().map(|(_, t)| t.as_str()).collect();
    (text.join(", "), types.join(", "))
}

fn barrier() -> impl Strategy<Value = String> {
    prop::collection::vec(register_operand(), 1..=4).prop_map(|ops| {
        let (text, types) = join_operands(&ops);
        format!("q.barrier {} : {}", text, types)
    })
}

fn rotation() -> impl Strategy<Value = String> {
    let param = prop_oneof![
        (-1000i32..1000).prop_map(|n| (format!("({:?})", n as f64 / 8.0), None::<String>)),
        value_name().prop_map(|v| (format!("({})", v), Some("f64".to_owned()))),
    ];
    (prop_oneof![Just("q.rx"), Just("q.ry"), Just("q.rz")], param, register_operand()).prop_map(
        |(m, (p, pty), (op, ty))| match pty {
            Some(pty) => format!("{}{} {} : {}, {}", m, p, op, pty, ty),
            None => format!("{}{} {} : {}", m, p, op, ty),
        },
    )
}

fn call() -> impl Strategy<Value = String> {
    (
        "[a-z]{1,6}",
        0i64..8,
        prop::collection::vec(register_operand(), 0..4),
    )
        .prop_map(|(callee, count, ops)| {
            if ops.is_empty() {
                format!("q.call @{}({}) -> circuit", callee, count)
            } else {
                let (text, types) = join_operands(&ops);
                format!("q.call @{}({}, {}) : {} -> circuit", callee, count, text, types)
            }
        })
}

proptest! {
    #[test]
    fn generic_text_is_a_fixed_point(src in barrier()) {
        let codec = Codec::default();
        let instr = codec.parse_instruction(&src).unwrap();
        prop_assert_eq!(codec.print_instruction(&instr).unwrap(), src);

        let total: usize = instr.segments().unwrap().iter().map(|&n| n as usize).sum();
        prop_assert_eq!(total, instr.operands().len());
    }

    #[test]
    fn dynamic_elements_match_accessor_segments(src in barrier()) {
        let codec = Codec::default();
        let instr = codec.parse_instruction(&src).unwrap();
        let groups = instr.slot_groups().unwrap();
        for (k, group) in groups.iter().enumerate() {
            let dynamic = instr
                .accessors(k)
                .unwrap()
                .iter()
                .filter(|e| **e == AccessorElem::Dynamic)
                .count();
            prop_assert_eq!(dynamic, group.accessors.len());
        }
    }

    #[test]
    fn rotation_text_is_a_fixed_point(src in rotation()) {
        let codec = Codec::default();
        let instr = codec.parse_instruction(&src).unwrap();
        prop_assert_eq!(codec.print_instruction(&instr).unwrap(), src);
    }

    #[test]
    fn call_text_is_a_fixed_point(src in call()) {
        let codec = Codec::default();
        let instr = codec.parse_instruction(&src).unwrap();
        prop_assert_eq!(codec.print_instruction(&instr).unwrap(), src);
        let groups = instr.call_groups().unwrap();
        prop_assert_eq!(groups.len(), instr.segments().unwrap()[0] as usize);
    }

    #[test]
    fn type_text_interns_once(size in 2u32..1000, ctrl in 1u32..16) {
        let codec = Codec::default();
        let reg_text = format!("register<{}>", size);
        prop_assert_eq!(codec.parse_type(&reg_text).unwrap(), codec.parse_type(&reg_text).unwrap());

        let gate_text = format!("cgate<{}, gate2>", ctrl);
        let ty = codec.parse_type(&gate_text).unwrap();
        prop_assert_eq!(codec.print_type(&ty), gate_text);
        prop_assert_eq!(codec.registry().len(), 3);
    }
}

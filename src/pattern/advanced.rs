use crate::ir::Instruction;
use crate::opcodes::*;
use crate::pattern::{NanoPattern, PatternCategory};

/// Built-in instruction-scope patterns, in match order.
pub(super) const PATTERNS: [NanoPattern; 9] = [
    NanoPattern::instruction(
        "ObjectCreator",
        PatternCategory::ObjectOriented,
        "Creates a new object",
        object_creator,
    ),
    NanoPattern::instruction(
        "FieldReader",
        PatternCategory::ObjectOriented,
        "Reads a field",
        field_reader,
    ),
    NanoPattern::instruction(
        "FieldWriter",
        PatternCategory::ObjectOriented,
        "Writes a field",
        field_writer,
    ),
    NanoPattern::instruction(
        "TypeManipulator",
        PatternCategory::ObjectOriented,
        "Casts or tests the type of a reference",
        type_manipulator,
    ),
    NanoPattern::instruction(
        "LocalReader",
        PatternCategory::DataFlow,
        "Reads a local variable",
        local_reader,
    ),
    NanoPattern::instruction(
        "LocalWriter",
        PatternCategory::DataFlow,
        "Writes a local variable",
        local_writer,
    ),
    NanoPattern::instruction(
        "ArrayCreator",
        PatternCategory::DataFlow,
        "Creates an array",
        array_creator,
    ),
    NanoPattern::instruction(
        "ArrayReader",
        PatternCategory::DataFlow,
        "Reads an array element",
        array_reader,
    ),
    NanoPattern::instruction(
        "ArrayWriter",
        PatternCategory::DataFlow,
        "Writes an array element",
        array_writer,
    ),
];

fn object_creator(inst: &Instruction) -> bool {
    inst.opcode == NEW
}

fn field_reader(inst: &Instruction) -> bool {
    matches!(inst.opcode, GETFIELD | GETSTATIC)
}

fn field_writer(inst: &Instruction) -> bool {
    matches!(inst.opcode, PUTFIELD | PUTSTATIC)
}

fn type_manipulator(inst: &Instruction) -> bool {
    matches!(inst.opcode, CHECKCAST | INSTANCEOF)
}

fn local_reader(inst: &Instruction) -> bool {
    matches!(inst.opcode, ILOAD..=ALOAD_3)
}

// iinc writes its slot in place.
fn local_writer(inst: &Instruction) -> bool {
    matches!(inst.opcode, ISTORE..=ASTORE_3 | IINC)
}

fn array_creator(inst: &Instruction) -> bool {
    matches!(inst.opcode, NEWARRAY | ANEWARRAY | MULTIANEWARRAY)
}

fn array_reader(inst: &Instruction) -> bool {
    matches!(inst.opcode, IALOAD..=SALOAD)
}

fn array_writer(inst: &Instruction) -> bool {
    matches!(inst.opcode, IASTORE..=SASTORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::InstructionKind;
    use crate::pattern::PatternCatalog;
    use crate::test_support::{method, op, op_with, static_method};

    fn matches_of(opcode: u8) -> Vec<&'static str> {
        let method = static_method("probe", "()V", vec![op(opcode)]);
        PatternCatalog::default().match_advanced(&method)
    }

    #[test]
    fn single_array_store_is_an_array_writer() {
        let method = method("store", "()V", vec![op(IASTORE)]);
        let catalog = PatternCatalog::default();

        assert_eq!(catalog.match_advanced(&method), vec!["ArrayWriter"]);
        let simple = catalog.match_simple(&method);
        assert_eq!(simple, vec!["NoParams", "NoReturn", "Leaf", "StraightLine"]);
    }

    #[test]
    fn opcode_ranges_cover_every_variant() {
        for opcode in ILOAD..=ALOAD_3 {
            assert_eq!(matches_of(opcode), vec!["LocalReader"], "{}", mnemonic(opcode));
        }
        for opcode in ISTORE..=ASTORE_3 {
            assert_eq!(matches_of(opcode), vec!["LocalWriter"], "{}", mnemonic(opcode));
        }
        for opcode in IALOAD..=SALOAD {
            assert_eq!(matches_of(opcode), vec!["ArrayReader"], "{}", mnemonic(opcode));
        }
        for opcode in IASTORE..=SASTORE {
            assert_eq!(matches_of(opcode), vec!["ArrayWriter"], "{}", mnemonic(opcode));
        }
    }

    #[test]
    fn object_and_type_instructions() {
        assert_eq!(matches_of(NEW), vec!["ObjectCreator"]);
        assert_eq!(matches_of(GETSTATIC), vec!["FieldReader"]);
        assert_eq!(matches_of(PUTFIELD), vec!["FieldWriter"]);
        assert_eq!(matches_of(INSTANCEOF), vec!["TypeManipulator"]);
        assert_eq!(matches_of(MULTIANEWARRAY), vec!["ArrayCreator"]);
        assert!(matches_of(INVOKEVIRTUAL).is_empty());
        assert!(matches_of(IADD).is_empty());
    }

    #[test]
    fn increment_writes_a_local() {
        let method = method(
            "bump",
            "()V",
            vec![op_with(IINC, InstructionKind::Increment { slot: 1, delta: 1 })],
        );

        assert_eq!(
            PatternCatalog::default().match_advanced(&method),
            vec!["LocalWriter"]
        );
    }
}

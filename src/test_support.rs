//! Builders for hand-written methods used across unit tests.

use crate::ir::{
    CallKind, CallSite, Constant, FieldRef, Instruction, InstructionKind, Method, MethodAccess,
};
use crate::opcodes;

pub(crate) const OWNER: &str = "com/example/App";

/// Instance method of [`OWNER`]; indices and offsets follow instruction order.
pub(crate) fn method(name: &str, descriptor: &str, instructions: Vec<Instruction>) -> Method {
    let instructions = instructions
        .into_iter()
        .enumerate()
        .map(|(index, inst)| Instruction {
            index,
            offset: index as u32,
            ..inst
        })
        .collect();
    Method {
        owner: OWNER.to_string(),
        name: name.to_string(),
        descriptor: descriptor.to_string(),
        access: MethodAccess {
            is_public: true,
            is_static: false,
            is_abstract: false,
        },
        instructions,
        exception_handlers: Vec::new(),
    }
}

pub(crate) fn static_method(
    name: &str,
    descriptor: &str,
    instructions: Vec<Instruction>,
) -> Method {
    let mut method = method(name, descriptor, instructions);
    method.access.is_static = true;
    method
}

pub(crate) fn op(opcode: u8) -> Instruction {
    op_with(opcode, InstructionKind::Simple)
}

pub(crate) fn op_with(opcode: u8, kind: InstructionKind) -> Instruction {
    Instruction {
        index: 0,
        offset: 0,
        opcode,
        kind,
    }
}

pub(crate) fn local(opcode: u8, slot: u16) -> Instruction {
    op_with(opcode, InstructionKind::Local(slot))
}

pub(crate) fn int(value: i32) -> Instruction {
    op_with(opcodes::BIPUSH, InstructionKind::Constant(Constant::Int(value)))
}

pub(crate) fn field(opcode: u8, owner: &str, name: &str, descriptor: &str) -> Instruction {
    op_with(
        opcode,
        InstructionKind::Field(FieldRef {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }),
    )
}

pub(crate) fn invoke(opcode: u8, owner: &str, name: &str, descriptor: &str) -> Instruction {
    let kind = match opcode {
        opcodes::INVOKEVIRTUAL => CallKind::Virtual,
        opcodes::INVOKESPECIAL => CallKind::Special,
        opcodes::INVOKESTATIC => CallKind::Static,
        opcodes::INVOKEINTERFACE => CallKind::Interface,
        _ => CallKind::Dynamic,
    };
    op_with(
        opcode,
        InstructionKind::Invoke(CallSite {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            kind,
            offset: 0,
        }),
    )
}

/// Minimal class file for `com/example/Counter` with two methods.
///
/// `next()I` reads `count` and adds one; `again()I` calls `next` on `this`.
pub(crate) fn counter_class_bytes() -> Vec<u8> {
    fn utf8(bytes: &mut Vec<u8>, value: &str) {
        bytes.push(1);
        bytes.extend_from_slice(&(value.len() as u16).to_be_bytes());
        bytes.extend_from_slice(value.as_bytes());
    }
    fn pair(bytes: &mut Vec<u8>, tag: u8, first: u16, second: u16) {
        bytes.push(tag);
        bytes.extend_from_slice(&first.to_be_bytes());
        bytes.extend_from_slice(&second.to_be_bytes());
    }
    fn code_method(bytes: &mut Vec<u8>, name: u16, descriptor: u16, code: &[u8]) {
        bytes.extend_from_slice(&0x0001u16.to_be_bytes());
        bytes.extend_from_slice(&name.to_be_bytes());
        bytes.extend_from_slice(&descriptor.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&11u16.to_be_bytes());
        bytes.extend_from_slice(&(12 + code.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&2u16.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&(code.len() as u32).to_be_bytes());
        bytes.extend_from_slice(code);
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
    }

    let mut bytes = vec![0xca, 0xfe, 0xba, 0xbe, 0x00, 0x00, 0x00, 0x34];
    bytes.extend_from_slice(&15u16.to_be_bytes());
    utf8(&mut bytes, "com/example/Counter"); // 1
    bytes.extend_from_slice(&[7, 0, 1]); // 2
    utf8(&mut bytes, "java/lang/Object"); // 3
    bytes.extend_from_slice(&[7, 0, 3]); // 4
    utf8(&mut bytes, "count"); // 5
    utf8(&mut bytes, "I"); // 6
    pair(&mut bytes, 12, 5, 6); // 7
    pair(&mut bytes, 9, 2, 7); // 8
    utf8(&mut bytes, "next"); // 9
    utf8(&mut bytes, "()I"); // 10
    utf8(&mut bytes, "Code"); // 11
    pair(&mut bytes, 12, 9, 10); // 12
    pair(&mut bytes, 10, 2, 12); // 13
    utf8(&mut bytes, "again"); // 14

    bytes.extend_from_slice(&0x0021u16.to_be_bytes());
    bytes.extend_from_slice(&2u16.to_be_bytes());
    bytes.extend_from_slice(&4u16.to_be_bytes());
    bytes.extend_from_slice(&0u16.to_be_bytes());
    bytes.extend_from_slice(&0u16.to_be_bytes());

    bytes.extend_from_slice(&2u16.to_be_bytes());
    // aload_0; getfield #8; iconst_1; iadd; ireturn
    code_method(&mut bytes, 9, 10, &[0x2a, 0xb4, 0x00, 0x08, 0x04, 0x60, 0xac]);
    // aload_0; invokevirtual #13; ireturn
    code_method(&mut bytes, 14, 10, &[0x2a, 0xb6, 0x00, 0x0d, 0xac]);

    bytes.extend_from_slice(&0u16.to_be_bytes());
    bytes
}

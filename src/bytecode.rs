use crate::error::{Result, decode_error};
use crate::ir::{CallKind, CallSite, Constant, FieldRef, Instruction, InstructionKind};
use crate::opcodes::{self, Category};

/// Constant-pool lookups needed to decode instruction operands.
///
/// Indices are the raw one-based indices found in the code bytes.
pub trait ConstantPool {
    /// Internal name of a `CONSTANT_Class` entry.
    fn class_name(&self, index: u16) -> Option<String>;
    /// Owner, name and descriptor of a field, method or interface method reference.
    fn member_ref(&self, index: u16) -> Option<(String, String, String)>;
    /// Name and descriptor of a `CONSTANT_InvokeDynamic` entry.
    fn invoke_dynamic(&self, index: u16) -> Option<(String, String)>;
    /// Literal loaded by `ldc`, `ldc_w` or `ldc2_w`.
    fn loadable(&self, index: u16) -> Option<Constant>;
}

/// Decode a Code attribute into the ordered instruction sequence.
pub fn decode_instructions(code: &[u8], pool: &impl ConstantPool) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();
    let mut offset = 0usize;
    while offset < code.len() {
        let length = opcode_length(code, offset)?;
        if offset + length > code.len() {
            return Err(decode_error!(
                offset,
                "instruction {} runs past end of code",
                opcodes::mnemonic(code[offset])
            ));
        }
        let (opcode, kind) = decode_operands(code, offset, pool)?;
        instructions.push(Instruction {
            index: instructions.len(),
            offset: offset as u32,
            opcode,
            kind,
        });
        offset += length;
    }
    Ok(instructions)
}

fn decode_operands(
    code: &[u8],
    offset: usize,
    pool: &impl ConstantPool,
) -> Result<(u8, InstructionKind)> {
    use opcodes::*;

    let opcode = code[offset];
    let kind = match opcode {
        WIDE => return decode_wide(code, offset),
        ACONST_NULL => InstructionKind::Constant(Constant::Null),
        ICONST_M1..=ICONST_5 => {
            InstructionKind::Constant(Constant::Int(opcode as i32 - ICONST_0 as i32))
        }
        LCONST_0 | LCONST_1 => InstructionKind::Constant(Constant::Long((opcode - LCONST_0) as i64)),
        FCONST_0..=FCONST_2 => InstructionKind::Constant(Constant::Float((opcode - FCONST_0) as f32)),
        DCONST_0 | DCONST_1 => {
            InstructionKind::Constant(Constant::Double((opcode - DCONST_0) as f64))
        }
        BIPUSH => InstructionKind::Constant(Constant::Int(read_u8(code, offset + 1)? as i8 as i32)),
        SIPUSH => InstructionKind::Constant(Constant::Int(read_i16(code, offset + 1)? as i32)),
        LDC => loadable(pool, read_u8(code, offset + 1)? as u16, offset)?,
        LDC_W | LDC2_W => loadable(pool, read_u16(code, offset + 1)?, offset)?,
        ILOAD..=ALOAD | ISTORE..=ASTORE | RET => {
            InstructionKind::Local(read_u8(code, offset + 1)? as u16)
        }
        ILOAD_0..=ALOAD_3 => InstructionKind::Local(((opcode - ILOAD_0) % 4) as u16),
        ISTORE_0..=ASTORE_3 => InstructionKind::Local(((opcode - ISTORE_0) % 4) as u16),
        IINC => InstructionKind::Increment {
            slot: read_u8(code, offset + 1)? as u16,
            delta: read_u8(code, offset + 2)? as i8 as i16,
        },
        IFEQ..=JSR | IFNULL | IFNONNULL => {
            let relative = read_i16(code, offset + 1)? as i32;
            InstructionKind::Jump(branch_target(offset, relative)?)
        }
        GOTO_W | JSR_W => {
            let relative = read_i32(code, offset + 1)?;
            InstructionKind::Jump(branch_target(offset, relative)?)
        }
        TABLESWITCH => tableswitch(code, offset)?,
        LOOKUPSWITCH => lookupswitch(code, offset)?,
        GETSTATIC..=PUTFIELD => {
            let (owner, name, descriptor) = member_ref(pool, read_u16(code, offset + 1)?, offset)?;
            InstructionKind::Field(FieldRef {
                owner,
                name,
                descriptor,
            })
        }
        INVOKEVIRTUAL..=INVOKEINTERFACE => {
            let (owner, name, descriptor) = member_ref(pool, read_u16(code, offset + 1)?, offset)?;
            let kind = match opcode {
                INVOKEVIRTUAL => CallKind::Virtual,
                INVOKESPECIAL => CallKind::Special,
                INVOKESTATIC => CallKind::Static,
                _ => CallKind::Interface,
            };
            InstructionKind::Invoke(CallSite {
                owner,
                name,
                descriptor,
                kind,
                offset: offset as u32,
            })
        }
        INVOKEDYNAMIC => {
            let index = read_u16(code, offset + 1)?;
            let (name, descriptor) = pool
                .invoke_dynamic(index)
                .ok_or_else(|| decode_error!(offset, "invalid invokedynamic entry #{}", index))?;
            InstructionKind::Invoke(CallSite {
                owner: String::new(),
                name,
                descriptor,
                kind: CallKind::Dynamic,
                offset: offset as u32,
            })
        }
        NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => {
            InstructionKind::Type(class_name(pool, read_u16(code, offset + 1)?, offset)?)
        }
        NEWARRAY => InstructionKind::NewArray(read_u8(code, offset + 1)?),
        MULTIANEWARRAY => InstructionKind::MultiNewArray {
            class: class_name(pool, read_u16(code, offset + 1)?, offset)?,
            dimensions: read_u8(code, offset + 3)?,
        },
        _ => InstructionKind::Simple,
    };
    Ok((opcode, kind))
}

fn decode_wide(code: &[u8], offset: usize) -> Result<(u8, InstructionKind)> {
    let opcode = read_u8(code, offset + 1)?;
    let slot = read_u16(code, offset + 2)?;
    let kind = match opcode {
        opcodes::IINC => InstructionKind::Increment {
            slot,
            delta: read_i16(code, offset + 4)?,
        },
        opcodes::ILOAD..=opcodes::ALOAD | opcodes::ISTORE..=opcodes::ASTORE | opcodes::RET => {
            InstructionKind::Local(slot)
        }
        _ => {
            return Err(decode_error!(
                offset,
                "wide cannot modify {}",
                opcodes::mnemonic(opcode)
            ));
        }
    };
    Ok((opcode, kind))
}

fn tableswitch(code: &[u8], offset: usize) -> Result<InstructionKind> {
    let base = offset + 1 + padding(offset);
    let default = branch_target(offset, read_i32(code, base)?)?;
    let low = read_i32(code, base + 4)?;
    let high = read_i32(code, base + 8)?;
    let count = switch_count(offset, low, high)?;
    let mut targets = Vec::with_capacity(count);
    let mut idx = base + 12;
    for _ in 0..count {
        targets.push(branch_target(offset, read_i32(code, idx)?)?);
        idx += 4;
    }
    Ok(InstructionKind::Switch { default, targets })
}

fn lookupswitch(code: &[u8], offset: usize) -> Result<InstructionKind> {
    let base = offset + 1 + padding(offset);
    let default = branch_target(offset, read_i32(code, base)?)?;
    let npairs = read_i32(code, base + 4)?;
    let npairs = usize::try_from(npairs)
        .map_err(|_| decode_error!(offset, "negative lookupswitch pair count {}", npairs))?;
    let mut targets = Vec::with_capacity(npairs);
    let mut idx = base + 8;
    for _ in 0..npairs {
        targets.push(branch_target(offset, read_i32(code, idx + 4)?)?);
        idx += 8;
    }
    Ok(InstructionKind::Switch { default, targets })
}

fn switch_count(offset: usize, low: i32, high: i32) -> Result<usize> {
    high.checked_sub(low)
        .and_then(|v| v.checked_add(1))
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| decode_error!(offset, "invalid tableswitch range {}..{}", low, high))
}

/// Length in bytes of the instruction starting at `offset`.
pub fn opcode_length(code: &[u8], offset: usize) -> Result<usize> {
    use opcodes::*;

    let opcode = read_u8(code, offset)?;
    let length = match opcode {
        BIPUSH | LDC | ILOAD..=ALOAD | ISTORE..=ASTORE | RET | NEWARRAY => 2,
        SIPUSH | LDC_W | LDC2_W | IINC | IFEQ..=JSR | GETSTATIC..=INVOKESTATIC | NEW
        | ANEWARRAY | CHECKCAST | INSTANCEOF | IFNULL | IFNONNULL => 3,
        MULTIANEWARRAY => 4,
        INVOKEINTERFACE | INVOKEDYNAMIC | GOTO_W | JSR_W => 5,
        WIDE => {
            if read_u8(code, offset + 1)? == IINC {
                6
            } else {
                4
            }
        }
        TABLESWITCH => {
            let padding = padding(offset);
            let base = offset + 1 + padding;
            let low = read_i32(code, base + 4)?;
            let high = read_i32(code, base + 8)?;
            1 + padding + 12 + 4 * switch_count(offset, low, high)?
        }
        LOOKUPSWITCH => {
            let padding = padding(offset);
            let npairs = read_i32(code, offset + 1 + padding + 4)?;
            let npairs = usize::try_from(npairs)
                .map_err(|_| decode_error!(offset, "negative lookupswitch pair count {}", npairs))?;
            1 + padding + 8 + 8 * npairs
        }
        _ if Category::of(opcode).is_some() => 1,
        _ => return Err(decode_error!(offset, "undefined opcode 0x{:02x}", opcode)),
    };
    Ok(length)
}

/// Alignment bytes between a switch opcode and its 4-byte aligned operands.
pub fn padding(offset: usize) -> usize {
    (4 - ((offset + 1) % 4)) % 4
}

fn branch_target(offset: usize, relative: i32) -> Result<u32> {
    let target = offset as i64 + relative as i64;
    u32::try_from(target)
        .map_err(|_| decode_error!(offset, "branch target {} out of range", target))
}

fn loadable(pool: &impl ConstantPool, index: u16, offset: usize) -> Result<InstructionKind> {
    pool.loadable(index)
        .map(InstructionKind::Constant)
        .ok_or_else(|| decode_error!(offset, "constant pool entry #{} is not loadable", index))
}

fn member_ref(
    pool: &impl ConstantPool,
    index: u16,
    offset: usize,
) -> Result<(String, String, String)> {
    pool.member_ref(index)
        .ok_or_else(|| decode_error!(offset, "invalid member reference #{}", index))
}

fn class_name(pool: &impl ConstantPool, index: u16, offset: usize) -> Result<String> {
    pool.class_name(index)
        .ok_or_else(|| decode_error!(offset, "invalid class reference #{}", index))
}

fn read_u8(code: &[u8], offset: usize) -> Result<u8> {
    code.get(offset)
        .copied()
        .ok_or_else(|| decode_error!(offset, "unexpected end of code"))
}

fn read_u16(code: &[u8], offset: usize) -> Result<u16> {
    let bytes = code
        .get(offset..offset + 2)
        .ok_or_else(|| decode_error!(offset, "unexpected end of code"))?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn read_u32(code: &[u8], offset: usize) -> Result<u32> {
    let bytes = code
        .get(offset..offset + 4)
        .ok_or_else(|| decode_error!(offset, "unexpected end of code"))?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_i16(code: &[u8], offset: usize) -> Result<i16> {
    Ok(read_u16(code, offset)? as i16)
}

fn read_i32(code: &[u8], offset: usize) -> Result<i32> {
    Ok(read_u32(code, offset)? as i32)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::Error;
    use crate::opcodes::*;

    /// Constant pool backed by maps, for decoding hand-written code.
    #[derive(Default)]
    struct FakePool {
        classes: HashMap<u16, String>,
        members: HashMap<u16, (String, String, String)>,
        dynamics: HashMap<u16, (String, String)>,
        constants: HashMap<u16, Constant>,
    }

    impl ConstantPool for FakePool {
        fn class_name(&self, index: u16) -> Option<String> {
            self.classes.get(&index).cloned()
        }

        fn member_ref(&self, index: u16) -> Option<(String, String, String)> {
            self.members.get(&index).cloned()
        }

        fn invoke_dynamic(&self, index: u16) -> Option<(String, String)> {
            self.dynamics.get(&index).cloned()
        }

        fn loadable(&self, index: u16) -> Option<Constant> {
            self.constants.get(&index).cloned()
        }
    }

    fn opcodes_of(instructions: &[Instruction]) -> Vec<u8> {
        instructions.iter().map(|inst| inst.opcode).collect()
    }

    #[test]
    fn decodes_straight_line_code() {
        let mut pool = FakePool::default();
        pool.members.insert(
            7,
            (
                "com/example/App".to_string(),
                "count".to_string(),
                "I".to_string(),
            ),
        );
        // aload_0; getfield #7; iconst_1; iadd; ireturn
        let code = [ALOAD_0, GETFIELD, 0x00, 0x07, ICONST_1, IADD, IRETURN];

        let instructions = decode_instructions(&code, &pool).expect("decode");

        assert_eq!(
            opcodes_of(&instructions),
            vec![ALOAD_0, GETFIELD, ICONST_1, IADD, IRETURN]
        );
        assert_eq!(instructions[0].kind, InstructionKind::Local(0));
        assert_eq!(instructions[1].offset, 1);
        assert_eq!(instructions[2].index, 2);
        assert_eq!(instructions[2].kind, InstructionKind::Constant(Constant::Int(1)));
        let InstructionKind::Field(field) = &instructions[1].kind else {
            panic!("expected field operand");
        };
        assert_eq!(field.owner, "com/example/App");
        assert_eq!(field.name, "count");
    }

    #[test]
    fn folds_wide_into_the_widened_opcode() {
        let pool = FakePool::default();
        // wide iload 0x0102; wide iinc 0x0102 -3
        let code = [WIDE, ILOAD, 0x01, 0x02, WIDE, IINC, 0x01, 0x02, 0xff, 0xfd];

        let instructions = decode_instructions(&code, &pool).expect("decode");

        assert_eq!(opcodes_of(&instructions), vec![ILOAD, IINC]);
        assert_eq!(instructions[0].kind, InstructionKind::Local(0x0102));
        assert_eq!(
            instructions[1].kind,
            InstructionKind::Increment {
                slot: 0x0102,
                delta: -3
            }
        );
        assert_eq!(instructions[1].offset, 4);
    }

    #[test]
    fn resolves_branch_targets_relative_to_the_opcode() {
        let pool = FakePool::default();
        // 0: iconst_0; 1: ifeq +4 -> 5; 4: nop; 5: goto -5 -> 0
        let code = [ICONST_0, IFEQ, 0x00, 0x04, NOP, GOTO, 0xff, 0xfb];

        let instructions = decode_instructions(&code, &pool).expect("decode");

        assert_eq!(instructions[1].kind, InstructionKind::Jump(5));
        assert_eq!(instructions[3].kind, InstructionKind::Jump(0));
    }

    #[test]
    fn decodes_padded_switches() {
        let pool = FakePool::default();
        // 0: iload_1; 1: tableswitch (2 bytes padding) default +27, low 0, high 1, +27, +28
        let mut code = vec![ILOAD_1, TABLESWITCH, 0, 0];
        for value in [27i32, 0, 1, 27, 28] {
            code.extend_from_slice(&value.to_be_bytes());
        }
        // 24: lookupswitch (3 bytes padding) default +4, 1 pair (5 -> +5)
        code.push(LOOKUPSWITCH);
        code.extend_from_slice(&[0, 0, 0]);
        for value in [4i32, 1, 5, 5] {
            code.extend_from_slice(&value.to_be_bytes());
        }
        code.push(RETURN);
        code.push(RETURN);

        let instructions = decode_instructions(&code, &pool).expect("decode");

        assert_eq!(
            opcodes_of(&instructions),
            vec![ILOAD_1, TABLESWITCH, LOOKUPSWITCH, RETURN, RETURN]
        );
        assert_eq!(
            instructions[1].kind,
            InstructionKind::Switch {
                default: 28,
                targets: vec![28, 29]
            }
        );
        assert_eq!(instructions[2].offset, 24);
        assert_eq!(
            instructions[2].kind,
            InstructionKind::Switch {
                default: 28,
                targets: vec![29]
            }
        );
    }

    #[test]
    fn decodes_calls_types_and_constants() {
        let mut pool = FakePool::default();
        pool.classes.insert(2, "java/lang/StringBuilder".to_string());
        pool.members.insert(
            3,
            (
                "java/lang/StringBuilder".to_string(),
                "<init>".to_string(),
                "()V".to_string(),
            ),
        );
        pool.dynamics.insert(
            4,
            ("run".to_string(), "()Ljava/lang/Runnable;".to_string()),
        );
        pool.constants
            .insert(5, Constant::String("hello".to_string()));
        let code = [
            NEW, 0x00, 0x02, DUP, INVOKESPECIAL, 0x00, 0x03, INVOKEDYNAMIC, 0x00, 0x04, 0x00,
            0x00, LDC, 0x05, BIPUSH, 0xfe, MULTIANEWARRAY, 0x00, 0x02, 0x03,
        ];

        let instructions = decode_instructions(&code, &pool).expect("decode");

        assert_eq!(
            instructions[0].kind,
            InstructionKind::Type("java/lang/StringBuilder".to_string())
        );
        let InstructionKind::Invoke(call) = &instructions[2].kind else {
            panic!("expected call");
        };
        assert_eq!(call.kind, CallKind::Special);
        assert_eq!(call.offset, 4);
        let InstructionKind::Invoke(dynamic) = &instructions[3].kind else {
            panic!("expected dynamic call");
        };
        assert_eq!(dynamic.kind, CallKind::Dynamic);
        assert_eq!(dynamic.name, "run");
        assert_eq!(
            instructions[4].kind,
            InstructionKind::Constant(Constant::String("hello".to_string()))
        );
        assert_eq!(instructions[5].kind, InstructionKind::Constant(Constant::Int(-2)));
        assert_eq!(
            instructions[6].kind,
            InstructionKind::MultiNewArray {
                class: "java/lang/StringBuilder".to_string(),
                dimensions: 3
            }
        );
    }

    #[test]
    fn rejects_truncated_and_undefined_code() {
        let pool = FakePool::default();

        let truncated = decode_instructions(&[SIPUSH, 0x01], &pool);
        let undefined = decode_instructions(&[NOP, 0xfe], &pool);
        let dangling = decode_instructions(&[GETFIELD, 0x00, 0x09], &pool);

        assert!(matches!(truncated, Err(Error::Decode { offset: 0, .. })));
        assert!(matches!(undefined, Err(Error::Decode { offset: 1, .. })));
        assert!(matches!(dangling, Err(Error::Decode { offset: 0, .. })));
    }
}

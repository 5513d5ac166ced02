use crate::descriptor::MethodSignature;
use crate::error::{Error, Result};
use crate::ir::{Instruction, InstructionKind, Method};
use crate::opcodes::{self, Category};

/// How many operand expressions an instruction consumes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ArityClass {
    Nullary,
    Unary,
    Binary,
    Ternary,
    Quaternary,
    /// Operand count depends on the instruction's operands.
    Nary,
}

impl ArityClass {
    /// Arity class of an opcode; undefined opcodes are nullary.
    pub fn of(opcode: u8) -> Self {
        Category::of(opcode).map_or(Self::Nullary, Self::for_category)
    }

    pub fn for_category(category: Category) -> Self {
        match category {
            Category::Nop
            | Category::Constant
            | Category::LocalLoad
            | Category::Duplicate
            | Category::Jump
            | Category::Subroutine
            | Category::SubroutineReturn
            | Category::VoidReturn
            | Category::StaticRead
            | Category::New
            | Category::Wide => Self::Nullary,
            Category::LocalStore
            | Category::Pop
            | Category::Negate
            | Category::Increment
            | Category::Conversion
            | Category::Branch
            | Category::Switch
            | Category::ValueReturn
            | Category::StaticWrite
            | Category::InstanceRead
            | Category::NewArray
            | Category::ArrayLength
            | Category::Throw
            | Category::TypeCheck
            | Category::Monitor => Self::Unary,
            Category::ArrayLoad
            | Category::Arithmetic
            | Category::Comparison
            | Category::CompareBranch
            | Category::InstanceWrite => Self::Binary,
            Category::ArrayStore => Self::Ternary,
            Category::Invoke | Category::MultiNewArray => Self::Nary,
        }
    }

    /// Label used in tree outlines.
    pub fn label(self) -> &'static str {
        match self {
            Self::Nullary => "nullary",
            Self::Unary => "unary",
            Self::Binary => "binary",
            Self::Ternary => "ternary",
            Self::Quaternary => "quaternary",
            Self::Nary => "nary",
        }
    }
}

/// Number of previously produced values `instruction` consumes inside `method`.
pub fn resolve_arity(instruction: &Instruction, method: &Method) -> Result<usize> {
    let arity = match ArityClass::of(instruction.opcode) {
        ArityClass::Nullary => 0,
        ArityClass::Unary if instruction.opcode == opcodes::IINC => {
            increment_arity(instruction, method)?
        }
        ArityClass::Unary => 1,
        ArityClass::Binary => 2,
        ArityClass::Ternary => 3,
        ArityClass::Quaternary => 4,
        ArityClass::Nary => nary_arity(instruction)?,
    };
    Ok(arity)
}

// An iinc on a parameter slot is read as loop control and consumes nothing. The
// adjusted slot is compared with the logical parameter count on purpose.
fn increment_arity(instruction: &Instruction, method: &Method) -> Result<usize> {
    let InstructionKind::Increment { slot, .. } = instruction.kind else {
        return Ok(1);
    };
    let signature = parse_signature(instruction, &method.descriptor)?;
    let argument = if method.is_instance() {
        slot as i64 - 1
    } else {
        slot as i64
    };
    if argument < signature.parameter_count() as i64 {
        Ok(0)
    } else {
        Ok(1)
    }
}

fn nary_arity(instruction: &Instruction) -> Result<usize> {
    match &instruction.kind {
        InstructionKind::Invoke(call) => {
            let signature = parse_signature(instruction, &call.descriptor)?;
            let receiver = usize::from(call.kind.has_receiver());
            Ok(signature.argument_slots() + receiver)
        }
        InstructionKind::MultiNewArray { dimensions, .. } => Ok(*dimensions as usize),
        _ => Ok(0),
    }
}

fn parse_signature(instruction: &Instruction, descriptor: &str) -> Result<MethodSignature> {
    MethodSignature::parse(descriptor).map_err(|reason| Error::Descriptor {
        index: instruction.index,
        offset: instruction.offset,
        opcode: opcodes::mnemonic(instruction.opcode),
        descriptor: descriptor.to_string(),
        reason,
    })
}

use thiserror::Error;

/// Errors raised while decoding or analyzing a single method.
///
/// Assembly and descriptor errors abort analysis of the method they belong to and
/// carry the instruction position so callers can report them. `Unrepresentable` is
/// only produced when rendering a node and never stops an analysis pass.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The node has no source-level rendering.
    #[error("[{index}: {opcode}] could not be expressed")]
    Unrepresentable { index: usize, opcode: &'static str },

    /// An instruction needs more operands than the working stack holds.
    #[error(
        "stack underflow at instruction {index} (offset {offset}, {opcode}): \
         requires {required} operands, {available} available"
    )]
    StackUnderflow {
        index: usize,
        offset: u32,
        opcode: &'static str,
        required: usize,
        available: usize,
    },

    /// A method descriptor needed for arity resolution could not be parsed.
    #[error(
        "invalid descriptor {descriptor:?} at instruction {index} (offset {offset}, {opcode}): {reason}"
    )]
    Descriptor {
        index: usize,
        offset: u32,
        opcode: &'static str,
        descriptor: String,
        reason: String,
    },

    /// Code bytes do not form a valid instruction stream.
    #[error("malformed bytecode at offset {offset}: {message}")]
    Decode { offset: u32, message: String },

    /// A pattern with the same name is already registered.
    #[error("nanopattern {name} is already registered")]
    DuplicatePattern { name: &'static str },
}

/// Result alias used across the analysis core.
pub type Result<T> = std::result::Result<T, Error>;

macro_rules! decode_error {
    ($offset:expr, $fmt:expr $(, $arg:expr)* $(,)?) => {
        crate::error::Error::Decode {
            offset: $offset as u32,
            message: format!($fmt $(, $arg)*),
        }
    };
}

pub(crate) use decode_error;

//! Expression-tree reconstruction and nanopattern classification for JVM methods.

mod error;

pub mod bytecode;
pub mod cfg;
pub mod classfile;
pub mod descriptor;
pub mod engine;
pub mod expr;
pub mod ir;
pub mod opcodes;
pub mod pattern;
pub mod report;
pub mod scan;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};

use anyhow::{Context, Result};
use jclassfile::attributes::{Attribute, ExceptionRecord};
use jclassfile::class_file;
use jclassfile::constant_pool::ConstantPool as PoolEntry;
use jclassfile::methods::{MethodFlags, MethodInfo};

use crate::bytecode::{ConstantPool, decode_instructions};
use crate::ir::{Class, Constant, ExceptionHandler, Method, MethodAccess};

/// Parse class file bytes into the analysis IR.
///
/// Methods whose code cannot be decoded are logged and left out; the rest of the
/// class is still returned.
pub fn parse_class(data: &[u8]) -> Result<Class> {
    let class_file = class_file::parse(data).context("invalid class file")?;
    let pool = ClassPool::new(class_file.constant_pool());
    let name = pool
        .class_name(class_file.this_class())
        .context("this_class does not name a class")?;
    let super_name = pool.class_name(class_file.super_class());

    let mut methods = Vec::with_capacity(class_file.methods().len());
    for info in class_file.methods() {
        match build_method(&name, info, &pool) {
            Ok(method) => methods.push(method),
            Err(err) => log::warn!("skipping method in {name}: {err:#}"),
        }
    }
    log::debug!("parsed {name} with {} methods", methods.len());

    Ok(Class {
        name,
        super_name,
        methods,
    })
}

fn build_method(owner: &str, info: &MethodInfo, pool: &ClassPool<'_>) -> Result<Method> {
    let name = pool
        .utf8(info.name_index())
        .context("method name is not a UTF-8 constant")?;
    let descriptor = pool
        .utf8(info.descriptor_index())
        .context("method descriptor is not a UTF-8 constant")?;
    let flags = info.access_flags();
    let access = MethodAccess {
        is_public: flags.contains(MethodFlags::ACC_PUBLIC),
        is_static: flags.contains(MethodFlags::ACC_STATIC),
        is_abstract: flags.contains(MethodFlags::ACC_ABSTRACT),
    };

    let mut instructions = Vec::new();
    let mut exception_handlers = Vec::new();
    for attribute in info.attributes() {
        if let Attribute::Code {
            code,
            exception_table,
            ..
        } = attribute
        {
            instructions = decode_instructions(code, pool)
                .with_context(|| format!("failed to decode {owner}.{name}{descriptor}"))?;
            exception_handlers = exception_table
                .iter()
                .map(|record| handler(record, pool))
                .collect();
        }
    }

    Ok(Method {
        owner: owner.to_string(),
        name,
        descriptor,
        access,
        instructions,
        exception_handlers,
    })
}

fn handler(record: &ExceptionRecord, pool: &ClassPool<'_>) -> ExceptionHandler {
    let catch_type = match record.catch_type() {
        0 => None,
        index => pool.class_name(index),
    };
    ExceptionHandler {
        start_pc: u32::from(record.start_pc()),
        end_pc: u32::from(record.end_pc()),
        handler_pc: u32::from(record.handler_pc()),
        catch_type,
    }
}

/// Constant pool of one parsed class, indexed the way the code bytes index it.
pub(crate) struct ClassPool<'a> {
    entries: &'a [PoolEntry],
}

impl<'a> ClassPool<'a> {
    pub(crate) fn new(entries: &'a [PoolEntry]) -> Self {
        Self { entries }
    }

    fn entry(&self, index: u16) -> Option<&'a PoolEntry> {
        self.entries.get(usize::from(index))
    }

    fn utf8(&self, index: u16) -> Option<String> {
        match self.entry(index)? {
            PoolEntry::Utf8 { value } => Some(value.clone()),
            _ => None,
        }
    }

    fn name_and_type(&self, index: u16) -> Option<(String, String)> {
        match self.entry(index)? {
            PoolEntry::NameAndType {
                name_index,
                descriptor_index,
            } => Some((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            _ => None,
        }
    }
}

impl ConstantPool for ClassPool<'_> {
    fn class_name(&self, index: u16) -> Option<String> {
        match self.entry(index)? {
            PoolEntry::Class { name_index } => self.utf8(*name_index),
            _ => None,
        }
    }

    fn member_ref(&self, index: u16) -> Option<(String, String, String)> {
        let (class_index, name_and_type_index) = match self.entry(index)? {
            PoolEntry::Fieldref {
                class_index,
                name_and_type_index,
            }
            | PoolEntry::Methodref {
                class_index,
                name_and_type_index,
            }
            | PoolEntry::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => (*class_index, *name_and_type_index),
            _ => return None,
        };
        let owner = self.class_name(class_index)?;
        let (name, descriptor) = self.name_and_type(name_and_type_index)?;
        Some((owner, name, descriptor))
    }

    fn invoke_dynamic(&self, index: u16) -> Option<(String, String)> {
        match self.entry(index)? {
            PoolEntry::InvokeDynamic {
                name_and_type_index,
                ..
            } => self.name_and_type(*name_and_type_index),
            _ => None,
        }
    }

    fn loadable(&self, index: u16) -> Option<Constant> {
        let constant = match self.entry(index)? {
            PoolEntry::Integer { value } => Constant::Int(*value),
            PoolEntry::Float { value } => Constant::Float(*value),
            PoolEntry::Long { value } => Constant::Long(*value),
            PoolEntry::Double { value } => Constant::Double(*value),
            PoolEntry::String { string_index } => Constant::String(self.utf8(*string_index)?),
            PoolEntry::Class { name_index } => Constant::Class(self.utf8(*name_index)?),
            PoolEntry::MethodHandle { .. } => {
                Constant::Other("Ljava/lang/invoke/MethodHandle;".to_string())
            }
            PoolEntry::MethodType { .. } => {
                Constant::Other("Ljava/lang/invoke/MethodType;".to_string())
            }
            PoolEntry::Dynamic {
                name_and_type_index,
                ..
            } => Constant::Other(self.name_and_type(*name_and_type_index)?.1),
            _ => return None,
        };
        Some(constant)
    }
}

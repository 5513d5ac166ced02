/// Intermediate representation for parsed JVM classes and methods.
#[derive(Clone, Debug)]
pub struct Class {
    pub name: String,
    pub super_name: Option<String>,
    pub methods: Vec<Method>,
}

/// Intermediate representation for a method and its decoded bytecode.
#[derive(Clone, Debug)]
pub struct Method {
    /// Internal name of the declaring class.
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub access: MethodAccess,
    pub instructions: Vec<Instruction>,
    pub exception_handlers: Vec<ExceptionHandler>,
}

impl Method {
    /// Qualified key, `owner.name+descriptor`.
    pub fn key(&self) -> String {
        format!("{}.{}{}", self.owner, self.name, self.descriptor)
    }

    /// Whether the method has an implicit receiver in local slot 0.
    pub fn is_instance(&self) -> bool {
        !self.access.is_static
    }

    /// Call sites in instruction order.
    pub fn calls(&self) -> impl Iterator<Item = &CallSite> {
        self.instructions.iter().filter_map(|inst| match &inst.kind {
            InstructionKind::Invoke(call) => Some(call),
            _ => None,
        })
    }

    /// Number of instructions matching the predicate.
    pub fn count(&self, predicate: impl Fn(&Instruction) -> bool) -> usize {
        self.instructions.iter().filter(|inst| predicate(inst)).count()
    }

    /// Call sites naming a concrete method; `invokedynamic` sites are left out.
    pub fn method_calls(&self) -> impl Iterator<Item = &CallSite> {
        self.calls().filter(|call| call.kind != CallKind::Dynamic)
    }

    /// Whether any method call site matches the predicate.
    pub fn calls_matching(&self, predicate: impl Fn(&CallSite) -> bool) -> bool {
        self.method_calls().any(predicate)
    }
}

/// Method access flags used for analysis.
#[derive(Clone, Copy, Debug, Default)]
pub struct MethodAccess {
    pub is_public: bool,
    pub is_static: bool,
    pub is_abstract: bool,
}

/// Exception handler metadata from the Code attribute.
#[derive(Clone, Debug)]
pub struct ExceptionHandler {
    pub start_pc: u32,
    pub end_pc: u32,
    pub handler_pc: u32,
    pub catch_type: Option<String>,
}

/// Bytecode instruction captured for analysis.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    /// Position in the method's linear instruction sequence.
    pub index: usize,
    /// Bytecode offset of the opcode byte.
    pub offset: u32,
    /// Opcode with `wide` folded into the widened instruction.
    pub opcode: u8,
    pub kind: InstructionKind,
}

/// Operands of a decoded instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum InstructionKind {
    Field(FieldRef),
    Invoke(CallSite),
    Constant(Constant),
    /// Local variable slot of a load, store or `ret`.
    Local(u16),
    Increment {
        slot: u16,
        delta: i16,
    },
    /// Absolute target offset of a branch, `goto` or `jsr`.
    Jump(u32),
    Switch {
        default: u32,
        targets: Vec<u32>,
    },
    /// Class operand of `new`, `anewarray`, `checkcast` and `instanceof`.
    Type(String),
    /// Primitive element type code of `newarray`.
    NewArray(u8),
    MultiNewArray {
        class: String,
        dimensions: u8,
    },
    Simple,
}

/// Field reference resolved from the constant pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

/// Call site extracted from bytecode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallSite {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub kind: CallKind,
    pub offset: u32,
}

/// Call opcode classification.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum CallKind {
    Virtual,
    Interface,
    Special,
    Static,
    Dynamic,
}

impl CallKind {
    /// Whether the call pops an object reference below its arguments.
    pub fn has_receiver(self) -> bool {
        matches!(self, CallKind::Virtual | CallKind::Interface | CallKind::Special)
    }
}

/// Literal pushed by a constant instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Null,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    /// Internal name of a class literal.
    Class(String),
    /// Method handles, method types and dynamic constants, carrying the static type
    /// descriptor.
    Other(String),
}

impl Constant {
    /// Static type descriptor of the literal.
    pub fn type_descriptor(&self) -> &str {
        match self {
            Constant::Null => "Ljava/lang/Object;",
            Constant::Int(_) => "I",
            Constant::Long(_) => "J",
            Constant::Float(_) => "F",
            Constant::Double(_) => "D",
            Constant::String(_) => "Ljava/lang/String;",
            Constant::Class(_) => "Ljava/lang/Class;",
            Constant::Other(descriptor) => descriptor,
        }
    }
}

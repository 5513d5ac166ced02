use std::collections::VecDeque;

use crate::expr::arity::ArityClass;
use crate::ir::{CallSite, Constant, FieldRef, Instruction, InstructionKind};
use crate::opcodes::{self, Category};

/// Index of a node inside its [`ExprTree`](crate::expr::ExprTree) arena.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node's instruction in the method.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Arithmetic and bitwise binary operators.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MathOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    Ushr,
    And,
    Or,
    Xor,
}

impl MathOp {
    pub fn of(opcode: u8) -> Option<Self> {
        use opcodes::*;

        let op = match opcode {
            IADD..=DADD => Self::Add,
            ISUB..=DSUB => Self::Sub,
            IMUL..=DMUL => Self::Mul,
            IDIV..=DDIV => Self::Div,
            IREM..=DREM => Self::Rem,
            ISHL | LSHL => Self::Shl,
            ISHR | LSHR => Self::Shr,
            IUSHR | LUSHR => Self::Ushr,
            IAND | LAND => Self::And,
            IOR | LOR => Self::Or,
            IXOR | LXOR => Self::Xor,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Ushr => ">>>",
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
        }
    }
}

/// Relation tested by a conditional branch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl Comparison {
    /// Relation of a conditional branch opcode, single- or two-valued.
    pub fn of(opcode: u8) -> Option<Self> {
        use opcodes::*;

        let comparison = match opcode {
            IFEQ | IF_ICMPEQ | IF_ACMPEQ | IFNULL => Self::Eq,
            IFNE | IF_ICMPNE | IF_ACMPNE | IFNONNULL => Self::Ne,
            IFLT | IF_ICMPLT => Self::Lt,
            IFGE | IF_ICMPGE => Self::Ge,
            IFGT | IF_ICMPGT => Self::Gt,
            IFLE | IF_ICMPLE => Self::Le,
            _ => return None,
        };
        Some(comparison)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Gt => ">",
            Self::Le => "<=",
        }
    }
}

/// Implicit right-hand side of a single-value branch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BranchOperand {
    Zero,
    Null,
}

/// Read or write of an instance or static field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldAccess<'a> {
    field: &'a FieldRef,
    getter: bool,
    is_static: bool,
}

impl<'a> FieldAccess<'a> {
    pub fn field(&self) -> &'a FieldRef {
        self.field
    }

    /// `getfield` or `getstatic`.
    pub fn is_getter(&self) -> bool {
        self.getter
    }

    /// `putfield` or `putstatic`.
    pub fn is_putter(&self) -> bool {
        !self.getter
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Grouping key, `owner.name`.
    pub fn key(&self) -> String {
        format!("{}.{}", self.field.owner, self.field.name)
    }
}

/// Specialized payload of an expression node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeKind<'a> {
    Field(FieldAccess<'a>),
    Call(&'a CallSite),
    Constant(&'a Constant),
    Math(MathOp),
    /// Two-value conditional branch.
    CompareBranch {
        comparison: Comparison,
        target: u32,
    },
    /// Single-value conditional branch against zero or null.
    Branch {
        comparison: Comparison,
        operand: BranchOperand,
        target: u32,
    },
    /// `goto` and `jsr`.
    Jump {
        target: u32,
    },
    VarLoad(u16),
    VarStore(u16),
    /// `ret`.
    Var(u16),
    Basic,
}

/// Reconstructed counterpart of one instruction.
#[derive(Clone, Debug)]
pub struct ExprNode<'a> {
    instruction: &'a Instruction,
    arity: ArityClass,
    operand_count: usize,
    kind: NodeKind<'a>,
    children: VecDeque<NodeId>,
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

impl<'a> ExprNode<'a> {
    pub fn instruction(&self) -> &'a Instruction {
        self.instruction
    }

    pub fn opcode(&self) -> u8 {
        self.instruction.opcode
    }

    pub fn arity(&self) -> ArityClass {
        self.arity
    }

    /// Operand count resolved when the node was built.
    pub fn operand_count(&self) -> usize {
        self.operand_count
    }

    pub fn kind(&self) -> &NodeKind<'a> {
        &self.kind
    }

    /// Operand expressions in the order the instruction consumes them.
    pub fn children(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.children.iter().copied()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Node of the preceding instruction in the flat sequence.
    pub fn left(&self) -> Option<NodeId> {
        self.left
    }

    /// Node of the following instruction in the flat sequence.
    pub fn right(&self) -> Option<NodeId> {
        self.right
    }

    pub fn as_field(&self) -> Option<&FieldAccess<'a>> {
        match &self.kind {
            NodeKind::Field(access) => Some(access),
            _ => None,
        }
    }

    /// Children are popped newest first, so each one goes to the front.
    pub(crate) fn add_child(&mut self, child: NodeId) {
        debug_assert!(self.children.len() < self.operand_count);
        self.children.push_front(child);
    }

    pub(crate) fn set_parent(&mut self, parent: NodeId) {
        debug_assert!(self.parent.is_none());
        self.parent = Some(parent);
    }

    pub(crate) fn set_left(&mut self, left: Option<NodeId>) {
        self.left = left;
    }

    pub(crate) fn set_right(&mut self, right: Option<NodeId>) {
        self.right = right;
    }
}

/// Build the node variant for `instruction`.
///
/// Never fails: an opcode without a specialized variant, or operands that do not
/// match the opcode, produce a [`NodeKind::Basic`] node.
pub fn make_node(instruction: &Instruction, arity: ArityClass, operand_count: usize) -> ExprNode<'_> {
    ExprNode {
        instruction,
        arity,
        operand_count,
        kind: node_kind(instruction),
        children: VecDeque::with_capacity(operand_count),
        parent: None,
        left: None,
        right: None,
    }
}

fn node_kind(instruction: &Instruction) -> NodeKind<'_> {
    let Some(category) = Category::of(instruction.opcode) else {
        return NodeKind::Basic;
    };
    let opcode = instruction.opcode;
    let kind = match (category, &instruction.kind) {
        (
            Category::StaticRead
            | Category::InstanceRead
            | Category::StaticWrite
            | Category::InstanceWrite,
            InstructionKind::Field(field),
        ) => Some(NodeKind::Field(FieldAccess {
            field,
            getter: matches!(category, Category::StaticRead | Category::InstanceRead),
            is_static: matches!(category, Category::StaticRead | Category::StaticWrite),
        })),
        (Category::Invoke, InstructionKind::Invoke(call)) => Some(NodeKind::Call(call)),
        (Category::Constant, InstructionKind::Constant(constant)) => {
            Some(NodeKind::Constant(constant))
        }
        (Category::Arithmetic, _) => MathOp::of(opcode).map(NodeKind::Math),
        (Category::CompareBranch, InstructionKind::Jump(target)) => {
            Comparison::of(opcode).map(|comparison| NodeKind::CompareBranch {
                comparison,
                target: *target,
            })
        }
        (Category::Branch, InstructionKind::Jump(target)) => {
            let operand = if matches!(opcode, opcodes::IFNULL | opcodes::IFNONNULL) {
                BranchOperand::Null
            } else {
                BranchOperand::Zero
            };
            Comparison::of(opcode).map(|comparison| NodeKind::Branch {
                comparison,
                operand,
                target: *target,
            })
        }
        (Category::Jump | Category::Subroutine, InstructionKind::Jump(target)) => {
            Some(NodeKind::Jump { target: *target })
        }
        (Category::LocalLoad, InstructionKind::Local(slot)) => Some(NodeKind::VarLoad(*slot)),
        (Category::LocalStore, InstructionKind::Local(slot)) => Some(NodeKind::VarStore(*slot)),
        (Category::SubroutineReturn, InstructionKind::Local(slot)) => Some(NodeKind::Var(*slot)),
        (
            Category::StaticRead
            | Category::InstanceRead
            | Category::StaticWrite
            | Category::InstanceWrite
            | Category::Invoke
            | Category::Constant
            | Category::CompareBranch
            | Category::Branch
            | Category::Jump
            | Category::Subroutine
            | Category::LocalLoad
            | Category::LocalStore
            | Category::SubroutineReturn
            | Category::Nop
            | Category::ArrayLoad
            | Category::ArrayStore
            | Category::Pop
            | Category::Duplicate
            | Category::Negate
            | Category::Increment
            | Category::Conversion
            | Category::Comparison
            | Category::Switch
            | Category::ValueReturn
            | Category::VoidReturn
            | Category::New
            | Category::NewArray
            | Category::MultiNewArray
            | Category::ArrayLength
            | Category::Throw
            | Category::TypeCheck
            | Category::Monitor
            | Category::Wide,
            _,
        ) => None,
    };
    kind.unwrap_or(NodeKind::Basic)
}

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::error::{Error, Result};
use crate::expr::arity::{ArityClass, resolve_arity};
use crate::expr::node::{ExprNode, NodeId, NodeKind, make_node};
use crate::ir::{CallKind, Constant, Instruction, InstructionKind, Method};
use crate::opcodes;

/// Expression forest of one method, stored as an arena of nodes.
///
/// Node `i` is the expression built from instruction `i`. Children are owned by the
/// arena and referenced by index; parent and neighbour links are plain indices.
#[derive(Clone, Debug)]
pub struct ExprTree<'a> {
    method: &'a Method,
    nodes: Vec<ExprNode<'a>>,
    roots: Vec<NodeId>,
}

impl<'a> ExprTree<'a> {
    /// Reduce the method's instruction stream into expression trees.
    ///
    /// Every node is pushed onto a working stack after taking its operands from the
    /// top of it; whatever is left at the end forms the roots, bottom first.
    pub fn assemble(method: &'a Method) -> Result<Self> {
        let mut nodes: Vec<ExprNode<'a>> = Vec::with_capacity(method.instructions.len());
        let mut stack: Vec<NodeId> = Vec::new();

        for instruction in &method.instructions {
            let operands = resolve_arity(instruction, method)?;
            if operands > stack.len() {
                return Err(Error::StackUnderflow {
                    index: instruction.index,
                    offset: instruction.offset,
                    opcode: opcodes::mnemonic(instruction.opcode),
                    required: operands,
                    available: stack.len(),
                });
            }

            let id = NodeId(nodes.len());
            let mut node = make_node(instruction, ArityClass::of(instruction.opcode), operands);
            let start = stack.len() - operands;
            for child in stack.drain(start..).rev() {
                node.add_child(child);
                nodes[child.0].set_parent(id);
            }
            nodes.push(node);
            stack.push(id);
        }

        let count = nodes.len();
        for (position, node) in nodes.iter_mut().enumerate() {
            node.set_left(position.checked_sub(1).map(NodeId));
            node.set_right((position + 1 < count).then_some(NodeId(position + 1)));
        }

        log::debug!(
            "assembled {} nodes into {} roots for {}",
            count,
            stack.len(),
            method.key()
        );
        Ok(Self {
            method,
            nodes,
            roots: stack,
        })
    }

    pub fn method(&self) -> &'a Method {
        self.method
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Statement-level expressions, in the order they were produced.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this tree.
    pub fn node(&self, id: NodeId) -> &ExprNode<'a> {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&ExprNode<'a>> {
        self.nodes.get(id.0)
    }

    /// Nodes in original instruction order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ExprNode<'a>)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(position, node)| (NodeId(position), node))
    }

    pub fn children(&self, id: NodeId) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.node(id).children()
    }

    /// Child nodes of `id` in forward operand order.
    pub fn operands(&self, id: NodeId) -> Vec<&ExprNode<'a>> {
        self.children(id).map(|child| self.node(child)).collect()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent()
    }

    pub fn left(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).left()
    }

    pub fn right(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).right()
    }

    /// Subtree of `id` in consumption order: operands first, then the node itself.
    pub fn postorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut pending = vec![(id, false)];
        while let Some((id, expanded)) = pending.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            pending.push((id, true));
            pending.extend(self.children(id).rev().map(|child| (child, false)));
        }
        order
    }

    /// Field-access nodes sharing the `owner.name` key, in instruction order.
    pub fn field_accesses(&self, key: &str) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, node)| node.as_field().is_some_and(|access| access.key() == key))
            .map(|(id, _)| id)
            .collect()
    }

    /// All field-access nodes grouped by `owner.name` key.
    pub fn field_index(&self) -> BTreeMap<String, Vec<NodeId>> {
        let mut index: BTreeMap<String, Vec<NodeId>> = BTreeMap::new();
        for (id, node) in self.iter() {
            if let Some(access) = node.as_field() {
                index.entry(access.key()).or_default().push(id);
            }
        }
        index
    }

    /// Indented dump of the subtree rooted at `id`, one node per line.
    pub fn outline(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut pending = vec![(id, 0usize)];
        while let Some((id, depth)) = pending.pop() {
            let node = self.node(id);
            let _ = writeln!(
                out,
                "{}{} ({})",
                "  ".repeat(depth),
                describe(node.instruction()),
                node.arity().label()
            );
            pending.extend(self.children(id).rev().map(|child| (child, depth + 1)));
        }
        out
    }

    /// Render the subtree rooted at `id` as a source-like expression.
    ///
    /// Only constants, locals, field accesses, arithmetic and calls have a rendering;
    /// anything else yields [`Error::Unrepresentable`].
    pub fn decompile(&self, id: NodeId) -> Result<String> {
        let mut values: Vec<String> = Vec::new();
        for id in self.postorder(id) {
            let operands = values.split_off(values.len() - self.node(id).children().count());
            values.push(self.render(id, &operands)?);
        }
        Ok(values.pop().unwrap_or_default())
    }

    // Operands arrive already rendered, in forward order.
    fn render(&self, id: NodeId, operands: &[String]) -> Result<String> {
        let node = self.node(id);
        let rendered = match (node.kind(), operands) {
            (NodeKind::Constant(constant), []) => literal(constant),
            (NodeKind::VarLoad(slot), []) => Some(self.local_name(*slot)),
            (NodeKind::VarStore(slot), [value]) => {
                Some(format!("{} = {value}", self.local_name(*slot)))
            }
            (NodeKind::Field(access), _) => {
                let field = access.field();
                match (access.is_getter(), operands) {
                    (true, []) => Some(format!("{}.{}", simple_name(&field.owner), field.name)),
                    (true, [object]) => Some(format!("{object}.{}", field.name)),
                    (false, [value]) => Some(format!(
                        "{}.{} = {value}",
                        simple_name(&field.owner),
                        field.name
                    )),
                    (false, [object, value]) => Some(format!("{object}.{} = {value}", field.name)),
                    _ => None,
                }
            }
            (NodeKind::Math(op), [lhs, rhs]) => Some(format!("({lhs} {} {rhs})", op.symbol())),
            (NodeKind::Call(call), _) => match call.kind {
                CallKind::Dynamic => Some(format!("{}({})", call.name, operands.join(", "))),
                kind if kind.has_receiver() => operands.split_first().map(|(receiver, args)| {
                    format!("{receiver}.{}({})", call.name, args.join(", "))
                }),
                _ => Some(format!(
                    "{}.{}({})",
                    simple_name(&call.owner),
                    call.name,
                    operands.join(", ")
                )),
            },
            _ => None,
        };

        rendered.ok_or_else(|| Error::Unrepresentable {
            index: node.instruction().index,
            opcode: opcodes::mnemonic(node.opcode()),
        })
    }

    fn local_name(&self, slot: u16) -> String {
        if slot == 0 && self.method.is_instance() {
            "this".to_string()
        } else {
            format!("var{slot}")
        }
    }
}

fn literal(constant: &Constant) -> Option<String> {
    let text = match constant {
        Constant::Null => "null".to_string(),
        Constant::Int(value) => value.to_string(),
        Constant::Long(value) => format!("{value}L"),
        Constant::Float(value) => format!("{value:?}f"),
        Constant::Double(value) => format!("{value:?}"),
        Constant::String(value) => format!("{value:?}"),
        Constant::Class(name) => format!("{}.class", name.replace('/', ".")),
        Constant::Other(_) => return None,
    };
    Some(text)
}

fn simple_name(internal: &str) -> &str {
    internal.rsplit('/').next().unwrap_or(internal)
}

/// Mnemonic followed by a short operand summary.
pub fn describe(instruction: &Instruction) -> String {
    let mnemonic = opcodes::mnemonic(instruction.opcode);
    match &instruction.kind {
        InstructionKind::Field(field) => {
            format!("{mnemonic} {}.{} {}", field.owner, field.name, field.descriptor)
        }
        InstructionKind::Invoke(call) if call.kind == CallKind::Dynamic => {
            format!("{mnemonic} {}{}", call.name, call.descriptor)
        }
        InstructionKind::Invoke(call) => {
            format!("{mnemonic} {}.{}{}", call.owner, call.name, call.descriptor)
        }
        InstructionKind::Constant(constant) => match literal(constant) {
            Some(text) => format!("{mnemonic} {text}"),
            None => format!("{mnemonic} <{}>", constant.type_descriptor()),
        },
        InstructionKind::Local(slot) => format!("{mnemonic} {slot}"),
        InstructionKind::Increment { slot, delta } => format!("{mnemonic} {slot} {delta}"),
        InstructionKind::Jump(target) => format!("{mnemonic} -> {target}"),
        InstructionKind::Switch { default, targets } => {
            format!("{mnemonic} {targets:?} default -> {default}")
        }
        InstructionKind::Type(class) => format!("{mnemonic} {class}"),
        InstructionKind::NewArray(element) => format!("{mnemonic} {element}"),
        InstructionKind::MultiNewArray { class, dimensions } => {
            format!("{mnemonic} {class} {dimensions}")
        }
        InstructionKind::Simple => mnemonic.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::*;
    use crate::test_support::{OWNER, field, int, invoke, local, method, op, static_method};

    fn opcodes_of(tree: &ExprTree<'_>, ids: &[NodeId]) -> Vec<u8> {
        ids.iter().map(|id| tree.node(*id).opcode()).collect()
    }

    #[test]
    fn operands_attach_in_forward_order() {
        // this.total = this.count * 2 + 1
        let method = method(
            "update",
            "()V",
            vec![
                local(ALOAD_0, 0),
                local(ALOAD_0, 0),
                field(GETFIELD, OWNER, "count", "I"),
                int(2),
                op(IMUL),
                int(1),
                op(IADD),
                field(PUTFIELD, OWNER, "total", "I"),
                op(RETURN),
            ],
        );

        let tree = ExprTree::assemble(&method).expect("assemble");

        assert_eq!(tree.len(), 9);
        assert_eq!(tree.roots(), &[NodeId(7), NodeId(8)]);
        let put = tree.roots()[0];
        let put_children: Vec<NodeId> = tree.children(put).collect();
        assert_eq!(put_children, vec![NodeId(0), NodeId(6)]);
        let add_children: Vec<NodeId> = tree.children(NodeId(6)).collect();
        assert_eq!(add_children, vec![NodeId(4), NodeId(5)]);
        let mul_operands: Vec<u8> = tree
            .operands(NodeId(4))
            .iter()
            .map(|node| node.opcode())
            .collect();
        assert_eq!(mul_operands, vec![GETFIELD, BIPUSH]);
        assert_eq!(tree.parent(NodeId(2)), Some(NodeId(4)));
        assert_eq!(tree.parent(put), None);
        assert_eq!(
            tree.decompile(put).expect("render"),
            "this.total = ((this.count * 2) + 1)"
        );
    }

    #[test]
    fn straight_line_postorder_reproduces_instruction_order() {
        let method = static_method(
            "compute",
            "(II)I",
            vec![
                local(ILOAD_0, 0),
                local(ILOAD_1, 1),
                invoke(INVOKESTATIC, "java/lang/Math", "max", "(II)I"),
                local(ILOAD_0, 0),
                op(ISUB),
                local(ISTORE_2, 2),
                local(ILOAD_2, 2),
                local(ILOAD_1, 1),
                op(IMUL),
                op(IRETURN),
            ],
        );

        let tree = ExprTree::assemble(&method).expect("assemble");

        let flattened: Vec<u8> = tree
            .roots()
            .iter()
            .flat_map(|root| opcodes_of(&tree, &tree.postorder(*root)))
            .collect();
        let original: Vec<u8> = method.instructions.iter().map(|inst| inst.opcode).collect();
        assert_eq!(flattened, original);
        assert_eq!(tree.roots().len(), 2);
        assert_eq!(
            tree.decompile(tree.roots()[0]).expect("render"),
            "var2 = (Math.max(var0, var1) - var0)"
        );
    }

    #[test]
    fn neighbour_links_follow_instruction_sequence() {
        let method = method(
            "touch",
            "()V",
            vec![local(ALOAD_0, 0), field(GETFIELD, OWNER, "count", "I"), op(POP), op(RETURN)],
        );

        let tree = ExprTree::assemble(&method).expect("assemble");

        let mut walked = Vec::new();
        let mut cursor = Some(NodeId(0));
        while let Some(id) = cursor {
            walked.push(tree.node(id).instruction().index);
            cursor = tree.right(id);
        }
        assert_eq!(walked, vec![0, 1, 2, 3]);
        assert_eq!(tree.left(NodeId(0)), None);
        assert_eq!(tree.left(NodeId(3)), Some(NodeId(2)));
        for (id, node) in tree.iter() {
            assert!(node.child_count() <= node.operand_count(), "{id:?}");
        }
    }

    #[test]
    fn stack_underflow_is_fatal() {
        let method = method("broken", "()I", vec![op(IADD), op(IRETURN)]);

        let err = ExprTree::assemble(&method).expect_err("underflow");

        assert_eq!(
            err,
            Error::StackUnderflow {
                index: 0,
                offset: 0,
                opcode: "iadd",
                required: 2,
                available: 0,
            }
        );
    }

    #[test]
    fn underflow_reports_available_operands() {
        let method = method("broken", "()V", vec![int(1), op(IASTORE)]);

        let err = ExprTree::assemble(&method).expect_err("underflow");

        assert!(matches!(
            err,
            Error::StackUnderflow {
                index: 1,
                required: 3,
                available: 1,
                ..
            }
        ));
    }

    #[test]
    fn parameter_increment_starts_a_new_root() {
        let method = method(
            "countdown",
            "(I)V",
            vec![
                crate::test_support::op_with(
                    IINC,
                    InstructionKind::Increment { slot: 1, delta: -1 },
                ),
                op(RETURN),
            ],
        );

        let tree = ExprTree::assemble(&method).expect("assemble");

        assert_eq!(tree.roots(), &[NodeId(0), NodeId(1)]);
        assert_eq!(tree.node(NodeId(0)).operand_count(), 0);
    }

    #[test]
    fn field_accesses_are_indexed_by_key() {
        let method = method(
            "swap",
            "()V",
            vec![
                local(ALOAD_0, 0),
                local(ALOAD_0, 0),
                field(GETFIELD, OWNER, "right", "I"),
                field(PUTFIELD, OWNER, "left", "I"),
                local(ALOAD_0, 0),
                field(GETFIELD, OWNER, "left", "I"),
                op(POP),
                op(RETURN),
            ],
        );

        let tree = ExprTree::assemble(&method).expect("assemble");

        assert_eq!(
            tree.field_accesses("com/example/App.left"),
            vec![NodeId(3), NodeId(5)]
        );
        let index = tree.field_index();
        assert_eq!(index.len(), 2);
        assert_eq!(index["com/example/App.right"], vec![NodeId(2)]);
    }

    #[test]
    fn unrepresentable_nodes_fail_recoverably() {
        let method = method(
            "guard",
            "()V",
            vec![local(ALOAD_0, 0), op(MONITORENTER), int(3), op(POP), op(RETURN)],
        );

        let tree = ExprTree::assemble(&method).expect("assemble");

        assert_eq!(
            tree.decompile(NodeId(1)),
            Err(Error::Unrepresentable {
                index: 1,
                opcode: "monitorenter"
            })
        );
        assert_eq!(tree.decompile(NodeId(2)).expect("constant"), "3");
        assert!(tree.decompile(NodeId(4)).is_err());
    }

    #[test]
    fn outline_shows_nesting_and_arity() {
        let method = method(
            "size",
            "()I",
            vec![
                local(ALOAD_0, 0),
                invoke(INVOKEVIRTUAL, OWNER, "items", "()[I"),
                op(ARRAYLENGTH),
                op(IRETURN),
            ],
        );

        let tree = ExprTree::assemble(&method).expect("assemble");

        assert_eq!(
            tree.outline(tree.roots()[0]),
            "ireturn (unary)\n  arraylength (unary)\n    invokevirtual com/example/App.items()[I (nary)\n      aload_0 0 (nullary)\n"
        );
    }

    #[test]
    fn deep_builder_chains_do_not_exhaust_the_stack() {
        let depth = 20_000;
        let mut instructions = vec![local(ALOAD_0, 0)];
        instructions.extend(
            (0..depth).map(|_| invoke(INVOKEVIRTUAL, OWNER, "next", "()Lcom/example/App;")),
        );
        let method = method("build", "()Lcom/example/App;", instructions);

        let tree = ExprTree::assemble(&method).expect("assemble");

        assert_eq!(tree.roots(), &[NodeId(depth)]);
        let order = tree.postorder(NodeId(depth));
        assert_eq!(order.len(), depth + 1);
        assert_eq!(order.first(), Some(&NodeId(0)));
        let source = tree.decompile(NodeId(depth)).expect("decompile");
        assert!(source.starts_with("this.next().next()"));
        assert_eq!(source.matches(".next()").count(), depth);
        assert_eq!(tree.outline(NodeId(2_000)).lines().count(), 2_001);
    }

    #[test]
    fn every_child_points_back_to_its_parent() {
        let method = method(
            "mix",
            "(II)I",
            vec![
                local(ILOAD_1, 1),
                local(ILOAD_2, 2),
                op(IMUL),
                local(ISTORE_3, 3),
                local(ILOAD_3, 3),
                int(4),
                op(IADD),
                op(IRETURN),
            ],
        );

        let tree = ExprTree::assemble(&method).expect("assemble");

        for (id, _) in tree.iter() {
            for child in tree.children(id) {
                assert_eq!(tree.parent(child), Some(id));
            }
        }
        for root in tree.roots() {
            assert_eq!(tree.parent(*root), None);
        }
    }
}

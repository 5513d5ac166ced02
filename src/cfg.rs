use std::collections::BTreeSet;

use crate::ir::{Instruction, InstructionKind, Method};
use crate::opcodes;

/// Basic block graph for method bytecode.
#[derive(Clone, Debug)]
pub struct ControlFlowGraph {
    pub blocks: Vec<BasicBlock>,
    pub edges: Vec<FlowEdge>,
}

/// Basic block covering a contiguous run of instructions.
#[derive(Clone, Debug)]
pub struct BasicBlock {
    pub start_offset: u32,
    pub end_offset: u32,
    /// Indices into the method's instruction sequence.
    pub instructions: Vec<usize>,
}

/// Edge between basic blocks, keyed by block start offsets.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FlowEdge {
    pub from: u32,
    pub to: u32,
    pub kind: EdgeKind,
}

/// Edge classification used for CFG inspection.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum EdgeKind {
    FallThrough,
    Branch,
    Exception,
}

impl ControlFlowGraph {
    /// Branch edges whose target block starts at or before the source block.
    pub fn back_edges(&self) -> impl Iterator<Item = &FlowEdge> {
        self.edges
            .iter()
            .filter(|edge| edge.kind == EdgeKind::Branch && edge.to <= edge.from)
    }
}

/// Build a control flow graph from a method's decoded instructions.
pub fn build_cfg(method: &Method) -> ControlFlowGraph {
    let instructions = &method.instructions;
    let Some(last) = instructions.last() else {
        return ControlFlowGraph {
            blocks: Vec::new(),
            edges: Vec::new(),
        };
    };
    let code_end = last.offset + 1;

    let mut leaders = BTreeSet::new();
    leaders.insert(0u32);
    for handler in &method.exception_handlers {
        leaders.insert(handler.handler_pc);
    }
    for (position, inst) in instructions.iter().enumerate() {
        let next = instructions.get(position + 1).map(|next| next.offset);
        if let Some(targets) = branch_targets(inst) {
            leaders.extend(targets);
            leaders.extend(next);
        }
        if is_exit_opcode(inst.opcode) {
            leaders.extend(next);
        }
    }

    let leader_list: Vec<u32> = leaders
        .into_iter()
        .filter(|offset| *offset < code_end)
        .collect();

    let mut blocks = Vec::new();
    for (position, start) in leader_list.iter().enumerate() {
        let end = leader_list.get(position + 1).copied().unwrap_or(code_end);
        let block_instructions: Vec<usize> = instructions
            .iter()
            .filter(|inst| inst.offset >= *start && inst.offset < end)
            .map(|inst| inst.index)
            .collect();
        if block_instructions.is_empty() {
            continue;
        }
        blocks.push(BasicBlock {
            start_offset: *start,
            end_offset: end,
            instructions: block_instructions,
        });
    }

    let mut edges = Vec::new();
    for block in &blocks {
        let Some(last_inst) = block
            .instructions
            .last()
            .and_then(|index| instructions.get(*index))
        else {
            continue;
        };
        if let Some(targets) = branch_targets(last_inst) {
            for target in targets {
                edges.push(FlowEdge {
                    from: block.start_offset,
                    to: target,
                    kind: EdgeKind::Branch,
                });
            }
            if !is_unconditional_branch(last_inst.opcode) {
                if let Some(next) = next_block_start(&blocks, block.end_offset) {
                    edges.push(FlowEdge {
                        from: block.start_offset,
                        to: next,
                        kind: EdgeKind::FallThrough,
                    });
                }
            }
        } else if !is_exit_opcode(last_inst.opcode) {
            if let Some(next) = next_block_start(&blocks, block.end_offset) {
                edges.push(FlowEdge {
                    from: block.start_offset,
                    to: next,
                    kind: EdgeKind::FallThrough,
                });
            }
        }
    }
    for handler in &method.exception_handlers {
        for block in &blocks {
            if block.start_offset >= handler.start_pc && block.start_offset < handler.end_pc {
                edges.push(FlowEdge {
                    from: block.start_offset,
                    to: handler.handler_pc,
                    kind: EdgeKind::Exception,
                });
            }
        }
    }

    ControlFlowGraph { blocks, edges }
}

fn next_block_start(blocks: &[BasicBlock], offset: u32) -> Option<u32> {
    blocks
        .iter()
        .find(|block| block.start_offset == offset)
        .map(|block| block.start_offset)
}

/// Jump and switch instructions, the ones that end a straight-line run.
pub fn is_branching(inst: &Instruction) -> bool {
    branch_targets(inst).is_some()
}

fn branch_targets(inst: &Instruction) -> Option<Vec<u32>> {
    match &inst.kind {
        InstructionKind::Jump(target) => Some(vec![*target]),
        InstructionKind::Switch { default, targets } => {
            let mut all = Vec::with_capacity(targets.len() + 1);
            all.push(*default);
            all.extend(targets.iter().copied());
            Some(all)
        }
        _ => None,
    }
}

fn is_exit_opcode(opcode: u8) -> bool {
    matches!(
        opcode,
        opcodes::IRETURN
            | opcodes::LRETURN
            | opcodes::FRETURN
            | opcodes::DRETURN
            | opcodes::ARETURN
            | opcodes::RETURN
            | opcodes::ATHROW
            | opcodes::RET
    )
}

fn is_unconditional_branch(opcode: u8) -> bool {
    matches!(
        opcode,
        opcodes::GOTO | opcodes::JSR | opcodes::GOTO_W | opcodes::JSR_W
    )
}

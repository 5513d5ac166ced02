use crate::cfg::{build_cfg, is_branching};
use crate::descriptor::{MethodSignature, returns_type};
use crate::ir::Method;
use crate::opcodes;
use crate::pattern::{NanoPattern, PatternCategory};

/// Built-in method-scope patterns, in match order.
pub(super) const PATTERNS: [NanoPattern; 9] = [
    NanoPattern::method(
        "NoParams",
        PatternCategory::Calling,
        "Takes no arguments",
        no_params,
    ),
    NanoPattern::method(
        "NoReturn",
        PatternCategory::Calling,
        "Returns void",
        no_return,
    ),
    NanoPattern::method(
        "Chained",
        PatternCategory::Calling,
        "Instance method returning its own declaring type",
        chained,
    ),
    NanoPattern::method(
        "Recursive",
        PatternCategory::Calling,
        "Calls itself",
        recursive,
    ),
    NanoPattern::method(
        "SameName",
        PatternCategory::Calling,
        "Calls another method with the same name",
        same_name,
    ),
    NanoPattern::method(
        "Leaf",
        PatternCategory::Calling,
        "Makes no method calls",
        leaf,
    ),
    NanoPattern::method(
        "StraightLine",
        PatternCategory::ControlFlow,
        "Contains no branches or switches",
        straight_line,
    ),
    NanoPattern::method(
        "Looping",
        PatternCategory::ControlFlow,
        "Contains a loop",
        looping,
    ),
    NanoPattern::method(
        "Exceptions",
        PatternCategory::ControlFlow,
        "Catches or throws exceptions",
        exceptions,
    ),
];

fn no_params(method: &Method) -> bool {
    MethodSignature::parse(&method.descriptor).is_ok_and(|sig| sig.parameter_count() == 0)
}

fn no_return(method: &Method) -> bool {
    MethodSignature::parse(&method.descriptor).is_ok_and(|sig| sig.returns_void())
}

fn chained(method: &Method) -> bool {
    method.is_instance() && returns_type(&method.descriptor, &method.owner)
}

fn recursive(method: &Method) -> bool {
    method.calls_matching(|call| {
        call.owner == method.owner && call.name == method.name && call.descriptor == method.descriptor
    })
}

fn same_name(method: &Method) -> bool {
    method.calls_matching(|call| {
        call.name == method.name
            && (call.owner != method.owner || call.descriptor != method.descriptor)
    })
}

fn leaf(method: &Method) -> bool {
    method.method_calls().next().is_none()
}

fn straight_line(method: &Method) -> bool {
    !method.instructions.iter().any(is_branching)
}

fn looping(method: &Method) -> bool {
    build_cfg(method).back_edges().next().is_some()
}

fn exceptions(method: &Method) -> bool {
    !method.exception_handlers.is_empty()
        || method.count(|inst| inst.opcode == opcodes::ATHROW) > 0
}

use std::str::FromStr;

use jdescriptor::{MethodDescriptor, TypeDescriptor};

/// Parsed view of a method descriptor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MethodSignature {
    parameter_count: usize,
    argument_slots: usize,
    returns_void: bool,
}

impl MethodSignature {
    /// Parse a method descriptor such as `(IJ)Ljava/lang/String;`.
    pub fn parse(descriptor: &str) -> Result<Self, String> {
        let parsed = MethodDescriptor::from_str(descriptor).map_err(|err| format!("{err:?}"))?;
        let parameters = parsed.parameter_types();
        Ok(Self {
            parameter_count: parameters.len(),
            argument_slots: parameters.iter().map(slot_size).sum(),
            returns_void: matches!(parsed.return_type(), TypeDescriptor::Void),
        })
    }

    /// Number of declared formal parameters.
    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    /// Stack slots taken by the arguments; `long` and `double` take two.
    pub fn argument_slots(&self) -> usize {
        self.argument_slots
    }

    pub fn returns_void(&self) -> bool {
        self.returns_void
    }
}

fn slot_size(ty: &TypeDescriptor) -> usize {
    match ty {
        TypeDescriptor::Long | TypeDescriptor::Double => 2,
        _ => 1,
    }
}

/// Whether `descriptor` returns an instance of `owner` (an internal class name).
pub fn returns_type(descriptor: &str, owner: &str) -> bool {
    descriptor
        .rsplit_once(')')
        .and_then(|(_, ret)| ret.strip_prefix('L'))
        .and_then(|ret| ret.strip_suffix(';'))
        .is_some_and(|ret| ret == owner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_parameters_and_slots() {
        let signature = MethodSignature::parse("(IJLjava/lang/String;D[J)V").expect("parse");

        assert_eq!(signature.parameter_count(), 5);
        assert_eq!(signature.argument_slots(), 7);
        assert!(signature.returns_void());
    }

    #[test]
    fn non_void_return_is_detected() {
        let signature = MethodSignature::parse("()Ljava/lang/Object;").expect("parse");

        assert_eq!(signature.parameter_count(), 0);
        assert_eq!(signature.argument_slots(), 0);
        assert!(!signature.returns_void());
    }

    #[test]
    fn malformed_descriptor_is_rejected() {
        assert!(MethodSignature::parse("not a descriptor").is_err());
        assert!(MethodSignature::parse("").is_err());
    }

    #[test]
    fn return_type_matches_owner() {
        assert!(returns_type("(I)Lcom/example/Builder;", "com/example/Builder"));
        assert!(!returns_type("(I)Lcom/example/BuilderImpl;", "com/example/Builder"));
        assert!(!returns_type("()V", "com/example/Builder"));
        assert!(!returns_type("()[Lcom/example/Builder;", "com/example/Builder"));
    }
}

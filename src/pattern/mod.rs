//! Catalog of nanopatterns: small structural idioms a method or one of its
//! instructions can exhibit.
//!
//! Simple patterns look at a whole method, advanced patterns at one instruction at a
//! time. Both tiers are matched in catalog order and never fail.

mod advanced;
mod simple;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::ir::{Instruction, Method};

/// Grouping used when listing patterns.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub enum PatternCategory {
    Calling,
    #[serde(rename = "Control Flow")]
    ControlFlow,
    #[serde(rename = "Data Flow")]
    DataFlow,
    #[serde(rename = "Object-Oriented")]
    ObjectOriented,
}

impl PatternCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Calling => "Calling",
            Self::ControlFlow => "Control Flow",
            Self::DataFlow => "Data Flow",
            Self::ObjectOriented => "Object-Oriented",
        }
    }
}

/// Metadata describing a nanopattern.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct PatternInfo {
    pub name: &'static str,
    pub category: PatternCategory,
    pub description: &'static str,
    /// Matched once per method rather than once per instruction.
    pub simple: bool,
}

/// Predicate of a pattern, tagged with its scope.
#[derive(Clone, Copy, Debug)]
pub enum Matcher {
    Method(fn(&Method) -> bool),
    Instruction(fn(&Instruction) -> bool),
}

/// A registered nanopattern.
#[derive(Clone, Copy, Debug)]
pub struct NanoPattern {
    info: PatternInfo,
    matcher: Matcher,
}

impl NanoPattern {
    /// Method-scope pattern.
    pub const fn method(
        name: &'static str,
        category: PatternCategory,
        description: &'static str,
        predicate: fn(&Method) -> bool,
    ) -> Self {
        Self {
            info: PatternInfo {
                name,
                category,
                description,
                simple: true,
            },
            matcher: Matcher::Method(predicate),
        }
    }

    /// Instruction-scope pattern.
    pub const fn instruction(
        name: &'static str,
        category: PatternCategory,
        description: &'static str,
        predicate: fn(&Instruction) -> bool,
    ) -> Self {
        Self {
            info: PatternInfo {
                name,
                category,
                description,
                simple: false,
            },
            matcher: Matcher::Instruction(predicate),
        }
    }

    pub fn info(&self) -> &PatternInfo {
        &self.info
    }

    pub fn name(&self) -> &'static str {
        self.info.name
    }

    pub fn is_simple(&self) -> bool {
        self.info.simple
    }

    pub fn matcher(&self) -> Matcher {
        self.matcher
    }
}

/// Ordered registry of nanopatterns; declaration order is match order.
#[derive(Clone, Debug)]
pub struct PatternCatalog {
    patterns: Vec<NanoPattern>,
}

impl Default for PatternCatalog {
    /// The built-in simple patterns followed by the built-in advanced patterns.
    fn default() -> Self {
        let patterns = simple::PATTERNS
            .iter()
            .chain(advanced::PATTERNS.iter())
            .copied()
            .collect();
        Self { patterns }
    }
}

impl PatternCatalog {
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Append a pattern; names must be unique across both tiers.
    pub fn register(&mut self, pattern: NanoPattern) -> Result<()> {
        if self.get(pattern.name()).is_some() {
            return Err(Error::DuplicatePattern {
                name: pattern.name(),
            });
        }
        self.patterns.push(pattern);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&NanoPattern> {
        self.patterns.iter().find(|pattern| pattern.name() == name)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NanoPattern> {
        self.patterns.iter()
    }

    pub fn infos(&self) -> impl Iterator<Item = &PatternInfo> {
        self.patterns.iter().map(NanoPattern::info)
    }

    /// Names of the method-scope patterns `method` exhibits.
    pub fn match_simple(&self, method: &Method) -> Vec<&'static str> {
        self.patterns
            .iter()
            .filter_map(|pattern| match pattern.matcher {
                Matcher::Method(predicate) if predicate(method) => Some(pattern.name()),
                _ => None,
            })
            .collect()
    }

    /// One entry per (instruction, matching pattern), instructions outer.
    pub fn match_advanced(&self, method: &Method) -> Vec<&'static str> {
        let mut matches = Vec::new();
        for instruction in &method.instructions {
            for pattern in &self.patterns {
                if let Matcher::Instruction(predicate) = pattern.matcher
                    && predicate(instruction)
                {
                    matches.push(pattern.name());
                }
            }
        }
        matches
    }
}

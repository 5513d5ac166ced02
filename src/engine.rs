use std::collections::HashMap;
use std::ptr;

use dashmap::DashMap;
use rayon::prelude::*;

use crate::error::Result;
use crate::expr::ExprTree;
use crate::ir::{Class, Method};
use crate::pattern::PatternCatalog;

/// Position of a method inside the context: class index, then declaration index.
type Slot = (usize, usize);

/// Owns the analyzed classes, the pattern catalog and the per-method match cache.
///
/// The same class may be scanned more than once (for instance from a multi-release
/// JAR), so keys are not unique; the cache is keyed by position instead.
pub struct AnalysisContext {
    classes: Vec<Class>,
    catalog: PatternCatalog,
    index: HashMap<String, Vec<Slot>>,
    simple_cache: DashMap<Slot, Vec<&'static str>>,
    advanced_cache: DashMap<Slot, Vec<&'static str>>,
}

/// Pattern matches of one method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodPatterns {
    pub key: String,
    pub simple: Vec<&'static str>,
    pub advanced: Vec<&'static str>,
}

/// Build a context over `classes` with the built-in pattern catalog.
pub fn build_context(classes: Vec<Class>) -> AnalysisContext {
    AnalysisContext::with_catalog(classes, PatternCatalog::default())
}

impl AnalysisContext {
    pub fn with_catalog(classes: Vec<Class>, catalog: PatternCatalog) -> Self {
        let mut index: HashMap<String, Vec<Slot>> = HashMap::new();
        for (class_index, class) in classes.iter().enumerate() {
            for (method_index, method) in class.methods.iter().enumerate() {
                index
                    .entry(method.key())
                    .or_default()
                    .push((class_index, method_index));
            }
        }
        Self {
            classes,
            catalog,
            index,
            simple_cache: DashMap::new(),
            advanced_cache: DashMap::new(),
        }
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }

    pub fn classes(&self) -> &[Class] {
        &self.classes
    }

    pub fn into_classes(self) -> Vec<Class> {
        self.classes
    }

    /// Every method of every class, in class then declaration order.
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.classes.iter().flat_map(|class| class.methods.iter())
    }

    pub fn method_count(&self) -> usize {
        self.classes.iter().map(|class| class.methods.len()).sum()
    }

    /// Look a method up by its `owner.name+descriptor` key.
    ///
    /// When several scanned classes declare the key, the first one scanned wins.
    pub fn resolve(&self, key: &str) -> Option<&Method> {
        self.resolve_all(key).into_iter().next()
    }

    /// Every method declared under `key`, in scan order.
    pub fn resolve_all(&self, key: &str) -> Vec<&Method> {
        self.index
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(|slot| self.method_at(*slot))
            .collect()
    }

    fn method_at(&self, (class_index, method_index): Slot) -> Option<&Method> {
        self.classes.get(class_index)?.methods.get(method_index)
    }

    // Methods from outside the context have no slot and are never cached.
    fn slot_of(&self, method: &Method) -> Option<Slot> {
        self.index.get(&method.key())?.iter().copied().find(|slot| {
            self.method_at(*slot)
                .is_some_and(|candidate| ptr::eq(candidate, method))
        })
    }

    /// Methods containing a call site that names `key` directly.
    pub fn callers(&self, key: &str) -> Vec<&Method> {
        self.methods()
            .filter(|method| {
                method.calls_matching(|call| {
                    format!("{}.{}{}", call.owner, call.name, call.descriptor) == key
                })
            })
            .collect()
    }

    pub fn simple_patterns(&self, method: &Method) -> Vec<&'static str> {
        self.find_simple_patterns(method, true)
    }

    pub fn advanced_patterns(&self, method: &Method) -> Vec<&'static str> {
        self.find_advanced_patterns(method, true)
    }

    /// Method-scope matches; `cached == false` recomputes and overwrites the entry.
    pub fn find_simple_patterns(&self, method: &Method, cached: bool) -> Vec<&'static str> {
        let slot = self.slot_of(method);
        lookup(&self.simple_cache, slot, method, cached, |method| {
            self.catalog.match_simple(method)
        })
    }

    /// Instruction-scope matches; `cached == false` recomputes and overwrites the entry.
    pub fn find_advanced_patterns(&self, method: &Method, cached: bool) -> Vec<&'static str> {
        let slot = self.slot_of(method);
        lookup(&self.advanced_cache, slot, method, cached, |method| {
            self.catalog.match_advanced(method)
        })
    }

    /// Whether every name in `names` is among the method's simple matches.
    pub fn has_simple_patterns(&self, method: &Method, names: &[&str]) -> bool {
        let found = self.simple_patterns(method);
        names.iter().all(|name| found.contains(name))
    }

    /// Whether every name in `names` is among the method's advanced matches.
    pub fn has_advanced_patterns(&self, method: &Method, names: &[&str]) -> bool {
        let found = self.advanced_patterns(method);
        names.iter().all(|name| found.contains(name))
    }

    pub fn expression_forest<'a>(&self, method: &'a Method) -> Result<ExprTree<'a>> {
        ExprTree::assemble(method)
    }

    /// Match every method in parallel; results keep class and declaration order.
    pub fn analyze(&self) -> Vec<MethodPatterns> {
        self.classes
            .par_iter()
            .enumerate()
            .flat_map_iter(|(class_index, class)| {
                class
                    .methods
                    .iter()
                    .enumerate()
                    .map(move |(method_index, method)| {
                        let slot = Some((class_index, method_index));
                        MethodPatterns {
                            key: method.key(),
                            simple: lookup(&self.simple_cache, slot, method, true, |method| {
                                self.catalog.match_simple(method)
                            }),
                            advanced: lookup(&self.advanced_cache, slot, method, true, |method| {
                                self.catalog.match_advanced(method)
                            }),
                        }
                    })
            })
            .collect()
    }
}

fn lookup(
    cache: &DashMap<Slot, Vec<&'static str>>,
    slot: Option<Slot>,
    method: &Method,
    cached: bool,
    compute: impl FnOnce(&Method) -> Vec<&'static str>,
) -> Vec<&'static str> {
    if cached
        && let Some(slot) = slot
        && let Some(hit) = cache.get(&slot)
    {
        return hit.value().clone();
    }
    let matches = compute(method);
    log::debug!("{}: {matches:?}", method.key());
    if let Some(slot) = slot {
        cache.insert(slot, matches.clone());
    }
    matches
}

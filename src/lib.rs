//! Transitive call graph reconstruction over compiled JVM classes.
//!
//! The crate parses `.class` files found on a classpath of directories and
//! jar archives, extracts every `invoke*` call site in declaration order,
//! and expands them depth first into a [`CallGraph`] keyed by method
//! signatures. Classes are parsed at most once per build session; cycles
//! are truncated instead of looping; classes that cannot be read become
//! structured diagnostics rather than hard failures.

mod cache;
mod classfile;
mod extract;
mod filter;
mod graph;
mod model;
mod opcodes;
mod resolve;
#[cfg(test)]
mod testutil;

pub use extract::{ClasspathExtractor, ExtractError, MethodExtractor};
pub use filter::{CallFilter, IncludeAll, PrefixFilter};
pub use graph::{
    CallEdge, CallGraph, Diagnostic, EdgeResolution, GraphBuilder, MethodNode, NodeState,
};
pub use model::{CallKind, CallTarget, ClassInfo, MethodInfo, MethodKey};
pub use resolve::{ImplSuffixConvention, InterfaceResolver};

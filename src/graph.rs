use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result, bail};
use serde::Serialize;

use crate::cache::{CacheEntry, ClassCache};
use crate::extract::{ExtractError, MethodExtractor};
use crate::filter::CallFilter;
use crate::model::{CallKind, CallTarget, MethodInfo, MethodKey};
use crate::resolve::InterfaceResolver;

/// How the expansion of one call site ended.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "state", content = "key", rename_all = "lowercase")]
pub enum EdgeResolution {
    /// The target class failed to parse or the signature had no match in
    /// the resolved class; nothing is known about what lies beneath.
    Unresolved,
    /// Matched a method that declares no call sites of its own. A healthy
    /// end of the chain, unlike [`EdgeResolution::Unresolved`].
    Leaf(MethodKey),
    /// Expanded into the node addressed by this key.
    Expanded(MethodKey),
    /// The target was already on the active path; deliberately not expanded
    /// again. The node keeps whatever immediate edge list it carries.
    Truncated(MethodKey),
}

/// One call site of a method, exactly as referenced, plus its resolution.
/// For interface dispatch the site names the interface while the resolution
/// key names the substituted implementing class.
#[derive(Clone, Debug, Serialize)]
pub struct CallEdge {
    pub site: CallTarget,
    pub resolution: EdgeResolution,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Unexpanded,
    Resolved,
}

/// A method reached during expansion: its declared header and outgoing
/// edges in program order. Nodes are shared — every edge resolving to the
/// same key observes the same node.
#[derive(Clone, Debug, Serialize)]
pub struct MethodNode {
    pub key: MethodKey,
    pub kind: CallKind,
    pub return_type: String,
    pub state: NodeState,
    pub calls: Vec<CallEdge>,
}

/// Structured notice that a referenced class could not be analyzed. Named
/// after the originally-referenced identifier, before any interface
/// substitution.
#[derive(Clone, Debug, Serialize)]
pub struct Diagnostic {
    pub class_name: String,
    pub reason: String,
}

/// The reconstructed call graph: nodes addressed by stable method keys,
/// one root per declared method of the root class, plus the diagnostics
/// collected during the build.
#[derive(Debug, Serialize)]
pub struct CallGraph {
    pub root_class: String,
    pub roots: Vec<MethodKey>,
    pub nodes: Vec<MethodNode>,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip)]
    index: HashMap<MethodKey, usize>,
}

impl CallGraph {
    fn new(root_class: &str) -> Self {
        Self {
            root_class: root_class.to_string(),
            roots: Vec::new(),
            nodes: Vec::new(),
            diagnostics: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn node(&self, key: &MethodKey) -> Option<&MethodNode> {
        self.index.get(key).map(|index| &self.nodes[*index])
    }

    pub fn root_nodes(&self) -> impl Iterator<Item = &MethodNode> {
        self.roots.iter().filter_map(|key| self.node(key))
    }

    /// False as soon as any branch is only partially resolved, whether a
    /// parse failure was recorded or a signature silently failed to match.
    /// Leaf and truncated edges are complete; only unresolved edges mark
    /// missing knowledge.
    pub fn is_fully_resolved(&self) -> bool {
        self.diagnostics.is_empty()
            && self
                .nodes
                .iter()
                .all(|node| {
                    node.calls
                        .iter()
                        .all(|edge| edge.resolution != EdgeResolution::Unresolved)
                })
    }

    fn ensure_node(&mut self, method: &MethodInfo) -> usize {
        let key = method.key();
        if let Some(index) = self.index.get(&key) {
            return *index;
        }
        let calls = method
            .calls
            .iter()
            .map(|site| CallEdge {
                site: site.clone(),
                resolution: EdgeResolution::Unresolved,
            })
            .collect();
        self.nodes.push(MethodNode {
            key: key.clone(),
            kind: method.target.kind,
            return_type: method.target.return_type.clone(),
            state: NodeState::Unexpanded,
            calls,
        });
        self.index.insert(key, self.nodes.len() - 1);
        self.nodes.len() - 1
    }

    fn state_of(&self, key: &MethodKey) -> Option<NodeState> {
        self.index.get(key).map(|index| self.nodes[*index].state)
    }

    fn set_resolution(&mut self, node: usize, edge: usize, resolution: EdgeResolution) {
        self.nodes[node].calls[edge].resolution = resolution;
    }

    fn mark_resolved(&mut self, node: usize) {
        self.nodes[node].state = NodeState::Resolved;
    }
}

/// Depth-first call graph construction over a [`MethodExtractor`], with
/// per-class memoization (successes and permanent failures alike) and
/// cycle truncation.
///
/// The class cache lives as long as the builder and is shared by successive
/// [`GraphBuilder::build`] calls; the active path and output graph belong to
/// one call. Not safe for concurrent use.
pub struct GraphBuilder<'a> {
    extractor: &'a mut dyn MethodExtractor,
    filter: &'a dyn CallFilter,
    resolver: Option<&'a dyn InterfaceResolver>,
    cache: ClassCache,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(extractor: &'a mut dyn MethodExtractor, filter: &'a dyn CallFilter) -> Self {
        Self {
            extractor,
            filter,
            resolver: None,
            cache: ClassCache::new(),
        }
    }

    /// Substitute interface-kind call targets through `resolver` before the
    /// class lookup. Without a resolver, interface targets are resolved
    /// against the interface type itself.
    pub fn with_resolver(mut self, resolver: &'a dyn InterfaceResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Build the call graph reachable from `root_class`'s declared methods.
    ///
    /// Fails if the root itself cannot be analyzed or a caller-supplied
    /// filter or resolver fails; every other problem is recorded as a
    /// diagnostic or a truncated/unresolved edge and the build continues.
    pub fn build(&mut self, root_class: &str) -> Result<CallGraph> {
        let mut graph = CallGraph::new(root_class);
        let mut diagnostics = Vec::new();

        if !self.ensure_class(root_class, root_class, &mut diagnostics)? {
            let reason = diagnostics
                .pop()
                .map(|diagnostic| diagnostic.reason)
                .unwrap_or_else(|| "class previously failed to parse".to_string());
            bail!("failed to analyze root class {root_class}: {reason}");
        }
        let declared: Vec<MethodInfo> = match self.cache.get(root_class) {
            CacheEntry::Ok(info) => info.methods.clone(),
            _ => bail!("root class {root_class} missing from cache"),
        };

        let mut root_indices = Vec::with_capacity(declared.len());
        for method in &declared {
            root_indices.push(graph.ensure_node(method));
            graph.roots.push(method.key());
        }

        // One active-path set spans the whole sweep; each declared method
        // guards its own key while its immediate call sites are expanded.
        let mut active: HashSet<MethodKey> = HashSet::new();
        for (method, index) in declared.iter().zip(root_indices) {
            let key = method.key();
            if graph.state_of(&key) == Some(NodeState::Resolved) {
                continue; // already fully expanded via an earlier sibling
            }
            active.insert(key.clone());
            for (edge, site) in method.calls.iter().enumerate() {
                let resolution = self.expand(site, &mut graph, &mut active, &mut diagnostics)?;
                graph.set_resolution(index, edge, resolution);
            }
            active.remove(&key);
            graph.mark_resolved(index);
        }

        graph.diagnostics = diagnostics;
        Ok(graph)
    }

    fn expand(
        &mut self,
        site: &CallTarget,
        graph: &mut CallGraph,
        active: &mut HashSet<MethodKey>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<EdgeResolution> {
        let lookup_class = if site.kind == CallKind::Interface {
            match self.resolver {
                Some(resolver) => resolver.resolve(&site.class_name).with_context(|| {
                    format!("interface resolver failed for {}", site.class_name)
                })?,
                None => site.class_name.clone(),
            }
        } else {
            site.class_name.clone()
        };

        if !self.ensure_class(&lookup_class, &site.class_name, diagnostics)? {
            return Ok(EdgeResolution::Unresolved);
        }
        let matched = match self.cache.get(&lookup_class) {
            CacheEntry::Ok(info) => info.find_method(&site.method_name, &site.params).cloned(),
            _ => None,
        };
        let Some(matched) = matched else {
            return Ok(EdgeResolution::Unresolved);
        };
        let key = matched.key();
        if matched.calls.is_empty() {
            return Ok(EdgeResolution::Leaf(key));
        }
        if graph.state_of(&key) == Some(NodeState::Resolved) {
            return Ok(EdgeResolution::Expanded(key));
        }
        if active.contains(&key) {
            graph.ensure_node(&matched);
            return Ok(EdgeResolution::Truncated(key));
        }

        let index = graph.ensure_node(&matched);
        active.insert(key.clone());
        for (edge, child) in matched.calls.iter().enumerate() {
            let resolution = self.expand(child, graph, active, diagnostics)?;
            graph.set_resolution(index, edge, resolution);
        }
        active.remove(&key);
        graph.mark_resolved(index);
        Ok(EdgeResolution::Expanded(key))
    }

    /// Resolve one class through the cache, extracting at most once per
    /// identifier. A recorded failure is never retried and never emits a
    /// second diagnostic.
    fn ensure_class(
        &mut self,
        lookup_class: &str,
        referenced_class: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<bool> {
        match self.cache.get(lookup_class) {
            CacheEntry::Ok(_) => return Ok(true),
            CacheEntry::Failed => return Ok(false),
            CacheEntry::Absent => {}
        }
        match self.extractor.extract(lookup_class, self.filter) {
            Ok(info) => {
                self.cache.put_ok(lookup_class, info);
                Ok(true)
            }
            Err(ExtractError::Callback(error)) => {
                Err(error.context("call filter failed during extraction"))
            }
            Err(error) => {
                self.cache.put_failed(lookup_class);
                diagnostics.push(Diagnostic {
                    class_name: referenced_class.to_string(),
                    reason: error.to_string(),
                });
                Ok(false)
            }
        }
    }
}

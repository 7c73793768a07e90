//! Runtime helper resolution
//!
//! The rewriter asks [`HelperTable::reference`] for every helper it calls.
//! The table hands back a collision-free local name and remembers the helper
//! together with everything it depends on. Once a file is done, the table
//! renders either the definitions (in dependency order, each exactly once) or
//! a single import from the external helper module.

mod runtime;

use std::collections::{BTreeSet, HashMap};

use log::{debug, warn};
use once_cell::sync::Lazy;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use regex::{Captures, Regex};

use crate::error::{Error, Result};
use crate::ir::NameGenerator;

/// A helper definition with its direct dependencies
#[derive(Debug, Clone)]
pub struct HelperDef {
    pub name: &'static str,
    pub source: &'static str,
    pub dependencies: Vec<&'static str>,
}

struct Registry {
    defs: Vec<HelperDef>,
    index: HashMap<&'static str, usize>,
    /// Position of each helper in dependency order
    rank: HashMap<&'static str, usize>,
}

static HELPER_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b_[A-Za-z]+\b").expect("helper reference pattern is valid"));

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let index: HashMap<&'static str, usize> = runtime::SOURCES
        .iter()
        .enumerate()
        .map(|(position, (name, _))| (*name, position))
        .collect();

    let defs: Vec<HelperDef> = runtime::SOURCES
        .iter()
        .map(|(name, source)| {
            let mut dependencies: Vec<&'static str> = Vec::new();
            for found in HELPER_REFERENCE.find_iter(source) {
                if let Some((dependency, _)) = runtime::SOURCES
                    .iter()
                    .find(|(candidate, _)| *candidate == found.as_str() && candidate != name)
                {
                    if !dependencies.contains(dependency) {
                        dependencies.push(*dependency);
                    }
                }
            }
            HelperDef {
                name: *name,
                source: *source,
                dependencies,
            }
        })
        .collect();

    // Edges point from a dependency to the helpers that need it
    let mut graph: DiGraph<&'static str, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = defs.iter().map(|def| graph.add_node(def.name)).collect();
    for (position, def) in defs.iter().enumerate() {
        for dependency in &def.dependencies {
            if let Some(&from) = index.get(dependency) {
                graph.add_edge(nodes[from], nodes[position], ());
            }
        }
    }

    let mut order: Vec<&'static str> = Vec::with_capacity(defs.len());
    match toposort(&graph, None) {
        Ok(_) => {
            // Definition order, with dependencies pulled in front of their users
            let mut placed = vec![false; defs.len()];
            for node in &nodes {
                place(&graph, *node, &mut placed, &mut order);
            }
        }
        Err(cycle) => {
            warn!("helper dependency cycle at {}", graph[cycle.node_id()]);
            order.extend(defs.iter().map(|def| def.name));
        }
    }
    let rank = order
        .iter()
        .enumerate()
        .map(|(position, name)| (*name, position))
        .collect();

    Registry { defs, index, rank }
});

fn place(
    graph: &DiGraph<&'static str, ()>,
    node: NodeIndex,
    placed: &mut [bool],
    order: &mut Vec<&'static str>,
) {
    if placed[node.index()] {
        return;
    }
    placed[node.index()] = true;
    let mut dependencies: Vec<NodeIndex> = graph.neighbors_directed(node, Direction::Incoming).collect();
    dependencies.sort();
    for dependency in dependencies {
        place(graph, dependency, placed, order);
    }
    order.push(graph[node]);
}

/// Look up a helper by its canonical name
pub fn lookup(name: &str) -> Option<&'static HelperDef> {
    REGISTRY.index.get(name).map(|&position| &REGISTRY.defs[position])
}

/// Canonical names of every available helper, in dependency order
pub fn all_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = REGISTRY.defs.iter().map(|def| def.name).collect();
    names.sort_by_key(|name| REGISTRY.rank.get(name).copied().unwrap_or(usize::MAX));
    names
}

/// `names` plus everything they depend on, in dependency order
pub fn dependency_closure(names: &[&str]) -> Result<Vec<&'static str>> {
    let mut seen: BTreeSet<&'static str> = BTreeSet::new();
    let mut pending: Vec<&'static str> = Vec::new();
    for name in names {
        let def = lookup(name).ok_or_else(|| Error::UnknownHelper {
            name: name.to_string(),
        })?;
        pending.push(def.name);
    }
    while let Some(name) = pending.pop() {
        if !seen.insert(name) {
            continue;
        }
        if let Some(def) = lookup(name) {
            pending.extend(def.dependencies.iter().copied());
        }
    }
    let mut closure: Vec<&'static str> = seen.into_iter().collect();
    closure.sort_by_key(|name| REGISTRY.rank.get(name).copied().unwrap_or(usize::MAX));
    Ok(closure)
}

/// Definitions of `names` and their dependencies under their canonical names
pub fn render_definitions(names: &[&str]) -> Result<String> {
    let closure = dependency_closure(names)?;
    Ok(closure
        .iter()
        .filter_map(|name| lookup(name))
        .map(|def| def.source)
        .collect::<Vec<_>>()
        .join("\n\n"))
}

/// Per-file record of referenced helpers and their local names
#[derive(Debug, Default, Clone)]
pub struct HelperTable {
    local: HashMap<&'static str, String>,
}

impl HelperTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every canonical helper name the program leaves free, so fresh
    /// temporaries never take one before the helper is referenced
    pub fn reserve_names(names: &mut NameGenerator) {
        for def in &REGISTRY.defs {
            names.hold(def.name);
        }
    }

    /// Local identifier for helper `name`, marking it and its dependencies used
    pub fn reference(&mut self, name: &str, names: &mut NameGenerator) -> Result<String> {
        let def = lookup(name).ok_or_else(|| Error::UnknownHelper {
            name: name.to_string(),
        })?;
        for dependency in dependency_closure(&[def.name])? {
            if !self.local.contains_key(dependency) {
                let local = self.allocate(dependency, names);
                debug!("helper {} bound to {}", dependency, local);
                self.local.insert(dependency, local);
            }
        }
        self.local
            .get(def.name)
            .cloned()
            .ok_or_else(|| Error::invariant(format!("helper {} was not registered", def.name)))
    }

    fn allocate(&self, name: &'static str, names: &mut NameGenerator) -> String {
        if names.claim(name) {
            name.to_string()
        } else {
            names.fresh(name)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    /// Used helpers in dependency order
    pub fn used(&self) -> Vec<&'static str> {
        let mut used: Vec<&'static str> = self.local.keys().copied().collect();
        used.sort_by_key(|name| REGISTRY.rank.get(name).copied().unwrap_or(usize::MAX));
        used
    }

    pub fn local_name(&self, name: &str) -> Option<&str> {
        self.local.get(name).map(String::as_str)
    }

    /// Definitions of all used helpers, renamed to their local names
    pub fn render_inline(&self) -> String {
        let renamed: HashMap<&str, &str> = self
            .local
            .iter()
            .filter(|(canonical, local)| **canonical != local.as_str())
            .map(|(canonical, local)| (*canonical, local.as_str()))
            .collect();
        self.used()
            .iter()
            .filter_map(|name| lookup(name))
            .map(|def| {
                if renamed.is_empty() {
                    def.source.to_string()
                } else {
                    HELPER_REFERENCE
                        .replace_all(def.source, |caps: &Captures| {
                            let found = &caps[0];
                            renamed.get(found).copied().unwrap_or(found).to_string()
                        })
                        .into_owned()
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// `import { ... } from "<module>";` for all used helpers
    pub fn render_import(&self, module: &str) -> String {
        let specifiers: Vec<String> = self
            .used()
            .iter()
            .map(|name| match self.local_name(name) {
                Some(local) if local != *name => format!("{} as {}", name, local),
                _ => name.to_string(),
            })
            .collect();
        format!(
            "import {{ {} }} from {};",
            specifiers.join(", "),
            serde_json::Value::String(module.to_string())
        )
    }
}

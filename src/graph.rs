//! Positive atom-dependency graph and its strongly connected components.
//!
//! A head atom depends positively on every non-negated body atom of its rule
//! and negatively on every negated one. Only positive edges matter for loops:
//! two atoms share a component iff each reaches the other through positive
//! edges. Components are computed once per compilation pass, after all rules
//! have been added.

use std::collections::BTreeMap;
use std::fmt::Write;

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use crate::program::{AtomId, Literal};

/// Dependency graph over ground atoms.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    positive: DiGraphMap<AtomId, ()>,
    negative: DiGraphMap<AtomId, ()>,
}

/// A component of the positive dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Component identifier, dense from 0 in order of the smallest member.
    pub id: usize,
    /// Members in ascending atom order.
    pub members: Vec<AtomId>,
    /// Whether the component is a loop: more than one member, or a self-loop.
    pub looped: bool,
}

/// Result of an SCC decomposition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SccMap {
    components: Vec<Component>,
    membership: BTreeMap<AtomId, usize>,
}

impl SccMap {
    /// Component id of `atom`, if the atom is in the graph.
    pub fn component_of(&self, atom: AtomId) -> Option<usize> {
        self.membership.get(&atom).copied()
    }

    /// All components, singletons included.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Components that represent positive loops.
    pub fn loops(&self) -> impl Iterator<Item = &Component> {
        self.components.iter().filter(|c| c.looped)
    }

    /// Whether `a` and `b` are in the same component.
    pub fn same_component(&self, a: AtomId, b: AtomId) -> bool {
        match (self.component_of(a), self.component_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node for `atom` without any edges.
    pub fn add_atom(&mut self, atom: AtomId) {
        self.positive.add_node(atom);
    }

    /// Record that `head` depends positively on `body`.
    pub fn add_edge(&mut self, head: AtomId, body: AtomId) {
        self.positive.add_edge(head, body, ());
    }

    /// Record that `head` depends on `not body`.
    pub fn add_negative_edge(&mut self, head: AtomId, body: AtomId) {
        self.positive.add_node(head);
        self.positive.add_node(body);
        self.negative.add_edge(head, body, ());
    }

    /// Record the dependencies of one rule: every head atom on every body literal.
    pub fn add_rule<'a>(&mut self, head: &[AtomId], body: impl IntoIterator<Item = &'a Literal>) {
        for &atom in head {
            self.add_atom(atom);
        }
        for &literal in body {
            for &atom in head {
                if literal.is_positive() {
                    self.add_edge(atom, literal.atom());
                } else {
                    self.add_negative_edge(atom, literal.atom());
                }
            }
        }
    }

    pub fn atom_count(&self) -> usize {
        self.positive.node_count()
    }

    pub fn positive_edge_count(&self) -> usize {
        self.positive.edge_count()
    }

    pub fn negative_edge_count(&self) -> usize {
        self.negative.edge_count()
    }

    /// Decompose the positive subgraph into strongly connected components.
    ///
    /// The numbering depends only on the edge set: members are sorted and
    /// components are numbered by their smallest member.
    pub fn compute_sccs(&self) -> SccMap {
        let mut raw: Vec<Vec<AtomId>> = tarjan_scc(&self.positive)
            .into_iter()
            .map(|mut members| {
                members.sort_unstable();
                members
            })
            .collect();
        raw.sort_unstable_by_key(|members| members[0]);

        let mut map = SccMap::default();
        for (id, members) in raw.into_iter().enumerate() {
            let looped = members.len() > 1 || self.positive.contains_edge(members[0], members[0]);
            for &atom in &members {
                map.membership.insert(atom, id);
            }
            map.components.push(Component {
                id,
                members,
                looped,
            });
        }
        map
    }

    /// Render loop membership as `<prefix>scc(C,A).` facts.
    pub fn reify_sccs(&self, prefix: &str) -> String {
        let sccs = self.compute_sccs();
        let mut out = String::new();
        for component in sccs.loops() {
            for atom in &component.members {
                let _ = write!(out, "{prefix}scc({},{atom}). ", component.id);
            }
            out.push('\n');
        }
        out
    }
}

//! Provisioning action graph.
//!
//! Nodes are named provisioning actions; an edge says one action must be
//! ready before another may start. The external engine walks the graph in
//! topological order and reports readiness back through [`ReadinessTracker`].
//!
//! A [`ReadinessGate`] is a named set of prerequisites that one dependent
//! waits on as a whole. The platform release is the gate's only dependent.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Identifier of an action in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    /// Borrow the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ActionId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
struct Node<A> {
    id: ActionId,
    action: A,
    prerequisites: BTreeSet<usize>,
}

/// Directed acyclic graph of provisioning actions.
#[derive(Debug)]
pub struct DependencyGraph<A> {
    nodes: Vec<Node<A>>,
    index: HashMap<ActionId, usize>,
}

impl<A> Default for DependencyGraph<A> {
    fn default() -> Self {
        Self { nodes: Vec::new(), index: HashMap::new() }
    }
}

impl<A> DependencyGraph<A> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action. Names must be unique.
    pub fn add(&mut self, name: impl Into<String>, action: A) -> Result<ActionId> {
        let id = ActionId(name.into());
        if self.index.contains_key(&id) {
            return Err(Error::graph(format!("action '{id}' declared twice")));
        }
        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(Node { id: id.clone(), action, prerequisites: BTreeSet::new() });
        Ok(id)
    }

    /// Declare that `prerequisite` must be ready before `dependent` starts.
    pub fn depends_on(&mut self, dependent: &ActionId, prerequisite: &ActionId) -> Result<()> {
        let d = self.position(dependent)?;
        let p = self.position(prerequisite)?;

        if d == p || self.reaches(p, d) {
            return Err(Error::graph(format!(
                "'{dependent}' -> '{prerequisite}' would create a dependency cycle"
            )));
        }

        self.nodes[d].prerequisites.insert(p);
        Ok(())
    }

    /// Make `dependent` wait on every member of `gate`.
    pub fn depends_on_gate(&mut self, dependent: &ActionId, gate: &ReadinessGate) -> Result<()> {
        debug!(dependent = %dependent, gate = gate.name(), members = gate.len(), "gating action");
        for member in gate.members() {
            self.depends_on(dependent, member)?;
        }
        Ok(())
    }

    /// Whether an action with this id exists.
    pub fn contains(&self, id: &ActionId) -> bool {
        self.index.contains_key(id)
    }

    /// Payload of an action.
    pub fn action(&self, id: &ActionId) -> Option<&A> {
        self.index.get(id).map(|&i| &self.nodes[i].action)
    }

    /// Direct prerequisites of an action, in declaration order.
    pub fn prerequisites(&self, id: &ActionId) -> Vec<&ActionId> {
        self.index
            .get(id)
            .map(|&i| self.nodes[i].prerequisites.iter().map(|&p| &self.nodes[p].id).collect())
            .unwrap_or_default()
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no actions.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All actions in a submission order that honours every edge.
    ///
    /// Ties are broken by declaration order, so the result is deterministic.
    pub fn topological_order(&self) -> Vec<(&ActionId, &A)> {
        let mut remaining: Vec<usize> =
            self.nodes.iter().map(|n| n.prerequisites.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            for &p in &node.prerequisites {
                dependents[p].push(i);
            }
        }

        let mut ready: BTreeSet<usize> =
            remaining.iter().enumerate().filter(|(_, n)| **n == 0).map(|(i, _)| i).collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(i) = ready.pop_first() {
            order.push((&self.nodes[i].id, &self.nodes[i].action));
            for &d in &dependents[i] {
                remaining[d] -= 1;
                if remaining[d] == 0 {
                    ready.insert(d);
                }
            }
        }

        order
    }

    fn position(&self, id: &ActionId) -> Result<usize> {
        self.index.get(id).copied().ok_or_else(|| Error::graph(format!("unknown action '{id}'")))
    }

    // Whether `from` transitively depends on `to`.
    fn reaches(&self, from: usize, to: usize) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(i) = stack.pop() {
            if i == to {
                return true;
            }
            if seen.insert(i) {
                stack.extend(self.nodes[i].prerequisites.iter().copied());
            }
        }
        false
    }
}

/// A named barrier over a fixed set of prerequisite actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessGate {
    name: String,
    members: Vec<ActionId>,
}

impl ReadinessGate {
    /// Create an empty gate.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), members: Vec::new() }
    }

    /// Add a prerequisite. Adding the same action twice has no effect.
    pub fn require(&mut self, handle: &ActionId) {
        if !self.members.contains(handle) {
            self.members.push(handle.clone());
        }
    }

    /// Gate name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prerequisites in the order they were required.
    pub fn members(&self) -> &[ActionId] {
        &self.members
    }

    /// Number of prerequisites.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the gate has no prerequisites.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Tracks which actions the engine has reported ready.
pub struct ReadinessTracker<'g, A> {
    graph: &'g DependencyGraph<A>,
    ready: HashSet<usize>,
    submitted: HashSet<usize>,
}

impl<'g, A> ReadinessTracker<'g, A> {
    /// Start tracking with nothing submitted or ready.
    pub fn new(graph: &'g DependencyGraph<A>) -> Self {
        Self { graph, ready: HashSet::new(), submitted: HashSet::new() }
    }

    /// Actions not yet submitted whose prerequisites are all ready.
    pub fn submittable(&self) -> Vec<&'g ActionId> {
        self.graph
            .nodes
            .iter()
            .enumerate()
            .filter(|(i, node)| {
                !self.submitted.contains(i)
                    && node.prerequisites.iter().all(|p| self.ready.contains(p))
            })
            .map(|(_, node)| &node.id)
            .collect()
    }

    /// Record that an action was handed to the engine.
    ///
    /// Fails if any prerequisite is not ready yet.
    pub fn submit(&mut self, id: &ActionId) -> Result<()> {
        let i = self.graph.position(id)?;
        let blocked: Vec<_> = self.graph.nodes[i]
            .prerequisites
            .iter()
            .filter(|p| !self.ready.contains(p))
            .map(|&p| self.graph.nodes[p].id.as_str())
            .collect();
        if !blocked.is_empty() {
            return Err(Error::graph(format!(
                "'{id}' submitted before prerequisites were ready: {}",
                blocked.join(", ")
            )));
        }
        self.submitted.insert(i);
        Ok(())
    }

    /// Record that the engine reported an action ready.
    pub fn mark_ready(&mut self, id: &ActionId) -> Result<()> {
        let i = self.graph.position(id)?;
        if !self.submitted.contains(&i) {
            return Err(Error::graph(format!("'{id}' reported ready but was never submitted")));
        }
        self.ready.insert(i);
        Ok(())
    }

    /// Whether an action has been reported ready.
    pub fn is_ready(&self, id: &ActionId) -> bool {
        self.graph.index.get(id).is_some_and(|i| self.ready.contains(i))
    }

    /// Whether every action has been reported ready.
    pub fn is_complete(&self) -> bool {
        self.ready.len() == self.graph.len()
    }
}

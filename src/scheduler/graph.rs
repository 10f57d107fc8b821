//! Inversion of the declared dependencies into a graph with
//! parent and child edges per system.

use crate::mappings::Mappings;
use crate::system::SystemId;
use smallvec::SmallVec;

/// Dense index of a system within a `DependencyGraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct NodeIndex(pub usize);

impl From<usize> for NodeIndex {
    fn from(x: usize) -> Self {
        Self(x)
    }
}

pub type NodeVec = SmallVec<[NodeIndex; 4]>;

/// A system in the dependency graph. Only lives while a
/// topology is being built.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub id: SystemId,
    /// Systems this system must run after.
    pub parents: NodeVec,
    /// Systems which must run after this system.
    pub children: NodeVec,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Nodes, indexed by `NodeIndex`, in order of first mention.
    nodes: Vec<Node>,
    indices: Mappings<SystemId, NodeIndex>,
}

impl DependencyGraph {
    /// Builds the graph from each system's direct dependencies.
    ///
    /// Systems which only appear as a dependency still receive a node.
    pub fn new<'a>(dependencies: impl IntoIterator<Item = (SystemId, &'a [SystemId])>) -> Self {
        let mut graph = Self::default();

        for (system, parents) in dependencies {
            let child = graph.node_for(system);
            for parent in parents {
                let parent = graph.node_for(*parent);
                push_unique(&mut graph.nodes[child.0].parents, parent);
                push_unique(&mut graph.nodes[parent.0].children, child);
            }
        }

        graph
    }

    fn node_for(&mut self, id: SystemId) -> NodeIndex {
        let index = self.indices.get_or_alloc(id);
        if index.0 == self.nodes.len() {
            self.nodes.push(Node {
                id,
                ..Node::default()
            });
        }
        index
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index.0]
    }

    pub fn index_of(&self, id: SystemId) -> Option<NodeIndex> {
        self.indices.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &Node)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeIndex(index), node))
    }
}

fn push_unique(vec: &mut NodeVec, index: NodeIndex) {
    if !vec.contains(&index) {
        vec.push(index);
    }
}

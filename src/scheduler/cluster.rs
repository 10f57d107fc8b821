//! Compaction of the dependency graph into continuations: maximal
//! chains of systems linked one-to-one, each run as a single
//! sequential task chain.

use crate::error::ScheduleError;
use crate::scheduler::graph::{DependencyGraph, Node, NodeIndex};
use crate::scheduler::DepVec;
use crate::system::SystemId;
use hashbrown::HashMap;

/// Index of a cluster within a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct ClusterId(pub usize);

/// One continuation: systems which run back to back on one worker,
/// plus the systems outside it which must finish before it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    system_id_list: Vec<SystemId>,
    external_dependencies: DepVec,
}

impl Cluster {
    /// Members in execution order. The first is the chain root.
    pub fn systems(&self) -> &[SystemId] {
        &self.system_id_list
    }

    /// Systems outside this cluster which its root runs after.
    pub fn external_dependencies(&self) -> &[SystemId] {
        &self.external_dependencies
    }

    pub fn root(&self) -> SystemId {
        self.system_id_list[0]
    }

    pub fn len(&self) -> usize {
        self.system_id_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.system_id_list.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Clustering {
    pub clusters: Vec<Cluster>,
    /// The cluster owning each system.
    pub owners: HashMap<SystemId, ClusterId>,
}

/// Partitions every system of `graph` into clusters.
///
/// A system roots a new cluster unless it has exactly one parent
/// and is that parent's only child. Each root's chain is extended
/// while the tail has a single child whose single parent is the tail.
/// Systems left unassigned lie on a cycle.
pub fn cluster(graph: &DependencyGraph) -> Result<Clustering, ScheduleError> {
    let mut continuation: Vec<Option<ClusterId>> = vec![None; graph.len()];
    let mut clustering = Clustering::default();

    for (index, node) in graph.nodes() {
        if !is_root(graph, node) {
            continue;
        }

        let cluster_id = ClusterId(clustering.clusters.len());
        continuation[index.0] = Some(cluster_id);
        let mut system_id_list = vec![node.id];

        let mut tail = node;
        while let Some(next) = next_in_chain(graph, tail, &continuation) {
            continuation[next.0] = Some(cluster_id);
            tail = graph.node(next);
            system_id_list.push(tail.id);
        }

        let external_dependencies = node
            .parents
            .iter()
            .map(|parent| graph.node(*parent).id)
            .collect();

        for id in &system_id_list {
            clustering.owners.insert(*id, cluster_id);
        }
        clustering.clusters.push(Cluster {
            system_id_list,
            external_dependencies,
        });
    }

    let mut stranded: Vec<SystemId> = graph
        .nodes()
        .filter(|(index, _)| continuation[index.0].is_none())
        .map(|(_, node)| node.id)
        .collect();
    if !stranded.is_empty() {
        stranded.sort();
        return Err(ScheduleError::DependencyCycle(stranded));
    }

    Ok(clustering)
}

fn is_root(graph: &DependencyGraph, node: &Node) -> bool {
    match node.parents.as_slice() {
        [parent] => graph.node(*parent).children.len() != 1,
        _ => true,
    }
}

fn next_in_chain(
    graph: &DependencyGraph,
    tail: &Node,
    continuation: &[Option<ClusterId>],
) -> Option<NodeIndex> {
    match tail.children.as_slice() {
        [child] if continuation[child.0].is_none() && graph.node(*child).parents.len() == 1 => {
            Some(*child)
        }
        _ => None,
    }
}

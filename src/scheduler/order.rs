//! Linear ordering of clusters which respects every cross-cluster
//! dependency.

use crate::error::ScheduleError;
use crate::scheduler::cluster::{Cluster, ClusterId};
use crate::system::SystemId;
use bit_set::BitSet;
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::collections::VecDeque;

type ClusterVec = SmallVec<[ClusterId; 4]>;

/// Computes an execution order of `clusters` with Kahn's algorithm.
///
/// An edge runs from the owner of each external dependency to the
/// dependent cluster. Clusters which never become ready lie on a
/// cycle; a cluster depending on one of its own members counts too.
pub fn order(
    clusters: &[Cluster],
    owners: &HashMap<SystemId, ClusterId>,
) -> Result<Vec<ClusterId>, ScheduleError> {
    let mut children: Vec<ClusterVec> = vec![ClusterVec::new(); clusters.len()];
    let mut in_degree: Vec<usize> = vec![0; clusters.len()];

    for (index, cluster) in clusters.iter().enumerate() {
        let mut parents = ClusterVec::new();
        for dependency in cluster.external_dependencies() {
            let owner = owners[dependency];
            if !parents.contains(&owner) {
                parents.push(owner);
                children[owner.0].push(ClusterId(index));
            }
        }
        in_degree[index] = parents.len();
    }

    let mut frontier: VecDeque<ClusterId> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(index, _)| ClusterId(index))
        .collect();
    let mut cluster_order = Vec::with_capacity(clusters.len());
    let mut finished = BitSet::with_capacity(clusters.len());

    while let Some(cluster_id) = frontier.pop_front() {
        cluster_order.push(cluster_id);
        finished.insert(cluster_id.0);

        for child in &children[cluster_id.0] {
            in_degree[child.0] -= 1;
            if in_degree[child.0] == 0 {
                frontier.push_back(*child);
            }
        }
    }

    if cluster_order.len() != clusters.len() {
        let mut stranded: Vec<SystemId> = clusters
            .iter()
            .enumerate()
            .filter(|(index, _)| !finished.contains(*index))
            .flat_map(|(_, cluster)| cluster.systems().iter().copied())
            .collect();
        stranded.sort();
        return Err(ScheduleError::DependencyCycle(stranded));
    }

    Ok(cluster_order)
}

/// Checks that every cluster's external dependencies are owned by
/// clusters earlier in `cluster_order`, so their task handles exist
/// by the time the dispatcher waits on them.
pub fn verify(
    clusters: &[Cluster],
    owners: &HashMap<SystemId, ClusterId>,
    cluster_order: &[ClusterId],
) -> Result<(), ScheduleError> {
    let mut scheduled = BitSet::with_capacity(clusters.len());

    for cluster_id in cluster_order {
        for dependency in clusters[cluster_id.0].external_dependencies() {
            match owners.get(dependency) {
                Some(owner) if scheduled.contains(owner.0) => {}
                _ => return Err(ScheduleError::MissingTaskHandle(*dependency)),
            }
        }
        scheduled.insert(cluster_id.0);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::cluster::cluster;
    use crate::scheduler::graph::DependencyGraph;

    fn build(deps: &[(usize, &[usize])]) -> (Vec<Cluster>, HashMap<SystemId, ClusterId>) {
        let deps: Vec<(SystemId, Vec<SystemId>)> = deps
            .iter()
            .map(|(id, parents)| {
                (
                    SystemId(*id),
                    parents.iter().map(|parent| SystemId(*parent)).collect(),
                )
            })
            .collect();
        let graph =
            DependencyGraph::new(deps.iter().map(|(id, parents)| (*id, parents.as_slice())));
        let clustering = cluster(&graph).unwrap();
        (clustering.clusters, clustering.owners)
    }

    fn position(order: &[ClusterId], owners: &HashMap<SystemId, ClusterId>, id: usize) -> usize {
        let owner = owners[&SystemId(id)];
        order.iter().position(|cluster| *cluster == owner).unwrap()
    }

    #[test]
    fn diamond_order() {
        let (clusters, owners) = build(&[(3, &[1, 2]), (1, &[0]), (2, &[0])]);
        let order = order(&clusters, &owners).unwrap();

        assert_eq!(order.len(), 4);
        assert!(position(&order, &owners, 0) < position(&order, &owners, 1));
        assert!(position(&order, &owners, 0) < position(&order, &owners, 2));
        assert!(position(&order, &owners, 1) < position(&order, &owners, 3));
        assert!(position(&order, &owners, 2) < position(&order, &owners, 3));
        verify(&clusters, &owners, &order).unwrap();
    }

    #[test]
    fn cycle_through_join() {
        // 0 joins 2 and 3; 1 follows 0; 2 follows 1 -> cycle 0 -> 1 -> 2 -> 0.
        let (clusters, owners) = build(&[(0, &[2, 3]), (1, &[0]), (2, &[1]), (3, &[])]);
        let result = order(&clusters, &owners);

        assert_eq!(
            result.err(),
            Some(ScheduleError::DependencyCycle(vec![
                SystemId(0),
                SystemId(1),
                SystemId(2)
            ]))
        );
    }

    #[test]
    fn verify_rejects_reversed_order() {
        let (clusters, owners) = build(&[(0, &[]), (1, &[0]), (2, &[0])]);
        let mut order = order(&clusters, &owners).unwrap();
        order.reverse();

        assert!(matches!(
            verify(&clusters, &owners, &order),
            Err(ScheduleError::MissingTaskHandle(SystemId(0)))
        ));
    }
}

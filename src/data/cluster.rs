use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::data::umc::{CentroidRepresentation, UmcFeature};

/// A consensus cluster: tracks from independent runs believed to represent
/// the same chemical species.
///
/// Members are indices into the track slice the cluster set was built over.
/// Invariant: no two member tracks share a `group_id`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UmcCluster {
    pub id: usize,
    /// Indices of the member tracks, in merge order.
    pub umc_ids: Vec<usize>,
    /// Centroid neutral monoisotopic mass over the members.
    pub mono_mass: f64,
    /// Centroid normalized elution time over the members.
    pub retention_time: f64,
    /// Centroid drift time over the members.
    pub drift_time: f64,
    /// Origin run of each member, sorted ascending.
    pub group_ids: Vec<i32>,
}

/// Working cluster membership for single-linkage merging, kept as an indexed
/// arena: each track stores the id of its owning cluster and each cluster
/// stores its member track indices, so lookup and reassignment are O(1)
/// without back-pointers.
///
/// Clusters are born as singletons, grow only by absorbing another cluster
/// wholesale, and never split. An absorbed cluster's member list is drained;
/// it stays in the arena as a dead entry and is skipped on extraction.
#[derive(Clone, Debug)]
pub struct ClusterSet {
    /// Track index -> owning cluster id.
    assignment: Vec<usize>,
    /// Cluster id -> member track indices. Empty for absorbed clusters.
    members: Vec<Vec<usize>>,
    /// Cluster id -> origin runs present among the members.
    groups: Vec<HashSet<i32>>,
}

impl ClusterSet {
    /// Wraps every track in its own singleton cluster.
    pub fn singletons(umcs: &[UmcFeature]) -> Self {
        let assignment: Vec<usize> = (0..umcs.len()).collect();
        let members: Vec<Vec<usize>> = (0..umcs.len()).map(|i| vec![i]).collect();
        let groups: Vec<HashSet<i32>> = umcs
            .iter()
            .map(|u| {
                let mut set = HashSet::new();
                set.insert(u.group_id);
                set
            })
            .collect();
        ClusterSet { assignment, members, groups }
    }

    /// Id of the cluster currently owning `umc_idx`.
    #[inline]
    pub fn cluster_of(&self, umc_idx: usize) -> usize {
        self.assignment[umc_idx]
    }

    /// True if merging the two clusters would put two tracks from the same
    /// origin run into one cluster.
    pub fn groups_conflict(&self, a: usize, b: usize) -> bool {
        let (small, large) = if self.groups[a].len() <= self.groups[b].len() { (a, b) } else { (b, a) };
        self.groups[small].iter().any(|g| self.groups[large].contains(g))
    }

    /// Absorbs the smaller of the two clusters into the larger one.
    /// Callers must have checked `groups_conflict` first.
    pub fn merge(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let (absorbed, kept) = if self.members[a].len() <= self.members[b].len() { (a, b) } else { (b, a) };
        let moved = std::mem::take(&mut self.members[absorbed]);
        for &umc_idx in &moved {
            self.assignment[umc_idx] = kept;
        }
        self.members[kept].extend(moved);
        let moved_groups = std::mem::take(&mut self.groups[absorbed]);
        self.groups[kept].extend(moved_groups);
    }

    /// Number of live (non-absorbed) clusters.
    pub fn live_count(&self) -> usize {
        self.members.iter().filter(|m| !m.is_empty()).count()
    }

    /// Flattens the arena into final clusters with sequential ids and
    /// centroid statistics over their member tracks.
    pub fn into_clusters(self, umcs: &[UmcFeature], representation: CentroidRepresentation) -> Vec<UmcCluster> {
        let mut clusters = Vec::with_capacity(self.live_count());
        for member_ids in self.members.into_iter() {
            if member_ids.is_empty() {
                continue;
            }
            let masses: Vec<f64> = member_ids.iter().map(|&i| umcs[i].mono_mass).collect();
            let nets: Vec<f64> = member_ids.iter().map(|&i| umcs[i].retention_time).collect();
            let drifts: Vec<f64> = member_ids.iter().map(|&i| umcs[i].drift_time).collect();
            let mut group_ids: Vec<i32> = member_ids.iter().map(|&i| umcs[i].group_id).collect();
            group_ids.sort_unstable();

            clusters.push(UmcCluster {
                id: clusters.len(),
                umc_ids: member_ids,
                mono_mass: representation.centroid(masses),
                retention_time: representation.centroid(nets),
                drift_time: representation.centroid(drifts),
                group_ids,
            });
        }
        clusters
    }
}

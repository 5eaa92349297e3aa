use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::algorithm::linkage::{ClusterParameters, SingleLinkageClusterer};
use crate::algorithm::tree::{MsFeatureTreeClusterer, TreeClusterParameters};
use crate::data::cluster::UmcCluster;
use crate::data::feature::MsFeature;
use crate::data::spectrum::RawScanProvider;
use crate::data::umc::UmcFeature;
use crate::error::UmcError;
use crate::progress::ProgressSink;

/// One experimental run: its identifier and the deisotoped features a reader
/// produced for it.
pub struct Run {
    pub group_id: i32,
    pub features: Vec<MsFeature>,
}

impl Run {
    pub fn new(group_id: i32, features: Vec<MsFeature>) -> Self {
        Run { group_id, features }
    }
}

/// End-to-end parameters: per-run track building and cross-run linkage.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ConsensusParameters {
    pub tree: TreeClusterParameters,
    pub linkage: ClusterParameters,
}

/// Output of the full pipeline. `tracks` holds every per-run track in the
/// order the clusters index them; `failed_blocks` carries per-partition
/// distance failures from the linkage stage, whose tracks stayed singletons.
pub struct ConsensusOutcome {
    pub clusters: Vec<UmcCluster>,
    pub tracks: Vec<UmcFeature>,
    pub failed_blocks: Vec<UmcError>,
}

/// Clusters every run into tracks, then links the tracks across runs into
/// consensus clusters.
///
/// Runs are independent until the linkage stage, so the per-run tree
/// clustering fans out across the rayon pool; milestones from concurrent
/// runs reach the sink interleaved. Raw-scan providers are per-run; pass
/// `None` for runs without raw data and the tracks keep the children the
/// tree stage found.
pub fn cluster_runs(
    runs: Vec<Run>,
    providers: &[Option<&(dyn RawScanProvider + Sync)>],
    parameters: &ConsensusParameters,
    sink: &dyn ProgressSink,
) -> Result<ConsensusOutcome, UmcError> {
    if !providers.is_empty() && providers.len() != runs.len() {
        return Err(UmcError::InvalidInput(format!(
            "{} runs but {} raw-scan providers",
            runs.len(),
            providers.len()
        )));
    }

    sink.progress(&format!("clustering {} runs into tracks", runs.len()));
    let per_run: Vec<Result<Vec<UmcFeature>, UmcError>> = runs
        .into_par_iter()
        .enumerate()
        .map(|(i, mut run)| {
            for feature in &mut run.features {
                feature.group_id = run.group_id;
            }
            let clusterer = MsFeatureTreeClusterer::new(parameters.tree);
            let provider = providers.get(i).copied().flatten();
            let mut tracks = clusterer.cluster(
                run.features,
                provider.map(|p| p as &dyn RawScanProvider),
                sink,
            )?;
            for track in &mut tracks {
                track.group_id = run.group_id;
            }
            Ok(tracks)
        })
        .collect();

    let mut tracks: Vec<UmcFeature> = Vec::new();
    for result in per_run {
        tracks.extend(result?);
    }
    for (id, track) in tracks.iter_mut().enumerate() {
        track.id = id;
    }
    sink.progress(&format!("linking {} tracks across runs", tracks.len()));

    let linker = SingleLinkageClusterer::new(parameters.linkage);
    let outcome = linker.cluster(&tracks, sink)?;
    Ok(ConsensusOutcome {
        clusters: outcome.clusters,
        tracks,
        failed_blocks: outcome.failed_blocks,
    })
}

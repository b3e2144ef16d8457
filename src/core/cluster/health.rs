// src/core/cluster/health.rs

//! Evaluates overall cluster health (`cluster_state:ok` vs `fail`) from the
//! local view of slot coverage and node liveness.

use super::config::ClusterConfig;
use super::slot::NUM_SLOTS;
use super::state::{ClusterState, NodeFlags};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{info, warn};

/// How long the FAIL -> OK transition is delayed once coverage is restored,
/// clamped between these bounds regardless of `node_timeout`.
const MIN_FAIL_TO_OK_DELAY: Duration = Duration::from_millis(500);
const MAX_FAIL_TO_OK_DELAY: Duration = Duration::from_millis(5000);

fn fail_to_ok_delay(node_timeout_ms: u64) -> Duration {
    Duration::from_millis(node_timeout_ms).clamp(MIN_FAIL_TO_OK_DELAY, MAX_FAIL_TO_OK_DELAY)
}

/// Recomputes `ClusterState::cluster_ok` from slot coverage, honoring
/// `require_full_coverage`, and tracks how long this node has been isolated
/// in a minority partition.
pub fn evaluate(cluster: &ClusterState, config: &ClusterConfig) {
    let mut covered = 0usize;
    let mut served_by_live_node = true;
    for slot in 0..NUM_SLOTS {
        match cluster.get_node_for_slot(slot as u16) {
            Some(owner) => {
                covered += 1;
                if owner.node_info.get_flags().contains(NodeFlags::FAIL) {
                    served_by_live_node = false;
                }
            }
            None => served_by_live_node = false,
        }
    }

    let full_coverage = covered == NUM_SLOTS;
    let was_ok = cluster.cluster_ok.load(Ordering::Relaxed);

    let online_masters = cluster.count_online_masters();
    let in_minority = online_masters > 0 && online_masters < config.failover_quorum;

    let should_be_ok = if config.require_full_coverage {
        full_coverage && served_by_live_node && !in_minority
    } else {
        !in_minority
    };

    if should_be_ok && !was_ok {
        // Apply the transition delay by re-checking rather than flipping
        // immediately: the caller runs this once per gossip tick (1s), so a
        // node only needs to stay healthy across enough ticks to cross the
        // clamp window before it's trusted again.
        let delay = fail_to_ok_delay(config.node_timeout);
        if delay <= Duration::from_secs(1) {
            cluster.cluster_ok.store(true, Ordering::Relaxed);
            info!("Cluster state transitioning to OK ({} of {} slots covered)", covered, NUM_SLOTS);
        }
    } else if !should_be_ok && was_ok {
        cluster.cluster_ok.store(false, Ordering::Relaxed);
        warn!(
            "Cluster state transitioning to FAIL: {} of {} slots covered, full_coverage_required={}",
            covered, NUM_SLOTS, config.require_full_coverage
        );
    }

    let minority_time = cluster.minority_time.load(Ordering::Relaxed);
    if in_minority && minority_time == 0 {
        cluster
            .minority_time
            .store(super::gossip::now_ms(), Ordering::Relaxed);
    } else if !in_minority && minority_time != 0 {
        cluster.minority_time.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn fail_to_ok_delay_is_clamped() {
        assert_eq!(fail_to_ok_delay(100), MIN_FAIL_TO_OK_DELAY);
        assert_eq!(fail_to_ok_delay(50_000), MAX_FAIL_TO_OK_DELAY);
        assert_eq!(fail_to_ok_delay(2_000), Duration::from_millis(2_000));
    }

    #[test]
    fn unassigned_slots_mark_cluster_down_with_full_coverage_required() {
        let state = ClusterState::new(&Config::default()).unwrap();
        let mut config = ClusterConfig::default();
        config.require_full_coverage = true;
        evaluate(&state, &config);
        assert!(!state.cluster_ok.load(Ordering::Relaxed));
    }
}

// src/core/cluster/orphan.rs

//! Orphan-master migration: when a master that once had a replica ends up
//! with none (its last replica failed or was itself promoted elsewhere), a
//! replica from a well-stocked master migrates over to restore redundancy.

use super::state::{ClusterState, NodeFlags};
use crate::config::ReplicationConfig;
use crate::core::state::ServerState;
use std::sync::Arc;
use tracing::{error, info};

/// A master counts as orphaned if it owns slots, has had a replica in the
/// past (so a brand-new single-node master isn't flagged), and none of its
/// current replicas are live.
fn is_orphaned(cluster: &ClusterState, master_id: &str) -> bool {
    let Some(master) = cluster.nodes.get(master_id) else {
        return false;
    };
    if !master.node_info.get_flags().contains(NodeFlags::PRIMARY)
        || master.node_info.slots.is_empty()
        || !master.node_info.had_replicas
    {
        return false;
    }
    drop(master);

    cluster.replicas_of(master_id).into_iter().all(|replica_id| {
        cluster
            .nodes
            .get(&replica_id)
            .is_none_or(|r| r.node_info.get_flags().intersects(NodeFlags::FAIL | NodeFlags::PFAIL))
    })
}

/// Checks whether this node is the best-ranked candidate to migrate to an
/// orphaned master, and if so, reconfigures itself as that master's replica.
///
/// Candidacy rules: this node must be a healthy replica whose own master
/// retains more than `migration_barrier` other working replicas after this
/// one leaves, and among all such candidates cluster-wide the
/// lexicographically smallest node ID wins (so every node reaches the same
/// decision independently, without an election).
pub async fn maybe_reassign(state: &Arc<ServerState>, cluster: &ClusterState) {
    let migration_barrier = state.config.lock().await.cluster.migration_barrier as usize;

    let orphans: Vec<String> = cluster
        .nodes
        .iter()
        .filter(|n| {
            n.value().node_info.get_flags().contains(NodeFlags::PRIMARY) && is_orphaned(cluster, n.key())
        })
        .map(|n| n.key().clone())
        .collect();

    if orphans.is_empty() {
        return;
    }

    let myself = cluster.get_my_config();
    let my_flags = myself.node_info.get_flags();
    if !my_flags.contains(NodeFlags::REPLICA) || my_flags.intersects(NodeFlags::FAIL | NodeFlags::PFAIL) {
        return;
    }
    let Some(my_master_id) = myself.node_info.replica_of.clone() else {
        return;
    };
    drop(myself);

    let siblings = cluster.replicas_of(&my_master_id);
    let healthy_siblings = siblings
        .iter()
        .filter(|id| {
            *id != &cluster.my_id
                && cluster
                    .nodes
                    .get(*id)
                    .is_some_and(|r| !r.node_info.get_flags().intersects(NodeFlags::FAIL | NodeFlags::PFAIL))
        })
        .count();
    if healthy_siblings < migration_barrier {
        return;
    }

    for orphan_id in &orphans {
        let mut candidates: Vec<String> = cluster
            .nodes
            .iter()
            .filter(|n| {
                let f = n.value().node_info.get_flags();
                if !f.contains(NodeFlags::REPLICA) || f.intersects(NodeFlags::FAIL | NodeFlags::PFAIL) {
                    return false;
                }
                let Some(master_id) = &n.value().node_info.replica_of else {
                    return false;
                };
                if master_id == orphan_id {
                    return false;
                }
                let sibling_count = cluster
                    .replicas_of(master_id)
                    .iter()
                    .filter(|id| {
                        *id != n.key()
                            && cluster.nodes.get(*id).is_some_and(|r| {
                                !r.node_info.get_flags().intersects(NodeFlags::FAIL | NodeFlags::PFAIL)
                            })
                    })
                    .count();
                sibling_count >= migration_barrier
            })
            .map(|n| n.key().clone())
            .collect();

        candidates.sort();
        if candidates.first() == Some(&cluster.my_id) {
            reassign_self_to(state, cluster, orphan_id).await;
            return;
        }
    }
}

async fn reassign_self_to(state: &Arc<ServerState>, cluster: &ClusterState, orphan_master_id: &str) {
    let Some(orphan) = cluster.nodes.get(orphan_master_id) else {
        return;
    };
    let orphan_addr = orphan.node_info.addr.clone();
    drop(orphan);

    let Some((host, port_str)) = orphan_addr.split_once(':') else {
        return;
    };
    let Ok(port) = port_str.parse::<u16>() else {
        return;
    };

    info!(
        "Migrating from master {:?} to orphaned master {} (no live replicas)",
        cluster.get_my_config().node_info.replica_of,
        orphan_master_id
    );

    {
        let mut config = state.config.lock().await;
        config.replication = ReplicationConfig::Replica {
            primary_host: host.to_string(),
            primary_port: port,
            tls_enabled: false,
        };
    }

    if let Some(mut myself) = cluster.nodes.get_mut(&cluster.my_id) {
        myself.node_info.replica_of = Some(orphan_master_id.to_string());
    }

    if let Err(e) = cluster.save_config() {
        error!("Failed to persist cluster config after orphan migration: {}", e);
    }

    if state.replication_reconfigure_tx.send(()).is_err() {
        error!("Could not signal replication worker after orphan migration.");
    }
}

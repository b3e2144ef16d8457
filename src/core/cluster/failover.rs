// src/core/cluster/failover.rs

//! Implements replica-initiated failover: master failure detection, rank-
//! delayed election, majority voting, and the `CLUSTER FAILOVER` manual
//! variant (including its `TAKEOVER` escape hatch).
//!
//! # WARNING: Risk of Split-Brain and Data Inconsistency
//!
//! This replica-initiated failover mechanism is provided for basic high-availability
//! but is susceptible to "split-brain" scenarios during network partitions. If a
//! partition isolates the master from the majority of the cluster, the majority
//! may elect a new master while the old one continues to accept writes from a
//! minority of clients. This leads to permanent data inconsistency.
//!
//! # Operational Requirements: Time Synchronization
//!
//! The failover mechanism relies on a monotonically increasing configuration epoch
//! (`config_epoch`) to ensure that votes are cast for the most current election.
//! It is **strongly recommended** to use a time synchronization service like NTP
//! on all nodes running in cluster mode, since significant clock skew could lead
//! to premature or unnecessary failover events.

use super::epoch;
use super::gossip::{PeerLinks, send_payload};
use super::state::NodeFlags;
use super::wire::{MessageFlags, MessageType, Payload};
use crate::config::{ReplicationConfig, ReplicationPrimaryConfig};
use crate::core::SpinelDBError;
use crate::core::state::ServerState;
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{info, warn};

/// Base delay before a replica starts an election, before the per-rank
/// penalty and random jitter are added.
const FAILOVER_BASE_DELAY_MS: u64 = 500;
/// Penalty added per more-up-to-date sibling replica, so the freshest
/// replica is the one most likely to win the race to start an election.
const RANK_PENALTY_MS: u64 = 1000;

/// Counts sibling replicas of `my_master_id` with a higher replication
/// offset than ours; this node waits that many rank penalties before
/// attempting its own election.
fn compute_rank(state: &Arc<ServerState>, my_offset: u64, my_master_id: &str) -> u64 {
    let cluster = state.cluster.as_ref().expect("compute_rank requires cluster mode");
    cluster
        .replicas_of(my_master_id)
        .iter()
        .filter(|id| {
            id.as_str() != cluster.my_id
                && cluster
                    .nodes
                    .get(id.as_str())
                    .is_some_and(|r| r.node_info.replication_offset > my_offset)
        })
        .count() as u64
}

/// Called periodically by the gossip tick. Starts an election if this
/// node's master is down, or advances a pending manual failover.
pub async fn handle_failover_cron(state: &Arc<ServerState>, links: &PeerLinks) {
    let cluster = state
        .cluster
        .as_ref()
        .expect("Failover cron must run in cluster mode");

    // Master side: release the client pause once the handshake has run past
    // its deadline without the replica reporting back (e.g. it crashed).
    {
        let mut mf = cluster.manual_failover.lock();
        if mf.paused_for.is_some() && mf.end.is_some_and(|end| std::time::Instant::now() >= end) {
            info!("Manual failover pause window for {:?} expired; releasing.", mf.paused_for);
            *mf = Default::default();
        }
    }

    // Replica side: once our applied offset catches up to the offset the
    // master reported in its last PAUSED ping, we may run a delay-free
    // election without waiting for the master to actually be FAIL.
    let pending_target_offset = {
        let mf = cluster.manual_failover.lock();
        (!mf.can_start).then_some(mf.master_offset).flatten()
    };
    if let Some(target_offset) = pending_target_offset {
        let my_offset = state
            .replication
            .replica_info
            .lock()
            .await
            .as_ref()
            .map_or(0, |i| i.processed_offset);
        if my_offset >= target_offset {
            cluster.manual_failover.lock().can_start = true;
        }
    }

    let manual_ready = cluster.manual_failover.lock().can_start;
    if manual_ready {
        start_election(state, links, true).await;
        return;
    }

    if !state.config.lock().await.cluster.replica_initiated_failover {
        return;
    }

    if let Some(my_master_id) = &cluster.get_my_config().node_info.replica_of
        && let Some(master_node) = cluster.nodes.get(my_master_id)
        && master_node.node_info.get_flags().contains(NodeFlags::FAIL)
    {
        start_election(state, links, false).await;
    }
}

/// Starts (or re-attempts) an election for this replica to become master.
/// `force` skips the rank delay and data-freshness abort check, used for a
/// manual failover that has already confirmed a caught-up offset.
async fn start_election(state: &Arc<ServerState>, links: &PeerLinks, force: bool) {
    let cluster = state
        .cluster
        .as_ref()
        .expect("start_election must run in cluster mode");
    let now_unix_ms = super::gossip::now_ms();

    let last_auth_time = cluster.failover_auth_time.load(Ordering::Relaxed);
    if !force && now_unix_ms < last_auth_time + (FAILOVER_BASE_DELAY_MS * 2) {
        return;
    }

    let Some(my_master_id) = cluster.get_my_config().node_info.replica_of.clone() else {
        return;
    };
    let my_offset = state
        .replication
        .replica_info
        .lock()
        .await
        .as_ref()
        .map_or(0, |i| i.processed_offset);

    if !force {
        let rank = compute_rank(state, my_offset, &my_master_id);
        for entry in cluster.nodes.iter() {
            let other = &entry.value().node_info;
            if other.id != cluster.my_id
                && other.replica_of.as_deref() == Some(my_master_id.as_str())
                && other.replication_offset > my_offset
                && rank == 0
            {
                info!(
                    "Aborting election: {} has a higher replication offset ({} vs my {}).",
                    other.id, other.replication_offset, my_offset
                );
                return;
            }
        }

        let random_delay_ms = rand::thread_rng().gen_range(0..=FAILOVER_BASE_DELAY_MS);
        let total_delay = Duration::from_millis(
            FAILOVER_BASE_DELAY_MS + rank * RANK_PENALTY_MS + random_delay_ms,
        );
        info!("Master is down. Waiting {:?} before starting election (rank {}).", total_delay, rank);
        tokio::time::sleep(total_delay).await;

        if let Some(master_node) = cluster.nodes.get(&my_master_id)
            && !master_node
                .node_info
                .get_flags()
                .intersects(NodeFlags::FAIL | NodeFlags::PFAIL)
        {
            info!("Master is back online. Aborting election.");
            return;
        }
    }

    let new_epoch = if force {
        epoch::bump_for_unconsensual_claim(cluster)
    } else {
        cluster.get_new_config_epoch()
    };
    cluster.failover_auth_time.store(now_unix_ms, Ordering::Relaxed);
    cluster.failover_auth_count.store(1, Ordering::Relaxed);
    cluster.failover_auth_epoch.store(new_epoch, Ordering::Relaxed);
    cluster.failover_auth_sent.store(true, Ordering::Relaxed);

    info!("Starting a new election for epoch {} with offset {}", new_epoch, my_offset);

    let targets: Vec<String> = cluster
        .nodes
        .iter()
        .filter(|n| {
            let f = n.value().node_info.get_flags();
            f.contains(NodeFlags::PRIMARY) && !f.contains(NodeFlags::MYSELF)
        })
        .map(|n| n.key().clone())
        .collect();

    let message_flags = if force { MessageFlags::FORCEACK } else { MessageFlags::empty() };
    for target in targets {
        let _ = send_payload(
            state,
            cluster,
            links,
            &target,
            MessageType::FailoverAuthRequest,
            message_flags,
            Payload::Empty,
        )
        .await;
    }
}

/// Multiplier applied to `node_timeout` for rule 5's re-vote cooldown: once
/// we've voted for a replica of a given failed master, we won't vote for a
/// *different* replica of that same master again until this much time has
/// passed, avoiding split votes between siblings racing for the same seat.
const VOTE_COOLDOWN_MULTIPLIER: u64 = 2;

/// Handles a vote request from a candidate replica, applying each of the
/// six gating rules in turn:
///
/// 1. We must be a master serving at least one slot to vote at all.
/// 2. The request's epoch must not be behind our own current epoch.
/// 3. We must not have already granted a vote during the current epoch.
/// 4. The candidate must be a replica whose master is known and is either
///    FAIL, or the request carries `force_ack` (manual failover).
/// 5. We must not have voted for a (possibly different) replica of that
///    same master within the last `2 * node_timeout`.
/// 6. For every slot the failed master held, our locally known owner of
///    that slot must not carry a higher configEpoch than the candidate is
///    requesting — otherwise the candidate's view of ownership is stale.
pub async fn handle_auth_request(
    state: &Arc<ServerState>,
    links: &PeerLinks,
    candidate_id: String,
    candidate_epoch: u64,
    force_ack: bool,
) {
    let cluster = state
        .cluster
        .as_ref()
        .expect("handle_auth_request must run in cluster mode");

    let my_config = cluster.get_my_config();
    if !my_config.node_info.get_flags().contains(NodeFlags::PRIMARY)
        || my_config.node_info.slots.is_empty()
    {
        return;
    }
    drop(my_config);

    let my_current_epoch = cluster.current_epoch.load(Ordering::Relaxed);
    if candidate_epoch < my_current_epoch {
        warn!(
            "Rejecting vote request from {} for epoch {} (behind our current epoch {})",
            candidate_id, candidate_epoch, my_current_epoch
        );
        return;
    }

    let last_vote_epoch = cluster.last_vote_epoch.load(Ordering::Relaxed);
    if last_vote_epoch == my_current_epoch {
        warn!(
            "Rejecting vote request from {}: already voted in epoch {}",
            candidate_id, my_current_epoch
        );
        return;
    }

    let Some(failed_master_id) = cluster
        .nodes
        .get(&candidate_id)
        .and_then(|n| n.node_info.replica_of.clone())
    else {
        warn!("Rejecting vote for {}: not a known replica.", candidate_id);
        return;
    };

    // Fetched up front so no lock/Ref needs to be held across an `.await`.
    let node_timeout = state.config.lock().await.cluster.node_timeout;

    let Some(failed_master) = cluster.nodes.get(&failed_master_id) else {
        warn!(
            "Rejecting vote for {}: its master {} is unknown.",
            candidate_id, failed_master_id
        );
        return;
    };

    if !force_ack && !failed_master.node_info.get_flags().contains(NodeFlags::FAIL) {
        warn!(
            "Rejecting vote for {}: its master {} is not FAIL.",
            candidate_id, failed_master_id
        );
        return;
    }

    if !force_ack
        && let Some(voted_time) = failed_master.voted_time
        && voted_time.elapsed() < Duration::from_millis(node_timeout * VOTE_COOLDOWN_MULTIPLIER)
    {
        warn!(
            "Rejecting vote for {}: already voted for a replica of {} too recently.",
            candidate_id, failed_master_id
        );
        return;
    }

    for &slot in &failed_master.node_info.slots {
        if let Some(owner_id) = cluster.slots_map[slot as usize].read().clone()
            && let Some(owner) = cluster.nodes.get(&owner_id)
            && owner.node_info.config_epoch > candidate_epoch
        {
            warn!(
                "Rejecting vote for {}: slot {} is owned by {} at a newer epoch ({} > {}).",
                candidate_id, slot, owner_id, owner.node_info.config_epoch, candidate_epoch
            );
            return;
        }
    }
    drop(failed_master);

    cluster.last_vote_epoch.store(my_current_epoch, Ordering::Relaxed);
    if let Some(mut failed_master_runtime) = cluster.nodes.get_mut(&failed_master_id) {
        failed_master_runtime.voted_time = Some(std::time::Instant::now());
    }
    info!("Voting for node {} in epoch {}", candidate_id, candidate_epoch);

    let _ = send_payload(
        state,
        cluster,
        links,
        &candidate_id,
        MessageType::FailoverAuthAck,
        MessageFlags::empty(),
        Payload::Empty,
    )
    .await;
}

/// Handles a vote reply from a master. Promotes this node once a majority
/// of known masters have voted for the current election epoch.
pub async fn handle_auth_ack(state: &Arc<ServerState>, sender_id: String, ack_epoch: u64) {
    let cluster = state
        .cluster
        .as_ref()
        .expect("handle_auth_ack must run in cluster mode");
    let my_election_epoch = cluster.failover_auth_epoch.load(Ordering::Relaxed);

    if !cluster.get_my_config().node_info.get_flags().contains(NodeFlags::REPLICA)
        || ack_epoch != my_election_epoch
    {
        return;
    }

    let current_votes = cluster.failover_auth_count.fetch_add(1, Ordering::Relaxed) + 1;
    info!("Received vote from {}. Total votes: {}", sender_id, current_votes);

    // Use the operator-configured quorum rather than a dynamically counted
    // one, so the threshold an election must clear is the one actually
    // configured for split-brain prevention.
    let needed_votes = state.config.lock().await.cluster.failover_quorum;
    if current_votes >= needed_votes as u64 {
        info!("Won the election with {} votes. Promoting to master.", current_votes);
        promote_to_master(state).await;
        cluster.failover_auth_count.store(0, Ordering::Relaxed);
        cluster.failover_auth_sent.store(false, Ordering::Relaxed);
        let mut mf = cluster.manual_failover.lock();
        *mf = Default::default();
    }
}

/// Master-side receiver of a manual failover request: one of our own
/// replicas has asked us to pause writes so it can catch up and take over.
/// We record which replica we're pausing for; `send_ping`/`gossip_tick`
/// pick this up to flag outgoing pings to it PAUSED, each carrying our
/// current replication offset for the replica to match before proceeding.
pub async fn handle_mf_request(state: &Arc<ServerState>, cluster: &super::state::ClusterState, replica_id: String) {
    if cluster.get_my_config().node_info.get_flags().contains(NodeFlags::REPLICA) {
        return;
    }
    if !cluster
        .nodes
        .get(&replica_id)
        .is_some_and(|r| r.node_info.replica_of.as_deref() == Some(cluster.my_id.as_str()))
    {
        warn!("Ignoring MFSTART from {}: not one of our replicas.", replica_id);
        return;
    }

    let mf_timeout = state.config.lock().await.cluster.mf_timeout;
    let mut mf = cluster.manual_failover.lock();
    *mf = Default::default();
    mf.end = Some(std::time::Instant::now() + Duration::from_millis(mf_timeout * 2));
    mf.paused_for = Some(replica_id.clone());
    info!("Received MFSTART from replica {}; pausing writes for handoff", replica_id);
}

/// Promotes this node from replica to master after winning an election.
async fn promote_to_master(state: &Arc<ServerState>) {
    let cluster = state
        .cluster
        .as_ref()
        .expect("promote_to_master must run in cluster mode");
    let my_old_master_id = cluster.get_my_config().node_info.replica_of.clone();
    let election_epoch = cluster.failover_auth_epoch.load(Ordering::Relaxed);
    finalize_promotion(state, election_epoch, my_old_master_id.as_deref()).await;
}

/// Shared tail of becoming master, used both after winning an election and
/// after a `CLUSTER FAILOVER TAKEOVER`: adopts `new_epoch`, takes over the
/// old master's slots, switches the local replication config to primary,
/// and signals the replication worker to reconfigure.
async fn finalize_promotion(state: &Arc<ServerState>, new_epoch: u64, old_master_id: Option<&str>) {
    let cluster = state
        .cluster
        .as_ref()
        .expect("finalize_promotion must run in cluster mode");

    cluster.update_my_role_to_master(new_epoch);

    if let Some(old_master_id) = old_master_id {
        cluster.take_over_slots_from(old_master_id);
    }

    {
        let mut config = state.config.lock().await;
        config.replication = ReplicationConfig::Primary(ReplicationPrimaryConfig::default());
        info!("Updated main server config to PRIMARY role.");
    }

    if state.replication_reconfigure_tx.send(()).is_err() {
        warn!("Could not send reconfigure signal to replication worker after promotion.");
    }

    let _ = cluster.save_config();
}

/// Entry point for `CLUSTER FAILOVER`, run on the replica that received the
/// command against its own master. The non-`takeover` path requests our
/// master pause client writes and sends us its offset; once our applied
/// offset catches up, `handle_failover_cron` runs a delay-free election.
/// `takeover` skips the handshake and vote entirely, immediately bumping
/// our own epoch and promoting ourselves (only safe when the operator has
/// verified we're caught up).
pub async fn begin_manual_failover(
    state: &Arc<ServerState>,
    links: &PeerLinks,
    takeover: bool,
) -> Result<(), SpinelDBError> {
    let cluster = state
        .cluster
        .as_ref()
        .ok_or_else(|| SpinelDBError::InvalidState("not running in cluster mode".into()))?;

    if !cluster.get_my_config().node_info.get_flags().contains(NodeFlags::REPLICA) {
        return Err(SpinelDBError::InvalidState(
            "CLUSTER FAILOVER must be run on a replica".into(),
        ));
    }
    let Some(my_master_id) = cluster.get_my_config().node_info.replica_of.clone() else {
        return Err(SpinelDBError::InvalidState(
            "this replica has no master on record".into(),
        ));
    };

    let mf_timeout = state.config.lock().await.cluster.mf_timeout;
    {
        let mut mf = cluster.manual_failover.lock();
        *mf = Default::default();
        mf.end = Some(std::time::Instant::now() + Duration::from_millis(mf_timeout * 2));
    }

    if takeover {
        let new_epoch = epoch::bump_for_unconsensual_claim(cluster);
        finalize_promotion(state, new_epoch, Some(&my_master_id)).await;
        {
            let mut mf = cluster.manual_failover.lock();
            *mf = Default::default();
        }
        info!(
            "CLUSTER FAILOVER TAKEOVER: took over master {} at epoch {}",
            my_master_id, new_epoch
        );
        return Ok(());
    }

    send_payload(
        state,
        cluster,
        links,
        &my_master_id,
        MessageType::MfStart,
        MessageFlags::empty(),
        Payload::Empty,
    )
    .await
    .map_err(|e| SpinelDBError::Internal(format!("failed to request manual failover: {e}")))?;

    info!("CLUSTER FAILOVER: requested master {} to pause for handoff", my_master_id);
    Ok(())
}

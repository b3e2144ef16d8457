// src/core/cluster/state.rs

//! Manages the shared state of the cluster: node registry, slot ownership,
//! blacklist, and failover/manual-failover scratch state.

use super::slot::NUM_SLOTS;
use crate::config::{Config, IntoMutex, ReplicationConfig};
use crate::core::SpinelDBError;
use crate::core::state::ServerState;
use bitflags::bitflags;
use dashmap::DashMap;
use dashmap::mapref::one::Ref;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Blacklisted node IDs (from `CLUSTER FORGET`) are kept out of the registry
/// for this long, so a stale gossip entry can't immediately resurrect them.
pub const BLACKLIST_TTL: Duration = Duration::from_secs(60);

/// The role of a node in the cluster.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
pub enum NodeRole {
    Primary,
    Replica,
}

bitflags! {
    /// Flags representing the state and role of a cluster node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct NodeFlags: u16 {
        const MYSELF         = 1 << 0;  // The node is this server instance.
        const PRIMARY        = 1 << 1;  // The node is a primary (master).
        const REPLICA        = 1 << 2;  // The node is a replica (slave).
        const PFAIL          = 1 << 3;  // Possible failure (unconfirmed).
        const FAIL           = 1 << 4;  // Confirmed failure.
        const HANDSHAKE      = 1 << 5;  // Node is in handshake, not yet part of the cluster.
        const NOADDR         = 1 << 6;  // Node address is unknown.
    }
}

/// Represents the configuration and static state of a node, gossiped and persisted.
#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct ClusterNode {
    pub id: String,
    pub addr: String,
    pub bus_addr: String,
    pub flags_raw: u16,
    pub replica_of: Option<String>,
    pub slots: BTreeSet<u16>,
    pub config_epoch: u64,
    #[serde(default)]
    pub replication_offset: u64,
    /// Whether this master has ever had at least one replica attached, used
    /// by the orphan-migration heuristic to distinguish "never had a
    /// replica" from "lost its only replica".
    #[serde(default)]
    pub had_replicas: bool,
}

impl ClusterNode {
    /// Gets the state flags for this node.
    pub fn get_flags(&self) -> NodeFlags {
        NodeFlags::from_bits_truncate(self.flags_raw)
    }
    /// Sets the state flags for this node.
    pub fn set_flags(&mut self, flags: NodeFlags) {
        self.flags_raw = flags.bits();
    }
}

/// Represents the runtime state of a node, which is not persisted or gossiped.
#[derive(Debug, Clone)]
pub struct NodeRuntimeState {
    pub node_info: ClusterNode,
    pub ping_sent: Option<Instant>,
    pub pong_received: Option<Instant>,
    /// Tracks which nodes have reported this node as PFAIL/FAIL. Key: reporter_id.
    pub fail_reports: HashMap<String, Instant>,
    /// When we (acting as a master) last voted for a replica of this node.
    /// Only meaningful for entries representing a master.
    pub voted_time: Option<Instant>,
    /// When this node's FAIL flag was raised, used by the undo-multiplier
    /// grace window in the failure detector.
    pub fail_time: Option<Instant>,
}

/// Scratch state for both sides of a `CLUSTER FAILOVER` handshake.
#[derive(Debug, Default, Clone)]
pub struct ManualFailoverState {
    /// Master side: deadline until which client writes are paused.
    pub end: Option<Instant>,
    /// Replica side: the post-pause offset reported by the master. `None`
    /// means "not yet received", distinct from an offset of literal zero.
    pub master_offset: Option<u64>,
    /// Replica side: whether the offset gate has been satisfied and the
    /// elector may run with zero rank delay.
    pub can_start: bool,
    /// Master side: the replica we are pausing writes for, so the ping
    /// sender knows to flag its packets PAUSED and carry our offset.
    pub paused_for: Option<String>,
}

/// `ClusterState` is the main container for all cluster-related information on this node.
pub struct ClusterState {
    /// The unique 40-character hexadecimal run ID of this node.
    pub my_id: String,
    /// The current configuration epoch of the cluster, used for failover ordering.
    pub current_epoch: AtomicU64,
    /// The last epoch for which this node (as a master) cast a failover vote.
    pub last_vote_epoch: AtomicU64,
    /// The last used epoch for a `CACHE.PURGETAG` operation.
    pub last_purge_epoch: AtomicU64,
    /// A map of all known nodes in the cluster, keyed by their unique run ID.
    pub nodes: DashMap<String, NodeRuntimeState>,
    /// A mapping of each of the 16384 hash slots to the ID of the node that owns it.
    pub slots_map: Vec<RwLock<Option<String>>>,
    /// Per-slot destination node ID while a slot is being migrated away.
    pub migrating_slots_to: Vec<RwLock<Option<String>>>,
    /// Per-slot source node ID while a slot is being imported.
    pub importing_slots_from: Vec<RwLock<Option<String>>>,
    /// Node IDs evicted via `CLUSTER FORGET`, kept out for `BLACKLIST_TTL`.
    pub blacklist: DashMap<String, Instant>,
    /// The file path for the persisted cluster configuration (`nodes.conf`).
    pub config_file_path: String,
    // --- Failover-election scratch fields (replica side) ---
    pub failover_auth_time: AtomicU64,
    pub failover_auth_count: AtomicU64,
    pub failover_auth_rank: AtomicU64,
    pub failover_auth_epoch: AtomicU64,
    pub failover_auth_sent: AtomicBool,
    // --- Manual failover scratch state ---
    pub manual_failover: Mutex<ManualFailoverState>,
    /// Timestamp (ms since UNIX epoch) at which this node entered a minority
    /// partition, or 0 if not currently in one.
    pub minority_time: AtomicU64,
    /// Whether the cluster is currently considered healthy (`cluster_state:ok`).
    pub cluster_ok: AtomicBool,
}

impl std::fmt::Debug for ClusterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterState")
            .field("my_id", &self.my_id)
            .field("current_epoch", &self.current_epoch)
            .field("node_count", &self.nodes.len())
            .finish()
    }
}

fn new_slot_table() -> Vec<RwLock<Option<String>>> {
    (0..NUM_SLOTS).map(|_| RwLock::new(None)).collect()
}

fn compute_bus_addr(config: &Config) -> Result<(String, u16, u16), SpinelDBError> {
    let my_addr = config
        .cluster
        .announce_ip
        .clone()
        .unwrap_or_else(|| config.host.clone());
    let my_port = config.cluster.announce_port.unwrap_or(config.port);

    let my_bus_port =
        match u32::from(config.port).checked_add(u32::from(config.cluster.bus_port_offset)) {
            Some(port_u32) if port_u32 <= u32::from(u16::MAX) => {
                config.cluster.announce_bus_port.unwrap_or(port_u32 as u16)
            }
            _ => {
                let calculated_port =
                    u32::from(config.port) + u32::from(config.cluster.bus_port_offset);
                let err_msg = format!(
                    "Calculated cluster bus port ({calculated_port}) exceeds the valid range (max 65535). Please check 'port' and 'bus_port_offset' settings."
                );
                error!("FATAL: {}", err_msg);
                return Err(SpinelDBError::Internal(err_msg));
            }
        };
    Ok((my_addr, my_port, my_bus_port))
}

impl ClusterState {
    /// Creates a new, fresh `ClusterState` for a node starting for the first time.
    pub fn new(config: &Config) -> Result<Self, SpinelDBError> {
        let my_id = hex::encode(rand::random::<[u8; 20]>());
        let nodes = DashMap::new();

        let (my_addr, my_port, my_bus_port) = compute_bus_addr(config)?;

        let myself_info = ClusterNode {
            id: my_id.clone(),
            addr: format!("{my_addr}:{my_port}"),
            bus_addr: format!("{my_addr}:{my_bus_port}"),
            flags_raw: (NodeFlags::MYSELF | NodeFlags::PRIMARY).bits(),
            replica_of: None,
            slots: BTreeSet::new(),
            config_epoch: 0,
            replication_offset: 0,
            had_replicas: false,
        };
        let myself_runtime = NodeRuntimeState {
            node_info: myself_info,
            ping_sent: None,
            pong_received: Some(Instant::now()),
            fail_reports: HashMap::new(),
            voted_time: None,
            fail_time: None,
        };
        nodes.insert(my_id.clone(), myself_runtime);

        Ok(Self {
            my_id,
            current_epoch: AtomicU64::new(0),
            last_vote_epoch: AtomicU64::new(0),
            last_purge_epoch: AtomicU64::new(0),
            nodes,
            slots_map: new_slot_table(),
            migrating_slots_to: new_slot_table(),
            importing_slots_from: new_slot_table(),
            blacklist: DashMap::new(),
            config_file_path: config.cluster.config_file.clone(),
            failover_auth_time: AtomicU64::new(0),
            failover_auth_count: AtomicU64::new(0),
            failover_auth_rank: AtomicU64::new(0),
            failover_auth_epoch: AtomicU64::new(0),
            failover_auth_sent: AtomicBool::new(false),
            manual_failover: Mutex::new(ManualFailoverState::default()),
            minority_time: AtomicU64::new(0),
            cluster_ok: AtomicBool::new(true),
        })
    }

    /// Loads cluster state from a `nodes.conf`-style line-oriented text file.
    /// Any parse error is treated as configuration corruption and is fatal,
    /// matching the rest of the persisted-config handling in this server.
    pub fn from_file(path: &str, server_config: &Config) -> Result<Self, SpinelDBError> {
        let content = std::fs::read_to_string(path)?;
        let mut my_id = None;
        let mut current_epoch = 0u64;
        let mut last_vote_epoch = 0u64;
        let nodes = DashMap::new();
        let slots_map = new_slot_table();
        let migrating_slots_to = new_slot_table();
        let importing_slots_from = new_slot_table();

        for (lineno, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix("vars ") {
                parse_vars_line(rest, &mut current_epoch, &mut last_vote_epoch).map_err(|e| {
                    SpinelDBError::Internal(format!("nodes.conf line {}: {e}", lineno + 1))
                })?;
                continue;
            }

            let parsed = parse_node_line(line).map_err(|e| {
                SpinelDBError::Internal(format!("nodes.conf line {}: {e}", lineno + 1))
            })?;

            if parsed.info.get_flags().contains(NodeFlags::MYSELF) {
                my_id = Some(parsed.info.id.clone());
            }
            for &slot in &parsed.info.slots {
                *slots_map[slot as usize].write() = Some(parsed.info.id.clone());
            }
            for (slot, dest) in &parsed.migrating_map {
                *migrating_slots_to[*slot as usize].write() = Some(dest.clone());
            }
            for (slot, src) in &parsed.importing_map {
                *importing_slots_from[*slot as usize].write() = Some(src.clone());
            }

            let runtime = NodeRuntimeState {
                node_info: parsed.info,
                ping_sent: None,
                pong_received: None,
                fail_reports: HashMap::new(),
                voted_time: None,
                fail_time: None,
            };
            nodes.insert(runtime.node_info.id.clone(), runtime);
        }

        let my_id = my_id.ok_or_else(|| {
            SpinelDBError::Internal("nodes.conf contains no 'myself' entry".to_string())
        })?;

        // Re-derive my own announced address from the live server config, and
        // override the replication target if nodes.conf recorded a master.
        if let Some(mut myself) = nodes.get_mut(&my_id) {
            let (my_addr, my_port, my_bus_port) = compute_bus_addr(server_config)?;
            myself.node_info.addr = format!("{my_addr}:{my_port}");
            myself.node_info.bus_addr = format!("{my_addr}:{my_bus_port}");
            myself.pong_received = Some(Instant::now());

            if let Some(master_id) = myself.node_info.replica_of.clone()
                && let Some(master) = nodes.get(&master_id)
                && let Some((host, port_str)) = master.node_info.addr.split_once(':')
                && let Ok(port) = port_str.parse::<u16>()
                && let Ok(mut config) = server_config.clone().into_mutex().try_lock()
            {
                info!(
                    "Overriding replication config from nodes.conf: now replicating {}",
                    master.node_info.addr
                );
                config.replication = ReplicationConfig::Replica {
                    primary_host: host.to_string(),
                    primary_port: port,
                    tls_enabled: false,
                };
            }
        }

        Ok(Self {
            my_id,
            current_epoch: AtomicU64::new(current_epoch),
            last_vote_epoch: AtomicU64::new(last_vote_epoch),
            last_purge_epoch: AtomicU64::new(0),
            nodes,
            slots_map,
            migrating_slots_to,
            importing_slots_from,
            blacklist: DashMap::new(),
            config_file_path: path.to_string(),
            failover_auth_time: AtomicU64::new(0),
            failover_auth_count: AtomicU64::new(0),
            failover_auth_rank: AtomicU64::new(0),
            failover_auth_epoch: AtomicU64::new(current_epoch),
            failover_auth_sent: AtomicBool::new(false),
            manual_failover: Mutex::new(ManualFailoverState::default()),
            minority_time: AtomicU64::new(0),
            cluster_ok: AtomicBool::new(true),
        })
    }

    /// Saves the current cluster configuration to the `nodes.conf` file
    /// atomically: write to a temp file in the same directory, fsync it, then
    /// rename over the target.
    pub fn save_config(&self) -> Result<(), SpinelDBError> {
        let mut out = String::new();
        for entry in self.nodes.iter() {
            out.push_str(&self.format_node_line(entry.value()));
            out.push('\n');
        }
        out.push_str(&format!(
            "vars currentEpoch {} lastVoteEpoch {}\n",
            self.current_epoch.load(Ordering::Relaxed),
            self.last_vote_epoch.load(Ordering::Relaxed)
        ));

        let temp_path = format!("{}.tmp-{}", self.config_file_path, rand::random::<u32>());
        {
            use std::io::Write;
            let mut f = std::fs::File::create(&temp_path)?;
            f.write_all(out.as_bytes())?;
            f.sync_all()?;
        }
        std::fs::rename(&temp_path, &self.config_file_path)?;
        info!("Cluster config saved to {}", self.config_file_path);
        Ok(())
    }

    fn format_node_line(&self, runtime: &NodeRuntimeState) -> String {
        let node = &runtime.node_info;
        let mut flags = Vec::new();
        let f = node.get_flags();
        if f.contains(NodeFlags::MYSELF) {
            flags.push("myself");
        }
        if f.contains(NodeFlags::PRIMARY) {
            flags.push("master");
        }
        if f.contains(NodeFlags::REPLICA) {
            flags.push("slave");
        }
        if f.contains(NodeFlags::PFAIL) {
            flags.push("fail?");
        }
        if f.contains(NodeFlags::FAIL) {
            flags.push("fail");
        }
        if f.contains(NodeFlags::HANDSHAKE) {
            flags.push("handshake");
        }
        if f.contains(NodeFlags::NOADDR) {
            flags.push("noaddr");
        }
        if flags.is_empty() {
            flags.push("noflags");
        }

        let master = node.replica_of.clone().unwrap_or_else(|| "-".to_string());
        let ping_sent = runtime.ping_sent.map_or(0, |t| t.elapsed().as_millis());
        let pong_received = runtime
            .pong_received
            .map_or(0, |t| t.elapsed().as_millis());
        let link_state = "connected";

        let mut line = format!(
            "{} {} {} {} {} {} {} {}",
            node.id,
            node.bus_addr,
            flags.join(","),
            master,
            ping_sent,
            pong_received,
            node.config_epoch,
            link_state
        );

        for range in slot_ranges(&node.slots) {
            line.push(' ');
            line.push_str(&range);
        }

        if f.contains(NodeFlags::MYSELF) {
            for slot in 0..NUM_SLOTS {
                if let Some(dest) = self.migrating_slots_to[slot].read().clone() {
                    line.push_str(&format!(" [{slot}->-{dest}]"));
                }
                if let Some(src) = self.importing_slots_from[slot].read().clone() {
                    line.push_str(&format!(" [{slot}-<-{src}]"));
                }
            }
        }

        line
    }

    /// Blacklists a node ID for `BLACKLIST_TTL`, preventing it from being
    /// rediscovered via gossip until the entry expires.
    pub fn blacklist_node(&self, node_id: &str) {
        self.blacklist
            .insert(node_id.to_string(), Instant::now() + BLACKLIST_TTL);
    }

    pub fn is_blacklisted(&self, node_id: &str) -> bool {
        match self.blacklist.get(node_id) {
            Some(expiry) if *expiry > Instant::now() => true,
            Some(_) => {
                self.blacklist.remove(node_id);
                false
            }
            None => false,
        }
    }

    /// Removes a node from the registry (`CLUSTER FORGET`): unassigns any
    /// slots it owned, clears fail-reports referencing it, blacklists it,
    /// and clears the `replica_of` back-reference on any of its replicas.
    pub fn forget_node(&self, node_id: &str) {
        if let Some((_, removed)) = self.nodes.remove(node_id) {
            for &slot in &removed.node_info.slots {
                let mut owner = self.slots_map[slot as usize].write();
                if owner.as_deref() == Some(node_id) {
                    *owner = None;
                }
            }
        }
        for mut entry in self.nodes.iter_mut() {
            entry.value_mut().fail_reports.remove(node_id);
            if entry.value().node_info.replica_of.as_deref() == Some(node_id) {
                entry.value_mut().node_info.replica_of = None;
            }
        }
        self.blacklist_node(node_id);
    }

    /// Records a PFAIL/FAIL report from one node about another.
    pub fn add_fail_report(&self, node_id: &str, reporter_id: &str) {
        if let Some(mut runtime_state) = self.nodes.get_mut(node_id)
            && !runtime_state
                .node_info
                .get_flags()
                .intersects(NodeFlags::MYSELF | NodeFlags::HANDSHAKE | NodeFlags::NOADDR)
        {
            runtime_state
                .fail_reports
                .insert(reporter_id.to_string(), Instant::now());
        }
    }

    pub fn remove_fail_report(&self, node_id: &str, reporter_id: &str) {
        if let Some(mut runtime_state) = self.nodes.get_mut(node_id) {
            runtime_state.fail_reports.remove(reporter_id);
        }
    }

    /// Marks a node as PFAIL, the unconfirmed, locally-observed suspicion state.
    pub fn mark_node_as_pfail(&self, node_id: &str) {
        if let Some(mut runtime_state) = self.nodes.get_mut(node_id) {
            let flags = runtime_state.node_info.get_flags();
            if flags.intersects(NodeFlags::MYSELF | NodeFlags::PFAIL | NodeFlags::FAIL) {
                return;
            }
            let mut new_flags = flags;
            new_flags.insert(NodeFlags::PFAIL);
            runtime_state.node_info.set_flags(new_flags);
            info!("Marking node {} as PFAIL", node_id);
        }
    }

    /// Marks a node FAIL directly (e.g. on receiving a `FAIL` bus message, or
    /// locally once quorum is reached).
    pub fn mark_node_as_fail(&self, node_id: &str) {
        if let Some(mut runtime_state) = self.nodes.get_mut(node_id) {
            let flags = runtime_state.node_info.get_flags();
            if flags.contains(NodeFlags::FAIL) || flags.contains(NodeFlags::MYSELF) {
                return;
            }
            let mut new_flags = flags;
            new_flags.remove(NodeFlags::PFAIL);
            new_flags.insert(NodeFlags::FAIL);
            runtime_state.node_info.set_flags(new_flags);
            runtime_state.fail_time = Some(Instant::now());
            info!("Marking node {} as FAIL", node_id);
        }
    }

    /// Clears the FAIL flag if nobody ever took over the node's slots within
    /// the undo-multiplier grace window (spec's FAIL-undo rule).
    pub fn maybe_undo_fail(&self, node_id: &str, node_timeout_ms: u64, undo_multiplier: u64) {
        let grace = Duration::from_millis(node_timeout_ms.saturating_mul(undo_multiplier));
        if let Some(mut runtime_state) = self.nodes.get_mut(node_id) {
            let flags = runtime_state.node_info.get_flags();
            if !flags.contains(NodeFlags::FAIL) || !runtime_state.node_info.slots.is_empty() {
                return;
            }
            if runtime_state.fail_time.is_some_and(|t| t.elapsed() > grace) {
                let mut new_flags = flags;
                new_flags.remove(NodeFlags::FAIL);
                runtime_state.node_info.set_flags(new_flags);
                runtime_state.fail_time = None;
                info!("Clearing stale FAIL flag for node {} (undo window elapsed)", node_id);
            }
        }
    }

    /// Drops failure reports older than `node_timeout * validity_multiplier`.
    pub fn prune_stale_fail_reports(&self, node_timeout_ms: u64, validity_multiplier: u64) {
        let timeout = Duration::from_millis(node_timeout_ms.saturating_mul(validity_multiplier));
        for mut entry in self.nodes.iter_mut() {
            entry
                .value_mut()
                .fail_reports
                .retain(|_, &mut report_time| report_time.elapsed() < timeout);
        }
    }

    /// Promotes a node from PFAIL to FAIL once a strict majority of masters
    /// (including ourselves, if we are a master) have reported it within
    /// the validity window.
    pub fn promote_pfail_to_fail(&self, node_id: &str) -> bool {
        let needed = (self.cluster_size() / 2) + 1;
        if let Some(node) = self.nodes.get(node_id) {
            if node.node_info.get_flags().contains(NodeFlags::FAIL) {
                return false;
            }
            let mut reporters = node.fail_reports.len();
            if self
                .get_my_config()
                .node_info
                .get_flags()
                .contains(NodeFlags::PRIMARY)
            {
                reporters += 1;
            }
            if reporters >= needed.max(1) {
                drop(node);
                self.mark_node_as_fail(node_id);
                let _ = self.save_config();
                return true;
            }
        }
        false
    }

    /// Returns a reference to this node's own `NodeRuntimeState`.
    pub fn get_my_config(&self) -> Ref<String, NodeRuntimeState> {
        self.nodes
            .get(&self.my_id)
            .expect("Invariant violation: own node config should always exist in the cluster map")
    }

    /// Updates this node's role to PRIMARY after winning an election or takeover.
    pub fn update_my_role_to_master(&self, new_epoch: u64) {
        if let Some(mut myself) = self.nodes.get_mut(&self.my_id) {
            let mut flags = myself.node_info.get_flags();
            flags.remove(NodeFlags::REPLICA);
            flags.insert(NodeFlags::PRIMARY);
            myself.node_info.set_flags(flags);
            myself.node_info.replica_of = None;
            myself.node_info.config_epoch = new_epoch;
            info!(
                "Node {} promoted to PRIMARY for epoch {}",
                self.my_id, new_epoch
            );
        }
    }

    /// Takes over all hash slots from another node (failed master or manual
    /// failover target).
    pub fn take_over_slots_from(&self, old_master_id: &str) {
        let slots_to_claim: BTreeSet<u16> = if let Some(old_master) = self.nodes.get(old_master_id)
        {
            old_master.node_info.slots.clone()
        } else {
            return;
        };

        if slots_to_claim.is_empty() {
            return;
        }

        info!(
            "Taking over {} slots from old master {}",
            slots_to_claim.len(),
            old_master_id
        );

        if let Some(mut old_master_node) = self.nodes.get_mut(old_master_id) {
            old_master_node.node_info.slots.clear();
        }

        if let Some(mut myself) = self.nodes.get_mut(&self.my_id) {
            for slot in &slots_to_claim {
                *self.slots_map[*slot as usize].write() = Some(self.my_id.clone());
                *self.migrating_slots_to[*slot as usize].write() = None;
                *self.importing_slots_from[*slot as usize].write() = None;
            }
            myself.node_info.slots.extend(slots_to_claim);
        }
    }

    /// Counts masters that currently serve at least one slot ("size" in the
    /// spec's vocabulary): the denominator for majority-vote computations.
    pub fn cluster_size(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| {
                n.value().node_info.get_flags().contains(NodeFlags::PRIMARY)
                    && !n.value().node_info.slots.is_empty()
            })
            .count()
    }

    /// Counts the number of masters currently considered to be online (not
    /// PFAIL/FAIL) and serving at least one slot.
    pub fn count_online_masters(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| {
                let flags = n.value().node_info.get_flags();
                flags.contains(NodeFlags::PRIMARY)
                    && !flags.intersects(NodeFlags::FAIL | NodeFlags::PFAIL)
                    && !n.value().node_info.slots.is_empty()
            })
            .count()
    }

    /// Generates a new, unique configuration epoch for this node.
    pub fn get_new_config_epoch(&self) -> u64 {
        let current = self.current_epoch.load(Ordering::Relaxed);
        let my_epoch = self.get_my_config().node_info.config_epoch;
        let new_epoch = current.max(my_epoch) + 1;
        self.current_epoch.store(new_epoch, Ordering::Relaxed);
        new_epoch
    }

    /// Adopts `epoch` into `current_epoch` if it is strictly greater.
    pub fn observe_epoch(&self, epoch: u64) {
        self.current_epoch.fetch_max(epoch, Ordering::Relaxed);
    }

    /// Returns a new, unique epoch for a cache purge operation.
    pub fn get_new_purge_epoch(&self) -> u64 {
        self.last_purge_epoch.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Merges information about another node received via gossip into our own state.
    pub async fn merge_node_info(&self, received_node: ClusterNode, state: &Arc<ServerState>) {
        if received_node.id == self.my_id || self.is_blacklisted(&received_node.id) {
            return;
        }
        if let Some(master_id) = &received_node.replica_of
            && let Some(mut master) = self.nodes.get_mut(master_id)
        {
            master.node_info.had_replicas = true;
        }

        if let Some(mut existing_runtime) = self.nodes.get_mut(&received_node.id) {
            let existing_node = &mut existing_runtime.node_info;
            if existing_node.config_epoch > received_node.config_epoch {
                return;
            }
            let pfail_flag = existing_node.get_flags() & NodeFlags::PFAIL;
            existing_node.set_flags(received_node.get_flags() | pfail_flag);
            existing_node.addr = received_node.addr.clone();
            existing_node.bus_addr = received_node.bus_addr.clone();
            existing_node.slots = received_node.slots.clone();
            existing_node.replica_of = received_node.replica_of.clone();
            existing_node.config_epoch = received_node.config_epoch;
            existing_node.replication_offset = received_node.replication_offset;
            existing_node.had_replicas |= received_node.had_replicas;
        } else {
            info!("Discovered new node {} via gossip", received_node.id);
            let new_runtime = NodeRuntimeState {
                node_info: received_node.clone(),
                ping_sent: None,
                pong_received: None,
                fail_reports: HashMap::new(),
                voted_time: None,
                fail_time: None,
            };
            self.nodes
                .insert(new_runtime.node_info.id.clone(), new_runtime);
        }

        self.observe_epoch(received_node.config_epoch);

        let my_config = self.get_my_config();
        // Demote only once the higher-epoch sender's claim leaves us with
        // zero slots of our own — a partial handoff must not self-demote.
        if my_config.node_info.get_flags().contains(NodeFlags::PRIMARY)
            && received_node.get_flags().contains(NodeFlags::PRIMARY)
            && received_node.config_epoch > my_config.node_info.config_epoch
            && !my_config.node_info.slots.is_empty()
            && my_config
                .node_info
                .slots
                .iter()
                .all(|s| received_node.slots.contains(s))
        {
            drop(my_config);
            let state_clone = state.clone();
            let Some(self_clone) = state.cluster.clone() else {
                return;
            };
            tokio::spawn(async move {
                if let Err(e) = self_clone
                    .reconfigure_as_replica_of(&state_clone, &received_node.id)
                    .await
                {
                    error!(
                        "Failed to automatically reconfigure as replica after epoch conflict: {}",
                        e
                    );
                }
            });
        }
    }

    /// Handles the case where this node discovers a new primary with a
    /// higher epoch owning slots we thought were ours, triggering
    /// self-demotion to a replica to prevent split-brain.
    pub async fn reconfigure_as_replica_of(
        &self,
        state: &Arc<ServerState>,
        new_master_id: &str,
    ) -> Result<(), SpinelDBError> {
        info!(
            "CONFLICT: Detected new master {} with a higher epoch. Stepping down to become a replica.",
            new_master_id
        );

        let new_master_addr = self
            .nodes
            .get(new_master_id)
            .map(|n| n.node_info.addr.clone())
            .ok_or_else(|| SpinelDBError::Internal("unknown new master".to_string()))?;

        let (host, port_str) = new_master_addr
            .split_once(':')
            .ok_or_else(|| SpinelDBError::Internal("invalid master address".to_string()))?;
        let port: u16 = port_str.parse()?;

        {
            let mut config_guard = state.config.lock().await;
            config_guard.replication = ReplicationConfig::Replica {
                primary_host: host.to_string(),
                primary_port: port,
                tls_enabled: false,
            };
        }

        if let Some(mut myself) = self.nodes.get_mut(&self.my_id) {
            let mut flags = myself.node_info.get_flags();
            flags.remove(NodeFlags::PRIMARY);
            flags.insert(NodeFlags::REPLICA);
            myself.node_info.set_flags(flags);
            myself.node_info.replica_of = Some(new_master_id.to_string());
            myself.node_info.slots.clear();
        }

        self.save_config()?;
        state.set_quorum_loss_read_only(false, "Reconfiguring as a replica.");

        if state.replication_reconfigure_tx.send(()).is_err() {
            warn!(
                "Could not send reconfigure signal to replication worker; it may not be running."
            );
        }

        Ok(())
    }

    /// Checks if this node is the owner of a given slot.
    pub fn i_own_slot(&self, slot: u16) -> bool {
        self.slots_map[slot as usize]
            .read()
            .as_ref()
            .is_some_and(|id| *id == self.my_id)
    }

    /// Returns the node that is responsible for a given slot.
    pub fn get_node_for_slot(&self, slot: u16) -> Option<Ref<String, NodeRuntimeState>> {
        let owner_id = self.slots_map[slot as usize].read();
        let owner_id_str = owner_id.as_deref()?;
        self.nodes.get(owner_id_str)
    }

    /// Lists the IDs of live replicas attached to a given master.
    pub fn replicas_of(&self, master_id: &str) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.value().node_info.replica_of.as_deref() == Some(master_id))
            .map(|n| n.key().clone())
            .collect()
    }
}

/// Formats a node's owned slots as the range/singleton tokens used by both
/// `CLUSTER NODES` and the persisted config.
pub fn slot_ranges(slots: &BTreeSet<u16>) -> Vec<String> {
    let mut ranges = Vec::new();
    let mut iter = slots.iter().peekable();
    while let Some(&start) = iter.next() {
        let mut end = start;
        while let Some(&&next) = iter.peek() {
            if next == end + 1 {
                end = next;
                iter.next();
            } else {
                break;
            }
        }
        if start == end {
            ranges.push(start.to_string());
        } else {
            ranges.push(format!("{start}-{end}"));
        }
    }
    ranges
}

struct ParsedNode {
    info: ClusterNode,
    migrating_map: std::collections::BTreeMap<u16, String>,
    importing_map: std::collections::BTreeMap<u16, String>,
}

fn parse_node_line(line: &str) -> Result<ParsedNode, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 8 {
        return Err(format!(
            "expected at least 8 fields, found {}",
            fields.len()
        ));
    }
    let id = fields[0].to_string();
    let bus_addr = fields[1].to_string();
    let flags_str = fields[2];
    let master = fields[3];
    let config_epoch: u64 = fields[6]
        .parse()
        .map_err(|_| "invalid configEpoch".to_string())?;

    let mut flags = NodeFlags::empty();
    for tok in flags_str.split(',') {
        match tok {
            "myself" => flags |= NodeFlags::MYSELF,
            "master" => flags |= NodeFlags::PRIMARY,
            "slave" => flags |= NodeFlags::REPLICA,
            "fail?" => flags |= NodeFlags::PFAIL,
            "fail" => flags |= NodeFlags::FAIL,
            "handshake" => flags |= NodeFlags::HANDSHAKE,
            "noaddr" => flags |= NodeFlags::NOADDR,
            "noflags" | "" => {}
            other => return Err(format!("unknown flag '{other}'")),
        }
    }

    let replica_of = if master == "-" {
        None
    } else {
        Some(master.to_string())
    };

    let mut slots = BTreeSet::new();
    let mut migrating_map = std::collections::BTreeMap::new();
    let mut importing_map = std::collections::BTreeMap::new();

    for tok in &fields[8..] {
        if let Some(inner) = tok.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            if let Some((slot_str, dest)) = inner.split_once("->-") {
                let slot: u16 = slot_str
                    .parse()
                    .map_err(|_| "bad migrating slot".to_string())?;
                migrating_map.insert(slot, dest.to_string());
            } else if let Some((slot_str, src)) = inner.split_once("-<-") {
                let slot: u16 = slot_str
                    .parse()
                    .map_err(|_| "bad importing slot".to_string())?;
                importing_map.insert(slot, src.to_string());
            }
            continue;
        }
        if let Some((a, b)) = tok.split_once('-') {
            let start: u16 = a.parse().map_err(|_| "bad slot range start".to_string())?;
            let end: u16 = b.parse().map_err(|_| "bad slot range end".to_string())?;
            for s in start..=end {
                slots.insert(s);
            }
        } else {
            let s: u16 = tok.parse().map_err(|_| "bad slot".to_string())?;
            slots.insert(s);
        }
    }

    let info = ClusterNode {
        id,
        addr: bus_addr.clone(),
        bus_addr,
        flags_raw: flags.bits(),
        replica_of,
        slots,
        config_epoch,
        replication_offset: 0,
        had_replicas: false,
    };

    Ok(ParsedNode {
        info,
        migrating_map,
        importing_map,
    })
}

fn parse_vars_line(
    rest: &str,
    current_epoch: &mut u64,
    last_vote_epoch: &mut u64,
) -> Result<(), String> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let mut i = 0;
    while i + 1 < tokens.len() {
        match tokens[i] {
            "currentEpoch" => {
                *current_epoch = tokens[i + 1]
                    .parse()
                    .map_err(|_| "bad currentEpoch".to_string())?;
            }
            "lastVoteEpoch" => {
                *last_vote_epoch = tokens[i + 1]
                    .parse()
                    .map_err(|_| "bad lastVoteEpoch".to_string())?;
            }
            _ => {}
        }
        i += 2;
    }
    Ok(())
}

// src/core/cluster/gossip.rs

//! The cluster bus: a TCP mesh of per-peer links carrying the binary wire
//! protocol, plus the periodic gossip tick and failure detector built on top
//! of it.

use super::epoch;
use super::health;
use super::link::{Link, LinkError};
use super::orphan;
use super::resolver;
use super::slot::NUM_SLOTS;
use super::state::{ClusterNode, ClusterState, NodeFlags};
use super::wire::{GossipEntry, Header, Message, MessageFlags, MessageType, Payload};
use crate::core::state::ServerState;
use dashmap::DashMap;
use rand::seq::SliceRandom;
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex as AsyncMutex, broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// Maximum number of third-party gossip entries packed into one PING/PONG.
const GOSSIP_MAX_NODES_IN_PACKET: usize = 10;

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A message submitted to the gossip task by the rest of the server, for
/// things the bus carries but that don't originate from the gossip loop
/// itself (`PUBLISH`, `CLUSTER MEET`).
#[derive(Debug, Clone)]
pub enum GossipTaskMessage {
    /// Broadcast a pub/sub message to every known peer.
    Publish { channel: Vec<u8>, message: Vec<u8> },
    /// Send a one-shot MEET handshake to a node we don't know about yet.
    Meet { target: SocketAddr },
    /// Kick off a `CLUSTER FAILOVER` handshake (or its `TAKEOVER` variant),
    /// run by the replica that received the command against its own master.
    /// Handled fire-and-forget, same as real Redis: the command itself
    /// replies `OK` once the request is accepted, not once it completes.
    BeginManualFailover { takeover: bool },
}

/// Outbound TCP links to peers, keyed by node ID, reused across ticks. A
/// link is not embedded in `NodeRuntimeState` because `TcpStream` isn't
/// `Clone` and callers need to hold a connection open across awaits without
/// locking the whole node registry.
#[derive(Default)]
pub struct PeerLinks {
    links: DashMap<String, Arc<AsyncMutex<Link>>>,
}

impl PeerLinks {
    fn new() -> Self {
        Self::default()
    }

    async fn get_or_connect(
        &self,
        node_id: &str,
        bus_addr: &str,
    ) -> Result<Arc<AsyncMutex<Link>>, LinkError> {
        if let Some(link) = self.links.get(node_id) {
            return Ok(link.clone());
        }
        let addr: SocketAddr = bus_addr
            .parse()
            .map_err(|_| LinkError::Io(std::io::Error::other("bad bus address")))?;
        let link = Link::connect(addr).await?;
        let shared = Arc::new(AsyncMutex::new(link));
        self.links.insert(node_id.to_string(), shared.clone());
        Ok(shared)
    }

    fn invalidate(&self, node_id: &str) {
        self.links.remove(node_id);
    }
}

fn slots_to_bitmap(slots: &BTreeSet<u16>) -> Vec<u8> {
    let mut bytes = vec![0u8; NUM_SLOTS / 8];
    for &slot in slots {
        bytes[slot as usize / 8] |= 1 << (7 - (slot as usize % 8));
    }
    bytes
}

fn bitmap_to_slots(bytes: &[u8]) -> BTreeSet<u16> {
    let mut slots = BTreeSet::new();
    for (byte_idx, byte) in bytes.iter().enumerate() {
        for bit in 0..8 {
            if byte & (1 << (7 - bit)) != 0 {
                let slot = (byte_idx * 8 + bit) as u16;
                if (slot as usize) < NUM_SLOTS {
                    slots.insert(slot);
                }
            }
        }
    }
    slots
}

/// Builds the header every outbound packet carries, describing this node.
fn build_header(
    cluster: &ClusterState,
    msg_type: MessageType,
    message_flags: MessageFlags,
    repl_offset: u64,
    cluster_ok: bool,
) -> Header {
    let myself = cluster.get_my_config();
    let info = &myself.node_info;
    let (ip, port) = info
        .addr
        .rsplit_once(':')
        .map(|(ip, p)| (ip.to_string(), p.parse().unwrap_or(0)))
        .unwrap_or_else(|| (info.addr.clone(), 0));

    Header {
        msg_type,
        current_epoch: cluster.current_epoch.load(Ordering::Relaxed),
        config_epoch: info.config_epoch,
        repl_offset,
        sender_id: cluster.my_id.clone(),
        slots: slots_to_bitmap(&info.slots),
        replica_of: info.replica_of.clone(),
        ip,
        port,
        node_flags: info.flags_raw,
        cluster_state_ok: cluster_ok,
        message_flags,
    }
}

/// Picks up to `GOSSIP_MAX_NODES_IN_PACKET` known peers to tell `exclude`
/// about, so the cluster's address book spreads without every node polling
/// every other node directly.
fn select_nodes_for_gossip(cluster: &ClusterState, exclude: &str) -> Vec<GossipEntry> {
    let mut candidates: Vec<GossipEntry> = cluster
        .nodes
        .iter()
        .filter(|n| n.key() != exclude && n.key() != &cluster.my_id)
        .map(|n| {
            let rt = n.value();
            let (ip, port) = rt
                .node_info
                .addr
                .rsplit_once(':')
                .map(|(ip, p)| (ip.to_string(), p.parse().unwrap_or(0)))
                .unwrap_or_else(|| (rt.node_info.addr.clone(), 0));
            GossipEntry {
                node_id: rt.node_info.id.clone(),
                ping_sent_ms: rt.ping_sent.map_or(0, |_| now_ms()),
                pong_received_ms: rt.pong_received.map_or(0, |_| now_ms()),
                ip,
                port,
                flags: rt.node_info.flags_raw,
            }
        })
        .collect();
    candidates.shuffle(&mut rand::thread_rng());
    candidates.truncate(GOSSIP_MAX_NODES_IN_PACKET);
    candidates
}

/// Chooses which peers to ping this tick: a handful biased toward nodes
/// already under suspicion, so a flapping node gets probed more often than
/// the steady majority of the cluster.
fn choose_nodes_to_ping(cluster: &ClusterState) -> Vec<String> {
    let candidates: Vec<(String, bool)> = cluster
        .nodes
        .iter()
        .filter(|n| {
            let f = n.value().node_info.get_flags();
            !f.intersects(NodeFlags::MYSELF | NodeFlags::HANDSHAKE | NodeFlags::NOADDR)
        })
        .map(|n| {
            let suspect = n
                .value()
                .node_info
                .get_flags()
                .intersects(NodeFlags::PFAIL | NodeFlags::FAIL);
            (n.key().clone(), suspect)
        })
        .collect();

    if candidates.is_empty() {
        return vec![];
    }

    let total = candidates.len();
    let wanted = (total / 10).max(3).min(total);

    let mut suspects: Vec<String> = candidates
        .iter()
        .filter(|(_, s)| *s)
        .map(|(id, _)| id.clone())
        .collect();
    let mut healthy: Vec<String> = candidates
        .into_iter()
        .filter(|(_, s)| !*s)
        .map(|(id, _)| id)
        .collect();

    let mut rng = rand::thread_rng();
    suspects.shuffle(&mut rng);
    healthy.shuffle(&mut rng);

    let mut chosen = suspects;
    chosen.truncate(wanted);
    if chosen.len() < wanted {
        let remaining = wanted - chosen.len();
        chosen.extend(healthy.into_iter().take(remaining));
    }
    chosen
}

async fn current_repl_offset(state: &Arc<ServerState>) -> u64 {
    state
        .replication
        .replica_info
        .lock()
        .await
        .as_ref()
        .map_or(0, |i| i.processed_offset)
}

async fn send_message(
    links: &PeerLinks,
    node_id: &str,
    bus_addr: &str,
    msg: &Message,
) -> Result<(), LinkError> {
    let link = links.get_or_connect(node_id, bus_addr).await?;
    let mut guard = link.lock().await;
    if let Err(e) = guard.send(msg).await {
        drop(guard);
        links.invalidate(node_id);
        return Err(e);
    }
    Ok(())
}

/// Sends a one-off message to a single known peer, used by the failover and
/// manual-failover handshakes which don't fit the periodic ping/broadcast
/// shape above.
pub(super) async fn send_payload(
    state: &Arc<ServerState>,
    cluster: &ClusterState,
    links: &PeerLinks,
    target_id: &str,
    msg_type: MessageType,
    message_flags: MessageFlags,
    payload: Payload,
) -> Result<(), LinkError> {
    let Some(target) = cluster.nodes.get(target_id) else {
        return Err(LinkError::Closed);
    };
    let bus_addr = target.node_info.bus_addr.clone();
    drop(target);
    let offset = current_repl_offset(state).await;
    let header = build_header(
        cluster,
        msg_type,
        message_flags,
        offset,
        cluster.cluster_ok.load(Ordering::Relaxed),
    );
    let msg = Message { header, payload };
    send_message(links, target_id, &bus_addr, &msg).await
}

async fn send_ping(state: &Arc<ServerState>, cluster: &ClusterState, links: &PeerLinks, target_id: &str) {
    let Some(target) = cluster.nodes.get(target_id) else {
        return;
    };
    let bus_addr = target.node_info.bus_addr.clone();
    drop(target);

    // While pausing writes for a manual failover handoff, flag every ping to
    // that replica PAUSED so it can read our offset off the header and know
    // when it has caught up.
    let paused_for_target = cluster
        .manual_failover
        .lock()
        .paused_for
        .as_deref()
        .is_some_and(|id| id == target_id);
    let ping_flags = if paused_for_target {
        MessageFlags::PAUSED
    } else {
        MessageFlags::empty()
    };

    let offset = current_repl_offset(state).await;
    let header = build_header(
        cluster,
        MessageType::Ping,
        ping_flags,
        offset,
        cluster.cluster_ok.load(Ordering::Relaxed),
    );
    let payload = Payload::Gossip(select_nodes_for_gossip(cluster, target_id));
    let msg = Message { header, payload };

    match send_message(links, target_id, &bus_addr, &msg).await {
        Ok(()) => {
            if let Some(mut rt) = cluster.nodes.get_mut(target_id) {
                rt.ping_sent = Some(std::time::Instant::now());
            }
        }
        Err(e) => {
            debug!("Failed to ping {}: {}", target_id, e);
        }
    }
}

async fn broadcast_message(state: &Arc<ServerState>, cluster: &ClusterState, links: &PeerLinks, payload: Payload) {
    let offset = current_repl_offset(state).await;
    let msg_type = match &payload {
        Payload::Publish { .. } => MessageType::Publish,
        Payload::Fail { .. } => MessageType::Fail,
        Payload::Update { .. } => MessageType::Update,
        Payload::Gossip(_) | Payload::Empty => MessageType::Ping,
    };
    let header = build_header(
        cluster,
        msg_type,
        MessageFlags::empty(),
        offset,
        cluster.cluster_ok.load(Ordering::Relaxed),
    );
    let targets: Vec<(String, String)> = cluster
        .nodes
        .iter()
        .filter(|n| {
            let f = n.value().node_info.get_flags();
            !f.intersects(NodeFlags::MYSELF | NodeFlags::FAIL | NodeFlags::HANDSHAKE)
        })
        .map(|n| (n.key().clone(), n.value().node_info.bus_addr.clone()))
        .collect();

    for (node_id, bus_addr) in targets {
        let msg = Message {
            header: header.clone(),
            payload: payload.clone(),
        };
        if let Err(e) = send_message(links, &node_id, &bus_addr, &msg).await {
            debug!("Failed to broadcast to {}: {}", node_id, e);
        }
    }
}

fn header_to_cluster_node(header: &Header, bus_port_offset: u16) -> ClusterNode {
    let bus_port = header.port.checked_add(bus_port_offset).unwrap_or(header.port);
    ClusterNode {
        id: header.sender_id.clone(),
        addr: format!("{}:{}", header.ip, header.port),
        bus_addr: format!("{}:{}", header.ip, bus_port),
        flags_raw: header.node_flags,
        replica_of: header.replica_of.clone(),
        slots: bitmap_to_slots(&header.slots),
        config_epoch: header.config_epoch,
        replication_offset: header.repl_offset,
        had_replicas: false,
    }
}

/// Learns about a node we've only heard of second-hand, through a peer's
/// gossip entry. Only inserted as a `HANDSHAKE` stub; full data (slots,
/// epoch) arrives once we exchange a packet with it directly.
fn learn_node_from_entry(cluster: &ClusterState, entry: &GossipEntry, bus_port_offset: u16) {
    if entry.node_id == cluster.my_id
        || cluster.is_blacklisted(&entry.node_id)
        || cluster.nodes.contains_key(&entry.node_id)
    {
        return;
    }
    let bus_port = entry.port.checked_add(bus_port_offset).unwrap_or(entry.port);
    let node = ClusterNode {
        id: entry.node_id.clone(),
        addr: format!("{}:{}", entry.ip, entry.port),
        bus_addr: format!("{}:{}", entry.ip, bus_port),
        flags_raw: (NodeFlags::from_bits_truncate(entry.flags) | NodeFlags::HANDSHAKE).bits(),
        replica_of: None,
        slots: BTreeSet::new(),
        config_epoch: 0,
        replication_offset: 0,
        had_replicas: false,
    };
    cluster.nodes.insert(
        node.id.clone(),
        super::state::NodeRuntimeState {
            node_info: node,
            ping_sent: None,
            pong_received: None,
            fail_reports: std::collections::HashMap::new(),
            voted_time: None,
            fail_time: None,
        },
    );
    info!("Learned about node {} via gossip entry", entry.node_id);
}

/// Processes one inbound packet: merges the sender's own info, reconciles
/// its slot claim, and replies where the protocol calls for a reply.
async fn handle_message(
    state: &Arc<ServerState>,
    cluster: &ClusterState,
    links: &PeerLinks,
    bus_port_offset: u16,
    msg: Message,
) {
    epoch::adopt(cluster, msg.header.current_epoch);

    let sender_id = msg.header.sender_id.clone();
    if sender_id == cluster.my_id {
        return;
    }

    let sender_node = header_to_cluster_node(&msg.header, bus_port_offset);
    let sender_slots = sender_node.slots.clone();
    let sender_epoch = sender_node.config_epoch;
    cluster.merge_node_info(sender_node, state).await;

    if msg.header.message_flags.contains(MessageFlags::PAUSED)
        && cluster.get_my_config().node_info.replica_of.as_deref() == Some(sender_id.as_str())
    {
        let mut mf = cluster.manual_failover.lock();
        if mf.end.is_some() {
            mf.master_offset = Some(msg.header.repl_offset);
        }
    }

    let (stale, slots_lost_by_me) =
        resolver::apply_slot_claim(cluster, &sender_id, sender_epoch, &sender_slots);
    if stale {
        send_update_correction(cluster, links, &sender_id).await;
    }
    for slot in slots_lost_by_me {
        for db in &state.dbs {
            db.remove_keys_in_slot(slot).await;
        }
    }

    match msg.payload {
        Payload::Gossip(entries) => {
            for entry in &entries {
                learn_node_from_entry(cluster, entry, bus_port_offset);
            }
            cluster.remove_fail_report(&sender_id, &cluster.my_id);
            match msg.header.msg_type {
                MessageType::Ping | MessageType::Meet => {
                    reply_pong(state, cluster, links, &sender_id).await;
                }
                MessageType::Pong => {
                    if let Some(mut rt) = cluster.nodes.get_mut(&sender_id) {
                        rt.pong_received = Some(std::time::Instant::now());
                        let mut flags = rt.node_info.get_flags();
                        flags.remove(NodeFlags::PFAIL);
                        rt.node_info.set_flags(flags);
                    }
                }
                _ => {}
            }
        }
        Payload::Fail { node_id } => {
            info!("Node {} reported {} as FAIL", sender_id, node_id);
            cluster.mark_node_as_fail(&node_id);
        }
        Payload::Publish { channel, message } => {
            state
                .pubsub
                .publish(&bytes::Bytes::from(channel), bytes::Bytes::from(message));
        }
        Payload::Update { node_id, config_epoch, slots } => {
            info!("Received UPDATE correction for {} at epoch {}", node_id, config_epoch);
            let (_, slots_lost_by_me) =
                resolver::apply_slot_claim(cluster, &node_id, config_epoch, &bitmap_to_slots(&slots));
            for slot in slots_lost_by_me {
                for db in &state.dbs {
                    db.remove_keys_in_slot(slot).await;
                }
            }
        }
        Payload::Empty => match msg.header.msg_type {
            MessageType::FailoverAuthRequest => {
                super::failover::handle_auth_request(
                    state,
                    links,
                    sender_id,
                    msg.header.config_epoch,
                    msg.header.message_flags.contains(MessageFlags::FORCEACK),
                )
                .await;
            }
            MessageType::FailoverAuthAck => {
                super::failover::handle_auth_ack(state, sender_id, msg.header.config_epoch).await;
            }
            MessageType::MfStart => {
                super::failover::handle_mf_request(state, cluster, sender_id).await;
            }
            _ => {}
        },
    }
}

async fn reply_pong(state: &Arc<ServerState>, cluster: &ClusterState, links: &PeerLinks, target_id: &str) {
    let Some(target) = cluster.nodes.get(target_id) else {
        return;
    };
    let bus_addr = target.node_info.bus_addr.clone();
    drop(target);

    let offset = current_repl_offset(state).await;
    let header = build_header(
        cluster,
        MessageType::Pong,
        MessageFlags::empty(),
        offset,
        cluster.cluster_ok.load(Ordering::Relaxed),
    );
    let payload = Payload::Gossip(select_nodes_for_gossip(cluster, target_id));
    let msg = Message { header, payload };
    if let Err(e) = send_message(links, target_id, &bus_addr, &msg).await {
        debug!("Failed to reply to {}: {}", target_id, e);
    }
}

/// Sends at most one `UPDATE` correction per inbound packet to a claimant
/// that turned out to hold a stale epoch for some of its slots.
async fn send_update_correction(cluster: &ClusterState, links: &PeerLinks, target_id: &str) {
    let Some(target) = cluster.nodes.get(target_id) else {
        return;
    };
    let bus_addr = target.node_info.bus_addr.clone();
    drop(target);

    let header = build_header(
        cluster,
        MessageType::Update,
        MessageFlags::empty(),
        0,
        cluster.cluster_ok.load(Ordering::Relaxed),
    );
    let myself = cluster.get_my_config();
    let payload = Payload::Update {
        node_id: cluster.my_id.clone(),
        config_epoch: myself.node_info.config_epoch,
        slots: slots_to_bitmap(&myself.node_info.slots),
    };
    drop(myself);
    let msg = Message { header, payload };
    let _ = send_message(links, target_id, &bus_addr, &msg).await;
}

async fn handle_inbound_connection(
    state: Arc<ServerState>,
    cluster: Arc<ClusterState>,
    links: Arc<PeerLinks>,
    bus_port_offset: u16,
    stream: TcpStream,
    peer_addr: SocketAddr,
) {
    let mut link = Link::new(stream, peer_addr);
    loop {
        match link.recv().await {
            Ok(msg) => handle_message(&state, &cluster, &links, bus_port_offset, msg).await,
            Err(LinkError::Closed) => {
                debug!("Inbound bus link from {} closed", peer_addr);
                return;
            }
            Err(e) => {
                warn!("Bus link error from {}: {}", peer_addr, e);
                return;
            }
        }
    }
}

async fn gossip_tick(state: &Arc<ServerState>, cluster: &ClusterState, links: &PeerLinks) {
    epoch::resolve_collisions(cluster);

    let (node_timeout, fail_undo_multiplier, validity_multiplier, quorum) = {
        let cfg = state.config.lock().await;
        (
            cfg.cluster.node_timeout,
            cfg.cluster.fail_undo_multiplier,
            cfg.cluster.failure_report_validity_multiplier,
            cfg.cluster.failover_quorum,
        )
    };

    cluster.prune_stale_fail_reports(node_timeout, validity_multiplier);

    let mut targets = choose_nodes_to_ping(cluster);
    // A replica we're pausing for must keep receiving PAUSED pings every
    // tick regardless of the sampled ping set, or it can never see its
    // catch-up offset and the handoff stalls.
    if let Some(paused_for) = cluster.manual_failover.lock().paused_for.clone()
        && !targets.contains(&paused_for)
    {
        targets.push(paused_for);
    }
    for target_id in targets {
        send_ping(state, cluster, links, &target_id).await;
    }

    check_for_timed_out_nodes(state, cluster, links, node_timeout, fail_undo_multiplier).await;
    health::evaluate(cluster, &state.config.lock().await.cluster);
    orphan::maybe_reassign(state, cluster).await;

    if cluster.count_online_masters() < quorum {
        state.set_quorum_loss_read_only(true, "Lost quorum of reachable masters.");
    } else {
        state.set_quorum_loss_read_only(false, "Quorum of masters reachable.");
    }

    super::failover::handle_failover_cron(state, links).await;
}

async fn check_for_timed_out_nodes(
    state: &Arc<ServerState>,
    cluster: &ClusterState,
    links: &PeerLinks,
    node_timeout: u64,
    fail_undo_multiplier: u64,
) {
    let timeout = Duration::from_millis(node_timeout);
    let candidates: Vec<String> = cluster
        .nodes
        .iter()
        .filter(|n| {
            let f = n.value().node_info.get_flags();
            if f.intersects(NodeFlags::MYSELF | NodeFlags::HANDSHAKE) {
                return false;
            }
            match (n.value().ping_sent, n.value().pong_received) {
                (Some(sent), Some(recv)) => sent > recv && sent.elapsed() > timeout,
                (Some(sent), None) => sent.elapsed() > timeout,
                _ => false,
            }
        })
        .map(|n| n.key().clone())
        .collect();

    for node_id in candidates {
        cluster.mark_node_as_pfail(&node_id);
        cluster.maybe_undo_fail(&node_id, node_timeout, fail_undo_multiplier);
        if cluster.promote_pfail_to_fail(&node_id) {
            broadcast_message(
                state,
                cluster,
                links,
                Payload::Fail {
                    node_id: node_id.clone(),
                },
            )
            .await;
        }
    }
}

/// Runs the cluster bus: accepts inbound peer links, drives the periodic
/// gossip/failure-detector tick, and services ad hoc send requests from the
/// rest of the server (`PUBLISH`, `CLUSTER MEET`).
pub async fn run(
    state: Arc<ServerState>,
    bus_port: u16,
    mut shutdown_rx: broadcast::Receiver<()>,
    mut task_rx: mpsc::Receiver<GossipTaskMessage>,
) {
    let Some(cluster) = state.cluster.clone() else {
        error!("Gossip task started without cluster state; aborting.");
        return;
    };

    let bind_addr = format!("0.0.0.0:{bus_port}");
    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind cluster bus on {}: {}", bind_addr, e);
            return;
        }
    };
    info!("Cluster bus listening on {}", bind_addr);

    let links = Arc::new(PeerLinks::new());
    let bus_port_offset = state.config.lock().await.cluster.bus_port_offset;

    let mut tick = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => {
                info!("Cluster bus shutting down.");
                return;
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer_addr)) => {
                        let state = state.clone();
                        let cluster = cluster.clone();
                        let links = links.clone();
                        tokio::spawn(handle_inbound_connection(state, cluster, links, bus_port_offset, stream, peer_addr));
                    }
                    Err(e) => warn!("Failed to accept bus connection: {}", e),
                }
            }

            Some(task_msg) = task_rx.recv() => {
                match task_msg {
                    GossipTaskMessage::Publish { channel, message } => {
                        broadcast_message(&state, &cluster, &links, Payload::Publish { channel, message }).await;
                    }
                    GossipTaskMessage::BeginManualFailover { takeover } => {
                        if let Err(e) = super::failover::begin_manual_failover(&state, &links, takeover).await {
                            warn!("CLUSTER FAILOVER failed: {}", e);
                        }
                    }
                    GossipTaskMessage::Meet { target } => {
                        let offset = current_repl_offset(&state).await;
                        let header = build_header(&cluster, MessageType::Meet, MessageFlags::empty(), offset, cluster.cluster_ok.load(Ordering::Relaxed));
                        let payload = Payload::Gossip(select_nodes_for_gossip(&cluster, ""));
                        let msg = Message { header, payload };
                        match Link::connect(target).await {
                            Ok(mut link) => {
                                if let Err(e) = link.send(&msg).await {
                                    warn!("CLUSTER MEET send to {} failed: {}", target, e);
                                }
                            }
                            Err(e) => warn!("CLUSTER MEET could not connect to {}: {}", target, e),
                        }
                    }
                }
            }

            _ = tick.tick() => {
                gossip_tick(&state, &cluster, &links).await;
            }
        }
    }
}

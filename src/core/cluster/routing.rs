// src/core/cluster/routing.rs

//! The routing oracle: decides whether a command may execute locally or must
//! be redirected with `MOVED`/`ASK`/`CLUSTERDOWN`/`TRYAGAIN`/`CROSSSLOT`.

use crate::connection::SessionState;
use crate::core::SpinelDBError;
use crate::core::cluster::slot;
use crate::core::state::ServerState;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::Ordering;

/// Checks whether a command targeting `keys` may run on this node, and
/// returns the appropriate redirection error otherwise.
///
/// `is_write` distinguishes read commands, which a `READONLY` connection may
/// serve from a replica, from writes, which always belong on the slot's
/// primary.
pub async fn check_redirection(
    state: &Arc<ServerState>,
    keys: &[Bytes],
    session: &SessionState,
    is_write: bool,
) -> Result<(), SpinelDBError> {
    let Some(cluster_state) = &state.cluster else {
        return Ok(());
    };
    if keys.is_empty() {
        return Ok(());
    }

    let first_slot = slot::get_slot(&keys[0]);
    if keys.len() > 1 && !keys.iter().all(|k| slot::get_slot(k) == first_slot) {
        return Err(SpinelDBError::CrossSlot);
    }

    if !cluster_state.cluster_ok.load(Ordering::Relaxed) {
        return Err(SpinelDBError::ClusterDown(
            "The cluster is down: a hash slot is not served.".to_string(),
        ));
    }

    let my_id = &cluster_state.my_id;
    let myself = cluster_state.nodes.get(my_id).ok_or_else(|| {
        SpinelDBError::ClusterDown("Could not find self in cluster node map".to_string())
    })?;
    let i_am_replica = myself.node_info.replica_of.is_some();

    // IMPORTING: unless ASKING was sent, the key still belongs to the source
    // node until it is actually migrated in. With ASKING set, a single-key
    // request is always served locally; a multi-key request spanning both
    // sides (some keys present, some not) replies TRYAGAIN since it can't be
    // resolved atomically on either node alone.
    if let Some(source_node_id) = cluster_state.importing_slots_from[first_slot as usize]
        .read()
        .clone()
    {
        if !session.is_asking {
            let source_node = cluster_state.nodes.get(&source_node_id).ok_or_else(|| {
                SpinelDBError::ClusterDown(format!(
                    "Importing source node {source_node_id} not found"
                ))
            })?;
            return Err(SpinelDBError::Moved {
                slot: first_slot,
                addr: source_node.node_info.addr.clone(),
            });
        }
        if keys.len() > 1 {
            let db = state
                .get_db(session.current_db_index)
                .ok_or_else(|| SpinelDBError::Internal("invalid database index".to_string()))?;
            let mut any_missing = false;
            for key in keys {
                let shard_index = db.get_shard_index(key);
                let guard = db.get_shard(shard_index).entries.lock().await;
                if guard.peek(key).is_none_or(|e| e.is_expired()) {
                    any_missing = true;
                    break;
                }
            }
            if any_missing {
                return Err(SpinelDBError::TryAgain(
                    "Multi-key request during slot import spans both nodes".to_string(),
                ));
            }
        }
    }

    // MIGRATING: any missing key unconditionally redirects with ASK, even for
    // a single-key request, since the key has already moved to the
    // destination node.
    if let Some(dest_node_id) = cluster_state.migrating_slots_to[first_slot as usize]
        .read()
        .clone()
    {
        let db = state
            .get_db(session.current_db_index)
            .ok_or_else(|| SpinelDBError::Internal("invalid database index".to_string()))?;
        let mut any_missing = false;
        for key in keys {
            let shard_index = db.get_shard_index(key);
            let guard = db.get_shard(shard_index).entries.lock().await;
            if guard.peek(key).is_none_or(|e| e.is_expired()) {
                any_missing = true;
                break;
            }
        }
        if any_missing {
            let dest_node = cluster_state.nodes.get(&dest_node_id).ok_or_else(|| {
                SpinelDBError::ClusterDown(format!(
                    "Migrating destination node {dest_node_id} not found"
                ))
            })?;
            return Err(SpinelDBError::Ask {
                slot: first_slot,
                addr: dest_node.node_info.addr.clone(),
            });
        }
    }

    // A one-shot ASKING grant is consumed regardless of the outcome above.
    if session.is_asking {
        return Ok(());
    }

    // Standard MOVED redirection if this node doesn't own the slot, with the
    // READONLY exception letting a replica serve reads for its own master's slots.
    if let Some(owner_node) = cluster_state.get_node_for_slot(first_slot) {
        let owner_id = owner_node.node_info.id.clone();
        let owner_addr = owner_node.node_info.addr.clone();
        drop(owner_node);

        if owner_id != *my_id {
            let served_as_replica = !is_write
                && session.is_readonly
                && i_am_replica
                && myself.node_info.replica_of.as_deref() == Some(owner_id.as_str());
            if !served_as_replica {
                return Err(SpinelDBError::Moved {
                    slot: first_slot,
                    addr: owner_addr,
                });
            }
        }
    } else {
        return Err(SpinelDBError::ClusterDown(format!(
            "Hash slot {first_slot} is not assigned"
        )));
    }

    Ok(())
}

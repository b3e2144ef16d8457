// src/core/commands/cluster/setslot.rs

use super::SetSlotSubcommand;
use crate::core::cluster::epoch;
use crate::core::cluster::slot::NUM_SLOTS;
use crate::core::commands::command_trait::WriteOutcome;
use crate::core::storage::db::ExecutionContext;
use crate::core::{RespValue, SpinelDBError};

pub async fn execute(
    ctx: &mut ExecutionContext<'_>,
    slot: u16,
    subcmd: &SetSlotSubcommand,
) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
    let cluster = ctx.state.cluster.as_ref().unwrap();

    if slot >= NUM_SLOTS as u16 {
        return Err(SpinelDBError::InvalidState("Invalid slot".to_string()));
    }

    match subcmd {
        SetSlotSubcommand::Migrating(dest_node_id) => {
            let myself = cluster.nodes.get(&cluster.my_id).unwrap();
            if !myself.node_info.slots.contains(&slot) {
                return Err(SpinelDBError::InvalidState(
                    "Cannot MIGRATE a slot I don't own".to_string(),
                ));
            }
            drop(myself);
            *cluster.migrating_slots_to[slot as usize].write() = Some(dest_node_id.clone());
        }
        SetSlotSubcommand::Importing(src_node_id) => {
            *cluster.importing_slots_from[slot as usize].write() = Some(src_node_id.clone());
        }
        SetSlotSubcommand::Node(new_owner_id) => {
            // Closing out an import by handing final ownership to myself wins
            // against any stale claim still circulating in gossip, so mint a
            // fresh epoch ahead of one without running an election.
            let was_importing = cluster.importing_slots_from[slot as usize].read().is_some();
            if was_importing && new_owner_id == &cluster.my_id {
                let new_epoch = epoch::bump_for_unconsensual_claim(cluster);
                if let Some(mut myself) = cluster.nodes.get_mut(&cluster.my_id) {
                    myself.node_info.config_epoch = new_epoch;
                }
            }

            *cluster.migrating_slots_to[slot as usize].write() = None;
            *cluster.importing_slots_from[slot as usize].write() = None;

            // Remove slot from old owner
            if let Some(id) = { cluster.slots_map[slot as usize].read().clone() }
                && let Some(mut old_owner) = cluster.nodes.get_mut(&id)
            {
                old_owner.node_info.slots.remove(&slot);
            }

            // Assign slot to new owner
            if let Some(mut new_owner) = cluster.nodes.get_mut(new_owner_id) {
                new_owner.node_info.slots.insert(slot);
                *cluster.slots_map[slot as usize].write() = Some(new_owner_id.clone());
            } else {
                return Err(SpinelDBError::InvalidState(format!(
                    "Node {new_owner_id} not found"
                )));
            }
        }
        SetSlotSubcommand::Stable => {
            *cluster.migrating_slots_to[slot as usize].write() = None;
            *cluster.importing_slots_from[slot as usize].write() = None;
        }
    }

    cluster.save_config()?;

    Ok((
        RespValue::SimpleString("OK".into()),
        WriteOutcome::DidNotWrite,
    ))
}

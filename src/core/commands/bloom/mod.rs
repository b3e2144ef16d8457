// src/core/commands/bloom/mod.rs

//! This module implements the Bloom filter commands, including BF.RESERVE, BF.ADD, and BF.EXISTS.
//! It provides a dispatcher for these subcommands and defines their parsing and execution logic.

pub mod bf_add;
pub mod bf_card;
pub mod bf_exists;
pub mod bf_info;
pub mod bf_insert;
pub mod bf_madd;
pub mod bf_mexists;
pub mod bf_reserve;
pub mod command;

pub use self::bf_add::BfAdd;
pub use self::bf_card::BfCard;
pub use self::bf_exists::BfExists;
pub use self::bf_info::BfInfo;
pub use self::bf_insert::BfInsert;
pub use self::bf_madd::BfMAdd;
pub use self::bf_mexists::BfMExists;
pub use self::bf_reserve::BfReserve;
pub use self::command::{Bloom, BloomSubcommand};

//! Foundation types for the drop allocation ledger.
//!
//! This crate provides the item, identity, and assignment types shared by
//! every other crate in the workspace.
//!
//! # Key Types
//!
//! - [`ItemId`] -- Identifier of a unique distributable item
//! - [`Category`] -- Tag partitioning the item pool into disjoint sub-pools
//! - [`Namespace`] -- One of the three identity systems (wallet, Discord, Twitter)
//! - [`IdentityKeys`] -- Up to three keys as supplied by a caller
//! - [`ClaimantKeys`] -- A complete, validated key triple bound to an assignment
//! - [`Item`] / [`ItemMetadata`] -- An item and its descriptive metadata
//! - [`Assignment`] -- The immutable binding of one item to one key triple

pub mod assignment;
pub mod error;
pub mod identity;
pub mod item;

pub use assignment::Assignment;
pub use error::TypeError;
pub use identity::{ClaimantKeys, IdentityKeys, Namespace, MAX_KEY_LEN};
pub use item::{Category, Item, ItemId, ItemMetadata};

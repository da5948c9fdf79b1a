//! Keycards: signed, hash-chained entries describing an organization or a
//! user and the public keys they publish.

mod card;
mod entry;

pub use card::Keycard;
pub use entry::{
    hash_data, ChainResult, ChainedKeys, Entry, EntryType, SignatureSlot, SlotKind,
    HASH_ALGORITHMS,
};

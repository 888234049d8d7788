/*!
Content hashing and interning for the update repository engine.

Every file, directory, and symlink that can appear in a bundle is reduced to a single
64-hex-character [`Hash`] via [`hash_of`]. The hash is an HMAC-SHA256 over the entry's
payload, keyed by a pseudo-stat structure so that permission or ownership changes also
change the hash even when the payload is identical.

Hashes are deduplicated through a process-wide [`interner`], so the rest of the engine can
pass around a cheap [`interner::HashId`] instead of repeatedly comparing 32-byte digests.
*/

mod compute;
pub mod error;
mod hash;
pub mod interner;
mod key;

pub use compute::{hash_of, hash_of_entry, EntryKind};
pub use hash::{Hash, HASH_HEX_LEN};
pub use interner::HashId;

//! Hash collections used throughout the crate.
//!
//! Keys here are short strings and small integers owned by this process, so
//! the Fx hasher is used instead of SipHash.

pub use std::collections::hash_map;

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<T> = rustc_hash::FxHashSet<T>;

//! This module provides the `HashMap` used for engine state. The hashing data structures in the
//! standard library are randomly seeded, which is more than the engine needs for keys it
//! generates itself (storage slot ids, operator tags, names declared by the host), so the fast
//! deterministic Fx hasher is used instead.
//!
//! `HashMap<K, V, S>` does not have a `new` method for non-default hashers. Use
//! `HashMap::default()` instead.

pub use rustc_hash::FxHashMap as HashMap;

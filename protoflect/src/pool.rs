//! Descriptor pool registry.
//!
//! Pools are keyed by a small integer id and hold an `Arc` snapshot of
//! their descriptor set. Mutation goes through `Arc::make_mut`, so
//! deferred message boxes created from an earlier snapshot stay valid
//! when schemas are replaced or cleared. The registry itself does no
//! locking; callers serialize mutation.

use std::collections::HashMap;
use std::sync::Arc;

use log::{trace, warn};
use protoflect_wire::{split_file_set, DescriptorSet, MessageDef};

/// Identifier of one descriptor pool.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PoolId(pub u8);

impl PoolId {
    /// The pool used when callers do not pick one.
    pub const DEFAULT: PoolId = PoolId(0);
}

/// All descriptor pools known to the codec.
#[derive(Clone, Debug, Default)]
pub struct DescriptorPoolRegistry {
    pools: HashMap<PoolId, Arc<DescriptorSet>>,
}

impl DescriptorPoolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot handle of one pool, if it exists.
    pub fn pool(&self, pool: PoolId) -> Option<&Arc<DescriptorSet>> {
        self.pools.get(&pool)
    }

    /// Looks up a message type by name.
    ///
    /// Tries the name as given first, then with the generated-name
    /// suffix stripped. A missing schema is `None`, never an error.
    pub fn resolve(&self, pool: PoolId, type_name: &str) -> Option<MessageDef<'_>> {
        let set = self.pools.get(&pool)?;
        set.find_message(type_name).or_else(|| {
            let stripped = normalize_generated_name(type_name);
            if stripped != type_name {
                trace!("resolving {type_name} as {stripped}");
                set.find_message(stripped)
            } else {
                None
            }
        })
    }

    /// Registers one serialized `FileDescriptorProto`, creating the pool
    /// on first use. All-or-nothing per file: a rejected file leaves the
    /// pool unchanged.
    pub fn add_schema(&mut self, pool: PoolId, bytes: &[u8]) -> bool {
        let set = Arc::make_mut(self.pools.entry(pool).or_default());
        match set.add_file(bytes) {
            Ok(()) => true,
            Err(err) => {
                warn!("schema rejected for pool {}: {err}", pool.0);
                false
            }
        }
    }

    /// Registers a serialized `FileDescriptorSet`, best effort. Returns
    /// how many of its files were accepted.
    pub fn add_schema_set(&mut self, pool: PoolId, bytes: &[u8]) -> usize {
        let files = match split_file_set(bytes) {
            Ok(files) => files,
            Err(err) => {
                warn!("unreadable descriptor set for pool {}: {err}", pool.0);
                return 0;
            }
        };
        files
            .into_iter()
            .filter(|file| self.add_schema(pool, file))
            .count()
    }

    /// Drops every pool. Outstanding deferred boxes keep their own
    /// snapshots and are unaffected.
    pub fn clear_schemas(&mut self) {
        self.pools.clear();
    }
}

/// Strips the `_<index>_<32-hex-digit>` suffix appended to members of
/// generated struct types, e.g. `score_3_9AA2...F00D` becomes `score`.
/// Names without that shape come back unchanged.
pub fn normalize_generated_name(name: &str) -> &str {
    if name.len() <= 35 || !name.is_ascii() {
        return name;
    }
    let (head, guid) = name.split_at(name.len() - 32);
    if !guid.bytes().all(|b| b.is_ascii_hexdigit()) || !head.ends_with('_') {
        return name;
    }
    let head = &head[..head.len() - 1];
    match head.rfind('_') {
        Some(pos)
            if pos > 0
                && !head[pos + 1..].is_empty()
                && head[pos + 1..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            &head[..pos]
        }
        _ => name,
    }
}

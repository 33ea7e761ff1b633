//! Routing key derivation.
//!
//! Keys are dot-joined command paths (`"mod"`, `"mod.config.set"`) or
//! component custom-id prefixes. Command keys are derived from a schema with
//! a breadth-first worklist over its subcommand tree.

use std::collections::VecDeque;

use arbor_core::{CommandOption, CommandSchema};

/// Separates a component prefix from the storage id in a custom id.
pub const CUSTOM_ID_SEPARATOR: char = ':';

/// A routing key produced from a command schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteKey {
    pub path: String,
    /// Leaf nodes are invocable and belong to exactly one definition.
    /// Root and group nodes may be shared by several partial definitions.
    pub leaf: bool,
}

/// Every routing key `schema` contributes, root first.
pub fn route_keys(schema: &CommandSchema) -> Vec<RouteKey> {
    let mut keys = Vec::new();
    let mut worklist: VecDeque<(String, &[CommandOption])> = VecDeque::new();
    worklist.push_back((schema.name.clone(), &schema.options));

    while let Some((path, options)) = worklist.pop_front() {
        let mut leaf = true;
        for option in options.iter().filter(|option| option.kind.is_routable()) {
            leaf = false;
            worklist.push_back((join_path(&path, &option.name), &option.options));
        }
        keys.push(RouteKey { path, leaf });
    }

    keys
}

/// `parent.segment`
pub fn join_path(parent: &str, segment: &str) -> String {
    format!("{parent}.{segment}")
}

/// Builds a stateful custom id routed by `base` and resolving `storage_id`.
pub fn component_custom_id(base: &str, storage_id: &str) -> String {
    format!("{base}{CUSTOM_ID_SEPARATOR}{storage_id}")
}

/// Splits `"base:storage"` into its parts. A custom id without a separator
/// yields `(custom_id, None)`.
pub fn split_custom_id(custom_id: &str) -> (&str, Option<&str>) {
    match custom_id.split_once(CUSTOM_ID_SEPARATOR) {
        Some((base, storage_id)) if !storage_id.is_empty() => (base, Some(storage_id)),
        Some((base, _)) => (base, None),
        None => (custom_id, None),
    }
}

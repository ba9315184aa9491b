//! Deep merge and prune.
//!
//! Both functions take their inputs by reference and build a new tree, so a
//! loaded default template can be merged with any number of organization
//! documents without being consumed or mutated.

use super::value::{ConfigValue, Mapping};

/// Deep-merges `overlay` on top of `base`.
///
/// Mappings are merged key by key and the overlay wins on conflict.
/// Everything else, sequences included, is replaced wholesale by the overlay
/// value. An explicit `null` in the overlay replaces the base value; a
/// subsequent [`prune`] then removes the key, which is how an organization
/// suppresses a default.
#[must_use]
pub fn deep_merge(base: &ConfigValue, overlay: &ConfigValue) -> ConfigValue {
    match (base, overlay) {
        (ConfigValue::Mapping(base_map), ConfigValue::Mapping(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in overlay_map {
                let next = match base_map.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            ConfigValue::Mapping(merged)
        }
        _ => overlay.clone(),
    }
}

/// Removes `null` values and empty containers, recursively.
///
/// Returns `None` when `value` itself is pruned away. A container that only
/// becomes empty after its children are pruned is removed as well. Pruning is
/// idempotent.
#[must_use]
pub fn prune(value: &ConfigValue) -> Option<ConfigValue> {
    match value {
        ConfigValue::Null => None,
        ConfigValue::Scalar(_) => Some(value.clone()),
        ConfigValue::Sequence(items) => {
            let kept: Vec<ConfigValue> = items.iter().filter_map(prune).collect();
            (!kept.is_empty()).then_some(ConfigValue::Sequence(kept))
        }
        ConfigValue::Mapping(map) => {
            let kept: Mapping = map
                .iter()
                .filter_map(|(key, child)| prune(child).map(|child| (key.clone(), child)))
                .collect();
            (!kept.is_empty()).then_some(ConfigValue::Mapping(kept))
        }
    }
}

/// `prune(deep_merge(base, overlay))`, with a fully pruned result collapsed
/// to an empty mapping.
#[must_use]
pub fn merge_and_prune(base: &ConfigValue, overlay: &ConfigValue) -> ConfigValue {
    prune(&deep_merge(base, overlay)).unwrap_or_else(ConfigValue::empty_mapping)
}

/// Returns `true` when `value` holds no `null` and no empty container at any
/// depth.
#[must_use]
pub fn is_pruned(value: &ConfigValue) -> bool {
    match value {
        ConfigValue::Null => false,
        ConfigValue::Scalar(_) => true,
        ConfigValue::Sequence(items) => !items.is_empty() && items.iter().all(is_pruned),
        ConfigValue::Mapping(map) => !map.is_empty() && map.values().all(is_pruned),
    }
}

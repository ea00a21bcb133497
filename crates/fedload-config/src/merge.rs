//! Layered TOML merging.

use std::collections::BTreeSet;

/// Dotted paths of the leaf fields set by a file layer.
pub type SetFields = BTreeSet<String>;

/// Deep-merge `overlay` into `base`, recording every leaf the overlay sets.
///
/// Tables merge per field; scalars and arrays from the overlay replace the
/// base value.
pub fn deep_merge_tracking(
    base: &mut toml::Value,
    overlay: &toml::Value,
    prefix: &str,
    set: &mut SetFields,
) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let path = join(prefix, key);
                if let Some(base_val) = base_table.get_mut(key) {
                    if overlay_val.is_table() {
                        deep_merge_tracking(base_val, overlay_val, &path, set);
                    } else {
                        *base_val = overlay_val.clone();
                        set.insert(path);
                    }
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                    record_leaves(overlay_val, &path, set);
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
            set.insert(prefix.to_owned());
        },
    }
}

fn record_leaves(val: &toml::Value, prefix: &str, set: &mut SetFields) {
    if let toml::Value::Table(table) = val {
        for (key, child) in table {
            record_leaves(child, &join(prefix, key), set);
        }
    } else {
        set.insert(prefix.to_owned());
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

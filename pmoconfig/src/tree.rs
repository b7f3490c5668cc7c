//! Opérations sur l'arbre YAML de la configuration
//!
//! Les clés sont normalisées en minuscules au chargement ; les chemins sont
//! donc comparés en minuscules eux aussi.

use anyhow::{anyhow, bail, Result};
use serde_yaml::{Mapping, Value};

fn key(segment: &str) -> Value {
    Value::String(segment.to_lowercase())
}

/// Lit le nœud au bout de `path`
pub(crate) fn lookup<'a>(root: &'a Value, path: &[&str]) -> Result<&'a Value> {
    path.iter()
        .enumerate()
        .try_fold(root, |node, (depth, segment)| match node {
            Value::Mapping(map) => map
                .get(&key(segment))
                .ok_or_else(|| anyhow!("Path {} does not exist", path[..=depth].join("."))),
            _ => Err(anyhow!("Path {} is not a mapping", path[..depth].join("."))),
        })
}

/// Écrit `value` au bout de `path`, en créant les nœuds intermédiaires
pub(crate) fn assign(root: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut node = root;
    for segment in parents {
        let Value::Mapping(map) = node else {
            bail!("Cannot descend into {}: not a mapping", segment);
        };
        node = map
            .entry(key(segment))
            .or_insert(Value::Mapping(Mapping::new()));
    }

    match node {
        Value::Mapping(map) => {
            map.insert(key(last), value);
            Ok(())
        }
        _ => bail!("Cannot set {}: parent is not a mapping", path.join(".")),
    }
}

/// Fusionne `overlay` dans `base` : les mappings sont fusionnés clé par
/// clé, tout le reste est remplacé
pub(crate) fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (k, v) in overlay_map {
                match base_map.get_mut(&k) {
                    Some(existing) => merge(existing, v),
                    None => {
                        base_map.insert(k, v);
                    }
                }
            }
        }
        (slot, v) => *slot = v,
    }
}

/// Met en minuscules toutes les clés textuelles, récursivement
pub(crate) fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let k = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    (k, lowercase_keys(v))
                })
                .collect(),
        ),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

/// Applique les variables `{prefix}A__B=valeur` sur le chemin `a.b`
///
/// La valeur est interprétée comme du YAML (nombres, booléens, listes),
/// sinon gardée telle quelle.
pub(crate) fn apply_overrides<I>(root: &mut Value, prefix: &str, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (name, raw) in vars {
        let Some(rest) = name.strip_prefix(prefix) else {
            continue;
        };
        let path: Vec<&str> = rest.split("__").filter(|s| !s.is_empty()).collect();
        if path.is_empty() {
            continue;
        }
        let value = serde_yaml::from_str(&raw).unwrap_or(Value::String(raw.clone()));
        if let Err(e) = assign(root, &path, value) {
            tracing::warn!("Ignoring override {}: {}", name, e);
        }
    }
}

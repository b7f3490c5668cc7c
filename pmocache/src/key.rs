//! Dérivation des clés de cache
//!
//! Deux requêtes logiquement identiques doivent produire la même clé, quel
//! que soit l'ordre dans lequel leurs paramètres ont été fournis.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Hash SHA-256 hexadécimal d'une chaîne
pub fn hash_key(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Construit la clé d'une requête paramétrée
///
/// Les paramètres sont canonicalisés : tri par nom, suppression des valeurs
/// vides, puis sérialisation JSON (qui échappe les séparateurs). La clé a la
/// forme `{prefix}_{sha256}`.
///
/// Si un même nom apparaît plusieurs fois, la dernière valeur l'emporte.
///
/// ```
/// use pmocache::params_key;
///
/// let a = params_key("search", [("tag", "jazz"), ("limit", "30")]);
/// let b = params_key("search", [("limit", "30"), ("tag", "jazz"), ("name", "")]);
/// assert_eq!(a, b);
/// ```
pub fn params_key<I, K, V>(prefix: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let canonical: BTreeMap<String, String> = params
        .into_iter()
        .filter(|(_, v)| !v.as_ref().is_empty())
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
        .collect();

    let serialized = serde_json::to_string(&canonical).unwrap_or_default();
    format!("{}_{}", prefix, hash_key(&serialized))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_key_is_stable() {
        assert_eq!(hash_key("servers"), hash_key("servers"));
        assert_eq!(hash_key("servers").len(), 64);
        assert_ne!(hash_key("servers"), hash_key("servers "));
    }

    #[test]
    fn test_params_key_ignores_order() {
        let a = params_key("search", [("name", "fip"), ("countrycode", "FR")]);
        let b = params_key("search", [("countrycode", "FR"), ("name", "fip")]);
        assert_eq!(a, b);
        assert!(a.starts_with("search_"));
    }

    #[test]
    fn test_params_key_drops_empty_values() {
        let a = params_key("search", [("name", "fip"), ("tag", "")]);
        let b = params_key("search", [("name", "fip")]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_params_key_distinguishes_values() {
        let a = params_key("search", [("name", "fip")]);
        let b = params_key("search", [("name", "fap")]);
        let c = params_key("top", [("name", "fip")]);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_params_key_resists_separator_injection() {
        // "a=b&c" ne doit pas entrer en collision avec deux paramètres distincts
        let a = params_key("q", [("a", "b&c=d")]);
        let b = params_key("q", [("a", "b"), ("c", "d")]);
        assert_ne!(a, b);
    }
}

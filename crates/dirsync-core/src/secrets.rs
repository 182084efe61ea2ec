//! Secret and ConfigMap records resolved by name

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

use crate::{Error, Result};

/// Name-keyed binary record, e.g. credentials for a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    pub name: String,
    pub data: BTreeMap<String, Vec<u8>>,
}

impl Secret {
    /// Fail on the first key not listed in `allowed`.
    pub fn expect_keys(&self, allowed: &[&str]) -> Result<()> {
        match self.data.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(field) => Err(Error::UnexpectedField {
                kind: "Secret",
                name: self.name.clone(),
                field: field.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Value of `key` as UTF-8 text, if present.
    pub fn text(&self, key: &str) -> Result<Option<String>> {
        self.data
            .get(key)
            .map(|bytes| {
                String::from_utf8(bytes.clone()).map_err(|_| Error::InvalidResource {
                    kind: "Secret",
                    name: self.name.clone(),
                    message: format!("value of '{key}' is not valid UTF-8"),
                })
            })
            .transpose()
    }
}

/// Name-keyed text record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMap {
    pub name: String,
    pub data: BTreeMap<String, String>,
}

/// Resolve Secret and ConfigMap records by name.
///
/// Implementations fail when no record or more than one record carries
/// the requested name.
pub trait SecretLookup {
    fn get_secret(&self, name: &str) -> Result<Secret>;

    fn get_config_map(&self, name: &str) -> Result<ConfigMap>;
}

/// Records loaded from the config document stream.
#[derive(Debug, Clone, Default)]
pub struct DocumentSecrets {
    secrets: Vec<Secret>,
    config_maps: Vec<ConfigMap>,
}

impl DocumentSecrets {
    pub fn new(secrets: Vec<Secret>, config_maps: Vec<ConfigMap>) -> Self {
        Self {
            secrets,
            config_maps,
        }
    }

    pub fn push_secret(&mut self, secret: Secret) {
        self.secrets.push(secret);
    }

    pub fn push_config_map(&mut self, config_map: ConfigMap) {
        self.config_maps.push(config_map);
    }
}

fn find_one<'a, T>(
    items: &'a [T],
    kind: &'static str,
    name: &str,
    name_of: impl Fn(&T) -> &str,
) -> Result<&'a T> {
    let mut matches = items.iter().filter(|item| name_of(item) == name);
    match (matches.next(), matches.next()) {
        (Some(item), None) => Ok(item),
        (None, _) => Err(Error::ResourceNotFound {
            kind,
            name: name.to_string(),
        }),
        (Some(_), Some(_)) => Err(Error::ResourceAmbiguous {
            kind,
            name: name.to_string(),
        }),
    }
}

impl SecretLookup for DocumentSecrets {
    fn get_secret(&self, name: &str) -> Result<Secret> {
        find_one(&self.secrets, "Secret", name, |s| s.name.as_str()).cloned()
    }

    fn get_config_map(&self, name: &str) -> Result<ConfigMap> {
        find_one(&self.config_maps, "ConfigMap", name, |c| c.name.as_str()).cloned()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Metadata {
    pub(crate) name: String,
}

/// Kubernetes-shaped Secret document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SecretDocument {
    pub(crate) metadata: Metadata,
    /// base64 values
    #[serde(default)]
    pub(crate) data: BTreeMap<String, String>,
    /// Plain values, winning over `data` on conflicting keys
    #[serde(default)]
    pub(crate) string_data: BTreeMap<String, String>,
}

impl TryFrom<SecretDocument> for Secret {
    type Error = Error;

    fn try_from(doc: SecretDocument) -> Result<Self> {
        let name = doc.metadata.name;
        let mut data = BTreeMap::new();
        for (key, encoded) in doc.data {
            let decoded = STANDARD
                .decode(encoded.trim())
                .map_err(|e| Error::InvalidResource {
                    kind: "Secret",
                    name: name.clone(),
                    message: format!("value of '{key}' is not valid base64: {e}"),
                })?;
            data.insert(key, decoded);
        }
        for (key, value) in doc.string_data {
            data.insert(key, value.into_bytes());
        }
        Ok(Self { name, data })
    }
}

/// Kubernetes-shaped ConfigMap document.
#[derive(Debug, Deserialize)]
pub(crate) struct ConfigMapDocument {
    pub(crate) metadata: Metadata,
    #[serde(default)]
    pub(crate) data: BTreeMap<String, String>,
}

impl From<ConfigMapDocument> for ConfigMap {
    fn from(doc: ConfigMapDocument) -> Self {
        Self {
            name: doc.metadata.name,
            data: doc.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn secret(name: &str, pairs: &[(&str, &str)]) -> Secret {
        Secret {
            name: name.to_string(),
            data: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
                .collect(),
        }
    }

    #[test]
    fn lookup_by_unique_name() {
        let store = DocumentSecrets::new(vec![secret("a", &[]), secret("b", &[("k", "v")])], vec![]);
        assert_eq!(store.get_secret("b").unwrap().text("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn lookup_missing_name_fails() {
        let store = DocumentSecrets::default();
        let err = store.get_config_map("nope").unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound { kind: "ConfigMap", .. }));
    }

    #[test]
    fn lookup_ambiguous_name_fails() {
        let store = DocumentSecrets::new(vec![secret("dup", &[]), secret("dup", &[])], vec![]);
        let err = store.get_secret("dup").unwrap_err();
        assert!(matches!(err, Error::ResourceAmbiguous { ref name, .. } if name == "dup"));
    }

    #[test]
    fn unexpected_key_is_named() {
        let s = secret("creds", &[("username", "u"), ("token", "t")]);
        let err = s.expect_keys(&["username", "password"]).unwrap_err();
        assert!(matches!(err, Error::UnexpectedField { ref field, .. } if field == "token"));
    }

    #[test]
    fn secret_document_decodes_base64_and_string_data() {
        let doc: SecretDocument = serde_yaml::from_str(
            "metadata: {name: creds}\ndata:\n  username: dXNlcg==\n  password: b2xk\nstringData:\n  password: new\n",
        )
        .unwrap();
        let secret = Secret::try_from(doc).unwrap();

        assert_eq!(secret.text("username").unwrap().as_deref(), Some("user"));
        assert_eq!(secret.text("password").unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn secret_document_rejects_bad_base64() {
        let doc: SecretDocument =
            serde_yaml::from_str("metadata: {name: creds}\ndata:\n  username: '***'\n").unwrap();
        assert!(matches!(
            Secret::try_from(doc),
            Err(Error::InvalidResource { .. })
        ));
    }
}

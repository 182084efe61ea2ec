//! Multi-document config loading

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;

use super::{CONFIG_KIND, Config, check_header};
use crate::secrets::{ConfigMap, ConfigMapDocument, DocumentSecrets, Secret, SecretDocument};
use crate::{Error, Result};

/// Everything found in a config document stream.
#[derive(Debug, Clone)]
pub struct LoadedDocuments {
    /// All `Config` documents concatenated in stream order
    pub config: Config,
    pub secrets: DocumentSecrets,
}

/// Load and merge every document of every file in `paths`.
///
/// Fails when no `Config` document was found. The merged config is not
/// validated here; see [`Config::validate`].
pub fn load_files(paths: &[PathBuf]) -> Result<LoadedDocuments> {
    let mut config: Option<Config> = None;
    let mut secrets = DocumentSecrets::default();

    for path in paths {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.clone(),
            source,
        })?;
        collect(&text, &origin(path), &mut config, &mut secrets)?;
    }

    let config = config.ok_or(Error::MissingConfig)?;
    Ok(LoadedDocuments { config, secrets })
}

/// Load documents from in-memory text, labelled `origin` in errors.
pub fn load_str(text: &str, origin: &str) -> Result<LoadedDocuments> {
    let mut config = None;
    let mut secrets = DocumentSecrets::default();
    collect(text, origin, &mut config, &mut secrets)?;
    let config = config.ok_or(Error::MissingConfig)?;
    Ok(LoadedDocuments { config, secrets })
}

fn origin(path: &Path) -> String {
    path.display().to_string()
}

fn collect(
    text: &str,
    origin: &str,
    config: &mut Option<Config>,
    secrets: &mut DocumentSecrets,
) -> Result<()> {
    let parse = |source: serde_yaml::Error| Error::Parse {
        origin: origin.to_string(),
        source,
    };

    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document).map_err(parse)?;
        if value.is_null() {
            continue;
        }

        let kind = value
            .get("kind")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match kind.as_str() {
            CONFIG_KIND => {
                let doc: Config = serde_yaml::from_value(value).map_err(parse)?;
                check_header(&doc.api_version, &doc.kind, CONFIG_KIND)?;
                match config {
                    Some(existing) => existing.extend(doc),
                    None => *config = Some(doc),
                }
            }
            "Secret" => {
                let doc: SecretDocument = serde_yaml::from_value(value).map_err(parse)?;
                secrets.push_secret(Secret::try_from(doc)?);
            }
            "ConfigMap" => {
                let doc: ConfigMapDocument = serde_yaml::from_value(value).map_err(parse)?;
                secrets.push_config_map(ConfigMap::from(doc));
            }
            other => {
                return Err(Error::config(format!(
                    "Unknown document kind '{other}' in {origin}"
                )));
            }
        }
    }

    tracing::debug!(origin, "loaded config documents");
    Ok(())
}

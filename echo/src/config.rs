//! Loading of the YAML data directories that define an assistant:
//! `entities/`, `sentences/` and `responses/` under a single root.
//!
//! Files inside each directory are merged in sorted filename order. Intent
//! insertion order is preserved across files because it doubles as the
//! matcher's tie-break order.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{EchoError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntitySpec {
    /// Type tag selecting the value normaliser; defaults to the entity name.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntentSpec {
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub requires: Vec<String>,
}

/// A template value in a response file: either one string or a list the
/// renderer picks from uniformly at random.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Templates {
    One(String),
    Many(Vec<String>),
}

impl Templates {
    pub fn pick(&self) -> &str {
        use rand::seq::SliceRandom;

        match self {
            Templates::One(s) => s,
            Templates::Many(list) => list
                .choose(&mut rand::thread_rng())
                .map(String::as_str)
                .unwrap_or(""),
        }
    }

    pub fn all(&self) -> Vec<&str> {
        match self {
            Templates::One(s) => vec![s.as_str()],
            Templates::Many(list) => list.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseSpec {
    pub default: Templates,
    #[serde(default)]
    pub contexts: HashMap<String, Templates>,
}

#[derive(Deserialize)]
struct EntityFile {
    #[serde(default)]
    entities: HashMap<String, EntitySpec>,
}

#[derive(Deserialize)]
struct SentenceFile {
    #[serde(default)]
    intents: serde_yaml::Mapping,
}

#[derive(Deserialize)]
struct ResponseFile {
    #[serde(default)]
    responses: ResponseSection,
}

#[derive(Deserialize, Default)]
struct ResponseSection {
    #[serde(default)]
    intents: HashMap<String, ResponseSpec>,
}

#[derive(Debug, Default)]
pub struct EchoConfig {
    pub root: PathBuf,
    pub entities: HashMap<String, EntitySpec>,
    /// Ordered: the position an intent was first registered at is kept even
    /// if a later file overrides its definition.
    pub intents: Vec<(String, IntentSpec)>,
    pub responses: HashMap<String, ResponseSpec>,
}

impl EchoConfig {
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        let entities_dir = root.join("entities");
        let sentences_dir = root.join("sentences");
        let responses_dir = root.join("responses");

        for dir in [&entities_dir, &sentences_dir, &responses_dir] {
            if !dir.is_dir() {
                return Err(EchoError::MissingDirectory(dir.display().to_string()));
            }
        }

        let mut config = EchoConfig {
            root,
            ..Default::default()
        };

        for path in yaml_files(&entities_dir)? {
            match load_yaml::<EntityFile>(&path) {
                Ok(file) => config.entities.extend(file.entities),
                Err(e) => log::error!("Skipping entity file: {}", e),
            }
        }

        for path in yaml_files(&sentences_dir)? {
            match load_yaml::<SentenceFile>(&path) {
                Ok(file) => config.merge_intents(file.intents, &path),
                Err(e) => log::error!("Skipping sentence file: {}", e),
            }
        }

        for path in yaml_files(&responses_dir)? {
            match load_yaml::<ResponseFile>(&path) {
                Ok(file) => config.responses.extend(file.responses.intents),
                Err(e) => log::error!("Skipping response file: {}", e),
            }
        }

        log::info!(
            "Loaded {} entities, {} intents, {} response sets from {}",
            config.entities.len(),
            config.intents.len(),
            config.responses.len(),
            config.root.display()
        );

        Ok(config)
    }

    fn merge_intents(&mut self, mapping: serde_yaml::Mapping, path: &Path) {
        for (key, value) in mapping {
            let Some(name) = key.as_str().map(str::to_string) else {
                log::error!("Non-string intent key in {}", path.display());
                continue;
            };

            match serde_yaml::from_value::<IntentSpec>(value) {
                Ok(spec) => self.upsert_intent(name, spec),
                Err(e) => log::error!("Invalid intent '{}' in {}: {}", name, path.display(), e),
            }
        }
    }

    fn upsert_intent(&mut self, name: String, spec: IntentSpec) {
        if let Some(slot) = self.intents.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = spec;
        } else {
            self.intents.push((name, spec));
        }
    }
}

fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|source| EchoError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false)
        })
        .collect();

    files.sort();
    Ok(files)
}

fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).map_err(|source| EchoError::Io {
        path: path.display().to_string(),
        source,
    })?;

    serde_yaml::from_str(&raw).map_err(|source| EchoError::Yaml {
        path: path.display().to_string(),
        source,
    })
}

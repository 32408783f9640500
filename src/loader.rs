//! Grammar loaders - where raw grammars come from
//!
//! The registry never reads grammars itself. It asks a `GrammarLoader` for
//! the grammar of a scope at most once and registers whatever comes back.

use crate::grammar::RawGrammar;
use crate::scope::ScopeName;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Source of raw grammars, supplied by the embedder.
#[async_trait]
pub trait GrammarLoader: Send + Sync {
    /// Fetch the grammar of `scope`. `Ok(None)` means "no such grammar" and
    /// is not an error.
    async fn load_grammar(&self, scope: &ScopeName) -> anyhow::Result<Option<RawGrammar>>;

    /// Scopes to inject into `scope`
    fn injections(&self, _scope: &ScopeName) -> Vec<ScopeName> {
        Vec::new()
    }
}

/// Only the key needed to index a grammar file
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrammarHeader {
    scope_name: Option<String>,
}

/// Loads JSON grammars from directories on disk.
///
/// Construction indexes every `*.json` file (including `*.tmLanguage.json`)
/// under the directories by its `scopeName`; a grammar file is only parsed
/// in full when its scope is requested. The first file found for a scope
/// wins.
#[derive(Debug, Default)]
pub struct DirectoryLoader {
    index: HashMap<ScopeName, PathBuf>,
    injections: HashMap<ScopeName, Vec<ScopeName>>,
}

impl DirectoryLoader {
    pub fn new<I, P>(dirs: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut loader = Self::default();
        for dir in dirs {
            loader.index_dir(dir.as_ref())?;
        }
        tracing::debug!("Indexed {} grammars", loader.index.len());
        Ok(loader)
    }

    /// Injection table: target scope to the scopes injected into it
    pub fn with_injections(mut self, injections: HashMap<ScopeName, Vec<ScopeName>>) -> Self {
        self.injections = injections;
        self
    }

    /// Indexed scopes, sorted
    pub fn scopes(&self) -> Vec<&ScopeName> {
        let mut scopes: Vec<&ScopeName> = self.index.keys().collect();
        scopes.sort();
        scopes
    }

    pub fn path_of(&self, scope: &ScopeName) -> Option<&Path> {
        self.index.get(scope).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn index_dir(&mut self, dir: &Path) -> anyhow::Result<()> {
        if !dir.is_dir() {
            anyhow::bail!("grammar directory {} does not exist", dir.display());
        }

        let pattern = dir.join("**").join("*.json");
        let pattern = pattern.to_string_lossy();
        let mut paths: Vec<PathBuf> = glob::glob(&pattern)?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!("Skipping unreadable path: {}", e);
                    None
                }
            })
            .collect();
        paths.sort();

        for path in paths {
            match read_scope_name(&path) {
                Ok(Some(scope)) => {
                    if let Some(existing) = self.index.get(&scope) {
                        tracing::warn!(
                            "{} declares {} already provided by {}, ignoring",
                            path.display(),
                            scope,
                            existing.display()
                        );
                        continue;
                    }
                    tracing::trace!("Indexed {} from {}", scope, path.display());
                    self.index.insert(scope, path);
                }
                Ok(None) => tracing::trace!("{} has no scopeName", path.display()),
                Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
            }
        }
        Ok(())
    }
}

fn read_scope_name(path: &Path) -> anyhow::Result<Option<ScopeName>> {
    let contents = std::fs::read_to_string(path)?;
    let header: GrammarHeader = serde_json::from_str(&contents)?;
    header
        .scope_name
        .map(|name| ScopeName::parse(&name))
        .transpose()
        .map_err(Into::into)
}

#[async_trait]
impl GrammarLoader for DirectoryLoader {
    async fn load_grammar(&self, scope: &ScopeName) -> anyhow::Result<Option<RawGrammar>> {
        let Some(path) = self.index.get(scope) else {
            return Ok(None);
        };

        let contents = tokio::fs::read_to_string(path).await?;
        let grammar = RawGrammar::from_json_str(&contents)?;
        if grammar.scope_name != *scope {
            anyhow::bail!(
                "{} changed its scopeName from {} to {}",
                path.display(),
                scope,
                grammar.scope_name
            );
        }
        tracing::debug!("Loaded {} from {}", scope, path.display());
        Ok(Some(grammar))
    }

    fn injections(&self, scope: &ScopeName) -> Vec<ScopeName> {
        self.injections.get(scope).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::scope;
    use std::fs;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, contents: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_indexes_and_loads_on_demand() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "js/JavaScript.tmLanguage.json",
            r#"{ "scopeName": "source.js", "patterns": [ { "include": "source.regexp" } ] }"#,
        );
        write(dir.path(), "package.json", r#"{ "name": "not-a-grammar" }"#);
        write(dir.path(), "broken.json", "{ nope");

        let loader = DirectoryLoader::new(&[dir.path()]).unwrap();
        assert_eq!(loader.scopes(), vec![&scope("source.js")]);

        let grammar = loader.load_grammar(&scope("source.js")).await.unwrap().unwrap();
        assert_eq!(grammar.patterns.len(), 1);
        assert!(loader.load_grammar(&scope("source.css")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_injections_come_from_the_table() {
        let dir = tempdir().unwrap();
        let loader = DirectoryLoader::new(&[dir.path()])
            .unwrap()
            .with_injections([(scope("source.js"), vec![scope("text.todo")])].into());

        assert_eq!(loader.injections(&scope("source.js")), vec![scope("text.todo")]);
        assert!(loader.injections(&scope("source.css")).is_empty());
        assert!(loader.is_empty());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(DirectoryLoader::new(&[dir.path().join("absent")]).is_err());
    }

    #[test]
    fn test_first_file_wins() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.json", r#"{ "scopeName": "source.x" }"#);
        write(dir.path(), "b.json", r#"{ "scopeName": "source.x" }"#);

        let loader = DirectoryLoader::new(&[dir.path()]).unwrap();
        assert_eq!(loader.len(), 1);
        assert!(loader.path_of(&scope("source.x")).unwrap().ends_with("a.json"));
    }
}

use crate::attributes::GrammarConfiguration;
use crate::scope::ScopeName;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Contents of `tmreg.toml`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TmregConfig {
    /// Directories searched for `*.json` grammars
    #[serde(default)]
    pub grammar_dirs: Vec<PathBuf>,
    pub language_id: Option<u32>,
    /// Theme file applied before tokenizing
    pub theme: Option<PathBuf>,
    /// Target scope to the scopes injected into it
    #[serde(default)]
    pub injections: BTreeMap<String, Vec<String>>,
    /// Embedded language scope to language id
    #[serde(default)]
    pub embedded_languages: BTreeMap<String, u32>,
}

impl TmregConfig {
    pub fn starter() -> Self {
        Self {
            grammar_dirs: vec![PathBuf::from("grammars")],
            language_id: Some(1),
            ..Self::default()
        }
    }

    /// Injection table with validated scope names
    pub fn injection_table(&self) -> anyhow::Result<HashMap<ScopeName, Vec<ScopeName>>> {
        self.injections
            .iter()
            .map(|(target, injected)| -> anyhow::Result<(ScopeName, Vec<ScopeName>)> {
                let injected = injected
                    .iter()
                    .map(|s| ScopeName::parse(s))
                    .collect::<crate::Result<Vec<_>>>()?;
                Ok((ScopeName::parse(target)?, injected))
            })
            .collect()
    }

    pub fn grammar_configuration(&self) -> anyhow::Result<GrammarConfiguration> {
        let embedded_languages = self
            .embedded_languages
            .iter()
            .map(|(scope, id)| -> anyhow::Result<(ScopeName, u32)> {
                Ok((ScopeName::parse(scope)?, *id))
            })
            .collect::<anyhow::Result<HashMap<_, _>>>()?;
        Ok(GrammarConfiguration::with_embedded_languages(embedded_languages))
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("tmreg.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<TmregConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: TmregConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &TmregConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Resolve config-relative paths against the directory holding the config
pub fn resolve_relative(config_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(path),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tmreg.toml");
        let mut config = TmregConfig::starter();
        config
            .injections
            .insert("source.js".to_string(), vec!["text.todo".to_string()]);
        config.embedded_languages.insert("source.css".to_string(), 2);

        write_config(&path, &config, false).unwrap();
        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded, config);

        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).unwrap().is_none());
    }

    #[test]
    fn test_tables_are_validated() {
        let mut config = TmregConfig::default();
        config
            .injections
            .insert("source.js".to_string(), vec!["text.todo".to_string()]);
        config.embedded_languages.insert("source.css".to_string(), 2);

        let injections = config.injection_table().unwrap();
        assert_eq!(injections.len(), 1);
        let grammar_config = config.grammar_configuration().unwrap();
        assert_eq!(grammar_config.embedded_languages.len(), 1);

        config
            .embedded_languages
            .insert("bad scope".to_string(), 3);
        assert!(config.grammar_configuration().is_err());
    }

    #[test]
    fn test_resolve_relative() {
        let config = Path::new("/work/tmreg.toml");
        assert_eq!(
            resolve_relative(config, Path::new("grammars")),
            PathBuf::from("/work/grammars")
        );
        assert_eq!(
            resolve_relative(Path::new("tmreg.toml"), Path::new("grammars")),
            PathBuf::from("grammars")
        );
    }
}

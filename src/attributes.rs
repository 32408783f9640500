//! Scope attributes - language and token class of a scope name
//!
//! Two independent classifications feed the metadata word of a token:
//! - language id: longest embedded-language scope that prefixes the scope
//! - token type: first whole-word `comment`, `string`, `regex` or
//!   `meta.embedded` in the scope name, optionally overridden by configured
//!   selectors matched against the full scope path

use crate::metadata::{MAX_LANGUAGE_ID, MetadataPatch, TokenType};
use crate::scope::ScopeName;
use crate::selector::ScopeSelector;
use crate::{Error, Result};
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

static STANDARD_TOKEN_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(comment|string|regex|meta\.embedded)\b").expect("static token type regex")
});

/// Per-grammar configuration supplied when a grammar is requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrammarConfiguration {
    /// Scope of an embedded language to its language id
    #[serde(default)]
    pub embedded_languages: HashMap<ScopeName, u32>,
    /// Scope selector to the token type forced on matching tokens
    #[serde(default)]
    pub token_types: BTreeMap<String, TokenType>,
}

impl GrammarConfiguration {
    pub fn with_embedded_languages(embedded_languages: HashMap<ScopeName, u32>) -> Self {
        Self {
            embedded_languages,
            token_types: BTreeMap::new(),
        }
    }
}

/// Language and token class of one scope.
///
/// `token_type == None` means "not set": the scope inherits its parent's class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeAttributes {
    pub language_id: u32,
    pub token_type: Option<TokenType>,
}

impl ScopeAttributes {
    /// Metadata overlay applied when this scope is pushed; language id 0
    /// means "no embedded language" and keeps the parent's language.
    pub fn to_patch(self) -> MetadataPatch {
        MetadataPatch {
            language_id: (self.language_id != 0).then_some(self.language_id),
            token_type: self.token_type,
            ..MetadataPatch::default()
        }
    }
}

/// Maps scope names to the longest matching embedded-language scope
#[derive(Debug)]
struct EmbeddedLanguageMatcher {
    languages: HashMap<String, u32>,
    pattern: Regex,
}

impl EmbeddedLanguageMatcher {
    fn new(embedded: &HashMap<ScopeName, u32>) -> Result<Option<Self>> {
        if embedded.is_empty() {
            return Ok(None);
        }

        let mut escaped: Vec<String> = embedded.keys().map(|s| regex::escape(s.as_str())).collect();
        // Reverse order puts `a.b.c` before `a.b`, so the longest scope wins
        escaped.sort();
        escaped.reverse();
        let pattern = format!(r"^(({}))($|\.)", escaped.join(")|("));
        let pattern = Regex::new(&pattern)
            .map_err(|e| Error::InvalidScope(format!("embedded language pattern: {}", e)))?;

        let languages = embedded
            .iter()
            .map(|(scope, id)| (scope.to_string(), *id))
            .collect();
        Ok(Some(Self { languages, pattern }))
    }

    fn language_of(&self, scope: &str) -> Option<u32> {
        let captures = self.pattern.captures(scope)?;
        let matched = captures.get(1)?;
        self.languages.get(matched.as_str()).copied()
    }
}

/// Resolves [`ScopeAttributes`] for the scopes of one grammar.
#[derive(Debug)]
pub struct ScopeAttributesProvider {
    initial_language_id: u32,
    embedded: Option<EmbeddedLanguageMatcher>,
    token_type_overrides: Vec<(ScopeSelector, TokenType)>,
    cache: Mutex<HashMap<ScopeName, ScopeAttributes>>,
}

impl ScopeAttributesProvider {
    /// Build a provider; every language id must fit the metadata layout
    pub fn new(initial_language_id: u32, configuration: &GrammarConfiguration) -> Result<Self> {
        check_language_id(initial_language_id)?;
        for id in configuration.embedded_languages.values() {
            check_language_id(*id)?;
        }

        let token_type_overrides = configuration
            .token_types
            .iter()
            .flat_map(|(selector, token_type)| {
                ScopeSelector::parse_list(selector)
                    .into_iter()
                    .map(move |s| (s, *token_type))
            })
            .collect();

        Ok(Self {
            initial_language_id,
            embedded: EmbeddedLanguageMatcher::new(&configuration.embedded_languages)?,
            token_type_overrides,
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn initial_language_id(&self) -> u32 {
        self.initial_language_id
    }

    /// Attributes of the grammar's root scope
    pub fn default_attributes(&self) -> ScopeAttributes {
        ScopeAttributes {
            language_id: self.initial_language_id,
            token_type: None,
        }
    }

    /// Attributes of a single scope name (memoized)
    pub fn attributes(&self, scope: &ScopeName) -> ScopeAttributes {
        if let Some(cached) = self.cache.lock().get(scope) {
            return *cached;
        }

        let attributes = ScopeAttributes {
            language_id: self
                .embedded
                .as_ref()
                .and_then(|m| m.language_of(scope.as_str()))
                .unwrap_or(0),
            token_type: standard_token_type(scope.as_str()),
        };
        self.cache.lock().insert(scope.clone(), attributes);
        attributes
    }

    /// Token type forced by configured selectors for a scope path
    /// (outermost first). The last matching selector wins.
    pub fn token_type_override(&self, path: &[&ScopeName]) -> Option<TokenType> {
        self.token_type_overrides
            .iter()
            .filter(|(selector, _)| selector.matches(path))
            .map(|(_, token_type)| *token_type)
            .last()
    }
}

fn check_language_id(id: u32) -> Result<()> {
    if id > MAX_LANGUAGE_ID {
        Err(Error::LanguageIdOutOfRange(id))
    } else {
        Ok(())
    }
}

fn standard_token_type(scope: &str) -> Option<TokenType> {
    let captures = STANDARD_TOKEN_TYPE.captures(scope)?;
    match captures.get(1)?.as_str() {
        "comment" => Some(TokenType::COMMENT),
        "string" => Some(TokenType::STRING),
        "regex" => Some(TokenType::REGEX),
        "meta.embedded" => Some(TokenType::OTHER),
        _ => None,
    }
}

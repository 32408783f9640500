//! Tokenization surface of a resolved grammar
//!
//! The rule-matching engine lives behind these types; the registry only
//! hands out `Arc<dyn Grammar>` handles produced by a `TokenizerEngine`.

use crate::metadata::MetadataWord;
use crate::scope::ScopeName;
use crate::stack::StateStack;
use serde::Serialize;

/// A ready-to-use grammar.
pub trait Grammar: Send + Sync {
    /// Scope of the grammar's root rule
    fn scope_name(&self) -> &ScopeName;

    /// Tokenize one line into tokens carrying their full scope path.
    ///
    /// `prev_state` is the `rule_stack` returned for the previous line, or
    /// `None` for the first line.
    fn tokenize_line(&self, line: &str, prev_state: Option<&StateStack>) -> TokenizeLineResult;

    /// Tokenize one line into packed `(start offset, metadata)` pairs.
    fn tokenize_line2(&self, line: &str, prev_state: Option<&StateStack>) -> TokenizeLineResult2;
}

/// One token of a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub start_index: usize,
    pub end_index: usize,
    /// Scope path, outermost first
    pub scopes: Vec<ScopeName>,
}

impl Token {
    pub fn len(&self) -> usize {
        self.end_index.saturating_sub(self.start_index)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The token's text within its line
    pub fn text<'a>(&self, line: &'a str) -> &'a str {
        line.get(self.start_index..self.end_index).unwrap_or("")
    }
}

#[derive(Debug, Clone)]
pub struct TokenizeLineResult {
    pub tokens: Vec<Token>,
    /// State to pass in for the next line
    pub rule_stack: StateStack,
    /// Tokenization hit a time limit and the rest of the line is one token
    pub stopped_early: bool,
}

#[derive(Debug, Clone)]
pub struct TokenizeLineResult2 {
    /// Flattened pairs: `[offset0, metadata0, offset1, metadata1, ...]`
    pub tokens: Vec<u32>,
    pub rule_stack: StateStack,
    pub stopped_early: bool,
}

impl TokenizeLineResult2 {
    /// Number of `(offset, metadata)` pairs
    pub fn token_count(&self) -> usize {
        self.tokens.len() / 2
    }

    /// Decode the flattened pairs
    pub fn iter(&self) -> impl Iterator<Item = (usize, MetadataWord)> + '_ {
        self.tokens
            .chunks_exact(2)
            .map(|pair| (pair[0] as usize, MetadataWord::from_bits(pair[1])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{FontStyle, TokenType};
    use crate::stack::{RuleId, ScopeStack};

    fn state() -> StateStack {
        let scope = ScopeName::parse("source.test").unwrap();
        StateStack::root(RuleId(1), ScopeStack::root(scope, MetadataWord::default()))
    }

    #[test]
    fn test_packed_pairs() {
        let word = MetadataWord::pack(1, TokenType::STRING, FontStyle::empty(), 5, 2);
        let result = TokenizeLineResult2 {
            tokens: vec![0, MetadataWord::default().bits(), 4, word.bits()],
            rule_stack: state(),
            stopped_early: false,
        };

        assert_eq!(result.token_count(), 2);
        let pairs: Vec<_> = result.iter().collect();
        assert_eq!(pairs[1], (4, word));
    }

    #[test]
    fn test_token_text() {
        let token = Token {
            start_index: 4,
            end_index: 9,
            scopes: vec![ScopeName::parse("source.test").unwrap()],
        };
        assert_eq!(token.text("let hello = 1"), "hello");
        assert_eq!(token.len(), 5);
        assert_eq!(token.text("abc"), "");
    }
}

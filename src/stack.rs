//! Continuation state threaded from one tokenized line to the next
//!
//! Both stacks are persistent linked lists behind `Arc`: pushing shares the
//! parent, cloning is a reference-count bump and nothing is ever mutated in
//! place. Callers hold on to the `StateStack` returned for a line and hand
//! it back for the following line.

use crate::attributes::ScopeAttributesProvider;
use crate::metadata::{MetadataPatch, MetadataWord};
use crate::scope::ScopeName;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identifier of a compiled rule, assigned by the tokenizer engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub u32);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ScopeStack
// ---------------------------------------------------------------------------

struct ScopeFrame {
    parent: Option<ScopeStack>,
    scope: ScopeName,
    metadata: MetadataWord,
}

/// Attributed scope path: every frame carries the metadata in effect once
/// its scope is entered.
#[derive(Clone)]
pub struct ScopeStack(Arc<ScopeFrame>);

impl ScopeStack {
    pub fn root(scope: ScopeName, metadata: MetadataWord) -> Self {
        Self(Arc::new(ScopeFrame {
            parent: None,
            scope,
            metadata,
        }))
    }

    /// Root frame for a grammar's own scope, using the provider's defaults
    pub fn root_attributed(scope: ScopeName, provider: &ScopeAttributesProvider) -> Self {
        let defaults = provider.default_attributes();
        let metadata = MetadataWord::default().apply(MetadataPatch {
            language_id: Some(defaults.language_id),
            ..MetadataPatch::default()
        });
        Self::root(scope, metadata)
    }

    pub fn push(&self, scope: ScopeName, metadata: MetadataWord) -> Self {
        Self(Arc::new(ScopeFrame {
            parent: Some(self.clone()),
            scope,
            metadata,
        }))
    }

    /// Push a scope, deriving its metadata from the parent frame and the
    /// scope's attributes; configured token type overrides win.
    pub fn push_attributed(&self, scope: ScopeName, provider: &ScopeAttributesProvider) -> Self {
        let attributes = provider.attributes(&scope);
        let mut metadata = self.metadata().apply(attributes.to_patch());

        let mut path = self.scope_names();
        path.push(&scope);
        if let Some(token_type) = provider.token_type_override(&path) {
            metadata = metadata.apply(MetadataPatch {
                token_type: Some(token_type),
                ..MetadataPatch::default()
            });
        }

        self.push(scope, metadata)
    }

    /// Innermost scope
    pub fn scope_name(&self) -> &ScopeName {
        &self.0.scope
    }

    /// Metadata of the innermost scope
    pub fn metadata(&self) -> MetadataWord {
        self.0.metadata
    }

    pub fn parent(&self) -> Option<&ScopeStack> {
        self.0.parent.as_ref()
    }

    /// Number of frames
    pub fn depth(&self) -> usize {
        self.iter().count()
    }

    /// Scope path, outermost first
    pub fn scope_names(&self) -> Vec<&ScopeName> {
        let mut names: Vec<&ScopeName> = self.iter().map(|frame| frame.scope_name()).collect();
        names.reverse();
        names
    }

    /// Frames from innermost to outermost
    pub fn iter(&self) -> impl Iterator<Item = &ScopeStack> {
        std::iter::successors(Some(self), |frame| frame.parent())
    }
}

impl PartialEq for ScopeStack {
    fn eq(&self, other: &Self) -> bool {
        let mut a = Some(self);
        let mut b = Some(other);
        loop {
            match (a, b) {
                (None, None) => return true,
                (Some(x), Some(y)) => {
                    if Arc::ptr_eq(&x.0, &y.0) {
                        return true;
                    }
                    if x.0.scope != y.0.scope || x.0.metadata != y.0.metadata {
                        return false;
                    }
                    a = x.parent();
                    b = y.parent();
                }
                _ => return false,
            }
        }
    }
}

impl Eq for ScopeStack {}

impl Hash for ScopeStack {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for frame in self.iter() {
            frame.0.scope.hash(state);
            frame.0.metadata.hash(state);
        }
    }
}

impl fmt::Debug for ScopeStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.scope_names()).finish()
    }
}

impl fmt::Display for ScopeStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.scope_names().into_iter().map(ScopeName::as_str).collect();
        f.write_str(&names.join(" "))
    }
}

// ---------------------------------------------------------------------------
// StateStack
// ---------------------------------------------------------------------------

/// Contents of one rule frame
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub rule_id: RuleId,
    /// Offset where the rule was entered on its line, `None` once the line ended
    pub enter_pos: Option<usize>,
    /// Offset of the `\G` anchor, `None` once the line ended
    pub anchor_pos: Option<usize>,
    /// Whether the begin match consumed the end of the line
    pub begin_rule_captured_eol: bool,
    /// End (or while) pattern with back-references already substituted
    pub end_rule: Option<Arc<str>>,
    pub name_scopes: ScopeStack,
    pub content_scopes: ScopeStack,
}

impl StackFrame {
    pub fn new(rule_id: RuleId, scopes: ScopeStack) -> Self {
        Self {
            rule_id,
            enter_pos: None,
            anchor_pos: None,
            begin_rule_captured_eol: false,
            end_rule: None,
            name_scopes: scopes.clone(),
            content_scopes: scopes,
        }
    }
}

struct StateNode {
    parent: Option<StateStack>,
    depth: usize,
    frame: StackFrame,
}

/// Tokenizer continuation.
///
/// Equality is structural over the chain of `(depth, rule id, end rule)`
/// plus the innermost content scopes. Positions never take part, so two
/// lines ending in the same rule state compare equal.
#[derive(Clone)]
pub struct StateStack(Arc<StateNode>);

impl StateStack {
    /// Bottom frame for a grammar's root rule
    pub fn root(rule_id: RuleId, scopes: ScopeStack) -> Self {
        Self(Arc::new(StateNode {
            parent: None,
            depth: 1,
            frame: StackFrame::new(rule_id, scopes),
        }))
    }

    pub fn push(&self, frame: StackFrame) -> Self {
        Self(Arc::new(StateNode {
            parent: Some(self.clone()),
            depth: self.depth() + 1,
            frame,
        }))
    }

    /// Parent state, `None` at the root
    pub fn pop(&self) -> Option<StateStack> {
        self.0.parent.clone()
    }

    /// Parent state, or this state when already at the root
    pub fn safe_pop(&self) -> StateStack {
        self.pop().unwrap_or_else(|| self.clone())
    }

    pub fn depth(&self) -> usize {
        self.0.depth
    }

    pub fn rule_id(&self) -> RuleId {
        self.0.frame.rule_id
    }

    pub fn enter_pos(&self) -> Option<usize> {
        self.0.frame.enter_pos
    }

    pub fn anchor_pos(&self) -> Option<usize> {
        self.0.frame.anchor_pos
    }

    pub fn begin_rule_captured_eol(&self) -> bool {
        self.0.frame.begin_rule_captured_eol
    }

    pub fn end_rule(&self) -> Option<&str> {
        self.0.frame.end_rule.as_deref()
    }

    pub fn name_scopes(&self) -> &ScopeStack {
        &self.0.frame.name_scopes
    }

    pub fn content_scopes(&self) -> &ScopeStack {
        &self.0.frame.content_scopes
    }

    pub fn frame(&self) -> &StackFrame {
        &self.0.frame
    }

    /// Same state with a different end rule
    pub fn with_end_rule(&self, end_rule: impl Into<Arc<str>>) -> Self {
        let end_rule = end_rule.into();
        if self.end_rule() == Some(&*end_rule) {
            return self.clone();
        }
        self.replace_frame(StackFrame {
            end_rule: Some(end_rule),
            ..self.0.frame.clone()
        })
    }

    /// Same state with different content scopes
    pub fn with_content_scopes(&self, content_scopes: ScopeStack) -> Self {
        if *self.content_scopes() == content_scopes {
            return self.clone();
        }
        self.replace_frame(StackFrame {
            content_scopes,
            ..self.0.frame.clone()
        })
    }

    /// True when a frame entered at the same position as `other` already
    /// runs `other`'s rule. Engines use this to stop endless begin loops.
    pub fn has_same_rule_as(&self, other: &StateStack) -> bool {
        let mut current = Some(self);
        while let Some(state) = current {
            if state.enter_pos() != other.enter_pos() {
                return false;
            }
            if state.rule_id() == other.rule_id() {
                return true;
            }
            current = state.0.parent.as_ref();
        }
        false
    }

    /// Copy of the whole chain with line positions cleared, done when a line
    /// is finished.
    pub fn clear_positions(&self) -> Self {
        let parent = self.0.parent.as_ref().map(StateStack::clear_positions);
        Self(Arc::new(StateNode {
            parent,
            depth: self.0.depth,
            frame: StackFrame {
                enter_pos: None,
                anchor_pos: None,
                ..self.0.frame.clone()
            },
        }))
    }

    /// Frames from innermost to outermost
    pub fn frames(&self) -> impl Iterator<Item = &StackFrame> {
        std::iter::successors(Some(self), |state| state.0.parent.as_ref()).map(|s| &s.0.frame)
    }

    fn replace_frame(&self, frame: StackFrame) -> Self {
        Self(Arc::new(StateNode {
            parent: self.0.parent.clone(),
            depth: self.0.depth,
            frame,
        }))
    }

    fn same_rule_chain(&self, other: &StateStack) -> bool {
        let mut a = Some(self);
        let mut b = Some(other);
        loop {
            match (a, b) {
                (None, None) => return true,
                (Some(x), Some(y)) => {
                    if Arc::ptr_eq(&x.0, &y.0) {
                        return true;
                    }
                    if x.depth() != y.depth()
                        || x.rule_id() != y.rule_id()
                        || x.end_rule() != y.end_rule()
                    {
                        return false;
                    }
                    a = x.0.parent.as_ref();
                    b = y.0.parent.as_ref();
                }
                _ => return false,
            }
        }
    }
}

impl PartialEq for StateStack {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        self.same_rule_chain(other) && self.content_scopes() == other.content_scopes()
    }
}

impl Eq for StateStack {}

impl Hash for StateStack {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.depth().hash(state);
        for frame in self.frames() {
            frame.rule_id.hash(state);
            frame.end_rule.hash(state);
        }
        self.content_scopes().hash(state);
    }
}

impl fmt::Debug for StateStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules: Vec<String> = self.frames().map(|frame| frame.rule_id.to_string()).collect();
        f.debug_struct("StateStack")
            .field("depth", &self.depth())
            .field("rules", &rules)
            .field("content_scopes", self.content_scopes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::GrammarConfiguration;
    use crate::metadata::TokenType;
    use std::collections::hash_map::DefaultHasher;

    fn scope(name: &str) -> ScopeName {
        ScopeName::parse(name).unwrap()
    }

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    fn root() -> StateStack {
        StateStack::root(RuleId(1), ScopeStack::root(scope("source.js"), MetadataWord::default()))
    }

    fn string_frame(enter_pos: usize) -> StackFrame {
        let scopes = ScopeStack::root(scope("source.js"), MetadataWord::default())
            .push(scope("string.quoted.js"), MetadataWord::default());
        StackFrame {
            enter_pos: Some(enter_pos),
            anchor_pos: Some(enter_pos + 1),
            end_rule: Some(Arc::from("\"")),
            ..StackFrame::new(RuleId(7), scopes)
        }
    }

    #[test]
    fn test_equality_ignores_positions() {
        let a = root().push(string_frame(3));
        let b = root().push(string_frame(10));

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_eq!(a.clear_positions(), a);
        assert_eq!(a.clear_positions().enter_pos(), None);
    }

    #[test]
    fn test_equality_tracks_rules_and_scopes() {
        let a = root().push(string_frame(0));
        let other_end = a.with_end_rule("'");
        assert_ne!(a, other_end);

        let other_scopes = a.with_content_scopes(
            a.content_scopes().push(scope("meta.embedded"), MetadataWord::default()),
        );
        assert_ne!(a, other_scopes);

        assert_ne!(a, root());
    }

    #[test]
    fn test_pop_and_safe_pop() {
        let base = root();
        let pushed = base.push(string_frame(0));

        assert_eq!(pushed.depth(), 2);
        assert_eq!(pushed.pop(), Some(base.clone()));
        assert!(base.pop().is_none());
        assert_eq!(base.safe_pop(), base);
        assert_eq!(pushed.frames().count(), 2);
    }

    #[test]
    fn test_unchanged_updates_share_the_frame() {
        let state = root().push(string_frame(0));
        let same = state.with_end_rule("\"");
        assert!(Arc::ptr_eq(&state.0, &same.0));
    }

    #[test]
    fn test_has_same_rule_as() {
        let base = root();
        let first = base.push(string_frame(4));
        let second = first.push(StackFrame {
            rule_id: RuleId(9),
            ..string_frame(4)
        });

        assert!(second.has_same_rule_as(&first));
        assert!(!second.has_same_rule_as(&base));
    }

    #[test]
    fn test_push_attributed_inherits_and_overrides() {
        let mut configuration = GrammarConfiguration::with_embedded_languages(
            [(scope("source.css"), 2)].into_iter().collect(),
        );
        configuration
            .token_types
            .insert("string.template".to_string(), TokenType::OTHER);
        let provider = ScopeAttributesProvider::new(1, &configuration).unwrap();

        let stack = ScopeStack::root_attributed(scope("text.html"), &provider);
        assert_eq!(stack.metadata().language_id(), 1);

        let css = stack.push_attributed(scope("source.css.embedded"), &provider);
        assert_eq!(css.metadata().language_id(), 2);

        let comment = css.push_attributed(scope("comment.block.css"), &provider);
        assert_eq!(comment.metadata().language_id(), 2);
        assert_eq!(comment.metadata().token_type(), TokenType::COMMENT);

        let template = stack.push_attributed(scope("string.template.js"), &provider);
        assert_eq!(template.metadata().token_type(), TokenType::OTHER);

        assert_eq!(comment.to_string(), "text.html source.css.embedded comment.block.css");
        assert_eq!(comment.depth(), 3);
    }
}

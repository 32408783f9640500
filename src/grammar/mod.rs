//! Grammar definitions
//!
//! The core never compiles or executes grammars; it only walks their rule
//! trees to find out which other grammars they reference.

pub mod raw;

pub use raw::{IncludeReference, RawCaptures, RawGrammar, RawRule, Repository};

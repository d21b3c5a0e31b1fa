//! Rewriting of `#123` issue references after renumbering.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::HashMap;

/// Source issue id → target issue number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NumberMapping(HashMap<u64, u64>);

impl NumberMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, old: u64, new: u64) {
        self.0.insert(old, new);
    }

    pub fn get(&self, old: u64) -> Option<u64> {
        self.0.get(&old).copied()
    }

    pub fn contains(&self, old: u64) -> bool {
        self.0.contains_key(&old)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// A reference is `#<digits>` at the start of the text or after a character
// that cannot continue a word, an entity (`&#38;`) or another `#`.
static ISSUE_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^\w&#])#([0-9]+)\b").expect("Invalid regex"));

/// Rewrites issue references through a [`NumberMapping`].
pub struct Renumberer<'a> {
    mapping: &'a NumberMapping,
}

impl<'a> Renumberer<'a> {
    pub fn new(mapping: &'a NumberMapping) -> Self {
        Self { mapping }
    }

    fn lookup(&self, caps: &Captures<'_>) -> Option<u64> {
        caps[2].parse().ok().and_then(|old| self.mapping.get(old))
    }

    /// Rewrites every mapped reference in `text`.
    ///
    /// Unmapped references are kept byte for byte, and the input is
    /// returned borrowed when nothing was rewritten.
    pub fn rewrite<'t>(&self, text: &'t str) -> Cow<'t, str> {
        let rewrites = ISSUE_REFERENCE
            .captures_iter(text)
            .any(|caps| self.lookup(&caps).is_some());
        if !rewrites {
            return Cow::Borrowed(text);
        }

        ISSUE_REFERENCE.replace_all(text, |caps: &Captures<'_>| match self.lookup(caps) {
            Some(new) => format!("{}#{new}", &caps[1]),
            None => caps[0].to_string(),
        })
    }

    /// Rewrites an owned string in place.
    pub fn rewrite_in_place(&self, text: &mut String) {
        let rewritten = match self.rewrite(text) {
            Cow::Owned(rewritten) => rewritten,
            Cow::Borrowed(_) => return,
        };
        *text = rewritten;
    }
}

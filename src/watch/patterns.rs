// src/watch/patterns.rs

use std::fmt;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::ConfigFile;
use crate::errors::{DevsupError, Result};

/// Compiled allow/deny glob rules as a single predicate over paths.
///
/// Paths are relative to the project root with forward slashes
/// (e.g. `"src/server.ts"`). A path matches when it matches any allow
/// pattern and no deny pattern. An empty allow list allows everything, so a
/// matcher with only deny rules is a pure ignore list.
#[derive(Clone)]
pub struct PatternMatcher {
    allow: Option<GlobSet>,
    deny: Option<GlobSet>,
    allow_src: Vec<String>,
    deny_src: Vec<String>,
}

impl fmt::Debug for PatternMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternMatcher")
            .field("allow", &self.allow_src)
            .field("deny", &self.deny_src)
            .finish()
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::permissive()
    }
}

impl PatternMatcher {
    /// Compile both pattern lists. A malformed pattern fails here.
    pub fn build(allow: &[String], deny: &[String]) -> Result<Self> {
        let allow_set = if allow.is_empty() {
            None
        } else {
            Some(build_globset(allow)?)
        };
        let deny_set = if deny.is_empty() {
            None
        } else {
            Some(build_globset(deny)?)
        };

        Ok(Self {
            allow: allow_set,
            deny: deny_set,
            allow_src: allow.to_vec(),
            deny_src: deny.to_vec(),
        })
    }

    /// Matcher that accepts every path.
    pub fn permissive() -> Self {
        Self {
            allow: None,
            deny: None,
            allow_src: Vec::new(),
            deny_src: Vec::new(),
        }
    }

    /// Deny-only matcher.
    pub fn ignoring(deny: &[String]) -> Result<Self> {
        Self::build(&[], deny)
    }

    pub fn test(&self, rel_path: &str) -> bool {
        if self.is_denied(rel_path) {
            return false;
        }
        match &self.allow {
            Some(allow) => allow.is_match(rel_path),
            None => true,
        }
    }

    /// True when a deny rule matches, regardless of the allow list.
    pub fn is_denied(&self, rel_path: &str) -> bool {
        self.deny
            .as_ref()
            .map(|deny| deny.is_match(rel_path))
            .unwrap_or(false)
    }

    pub fn allow_patterns(&self) -> &[String] {
        &self.allow_src
    }

    pub fn deny_patterns(&self) -> &[String] {
        &self.deny_src
    }
}

/// Relevance rules of the core listener.
///
/// An event is relevant when the core matcher accepts it and no plugin
/// claims it through its `core_ignore` patterns.
#[derive(Debug, Clone, Default)]
pub struct CoreFilter {
    matcher: PatternMatcher,
    plugin_ignore: PatternMatcher,
}

impl CoreFilter {
    pub fn new(matcher: PatternMatcher, plugin_ignore: PatternMatcher) -> Self {
        Self {
            matcher,
            plugin_ignore,
        }
    }

    pub fn accepts(&self, rel_path: &str) -> bool {
        self.matcher.test(rel_path) && !self.plugin_ignore.is_denied(rel_path)
    }

    /// Ignore-rule check used for reported dependencies. Only deny rules
    /// apply: a dependency outside the allow list is still worth watching.
    pub fn is_ignored(&self, rel_path: &str) -> bool {
        self.matcher.is_denied(rel_path) || self.plugin_ignore.is_denied(rel_path)
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }
}

/// Build the core listener's filter from a validated config.
pub fn build_core_filter(cfg: &ConfigFile) -> Result<CoreFilter> {
    let matcher = PatternMatcher::build(&cfg.watch.allow, &cfg.watch.ignore)?;
    let plugin_ignore = PatternMatcher::ignoring(&cfg.plugin_core_ignores())?;
    Ok(CoreFilter::new(matcher, plugin_ignore))
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat)
            .map_err(|e| DevsupError::PatternError(format!("{pat}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| DevsupError::PatternError(e.to_string()))
}

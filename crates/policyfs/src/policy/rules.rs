//! Glob-based rule sets.

use super::handler::Predicate;
use super::operation::{Operation, OperationKind};
use crate::vfs::path;

/// Which operations a rule applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Scope {
    /// Every operation.
    All,
    /// Operations that cannot modify the filesystem.
    Read,
    /// Operations that may modify the filesystem.
    Write,
    /// An explicit list of verbs.
    Kinds(Vec<OperationKind>),
}

impl Scope {
    fn covers(&self, operation: &Operation) -> bool {
        match self {
            Scope::All => true,
            Scope::Read => operation.is_read_only(),
            Scope::Write => !operation.is_read_only(),
            Scope::Kinds(kinds) => kinds.contains(&operation.kind()),
        }
    }
}

/// A rule in a rule set.
#[derive(Clone, Debug)]
struct Rule {
    /// Glob pattern to match paths
    pattern: glob::Pattern,
    /// Operations this rule applies to
    scope: Scope,
    /// Whether this rule allows or denies
    allow: bool,
}

impl Rule {
    fn matches(&self, path: &str, operation: &Operation) -> bool {
        self.pattern.matches(path) && self.scope.covers(operation)
    }
}

/// An ordered list of glob rules.
///
/// Rules are evaluated in order: the first rule whose pattern matches the
/// operation's path and whose scope covers the operation decides. If no rule
/// matches, the default applies (deny unless built with
/// [`RuleSetBuilder::allow_by_default`]).
///
/// Paths are matched in rooted form, so `notes/a.txt` and `/notes/a.txt` are
/// both matched as `/notes/a.txt`. `*` also matches `/`.
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    default_allow: bool,
}

impl RuleSet {
    /// Start building a deny-by-default rule set.
    pub fn builder() -> RuleSetBuilder {
        RuleSetBuilder::new()
    }

    /// Number of compiled rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if the set has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Predicate for RuleSet {
    fn allows(&self, operation: &Operation) -> bool {
        let Ok(key) = path::normalize(operation.path()) else {
            return self.default_allow;
        };
        let rooted = format!("/{}", key);
        self.rules
            .iter()
            .find(|rule| rule.matches(&rooted, operation))
            .map_or(self.default_allow, |rule| rule.allow)
    }
}

/// Builder for [`RuleSet`] with a fluent API.
///
/// # Example
///
/// ```rust
/// use policyfs::policy::{Operation, Predicate, RuleSetBuilder};
///
/// let rules = RuleSetBuilder::new()
///     .allow_read("/agent/**")
///     .allow_write("/agent/scratch/**")
///     .deny_write("/agent/params.json")
///     .build();
///
/// assert!(rules.allows(&Operation::Stat { name: "agent/params.json".into() }));
/// assert!(rules.allows(&Operation::Create { name: "agent/scratch/out.txt".into() }));
/// assert!(!rules.allows(&Operation::Create { name: "agent/notes.txt".into() }));
/// ```
#[derive(Clone, Debug, Default)]
pub struct RuleSetBuilder {
    rules: Vec<Rule>,
    default_allow: bool,
}

impl RuleSetBuilder {
    /// Create a new builder with deny-by-default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new builder with allow-by-default.
    ///
    /// Use this when you only want to specify what to deny.
    pub fn allow_by_default() -> Self {
        Self {
            rules: Vec::new(),
            default_allow: true,
        }
    }

    fn push(&mut self, pattern: &str, scope: Scope, allow: bool) {
        match glob::Pattern::new(pattern) {
            Ok(pattern) => self.rules.push(Rule {
                pattern,
                scope,
                allow,
            }),
            Err(err) => tracing::warn!(pattern, error = %err, "skipping invalid rule pattern"),
        }
    }

    /// Push a rule, plus one for the base path when `pattern` ends in `/**`.
    fn push_with_base(&mut self, pattern: &str, scope: Scope, allow: bool) {
        if let Some(base) = pattern.strip_suffix("/**") {
            self.push(base, scope.clone(), allow);
        }
        self.push(pattern, scope, allow);
    }

    /// Allow read-only operations matching the given glob pattern.
    ///
    /// A pattern ending in `/**` also allows the base path itself
    /// (e.g. `/agent/**` also allows listing `/agent`).
    pub fn allow_read(mut self, pattern: &str) -> Self {
        self.push_with_base(pattern, Scope::Read, true);
        self
    }

    /// Allow mutating operations matching the given glob pattern.
    ///
    /// A pattern ending in `/**` also covers the base path itself.
    pub fn allow_write(mut self, pattern: &str) -> Self {
        self.push_with_base(pattern, Scope::Write, true);
        self
    }

    /// Allow all operations matching the given glob pattern.
    ///
    /// A pattern ending in `/**` also covers the base path itself.
    pub fn allow_all(mut self, pattern: &str) -> Self {
        self.push_with_base(pattern, Scope::All, true);
        self
    }

    /// Allow the listed verbs on paths matching the given glob pattern.
    pub fn allow_kinds(mut self, pattern: &str, kinds: &[OperationKind]) -> Self {
        self.push(pattern, Scope::Kinds(kinds.to_vec()), true);
        self
    }

    /// Deny read-only operations matching the given glob pattern.
    pub fn deny_read(mut self, pattern: &str) -> Self {
        self.push(pattern, Scope::Read, false);
        self
    }

    /// Deny mutating operations matching the given glob pattern.
    pub fn deny_write(mut self, pattern: &str) -> Self {
        self.push(pattern, Scope::Write, false);
        self
    }

    /// Deny all operations matching the given glob pattern.
    pub fn deny_all(mut self, pattern: &str) -> Self {
        self.push(pattern, Scope::All, false);
        self
    }

    /// Deny the listed verbs on paths matching the given glob pattern.
    pub fn deny_kinds(mut self, pattern: &str, kinds: &[OperationKind]) -> Self {
        self.push(pattern, Scope::Kinds(kinds.to_vec()), false);
        self
    }

    /// Build the rule set.
    pub fn build(self) -> RuleSet {
        RuleSet {
            rules: self.rules,
            default_allow: self.default_allow,
        }
    }
}

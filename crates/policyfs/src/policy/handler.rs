//! Filter and predicate traits and the adapters between them.

use super::operation::Operation;
use crate::vfs::{FsError, FsResult};

/// Decides whether an operation may proceed.
///
/// `Ok(())` allows the operation. Any error is handed back to the caller
/// unchanged as the reason access was denied.
///
/// Implementations should be fast, pure and non-blocking: filters run on
/// every filesystem operation, sometimes twice per call.
pub trait Filter: Send + Sync {
    /// Check if an operation is allowed.
    fn check(&self, operation: &Operation) -> FsResult<()>;
}

impl<F> Filter for F
where
    F: Fn(&Operation) -> FsResult<()> + Send + Sync,
{
    fn check(&self, operation: &Operation) -> FsResult<()> {
        self(operation)
    }
}

/// Boolean form of a policy: `true` means allowed.
///
/// Convert to a [`Filter`] with [`PredicateFilter`].
pub trait Predicate: Send + Sync {
    /// Returns true if the operation is allowed.
    fn allows(&self, operation: &Operation) -> bool;
}

impl<F> Predicate for F
where
    F: Fn(&Operation) -> bool + Send + Sync,
{
    fn allows(&self, operation: &Operation) -> bool {
        self(operation)
    }
}

/// A [`Filter`] backed by a [`Predicate`].
///
/// Denied operations fail with the configured error. By default that is
/// [`FsError::NotFound`] for the operation's path, so a denied path is
/// indistinguishable from an absent one.
#[derive(Clone, Debug)]
pub struct PredicateFilter<P> {
    predicate: P,
    on_deny: Option<FsError>,
}

impl<P: Predicate> PredicateFilter<P> {
    /// Deny with a not-found error when the predicate returns false.
    pub fn new(predicate: P) -> Self {
        Self {
            predicate,
            on_deny: None,
        }
    }

    /// Deny with `error` when the predicate returns false.
    pub fn with_error(predicate: P, error: FsError) -> Self {
        Self {
            predicate,
            on_deny: Some(error),
        }
    }

    /// Get a reference to the wrapped predicate.
    pub fn predicate(&self) -> &P {
        &self.predicate
    }
}

impl<P: Predicate> Filter for PredicateFilter<P> {
    fn check(&self, operation: &Operation) -> FsResult<()> {
        if self.predicate.allows(operation) {
            return Ok(());
        }
        Err(match &self.on_deny {
            Some(error) => error.clone(),
            None => FsError::not_found(operation.path()),
        })
    }
}

/// Lifts a path-only filter function into a [`Filter`].
#[derive(Clone, Debug)]
pub struct PathFilter<F>(F);

impl<F> Filter for PathFilter<F>
where
    F: Fn(&str) -> FsResult<()> + Send + Sync,
{
    fn check(&self, operation: &Operation) -> FsResult<()> {
        (self.0)(operation.path())
    }
}

/// Build a [`Filter`] that only looks at [`Operation::path`].
pub fn path_filter<F>(f: F) -> PathFilter<F>
where
    F: Fn(&str) -> FsResult<()> + Send + Sync,
{
    PathFilter(f)
}

/// Lifts a path-only predicate function into a [`Predicate`].
#[derive(Clone, Debug)]
pub struct PathPredicate<F>(F);

impl<F> Predicate for PathPredicate<F>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn allows(&self, operation: &Operation) -> bool {
        (self.0)(operation.path())
    }
}

/// Build a [`Predicate`] that only looks at [`Operation::path`].
pub fn path_predicate<F>(f: F) -> PathPredicate<F>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    PathPredicate(f)
}

/// A predicate that allows all operations.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl Predicate for AllowAll {
    fn allows(&self, _operation: &Operation) -> bool {
        true
    }
}

/// A predicate that denies all operations.
///
/// Directories still bypass it; see [`PolicyFs`](super::PolicyFs).
#[derive(Clone, Copy, Debug, Default)]
pub struct DenyAll;

impl Predicate for DenyAll {
    fn allows(&self, _operation: &Operation) -> bool {
        false
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::vfs::OpenFlags;

    fn sample_ops() -> Vec<Operation> {
        vec![
            Operation::Stat {
                name: "a.txt".into(),
            },
            Operation::Open {
                name: "b.go".into(),
            },
            Operation::OpenFile {
                name: "c.txt".into(),
                flags: OpenFlags::create(),
                perm: 0o644,
            },
            Operation::Rename {
                old_name: "a.txt".into(),
                new_name: "d.go".into(),
            },
            Operation::RemoveAll { path: "dir".into() },
        ]
    }

    #[test]
    fn test_predicate_filter_default_is_not_found() {
        let filter = PredicateFilter::new(DenyAll);
        let err = filter
            .check(&Operation::Stat {
                name: "secret.txt".into(),
            })
            .unwrap_err();
        match err {
            FsError::NotFound(path) => assert_eq!(path, "secret.txt"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_predicate_filter_custom_error() {
        let filter =
            PredicateFilter::with_error(DenyAll, FsError::permission_denied("policy"));
        let err = filter
            .check(&Operation::Create { name: "x".into() })
            .unwrap_err();
        assert!(matches!(err, FsError::PermissionDenied(ref m) if m == "policy"));
    }

    #[test]
    fn test_filter_matches_predicate_for_all_ops() {
        let predicate = |op: &Operation| op.path().ends_with(".txt");
        let filter = PredicateFilter::new(predicate);
        for op in sample_ops() {
            assert_eq!(filter.check(&op).is_ok(), predicate(&op), "{:?}", op);
        }
    }

    #[test]
    fn test_filter_is_idempotent() {
        let filter = PredicateFilter::new(path_predicate(|p: &str| p.starts_with('a')));
        for op in sample_ops() {
            let first = filter.check(&op).is_ok();
            let second = filter.check(&op).is_ok();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_closure_filter() {
        let filter = |op: &Operation| match op {
            Operation::Remove { .. } | Operation::RemoveAll { .. } => {
                Err(FsError::permission_denied(op.path()))
            }
            _ => Ok(()),
        };
        assert!(filter.check(&Operation::Stat { name: "a".into() }).is_ok());
        assert!(filter.check(&Operation::RemoveAll { path: "a".into() }).is_err());
    }

    #[test]
    fn test_path_adapters_ignore_operation_detail() {
        let predicate = path_predicate(|p: &str| p == "a.txt");
        assert!(predicate.allows(&Operation::Stat {
            name: "a.txt".into()
        }));
        assert!(predicate.allows(&Operation::Rename {
            old_name: "a.txt".into(),
            new_name: "elsewhere".into(),
        }));
        assert!(!predicate.allows(&Operation::Create {
            name: "b.txt".into()
        }));

        let filter = path_filter(|p: &str| {
            if p.contains("private") {
                Err(FsError::permission_denied(p))
            } else {
                Ok(())
            }
        });
        assert!(filter.check(&Operation::Open {
            name: "private/key".into()
        })
        .is_err());
        assert!(filter.check(&Operation::Open {
            name: "public/key".into()
        })
        .is_ok());
    }

    #[test]
    fn test_allow_and_deny_all() {
        for op in sample_ops() {
            assert!(AllowAll.allows(&op));
            assert!(!DenyAll.allows(&op));
        }
    }
}

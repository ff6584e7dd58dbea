//! policyfs: policy-filtering virtual filesystem middleware.
//!
//! Wrap any [`Fs`] in a [`PolicyFs`] and every request is described as an
//! [`Operation`] and checked by a caller-supplied [`Filter`] before it is
//! forwarded. Denied paths can be made to look absent, directory structure
//! stays traversable, and listings obtained through wrapped handles are
//! filtered entry by entry.
//!
//! The [`vfs`] module holds the filesystem contract and a few backends
//! ([`MemoryFs`], [`OsFs`], [`ReadOnlyFs`], [`MappedFs`]); the [`policy`] module holds the
//! wrappers and ready-made policies.

pub mod policy;
pub mod vfs;

pub use policy::{
    Filter, IgnorePredicate, Operation, PolicyFile, PolicyFs, Predicate, PredicateFilter,
    RuleSet, RuleSetBuilder,
};
pub use vfs::{
    File, FileInfo, Fs, FsError, FsResult, MappedFs, MemoryFs, OpenFlags, OsFs, ReadOnlyFs, copy,
};

//! Policy enforcement over a virtual filesystem.
//!
//! This module provides a layer that wraps any [`Fs`](crate::vfs::Fs) and
//! checks every operation against a caller-supplied policy before it reaches
//! the backing filesystem.
//!
//! ## Pieces
//!
//! - [`Operation`]: what is being asked for, with exactly one canonical path
//! - [`Filter`] / [`Predicate`]: the decision protocol, with adapters between
//!   the two ([`PredicateFilter`], [`path_filter`], [`path_predicate`])
//! - [`PolicyFs`]: the filesystem wrapper; directories bypass the policy
//! - [`PolicyFile`]: the handle wrapper; directory listings stay filtered
//! - [`IgnorePredicate`] and [`RuleSet`]: ready-made policies
//!
//! A denied operation fails with the filter's error. Predicate-derived
//! filters default to not-found, so hidden paths look absent.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use policyfs::policy::{PolicyFs, RuleSetBuilder};
//! use policyfs::vfs::{Fs, MemoryFs};
//!
//! let base = Arc::new(MemoryFs::new());
//! base.mkdir_all("agent/scratch", 0o755).unwrap();
//! base.write_all("agent/params.json", b"{}").unwrap();
//!
//! let rules = RuleSetBuilder::new()
//!     .allow_read("/agent/**")
//!     .allow_write("/agent/scratch/**")
//!     .build();
//! let fs = PolicyFs::from_predicate(base, rules);
//!
//! assert!(fs.read_to_vec("agent/params.json").is_ok());
//! assert!(fs.write_all("agent/params.json", b"[]").is_err());
//! assert!(fs.write_all("agent/scratch/out.txt", b"ok").is_ok());
//! ```

mod file;
mod fs;
mod gitignore;
mod handler;
mod operation;
mod rules;

pub use file::PolicyFile;
pub use fs::PolicyFs;
pub use gitignore::{DEFAULT_IGNORE_FILE, IgnoreError, IgnoreMatcher, IgnorePredicate};
pub use handler::{
    AllowAll, DenyAll, Filter, PathFilter, PathPredicate, Predicate, PredicateFilter, path_filter,
    path_predicate,
};
pub use operation::{Operation, OperationKind};
pub use rules::{RuleSet, RuleSetBuilder};

//! Atoll - resource selection and reconciliation for EKS fleet operations
//!
//! Atoll decides, for a given fleet operation (create, delete, drain, scale,
//! update), exactly which named sub-resources are in scope. It combines
//! declared intent (explicit names and glob patterns from CLI flags or a
//! config file) with discovered live state (CloudFormation-stack-backed
//! resources already present in the account), and partitions the declared
//! collection into included and excluded sets. Downstream task execution
//! acts only on the included subset, so the correctness of this engine
//! directly gates every destructive operation.
//!
//! # Architecture
//!
//! Selection is a pure, synchronous, single-invocation decision procedure
//! over in-memory name collections. The only network round-trip is the
//! optional [`stack::StackLister`] call during reconciliation, and it is
//! made at most once per filter instance. Plan (dry-run) mode lives
//! entirely outside this crate: selection is always computed eagerly and
//! fully, and the caller decides whether to act on it.
//!
//! # Modules
//!
//! - [`filter`] - The generic name-matching [`Filter`] and its two
//!   production specializations ([`NodeGroupFilter`],
//!   [`IamServiceAccountFilter`])
//! - [`resource`] - The [`Named`] capability trait and concrete resource
//!   types (nodegroups, IAM-bound service accounts)
//! - [`stack`] - The [`StackLister`] boundary for discovering
//!   CloudFormation-stack-backed resources
//! - [`error`] - Error types for the engine

#![deny(missing_docs)]

pub mod error;
pub mod filter;
pub mod resource;
pub mod stack;

pub use error::Error;
pub use filter::{
    Filter, IamServiceAccountFilter, MatchResult, NodeGroupFilter, NodeGroupReconciliation,
    Restriction,
};
pub use resource::{IamServiceAccount, Named, NodeGroup, NodeGroupKind};
pub use stack::{NodeGroupStack, StackLister};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for the selection engine
//!
//! Errors are structured with fields to aid debugging: each variant carries
//! the resource kind, pattern text, or offending name needed to print a
//! one-line diagnostic. Configuration errors abort a command before any
//! mutation is attempted; discrepancies between declared and remote state
//! are never errors and are handled by set adjustment instead.

use thiserror::Error;

/// Main error type for selection and reconciliation operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A glob pattern supplied for an include/exclude rule failed to compile
    #[error("parsing glob filter {pattern:?}: {source}")]
    InvalidGlob {
        /// The pattern text as the user supplied it
        pattern: String,
        /// The underlying glob parse error
        #[source]
        source: globset::Error,
    },

    /// The combined include-glob rule set matched none of the candidate
    /// names, which would silently disable the whole operation
    #[error("no {resource}s match include glob filter specification: {patterns:?}")]
    NoIncludeGlobMatches {
        /// Resource kind the rules are scoped to (e.g. "nodegroup")
        resource: String,
        /// Comma-joined raw include patterns
        patterns: String,
    },

    /// A resource that must be excluded because it already exists remotely
    /// also matches an include rule; this conflict is never silently resolved
    #[error("existing {resource} {name:?} should be excluded, but matches include filter: {include_rules}")]
    ExcludedIncludeConflict {
        /// Resource kind (e.g. "iamserviceaccount")
        resource: String,
        /// The conflicting resource name
        name: String,
        /// Description of the include rules the name matched
        include_rules: String,
    },

    /// An IAM service account stack name was not of the form `namespace/name`
    #[error("unexpected serviceaccount name format {name:?}, expected namespace/name")]
    MalformedServiceAccountName {
        /// The malformed name string
        name: String,
    },

    /// Listing CloudFormation stacks failed; produced by [`crate::stack::StackLister`]
    /// implementations and propagated unchanged through reconciliation
    #[error("listing {resource} stacks: {message}")]
    StackList {
        /// Resource kind whose stacks were being listed
        resource: String,
        /// Description of what failed
        message: String,
    },
}

impl Error {
    /// Create a stack-listing error with the given resource kind and message
    pub fn stack_list(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StackList {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_include_glob_matches_names_all_patterns() {
        let err = Error::NoIncludeGlobMatches {
            resource: "nodegroup".to_string(),
            patterns: "t?xyz?,ab*z123?".to_string(),
        };
        assert_eq!(
            err.to_string(),
            r#"no nodegroups match include glob filter specification: "t?xyz?,ab*z123?""#
        );
    }

    #[test]
    fn excluded_include_conflict_names_the_resource_and_rules() {
        let err = Error::ExcludedIncludeConflict {
            resource: "iamserviceaccount".to_string(),
            name: "kube-system/aws-node".to_string(),
            include_rules: "kube-system/*".to_string(),
        };
        assert!(err.to_string().contains("kube-system/aws-node"));
        assert!(err.to_string().contains("matches include filter"));
    }

    #[test]
    fn invalid_glob_carries_the_offending_pattern() {
        let source = globset::Glob::new("a[").expect_err("pattern should be invalid");
        let err = Error::InvalidGlob {
            pattern: "a[".to_string(),
            source,
        };
        assert!(err.to_string().starts_with(r#"parsing glob filter "a[""#));
    }
}

//! Generic name-matching filter and its production specializations
//!
//! A [`Filter`] combines explicit name lists and shell-style glob patterns
//! (`?`, `*`) for inclusion and exclusion, with one override rule - when a
//! name matches both an include rule and an exclude rule, inclusion wins -
//! and an "exclude everything" kill switch that outranks everything else.
//!
//! Rules only accumulate: no operation removes a previously added rule, so
//! a filter constructed for a command invocation can be queried any number
//! of times without its semantics shifting underneath the caller.

mod iam_service_account;
mod nodegroup;

pub use iam_service_account::IamServiceAccountFilter;
pub use nodegroup::{NodeGroupFilter, NodeGroupReconciliation, Restriction};

use std::collections::BTreeSet;

use globset::{Glob, GlobMatcher};
use tracing::info;

use crate::{Error, Result};

/// Partition of an input name collection into disjoint included and
/// excluded sets.
///
/// The union of the two sets always equals the deduplicated input;
/// duplicate names collapse under set semantics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchResult {
    /// Names the filter selected for the operation
    pub included: BTreeSet<String>,
    /// Names the filter ruled out
    pub excluded: BTreeSet<String>,
}

/// Set-membership decision function over resource names.
///
/// Holds exact-name rules and compiled glob rules for both inclusion and
/// exclusion. The decision algorithm lives in [`Filter::matches`].
#[derive(Debug, Default)]
pub struct Filter {
    exclude_all: bool,

    // include rules take precedence over exclude rules on overlap
    include_names: BTreeSet<String>,
    include_globs: Vec<GlobMatcher>,
    raw_include_globs: Vec<String>,

    exclude_names: BTreeSet<String>,
    exclude_globs: Vec<GlobMatcher>,
    raw_exclude_globs: Vec<String>,
}

impl Filter {
    /// Create an empty filter that includes everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the kill switch: when true, nothing matches regardless of any
    /// other configured rule
    pub fn set_exclude_all(&mut self, exclude_all: bool) {
        self.exclude_all = exclude_all;
    }

    /// Whether the kill switch is set
    pub fn exclude_all(&self) -> bool {
        self.exclude_all
    }

    /// Append explicit names to the include rules; idempotent
    pub fn append_include_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_names.extend(names.into_iter().map(Into::into));
    }

    /// Append explicit names to the exclude rules; idempotent
    pub fn append_exclude_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_names.extend(names.into_iter().map(Into::into));
    }

    /// Compile and append glob patterns to the include rules.
    ///
    /// Fails fast on the first invalid pattern. After compilation, verifies
    /// that the cumulative include-glob rule set matches at least one name
    /// in `candidates`: an include rule that selects nothing would silently
    /// disable the whole operation, so it is rejected with an error naming
    /// all the raw patterns.
    pub fn append_include_globs(
        &mut self,
        candidates: &[String],
        resource: &str,
        patterns: &[String],
    ) -> Result<()> {
        for pattern in patterns {
            self.include_globs.push(compile_glob(pattern)?);
            self.raw_include_globs.push(pattern.clone());
        }
        self.ensure_include_globs_match_any(candidates, resource)
    }

    /// Compile and append glob patterns to the exclude rules.
    ///
    /// Unlike include globs, an exclude rule is allowed to match nothing.
    pub fn append_exclude_globs(&mut self, patterns: &[String]) -> Result<()> {
        for pattern in patterns {
            self.exclude_globs.push(compile_glob(pattern)?);
            self.raw_exclude_globs.push(pattern.clone());
        }
        Ok(())
    }

    fn ensure_include_globs_match_any(&self, candidates: &[String], resource: &str) -> Result<()> {
        if self.include_globs.is_empty() {
            return Ok(());
        }
        if candidates
            .iter()
            .any(|name| match_globs(name, &self.include_globs))
        {
            return Ok(());
        }
        Err(Error::NoIncludeGlobMatches {
            resource: resource.to_string(),
            patterns: self.raw_include_globs.join(","),
        })
    }

    fn has_include_rules(&self) -> bool {
        !self.include_names.is_empty() || !self.include_globs.is_empty()
    }

    fn has_exclude_rules(&self) -> bool {
        !self.exclude_names.is_empty() || !self.exclude_globs.is_empty()
    }

    /// Decide whether the given name is included by this filter.
    ///
    /// With no rules configured at all, every name is included. With only
    /// include rules, nothing outside them is ever selected. With exclude
    /// rules, a name is ruled out unless an include rule overrides it.
    pub fn matches(&self, name: &str) -> bool {
        if self.exclude_all {
            return false; // force exclude
        }

        let has_include_rules = self.has_include_rules();
        let has_exclude_rules = self.has_exclude_rules();

        if !has_include_rules && !has_exclude_rules {
            return true; // empty rules - include
        }

        // the override when include and exclude rules overlap
        let must_include =
            self.include_names.contains(name) || match_globs(name, &self.include_globs);

        if has_include_rules && !has_exclude_rules {
            // explicit inclusion mode: nothing outside the include rules
            return must_include;
        }

        if has_exclude_rules {
            let excluded =
                self.exclude_names.contains(name) || match_globs(name, &self.exclude_globs);
            if excluded && !must_include {
                return false;
            }
        }

        true // biased to include
    }

    /// Match every name against the filter and partition the collection.
    pub fn match_all<I>(&self, names: I) -> MatchResult
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut result = MatchResult::default();
        for name in names {
            let name = name.into();
            if self.matches(&name) {
                result.included.insert(name);
            } else {
                result.excluded.insert(name);
            }
        }
        result
    }

    /// Bulk-exclude names of resources that already exist remotely, so a
    /// create-class operation does not attempt to create them again.
    ///
    /// If any such name also matches an include rule, that is a hard error
    /// naming the conflicting resource and the include rules: unlike the
    /// general override in [`Filter::matches`], this specific conflict is
    /// never silently resolved.
    pub fn set_exclude_existing(&mut self, existing: &[String], resource: &str) -> Result<()> {
        let unique: BTreeSet<String> = existing.iter().cloned().collect();
        self.exclude_names.extend(unique.iter().cloned());
        for name in &unique {
            let is_also_included =
                self.include_names.contains(name) || match_globs(name, &self.include_globs);
            if is_also_included {
                return Err(Error::ExcludedIncludeConflict {
                    resource: resource.to_string(),
                    name: name.clone(),
                    include_rules: self.describe_include_rules(),
                });
            }
        }
        if !unique.is_empty() {
            info!(
                count = unique.len(),
                resource,
                names = %join_names(&unique),
                "existing resources will be excluded"
            );
        }
        Ok(())
    }

    /// Comma-joined description of the include rules: explicit names first,
    /// then raw glob patterns in the order they were appended
    pub fn describe_include_rules(&self) -> String {
        let mut rules: Vec<String> = self.include_names.iter().cloned().collect();
        rules.extend(self.raw_include_globs.iter().cloned());
        rules.join(",")
    }

    /// Comma-joined description of the exclude rules, symmetric to
    /// [`Filter::describe_include_rules`]
    pub fn describe_exclude_rules(&self) -> String {
        let mut rules: Vec<String> = self.exclude_names.iter().cloned().collect();
        rules.extend(self.raw_exclude_globs.iter().cloned());
        rules.join(",")
    }

    /// Log a user-friendly summary of how the filter partitioned a
    /// collection: the combined rules, the counts and names of included and
    /// excluded items, and a notice when a populated rule set explained
    /// nothing. Presentation only; carries no decision logic.
    pub fn log_info(&self, resource: &str, result: &MatchResult) {
        if self.has_include_rules() {
            info!(rules = %self.describe_include_rules(), "combined include rules");
            if result.included.is_empty() {
                info!("no {resource}s present in the current set were included by the filter");
            }
        }
        if !result.included.is_empty() {
            info!(
                count = result.included.len(),
                names = %join_names(&result.included),
                "{resource}(s) included (based on the include/exclude rules)"
            );
        }
        if self.has_exclude_rules() {
            info!(rules = %self.describe_exclude_rules(), "combined exclude rules");
            if result.excluded.is_empty() {
                info!("no {resource}s present in the current set were excluded by the filter");
            }
        }
        if !result.excluded.is_empty() {
            info!(
                count = result.excluded.len(),
                names = %join_names(&result.excluded),
                "{resource}(s) excluded (based on the include/exclude rules)"
            );
        }
    }
}

fn compile_glob(pattern: &str) -> Result<GlobMatcher> {
    let glob = Glob::new(pattern).map_err(|source| Error::InvalidGlob {
        pattern: pattern.to_string(),
        source,
    })?;
    Ok(glob.compile_matcher())
}

fn match_globs(name: &str, globs: &[GlobMatcher]) -> bool {
    globs.iter().any(|glob| glob.is_match(name))
}

fn join_names(names: &BTreeSet<String>) -> String {
    names.iter().cloned().collect::<Vec<_>>().join(", ")
}

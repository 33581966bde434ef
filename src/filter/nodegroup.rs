//! Nodegroup selection with declared-vs-remote reconciliation
//!
//! On top of the generic rule matching, nodegroup commands need to know how
//! the declared set relates to the stacks already in the account: `create
//! nodegroup` must act only on nodegroups that do not exist yet, while
//! delete-class commands scoped to `--only-missing` must act only on
//! nodegroups the config no longer declares. [`NodeGroupFilter`] captures
//! that relationship once per command invocation and applies it as a
//! restriction gate in front of the base [`Filter`].

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::filter::{Filter, MatchResult};
use crate::resource::{Named, NodeGroup};
use crate::stack::StackLister;
use crate::Result;

const RESOURCE: &str = "nodegroup";

/// Restriction mode applied on top of the include/exclude rules.
///
/// At most one restriction is active per command invocation; reconciliation
/// sets it exactly once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Restriction {
    /// No restriction; candidates are gated by the rules alone
    #[default]
    Unrestricted,
    /// Only nodegroups declared in the config but absent from the cluster
    OnlyLocal,
    /// Only nodegroups present in the cluster but absent from the config
    OnlyRemote,
}

/// Outcome of reconciling declared nodegroups against remote stacks.
///
/// Placeholders for remote-only nodegroups are returned here rather than
/// appended into the caller's collection; the caller decides whether and
/// how to merge them into its own config state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeGroupReconciliation {
    /// Declared in the config but with no backing stack in the cluster
    pub only_local: BTreeSet<String>,
    /// Present in the cluster but missing from the config, as placeholder
    /// entries bearing only the discovered name and kind
    pub only_remote: Vec<NodeGroup>,
    /// Declared in the config and present in the cluster
    pub both: BTreeSet<String>,
}

/// Selects nodegroups for a fleet operation.
///
/// Composes a [`Filter`] and delegates all inclusion/exclusion decisions to
/// it; the wrapper only contributes the [`Restriction`] gate derived from
/// reconciliation.
#[derive(Debug, Default)]
pub struct NodeGroupFilter {
    filter: Filter,
    restriction: Restriction,
    local_nodegroups: BTreeSet<String>,
    remote_nodegroups: BTreeSet<String>,
}

impl NodeGroupFilter {
    /// Create an unrestricted filter that includes every nodegroup
    pub fn new() -> Self {
        Self::default()
    }

    /// Append include and exclude glob patterns in one call
    pub fn append_globs(
        &mut self,
        include_patterns: &[String],
        exclude_patterns: &[String],
        candidates: &[String],
    ) -> Result<()> {
        self.append_include_globs(candidates, include_patterns)?;
        self.append_exclude_globs(exclude_patterns)
    }

    /// Compile and append include glob patterns, verifying they match at
    /// least one candidate nodegroup name
    pub fn append_include_globs(&mut self, candidates: &[String], patterns: &[String]) -> Result<()> {
        self.filter.append_include_globs(candidates, RESOURCE, patterns)
    }

    /// Compile and append exclude glob patterns
    pub fn append_exclude_globs(&mut self, patterns: &[String]) -> Result<()> {
        self.filter.append_exclude_globs(patterns)
    }

    /// Append explicit nodegroup names to the include rules
    pub fn append_include_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter.append_include_names(names);
    }

    /// Append explicit nodegroup names to the exclude rules
    pub fn append_exclude_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter.append_exclude_names(names);
    }

    /// Set the kill switch so that no nodegroups are matched
    pub fn set_exclude_all(&mut self, exclude_all: bool) {
        self.filter.set_exclude_all(exclude_all);
    }

    /// Whether all nodegroups will be excluded
    pub fn exclude_all(&self) -> bool {
        self.filter.exclude_all()
    }

    /// Restrict the filter to nodegroups that are declared in the config
    /// but do not exist in the cluster yet. Used by create-class commands
    /// so that nodegroups with existing stacks are not created again.
    ///
    /// Returns the full three-way reconciliation so the caller can merge
    /// remote-only placeholders into its config if it wants to.
    pub async fn set_only_local<N: Named>(
        &mut self,
        lister: &dyn StackLister,
        declared: &[N],
    ) -> Result<NodeGroupReconciliation> {
        let reconciliation = self.load_local_and_remote(lister, declared).await?;
        self.restriction = Restriction::OnlyLocal;

        if !self.remote_nodegroups.is_empty() {
            info!(
                count = self.remote_nodegroups.len(),
                names = %join(&self.remote_nodegroups),
                "existing nodegroup(s) will be excluded"
            );
        }
        Ok(reconciliation)
    }

    /// Restrict the filter to nodegroups that exist in the cluster but are
    /// no longer declared in the config. Used by delete-class commands with
    /// `--only-missing`.
    pub async fn set_only_remote<N: Named>(
        &mut self,
        lister: &dyn StackLister,
        declared: &[N],
    ) -> Result<NodeGroupReconciliation> {
        let reconciliation = self.load_local_and_remote(lister, declared).await?;
        self.restriction = Restriction::OnlyRemote;

        if !self.local_nodegroups.is_empty() {
            info!(
                count = self.local_nodegroups.len(),
                names = %join(&self.local_nodegroups),
                "nodegroup(s) present in the config file will be excluded"
            );
        }
        Ok(reconciliation)
    }

    /// The restriction currently in effect
    pub fn restriction(&self) -> Restriction {
        self.restriction
    }

    async fn load_local_and_remote<N: Named>(
        &mut self,
        lister: &dyn StackLister,
        declared: &[N],
    ) -> Result<NodeGroupReconciliation> {
        let stacks = lister.list_nodegroup_stacks().await?;

        self.remote_nodegroups = stacks
            .iter()
            .map(|stack| stack.nodegroup_name.clone())
            .collect();
        self.local_nodegroups = declared.iter().map(Named::name_string).collect();

        // not an error: the nodegroup may simply be pending creation
        for name in self.local_nodegroups.difference(&self.remote_nodegroups) {
            debug!(
                nodegroup = %name,
                "nodegroup present in the given config, but missing in the cluster"
            );
        }

        let mut only_remote = Vec::new();
        for stack in &stacks {
            if !self.local_nodegroups.contains(&stack.nodegroup_name) {
                debug!(
                    nodegroup = %stack.nodegroup_name,
                    "nodegroup present in the cluster, but missing from the given config"
                );
                only_remote.push(NodeGroup::new(stack.nodegroup_name.clone(), stack.kind));
            }
        }

        Ok(NodeGroupReconciliation {
            only_local: self
                .local_nodegroups
                .difference(&self.remote_nodegroups)
                .cloned()
                .collect(),
            only_remote,
            both: self
                .local_nodegroups
                .intersection(&self.remote_nodegroups)
                .cloned()
                .collect(),
        })
    }

    fn passes_restriction(&self, name: &str) -> bool {
        match self.restriction {
            Restriction::Unrestricted => true,
            Restriction::OnlyLocal => {
                self.local_nodegroups.contains(name) && !self.remote_nodegroups.contains(name)
            }
            Restriction::OnlyRemote => {
                self.remote_nodegroups.contains(name) && !self.local_nodegroups.contains(name)
            }
        }
    }

    /// Decide whether the given nodegroup name is included, applying the
    /// restriction gate and then delegating to the base filter's name match.
    pub fn matches(&self, name: &str) -> bool {
        self.passes_restriction(name) && self.filter.matches(name)
    }

    /// Match every nodegroup against the filter and partition the
    /// collection. Names that fail the restriction gate land in `excluded`,
    /// so the union of the partition still equals the deduplicated input.
    pub fn match_all<N: Named>(&self, nodegroups: &[N]) -> MatchResult {
        let mut result = MatchResult::default();
        for name in nodegroups.iter().map(Named::name_string) {
            if self.matches(&name) {
                result.included.insert(name);
            } else {
                result.excluded.insert(name);
            }
        }
        result
    }

    /// Iterate over the collection in its original order, invoking `apply`
    /// only for included nodegroups; stops at the first error
    pub fn for_each<N, F>(&self, nodegroups: &[N], mut apply: F) -> Result<()>
    where
        N: Named,
        F: FnMut(usize, &N) -> Result<()>,
    {
        for (index, nodegroup) in nodegroups.iter().enumerate() {
            if self.matches(&nodegroup.name_string()) {
                apply(index, nodegroup)?;
            }
        }
        Ok(())
    }

    /// Return references to the included nodegroups, in declaration order
    pub fn filter_matching<'a, N: Named>(&self, nodegroups: &'a [N]) -> Vec<&'a N> {
        nodegroups
            .iter()
            .filter(|nodegroup| self.matches(&nodegroup.name_string()))
            .collect()
    }

    /// Log a user-friendly summary of how the filter was applied
    pub fn log_info<N: Named>(&self, nodegroups: &[N]) {
        let result = self.match_all(nodegroups);
        self.filter.log_info(RESOURCE, &result);
    }
}

fn join(names: &BTreeSet<String>) -> String {
    names.iter().cloned().collect::<Vec<_>>().join(",")
}

//! IAM service account selection with missing-state reconciliation
//!
//! Service account stacks are keyed by `namespace/name` strings. Unlike
//! nodegroups there is no restriction mode: reconciliation adjusts the
//! base [`Filter`]'s name rules directly, excluding accounts that cannot or
//! must not be acted on and returning placeholders for remote-only accounts
//! so the caller can merge them into its declared set.

use std::collections::BTreeSet;

use tracing::info;

use crate::filter::{Filter, MatchResult};
use crate::resource::{IamServiceAccount, Named};
use crate::stack::StackLister;
use crate::Result;

const RESOURCE: &str = "iamserviceaccount";

/// Selects IAM-bound service accounts for a fleet operation.
///
/// Composes a [`Filter`] with explicit delegation, the same strategy as
/// [`crate::filter::NodeGroupFilter`].
#[derive(Debug, Default)]
pub struct IamServiceAccountFilter {
    filter: Filter,
}

impl IamServiceAccountFilter {
    /// Create a filter that includes every service account
    pub fn new() -> Self {
        Self::default()
    }

    /// Append include and exclude glob patterns in one call
    pub fn append_globs(
        &mut self,
        include_patterns: &[String],
        exclude_patterns: &[String],
        declared: &[IamServiceAccount],
    ) -> Result<()> {
        self.append_include_globs(declared, include_patterns)?;
        self.filter.append_exclude_globs(exclude_patterns)
    }

    /// Compile and append include glob patterns, verifying they match at
    /// least one declared service account name
    pub fn append_include_globs(
        &mut self,
        declared: &[IamServiceAccount],
        patterns: &[String],
    ) -> Result<()> {
        let candidates: Vec<String> = declared.iter().map(Named::name_string).collect();
        self.filter
            .append_include_globs(&candidates, RESOURCE, patterns)
    }

    /// Compile and append exclude glob patterns
    pub fn append_exclude_globs(&mut self, patterns: &[String]) -> Result<()> {
        self.filter.append_exclude_globs(patterns)
    }

    /// Append explicit `namespace/name` strings to the include rules
    pub fn append_include_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter.append_include_names(names);
    }

    /// Append explicit `namespace/name` strings to the exclude rules
    pub fn append_exclude_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter.append_exclude_names(names);
    }

    /// Set the kill switch so that no service accounts are matched
    pub fn set_exclude_all(&mut self, exclude_all: bool) {
        self.filter.set_exclude_all(exclude_all);
    }

    /// Whether all service accounts will be excluded
    pub fn exclude_all(&self) -> bool {
        self.filter.exclude_all()
    }

    /// Exclude the service accounts whose stacks already exist remotely, so
    /// a create-class operation does not attempt to create them again.
    ///
    /// No-op when the kill switch is set (nothing will be created anyway).
    /// Errors if an existing account is also explicitly included.
    pub async fn set_exclude_existing_filter(&mut self, lister: &dyn StackLister) -> Result<()> {
        if self.filter.exclude_all() {
            return Ok(());
        }
        let existing = lister.list_iam_service_account_stacks().await?;
        self.filter.set_exclude_existing(&existing, RESOURCE)
    }

    /// Reconcile the declared service accounts against the remote stacks
    /// for a delete-class operation.
    ///
    /// Declared accounts absent remotely are excluded unconditionally
    /// (there is nothing to delete). When `include_only_missing` is set,
    /// declared accounts present remotely are excluded as well - they are
    /// not "missing" - and each remote account absent from the declared set
    /// is returned as a placeholder for the caller to merge; if such an
    /// account already passes the current rules it is recorded as an
    /// explicit include, which is what lets `--only-missing` compose with a
    /// simultaneous `--exclude`.
    pub async fn set_include_or_exclude_missing_filter(
        &mut self,
        lister: &dyn StackLister,
        include_only_missing: bool,
        declared: &[IamServiceAccount],
    ) -> Result<Vec<IamServiceAccount>> {
        let remote: BTreeSet<String> = lister
            .list_iam_service_account_stacks()
            .await?
            .into_iter()
            .collect();
        let local: BTreeSet<String> = declared.iter().map(Named::name_string).collect();

        for name in &local {
            if !remote.contains(name) {
                info!(
                    serviceaccount = %name,
                    "iamserviceaccount present in the given config, but missing in the cluster"
                );
                self.filter.append_exclude_names([name.clone()]);
            } else if include_only_missing {
                info!(
                    serviceaccount = %name,
                    "iamserviceaccount present in the given config and the cluster"
                );
                self.filter.append_exclude_names([name.clone()]);
            }
        }

        let mut placeholders = Vec::new();
        let mut explicit_includes = Vec::new();
        for name in remote.difference(&local) {
            info!(
                serviceaccount = %name,
                "iamserviceaccount present in the cluster, but missing from the given config"
            );
            if include_only_missing {
                placeholders.push(IamServiceAccount::from_name_string(name)?);
                // evaluated against the rules as they stand, before the
                // explicit includes below are appended
                if self.filter.matches(name) {
                    explicit_includes.push(name.clone());
                }
            }
        }
        self.filter.append_include_names(explicit_includes);

        Ok(placeholders)
    }

    /// Decide whether the given `namespace/name` string is included
    pub fn matches(&self, name: &str) -> bool {
        self.filter.matches(name)
    }

    /// Match every service account against the filter and partition the
    /// collection
    pub fn match_all(&self, service_accounts: &[IamServiceAccount]) -> MatchResult {
        self.filter
            .match_all(service_accounts.iter().map(Named::name_string))
    }

    /// Iterate over the collection in its original order, invoking `apply`
    /// only for included service accounts; stops at the first error
    pub fn for_each<F>(&self, service_accounts: &[IamServiceAccount], mut apply: F) -> Result<()>
    where
        F: FnMut(usize, &IamServiceAccount) -> Result<()>,
    {
        for (index, service_account) in service_accounts.iter().enumerate() {
            if self.matches(&service_account.name_string()) {
                apply(index, service_account)?;
            }
        }
        Ok(())
    }

    /// Return references to the included service accounts, in declaration
    /// order
    pub fn filter_matching<'a>(
        &self,
        service_accounts: &'a [IamServiceAccount],
    ) -> Vec<&'a IamServiceAccount> {
        service_accounts
            .iter()
            .filter(|service_account| self.matches(&service_account.name_string()))
            .collect()
    }

    /// Log a user-friendly summary of how the filter was applied
    pub fn log_info(&self, service_accounts: &[IamServiceAccount]) {
        let result = self.match_all(service_accounts);
        self.filter.log_info(RESOURCE, &result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::NodeGroupStack;
    use crate::Error;

    struct FakeLister {
        service_accounts: Vec<String>,
    }

    impl FakeLister {
        fn new(names: &[&str]) -> Self {
            Self {
                service_accounts: names.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    #[async_trait::async_trait]
    impl StackLister for FakeLister {
        async fn list_nodegroup_stacks(&self) -> Result<Vec<NodeGroupStack>> {
            Ok(Vec::new())
        }

        async fn list_iam_service_account_stacks(&self) -> Result<Vec<String>> {
            Ok(self.service_accounts.clone())
        }
    }

    struct FailingLister;

    #[async_trait::async_trait]
    impl StackLister for FailingLister {
        async fn list_nodegroup_stacks(&self) -> Result<Vec<NodeGroupStack>> {
            Err(Error::stack_list("nodegroup", "rate exceeded"))
        }

        async fn list_iam_service_account_stacks(&self) -> Result<Vec<String>> {
            Err(Error::stack_list("iamserviceaccount", "rate exceeded"))
        }
    }

    fn declared_accounts() -> Vec<IamServiceAccount> {
        vec![
            IamServiceAccount::new("default", "s3-reader"),
            IamServiceAccount::new("default", "sqs-writer"),
            IamServiceAccount::new("monitoring", "cloudwatch-agent"),
        ]
    }

    #[tokio::test]
    async fn exclude_existing_is_a_noop_under_exclude_all() {
        let mut filter = IamServiceAccountFilter::new();
        filter.set_exclude_all(true);

        // the failing lister proves the remote call is skipped
        filter
            .set_exclude_existing_filter(&FailingLister)
            .await
            .expect("kill switch short-circuits before the lister");
    }

    #[tokio::test]
    async fn exclude_existing_excludes_remote_stacks() {
        let mut filter = IamServiceAccountFilter::new();
        let lister = FakeLister::new(&["default/s3-reader"]);

        filter
            .set_exclude_existing_filter(&lister)
            .await
            .expect("no include rules, no conflict");

        assert!(!filter.matches("default/s3-reader"));
        assert!(filter.matches("default/sqs-writer"));
    }

    #[tokio::test]
    async fn exclude_existing_conflicting_with_include_rules_is_an_error() {
        let declared = declared_accounts();
        let mut filter = IamServiceAccountFilter::new();
        filter
            .append_include_globs(&declared, &["default/*".to_string()])
            .expect("glob should compile and match");

        let lister = FakeLister::new(&["default/s3-reader"]);
        let err = filter
            .set_exclude_existing_filter(&lister)
            .await
            .expect_err("existing account matching an include rule is a conflict");
        assert!(matches!(
            err,
            Error::ExcludedIncludeConflict { ref name, .. } if name == "default/s3-reader"
        ));
    }

    #[tokio::test]
    async fn delete_excludes_accounts_missing_remotely() {
        let declared = declared_accounts();
        let mut filter = IamServiceAccountFilter::new();

        // only s3-reader has a stack; the other two were never created
        let lister = FakeLister::new(&["default/s3-reader"]);
        let placeholders = filter
            .set_include_or_exclude_missing_filter(&lister, false, &declared)
            .await
            .expect("reconciliation should succeed");

        assert!(placeholders.is_empty());
        let result = filter.match_all(&declared);
        assert_eq!(
            result.included.iter().collect::<Vec<_>>(),
            ["default/s3-reader"]
        );
        assert_eq!(
            result.excluded.iter().collect::<Vec<_>>(),
            ["default/sqs-writer", "monitoring/cloudwatch-agent"]
        );
    }

    #[tokio::test]
    async fn only_missing_returns_placeholders_and_skips_declared() {
        let declared = declared_accounts();
        let mut filter = IamServiceAccountFilter::new();

        let lister = FakeLister::new(&[
            "default/s3-reader",
            "legacy/old-reader",
            "legacy/old-writer",
        ]);
        let placeholders = filter
            .set_include_or_exclude_missing_filter(&lister, true, &declared)
            .await
            .expect("reconciliation should succeed");

        assert_eq!(
            placeholders,
            vec![
                IamServiceAccount::new("legacy", "old-reader"),
                IamServiceAccount::new("legacy", "old-writer"),
            ]
        );

        let mut merged = declared.clone();
        merged.extend(placeholders);

        let result = filter.match_all(&merged);
        assert_eq!(
            result.included.iter().collect::<Vec<_>>(),
            ["legacy/old-reader", "legacy/old-writer"]
        );
        assert_eq!(result.excluded.len(), 3);
    }

    #[tokio::test]
    async fn only_missing_composes_with_an_exclude_glob() {
        let declared = declared_accounts();
        let mut filter = IamServiceAccountFilter::new();
        filter
            .append_exclude_globs(&["legacy/old-w*".to_string()])
            .expect("exclude glob should compile");

        let lister = FakeLister::new(&[
            "default/s3-reader",
            "legacy/old-reader",
            "legacy/old-writer",
        ]);
        let placeholders = filter
            .set_include_or_exclude_missing_filter(&lister, true, &declared)
            .await
            .expect("reconciliation should succeed");
        assert_eq!(placeholders.len(), 2);

        let mut merged = declared.clone();
        merged.extend(placeholders);

        // old-writer hits the exclude glob, so only old-reader is selected
        let result = filter.match_all(&merged);
        assert_eq!(
            result.included.iter().collect::<Vec<_>>(),
            ["legacy/old-reader"]
        );
        assert!(result.excluded.contains("legacy/old-writer"));
    }

    #[tokio::test]
    async fn malformed_remote_stack_name_is_an_error() {
        let mut filter = IamServiceAccountFilter::new();
        let lister = FakeLister::new(&["not-a-namespaced-name"]);

        let err = filter
            .set_include_or_exclude_missing_filter(&lister, true, &[])
            .await
            .expect_err("placeholder synthesis needs namespace/name");
        assert!(matches!(err, Error::MalformedServiceAccountName { .. }));
    }

    #[tokio::test]
    async fn lister_failure_aborts_reconciliation() {
        let mut filter = IamServiceAccountFilter::new();
        let err = filter
            .set_include_or_exclude_missing_filter(&FailingLister, true, &[])
            .await
            .expect_err("lister error should propagate");
        assert!(matches!(err, Error::StackList { .. }));
    }

    #[test]
    fn for_each_applies_only_to_included_accounts() {
        let declared = declared_accounts();
        let mut filter = IamServiceAccountFilter::new();
        filter.append_exclude_names(["default/sqs-writer"]);

        let mut seen = Vec::new();
        filter
            .for_each(&declared, |index, account| {
                assert_eq!(account, &declared[index]);
                seen.push(account.name_string());
                Ok(())
            })
            .expect("callbacks should succeed");
        assert_eq!(seen, ["default/s3-reader", "monitoring/cloudwatch-agent"]);
    }

    #[test]
    fn filter_matching_returns_declaration_order() {
        let declared = declared_accounts();
        let mut filter = IamServiceAccountFilter::new();
        filter.append_include_names(["monitoring/cloudwatch-agent", "default/s3-reader"]);

        let matching: Vec<String> = filter
            .filter_matching(&declared)
            .into_iter()
            .map(Named::name_string)
            .collect();
        assert_eq!(matching, ["default/s3-reader", "monitoring/cloudwatch-agent"]);
    }
}

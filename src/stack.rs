//! Discovery boundary for CloudFormation-stack-backed resources
//!
//! Reconciliation needs to know which nodegroups and IAM service accounts
//! already exist remotely. That discovery is a single synchronous network
//! round-trip owned by a [`StackLister`] implementation (in production, the
//! CloudFormation stack manager); the engine itself carries no AWS client,
//! no retries, and no deadline - those belong to the implementation.

use async_trait::async_trait;

use crate::resource::NodeGroupKind;
use crate::Result;

/// Summary of a nodegroup CloudFormation stack discovered in the account
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeGroupStack {
    /// Name of the nodegroup the stack backs
    pub nodegroup_name: String,
    /// Whether the stack backs an EKS-managed or self-managed nodegroup
    pub kind: NodeGroupKind,
}

impl NodeGroupStack {
    /// Create a stack summary for the given nodegroup name and kind
    pub fn new(nodegroup_name: impl Into<String>, kind: NodeGroupKind) -> Self {
        Self {
            nodegroup_name: nodegroup_name.into(),
            kind,
        }
    }
}

/// Lists CloudFormation-stack-backed resources present in the account.
///
/// Errors propagate unchanged through reconciliation and abort the command
/// before any mutation is attempted. Implementations are called at most
/// once per filter instance per command invocation.
#[async_trait]
pub trait StackLister: Send + Sync {
    /// List the nodegroup stacks backing the cluster's nodegroups
    async fn list_nodegroup_stacks(&self) -> Result<Vec<NodeGroupStack>>;

    /// List the stacks backing IAM service accounts, as `namespace/name` strings
    async fn list_iam_service_account_stacks(&self) -> Result<Vec<String>>;
}

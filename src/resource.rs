//! Resource types consumed by the selection engine
//!
//! The engine only ever needs a stable name from a resource, captured by the
//! [`Named`] capability trait. The concrete types here model the two
//! resource kinds the fleet commands select over: nodegroups and IAM-bound
//! service accounts (IRSA). Both derive serde so callers can load them
//! straight from a cluster config file.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Namespace of the implicit `aws-node` service account
pub const AWS_NODE_NAMESPACE: &str = "kube-system";

/// Name of the implicit `aws-node` service account that EKS itself manages
pub const AWS_NODE_NAME: &str = "aws-node";

/// Capability trait for resources addressable by a stable name.
///
/// All filter rules are evaluated against this name, so it must be stable
/// across calls for a given resource.
pub trait Named {
    /// The name the include/exclude rules are evaluated against
    fn name_string(&self) -> String;
}

impl Named for String {
    fn name_string(&self) -> String {
        self.clone()
    }
}

impl Named for &str {
    fn name_string(&self) -> String {
        (*self).to_string()
    }
}

/// Whether a nodegroup is EKS-managed or self-managed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeGroupKind {
    /// An EKS-managed nodegroup
    #[default]
    Managed,
    /// A self-managed (unmanaged) nodegroup
    Unmanaged,
}

/// A named group of worker nodes attached to an EKS cluster.
///
/// The engine consults only the name and kind; everything else about a
/// nodegroup (instance types, scaling config, IAM policies) belongs to the
/// callers that declare and mutate them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroup {
    /// Nodegroup name, unique within a cluster
    pub name: String,
    /// EKS-managed or self-managed
    #[serde(default)]
    pub kind: NodeGroupKind,
}

impl NodeGroup {
    /// Create a nodegroup with the given name and kind
    pub fn new(name: impl Into<String>, kind: NodeGroupKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create an EKS-managed nodegroup
    pub fn managed(name: impl Into<String>) -> Self {
        Self::new(name, NodeGroupKind::Managed)
    }

    /// Create a self-managed nodegroup
    pub fn unmanaged(name: impl Into<String>) -> Self {
        Self::new(name, NodeGroupKind::Unmanaged)
    }
}

impl Named for NodeGroup {
    fn name_string(&self) -> String {
        self.name.clone()
    }
}

/// A Kubernetes service account bound to an AWS IAM role (IRSA), backed by a
/// dedicated CloudFormation stack
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamServiceAccount {
    /// Namespace the service account lives in
    pub namespace: String,
    /// Service account name within the namespace
    pub name: String,
}

impl IamServiceAccount {
    /// Create a service account reference for the given namespace and name
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parse a `namespace/name` string, as recorded on the backing
    /// CloudFormation stack, back into a service account reference
    pub fn from_name_string(name_string: &str) -> Result<Self> {
        match name_string.split_once('/') {
            Some((namespace, name)) if !namespace.is_empty() && !name.contains('/') => {
                Ok(Self::new(namespace, name))
            }
            _ => Err(Error::MalformedServiceAccountName {
                name: name_string.to_string(),
            }),
        }
    }
}

impl Named for IamServiceAccount {
    fn name_string(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Return the declared service accounts augmented with the implicit
/// `kube-system/aws-node` account if it is not already declared.
///
/// EKS manages aws-node itself, so delete-class operations scoped to
/// missing resources must know about it even when the config omits it;
/// a user who really wants it gone can still name it explicitly.
pub fn with_implicit_service_accounts(declared: &[IamServiceAccount]) -> Vec<IamServiceAccount> {
    let implicit = IamServiceAccount::new(AWS_NODE_NAMESPACE, AWS_NODE_NAME);
    let mut accounts = declared.to_vec();
    if !accounts.contains(&implicit) {
        accounts.push(implicit);
    }
    accounts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodegroup_name_string_is_the_name() {
        let ng = NodeGroup::managed("test-ng1a");
        assert_eq!(ng.name_string(), "test-ng1a");
    }

    #[test]
    fn service_account_name_string_joins_namespace_and_name() {
        let sa = IamServiceAccount::new("kube-system", "aws-node");
        assert_eq!(sa.name_string(), "kube-system/aws-node");
    }

    #[test]
    fn parses_service_account_name_string() {
        let sa = IamServiceAccount::from_name_string("default/s3-reader")
            .expect("well-formed name should parse");
        assert_eq!(sa.namespace, "default");
        assert_eq!(sa.name, "s3-reader");
    }

    #[test]
    fn rejects_malformed_service_account_names() {
        for name in ["no-separator", "/missing-namespace", "too/many/parts"] {
            let err = IamServiceAccount::from_name_string(name)
                .expect_err("malformed name should be rejected");
            assert!(matches!(err, Error::MalformedServiceAccountName { .. }));
            assert!(err.to_string().contains(name));
        }
    }

    #[test]
    fn implicit_service_accounts_adds_aws_node_once() {
        let declared = vec![IamServiceAccount::new("default", "s3-reader")];
        let augmented = with_implicit_service_accounts(&declared);
        assert_eq!(augmented.len(), 2);
        assert_eq!(augmented[1].name_string(), "kube-system/aws-node");

        // already declared: no duplicate
        let again = with_implicit_service_accounts(&augmented);
        assert_eq!(again, augmented);
    }

    #[test]
    fn nodegroup_deserializes_from_config_json() {
        let declared: Vec<NodeGroup> = serde_json::from_str(
            r#"[{"name": "test-ng1a", "kind": "unmanaged"}, {"name": "test-ng2a"}]"#,
        )
        .expect("config snippet should deserialize");
        assert_eq!(declared[0], NodeGroup::unmanaged("test-ng1a"));
        assert_eq!(declared[1].kind, NodeGroupKind::Managed);
    }
}

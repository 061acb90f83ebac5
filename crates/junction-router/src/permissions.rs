//! Permission evaluation: AND within a group, OR across groups
//!
//! Permission maps are normalized at registration time into an ordered list
//! of named groups, each holding a list of checks, so evaluation reasons
//! about exactly one shape. Groups are tried in insertion order and the
//! first fully-satisfied group grants access. A check that errors aborts
//! evaluation with that error; "denied" and "evaluation failed" are
//! deliberately distinct outcomes.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;
use tracing::debug;

use junction_core::{ApiResult, ServiceScope, UserSession};

/// A single boolean permission check
#[async_trait]
pub trait PermissionCheck<S, P>: Send + Sync {
    async fn check(
        &self,
        services: &ServiceScope<'_, S, P>,
        data: &Value,
        session: Option<&UserSession>,
    ) -> ApiResult<bool>;
}

/// Ordered, normalized permission groups
pub struct PermissionGroups<S, P> {
    groups: Vec<(String, Vec<Arc<dyn PermissionCheck<S, P>>>)>,
}

impl<S, P> PermissionGroups<S, P> {
    pub fn new() -> Self {
        Self { groups: Vec::new() }
    }

    /// Append a named group; a single check is registered as a one-element
    /// AND-list
    pub fn add_group(
        &mut self,
        name: impl Into<String>,
        checks: Vec<Arc<dyn PermissionCheck<S, P>>>,
    ) {
        self.groups.push((name.into(), checks));
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Evaluate the groups against the current request
    ///
    /// Empty groups always grant. Within a group every check must resolve
    /// `true` (evaluated together); across groups the first satisfied group
    /// short-circuits. `Ok(false)` means no group was satisfied; the caller
    /// raises the forbidden error.
    pub async fn verify(
        &self,
        services: &ServiceScope<'_, S, P>,
        data: &Value,
        session: Option<&UserSession>,
    ) -> ApiResult<bool> {
        if self.groups.is_empty() {
            return Ok(true);
        }
        for (name, checks) in &self.groups {
            let results =
                try_join_all(checks.iter().map(|check| check.check(services, data, session)))
                    .await?;
            if results.iter().all(|granted| *granted) {
                debug!(group = name.as_str(), "permission group satisfied");
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl<S, P> Default for PermissionGroups<S, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, P> Clone for PermissionGroups<S, P> {
    fn clone(&self) -> Self {
        Self {
            groups: self.groups.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use junction_core::{ApiError, NoServices};
    use serde_json::json;

    struct Fixed(bool);

    #[async_trait]
    impl PermissionCheck<(), NoServices> for Fixed {
        async fn check(
            &self,
            _services: &ServiceScope<'_, (), NoServices>,
            _data: &Value,
            _session: Option<&UserSession>,
        ) -> ApiResult<bool> {
            Ok(self.0)
        }
    }

    struct Explodes;

    #[async_trait]
    impl PermissionCheck<(), NoServices> for Explodes {
        async fn check(
            &self,
            _services: &ServiceScope<'_, (), NoServices>,
            _data: &Value,
            _session: Option<&UserSession>,
        ) -> ApiResult<bool> {
            Err(ApiError::internal("permission backend unreachable"))
        }
    }

    async fn verify(groups: &PermissionGroups<(), NoServices>) -> ApiResult<bool> {
        let singleton = ();
        let mut session_services = NoServices;
        let scope = ServiceScope {
            singleton: &singleton,
            session: &mut session_services,
        };
        groups.verify(&scope, &json!({}), None).await
    }

    #[tokio::test]
    async fn test_empty_groups_grant() {
        let groups: PermissionGroups<(), NoServices> = PermissionGroups::new();
        assert!(verify(&groups).await.unwrap());
    }

    #[tokio::test]
    async fn test_and_within_group() {
        let mut groups: PermissionGroups<(), NoServices> = PermissionGroups::new();
        groups.add_group("both", vec![Arc::new(Fixed(true)), Arc::new(Fixed(false))]);
        assert!(!verify(&groups).await.unwrap());

        let mut groups: PermissionGroups<(), NoServices> = PermissionGroups::new();
        groups.add_group("both", vec![Arc::new(Fixed(true)), Arc::new(Fixed(true))]);
        assert!(verify(&groups).await.unwrap());
    }

    #[tokio::test]
    async fn test_or_across_groups() {
        // (f1 ∧ f2) ∨ f3 with f1 = false, f3 = true
        let mut groups: PermissionGroups<(), NoServices> = PermissionGroups::new();
        groups.add_group("a", vec![Arc::new(Fixed(false)), Arc::new(Fixed(true))]);
        groups.add_group("b", vec![Arc::new(Fixed(true))]);
        assert!(verify(&groups).await.unwrap());
    }

    #[tokio::test]
    async fn test_check_error_aborts_evaluation() {
        // an erroring check in the first group aborts even though the second
        // group would grant
        let mut groups: PermissionGroups<(), NoServices> = PermissionGroups::new();
        groups.add_group("a", vec![Arc::new(Explodes)]);
        groups.add_group("b", vec![Arc::new(Fixed(true))]);
        assert!(verify(&groups).await.is_err());
    }
}

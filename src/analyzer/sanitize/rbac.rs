//! RBAC checks.
//!
//! Roles and cluster roles are flagged when no binding points at them;
//! bindings are flagged when their role or a service account subject is
//! missing.

use super::capabilities::{
    ClusterRoleBindingLister, ClusterRoleLister, ReferenceIndex, RoleBindingLister, RoleLister,
    ServiceAccountLister,
};
use super::{listed, Sanitizer};
use crate::analyzer::catalog::codes;
use crate::analyzer::fqn::{fqn, namespace_of, RefName, DEFAULT_NAMESPACE};
use crate::analyzer::issues::{Collector, Outcome};
use crate::analyzer::references::RefKind;
use crate::error::Result;
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRole, Role, RoleRef, Subject};
use std::collections::BTreeMap;

pub trait RoleSource: RoleLister + ReferenceIndex {}

impl<T: RoleLister + ReferenceIndex + ?Sized> RoleSource for T {}

pub trait ClusterRoleSource: ClusterRoleLister + ReferenceIndex {}

impl<T: ClusterRoleLister + ReferenceIndex + ?Sized> ClusterRoleSource for T {}

pub trait RoleBindingSource:
    RoleBindingLister + RoleLister + ClusterRoleLister + ServiceAccountLister
{
}

impl<T> RoleBindingSource for T where
    T: RoleBindingLister + RoleLister + ClusterRoleLister + ServiceAccountLister + ?Sized
{
}

pub trait ClusterRoleBindingSource:
    ClusterRoleBindingLister + ClusterRoleLister + ServiceAccountLister
{
}

impl<T> ClusterRoleBindingSource for T where
    T: ClusterRoleBindingLister + ClusterRoleLister + ServiceAccountLister + ?Sized
{
}

pub struct RoleSanitizer<'a, S: ?Sized> {
    collector: Collector,
    source: &'a S,
}

impl<'a, S: RoleSource + ?Sized> RoleSanitizer<'a, S> {
    pub fn new(collector: Collector, source: &'a S) -> Self {
        Self { collector, source }
    }
}

impl<S: RoleSource + ?Sized> Sanitizer for RoleSanitizer<'_, S> {
    fn sanitize(&mut self) -> Result<()> {
        let Some(roles) = listed(&mut self.collector, self.source.list_roles()) else {
            return Ok(());
        };
        let Some(refs) = listed(&mut self.collector, self.source.rbac_references()) else {
            return Ok(());
        };

        for id in roles.keys() {
            self.collector.init_outcome(id);
            if !refs.contains(&RefKind::Role.key(id)) {
                self.collector.add_code(id, codes::UNUSED, &[])?;
            }
            self.collector.clear_if_excluded(id);
        }
        Ok(())
    }

    fn collector(&self) -> &Collector {
        &self.collector
    }

    fn into_outcome(self: Box<Self>) -> Outcome {
        self.collector.into_outcome()
    }
}

pub struct ClusterRoleSanitizer<'a, S: ?Sized> {
    collector: Collector,
    source: &'a S,
}

impl<'a, S: ClusterRoleSource + ?Sized> ClusterRoleSanitizer<'a, S> {
    pub fn new(collector: Collector, source: &'a S) -> Self {
        Self { collector, source }
    }
}

impl<S: ClusterRoleSource + ?Sized> Sanitizer for ClusterRoleSanitizer<'_, S> {
    fn sanitize(&mut self) -> Result<()> {
        let Some(roles) = listed(&mut self.collector, self.source.list_cluster_roles()) else {
            return Ok(());
        };
        let Some(refs) = listed(&mut self.collector, self.source.rbac_references()) else {
            return Ok(());
        };
        // Role bindings outside a restricted namespace are not listed.
        let scoped = self.source.reference_scope().is_some();

        for id in roles.keys() {
            self.collector.init_outcome(id);
            if !scoped && !refs.contains(&RefKind::ClusterRole.key(id)) {
                self.collector.add_code(id, codes::UNUSED, &[])?;
            }
            self.collector.clear_if_excluded(id);
        }
        Ok(())
    }

    fn collector(&self) -> &Collector {
        &self.collector
    }

    fn into_outcome(self: Box<Self>) -> Outcome {
        self.collector.into_outcome()
    }
}

/// Existing resources a binding may point at. `None` marks a kind that
/// could not be listed; references to it are not checked.
struct BindingTargets<'a> {
    roles: Option<&'a BTreeMap<String, Role>>,
    cluster_roles: Option<&'a BTreeMap<String, ClusterRole>>,
    service_accounts: Option<&'a BTreeMap<String, ServiceAccount>>,
}

impl BindingTargets<'_> {
    fn check(
        &self,
        collector: &mut Collector,
        id: &str,
        namespace: &str,
        role_ref: &RoleRef,
        subjects: Option<&[Subject]>,
    ) -> Result<()> {
        let role_missing = match role_ref.kind.as_str() {
            "Role" => {
                let key = fqn(namespace, &role_ref.name);
                self.roles
                    .filter(|roles| !roles.contains_key(&key))
                    .map(|_| key)
            }
            "ClusterRole" => self
                .cluster_roles
                .filter(|roles| !roles.contains_key(&role_ref.name))
                .map(|_| role_ref.name.clone()),
            _ => None,
        };
        if let Some(target) = role_missing {
            collector.add_code(
                id,
                codes::MISSING_BINDING_TARGET,
                &[&role_ref.kind, &target],
            )?;
        }

        let Some(accounts) = self.service_accounts else {
            return Ok(());
        };
        for subject in subjects.unwrap_or_default() {
            if subject.kind != "ServiceAccount" {
                continue;
            }
            let ns = subject.namespace.ref_name().unwrap_or(namespace);
            let sa = fqn(ns, &subject.name);
            if !accounts.contains_key(&sa) {
                collector.add_code(id, codes::MISSING_BINDING_TARGET, &[&subject.kind, &sa])?;
            }
        }
        Ok(())
    }
}

pub struct RoleBindingSanitizer<'a, S: ?Sized> {
    collector: Collector,
    source: &'a S,
}

impl<'a, S: RoleBindingSource + ?Sized> RoleBindingSanitizer<'a, S> {
    pub fn new(collector: Collector, source: &'a S) -> Self {
        Self { collector, source }
    }
}

impl<S: RoleBindingSource + ?Sized> Sanitizer for RoleBindingSanitizer<'_, S> {
    fn sanitize(&mut self) -> Result<()> {
        let source = self.source;
        let Some(bindings) = listed(&mut self.collector, source.list_role_bindings()) else {
            return Ok(());
        };
        let targets = BindingTargets {
            roles: listed(&mut self.collector, source.list_roles()),
            cluster_roles: listed(&mut self.collector, source.list_cluster_roles()),
            service_accounts: listed(&mut self.collector, source.list_service_accounts()),
        };

        for (id, rb) in bindings {
            self.collector.init_outcome(id);
            targets.check(
                &mut self.collector,
                id,
                namespace_of(id),
                &rb.role_ref,
                rb.subjects.as_deref(),
            )?;
            self.collector.clear_if_excluded(id);
        }
        Ok(())
    }

    fn collector(&self) -> &Collector {
        &self.collector
    }

    fn into_outcome(self: Box<Self>) -> Outcome {
        self.collector.into_outcome()
    }
}

pub struct ClusterRoleBindingSanitizer<'a, S: ?Sized> {
    collector: Collector,
    source: &'a S,
}

impl<'a, S: ClusterRoleBindingSource + ?Sized> ClusterRoleBindingSanitizer<'a, S> {
    pub fn new(collector: Collector, source: &'a S) -> Self {
        Self { collector, source }
    }
}

impl<S: ClusterRoleBindingSource + ?Sized> Sanitizer for ClusterRoleBindingSanitizer<'_, S> {
    fn sanitize(&mut self) -> Result<()> {
        let source = self.source;
        let Some(bindings) = listed(&mut self.collector, source.list_cluster_role_bindings()) else {
            return Ok(());
        };
        // Cluster bindings may only point at cluster roles
        let targets = BindingTargets {
            roles: None,
            cluster_roles: listed(&mut self.collector, source.list_cluster_roles()),
            service_accounts: listed(&mut self.collector, source.list_service_accounts()),
        };

        for (id, crb) in bindings {
            self.collector.init_outcome(id);
            targets.check(
                &mut self.collector,
                id,
                DEFAULT_NAMESPACE,
                &crb.role_ref,
                crb.subjects.as_deref(),
            )?;
            self.collector.clear_if_excluded(id);
        }
        Ok(())
    }

    fn collector(&self) -> &Collector {
        &self.collector
    }

    fn into_outcome(self: Box<Self>) -> Outcome {
        self.collector.into_outcome()
    }
}

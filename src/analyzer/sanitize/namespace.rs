//! Namespace checks.

use super::capabilities::{NamespaceLister, ReferenceIndex};
use super::{listed, Sanitizer};
use crate::analyzer::catalog::codes;
use crate::analyzer::issues::{Collector, Outcome};
use crate::analyzer::references::RefKind;
use crate::error::Result;
use k8s_openapi::api::core::v1::Namespace;

pub trait NamespaceSource: NamespaceLister + ReferenceIndex {}

impl<T: NamespaceLister + ReferenceIndex + ?Sized> NamespaceSource for T {}

pub struct NamespaceSanitizer<'a, S: ?Sized> {
    collector: Collector,
    source: &'a S,
    /// Namespaces never reported as unused.
    skip: Vec<String>,
}

impl<'a, S: NamespaceSource + ?Sized> NamespaceSanitizer<'a, S> {
    pub fn new(collector: Collector, source: &'a S, skip: Vec<String>) -> Self {
        Self {
            collector,
            source,
            skip,
        }
    }
}

impl<S: NamespaceSource + ?Sized> Sanitizer for NamespaceSanitizer<'_, S> {
    fn sanitize(&mut self) -> Result<()> {
        let Some(namespaces) = listed(&mut self.collector, self.source.list_namespaces()) else {
            return Ok(());
        };
        let source = self.source;
        let refs = listed(&mut self.collector, source.pod_references());
        let scope = source.reference_scope();

        for (id, ns) in namespaces {
            if scope.is_some_and(|scope| scope != id) {
                continue;
            }
            self.collector.init_outcome(id);
            if !is_active(ns) {
                self.collector.add_code(id, codes::NAMESPACE_INACTIVE, &[])?;
            }
            if let Some(refs) = refs
                && !self.skip.iter().any(|s| s == id)
                && !refs.contains(&RefKind::Namespace.key(id))
            {
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

/// A namespace without a reported phase is taken as active.
fn is_active(ns: &Namespace) -> bool {
    ns.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .is_none_or(|phase| phase == "Active")
}

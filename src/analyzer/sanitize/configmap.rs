//! ConfigMap usage checks.

use super::capabilities::{ConfigMapLister, ReferenceIndex};
use super::{check_usage, listed, Sanitizer};
use crate::analyzer::issues::{Collector, Outcome};
use crate::analyzer::references::{RefKind, StringSet};
use crate::error::Result;
use k8s_openapi::api::core::v1::ConfigMap;

/// Capabilities the ConfigMap checker needs.
pub trait ConfigMapSource: ConfigMapLister + ReferenceIndex {}

impl<T: ConfigMapLister + ReferenceIndex + ?Sized> ConfigMapSource for T {}

pub struct ConfigMapSanitizer<'a, S: ?Sized> {
    collector: Collector,
    source: &'a S,
}

impl<'a, S: ConfigMapSource + ?Sized> ConfigMapSanitizer<'a, S> {
    pub fn new(collector: Collector, source: &'a S) -> Self {
        Self { collector, source }
    }
}

impl<S: ConfigMapSource + ?Sized> Sanitizer for ConfigMapSanitizer<'_, S> {
    fn sanitize(&mut self) -> Result<()> {
        let Some(config_maps) = listed(&mut self.collector, self.source.list_config_maps()) else {
            return Ok(());
        };
        let Some(pod_refs) = listed(&mut self.collector, self.source.pod_references()) else {
            return Ok(());
        };

        for (id, cm) in config_maps {
            self.collector.init_outcome(id);
            check_usage(
                &mut self.collector,
                id,
                &RefKind::ConfigMap.key(id),
                &declared_keys(cm),
                &[pod_refs],
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

fn declared_keys(cm: &ConfigMap) -> StringSet {
    let data = cm.data.iter().flat_map(|d| d.keys());
    let binary = cm.binary_data.iter().flat_map(|d| d.keys());
    data.chain(binary).map(String::as_str).collect()
}

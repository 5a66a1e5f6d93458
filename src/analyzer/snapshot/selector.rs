//! Label selector matching.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use std::collections::BTreeMap;

/// Check whether `labels` satisfy `selector`.
///
/// An empty selector matches nothing, so workloads without a selector never
/// claim unrelated pods.
pub fn matches(selector: &LabelSelector, labels: Option<&BTreeMap<String, String>>) -> bool {
    let match_labels = selector.match_labels.as_ref().filter(|m| !m.is_empty());
    let expressions = selector
        .match_expressions
        .as_deref()
        .filter(|e| !e.is_empty());
    if match_labels.is_none() && expressions.is_none() {
        return false;
    }

    let empty = BTreeMap::new();
    let labels = labels.unwrap_or(&empty);

    let labels_ok = match_labels
        .into_iter()
        .flatten()
        .all(|(k, v)| labels.get(k) == Some(v));

    let expressions_ok = expressions.unwrap_or_default().iter().all(|expr| {
        let values = expr.values.as_deref().unwrap_or_default();
        let current = labels.get(&expr.key);
        match expr.operator.as_str() {
            "In" => current.is_some_and(|v| values.contains(v)),
            "NotIn" => current.is_none_or(|v| !values.contains(v)),
            "Exists" => current.is_some(),
            "DoesNotExist" => current.is_none(),
            other => {
                log::debug!("unsupported selector operator '{}'", other);
                false
            }
        }
    });

    labels_ok && expressions_ok
}

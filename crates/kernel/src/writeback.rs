//! Mirroring backend-computed values onto the frontend tree.

use crate::node::PropertyTrackingMode;
use crate::tree::NodeTree;
use scenesync_common::{ChangeRecord, ENABLED_PROPERTY, NodeId, PropertyValue, SceneChange};
use std::collections::HashMap;

impl NodeTree {
    /// Apply backend-originated property updates to the frontend.
    ///
    /// The tracking mode of each target property decides what lands:
    /// `DontTrackValues` properties are left alone, `TrackFinalValues` keep
    /// only the last value written to them in this batch, `TrackAllValues`
    /// take every value in order. The enabled flag is always applied. Every
    /// applied value is re-emitted with its backend origin so that other
    /// aspects observe it. Returns the number of values applied.
    pub fn apply_backend_changes(&mut self, changes: Vec<SceneChange>) -> usize {
        let mut last_write: HashMap<(NodeId, String), usize> = HashMap::new();
        for (index, change) in changes.iter().enumerate() {
            if let ChangeRecord::PropertyUpdated { property, .. } = &change.record {
                last_write.insert((change.subject, property.clone()), index);
            }
        }

        let mut applied = 0;
        for (index, change) in changes.into_iter().enumerate() {
            let ChangeRecord::PropertyUpdated { property, value } = &change.record else {
                tracing::debug!(kind = ?change.kind(), "ignoring non-property backend change");
                continue;
            };
            let Ok(node) = self.get_mut(change.subject) else {
                tracing::debug!(subject = %change.subject, "backend change for missing node");
                continue;
            };

            if property == ENABLED_PROPERTY {
                match value.as_bool() {
                    Some(enabled) if enabled != node.enabled => node.enabled = enabled,
                    _ => continue,
                }
            } else {
                match node.effective_tracking(property) {
                    PropertyTrackingMode::DontTrackValues => continue,
                    PropertyTrackingMode::TrackFinalValues
                        if last_write.get(&(change.subject, property.clone())) != Some(&index) =>
                    {
                        continue;
                    }
                    _ => {}
                }
                if node.properties.get(property).unwrap_or(&PropertyValue::Null) == value {
                    continue;
                }
                node.properties.insert(property.clone(), value.clone());
            }

            applied += 1;
            tracing::trace!(subject = %change.subject, %property, "applied backend value");
            self.notify_for(change.subject, vec![change]);
        }
        applied
    }
}

use scenesync_common::{ChangeRecord, ENABLED_PROPERTY, NodeCreatedData, NodeId, SceneChange};

/// A backend peer of a frontend node.
///
/// Instances are default-constructed by their manager, then initialized from
/// the creation record of their frontend peer.
pub trait BackendNode: Default + Send + Sync + 'static {
    /// Build state from the creation record of the frontend peer.
    fn initialize_from_peer(&mut self, peer: NodeId, data: &NodeCreatedData);

    /// Apply one change addressed to this node.
    fn scene_change_event(&mut self, change: &SceneChange);

    /// Called right before the manager releases the instance.
    fn cleanup(&mut self) {}
}

/// Bookkeeping shared by most backend nodes: peer id and enabled flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendNodeState {
    peer: Option<NodeId>,
    enabled: bool,
}

impl BackendNodeState {
    pub fn initialize(&mut self, peer: NodeId, data: &NodeCreatedData) {
        self.peer = Some(peer);
        self.enabled = data.enabled;
    }

    pub fn peer(&self) -> Option<NodeId> {
        self.peer
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Consume the change if it is an `enabled` update. Returns true when consumed.
    pub fn handle_change(&mut self, change: &SceneChange) -> bool {
        match &change.record {
            ChangeRecord::PropertyUpdated { property, value } if property == ENABLED_PROPERTY => {
                if let Some(enabled) = value.as_bool() {
                    self.enabled = enabled;
                }
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenesync_common::{NodeType, PropertySnapshot};

    #[test]
    fn state_tracks_enabled_updates() {
        let id = NodeId::new();
        let mut state = BackendNodeState::default();
        state.initialize(
            id,
            &NodeCreatedData {
                parent: None,
                enabled: true,
                snapshot: PropertySnapshot::new(),
            },
        );
        assert_eq!(state.peer(), Some(id));
        assert!(state.is_enabled());

        let change =
            SceneChange::property_updated(id, NodeType::new("Node"), ENABLED_PROPERTY, false.into());
        assert!(state.handle_change(&change));
        assert!(!state.is_enabled());

        let other = SceneChange::property_updated(id, NodeType::new("Node"), "name", "x".into());
        assert!(!state.handle_change(&other));
    }
}

use scenesync_backend::{BackendNode, BackendNodeState};
use scenesync_common::{ChangeRecord, NodeCreatedData, NodeId, NodeType, PropertyValue, SceneChange};

pub const AXIS: NodeType = NodeType::from_static("Axis");
pub const ACTION: NodeType = NodeType::from_static("Action");

pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Continuous input: `value = channel * scale`.
#[derive(Debug)]
pub struct AxisNode {
    state: BackendNodeState,
    pub channel: Option<String>,
    pub scale: f64,
    /// Last value written back to the frontend.
    pub value: f64,
}

impl Default for AxisNode {
    fn default() -> Self {
        Self {
            state: BackendNodeState::default(),
            channel: None,
            scale: 1.0,
            value: 0.0,
        }
    }
}

impl AxisNode {
    pub fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    fn apply(&mut self, property: &str, value: &PropertyValue) {
        match property {
            "channel" => self.channel = value.as_str().map(str::to_owned),
            "scale" => self.scale = value.as_float().unwrap_or(self.scale),
            "value" => self.value = value.as_float().unwrap_or(self.value),
            _ => {}
        }
    }
}

impl BackendNode for AxisNode {
    fn initialize_from_peer(&mut self, peer: NodeId, data: &NodeCreatedData) {
        *self = Self::default();
        self.state.initialize(peer, data);
        for (property, value) in &data.snapshot {
            self.apply(property, value);
        }
    }

    fn scene_change_event(&mut self, change: &SceneChange) {
        if self.state.handle_change(change) {
            return;
        }
        if let ChangeRecord::PropertyUpdated { property, value } = &change.record {
            self.apply(property, value);
        }
    }
}

/// Digital input: active while `|channel| >= threshold`.
#[derive(Debug)]
pub struct ActionNode {
    state: BackendNodeState,
    pub channel: Option<String>,
    pub threshold: f64,
    /// Last state written back to the frontend.
    pub active: bool,
}

impl Default for ActionNode {
    fn default() -> Self {
        Self {
            state: BackendNodeState::default(),
            channel: None,
            threshold: DEFAULT_THRESHOLD,
            active: false,
        }
    }
}

impl ActionNode {
    pub fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    fn apply(&mut self, property: &str, value: &PropertyValue) {
        match property {
            "channel" => self.channel = value.as_str().map(str::to_owned),
            "threshold" => self.threshold = value.as_float().unwrap_or(self.threshold),
            "active" => self.active = value.as_bool().unwrap_or(self.active),
            _ => {}
        }
    }
}

impl BackendNode for ActionNode {
    fn initialize_from_peer(&mut self, peer: NodeId, data: &NodeCreatedData) {
        *self = Self::default();
        self.state.initialize(peer, data);
        for (property, value) in &data.snapshot {
            self.apply(property, value);
        }
    }

    fn scene_change_event(&mut self, change: &SceneChange) {
        if self.state.handle_change(change) {
            return;
        }
        if let ChangeRecord::PropertyUpdated { property, value } = &change.record {
            self.apply(property, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenesync_common::PropertySnapshot;

    #[test]
    fn axis_loads_channel_and_scale() {
        let id = NodeId::new();
        let mut snapshot = PropertySnapshot::new();
        snapshot.insert("channel".into(), "mouse.x".into());
        snapshot.insert("scale".into(), 2.0f64.into());
        let mut axis = AxisNode::default();
        axis.initialize_from_peer(
            id,
            &NodeCreatedData {
                parent: None,
                enabled: true,
                snapshot,
            },
        );
        assert_eq!(axis.channel.as_deref(), Some("mouse.x"));
        assert_eq!(axis.scale, 2.0);

        axis.scene_change_event(&SceneChange::property_updated(
            id,
            AXIS,
            "channel",
            PropertyValue::Null,
        ));
        assert!(axis.channel.is_none());
    }

    #[test]
    fn action_defaults() {
        let action = ActionNode::default();
        assert_eq!(action.threshold, DEFAULT_THRESHOLD);
        assert!(!action.active);
        assert!(!action.is_enabled());
    }
}

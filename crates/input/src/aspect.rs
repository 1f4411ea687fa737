use crate::device::DeviceState;
use crate::nodes::{ACTION, AXIS, ActionNode, AxisNode};
use scenesync_backend::{Aspect, BackendNodeRegistry, BackendWrites, Job, NodeFunctor, SharedManager};
use std::time::Duration;

/// Samples the device state into Axis and Action nodes and writes changed
/// values back to the frontend.
pub struct InputAspect {
    registry: BackendNodeRegistry,
    device: DeviceState,
    axes: SharedManager<AxisNode>,
    actions: SharedManager<ActionNode>,
}

impl InputAspect {
    pub fn new(device: DeviceState) -> Self {
        let axes = SharedManager::new();
        let actions = SharedManager::new();
        let mut registry = BackendNodeRegistry::new();
        registry.register(AXIS, NodeFunctor::new(axes.clone()));
        registry.register(ACTION, NodeFunctor::new(actions.clone()));
        Self {
            registry,
            device,
            axes,
            actions,
        }
    }

    pub fn device(&self) -> &DeviceState {
        &self.device
    }

    pub fn axes(&self) -> &SharedManager<AxisNode> {
        &self.axes
    }

    pub fn actions(&self) -> &SharedManager<ActionNode> {
        &self.actions
    }
}

impl Aspect for InputAspect {
    fn name(&self) -> &str {
        "input"
    }

    fn registry(&self) -> &BackendNodeRegistry {
        &self.registry
    }

    fn registry_mut(&mut self) -> &mut BackendNodeRegistry {
        &mut self.registry
    }

    fn jobs_to_execute(&mut self, _time: Duration) -> Vec<Box<dyn Job>> {
        vec![
            Box::new(UpdateAxesJob {
                device: self.device.clone(),
                axes: self.axes.clone(),
            }),
            Box::new(UpdateActionsJob {
                device: self.device.clone(),
                actions: self.actions.clone(),
            }),
        ]
    }
}

pub struct UpdateAxesJob {
    device: DeviceState,
    axes: SharedManager<AxisNode>,
}

impl Job for UpdateAxesJob {
    fn name(&self) -> &'static str {
        "update_axes"
    }

    fn run(&mut self, writes: &mut BackendWrites) {
        let mut axes = self.axes.write();
        for id in axes.ids() {
            let Some(axis) = axes.lookup_mut(id).filter(|a| a.is_enabled()) else {
                continue;
            };
            let Some(channel) = axis.channel.as_deref() else {
                continue;
            };
            let value = self.device.get(channel) * axis.scale;
            if value != axis.value {
                axis.value = value;
                writes.write(id, AXIS, "value", value);
            }
        }
    }
}

pub struct UpdateActionsJob {
    device: DeviceState,
    actions: SharedManager<ActionNode>,
}

impl Job for UpdateActionsJob {
    fn name(&self) -> &'static str {
        "update_actions"
    }

    fn run(&mut self, writes: &mut BackendWrites) {
        let mut actions = self.actions.write();
        for id in actions.ids() {
            let Some(action) = actions.lookup_mut(id).filter(|a| a.is_enabled()) else {
                continue;
            };
            let Some(channel) = action.channel.as_deref() else {
                continue;
            };
            let active = self.device.get(channel).abs() >= action.threshold;
            if active != action.active {
                action.active = active;
                tracing::debug!(%id, channel, active, "action toggled");
                writes.write(id, ACTION, "active", active);
            }
        }
    }
}

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Latest raw value of every device channel ("mouse.x", "key.space", ...).
///
/// Cloning shares the state; the host feeds it, input jobs read it.
#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    channels: Arc<Mutex<BTreeMap<String, f64>>>,
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, channel: impl Into<String>, value: f64) {
        self.lock().insert(channel.into(), value);
    }

    /// Value of a channel; channels never fed read as zero.
    pub fn get(&self, channel: &str) -> f64 {
        self.lock().get(channel).copied().unwrap_or(0.0)
    }

    pub fn release(&self, channel: &str) {
        self.lock().remove(channel);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn channels(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, f64>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_channels() {
        let device = DeviceState::new();
        let host = device.clone();
        host.set("mouse.x", 0.25);
        assert_eq!(device.get("mouse.x"), 0.25);
        assert_eq!(device.get("mouse.y"), 0.0);
        assert_eq!(device.channels(), vec!["mouse.x".to_owned()]);

        host.release("mouse.x");
        assert_eq!(device.get("mouse.x"), 0.0);
    }
}

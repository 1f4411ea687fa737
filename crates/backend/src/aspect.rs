use crate::job::Job;
use crate::registry::BackendNodeRegistry;
use scenesync_common::AspectId;
use std::time::Duration;

/// A backend subsystem (rendering, input, ...).
///
/// An aspect registers one functor per frontend node type it cares about
/// and, once per frame, hands out the jobs that consume its backend nodes.
pub trait Aspect: Send {
    fn name(&self) -> &str;

    fn registry(&self) -> &BackendNodeRegistry;

    fn registry_mut(&mut self) -> &mut BackendNodeRegistry;

    /// Jobs for the frame at `time`, in submission order.
    fn jobs_to_execute(&mut self, time: Duration) -> Vec<Box<dyn Job>>;

    /// Called once when the engine assigns the aspect its id.
    fn on_registered(&mut self, _id: AspectId) {}
}

//! Input aspect: device channels mapped onto frontend Axis and Action nodes.
//!
//! The host feeds raw channel values into a [`DeviceState`]; each frame the
//! aspect's jobs sample it and write changed values back to the frontend as
//! backend-originated property updates.
//!
//! # Invariants
//! - A value is written back only when it differs from the last one written.
//! - Disabled nodes are not sampled.

pub mod aspect;
pub mod device;
pub mod nodes;

pub use aspect::{InputAspect, UpdateActionsJob, UpdateAxesJob};
pub use device::DeviceState;
pub use nodes::{ACTION, AXIS, ActionNode, AxisNode};

//! Change delivery between the frontend tree and backend aspects.
//!
//! Frontend operations hand records to a per-scene [`Arbiter`]. The
//! [`ChangeArbiter`] queues them and, during a drain pass, forwards them to
//! its single [`Postman`], which routes each record to the aspects whose
//! registries know the subject's type. Backend-originated changes flow back
//! through the arbiter's frontend channel.
//!
//! # Invariants
//! - Order is preserved end to end for records issued by one thread.
//! - Only one drain pass runs at a time per arbiter.
//! - A backend-originated change never returns to the aspect that made it.

pub mod arbiter;
pub mod postman;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use arbiter::{Arbiter, ArbiterStats, ChangeArbiter, Delivery};
pub use postman::{AspectPostman, NullPostman, Postman, SharedAspect};

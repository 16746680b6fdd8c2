pub mod demo;
pub mod handle;
pub mod infer;
pub mod lifecycle;

pub use handle::{ForwardPass, ModelHandle};
pub use lifecycle::{LifecycleManager, LifecycleState};

//! Test harness utilities for the kernel suites.

mod handlers;
mod reporter;
mod world;

pub use handlers::{sample_module, sample_registry};
pub use reporter::{LifecycleEvent, RecordingReporter};
pub use world::{KernelWorld, world};

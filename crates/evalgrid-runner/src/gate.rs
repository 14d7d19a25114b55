//! Model availability gate.

use std::path::Path;

/// Decides whether a model's jobs may run at all.
///
/// Models are prepared by a separate stage that may not have produced every
/// variant yet. A missing artifact directory skips the model; it is never a
/// failure.
pub struct RunGate;

impl RunGate {
    pub fn is_runnable(model_dir: &Path) -> bool {
        model_dir.is_dir()
    }
}

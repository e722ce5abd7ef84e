//! The unit of work the [`AnalysisEngine`](crate::engine::AnalysisEngine) runs.

use arsen_common::error::Result;

use crate::context::AnalysisContext;

/// One stage of the analysis pipeline.
///
/// Passes run in registration order against a shared [`AnalysisContext`];
/// each may read what earlier passes produced. An `Err` is logged by the
/// engine and the next pass still runs.
pub trait AnalysisPass: Send + Sync {
    /// Human-readable pass name used in logs.
    fn name(&self) -> &'static str;

    /// Runs the pass.
    ///
    /// # Errors
    ///
    /// Returns an error when the pass cannot complete.
    fn execute(&self, context: &mut AnalysisContext) -> Result<()>;
}

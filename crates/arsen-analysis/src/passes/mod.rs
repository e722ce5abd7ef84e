//! The built-in analysis passes.

pub mod control_flow;
pub mod functions;
pub mod pseudocode;
pub mod strings;
pub mod xrefs;

pub use control_flow::ControlFlowAnalysisPass;
pub use functions::FunctionDetectionPass;
pub use pseudocode::PseudocodeGenerationPass;
pub use strings::StringAnalysisPass;
pub use xrefs::CrossReferencePass;

use crate::pass::AnalysisPass;

/// The default pipeline in execution order.
#[must_use]
pub fn default_passes() -> Vec<Box<dyn AnalysisPass>> {
    vec![
        Box::new(FunctionDetectionPass),
        Box::new(ControlFlowAnalysisPass),
        Box::new(CrossReferencePass),
        Box::new(StringAnalysisPass),
        Box::new(PseudocodeGenerationPass),
    ]
}

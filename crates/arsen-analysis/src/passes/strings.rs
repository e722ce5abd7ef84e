//! Printable ASCII extraction.

use arsen_common::error::Result;

use crate::context::AnalysisContext;
use crate::pass::AnalysisPass;

/// Reports runs of printable ASCII in every readable section.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringAnalysisPass;

const fn printable(byte: u8) -> bool {
    matches!(byte, 32..=126)
}

impl AnalysisPass for StringAnalysisPass {
    fn name(&self) -> &'static str {
        "String Analysis"
    }

    fn execute(&self, context: &mut AnalysisContext) -> Result<()> {
        let binary = std::sync::Arc::clone(&context.binary);
        let min = context.config.min_string_length.max(1);

        for section in binary.sections.iter().filter(|s| s.is_readable()) {
            let mut run_start: Option<usize> = None;
            // The sentinel closes a run that reaches the end of the section.
            for (i, byte) in section.data.iter().copied().map(Some).chain([None]).enumerate() {
                match (byte, run_start) {
                    (Some(b), None) if printable(b) => run_start = Some(i),
                    (Some(b), Some(_)) if printable(b) => {}
                    (_, Some(start)) => {
                        run_start = None;
                        if i - start >= min {
                            let text: String =
                                section.data[start..i].iter().copied().map(char::from).collect();
                            context.add_string(section.virtual_address.add(start as u64), text);
                        }
                    }
                    (_, None) => {}
                }
            }
        }

        tracing::debug!(count = context.strings.len(), "strings extracted");
        Ok(())
    }
}

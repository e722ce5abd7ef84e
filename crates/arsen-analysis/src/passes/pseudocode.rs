//! Pseudocode for every detected function.

use std::collections::BTreeMap;
use std::sync::Arc;

use arsen_common::error::Result;
use arsen_common::types::Address;

use crate::context::AnalysisContext;
use crate::events::EventKind;
use crate::pass::AnalysisPass;

/// Renders every function through the session's
/// [`PseudocodeService`](crate::pseudocode::PseudocodeService).
#[derive(Debug, Clone, Copy, Default)]
pub struct PseudocodeGenerationPass;

impl AnalysisPass for PseudocodeGenerationPass {
    fn name(&self) -> &'static str {
        "Pseudocode Generation"
    }

    fn execute(&self, context: &mut AnalysisContext) -> Result<()> {
        let mut names: BTreeMap<Address, String> = BTreeMap::new();
        for import in &context.binary.imports {
            if import.address != Address::default() {
                let _ = names.insert(import.address, import.name.clone());
            }
        }
        for export in &context.binary.exports {
            let _ = names.insert(export.address, export.name.clone());
        }
        for function in context.functions.values() {
            if !function.has_default_name() {
                let _ = names.insert(function.address, function.name.clone());
            }
        }
        context.pseudocode_service.set_resolver(Arc::new(names));

        let generated = context
            .pseudocode_service
            .generate_all(context.functions.values());
        let count = generated.values().filter(|code| !code.is_empty()).count();
        for (address, code) in generated {
            context.set_pseudocode(address, code);
        }

        tracing::info!(count, "pseudocode generated");
        context.events.publish(EventKind::PseudocodeGenerated { count });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::{FunctionDetectionPass, fixture};

    #[test]
    fn renders_functions_with_export_names() {
        // 1000: call 1006; 1005: ret; 1006: ret
        let code = [0xE8, 0x01, 0x00, 0x00, 0x00, 0xC3, 0xC3];
        let mut ctx = fixture::context(fixture::x86(&code, Vec::new(), &[("leaf", 0x1006)]));
        let mut rx = ctx.events.subscribe();
        FunctionDetectionPass.execute(&mut ctx).expect("detection");
        PseudocodeGenerationPass.execute(&mut ctx).expect("pseudocode");

        assert_eq!(ctx.pseudocode.len(), 2);
        let main = &ctx.pseudocode[&Address::new(0x1000)];
        assert!(main.starts_with("int SUB_0000000000001000()"));
        assert!(main.contains("leaf();"));
        assert!(ctx.pseudocode[&Address::new(0x1006)].starts_with("int leaf()"));

        let event = rx.try_recv().expect("event");
        assert_eq!(event.kind, EventKind::PseudocodeGenerated { count: 2 });
    }
}

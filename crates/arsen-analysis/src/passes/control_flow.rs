//! Call graph population and per-function CFG statistics.

use std::collections::{BTreeMap, BTreeSet};

use arsen_common::disassembly::InstructionType;
use arsen_common::error::Result;
use arsen_common::types::Address;

use crate::cfg::ControlFlowGraph;
use crate::context::AnalysisContext;
use crate::pass::AnalysisPass;

/// Fills in `callers` and `callees` and reports loop structure.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlFlowAnalysisPass;

impl AnalysisPass for ControlFlowAnalysisPass {
    fn name(&self) -> &'static str {
        "Control Flow Analysis"
    }

    fn execute(&self, context: &mut AnalysisContext) -> Result<()> {
        let known: BTreeSet<Address> = context.functions.keys().copied().collect();
        let mut callers: BTreeMap<Address, BTreeSet<Address>> = BTreeMap::new();

        for function in context.functions.values_mut() {
            let callees: BTreeSet<Address> = function
                .instructions()
                .filter(|i| i.kind == InstructionType::Call)
                .filter_map(|i| i.target)
                .filter(|t| known.contains(t))
                .collect();
            for callee in &callees {
                let _ = callers.entry(*callee).or_default().insert(function.address);
            }
            function.callees = callees.into_iter().collect();

            let cfg = ControlFlowGraph::build(function);
            tracing::debug!(
                function = %function.name,
                blocks = cfg.block_count(),
                edges = cfg.edge_count(),
                loops = cfg.back_edges().len(),
                "control flow graph built"
            );
        }

        for function in context.functions.values_mut() {
            function.callers = callers
                .remove(&function.address)
                .map(|set| set.into_iter().collect())
                .unwrap_or_default();
        }
        Ok(())
    }
}

//! Mutable pipeline state shared by the passes, and the frozen result.

use std::collections::BTreeMap;
use std::sync::Arc;

use arsen_common::binary::BinaryFile;
use arsen_common::config::AnalysisConfig;
use arsen_common::disassembly::{CrossReference, Function, Instruction};
use arsen_common::types::Address;
use serde::{Deserialize, Serialize};

use crate::events::EventBus;
use crate::pseudocode::PseudocodeService;

/// A printable ASCII run found in a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedString {
    /// Virtual address of the first character.
    pub address: Address,
    /// The run itself.
    pub text: String,
}

/// Working state threaded through every [`AnalysisPass`](crate::pass::AnalysisPass).
#[derive(Debug)]
pub struct AnalysisContext {
    /// The binary under analysis.
    pub binary: Arc<BinaryFile>,
    /// Pass tuning.
    pub config: AnalysisConfig,
    /// Every instruction from the linear sweep.
    pub instructions: BTreeMap<Address, Instruction>,
    /// Detected functions by entry address.
    pub functions: BTreeMap<Address, Function>,
    /// References in discovery order.
    pub cross_references: Vec<CrossReference>,
    /// Strings in section order.
    pub strings: Vec<ExtractedString>,
    /// Rendered pseudocode by function address.
    pub pseudocode: BTreeMap<Address, String>,
    /// Bus for progress notifications from inside passes.
    pub events: EventBus,
    /// Pseudocode renderer shared with the session.
    pub pseudocode_service: Arc<PseudocodeService>,
}

impl AnalysisContext {
    /// Fresh context for `binary`.
    #[must_use]
    pub fn new(
        binary: Arc<BinaryFile>,
        config: AnalysisConfig,
        events: EventBus,
        pseudocode_service: Arc<PseudocodeService>,
    ) -> Self {
        Self {
            binary,
            config,
            instructions: BTreeMap::new(),
            functions: BTreeMap::new(),
            cross_references: Vec::new(),
            strings: Vec::new(),
            pseudocode: BTreeMap::new(),
            events,
            pseudocode_service,
        }
    }

    /// Records a decoded instruction, replacing any at the same address.
    pub fn add_instruction(&mut self, instruction: Instruction) {
        let _ = self.instructions.insert(instruction.address, instruction);
    }

    /// Records a detected function.
    pub fn add_function(&mut self, function: Function) {
        let _ = self.functions.insert(function.address, function);
    }

    /// Appends a cross reference.
    pub fn add_cross_reference(&mut self, xref: CrossReference) {
        self.cross_references.push(xref);
    }

    /// Appends an extracted string.
    pub fn add_string(&mut self, address: Address, text: impl Into<String>) {
        self.strings.push(ExtractedString {
            address,
            text: text.into(),
        });
    }

    /// Stores the pseudocode for the function at `address`.
    pub fn set_pseudocode(&mut self, address: Address, code: String) {
        let _ = self.pseudocode.insert(address, code);
    }

    /// Freezes the context into its serializable result.
    #[must_use]
    pub fn into_result(self) -> AnalysisResult {
        AnalysisResult {
            binary_sha256: self.binary.sha256(),
            instructions: self.instructions,
            functions: self.functions,
            cross_references: self.cross_references,
            strings: self.strings,
            pseudocode: self.pseudocode,
        }
    }
}

/// Everything the pipeline learned about one binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Hash of the analysed bytes.
    pub binary_sha256: String,
    /// Linear-sweep instructions.
    pub instructions: BTreeMap<Address, Instruction>,
    /// Detected functions.
    pub functions: BTreeMap<Address, Function>,
    /// Call, jump, and data references.
    pub cross_references: Vec<CrossReference>,
    /// Printable strings.
    pub strings: Vec<ExtractedString>,
    /// Pseudocode by function address.
    pub pseudocode: BTreeMap<Address, String>,
}

impl AnalysisResult {
    /// The function starting exactly at `address`.
    #[must_use]
    pub fn function_at(&self, address: Address) -> Option<&Function> {
        self.functions.get(&address)
    }

    /// The function whose span covers `address`, preferring the closest
    /// start at or below it.
    #[must_use]
    pub fn function_containing(&self, address: Address) -> Option<&Function> {
        self.functions
            .range(..=address)
            .rev()
            .map(|(_, f)| f)
            .find(|f| f.address == address || f.contains(address))
    }

    /// The first function with the given name.
    #[must_use]
    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.functions.values().find(|f| f.name == name)
    }

    /// References whose destination is `address`.
    pub fn xrefs_to(&self, address: Address) -> impl Iterator<Item = &CrossReference> {
        self.cross_references.iter().filter(move |x| x.to == address)
    }

    /// References made by the instruction at `address`.
    pub fn xrefs_from(&self, address: Address) -> impl Iterator<Item = &CrossReference> {
        self.cross_references.iter().filter(move |x| x.from == address)
    }

    /// Pseudocode for the function at `address`.
    #[must_use]
    pub fn pseudocode_for(&self, address: Address) -> Option<&str> {
        self.pseudocode.get(&address).map(String::as_str)
    }
}

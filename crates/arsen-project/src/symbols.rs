//! Symbol naming over a project's symbol map.

use std::collections::BTreeMap;

use arsen_analysis::context::AnalysisResult;
use arsen_analysis::events::{EventBus, EventKind};
use arsen_common::annotation::{Symbol, SymbolType};
use arsen_common::binary::BinaryFile;
use arsen_common::error::{ArsenError, Result};
use arsen_common::types::Address;

/// Adds, renames, and looks up symbols, announcing changes on the bus.
#[derive(Debug)]
pub struct SymbolTable<'a> {
    symbols: &'a mut BTreeMap<Address, Symbol>,
    events: &'a EventBus,
}

impl<'a> SymbolTable<'a> {
    /// Wraps an existing symbol map.
    pub fn new(symbols: &'a mut BTreeMap<Address, Symbol>, events: &'a EventBus) -> Self {
        Self { symbols, events }
    }

    /// Inserts or replaces the symbol at its address.
    pub fn add(&mut self, symbol: Symbol) {
        tracing::debug!(address = %symbol.address, name = %symbol.name, "symbol added");
        self.events.publish(EventKind::SymbolAdded {
            address: symbol.address,
            name: symbol.name.clone(),
        });
        let _ = self.symbols.insert(symbol.address, symbol);
    }

    /// Renames the symbol at `address`.
    ///
    /// # Errors
    ///
    /// Returns `ArsenError::NotFound` if no symbol exists there.
    pub fn rename(&mut self, address: Address, new_name: impl Into<String>) -> Result<()> {
        let symbol = self
            .symbols
            .get_mut(&address)
            .ok_or_else(|| ArsenError::NotFound {
                kind: "symbol",
                id: address.to_string(),
            })?;
        symbol.name = new_name.into();
        tracing::info!(%address, name = %symbol.name, "symbol renamed");
        self.events.publish(EventKind::SymbolRenamed {
            address,
            name: symbol.name.clone(),
        });
        Ok(())
    }

    /// The symbol at `address`.
    #[must_use]
    pub fn get(&self, address: Address) -> Option<&Symbol> {
        self.symbols.get(&address)
    }

    /// Every symbol in address order.
    pub fn all(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    /// Seeds export, import, and function symbols. Addresses that already
    /// carry a symbol keep it. Returns the number added.
    pub fn import_from(&mut self, binary: &BinaryFile, analysis: &AnalysisResult) -> usize {
        let exports = binary
            .exports
            .iter()
            .map(|e| Symbol::new(e.address, e.name.clone(), SymbolType::Export));
        let imports = binary
            .imports
            .iter()
            .filter(|i| i.address != Address::default())
            .map(|i| Symbol::new(i.address, i.name.clone(), SymbolType::Import));
        let functions = analysis
            .functions
            .values()
            .map(|f| Symbol::new(f.address, f.name.clone(), SymbolType::Function));

        let mut added = 0;
        for symbol in exports.chain(imports).chain(functions) {
            if let std::collections::btree_map::Entry::Vacant(slot) =
                self.symbols.entry(symbol.address)
            {
                let _ = slot.insert(symbol);
                added += 1;
            }
        }
        tracing::info!(added, total = self.symbols.len(), "symbols imported from analysis");
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arsen_common::binary::{Export, Import};
    use arsen_common::disassembly::Function;
    use arsen_common::types::{Architecture, BinaryFormat, Endianness};

    fn a(v: u64) -> Address {
        Address::new(v)
    }

    #[test]
    fn add_and_rename_publish_events() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let mut map = BTreeMap::new();
        let mut table = SymbolTable::new(&mut map, &events);

        table.add(Symbol::new(a(0x10), "start", SymbolType::Label));
        table.rename(a(0x10), "entry").expect("rename");
        assert_eq!(table.get(a(0x10)).map(|s| s.name.as_str()), Some("entry"));
        assert_eq!(table.all().count(), 1);

        let kinds: Vec<EventKind> = rx.drain().into_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            [
                EventKind::SymbolAdded {
                    address: a(0x10),
                    name: "start".into()
                },
                EventKind::SymbolRenamed {
                    address: a(0x10),
                    name: "entry".into()
                },
            ]
        );
    }

    #[test]
    fn rename_unknown_is_not_found() {
        let events = EventBus::new();
        let mut map = BTreeMap::new();
        let mut table = SymbolTable::new(&mut map, &events);
        let err = table.rename(a(0x99), "x").expect_err("missing");
        assert!(matches!(err, ArsenError::NotFound { kind: "symbol", .. }));
    }

    #[test]
    fn import_keeps_existing_names() {
        let binary = BinaryFile {
            path: "t.bin".into(),
            format: BinaryFormat::Pe,
            architecture: Architecture::X86,
            endianness: Endianness::Little,
            bitness: 32,
            entry_point: a(0x1000),
            sections: Vec::new(),
            imports: vec![
                Import {
                    library: "KERNEL32.dll".into(),
                    name: "ExitProcess".into(),
                    address: a(0x3000),
                    ordinal: 0,
                },
                Import {
                    library: "KERNEL32.dll".into(),
                    name: "Unbound".into(),
                    address: Address::default(),
                    ordinal: 0,
                },
            ],
            exports: vec![Export {
                name: "DllMain".into(),
                address: a(0x1000),
                ordinal: 1,
            }],
            raw_data: Vec::new(),
        };
        let mut analysis = AnalysisResult::default();
        for addr in [0x1000, 0x1100, 0x1200] {
            let _ = analysis.functions.insert(a(addr), Function::new(a(addr)));
        }

        let events = EventBus::new();
        let mut map = BTreeMap::new();
        let _ = map.insert(a(0x1100), Symbol::new(a(0x1100), "parse_args", SymbolType::Function));
        let mut table = SymbolTable::new(&mut map, &events);

        assert_eq!(table.import_from(&binary, &analysis), 3);
        assert_eq!(table.get(a(0x1000)).map(|s| s.kind), Some(SymbolType::Export));
        assert_eq!(table.get(a(0x1100)).map(|s| s.name.as_str()), Some("parse_args"));
        assert_eq!(
            table.get(a(0x1200)).map(|s| s.name.as_str()),
            Some("SUB_0000000000001200")
        );
        assert_eq!(table.get(a(0x3000)).map(|s| s.kind), Some(SymbolType::Import));
        assert_eq!(table.import_from(&binary, &analysis), 0);
    }
}

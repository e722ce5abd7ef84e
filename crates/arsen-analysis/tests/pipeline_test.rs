//! End-to-end run of the default pipeline over a small x86-64 image.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;

use arsen_analysis::search::{SearchQuery, SearchService, parse_pattern};
use arsen_analysis::{AnalysisEngine, ControlFlowGraph, EventBus, EventKind};
use arsen_common::binary::{BinaryFile, Export, Section};
use arsen_common::config::ArsenConfig;
use arsen_common::disassembly::XRefType;
use arsen_common::types::{Address, Architecture, BinaryFormat, Endianness, Permissions};

const TEXT: [u8; 41] = [
    0x55, // 401000 push rbp
    0x48, 0x89, 0xE5, // 401001 mov rbp, rsp
    0x89, 0x7D, 0xFC, // 401004 mov [rbp-0x4], edi
    0x83, 0x7D, 0xFC, 0x00, // 401007 cmp [rbp-0x4], 0
    0x74, 0x07, // 40100B je 401014
    0xE8, 0x0E, 0x00, 0x00, 0x00, // 40100D call 401020
    0xEB, 0x05, // 401012 jmp 401019
    0xB8, 0x01, 0x00, 0x00, 0x00, // 401014 mov eax, 1
    0x8B, 0x05, 0xE1, 0x0F, 0x00, 0x00, // 401019 mov eax, [rip+0xFE1]
    0xC3, // 40101F ret
    0x31, 0xC0, // 401020 xor eax, eax
    0x89, 0x05, 0xDC, 0x0F, 0x00, 0x00, // 401022 mov [rip+0xFDC], eax
    0xC3, // 401028 ret
];

const DATA: &[u8] = b"Hello, world\0ab\0tail";

fn a(v: u64) -> Address {
    Address::new(v)
}

fn section(name: &str, va: u64, offset: u64, data: &[u8], permissions: Permissions) -> Section {
    Section {
        name: name.into(),
        virtual_address: a(va),
        virtual_size: data.len() as u64,
        file_offset: offset,
        raw_size: data.len() as u64,
        raw_flags: 0,
        permissions,
        data: data.to_vec(),
    }
}

fn image() -> BinaryFile {
    let mut raw = vec![0u8; 0x200];
    raw[0x100..0x100 + TEXT.len()].copy_from_slice(&TEXT);
    raw.extend_from_slice(DATA);
    BinaryFile {
        path: PathBuf::from("sample.elf"),
        format: BinaryFormat::Elf,
        architecture: Architecture::X86_64,
        endianness: Endianness::Little,
        bitness: 64,
        entry_point: a(0x40_1000),
        sections: vec![
            section(".text", 0x40_1000, 0x100, &TEXT, Permissions::CODE),
            section(".data", 0x40_2000, 0x200, DATA, Permissions::DATA),
        ],
        imports: Vec::new(),
        exports: vec![Export {
            name: "helper".into(),
            address: a(0x40_1020),
            ordinal: 0,
        }],
        raw_data: raw,
    }
}

#[test]
fn functions_and_blocks() {
    let engine = AnalysisEngine::new(&ArsenConfig::default(), EventBus::new());
    let result = engine.analyze(Arc::new(image()));

    assert_eq!(result.functions.len(), 2);
    let main = result.function_at(a(0x40_1000)).expect("main");
    assert_eq!(main.name, "SUB_0000000000401000");
    assert_eq!(main.size, 0x20);
    assert_eq!(main.basic_blocks.len(), 4);
    assert_eq!(main.callees, [a(0x40_1020)]);

    let helper = result.function_by_name("helper").expect("helper");
    assert_eq!(helper.address, a(0x40_1020));
    assert_eq!(helper.size, 9);
    assert_eq!(helper.callers, [a(0x40_1000)]);

    assert_eq!(
        result.function_containing(a(0x40_1019)).map(|f| f.address),
        Some(a(0x40_1000))
    );

    let cfg = ControlFlowGraph::build(main);
    assert_eq!(cfg.edge_count(), 4);
    assert!(cfg.back_edges().is_empty());
    assert_eq!(
        cfg.levels(),
        vec![
            vec![a(0x40_1000)],
            vec![a(0x40_100D), a(0x40_1014)],
            vec![a(0x40_1019)],
        ]
    );
}

#[test]
fn cross_references() {
    let engine = AnalysisEngine::new(&ArsenConfig::default(), EventBus::new());
    let result = engine.analyze(Arc::new(image()));

    let got: Vec<(u64, u64, XRefType)> = result
        .cross_references
        .iter()
        .map(|x| (x.from.value(), x.to.value(), x.kind))
        .collect();
    assert_eq!(
        got,
        [
            (0x40_100B, 0x40_1014, XRefType::Jump),
            (0x40_100D, 0x40_1020, XRefType::Call),
            (0x40_1012, 0x40_1019, XRefType::Jump),
            (0x40_1019, 0x40_2000, XRefType::DataRead),
            (0x40_1022, 0x40_2004, XRefType::DataWrite),
        ]
    );
    assert_eq!(result.xrefs_to(a(0x40_1020)).count(), 1);
}

#[test]
fn strings_include_trailing_run() {
    let engine = AnalysisEngine::new(&ArsenConfig::default(), EventBus::new());
    let result = engine.analyze(Arc::new(image()));

    let strings: Vec<(u64, &str)> = result
        .strings
        .iter()
        .map(|s| (s.address.value(), s.text.as_str()))
        .collect();
    assert_eq!(strings, [(0x40_2000, "Hello, world"), (0x40_2010, "tail")]);
}

#[test]
fn pseudocode_for_main() {
    let engine = AnalysisEngine::new(&ArsenConfig::default(), EventBus::new());
    let result = engine.analyze(Arc::new(image()));

    let expected = "\
int SUB_0000000000401000()
{
    int local_0;
    int mem_1;
    int r_eax;
    int r_edi;
    int r_rbp;
    int r_rsp;

    r_rbp = r_rsp;
    local_0 = r_edi;
    if (local_0 == 0)
    {
        r_eax = 1;
    }
    else
    {
        helper();
    }
    r_eax = mem_1;
    return;
}";
    assert_eq!(result.pseudocode_for(a(0x40_1000)), Some(expected));
    let helper = result.pseudocode_for(a(0x40_1020)).expect("helper pseudocode");
    assert!(helper.starts_with("int helper()"));
    assert!(helper.contains("    r_eax = 0;\n    mem_0 = r_eax;\n    return;\n"));
}

#[test]
fn events_and_cache() {
    let events = EventBus::new();
    let mut rx = events.subscribe();
    let engine = AnalysisEngine::new(&ArsenConfig::default(), events);

    let first = engine.analyze(Arc::new(image()));
    let seen = rx.drain();
    assert_eq!(
        seen.first().map(|e| &e.kind),
        Some(&EventKind::AnalysisStarted {
            path: PathBuf::from("sample.elf")
        })
    );
    let progress: Vec<u8> = seen
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::AnalysisProgress { percent } => Some(percent),
            _ => None,
        })
        .collect();
    assert_eq!(progress, [20, 40, 60, 80, 100]);
    assert!(seen
        .iter()
        .any(|e| e.kind == EventKind::PseudocodeGenerated { count: 2 }));
    assert_eq!(
        seen.last().map(|e| &e.kind),
        Some(&EventKind::AnalysisCompleted { functions: 2 })
    );

    let second = engine.analyze(Arc::new(image()));
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(rx.drain().len(), 1);
}

#[test]
fn search_maps_file_offsets() {
    let binary = image();
    let pattern = parse_pattern("8B 05 ?? 0F 00 00").expect("pattern");
    let hits = SearchService::new().search_binary(&binary, &SearchQuery::Pattern(pattern));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].matched.offset, 0x119);
    assert_eq!(hits[0].address, Some(a(0x40_1019)));

    let text = SearchService::new().search_binary(&binary, &SearchQuery::Text("tail".into()));
    assert_eq!(text[0].address, Some(a(0x40_2010)));
}

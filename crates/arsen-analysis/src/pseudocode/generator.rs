//! C-like rendering of a function.
//!
//! Registers, stack slots and memory operands become variables, data-moving
//! instructions become assignments, and the block graph is folded into
//! `if`/`else`, `do`/`while` and `while (true)` regions. Every block is
//! emitted exactly once.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::Write as _;

use arsen_common::disassembly::{
    BasicBlock, Function, Instruction, InstructionType, Operand, OperandType, default_function_name,
};
use arsen_common::error::{ArsenError, Result};
use arsen_common::types::Address;

use crate::cfg::ControlFlowGraph;

/// Nesting depth past which structuring gives up.
const MAX_NESTING: usize = 512;

/// Supplies display names for call targets and functions.
pub trait NameResolver: Send + Sync {
    /// The name for `address`, if known.
    fn resolve(&self, address: Address) -> Option<String>;
}

/// A resolver that knows no names.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNames;

impl NameResolver for NoNames {
    fn resolve(&self, _address: Address) -> Option<String> {
        None
    }
}

impl NameResolver for BTreeMap<Address, String> {
    fn resolve(&self, address: Address) -> Option<String> {
        self.get(&address).cloned()
    }
}

impl NameResolver for HashMap<Address, String> {
    fn resolve(&self, address: Address) -> Option<String> {
        self.get(&address).cloned()
    }
}

/// Renders functions as pseudocode.
#[derive(Debug, Clone, Copy)]
pub struct PseudocodeGenerator {
    indent: usize,
}

impl Default for PseudocodeGenerator {
    fn default() -> Self {
        Self { indent: 4 }
    }
}

impl PseudocodeGenerator {
    /// Generator with four-space indentation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders `function`. Never fails: if the block graph cannot be
    /// structured the fallback body is returned instead.
    #[must_use]
    pub fn generate(&self, function: &Function, names: &dyn NameResolver) -> String {
        let name = function_name(function, names);
        match self.render(function, &name, names) {
            Ok(code) => code,
            Err(err) => {
                tracing::warn!(
                    function = %function.address,
                    error = %err,
                    "pseudocode structuring failed, emitting fallback"
                );
                self.fallback(&name)
            }
        }
    }

    fn render(&self, function: &Function, name: &str, names: &dyn NameResolver) -> Result<String> {
        if function.basic_blocks.is_empty() {
            return Ok(format!("int {name}()\n{{\n}}"));
        }

        let cfg = ControlFlowGraph::build(function);
        let mut vars = Variables::default();
        for insn in cfg.blocks().flat_map(|b| b.instructions.iter()) {
            for op in &insn.operands {
                let _ = vars.expression(op);
            }
        }

        let region = Structurer::new(&cfg).build()?;

        let mut out = Writer {
            out: format!("int {name}()\n{{\n"),
            depth: 1,
            indent: self.indent,
        };
        let locals = vars.declared();
        for local in &locals {
            out.line(&format!("int {local};"));
        }
        if !locals.is_empty() {
            out.out.push('\n');
        }

        let mut emitter = Emitter {
            cfg: &cfg,
            vars,
            names,
            out,
        };
        emitter.region(&region);
        let mut code = emitter.out.out;
        code.push('}');
        Ok(code)
    }

    fn fallback(&self, name: &str) -> String {
        let pad = " ".repeat(self.indent);
        format!("int {name}()\n{{\n{pad}while (true)\n{pad}{{\n{pad}{pad}break;\n{pad}}}\n}}")
    }
}

fn function_name(function: &Function, names: &dyn NameResolver) -> String {
    names
        .resolve(function.address)
        .or_else(|| (!function.has_default_name()).then(|| function.name.clone()))
        .unwrap_or_else(|| default_function_name(function.address))
}

fn immediate(value: i64) -> String {
    if value < 10 {
        value.to_string()
    } else {
        format!("0x{value:X}")
    }
}

/// Variable names in first-use order. Stack and memory slots share one
/// counter.
#[derive(Debug, Default)]
struct Variables {
    registers: HashMap<String, String>,
    stack: HashMap<i64, String>,
    memory: HashMap<(String, i64), String>,
    next: usize,
}

impl Variables {
    fn expression(&mut self, op: &Operand) -> String {
        match op.kind {
            OperandType::Register => {
                let key = op.text.to_ascii_lowercase();
                self.registers
                    .entry(key)
                    .or_insert_with_key(|k| format!("r_{k}"))
                    .clone()
            }
            OperandType::Immediate => immediate(op.value),
            OperandType::Displacement => {
                if let Some(name) = self.stack.get(&op.value) {
                    return name.clone();
                }
                let name = format!("local_{}", self.bump());
                let _ = self.stack.insert(op.value, name.clone());
                name
            }
            OperandType::Memory => {
                let key = (op.text.clone(), op.value);
                if let Some(name) = self.memory.get(&key) {
                    return name.clone();
                }
                let name = format!("mem_{}", self.bump());
                let _ = self.memory.insert(key, name.clone());
                name
            }
        }
    }

    fn bump(&mut self) -> usize {
        let n = self.next;
        self.next += 1;
        n
    }

    fn declared(&self) -> Vec<String> {
        let all: BTreeSet<&String> = self
            .registers
            .values()
            .chain(self.stack.values())
            .chain(self.memory.values())
            .collect();
        all.into_iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Unknown,
}

impl Relation {
    fn of(mnemonic: &str) -> Self {
        match mnemonic {
            "je" | "jz" | "beq" | "b.eq" | "cbz" => Self::Eq,
            "jne" | "jnz" | "bne" | "b.ne" | "cbnz" => Self::Ne,
            "jg" | "ja" | "bgt" | "b.gt" | "b.hi" => Self::Gt,
            "jl" | "jb" | "blt" | "b.lt" | "b.lo" => Self::Lt,
            "jge" | "jae" | "bge" | "b.ge" | "b.hs" => Self::Ge,
            "jle" | "jbe" | "ble" | "b.le" | "b.ls" => Self::Le,
            _ => Self::Unknown,
        }
    }

    const fn negate(self) -> Self {
        match self {
            Self::Eq => Self::Ne,
            Self::Ne => Self::Eq,
            Self::Gt => Self::Le,
            Self::Le => Self::Gt,
            Self::Lt => Self::Ge,
            Self::Ge => Self::Lt,
            Self::Unknown => Self::Unknown,
        }
    }

    const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Unknown => "?",
        }
    }
}

#[derive(Debug, Clone)]
enum Operands {
    Compare(Operand, Operand),
    Test(Operand, Operand),
    Zero(Operand),
    Placeholder,
}

/// The condition under which a block's conditional jump is taken.
#[derive(Debug, Clone)]
struct Condition {
    relation: Relation,
    operands: Operands,
    negated: bool,
}

impl Condition {
    fn of(block: &BasicBlock) -> Self {
        let Some(branch) = block.last() else {
            return Self {
                relation: Relation::Unknown,
                operands: Operands::Placeholder,
                negated: false,
            };
        };
        let relation = Relation::of(&branch.mnemonic.to_ascii_lowercase());

        let registers: Vec<&Operand> = branch
            .operands
            .iter()
            .filter(|o| o.kind == OperandType::Register)
            .collect();
        let operands = match registers.as_slice() {
            [a, b, ..] => Operands::Compare((*a).clone(), (*b).clone()),
            [a] => Operands::Zero((*a).clone()),
            [] => block
                .instructions
                .iter()
                .rev()
                .find_map(comparison)
                .unwrap_or(Operands::Placeholder),
        };

        Self {
            relation,
            operands,
            negated: false,
        }
    }

    fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    fn render(&self, vars: &mut Variables) -> String {
        if self.relation == Relation::Unknown {
            return if self.negated {
                "!(condition)".into()
            } else {
                "condition".into()
            };
        }
        let relation = if self.negated {
            self.relation.negate()
        } else {
            self.relation
        };
        let op = relation.symbol();
        match &self.operands {
            Operands::Compare(a, b) => {
                let a = vars.expression(a);
                let b = vars.expression(b);
                format!("{a} {op} {b}")
            }
            Operands::Test(a, b) => {
                let a = vars.expression(a);
                let b = vars.expression(b);
                format!("({a} & {b}) {op} 0")
            }
            Operands::Zero(a) => {
                let a = vars.expression(a);
                format!("{a} {op} 0")
            }
            Operands::Placeholder if matches!(relation, Relation::Eq | Relation::Ne) => {
                format!("v1 {op} 0")
            }
            Operands::Placeholder => format!("v1 {op} v2"),
        }
    }
}

fn comparison(insn: &Instruction) -> Option<Operands> {
    let mnemonic = insn.mnemonic.to_ascii_lowercase();
    let [a, b] = insn.operands.as_slice() else {
        return None;
    };
    if mnemonic.starts_with("cmp") {
        Some(Operands::Compare(a.clone(), b.clone()))
    } else if mnemonic.starts_with("test") {
        if a.kind == b.kind && a.text.eq_ignore_ascii_case(&b.text) {
            Some(Operands::Zero(a.clone()))
        } else {
            Some(Operands::Test(a.clone(), b.clone()))
        }
    } else {
        None
    }
}

#[derive(Debug)]
enum Region {
    Block(Address),
    Sequence(Vec<Region>),
    IfThen {
        condition: Condition,
        body: Box<Region>,
    },
    IfElse {
        condition: Condition,
        then: Box<Region>,
        otherwise: Box<Region>,
    },
    DoWhile {
        condition: Condition,
        body: Box<Region>,
    },
    Forever {
        body: Box<Region>,
    },
}

/// Folds the block graph into nested regions.
struct Structurer<'a> {
    cfg: &'a ControlFlowGraph,
    back_edges: Vec<(Address, Address)>,
    processed: HashSet<Address>,
}

impl<'a> Structurer<'a> {
    fn new(cfg: &'a ControlFlowGraph) -> Self {
        Self {
            cfg,
            back_edges: cfg.back_edges(),
            processed: HashSet::new(),
        }
    }

    fn build(mut self) -> Result<Region> {
        let scope: BTreeSet<Address> = self.cfg.blocks().map(|b| b.start).collect();
        self.sequence(&scope, None, 0)
    }

    fn sequence(
        &mut self,
        scope: &BTreeSet<Address>,
        suppressed: Option<Address>,
        depth: usize,
    ) -> Result<Region> {
        let mut children = Vec::new();
        for &addr in scope {
            if let Some(region) = self.structure(addr, scope, suppressed, depth)? {
                children.push(region);
            }
        }
        Ok(Region::Sequence(children))
    }

    fn latch(&self, header: Address, scope: &BTreeSet<Address>) -> Option<Address> {
        self.back_edges
            .iter()
            .filter(|&&(latch, h)| h == header && latch >= header && scope.contains(&latch))
            .map(|&(latch, _)| latch)
            .max()
    }

    fn structure(
        &mut self,
        addr: Address,
        scope: &BTreeSet<Address>,
        suppressed: Option<Address>,
        depth: usize,
    ) -> Result<Option<Region>> {
        if depth > MAX_NESTING {
            return Err(ArsenError::Unsupported {
                message: format!("control flow nested deeper than {MAX_NESTING} regions"),
            });
        }
        if self.processed.contains(&addr) || !scope.contains(&addr) {
            return Ok(None);
        }
        let cfg = self.cfg;
        let Some(block) = cfg.block(addr) else {
            return Ok(None);
        };

        if suppressed != Some(addr) {
            if let Some(latch) = self.latch(addr, scope) {
                let body_scope: BTreeSet<Address> = scope.range(addr..=latch).copied().collect();
                let body = Box::new(self.sequence(&body_scope, Some(addr), depth + 1)?);
                let latch_block = cfg.block(latch);
                let branch = latch_block
                    .and_then(BasicBlock::last)
                    .filter(|i| i.kind == InstructionType::ConditionalJump);
                let region = match (latch_block, branch) {
                    (Some(latch_block), Some(insn)) => {
                        let condition = Condition::of(latch_block);
                        let condition = if insn.target == Some(addr) {
                            condition
                        } else {
                            condition.negate()
                        };
                        Region::DoWhile { condition, body }
                    }
                    _ => Region::Forever { body },
                };
                return Ok(Some(region));
            }
        }

        let _ = self.processed.insert(addr);
        let successors = cfg.successors(addr);

        match successors.as_slice() {
            [next] => {
                if cfg.predecessors(*next) == [addr] && scope.contains(next) {
                    let mut seq = vec![Region::Block(addr)];
                    if let Some(rest) = self.structure(*next, scope, suppressed, depth + 1)? {
                        seq.push(rest);
                    }
                    return Ok(Some(Region::Sequence(seq)));
                }
                Ok(Some(Region::Block(addr)))
            }
            [_, _] => {
                let branch = block.last().filter(|i| i.kind == InstructionType::ConditionalJump);
                let Some(taken) = branch
                    .and_then(|i| i.target)
                    .filter(|t| successors.contains(t))
                else {
                    return Ok(Some(Region::Block(addr)));
                };
                let Some(&fall) = successors.iter().find(|&&s| s != taken) else {
                    return Ok(Some(Region::Block(addr)));
                };
                let condition = Condition::of(block);
                let mut seq = vec![Region::Block(addr)];

                if cfg.successors(fall) == [taken] {
                    if let Some(body) = self.structure(fall, scope, suppressed, depth + 1)? {
                        seq.push(Region::IfThen {
                            condition: condition.negate(),
                            body: Box::new(body),
                        });
                    }
                    return Ok(Some(Region::Sequence(seq)));
                }

                let then = self.structure(taken, scope, suppressed, depth + 1)?;
                let otherwise = self.structure(fall, scope, suppressed, depth + 1)?;
                match (then, otherwise) {
                    (Some(then), Some(otherwise)) => seq.push(Region::IfElse {
                        condition,
                        then: Box::new(then),
                        otherwise: Box::new(otherwise),
                    }),
                    (Some(then), None) => seq.push(Region::IfThen {
                        condition,
                        body: Box::new(then),
                    }),
                    (None, Some(otherwise)) => seq.push(Region::IfThen {
                        condition: condition.negate(),
                        body: Box::new(otherwise),
                    }),
                    (None, None) => {}
                }
                Ok(Some(Region::Sequence(seq)))
            }
            _ => Ok(Some(Region::Block(addr))),
        }
    }
}

struct Writer {
    out: String,
    depth: usize,
    indent: usize,
}

impl Writer {
    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{:width$}{text}", "", width = self.depth * self.indent);
    }
}

struct Emitter<'a> {
    cfg: &'a ControlFlowGraph,
    vars: Variables,
    names: &'a dyn NameResolver,
    out: Writer,
}

impl Emitter<'_> {
    fn region(&mut self, region: &Region) {
        match region {
            Region::Block(addr) => {
                let cfg = self.cfg;
                let Some(block) = cfg.block(*addr) else {
                    return;
                };
                for insn in &block.instructions {
                    if let Some(stmt) = self.statement(insn) {
                        self.out.line(&stmt);
                    }
                }
            }
            Region::Sequence(children) => {
                for child in children {
                    self.region(child);
                }
            }
            Region::IfThen { condition, body } => {
                let cond = condition.render(&mut self.vars);
                self.out.line(&format!("if ({cond})"));
                self.braced(body);
            }
            Region::IfElse {
                condition,
                then,
                otherwise,
            } => {
                let cond = condition.render(&mut self.vars);
                self.out.line(&format!("if ({cond})"));
                self.braced(then);
                self.out.line("else");
                self.braced(otherwise);
            }
            Region::DoWhile { condition, body } => {
                self.out.line("do");
                self.out.line("{");
                self.out.depth += 1;
                self.region(body);
                self.out.depth -= 1;
                let cond = condition.render(&mut self.vars);
                self.out.line(&format!("}} while ({cond});"));
            }
            Region::Forever { body } => {
                self.out.line("while (true)");
                self.braced(body);
            }
        }
    }

    fn braced(&mut self, body: &Region) {
        self.out.line("{");
        self.out.depth += 1;
        self.region(body);
        self.out.depth -= 1;
        self.out.line("}");
    }

    fn statement(&mut self, insn: &Instruction) -> Option<String> {
        match insn.kind {
            InstructionType::Return => Some(match insn.operands.first() {
                Some(op) => format!("return {};", self.vars.expression(op)),
                None => "return;".to_string(),
            }),
            InstructionType::Call => Some(format!("{}();", self.callee(insn))),
            InstructionType::Nop | InstructionType::Jump | InstructionType::ConditionalJump => None,
            InstructionType::Normal | InstructionType::Invalid => {
                self.assignment(insn).map(|s| format!("{s};"))
            }
        }
    }

    fn callee(&mut self, insn: &Instruction) -> String {
        if let Some(target) = insn.target {
            return self
                .names
                .resolve(target)
                .unwrap_or_else(|| default_function_name(target));
        }
        match insn.operands.first() {
            Some(op) => self.vars.expression(op),
            None => "unknown_call".to_string(),
        }
    }

    fn assignment(&mut self, insn: &Instruction) -> Option<String> {
        let m = insn.mnemonic.to_ascii_lowercase();
        match insn.operands.as_slice() {
            [d, s] => {
                let is = |p: &str| m.starts_with(p);
                if is("xor")
                    && d.kind == OperandType::Register
                    && s.kind == OperandType::Register
                    && d.text.eq_ignore_ascii_case(&s.text)
                {
                    let d = self.vars.expression(d);
                    return Some(format!("{d} = 0"));
                }
                let dst = self.vars.expression(d);
                let src = self.vars.expression(s);
                if is("mov") {
                    Some(format!("{dst} = {src}"))
                } else if is("lea") {
                    Some(format!("{dst} = &({src})"))
                } else if let Some(op) = binary_operator(&m) {
                    Some(format!("{dst} = {dst} {op} {src}"))
                } else if is("str") {
                    Some(format!("*({dst}) = {src}"))
                } else if is("ldr") {
                    Some(format!("{dst} = *({src})"))
                } else {
                    None
                }
            }
            [d] => {
                let is = |p: &str| m.starts_with(p);
                if !["inc", "dec", "neg", "not", "pop"].iter().any(|p| is(p)) {
                    return None;
                }
                let dst = self.vars.expression(d);
                if is("inc") {
                    Some(format!("{dst} = {dst} + 1"))
                } else if is("dec") {
                    Some(format!("{dst} = {dst} - 1"))
                } else if is("neg") {
                    Some(format!("{dst} = -{dst}"))
                } else if is("not") {
                    Some(format!("{dst} = ~{dst}"))
                } else {
                    Some(format!("{dst} = stack_pop()"))
                }
            }
            _ => None,
        }
    }
}

fn binary_operator(mnemonic: &str) -> Option<&'static str> {
    const TABLE: [(&str, &str); 11] = [
        ("add", "+"),
        ("sub", "-"),
        ("mul", "*"),
        ("imul", "*"),
        ("and", "&"),
        ("or", "|"),
        ("xor", "^"),
        ("shl", "<<"),
        ("sal", "<<"),
        ("shr", ">>"),
        ("sar", ">>"),
    ];
    TABLE
        .iter()
        .find(|(prefix, _)| mnemonic.starts_with(prefix))
        .map(|&(_, op)| op)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg(name: &str) -> Operand {
        Operand::register(name)
    }

    fn imm(v: i64) -> Operand {
        Operand::immediate(v)
    }

    fn insn(addr: u64, mnemonic: &str, kind: InstructionType, ops: Vec<Operand>) -> Instruction {
        let mut i = Instruction::new(Address::new(addr), vec![0; 2], mnemonic, kind);
        i.operands = ops;
        i
    }

    fn branch(addr: u64, mnemonic: &str, kind: InstructionType, target: u64) -> Instruction {
        Instruction::new(Address::new(addr), vec![0; 2], mnemonic, kind).with_target(Address::new(target))
    }

    fn block(start: u64, instructions: Vec<Instruction>, succs: &[u64]) -> BasicBlock {
        let start = Address::new(start);
        let end = instructions.last().map_or(start, |i| i.address);
        BasicBlock {
            start,
            end,
            instructions,
            successors: succs.iter().copied().map(Address::new).collect(),
            predecessors: Vec::new(),
        }
    }

    fn function(blocks: Vec<BasicBlock>) -> Function {
        let mut f = Function::new(blocks.first().map_or(Address::new(0x1000), |b| b.start));
        f.basic_blocks = blocks;
        f
    }

    fn render(f: &Function) -> String {
        PseudocodeGenerator::new().generate(f, &NoNames)
    }

    fn ret(addr: u64) -> Instruction {
        insn(addr, "ret", InstructionType::Return, vec![])
    }

    #[test]
    fn empty_function() {
        let f = Function::new(Address::new(0x1000));
        assert_eq!(render(&f), "int SUB_0000000000001000()\n{\n}");
    }

    #[test]
    fn straight_line_assignments() {
        let f = function(vec![block(
            0x1000,
            vec![
                insn(0x1000, "push", InstructionType::Normal, vec![reg("rbp")]),
                insn(0x1002, "mov", InstructionType::Normal, vec![reg("EAX"), imm(5)]),
                insn(0x1004, "add", InstructionType::Normal, vec![reg("eax"), imm(0x20)]),
                insn(0x1006, "xor", InstructionType::Normal, vec![reg("ecx"), reg("ecx")]),
                insn(0x1008, "nop", InstructionType::Nop, vec![]),
                ret(0x100A),
            ],
            &[],
        )]);
        let expected = "int SUB_0000000000001000()\n{\n    int r_eax;\n    int r_ecx;\n    int r_rbp;\n\n    r_eax = 5;\n    r_eax = r_eax + 0x20;\n    r_ecx = 0;\n    return;\n}";
        assert_eq!(render(&f), expected);
    }

    #[test]
    fn stack_and_memory_share_a_counter() {
        let f = function(vec![block(
            0x10,
            vec![
                insn(0x10, "mov", InstructionType::Normal, vec![Operand::displacement("[rbp-0x4]", -4), imm(-1)]),
                insn(0x12, "lea", InstructionType::Normal, vec![reg("rax"), Operand::memory("[rip+0x10]", 0x40)]),
                insn(0x14, "inc", InstructionType::Normal, vec![Operand::displacement("[rbp-0x4]", -4)]),
                insn(0x16, "pop", InstructionType::Normal, vec![reg("rbx")]),
                insn(0x18, "ret", InstructionType::Return, vec![reg("rax")]),
            ],
            &[],
        )]);
        let code = render(&f);
        assert!(code.contains("    int local_0;\n    int mem_1;\n    int r_rax;\n    int r_rbx;\n\n"));
        assert!(code.contains("    local_0 = -1;\n"));
        assert!(code.contains("    r_rax = &(mem_1);\n"));
        assert!(code.contains("    local_0 = local_0 + 1;\n"));
        assert!(code.contains("    r_rbx = stack_pop();\n"));
        assert!(code.contains("    return r_rax;\n}"));
    }

    #[test]
    fn calls_use_resolver_then_default_names() {
        let f = function(vec![block(
            0x10,
            vec![
                branch(0x10, "call", InstructionType::Call, 0x500),
                branch(0x12, "call", InstructionType::Call, 0x600),
                insn(0x14, "call", InstructionType::Call, vec![reg("rax")]),
                insn(0x16, "call", InstructionType::Call, vec![]),
                ret(0x18),
            ],
            &[],
        )]);
        let mut names = BTreeMap::new();
        let _ = names.insert(Address::new(0x500), "puts".to_string());
        let code = PseudocodeGenerator::new().generate(&f, &names);
        assert!(code.contains("    puts();\n"));
        assert!(code.contains("    SUB_0000000000000600();\n"));
        assert!(code.contains("    r_rax();\n"));
        assert!(code.contains("    unknown_call();\n"));
    }

    #[test]
    fn header_prefers_resolver_then_own_name() {
        let mut f = Function::new(Address::new(0x40));
        f.name = "main".into();
        assert!(render(&f).starts_with("int main()"));
        let mut names = HashMap::new();
        let _ = names.insert(Address::new(0x40), "entry".to_string());
        assert!(PseudocodeGenerator::new().generate(&f, &names).starts_with("int entry()"));
    }

    #[test]
    fn if_then_skips_fall_through() {
        let f = function(vec![
            block(
                0x10,
                vec![
                    insn(0x10, "cmp", InstructionType::Normal, vec![reg("eax"), imm(0)]),
                    branch(0x12, "je", InstructionType::ConditionalJump, 0x20),
                ],
                &[0x20, 0x14],
            ),
            block(
                0x14,
                vec![insn(0x14, "mov", InstructionType::Normal, vec![reg("ebx"), imm(1)])],
                &[0x20],
            ),
            block(0x20, vec![ret(0x20)], &[]),
        ]);
        let expected = "int SUB_0000000000000010()\n{\n    int r_eax;\n    int r_ebx;\n\n    if (r_eax != 0)\n    {\n        r_ebx = 1;\n    }\n    return;\n}";
        assert_eq!(render(&f), expected);
    }

    #[test]
    fn diamond_becomes_if_else() {
        let f = function(vec![
            block(
                0x10,
                vec![
                    insn(0x10, "cmp", InstructionType::Normal, vec![reg("eax"), reg("ebx")]),
                    branch(0x12, "jg", InstructionType::ConditionalJump, 0x30),
                ],
                &[0x30, 0x20],
            ),
            block(
                0x20,
                vec![
                    insn(0x20, "mov", InstructionType::Normal, vec![reg("ecx"), imm(1)]),
                    branch(0x22, "jmp", InstructionType::Jump, 0x40),
                ],
                &[0x40],
            ),
            block(
                0x30,
                vec![insn(0x30, "mov", InstructionType::Normal, vec![reg("ecx"), imm(2)])],
                &[0x40],
            ),
            block(0x40, vec![ret(0x40)], &[]),
        ]);
        let code = render(&f);
        let body = "    if (r_eax > r_ebx)\n    {\n        r_ecx = 2;\n    }\n    else\n    {\n        r_ecx = 1;\n    }\n    return;\n}";
        assert!(code.ends_with(body), "{code}");
    }

    #[test]
    fn self_loop_becomes_do_while() {
        let f = function(vec![
            block(
                0x10,
                vec![
                    insn(0x10, "inc", InstructionType::Normal, vec![reg("ecx")]),
                    insn(0x12, "cmp", InstructionType::Normal, vec![reg("ecx"), imm(10)]),
                    branch(0x14, "jl", InstructionType::ConditionalJump, 0x10),
                ],
                &[0x10, 0x16],
            ),
            block(0x16, vec![ret(0x16)], &[]),
        ]);
        let expected = "int SUB_0000000000000010()\n{\n    int r_ecx;\n\n    do\n    {\n        r_ecx = r_ecx + 1;\n    } while (r_ecx < 0xA);\n    return;\n}";
        assert_eq!(render(&f), expected);
    }

    #[test]
    fn unconditional_back_edge_becomes_while_true() {
        let f = function(vec![block(
            0x10,
            vec![
                branch(0x10, "call", InstructionType::Call, 0x500),
                branch(0x12, "jmp", InstructionType::Jump, 0x10),
            ],
            &[0x10],
        )]);
        let expected = "int SUB_0000000000000010()\n{\n    while (true)\n    {\n        SUB_0000000000000500();\n    }\n}";
        assert_eq!(render(&f), expected);
    }

    #[test]
    fn exact_mnemonics_pick_the_relation() {
        let cond = |m: &str| {
            let b = block(0x10, vec![branch(0x10, m, InstructionType::ConditionalJump, 0x20)], &[]);
            Condition::of(&b).render(&mut Variables::default())
        };
        assert_eq!(cond("jge"), "v1 >= v2");
        assert_eq!(cond("jg"), "v1 > v2");
        assert_eq!(cond("jnz"), "v1 != 0");
        assert_eq!(cond("b.ls"), "v1 <= v2");
        assert_eq!(cond("jo"), "condition");
        let b = block(0x10, vec![branch(0x10, "jo", InstructionType::ConditionalJump, 0x20)], &[]);
        assert_eq!(Condition::of(&b).negate().render(&mut Variables::default()), "!(condition)");
    }

    #[test]
    fn branch_registers_and_test_operands() {
        let mut vars = Variables::default();
        let beq = block(
            0x10,
            vec![
                insn(0x10, "beq", InstructionType::ConditionalJump, vec![reg("a0"), reg("a1")])
                    .with_target(Address::new(0x20)),
            ],
            &[],
        );
        assert_eq!(Condition::of(&beq).render(&mut vars), "r_a0 == r_a1");

        let cbz = block(
            0x10,
            vec![
                insn(0x10, "cbz", InstructionType::ConditionalJump, vec![reg("x0")])
                    .with_target(Address::new(0x20)),
            ],
            &[],
        );
        assert_eq!(Condition::of(&cbz).negate().render(&mut vars), "r_x0 != 0");

        let test = block(
            0x10,
            vec![
                insn(0x10, "test", InstructionType::Normal, vec![reg("eax"), reg("eax")]),
                branch(0x12, "jle", InstructionType::ConditionalJump, 0x20),
            ],
            &[],
        );
        assert_eq!(Condition::of(&test).negate().render(&mut vars), "r_eax > 0");
    }

    #[test]
    fn immediates_switch_to_hex_at_ten() {
        assert_eq!(immediate(9), "9");
        assert_eq!(immediate(10), "0xA");
        assert_eq!(immediate(-16), "-16");
    }

    #[test]
    fn excessive_nesting_falls_back() {
        let n = MAX_NESTING as u64 + 20;
        let blocks = (0..n)
            .map(|i| {
                let succ = [i + 1];
                let succs: &[u64] = if i + 1 < n { &succ } else { &[] };
                block(
                    i,
                    vec![insn(i, "mov", InstructionType::Normal, vec![reg("eax"), imm(1)])],
                    succs,
                )
            })
            .collect();
        let f = function(blocks);
        let expected = "int SUB_0000000000000000()\n{\n    while (true)\n    {\n        break;\n    }\n}";
        assert_eq!(render(&f), expected);
    }

    #[test]
    fn every_block_emitted_once() {
        let f = function(vec![
            block(
                0x10,
                vec![branch(0x10, "jne", InstructionType::ConditionalJump, 0x30)],
                &[0x30, 0x20],
            ),
            block(
                0x20,
                vec![insn(0x20, "mov", InstructionType::Normal, vec![reg("eax"), imm(1)])],
                &[0x40],
            ),
            block(
                0x30,
                vec![insn(0x30, "mov", InstructionType::Normal, vec![reg("eax"), imm(2)])],
                &[0x50],
            ),
            block(0x40, vec![ret(0x40)], &[]),
            block(0x50, vec![insn(0x50, "mov", InstructionType::Normal, vec![reg("eax"), imm(3)]), ret(0x52)], &[]),
        ]);
        let code = render(&f);
        for needle in ["r_eax = 1;", "r_eax = 2;", "r_eax = 3;"] {
            assert_eq!(code.matches(needle).count(), 1, "{code}");
        }
        assert_eq!(code.matches("return;").count(), 2);
    }
}

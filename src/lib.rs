pub mod ast;
pub mod classgraph;
pub mod config;
pub mod dataflow;
pub mod diagnostic;
pub mod ir;
pub mod lexeme;
pub mod lexer;
pub mod parser;
pub mod semant;
pub mod span;
pub mod types;

use classgraph::ClassGraph;
use diagnostic::Diagnostic;

/// Lex `source` into a token stream. File id `0` is used for single-file
/// invocations; multi-file driving is left to the caller.
pub fn lex(source: &str) -> (Vec<span::Spanned<lexeme::Lexeme>>, Vec<Diagnostic>) {
    lexer::Lexer::new(source, 0).tokenize()
}

/// Lex and parse `source` into an AST.
pub fn parse(source: &str) -> Result<ast::Program, Vec<Diagnostic>> {
    let (tokens, lex_diags) = lex(source);
    if diagnostic::has_fatal(&lex_diags) {
        return Err(lex_diags);
    }
    parser::Parser::new(tokens).parse_program()
}

/// Run the full semantic analyzer (class graph construction, inheritance
/// validation, method/attribute linearization, `Main` validation, and type
/// checking) over a parsed program.
pub fn analyze(program: &ast::Program) -> Result<ClassGraph, Vec<Diagnostic>> {
    semant::analyze(program)
}

/// Lower a type-checked program to three-address code, one `TACMethod` per
/// source method.
pub fn translate(program: &ast::Program, graph: &ClassGraph) -> ir::TACProgram {
    ir::builder::translate_program(program, graph)
}

/// Build the control-flow graph for a single method's TAC listing.
pub fn build_cfg(method: &ir::TACMethod) -> ir::cfg::Cfg {
    ir::cfg::Cfg::build(method)
}

/// Convert a CFG-structured method into minimal SSA form.
pub fn convert_to_ssa(method: &ir::TACMethod, cfg: &ir::cfg::Cfg) -> ir::TACMethod {
    ir::ssa::convert_to_ssa(method, cfg)
}

/// Run sparse conditional constant propagation and fold the result back
/// into the instruction stream. Returns the per-block environments the
/// analysis computed and the number of operands folded.
pub fn run_constant_propagation(
    method: &mut ir::TACMethod,
    cfg: &ir::cfg::Cfg,
) -> (dataflow::constant_prop::ConstantPropResult, usize) {
    dataflow::constant_prop::run(method, cfg)
}

/// Compute the live-in/live-out sets for every block in `cfg`.
pub fn run_liveness(method: &ir::TACMethod, cfg: &ir::cfg::Cfg) -> dataflow::liveness::LivenessResult {
    dataflow::liveness::analyze(method, cfg)
}

/// Remove instructions whose definitions are never live, using a
/// previously computed liveness result.
pub fn run_dead_code_elimination(method: &mut ir::TACMethod, cfg: &ir::cfg::Cfg) -> usize {
    dataflow::liveness::eliminate_dead_code(method, cfg)
}

/// Compute per-variable live ranges from a liveness result.
pub fn compute_live_ranges(
    method: &ir::TACMethod,
    cfg: &ir::cfg::Cfg,
    liveness: &dataflow::liveness::LivenessResult,
) -> dataflow::liveness::LiveRanges {
    dataflow::liveness::compute_live_ranges(method, cfg, liveness)
}

/// Build the interference graph used by a register allocator downstream
/// of this crate.
pub fn build_interference_graph(
    method: &ir::TACMethod,
    cfg: &ir::cfg::Cfg,
    liveness: &dataflow::liveness::LivenessResult,
) -> dataflow::liveness::InterferenceGraph {
    dataflow::liveness::build_interference_graph(method, cfg, liveness)
}

pub mod cfg;
pub mod check;
pub mod constprop;
pub mod lex;
pub mod liveness;
pub mod parse;
pub mod ssa;
pub mod tac;

use std::path::{Path, PathBuf};
use std::process;

use cool_core::classgraph::ClassGraph;
use cool_core::diagnostic::{render_diagnostics, Diagnostic};
use cool_core::{ast, ir};

pub fn read_source(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

fn render_and_exit(diags: &[Diagnostic], filename: &str, source: &str) -> ! {
    render_diagnostics(diags, filename, source);
    process::exit(1);
}

/// Lex, parse, and run semantic analysis on `path`, rendering and
/// exiting on the first stage that reports a fatal diagnostic. Shared
/// by every subcommand past `lex`.
pub fn compile(path: &Path) -> (String, ast::Program, ClassGraph) {
    let source = read_source(path);
    let filename = path.display().to_string();

    let (_, lex_diags) = cool_core::lex(&source);
    if cool_core::diagnostic::has_fatal(&lex_diags) {
        render_and_exit(&lex_diags, &filename, &source);
    }

    let program = match cool_core::parse(&source) {
        Ok(p) => p,
        Err(diags) => render_and_exit(&diags, &filename, &source),
    };

    let graph = match cool_core::analyze(&program) {
        Ok(g) => g,
        Err(diags) => render_and_exit(&diags, &filename, &source),
    };

    (source, program, graph)
}

/// Select one method out of a translated program by `Class.method`,
/// exiting with a helpful message if the selector doesn't resolve.
pub fn select_method<'a>(tac: &'a ir::TACProgram, selector: &str) -> &'a ir::TACMethod {
    let Some((class, method)) = selector.split_once('.') else {
        eprintln!("error: method selector must be 'Class.method', got '{}'", selector);
        process::exit(1);
    };
    match tac.methods.iter().find(|m| m.class_name == class && m.method_name == method) {
        Some(m) => m,
        None => {
            eprintln!("error: no method '{}' found", selector);
            eprintln!("available methods:");
            for m in &tac.methods {
                eprintln!("  {}.{}", m.class_name, m.method_name);
            }
            process::exit(1);
        }
    }
}

/// Shared CLI argument: which `Class.method` a per-method subcommand
/// (`cfg`, `ssa`, `constprop`, `liveness`) should operate on.
#[derive(clap::Args)]
pub struct MethodSelector {
    /// Input .cl source file
    pub input: PathBuf,
    /// Method to inspect, as `Class.method` (e.g. `Main.fib`)
    pub method: String,
}

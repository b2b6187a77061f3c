use std::path::PathBuf;

use clap::Args;

use super::read_source;

#[derive(Args)]
pub struct LexArgs {
    /// Input .cl source file
    pub input: PathBuf,
}

pub fn cmd_lex(args: LexArgs) {
    let source = read_source(&args.input);
    let (tokens, diags) = cool_core::lex(&source);

    for tok in &tokens {
        println!("{:>4}:{:<5} {:?}", tok.span.line, tok.span.start, tok.node);
    }

    if !diags.is_empty() {
        let filename = args.input.display().to_string();
        cool_core::diagnostic::render_diagnostics(&diags, &filename, &source);
        if cool_core::diagnostic::has_fatal(&diags) {
            std::process::exit(1);
        }
    }
}

use crate::span::Span;

/// A compiler diagnostic (error, warning, or hint).
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub message: String,
    pub span: Span,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// The typed error kinds a stage can raise, per the compiler's exposed
/// error taxonomy. Kept distinct from `message` so callers (tests, the
/// CLI) can match on kind instead of parsing rendered text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    // Lexical
    LexError,
    UnterminatedString,
    UnterminatedComment,

    // Syntactic
    SyntaxError,

    // Semantic
    DuplicateClass,
    Cycle,
    BadParent,
    MissingMain,
    MissingMainMethod,
    WrongMainArity,
    BadOverride,
    BadRedeclaration,
    UndefinedVariable,
    UndefinedClass,
    TypeMismatch,
    BadDispatch,
    BadStaticDispatchType,

    /// A violated compiler invariant. Never caused by user input; a stage
    /// surfacing this has found a bug in itself, not in the source.
    InternalError,
}

impl ErrorKind {
    /// Whether this kind aborts the current translation unit immediately,
    /// versus being collected alongside other reports in the same pass.
    pub fn is_fatal(self) -> bool {
        !matches!(
            self,
            ErrorKind::BadParent | ErrorKind::LexError | ErrorKind::SyntaxError
        )
    }
}

impl Diagnostic {
    pub fn error(kind: ErrorKind, message: String, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn warning(kind: ErrorKind, message: String, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    /// Render the diagnostic to stderr using ariadne.
    pub fn render(&self, filename: &str, source: &str) {
        use ariadne::{Color, Label, Report, ReportKind, Source};

        let kind = match self.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        };

        let color = match self.severity {
            Severity::Error => Color::Red,
            Severity::Warning => Color::Yellow,
        };

        let mut report = Report::build(kind, filename, self.span.start as usize)
            .with_message(&self.message)
            .with_label(
                Label::new((filename, self.span.start as usize..self.span.end as usize))
                    .with_message(&self.message)
                    .with_color(color),
            );

        for note in &self.notes {
            report = report.with_note(note);
        }

        if let Some(help) = &self.help {
            report = report.with_help(help);
        }

        report
            .finish()
            .eprint((filename, Source::from(source)))
            .unwrap();
    }
}

/// Render a list of diagnostics.
pub fn render_diagnostics(diagnostics: &[Diagnostic], filename: &str, source: &str) {
    for diag in diagnostics {
        diag.render(filename, source);
    }
}

/// True if any diagnostic in the list is fatal (should abort the unit).
pub fn has_fatal(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.kind.is_fatal())
}

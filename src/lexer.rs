use crate::diagnostic::{Diagnostic, ErrorKind};
use crate::lexeme::Lexeme;
use crate::span::{Span, Spanned};

/// The lexer's three scanning states. COOL's grammar needs more than a
/// single dispatch loop because strings and block comments both contain
/// characters (quotes, stars, parens) that are symbols everywhere else.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Default,
    StringLit,
    Comment,
}

pub struct Lexer<'src> {
    source: &'src [u8],
    file_id: u16,
    pos: usize,
    line: u32,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str, file_id: u16) -> Self {
        Self {
            source: source.as_bytes(),
            file_id,
            pos: 0,
            line: 1,
            diagnostics: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> (Vec<Spanned<Lexeme>>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.node == Lexeme::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn next_token(&mut self) -> Spanned<Lexeme> {
        loop {
            self.skip_whitespace_and_line_comments();

            if self.pos >= self.source.len() {
                return self.make_token(Lexeme::Eof, self.pos, self.pos, self.line);
            }

            let start = self.pos;
            let start_line = self.line;
            let ch = self.source[self.pos];

            if ch == b'(' && self.peek_at(1) == Some(b'*') {
                if self.scan_block_comment() {
                    continue;
                }
                return self.make_token(Lexeme::Eof, self.pos, self.pos, self.line);
            }

            if ch == b'*' && self.peek_at(1) == Some(b')') {
                self.diagnostics.push(Diagnostic::error(
                    ErrorKind::LexError,
                    "unmatched '*)'".to_string(),
                    Span::new(self.file_id, start as u32, (start + 2) as u32, start_line),
                ));
                self.pos += 2;
                continue;
            }

            if ch == b'"' {
                return self.scan_string(start, start_line);
            }

            if is_ident_start(ch) {
                return self.scan_ident_or_keyword(start, start_line);
            }

            if ch.is_ascii_digit() {
                return self.scan_number(start, start_line);
            }

            if let Some(tok) = self.scan_symbol(start, start_line) {
                return tok;
            }
            // scan_symbol already recorded an error; keep scanning.
        }
    }

    fn skip_whitespace_and_line_comments(&mut self) {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                if self.source[self.pos] == b'\n' {
                    self.line += 1;
                }
                self.pos += 1;
            }

            if self.pos + 1 < self.source.len()
                && self.source[self.pos] == b'-'
                && self.source[self.pos + 1] == b'-'
            {
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }

            break;
        }
    }

    /// Scans `(* ... *)`, tracking nesting depth. Returns `false` if the
    /// comment runs off the end of the file without closing.
    fn scan_block_comment(&mut self) -> bool {
        let start = self.pos;
        let start_line = self.line;
        self.pos += 2; // consume "(*"
        let mut depth = 1u32;

        while self.pos < self.source.len() && depth > 0 {
            if self.source[self.pos] == b'(' && self.peek_at(1) == Some(b'*') {
                depth += 1;
                self.pos += 2;
            } else if self.source[self.pos] == b'*' && self.peek_at(1) == Some(b')') {
                depth -= 1;
                self.pos += 2;
            } else {
                if self.source[self.pos] == b'\n' {
                    self.line += 1;
                }
                self.pos += 1;
            }
        }

        if depth > 0 {
            self.diagnostics.push(Diagnostic::error(
                ErrorKind::UnterminatedComment,
                "EOF in comment".to_string(),
                Span::new(self.file_id, start as u32, self.pos as u32, start_line),
            ));
            return false;
        }
        true
    }

    fn scan_string(&mut self, start: usize, start_line: u32) -> Spanned<Lexeme> {
        self.pos += 1; // consume opening quote
        let mut value = String::new();
        let mut saw_null = false;

        loop {
            if self.pos >= self.source.len() {
                self.diagnostics.push(Diagnostic::error(
                    ErrorKind::UnterminatedString,
                    "EOF in string constant".to_string(),
                    Span::new(self.file_id, start as u32, self.pos as u32, start_line),
                ));
                return self.make_token(Lexeme::StringConst(value), start, self.pos, start_line);
            }

            let ch = self.source[self.pos];

            if ch == b'"' {
                self.pos += 1;
                if saw_null {
                    self.diagnostics.push(Diagnostic::error(
                        ErrorKind::LexError,
                        "string contains null character".to_string(),
                        Span::new(self.file_id, start as u32, self.pos as u32, start_line),
                    ));
                }
                return self.make_token(Lexeme::StringConst(value), start, self.pos, start_line);
            }

            if ch == b'\n' {
                self.diagnostics.push(Diagnostic::error(
                    ErrorKind::UnterminatedString,
                    "unterminated string constant".to_string(),
                    Span::new(self.file_id, start as u32, self.pos as u32, start_line),
                ));
                self.line += 1;
                self.pos += 1;
                return self.make_token(Lexeme::StringConst(value), start, self.pos, start_line);
            }

            if ch == b'\0' {
                saw_null = true;
                self.pos += 1;
                continue;
            }

            if ch == b'\\' {
                self.pos += 1;
                if self.pos >= self.source.len() {
                    continue;
                }
                let esc = self.source[self.pos];
                match esc {
                    b'n' => value.push('\n'),
                    b't' => value.push('\t'),
                    b'b' => value.push('\u{8}'),
                    b'f' => value.push('\u{c}'),
                    b'\\' => value.push('\\'),
                    b'"' => value.push('"'),
                    b'\n' => {
                        value.push('\n');
                        self.line += 1;
                    }
                    b'\0' => saw_null = true,
                    other => value.push(other as char),
                }
                self.pos += 1;
                continue;
            }

            value.push(ch as char);
            self.pos += 1;
        }
    }

    fn scan_ident_or_keyword(&mut self, start: usize, line: u32) -> Spanned<Lexeme> {
        while self.pos < self.source.len() && is_ident_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();

        if text == "true" || text == "false" {
            return self.make_token(Lexeme::BoolConst(text == "true"), start, self.pos, line);
        }

        let lowered = text.to_ascii_lowercase();
        if let Some(keyword) = Lexeme::from_keyword(&lowered) {
            return self.make_token(keyword, start, self.pos, line);
        }

        let first = text.chars().next().unwrap();
        let token = if first.is_ascii_uppercase() {
            Lexeme::TypeId(text.to_string())
        } else {
            Lexeme::ObjectId(text.to_string())
        };
        self.make_token(token, start, self.pos, line)
    }

    fn scan_number(&mut self, start: usize, line: u32) -> Spanned<Lexeme> {
        while self.pos < self.source.len() && self.source[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();
        match text.parse::<i32>() {
            Ok(n) => self.make_token(Lexeme::IntConst(n), start, self.pos, line),
            Err(_) => {
                self.diagnostics.push(Diagnostic::error(
                    ErrorKind::LexError,
                    format!("integer literal '{}' out of range", text),
                    Span::new(self.file_id, start as u32, self.pos as u32, line),
                ));
                self.make_token(Lexeme::IntConst(0), start, self.pos, line)
            }
        }
    }

    fn scan_symbol(&mut self, start: usize, line: u32) -> Option<Spanned<Lexeme>> {
        let ch = self.source[self.pos];
        self.pos += 1;

        let token = match ch {
            b'(' => Lexeme::LParen,
            b')' => Lexeme::RParen,
            b'{' => Lexeme::LBrace,
            b'}' => Lexeme::RBrace,
            b':' => Lexeme::Colon,
            b',' => Lexeme::Comma,
            b'.' => Lexeme::Dot,
            b';' => Lexeme::Semicolon,
            b'@' => Lexeme::At,
            b'+' => Lexeme::Plus,
            b'*' => Lexeme::Star,
            b'/' => Lexeme::Slash,
            b'~' => Lexeme::Tilde,
            b'=' => {
                if self.peek() == Some(b'>') {
                    self.pos += 1;
                    Lexeme::Darrow
                } else {
                    Lexeme::Eq
                }
            }
            b'<' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Lexeme::Le
                } else if self.peek() == Some(b'-') {
                    self.pos += 1;
                    Lexeme::Assign
                } else {
                    Lexeme::Lt
                }
            }
            b'-' => Lexeme::Minus,
            _ => {
                self.diagnostics.push(Diagnostic::error(
                    ErrorKind::LexError,
                    format!("unexpected character '{}'", ch as char),
                    Span::new(self.file_id, start as u32, self.pos as u32, line),
                ));
                return None;
            }
        };

        Some(self.make_token(token, start, self.pos, line))
    }

    fn peek(&self) -> Option<u8> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn make_token(&self, token: Lexeme, start: usize, end: usize, line: u32) -> Spanned<Lexeme> {
        Spanned::new(token, Span::new(self.file_id, start as u32, end as u32, line))
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Lexeme> {
        let (tokens, diags) = Lexer::new(source, 0).tokenize();
        assert!(diags.is_empty(), "unexpected errors: {:?}", diags);
        tokens.into_iter().map(|t| t.node).collect()
    }

    #[test]
    fn test_keywords_case_insensitive() {
        let tokens = lex("CLASS Class class ELSE Inherits WHILE");
        assert_eq!(
            tokens,
            vec![
                Lexeme::Class,
                Lexeme::Class,
                Lexeme::Class,
                Lexeme::Else,
                Lexeme::Inherits,
                Lexeme::While,
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_true_false_case_sensitive() {
        let tokens = lex("true false");
        assert_eq!(
            tokens,
            vec![Lexeme::BoolConst(true), Lexeme::BoolConst(false), Lexeme::Eof]
        );
        // Capitalized variants are ordinary type/object identifiers, not booleans.
        let tokens = lex("True");
        assert_eq!(tokens, vec![Lexeme::TypeId("True".into()), Lexeme::Eof]);
    }

    #[test]
    fn test_type_vs_object_id() {
        let tokens = lex("Main x self io_obj Object");
        assert_eq!(
            tokens,
            vec![
                Lexeme::TypeId("Main".into()),
                Lexeme::ObjectId("x".into()),
                Lexeme::ObjectId("self".into()),
                Lexeme::ObjectId("io_obj".into()),
                Lexeme::TypeId("Object".into()),
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        let tokens = lex("+ - * / ~ < <= = <- =>");
        assert_eq!(
            tokens,
            vec![
                Lexeme::Plus,
                Lexeme::Minus,
                Lexeme::Star,
                Lexeme::Slash,
                Lexeme::Tilde,
                Lexeme::Lt,
                Lexeme::Le,
                Lexeme::Eq,
                Lexeme::Assign,
                Lexeme::Darrow,
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_integers() {
        let tokens = lex("0 1 42");
        assert_eq!(
            tokens,
            vec![
                Lexeme::IntConst(0),
                Lexeme::IntConst(1),
                Lexeme::IntConst(42),
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let tokens = lex(r#""a\nb\tc\\d""#);
        assert_eq!(
            tokens,
            vec![Lexeme::StringConst("a\nb\tc\\d".to_string()), Lexeme::Eof]
        );
    }

    #[test]
    fn test_string_escaped_newline_continuation() {
        let tokens = lex("\"line1\\\nline2\"");
        assert_eq!(
            tokens,
            vec![Lexeme::StringConst("line1\nline2".to_string()), Lexeme::Eof]
        );
    }

    #[test]
    fn test_line_comment() {
        let tokens = lex("x -- this is a comment\ny");
        assert_eq!(
            tokens,
            vec![
                Lexeme::ObjectId("x".into()),
                Lexeme::ObjectId("y".into()),
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_nested_block_comment() {
        let tokens = lex("x (* outer (* inner *) still outer *) y");
        assert_eq!(
            tokens,
            vec![
                Lexeme::ObjectId("x".into()),
                Lexeme::ObjectId("y".into()),
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_line_tracking() {
        let (tokens, _) = Lexer::new("a\nb\n\nc", 0).tokenize();
        assert_eq!(tokens[0].span.line, 1);
        assert_eq!(tokens[1].span.line, 2);
        assert_eq!(tokens[2].span.line, 4);
    }

    #[test]
    fn test_error_unterminated_string() {
        let (_tokens, diags) = Lexer::new("\"abc", 0).tokenize();
        assert!(diags.iter().any(|d| d.kind == ErrorKind::UnterminatedString));
    }

    #[test]
    fn test_error_newline_in_string() {
        let (_tokens, diags) = Lexer::new("\"abc\ndef\"", 0).tokenize();
        assert!(diags.iter().any(|d| d.kind == ErrorKind::UnterminatedString));
    }

    #[test]
    fn test_error_unterminated_comment() {
        let (_tokens, diags) = Lexer::new("(* never closed", 0).tokenize();
        assert!(diags.iter().any(|d| d.kind == ErrorKind::UnterminatedComment));
    }

    #[test]
    fn test_error_unmatched_close_comment() {
        let (_tokens, diags) = Lexer::new("*)", 0).tokenize();
        assert!(diags.iter().any(|d| d.kind == ErrorKind::LexError));
    }

    #[test]
    fn test_error_illegal_character_recovers() {
        let (tokens, diags) = Lexer::new("x $ y", 0).tokenize();
        assert!(!diags.is_empty());
        let kinds: Vec<Lexeme> = tokens.into_iter().map(|t| t.node).collect();
        assert_eq!(
            kinds,
            vec![
                Lexeme::ObjectId("x".into()),
                Lexeme::ObjectId("y".into()),
                Lexeme::Eof,
            ]
        );
    }
}

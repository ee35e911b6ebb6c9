use crate::error::{AsmError, ErrorKind};
use crate::loc::SourceLoc;
use crate::token::{Token, TokenKind};

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '.'
}

fn is_horizontal_ws(ch: char) -> bool {
    ch == ' ' || ch == '\t'
}

/// Tokenizes one translation unit. The logical file name and line
/// number follow `# <line> "<file>"` markers injected by an upstream
/// preprocessor; the markers themselves produce no tokens.
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    file: String,
    line: u32,
    col: u32,
    at_line_start: bool,
}

impl Lexer {
    pub fn new(source: &str, file: &str) -> Self {
        Lexer {
            input: source.chars().collect(),
            pos: 0,
            file: file.to_string(),
            line: 1,
            col: 1,
            at_line_start: true,
        }
    }

    fn peek(&self, n: usize) -> Option<char> {
        self.input.get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek(0)?;
        self.pos += 1;
        self.col += 1;
        Some(ch)
    }

    fn loc(&self) -> SourceLoc {
        SourceLoc::new(self.file.clone(), self.line, self.col)
    }

    fn start_new_line(&mut self) {
        self.line += 1;
        self.col = 1;
        self.at_line_start = true;
    }

    /// Consumes a `\r`, `\n` or `\r\n` and emits the `NewLine` token
    /// carrying the column the line ended at.
    fn newline(&mut self, tokens: &mut Vec<Token>) {
        let loc = self.loc();
        if self.bump() == Some('\r') && self.peek(0) == Some('\n') {
            self.bump();
        }
        tokens.push(Token::new(TokenKind::NewLine, "", loc));
        self.start_new_line();
    }

    pub fn lex(mut self) -> Result<Vec<Token>, AsmError> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek(0) {
            if self.at_line_start && self.try_line_marker()? {
                continue;
            }

            match ch {
                '\r' | '\n' => {
                    self.newline(&mut tokens);
                    continue;
                }
                ' ' | '\t' | '\x0B' | '\x0C' => {
                    self.bump();
                    continue;
                }
                ';' => {
                    self.at_line_start = false;
                    self.skip_to_line_end();
                    continue;
                }
                '/' if self.peek(1) == Some('/') => {
                    self.at_line_start = false;
                    self.skip_to_line_end();
                    continue;
                }
                _ => {}
            }

            self.at_line_start = false;
            let loc = self.loc();
            match ch {
                '[' => {
                    self.bump();
                    tokens.push(Token::new(TokenKind::LBracket, "[", loc));
                }
                ']' => {
                    self.bump();
                    tokens.push(Token::new(TokenKind::RBracket, "]", loc));
                }
                ',' => {
                    self.bump();
                    tokens.push(Token::new(TokenKind::Comma, ",", loc));
                }
                ':' => {
                    self.bump();
                    tokens.push(Token::new(TokenKind::Colon, ":", loc));
                }
                '.' => {
                    self.bump();
                    tokens.push(Token::new(TokenKind::Dot, ".", loc));
                }
                '"' => {
                    let text = self.lex_string(&loc)?;
                    tokens.push(Token::new(TokenKind::Str, text, loc));
                }
                c if is_ident_start(c) => {
                    let mut text = String::new();
                    while let Some(c) = self.peek(0) {
                        if !is_ident_char(c) {
                            break;
                        }
                        text.push(c);
                        self.bump();
                    }
                    tokens.push(Token::new(TokenKind::Ident, text, loc));
                }
                c if c.is_ascii_digit() => {
                    let mut text = String::new();
                    while let Some(c) = self.peek(0) {
                        if !c.is_ascii_alphanumeric() {
                            break;
                        }
                        text.push(c);
                        self.bump();
                    }
                    tokens.push(Token::new(TokenKind::Number, text, loc));
                }
                c => return Err(AsmError::new(loc, ErrorKind::UnexpectedChar(c))),
            }
        }

        let loc = self.loc();
        tokens.push(Token::new(TokenKind::Eof, "", loc));
        Ok(tokens)
    }

    fn skip_to_line_end(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == '\n' || c == '\r' {
                break;
            }
            self.bump();
        }
    }

    /// Reads a string literal with the quotes and escape sequences kept
    /// verbatim. Escapes are decoded at the directive layer; here they
    /// only guard quote detection.
    fn lex_string(&mut self, start: &SourceLoc) -> Result<String, AsmError> {
        let mut text = String::new();
        text.push('"');
        self.bump();

        loop {
            match self.peek(0) {
                None | Some('\n') | Some('\r') => {
                    return Err(AsmError::new(start.clone(), ErrorKind::UnterminatedString));
                }
                Some('\\') => {
                    text.push('\\');
                    self.bump();
                    match self.peek(0) {
                        None | Some('\n') | Some('\r') => {
                            return Err(
                                AsmError::new(start.clone(), ErrorKind::UnterminatedString)
                            );
                        }
                        Some(c) => {
                            text.push(c);
                            self.bump();
                        }
                    }
                }
                Some('"') => {
                    text.push('"');
                    self.bump();
                    return Ok(text);
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
            }
        }
    }

    /// Consumes a `# <line> "<file>"` marker if one starts the logical
    /// line. Errors are reported at the currently active location.
    fn try_line_marker(&mut self) -> Result<bool, AsmError> {
        let save_pos = self.pos;
        let save_col = self.col;

        while self.peek(0).is_some_and(is_horizontal_ws) {
            self.bump();
        }
        if self.peek(0) != Some('#') {
            self.pos = save_pos;
            self.col = save_col;
            return Ok(false);
        }
        self.bump();

        let marker_loc = SourceLoc::new(self.file.clone(), self.line, 1);

        while self.peek(0).is_some_and(is_horizontal_ws) {
            self.bump();
        }

        if !self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
            return Err(AsmError::new(marker_loc, ErrorKind::BadLineMarker("expected line number")));
        }
        let mut parsed: u64 = 0;
        while let Some(c) = self.peek(0) {
            if !c.is_ascii_digit() {
                break;
            }
            parsed = parsed * 10 + u64::from(c as u8 - b'0');
            if parsed > u64::from(u32::MAX) {
                return Err(AsmError::new(
                    marker_loc,
                    ErrorKind::BadLineMarker("line number is out of range"),
                ));
            }
            self.bump();
        }

        while self.peek(0).is_some_and(is_horizontal_ws) {
            self.bump();
        }
        if self.peek(0) != Some('"') {
            return Err(AsmError::new(marker_loc, ErrorKind::BadLineMarker("expected file path")));
        }
        self.bump();

        let mut path = String::new();
        loop {
            match self.peek(0) {
                None | Some('\n') | Some('\r') => {
                    return Err(AsmError::new(
                        marker_loc,
                        ErrorKind::BadLineMarker("unterminated file path"),
                    ));
                }
                Some('\\') => {
                    self.bump();
                    match self.peek(0) {
                        None => {
                            return Err(AsmError::new(
                                marker_loc,
                                ErrorKind::BadLineMarker("unterminated escape sequence"),
                            ));
                        }
                        Some(c) => {
                            path.push(c);
                            self.bump();
                        }
                    }
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some(c) => {
                    path.push(c);
                    self.bump();
                }
            }
        }

        // Flag digits and anything else up to the line end are ignored.
        self.skip_to_line_end();
        if self.peek(0) == Some('\r') {
            self.bump();
            if self.peek(0) == Some('\n') {
                self.bump();
            }
        } else if self.peek(0) == Some('\n') {
            self.bump();
        }

        self.file = path;
        self.line = parsed as u32;
        self.col = 1;
        self.at_line_start = true;
        Ok(true)
    }
}

//! Statement counting for query text
//!
//! Semicolons inside string literals, quoted identifiers, comments and
//! trigger bodies do not end a statement.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexeme {
    Code,
    Quoted(char),
    DollarQuoted,
    LineComment,
    BlockComment,
}

/// The statement currently being scanned
#[derive(Debug, Default)]
struct Segment {
    significant: bool,
    words: usize,
    creates: bool,
    trigger: bool,
    depth: usize,
}

impl Segment {
    fn finish_word(&mut self, word: &mut String) {
        if word.is_empty() {
            return;
        }

        let upper = word.to_ascii_uppercase();
        match (self.words, upper.as_str()) {
            (0, "CREATE") => self.creates = true,
            // CREATE [TEMP] TRIGGER
            (1..=2, "TRIGGER") if self.creates => self.trigger = true,
            _ => {}
        }

        if self.trigger {
            match upper.as_str() {
                "BEGIN" | "CASE" => self.depth += 1,
                "END" => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
        }

        self.words += 1;
        word.clear();
    }
}

/// Number of non-empty statements in `sql`
///
/// ```rust
/// use axum_sql_sandbox::database::statements::count_statements;
///
/// assert_eq!(count_statements("SELECT ';'; -- done"), 1);
/// assert_eq!(count_statements("SELECT 1; SELECT 2"), 2);
/// ```
pub fn count_statements(sql: &str) -> usize {
    let mut count = 0;
    let mut segment = Segment::default();
    let mut state = Lexeme::Code;
    let mut word = String::new();
    let mut characters = sql.chars().peekable();

    while let Some(character) = characters.next() {
        match state {
            Lexeme::Code => {}
            Lexeme::LineComment => {
                if character == '\n' {
                    state = Lexeme::Code;
                }
                continue;
            }
            Lexeme::BlockComment => {
                if character == '*' && characters.peek() == Some(&'/') {
                    characters.next();
                    state = Lexeme::Code;
                }
                continue;
            }
            Lexeme::DollarQuoted => {
                if character == '$' && characters.peek() == Some(&'$') {
                    characters.next();
                    state = Lexeme::Code;
                }
                continue;
            }
            Lexeme::Quoted(close) => {
                if character == close {
                    state = Lexeme::Code;
                }
                continue;
            }
        }

        if character.is_alphanumeric() || character == '_' {
            word.push(character);
            segment.significant = true;
            continue;
        }
        segment.finish_word(&mut word);

        match character {
            '-' if characters.peek() == Some(&'-') => {
                characters.next();
                state = Lexeme::LineComment;
            }
            '/' if characters.peek() == Some(&'*') => {
                characters.next();
                state = Lexeme::BlockComment;
            }
            '$' if characters.peek() == Some(&'$') => {
                characters.next();
                state = Lexeme::DollarQuoted;
                segment.significant = true;
            }
            '\'' | '"' | '`' => {
                state = Lexeme::Quoted(character);
                segment.significant = true;
            }
            '[' => {
                state = Lexeme::Quoted(']');
                segment.significant = true;
            }
            ';' if segment.depth == 0 => {
                if segment.significant {
                    count += 1;
                }
                segment = Segment::default();
            }
            other if !other.is_whitespace() => segment.significant = true,
            _ => {}
        }
    }

    segment.finish_word(&mut word);
    if segment.significant {
        count += 1;
    }

    count
}

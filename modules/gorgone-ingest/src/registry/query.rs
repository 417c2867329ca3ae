use gorgone_common::types::RuleKind;
use gorgone_common::GorgoneError;

/// Validate a rule's query spec against its kind's grammar.
///
/// Atomic kinds take a single `#hashtag` or `@handle` (sigil optional);
/// search-style kinds take a boolean expression with `AND`/`OR`/`NOT`,
/// parentheses, quoted phrases, and bare terms. Adjacent terms without an
/// operator are an implicit conjunction, as the providers' search syntax
/// allows.
pub fn validate_query(kind: RuleKind, query: &str) -> Result<(), GorgoneError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(GorgoneError::Validation("query spec is empty".to_string()));
    }

    match kind {
        RuleKind::Hashtag => validate_atom(query.strip_prefix('#').unwrap_or(query), "hashtag"),
        RuleKind::User => validate_atom(query.strip_prefix('@').unwrap_or(query), "handle"),
        RuleKind::Keyword | RuleKind::Combined | RuleKind::NewsQuery => {
            let tokens = tokenize(query)?;
            Parser::new(&tokens).parse()
        }
    }
}

fn validate_atom(value: &str, what: &str) -> Result<(), GorgoneError> {
    if value.is_empty() {
        return Err(GorgoneError::Validation(format!("{what} is empty")));
    }
    if !value.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(GorgoneError::Validation(format!(
            "{what} may only contain letters, digits, and underscores: {value:?}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Term,
}

fn tokenize(query: &str) -> Result<Vec<Token>, GorgoneError> {
    let mut tokens = Vec::new();
    let mut chars = query.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '"' => {
                chars.next();
                let mut phrase = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(ch) => phrase.push(ch),
                        None => {
                            return Err(GorgoneError::Validation(
                                "unterminated quoted phrase".to_string(),
                            ))
                        }
                    }
                }
                if phrase.trim().is_empty() {
                    return Err(GorgoneError::Validation("empty quoted phrase".to_string()));
                }
                tokens.push(Token::Term);
            }
            _ => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch == ' ' || ch == '\t' || ch == '\n' || ch == '(' || ch == ')' || ch == '"'
                    {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                // Operators are uppercase keywords; anything else, including
                // lowercase "and", is an ordinary search term.
                tokens.push(match word.as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    _ => Token::Term,
                });
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn parse(mut self) -> Result<(), GorgoneError> {
        self.expression()?;
        if self.pos < self.tokens.len() {
            return Err(GorgoneError::Validation(
                "unexpected trailing token in query".to_string(),
            ));
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn expression(&mut self) -> Result<(), GorgoneError> {
        self.term()?;
        loop {
            match self.peek() {
                Some(Token::And) | Some(Token::Or) => {
                    self.pos += 1;
                    self.term()?;
                }
                // Implicit conjunction between adjacent terms.
                Some(Token::Term) | Some(Token::LParen) | Some(Token::Not) => {
                    self.term()?;
                }
                _ => return Ok(()),
            }
        }
    }

    fn term(&mut self) -> Result<(), GorgoneError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
        }
        self.factor()
    }

    fn factor(&mut self) -> Result<(), GorgoneError> {
        match self.peek() {
            Some(Token::Term) => {
                self.pos += 1;
                Ok(())
            }
            Some(Token::LParen) => {
                self.pos += 1;
                self.expression()?;
                if self.peek() != Some(&Token::RParen) {
                    return Err(GorgoneError::Validation(
                        "unbalanced parentheses in query".to_string(),
                    ));
                }
                self.pos += 1;
                Ok(())
            }
            Some(Token::And) | Some(Token::Or) => Err(GorgoneError::Validation(
                "operator without a left-hand term".to_string(),
            )),
            Some(Token::Not) => Err(GorgoneError::Validation(
                "NOT must be followed by a term".to_string(),
            )),
            Some(Token::RParen) | None => Err(GorgoneError::Validation(
                "expected a term".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_hashtag_accepts_with_and_without_sigil() {
        assert!(validate_query(RuleKind::Hashtag, "#mutualaid").is_ok());
        assert!(validate_query(RuleKind::Hashtag, "mutualaid").is_ok());
        assert!(validate_query(RuleKind::Hashtag, "snake_case_tag").is_ok());
    }

    #[test]
    fn atomic_hashtag_rejects_spaces_and_punctuation() {
        assert!(validate_query(RuleKind::Hashtag, "two words").is_err());
        assert!(validate_query(RuleKind::Hashtag, "#").is_err());
        assert!(validate_query(RuleKind::Hashtag, "tag!").is_err());
    }

    #[test]
    fn atomic_user_accepts_handles() {
        assert!(validate_query(RuleKind::User, "@ada_l").is_ok());
        assert!(validate_query(RuleKind::User, "ada_l").is_ok());
        assert!(validate_query(RuleKind::User, "@two handles").is_err());
    }

    #[test]
    fn boolean_grammar_accepts_well_formed_expressions() {
        for query in [
            "climate",
            "climate AND policy",
            "climate OR (policy AND NOT lobbying)",
            "\"heat wave\" AND minneapolis",
            "minneapolis volunteer",                 // implicit AND
            "NOT spam",
            "(a OR b) (c OR d)",
        ] {
            assert!(
                validate_query(RuleKind::Keyword, query).is_ok(),
                "should accept: {query}"
            );
        }
    }

    #[test]
    fn boolean_grammar_rejects_malformed_expressions() {
        for query in [
            "",
            "AND climate",
            "climate AND",
            "climate AND OR policy",
            "(climate",
            "climate)",
            "\"unterminated",
            "\"\"",
            "NOT",
        ] {
            assert!(
                validate_query(RuleKind::NewsQuery, query).is_err(),
                "should reject: {query:?}"
            );
        }
    }

    #[test]
    fn lowercase_operators_are_plain_terms() {
        assert!(validate_query(RuleKind::Keyword, "fish and chips").is_ok());
    }
}

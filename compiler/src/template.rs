// template.rs — Call-shape override templates
//
// A template spells out the target-language expression for one callee, with
// pins named by `$Name` or `${Name With Spaces}`; `$$` is a literal dollar.
// When the first placeholder is directly followed by ` = `, that pin is the
// assigned output: `$ReturnValue = ($A * $B)`.
//
// Uses the `logos` crate for lexing.
//
// Preconditions: template text from configuration.
// Postconditions: pin/text segments with adjacent text merged.
// Failure modes: stray `$` or empty template.
// Side effects: none.

use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq)]
enum Token<'s> {
    #[token("$$")]
    Dollar,
    #[regex(r"\$\{[^}]+\}", |lex| { let s = lex.slice(); &s[2..s.len() - 1] })]
    Braced(&'s str),
    #[regex(r"\$[A-Za-z_][A-Za-z0-9_]*", |lex| &lex.slice()[1..])]
    Bare(&'s str),
    #[regex(r"[^$]+", |lex| lex.slice())]
    Text(&'s str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Pin(String),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTemplate {
    /// Output pin receiving the value of `body`, if any.
    pub assigned: Option<String>,
    pub body: Vec<Segment>,
}

impl CallTemplate {
    pub fn parse(source: &str) -> Result<CallTemplate, String> {
        let mut segments: Vec<Segment> = Vec::new();
        let mut lexer = Token::lexer(source);
        while let Some(token) = lexer.next() {
            let text = match token {
                Ok(Token::Bare(name)) | Ok(Token::Braced(name)) => {
                    segments.push(Segment::Pin(name.trim().to_string()));
                    continue;
                }
                Ok(Token::Dollar) => "$",
                Ok(Token::Text(text)) => text,
                Err(()) => {
                    return Err(format!(
                        "unexpected `{}` at offset {}",
                        lexer.slice(),
                        lexer.span().start
                    ))
                }
            };
            match segments.last_mut() {
                Some(Segment::Text(prev)) => prev.push_str(text),
                _ => segments.push(Segment::Text(text.to_string())),
            }
        }
        if segments.is_empty() {
            return Err("template is empty".to_string());
        }

        let mut assigned = None;
        if let (Some(Segment::Pin(first)), Some(Segment::Text(next))) =
            (segments.first(), segments.get(1))
        {
            if let Some(rest) = next.strip_prefix(" = ") {
                assigned = Some(first.clone());
                let rest = rest.to_string();
                segments.remove(0);
                if rest.is_empty() {
                    segments.remove(0);
                } else {
                    segments[0] = Segment::Text(rest);
                }
            }
        }
        if segments.is_empty() {
            return Err("template assigns nothing".to_string());
        }
        Ok(CallTemplate {
            assigned,
            body: segments,
        })
    }

    /// Pin names referenced by the body, in order.
    pub fn body_pins(&self) -> impl Iterator<Item = &str> {
        self.body.iter().filter_map(|s| match s {
            Segment::Pin(name) => Some(name.as_str()),
            Segment::Text(_) => None,
        })
    }
}

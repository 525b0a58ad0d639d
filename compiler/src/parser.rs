//! A recursive-descent parser from UTF-16 pattern source to an [Ast].
//!
//! Alternations and sequences are collected iteratively. Only group nesting
//! recurses, and it is bounded by [MAX_NESTING].

use log::warn;
use parcel::parsers::character::{digit, expect_character};
use parcel::prelude::v1::*;

use regexp_runtime::charset::scan_class;
use regexp_runtime::{CharSet, Flags, ARG_MAX, UNBOUNDED};

use crate::ast::{Ast, NodeId, NodeKind, QuantBounds};

/// The deepest group nesting the parser accepts.
pub const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    UnterminatedGroup,
    UnmatchedParen,
    UnterminatedClass,
    TrailingBackslash,
    /// A quantifier with no preceding term, or following another quantifier.
    NothingToRepeat,
    /// A `{m,n}` quantifier where `m > n`.
    QuantifierOutOfOrder,
    BadClassRange,
    UnknownFlag,
    /// The pattern exceeds what 16-bit operands can address.
    TooBig,
    TooDeeplyNested,
}

/// A pattern that cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    kind: SyntaxErrorKind,
    data: Option<String>,
}

impl SyntaxError {
    pub fn new(kind: SyntaxErrorKind) -> Self {
        Self { kind, data: None }
    }

    /// Associates additional data with the error, returning the modified error.
    pub fn with_data(mut self, data: String) -> Self {
        self.data = Some(data);
        self
    }

    pub fn kind(&self) -> SyntaxErrorKind {
        self.kind
    }
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self.kind {
            SyntaxErrorKind::UnterminatedGroup => "unterminated parenthetical",
            SyntaxErrorKind::UnmatchedParen => "unmatched ) in regular expression",
            SyntaxErrorKind::UnterminatedClass => "unterminated character class",
            SyntaxErrorKind::TrailingBackslash => "trailing \\ in regular expression",
            SyntaxErrorKind::NothingToRepeat => "nothing to repeat",
            SyntaxErrorKind::QuantifierOutOfOrder => "numbers out of order in {} quantifier",
            SyntaxErrorKind::BadClassRange => "invalid range in character class",
            SyntaxErrorKind::UnknownFlag => "invalid regular expression flag",
            SyntaxErrorKind::TooBig => "regular expression too big",
            SyntaxErrorKind::TooDeeplyNested => "regular expression too deeply nested",
        };

        match (&self.kind, &self.data) {
            (SyntaxErrorKind::UnknownFlag, Some(flag)) => write!(f, "{} {}", msg, flag),
            (_, Some(data)) => write!(f, "{}: {}", msg, data),
            (_, None) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for SyntaxError {}

/// Advisory diagnostics that never change how a pattern matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A decimal escape that names no group opened so far, read as octal.
    OctalEscape { offset: usize, value: u16 },
    /// A backreference to a group the pattern does not define. It matches
    /// the empty string.
    BackReferenceOutOfRange { number: u16 },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::OctalEscape { offset, value } => write!(
                f,
                "escape at {} is not a backreference, read as octal \\{:o}",
                offset, value
            ),
            Warning::BackReferenceOutOfRange { number } => {
                write!(f, "backreference \\{} exceeds the group count", number)
            }
        }
    }
}

/// The output of a successful parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPattern {
    pub ast: Ast,
    pub root: NodeId,
    pub paren_count: usize,
    /// One cell per distinct bracket expression source.
    pub classes: Vec<CharSet>,
    pub warnings: Vec<Warning>,
}

/// Parses a flag string, accepting any combination of `g`, `i` and `m`.
///
/// # Example
///
/// ```
/// use regexp_compiler::parse_flags;
/// use regexp_runtime::Flags;
///
/// assert_eq!(Ok(Flags::GLOBAL | Flags::MULTILINE), parse_flags("mg"));
/// assert!(parse_flags("gy").is_err());
/// ```
pub fn parse_flags(flags: &str) -> Result<Flags, SyntaxError> {
    flags.chars().try_fold(Flags::empty(), |acc, letter| {
        let flag = match letter {
            'g' => Flags::GLOBAL,
            'i' => Flags::FOLD,
            'm' => Flags::MULTILINE,
            other => {
                return Err(SyntaxError::new(SyntaxErrorKind::UnknownFlag).with_data(other.to_string()))
            }
        };

        Ok(acc | flag)
    })
}

/// Parses a pattern into its [Ast].
pub fn parse(pattern: &[u16], flags: Flags) -> Result<ParsedPattern, SyntaxError> {
    Parser::new(pattern, flags).parse_pattern()
}

/// Treats the whole pattern as a literal string.
pub fn parse_flat(pattern: &[u16]) -> Result<ParsedPattern, SyntaxError> {
    if pattern.len() > ARG_MAX {
        return Err(SyntaxError::new(SyntaxErrorKind::TooBig)
            .with_data(format!("literal of {} units", pattern.len())));
    }

    let mut ast = Ast::new();
    let terms: Vec<_> = pattern
        .iter()
        .enumerate()
        .map(|(offset, &unit)| {
            ast.push(NodeKind::Flat {
                unit,
                source: Some(offset),
            })
        })
        .collect();
    let root = ast.chain(&terms);

    Ok(ParsedPattern {
        ast,
        root,
        paren_count: 0,
        classes: vec![],
        warnings: vec![],
    })
}

enum GroupKind {
    Capturing,
    NonCapturing,
    Lookahead { negated: bool },
}

struct Parser<'s> {
    src: &'s [u16],
    /// The source as parcel input, one entry per code unit.
    chars: Vec<(usize, char)>,
    pos: usize,
    fold: bool,
    depth: usize,
    ast: Ast,
    /// Capturing groups opened so far.
    paren_count: usize,
    classes: Vec<CharSet>,
    warnings: Vec<Warning>,
}

impl<'s> Parser<'s> {
    fn new(src: &'s [u16], flags: Flags) -> Self {
        let chars = src
            .iter()
            .enumerate()
            .map(|(idx, &unit)| {
                let c = char::from_u32(u32::from(unit)).unwrap_or(char::REPLACEMENT_CHARACTER);
                (idx, c)
            })
            .collect();

        Self {
            src,
            chars,
            pos: 0,
            fold: flags.fold(),
            depth: 0,
            ast: Ast::new(),
            paren_count: 0,
            classes: vec![],
            warnings: vec![],
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek_char_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|&(_, c)| c)
    }

    fn eat(&mut self, expected: char) -> bool {
        let found = self.peek_char() == Some(expected);
        if found {
            self.pos += 1;
        }
        found
    }

    fn warn(&mut self, warning: Warning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    fn parse_pattern(mut self) -> Result<ParsedPattern, SyntaxError> {
        let root = self.disjunction()?;

        // a top-level disjunction only stops short at a stray `)`.
        if self.pos < self.src.len() {
            return Err(SyntaxError::new(SyntaxErrorKind::UnmatchedParen)
                .with_data(format!("at {}", self.pos)));
        }

        let out_of_range: Vec<_> = self
            .ast
            .nodes()
            .filter_map(|(_, node)| match node.kind {
                NodeKind::BackRef(paren) if usize::from(paren) >= self.paren_count => Some(paren),
                _ => None,
            })
            .collect();
        for paren in out_of_range {
            self.warn(Warning::BackReferenceOutOfRange { number: paren + 1 });
        }

        Ok(ParsedPattern {
            ast: self.ast,
            root,
            paren_count: self.paren_count,
            classes: self.classes,
            warnings: self.warnings,
        })
    }

    fn disjunction(&mut self) -> Result<NodeId, SyntaxError> {
        let mut node = self.alternative()?;
        let mut preceding = vec![];
        while self.eat('|') {
            preceding.push(node);
            node = self.alternative()?;
        }

        for kid in preceding.into_iter().rev() {
            node = self.ast.push(NodeKind::Alt { kid, kid2: node });
        }

        Ok(node)
    }

    fn alternative(&mut self) -> Result<NodeId, SyntaxError> {
        let mut terms = vec![];
        while let Some(c) = self.peek_char() {
            if c == '|' || c == ')' {
                break;
            }

            terms.push(self.term(c)?);
        }

        Ok(self.ast.chain(&terms))
    }

    fn term(&mut self, c: char) -> Result<NodeId, SyntaxError> {
        let parens_before = self.paren_count;
        let atom = self.atom(c)?;
        self.quantified(atom, parens_before)
    }

    fn atom(&mut self, c: char) -> Result<NodeId, SyntaxError> {
        let kind = match c {
            '^' => NodeKind::Bol,
            '$' => NodeKind::Eol,
            '.' => NodeKind::Dot,
            '(' => return self.group(),
            '[' => return self.class(),
            '\\' => return self.escape(),
            '*' | '+' | '?' => {
                return Err(SyntaxError::new(SyntaxErrorKind::NothingToRepeat)
                    .with_data(format!("'{}' at {}", c, self.pos)))
            }
            '{' if self.bounds()?.is_some() => {
                return Err(SyntaxError::new(SyntaxErrorKind::NothingToRepeat)
                    .with_data(format!("'{{' at {}", self.pos)))
            }
            _ => NodeKind::Flat {
                unit: self.src[self.pos],
                source: Some(self.pos),
            },
        };

        self.pos += 1;
        Ok(self.ast.push(kind))
    }

    fn quantified(&mut self, atom: NodeId, parens_before: usize) -> Result<NodeId, SyntaxError> {
        let (min, max) = match self.peek_char() {
            Some('*') => (0, None),
            Some('+') => (1, None),
            Some('?') => (0, Some(1)),
            Some('{') => match self.bounds()? {
                Some((min, max, consumed)) => {
                    // leave the closing brace for the shared advance below.
                    self.pos += consumed - 1;
                    (min, max)
                }
                None => return Ok(atom),
            },
            _ => return Ok(atom),
        };
        self.pos += 1;

        let greedy = !self.eat('?');
        let too_big = |_| SyntaxError::new(SyntaxErrorKind::TooBig);
        let bounds = QuantBounds {
            min,
            max,
            greedy,
            paren_index: u16::try_from(parens_before).map_err(too_big)?,
            paren_count: u16::try_from(self.paren_count - parens_before).map_err(too_big)?,
        };

        Ok(self.ast.push(NodeKind::Quant { bounds, kid: atom }))
    }

    /// Reads a `{m}`, `{m,}` or `{m,n}` quantifier at the cursor without
    /// consuming it, returning its bounds and width. Anything else is `None`
    /// and the brace is a literal.
    fn bounds(&self) -> Result<Option<(u16, Option<u16>, usize)>, SyntaxError> {
        let input = &self.chars[self.pos..];
        let (min, upper, remainder) = match range_quantifier().parse(input) {
            Ok(MatchStatus::Match {
                remainder,
                inner: (min, upper),
                ..
            }) => (min, upper, remainder),
            _ => return Ok(None),
        };

        let max = match upper {
            None => Some(min),
            Some(None) => None,
            Some(Some(max)) => Some(max),
        };
        // bounds clamp to 16 bits, where the largest value means unbounded.
        let max = max.filter(|&max| max != UNBOUNDED);

        match max {
            Some(max) if min > max => Err(SyntaxError::new(SyntaxErrorKind::QuantifierOutOfOrder)
                .with_data(format!("{{{},{}}}", min, max))),
            _ => Ok(Some((min, max, input.len() - remainder.len()))),
        }
    }

    fn group(&mut self) -> Result<NodeId, SyntaxError> {
        let open = self.pos;
        if self.depth >= MAX_NESTING {
            return Err(SyntaxError::new(SyntaxErrorKind::TooDeeplyNested)
                .with_data(format!("group at {}", open)));
        }
        self.pos += 1;

        let group_kind = match (self.peek_char(), self.peek_char_at(1)) {
            (Some('?'), Some(':')) => GroupKind::NonCapturing,
            (Some('?'), Some('=')) => GroupKind::Lookahead { negated: false },
            (Some('?'), Some('!')) => GroupKind::Lookahead { negated: true },
            _ => GroupKind::Capturing,
        };

        let paren = match group_kind {
            GroupKind::Capturing => {
                let paren = u16::try_from(self.paren_count)
                    .ok()
                    .filter(|&paren| paren < u16::MAX)
                    .ok_or_else(|| {
                        SyntaxError::new(SyntaxErrorKind::TooBig)
                            .with_data("too many capturing groups".to_string())
                    })?;
                self.paren_count += 1;
                paren
            }
            _ => {
                self.pos += 2;
                0
            }
        };

        self.depth += 1;
        let kid = self.disjunction()?;
        self.depth -= 1;

        if !self.eat(')') {
            return Err(SyntaxError::new(SyntaxErrorKind::UnterminatedGroup)
                .with_data(format!("opened at {}", open)));
        }

        let kind = match group_kind {
            GroupKind::Capturing => NodeKind::Group { paren, kid },
            GroupKind::NonCapturing => NodeKind::NonCapturing { kid },
            GroupKind::Lookahead { negated } => NodeKind::Assert { negated, kid },
        };

        Ok(self.ast.push(kind))
    }

    /// Records a bracket expression by its source span. The body is
    /// validated here but only converted to a bitmap on first use.
    fn class(&mut self) -> Result<NodeId, SyntaxError> {
        let src = self.src;
        let open = self.pos;
        let start = open + 1;

        let mut end = start;
        loop {
            match self.peek_char_at(end - self.pos) {
                None => {
                    return Err(SyntaxError::new(SyntaxErrorKind::UnterminatedClass)
                        .with_data(format!("opened at {}", open)))
                }
                Some('\\') => end += 2,
                Some(']') => break,
                Some(_) => end += 1,
            }
        }
        self.pos = end + 1;

        let body = &src[start..end];
        let summary = scan_class(body, self.fold).map_err(|e| {
            SyntaxError::new(SyntaxErrorKind::BadClassRange)
                .with_data(format!("class at {}, {}", open, e))
        })?;

        let index = match self.classes.iter().position(|set| set.body(src) == body) {
            Some(index) => index,
            None => {
                self.classes
                    .push(CharSet::new(start, body.len(), summary.sense, summary.size));
                self.classes.len() - 1
            }
        };
        let index = u16::try_from(index).map_err(|_| {
            SyntaxError::new(SyntaxErrorKind::TooBig).with_data("too many classes".to_string())
        })?;

        Ok(self.ast.push(NodeKind::Class {
            index,
            negated: !summary.sense,
        }))
    }

    fn escape(&mut self) -> Result<NodeId, SyntaxError> {
        let backslash = self.pos;
        self.pos += 1;
        let Some(c) = self.peek_char() else {
            return Err(SyntaxError::new(SyntaxErrorKind::TrailingBackslash));
        };
        self.pos += 1;

        let literal = |unit: u16| NodeKind::Flat { unit, source: None };
        let kind = match c {
            'b' => NodeKind::WordBoundary,
            'B' => NodeKind::NonWordBoundary,
            'd' => NodeKind::Digit,
            'D' => NodeKind::NonDigit,
            'w' => NodeKind::Alnum,
            'W' => NodeKind::NonAlnum,
            's' => NodeKind::Space,
            'S' => NodeKind::NonSpace,
            'f' => literal(0x0C),
            'n' => literal(0x0A),
            'r' => literal(0x0D),
            't' => literal(0x09),
            'v' => literal(0x0B),
            '0' => literal(self.octal(0)),
            '1'..='9' => return Ok(self.decimal_escape(backslash)),
            'x' => literal(self.hex(2)),
            'u' => literal(self.hex(4)),
            'c' => match self.peek_char() {
                Some(letter) if letter.is_ascii_alphabetic() => {
                    self.pos += 1;
                    literal(letter as u16 & 0x1F)
                }
                // not a control escape, the `c` is read again as a literal.
                _ => {
                    self.pos -= 1;
                    literal(u16::from(b'\\'))
                }
            },
            _ => literal(self.src[self.pos - 1]),
        };

        Ok(self.ast.push(kind))
    }

    /// Lexes the run of `radix` digits at the cursor without consuming it.
    fn digit_run(&self, radix: u32) -> Vec<u16> {
        match parcel::zero_or_more(digit(radix)).parse(&self.chars[self.pos..]) {
            Ok(MatchStatus::Match { inner, .. }) => inner
                .into_iter()
                .filter_map(|c| c.to_digit(radix))
                .filter_map(|d| u16::try_from(d).ok())
                .collect(),
            _ => vec![],
        }
    }

    /// Resolves `\` followed by a nonzero digit, which is a backreference
    /// unless it names more groups than have been opened so far.
    fn decimal_escape(&mut self, backslash: usize) -> NodeId {
        let digits_start = backslash + 1;
        self.pos = digits_start;

        let input = &self.chars[digits_start..];
        let (number, consumed) = match decimal().parse(input) {
            Ok(MatchStatus::Match {
                remainder, inner, ..
            }) => (inner, input.len() - remainder.len()),
            _ => (0, 0),
        };

        if (1..=9).contains(&number) || usize::from(number) <= self.paren_count {
            self.pos += consumed;
            return self.ast.push(NodeKind::BackRef(number.saturating_sub(1)));
        }

        let value = match self.digit_run(8).first() {
            Some(&first) => {
                self.pos += 1;
                self.octal(first)
            }
            None => 0,
        };
        self.warn(Warning::OctalEscape {
            offset: backslash,
            value,
        });

        self.ast.push(NodeKind::Flat {
            unit: value,
            source: None,
        })
    }

    /// Continues an octal escape whose first digit has been consumed,
    /// reading at most two more digits without exceeding `0o377`.
    fn octal(&mut self, first: u16) -> u16 {
        let steps: Vec<u16> = self
            .digit_run(8)
            .into_iter()
            .take(2)
            .scan(first, |value, digit| {
                *value = *value * 8 + digit;
                (*value <= 0o377).then_some(*value)
            })
            .collect();

        self.pos += steps.len();
        steps.last().copied().unwrap_or(first)
    }

    /// Reads the digits of a `\x` or `\u` escape. A non-hex digit backs off
    /// to the escape letter as a literal, while the end of the pattern yields
    /// the digits read so far.
    fn hex(&mut self, digits: usize) -> u16 {
        let run = self.digit_run(16);
        let read = run.len().min(digits);
        if read < digits && self.pos + read < self.chars.len() {
            return self.src[self.pos - 1];
        }

        self.pos += read;
        run[..read].iter().fold(0, |value, &digit| (value << 4) | digit)
    }
}

// Quantifier bounds

fn range_quantifier<'a>(
) -> impl parcel::Parser<'a, &'a [(usize, char)], (u16, Option<Option<u16>>)> {
    parcel::left(parcel::join(
        parcel::right(parcel::join(
            expect_character('{'),
            parcel::join(
                decimal(),
                parcel::optional(parcel::right(parcel::join(
                    expect_character(','),
                    parcel::optional(decimal()),
                ))),
            ),
        )),
        expect_character('}'),
    ))
}

/// A run of decimal digits, saturating at the 16-bit maximum.
fn decimal<'a>() -> impl parcel::Parser<'a, &'a [(usize, char)], u16> {
    parcel::one_or_more(digit(10)).map(|digits| {
        digits
            .into_iter()
            .filter_map(|d| d.to_digit(10))
            .fold(0u16, |acc, d| acc.saturating_mul(10).saturating_add(d as u16))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16(src: &str) -> Vec<u16> {
        src.encode_utf16().collect()
    }

    fn describe(ast: &Ast, head: NodeId) -> String {
        ast.iter_chain(head)
            .map(|id| describe_node(ast, id))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn describe_node(ast: &Ast, id: NodeId) -> String {
        match ast.kind(id) {
            NodeKind::Empty => "empty".to_string(),
            NodeKind::Bol => "^".to_string(),
            NodeKind::Eol => "$".to_string(),
            NodeKind::WordBoundary => "\\b".to_string(),
            NodeKind::NonWordBoundary => "\\B".to_string(),
            NodeKind::Dot => ".".to_string(),
            NodeKind::Digit => "\\d".to_string(),
            NodeKind::NonDigit => "\\D".to_string(),
            NodeKind::Alnum => "\\w".to_string(),
            NodeKind::NonAlnum => "\\W".to_string(),
            NodeKind::Space => "\\s".to_string(),
            NodeKind::NonSpace => "\\S".to_string(),
            NodeKind::BackRef(paren) => format!("ref({})", paren),
            NodeKind::Flat { unit, .. } => {
                format!("{:?}", char::from_u32(u32::from(unit)).unwrap_or('?'))
            }
            NodeKind::Class { index, negated } => {
                format!("{}class({})", if negated { "n" } else { "" }, index)
            }
            NodeKind::Alt { kid, kid2 } => {
                format!("alt({}, {})", describe(ast, kid), describe(ast, kid2))
            }
            NodeKind::Group { paren, kid } => format!("group{}({})", paren, describe(ast, kid)),
            NodeKind::NonCapturing { kid } => format!("(?:{})", describe(ast, kid)),
            NodeKind::Assert { negated, kid } => {
                format!("(?{}{})", if negated { '!' } else { '=' }, describe(ast, kid))
            }
            NodeKind::Quant { bounds, kid } => format!(
                "{}{{{},{}}}[{}+{}]({})",
                if bounds.greedy { "" } else { "lazy" },
                bounds.min,
                bounds.max.map_or("inf".to_string(), |max| max.to_string()),
                bounds.paren_index,
                bounds.paren_count,
                describe(ast, kid)
            ),
        }
    }

    fn parse_and_describe(pattern: &str, flags: Flags) -> Result<String, SyntaxErrorKind> {
        parse(&utf16(pattern), flags)
            .map(|parsed| describe(&parsed.ast, parsed.root))
            .map_err(|e| e.kind())
    }

    #[test]
    fn should_parse_literals_and_escapes() {
        let input_output = [
            ("ab", "'a' 'b'"),
            ("", "empty"),
            ("\\n\\x41\\u0042", "'\\n' 'A' 'B'"),
            ("\\x4g", "'x' '4' 'g'"),
            ("\\x4", "'\\u{4}'"),
            ("\\cJ", "'\\n'"),
            ("\\c1", "'\\\\' 'c' '1'"),
            ("\\0", "'\\0'"),
            ("\\012", "'\\n'"),
            ("\\d\\W\\b.", "\\d \\W \\b ."),
            ("\\$\\/", "'$' '/'"),
            ("a{", "'a' '{'"),
            ("a{,2}", "'a' '{' ',' '2' '}'"),
            ("}]", "'}' ']'"),
        ];

        for (test_id, (pattern, expected)) in input_output.into_iter().enumerate() {
            let res = parse_and_describe(pattern, Flags::empty());
            assert_eq!((test_id, Ok(expected.to_string())), (test_id, res));
        }
    }

    #[test]
    fn should_disambiguate_backreferences_from_octal_escapes() {
        let input_output = [
            ("(a)\\1", "group0('a') ref(0)"),
            // single digits are always backreferences.
            ("\\1(a)", "ref(0) group0('a')"),
            ("\\12", "'\\n'"),
            ("\\81", "'\\0' '8' '1'"),
            ("\\400", "' ' '0'"),
            (
                "(a)(b)(c)(d)(e)(f)(g)(h)(i)(j)\\10",
                "group0('a') group1('b') group2('c') group3('d') group4('e') group5('f') group6('g') group7('h') group8('i') group9('j') ref(9)",
            ),
            // only groups opened before the escape count.
            (
                "\\10(a)(b)(c)(d)(e)(f)(g)(h)(i)(j)",
                "'\\u{8}' group0('a') group1('b') group2('c') group3('d') group4('e') group5('f') group6('g') group7('h') group8('i') group9('j')",
            ),
        ];

        for (test_id, (pattern, expected)) in input_output.into_iter().enumerate() {
            let res = parse_and_describe(pattern, Flags::empty());
            assert_eq!((test_id, Ok(expected.to_string())), (test_id, res));
        }
    }

    #[test]
    fn should_parse_quantifiers() {
        let input_output = [
            ("a*", "{0,inf}[0+0]('a')"),
            ("a+?", "lazy{1,inf}[0+0]('a')"),
            ("a??", "lazy{0,1}[0+0]('a')"),
            ("a{2,3}", "{2,3}[0+0]('a')"),
            ("a{2}", "{2,2}[0+0]('a')"),
            ("a{2,}", "{2,inf}[0+0]('a')"),
            ("a{2,65535}", "{2,inf}[0+0]('a')"),
            ("a{99999}", "{65535,inf}[0+0]('a')"),
            ("(a)(b(c))*", "group0('a') {0,inf}[1+2](group1('b' group2('c')))"),
            ("^*", "{0,inf}[0+0](^)"),
        ];

        for (test_id, (pattern, expected)) in input_output.into_iter().enumerate() {
            let res = parse_and_describe(pattern, Flags::empty());
            assert_eq!((test_id, Ok(expected.to_string())), (test_id, res));
        }
    }

    #[test]
    fn should_parse_alternations_and_groups() {
        let input_output = [
            ("a|b|", "alt('a', alt('b', empty))"),
            ("ab|c", "alt('a' 'b', 'c')"),
            ("(?:a|b)c", "(?:alt('a', 'b')) 'c'"),
            ("(?=b)(?!c)", "(?='b') (?!'c')"),
            ("()", "group0(empty)"),
        ];

        for (test_id, (pattern, expected)) in input_output.into_iter().enumerate() {
            let res = parse_and_describe(pattern, Flags::empty());
            assert_eq!((test_id, Ok(expected.to_string())), (test_id, res));
        }
    }

    #[test]
    fn should_share_cells_between_identical_classes() {
        let parsed = parse(&utf16("[ab][ab][^ab]"), Flags::empty()).expect("valid pattern");

        assert_eq!(
            "class(0) class(0) nclass(1)",
            describe(&parsed.ast, parsed.root)
        );
        assert_eq!(
            vec![
                CharSet::new(1, 2, true, u16::from(b'b')),
                CharSet::new(9, 3, false, u16::from(b'b')),
            ],
            parsed.classes
        );
    }

    #[test]
    fn should_reject_invalid_patterns() {
        let deep = format!("{}{}", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
        let input_output = [
            ("(a", SyntaxErrorKind::UnterminatedGroup),
            ("(?:a", SyntaxErrorKind::UnterminatedGroup),
            ("a)", SyntaxErrorKind::UnmatchedParen),
            ("[a", SyntaxErrorKind::UnterminatedClass),
            ("[a\\]", SyntaxErrorKind::UnterminatedClass),
            ("a\\", SyntaxErrorKind::TrailingBackslash),
            ("*a", SyntaxErrorKind::NothingToRepeat),
            ("a**", SyntaxErrorKind::NothingToRepeat),
            ("a|+", SyntaxErrorKind::NothingToRepeat),
            ("(?x)", SyntaxErrorKind::NothingToRepeat),
            ("{1}", SyntaxErrorKind::NothingToRepeat),
            ("a{1}{2}", SyntaxErrorKind::NothingToRepeat),
            ("a{3,2}", SyntaxErrorKind::QuantifierOutOfOrder),
            ("[z-a]", SyntaxErrorKind::BadClassRange),
            ("[a-\\d]", SyntaxErrorKind::BadClassRange),
            (deep.as_str(), SyntaxErrorKind::TooDeeplyNested),
        ];

        for (test_id, (pattern, expected)) in input_output.into_iter().enumerate() {
            let res = parse_and_describe(pattern, Flags::empty());
            assert_eq!((test_id, Err(expected)), (test_id, res));
        }

        let nested = format!("{}{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert!(parse(&utf16(&nested), Flags::empty()).is_ok());
    }

    #[test]
    fn should_report_warnings_without_failing() {
        let input_output = [
            ("(a)\\1", vec![]),
            ("\\12", vec![Warning::OctalEscape { offset: 0, value: 10 }]),
            ("\\2(a)", vec![Warning::BackReferenceOutOfRange { number: 2 }]),
        ];

        for (test_id, (pattern, expected)) in input_output.into_iter().enumerate() {
            let res = parse(&utf16(pattern), Flags::empty()).map(|parsed| parsed.warnings);
            assert_eq!((test_id, Ok(expected)), (test_id, res));
        }
    }

    #[test]
    fn should_parse_flags() {
        let input_output = [
            ("", Ok(Flags::empty())),
            ("gim", Ok(Flags::GLOBAL | Flags::FOLD | Flags::MULTILINE)),
            ("gg", Ok(Flags::GLOBAL)),
            ("gx", Err("invalid regular expression flag x".to_string())),
        ];

        for (test_id, (flags, expected)) in input_output.into_iter().enumerate() {
            let res = parse_flags(flags).map_err(|e| e.to_string());
            assert_eq!((test_id, expected), (test_id, res));
        }
    }

    #[test]
    fn should_parse_whole_pattern_as_literal_when_flat() {
        let parsed = parse_flat(&utf16("a(b")).expect("literal pattern");

        assert_eq!("'a' '(' 'b'", describe(&parsed.ast, parsed.root));
        assert_eq!(0, parsed.paren_count);
    }
}

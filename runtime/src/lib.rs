//! Provides the immutable program representation and the backtracking
//! matcher for legacy ECMAScript regular expressions.
//!
//! A [Program] is produced by the `regexp_compiler` crate, or decoded from
//! its binary form with [bytecode::from_binary], and executed against UTF-16
//! input with [exec::execute].
//!
//! # Example
//!
//! ```rust
//! use regexp_runtime::exec::{execute, ExecMode, Execution, RegExpStatics};
//! use regexp_runtime::{AnchorHint, Flags, Op, Program};
//!
//! // The program for `/a/`: a single one-byte literal followed by `End`.
//! let program = Program::new(
//!     vec![Op::Flat1 as u8, b'a', Op::End as u8],
//!     "a".encode_utf16().collect(),
//!     Flags::empty(),
//!     0,
//!     AnchorHint::Char(u16::from(b'a')),
//!     vec![],
//! );
//!
//! let input: Vec<u16> = "cba".encode_utf16().collect();
//! let mut statics = RegExpStatics::default();
//!
//! match execute(&program, &input, 0, ExecMode::Match, &mut statics) {
//!     Execution::Matched(Some(m)) => assert_eq!(2, m.index()),
//!     other => panic!("unexpected result: {:?}", other),
//! }
//! ```

use std::fmt::{Debug, Display};

pub mod bytecode;
pub mod chars;
pub mod charset;
pub mod exec;
pub mod instruction;
mod matcher;

pub use charset::CharSet;
pub use exec::{execute, ExecMode, Execution, MatchResult, RegExpStatics};
pub use instruction::Instruction;

/// Width of every fixed-size operand in the bytecode.
pub const ARG_LEN: usize = 2;

/// The largest value an operand can encode.
pub const ARG_MAX: usize = u16::MAX as usize;

/// Encodes a repeat upper bound with no limit.
pub const UNBOUNDED: u16 = u16::MAX;

/// Reads a big-endian operand at `at`.
#[inline]
pub fn read_arg(code: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([code[at], code[at + 1]])
}

/// Reads a jump operand at `at`, returning the absolute target it encodes.
/// Offsets are relative to the operand itself.
#[inline]
pub fn read_offset(code: &[u8], at: usize) -> usize {
    at + usize::from(read_arg(code, at))
}

/// The closed set of operations understood by the matcher.
///
/// `Repeat` and `MinimalRepeat` never appear in emitted code; they are the
/// continuation operations recorded on the matcher stacks for quantifier
/// loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    Empty = 0,
    Bol,
    Eol,
    WordBoundary,
    NonWordBoundary,
    Dot,
    Digit,
    NonDigit,
    Alnum,
    NonAlnum,
    Space,
    NonSpace,
    BackRef,
    Flat,
    FlatI,
    Flat1,
    Flat1I,
    UcFlat1,
    UcFlat1I,
    Class,
    NClass,
    Alt,
    AltPrereq,
    AltPrereq2,
    Jump,
    EndAlt,
    LParen,
    RParen,
    Assert,
    AssertNot,
    AssertTest,
    AssertNotTest,
    Star,
    Plus,
    Opt,
    Quant,
    MinimalStar,
    MinimalPlus,
    MinimalOpt,
    MinimalQuant,
    Repeat,
    MinimalRepeat,
    EndChild,
    End,
}

const OPS: [Op; 44] = [
    Op::Empty,
    Op::Bol,
    Op::Eol,
    Op::WordBoundary,
    Op::NonWordBoundary,
    Op::Dot,
    Op::Digit,
    Op::NonDigit,
    Op::Alnum,
    Op::NonAlnum,
    Op::Space,
    Op::NonSpace,
    Op::BackRef,
    Op::Flat,
    Op::FlatI,
    Op::Flat1,
    Op::Flat1I,
    Op::UcFlat1,
    Op::UcFlat1I,
    Op::Class,
    Op::NClass,
    Op::Alt,
    Op::AltPrereq,
    Op::AltPrereq2,
    Op::Jump,
    Op::EndAlt,
    Op::LParen,
    Op::RParen,
    Op::Assert,
    Op::AssertNot,
    Op::AssertTest,
    Op::AssertNotTest,
    Op::Star,
    Op::Plus,
    Op::Opt,
    Op::Quant,
    Op::MinimalStar,
    Op::MinimalPlus,
    Op::MinimalOpt,
    Op::MinimalQuant,
    Op::Repeat,
    Op::MinimalRepeat,
    Op::EndChild,
    Op::End,
];

/// An undefined opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownOp(pub u8);

impl Display for UnknownOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown opcode {:#04x}", self.0)
    }
}

impl TryFrom<u8> for Op {
    type Error = UnknownOp;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        OPS.get(usize::from(value)).copied().ok_or(UnknownOp(value))
    }
}

impl Op {
    /// Returns `true` for operations that consume zero or one fixed run of
    /// input deterministically and never touch the matcher stacks.
    pub const fn is_simple(self) -> bool {
        matches!(
            self,
            Op::Empty
                | Op::Bol
                | Op::Eol
                | Op::WordBoundary
                | Op::NonWordBoundary
                | Op::Dot
                | Op::Digit
                | Op::NonDigit
                | Op::Alnum
                | Op::NonAlnum
                | Op::Space
                | Op::NonSpace
                | Op::BackRef
                | Op::Flat
                | Op::FlatI
                | Op::Flat1
                | Op::Flat1I
                | Op::UcFlat1
                | Op::UcFlat1I
                | Op::Class
                | Op::NClass
        )
    }

    /// Returns `true` for the case-insensitive literal variants.
    pub const fn is_folded(self) -> bool {
        matches!(self, Op::FlatI | Op::Flat1I | Op::UcFlat1I)
    }

    /// Returns `true` for the quantifier loop heads.
    pub const fn is_quantifier(self) -> bool {
        matches!(
            self,
            Op::Star
                | Op::Plus
                | Op::Opt
                | Op::Quant
                | Op::MinimalStar
                | Op::MinimalPlus
                | Op::MinimalOpt
                | Op::MinimalQuant
        )
    }

    /// The encoded width of the operation, including its operands.
    pub const fn width(self) -> usize {
        match self {
            Op::Flat1 | Op::Flat1I => 2,
            Op::BackRef
            | Op::UcFlat1
            | Op::UcFlat1I
            | Op::Class
            | Op::NClass
            | Op::Alt
            | Op::Jump
            | Op::LParen
            | Op::RParen
            | Op::Assert
            | Op::AssertNot => 1 + ARG_LEN,
            Op::Flat | Op::FlatI => 1 + 2 * ARG_LEN,
            Op::AltPrereq | Op::AltPrereq2 => 1 + 3 * ARG_LEN,
            Op::Star
            | Op::Plus
            | Op::Opt
            | Op::MinimalStar
            | Op::MinimalPlus
            | Op::MinimalOpt => 1 + 3 * ARG_LEN,
            Op::Quant | Op::MinimalQuant => 1 + 5 * ARG_LEN,
            _ => 1,
        }
    }

    /// The mnemonic used by the disassembler.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Op::Empty => "EMPTY",
            Op::Bol => "BOL",
            Op::Eol => "EOL",
            Op::WordBoundary => "WBDRY",
            Op::NonWordBoundary => "WNONBDRY",
            Op::Dot => "DOT",
            Op::Digit => "DIGIT",
            Op::NonDigit => "NONDIGIT",
            Op::Alnum => "ALNUM",
            Op::NonAlnum => "NONALNUM",
            Op::Space => "SPACE",
            Op::NonSpace => "NONSPACE",
            Op::BackRef => "BACKREF",
            Op::Flat => "FLAT",
            Op::FlatI => "FLATi",
            Op::Flat1 => "FLAT1",
            Op::Flat1I => "FLAT1i",
            Op::UcFlat1 => "UCFLAT1",
            Op::UcFlat1I => "UCFLAT1i",
            Op::Class => "CLASS",
            Op::NClass => "NCLASS",
            Op::Alt => "ALT",
            Op::AltPrereq => "ALTPREREQ",
            Op::AltPrereq2 => "ALTPREREQ2",
            Op::Jump => "JUMP",
            Op::EndAlt => "ENDALT",
            Op::LParen => "LPAREN",
            Op::RParen => "RPAREN",
            Op::Assert => "ASSERT",
            Op::AssertNot => "ASSERT_NOT",
            Op::AssertTest => "ASSERTTEST",
            Op::AssertNotTest => "ASSERTNOTTEST",
            Op::Star => "STAR",
            Op::Plus => "PLUS",
            Op::Opt => "OPT",
            Op::Quant => "QUANT",
            Op::MinimalStar => "MINIMALSTAR",
            Op::MinimalPlus => "MINIMALPLUS",
            Op::MinimalOpt => "MINIMALOPT",
            Op::MinimalQuant => "MINIMALQUANT",
            Op::Repeat => "REPEAT",
            Op::MinimalRepeat => "MINIMALREPEAT",
            Op::EndChild => "ENDCHILD",
            Op::End => "END",
        }
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// The flag bitmask a pattern is compiled with.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Flags(u8);

impl Flags {
    /// `g`: searches resume from and advance `lastIndex`.
    pub const GLOBAL: Flags = Flags(0b001);
    /// `i`: literals, backreferences and classes compare case-insensitively.
    pub const FOLD: Flags = Flags(0b010);
    /// `m`: `^` and `$` also match at line terminators.
    pub const MULTILINE: Flags = Flags(0b100);

    const ALL: u8 = 0b111;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `None` if any undefined bit is set.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::ALL == 0 {
            Some(Self(bits))
        } else {
            None
        }
    }

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn global(self) -> bool {
        self.contains(Self::GLOBAL)
    }

    pub const fn fold(self) -> bool {
        self.contains(Self::FOLD)
    }

    pub const fn multiline(self) -> bool {
        self.contains(Self::MULTILINE)
    }
}

impl std::ops::BitOr for Flags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0
    }
}

impl Display for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        [(Self::GLOBAL, 'g'), (Self::FOLD, 'i'), (Self::MULTILINE, 'm')]
            .into_iter()
            .filter(|(flag, _)| self.contains(*flag))
            .try_for_each(|(_, letter)| write!(f, "{}", letter))
    }
}

/// A hint, derived from the leading node of a pattern, that lets the search
/// loop skip start offsets that cannot begin a match.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AnchorHint {
    #[default]
    None,
    /// The pattern begins with `^`.
    StartOfLine,
    /// The pattern begins with a literal code unit.
    Char(u16),
    /// The pattern begins with a bracket expression, by class index.
    Class(u16),
    /// The pattern is an alternation whose branches begin with one of two
    /// literals.
    Prereq(u16, u16),
    /// The pattern is an alternation whose branches begin with a literal or a
    /// class, by class index.
    PrereqClass(u16, u16),
}

impl Display for AnchorHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnchorHint::None => write!(f, "none"),
            AnchorHint::StartOfLine => write!(f, "bol"),
            AnchorHint::Char(c) => write!(f, "char {}", DisplayUnit(*c)),
            AnchorHint::Class(idx) => write!(f, "class {}", idx),
            AnchorHint::Prereq(a, b) => write!(f, "{} or {}", DisplayUnit(*a), DisplayUnit(*b)),
            AnchorHint::PrereqClass(c, idx) => write!(f, "{} or class {}", DisplayUnit(*c), idx),
        }
    }
}

/// Formats a code unit as a quoted character when printable.
pub(crate) struct DisplayUnit(pub u16);

impl Display for DisplayUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match char::from_u32(u32::from(self.0)) {
            Some(c) if !c.is_control() => write!(f, "{:?}", c),
            _ => write!(f, "\\u{:04x}", self.0),
        }
    }
}

/// A compiled pattern.
///
/// Programs are immutable once built. The only interior mutability is the
/// lazily built bitmap of each [CharSet], so a program can be shared freely
/// between threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    code: Vec<u8>,
    source: Vec<u16>,
    flags: Flags,
    paren_count: usize,
    anchor: AnchorHint,
    classes: Vec<CharSet>,
}

impl Program {
    /// Assembles a program without checking it. The matcher assumes every
    /// operand is in bounds, so `code` must come from the compiler or have
    /// passed [bytecode::validate]; use [Program::try_new] otherwise.
    pub fn new(
        code: Vec<u8>,
        source: Vec<u16>,
        flags: Flags,
        paren_count: usize,
        anchor: AnchorHint,
        classes: Vec<CharSet>,
    ) -> Self {
        Self {
            code,
            source,
            flags,
            paren_count,
            anchor,
            classes,
        }
    }

    /// Assembles a program, rejecting code whose operands, jump targets or
    /// tables the matcher could not safely execute.
    pub fn try_new(
        code: Vec<u8>,
        source: Vec<u16>,
        flags: Flags,
        paren_count: usize,
        anchor: AnchorHint,
        classes: Vec<CharSet>,
    ) -> Result<Self, bytecode::BytecodeDeserializationError> {
        let program = Self::new(code, source, flags, paren_count, anchor, classes);
        bytecode::validate(&program)?;

        Ok(program)
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// The pattern source, which literal runs and classes index into.
    pub fn source(&self) -> &[u16] {
        &self.source
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// The number of capturing groups in the pattern.
    pub fn paren_count(&self) -> usize {
        self.paren_count
    }

    pub fn anchor(&self) -> AnchorHint {
        self.anchor
    }

    pub fn classes(&self) -> &[CharSet] {
        &self.classes
    }

    /// Tests `unit` against a class by index, honoring its sense.
    pub fn class_matches(&self, index: usize, unit: u16) -> bool {
        self.classes
            .get(index)
            .map_or(false, |set| set.matches(&self.source, self.flags.fold(), unit))
    }

    /// Tests raw bitmap membership of `unit` by class index.
    pub fn class_contains(&self, index: usize, unit: u16) -> bool {
        self.classes
            .get(index)
            .map_or(false, |set| set.contains(&self.source, self.flags.fold(), unit))
    }

    /// Iterates over the decoded instructions and their offsets.
    pub fn instructions(&self) -> instruction::Instructions<'_> {
        instruction::Instructions::new(&self.code)
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for decoded in self.instructions() {
            match decoded {
                Ok((pc, inst)) => writeln!(f, "{:04}: {}", pc, inst)?,
                Err(e) => return writeln!(f, "error: {}", e),
            }
        }

        Ok(())
    }
}

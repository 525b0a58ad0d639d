//! Decoding of individual instructions, shared by the disassembler and the
//! binary validator.

use std::fmt::Display;

use crate::bytecode::{BytecodeDeserializationError, BytecodeDeserializationErrorKind};
use crate::{read_arg, read_offset, DisplayUnit, Op, ARG_LEN, UNBOUNDED};

/// The operands of a quantifier loop head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantifier {
    pub op: Op,
    pub min: u16,
    /// `None` when the loop is unbounded.
    pub max: Option<u16>,
    pub greedy: bool,
    /// First capturing group inside the loop body.
    pub paren_index: u16,
    /// Number of capturing groups inside the loop body.
    pub paren_count: u16,
    /// Offset of the first instruction of the loop body.
    pub body: usize,
    /// Offset of the instruction following the loop.
    pub next: usize,
}

impl Quantifier {
    /// Reads the loop head at `pc`. The caller guarantees that `code[pc]` is
    /// `op`, a quantifier, and that its operands are in bounds.
    pub fn read(code: &[u8], pc: usize, op: Op) -> Self {
        let (min, max, at) = match op {
            Op::Star | Op::MinimalStar => (0, None, pc + 1),
            Op::Plus | Op::MinimalPlus => (1, None, pc + 1),
            Op::Opt | Op::MinimalOpt => (0, Some(1), pc + 1),
            _ => {
                let max = read_arg(code, pc + 1 + ARG_LEN);
                (
                    read_arg(code, pc + 1),
                    (max != UNBOUNDED).then_some(max),
                    pc + 1 + 2 * ARG_LEN,
                )
            }
        };

        let greedy = matches!(op, Op::Star | Op::Plus | Op::Opt | Op::Quant);

        Self {
            op,
            min,
            max,
            greedy,
            paren_index: read_arg(code, at),
            paren_count: read_arg(code, at + ARG_LEN),
            body: pc + op.width(),
            next: read_offset(code, at + 2 * ARG_LEN),
        }
    }
}

impl Display for Quantifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let max = self
            .max
            .map_or_else(|| "inf".to_string(), |max| max.to_string());

        write!(
            f,
            "{} {{{}, {}}} parens {}+{} -> {:04}",
            self.op, self.min, max, self.paren_index, self.paren_count, self.next
        )
    }
}

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// An operation without operands, `Empty` through `NonSpace`.
    Simple(Op),
    BackRef {
        paren: u16,
    },
    /// A multi-unit literal stored in the pattern source.
    Flat {
        fold: bool,
        offset: u16,
        length: u16,
    },
    Flat1 {
        fold: bool,
        unit: u8,
    },
    UcFlat1 {
        fold: bool,
        unit: u16,
    },
    Class {
        negated: bool,
        index: u16,
    },
    Alt {
        alternate: usize,
    },
    AltPrereq {
        alternate: usize,
        first: u16,
        second: u16,
    },
    AltPrereq2 {
        alternate: usize,
        unit: u16,
        class: u16,
    },
    Jump {
        target: usize,
    },
    EndAlt,
    LParen {
        paren: u16,
    },
    RParen {
        paren: u16,
    },
    Assert {
        negated: bool,
        /// Offset of the matching assertion test.
        test: usize,
    },
    AssertTest {
        negated: bool,
    },
    Quantifier(Quantifier),
    EndChild,
    End,
}

impl Instruction {
    /// Decodes the instruction at `pc`, returning it along with its width.
    pub fn decode(code: &[u8], pc: usize) -> Result<(Self, usize), BytecodeDeserializationError> {
        let byte = *code.get(pc).ok_or_else(|| {
            BytecodeDeserializationError::new(BytecodeDeserializationErrorKind::UnexpectedEndOfCode)
                .with_data(format!("at {:04}", pc))
        })?;
        let op = Op::try_from(byte).map_err(|e| {
            BytecodeDeserializationError::new(BytecodeDeserializationErrorKind::InvalidOpcode)
                .with_data(format!("{} at {:04}", e.0, pc))
        })?;

        let width = op.width();
        if pc + width > code.len() {
            return Err(BytecodeDeserializationError::new(
                BytecodeDeserializationErrorKind::UnexpectedEndOfCode,
            )
            .with_data(format!("{} at {:04}", op, pc)));
        }

        let arg = |n: usize| read_arg(code, pc + 1 + n * ARG_LEN);
        let offset = |n: usize| read_offset(code, pc + 1 + n * ARG_LEN);

        let inst = match op {
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
            | Op::NonSpace => Instruction::Simple(op),
            Op::BackRef => Instruction::BackRef { paren: arg(0) },
            Op::Flat | Op::FlatI => Instruction::Flat {
                fold: op.is_folded(),
                offset: arg(0),
                length: arg(1),
            },
            Op::Flat1 | Op::Flat1I => Instruction::Flat1 {
                fold: op.is_folded(),
                unit: code[pc + 1],
            },
            Op::UcFlat1 | Op::UcFlat1I => Instruction::UcFlat1 {
                fold: op.is_folded(),
                unit: arg(0),
            },
            Op::Class | Op::NClass => Instruction::Class {
                negated: op == Op::NClass,
                index: arg(0),
            },
            Op::Alt => Instruction::Alt {
                alternate: offset(0),
            },
            Op::AltPrereq => Instruction::AltPrereq {
                alternate: offset(0),
                first: arg(1),
                second: arg(2),
            },
            Op::AltPrereq2 => Instruction::AltPrereq2 {
                alternate: offset(0),
                unit: arg(1),
                class: arg(2),
            },
            Op::Jump => Instruction::Jump { target: offset(0) },
            Op::EndAlt => Instruction::EndAlt,
            Op::LParen => Instruction::LParen { paren: arg(0) },
            Op::RParen => Instruction::RParen { paren: arg(0) },
            Op::Assert | Op::AssertNot => Instruction::Assert {
                negated: op == Op::AssertNot,
                test: offset(0),
            },
            Op::AssertTest | Op::AssertNotTest => Instruction::AssertTest {
                negated: op == Op::AssertNotTest,
            },
            Op::Star
            | Op::Plus
            | Op::Opt
            | Op::Quant
            | Op::MinimalStar
            | Op::MinimalPlus
            | Op::MinimalOpt
            | Op::MinimalQuant => Instruction::Quantifier(Quantifier::read(code, pc, op)),
            Op::EndChild => Instruction::EndChild,
            Op::End => Instruction::End,
            Op::Repeat | Op::MinimalRepeat => {
                return Err(BytecodeDeserializationError::new(
                    BytecodeDeserializationErrorKind::InvalidOpcode,
                )
                .with_data(format!("continuation {} at {:04}", op, pc)))
            }
        };

        Ok((inst, width))
    }

    /// Every absolute offset the instruction may transfer control to.
    pub fn targets(&self) -> Vec<usize> {
        match self {
            Instruction::Alt { alternate }
            | Instruction::AltPrereq { alternate, .. }
            | Instruction::AltPrereq2 { alternate, .. } => vec![*alternate],
            Instruction::Jump { target } => vec![*target],
            Instruction::Assert { test, .. } => vec![*test],
            Instruction::Quantifier(q) => vec![q.body, q.next],
            _ => vec![],
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Simple(op) => write!(f, "{}", op),
            Instruction::BackRef { paren } => write!(f, "{} {}", Op::BackRef, paren),
            Instruction::Flat {
                fold,
                offset,
                length,
            } => {
                let op = if *fold { Op::FlatI } else { Op::Flat };
                write!(f, "{} {}, {}", op, offset, length)
            }
            Instruction::Flat1 { fold, unit } => {
                let op = if *fold { Op::Flat1I } else { Op::Flat1 };
                write!(f, "{} {}", op, DisplayUnit(u16::from(*unit)))
            }
            Instruction::UcFlat1 { fold, unit } => {
                let op = if *fold { Op::UcFlat1I } else { Op::UcFlat1 };
                write!(f, "{} {}", op, DisplayUnit(*unit))
            }
            Instruction::Class { negated, index } => {
                let op = if *negated { Op::NClass } else { Op::Class };
                write!(f, "{} {}", op, index)
            }
            Instruction::Alt { alternate } => write!(f, "{} -> {:04}", Op::Alt, alternate),
            Instruction::AltPrereq {
                alternate,
                first,
                second,
            } => write!(
                f,
                "{} {}, {} -> {:04}",
                Op::AltPrereq,
                DisplayUnit(*first),
                DisplayUnit(*second),
                alternate
            ),
            Instruction::AltPrereq2 {
                alternate,
                unit,
                class,
            } => write!(
                f,
                "{} {}, class {} -> {:04}",
                Op::AltPrereq2,
                DisplayUnit(*unit),
                class,
                alternate
            ),
            Instruction::Jump { target } => write!(f, "{} -> {:04}", Op::Jump, target),
            Instruction::EndAlt => write!(f, "{}", Op::EndAlt),
            Instruction::LParen { paren } => write!(f, "{} {}", Op::LParen, paren),
            Instruction::RParen { paren } => write!(f, "{} {}", Op::RParen, paren),
            Instruction::Assert { negated, test } => {
                let op = if *negated { Op::AssertNot } else { Op::Assert };
                write!(f, "{} -> {:04}", op, test)
            }
            Instruction::AssertTest { negated } => {
                let op = if *negated {
                    Op::AssertNotTest
                } else {
                    Op::AssertTest
                };
                write!(f, "{}", op)
            }
            Instruction::Quantifier(q) => Display::fmt(q, f),
            Instruction::EndChild => write!(f, "{}", Op::EndChild),
            Instruction::End => write!(f, "{}", Op::End),
        }
    }
}

/// A linear walk over the instructions of a code buffer.
#[derive(Debug, Clone)]
pub struct Instructions<'c> {
    code: &'c [u8],
    pc: usize,
    failed: bool,
}

impl<'c> Instructions<'c> {
    pub fn new(code: &'c [u8]) -> Self {
        Self {
            code,
            pc: 0,
            failed: false,
        }
    }
}

impl<'c> Iterator for Instructions<'c> {
    type Item = Result<(usize, Instruction), BytecodeDeserializationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pc >= self.code.len() {
            return None;
        }

        let pc = self.pc;
        match Instruction::decode(self.code, pc) {
            Ok((inst, width)) => {
                self.pc += width;
                Some(Ok((pc, inst)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

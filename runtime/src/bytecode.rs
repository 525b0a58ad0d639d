//! Provides utilities for deserializing a binary representation of a
//! compiled program.
//!
//! The layout is a 32-byte little-endian header, the UTF-16 pattern source,
//! the class table and finally the code buffer verbatim:
//!
//! | offset | width | field                                   |
//! |--------|-------|-----------------------------------------|
//! | 0      | 2     | magic number `0xF0F0`                   |
//! | 2      | 1     | flag bits                               |
//! | 3      | 1     | anchor hint variant                     |
//! | 4      | 4     | first anchor hint operand               |
//! | 8      | 4     | second anchor hint operand              |
//! | 12     | 4     | capturing group count                   |
//! | 16     | 4     | source length in code units             |
//! | 20     | 4     | class count                             |
//! | 24     | 4     | code length in bytes                    |
//! | 28     | 4     | unused                                  |
//!
//! Each class is stored as a start and length into the source, both 32
//! bits. The sense and bitmap size of a class are derived from its source
//! on load.

use std::collections::BTreeSet;

use crate::charset::scan_class;
use crate::instruction::Instruction;
use crate::{AnchorHint, CharSet, Flags, Program, ARG_MAX};

/// Marks the start of a serialized program.
pub const MAGIC_NUMBER: u16 = 0xF0F0;

/// Width of the fixed program header.
pub const HEADER_LEN: usize = 32;

/// Width of a serialized class table entry.
pub const CLASS_ENTRY_LEN: usize = 8;

/// Attempts to convert a binary representation of a program into its
/// corresponding internal representation.
///
/// # Example
/// ```
/// use regexp_runtime::bytecode::from_binary;
/// use regexp_runtime::{AnchorHint, Op};
///
/// let mut bin = vec![
///     0xF0, 0xF0, 0, 2, 97, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 3,
///     0, 0, 0, 0, 0, 0, 0,
/// ];
/// // the source `a`, followed by the code.
/// bin.extend([97, 0, Op::Flat1 as u8, 97, Op::End as u8]);
///
/// let program = from_binary(bin).expect("valid program");
///
/// assert_eq!(AnchorHint::Char(97), program.anchor());
/// assert_eq!(&[Op::Flat1 as u8, 97, Op::End as u8], program.code());
/// ```
pub fn from_binary<B: AsRef<[u8]>>(bin: B) -> Result<Program, BytecodeDeserializationError> {
    Program::from_bytecode(bin)
}

/// Represents all error types that may _expectedly_ occur during
/// deserialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BytecodeDeserializationErrorKind {
    /// Generic header errors, generally triggered at the initial program
    /// header.
    InvalidHeader,
    /// The flag byte sets an undefined bit.
    InvalidFlags,
    /// Anchor hint byte exceeds the allowable range of 0-5.
    AnchorVariantOutOfRange,
    IntegerConversionToUsize,
    /// A class table entry is out of bounds or describes an invalid class.
    InvalidCharacterSetHeader,
    /// The end of a header is reached prior to completed parsing.
    UnexpectedEndOfHeader,
    /// An instruction's operands extend beyond the end of the code.
    UnexpectedEndOfCode,
    /// Represents a deserialization error for an undefined opcode.
    InvalidOpcode,
    /// A valid opcode has been provided but with an invalid operand.
    InvalidOperand,
    /// A jump lands outside the code or inside another instruction.
    InvalidJumpTarget,
    /// The code does not terminate with an `End` instruction.
    MissingEnd,
}

/// Represents all error types that may _expectedly_ occur during
/// deserialization. Including the error kind and any optional
/// enriching data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytecodeDeserializationError {
    /// The type of triggered error.
    kind: BytecodeDeserializationErrorKind,
    /// Additional error data.
    data: Option<String>,
}

impl BytecodeDeserializationError {
    /// Instantiates a new error.
    pub fn new(kind: BytecodeDeserializationErrorKind) -> Self {
        Self { kind, data: None }
    }

    /// Associates additional data with the error, returning the modified error.
    pub fn with_data(mut self, data: String) -> Self {
        self.with_data_mut(data);
        self
    }

    /// Associates additional data with the error.
    pub fn with_data_mut(&mut self, data: String) {
        self.data = Some(data);
    }

    pub fn kind(&self) -> &BytecodeDeserializationErrorKind {
        &self.kind
    }
}

impl std::fmt::Display for BytecodeDeserializationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.data.as_deref().unwrap_or_default();
        let padding = if self.data.is_some() { " " } else { "" };

        match &self.kind {
            BytecodeDeserializationErrorKind::InvalidHeader => {
                write!(f, "invalid header{}{}", padding, data)
            }
            BytecodeDeserializationErrorKind::InvalidFlags => {
                write!(f, "invalid flags {}", data)
            }
            BytecodeDeserializationErrorKind::AnchorVariantOutOfRange => {
                write!(f, "anchor variant {}{}out of range", data, padding)
            }
            BytecodeDeserializationErrorKind::IntegerConversionToUsize => {
                write!(f, "unable to convert {}{}to ptr sized value", data, padding)
            }
            BytecodeDeserializationErrorKind::InvalidCharacterSetHeader => {
                write!(f, "invalid character set header{}{}", padding, data)
            }
            BytecodeDeserializationErrorKind::UnexpectedEndOfHeader => {
                write!(f, "unexpected end of header")
            }
            BytecodeDeserializationErrorKind::UnexpectedEndOfCode => {
                write!(f, "unexpected end of code{}{}", padding, data)
            }
            BytecodeDeserializationErrorKind::InvalidOpcode => write!(f, "unknown opcode {}", data),
            BytecodeDeserializationErrorKind::InvalidOperand => {
                write!(f, "invalid operand {}", data)
            }
            BytecodeDeserializationErrorKind::InvalidJumpTarget => {
                write!(f, "invalid jump target {}", data)
            }
            BytecodeDeserializationErrorKind::MissingEnd => {
                write!(f, "program does not terminate with END")
            }
        }
    }
}

impl std::error::Error for BytecodeDeserializationError {}

pub trait FromBytecode<B: AsRef<[u8]>> {
    // The output type of a successful match.
    type Output;
    // An alternate error type.
    type Error;

    fn from_bytecode(bin: B) -> Result<Self::Output, Self::Error>;
}

impl AnchorHint {
    /// Splits the hint into its serialized variant byte and operands.
    pub fn to_parts(self) -> (u8, u32, u32) {
        match self {
            AnchorHint::None => (0, 0, 0),
            AnchorHint::StartOfLine => (1, 0, 0),
            AnchorHint::Char(unit) => (2, u32::from(unit), 0),
            AnchorHint::Class(index) => (3, u32::from(index), 0),
            AnchorHint::Prereq(first, second) => (4, u32::from(first), u32::from(second)),
            AnchorHint::PrereqClass(unit, index) => (5, u32::from(unit), u32::from(index)),
        }
    }

    fn from_parts(variant: u8, a: u32, b: u32) -> Result<Self, BytecodeDeserializationError> {
        let operand = |value: u32| {
            u16::try_from(value).map_err(|_| {
                BytecodeDeserializationError::new(BytecodeDeserializationErrorKind::InvalidOperand)
                    .with_data(format!("anchor operand {}", value))
            })
        };

        match variant {
            0 => Ok(AnchorHint::None),
            1 => Ok(AnchorHint::StartOfLine),
            2 => Ok(AnchorHint::Char(operand(a)?)),
            3 => Ok(AnchorHint::Class(operand(a)?)),
            4 => Ok(AnchorHint::Prereq(operand(a)?, operand(b)?)),
            5 => Ok(AnchorHint::PrereqClass(operand(a)?, operand(b)?)),
            other => Err(BytecodeDeserializationError::new(
                BytecodeDeserializationErrorKind::AnchorVariantOutOfRange,
            )
            .with_data(other.to_string())),
        }
    }
}

fn read_u32_le(bin: &[u8], at: usize) -> Result<usize, BytecodeDeserializationError> {
    let bytes: [u8; 4] = bin
        .get(at..at + 4)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| {
            BytecodeDeserializationError::new(BytecodeDeserializationErrorKind::UnexpectedEndOfHeader)
        })?;
    let value = u32::from_le_bytes(bytes);

    usize::try_from(value).map_err(|_| {
        BytecodeDeserializationError::new(BytecodeDeserializationErrorKind::IntegerConversionToUsize)
            .with_data(value.to_string())
    })
}

fn section(bin: &[u8], start: usize, len: usize) -> Result<&[u8], BytecodeDeserializationError> {
    start
        .checked_add(len)
        .and_then(|end| bin.get(start..end))
        .ok_or_else(|| {
            BytecodeDeserializationError::new(BytecodeDeserializationErrorKind::UnexpectedEndOfHeader)
                .with_data(format!("section at {} of {} bytes", start, len))
        })
}

impl<B: AsRef<[u8]>> FromBytecode<B> for Program {
    type Output = Self;

    type Error = BytecodeDeserializationError;

    fn from_bytecode(bin: B) -> Result<Self::Output, Self::Error> {
        let bin = bin.as_ref();
        if bin.len() < HEADER_LEN {
            return Err(BytecodeDeserializationError::new(
                BytecodeDeserializationErrorKind::UnexpectedEndOfHeader,
            ));
        }

        if bin[..2] != MAGIC_NUMBER.to_le_bytes() {
            return Err(BytecodeDeserializationError::new(
                BytecodeDeserializationErrorKind::InvalidHeader,
            )
            .with_data(format!("magic number {:#04x}{:02x}", bin[1], bin[0])));
        }

        let flags = Flags::from_bits(bin[2]).ok_or_else(|| {
            BytecodeDeserializationError::new(BytecodeDeserializationErrorKind::InvalidFlags)
                .with_data(format!("{:#010b}", bin[2]))
        })?;
        let anchor = AnchorHint::from_parts(
            bin[3],
            read_u32_le(bin, 4)? as u32,
            read_u32_le(bin, 8)? as u32,
        )?;
        let paren_count = read_u32_le(bin, 12)?;
        let source_len = read_u32_le(bin, 16)?;
        let class_count = read_u32_le(bin, 20)?;
        let code_len = read_u32_le(bin, 24)?;

        let mut offset = HEADER_LEN;
        let source: Vec<u16> = section(bin, offset, source_len * 2)?
            .chunks_exact(2)
            .map(|unit| u16::from_le_bytes([unit[0], unit[1]]))
            .collect();
        offset += source_len * 2;

        let class_bytes = section(bin, offset, class_count * CLASS_ENTRY_LEN)?;
        offset += class_count * CLASS_ENTRY_LEN;
        let classes = class_bytes
            .chunks_exact(CLASS_ENTRY_LEN)
            .map(|entry| {
                let start = read_u32_le(entry, 0)?;
                let length = read_u32_le(entry, 4)?;
                let body = start
                    .checked_add(length)
                    .and_then(|end| source.get(start..end))
                    .ok_or_else(|| {
                        BytecodeDeserializationError::new(
                            BytecodeDeserializationErrorKind::InvalidCharacterSetHeader,
                        )
                        .with_data(format!("{}..{}", start, start.saturating_add(length)))
                    })?;
                let summary = scan_class(body, flags.fold()).map_err(|e| {
                    BytecodeDeserializationError::new(
                        BytecodeDeserializationErrorKind::InvalidCharacterSetHeader,
                    )
                    .with_data(e.to_string())
                })?;

                Ok(CharSet::new(start, length, summary.sense, summary.size))
            })
            .collect::<Result<Vec<_>, BytecodeDeserializationError>>()?;

        let code = section(bin, offset, code_len)?.to_vec();

        Program::try_new(code, source, flags, paren_count, anchor, classes)
    }
}

/// Checks every operand of a program against the program's own tables, so
/// that the matcher never indexes out of bounds.
pub fn validate(program: &Program) -> Result<(), BytecodeDeserializationError> {
    let invalid_operand = |pc: usize, inst: &Instruction| {
        BytecodeDeserializationError::new(BytecodeDeserializationErrorKind::InvalidOperand)
            .with_data(format!("{:04}: {}", pc, inst))
    };
    let class_count = program.classes().len();
    let paren_count = program.paren_count();

    // every paren index must fit an operand.
    if paren_count > ARG_MAX + 1 {
        return Err(
            BytecodeDeserializationError::new(BytecodeDeserializationErrorKind::InvalidOperand)
                .with_data(format!("paren count {}", paren_count)),
        );
    }

    let decoded = program
        .instructions()
        .collect::<Result<Vec<_>, BytecodeDeserializationError>>()?;
    let boundaries: BTreeSet<usize> = decoded.iter().map(|(pc, _)| *pc).collect();

    for (pc, inst) in decoded.iter() {
        let in_bounds = match inst {
            Instruction::Flat { offset, length, .. } => {
                usize::from(*offset) + usize::from(*length) <= program.source().len()
            }
            Instruction::Class { index, .. } | Instruction::AltPrereq2 { class: index, .. } => {
                usize::from(*index) < class_count
            }
            Instruction::LParen { paren } | Instruction::RParen { paren } => {
                usize::from(*paren) < paren_count
            }
            Instruction::Quantifier(quant) => {
                usize::from(quant.paren_index) + usize::from(quant.paren_count) <= paren_count
                    && quant.max.map_or(true, |max| quant.min <= max)
            }
            _ => true,
        };
        if !in_bounds {
            return Err(invalid_operand(*pc, inst));
        }

        if let Some(target) = inst.targets().into_iter().find(|t| !boundaries.contains(t)) {
            return Err(BytecodeDeserializationError::new(
                BytecodeDeserializationErrorKind::InvalidJumpTarget,
            )
            .with_data(format!("{:04} from {:04}", target, pc)));
        }
    }

    match decoded.last() {
        Some((_, Instruction::End)) => Ok(()),
        _ => Err(BytecodeDeserializationError::new(
            BytecodeDeserializationErrorKind::MissingEnd,
        )),
    }?;

    match program.anchor() {
        AnchorHint::Class(index) | AnchorHint::PrereqClass(_, index)
            if usize::from(index) >= class_count =>
        {
            Err(BytecodeDeserializationError::new(
                BytecodeDeserializationErrorKind::InvalidOperand,
            )
            .with_data(format!("anchor class {}", index)))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Op;

    fn header(flags: u8, anchor: (u8, u32, u32), counts: [u32; 4]) -> Vec<u8> {
        let mut bin = Vec::with_capacity(HEADER_LEN);
        bin.extend(MAGIC_NUMBER.to_le_bytes());
        bin.push(flags);
        bin.push(anchor.0);
        bin.extend(anchor.1.to_le_bytes());
        bin.extend(anchor.2.to_le_bytes());
        for count in counts {
            bin.extend(count.to_le_bytes());
        }
        bin.extend([0u8; 4]);
        bin
    }

    #[test]
    fn should_decode_program_with_classes() {
        // `/[^a]/i`
        let mut bin = header(0b010, (3, 0, 0), [0, 4, 1, 4]);
        bin.extend("[^a]".encode_utf16().flat_map(u16::to_le_bytes));
        bin.extend(1u32.to_le_bytes());
        bin.extend(2u32.to_le_bytes());
        bin.extend([Op::NClass as u8, 0, 0, Op::End as u8]);

        let program = from_binary(&bin).expect("valid program");

        assert_eq!(Flags::FOLD, program.flags());
        assert_eq!(AnchorHint::Class(0), program.anchor());
        assert_eq!(
            &[CharSet::new(1, 2, false, u16::from(b'a'))],
            program.classes()
        );
    }

    #[test]
    fn should_reject_malformed_programs() {
        let end_only = [Op::End as u8];
        let input_output = [
            (
                vec![0u8; 4],
                BytecodeDeserializationErrorKind::UnexpectedEndOfHeader,
            ),
            (
                {
                    let mut bin = header(0, (0, 0, 0), [0, 0, 0, 1]);
                    bin[0] = 0;
                    bin.extend(end_only);
                    bin
                },
                BytecodeDeserializationErrorKind::InvalidHeader,
            ),
            (
                {
                    let mut bin = header(0b1000, (0, 0, 0), [0, 0, 0, 1]);
                    bin.extend(end_only);
                    bin
                },
                BytecodeDeserializationErrorKind::InvalidFlags,
            ),
            (
                {
                    let mut bin = header(0, (9, 0, 0), [0, 0, 0, 1]);
                    bin.extend(end_only);
                    bin
                },
                BytecodeDeserializationErrorKind::AnchorVariantOutOfRange,
            ),
            (
                {
                    let mut bin = header(0, (0, 0, 0), [0, 0, 0, 3]);
                    bin.extend([Op::Class as u8, 0, 0]);
                    bin
                },
                BytecodeDeserializationErrorKind::InvalidOperand,
            ),
            (
                {
                    let mut bin = header(0, (0, 0, 0), [0, 0, 0, 5]);
                    bin.extend([Op::Jump as u8, 0, 1, Op::Dot as u8, Op::End as u8]);
                    bin
                },
                BytecodeDeserializationErrorKind::InvalidJumpTarget,
            ),
            (
                {
                    let mut bin = header(0, (0, 0, 0), [0, 0, 0, 1]);
                    bin.push(Op::Dot as u8);
                    bin
                },
                BytecodeDeserializationErrorKind::MissingEnd,
            ),
            (
                {
                    let mut bin = header(0, (0, 0, 0), [0, 0, 0, 1]);
                    bin.push(0xEE);
                    bin
                },
                BytecodeDeserializationErrorKind::InvalidOpcode,
            ),
            (
                {
                    let mut bin = header(0, (0, 0, 0), [0, 3, 1, 1]);
                    bin.extend("z-a".encode_utf16().flat_map(u16::to_le_bytes));
                    bin.extend(0u32.to_le_bytes());
                    bin.extend(3u32.to_le_bytes());
                    bin.push(Op::End as u8);
                    bin
                },
                BytecodeDeserializationErrorKind::InvalidCharacterSetHeader,
            ),
            (
                {
                    let mut bin = header(0, (0, 0, 0), [u32::MAX, 0, 0, 1]);
                    bin.push(Op::End as u8);
                    bin
                },
                BytecodeDeserializationErrorKind::InvalidOperand,
            ),
        ];

        for (test_id, (bin, expected)) in input_output.into_iter().enumerate() {
            let res = from_binary(bin).map_err(|e| e.kind().clone());
            assert_eq!((test_id, Err(expected)), (test_id, res));
        }
    }
}

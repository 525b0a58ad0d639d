//! Provides methods and types to facilitate the compilation of a parsed
//! pattern into runtime bytecode.
//!
//! Every operand is a 2-byte big-endian value. Jump operands are forward
//! offsets relative to the operand itself and are patched once their target
//! is known, since a child is always emitted before the code that needs its
//! length.
//!
//! # Example
//!
//! ```
//! use regexp_compiler::compile_str;
//!
//! let program = compile_str("a|b", "").expect("valid pattern");
//!
//! assert_eq!(
//!     "0000: ALTPREREQ 'a', 'b' -> 0012
//! 0007: FLAT1 'a'
//! 0009: JUMP -> 0014
//! 0012: FLAT1 'b'
//! 0014: ENDALT
//! 0015: END
//! ",
//!     program.to_string()
//! );
//! ```

use log::debug;

use regexp_runtime::{AnchorHint, Flags, Op, Program, ARG_MAX, UNBOUNDED};

use crate::ast::{Ast, NodeId, NodeKind, QuantBounds};
use crate::parser::{self, ParsedPattern, SyntaxError, SyntaxErrorKind, Warning};

/// Compiles a pattern and its flags into a [Program]. With `force_flat` the
/// pattern is matched as a literal string.
pub fn compile(pattern: &[u16], flags: Flags, force_flat: bool) -> Result<Program, SyntaxError> {
    compile_with_warnings(pattern, flags, force_flat).map(|(program, _)| program)
}

/// Like [compile], also returning the advisory warnings raised while
/// parsing.
pub fn compile_with_warnings(
    pattern: &[u16],
    flags: Flags,
    force_flat: bool,
) -> Result<(Program, Vec<Warning>), SyntaxError> {
    let parsed = if force_flat {
        parser::parse_flat(pattern)?
    } else {
        parser::parse(pattern, flags)?
    };

    emit(pattern, flags, parsed)
}

/// Compiles a pattern from a string slice and a flag string such as `"gi"`.
///
/// # Example
///
/// ```
/// use regexp_compiler::compile_str;
///
/// let program = compile_str("(a)(b)", "gi").expect("valid pattern");
/// assert_eq!(2, program.paren_count());
/// assert_eq!("gi", program.flags().to_string());
///
/// assert!(compile_str("(a", "").is_err());
/// assert!(compile_str("a", "q").is_err());
/// ```
pub fn compile_str(pattern: &str, flags: &str) -> Result<Program, SyntaxError> {
    let flags = parser::parse_flags(flags)?;
    let source: Vec<u16> = pattern.encode_utf16().collect();

    compile(&source, flags, false)
}

fn emit(
    pattern: &[u16],
    flags: Flags,
    parsed: ParsedPattern,
) -> Result<(Program, Vec<Warning>), SyntaxError> {
    let ParsedPattern {
        ast,
        root,
        paren_count,
        classes,
        warnings,
    } = parsed;

    let mut emitter = Emitter {
        ast: &ast,
        fold: flags.fold(),
        code: Vec::new(),
    };
    emitter.chain(root)?;
    emitter.op(Op::End);

    let anchor = emitter.anchor(root);
    let code = emitter.code;

    debug!(
        "compiled /{}/{}: {} parens, {} classes, {} bytes, anchor {}",
        String::from_utf16_lossy(pattern),
        flags,
        paren_count,
        classes.len(),
        code.len(),
        anchor
    );

    let program = Program::new(code, pattern.to_vec(), flags, paren_count, anchor, classes);
    Ok((program, warnings))
}

/// The first thing a branch must consume, when it is statically known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leading {
    Unit(u16),
    Class(u16),
}

struct Emitter<'a> {
    ast: &'a Ast,
    fold: bool,
    code: Vec<u8>,
}

impl<'a> Emitter<'a> {
    fn op(&mut self, op: Op) -> usize {
        let pc = self.code.len();
        self.code.push(op as u8);
        pc
    }

    fn arg(&mut self, value: u16) {
        self.code.extend(value.to_be_bytes());
    }

    /// Reserves a jump operand, returning its offset for a later [Self::patch].
    fn placeholder(&mut self) -> usize {
        let at = self.code.len();
        self.arg(0);
        at
    }

    fn patch(&mut self, at: usize, target: usize) -> Result<(), SyntaxError> {
        let offset = target
            .checked_sub(at)
            .and_then(|offset| u16::try_from(offset).ok())
            .ok_or_else(|| {
                SyntaxError::new(SyntaxErrorKind::TooBig)
                    .with_data(format!("jump from {} to {}", at, target))
            })?;

        self.code[at..at + 2].copy_from_slice(&offset.to_be_bytes());
        Ok(())
    }

    fn chain(&mut self, head: NodeId) -> Result<(), SyntaxError> {
        let mut cursor = Some(head);
        while let Some(id) = cursor {
            cursor = self.node(id)?;
        }

        Ok(())
    }

    /// Emits the node at `id`, returning the next node of its sequence that
    /// remains to be emitted.
    fn node(&mut self, id: NodeId) -> Result<Option<NodeId>, SyntaxError> {
        let simple = match self.ast.kind(id) {
            NodeKind::Empty => Op::Empty,
            NodeKind::Bol => Op::Bol,
            NodeKind::Eol => Op::Eol,
            NodeKind::WordBoundary => Op::WordBoundary,
            NodeKind::NonWordBoundary => Op::NonWordBoundary,
            NodeKind::Dot => Op::Dot,
            NodeKind::Digit => Op::Digit,
            NodeKind::NonDigit => Op::NonDigit,
            NodeKind::Alnum => Op::Alnum,
            NodeKind::NonAlnum => Op::NonAlnum,
            NodeKind::Space => Op::Space,
            NodeKind::NonSpace => Op::NonSpace,
            NodeKind::BackRef(paren) => {
                self.op(Op::BackRef);
                self.arg(paren);
                return Ok(self.ast.next(id));
            }
            NodeKind::Flat { unit, source } => return Ok(self.flat_run(id, unit, source)),
            NodeKind::Class { index, negated } => {
                self.op(if negated { Op::NClass } else { Op::Class });
                self.arg(index);
                return Ok(self.ast.next(id));
            }
            NodeKind::Alt { kid, kid2 } => {
                self.alternation(kid, kid2)?;
                return Ok(self.ast.next(id));
            }
            NodeKind::Group { paren, kid } => {
                self.op(Op::LParen);
                self.arg(paren);
                self.chain(kid)?;
                self.op(Op::RParen);
                self.arg(paren);
                return Ok(self.ast.next(id));
            }
            NodeKind::NonCapturing { kid } => {
                self.chain(kid)?;
                return Ok(self.ast.next(id));
            }
            NodeKind::Quant { bounds, kid } => {
                self.quantifier(bounds, kid)?;
                return Ok(self.ast.next(id));
            }
            NodeKind::Assert { negated, kid } => {
                let (head, test) = if negated {
                    (Op::AssertNot, Op::AssertNotTest)
                } else {
                    (Op::Assert, Op::AssertTest)
                };

                self.op(head);
                let at = self.placeholder();
                self.chain(kid)?;
                self.patch(at, self.code.len())?;
                self.op(test);
                return Ok(self.ast.next(id));
            }
        };

        self.op(simple);
        Ok(self.ast.next(id))
    }

    /// Emits a literal, merging it with the literals that directly follow it
    /// in the pattern source into a single run.
    fn flat_run(&mut self, head: NodeId, unit: u16, source: Option<usize>) -> Option<NodeId> {
        let mut length = 1;
        let mut next = self.ast.next(head);

        // a run's offset and length must both fit an operand.
        let offset = source.filter(|&offset| offset < ARG_MAX);
        if let Some(offset) = offset {
            while let Some(id) = next {
                match self.ast.kind(id) {
                    NodeKind::Flat {
                        source: Some(at), ..
                    } if at == offset + length && at < ARG_MAX => {
                        length += 1;
                        next = self.ast.next(id);
                    }
                    _ => break,
                }
            }
        }

        match (offset, u8::try_from(unit)) {
            (Some(offset), _) if length > 1 => {
                self.op(if self.fold { Op::FlatI } else { Op::Flat });
                self.arg(offset as u16);
                self.arg(length as u16);
            }
            (_, Ok(byte)) => {
                self.op(if self.fold { Op::Flat1I } else { Op::Flat1 });
                self.code.push(byte);
            }
            (_, Err(_)) => {
                self.op(if self.fold { Op::UcFlat1I } else { Op::UcFlat1 });
                self.arg(unit);
            }
        }

        next
    }

    /// Emits a right-nested chain of alternatives iteratively:
    ///
    /// ```text
    /// ALT -> b   <kid>   JUMP -> e   b: <kid2>   e: ENDALT
    /// ```
    fn alternation(&mut self, kid: NodeId, kid2: NodeId) -> Result<(), SyntaxError> {
        let (mut kid, mut kid2) = (kid, kid2);
        let mut jumps = vec![];

        loop {
            let at = match self.prerequisite(kid, kid2) {
                Some((op, first, second)) => {
                    self.op(op);
                    let at = self.placeholder();
                    self.arg(first);
                    self.arg(second);
                    at
                }
                None => {
                    self.op(Op::Alt);
                    self.placeholder()
                }
            };

            self.chain(kid)?;
            self.op(Op::Jump);
            jumps.push(self.placeholder());
            self.patch(at, self.code.len())?;

            match self.ast.kind(kid2) {
                NodeKind::Alt {
                    kid: nested,
                    kid2: nested2,
                } if self.ast.next(kid2).is_none() => (kid, kid2) = (nested, nested2),
                _ => {
                    self.chain(kid2)?;
                    break;
                }
            }
        }

        let end = self.op(Op::EndAlt);
        for at in jumps {
            self.patch(at, end)?;
        }

        Ok(())
    }

    fn leading(&self, branch: NodeId) -> Option<Leading> {
        match self.ast.kind(branch) {
            NodeKind::Flat { unit, .. } => Some(Leading::Unit(unit)),
            NodeKind::Class { index, .. } => Some(Leading::Class(index)),
            _ => None,
        }
    }

    /// Picks the prerequisite-checking alternative when both branches must
    /// begin with a known literal or class.
    fn prerequisite(&self, kid: NodeId, kid2: NodeId) -> Option<(Op, u16, u16)> {
        if self.fold {
            return None;
        }

        match (self.leading(kid)?, self.leading(kid2)?) {
            (Leading::Unit(first), Leading::Unit(second)) => Some((Op::AltPrereq, first, second)),
            (Leading::Unit(unit), Leading::Class(class))
            | (Leading::Class(class), Leading::Unit(unit)) => Some((Op::AltPrereq2, unit, class)),
            (Leading::Class(_), Leading::Class(_)) => None,
        }
    }

    fn quantifier(&mut self, bounds: QuantBounds, kid: NodeId) -> Result<(), SyntaxError> {
        let head = match (bounds.greedy, bounds.min, bounds.max) {
            (true, 0, None) => Op::Star,
            (true, 1, None) => Op::Plus,
            (true, 0, Some(1)) => Op::Opt,
            (true, _, _) => Op::Quant,
            (false, 0, None) => Op::MinimalStar,
            (false, 1, None) => Op::MinimalPlus,
            (false, 0, Some(1)) => Op::MinimalOpt,
            (false, _, _) => Op::MinimalQuant,
        };

        self.op(head);
        if matches!(head, Op::Quant | Op::MinimalQuant) {
            self.arg(bounds.min);
            self.arg(bounds.max.unwrap_or(UNBOUNDED));
        }
        self.arg(bounds.paren_index);
        self.arg(bounds.paren_count);
        let at = self.placeholder();

        self.chain(kid)?;
        self.op(Op::EndChild);
        self.patch(at, self.code.len())
    }

    /// Derives the search hint from the first node of the pattern.
    fn anchor(&self, root: NodeId) -> AnchorHint {
        match self.ast.kind(root) {
            NodeKind::Bol => AnchorHint::StartOfLine,
            NodeKind::Flat { unit, .. } => AnchorHint::Char(unit),
            NodeKind::Class { index, .. } => AnchorHint::Class(index),
            NodeKind::Alt { kid, kid2 } => match self.prerequisite(kid, kid2) {
                Some((Op::AltPrereq, first, second)) => AnchorHint::Prereq(first, second),
                Some((_, unit, class)) => AnchorHint::PrereqClass(unit, class),
                None => AnchorHint::None,
            },
            _ => AnchorHint::None,
        }
    }
}

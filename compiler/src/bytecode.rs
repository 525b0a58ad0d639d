//! Provides the traits and functions for converting a compiled program to its
//! corresponding binary representation.
//!
//! The layout is described in `regexp_runtime::bytecode`, which decodes it.

use regexp_runtime::bytecode::{HEADER_LEN, MAGIC_NUMBER};
use regexp_runtime::{CharSet, Program};

/// Converts a program to its binary representation.
///
/// # Example
///
/// ```
/// use regexp_compiler::{compile_str, to_binary};
/// use regexp_runtime::bytecode::from_binary;
///
/// let program = compile_str("a", "").expect("valid pattern");
/// let expected_output = vec![
///     240, 240, 0, 2, 97, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 3, 0,
///     0, 0, 0, 0, 0, 0, 97, 0, 15, 97, 43,
/// ];
///
/// let generated_bytecode = to_binary(&program);
/// assert_eq!(Ok(expected_output), generated_bytecode);
///
/// let decoded = from_binary(generated_bytecode.unwrap()).expect("valid binary");
/// assert_eq!(program, decoded);
/// ```
pub fn to_binary(program: &Program) -> Result<Vec<u8>, String> {
    program.to_bytecode()
}

/// Merges two arrays.
///
/// # Safety
/// Caller guarantees that the `N` parameter is EXACTLY half of `M` parameter.
fn merge_arrays<const N: usize, const M: usize>(first: [u8; N], second: [u8; N]) -> [u8; M] {
    let mut output_arr = [0; M];

    for (idx, val) in first.into_iter().chain(second.into_iter()).enumerate() {
        output_arr[idx] = val;
    }

    output_arr
}

fn u32_len(len: usize, what: &str) -> Result<u32, String> {
    u32::try_from(len).map_err(|_| format!("{} overflows 32-bit integer", what))
}

/// Represents a conversion trait to a given type's binary little-endian
/// representation.
pub trait ToBytecode {
    // the bytecode representable type.
    type Output;

    fn to_bytecode(&self) -> Self::Output;
}

impl ToBytecode for Program {
    type Output = Result<Vec<u8>, String>;

    fn to_bytecode(&self) -> Self::Output {
        let paren_cnt = u32_len(self.paren_count(), "paren count")?;
        let source_len = u32_len(self.source().len(), "source length")?;
        let class_cnt = u32_len(self.classes().len(), "class count")?;
        let code_len = u32_len(self.code().len(), "code length")?;
        let (anchor_variant, anchor_a, anchor_b) = self.anchor().to_parts();

        let lower_32_bits: [u8; 4] = merge_arrays(
            MAGIC_NUMBER.to_le_bytes(),
            [self.flags().bits(), anchor_variant],
        );
        let lower_64_bits: [u8; 8] = merge_arrays(lower_32_bits, anchor_a.to_le_bytes());
        let middle_64_bits: [u8; 8] = merge_arrays(anchor_b.to_le_bytes(), paren_cnt.to_le_bytes());
        let lower_128_bits: [u8; 16] = merge_arrays(lower_64_bits, middle_64_bits);

        let lengths: [u8; 8] = merge_arrays(source_len.to_le_bytes(), class_cnt.to_le_bytes());
        let code_len_and_unused: [u8; 8] = merge_arrays(code_len.to_le_bytes(), [0u8; 4]);
        let upper_128_bits: [u8; 16] = merge_arrays(lengths, code_len_and_unused);

        let header: [u8; HEADER_LEN] = merge_arrays(lower_128_bits, upper_128_bits);

        let source_bytes = self.source().iter().flat_map(|unit| unit.to_le_bytes());
        let class_bytes = self
            .classes()
            .iter()
            .map(ToBytecode::to_bytecode)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(header
            .into_iter()
            .chain(source_bytes)
            .chain(class_bytes.into_iter().flatten())
            .chain(self.code().iter().copied())
            .collect())
    }
}

impl ToBytecode for CharSet {
    type Output = Result<[u8; 8], String>;

    fn to_bytecode(&self) -> Self::Output {
        let start = u32_len(self.start(), "class start")?;
        let length = u32_len(self.length(), "class length")?;

        Ok(merge_arrays(start.to_le_bytes(), length.to_le_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_str;
    use regexp_runtime::bytecode::from_binary;

    #[test]
    fn should_encode_class_table_after_source() {
        let program = compile_str("x[^a-c]", "i").expect("valid pattern");
        let bin = to_binary(&program).expect("encodable program");

        let source_end = HEADER_LEN + 2 * program.source().len();
        assert_eq!(
            &[2, 0, 0, 0, 4, 0, 0, 0],
            &bin[source_end..source_end + 8]
        );
        assert_eq!(program.code(), &bin[source_end + 8..]);
    }

    #[test]
    fn should_round_trip_compiled_programs() {
        let input_output = [
            ("a|b", ""),
            ("a|[bc]", "g"),
            ("^(a+?)\\1(?!b)", "m"),
            ("[^\\d\\s]{2,5}|\\u0100", "i"),
        ];

        for (test_id, (pattern, flags)) in input_output.into_iter().enumerate() {
            let program = compile_str(pattern, flags).expect("valid pattern");
            let res = to_binary(&program)
                .map_err(|e| e.to_string())
                .and_then(|bin| from_binary(bin).map_err(|e| e.to_string()));

            assert_eq!((test_id, Ok(program)), (test_id, res));
        }
    }
}

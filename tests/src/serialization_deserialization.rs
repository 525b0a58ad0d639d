use regexp_compiler::bytecode::ToBytecode;
use regexp_compiler::compile_str;
use regexp_runtime::bytecode::{BytecodeDeserializationErrorKind, FromBytecode};
use regexp_runtime::*;

fn utf16(src: &str) -> Vec<u16> {
    src.encode_utf16().collect()
}

#[test]
fn should_preserve_equivalent_representation_in_bytecode_encoding() {
    let input_output = [
        ("a", ""),
        ("^abc$", "m"),
        ("[a-z]+|x", "g"),
        ("(a)|(?:b|c)*?\\1", "i"),
        ("(?=a{2,5})(?!\\d)\\w+", ""),
        ("\\u2028[^\\s\\S]", "gim"),
    ];

    for (test_case, (pattern, flags)) in input_output.into_iter().enumerate() {
        let program = compile_str(pattern, flags).expect("valid pattern");
        let generated_bytecode = program.to_bytecode().expect("encodable program");
        let deserialized_program_result = Program::from_bytecode(generated_bytecode);

        // assert the generated output matches the expected output
        assert_eq!(
            (test_case, Ok(program)),
            (test_case, deserialized_program_result)
        );
    }
}

#[test]
fn should_match_identically_after_deserialization() {
    let input_output = [
        ("(\\w+)@(\\w+)\\.com", "i", "mail BOB@Example.com now"),
        ("a|[bc]", "", "xxc"),
        ("(a*?)b", "", "aaab"),
    ];

    for (test_case, (pattern, flags, input)) in input_output.into_iter().enumerate() {
        let program = compile_str(pattern, flags).expect("valid pattern");
        let decoded = program
            .to_bytecode()
            .map_err(|e| e.to_string())
            .and_then(|bin| Program::from_bytecode(bin).map_err(|e| e.to_string()))
            .expect("round trip");

        let input = utf16(input);
        let mut statics = RegExpStatics::default();
        let expected = execute(&program, &input, 0, ExecMode::Match, &mut statics);
        let res = execute(&decoded, &input, 0, ExecMode::Match, &mut statics);

        assert!(expected.is_match());
        assert_eq!((test_case, expected), (test_case, res));
    }
}

#[test]
fn should_reject_truncated_or_corrupted_bytecode() {
    let program = compile_str("(a|b)*c", "").expect("valid pattern");
    let bin = program.to_bytecode().expect("encodable program");

    // drop the trailing `END`.
    let truncated = &bin[..bin.len() - 1];
    assert!(Program::from_bytecode(truncated).is_err());

    // point the first jump operand into the middle of an instruction.
    let mut corrupted = bin.clone();
    let code_start = bin.len() - program.code().len();
    corrupted[code_start + 6] = 1;
    assert_eq!(
        Err(BytecodeDeserializationErrorKind::InvalidJumpTarget),
        Program::from_bytecode(&corrupted).map_err(|e| e.kind().clone())
    );
}

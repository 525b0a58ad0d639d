use regexp_compiler::{compile_str, RegExp, SyntaxErrorKind};
use regexp_runtime::*;

fn utf16(src: &str) -> Vec<u16> {
    src.encode_utf16().collect()
}

type Groups = Vec<Option<String>>;

/// Runs a single search from the start of `input`, returning the match index
/// and every group, the overall match first.
fn exec(pattern: &str, flags: &str, input: &str) -> Option<(usize, Groups)> {
    let program = compile_str(pattern, flags).expect("valid pattern");
    let input = utf16(input);
    let mut statics = RegExpStatics::default();

    execute(&program, &input, 0, ExecMode::Match, &mut statics)
        .into_match()
        .map(|found| {
            let groups = (0..=found.group_count())
                .map(|n| found.group(n).map(String::from_utf16_lossy))
                .collect();
            (found.index(), groups)
        })
}

fn groups(items: &[Option<&str>]) -> Groups {
    items.iter().map(|item| item.map(str::to_string)).collect()
}

#[test]
fn should_match_documented_behaviors() {
    let input_output = [
        // greedy maximal and lazy minimal repetition.
        ("a+", "", "aaa", Some((0, groups(&[Some("aaa")])))),
        ("a+?", "", "aaa", Some((0, groups(&[Some("a")])))),
        // the left alternative wins.
        ("a|ab", "", "ab", Some((0, groups(&[Some("a")])))),
        // an unset group backreference matches empty.
        ("(a)?\\1", "", "b", Some((0, groups(&[Some(""), None])))),
        ("ABC", "i", "xabcx", Some((1, groups(&[Some("abc")])))),
        ("^b", "m", "a\nb", Some((2, groups(&[Some("b")])))),
        ("^b", "", "a\nb", None),
        ("[^a-c]", "", "abcd", Some((3, groups(&[Some("d")])))),
        ("a{2,3}", "", "aaaa", Some((0, groups(&[Some("aaa")])))),
        // an empty iteration ends the loop.
        ("(a*)*", "", "", Some((0, groups(&[Some(""), None])))),
        (
            "((a)(b))(c)",
            "",
            "abc",
            Some((
                0,
                groups(&[Some("abc"), Some("ab"), Some("a"), Some("b"), Some("c")]),
            )),
        ),
    ];

    for (test_id, (pattern, flags, input, expected)) in input_output.into_iter().enumerate() {
        let res = exec(pattern, flags, input);
        assert_eq!((test_id, expected), (test_id, res));
    }
}

#[test]
fn should_match_legacy_edge_cases() {
    let input_output = [
        ("a(?!b)", "", "abac", Some((2, groups(&[Some("a")])))),
        // captures made inside a lookahead are discarded.
        ("(?=(a))a", "", "a", Some((0, groups(&[Some("a"), None])))),
        ("(a+)b\\1", "", "xaabaa", Some((1, groups(&[Some("aabaa"), Some("aa")])))),
        ("(a)\\1", "i", "aA", Some((0, groups(&[Some("aA"), Some("a")])))),
        // greedy loops keep captures from earlier iterations.
        ("(?:(a)|b)+", "", "ab", Some((0, groups(&[Some("ab"), Some("a")])))),
        // lazy loops clear them before each new iteration.
        ("(?:(a)|b)+?c", "", "abc", Some((0, groups(&[Some("abc"), None])))),
        // patterns operate on UTF-16 code units.
        ("^..$", "", "\u{1F600}", Some((0, groups(&[Some("\u{1F600}")])))),
        ("^.$", "", "\u{1F600}", None),
        ("\\bfoo\\b", "", "afoo foo", Some((5, groups(&[Some("foo")])))),
        ("[a-c]+", "i", "xABCx", Some((1, groups(&[Some("ABC")])))),
        ("[\\d_]+", "", "ab12_3c", Some((2, groups(&[Some("12_3")])))),
        // folded variants of inner range units may lie past the range end.
        ("[\\xb5-\\xb6]", "i", "\u{039C}", Some((0, groups(&[Some("\u{039C}")])))),
        ("\\xb5", "i", "\u{039C}", Some((0, groups(&[Some("\u{039C}")])))),
        ("\\12", "", "a\nb", Some((1, groups(&[Some("\n")])))),
        ("a{2,3}?", "", "aaaa", Some((0, groups(&[Some("aa")])))),
        ("a|", "", "b", Some((0, groups(&[Some("")])))),
        ("(?:ab){2}", "", "ababab", Some((0, groups(&[Some("abab")])))),
        ("x{0}y", "", "xy", Some((1, groups(&[Some("y")])))),
        ("a{,2}", "", "a{,2}", Some((0, groups(&[Some("a{,2}")])))),
        // an empty class matches nothing, its negation anything.
        ("[]a", "", "a", None),
        ("[^]a", "", "\na", Some((0, groups(&[Some("\na")])))),
        ("a.c", "", "a\nc abc", Some((4, groups(&[Some("abc")])))),
        ("c$", "m", "abc\nd", Some((2, groups(&[Some("c")])))),
    ];

    for (test_id, (pattern, flags, input, expected)) in input_output.into_iter().enumerate() {
        let res = exec(pattern, flags, input);
        assert_eq!((test_id, expected), (test_id, res));
    }
}

#[test]
fn should_be_deterministic_across_compilations() {
    let input = "the quick brown fox";
    let patterns = ["(\\w+)\\s(\\w+)", "o(?=x)|q", "[^aeiou ]{2,}"];

    for (test_id, pattern) in patterns.into_iter().enumerate() {
        let first = exec(pattern, "", input);
        let second = exec(pattern, "", input);

        assert!(first.is_some());
        assert_eq!((test_id, first), (test_id, second));
    }
}

#[test]
fn should_raise_syntax_errors_at_compile_time() {
    let input_output = [
        ("(a", SyntaxErrorKind::UnterminatedGroup),
        ("a{2,1}", SyntaxErrorKind::QuantifierOutOfOrder),
        ("\\", SyntaxErrorKind::TrailingBackslash),
    ];

    for (test_id, (pattern, expected)) in input_output.into_iter().enumerate() {
        let res = compile_str(pattern, "").map(|_| ()).map_err(|e| e.kind());
        assert_eq!((test_id, Err(expected)), (test_id, res));
    }

    assert_eq!(
        Err(SyntaxErrorKind::UnknownFlag),
        compile_str("a", "gz").map(|_| ()).map_err(|e| e.kind())
    );
}

#[test]
fn should_advance_and_reset_last_index_under_global_flag() {
    let mut re = RegExp::new("a", "g").expect("valid pattern");
    let input = utf16("aaa");
    let mut statics = RegExpStatics::default();

    let input_output = [(Some(0), 1), (Some(1), 2), (Some(2), 3), (None, 0)];

    for (test_id, (expected_index, expected_last_index)) in input_output.into_iter().enumerate() {
        let res = re.exec(&input, &mut statics).map(|m| m.index());
        assert_eq!(
            (test_id, expected_index, expected_last_index),
            (test_id, res, re.last_index())
        );
    }
}

#[test]
fn should_record_last_match_context() {
    let program = compile_str("(\\d+)-(\\d+)?-(x)?", "").expect("valid pattern");
    let input = utf16("tel 555--y");
    let mut statics = RegExpStatics::default();

    assert_eq!(
        Execution::Tested(true),
        execute(&program, &input, 0, ExecMode::Test, &mut statics)
    );

    assert_eq!(utf16("tel 555--y"), statics.input());
    assert_eq!(utf16("555--"), statics.last_match());
    assert_eq!(utf16("tel "), statics.left_context());
    assert_eq!(utf16("y"), statics.right_context());
    assert_eq!(utf16("555"), statics.paren(1));
    assert_eq!(&[] as &[u16], statics.paren(2));
    assert_eq!(&[] as &[u16], statics.paren(9));
    assert_eq!(&[] as &[u16], statics.last_paren());
    assert_eq!(3, statics.paren_count());
}

#[test]
fn should_force_multiline_through_statics() {
    let program = compile_str("^b", "").expect("valid pattern");
    let input = utf16("a\nb");
    let mut statics = RegExpStatics::default();

    assert!(!execute(&program, &input, 0, ExecMode::Test, &mut statics).is_match());

    statics.set_multiline(true);
    let res = execute(&program, &input, 0, ExecMode::Match, &mut statics)
        .into_match()
        .map(|m| m.index());
    assert_eq!(Some(2), res);
}

#[test]
fn should_handle_long_inputs_without_recursion() {
    let input = format!("{}c", "ab".repeat(50_000));
    let res = exec("(?:a|b)*c", "", &input).map(|(index, groups)| (index, groups[0].clone()));

    assert_eq!(Some((0, Some(input.clone()))), res);
}

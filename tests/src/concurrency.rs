use std::sync::Arc;
use std::thread;

use regexp_compiler::{compile_str, RegExp};
use regexp_runtime::*;

#[test]
fn should_share_a_program_between_threads() {
    let program = Arc::new(compile_str("([a-f]+)(\\d)", "i").expect("valid pattern"));

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let program = Arc::clone(&program);
            thread::spawn(move || {
                let input: Vec<u16> = format!("{}-CAFE{}", "x".repeat(n), n % 10)
                    .encode_utf16()
                    .collect();
                let mut statics = RegExpStatics::default();

                let found = execute(&program, &input, 0, ExecMode::Match, &mut statics)
                    .into_match()
                    .map(|m| (m.index(), m.group(1).map(String::from_utf16_lossy)));

                (n, found, String::from_utf16_lossy(statics.last_paren()))
            })
        })
        .collect();

    for handle in handles {
        let (n, found, last_paren) = handle.join().expect("matching thread");
        assert_eq!((n, Some((n + 1, Some("CAFE".to_string())))), (n, found));
        assert_eq!((n % 10).to_string(), last_paren);
    }

    // the class bitmap was built once and is visible to every owner.
    assert!(program.classes().iter().all(CharSet::is_converted));
}

#[test]
fn should_keep_last_index_per_regexp_object() {
    let program = Arc::new(compile_str("a", "g").expect("valid pattern"));
    let input: Vec<u16> = "aa".encode_utf16().collect();
    let mut statics = RegExpStatics::default();

    let mut first = RegExp::from_program(Arc::clone(&program));
    let mut second = RegExp::from_program(program);

    assert!(first.test(&input, &mut statics));
    assert!(first.test(&input, &mut statics));
    assert_eq!(2, first.last_index());

    assert_eq!(0, second.last_index());
    assert_eq!(Some(0), second.exec(&input, &mut statics).map(|m| m.index()));
}

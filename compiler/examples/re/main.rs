use std::io::{self, BufRead};

use regexp_compiler::RegExp;
use regexp_runtime::RegExpStatics;

const USAGE: &str = "re [--debug] [--only-matching] PATTERN [FLAGS]";

fn main() -> Result<(), String> {
    let (debug, only_matching, args) = std::env::args().skip(1).fold(
        (false, false, vec![]),
        |(debug, only_matching, mut args), arg| match arg.as_str() {
            "--debug" | "-d" => (true, only_matching, args),
            "--only-matching" | "-o" => (debug, true, args),
            _ => {
                args.push(arg);
                (debug, only_matching, args)
            }
        },
    );

    let (pattern, flags) = match args.as_slice() {
        [pattern] => Ok((pattern.as_str(), "")),
        [pattern, flags] => Ok((pattern.as_str(), flags.as_str())),
        _ => Err(USAGE.to_string()),
    }?;

    let mut re = RegExp::new(pattern, flags).map_err(|e| e.to_string())?;

    if debug {
        println!(
            "DEBUG
--------
{}--------
",
            re.program()
        )
    }

    let mut statics = RegExpStatics::default();
    for line in io::stdin().lock().lines() {
        let line = line.map_err(|e| e.to_string())?;
        let input: Vec<u16> = line.encode_utf16().collect();
        re.set_last_index(0);

        if !only_matching {
            if re.test(&input, &mut statics) {
                println!("{}", line);
            }
            continue;
        }

        // without the global flag every search restarts at the line's head.
        if re.flags().global() {
            while let Some(found) = re.exec(&input, &mut statics) {
                println!("{}", found.to_string_lossy());
                if found.range().is_empty() {
                    re.set_last_index(found.end() + 1);
                }
            }
        } else if let Some(found) = re.exec(&input, &mut statics) {
            println!("{}", found.to_string_lossy());
        }
    }

    Ok(())
}

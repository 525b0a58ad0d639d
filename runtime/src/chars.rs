//! Character predicates and case canonicalization over UTF-16 code units.
//!
//! Every function here operates on a single code unit. Surrogate halves are
//! treated as opaque units that never fold and never belong to a word or
//! space class.

const LINE_FEED: u16 = 0x0A;
const CARRIAGE_RETURN: u16 = 0x0D;
const LINE_SEPARATOR: u16 = 0x2028;
const PARAGRAPH_SEPARATOR: u16 = 0x2029;

/// Returns `true` for the four line terminators recognized by `.`, `^` and
/// `$`.
pub const fn is_line_terminator(c: u16) -> bool {
    matches!(
        c,
        LINE_FEED | CARRIAGE_RETURN | LINE_SEPARATOR | PARAGRAPH_SEPARATOR
    )
}

/// Returns `true` for the ASCII decimal digits matched by `\d`.
pub const fn is_digit(c: u16) -> bool {
    c >= b'0' as u16 && c <= b'9' as u16
}

/// Returns `true` for the ASCII word characters matched by `\w` and used to
/// locate word boundaries.
pub const fn is_word(c: u16) -> bool {
    if c > 0x7F {
        return false;
    }

    let c = c as u8;
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Returns `true` for whitespace and line terminators matched by `\s`.
pub const fn is_space(c: u16) -> bool {
    matches!(
        c,
        0x09..=0x0D
            | 0x20
            | 0xA0
            | 0x1680
            | 0x180E
            | 0x2000..=0x200A
            | 0x2028
            | 0x2029
            | 0x202F
            | 0x205F
            | 0x3000
    )
}

/// Maps a code unit through a case conversion, keeping the original unit
/// when the mapping is not exactly one BMP character.
fn single_mapping<I, F>(c: u16, convert: F) -> u16
where
    F: FnOnce(char) -> I,
    I: Iterator<Item = char>,
{
    char::from_u32(u32::from(c))
        .and_then(|ch| {
            let mut mapped = convert(ch);
            let first = mapped.next()?;
            if mapped.next().is_some() {
                return None;
            }

            u16::try_from(u32::from(first)).ok()
        })
        .unwrap_or(c)
}

/// Canonicalizes a code unit to upper case for case-insensitive comparison.
///
/// Non-ASCII units never fold into the ASCII range, so `ı` and `ſ` stay
/// distinct from `I` and `S`.
///
/// # Example
///
/// ```
/// use regexp_runtime::chars::upcase;
///
/// assert_eq!(u16::from(b'A'), upcase(u16::from(b'a')));
/// assert_eq!(0x0131, upcase(0x0131));
/// ```
pub fn upcase(c: u16) -> u16 {
    if c < 0x80 {
        return if (u16::from(b'a')..=u16::from(b'z')).contains(&c) {
            c - 0x20
        } else {
            c
        };
    }

    let upper = single_mapping(c, char::to_uppercase);
    if upper < 0x80 {
        c
    } else {
        upper
    }
}

/// Canonicalizes a code unit to lower case, with the same ASCII guard as
/// [upcase].
pub fn downcase(c: u16) -> u16 {
    if c < 0x80 {
        return if (u16::from(b'A')..=u16::from(b'Z')).contains(&c) {
            c + 0x20
        } else {
            c
        };
    }

    let lower = single_mapping(c, char::to_lowercase);
    if lower < 0x80 {
        c
    } else {
        lower
    }
}

/// Compares two code units, folding case when `fold` is set.
#[inline]
pub fn units_eq(a: u16, b: u16, fold: bool) -> bool {
    a == b || (fold && upcase(a) == upcase(b))
}

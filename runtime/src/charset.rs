//! Bracket expression handling.
//!
//! A class is stored as a window into the pattern source. The compiler only
//! validates the window with [scan_class]; the membership bitmap is built on
//! the first match-time lookup and then shared by every later lookup,
//! including lookups from other threads.

use log::debug;
use once_cell::sync::OnceCell;

use crate::chars::{downcase, is_digit, is_space, is_word, upcase};

const BACKSLASH: u16 = b'\\' as u16;
const CARET: u16 = b'^' as u16;
const HYPHEN: u16 = b'-' as u16;

/// The largest size a class bitmap can take, used whenever a shorthand class
/// appears inside the brackets.
pub const FULL_SIZE: u16 = u16::MAX;

/// A single element of a bracket expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassItem {
    Unit(u16),
    Range(u16, u16),
    Digit,
    NonDigit,
    Space,
    NonSpace,
    Word,
    NonWord,
}

/// Signals a range whose start exceeds its end or whose endpoint is a
/// shorthand class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassRangeError {
    /// Offset of the offending endpoint within the class body.
    pub offset: usize,
}

impl std::fmt::Display for ClassRangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid range at class offset {}", self.offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassAtom {
    Unit(u16),
    Shorthand(ClassItem),
}

/// Splits a leading `^` off a class body, returning the sense of the class
/// and the remaining body.
pub fn split_sense(body: &[u16]) -> (bool, &[u16]) {
    match body.split_first() {
        Some((&CARET, rest)) => (false, rest),
        _ => (true, body),
    }
}

/// Tokenizes the body of a bracket expression, excluding the brackets and
/// any leading `^`.
#[derive(Debug, Clone)]
pub struct ClassScanner<'s> {
    src: &'s [u16],
    pos: usize,
}

impl<'s> ClassScanner<'s> {
    pub fn new(src: &'s [u16]) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<u16> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u16> {
        let unit = self.peek()?;
        self.pos += 1;
        Some(unit)
    }

    fn next_atom(&mut self) -> Option<ClassAtom> {
        let unit = self.bump()?;
        if unit != BACKSLASH {
            return Some(ClassAtom::Unit(unit));
        }

        let Some(escaped) = self.bump() else {
            return Some(ClassAtom::Unit(BACKSLASH));
        };

        let atom = match u8::try_from(escaped).map(char::from) {
            Ok('b') => ClassAtom::Unit(0x08),
            Ok('f') => ClassAtom::Unit(0x0C),
            Ok('n') => ClassAtom::Unit(0x0A),
            Ok('r') => ClassAtom::Unit(0x0D),
            Ok('t') => ClassAtom::Unit(0x09),
            Ok('v') => ClassAtom::Unit(0x0B),
            Ok('c') => match self.peek() {
                Some(letter) if is_ascii_letter(letter) => {
                    self.pos += 1;
                    ClassAtom::Unit(letter & 0x1F)
                }
                // leave the `c` to be read as a literal.
                _ => {
                    self.pos -= 1;
                    ClassAtom::Unit(BACKSLASH)
                }
            },
            Ok(c @ ('x' | 'u')) => {
                let digits = if c == 'x' { 2 } else { 4 };
                ClassAtom::Unit(self.hex(digits).unwrap_or(escaped))
            }
            Ok(c @ '0'..='7') => ClassAtom::Unit(self.octal(u16::from(c as u8 - b'0'))),
            Ok('d') => ClassAtom::Shorthand(ClassItem::Digit),
            Ok('D') => ClassAtom::Shorthand(ClassItem::NonDigit),
            Ok('s') => ClassAtom::Shorthand(ClassItem::Space),
            Ok('S') => ClassAtom::Shorthand(ClassItem::NonSpace),
            Ok('w') => ClassAtom::Shorthand(ClassItem::Word),
            Ok('W') => ClassAtom::Shorthand(ClassItem::NonWord),
            _ => ClassAtom::Unit(escaped),
        };

        Some(atom)
    }

    /// Reads up to `digits` hex digits. On a non-hex digit the cursor is
    /// rewound and `None` is returned.
    fn hex(&mut self, digits: usize) -> Option<u16> {
        let start = self.pos;
        let mut value = 0u16;
        for _ in 0..digits {
            let Some(unit) = self.peek() else {
                break;
            };

            match hex_value(unit) {
                Some(digit) => {
                    value = (value << 4) | digit;
                    self.pos += 1;
                }
                None => {
                    self.pos = start;
                    return None;
                }
            }
        }

        Some(value)
    }

    /// Continues an octal escape whose first digit has been consumed,
    /// reading at most two more digits without exceeding `0o377`.
    fn octal(&mut self, first: u16) -> u16 {
        let mut value = first;
        for _ in 0..2 {
            match self.peek().and_then(octal_value) {
                Some(digit) if value * 8 + digit <= 0o377 => {
                    value = value * 8 + digit;
                    self.pos += 1;
                }
                _ => break,
            }
        }

        value
    }
}

impl<'s> Iterator for ClassScanner<'s> {
    type Item = Result<ClassItem, ClassRangeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let lo = match self.next_atom()? {
            ClassAtom::Shorthand(item) => return Some(Ok(item)),
            ClassAtom::Unit(lo) => lo,
        };

        // a trailing hyphen is a literal.
        if self.peek() != Some(HYPHEN) || self.pos + 1 >= self.src.len() {
            return Some(Ok(ClassItem::Unit(lo)));
        }

        self.pos += 1;
        let offset = self.pos;
        let item = match self.next_atom() {
            Some(ClassAtom::Unit(hi)) if lo <= hi => Ok(ClassItem::Range(lo, hi)),
            _ => Err(ClassRangeError { offset }),
        };

        Some(item)
    }
}

fn is_ascii_letter(unit: u16) -> bool {
    u8::try_from(unit).map_or(false, |b| b.is_ascii_alphabetic())
}

fn hex_value(unit: u16) -> Option<u16> {
    u8::try_from(unit)
        .ok()
        .and_then(|b| char::from(b).to_digit(16))
        .and_then(|d| u16::try_from(d).ok())
}

fn octal_value(unit: u16) -> Option<u16> {
    (u16::from(b'0')..=u16::from(b'7'))
        .contains(&unit)
        .then(|| unit - u16::from(b'0'))
}

/// The result of validating a class body at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassSummary {
    pub sense: bool,
    /// The largest code unit the bitmap needs to represent.
    pub size: u16,
}

/// Validates a class body, returning its sense and the bitmap size it will
/// need once converted.
///
/// # Example
///
/// ```
/// use regexp_runtime::charset::{scan_class, ClassSummary};
///
/// let body: Vec<u16> = "^a-c".encode_utf16().collect();
/// assert_eq!(
///     Ok(ClassSummary { sense: false, size: u16::from(b'c') }),
///     scan_class(&body, false)
/// );
/// ```
pub fn scan_class(body: &[u16], fold: bool) -> Result<ClassSummary, ClassRangeError> {
    let (sense, body) = split_sense(body);
    let mut size = 0u16;

    let folded_max = |unit: u16| {
        if fold {
            unit.max(upcase(unit)).max(downcase(unit))
        } else {
            unit
        }
    };

    for item in ClassScanner::new(body) {
        size = match item? {
            ClassItem::Unit(unit) => size.max(folded_max(unit)),
            // a folded variant of any unit in the range may exceed `hi`.
            ClassItem::Range(lo, hi) if fold => (lo..=hi).map(&folded_max).fold(size, u16::max),
            ClassItem::Range(_, hi) => size.max(hi),
            _ => FULL_SIZE,
        };
    }

    Ok(ClassSummary { sense, size })
}

/// A membership bitmap covering code units `0..=size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    size: u16,
    bits: Vec<u8>,
}

impl Bitmap {
    pub fn new(size: u16) -> Self {
        Self {
            size,
            bits: vec![0; usize::from(size) / 8 + 1],
        }
    }

    pub fn size(&self) -> u16 {
        self.size
    }

    pub fn insert(&mut self, unit: u16) {
        if unit <= self.size {
            self.bits[usize::from(unit >> 3)] |= 1 << (unit & 0x7);
        }
    }

    pub fn insert_range(&mut self, lo: u16, hi: u16) {
        for unit in lo..=hi.min(self.size) {
            self.insert(unit)
        }
    }

    fn insert_where(&mut self, predicate: impl Fn(u16) -> bool) {
        for unit in 0..=self.size {
            if predicate(unit) {
                self.insert(unit)
            }
        }
    }

    pub fn contains(&self, unit: u16) -> bool {
        unit <= self.size && self.bits[usize::from(unit >> 3)] & (1 << (unit & 0x7)) != 0
    }

    /// Builds the bitmap for a class body, ignoring its sense.
    pub fn from_class_body(body: &[u16], size: u16, fold: bool) -> Self {
        let (_, body) = split_sense(body);
        let mut bitmap = Self::new(size);

        // ranges were validated when the class was compiled.
        for item in ClassScanner::new(body).filter_map(Result::ok) {
            match item {
                ClassItem::Unit(unit) => {
                    bitmap.insert(unit);
                    if fold {
                        bitmap.insert(upcase(unit));
                        bitmap.insert(downcase(unit));
                    }
                }
                ClassItem::Range(lo, hi) => {
                    bitmap.insert_range(lo, hi);
                    if fold {
                        for unit in lo..=hi {
                            bitmap.insert(upcase(unit));
                            bitmap.insert(downcase(unit));
                        }
                    }
                }
                ClassItem::Digit => bitmap.insert_range(u16::from(b'0'), u16::from(b'9')),
                ClassItem::NonDigit => bitmap.insert_where(|unit| !is_digit(unit)),
                ClassItem::Space => bitmap.insert_where(is_space),
                ClassItem::NonSpace => bitmap.insert_where(|unit| !is_space(unit)),
                ClassItem::Word => bitmap.insert_where(is_word),
                ClassItem::NonWord => bitmap.insert_where(|unit| !is_word(unit)),
            }
        }

        bitmap
    }
}

/// A compiled bracket expression, referencing its body by offset into the
/// program source.
#[derive(Debug, Clone)]
pub struct CharSet {
    start: usize,
    length: usize,
    sense: bool,
    size: u16,
    bitmap: OnceCell<Bitmap>,
}

impl CharSet {
    /// Instantiates an unconverted class over `source[start..start + length]`.
    pub fn new(start: usize, length: usize, sense: bool, size: u16) -> Self {
        Self {
            start,
            length,
            sense,
            size,
            bitmap: OnceCell::new(),
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// `false` for a class introduced with `[^`.
    pub fn sense(&self) -> bool {
        self.sense
    }

    pub fn size(&self) -> u16 {
        self.size
    }

    /// Returns `true` once the bitmap has been built.
    pub fn is_converted(&self) -> bool {
        self.bitmap.get().is_some()
    }

    /// Returns the class body within `source`.
    pub fn body<'s>(&self, source: &'s [u16]) -> &'s [u16] {
        source
            .get(self.start..self.start + self.length)
            .unwrap_or_default()
    }

    /// Returns the membership bitmap, building it on first use.
    pub fn bitmap(&self, source: &[u16], fold: bool) -> &Bitmap {
        self.bitmap.get_or_init(|| {
            debug!(
                "converting character class at {} ({} units, size {})",
                self.start, self.length, self.size
            );
            Bitmap::from_class_body(self.body(source), self.size, fold)
        })
    }

    /// Tests bitmap membership alone, without applying the sense.
    pub fn contains(&self, source: &[u16], fold: bool, unit: u16) -> bool {
        self.bitmap(source, fold).contains(unit)
    }

    /// Tests whether `unit` is matched by the class, applying the sense.
    pub fn matches(&self, source: &[u16], fold: bool, unit: u16) -> bool {
        self.contains(source, fold, unit) ^ !self.sense
    }
}

impl PartialEq for CharSet {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start
            && self.length == other.length
            && self.sense == other.sense
            && self.size == other.size
    }
}

impl Eq for CharSet {}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16(src: &str) -> Vec<u16> {
        src.encode_utf16().collect()
    }

    #[test]
    fn should_tokenize_class_bodies() {
        let input_output = [
            ("a", vec![ClassItem::Unit(0x61)]),
            ("a-c", vec![ClassItem::Range(0x61, 0x63)]),
            ("a-", vec![ClassItem::Unit(0x61), ClassItem::Unit(0x2D)]),
            (
                "-a",
                vec![ClassItem::Unit(0x2D), ClassItem::Unit(0x61)],
            ),
            (
                "\\d-z",
                vec![ClassItem::Digit, ClassItem::Unit(0x2D), ClassItem::Unit(0x7A)],
            ),
            ("\\x41", vec![ClassItem::Unit(0x41)]),
            ("\\u00e9", vec![ClassItem::Unit(0xE9)]),
            (
                "\\xZ",
                vec![ClassItem::Unit(0x78), ClassItem::Unit(0x5A)],
            ),
            ("\\101", vec![ClassItem::Unit(0x41)]),
            (
                "\\400",
                vec![ClassItem::Unit(0x20), ClassItem::Unit(0x30)],
            ),
            ("\\b", vec![ClassItem::Unit(0x08)]),
            ("\\cJ", vec![ClassItem::Unit(0x0A)]),
            (
                "\\c1",
                vec![
                    ClassItem::Unit(0x5C),
                    ClassItem::Unit(0x63),
                    ClassItem::Unit(0x31),
                ],
            ),
            ("\\]", vec![ClassItem::Unit(0x5D)]),
        ];

        for (test_id, (input, expected)) in input_output.into_iter().enumerate() {
            let body = utf16(input);
            let res: Result<Vec<_>, _> = ClassScanner::new(&body).collect();
            assert_eq!((test_id, Ok(expected)), (test_id, res));
        }
    }

    #[test]
    fn should_reject_invalid_ranges() {
        let inputs = ["z-a", "a-\\d", "\\x7a-\\x61"];

        for (test_id, input) in inputs.into_iter().enumerate() {
            let body = utf16(input);
            assert!(
                scan_class(&body, false).is_err(),
                "test {} expected error",
                test_id
            );
        }
    }

    #[test]
    fn should_size_bitmap_to_largest_referenced_unit() {
        let input_output = [
            ("abc", false, ClassSummary { sense: true, size: 0x63 }),
            ("^a-z", false, ClassSummary { sense: false, size: 0x7A }),
            ("A", true, ClassSummary { sense: true, size: 0x61 }),
            ("a\\d", false, ClassSummary { sense: true, size: FULL_SIZE }),
            ("", false, ClassSummary { sense: true, size: 0 }),
            ("^", false, ClassSummary { sense: false, size: 0 }),
            // micro sign upcases to greek capital mu.
            ("\\xb5-\\xb6", true, ClassSummary { sense: true, size: 0x039C }),
            ("\\xb5-\\xb6", false, ClassSummary { sense: true, size: 0xB6 }),
        ];

        for (test_id, (input, fold, expected)) in input_output.into_iter().enumerate() {
            let body = utf16(input);
            assert_eq!((test_id, Ok(expected)), (test_id, scan_class(&body, fold)));
        }
    }

    #[test]
    fn should_apply_sense_without_inverting_bitmap() {
        let source = utf16("^a-c");
        let set = CharSet::new(0, source.len(), false, u16::from(b'c'));

        assert!(!set.is_converted());
        assert!(!set.matches(&source, false, u16::from(b'b')));
        assert!(set.is_converted());
        assert!(set.matches(&source, false, u16::from(b'd')));
        assert!(set.matches(&source, false, 0x4E00));
        assert!(set.contains(&source, false, u16::from(b'a')));
    }

    #[test]
    fn should_add_both_cases_under_fold() {
        let source = utf16("a-cX");
        let bitmap = Bitmap::from_class_body(&source, u16::from(b'x'), true);

        for unit in "abcABCxX".encode_utf16() {
            assert!(bitmap.contains(unit), "missing {}", unit);
        }
        assert!(!bitmap.contains(u16::from(b'd')));
    }

    #[test]
    fn should_expand_shorthands_across_full_range() {
        let source = utf16("\\S");
        let bitmap = Bitmap::from_class_body(&source, FULL_SIZE, false);

        assert!(bitmap.contains(0xFFFF));
        assert!(bitmap.contains(u16::from(b'a')));
        assert!(!bitmap.contains(u16::from(b' ')));
        assert!(!bitmap.contains(0x3000));
    }
}

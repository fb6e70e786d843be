//! scanf-Style Argument Extraction
//!
//! AT arguments are short comma-separated lists such as `1,"internet",0x1F`.
//! Handlers written against modem documentation tend to describe them as
//! scanf formats, so [`scan`] accepts the same directive language and
//! returns the extracted fields. The number of fields matched is the length
//! of the returned vector.
//!
//! ## Supported Directives
//!
//! - `%d` signed decimal, `%u` unsigned decimal
//! - `%i` integer with C base detection (`0x` hex, leading `0` octal)
//! - `%x` hexadecimal (optional `0x` prefix), `%o` octal
//! - `%s` run of non-whitespace bytes
//! - `%c` exactly one byte (or `width` bytes), no whitespace skipping
//! - `%[set]` / `%[^set]` run of bytes in (or not in) a set, ranges allowed
//! - `%%` literal percent sign
//!
//! Any directive accepts a decimal field width and a `*` flag that matches
//! the field without storing it. Whitespace in the format matches any amount
//! of whitespace (including none) in the input; other bytes must match
//! exactly. Scanning stops at the first mismatch.

/// One extracted field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanValue {
    /// `%d`, `%i`
    Int(i64),
    /// `%u`, `%x`, `%o`
    UInt(u64),
    /// `%s`, `%[..]`, `%Nc` with N > 1
    Str(String),
    /// `%c`
    Char(char),
}

impl ScanValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ScanValue::Int(n) => Some(*n),
            ScanValue::UInt(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            ScanValue::UInt(n) => Some(*n),
            ScanValue::Int(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScanValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            ScanValue::Char(c) => Some(*c),
            _ => None,
        }
    }
}

/// Extracts fields from `input` as described by `format`.
pub fn scan(input: &str, format: &str) -> Vec<ScanValue> {
    let input = input.as_bytes();
    let fmt = format.as_bytes();
    let mut values = Vec::new();
    let mut ip = 0;
    let mut fp = 0;

    while fp < fmt.len() {
        let f = fmt[fp];

        if f.is_ascii_whitespace() {
            while fp < fmt.len() && fmt[fp].is_ascii_whitespace() {
                fp += 1;
            }
            skip_whitespace(input, &mut ip);
            continue;
        }

        if f != b'%' {
            if input.get(ip) != Some(&f) {
                break;
            }
            ip += 1;
            fp += 1;
            continue;
        }

        fp += 1;
        if fmt.get(fp) == Some(&b'%') {
            skip_whitespace(input, &mut ip);
            if input.get(ip) != Some(&b'%') {
                break;
            }
            ip += 1;
            fp += 1;
            continue;
        }

        let suppress = fmt.get(fp) == Some(&b'*');
        if suppress {
            fp += 1;
        }

        let mut width = 0usize;
        while let Some(d) = fmt.get(fp).filter(|b| b.is_ascii_digit()) {
            width = width.saturating_mul(10).saturating_add(usize::from(d - b'0'));
            fp += 1;
        }
        let width = (width > 0).then_some(width);

        let conversion = match fmt.get(fp) {
            Some(&c) => c,
            None => break,
        };
        fp += 1;

        let value = match conversion {
            b'd' => {
                skip_whitespace(input, &mut ip);
                scan_number(input, &mut ip, width, Some(10)).and_then(to_signed)
            }
            b'i' => {
                skip_whitespace(input, &mut ip);
                scan_number(input, &mut ip, width, None).and_then(to_signed)
            }
            b'u' => {
                skip_whitespace(input, &mut ip);
                scan_number(input, &mut ip, width, Some(10)).map(to_unsigned)
            }
            b'x' | b'X' => {
                skip_whitespace(input, &mut ip);
                scan_number(input, &mut ip, width, Some(16)).map(to_unsigned)
            }
            b'o' => {
                skip_whitespace(input, &mut ip);
                scan_number(input, &mut ip, width, Some(8)).map(to_unsigned)
            }
            b's' => {
                skip_whitespace(input, &mut ip);
                take_while(input, &mut ip, width, |b| !b.is_ascii_whitespace())
                    .map(ScanValue::Str)
            }
            b'c' => scan_chars(input, &mut ip, width.unwrap_or(1)),
            b'[' => match parse_scanset(fmt, &mut fp) {
                Some(set) => take_while(input, &mut ip, width, |b| set.contains(b)).map(ScanValue::Str),
                None => None,
            },
            _ => None,
        };

        match value {
            Some(value) if !suppress => values.push(value),
            Some(_) => {}
            None => break,
        }
    }

    values
}

fn skip_whitespace(input: &[u8], pos: &mut usize) {
    while *pos < input.len() && input[*pos].is_ascii_whitespace() {
        *pos += 1;
    }
}

fn has_hex_prefix(input: &[u8], i: usize, limit: usize) -> bool {
    i + 2 < limit
        && input[i] == b'0'
        && input[i + 1].eq_ignore_ascii_case(&b'x')
        && input[i + 2].is_ascii_hexdigit()
}

/// Reads an optionally signed integer. `radix == None` selects the base from
/// the prefix like `%i` does.
fn scan_number(
    input: &[u8],
    pos: &mut usize,
    width: Option<usize>,
    radix: Option<u32>,
) -> Option<(bool, u64)> {
    let limit = width.map_or(input.len(), |w| pos.saturating_add(w).min(input.len()));
    let mut i = *pos;

    let mut negative = false;
    if i < limit && (input[i] == b'+' || input[i] == b'-') {
        negative = input[i] == b'-';
        i += 1;
    }

    let radix = match radix {
        Some(16) => {
            if has_hex_prefix(input, i, limit) {
                i += 2;
            }
            16
        }
        Some(r) => r,
        None if has_hex_prefix(input, i, limit) => {
            i += 2;
            16
        }
        None if i < limit && input[i] == b'0' => 8,
        None => 10,
    };

    let start = i;
    while i < limit && char::from(input[i]).is_digit(radix) {
        i += 1;
    }
    if i == start {
        return None;
    }

    let digits = std::str::from_utf8(&input[start..i]).ok()?;
    let magnitude = u64::from_str_radix(digits, radix).ok()?;
    *pos = i;
    Some((negative, magnitude))
}

fn to_signed((negative, magnitude): (bool, u64)) -> Option<ScanValue> {
    let value = i128::from(magnitude);
    let value = if negative { -value } else { value };
    i64::try_from(value).ok().map(ScanValue::Int)
}

fn to_unsigned((negative, magnitude): (bool, u64)) -> ScanValue {
    ScanValue::UInt(if negative {
        magnitude.wrapping_neg()
    } else {
        magnitude
    })
}

fn take_while<F>(input: &[u8], pos: &mut usize, width: Option<usize>, accept: F) -> Option<String>
where
    F: Fn(u8) -> bool,
{
    let limit = width.map_or(input.len(), |w| pos.saturating_add(w).min(input.len()));
    let start = *pos;
    let mut i = start;
    while i < limit && accept(input[i]) {
        i += 1;
    }
    if i == start {
        return None;
    }
    *pos = i;
    Some(String::from_utf8_lossy(&input[start..i]).into_owned())
}

fn scan_chars(input: &[u8], pos: &mut usize, width: usize) -> Option<ScanValue> {
    let end = pos.checked_add(width)?;
    let bytes = input.get(*pos..end)?;
    *pos = end;
    if width == 1 {
        Some(ScanValue::Char(char::from(bytes[0])))
    } else {
        Some(ScanValue::Str(String::from_utf8_lossy(bytes).into_owned()))
    }
}

/// A `%[...]` byte set.
struct ScanSet {
    negated: bool,
    ranges: Vec<(u8, u8)>,
}

impl ScanSet {
    fn contains(&self, byte: u8) -> bool {
        let hit = self.ranges.iter().any(|&(lo, hi)| lo <= byte && byte <= hi);
        hit != self.negated
    }
}

/// Parses the set following `%[`. `fp` points right after the `[`.
fn parse_scanset(fmt: &[u8], fp: &mut usize) -> Option<ScanSet> {
    let mut i = *fp;
    let negated = fmt.get(i) == Some(&b'^');
    if negated {
        i += 1;
    }

    let mut ranges = Vec::new();
    // A leading ']' is part of the set
    if fmt.get(i) == Some(&b']') {
        ranges.push((b']', b']'));
        i += 1;
    }

    loop {
        let b = *fmt.get(i)?;
        if b == b']' {
            i += 1;
            break;
        }
        match (fmt.get(i + 1), fmt.get(i + 2)) {
            (Some(&b'-'), Some(&hi)) if hi != b']' => {
                ranges.push((b.min(hi), b.max(hi)));
                i += 3;
            }
            _ => {
                ranges.push((b, b));
                i += 1;
            }
        }
    }

    *fp = i;
    Some(ScanSet { negated, ranges })
}

//! Escape handling and numeric scanning shared by the string engine.

use std::fmt::Write;

/// Decode backslash escapes in the body of a string literal.
///
/// Recognizes `\\ \" \' \n \r \t \0`, `\xHH` (one or two hex digits) and
/// `\NNN` (up to three octal digits). An unknown escape yields the escaped
/// byte itself; a trailing lone backslash is kept.
pub fn unescape_literal(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        let b = src[i];
        i += 1;
        if b != b'\\' || i == src.len() {
            out.push(b);
            continue;
        }
        let e = src[i];
        i += 1;
        match e {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'x' | b'X' => {
                let digits = hex_run(&src[i..], 2);
                if digits == 0 {
                    out.push(e);
                } else {
                    out.push(parse_radix(&src[i..i + digits], 16) as u8);
                    i += digits;
                }
            }
            b'0'..=b'7' => {
                let rest = &src[i - 1..];
                let digits = rest
                    .iter()
                    .take(3)
                    .take_while(|b| (b'0'..=b'7').contains(b))
                    .count();
                out.push(parse_radix(&rest[..digits], 8) as u8);
                i += digits - 1;
            }
            other => out.push(other),
        }
    }
    out
}

/// Render bytes as a printable, re-escapable string.
pub fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'"' => out.push_str("\\\""),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\x{b:02x}");
            }
        }
    }
    out
}

/// Value of a multi-character constant such as `'abcd'`: up to four bytes,
/// packed big-endian.
pub fn char_constant(body: &[u8]) -> Option<f64> {
    let bytes = unescape_literal(body);
    if bytes.is_empty() || bytes.len() > 4 {
        return None;
    }
    Some(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32) as f64)
}

fn hex_run(s: &[u8], max: usize) -> usize {
    s.iter().take(max).take_while(|b| b.is_ascii_hexdigit()).count()
}

fn parse_radix(digits: &[u8], radix: u32) -> u64 {
    digits.iter().fold(0u64, |acc, &b| {
        let d = (b as char).to_digit(radix).unwrap_or(0) as u64;
        acc.wrapping_mul(radix as u64).wrapping_add(d)
    })
}

/// Parse a leading signed decimal integer. Returns `(value, bytes used)`.
pub fn parse_int_prefix(s: &[u8]) -> (f64, usize) {
    let neg = s.first() == Some(&b'-');
    let start = usize::from(neg || s.first() == Some(&b'+'));
    let digits = s[start..].iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return (0.0, 0);
    }
    let v = s[start..start + digits]
        .iter()
        .fold(0.0f64, |acc, &b| acc * 10.0 + (b - b'0') as f64);
    (if neg { -v } else { v }, start + digits)
}

/// Parse a leading run of hex digits. Returns `(value, bytes used)`.
pub fn parse_hex_prefix(s: &[u8]) -> (f64, usize) {
    let digits = s.iter().take_while(|b| b.is_ascii_hexdigit()).count();
    let v = s[..digits].iter().fold(0.0f64, |acc, &b| {
        acc * 16.0 + (b as char).to_digit(16).unwrap_or(0) as f64
    });
    (v, digits)
}

/// Parse a leading decimal float (`-12.5`, `.5`, `3.`, `1e-3`). Returns
/// `(value, bytes used)`; `(0.0, 0)` if no digits were found.
pub fn parse_float_prefix(s: &[u8]) -> (f64, usize) {
    let mut i = 0;
    if matches!(s.first(), Some(b'-' | b'+')) {
        i += 1;
    }
    let int_digits = s[i..].iter().take_while(|b| b.is_ascii_digit()).count();
    i += int_digits;
    let mut frac_digits = 0;
    if s.get(i) == Some(&b'.') {
        frac_digits = s[i + 1..].iter().take_while(|b| b.is_ascii_digit()).count();
        i += 1 + frac_digits;
    }
    if int_digits + frac_digits == 0 {
        return (0.0, 0);
    }
    if matches!(s.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(s.get(j), Some(b'-' | b'+')) {
            j += 1;
        }
        let exp_digits = s[j.min(s.len())..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if exp_digits > 0 {
            i = j + exp_digits;
        }
    }
    let text = std::str::from_utf8(&s[..i]).unwrap_or("0");
    // A bare "-." style prefix cannot reach here: at least one digit exists.
    (text.parse::<f64>().unwrap_or(0.0), i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_escapes() {
        assert_eq!(unescape_literal(br#"a\nb\tc\\d\"e"#), b"a\nb\tc\\d\"e");
    }

    #[test]
    fn test_hex_and_octal() {
        assert_eq!(unescape_literal(br"\x41\x4a2"), b"AJ2");
        assert_eq!(unescape_literal(br"\101\0z"), b"A\0z");
        assert_eq!(unescape_literal(br"\xg"), b"xg");
    }

    #[test]
    fn test_unknown_escape_and_trailing_backslash() {
        assert_eq!(unescape_literal(br"\q\"), b"q\\");
    }

    #[test]
    fn test_escape_roundtrip() {
        let raw = b"line\n\x00\xff\"q\"";
        let escaped = escape_bytes(raw);
        assert_eq!(escaped, r#"line\n\x00\xff\"q\""#);
        assert_eq!(unescape_literal(escaped.as_bytes()), raw);
    }

    #[test]
    fn test_char_constant() {
        assert_eq!(char_constant(b"a"), Some(97.0));
        assert_eq!(char_constant(b"iu"), Some((b'i' as u32 * 256 + b'u' as u32) as f64));
        assert_eq!(char_constant(br"\n"), Some(10.0));
        assert_eq!(char_constant(b"abcde"), None);
        assert_eq!(char_constant(b""), None);
    }

    #[test]
    fn test_int_prefix() {
        assert_eq!(parse_int_prefix(b"-42abc"), (-42.0, 3));
        assert_eq!(parse_int_prefix(b"+7"), (7.0, 2));
        assert_eq!(parse_int_prefix(b"x1"), (0.0, 0));
    }

    #[test]
    fn test_hex_prefix() {
        assert_eq!(parse_hex_prefix(b"fF10g"), (65296.0, 4));
    }

    #[test]
    fn test_float_prefix() {
        assert_eq!(parse_float_prefix(b"-12.5x"), (-12.5, 5));
        assert_eq!(parse_float_prefix(b".5"), (0.5, 2));
        assert_eq!(parse_float_prefix(b"3."), (3.0, 2));
        assert_eq!(parse_float_prefix(b"1e-3,"), (0.001, 4));
        assert_eq!(parse_float_prefix(b"2e"), (2.0, 1));
        assert_eq!(parse_float_prefix(b"-."), (0.0, 0));
    }
}

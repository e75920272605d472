//! printf-style formatting over script values.
//!
//! Arguments are script numbers. `%s` treats its argument as a string
//! index; numeric conversions format the number itself. `%{name}X` takes its
//! argument from a host variable instead of the positional list, or from the
//! named string `name` when the name starts with `#`.

use std::fmt;

use crate::host::Variables;
use crate::strings::StringContext;

/// Why a format string was rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormatError {
    /// `%` followed by an unsupported conversion byte.
    UnknownConversion { pos: usize, conv: u8 },
    /// `%{` without a closing `}`.
    UnterminatedName { pos: usize },
    /// Format string ends inside a specifier.
    Truncated { pos: usize },
    /// More positional conversions than arguments.
    MissingArgument { pos: usize, index: usize },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::UnknownConversion { pos, conv } => {
                write!(f, "unknown conversion '{}' at byte {pos}", conv.escape_ascii())
            }
            FormatError::UnterminatedName { pos } => {
                write!(f, "unterminated %{{name}} at byte {pos}")
            }
            FormatError::Truncated { pos } => write!(f, "format ends inside specifier at byte {pos}"),
            FormatError::MissingArgument { pos, index } => {
                write!(f, "no argument {index} for specifier at byte {pos}")
            }
        }
    }
}

impl std::error::Error for FormatError {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags {
    pub left: bool,
    pub plus: bool,
    pub space: bool,
    pub zero: bool,
    pub alt: bool,
}

/// One parsed conversion specifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spec<'a> {
    pub flags: Flags,
    pub width: Option<usize>,
    pub precision: Option<usize>,
    pub conv: u8,
    /// `%{name}` binding, without the braces.
    pub name: Option<&'a [u8]>,
}

const CONVERSIONS: &[u8] = b"sSduixXcCfeEgG";

/// Parse the specifier whose `%` is at `fmt[pos]`. Returns the spec and the
/// index just past it. `%%` is handled by the caller.
pub fn parse_spec(fmt: &[u8], pos: usize, max_width: usize) -> Result<(Spec<'_>, usize), FormatError> {
    let mut i = pos + 1;
    let mut name = None;

    if fmt.get(i) == Some(&b'{') {
        let close = fmt[i + 1..]
            .iter()
            .position(|&b| b == b'}')
            .ok_or(FormatError::UnterminatedName { pos })?;
        name = Some(&fmt[i + 1..i + 1 + close]);
        i += close + 2;
    }

    let mut flags = Flags::default();
    while let Some(&b) = fmt.get(i) {
        match b {
            b'-' => flags.left = true,
            b'+' => flags.plus = true,
            b' ' => flags.space = true,
            b'0' => flags.zero = true,
            b'#' => flags.alt = true,
            _ => break,
        }
        i += 1;
    }

    let (width, used) = parse_count(&fmt[i.min(fmt.len())..], max_width);
    i += used;
    let width = (used > 0).then_some(width);

    let mut precision = None;
    if fmt.get(i) == Some(&b'.') {
        i += 1;
        let (p, used) = parse_count(&fmt[i.min(fmt.len())..], max_width);
        i += used;
        precision = Some(p);
    }

    let conv = *fmt.get(i).ok_or(FormatError::Truncated { pos })?;
    if !CONVERSIONS.contains(&conv) {
        return Err(FormatError::UnknownConversion { pos, conv });
    }
    Ok((
        Spec {
            flags,
            width,
            precision,
            conv,
            name,
        },
        i + 1,
    ))
}

fn parse_count(s: &[u8], max: usize) -> (usize, usize) {
    let used = s.iter().take_while(|b| b.is_ascii_digit()).count();
    let v = s[..used]
        .iter()
        .fold(0usize, |acc, &b| acc.saturating_mul(10).saturating_add((b - b'0') as usize));
    (v.min(max), used)
}

/// Output buffer that silently stops growing at its cap.
struct Capped<'a> {
    out: &'a mut Vec<u8>,
    cap: usize,
}

impl Capped<'_> {
    fn push(&mut self, b: u8) {
        if self.out.len() < self.cap {
            self.out.push(b);
        }
    }

    fn extend(&mut self, bytes: &[u8]) {
        let room = self.cap.saturating_sub(self.out.len());
        self.out.extend_from_slice(&bytes[..bytes.len().min(room)]);
    }

    fn repeat(&mut self, b: u8, n: usize) {
        let n = n.min(self.cap.saturating_sub(self.out.len()));
        self.out.resize(self.out.len() + n, b);
    }

    /// Emit `prefix` + `body`, padded to `width` per the flags.
    fn padded(&mut self, flags: Flags, width: Option<usize>, prefix: &[u8], body: &[u8], zero_ok: bool) {
        let len = prefix.len() + body.len();
        let pad = width.unwrap_or(0).saturating_sub(len);
        if flags.left {
            self.extend(prefix);
            self.extend(body);
            self.repeat(b' ', pad);
        } else if flags.zero && zero_ok {
            self.extend(prefix);
            self.repeat(b'0', pad);
            self.extend(body);
        } else {
            self.repeat(b' ', pad);
            self.extend(prefix);
            self.extend(body);
        }
    }
}

/// Where a specifier's value comes from.
pub struct FormatArgs<'a> {
    pub positional: &'a [f64],
    pub vars: &'a dyn Variables,
    pub strings: &'a StringContext,
}

/// Format `fmt` into `out`, appending at most up to `cap` total bytes.
/// Returns the number of bytes appended. On error `out` may hold a partial
/// result; callers discard it.
pub fn format_into(
    out: &mut Vec<u8>,
    fmt: &[u8],
    args: &FormatArgs<'_>,
    cap: usize,
) -> Result<usize, FormatError> {
    let start = out.len();
    let mut w = Capped { out, cap };
    let mut next_arg = 0;
    let mut i = 0;

    while i < fmt.len() {
        let b = fmt[i];
        if b != b'%' {
            // Copy the literal run in one go.
            let run = fmt[i..].iter().position(|&c| c == b'%').unwrap_or(fmt.len() - i);
            w.extend(&fmt[i..i + run]);
            i += run;
            continue;
        }
        if fmt.get(i + 1) == Some(&b'%') {
            w.push(b'%');
            i += 2;
            continue;
        }

        let (spec, end) = parse_spec(fmt, i, cap)?;
        let value = match spec.name {
            Some(name) => named_value(name, args),
            None => {
                let v = *args
                    .positional
                    .get(next_arg)
                    .ok_or(FormatError::MissingArgument { pos: i, index: next_arg })?;
                next_arg += 1;
                v
            }
        };
        emit(&mut w, &spec, value, args.strings);
        i = end;
    }

    Ok(w.out.len() - start)
}

fn named_value(name: &[u8], args: &FormatArgs<'_>) -> f64 {
    let name = String::from_utf8_lossy(name);
    if let Some(string_name) = name.strip_prefix('#') {
        return args.strings.lookup_named(string_name).unwrap_or(-1.0);
    }
    args.vars.get(&name).unwrap_or(0.0)
}

/// Round to nearest (ties away from zero) and clamp into `i64`.
/// Plain `as` truncates, which formats 2.9999999 as 2.
pub fn round_to_int(v: f64) -> i64 {
    if v.is_nan() { 0 } else { v.round() as i64 }
}

fn emit(w: &mut Capped<'_>, spec: &Spec<'_>, value: f64, strings: &StringContext) {
    match spec.conv {
        b's' | b'S' => {
            let bytes = strings.get_for_read(value).unwrap_or(&[]);
            if spec.width.is_none() && spec.precision.is_none() {
                w.extend(bytes);
            } else {
                let body = &bytes[..spec.precision.map_or(bytes.len(), |p| p.min(bytes.len()))];
                w.padded(spec.flags, spec.width, b"", body, false);
            }
        }
        b'c' => {
            let c = [round_to_int(value) as u8];
            w.padded(spec.flags, spec.width, b"", &c, false);
        }
        b'C' => {
            let packed = (round_to_int(value) as u32).to_be_bytes();
            let skip = packed.iter().take_while(|&&b| b == 0).count();
            w.padded(spec.flags, spec.width, b"", &packed[skip..], false);
        }
        b'd' | b'i' => {
            let n = round_to_int(value);
            let sign = sign_prefix(n < 0, spec.flags);
            let digits = int_digits(n.unsigned_abs(), 10, false, spec.precision);
            w.padded(spec.flags, spec.width, sign, &digits, spec.precision.is_none());
        }
        b'u' | b'x' | b'X' => {
            let n = unsigned_of(round_to_int(value));
            let (radix, upper) = match spec.conv {
                b'u' => (10, false),
                b'x' => (16, false),
                _ => (16, true),
            };
            let digits = int_digits(n, radix, upper, spec.precision);
            let prefix: &[u8] = match (spec.flags.alt && n != 0, spec.conv) {
                (true, b'x') => b"0x",
                (true, b'X') => b"0X",
                _ => b"",
            };
            w.padded(spec.flags, spec.width, prefix, &digits, spec.precision.is_none());
        }
        _ => {
            let upper = spec.conv.is_ascii_uppercase();
            let sign = sign_prefix(value.is_sign_negative() && !value.is_nan(), spec.flags);
            let body = if value.is_finite() {
                let p = spec.precision.unwrap_or(6);
                let abs = value.abs();
                match spec.conv.to_ascii_lowercase() {
                    b'f' => fixed(abs, p, spec.flags.alt),
                    b'e' => exponential(abs, p, spec.flags.alt),
                    _ => general(abs, p, spec.flags.alt),
                }
            } else if value.is_nan() {
                "nan".to_string()
            } else {
                "inf".to_string()
            };
            let body = if upper { body.to_ascii_uppercase() } else { body };
            w.padded(spec.flags, spec.width, sign, body.as_bytes(), value.is_finite());
        }
    }
}

/// C `unsigned int` view of negative values that fit `int`; wider values
/// keep their 64-bit pattern.
fn unsigned_of(n: i64) -> u64 {
    if n < 0 && n >= i32::MIN as i64 {
        n as i32 as u32 as u64
    } else {
        n as u64
    }
}

fn sign_prefix(negative: bool, flags: Flags) -> &'static [u8] {
    if negative {
        b"-"
    } else if flags.plus {
        b"+"
    } else if flags.space {
        b" "
    } else {
        b""
    }
}

fn int_digits(mut n: u64, radix: u64, upper: bool, precision: Option<usize>) -> Vec<u8> {
    let table: &[u8; 16] = if upper { b"0123456789ABCDEF" } else { b"0123456789abcdef" };
    let mut digits = Vec::new();
    if n == 0 && precision == Some(0) {
        return digits;
    }
    loop {
        digits.push(table[(n % radix) as usize]);
        n /= radix;
        if n == 0 {
            break;
        }
    }
    let min = precision.unwrap_or(1);
    while digits.len() < min {
        digits.push(b'0');
    }
    digits.reverse();
    digits
}

fn fixed(abs: f64, precision: usize, alt: bool) -> String {
    let mut s = format!("{abs:.precision$}");
    if alt && precision == 0 {
        s.push('.');
    }
    s
}

/// Split Rust's `1.5e3` into mantissa and exponent.
fn rust_exp(abs: f64, precision: usize) -> (String, i32) {
    let s = format!("{abs:.precision$e}");
    match s.split_once('e') {
        Some((m, e)) => (m.to_string(), e.parse().unwrap_or(0)),
        None => (s, 0),
    }
}

fn c_exponent(mantissa: &str, exp: i32) -> String {
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exp.unsigned_abs())
}

fn exponential(abs: f64, precision: usize, alt: bool) -> String {
    let (mut m, e) = rust_exp(abs, precision);
    if alt && precision == 0 {
        m.push('.');
    }
    c_exponent(&m, e)
}

fn general(abs: f64, precision: usize, alt: bool) -> String {
    let p = precision.max(1);
    let x = if abs == 0.0 { 0 } else { rust_exp(abs, p - 1).1 };
    if x < p as i32 && x >= -4 {
        let s = fixed(abs, (p as i32 - 1 - x) as usize, alt);
        if alt { s } else { strip_zeros(&s).to_string() }
    } else {
        let (m, e) = rust_exp(abs, p - 1);
        let m = if alt {
            if m.contains('.') { m } else { m + "." }
        } else {
            strip_zeros(&m).to_string()
        };
        c_exponent(&m, e)
    }
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

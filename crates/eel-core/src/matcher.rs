//! Wildcard and typed-placeholder matching, anchored at both ends.
//!
//! Pattern syntax:
//!
//! | token | matches |
//! |---|---|
//! | `?` | exactly one byte |
//! | `*`, `*?` | zero or more bytes, greedy / lazy |
//! | `+`, `+?` | one or more bytes, greedy / lazy |
//! | `%s` `%d` `%u` `%x` `%f` | a typed field, 1 or more bytes by default |
//! | `%c` | exactly one byte |
//! | `%%` | a literal `%` |
//!
//! Field lengths: `%0s` zero or more, `%5s` exactly five, `%5-s` five or
//! more, `%-10s` one to ten, `%3-5s` three to five. An uppercase type letter
//! (`%S`, `%D`, ...) matches lazily. `%{name}d` captures into a named target
//! instead of the next positional one.
//!
//! The search backtracks and is exponential for adversarial patterns, so
//! every call runs against a step budget and a nesting bound
//! ([`MatchLimits`]). Adjacent wildcards of the same laziness collapse into
//! one token.

use std::fmt;
use std::ops::{Range, RangeInclusive};

use crate::lexical::{parse_float_prefix, parse_hex_prefix, parse_int_prefix};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatternError {
    UnknownType { pos: usize, conv: u8 },
    UnterminatedName { pos: usize },
    Truncated { pos: usize },
    /// `%c` with a length modifier.
    CharWithLength { pos: usize },
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::UnknownType { pos, conv } => {
                write!(f, "unknown field type '{}' at byte {pos}", conv.escape_ascii())
            }
            PatternError::UnterminatedName { pos } => write!(f, "unterminated %{{name}} at byte {pos}"),
            PatternError::Truncated { pos } => write!(f, "pattern ends inside field at byte {pos}"),
            PatternError::CharWithLength { pos } => write!(f, "%c takes no length at byte {pos}"),
        }
    }
}

impl std::error::Error for PatternError {}

/// Where a field's capture goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target<'p> {
    /// The n-th unnamed field in the pattern.
    Positional(usize),
    Named(&'p [u8]),
}

/// Typed field kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Char,
    Int,
    Unsigned,
    Hex,
    Float,
}

impl FieldKind {
    fn from_conv(conv: u8) -> Option<Self> {
        Some(match conv.to_ascii_lowercase() {
            b's' => FieldKind::Str,
            b'c' => FieldKind::Char,
            b'd' => FieldKind::Int,
            b'u' => FieldKind::Unsigned,
            b'x' => FieldKind::Hex,
            b'f' => FieldKind::Float,
            _ => return None,
        })
    }

    /// Length of the longest run at the start of `s` valid for this kind.
    fn run_len(self, s: &[u8]) -> usize {
        match self {
            FieldKind::Str => s.len(),
            FieldKind::Char => s.len().min(1),
            FieldKind::Unsigned => s.iter().take_while(|b| b.is_ascii_digit()).count(),
            FieldKind::Hex => s.iter().take_while(|b| b.is_ascii_hexdigit()).count(),
            FieldKind::Int => {
                let sign = usize::from(s.first() == Some(&b'-'));
                match s[sign..].iter().take_while(|b| b.is_ascii_digit()).count() {
                    0 => 0,
                    digits => sign + digits,
                }
            }
            FieldKind::Float => {
                let sign = usize::from(s.first() == Some(&b'-'));
                let mut seen_dot = false;
                let mut digits = 0;
                let body = s[sign..]
                    .iter()
                    .take_while(|&&b| {
                        if b == b'.' && !seen_dot {
                            seen_dot = true;
                            true
                        } else if b.is_ascii_digit() {
                            digits += 1;
                            true
                        } else {
                            false
                        }
                    })
                    .count();
                if digits == 0 { 0 } else { sign + body }
            }
        }
    }

    pub fn is_text(self) -> bool {
        self == FieldKind::Str
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token<'p> {
    Literal(u8),
    AnyOne,
    Wild {
        min: usize,
        lazy: bool,
    },
    Field {
        kind: FieldKind,
        min: usize,
        max: usize,
        lazy: bool,
        target: Target<'p>,
    },
}

/// Tokenize a pattern, numbering unnamed fields in order.
pub fn parse_pattern(pattern: &[u8]) -> Result<Vec<Token<'_>>, PatternError> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut positional = 0;
    let mut i = 0;

    while i < pattern.len() {
        let b = pattern[i];
        match b {
            b'?' => {
                tokens.push(Token::AnyOne);
                i += 1;
            }
            b'*' | b'+' => {
                let lazy = pattern.get(i + 1) == Some(&b'?');
                let min = usize::from(b == b'+');
                match tokens.last_mut() {
                    Some(Token::Wild { min: prev, lazy: l }) if *l == lazy => *prev += min,
                    _ => tokens.push(Token::Wild { min, lazy }),
                }
                i += 1 + usize::from(lazy);
            }
            b'%' if pattern.get(i + 1) == Some(&b'%') => {
                tokens.push(Token::Literal(b'%'));
                i += 2;
            }
            b'%' => {
                let (token, end) = parse_field(pattern, i, &mut positional)?;
                tokens.push(token);
                i = end;
            }
            _ => {
                tokens.push(Token::Literal(b));
                i += 1;
            }
        }
    }
    Ok(tokens)
}

fn parse_field<'p>(
    pattern: &'p [u8],
    pos: usize,
    positional: &mut usize,
) -> Result<(Token<'p>, usize), PatternError> {
    let mut i = pos + 1;
    let mut name = None;
    if pattern.get(i) == Some(&b'{') {
        let close = pattern[i + 1..]
            .iter()
            .position(|&b| b == b'}')
            .ok_or(PatternError::UnterminatedName { pos })?;
        name = Some(&pattern[i + 1..i + 1 + close]);
        i += close + 2;
    }

    let lo = number(&pattern[i.min(pattern.len())..]);
    i += lo.1;
    let dash = pattern.get(i) == Some(&b'-');
    let mut hi = (None, 0);
    if dash {
        i += 1;
        hi = number(&pattern[i.min(pattern.len())..]);
        i += hi.1;
    }
    let has_length = lo.1 > 0 || dash;

    let conv = *pattern.get(i).ok_or(PatternError::Truncated { pos })?;
    let kind = FieldKind::from_conv(conv).ok_or(PatternError::UnknownType { pos, conv })?;
    if kind == FieldKind::Char && has_length {
        return Err(PatternError::CharWithLength { pos });
    }

    let (min, max) = match (lo.0, dash, hi.0) {
        _ if kind == FieldKind::Char => (1, 1),
        (None, false, _) => (1, usize::MAX),
        (Some(0), false, _) => (0, usize::MAX),
        (Some(n), false, _) => (n, n),
        (lo, true, hi) => (lo.unwrap_or(1), hi.unwrap_or(usize::MAX)),
    };

    let target = match name {
        Some(n) => Target::Named(n),
        None => {
            let t = Target::Positional(*positional);
            *positional += 1;
            t
        }
    };

    Ok((
        Token::Field {
            kind,
            min,
            max,
            lazy: conv.is_ascii_uppercase(),
            target,
        },
        i + 1,
    ))
}

fn number(s: &[u8]) -> (Option<usize>, usize) {
    let used = s.iter().take_while(|b| b.is_ascii_digit()).count();
    if used == 0 {
        return (None, 0);
    }
    let v = s[..used]
        .iter()
        .fold(0usize, |acc, &b| acc.saturating_mul(10).saturating_add((b - b'0') as usize));
    (Some(v), used)
}

/// Bound on backtracking work for one call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchLimits {
    /// Recursion steps; 0 means unbounded.
    pub max_steps: u64,
    /// Nested wildcard/field tokens on the current path. Always enforced,
    /// since each level is a native stack frame.
    pub max_depth: usize,
}

impl Default for MatchLimits {
    fn default() -> Self {
        Self {
            max_steps: crate::constants::MATCH_MAX_STEPS,
            max_depth: crate::constants::MATCH_MAX_DEPTH,
        }
    }
}

/// A field captured on the successful path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchCapture<'p> {
    pub target: Target<'p>,
    pub kind: FieldKind,
    /// Byte range in the haystack.
    pub span: Range<usize>,
}

impl MatchCapture<'_> {
    /// Numeric value of the capture, for non-text kinds.
    pub fn value(&self, haystack: &[u8]) -> f64 {
        let text = &haystack[self.span.clone()];
        match self.kind {
            FieldKind::Str => 0.0,
            FieldKind::Char => text.first().map_or(0.0, |&b| b as f64),
            FieldKind::Int | FieldKind::Unsigned => parse_int_prefix(text).0,
            FieldKind::Hex => parse_hex_prefix(text).0,
            FieldKind::Float => parse_float_prefix(text).0,
        }
    }
}

struct Matcher<'t, 'p, 'h> {
    tokens: &'t [Token<'p>],
    hay: &'h [u8],
    ignore_case: bool,
    steps: u64,
    max_steps: u64,
    depth: usize,
    max_depth: usize,
    exhausted: bool,
    captures: Vec<MatchCapture<'p>>,
}

impl<'p> Matcher<'_, 'p, '_> {
    fn tick(&mut self) -> bool {
        self.steps += 1;
        if self.max_steps != 0 && self.steps > self.max_steps {
            self.exhausted = true;
        }
        !self.exhausted
    }

    fn eq(&self, a: u8, b: u8) -> bool {
        a == b || (self.ignore_case && a.eq_ignore_ascii_case(&b))
    }

    fn run(&mut self, mut ti: usize, mut hi: usize) -> bool {
        if !self.tick() {
            return false;
        }
        let tokens = self.tokens;
        // Fixed-width tokens are consumed without recursing.
        loop {
            match tokens.get(ti) {
                None => return hi == self.hay.len(),
                Some(&Token::Literal(c)) => {
                    match self.hay.get(hi) {
                        Some(&h) if self.eq(c, h) => {}
                        _ => return false,
                    }
                    ti += 1;
                    hi += 1;
                }
                Some(Token::AnyOne) => {
                    if hi >= self.hay.len() {
                        return false;
                    }
                    ti += 1;
                    hi += 1;
                }
                Some(&Token::Wild { min, lazy }) => {
                    let avail = self.hay.len() - hi;
                    if avail < min {
                        return false;
                    }
                    if ti + 1 == tokens.len() {
                        return true;
                    }
                    return self.try_lengths(ti + 1, hi, min..=avail, lazy, None);
                }
                Some(&Token::Field {
                    kind,
                    min,
                    max,
                    lazy,
                    target,
                }) => {
                    let avail = kind.run_len(&self.hay[hi..]);
                    if avail < min {
                        return false;
                    }
                    let lengths = min..=avail.min(max);
                    return self.try_lengths(ti + 1, hi, lengths, lazy, Some((target, kind)));
                }
            }
        }
    }

    /// Try each length in `lengths` (longest first unless lazy) and record a
    /// capture on the first one whose remainder matches.
    fn try_lengths(
        &mut self,
        next: usize,
        hi: usize,
        lengths: RangeInclusive<usize>,
        lazy: bool,
        capture: Option<(Target<'p>, FieldKind)>,
    ) -> bool {
        if self.depth >= self.max_depth {
            self.exhausted = true;
            return false;
        }
        self.depth += 1;
        let matched = self.try_each(next, hi, lengths, lazy, capture);
        self.depth -= 1;
        matched
    }

    fn try_each(
        &mut self,
        next: usize,
        hi: usize,
        lengths: RangeInclusive<usize>,
        lazy: bool,
        capture: Option<(Target<'p>, FieldKind)>,
    ) -> bool {
        let order: Box<dyn Iterator<Item = usize>> = if lazy {
            Box::new(lengths)
        } else {
            Box::new(lengths.rev())
        };
        for len in order {
            if self.run(next, hi + len) {
                if let Some((target, kind)) = capture {
                    self.captures.push(MatchCapture {
                        target,
                        kind,
                        span: hi..hi + len,
                    });
                }
                return true;
            }
            if self.exhausted {
                return false;
            }
        }
        false
    }
}

/// Match `pattern` against the whole of `haystack`.
///
/// Returns `Ok(Some(captures))` on success, in pattern order, `Ok(None)` on
/// a mismatch or when a budget in `limits` runs out, and `Err` for a malformed
/// pattern.
pub fn match_pattern<'p>(
    pattern: &'p [u8],
    haystack: &[u8],
    ignore_case: bool,
    limits: MatchLimits,
) -> Result<Option<Vec<MatchCapture<'p>>>, PatternError> {
    let tokens = parse_pattern(pattern)?;
    let mut m = Matcher {
        tokens: &tokens,
        hay: haystack,
        ignore_case,
        steps: 0,
        max_steps: limits.max_steps,
        depth: 0,
        max_depth: limits.max_depth,
        exhausted: false,
        captures: Vec::new(),
    };
    if m.run(0, 0) {
        // Recorded innermost-first while unwinding.
        m.captures.reverse();
        Ok(Some(m.captures))
    } else {
        if m.exhausted {
            tracing::debug!(steps = m.steps, "match abandoned: step or depth budget exhausted");
        }
        Ok(None)
    }
}

/// Plain yes/no match; malformed patterns do not match.
pub fn is_match(pattern: &[u8], haystack: &[u8], ignore_case: bool) -> bool {
    matches!(
        match_pattern(pattern, haystack, ignore_case, MatchLimits::default()),
        Ok(Some(_))
    )
}

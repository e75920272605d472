//! Script-facing native functions.
//!
//! Every function takes the context it operates on plus the script's numeric
//! arguments and returns a number, so a host binds them one-to-one. None of
//! them fail loudly: bad indices and ranges degrade to no-ops, and malformed
//! format strings return -1. No string grows past the context's length limit.

use std::cmp::Ordering;

use crate::format::{FormatArgs, format_into};
use crate::host::{OutputSink, Variables};
use crate::matcher::{MatchCapture, MatchLimits, Target, match_pattern};
use crate::ram::{RamTable, script_int};
use crate::strings::{EelString, StringContext};
use crate::typed::{ByteType, read_typed, write_end, write_typed};

pub use crate::transform::{imdct, mdct};

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

pub fn memcpy(ram: &RamTable, dest: f64, src: f64, len: f64) -> f64 {
    ram.copy(dest, src, len)
}

pub fn memset(ram: &RamTable, dest: f64, value: f64, len: f64) -> f64 {
    ram.fill(dest, value, len)
}

/// Returns `from`. The host reclaims the pages between script runs.
pub fn free(ram: &RamTable, from: f64) -> f64 {
    ram.request_free(from)
}

pub fn memtop(ram: &RamTable) -> f64 {
    ram.top()
}

/// Returns the number of cells written.
pub fn mem_set_values(ram: &RamTable, addr: f64, values: &[f64]) -> f64 {
    ram.set_values(addr, values) as f64
}

/// Returns the number of cells read.
pub fn mem_get_values(ram: &RamTable, addr: f64, outs: &mut [f64]) -> f64 {
    ram.get_values(addr, outs) as f64
}

pub fn mem_multiply_sum(ram: &RamTable, a: f64, b: f64, len: f64) -> f64 {
    ram.multiply_sum(a, b, len)
}

pub fn mem_insert_shuffle(ram: &RamTable, addr: f64, len: f64, value: f64) -> f64 {
    ram.insert_shuffle(addr, len, value)
}

// ---------------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------------

/// Clamp a script count to `[0, limit]`; negative means "no limit".
fn count_or_all(n: f64, limit: usize) -> usize {
    let n = script_int(n);
    if n < 0 { limit } else { (n as usize).min(limit) }
}

/// Run `op` on `dest` with a private copy of `src`, so the two may be the
/// same string. A result longer than the length limit is cut to it.
/// Returns `dest`.
fn with_source(s: &mut StringContext, dest: f64, src: f64, op: impl FnOnce(&mut EelString, &[u8])) -> f64 {
    let cap = s.max_len();
    let Some(copy) = s.take_copy(src) else {
        return dest;
    };
    if let Some(d) = s.get_for_write(dest) {
        op(d, &copy);
        if d.len() > cap {
            tracing::debug!(dest, len = d.len(), cap, "string truncated to length limit");
            d.set_len(cap);
        }
    }
    s.restore_scratch(copy);
    dest
}

pub fn strlen(s: &StringContext, idx: f64) -> f64 {
    s.get_for_read(idx).map_or(0.0, |b| b.len() as f64)
}

pub fn strcpy(s: &mut StringContext, dest: f64, src: f64) -> f64 {
    with_source(s, dest, src, |d, b| d.set(b))
}

/// Copy at most `maxlen` bytes; a negative `maxlen` copies everything.
pub fn strncpy(s: &mut StringContext, dest: f64, src: f64, maxlen: f64) -> f64 {
    with_source(s, dest, src, |d, b| d.set(&b[..count_or_all(maxlen, b.len())]))
}

pub fn strcat(s: &mut StringContext, dest: f64, src: f64) -> f64 {
    with_source(s, dest, src, |d, b| d.append(b))
}

pub fn strncat(s: &mut StringContext, dest: f64, src: f64, maxlen: f64) -> f64 {
    with_source(s, dest, src, |d, b| d.append(&b[..count_or_all(maxlen, b.len())]))
}

/// Copy `src` from byte `offset` on. Negative offsets count from the end.
pub fn strcpy_from(s: &mut StringContext, dest: f64, src: f64, offset: f64) -> f64 {
    with_source(s, dest, src, |d, b| {
        let start = start_offset(offset, b.len());
        d.set(&b[start..]);
    })
}

/// Copy a substring. A negative `offset` counts from the end; a negative
/// `maxlen` stops that many bytes before the end.
pub fn strcpy_substr(s: &mut StringContext, dest: f64, src: f64, offset: f64, maxlen: f64) -> f64 {
    with_source(s, dest, src, |d, b| {
        let start = start_offset(offset, b.len());
        let n = script_int(maxlen);
        let end = if n < 0 {
            b.len().saturating_sub(n.unsigned_abs() as usize)
        } else {
            start.saturating_add(n as usize).min(b.len())
        };
        d.set(&b[start..end.max(start)]);
    })
}

fn start_offset(offset: f64, len: usize) -> usize {
    let o = script_int(offset);
    if o < 0 {
        len.saturating_sub(o.unsigned_abs() as usize)
    } else {
        (o as usize).min(len)
    }
}

fn compare(s: &StringContext, a: f64, b: f64, limit: Option<usize>, ignore_case: bool) -> f64 {
    let a = s.get_for_read(a).unwrap_or(&[]);
    let b = s.get_for_read(b).unwrap_or(&[]);
    let (a, b) = match limit {
        Some(n) => (&a[..n.min(a.len())], &b[..n.min(b.len())]),
        None => (a, b),
    };
    let ord = if ignore_case {
        a.iter()
            .map(u8::to_ascii_lowercase)
            .cmp(b.iter().map(u8::to_ascii_lowercase))
    } else {
        a.cmp(b)
    };
    match ord {
        Ordering::Less => -1.0,
        Ordering::Equal => 0.0,
        Ordering::Greater => 1.0,
    }
}

fn limit_of(n: f64) -> Option<usize> {
    let n = script_int(n);
    (n >= 0).then_some(n as usize)
}

pub fn strcmp(s: &StringContext, a: f64, b: f64) -> f64 {
    compare(s, a, b, None, false)
}

pub fn stricmp(s: &StringContext, a: f64, b: f64) -> f64 {
    compare(s, a, b, None, true)
}

/// Compare at most `n` bytes; negative `n` compares everything.
pub fn strncmp(s: &StringContext, a: f64, b: f64, n: f64) -> f64 {
    compare(s, a, b, limit_of(n), false)
}

pub fn strnicmp(s: &StringContext, a: f64, b: f64, n: f64) -> f64 {
    compare(s, a, b, limit_of(n), true)
}

/// Byte at `offset` (negative counts from the end), or 0.
pub fn str_getchar(s: &StringContext, idx: f64, offset: f64) -> f64 {
    str_getchar_typed(s, idx, offset, None)
}

/// Typed read. An unknown type code reads 0.
pub fn str_getchar_typed(s: &StringContext, idx: f64, offset: f64, ty: Option<f64>) -> f64 {
    let ty = match ty {
        Some(code) => match ByteType::from_code(code) {
            Some(t) => t,
            None => return 0.0,
        },
        None => ByteType::BYTE,
    };
    s.get_for_read(idx)
        .map_or(0.0, |bytes| read_typed(bytes, offset, ty))
}

/// Store one byte. Writing at the current length appends. Returns `idx`.
pub fn str_setchar(s: &mut StringContext, idx: f64, offset: f64, value: f64) -> f64 {
    str_setchar_typed(s, idx, offset, value, None)
}

pub fn str_setchar_typed(s: &mut StringContext, idx: f64, offset: f64, value: f64, ty: Option<f64>) -> f64 {
    let ty = match ty {
        Some(code) => match ByteType::from_code(code) {
            Some(t) => t,
            None => return idx,
        },
        None => ByteType::BYTE,
    };
    let cap = s.max_len();
    if let Some(d) = s.get_for_write(idx) {
        match write_end(d.len(), offset, ty) {
            Some(end) if end > d.len() && end > cap => {
                tracing::debug!(idx, len = d.len(), cap, "str_setchar would grow string past length limit");
            }
            _ => {
                write_typed(d.buffer_mut(), offset, ty, value);
            }
        }
    }
    idx
}

/// Insert `src` into `dest` at `pos` (clamped). Returns `dest`.
pub fn str_insert(s: &mut StringContext, dest: f64, src: f64, pos: f64) -> f64 {
    let at = script_int(pos).max(0) as usize;
    with_source(s, dest, src, |d, b| d.insert(at, b))
}

/// Delete `len` bytes at `pos`. Returns `dest`.
pub fn str_delsub(s: &mut StringContext, dest: f64, pos: f64, len: f64) -> f64 {
    let at = script_int(pos);
    let n = script_int(len);
    if at >= 0
        && n > 0
        && let Some(d) = s.get_for_write(dest)
    {
        d.delete(at as usize, n as usize);
    }
    dest
}

/// Truncate or space-pad to `len`, capped at the context's string limit.
/// Returns the new length.
pub fn str_setlen(s: &mut StringContext, dest: f64, len: f64) -> f64 {
    let cap = s.max_len();
    let n = (script_int(len).max(0) as usize).min(cap);
    match s.get_for_write(dest) {
        Some(d) => {
            d.set_len(n);
            n as f64
        }
        None => 0.0,
    }
}

/// Format into a fresh buffer. `None` for a malformed or unreadable format.
fn render(s: &mut StringContext, vars: &dyn Variables, fmt: f64, args: &[f64]) -> Option<Vec<u8>> {
    let fmt_bytes = s.take_copy(fmt)?;
    let mut out = Vec::new();
    let result = format_into(
        &mut out,
        &fmt_bytes,
        &FormatArgs {
            positional: args,
            vars,
            strings: s,
        },
        s.max_len(),
    );
    let rendered = match result {
        Ok(_) => Some(out),
        Err(e) => {
            tracing::debug!(error = %e, "malformed format string");
            None
        }
    };
    s.restore_scratch(fmt_bytes);
    rendered
}

/// `sprintf(dest, fmt, ...)`. Returns the formatted length, or -1 with
/// `dest` untouched if the format is malformed.
pub fn sprintf(s: &mut StringContext, vars: &dyn Variables, dest: f64, fmt: f64, args: &[f64]) -> f64 {
    let Some(out) = render(s, vars, fmt, args) else {
        return -1.0;
    };
    if s.write(dest, &out) { out.len() as f64 } else { 0.0 }
}

/// `printf(fmt, ...)` to the host sink. Returns bytes written, or -1.
pub fn printf(
    s: &mut StringContext,
    vars: &dyn Variables,
    sink: &mut dyn OutputSink,
    fmt: f64,
    args: &[f64],
) -> f64 {
    let Some(out) = render(s, vars, fmt, args) else {
        return -1.0;
    };
    sink.write_bytes(&out);
    out.len() as f64
}

/// `match(pattern, haystack, ...)`: 1 on a match, else 0. Captures go to
/// `outs` in field order, or to named variables and strings.
pub fn r#match(
    s: &mut StringContext,
    vars: &mut dyn Variables,
    pattern: f64,
    haystack: f64,
    outs: &mut [f64],
    limits: MatchLimits,
) -> f64 {
    run_match(s, vars, pattern, haystack, outs, limits, false)
}

/// Case-insensitive [`match`](r#match).
pub fn matchi(
    s: &mut StringContext,
    vars: &mut dyn Variables,
    pattern: f64,
    haystack: f64,
    outs: &mut [f64],
    limits: MatchLimits,
) -> f64 {
    run_match(s, vars, pattern, haystack, outs, limits, true)
}

fn run_match(
    s: &mut StringContext,
    vars: &mut dyn Variables,
    pattern_idx: f64,
    hay_idx: f64,
    outs: &mut [f64],
    limits: MatchLimits,
    ignore_case: bool,
) -> f64 {
    let Some(pattern) = s.get_for_read(pattern_idx).map(<[u8]>::to_vec) else {
        return 0.0;
    };
    let Some(hay) = s.take_copy(hay_idx) else {
        return 0.0;
    };
    let matched = match match_pattern(&pattern, &hay, ignore_case, limits) {
        Ok(Some(captures)) => {
            let aliases = [pattern_idx, hay_idx];
            for cap in &captures {
                apply_capture(s, vars, cap, &hay, outs, &aliases);
            }
            true
        }
        Ok(None) => false,
        Err(e) => {
            tracing::debug!(error = %e, "malformed match pattern");
            false
        }
    };
    s.restore_scratch(hay);
    if matched { 1.0 } else { 0.0 }
}

fn apply_capture(
    s: &mut StringContext,
    vars: &mut dyn Variables,
    cap: &MatchCapture<'_>,
    hay: &[u8],
    outs: &mut [f64],
    aliases: &[f64],
) {
    let text = &hay[cap.span.clone()];
    match cap.target {
        Target::Positional(i) => {
            let Some(out) = outs.get_mut(i) else { return };
            if cap.kind.is_text() {
                store_text(s, *out, text, aliases);
            } else {
                *out = cap.value(hay);
            }
        }
        Target::Named(name) => {
            let name = String::from_utf8_lossy(name);
            if let Some(string_name) = name.strip_prefix('#') {
                let idx = s.add_named(string_name);
                store_text(s, idx, text, aliases);
            } else if cap.kind.is_text() {
                if let Some(idx) = vars.get(&name) {
                    store_text(s, idx, text, aliases);
                }
            } else {
                vars.set(&name, cap.value(hay));
            }
        }
    }
}

/// Write a text capture unless the destination is one of the strings the
/// match is reading.
fn store_text(s: &mut StringContext, dest: f64, text: &[u8], aliases: &[f64]) {
    if aliases.iter().any(|&a| s.same_object(dest, a)) {
        tracing::debug!(dest, "skipping capture into match input");
        return;
    }
    s.write(dest, text);
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::config::{RamConfig, StringConfig};
    use crate::host::NoVariables;
    use crate::ram::MemoryBudget;

    fn ctx() -> StringContext {
        StringContext::new(StringConfig::default())
    }

    fn text(s: &StringContext, idx: f64) -> String {
        String::from_utf8_lossy(s.get_for_read(idx).unwrap()).into_owned()
    }

    fn lit(s: &mut StringContext, v: &str) -> f64 {
        s.add_literal(v.as_bytes())
    }

    #[test]
    fn test_copy_and_concat() {
        let mut s = ctx();
        let hello = lit(&mut s, "hello");
        assert_eq!(strcpy(&mut s, 0.0, hello), 0.0);
        strcat(&mut s, 0.0, 0.0);
        assert_eq!(text(&s, 0.0), "hellohello");
        strncpy(&mut s, 1.0, hello, 3.0);
        assert_eq!(text(&s, 1.0), "hel");
        strncpy(&mut s, 1.0, hello, -1.0);
        assert_eq!(text(&s, 1.0), "hello");
        strncat(&mut s, 1.0, hello, 2.0);
        assert_eq!(text(&s, 1.0), "hellohe");
        assert_eq!(strlen(&s, 1.0), 7.0);
        assert_eq!(strlen(&s, -4.0), 0.0);
    }

    #[test]
    fn test_growth_stops_at_length_limit() {
        let config = StringConfig {
            max_string_len: 64,
            ..StringConfig::default()
        };
        let mut s = StringContext::new(config);
        s.write(0.0, b"ab");
        for _ in 0..20 {
            strcat(&mut s, 0.0, 0.0);
        }
        assert_eq!(strlen(&s, 0.0), 64.0);

        s.write(1.0, b"xy");
        for _ in 0..20 {
            str_insert(&mut s, 1.0, 1.0, 1.0);
        }
        assert_eq!(strlen(&s, 1.0), 64.0);
        assert_eq!(str_getchar(&s, 1.0, 0.0), b'x' as f64);

        strncat(&mut s, 1.0, 0.0, -1.0);
        assert_eq!(strlen(&s, 1.0), 64.0);

        // In-place writes at the limit still land; appending does not.
        str_setchar(&mut s, 0.0, 63.0, b'!' as f64);
        assert_eq!(str_getchar(&s, 0.0, 63.0), b'!' as f64);
        str_setchar(&mut s, 0.0, 64.0, b'?' as f64);
        assert_eq!(strlen(&s, 0.0), 64.0);
        let int = (b'i' as u32) as f64;
        str_setchar_typed(&mut s, 0.0, 62.0, 1.0, Some(int));
        assert_eq!(strlen(&s, 0.0), 64.0);
        assert_eq!(str_getchar(&s, 0.0, 62.0), b'a' as f64);
    }

    #[test]
    fn test_literal_destination_is_noop() {
        let mut s = ctx();
        let a = lit(&mut s, "a");
        let b = lit(&mut s, "b");
        strcpy(&mut s, a, b);
        assert_eq!(text(&s, a), "a");
    }

    #[test]
    fn test_substrings() {
        let mut s = ctx();
        let src = lit(&mut s, "abcdefgh");
        strcpy_from(&mut s, 0.0, src, 5.0);
        assert_eq!(text(&s, 0.0), "fgh");
        strcpy_from(&mut s, 0.0, src, -2.0);
        assert_eq!(text(&s, 0.0), "gh");
        strcpy_substr(&mut s, 0.0, src, 2.0, 3.0);
        assert_eq!(text(&s, 0.0), "cde");
        strcpy_substr(&mut s, 0.0, src, -3.0, 2.0);
        assert_eq!(text(&s, 0.0), "fg");
        strcpy_substr(&mut s, 0.0, src, 1.0, -2.0);
        assert_eq!(text(&s, 0.0), "bcdef");
        strcpy_substr(&mut s, 0.0, src, 7.0, -4.0);
        assert_eq!(text(&s, 0.0), "");
    }

    #[test]
    fn test_comparisons() {
        let mut s = ctx();
        let a = lit(&mut s, "Apple");
        let b = lit(&mut s, "apple");
        let c = lit(&mut s, "apricot");
        assert_eq!(strcmp(&s, a, b), -1.0);
        assert_eq!(stricmp(&s, a, b), 0.0);
        assert_eq!(strcmp(&s, c, b), 1.0);
        assert_eq!(strncmp(&s, b, c, 2.0), 0.0);
        assert_eq!(strncmp(&s, b, c, 3.0), -1.0);
        assert_eq!(strnicmp(&s, a, c, 2.0), 0.0);
    }

    #[test]
    fn test_char_access() {
        let mut s = ctx();
        s.write(0.0, b"abc");
        assert_eq!(str_getchar(&s, 0.0, 1.0), b'b' as f64);
        assert_eq!(str_getchar(&s, 0.0, -1.0), b'c' as f64);
        assert_eq!(str_getchar(&s, 0.0, 3.0), 0.0);
        str_setchar(&mut s, 0.0, 3.0, b'd' as f64);
        str_setchar(&mut s, 0.0, 0.0, b'A' as f64);
        assert_eq!(text(&s, 0.0), "Abcd");
        str_setchar(&mut s, 0.0, 9.0, b'x' as f64);
        assert_eq!(text(&s, 0.0), "Abcd");

        let big_short = (b'S' as u32) as f64;
        str_setchar_typed(&mut s, 1.0, 0.0, 258.0, Some(big_short));
        assert_eq!(s.get_for_read(1.0), Some(&[1u8, 2][..]));
        assert_eq!(str_getchar_typed(&s, 1.0, 0.0, Some(big_short)), 258.0);
        assert_eq!(str_getchar_typed(&s, 1.0, 0.0, Some(b'q' as f64)), 0.0);
    }

    #[test]
    fn test_insert_delete_setlen() {
        let mut s = ctx();
        s.write(0.0, b"hello");
        s.write(1.0, b"XY");
        str_insert(&mut s, 0.0, 1.0, 2.0);
        assert_eq!(text(&s, 0.0), "heXYllo");
        str_delsub(&mut s, 0.0, 1.0, 3.0);
        assert_eq!(text(&s, 0.0), "hllo");
        assert_eq!(str_setlen(&mut s, 0.0, 6.0), 6.0);
        assert_eq!(text(&s, 0.0), "hllo  ");
        assert_eq!(str_setlen(&mut s, 0.0, 1e9), 16384.0);
        assert_eq!(str_setlen(&mut s, 0.0, -1.0), 0.0);
        assert_eq!(text(&s, 0.0), "");
    }

    #[test]
    fn test_sprintf_and_malformed() {
        let mut s = ctx();
        let fmt = lit(&mut s, "%s=%d");
        let name = lit(&mut s, "x");
        assert_eq!(sprintf(&mut s, &NoVariables, 0.0, fmt, &[name, 41.6]), 4.0);
        assert_eq!(text(&s, 0.0), "x=42");

        let bad = lit(&mut s, "oops %q");
        assert_eq!(sprintf(&mut s, &NoVariables, 0.0, bad, &[1.0]), -1.0);
        assert_eq!(text(&s, 0.0), "x=42");
    }

    #[test]
    fn test_sprintf_self_reference() {
        let mut s = ctx();
        s.write(0.0, b"ab");
        let fmt = lit(&mut s, "<%s>");
        sprintf(&mut s, &NoVariables, 0.0, fmt, &[0.0]);
        assert_eq!(text(&s, 0.0), "<ab>");
    }

    #[test]
    fn test_printf_to_sink() {
        let mut s = ctx();
        let fmt = lit(&mut s, "%d apples\n");
        let mut sink: Vec<u8> = Vec::new();
        assert_eq!(printf(&mut s, &NoVariables, &mut sink, fmt, &[3.0]), 9.0);
        assert_eq!(sink, b"3 apples\n");
        let bad = lit(&mut s, "%");
        assert_eq!(printf(&mut s, &NoVariables, &mut sink, bad, &[]), -1.0);
        assert_eq!(sink.len(), 9);
    }

    #[test]
    fn test_match_positional_captures() {
        let mut s = ctx();
        let pat = lit(&mut s, "%s: %d/%x");
        let hay = lit(&mut s, "level: 12/ff");
        let mut outs = [5.0, 0.0, 0.0];
        let hit = r#match(&mut s, &mut NoVariables, pat, hay, &mut outs, MatchLimits::default());
        assert_eq!(hit, 1.0);
        assert_eq!(text(&s, 5.0), "level");
        assert_eq!(outs, [5.0, 12.0, 255.0]);
    }

    #[test]
    fn test_match_failure_leaves_outputs() {
        let mut s = ctx();
        let pat = lit(&mut s, "%d!");
        let hay = lit(&mut s, "12?");
        let mut outs = [7.0];
        assert_eq!(r#match(&mut s, &mut NoVariables, pat, hay, &mut outs, MatchLimits::default()), 0.0);
        assert_eq!(outs, [7.0]);
    }

    #[test]
    fn test_matchi_and_named_targets() {
        let mut s = ctx();
        let pat = lit(&mut s, "KEY=%{#val}s;%{n}d;%{dst}s");
        let hay = lit(&mut s, "key=abc;-3;rest");
        let mut vars: HashMap<String, f64> = HashMap::new();
        vars.insert("dst".into(), 9.0);
        let limits = MatchLimits::default();
        assert_eq!(r#match(&mut s, &mut vars, pat, hay, &mut [], limits), 0.0);
        assert_eq!(matchi(&mut s, &mut vars, pat, hay, &mut [], limits), 1.0);
        let val = s.lookup_named("val").unwrap();
        assert_eq!(text(&s, val), "abc");
        assert_eq!(vars["n"], -3.0);
        assert_eq!(text(&s, 9.0), "rest");
    }

    #[test]
    fn test_match_skips_aliased_capture() {
        let mut s = ctx();
        s.write(0.0, b"%s");
        s.write(1.0, b"payload");
        let mut outs = [1.0];
        let hit = r#match(&mut s, &mut NoVariables, 0.0, 1.0, &mut outs, MatchLimits::default());
        assert_eq!(hit, 1.0);
        assert_eq!(text(&s, 1.0), "payload");
        let mut outs = [0.0];
        r#match(&mut s, &mut NoVariables, 0.0, 1.0, &mut outs, MatchLimits::default());
        assert_eq!(text(&s, 0.0), "%s");
    }

    #[test]
    fn test_malformed_pattern_is_no_match() {
        let mut s = ctx();
        let pat = lit(&mut s, "%{oops");
        let hay = lit(&mut s, "anything");
        assert_eq!(r#match(&mut s, &mut NoVariables, pat, hay, &mut [], MatchLimits::default()), 0.0);
    }

    #[test]
    fn test_memory_natives() {
        let config = RamConfig {
            pages: 4,
            page_size: 4096,
            memory_limit_bytes: 0,
        };
        let ram = RamTable::new(&config, Arc::new(MemoryBudget::unlimited()));
        assert_eq!(mem_set_values(&ram, 10.0, &[1.0, 2.0, 3.0]), 3.0);
        assert_eq!(memcpy(&ram, 20.0, 10.0, 3.0), 20.0);
        let mut outs = [0.0; 3];
        assert_eq!(mem_get_values(&ram, 20.0, &mut outs), 3.0);
        assert_eq!(outs, [1.0, 2.0, 3.0]);
        assert_eq!(mem_multiply_sum(&ram, 10.0, 20.0, 3.0), 14.0);
        assert_eq!(mem_multiply_sum(&ram, 10.0, -1.0, 3.0), 6.0);
        assert_eq!(memset(&ram, 10.0, 0.5, 2.0), 10.0);
        assert_eq!(mem_insert_shuffle(&ram, 20.0, 3.0, 9.0), 3.0);
        mem_get_values(&ram, 20.0, &mut outs);
        assert_eq!(outs, [9.0, 1.0, 2.0]);
        assert_eq!(memtop(&ram), 4096.0);
        assert_eq!(free(&ram, 0.0), 0.0);
        assert!(ram.wants_free());
    }
}

//! String object storage.
//!
//! Scripts refer to strings by number. The number space is split into four
//! pools: fixed user slots, compiled literals, named strings, and unnamed
//! strings. Once handed out, an index refers to the same object until the
//! context is cleared.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::config::StringConfig;

/// A mutable byte string. May contain NUL bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EelString {
    bytes: Vec<u8>,
}

impl EelString {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Direct access to the buffer, for typed writes.
    pub fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.bytes
    }

    pub fn set(&mut self, bytes: &[u8]) {
        self.bytes.clear();
        self.bytes.extend_from_slice(bytes);
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Insert at `pos`, clamped to the current length.
    pub fn insert(&mut self, pos: usize, bytes: &[u8]) {
        let pos = pos.min(self.bytes.len());
        self.bytes.splice(pos..pos, bytes.iter().copied());
    }

    /// Remove up to `len` bytes starting at `pos`.
    pub fn delete(&mut self, pos: usize, len: usize) {
        let start = pos.min(self.bytes.len());
        let end = start.saturating_add(len).min(self.bytes.len());
        self.bytes.drain(start..end);
    }

    /// Truncate, or extend with spaces.
    pub fn set_len(&mut self, len: usize) {
        self.bytes.resize(len, b' ');
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    User(usize),
    Literal(usize),
    Named(usize),
    Unnamed(usize),
}

/// Which pool an index falls in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pool {
    User,
    Literal,
    Named,
    Unnamed,
}

/// All strings owned by one embedding context.
#[derive(Debug, Default)]
pub struct StringContext {
    config: StringConfig,
    user: Vec<Option<EelString>>,
    literals: Vec<EelString>,
    literal_index: HashMap<Vec<u8>, usize>,
    named: Vec<EelString>,
    named_index: HashMap<String, usize>,
    unnamed: Vec<EelString>,
    scratch: Vec<u8>,
}

impl StringContext {
    pub fn new(config: StringConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &StringConfig {
        &self.config
    }

    /// Soft cap applied by the formatter and `str_setlen`.
    pub fn max_len(&self) -> usize {
        self.config.max_string_len
    }

    fn slot(&self, idx: f64) -> Option<Slot> {
        if !(idx > -0.5) || idx >= (usize::MAX / 2) as f64 {
            return None;
        }
        let i = (idx + 0.5) as usize;
        let c = &self.config;
        if i < c.max_user_strings {
            Some(Slot::User(i))
        } else if i < c.literal_base {
            None
        } else if i < c.named_base {
            Some(Slot::Literal(i - c.literal_base))
        } else if i < c.unnamed_base {
            Some(Slot::Named(i - c.named_base))
        } else {
            Some(Slot::Unnamed(i - c.unnamed_base))
        }
    }

    /// Pool of a resolvable index, whether or not it has been created yet.
    pub fn pool_of(&self, idx: f64) -> Option<Pool> {
        self.slot(idx).map(|s| match s {
            Slot::User(_) => Pool::User,
            Slot::Literal(_) => Pool::Literal,
            Slot::Named(_) => Pool::Named,
            Slot::Unnamed(_) => Pool::Unnamed,
        })
    }

    /// Whether two indices name the same string slot.
    pub fn same_object(&self, a: f64, b: f64) -> bool {
        matches!((self.slot(a), self.slot(b)), (Some(x), Some(y)) if x == y)
    }

    /// Read-only view of any existing string. Unwritten user slots read as
    /// empty.
    pub fn get_for_read(&self, idx: f64) -> Option<&[u8]> {
        match self.slot(idx)? {
            Slot::User(i) => Some(
                self.user
                    .get(i)
                    .and_then(Option::as_ref)
                    .map_or(&[][..], EelString::as_bytes),
            ),
            Slot::Literal(i) => self.literals.get(i).map(EelString::as_bytes),
            Slot::Named(i) => self.named.get(i).map(EelString::as_bytes),
            Slot::Unnamed(i) => self.unnamed.get(i).map(EelString::as_bytes),
        }
    }

    /// Mutable handle. User slots are created on demand; literals refuse
    /// unless mutable literals are enabled.
    pub fn get_for_write(&mut self, idx: f64) -> Option<&mut EelString> {
        match self.slot(idx)? {
            Slot::User(i) => {
                if self.user.len() <= i {
                    self.user.resize_with(i + 1, || None);
                }
                Some(self.user[i].get_or_insert_with(EelString::default))
            }
            Slot::Literal(i) if self.config.mutable_literals => self.literals.get_mut(i),
            Slot::Literal(_) => None,
            Slot::Named(i) => self.named.get_mut(i),
            Slot::Unnamed(i) => self.unnamed.get_mut(i),
        }
    }

    /// Register a compiled string constant. Identical content shares one
    /// index unless literals are mutable. Returns -1 when the pool is full.
    pub fn add_literal(&mut self, bytes: &[u8]) -> f64 {
        if !self.config.mutable_literals
            && let Some(&i) = self.literal_index.get(bytes)
        {
            return (self.config.literal_base + i) as f64;
        }
        let i = self.literals.len();
        if self.config.literal_base + i >= self.config.named_base {
            tracing::debug!(count = i, "string literal pool full");
            return -1.0;
        }
        self.literals.push(EelString::from_bytes(bytes));
        if !self.config.mutable_literals {
            self.literal_index.insert(bytes.to_vec(), i);
        }
        (self.config.literal_base + i) as f64
    }

    /// Index of the string called `name`, creating it empty if needed.
    /// Returns -1 when the pool is full.
    pub fn add_named(&mut self, name: &str) -> f64 {
        if let Some(&i) = self.named_index.get(name) {
            return (self.config.named_base + i) as f64;
        }
        let i = self.named.len();
        if self.config.named_base + i >= self.config.unnamed_base {
            tracing::debug!(name, "named string pool full");
            return -1.0;
        }
        self.named.push(EelString::default());
        self.named_index.insert(name.to_string(), i);
        (self.config.named_base + i) as f64
    }

    pub fn lookup_named(&self, name: &str) -> Option<f64> {
        self.named_index
            .get(name)
            .map(|&i| (self.config.named_base + i) as f64)
    }

    /// Allocate a fresh anonymous string.
    pub fn add_unnamed(&mut self) -> f64 {
        let i = self.unnamed.len();
        self.unnamed.push(EelString::default());
        (self.config.unnamed_base + i) as f64
    }

    /// Replace the contents of a writable string. Returns false if `idx`
    /// does not resolve for writing.
    pub fn write(&mut self, idx: f64, bytes: &[u8]) -> bool {
        match self.get_for_write(idx) {
            Some(s) => {
                s.set(bytes);
                true
            }
            None => false,
        }
    }

    /// Copy of string `idx` held in a reusable buffer, so a string can be
    /// read while another (or the same) one is written. Hand the buffer back
    /// with [`restore_scratch`](Self::restore_scratch).
    pub fn take_copy(&mut self, idx: f64) -> Option<Vec<u8>> {
        let mut buf = std::mem::take(&mut self.scratch);
        buf.clear();
        match self.get_for_read(idx) {
            Some(bytes) => {
                buf.extend_from_slice(bytes);
                Some(buf)
            }
            None => {
                self.scratch = buf;
                None
            }
        }
    }

    pub fn restore_scratch(&mut self, buf: Vec<u8>) {
        if buf.capacity() > self.scratch.capacity() {
            self.scratch = buf;
        }
    }

    /// Tear down every pool. Indices handed out before are invalid after.
    pub fn clear(&mut self) {
        self.user.clear();
        self.literals.clear();
        self.literal_index.clear();
        self.named.clear();
        self.named_index.clear();
        self.unnamed.clear();
    }

    pub fn counts(&self) -> StringCounts {
        StringCounts {
            user: self.user.iter().filter(|s| s.is_some()).count(),
            literals: self.literals.len(),
            named: self.named.len(),
            unnamed: self.unnamed.len(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StringCounts {
    pub user: usize,
    pub literals: usize,
    pub named: usize,
    pub unnamed: usize,
}

/// A string context behind the single context-wide lock the host supplies.
#[derive(Debug, Default)]
pub struct SharedStrings(Mutex<StringContext>);

impl SharedStrings {
    pub fn new(ctx: StringContext) -> Self {
        Self(Mutex::new(ctx))
    }

    /// Lock the context. A poisoned lock is recovered: the pools hold no
    /// invariant a panicking writer could break.
    pub fn lock(&self) -> MutexGuard<'_, StringContext> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn into_inner(self) -> StringContext {
        self.0.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

//! Fixed-width binary access inside string buffers.
//!
//! Scripts name a type with a packed character constant such as `'i'`,
//! `'Iu'` or `'d'`. The first letter picks the encoding; lowercase is
//! little-endian, uppercase big-endian, regardless of host byte order.
//! A trailing `u` selects the unsigned variant of integer types.

/// Encoding of one typed value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Width {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteType {
    pub width: Width,
    pub unsigned: bool,
    pub big_endian: bool,
}

impl ByteType {
    /// Unsigned little-endian byte: the type of the untyped accessors.
    pub const BYTE: ByteType = ByteType {
        width: Width::I8,
        unsigned: true,
        big_endian: false,
    };

    /// Decode a packed type code (`'c'`, `'cu'`, `'S'`, `'iu'`, `'F'`, ...).
    pub fn from_code(code: f64) -> Option<Self> {
        if !(code >= 1.0 && code < 4294967296.0) {
            return None;
        }
        let bytes = (code as u32).to_be_bytes();
        let mut chars = bytes.iter().copied().skip_while(|&b| b == 0);
        let first = chars.next()?;
        let unsigned = match chars.next() {
            None => false,
            Some(b'u' | b'U') => true,
            Some(_) => return None,
        };
        if chars.next().is_some() {
            return None;
        }

        let width = match first.to_ascii_lowercase() {
            b'c' => Width::I8,
            b's' => Width::I16,
            b'i' => Width::I32,
            b'l' => Width::I64,
            b'f' => Width::F32,
            b'd' => Width::F64,
            _ => return None,
        };
        if unsigned && matches!(width, Width::F32 | Width::F64) {
            return None;
        }
        Some(Self {
            width,
            unsigned,
            big_endian: first.is_ascii_uppercase(),
        })
    }

    pub fn size(self) -> usize {
        match self.width {
            Width::I8 => 1,
            Width::I16 => 2,
            Width::I32 | Width::F32 => 4,
            Width::I64 | Width::F64 => 8,
        }
    }

    fn decode(self, raw: &[u8]) -> f64 {
        macro_rules! get {
            ($t:ty) => {{
                let arr: [u8; std::mem::size_of::<$t>()] = raw.try_into().unwrap_or_default();
                if self.big_endian {
                    <$t>::from_be_bytes(arr)
                } else {
                    <$t>::from_le_bytes(arr)
                }
            }};
        }
        match (self.width, self.unsigned) {
            (Width::I8, false) => raw[0] as i8 as f64,
            (Width::I8, true) => raw[0] as f64,
            (Width::I16, false) => get!(i16) as f64,
            (Width::I16, true) => get!(u16) as f64,
            (Width::I32, false) => get!(i32) as f64,
            (Width::I32, true) => get!(u32) as f64,
            (Width::I64, false) => get!(i64) as f64,
            (Width::I64, true) => get!(u64) as f64,
            (Width::F32, _) => get!(f32) as f64,
            (Width::F64, _) => get!(f64),
        }
    }

    fn encode(self, value: f64, out: &mut [u8]) {
        macro_rules! put {
            ($v:expr) => {{
                let v = $v;
                let bytes = if self.big_endian {
                    v.to_be_bytes()
                } else {
                    v.to_le_bytes()
                };
                out.copy_from_slice(&bytes);
            }};
        }
        // Integers wrap like a C cast through the widest type.
        let int = value as i64;
        match self.width {
            Width::I8 => out[0] = int as u8,
            Width::I16 => put!(int as u16),
            Width::I32 => put!(int as u32),
            Width::I64 if self.unsigned => put!(value as u64),
            Width::I64 => put!(int),
            Width::F32 => put!(value as f32),
            Width::F64 => put!(value),
        }
    }
}

/// Resolve a script offset, counting negative offsets from the end.
fn resolve_offset(len: usize, offset: f64) -> Option<usize> {
    let o = offset as i64;
    let o = if o < 0 { o + len as i64 } else { o };
    if o < 0 { None } else { Some(o as usize) }
}

/// Length a buffer of `len` bytes would have after a typed write at
/// `offset`, or `None` if the write is out of range.
pub fn write_end(len: usize, offset: f64, ty: ByteType) -> Option<usize> {
    let start = resolve_offset(len, offset).filter(|&start| start <= len)?;
    Some((start + ty.size()).max(len))
}

/// Read a typed value at `offset`. Out-of-range reads return 0.
pub fn read_typed(bytes: &[u8], offset: f64, ty: ByteType) -> f64 {
    let Some(start) = resolve_offset(bytes.len(), offset) else {
        return 0.0;
    };
    match bytes.get(start..start.saturating_add(ty.size())) {
        Some(raw) => ty.decode(raw),
        None => 0.0,
    }
}

/// Write a typed value at `offset`, growing `buf` if the value extends past
/// its end. The offset itself must lie within `[0, len]`. Returns whether
/// anything was written.
pub fn write_typed(buf: &mut Vec<u8>, offset: f64, ty: ByteType, value: f64) -> bool {
    let Some(start) = resolve_offset(buf.len(), offset).filter(|&start| start <= buf.len()) else {
        return false;
    };
    let end = start + ty.size();
    if end > buf.len() {
        buf.resize(end, 0);
    }
    ty.encode(value, &mut buf[start..end]);
    true
}

/// Default number of pages in a script memory table.
pub const RAM_PAGES: usize = 512;

/// Default number of cells per page. Must be a power of two.
pub const RAM_PAGE_SIZE: usize = 65536;

/// Smallest page size a config may request.
pub const RAM_MIN_PAGE_SIZE: usize = 4096;

/// Added to script-supplied addresses before truncation to absorb rounding.
pub const ADDR_EPSILON: f64 = 0.00001;

/// Fixed user string slots occupy `[0, MAX_USER_STRINGS)`.
pub const MAX_USER_STRINGS: usize = 1024;

/// First index of the literal pool.
pub const STRING_LITERAL_BASE: usize = 10000;

/// First index of the named string pool.
pub const STRING_NAMED_BASE: usize = 90000;

/// First index of the unnamed string pool.
pub const STRING_UNNAMED_BASE: usize = 190000;

/// Soft cap on string growth through the formatter and `str_setlen`.
pub const MAX_STRING_LEN: usize = 16384;

/// Default recursion step budget for one `match` call.
pub const MATCH_MAX_STEPS: u64 = 1_000_000;

/// Default nesting bound for one `match` call.
pub const MATCH_MAX_DEPTH: usize = 1024;

/// Smallest block length accepted by `mdct`/`imdct`.
pub const MDCT_MIN_LEN: usize = 64;

/// Largest block length accepted by `mdct`/`imdct`.
pub const MDCT_MAX_LEN: usize = 4096;

/// Block lengths at or below this use the direct cosine sum.
pub const DIRECT_MAX_LEN: usize = 64;

/// Easily performs a `return Err(format!("..."))` for maximum laziness
macro_rules! error {
    ($($args:tt)*) => {{
        return Err(format!($($args)*).into());
    }}
}
pub(crate) use error;

/// Helper functions for bit operations
pub mod bits {
    /// Mask covering the low `n` bits of a u16
    pub const fn mask(n: u32) -> u16 {
        if n >= u16::BITS { u16::MAX } else { (1 << n) - 1 }
    }

    /// Splits a u16 into (high, low) at bit index `n`
    pub fn split_at(x: u16, n: u32) -> (u16, u16) {
        let low = x & mask(n);
        let high = if n >= u16::BITS { 0 } else { x >> n };
        (high, low)
    }

    /// Inverse of `split_at`. Bits of `low` above `n` are dropped.
    pub fn join_at(high: u16, low: u16, n: u32) -> u16 {
        if n >= u16::BITS {
            return low;
        }
        (high << n) | (low & mask(n))
    }

    /// Parses a number that is either decimal or `0x`-prefixed hex
    pub fn parse_num(s: &str) -> Option<u16> {
        let s = s.trim();
        match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u16::from_str_radix(hex, 16).ok(),
            None => s.parse::<u16>().ok(),
        }
    }

}

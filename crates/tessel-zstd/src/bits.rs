//! Bit-width primitives.

/// Index of the highest set bit of a nonzero value.
#[inline(always)]
pub fn highbit32(value: u32) -> u32 {
    debug_assert!(value != 0, "highbit32 of zero");
    31 - value.leading_zeros()
}

/// Number of trailing zero bits of a nonzero value.
#[inline(always)]
pub fn count_trailing_zeros(value: usize) -> u32 {
    debug_assert!(value != 0, "count_trailing_zeros of zero");
    value.trailing_zeros()
}

/// Length of the common prefix of `data[a..]` and `data[b..]`, stopping at `limit`.
///
/// Compares eight bytes at a time and locates the first differing byte from
/// the trailing zeros of the XOR.
#[inline]
pub fn count_match(data: &[u8], a: usize, b: usize, limit: usize) -> usize {
    debug_assert!(a < b && b <= limit && limit <= data.len());
    let max = limit - b;
    let mut len = 0;

    while len + 8 <= max {
        let x = read_u64(data, a + len);
        let y = read_u64(data, b + len);
        let diff = x ^ y;
        if diff != 0 {
            return len + (diff.trailing_zeros() / 8) as usize;
        }
        len += 8;
    }
    while len < max && data[a + len] == data[b + len] {
        len += 1;
    }
    len
}

#[inline(always)]
pub(crate) fn read_u64(data: &[u8], pos: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[pos..pos + 8]);
    u64::from_le_bytes(bytes)
}

#[inline(always)]
pub(crate) fn read_u32(data: &[u8], pos: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[pos..pos + 4]);
    u32::from_le_bytes(bytes)
}

//! Copy primitives shared by the literal emitter and sequence replay.
//!
//! The wild copies move data in fixed 8 or 16 byte strides and may write
//! past the requested length by up to [`WILDCOPY_OVERLENGTH`] bytes. Callers
//! either guarantee that much headroom in the destination slice or take the
//! exact path in [`copy_match`].
//!
//! Everything here is safe slice code: a caller that under-allocates gets a
//! bounds-check panic, never an out-of-bounds write.

/// Width of one wild-copy vector.
pub const WILDCOPY_VECLEN: usize = 16;

/// Maximum number of bytes a wild copy may write past the requested length.
pub const WILDCOPY_OVERLENGTH: usize = 32;

/// Relationship between source and destination of a wild copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
    /// Source and destination are at least [`WILDCOPY_VECLEN`] bytes apart.
    NoOverlap,
    /// Source strictly precedes destination by at least 8 bytes.
    SrcBeforeDst,
}

/// Copy exactly 8 bytes.
#[inline(always)]
pub fn copy8(dst: &mut [u8], src: &[u8]) {
    dst[..8].copy_from_slice(&src[..8]);
}

/// Copy exactly 16 bytes.
#[inline(always)]
pub fn copy16(dst: &mut [u8], src: &[u8]) {
    dst[..16].copy_from_slice(&src[..16]);
}

/// Wild copy between two distinct buffers.
///
/// Both slices must extend at least `length + WILDCOPY_OVERLENGTH` bytes, or
/// to the next 16-byte boundary past `length` when that is shorter.
#[inline]
pub fn wildcopy(dst: &mut [u8], src: &[u8], length: usize) {
    copy16(dst, src);
    if length <= WILDCOPY_VECLEN {
        return;
    }
    let mut op = WILDCOPY_VECLEN;
    while op < length {
        copy16(&mut dst[op..], &src[op..]);
        copy16(&mut dst[op + WILDCOPY_VECLEN..], &src[op + WILDCOPY_VECLEN..]);
        op += 2 * WILDCOPY_VECLEN;
    }
}

/// Wild copy inside one buffer, from `src` forward to `dst`.
///
/// The result for the first `length` bytes equals a sequential byte-by-byte
/// copy, so self-referential matches replicate their pattern.
#[inline]
pub fn wildcopy_within(buf: &mut [u8], src: usize, dst: usize, length: usize, overlap: Overlap) {
    debug_assert!(src < dst, "wild copy source must precede destination");
    let end = dst + length;
    let (mut ip, mut op) = (src, dst);

    match overlap {
        Overlap::SrcBeforeDst => {
            debug_assert!(dst - src >= 8, "overlapping wild copy needs distance >= 8");
            loop {
                buf.copy_within(ip..ip + 8, op);
                op += 8;
                ip += 8;
                if op >= end {
                    break;
                }
            }
        }
        Overlap::NoOverlap => {
            debug_assert!(
                dst - src >= WILDCOPY_VECLEN,
                "non-overlapping wild copy needs distance >= 16"
            );
            buf.copy_within(ip..ip + WILDCOPY_VECLEN, op);
            if length <= WILDCOPY_VECLEN {
                return;
            }
            op += WILDCOPY_VECLEN;
            ip += WILDCOPY_VECLEN;
            while op < end {
                buf.copy_within(ip..ip + WILDCOPY_VECLEN, op);
                buf.copy_within(ip + WILDCOPY_VECLEN..ip + 2 * WILDCOPY_VECLEN, op + WILDCOPY_VECLEN);
                op += 2 * WILDCOPY_VECLEN;
                ip += 2 * WILDCOPY_VECLEN;
            }
        }
    }
}

/// Copy as much of `src` as fits into `dst`, returning the count copied.
#[inline]
pub fn limit_copy(dst: &mut [u8], src: &[u8]) -> usize {
    let length = dst.len().min(src.len());
    dst[..length].copy_from_slice(&src[..length]);
    length
}

/// Replay a back-reference of `length` bytes at `offset` behind `pos`.
///
/// Takes the wild path when `buf` has [`WILDCOPY_OVERLENGTH`] bytes of slack
/// after the match, the exact path otherwise. The caller has checked
/// `0 < offset <= pos` and `pos + length <= buf.len()`.
pub fn copy_match(buf: &mut [u8], pos: usize, offset: usize, length: usize) {
    debug_assert!(offset > 0 && offset <= pos);
    debug_assert!(pos + length <= buf.len());

    let src = pos - offset;
    if offset == 1 {
        let byte = buf[src];
        buf[pos..pos + length].fill(byte);
        return;
    }

    if pos + length + WILDCOPY_OVERLENGTH > buf.len() {
        if offset >= length {
            buf.copy_within(src..src + length, pos);
        } else {
            for i in 0..length {
                buf[pos + i] = buf[src + i];
            }
        }
        return;
    }

    if offset >= WILDCOPY_VECLEN {
        wildcopy_within(buf, src, pos, length, Overlap::NoOverlap);
    } else if offset >= 8 {
        wildcopy_within(buf, src, pos, length, Overlap::SrcBeforeDst);
    } else {
        // Widen the distance to a multiple of the period that is >= 8, then
        // stride from there. The prefix bytes are laid down one at a time.
        let period = offset * 8usize.div_ceil(offset);
        let head = period.min(length);
        for i in 0..head {
            buf[pos + i] = buf[src + i];
        }
        if length > head {
            let op = pos + head;
            wildcopy_within(buf, op - period, op, length - head, Overlap::SrcBeforeDst);
        }
    }
}

//! Tiered memset: byte tail, SSE, AVX and non-temporal AVX
//!
//! Every loop here walks backward from the end of the remaining span and
//! returns how many leading bytes it left for the next, narrower loop:
//!
//! ```text
//! stream (aligned vmovntdq x4) -> sfence -+
//! wide   (vmovdqu x2) -------------------+-> vzeroupper -> sse (movdqu) -> bytes
//! ```
//!
//! Stores are anchored to the tail of the remaining span, so a store that
//! lands on bytes already written just rewrites the same value.
#![allow(unsafe_code)]

#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::*;

use crate::cpu::Capability;
use crate::tier::{Tier, VECTOR_MIN};
#[cfg(target_arch = "x86_64")]
use crate::tier::{STREAM_ALIGN, STREAM_BLOCK, WIDE_MIN};

/// Fill `n` bytes at `dest` with `value`, picking the tier from `n` and `cap`.
///
/// # Safety
///
/// - `dest` must be valid for writes of `n` bytes
/// - nothing else may access those bytes for the duration of the call
/// - if `cap.avx()` is true the CPU must support AVX (guaranteed when `cap`
///   came from [`Capability::detect`] or [`Capability::baseline`])
#[inline]
pub unsafe fn memset_unified(dest: *mut u8, value: u8, n: usize, cap: Capability) {
    match Tier::select(n, cap) {
        Tier::Scalar => memset_scalar_tail(dest, value, n),
        Tier::Vector => memset_narrow(dest, value, broadcast16(value), n),
        #[cfg(target_arch = "x86_64")]
        Tier::Wide => memset_avx(dest, value, n),
        #[cfg(target_arch = "x86_64")]
        Tier::Stream => memset_avx_nt(dest, value, n),
        #[cfg(not(target_arch = "x86_64"))]
        Tier::Wide | Tier::Stream => memset_narrow(dest, value, broadcast16(value), n),
    }
}

// =============================================================================
// SCALAR TAIL
// =============================================================================

/// Byte-at-a-time fill, last byte first.
#[inline(always)]
unsafe fn memset_scalar_tail(dest: *mut u8, value: u8, mut n: usize) {
    while n != 0 {
        *dest.add(n - 1) = value;
        n -= 1;
    }
}

// =============================================================================
// 16-BYTE PATH (SSE2 on x86_64, plain u128 stores elsewhere)
// =============================================================================

#[cfg(target_arch = "x86_64")]
type Pattern16 = __m128i;

#[cfg(not(target_arch = "x86_64"))]
type Pattern16 = u128;

#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn broadcast16(value: u8) -> Pattern16 {
    unsafe { _mm_set1_epi8(value as i8) }
}

#[cfg(not(target_arch = "x86_64"))]
#[inline(always)]
fn broadcast16(value: u8) -> Pattern16 {
    u128::from_ne_bytes([value; 16])
}

#[cfg(target_arch = "x86_64")]
#[inline(always)]
unsafe fn store16(dst: *mut u8, v: Pattern16) {
    _mm_storeu_si128(dst as *mut __m128i, v);
}

#[cfg(not(target_arch = "x86_64"))]
#[inline(always)]
unsafe fn store16(dst: *mut u8, v: Pattern16) {
    (dst as *mut u128).write_unaligned(v);
}

/// 16 bytes per iteration until fewer than 16 remain. Returns the remainder.
#[inline(always)]
unsafe fn memset_sse_loop(dest: *mut u8, v: Pattern16, mut n: usize) -> usize {
    while n >= VECTOR_MIN {
        store16(dest.add(n - VECTOR_MIN), v);
        n -= VECTOR_MIN;
    }
    n
}

/// SSE loop followed by the byte tail.
#[inline(always)]
unsafe fn memset_narrow(dest: *mut u8, value: u8, v: Pattern16, n: usize) {
    let rest = memset_sse_loop(dest, v, n);
    memset_scalar_tail(dest, value, rest);
}

// =============================================================================
// WIDE PATH: cached AVX stores (64B - 16MB)
// =============================================================================

/// Two unaligned 32-byte stores per iteration. Returns the remainder (< 64).
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx")]
#[inline]
unsafe fn memset_avx_loop(dest: *mut u8, v: __m256i, mut n: usize) -> usize {
    while n >= WIDE_MIN {
        _mm256_storeu_si256(dest.add(n - 32) as *mut __m256i, v);
        _mm256_storeu_si256(dest.add(n - 64) as *mut __m256i, v);
        n -= WIDE_MIN;
    }
    n
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx")]
unsafe fn memset_avx(dest: *mut u8, value: u8, n: usize) {
    let wide = _mm256_set1_epi8(value as i8);
    let rest = memset_avx_loop(dest, wide, n);
    let narrow = _mm256_castsi256_si128(wide);
    _mm256_zeroupper();
    memset_narrow(dest, value, narrow, rest);
}

// =============================================================================
// STREAM PATH: non-temporal AVX stores (>= 16MB)
// =============================================================================

/// Round the end of `[base, base + n)` down to a 32-byte boundary and return
/// it as a length from `base`.
///
/// Requires `n >= STREAM_ALIGN`, which keeps the result positive.
#[cfg(target_arch = "x86_64")]
#[inline(always)]
const fn align_cursor(base: usize, n: usize) -> usize {
    ((base + n) & !(STREAM_ALIGN - 1)) - base
}

/// Cover the unaligned tail with a cached store, then return the aligned
/// cursor for [`memset_nt_loop`].
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx")]
#[inline]
unsafe fn memset_nt_preamble(dest: *mut u8, v: __m256i, n: usize) -> usize {
    debug_assert!(n >= STREAM_ALIGN);
    _mm256_storeu_si256(dest.add(n - 32) as *mut __m256i, v);
    align_cursor(dest as usize, n)
}

/// Four aligned non-temporal stores per iteration. Returns the remainder
/// (< 128). The caller owns the fence.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx")]
#[inline]
unsafe fn memset_nt_loop(dest: *mut u8, v: __m256i, mut n: usize) -> usize {
    debug_assert_eq!((dest as usize + n) % STREAM_ALIGN, 0);
    while n >= STREAM_BLOCK {
        let end = dest.add(n);
        _mm256_stream_si256(end.sub(32) as *mut __m256i, v);
        _mm256_stream_si256(end.sub(64) as *mut __m256i, v);
        _mm256_stream_si256(end.sub(96) as *mut __m256i, v);
        _mm256_stream_si256(end.sub(128) as *mut __m256i, v);
        n -= STREAM_BLOCK;
    }
    n
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx")]
unsafe fn memset_avx_nt(dest: *mut u8, value: u8, n: usize) {
    let wide = _mm256_set1_epi8(value as i8);
    let cursor = memset_nt_preamble(dest, wide, n);
    let rest = memset_nt_loop(dest, wide, cursor);

    // Streaming stores are weakly ordered; publish them before returning.
    _mm_sfence();

    let narrow = _mm256_castsi256_si128(wide);
    _mm256_zeroupper();
    memset_narrow(dest, value, narrow, rest);
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUARD: u8 = 0xEE;

    /// Buffer with `pad` guard bytes on both sides of a `len`-byte window at
    /// offset `pad + off`.
    fn guarded(len: usize, off: usize) -> (Vec<u8>, usize) {
        let pad = 64;
        (vec![GUARD; pad + off + len + pad], pad + off)
    }

    fn check(buf: &[u8], start: usize, len: usize, value: u8) {
        assert!(buf[..start].iter().all(|&b| b == GUARD), "underrun len {len}");
        for (i, &b) in buf[start..start + len].iter().enumerate() {
            assert_eq!(b, value, "len {len} index {i}");
        }
        assert!(buf[start + len..].iter().all(|&b| b == GUARD), "overrun len {len}");
    }

    #[test]
    fn test_scalar_tail() {
        for len in 0..40 {
            let (mut buf, start) = guarded(len, 3);
            unsafe { memset_scalar_tail(buf.as_mut_ptr().add(start), 0x11, len) };
            check(&buf, start, len, 0x11);
        }
    }

    #[test]
    fn test_sse_loop_leaves_head_remainder() {
        for len in 0..100 {
            let (mut buf, start) = guarded(len, 5);
            let rest = unsafe {
                memset_sse_loop(buf.as_mut_ptr().add(start), broadcast16(0x22), len)
            };
            assert_eq!(rest, len % 16, "len {len}");
            assert!(buf[start..start + rest].iter().all(|&b| b == GUARD));
            check(&buf, start + rest, len - rest, 0x22);
        }
    }

    #[test]
    fn test_narrow_0_to_256() {
        for len in 0..=256 {
            for off in [0, 1, 7, 15] {
                let (mut buf, start) = guarded(len, off);
                unsafe { memset_narrow(buf.as_mut_ptr().add(start), 0x33, broadcast16(0x33), len) };
                check(&buf, start, len, 0x33);
            }
        }
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_align_cursor() {
        assert_eq!(align_cursor(0x1000, 100), 96);
        assert_eq!(align_cursor(0x1000, 128), 128);
        assert_eq!(align_cursor(0x1001, 128), 127);
        assert_eq!(align_cursor(0x101F, 32), 1);
        for base in 0x2000..0x2040usize {
            for n in [32usize, 33, 63, 64, 200, 4096] {
                let c = align_cursor(base, n);
                assert_eq!((base + c) % STREAM_ALIGN, 0);
                assert!(c <= n && n - c < STREAM_ALIGN, "base {base:#x} n {n}");
            }
        }
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_avx_loop_and_tier() {
        if !Capability::detect().avx() {
            return;
        }
        for len in 0..=600 {
            for off in [0, 1, 31] {
                let (mut buf, start) = guarded(len, off);
                let rest = unsafe {
                    memset_avx_loop(buf.as_mut_ptr().add(start), _mm256_set1_epi8(0x44), len)
                };
                assert_eq!(rest, len % 64);
                check(&buf, start + rest, len - rest, 0x44);

                let (mut buf, start) = guarded(len, off);
                unsafe { memset_avx(buf.as_mut_ptr().add(start), 0x45, len) };
                check(&buf, start, len, 0x45);
            }
        }
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_nt_preamble_covers_unaligned_tail() {
        if !Capability::detect().avx() {
            return;
        }
        for off in 0..32 {
            let len = 1000;
            let (mut buf, start) = guarded(len, off);
            let dest = unsafe { buf.as_mut_ptr().add(start) };
            let cursor = unsafe { memset_nt_preamble(dest, _mm256_set1_epi8(0x55), len) };
            assert_eq!((dest as usize + cursor) % STREAM_ALIGN, 0);
            assert!(len - cursor < STREAM_ALIGN);
            check(&buf, start + len - 32, 32, 0x55);
        }
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_avx_nt_small_regions() {
        // The streaming tier only needs 32 bytes to be valid; exercise it
        // directly without allocating 16 MiB.
        if !Capability::detect().avx() {
            return;
        }
        for len in 32..=700 {
            for off in 0..32 {
                let (mut buf, start) = guarded(len, off);
                unsafe { memset_avx_nt(buf.as_mut_ptr().add(start), 0x66, len) };
                check(&buf, start, len, 0x66);
            }
        }
    }

    #[test]
    fn test_unified_baseline_matches_detected() {
        for len in [0, 1, 15, 16, 17, 63, 64, 65, 127, 128, 129, 4096, 4097] {
            let (mut a, start) = guarded(len, 9);
            let mut b = a.clone();
            unsafe {
                memset_unified(a.as_mut_ptr().add(start), 0x77, len, Capability::baseline());
                memset_unified(b.as_mut_ptr().add(start), 0x77, len, Capability::detect());
            }
            check(&a, start, len, 0x77);
            assert_eq!(a, b, "len {len}");
        }
    }
}

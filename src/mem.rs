//! Safe slice entry points.
//!
//! `&mut [u8]` carries the whole kernel contract: the span is valid,
//! writable and not aliased for the duration of the call.

use crate::cpu::Capability;
use crate::tier::Tier;

/// Set every byte of `dest` to `value`.
///
/// Uses the process-wide [`Capability::detect`] result. Regions of 16 MiB
/// and above are written with non-temporal stores and fenced before return.
///
/// # Examples
/// ```
/// use memfill::fill;
/// let mut buf = [0u8; 5];
/// fill(&mut buf, b'x');
/// assert_eq!(&buf, b"xxxxx");
///
/// let mut empty: [u8; 0] = [];
/// fill(&mut empty, 0xFF);
/// ```
#[inline]
pub fn fill(dest: &mut [u8], value: u8) {
    fill_with(dest, value, Capability::detect());
}

/// Like [`fill`], with an explicit capability.
///
/// Passing [`Capability::baseline`] restricts the fill to 16-byte and byte
/// stores; the result is identical.
///
/// # Examples
/// ```
/// use memfill::{fill_with, Capability};
/// let mut buf = vec![0u8; 100];
/// fill_with(&mut buf, 0x7A, Capability::baseline());
/// assert!(buf.iter().all(|&b| b == 0x7A));
/// ```
#[inline]
pub fn fill_with(dest: &mut [u8], value: u8, cap: Capability) {
    unsafe { crate::memset::memset_unified(dest.as_mut_ptr(), value, dest.len(), cap) }
}

/// The tier [`fill`] starts in for a `len`-byte region on this machine.
pub fn tier_for_len(len: usize) -> Tier {
    Tier::select(len, Capability::detect())
}

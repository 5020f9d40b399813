//! Size/capability tier selection for the fill kernels.

use crate::cpu::Capability;

// =============================================================================
// DISPATCH THRESHOLDS
// =============================================================================

/// Smallest length handled with 16-byte stores.
pub const VECTOR_MIN: usize = 16;

/// Smallest length worth broadcasting into a 32-byte register.
pub const WIDE_MIN: usize = 64;

/// Lengths from here on are written with non-temporal stores (16 MiB).
pub const STREAM_MIN: usize = 0x100_0000;

/// Alignment required by `vmovntdq`.
pub const STREAM_ALIGN: usize = 32;

/// Bytes written per streaming iteration (four 32-byte lanes).
pub const STREAM_BLOCK: usize = 128;

/// The entry loop a fill starts in.
///
/// Every tier hands its remainder down to the narrower ones, so `Stream`
/// also ends in `Vector` and `Scalar` when the length is not a multiple of
/// its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// Byte stores only (`len < 16`).
    Scalar,
    /// 16-byte stores, then bytes.
    Vector,
    /// Two 32-byte cached stores per iteration (`64 <= len < 16 MiB`, AVX).
    Wide,
    /// Aligned non-temporal stores followed by a fence (`len >= 16 MiB`, AVX).
    Stream,
}

impl Tier {
    /// Pick the entry tier for `len` bytes.
    ///
    /// # Examples
    /// ```
    /// use memfill::{Capability, Tier};
    /// assert_eq!(Tier::select(0, Capability::baseline()), Tier::Scalar);
    /// assert_eq!(Tier::select(64, Capability::baseline()), Tier::Vector);
    /// assert_eq!(Tier::select(1 << 30, Capability::baseline()), Tier::Vector);
    /// ```
    #[inline(always)]
    pub const fn select(len: usize, cap: Capability) -> Tier {
        if len < VECTOR_MIN {
            Tier::Scalar
        } else if !cap.avx() || len < WIDE_MIN {
            Tier::Vector
        } else if len < STREAM_MIN {
            Tier::Wide
        } else {
            Tier::Stream
        }
    }

    /// Short kernel name, for benchmark labels and logs.
    pub const fn name(self) -> &'static str {
        match self {
            Tier::Scalar => "scalar",
            Tier::Vector => "sse/16",
            Tier::Wide => "avx/32x2",
            Tier::Stream => "avx/stream",
        }
    }
}

//! memfill: fill a byte region with one value, fast.
//!
//! The fill is tiered by length and by whether AVX is available:
//!
//! - under 16 bytes: byte stores
//! - 16 to 63 bytes, or any length without AVX: 16-byte SSE stores, then bytes
//! - 64 bytes to 16 MiB with AVX: 64 bytes per iteration of 32-byte stores
//! - 16 MiB and up with AVX: aligned non-temporal stores, then `sfence`
//!
//! ```
//! let mut buf = vec![0u8; 4096];
//! memfill::fill(&mut buf, 0x5A);
//! assert!(buf.iter().all(|&b| b == 0x5A));
//! ```

pub mod cpu;
pub mod mem;
pub mod memset;
pub mod tier;

pub use cpu::Capability;
pub use mem::{fill, fill_with, tier_for_len};
pub use tier::Tier;

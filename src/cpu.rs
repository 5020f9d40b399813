//! Runtime capability probe for the wide fill tiers.
//!
//! The fill kernels only need one bit of information about the processor:
//! whether the 256-bit AVX register file (and with it `vmovntdq`) is usable.
//! Detection runs once per process and is cached; every call afterwards is a
//! single load.
//!
//! The detected value can be narrowed with the `MEMFILL_FORCE` environment
//! variable, read once alongside detection:
//!
//! - unset, empty or `auto`: use whatever the CPU reports
//! - `baseline` (or `sse`, `scalar`): never take the AVX tiers

use std::sync::OnceLock;

/// Environment variable consulted by [`Capability::detect`].
pub const FORCE_ENV: &str = "MEMFILL_FORCE";

static DETECTED: OnceLock<Capability> = OnceLock::new();

/// Override requested through [`FORCE_ENV`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Force {
    /// Use the detected capability unchanged.
    #[default]
    Auto,
    /// Pretend the AVX tiers are unavailable.
    Baseline,
}

impl Force {
    /// Parse an override value. Returns `None` for unrecognized input.
    ///
    /// # Examples
    /// ```
    /// use memfill::cpu::Force;
    /// assert_eq!(Force::parse(""), Some(Force::Auto));
    /// assert_eq!(Force::parse("Baseline"), Some(Force::Baseline));
    /// assert_eq!(Force::parse("avx512"), None);
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
            return Some(Force::Auto);
        }
        if ["baseline", "sse", "scalar"]
            .iter()
            .any(|name| raw.eq_ignore_ascii_case(name))
        {
            return Some(Force::Baseline);
        }
        None
    }

    /// Read [`FORCE_ENV`]. Unknown values fall back to [`Force::Auto`].
    pub fn from_env() -> Self {
        Force::from_var(std::env::var(FORCE_ENV).ok().as_deref())
    }

    /// Resolve a raw [`FORCE_ENV`] value; `None` means the variable is unset.
    fn from_var(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Force::Auto;
        };
        match Force::parse(raw) {
            Some(force) => force,
            None => {
                tracing::warn!(
                    var = FORCE_ENV,
                    value = %raw,
                    "unrecognized fill override, using auto"
                );
                Force::Auto
            }
        }
    }
}

/// Processor features the fill tiers care about.
///
/// Safe code can only obtain a `Capability` that is true to the hardware:
/// either [`Capability::detect`] or the always-valid [`Capability::baseline`].
/// Claiming AVX on a CPU without it would execute illegal instructions, so
/// [`Capability::assume`] is `unsafe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    avx: bool,
}

impl Capability {
    /// No wide registers: 16-byte and scalar stores only.
    pub const fn baseline() -> Self {
        Capability { avx: false }
    }

    /// Construct a capability from a raw flag.
    ///
    /// # Safety
    ///
    /// If `avx` is true the current CPU must support AVX and the OS must
    /// preserve the upper YMM state.
    pub const unsafe fn assume(avx: bool) -> Self {
        Capability { avx }
    }

    /// The process-wide capability, detected on first use.
    #[inline]
    pub fn detect() -> Self {
        *DETECTED.get_or_init(|| {
            let force = Force::from_env();
            let cap = Self::probe().with_force(force);
            tracing::debug!(avx = cap.avx, forced = ?force, "fill capability resolved");
            cap
        })
    }

    /// Whether the 256-bit tiers may be used.
    #[inline]
    pub const fn avx(self) -> bool {
        self.avx
    }

    /// Features present in both `self` and `other`.
    #[inline]
    pub const fn restrict(self, other: Capability) -> Self {
        Capability {
            avx: self.avx && other.avx,
        }
    }

    fn with_force(self, force: Force) -> Self {
        match force {
            Force::Auto => self,
            Force::Baseline => self.restrict(Capability::baseline()),
        }
    }

    fn probe() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            Capability {
                avx: is_x86_feature_detected!("avx"),
            }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            Capability::baseline()
        }
    }
}

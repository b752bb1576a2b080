//! # Bounded Short-ID Allocation
//!
//! Request and user identifiers are short random integers, readable in
//! URLs and support tickets. Candidates are drawn uniformly from
//! `1..=upper` and offered to a caller-supplied uniqueness check (normally
//! a lookup at the persistence boundary).
//!
//! Each ID space gets a fixed number of attempts. When every attempt in a
//! space collides, the allocator widens to the next, larger space. When all
//! spaces are exhausted it returns [`CoreError::IdSpaceExhausted`]. The
//! loop is iterative and bounded; allocation never recurses.

use rand::Rng;

use crate::error::CoreError;

/// Default ID spaces: nine digits, then twelve, then fifteen.
pub const DEFAULT_ID_SPACES: [u64; 3] = [999_999_999, 999_999_999_999, 999_999_999_999_999];

/// Default attempts per ID space.
pub const DEFAULT_ATTEMPTS_PER_SPACE: u32 = 16;

/// Allocates short numeric identifiers with bounded retries.
#[derive(Debug, Clone)]
pub struct ShortIdAllocator {
    spaces: Vec<u64>,
    attempts_per_space: u32,
}

impl ShortIdAllocator {
    /// Create an allocator over the given ascending upper bounds.
    ///
    /// Zero bounds are dropped. An allocator with no usable space always
    /// reports exhaustion.
    pub fn new(spaces: impl IntoIterator<Item = u64>, attempts_per_space: u32) -> Self {
        Self {
            spaces: spaces.into_iter().filter(|upper| *upper > 0).collect(),
            attempts_per_space,
        }
    }

    /// Upper bounds of the configured ID spaces, narrowest first.
    pub fn spaces(&self) -> &[u64] {
        &self.spaces
    }

    /// Draw a candidate not rejected by `is_taken`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IdSpaceExhausted`] once every attempt in every
    /// space collided.
    pub fn allocate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        mut is_taken: impl FnMut(u64) -> bool,
    ) -> Result<u64, CoreError> {
        let mut attempts = 0u32;
        for &upper in &self.spaces {
            for _ in 0..self.attempts_per_space {
                attempts += 1;
                let candidate = rng.gen_range(1..=upper);
                if !is_taken(candidate) {
                    return Ok(candidate);
                }
            }
        }
        Err(CoreError::IdSpaceExhausted { attempts })
    }
}

impl Default for ShortIdAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_ID_SPACES, DEFAULT_ATTEMPTS_PER_SPACE)
    }
}

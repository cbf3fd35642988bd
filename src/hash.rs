use std::hash::Hasher;

/// The initial state of the CDB hash function.
const CDB_HASH_SEED: u32 = 5381;

/// The CDB hash function: D. J. Bernstein's `h = ((h << 5) + h) ^ byte`
/// over unsigned 32-bit wraparound arithmetic, seeded with 5381.
///
/// The writer uses it to place records and the reader to locate the probe
/// start; the two sides must agree bit-for-bit or the file is unreadable.
/// The function has no secret seed and is not collision-resistant against
/// adversarial keys, which is fine for locally built, locally read files.
///
/// # Examples
///
/// ```
/// use std::hash::Hasher;
/// use cdb32::CdbHash;
///
/// let mut hasher = CdbHash::new();
/// hasher.write(b"some data");
/// let hash = hasher.finish() as u32;
/// ```
#[derive(Clone)]
pub struct CdbHash {
    state: u32,
}

impl Default for CdbHash {
    fn default() -> Self {
        Self::new()
    }
}

impl CdbHash {
    /// Creates a hasher initialized with the CDB seed.
    pub fn new() -> Self {
        CdbHash {
            state: CDB_HASH_SEED,
        }
    }
}

impl Hasher for CdbHash {
    /// The 32-bit state, widened to satisfy the `Hasher` contract. The
    /// format only ever stores the low 32 bits.
    fn finish(&self) -> u64 {
        u64::from(self.state)
    }

    /// Folds each byte in with `state = ((state << 5) + state) ^ byte`,
    /// wrapping modulo 2^32.
    fn write(&mut self, bytes: &[u8]) {
        let mut state = self.state;
        for &byte in bytes {
            state = ((state << 5).wrapping_add(state)) ^ u32::from(byte);
        }
        self.state = state;
    }
}

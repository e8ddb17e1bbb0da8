//! Hash functions and the double-hashing probe sequence.

/// Modulus of the step hash. Steps fall in `[1, STEP_MODULUS]`.
pub const STEP_MODULUS: u32 = 44_497;

/// Primary hash: picks the origin slot.
///
/// Folds `h = (h << 7) ^ b ^ h` over the key bytes. Bits shifted past
/// the top of the `u32` are discarded.
#[inline]
pub fn primary_hash(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |h, &b| (h << 7) ^ u32::from(b) ^ h)
}

/// Step hash: distance between successive probes, never zero.
#[inline]
pub fn step_hash(bytes: &[u8]) -> u32 {
    let h = bytes
        .iter()
        .fold(0u32, |h, &b| h.wrapping_mul(29).wrapping_add(u32::from(b)));
    STEP_MODULUS - (h % STEP_MODULUS)
}

/// Double-hashing probe sequence over a table of `capacity` slots.
///
/// Yields `(origin + i * step) mod capacity` for `i = 0..capacity`. With
/// a prime capacity and a step in `[1, capacity)` every slot is visited
/// exactly once before the sequence ends.
#[derive(Clone, Debug)]
pub struct Probe {
    pos: usize,
    step: usize,
    capacity: usize,
    remaining: usize,
}

impl Probe {
    /// Starts a sequence at `origin` advancing by `step`. Both are reduced
    /// modulo `capacity`; a step that reduces to zero becomes 1.
    pub fn new(origin: usize, step: usize, capacity: usize) -> Self {
        if capacity == 0 {
            return Probe {
                pos: 0,
                step: 0,
                capacity: 0,
                remaining: 0,
            };
        }
        let step = match step % capacity {
            0 => 1,
            s => s,
        };
        Probe {
            pos: origin % capacity,
            step,
            capacity,
            remaining: capacity,
        }
    }

    /// The probe sequence for a key's bytes.
    pub fn for_key(bytes: &[u8], capacity: usize) -> Self {
        Probe::new(
            primary_hash(bytes) as usize,
            step_hash(bytes) as usize,
            capacity,
        )
    }
}

impl Iterator for Probe {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let current = self.pos;
        // pos and step are both < capacity, so one subtraction suffices.
        self.pos += self.step;
        if self.pos >= self.capacity {
            self.pos -= self.capacity;
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Probe {}

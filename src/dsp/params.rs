//! Lock-free parameter cells
//!
//! Parameter setters run on a control thread while `process` runs on the
//! audio thread. Every value the audio thread reads is a single atomic word,
//! so a race can at worst deliver a value one block late.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// An `f32` stored as raw bits in an `AtomicU32`
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Two `f32` values packed into one `AtomicU64`
///
/// Used where two parameters only make sense together; the audio thread
/// always sees both halves from the same `store`.
#[derive(Debug, Default)]
pub struct AtomicPair(AtomicU64);

impl AtomicPair {
    pub fn new(first: f32, second: f32) -> Self {
        Self(AtomicU64::new(pack(first, second)))
    }

    #[inline]
    pub fn load(&self) -> (f32, f32) {
        unpack(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, first: f32, second: f32) {
        self.0.store(pack(first, second), Ordering::Release);
    }

    /// Replace one half, keeping the other, as a single atomic update
    pub fn update(&self, f: impl Fn(f32, f32) -> (f32, f32)) {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let (a, b) = unpack(current);
            let (na, nb) = f(a, b);
            match self.0.compare_exchange_weak(
                current,
                pack(na, nb),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

#[inline]
fn pack(first: f32, second: f32) -> u64 {
    ((first.to_bits() as u64) << 32) | second.to_bits() as u64
}

#[inline]
fn unpack(bits: u64) -> (f32, f32) {
    (
        f32::from_bits((bits >> 32) as u32),
        f32::from_bits(bits as u32),
    )
}

/// Three unit-range values and a flag packed into one `AtomicU64`
///
/// Each value is quantised to 16 bits (steps of 1/65535). Bit 48 holds the
/// flag. A reader always sees all four fields from the same `store`.
#[derive(Debug, Default)]
pub struct AtomicUnitTriple(AtomicU64);

const UNIT_STEPS: f32 = u16::MAX as f32;
const FLAG_BIT: u64 = 1 << 48;

impl AtomicUnitTriple {
    pub fn new(values: [f32; 3], flag: bool) -> Self {
        Self(AtomicU64::new(pack_triple(values, flag)))
    }

    #[inline]
    pub fn load(&self) -> ([f32; 3], bool) {
        unpack_triple(self.0.load(Ordering::Acquire))
    }

    /// Store all fields at once; values are clamped to `[0, 1]`
    #[inline]
    pub fn store(&self, values: [f32; 3], flag: bool) {
        self.0.store(pack_triple(values, flag), Ordering::Release);
    }
}

fn pack_triple(values: [f32; 3], flag: bool) -> u64 {
    let mut bits = if flag { FLAG_BIT } else { 0 };
    for (slot, value) in values.into_iter().enumerate() {
        let step = (clamp_unit(value) * UNIT_STEPS).round() as u64;
        bits |= step << (16 * slot);
    }
    bits
}

fn unpack_triple(bits: u64) -> ([f32; 3], bool) {
    let value = |slot: usize| ((bits >> (16 * slot)) & 0xFFFF) as f32 / UNIT_STEPS;
    ([value(0), value(1), value(2)], bits & FLAG_BIT != 0)
}

/// Value `n` of a per-sample ramp, or `fallback` past its end
#[inline]
pub fn ramp_value(values: &[f32], n: usize, fallback: f32) -> f32 {
    values
        .get(n)
        .or_else(|| values.last())
        .copied()
        .unwrap_or(fallback)
}

/// Clamp to `[min, max]`; NaN lands on `min`
#[inline]
pub fn clamp_range(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

/// Clamp to `[0, 1]`
#[inline]
pub fn clamp_unit(value: f32) -> f32 {
    clamp_range(value, 0.0, 1.0)
}

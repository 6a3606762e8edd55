//! Fixed-capacity circular sample store
//!
//! Shared primitive behind the feedback delay and the half-time warp. All
//! addressing is relative to a write cursor and taken modulo the capacity,
//! so no offset can ever index out of bounds.

/// Ring buffer of `f32` samples for one channel
#[derive(Debug, Clone, Default)]
pub struct RingBuffer {
    data: Vec<f32>,
    cursor: usize,
}

impl RingBuffer {
    /// Allocate a silent buffer holding `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity],
            cursor: 0,
        }
    }

    /// Reallocate to `capacity` samples, clear, and rewind the cursor
    ///
    /// Only called from `prepare`.
    pub fn resize(&mut self, capacity: usize) {
        self.data.clear();
        self.data.resize(capacity, 0.0);
        self.cursor = 0;
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    fn index(&self, offset: usize) -> usize {
        (self.cursor + offset % self.data.len()) % self.data.len()
    }

    /// Write at `(cursor + offset) mod capacity`
    #[inline]
    pub fn push(&mut self, offset: usize, value: f32) {
        if self.data.is_empty() {
            return;
        }
        let i = self.index(offset);
        self.data[i] = value;
    }

    /// Read at `(cursor + offset) mod capacity`; an empty buffer reads silence
    #[inline]
    pub fn pop(&self, offset: usize) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data[self.index(offset)]
    }

    /// Read at an absolute slot, wrapped into range
    #[inline]
    pub fn at(&self, index: usize) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data[index % self.data.len()]
    }

    /// Move the cursor forward by one slot
    #[inline]
    pub fn advance(&mut self) {
        if self.data.is_empty() {
            return;
        }
        self.cursor += 1;
        if self.cursor == self.data.len() {
            self.cursor = 0;
        }
    }

    /// Place the cursor at an absolute slot, wrapped into range
    #[inline]
    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = if self.data.is_empty() {
            0
        } else {
            cursor % self.data.len()
        };
    }

    /// Silence the contents and rewind the cursor without reallocating
    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_at_cursor() {
        let mut ring = RingBuffer::new(4);
        ring.push(0, 1.0);
        assert_eq!(ring.pop(0), 1.0);
        assert_eq!(ring.pop(1), 0.0);
    }

    #[test]
    fn test_offsets_wrap_modulo_capacity() {
        let mut ring = RingBuffer::new(4);
        ring.push(6, 2.0);
        assert_eq!(ring.pop(2), 2.0);
        assert_eq!(ring.at(2), 2.0);
        assert_eq!(ring.pop(usize::MAX - 1), ring.pop((usize::MAX - 1) % 4));
    }

    #[test]
    fn test_cursor_wraps() {
        let mut ring = RingBuffer::new(3);
        for _ in 0..7 {
            ring.advance();
        }
        assert_eq!(ring.cursor(), 1);

        ring.set_cursor(5);
        assert_eq!(ring.cursor(), 2);
    }

    #[test]
    fn test_value_returns_after_full_lap() {
        let mut ring = RingBuffer::new(5);
        ring.push(0, 0.5);
        for _ in 0..5 {
            ring.advance();
        }
        assert_eq!(ring.pop(0), 0.5);
    }

    #[test]
    fn test_empty_buffer_is_inert() {
        let mut ring = RingBuffer::default();
        ring.push(3, 1.0);
        ring.advance();
        assert_eq!(ring.pop(0), 0.0);
        assert_eq!(ring.cursor(), 0);
        assert_eq!(ring.capacity(), 0);
    }

    #[test]
    fn test_resize_and_clear() {
        let mut ring = RingBuffer::new(2);
        ring.push(0, 1.0);
        ring.advance();

        ring.clear();
        assert_eq!(ring.cursor(), 0);
        assert_eq!(ring.pop(0), 0.0);

        ring.resize(8);
        assert_eq!(ring.capacity(), 8);
        assert_eq!(ring.cursor(), 0);
    }
}

//! Reusable copy buffers for the relay
//!
//! Buffers are handed out as [`PooledBuffer`] guards that give themselves
//! back to the pool when dropped, whatever the outcome of the copy.

use crate::socks::COPY_BUFFER_SIZE;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};

/// Idle buffers kept by default
const DEFAULT_MAX_IDLE: usize = 256;

/// Pool of fixed-size copy buffers
#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<Box<[u8]>>>,
    buffer_size: usize,
    max_idle: usize,
}

impl Default for BufferPool {
    fn default() -> Self {
        BufferPool::new(COPY_BUFFER_SIZE, DEFAULT_MAX_IDLE)
    }
}

impl BufferPool {
    /// Create a pool of `buffer_size` buffers keeping at most `max_idle`
    pub fn new(buffer_size: usize, max_idle: usize) -> Self {
        BufferPool {
            idle: Mutex::new(Vec::new()),
            buffer_size,
            max_idle,
        }
    }

    /// Take a buffer, allocating when none is idle
    pub fn get(&self) -> PooledBuffer<'_> {
        let buf = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_else(|| vec![0u8; self.buffer_size].into_boxed_slice());
        PooledBuffer { buf, pool: self }
    }

    /// Number of idle buffers
    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn put(&self, buf: Box<[u8]>) {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }
}

/// RAII guard that returns the buffer to its pool on drop
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    buf: Box<[u8]>,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.buf));
    }
}

//! # Packed-Bit Operations
//!
//! Word-level access for bit arrays, beyond the element-wise `Kind`
//! operations: up-to-64-bit reads and writes, bulk transfers to and from
//! packed `u64` buffers, and the word-alignment probe that lets callers
//! split long runs at positions where whole-word access becomes possible.

use eyre::{ensure, Result};

use crate::kind::Bit;

use super::BufferArray;

impl BufferArray<Bit> {
    /// Reads up to 64 bits starting at `pos`. Bit `k` of the result is the
    /// element at `pos + k`; unused high bits are zero.
    pub fn get_bits64(&self, pos: u64, count: u32) -> Result<u64> {
        self.check_bit_run(pos, count)?;
        let start = self.offset + pos;
        self.cell
            .with_bytes(|bytes, order| Bit::get_bits64(bytes, start, count, order))
    }

    /// Writes the low `count` bits of `bits` starting at `pos`.
    pub fn set_bits64(&mut self, pos: u64, bits: u64, count: u32) -> Result<()> {
        self.check_bit_run(pos, count)?;
        self.prepare_for_write()?;
        let start = self.offset + pos;
        self.cell.with_bytes_mut(|bytes, order| {
            Bit::set_bits64(bytes, start, bits, count, order);
            Ok(())
        })
    }

    /// Reads `count` bits starting at `pos` into `dst`, packed 64 per
    /// word: bit `k` of `dst[w]` is the element at `pos + 64 * w + k`.
    pub fn get_bits(&self, pos: u64, dst: &mut [u64], count: u64) -> Result<()> {
        self.check_range(pos, count)?;
        ensure!(
            count <= dst.len() as u64 * 64,
            "packed buffer of {} words cannot hold {} bits",
            dst.len(),
            count
        );
        let start = self.offset + pos;
        self.cell.with_bytes(|bytes, order| {
            let mut done = 0u64;
            while done < count {
                let n = (count - done).min(64) as u32;
                dst[(done >> 6) as usize] = Bit::get_bits64(bytes, start + done, n, order);
                done += n as u64;
            }
        })
    }

    /// Writes `count` bits starting at `pos` from `src`, packed like
    /// [`get_bits`](Self::get_bits).
    pub fn set_bits(&mut self, pos: u64, src: &[u64], count: u64) -> Result<()> {
        self.check_range(pos, count)?;
        ensure!(
            count <= src.len() as u64 * 64,
            "packed buffer of {} words does not hold {} bits",
            src.len(),
            count
        );
        self.prepare_for_write()?;
        let start = self.offset + pos;
        self.cell.with_bytes_mut(|bytes, order| {
            let mut done = 0u64;
            while done < count {
                let n = (count - done).min(64) as u32;
                Bit::set_bits64(bytes, start + done, src[(done >> 6) as usize], n, order);
                done += n as u64;
            }
            Ok(())
        })
    }

    /// The smallest position `>= from` where the window becomes 64-bit
    /// word aligned in storage, or `None` when no such position is inside
    /// the array. Bulk operations started there move whole words.
    pub fn next_quick_position(&self, from: u64) -> Option<u64> {
        if from >= self.length {
            return None;
        }
        let aligned = ((self.offset + from + 63) & !63) - self.offset;
        if aligned >= self.length {
            None
        } else {
            Some(aligned)
        }
    }

    fn check_bit_run(&self, pos: u64, count: u32) -> Result<()> {
        ensure!(count <= 64, "bit run of {} bits exceeds one word", count);
        self.check_range(pos, count as u64)
    }
}

//! # Element Kinds
//!
//! One generic abstraction over the element kinds an array can hold.
//! Every typed operation an array needs (get, set, fill, bulk transfer,
//! search) is expressed once over a raw byte region through the [`Kind`]
//! trait, so a single generic array core serves all element kinds instead
//! of one hand-written implementation per kind.
//!
//! ## Scalar kinds
//!
//! The scalar kinds (byte, char, short, int, long, float, double) share one
//! blanket implementation driven by the [`Element`] trait. `Element` requires
//! the zerocopy marker traits, which buys two things:
//!
//! - native-byte-order bulk transfers are plain `copy_from_slice` over the
//!   reinterpreted slices, with no per-element loop;
//! - any plain-old-data struct that derives `FromBytes`/`IntoBytes`/
//!   `Immutable` can serve as an *opaque* element kind, so callers can store
//!   fixed-size records without this crate knowing their layout.
//!
//! ## Bit kind
//!
//! Bit arrays pack 64 elements per storage word. The [`Bit`] marker type
//! implements `Kind` with word-packed operations: single-bit access is a
//! masked read-modify-write, bulk operations move up to 64 bits per step,
//! and searches skip whole words that cannot contain the target value.
//!
//! ## Byte order
//!
//! Every storage reports a [`ByteOrder`]; all reads and writes go through
//! it. For bit arrays the 64-bit words themselves are serialized in the
//! storage's byte order, so a bit array persisted in a mapped file is
//! well-defined across platforms.

use core::fmt;

use eyre::{eyre, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes};

/// The element kind of an array, reported by every handle and carried in
/// progress callbacks and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Bit,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// A caller-defined plain-old-data type.
    Opaque,
}

impl ElementKind {
    pub fn name(self) -> &'static str {
        match self {
            ElementKind::Bit => "bit",
            ElementKind::Byte => "byte",
            ElementKind::Char => "char",
            ElementKind::Short => "short",
            ElementKind::Int => "int",
            ElementKind::Long => "long",
            ElementKind::Float => "float",
            ElementKind::Double => "double",
            ElementKind::Opaque => "opaque",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte order of a storage region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// The byte order of the host platform.
    pub const NATIVE: ByteOrder = if cfg!(target_endian = "big") {
        ByteOrder::Big
    } else {
        ByteOrder::Little
    };

    #[inline]
    pub fn is_native(self) -> bool {
        self == Self::NATIVE
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ByteOrder::Little => "little-endian",
            ByteOrder::Big => "big-endian",
        })
    }
}

/// A fixed-size scalar element. Implemented for the built-in numeric kinds;
/// callers may implement it (with `KIND = ElementKind::Opaque`) for any type
/// deriving the zerocopy traits.
pub trait Element:
    Copy + PartialEq + fmt::Debug + Default + Send + Sync + FromBytes + IntoBytes + Immutable + 'static
{
    const KIND: ElementKind;
    const SIZE: usize;

    /// Reads one element from the start of `buf` in the given byte order.
    /// `buf` must hold at least `SIZE` bytes.
    fn read(buf: &[u8], order: ByteOrder) -> Self;

    /// Writes this element to the start of `buf` in the given byte order.
    fn write(self, buf: &mut [u8], order: ByteOrder);
}

macro_rules! scalar_element {
    ($ty:ty, $kind:expr) => {
        impl Element for $ty {
            const KIND: ElementKind = $kind;
            const SIZE: usize = core::mem::size_of::<$ty>();

            #[inline]
            fn read(buf: &[u8], order: ByteOrder) -> Self {
                let mut raw = [0u8; core::mem::size_of::<$ty>()];
                raw.copy_from_slice(&buf[..core::mem::size_of::<$ty>()]);
                match order {
                    ByteOrder::Little => <$ty>::from_le_bytes(raw),
                    ByteOrder::Big => <$ty>::from_be_bytes(raw),
                }
            }

            #[inline]
            fn write(self, buf: &mut [u8], order: ByteOrder) {
                let raw = match order {
                    ByteOrder::Little => self.to_le_bytes(),
                    ByteOrder::Big => self.to_be_bytes(),
                };
                buf[..core::mem::size_of::<$ty>()].copy_from_slice(&raw);
            }
        }
    };
}

scalar_element!(u8, ElementKind::Byte);
scalar_element!(i8, ElementKind::Byte);
scalar_element!(u16, ElementKind::Char);
scalar_element!(i16, ElementKind::Short);
scalar_element!(i32, ElementKind::Int);
scalar_element!(i64, ElementKind::Long);
scalar_element!(f32, ElementKind::Float);
scalar_element!(f64, ElementKind::Double);
scalar_element!(u32, ElementKind::Opaque);
scalar_element!(u64, ElementKind::Opaque);

/// The storage-facing primitive set for one element kind. All positions are
/// absolute element indexes into the byte region (the array layer adds its
/// window offset before delegating).
///
/// Implementations must not read or write outside the ranges named by their
/// arguments; the array layer validates all ranges before delegating.
pub trait Kind: Send + Sync + 'static + Sized {
    type Value: Copy + PartialEq + fmt::Debug + Default + Send + Sync + 'static;

    const KIND: ElementKind;

    /// Maximum representable array length for this kind.
    fn max_length() -> u64;

    /// Bytes needed to hold `len` elements; errors on arithmetic overflow.
    fn bytes_for(len: u64) -> Result<u64>;

    /// Byte range `[from, to)` covering elements `[pos, pos + count)`,
    /// rounded outward for sub-byte kinds. Used for resource operations.
    fn byte_span(pos: u64, count: u64) -> (u64, u64);

    /// Number of elements whose canonical serialization fits in `bytes`.
    fn elements_in_bytes(bytes: u64) -> u64;

    /// Feeds a canonical serialization of elements `[pos, pos + count)`
    /// into `sink`. Canonical means independent of the window's storage
    /// alignment and of neighboring elements sharing storage bytes, so
    /// two windows with equal content always serialize identically.
    fn digest_range(
        bytes: &[u8],
        pos: u64,
        count: u64,
        order: ByteOrder,
        sink: &mut dyn FnMut(&[u8]),
    );

    fn get(bytes: &[u8], index: u64, order: ByteOrder) -> Self::Value;

    fn set(bytes: &mut [u8], index: u64, order: ByteOrder, value: Self::Value);

    fn fill(bytes: &mut [u8], pos: u64, count: u64, order: ByteOrder, value: Self::Value);

    /// Zero-fills elements `[pos, pos + count)`.
    fn clear(bytes: &mut [u8], pos: u64, count: u64, order: ByteOrder);

    fn get_data(bytes: &[u8], pos: u64, dst: &mut [Self::Value], order: ByteOrder);

    fn set_data(bytes: &mut [u8], pos: u64, src: &[Self::Value], order: ByteOrder);

    /// Minimal index in `[low, high)` holding `value`, if any.
    fn index_of(bytes: &[u8], low: u64, high: u64, order: ByteOrder, value: Self::Value)
        -> Option<u64>;

    /// Maximal index in `[low, high)` holding `value`, if any.
    fn last_index_of(
        bytes: &[u8],
        low: u64,
        high: u64,
        order: ByteOrder,
        value: Self::Value,
    ) -> Option<u64>;

    /// Copies `count` elements from `src_pos` to `dst_pos` within one
    /// region. Overlap-safe (memmove semantics).
    fn copy_within(bytes: &mut [u8], src_pos: u64, dst_pos: u64, count: u64, order: ByteOrder);

    /// Swaps `count` elements between `first` and `second` within one
    /// region. Overlap-safe.
    fn swap_within(bytes: &mut [u8], first: u64, second: u64, count: u64, order: ByteOrder);

    /// Copies `count` elements across two distinct byte regions sharing the
    /// same byte order.
    fn transfer(
        src: &[u8],
        src_pos: u64,
        dst: &mut [u8],
        dst_pos: u64,
        count: u64,
        order: ByteOrder,
    );
}

impl<T: Element> Kind for T {
    type Value = T;

    const KIND: ElementKind = T::KIND;

    #[inline]
    fn max_length() -> u64 {
        (i64::MAX as u64) >> T::SIZE.trailing_zeros()
    }

    fn bytes_for(len: u64) -> Result<u64> {
        len.checked_mul(T::SIZE as u64).ok_or_else(|| {
            eyre!(
                "too large desired array capacity ({} {} elements)",
                len,
                T::KIND
            )
        })
    }

    #[inline]
    fn byte_span(pos: u64, count: u64) -> (u64, u64) {
        (pos * T::SIZE as u64, (pos + count) * T::SIZE as u64)
    }

    #[inline]
    fn elements_in_bytes(bytes: u64) -> u64 {
        bytes / T::SIZE as u64
    }

    fn digest_range(
        bytes: &[u8],
        pos: u64,
        count: u64,
        _order: ByteOrder,
        sink: &mut dyn FnMut(&[u8]),
    ) {
        let start = pos as usize * T::SIZE;
        let end = start + count as usize * T::SIZE;
        sink(&bytes[start..end]);
    }

    #[inline]
    fn get(bytes: &[u8], index: u64, order: ByteOrder) -> T {
        T::read(&bytes[index as usize * T::SIZE..], order)
    }

    #[inline]
    fn set(bytes: &mut [u8], index: u64, order: ByteOrder, value: T) {
        value.write(&mut bytes[index as usize * T::SIZE..], order);
    }

    fn fill(bytes: &mut [u8], pos: u64, count: u64, order: ByteOrder, value: T) {
        let start = pos as usize * T::SIZE;
        let end = start + count as usize * T::SIZE;
        if order.is_native() && T::SIZE == 1 {
            // single-byte kinds fill fastest through the raw region
            let mut raw = [0u8; 8];
            value.write(&mut raw, order);
            bytes[start..end].fill(raw[0]);
            return;
        }
        for chunk in bytes[start..end].chunks_exact_mut(T::SIZE) {
            value.write(chunk, order);
        }
    }

    fn clear(bytes: &mut [u8], pos: u64, count: u64, _order: ByteOrder) {
        let start = pos as usize * T::SIZE;
        let end = start + count as usize * T::SIZE;
        bytes[start..end].fill(0);
    }

    fn get_data(bytes: &[u8], pos: u64, dst: &mut [T], order: ByteOrder) {
        let start = pos as usize * T::SIZE;
        let end = start + dst.len() * T::SIZE;
        if order.is_native() {
            dst.as_mut_bytes().copy_from_slice(&bytes[start..end]);
            return;
        }
        for (chunk, slot) in bytes[start..end].chunks_exact(T::SIZE).zip(dst.iter_mut()) {
            *slot = T::read(chunk, order);
        }
    }

    fn set_data(bytes: &mut [u8], pos: u64, src: &[T], order: ByteOrder) {
        let start = pos as usize * T::SIZE;
        let end = start + src.len() * T::SIZE;
        if order.is_native() {
            bytes[start..end].copy_from_slice(src.as_bytes());
            return;
        }
        for (chunk, value) in bytes[start..end]
            .chunks_exact_mut(T::SIZE)
            .zip(src.iter().copied())
        {
            value.write(chunk, order);
        }
    }

    fn index_of(bytes: &[u8], low: u64, high: u64, order: ByteOrder, value: T) -> Option<u64> {
        (low..high).find(|&i| Self::get(bytes, i, order) == value)
    }

    fn last_index_of(bytes: &[u8], low: u64, high: u64, order: ByteOrder, value: T) -> Option<u64> {
        (low..high)
            .rev()
            .find(|&i| Self::get(bytes, i, order) == value)
    }

    fn copy_within(bytes: &mut [u8], src_pos: u64, dst_pos: u64, count: u64, _order: ByteOrder) {
        let src = src_pos as usize * T::SIZE;
        let dst = dst_pos as usize * T::SIZE;
        let n = count as usize * T::SIZE;
        bytes.copy_within(src..src + n, dst);
    }

    fn swap_within(bytes: &mut [u8], first: u64, second: u64, count: u64, order: ByteOrder) {
        if first == second || count == 0 {
            return;
        }
        let (lo, hi) = if first < second {
            (first, second)
        } else {
            (second, first)
        };
        if lo + count <= hi {
            let lo_b = lo as usize * T::SIZE;
            let hi_b = hi as usize * T::SIZE;
            let n = count as usize * T::SIZE;
            let (head, tail) = bytes.split_at_mut(hi_b);
            head[lo_b..lo_b + n].swap_with_slice(&mut tail[..n]);
        } else {
            // overlapping ranges: element-wise exchange
            for i in 0..count {
                let a = Self::get(bytes, lo + i, order);
                let b = Self::get(bytes, hi + i, order);
                Self::set(bytes, lo + i, order, b);
                Self::set(bytes, hi + i, order, a);
            }
        }
    }

    fn transfer(src: &[u8], src_pos: u64, dst: &mut [u8], dst_pos: u64, count: u64, _order: ByteOrder) {
        let s = src_pos as usize * T::SIZE;
        let d = dst_pos as usize * T::SIZE;
        let n = count as usize * T::SIZE;
        dst[d..d + n].copy_from_slice(&src[s..s + n]);
    }
}

/// Marker type for the packed-bit element kind: 64 elements per storage
/// word, words serialized in the storage's byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bit;

impl Bit {
    #[inline]
    fn read_word(bytes: &[u8], word_index: u64, order: ByteOrder) -> u64 {
        let p = word_index as usize * 8;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[p..p + 8]);
        match order {
            ByteOrder::Little => u64::from_le_bytes(raw),
            ByteOrder::Big => u64::from_be_bytes(raw),
        }
    }

    #[inline]
    fn write_word(bytes: &mut [u8], word_index: u64, order: ByteOrder, word: u64) {
        let p = word_index as usize * 8;
        let raw = match order {
            ByteOrder::Little => word.to_le_bytes(),
            ByteOrder::Big => word.to_be_bytes(),
        };
        bytes[p..p + 8].copy_from_slice(&raw);
    }

    /// Reads up to 64 bits starting at bit position `pos`. Bit `k` of the
    /// result is the element at `pos + k`; unused high bits are zero.
    pub(crate) fn get_bits64(bytes: &[u8], pos: u64, count: u32, order: ByteOrder) -> u64 {
        if count == 0 {
            return 0;
        }
        let widx = pos >> 6;
        let shift = (pos & 63) as u32;
        let mut result = Self::read_word(bytes, widx, order) >> shift;
        if shift != 0 && shift + count > 64 {
            result |= Self::read_word(bytes, widx + 1, order) << (64 - shift);
        }
        if count == 64 {
            result
        } else {
            result & ((1u64 << count) - 1)
        }
    }

    /// Writes the low `count` bits of `bits` at bit position `pos`.
    pub(crate) fn set_bits64(bytes: &mut [u8], pos: u64, bits: u64, count: u32, order: ByteOrder) {
        if count == 0 {
            return;
        }
        let widx = pos >> 6;
        let shift = (pos & 63) as u32;
        let mask = if count == 64 { !0u64 } else { (1u64 << count) - 1 };
        let bits = bits & mask;
        let word = Self::read_word(bytes, widx, order);
        if shift + count <= 64 {
            let m = mask << shift;
            Self::write_word(bytes, widx, order, (word & !m) | (bits << shift));
        } else {
            // the run crosses a word boundary; shift is non-zero here
            let m_lo = mask << shift;
            Self::write_word(bytes, widx, order, (word & !m_lo) | (bits << shift));
            let hi_count = shift + count - 64;
            let m_hi = (1u64 << hi_count) - 1;
            let hi_word = Self::read_word(bytes, widx + 1, order);
            Self::write_word(
                bytes,
                widx + 1,
                order,
                (hi_word & !m_hi) | (bits >> (64 - shift)),
            );
        }
    }
}

impl Kind for Bit {
    type Value = bool;

    const KIND: ElementKind = ElementKind::Bit;

    #[inline]
    fn max_length() -> u64 {
        i64::MAX as u64
    }

    fn bytes_for(len: u64) -> Result<u64> {
        // whole 64-bit words; len <= 2^63 - 1, so the additions cannot wrap
        Ok(((len + 63) >> 6) * 8)
    }

    #[inline]
    fn byte_span(pos: u64, count: u64) -> (u64, u64) {
        (pos >> 3, (pos + count + 7) >> 3)
    }

    #[inline]
    fn elements_in_bytes(bytes: u64) -> u64 {
        bytes.saturating_mul(8)
    }

    /// Serializes through whole extracted words, so partial edge bits of
    /// shared storage bytes never leak into the serialization.
    fn digest_range(
        bytes: &[u8],
        pos: u64,
        count: u64,
        order: ByteOrder,
        sink: &mut dyn FnMut(&[u8]),
    ) {
        let mut done = 0u64;
        while done < count {
            let n = (count - done).min(64) as u32;
            let word = Self::get_bits64(bytes, pos + done, n, order);
            sink(&word.to_le_bytes());
            done += n as u64;
        }
    }

    #[inline]
    fn get(bytes: &[u8], index: u64, order: ByteOrder) -> bool {
        let word = Self::read_word(bytes, index >> 6, order);
        (word >> (index & 63)) & 1 == 1
    }

    #[inline]
    fn set(bytes: &mut [u8], index: u64, order: ByteOrder, value: bool) {
        let widx = index >> 6;
        let mask = 1u64 << (index & 63);
        let word = Self::read_word(bytes, widx, order);
        let word = if value { word | mask } else { word & !mask };
        Self::write_word(bytes, widx, order, word);
    }

    fn fill(bytes: &mut [u8], pos: u64, count: u64, order: ByteOrder, value: bool) {
        let filler = if value { !0u64 } else { 0u64 };
        let mut p = pos;
        let end = pos + count;
        while p < end {
            let n = (end - p).min(64) as u32;
            Self::set_bits64(bytes, p, filler, n, order);
            p += n as u64;
        }
    }

    fn clear(bytes: &mut [u8], pos: u64, count: u64, order: ByteOrder) {
        Self::fill(bytes, pos, count, order, false);
    }

    fn get_data(bytes: &[u8], pos: u64, dst: &mut [bool], order: ByteOrder) {
        let mut i = 0usize;
        while i < dst.len() {
            let n = (dst.len() - i).min(64);
            let word = Self::get_bits64(bytes, pos + i as u64, n as u32, order);
            for (k, slot) in dst[i..i + n].iter_mut().enumerate() {
                *slot = (word >> k) & 1 == 1;
            }
            i += n;
        }
    }

    fn set_data(bytes: &mut [u8], pos: u64, src: &[bool], order: ByteOrder) {
        let mut i = 0usize;
        while i < src.len() {
            let n = (src.len() - i).min(64);
            let mut word = 0u64;
            for (k, &bit) in src[i..i + n].iter().enumerate() {
                if bit {
                    word |= 1u64 << k;
                }
            }
            Self::set_bits64(bytes, pos + i as u64, word, n as u32, order);
            i += n;
        }
    }

    fn index_of(bytes: &[u8], low: u64, high: u64, order: ByteOrder, value: bool) -> Option<u64> {
        let mut i = low;
        while i < high && (i & 63) != 0 {
            if Self::get(bytes, i, order) == value {
                return Some(i);
            }
            i += 1;
        }
        // whole words: skip words that cannot contain the value
        while i + 64 <= high {
            let word = Self::read_word(bytes, i >> 6, order);
            let candidates = if value { word } else { !word };
            if candidates != 0 {
                return Some(i + candidates.trailing_zeros() as u64);
            }
            i += 64;
        }
        while i < high {
            if Self::get(bytes, i, order) == value {
                return Some(i);
            }
            i += 1;
        }
        None
    }

    fn last_index_of(bytes: &[u8], low: u64, high: u64, order: ByteOrder, value: bool) -> Option<u64> {
        let mut i = high;
        while i > low && (i & 63) != 0 {
            i -= 1;
            if Self::get(bytes, i, order) == value {
                return Some(i);
            }
        }
        while i >= 64 && i - 64 >= low {
            let word = Self::read_word(bytes, (i - 64) >> 6, order);
            let candidates = if value { word } else { !word };
            if candidates != 0 {
                return Some(i - 64 + (63 - candidates.leading_zeros() as u64));
            }
            i -= 64;
        }
        while i > low {
            i -= 1;
            if Self::get(bytes, i, order) == value {
                return Some(i);
            }
        }
        None
    }

    fn copy_within(bytes: &mut [u8], src_pos: u64, dst_pos: u64, count: u64, order: ByteOrder) {
        if src_pos == dst_pos || count == 0 {
            return;
        }
        if dst_pos < src_pos {
            let mut done = 0u64;
            while done < count {
                let n = (count - done).min(64) as u32;
                let word = Self::get_bits64(bytes, src_pos + done, n, order);
                Self::set_bits64(bytes, dst_pos + done, word, n, order);
                done += n as u64;
            }
        } else {
            // copy backwards so an overlapping forward shift stays correct
            let mut remaining = count;
            while remaining > 0 {
                let n = remaining.min(64) as u32;
                remaining -= n as u64;
                let word = Self::get_bits64(bytes, src_pos + remaining, n, order);
                Self::set_bits64(bytes, dst_pos + remaining, word, n, order);
            }
        }
    }

    fn swap_within(bytes: &mut [u8], first: u64, second: u64, count: u64, order: ByteOrder) {
        if first == second || count == 0 {
            return;
        }
        let (lo, hi) = if first < second {
            (first, second)
        } else {
            (second, first)
        };
        if lo + count <= hi {
            let mut done = 0u64;
            while done < count {
                let n = (count - done).min(64) as u32;
                let a = Self::get_bits64(bytes, lo + done, n, order);
                let b = Self::get_bits64(bytes, hi + done, n, order);
                Self::set_bits64(bytes, lo + done, b, n, order);
                Self::set_bits64(bytes, hi + done, a, n, order);
                done += n as u64;
            }
        } else {
            // overlapping: stash the low range first
            let words = ((count + 63) >> 6) as usize;
            let mut saved = vec![0u64; words];
            let mut done = 0u64;
            while done < count {
                let n = (count - done).min(64) as u32;
                saved[(done >> 6) as usize] = Self::get_bits64(bytes, lo + done, n, order);
                done += n as u64;
            }
            Self::copy_within(bytes, hi, lo, count, order);
            let mut done = 0u64;
            while done < count {
                let n = (count - done).min(64) as u32;
                Self::set_bits64(bytes, hi + done, saved[(done >> 6) as usize], n, order);
                done += n as u64;
            }
        }
    }

    fn transfer(src: &[u8], src_pos: u64, dst: &mut [u8], dst_pos: u64, count: u64, order: ByteOrder) {
        if src_pos & 7 == 0 && dst_pos & 7 == 0 && count & 7 == 0 {
            // byte-aligned fast path
            let s = (src_pos >> 3) as usize;
            let d = (dst_pos >> 3) as usize;
            let n = (count >> 3) as usize;
            dst[d..d + n].copy_from_slice(&src[s..s + n]);
            return;
        }
        let mut done = 0u64;
        while done < count {
            let n = (count - done).min(64) as u32;
            let word = Self::get_bits64(src, src_pos + done, n, order);
            Self::set_bits64(dst, dst_pos + done, word, n, order);
            done += n as u64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_read_write_round_trip_both_orders() {
        let mut buf = [0u8; 8];
        for order in [ByteOrder::Little, ByteOrder::Big] {
            0x1234_5678i32.write(&mut buf, order);
            assert_eq!(i32::read(&buf, order), 0x1234_5678);
            (-1.5f64).write(&mut buf, order);
            assert_eq!(f64::read(&buf, order), -1.5);
        }
    }

    #[test]
    fn scalar_bulk_matches_element_wise_for_foreign_order() {
        let values: Vec<i32> = (0..100).map(|i| i * 7 - 50).collect();
        let mut bytes = vec![0u8; 100 * 4];
        <i32 as Kind>::set_data(&mut bytes, 0, &values, ByteOrder::Big);
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(<i32 as Kind>::get(&bytes, i as u64, ByteOrder::Big), v);
        }
        let mut back = vec![0i32; 100];
        <i32 as Kind>::get_data(&bytes, 0, &mut back, ByteOrder::Big);
        assert_eq!(back, values);
    }

    #[test]
    fn scalar_copy_within_handles_overlap() {
        let mut bytes = vec![0u8; 10 * 4];
        let values: Vec<i32> = (0..10).collect();
        <i32 as Kind>::set_data(&mut bytes, 0, &values, ByteOrder::NATIVE);
        <i32 as Kind>::copy_within(&mut bytes, 0, 3, 5, ByteOrder::NATIVE);
        let mut out = vec![0i32; 10];
        <i32 as Kind>::get_data(&bytes, 0, &mut out, ByteOrder::NATIVE);
        assert_eq!(out, vec![0, 1, 2, 0, 1, 2, 3, 4, 8, 9]);
    }

    #[test]
    fn scalar_swap_within_disjoint_and_overlapping() {
        let mut bytes = vec![0u8; 8 * 2];
        <i16 as Kind>::set_data(&mut bytes, 0, &[1, 2, 3, 4, 5, 6, 7, 8], ByteOrder::NATIVE);
        <i16 as Kind>::swap_within(&mut bytes, 0, 4, 4, ByteOrder::NATIVE);
        let mut out = [0i16; 8];
        <i16 as Kind>::get_data(&bytes, 0, &mut out, ByteOrder::NATIVE);
        assert_eq!(out, [5, 6, 7, 8, 1, 2, 3, 4]);
    }

    #[test]
    fn bit_single_access_round_trip() {
        let mut bytes = vec![0u8; 16];
        for order in [ByteOrder::Little, ByteOrder::Big] {
            bytes.fill(0);
            Bit::set(&mut bytes, 0, order, true);
            Bit::set(&mut bytes, 63, order, true);
            Bit::set(&mut bytes, 64, order, true);
            Bit::set(&mut bytes, 100, order, true);
            assert!(Bit::get(&bytes, 0, order));
            assert!(!Bit::get(&bytes, 1, order));
            assert!(Bit::get(&bytes, 63, order));
            assert!(Bit::get(&bytes, 64, order));
            assert!(Bit::get(&bytes, 100, order));
            Bit::set(&mut bytes, 63, order, false);
            assert!(!Bit::get(&bytes, 63, order));
        }
    }

    #[test]
    fn bit_runs_cross_word_boundaries() {
        let mut bytes = vec![0u8; 24];
        // 40 bits starting at 50 cross the first word boundary
        Bit::set_bits64(&mut bytes, 50, 0xFF_FFFF_FFFF, 40, ByteOrder::NATIVE);
        assert_eq!(
            Bit::get_bits64(&bytes, 50, 40, ByteOrder::NATIVE),
            0xFF_FFFF_FFFF
        );
        assert!(!Bit::get(&bytes, 49, ByteOrder::NATIVE));
        assert!(!Bit::get(&bytes, 90, ByteOrder::NATIVE));
        assert!(Bit::get(&bytes, 50, ByteOrder::NATIVE));
        assert!(Bit::get(&bytes, 89, ByteOrder::NATIVE));
    }

    #[test]
    fn bit_bulk_data_at_unaligned_positions() {
        let mut bytes = vec![0u8; 40];
        let pattern: Vec<bool> = (0..130).map(|i| i % 3 == 0).collect();
        Bit::set_data(&mut bytes, 17, &pattern, ByteOrder::NATIVE);
        let mut back = vec![false; 130];
        Bit::get_data(&bytes, 17, &mut back, ByteOrder::NATIVE);
        assert_eq!(back, pattern);
        // neighbors untouched
        assert!(!Bit::get(&bytes, 16, ByteOrder::NATIVE));
        assert!(!Bit::get(&bytes, 17 + 130, ByteOrder::NATIVE));
    }

    #[test]
    fn bit_index_of_skips_words() {
        let mut bytes = vec![0u8; 128];
        Bit::set(&mut bytes, 700, ByteOrder::NATIVE, true);
        assert_eq!(
            Bit::index_of(&bytes, 0, 1024, ByteOrder::NATIVE, true),
            Some(700)
        );
        assert_eq!(
            Bit::last_index_of(&bytes, 0, 1024, ByteOrder::NATIVE, true),
            Some(700)
        );
        assert_eq!(Bit::index_of(&bytes, 701, 1024, ByteOrder::NATIVE, true), None);
        // searching for a zero skips the all-ones words
        Bit::fill(&mut bytes, 0, 700, ByteOrder::NATIVE, true);
        assert_eq!(
            Bit::index_of(&bytes, 0, 1024, ByteOrder::NATIVE, false),
            Some(701)
        );
    }

    #[test]
    fn bit_copy_within_overlapping_shift() {
        let mut bytes = vec![0u8; 32];
        let pattern: Vec<bool> = (0..100).map(|i| (i * 31) % 7 < 3).collect();
        Bit::set_data(&mut bytes, 0, &pattern, ByteOrder::NATIVE);
        Bit::copy_within(&mut bytes, 0, 5, 100, ByteOrder::NATIVE);
        let mut shifted = vec![false; 100];
        Bit::get_data(&bytes, 5, &mut shifted, ByteOrder::NATIVE);
        assert_eq!(shifted, pattern);
    }

    #[test]
    fn bit_digest_is_alignment_independent() {
        let collect = |bytes: &[u8], pos: u64| {
            let mut out = Vec::new();
            <Bit as Kind>::digest_range(bytes, pos, 70, ByteOrder::NATIVE, &mut |c| {
                out.extend_from_slice(c)
            });
            out
        };

        // the same 70 bits at offsets 0 and 3 serialize identically
        let mut a = vec![0u8; 24];
        let mut b = vec![0u8; 24];
        for i in 0..70 {
            let v = (i * 7) % 3 == 0;
            Bit::set(&mut a, i, ByteOrder::NATIVE, v);
            Bit::set(&mut b, i + 3, ByteOrder::NATIVE, v);
        }
        assert_eq!(collect(&a, 0), collect(&b, 3));

        // neighbor bits sharing the edge bytes do not contribute
        Bit::set(&mut b, 0, ByteOrder::NATIVE, true);
        Bit::set(&mut b, 73, ByteOrder::NATIVE, true);
        assert_eq!(collect(&a, 0), collect(&b, 3));

        // an in-range flip does
        Bit::set(&mut b, 40, ByteOrder::NATIVE, true);
        assert_ne!(collect(&a, 0), collect(&b, 3));
    }

    #[test]
    fn bit_transfer_unaligned_between_regions() {
        let mut src = vec![0u8; 32];
        let mut dst = vec![0u8; 32];
        let pattern: Vec<bool> = (0..90).map(|i| i % 5 != 2).collect();
        Bit::set_data(&mut src, 3, &pattern, ByteOrder::NATIVE);
        Bit::transfer(&src, 3, &mut dst, 11, 90, ByteOrder::NATIVE);
        let mut back = vec![false; 90];
        Bit::get_data(&dst, 11, &mut back, ByteOrder::NATIVE);
        assert_eq!(back, pattern);
    }

    #[test]
    fn bytes_for_overflow_is_reported() {
        assert!(<i64 as Kind>::bytes_for(u64::MAX / 2).is_err());
        assert!(<u8 as Kind>::bytes_for(1 << 40).is_ok());
    }
}

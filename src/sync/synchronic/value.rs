/*!
 * Synchronic Value Types
 *
 * The closed set of element types a synchronic cell can hold. Every type
 * maps onto one of four slot widths and round-trips through a `u64` bit
 * pattern, so a single cell implementation serves all of them: the width
 * picks which atomic performs the access, the bits carry the value.
 *
 * Floats have no native atomic arithmetic; `add`/`sub` on them run as CAS
 * loops over the bit pattern, and equality is representational (see
 * [`SyncValue::same`]).
 */

use crate::core::types::Offset;
use crate::region::SharedRegion;
use std::fmt::Debug;
use std::sync::atomic::Ordering;

/// Width of the value slot in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    W8,
    W16,
    W32,
    W64,
}

/// Read-modify-write operations with native atomic support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RmwOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
}

mod sealed {
    pub trait Sealed {}
}

/// Element type of a synchronic cell
pub trait SyncValue: sealed::Sealed + Copy + Debug + Send + Sync + 'static {
    const WIDTH: Width;
    const IS_FLOAT: bool;

    fn to_bits(self) -> u64;
    fn from_bits(bits: u64) -> Self;

    /// Equality used by `compare_exchange` and the `*_when_equal` family
    ///
    /// Integers compare by value. Floats compare by bit pattern, except that
    /// `+0.0` and `-0.0` are equal; two NaNs are equal only when their bits
    /// are identical.
    #[inline]
    fn same(self, other: Self) -> bool {
        self.to_bits() == other.to_bits()
    }

    fn add(self, rhs: Self) -> Self;
    fn sub(self, rhs: Self) -> Self;
}

/// Integer element types, which also support bitwise operations
pub trait SyncInteger: SyncValue {}

macro_rules! impl_sync_integer {
    ($($ty:ty => $unsigned:ty, $width:ident);* $(;)?) => {$(
        impl sealed::Sealed for $ty {}

        impl SyncValue for $ty {
            const WIDTH: Width = Width::$width;
            const IS_FLOAT: bool = false;

            #[inline]
            fn to_bits(self) -> u64 {
                self as $unsigned as u64
            }

            #[inline]
            fn from_bits(bits: u64) -> Self {
                bits as $unsigned as $ty
            }

            #[inline]
            fn add(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }

            #[inline]
            fn sub(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }
        }

        impl SyncInteger for $ty {}
    )*};
}

impl_sync_integer! {
    i8 => u8, W8;
    u8 => u8, W8;
    i16 => u16, W16;
    u16 => u16, W16;
    i32 => u32, W32;
    u32 => u32, W32;
    i64 => u64, W64;
    u64 => u64, W64;
}

macro_rules! impl_sync_float {
    ($($ty:ty => $bits:ty, $width:ident);* $(;)?) => {$(
        impl sealed::Sealed for $ty {}

        impl SyncValue for $ty {
            const WIDTH: Width = Width::$width;
            const IS_FLOAT: bool = true;

            #[inline]
            fn to_bits(self) -> u64 {
                <$ty>::to_bits(self) as u64
            }

            #[inline]
            fn from_bits(bits: u64) -> Self {
                <$ty>::from_bits(bits as $bits)
            }

            #[inline]
            fn same(self, other: Self) -> bool {
                // == is true for +0/-0 and false for every NaN
                <$ty>::to_bits(self) == <$ty>::to_bits(other) || (self == 0.0 && other == 0.0)
            }

            #[inline]
            fn add(self, rhs: Self) -> Self {
                self + rhs
            }

            #[inline]
            fn sub(self, rhs: Self) -> Self {
                self - rhs
            }
        }
    )*};
}

impl_sync_float! {
    f32 => u32, W32;
    f64 => u64, W64;
}

impl Width {
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            Width::W8 => 1,
            Width::W16 => 2,
            Width::W32 => 4,
            Width::W64 => 8,
        }
    }

    #[inline]
    pub(crate) fn load(self, region: &SharedRegion, offset: Offset) -> u64 {
        match self {
            Width::W8 => region.u8_at(offset).load(Ordering::SeqCst) as u64,
            Width::W16 => region.u16_at(offset).load(Ordering::SeqCst) as u64,
            Width::W32 => region.u32_at(offset).load(Ordering::SeqCst) as u64,
            Width::W64 => region.u64_at(offset).load(Ordering::SeqCst),
        }
    }

    #[inline]
    pub(crate) fn store(self, region: &SharedRegion, offset: Offset, bits: u64) {
        match self {
            Width::W8 => region.u8_at(offset).store(bits as u8, Ordering::SeqCst),
            Width::W16 => region.u16_at(offset).store(bits as u16, Ordering::SeqCst),
            Width::W32 => region.u32_at(offset).store(bits as u32, Ordering::SeqCst),
            Width::W64 => region.u64_at(offset).store(bits, Ordering::SeqCst),
        }
    }

    #[inline]
    pub(crate) fn swap(self, region: &SharedRegion, offset: Offset, bits: u64) -> u64 {
        match self {
            Width::W8 => region.u8_at(offset).swap(bits as u8, Ordering::SeqCst) as u64,
            Width::W16 => region.u16_at(offset).swap(bits as u16, Ordering::SeqCst) as u64,
            Width::W32 => region.u32_at(offset).swap(bits as u32, Ordering::SeqCst) as u64,
            Width::W64 => region.u64_at(offset).swap(bits, Ordering::SeqCst),
        }
    }

    /// Strong compare-and-swap on raw bits
    #[inline]
    pub(crate) fn compare_exchange(
        self,
        region: &SharedRegion,
        offset: Offset,
        current: u64,
        new: u64,
    ) -> Result<u64, u64> {
        const S: Ordering = Ordering::SeqCst;
        match self {
            Width::W8 => region
                .u8_at(offset)
                .compare_exchange(current as u8, new as u8, S, S)
                .map(u64::from)
                .map_err(u64::from),
            Width::W16 => region
                .u16_at(offset)
                .compare_exchange(current as u16, new as u16, S, S)
                .map(u64::from)
                .map_err(u64::from),
            Width::W32 => region
                .u32_at(offset)
                .compare_exchange(current as u32, new as u32, S, S)
                .map(u64::from)
                .map_err(u64::from),
            Width::W64 => region.u64_at(offset).compare_exchange(current, new, S, S),
        }
    }

    /// Native fetch-and-op on raw bits, returning the previous bits
    ///
    /// Add and sub wrap, which is two's complement arithmetic for the signed
    /// types as well.
    pub(crate) fn fetch(self, region: &SharedRegion, offset: Offset, op: RmwOp, bits: u64) -> u64 {
        macro_rules! rmw {
            ($atomic:expr, $v:expr) => {{
                let atomic = $atomic;
                let v = $v;
                let previous = match op {
                    RmwOp::Add => atomic.fetch_add(v, Ordering::SeqCst),
                    RmwOp::Sub => atomic.fetch_sub(v, Ordering::SeqCst),
                    RmwOp::And => atomic.fetch_and(v, Ordering::SeqCst),
                    RmwOp::Or => atomic.fetch_or(v, Ordering::SeqCst),
                    RmwOp::Xor => atomic.fetch_xor(v, Ordering::SeqCst),
                };
                previous as u64
            }};
        }

        match self {
            Width::W8 => rmw!(region.u8_at(offset), bits as u8),
            Width::W16 => rmw!(region.u16_at(offset), bits as u16),
            Width::W32 => rmw!(region.u32_at(offset), bits as u32),
            Width::W64 => rmw!(region.u64_at(offset), bits),
        }
    }
}

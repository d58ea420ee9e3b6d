//! Caller memory.
//!
//! The device never dereferences caller addresses itself. A session carries
//! the caller's [`UserMemory`], and a command gets a [`UserSlice`] of the exact
//! length its ioctl code declares. Reading goes through [`UserSliceReader`],
//! writing through [`UserSliceWriter`]; both refuse to move more bytes than the
//! slice holds and report any failed copy as [`DriverError::CopyFault`].

use std::collections::BTreeMap;
use std::fmt;
use std::mem::size_of;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{DriverError, DriverResult};

/// An address in a caller's address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserAddr(usize);

impl UserAddr {
    pub const NULL: UserAddr = UserAddr(0);

    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    pub const fn get(self) -> usize {
        self.0
    }

    fn offset(self, by: usize) -> Self {
        Self(self.0.wrapping_add(by))
    }
}

impl fmt::LowerHex for UserAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// `copy_from_user` / `copy_to_user` for one caller address space.
///
/// Implementations must either copy the whole range or fail without partial
/// effects visible to the device.
pub trait UserMemory: Send + Sync {
    /// Fills `dst` from caller memory at `src`.
    fn copy_in(&self, dst: &mut [u8], src: UserAddr) -> DriverResult;

    /// Copies `src` into caller memory at `dst`.
    fn copy_out(&self, dst: UserAddr, src: &[u8]) -> DriverResult;
}

/// Values that can be read from caller memory.
pub trait ReadableFromBytes: Sized {
    fn read_from(reader: &mut UserSliceReader<'_>) -> DriverResult<Self>;
}

/// Values that can be written to caller memory.
pub trait WritableToBytes {
    fn write_to(&self, writer: &mut UserSliceWriter<'_>) -> DriverResult;
}

macro_rules! impl_native_bytes {
    ($($t:ty),* $(,)?) => {$(
        impl ReadableFromBytes for $t {
            fn read_from(reader: &mut UserSliceReader<'_>) -> DriverResult<Self> {
                let mut buf = [0u8; size_of::<$t>()];
                reader.read_slice(&mut buf)?;
                Ok(<$t>::from_ne_bytes(buf))
            }
        }

        impl WritableToBytes for $t {
            fn write_to(&self, writer: &mut UserSliceWriter<'_>) -> DriverResult {
                writer.write_slice(&self.to_ne_bytes())
            }
        }
    )*};
}

impl_native_bytes!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

/// A caller buffer of known length.
pub struct UserSlice<'a> {
    memory: &'a dyn UserMemory,
    addr: UserAddr,
    len: usize,
}

impl<'a> UserSlice<'a> {
    pub fn new(memory: &'a dyn UserMemory, addr: UserAddr, len: usize) -> Self {
        Self { memory, addr, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn reader(self) -> UserSliceReader<'a> {
        UserSliceReader(self)
    }

    pub fn writer(self) -> UserSliceWriter<'a> {
        UserSliceWriter(self)
    }
}

/// Read side of a [`UserSlice`]; each read consumes the bytes it copied.
pub struct UserSliceReader<'a>(UserSlice<'a>);

impl UserSliceReader<'_> {
    pub fn len(&self) -> usize {
        self.0.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read_slice(&mut self, data: &mut [u8]) -> DriverResult {
        let slice = &mut self.0;
        if data.len() > slice.len {
            return Err(DriverError::CopyFault { addr: slice.addr.get(), len: data.len() });
        }
        slice.memory.copy_in(data, slice.addr)?;
        slice.addr = slice.addr.offset(data.len());
        slice.len -= data.len();
        Ok(())
    }

    pub fn read<T: ReadableFromBytes>(&mut self) -> DriverResult<T> {
        T::read_from(self)
    }
}

/// Write side of a [`UserSlice`]; each write consumes the bytes it copied.
pub struct UserSliceWriter<'a>(UserSlice<'a>);

impl UserSliceWriter<'_> {
    pub fn len(&self) -> usize {
        self.0.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn write_slice(&mut self, data: &[u8]) -> DriverResult {
        let slice = &mut self.0;
        if data.len() > slice.len {
            return Err(DriverError::CopyFault { addr: slice.addr.get(), len: data.len() });
        }
        slice.memory.copy_out(slice.addr, data)?;
        slice.addr = slice.addr.offset(data.len());
        slice.len -= data.len();
        Ok(())
    }

    pub fn write<T: WritableToBytes>(&mut self, value: &T) -> DriverResult {
        value.write_to(self)
    }
}

/*──────────────────────────── local address space ───────────────────────*/

/// Access rights of a mapped region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

const PAGE_SIZE: usize = 0x1000;
const FIRST_MAPPING: usize = 0x1_0000;

struct Region {
    bytes: Vec<u8>,
    access: Access,
}

struct Mappings {
    regions: BTreeMap<usize, Region>,
    next: usize,
}

/// A caller address space made of regions mapped in this process.
///
/// Address 0 and the page-sized gaps between regions are never mapped, so a
/// copy that starts at a bad address or runs past the end of its region
/// faults just like it would against a real process.
pub struct LocalUserMemory {
    inner: Mutex<Mappings>,
}

impl Default for LocalUserMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalUserMemory {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Mappings { regions: BTreeMap::new(), next: FIRST_MAPPING }),
        }
    }

    fn mappings(&self) -> MutexGuard<'_, Mappings> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Maps a zeroed region of `len` bytes.
    pub fn map(&self, len: usize, access: Access) -> UserAddr {
        self.map_bytes(&vec![0u8; len], access)
    }

    /// Maps a region initialised with `bytes`.
    pub fn map_bytes(&self, bytes: &[u8], access: Access) -> UserAddr {
        let mut maps = self.mappings();
        let start = maps.next;
        let pages = bytes.len().div_ceil(PAGE_SIZE).max(1);
        // one unmapped guard page after every region
        maps.next = start + (pages + 1) * PAGE_SIZE;
        maps.regions.insert(start, Region { bytes: bytes.to_vec(), access });
        UserAddr(start)
    }

    /// Maps one value in native byte order.
    pub fn map_value<T: NativeBytes>(&self, value: T, access: Access) -> UserAddr {
        self.map_bytes(&value.to_bytes(), access)
    }

    /// Unmaps the region starting at `addr`; returns whether one was mapped.
    pub fn unmap(&self, addr: UserAddr) -> bool {
        self.mappings().regions.remove(&addr.get()).is_some()
    }

    /// Reads mapped bytes directly, bypassing access rights.
    pub fn peek(&self, addr: UserAddr, len: usize) -> Option<Vec<u8>> {
        let maps = self.mappings();
        let (region, off) = locate(&maps, addr, len)?;
        Some(region.bytes[off..off + len].to_vec())
    }

    /// Reads one value in native byte order, bypassing access rights.
    pub fn peek_value<T: NativeBytes>(&self, addr: UserAddr) -> Option<T> {
        self.peek(addr, size_of::<T>()).map(|b| T::from_bytes(&b))
    }
}

fn locate(maps: &Mappings, addr: UserAddr, len: usize) -> Option<(&Region, usize)> {
    let (start, region) = maps.regions.range(..=addr.get()).next_back()?;
    let off = addr.get() - start;
    let end = off.checked_add(len)?;
    (end <= region.bytes.len()).then_some((region, off))
}

impl UserMemory for LocalUserMemory {
    fn copy_in(&self, dst: &mut [u8], src: UserAddr) -> DriverResult {
        let maps = self.mappings();
        let (region, off) = locate(&maps, src, dst.len())
            .ok_or(DriverError::CopyFault { addr: src.get(), len: dst.len() })?;
        dst.copy_from_slice(&region.bytes[off..off + dst.len()]);
        Ok(())
    }

    fn copy_out(&self, dst: UserAddr, src: &[u8]) -> DriverResult {
        let mut maps = self.mappings();
        let (start, region) = maps
            .regions
            .range_mut(..=dst.get())
            .next_back()
            .ok_or(DriverError::CopyFault { addr: dst.get(), len: src.len() })?;
        let off = dst.get() - *start;
        match off.checked_add(src.len()) {
            Some(end) if end <= region.bytes.len() && region.access == Access::ReadWrite => {
                region.bytes[off..end].copy_from_slice(src);
                Ok(())
            }
            _ => Err(DriverError::CopyFault { addr: dst.get(), len: src.len() }),
        }
    }
}

/// Plain integers that [`LocalUserMemory`] can map and peek.
pub trait NativeBytes: Copy {
    fn to_bytes(self) -> Vec<u8>;
    fn from_bytes(bytes: &[u8]) -> Self;
}

macro_rules! impl_local_bytes {
    ($($t:ty),* $(,)?) => {$(
        impl NativeBytes for $t {
            fn to_bytes(self) -> Vec<u8> {
                self.to_ne_bytes().to_vec()
            }

            fn from_bytes(bytes: &[u8]) -> Self {
                let mut buf = [0u8; size_of::<$t>()];
                buf.copy_from_slice(&bytes[..size_of::<$t>()]);
                <$t>::from_ne_bytes(buf)
            }
        }
    )*};
}

impl_local_bytes!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_consumes_what_it_reads() {
        let mem = LocalUserMemory::new();
        let addr = mem.map_bytes(&[1, 2, 3, 4, 5, 6], Access::ReadOnly);

        let mut reader = UserSlice::new(&mem, addr, 6).reader();
        let mut head = [0u8; 4];
        reader.read_slice(&mut head).unwrap();
        assert_eq!(head, [1, 2, 3, 4]);
        assert_eq!(reader.len(), 2);

        let tail: u16 = reader.read().unwrap();
        assert_eq!(tail, u16::from_ne_bytes([5, 6]));
        assert!(reader.is_empty());
    }

    #[test]
    fn reading_past_the_slice_faults_without_copying() {
        let mem = LocalUserMemory::new();
        let addr = mem.map_value(7u64, Access::ReadWrite);

        let mut reader = UserSlice::new(&mem, addr, 4).reader();
        let err = reader.read::<u64>().unwrap_err();
        assert!(matches!(err, DriverError::CopyFault { len: 8, .. }), "{err}");
        assert_eq!(reader.len(), 4);
    }

    #[test]
    fn null_and_guard_pages_are_unmapped() {
        let mem = LocalUserMemory::new();
        let addr = mem.map(8, Access::ReadWrite);
        let mut buf = [0u8; 8];

        assert!(mem.copy_in(&mut buf, UserAddr::NULL).is_err());
        assert!(mem.copy_in(&mut buf, UserAddr::new(addr.get() + PAGE_SIZE)).is_err());
        // straddles the end of the region
        assert!(mem.copy_in(&mut buf, UserAddr::new(addr.get() + 4)).is_err());
        assert!(mem.copy_in(&mut buf, addr).is_ok());
    }

    #[test]
    fn read_only_regions_refuse_copy_out() {
        let mem = LocalUserMemory::new();
        let addr = mem.map_value(5i32, Access::ReadOnly);

        let mut writer = UserSlice::new(&mem, addr, 4).writer();
        assert!(writer.write(&9i32).is_err());
        assert_eq!(mem.peek_value::<i32>(addr), Some(5));
    }

    #[test]
    fn unmapped_regions_fault() {
        let mem = LocalUserMemory::new();
        let addr = mem.map(8, Access::ReadWrite);
        assert!(mem.unmap(addr));
        assert!(!mem.unmap(addr));
        assert!(mem.copy_out(addr, &[0; 8]).is_err());
        assert_eq!(mem.peek(addr, 8), None);
    }

    #[test]
    fn large_regions_do_not_overlap() {
        let mem = LocalUserMemory::new();
        let a = mem.map(3 * PAGE_SIZE, Access::ReadWrite);
        let b = mem.map(1, Access::ReadWrite);
        assert!(b.get() >= a.get() + 4 * PAGE_SIZE);
    }
}

//! Owned, bounds-checked cell storage.

use crate::error::{AccessType, CellFault, CellResult};
use crate::shared::{Exclusive, SharedArray};

/// A fixed-length array of integer cells.
///
/// Zero-initialised. Every access is bounds checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellArray {
    /// Backing storage.
    data: Vec<i32>,
}

impl CellArray {
    /// Create a zeroed array of `len` cells.
    #[must_use]
    pub fn new(len: usize) -> Self {
        CellArray { data: vec![0; len] }
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the array has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    fn check_bounds(&self, offset: usize, access: AccessType) -> CellResult<usize> {
        if offset >= self.data.len() {
            return Err(CellFault::OutOfBounds { offset, access });
        }
        Ok(offset)
    }

    /// Read one cell.
    ///
    /// # Errors
    ///
    /// Returns [`CellFault::OutOfBounds`] if the offset is past the end.
    #[inline]
    pub fn read(&self, offset: usize) -> CellResult<i32> {
        let offset = self.check_bounds(offset, AccessType::Read)?;
        Ok(self.data[offset])
    }

    /// Write one cell.
    ///
    /// # Errors
    ///
    /// Returns [`CellFault::OutOfBounds`] if the offset is past the end.
    #[inline]
    pub fn write(&mut self, offset: usize, value: i32) -> CellResult<()> {
        let offset = self.check_bounds(offset, AccessType::Write)?;
        self.data[offset] = value;
        Ok(())
    }

    /// Checksum of the contents (for determinism testing).
    #[must_use]
    pub fn checksum(&self) -> u64 {
        // FNV-1a over the little-endian bytes of each cell
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for cell in &self.data {
            for byte in cell.to_le_bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x0100_0000_01b3);
            }
        }
        hash
    }
}

impl SharedArray for CellArray {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn read_cell(&self, offset: usize) -> CellResult<i32> {
        self.read(offset)
    }

    fn write_cell(&mut self, offset: usize, value: i32) -> CellResult<()> {
        self.write(offset, value)
    }

    fn exclusive(&mut self) -> CellResult<Exclusive<'_>> {
        Ok(Exclusive::borrowed(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write() {
        let mut cells = CellArray::new(16);
        cells.write(0, -1).unwrap();
        cells.write(15, 42).unwrap();
        assert_eq!(cells.read(0).unwrap(), -1);
        assert_eq!(cells.read(15).unwrap(), 42);
        assert_eq!(cells.read(7).unwrap(), 0);
    }

    #[test]
    fn test_bounds_checking() {
        let mut cells = CellArray::new(4);
        assert_eq!(
            cells.read(4),
            Err(CellFault::OutOfBounds {
                offset: 4,
                access: AccessType::Read
            })
        );
        assert_eq!(
            cells.write(100, 1),
            Err(CellFault::OutOfBounds {
                offset: 100,
                access: AccessType::Write
            })
        );
    }

    #[test]
    fn test_checksum_tracks_contents() {
        let mut a = CellArray::new(8);
        let b = CellArray::new(8);
        assert_eq!(a.checksum(), b.checksum());
        a.write(3, 9).unwrap();
        assert_ne!(a.checksum(), b.checksum());
        a.write(3, 0).unwrap();
        assert_eq!(a.checksum(), b.checksum());
    }
}

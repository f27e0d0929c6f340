//! Memory-Mapped Frame Store
//!
//! Append-only file berisi frame `[i32 BE len][payload]` back-to-back,
//! format yang sama dengan frame di wire. Data di-mmap langsung, jadi:
//! - Read mengembalikan slice ke mmap region (tanpa copy)
//! - Persistence: header + frames tersimpan di file, bisa dibuka ulang
//!
//! Layout header (64 bytes, big-endian):
//!
//! | offset | field       |
//! |--------|-------------|
//! | 0      | magic `PRCLSTOR` |
//! | 8      | version u32 |
//! | 16     | capacity u64 |
//! | 24     | write pos u64 |
//! | 32     | frame count u64 |

use std::fs::OpenOptions;
use std::path::Path;

use memmap2::{MmapMut, MmapOptions};

use crate::error::StoreError;
use crate::network::HEADER_SIZE as FRAME_HEADER_SIZE;
use crate::protocol::{TypeDescriptor, Value, WireCodec};

const MAGIC: &[u8; 8] = b"PRCLSTOR";
const VERSION: u32 = 1;

/// Ukuran header file, frames dimulai setelahnya
pub const STORE_HEADER_SIZE: usize = 64;

const VERSION_AT: usize = 8;
const CAPACITY_AT: usize = 16;
const WRITE_POS_AT: usize = 24;
const FRAME_COUNT_AT: usize = 32;

/// Append-only frame log di atas mmap
pub struct FrameStore {
    mmap: MmapMut,
    capacity: usize,
    write_pos: usize,
    frame_count: u64,
}

impl FrameStore {
    /// Membuat atau membuka frame store
    ///
    /// # Arguments
    /// * `path` - Path ke file storage
    /// * `capacity` - Kapasitas area frame dalam bytes (harus power of 2)
    ///
    /// File yang sudah ada harus punya header valid dengan capacity yang sama.
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self, StoreError> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(StoreError::InvalidCapacity(capacity));
        }

        let path = path.as_ref();
        let total_size = STORE_HEADER_SIZE + capacity;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let existing = file.metadata()?.len();
        if existing == 0 {
            file.set_len(total_size as u64)?;
        } else if existing != total_size as u64 {
            return Err(StoreError::Corrupt(format!(
                "file is {} bytes, expected {}",
                existing, total_size
            )));
        }

        // SAFETY: file dibuka read/write dan panjangnya sudah total_size
        let mmap = unsafe { MmapOptions::new().len(total_size).map_mut(&file)? };

        let mut store = Self {
            mmap,
            capacity,
            write_pos: 0,
            frame_count: 0,
        };

        if existing == 0 {
            store.init_header();
            log::debug!("created frame store {} ({} bytes)", path.display(), capacity);
        } else {
            store.load_header()?;
            log::debug!(
                "opened frame store {} ({} frames, {} bytes used)",
                path.display(),
                store.frame_count,
                store.write_pos
            );
        }

        Ok(store)
    }

    fn init_header(&mut self) {
        let header = &mut self.mmap[..STORE_HEADER_SIZE];
        header.fill(0);
        header[..MAGIC.len()].copy_from_slice(MAGIC);
        header[VERSION_AT..VERSION_AT + 4].copy_from_slice(&VERSION.to_be_bytes());
        header[CAPACITY_AT..CAPACITY_AT + 8].copy_from_slice(&(self.capacity as u64).to_be_bytes());
        self.store_positions();
    }

    fn load_header(&mut self) -> Result<(), StoreError> {
        if &self.mmap[..MAGIC.len()] != MAGIC {
            return Err(StoreError::Corrupt("bad magic".into()));
        }

        let version = self.header_u32(VERSION_AT);
        if version != VERSION {
            return Err(StoreError::Corrupt(format!("unsupported version {}", version)));
        }

        let capacity = self.header_u64(CAPACITY_AT);
        if capacity != self.capacity as u64 {
            return Err(StoreError::Corrupt(format!(
                "capacity {} does not match requested {}",
                capacity, self.capacity
            )));
        }

        let write_pos = self.header_u64(WRITE_POS_AT);
        if write_pos > capacity {
            return Err(StoreError::Corrupt(format!("write position {} past capacity", write_pos)));
        }

        self.write_pos = write_pos as usize;
        self.frame_count = self.header_u64(FRAME_COUNT_AT);
        Ok(())
    }

    fn header_u32(&self, at: usize) -> u32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.mmap[at..at + 4]);
        u32::from_be_bytes(raw)
    }

    fn header_u64(&self, at: usize) -> u64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.mmap[at..at + 8]);
        u64::from_be_bytes(raw)
    }

    fn store_positions(&mut self) {
        let write_pos = (self.write_pos as u64).to_be_bytes();
        let frame_count = self.frame_count.to_be_bytes();
        self.mmap[WRITE_POS_AT..WRITE_POS_AT + 8].copy_from_slice(&write_pos);
        self.mmap[FRAME_COUNT_AT..FRAME_COUNT_AT + 8].copy_from_slice(&frame_count);
    }

    /// Append satu frame
    ///
    /// Returns offset frame (relatif ke area frame) untuk `read`.
    pub fn append(&mut self, payload: &[u8]) -> Result<usize, StoreError> {
        let len = i32::try_from(payload.len()).map_err(|_| StoreError::Full {
            needed: payload.len(),
            available: self.available(),
        })?;

        let needed = FRAME_HEADER_SIZE + payload.len();
        if needed > self.available() {
            return Err(StoreError::Full {
                needed,
                available: self.available(),
            });
        }

        let offset = self.write_pos;
        let start = STORE_HEADER_SIZE + offset;
        self.mmap[start..start + FRAME_HEADER_SIZE].copy_from_slice(&len.to_be_bytes());
        self.mmap[start + FRAME_HEADER_SIZE..start + needed].copy_from_slice(payload);

        self.write_pos += needed;
        self.frame_count += 1;
        self.store_positions();

        log::trace!("appended {} byte frame at {}", payload.len(), offset);
        Ok(offset)
    }

    /// Payload frame di `offset` (zero-copy slice ke mmap region)
    pub fn read(&self, offset: usize) -> Result<&[u8], StoreError> {
        self.frame_at(offset).map(|(payload, _)| payload)
    }

    /// Returns (payload, offset frame berikutnya)
    fn frame_at(&self, offset: usize) -> Result<(&[u8], usize), StoreError> {
        let header_end = offset
            .checked_add(FRAME_HEADER_SIZE)
            .filter(|&end| end <= self.write_pos)
            .ok_or(StoreError::BadOffset(offset))?;

        let frames = &self.mmap[STORE_HEADER_SIZE..STORE_HEADER_SIZE + self.write_pos];
        let mut raw = [0u8; FRAME_HEADER_SIZE];
        raw.copy_from_slice(&frames[offset..header_end]);
        let len = i32::from_be_bytes(raw);

        let end = usize::try_from(len)
            .ok()
            .and_then(|len| header_end.checked_add(len))
            .filter(|&end| end <= self.write_pos)
            .ok_or_else(|| StoreError::Corrupt(format!("frame at {} declares length {}", offset, len)))?;

        Ok((&frames[header_end..end], end))
    }

    /// Iterate semua frame dari awal
    pub fn iter(&self) -> Frames<'_> {
        Frames {
            store: self,
            offset: 0,
        }
    }

    /// Encode `value` lalu append sebagai satu frame
    pub fn append_value(&mut self, codec: &WireCodec, value: &Value, descriptor: &TypeDescriptor) -> crate::Result<usize> {
        let payload = codec.encode(value, descriptor)?;
        Ok(self.append(&payload)?)
    }

    /// Read frame di `offset` lalu decode
    pub fn read_value(&self, codec: &WireCodec, offset: usize, descriptor: &TypeDescriptor) -> crate::Result<Value> {
        let payload = self.read(offset)?;
        Ok(codec.decode_exact(payload, descriptor)?)
    }

    /// Kosongkan store (data lama tidak di-zero)
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.frame_count = 0;
        self.store_positions();
    }

    /// Sync ke disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.mmap.flush()?;
        Ok(())
    }

    #[inline(always)]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Bytes terpakai di area frame
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.write_pos
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.write_pos == 0
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline(always)]
    pub fn available(&self) -> usize {
        self.capacity - self.write_pos
    }
}

impl std::fmt::Debug for FrameStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameStore")
            .field("capacity", &self.capacity)
            .field("write_pos", &self.write_pos)
            .field("frame_count", &self.frame_count)
            .finish()
    }
}

/// Iterator atas frame di `FrameStore`, yields `(offset, payload)`
#[derive(Debug)]
pub struct Frames<'a> {
    store: &'a FrameStore,
    offset: usize,
}

impl<'a> Iterator for Frames<'a> {
    type Item = Result<(usize, &'a [u8]), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.store.write_pos {
            return None;
        }
        let offset = self.offset;
        match self.store.frame_at(offset) {
            Ok((payload, next)) => {
                self.offset = next;
                Some(Ok((offset, payload)))
            }
            Err(e) => {
                // stop setelah error pertama
                self.offset = self.store.write_pos;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_append_and_read() {
        let dir = tempdir().unwrap();
        let mut store = FrameStore::open(dir.path().join("frames.dat"), 4096).unwrap();

        let a = store.append(b"Hello").unwrap();
        let b = store.append(b"").unwrap();
        let c = store.append(b"parcel").unwrap();

        assert_eq!(a, 0);
        assert_eq!(b, 9);
        assert_eq!(store.read(a).unwrap(), b"Hello");
        assert_eq!(store.read(b).unwrap(), b"");
        assert_eq!(store.read(c).unwrap(), b"parcel");
        assert_eq!(store.frame_count(), 3);
        assert_eq!(store.len(), 9 + 4 + 10);
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("persist.dat");

        {
            let mut store = FrameStore::open(&path, 4096).unwrap();
            store.append(b"Persistent data").unwrap();
            store.append(b"second").unwrap();
            store.flush().unwrap();
        }

        {
            let store = FrameStore::open(&path, 4096).unwrap();
            assert_eq!(store.frame_count(), 2);
            let frames: Vec<_> = store.iter().map(|f| f.unwrap().1.to_vec()).collect();
            assert_eq!(frames, vec![b"Persistent data".to_vec(), b"second".to_vec()]);
        }
    }

    #[test]
    fn test_full() {
        let dir = tempdir().unwrap();
        let mut store = FrameStore::open(dir.path().join("small.dat"), 16).unwrap();

        store.append(&[1; 8]).unwrap();
        assert!(matches!(
            store.append(&[2; 1]),
            Err(StoreError::Full {
                needed: 5,
                available: 4
            })
        ));
        // frame kosong masih muat
        store.append(&[]).unwrap();
        assert_eq!(store.available(), 0);
    }

    #[test]
    fn test_invalid_capacity() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            FrameStore::open(dir.path().join("x.dat"), 1000),
            Err(StoreError::InvalidCapacity(1000))
        ));
    }

    #[test]
    fn test_capacity_mismatch_on_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cap.dat");
        FrameStore::open(&path, 4096).unwrap();
        assert!(matches!(FrameStore::open(&path, 8192), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.dat");
        std::fs::write(&path, vec![0xAB; STORE_HEADER_SIZE + 64]).unwrap();
        assert!(matches!(FrameStore::open(&path, 64), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_bad_offset() {
        let dir = tempdir().unwrap();
        let mut store = FrameStore::open(dir.path().join("off.dat"), 256).unwrap();
        store.append(b"abc").unwrap();
        assert!(matches!(store.read(7), Err(StoreError::BadOffset(7))));
        assert!(matches!(store.read(usize::MAX), Err(StoreError::BadOffset(_))));
    }

    #[test]
    fn test_clear() {
        let dir = tempdir().unwrap();
        let mut store = FrameStore::open(dir.path().join("clear.dat"), 256).unwrap();
        store.append(b"abc").unwrap();
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.iter().count(), 0);
    }
}

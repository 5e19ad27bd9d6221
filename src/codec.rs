//! Record and block layout.

/// Size of a single record in bytes.
pub const RECORD_SIZE: usize = 4;
/// Size of the key prefix of a record in bytes.
pub const KEY_SIZE: usize = 2;
/// Size of the cache I/O unit in bytes.
pub const BLOCK_SIZE: usize = 4096;
/// Number of records held by a single block.
pub const RECORDS_PER_BLOCK: u64 = (BLOCK_SIZE / RECORD_SIZE) as u64;

/// Sortable record key.
pub type Key = i16;
/// Raw record bytes.
pub type Record = [u8; RECORD_SIZE];
/// Block number within the backing file.
pub type BlockId = u64;

/// Location of a record inside the block cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLocation {
    /// Block holding the record.
    pub block_id: BlockId,
    /// Byte offset of the record inside the block.
    pub offset: usize,
}

impl RecordLocation {
    /// Resolves a logical record index.
    pub fn of(index: u64) -> Self {
        RecordLocation {
            block_id: index / RECORDS_PER_BLOCK,
            offset: (index % RECORDS_PER_BLOCK) as usize * RECORD_SIZE,
        }
    }
}

/// Decodes the big-endian signed key stored at `offset`.
pub fn extract_key(bytes: &[u8], offset: usize) -> Key {
    Key::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

/// Byte position of a block in the backing file.
pub fn block_offset(block_id: BlockId) -> u64 {
    block_id * BLOCK_SIZE as u64
}

/// Single cached block.
///
/// Only the first `len` bytes exist in the backing file, the rest is zero filler.
#[derive(Debug, Clone)]
pub struct Block {
    id: BlockId,
    bytes: Box<[u8; BLOCK_SIZE]>,
    len: usize,
    dirty: bool,
}

impl Block {
    /// Creates a zero-filled block with no bytes backed by the file.
    pub fn empty(id: BlockId) -> Self {
        Block {
            id,
            bytes: Box::new([0; BLOCK_SIZE]),
            len: 0,
            dirty: false,
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Number of bytes backed by the file.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whole block buffer, including filler past `len`.
    pub fn buffer_mut(&mut self) -> &mut [u8; BLOCK_SIZE] {
        &mut self.bytes
    }

    /// Sets the number of bytes backed by the file after a load.
    pub fn set_len(&mut self, len: usize) {
        debug_assert!(len <= BLOCK_SIZE);
        self.len = len;
    }

    /// Bytes to be written back to the file.
    pub fn backed_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn key_at(&self, offset: usize) -> Key {
        extract_key(&self.bytes[..], offset)
    }

    pub fn record_at(&self, offset: usize) -> Record {
        let mut record = [0; RECORD_SIZE];
        record.copy_from_slice(&self.bytes[offset..offset + RECORD_SIZE]);
        record
    }

    /// Overwrites the record at `offset` and marks the block dirty.
    pub fn put_record(&mut self, offset: usize, record: &Record) {
        self.bytes[offset..offset + RECORD_SIZE].copy_from_slice(record);
        self.len = self.len.max(offset + RECORD_SIZE);
        self.dirty = true;
    }
}

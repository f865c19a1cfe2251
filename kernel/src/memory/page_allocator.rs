//! Page allocator
//!
//! # Design
//! - The arena is `total_bytes / page_size` pages, each owning its own buffer
//! - Free pages live on a LIFO stack, so the most recently freed pages are
//!   handed out first
//! - A block is an ordered list of page indices, `ceil(size / page_size)` long
//! - Freeing zeroes every page before it returns to the free stack
//!
//! # Invariants
//! - A page is on the free stack iff its `allocated` flag is false
//! - An allocated page belongs to exactly one live block
//! - `used + free == total` pages at all times

use std::collections::BTreeMap;
use std::time::SystemTime;

use super::{BlockId, MemoryError, Result};
use crate::objects::Pid;

/// One page of the arena
#[derive(Debug, Clone)]
pub struct Page {
    pub index: usize,
    pub allocated: bool,
    pub block: Option<BlockId>,
    pub owner: Option<Pid>,
    data: Vec<u8>,
}

impl Page {
    fn new(index: usize, page_size: usize) -> Self {
        Self {
            index,
            allocated: false,
            block: None,
            owner: None,
            data: vec![0; page_size],
        }
    }

    /// Page contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A live allocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    /// Requested size in bytes
    pub size: usize,
    /// Page indices, in allocation order
    pub pages: Vec<usize>,
    pub owner: Option<Pid>,
    pub allocated_at: SystemTime,
}

/// Page counters of a [`MemoryInfo`] snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCounts {
    pub total: usize,
    pub used: usize,
    pub free: usize,
}

/// Usage snapshot, byte totals are page counts times page size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInfo {
    pub total: usize,
    pub used: usize,
    pub free: usize,
    pub pages: PageCounts,
}

/// Fixed-arena page allocator
#[derive(Debug)]
pub struct PageAllocator {
    page_size: usize,
    pages: Vec<Page>,
    free_stack: Vec<usize>,
    blocks: BTreeMap<BlockId, Block>,
    next_block: BlockId,
}

impl PageAllocator {
    /// Create an allocator over `total_bytes / page_size` pages
    ///
    /// A trailing partial page is not part of the arena.
    pub fn new(total_bytes: usize, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let total_pages = total_bytes / page_size;
        let pages = (0..total_pages).map(|i| Page::new(i, page_size)).collect();
        // Reverse so that page 0 sits on top of the stack
        let free_stack = (0..total_pages).rev().collect();

        log::debug!(
            "[memory] Arena initialized: {} pages of {} bytes",
            total_pages,
            page_size
        );

        Self {
            page_size,
            pages,
            free_stack,
            blocks: BTreeMap::new(),
            next_block: 1,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn free_pages(&self) -> usize {
        self.free_stack.len()
    }

    /// Allocate enough pages to hold `size` bytes
    ///
    /// # Arguments
    /// - `size`: Requested size in bytes (0 yields an empty block)
    /// - `owner`: Optional owning process
    ///
    /// # Returns
    /// The new block's id
    ///
    /// # Errors
    /// `OutOfMemory` if fewer pages are free than needed; nothing is
    /// allocated in that case.
    pub fn allocate(&mut self, size: usize, owner: Option<Pid>) -> Result<BlockId> {
        let needed = size.div_ceil(self.page_size);
        if needed > self.free_stack.len() {
            log::warn!(
                "[memory] Allocation of {} bytes refused: {} pages needed, {} free",
                size,
                needed,
                self.free_stack.len()
            );
            return Err(MemoryError::OutOfMemory {
                needed,
                available: self.free_stack.len(),
            });
        }

        let id = self.next_block;
        self.next_block += 1;

        let split = self.free_stack.len() - needed;
        let mut taken = self.free_stack.split_off(split);
        taken.reverse();

        for &index in &taken {
            let page = &mut self.pages[index];
            page.allocated = true;
            page.block = Some(id);
            page.owner = owner;
        }

        self.blocks.insert(
            id,
            Block {
                id,
                size,
                pages: taken,
                owner,
                allocated_at: SystemTime::now(),
            },
        );

        log::debug!("[memory] Block {} allocated: {} bytes, {} pages", id, size, needed);
        Ok(id)
    }

    /// Free a block, zeroing its pages
    ///
    /// # Errors
    /// `UnknownBlock` if `id` is not a live block (including a double free)
    pub fn free(&mut self, id: BlockId) -> Result<()> {
        let block = self
            .blocks
            .remove(&id)
            .ok_or(MemoryError::UnknownBlock { block: id })?;

        for &index in &block.pages {
            let page = &mut self.pages[index];
            page.data.fill(0);
            page.allocated = false;
            page.block = None;
            page.owner = None;
            self.free_stack.push(index);
        }

        log::debug!("[memory] Block {} freed: {} pages returned", id, block.pages.len());
        Ok(())
    }

    /// Current usage
    pub fn info(&self) -> MemoryInfo {
        let total = self.pages.len();
        let free = self.free_stack.len();
        let used = total - free;
        MemoryInfo {
            total: total * self.page_size,
            used: used * self.page_size,
            free: free * self.page_size,
            pages: PageCounts { total, used, free },
        }
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    /// Live blocks tagged with `owner`
    pub fn blocks_owned_by(&self, owner: Pid) -> Vec<BlockId> {
        self.blocks
            .values()
            .filter(|b| b.owner == Some(owner))
            .map(|b| b.id)
            .collect()
    }

    /// Copy `bytes` into a block starting at `offset`
    ///
    /// The range may span several pages and may run past the requested size,
    /// up to the block's page capacity.
    ///
    /// # Errors
    /// `UnknownBlock`, or `OutOfBounds` if the range exceeds the capacity
    pub fn write(&mut self, id: BlockId, offset: usize, bytes: &[u8]) -> Result<()> {
        let page_size = self.page_size;
        let block = self.blocks.get(&id).ok_or(MemoryError::UnknownBlock { block: id })?;
        check_range(block, page_size, offset, bytes.len())?;

        let mut cursor = offset;
        let mut remaining = bytes;
        while !remaining.is_empty() {
            let page_index = block.pages[cursor / page_size];
            let within = cursor % page_size;
            let n = remaining.len().min(page_size - within);
            self.pages[page_index].data[within..within + n].copy_from_slice(&remaining[..n]);
            remaining = &remaining[n..];
            cursor += n;
        }
        Ok(())
    }

    /// Read `len` bytes of a block starting at `offset`
    ///
    /// # Errors
    /// `UnknownBlock`, or `OutOfBounds` if the range exceeds the capacity
    pub fn read(&self, id: BlockId, offset: usize, len: usize) -> Result<Vec<u8>> {
        let block = self.blocks.get(&id).ok_or(MemoryError::UnknownBlock { block: id })?;
        check_range(block, self.page_size, offset, len)?;

        let mut out = Vec::with_capacity(len);
        let mut cursor = offset;
        while out.len() < len {
            let page = &self.pages[block.pages[cursor / self.page_size]];
            let within = cursor % self.page_size;
            let n = (len - out.len()).min(self.page_size - within);
            out.extend_from_slice(&page.data[within..within + n]);
            cursor += n;
        }
        Ok(out)
    }
}

fn check_range(block: &Block, page_size: usize, offset: usize, len: usize) -> Result<()> {
    let capacity = block.pages.len() * page_size;
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(MemoryError::OutOfBounds {
            block: block.id,
            offset,
            len,
            capacity,
        }),
    }
}

//! A byte-range cache for locally written file data, used when the
//! filesystem is configured for write-behind.

/// Durability of one cached range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Read from the server or confirmed committed.
    Stable,
    /// Written to the server but possibly not yet on stable storage.
    Unstable,
    /// Not yet written to the server.
    Dirty,
}

#[derive(Debug, Clone)]
struct Block {
    state: BlockState,
    start: u64,
    end: u64,
    data: Vec<u8>,
}

/// An ordered list of non-overlapping byte ranges. Insertion clips or
/// splits whatever it overlaps; reads merge adjacent ranges forward so
/// a request spanning several cached writes comes back as one segment.
#[derive(Debug, Default)]
pub struct DataCache {
    blocks: Vec<Block>,
}

impl DataCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns cached data overlapping `[offset, offset+count)`. The
    /// segment starts at `offset` but may be shorter than `count`;
    /// `None` when the cache holds nothing at `offset`.
    pub fn get(&mut self, offset: u64, count: u32) -> Option<Vec<u8>> {
        let start = offset;
        let mut end = offset + u64::from(count);

        let mut index = None;
        for (i, block) in self.blocks.iter().enumerate() {
            if block.start >= end {
                break;
            }
            if block.start > start {
                return None;
            }
            if block.end > start {
                index = Some(i);
                break;
            }
        }
        let index = index?;

        // Merge any directly adjacent following blocks into this one so
        // the whole span can be served.
        while self.blocks[index].end < end {
            let block_end = self.blocks[index].end;
            let Some(next) = self.blocks.get(index + 1) else {
                break;
            };
            if next.start != block_end {
                break;
            }
            let next = self.blocks.remove(index + 1);
            let block = &mut self.blocks[index];
            block.data.extend_from_slice(&next.data);
            block.end = next.end;
            // The merged block keeps the weaker durability.
            if matches!(next.state, BlockState::Dirty) {
                block.state = BlockState::Dirty;
            }
        }

        let block = &self.blocks[index];
        end = end.min(block.end);
        let from = usize::try_from(start - block.start).ok()?;
        let to = usize::try_from(end - block.start).ok()?;
        Some(block.data[from..to].to_vec())
    }

    /// Inserts a range, clipping or splitting any overlap.
    pub fn add(&mut self, state: BlockState, offset: u64, data: Vec<u8>) {
        let new = Block {
            state,
            start: offset,
            end: offset + data.len() as u64,
            data,
        };

        let mut i = 0;
        // Skip blocks entirely before the new one.
        while i < self.blocks.len() && self.blocks[i].end <= new.start {
            i += 1;
        }

        while i < self.blocks.len() && self.blocks[i].start < new.end {
            let block = &mut self.blocks[i];
            if block.start < new.start {
                if block.end <= new.end {
                    // Overlaps our head: clip its tail to our start.
                    let keep = usize::try_from(new.start - block.start).unwrap_or(0);
                    block.data.truncate(keep);
                    block.end = new.start;
                    i += 1;
                } else {
                    // Contains us entirely: split it around us.
                    let head_len = usize::try_from(new.start - block.start).unwrap_or(0);
                    let tail_from = usize::try_from(new.end - block.start).unwrap_or(0);
                    let tail = Block {
                        state: block.state,
                        start: new.end,
                        end: block.end,
                        data: block.data[tail_from..].to_vec(),
                    };
                    block.data.truncate(head_len);
                    block.end = new.start;
                    self.blocks.insert(i + 1, new);
                    self.blocks.insert(i + 2, tail);
                    return;
                }
            } else if block.end <= new.end {
                // Entirely covered: discard.
                self.blocks.remove(i);
            } else {
                // Overlaps our tail: clip its head to our end.
                let from = usize::try_from(new.end - block.start).unwrap_or(0);
                block.data.drain(..from);
                block.start = new.end;
                self.blocks.insert(i, new);
                return;
            }
        }
        self.blocks.insert(i, new);
    }

    /// Visits every cached range in ascending order.
    pub fn apply(&self, mut f: impl FnMut(BlockState, u64, u64, &[u8])) {
        for block in &self.blocks {
            debug_assert_eq!(block.data.len() as u64, block.end - block.start);
            f(block.state, block.start, block.end, &block.data);
        }
    }

    /// Re-labels every cached range, e.g. after a COMMIT confirmed all
    /// unstable writes.
    pub fn set_all_state(&mut self, state: BlockState) {
        for block in &mut self.blocks {
            block.state = state;
        }
    }

    /// True if any range still needs writing to the server.
    #[must_use]
    pub fn has_dirty(&self) -> bool {
        self.blocks
            .iter()
            .any(|b| matches!(b.state, BlockState::Dirty))
    }

    /// Drops everything at or past `size` and clips a range straddling
    /// it.
    pub fn truncate(&mut self, size: u64) {
        while let Some(last) = self.blocks.last() {
            if last.start < size {
                break;
            }
            self.blocks.pop();
        }
        if let Some(last) = self.blocks.last_mut() {
            if last.end > size {
                let keep = usize::try_from(size - last.start).unwrap_or(0);
                last.data.truncate(keep);
                last.end = size;
            }
        }
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

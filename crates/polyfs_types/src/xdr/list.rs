use std::io::{Read, Write};

use super::{Pack, Result, Unpack};

/// An XDR optional-data chain: each element is preceded by a `TRUE`
/// discriminant and the sequence is terminated by `FALSE`. This is how
/// NFSv3 encodes directory entry lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct List<T>(pub Vec<T>);

impl<T> Default for List<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> List<T> {
    #[must_use]
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }
}

impl<T: Pack> Pack for List<T> {
    fn packed_size(&self) -> usize {
        self.0
            .iter()
            .map(|item| 4 + item.packed_size())
            .sum::<usize>()
            + 4
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        let mut written = 0;
        for item in &self.0 {
            written += true.pack(out)?;
            written += item.pack(out)?;
        }
        written += false.pack(out)?;
        Ok(written)
    }
}

impl<T: Unpack> Unpack for List<T> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let mut items = Vec::new();
        let mut read = 0;
        loop {
            let (more, n) = bool::unpack(input)?;
            read += n;
            if !more {
                break;
            }
            let (item, n) = T::unpack(input)?;
            read += n;
            items.push(item);
        }
        Ok((Self(items), read))
    }
}

/// A [`List`] builder that rejects items which would push the encoded
/// size past a byte budget; used to honour reply-size limits such as
/// READDIRPLUS `maxcount`.
pub struct BoundedList<T> {
    list: List<T>,
    current_size: usize,
    max_size: usize,
}

impl<T: Pack> BoundedList<T> {
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        let list = List(Vec::new());
        let current_size = list.packed_size();
        Self {
            list,
            current_size,
            max_size,
        }
    }

    /// Adds an item, or hands it back if it does not fit.
    pub fn try_push(&mut self, item: T) -> std::result::Result<(), T> {
        let item_size = item.packed_size() + 4;
        if self.current_size + item_size > self.max_size {
            return Err(item);
        }
        self.list.0.push(item);
        self.current_size += item_size;
        Ok(())
    }

    #[must_use]
    pub fn into_inner(self) -> List<T> {
        self.list
    }
}

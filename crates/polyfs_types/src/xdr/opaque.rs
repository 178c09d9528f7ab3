use std::borrow::Cow;
use std::io::{Read, Write};

use super::util::{add_padding, get_padding, zero_padding};
use super::{Error, Pack, Result, Unpack};

/// Variable-length opaque data, encoded as a length prefix, the bytes and
/// zero padding up to the 4-byte boundary.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Opaque<'a>(pub Cow<'a, [u8]>);

impl Opaque<'static> {
    #[must_use]
    pub const fn owned(data: Vec<u8>) -> Self {
        Self(Cow::Owned(data))
    }
}

impl<'a> Opaque<'a> {
    #[must_use]
    pub const fn borrowed(data: &'a [u8]) -> Self {
        Self(Cow::Borrowed(data))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Extracts the owned data, cloning if it is borrowed.
    #[must_use]
    pub fn into_owned(self) -> Vec<u8> {
        self.0.into_owned()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Clones the bytes into an `Opaque` with a `'static` lifetime.
    #[must_use]
    pub fn clone_to_owned(&self) -> Opaque<'static> {
        Opaque(Cow::Owned(self.0.to_vec()))
    }
}

impl Pack for Opaque<'_> {
    fn packed_size(&self) -> usize {
        4 + add_padding(self.0.len())
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        let len = u32::try_from(self.0.len()).map_err(|_| Error::ObjectTooLarge(self.0.len()))?;
        let mut written = len.pack(out)?;
        out.write_all(&self.0)?;
        written += self.0.len();
        let pad = zero_padding(self.0.len());
        out.write_all(pad)?;
        Ok(written + pad.len())
    }
}

// Decoding always produces owned bytes, which satisfies any lifetime.
impl Unpack for Opaque<'_> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (len, mut read) = u32::unpack(input)?;
        let len = len as usize;

        let mut data = vec![0u8; len];
        input.read_exact(&mut data)?;
        read += len;

        let pad = get_padding(len);
        if pad > 0 {
            let mut scratch = [0u8; 4];
            input.read_exact(&mut scratch[..pad])?;
            read += pad;
        }

        Ok((Self(Cow::Owned(data)), read))
    }
}

impl AsRef<[u8]> for Opaque<'_> {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl From<Vec<u8>> for Opaque<'static> {
    fn from(data: Vec<u8>) -> Self {
        Self(Cow::Owned(data))
    }
}

impl<'a> From<&'a [u8]> for Opaque<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self(Cow::Borrowed(data))
    }
}

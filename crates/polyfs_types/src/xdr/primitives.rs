use std::io::{Read, Write};

use super::opaque::Opaque;
use super::util::{get_padding, zero_padding};
use super::{Error, Pack, Result, Unpack};

macro_rules! int_codec {
    ($ty:ty, $len:expr) => {
        impl Pack for $ty {
            fn packed_size(&self) -> usize {
                $len
            }

            fn pack(&self, out: &mut impl Write) -> Result<usize> {
                out.write_all(&self.to_be_bytes())?;
                Ok($len)
            }
        }

        impl Unpack for $ty {
            fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
                let mut bytes = [0u8; $len];
                input.read_exact(&mut bytes)?;
                Ok((Self::from_be_bytes(bytes), $len))
            }
        }
    };
}

int_codec!(u32, 4);
int_codec!(i32, 4);
int_codec!(u64, 8);
int_codec!(i64, 8);

impl Pack for bool {
    fn packed_size(&self) -> usize {
        4
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        u32::from(*self).pack(out)
    }
}

impl Unpack for bool {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (value, read) = u32::unpack(input)?;
        match value {
            0 => Ok((false, read)),
            1 => Ok((true, read)),
            _ => Err(Error::InvalidEnumValue(value)),
        }
    }
}

// Fixed-length opaque data, padded to the 4-byte boundary.
impl<const N: usize> Pack for [u8; N] {
    fn packed_size(&self) -> usize {
        N + get_padding(N)
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        out.write_all(self)?;
        let pad = zero_padding(N);
        out.write_all(pad)?;
        Ok(N + pad.len())
    }
}

impl<const N: usize> Unpack for [u8; N] {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let mut bytes = [0u8; N];
        input.read_exact(&mut bytes)?;
        let pad = get_padding(N);
        if pad > 0 {
            let mut scratch = [0u8; 4];
            input.read_exact(&mut scratch[..pad])?;
        }
        Ok((bytes, N + pad))
    }
}

// Variable-length opaque data.
impl Pack for Vec<u8> {
    fn packed_size(&self) -> usize {
        Opaque::borrowed(self).packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        Opaque::borrowed(self).pack(out)
    }
}

impl Unpack for Vec<u8> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (opaque, read) = Opaque::unpack(input)?;
        Ok((opaque.into_owned(), read))
    }
}

// Counted array of unsigned integers (e.g. RPC auxiliary gids).
impl Pack for Vec<u32> {
    fn packed_size(&self) -> usize {
        4 + self.len() * 4
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        let mut written = u32::try_from(self.len())
            .map_err(|_| Error::ObjectTooLarge(self.len()))?
            .pack(out)?;
        for item in self {
            written += item.pack(out)?;
        }
        Ok(written)
    }
}

impl Unpack for Vec<u32> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (len, mut read) = u32::unpack(input)?;
        let mut items = Self::with_capacity(len as usize);
        for _ in 0..len {
            let (item, n) = u32::unpack(input)?;
            read += n;
            items.push(item);
        }
        Ok((items, read))
    }
}

// Strings are opaque bytes that must hold UTF-8.
impl Pack for String {
    fn packed_size(&self) -> usize {
        Opaque::borrowed(self.as_bytes()).packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        Opaque::borrowed(self.as_bytes()).pack(out)
    }
}

impl Unpack for String {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (bytes, read) = Vec::<u8>::unpack(input)?;
        Ok((Self::from_utf8(bytes)?, read))
    }
}

// XDR optional-data: a boolean discriminant followed by the value.
impl<T: Pack> Pack for Option<T> {
    fn packed_size(&self) -> usize {
        4 + self.as_ref().map_or(0, Pack::packed_size)
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        match self {
            Some(value) => Ok(true.pack(out)? + value.pack(out)?),
            None => false.pack(out),
        }
    }
}

impl<T: Unpack> Unpack for Option<T> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (present, mut read) = bool::unpack(input)?;
        if !present {
            return Ok((None, read));
        }
        let (value, n) = T::unpack(input)?;
        read += n;
        Ok((Some(value), read))
    }
}

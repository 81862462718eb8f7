use crate::codec::{Decode, Encode, Error, FixedSize};

//
// Implementations for primitives
//
impl FixedSize for u8 {
    const SIZE: usize = 1;
}

impl FixedSize for i8 {
    const SIZE: usize = 1;
}

impl FixedSize for u16 {
    const SIZE: usize = 2;
}

impl FixedSize for u32 {
    const SIZE: usize = 4;
}

impl FixedSize for bool {
    const SIZE: usize = 1;
}

fn fixed<const N: usize>(src: &[u8]) -> Result<[u8; N], Error> {
    src.get(..N)
        .and_then(|s| s.try_into().ok())
        .ok_or(Error::InsufficientSpace)
}

impl Decode<'_> for u8 {
    fn decode(src: &[u8]) -> Result<Self, Error> {
        Ok(fixed::<1>(src)?[0])
    }
}

impl Decode<'_> for i8 {
    fn decode(src: &[u8]) -> Result<Self, Error> {
        Ok(i8::from_le_bytes(fixed(src)?))
    }
}

impl Decode<'_> for u16 {
    fn decode(src: &[u8]) -> Result<Self, Error> {
        Ok(u16::from_le_bytes(fixed(src)?))
    }
}

impl Decode<'_> for u32 {
    fn decode(src: &[u8]) -> Result<Self, Error> {
        Ok(u32::from_le_bytes(fixed(src)?))
    }
}

impl Decode<'_> for bool {
    fn decode(src: &[u8]) -> Result<Self, Error> {
        match fixed::<1>(src)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(Error::InvalidValue),
        }
    }
}

impl Encode for u8 {
    fn encode(&self, dest: &mut [u8]) -> Result<(), Error> {
        dest[0] = *self;
        Ok(())
    }
}

impl Encode for i8 {
    fn encode(&self, dest: &mut [u8]) -> Result<(), Error> {
        dest.copy_from_slice(&self.to_le_bytes()[..]);
        Ok(())
    }
}

impl Encode for u16 {
    fn encode(&self, dest: &mut [u8]) -> Result<(), Error> {
        dest.copy_from_slice(&self.to_le_bytes()[..]);
        Ok(())
    }
}

impl Encode for u32 {
    fn encode(&self, dest: &mut [u8]) -> Result<(), Error> {
        dest.copy_from_slice(&self.to_le_bytes()[..]);
        Ok(())
    }
}

impl Encode for bool {
    fn encode(&self, dest: &mut [u8]) -> Result<(), Error> {
        dest[0] = *self as u8;
        Ok(())
    }
}

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Error, ErrorKind, Result};

/// Utility trait for serializing data inside class files
///
/// Java class files have some peculiarities that make it useful to define an extra trait (instead
/// of just using `serde`):
///
///   - tags are always `u8`
///   - when serializing a sequence, the length of the sequence is usually `u16`
///
pub trait Serialize: Sized {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;
}

/// Counterpart of [`Serialize`], used when reading class files back in
pub trait Deserialize: Sized {
    /// Deserialize construct from a binary input stream
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self>;
}

macro_rules! numeric_format {
    ($typ:ty, $write:ident, $read:ident) => {
        impl Serialize for $typ {
            fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
                writer.$write::<BigEndian>(*self)
            }
        }

        impl Deserialize for $typ {
            fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
                reader.$read::<BigEndian>()
            }
        }
    };
}

numeric_format!(u16, write_u16, read_u16);
numeric_format!(u32, write_u32, read_u32);
numeric_format!(u64, write_u64, read_u64);
numeric_format!(i16, write_i16, read_i16);
numeric_format!(i32, write_i32, read_i32);
numeric_format!(i64, write_i64, read_i64);
numeric_format!(f32, write_f32, read_f32);
numeric_format!(f64, write_f64, read_f64);

impl Serialize for u8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)
    }
}

impl Deserialize for u8 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        reader.read_u8()
    }
}

impl Serialize for i8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i8(*self)
    }
}

impl Deserialize for i8 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        reader.read_i8()
    }
}

/// Size in `u16` is the first thing serialized/deserialized
impl<A: Serialize> Serialize for Vec<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        let len = u16::try_from(self.len()).map_err(|_| {
            let msg = format!("Sequence of length {} does not fit in a class file", self.len());
            Error::new(ErrorKind::InvalidInput, msg)
        })?;
        len.serialize(writer)?;
        for elem in self {
            elem.serialize(writer)?;
        }
        Ok(())
    }
}

impl<A: Deserialize> Deserialize for Vec<A> {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        let len = u16::deserialize(reader)?;
        let mut elems = Vec::with_capacity(len as usize);
        for _ in 0..len {
            elems.push(A::deserialize(reader)?);
        }
        Ok(elems)
    }
}

/// Read exactly `len` raw bytes
pub fn read_bytes<R: ReadBytesExt>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buffer = vec![0; len];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn numbers_are_big_endian() {
        let mut buffer = vec![];
        0x1234u16.serialize(&mut buffer).unwrap();
        (-2i32).serialize(&mut buffer).unwrap();
        assert_eq!(buffer, vec![0x12, 0x34, 0xFF, 0xFF, 0xFF, 0xFE]);

        let mut reader = Cursor::new(buffer);
        assert_eq!(u16::deserialize(&mut reader).unwrap(), 0x1234);
        assert_eq!(i32::deserialize(&mut reader).unwrap(), -2);
    }

    #[test]
    fn sequences_are_length_prefixed() {
        let mut buffer = vec![];
        vec![7u8, 8, 9].serialize(&mut buffer).unwrap();
        assert_eq!(buffer, vec![0, 3, 7, 8, 9]);

        let decoded = Vec::<u8>::deserialize(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(decoded, vec![7, 8, 9]);
    }

    #[test]
    fn truncated_input_is_an_error() {
        let err = u32::deserialize(&mut Cursor::new(vec![1u8, 2])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }
}

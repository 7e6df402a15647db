use std::io::{Read, Result, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Write a little-endian u32, returning the number of bytes written.
pub fn write_u32<W: Write>(writer: &mut W, value: u32) -> Result<usize> {
    writer.write_u32::<LittleEndian>(value)?;
    Ok(std::mem::size_of::<u32>())
}

pub fn write_u32_slice<W: Write>(writer: &mut W, values: &[u32]) -> Result<usize> {
    for value in values {
        writer.write_u32::<LittleEndian>(*value)?;
    }
    Ok(values.len() * std::mem::size_of::<u32>())
}

pub fn write_f32_slice<W: Write>(writer: &mut W, values: &[f32]) -> Result<usize> {
    for value in values {
        writer.write_f32::<LittleEndian>(*value)?;
    }
    Ok(values.len() * std::mem::size_of::<f32>())
}

/// Read exactly `len` little-endian u32 values. Fails with `UnexpectedEof` on short input.
pub fn read_u32_vec<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u32>> {
    let mut values = vec![0u32; len];
    reader.read_u32_into::<LittleEndian>(&mut values)?;
    Ok(values)
}

/// Read exactly `len` little-endian f32 values. Fails with `UnexpectedEof` on short input.
pub fn read_f32_vec<R: Read>(reader: &mut R, len: usize) -> Result<Vec<f32>> {
    let mut values = vec![0f32; len];
    reader.read_f32_into::<LittleEndian>(&mut values)?;
    Ok(values)
}

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use utils::io::{write_f32_slice, write_u32, write_u32_slice};

use crate::bucket::BucketTable;
use crate::error::{IndexError, Result};
use crate::lsh::index::ItqLsh;

pub const MAGIC: [u8; 4] = *b"ITQL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V1,
}

impl Version {
    pub fn as_u32(self) -> u32 {
        match self {
            Version::V1 => 1,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Version::V1),
            _ => None,
        }
    }
}

/// Fixed-size prefix of a persisted index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: Version,
    pub table_size: u32,
    pub num_tables: u32,
    pub dimension: u32,
    pub num_bits: u32,
    pub num_training_samples: u32,
    pub num_iterations: u32,
    /// Live bucket tables, including virtual tables of a rehashed index.
    pub num_bucket_tables: u32,
}

impl Header {
    fn of(index: &ItqLsh) -> Result<Self> {
        let params = index.params();
        Ok(Self {
            version: Version::V1,
            table_size: to_u32(params.table_size, "table_size")?,
            num_tables: to_u32(params.num_tables, "num_tables")?,
            dimension: to_u32(params.dimension, "dimension")?,
            num_bits: to_u32(params.num_bits, "num_bits")?,
            num_training_samples: to_u32(params.num_training_samples, "num_training_samples")?,
            num_iterations: to_u32(params.num_iterations, "num_iterations")?,
            num_bucket_tables: to_u32(index.num_tables(), "bucket table count")?,
        })
    }
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        IndexError::Precondition(format!("{} {} does not fit in 32 bits", what, value))
    })
}

pub struct ItqLshWriter {
    path: PathBuf,
}

impl ItqLshWriter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Persist a trained index. Returns the number of bytes written.
    pub fn write(&self, index: &ItqLsh) -> Result<usize> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        let written = Self::write_to(index, &mut writer)?;
        writer.flush()?;
        info!("Wrote {} bytes to {}", written, self.path.display());
        Ok(written)
    }

    pub fn write_to<W: Write>(index: &ItqLsh, writer: &mut W) -> Result<usize> {
        let header = Header::of(index)?;
        // Every learned table must be trained before anything is written.
        let quantizers = (0..index.params().num_tables)
            .map(|k| index.quantizer(k))
            .collect::<Result<Vec<_>>>()?;

        let mut written = Self::write_header(&header, writer)?;
        for (k, quantizer) in quantizers.iter().enumerate() {
            written += write_u32_slice(writer, &index.random_indices()[k])?;
            written += Self::write_table(Self::table(index, k)?, writer)?;
            let projection: Vec<f32> = quantizer.projection.iter().copied().collect();
            written += write_f32_slice(writer, &projection)?;
            let rotation: Vec<f32> = quantizer.rotation.iter().copied().collect();
            written += write_f32_slice(writer, &rotation)?;
        }
        for k in quantizers.len()..index.num_tables() {
            written += Self::write_table(Self::table(index, k)?, writer)?;
        }
        Ok(written)
    }

    fn write_header<W: Write>(header: &Header, writer: &mut W) -> Result<usize> {
        writer.write_all(&MAGIC)?;
        let mut written = MAGIC.len();
        written += write_u32_slice(
            writer,
            &[
                header.version.as_u32(),
                header.table_size,
                header.num_tables,
                header.dimension,
                header.num_bits,
                header.num_training_samples,
                header.num_iterations,
                header.num_bucket_tables,
            ],
        )?;
        Ok(written)
    }

    fn write_table<W: Write>(table: &BucketTable, writer: &mut W) -> Result<usize> {
        let mut written = write_u32(writer, to_u32(table.num_buckets(), "bucket count")?)?;
        for (code, ids) in table.iter() {
            written += write_u32(writer, code)?;
            written += write_u32(writer, to_u32(ids.len(), "posting list length")?)?;
            written += write_u32_slice(writer, ids)?;
        }
        Ok(written)
    }

    fn table(index: &ItqLsh, k: usize) -> Result<&BucketTable> {
        index
            .table(k)
            .ok_or_else(|| IndexError::Precondition(format!("table {} does not exist", k)))
    }
}

#[cfg(test)]
mod tests {
    use byteorder::{ByteOrder, LittleEndian};
    use config::lsh_params::LshParams;
    use utils::test_utils::generate_seeded_dataset;

    use super::*;

    #[test]
    fn test_write_layout() {
        let dataset = generate_seeded_dataset(40, 6, 8);
        let params = LshParams::new(6)
            .with_table_size(97)
            .with_num_bits(3)
            .with_num_training_samples(30)
            .with_num_iterations(5);
        let mut index = ItqLsh::new(params, 1).unwrap();
        index.train(&dataset, 2).unwrap();
        index.hash(&dataset).unwrap();

        let mut buffer = Vec::new();
        let written = ItqLshWriter::write_to(&index, &mut buffer).unwrap();
        assert_eq!(written, buffer.len());

        assert_eq!(&buffer[0..4], b"ITQL");
        let header: Vec<u32> = buffer[4..36].chunks(4).map(LittleEndian::read_u32).collect();
        assert_eq!(header, vec![1, 97, 1, 6, 3, 30, 5, 1]);

        let num_buckets = index.buckets().unwrap().num_buckets();
        let expected_len = 36
            + 3 * 4
            + 4
            + num_buckets * 8
            + 40 * 4
            + 3 * 6 * 4
            + 3 * 3 * 4;
        assert_eq!(buffer.len(), expected_len);
        assert_eq!(
            LittleEndian::read_u32(&buffer[48..52]) as usize,
            num_buckets
        );
    }

    #[test]
    fn test_write_untrained_fails() {
        let index = ItqLsh::new(LshParams::new(6).with_num_bits(3), 1).unwrap();
        let mut buffer = Vec::new();
        assert!(matches!(
            ItqLshWriter::write_to(&index, &mut buffer),
            Err(IndexError::Precondition(_))
        ));
        assert!(buffer.is_empty());
    }
}

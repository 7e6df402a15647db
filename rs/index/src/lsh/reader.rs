use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use config::lsh_params::LshParams;
use log::info;
use ndarray::Array2;
use quantization::itq::Itq;
use utils::io::{read_f32_vec, read_u32_vec};

use crate::bucket::BucketTable;
use crate::error::{IndexError, Result};
use crate::lsh::index::ItqLsh;
use crate::lsh::writer::{Header, Version, MAGIC};

pub struct ItqLshReader {
    path: PathBuf,
    expected_params: Option<LshParams>,
}

impl ItqLshReader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            expected_params: None,
        }
    }

    /// Fail the read unless the stored parameters match `params`. `num_iterations` is not
    /// compared since it does not affect the stored layout.
    pub fn with_expected_params(mut self, params: LshParams) -> Self {
        self.expected_params = Some(params);
        self
    }

    pub fn read(&self) -> Result<ItqLsh> {
        let bytes = std::fs::read(&self.path)?;
        let index = Self::read_from_bytes(&bytes, self.expected_params.as_ref())?;
        info!(
            "Loaded index with {} tables from {}",
            index.num_tables(),
            self.path.display()
        );
        Ok(index)
    }

    pub fn read_from_bytes(bytes: &[u8], expected: Option<&LshParams>) -> Result<ItqLsh> {
        let mut buffer = bytes;
        let header = Self::read_header(&mut buffer)?;
        let params = LshParams {
            table_size: header.table_size as usize,
            num_tables: header.num_tables as usize,
            dimension: header.dimension as usize,
            num_bits: header.num_bits as usize,
            num_training_samples: header.num_training_samples as usize,
            num_iterations: header.num_iterations as usize,
        };
        params
            .validate()
            .map_err(|e| IndexError::Deserialization(format!("stored parameters: {}", e)))?;
        if let Some(expected) = expected {
            Self::check_params(&params, expected)?;
        }
        let num_tables = params.num_tables;
        let num_bucket_tables = header.num_bucket_tables as usize;
        if num_bucket_tables < num_tables || (num_bucket_tables > num_tables && num_tables != 1) {
            return Err(IndexError::Deserialization(format!(
                "{} bucket tables cannot belong to {} learned tables",
                num_bucket_tables, num_tables
            )));
        }

        let (num_bits, dimension) = (params.num_bits, params.dimension);
        Self::ensure_remaining(
            buffer,
            Self::min_body_words(num_tables, num_bucket_tables, num_bits, dimension),
        )?;
        let mut quantizers = Vec::with_capacity(num_tables);
        let mut random_indices = Vec::with_capacity(num_tables);
        let mut tables = Vec::with_capacity(num_bucket_tables);
        for _ in 0..num_tables {
            random_indices.push(Self::read_u32s(&mut buffer, num_bits)?);
            tables.push(Self::read_table(&mut buffer, num_bits)?);
            let projection = Self::read_matrix(&mut buffer, num_bits, dimension)?;
            let rotation = Self::read_matrix(&mut buffer, num_bits, num_bits)?;
            quantizers.push(Itq::new(projection, rotation)?);
        }
        for _ in num_tables..num_bucket_tables {
            tables.push(Self::read_table(&mut buffer, num_bits)?);
        }
        if !buffer.is_empty() {
            return Err(IndexError::Deserialization(format!(
                "{} trailing bytes after the last table",
                buffer.len()
            )));
        }
        Ok(ItqLsh::from_parts(params, quantizers, random_indices, tables))
    }

    fn read_header(buffer: &mut &[u8]) -> Result<Header> {
        if buffer.len() < MAGIC.len() || buffer[..MAGIC.len()] != MAGIC {
            return Err(IndexError::Deserialization(
                "missing ITQL magic".to_string(),
            ));
        }
        *buffer = &buffer[MAGIC.len()..];
        let fields = Self::read_u32s(buffer, 8)?;
        let version = Version::from_u32(fields[0]).ok_or_else(|| {
            IndexError::Deserialization(format!("unknown version: {}", fields[0]))
        })?;
        Ok(Header {
            version,
            table_size: fields[1],
            num_tables: fields[2],
            dimension: fields[3],
            num_bits: fields[4],
            num_training_samples: fields[5],
            num_iterations: fields[6],
            num_bucket_tables: fields[7],
        })
    }

    fn check_params(stored: &LshParams, expected: &LshParams) -> Result<()> {
        let pairs = [
            ("table_size", stored.table_size, expected.table_size),
            ("num_tables", stored.num_tables, expected.num_tables),
            ("dimension", stored.dimension, expected.dimension),
            ("num_bits", stored.num_bits, expected.num_bits),
            (
                "num_training_samples",
                stored.num_training_samples,
                expected.num_training_samples,
            ),
        ];
        for (name, stored, expected) in pairs {
            if stored != expected {
                return Err(IndexError::Deserialization(format!(
                    "stored {} is {}, expected {}",
                    name, stored, expected
                )));
            }
        }
        Ok(())
    }

    /// Smallest body the header allows: every table with empty buckets. `usize::MAX` on
    /// overflow, which no buffer can hold.
    fn min_body_words(
        num_tables: usize,
        num_bucket_tables: usize,
        num_bits: usize,
        dimension: usize,
    ) -> usize {
        let learned_table = num_bits
            .checked_mul(dimension)
            .and_then(|projection| projection.checked_add(num_bits * num_bits))
            .and_then(|matrices| matrices.checked_add(num_bits + 1));
        learned_table
            .and_then(|words| words.checked_mul(num_tables))
            .and_then(|words| words.checked_add(num_bucket_tables - num_tables))
            .unwrap_or(usize::MAX)
    }

    fn read_table(buffer: &mut &[u8], num_bits: usize) -> Result<BucketTable> {
        let max_code = u32::MAX >> (32 - num_bits);
        let num_buckets = Self::read_u32(buffer)?;
        let mut table = BucketTable::new();
        for _ in 0..num_buckets {
            let code = Self::read_u32(buffer)?;
            if code > max_code {
                return Err(IndexError::Deserialization(format!(
                    "bucket code {:#x} does not fit in {} bits",
                    code, num_bits
                )));
            }
            let len = Self::read_u32(buffer)? as usize;
            let ids = Self::read_u32s(buffer, len)?;
            if !table.insert_posting_list(code, ids) {
                return Err(IndexError::Deserialization(format!(
                    "bucket {:#x} appears twice",
                    code
                )));
            }
        }
        Ok(table)
    }

    fn read_matrix(buffer: &mut &[u8], rows: usize, cols: usize) -> Result<Array2<f32>> {
        Self::ensure_remaining(buffer, rows * cols)?;
        let values = read_f32_vec(buffer, rows * cols)?;
        Array2::from_shape_vec((rows, cols), values)
            .map_err(|e| IndexError::Deserialization(format!("matrix shape: {}", e)))
    }

    fn read_u32(buffer: &mut &[u8]) -> Result<u32> {
        Self::ensure_remaining(buffer, 1)?;
        Ok(buffer.read_u32::<LittleEndian>()?)
    }

    fn read_u32s(buffer: &mut &[u8], len: usize) -> Result<Vec<u32>> {
        Self::ensure_remaining(buffer, len)?;
        Ok(read_u32_vec(buffer, len)?)
    }

    /// Checks that `num_words` 4-byte values remain before anything is allocated.
    fn ensure_remaining(buffer: &[u8], num_words: usize) -> Result<()> {
        match num_words.checked_mul(4) {
            Some(len) if len <= buffer.len() => Ok(()),
            _ => Err(IndexError::Deserialization(format!(
                "truncated file: need {} more values, {} bytes left",
                num_words,
                buffer.len()
            ))),
        }
    }
}

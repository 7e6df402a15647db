use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

/// Random-access, read-only view over a dense set of vectors.
pub trait VectorSource {
    /// Number of vectors.
    fn num_vectors(&self) -> usize;

    /// Dimension of every vector.
    fn dimension(&self) -> usize;

    /// The `i`-th vector. Panics if `i >= num_vectors()`.
    fn get(&self, i: usize) -> &[f32];
}

/// Vectors stored row-major in one flat buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct InMemoryDataset {
    dimension: usize,
    data: Vec<f32>,
}

impl InMemoryDataset {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    pub fn from_flat(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 || data.len() % dimension != 0 {
            return Err(anyhow!(
                "Flat buffer of length {} is not a multiple of dimension {}",
                data.len(),
                dimension
            ));
        }
        Ok(Self { dimension, data })
    }

    pub fn from_rows(dimension: usize, rows: &[Vec<f32>]) -> Result<Self> {
        let mut dataset = Self::new(dimension);
        for row in rows {
            dataset.push(row)?;
        }
        Ok(dataset)
    }

    pub fn push(&mut self, row: &[f32]) -> Result<()> {
        if row.len() != self.dimension {
            return Err(anyhow!(
                "Vector has dimension {}, expected {}",
                row.len(),
                self.dimension
            ));
        }
        self.data.extend_from_slice(row);
        Ok(())
    }

    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }
}

impl VectorSource for InMemoryDataset {
    fn num_vectors(&self) -> usize {
        if self.dimension == 0 {
            return 0;
        }
        self.data.len() / self.dimension
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn get(&self, i: usize) -> &[f32] {
        &self.data[i * self.dimension..(i + 1) * self.dimension]
    }
}

/// Read an `.fvecs` file: each row is a little-endian i32 dimension followed by that many f32.
pub fn read_fvecs(path: impl AsRef<Path>) -> Result<InMemoryDataset> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut dataset: Option<InMemoryDataset> = None;

    while let Some(dimension) = read_row_dimension(&mut reader)? {
        let mut row = vec![0f32; dimension];
        reader
            .read_f32_into::<LittleEndian>(&mut row)
            .with_context(|| format!("Truncated row in {}", path.display()))?;
        dataset
            .get_or_insert_with(|| InMemoryDataset::new(dimension))
            .push(&row)?;
    }

    let dataset = dataset.ok_or_else(|| anyhow!("{} contains no vectors", path.display()))?;
    debug!(
        "Read {} vectors of dimension {} from {}",
        dataset.num_vectors(),
        dataset.dimension(),
        path.display()
    );
    Ok(dataset)
}

/// Read an `.ivecs` file (typically ground-truth neighbor lists).
pub fn read_ivecs(path: impl AsRef<Path>) -> Result<Vec<Vec<u32>>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut rows = Vec::new();

    while let Some(dimension) = read_row_dimension(&mut reader)? {
        let mut row = vec![0u32; dimension];
        reader
            .read_u32_into::<LittleEndian>(&mut row)
            .with_context(|| format!("Truncated row in {}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

pub fn write_fvecs(path: impl AsRef<Path>, dataset: &impl VectorSource) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let dimension = i32::try_from(dataset.dimension())?;
    for i in 0..dataset.num_vectors() {
        writer.write_i32::<LittleEndian>(dimension)?;
        for value in dataset.get(i) {
            writer.write_f32::<LittleEndian>(*value)?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_ivecs(path: impl AsRef<Path>, rows: &[Vec<u32>]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for row in rows {
        writer.write_i32::<LittleEndian>(i32::try_from(row.len())?)?;
        for value in row {
            writer.write_u32::<LittleEndian>(*value)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Returns `None` on a clean end of file.
fn read_row_dimension<R: Read>(reader: &mut R) -> Result<Option<usize>> {
    match reader.read_i32::<LittleEndian>() {
        Ok(dimension) if dimension > 0 => Ok(Some(dimension as usize)),
        Ok(dimension) => Err(anyhow!("Invalid row dimension {}", dimension)),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}

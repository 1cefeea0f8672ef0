//! Loader for the MNIST binary format:
//!
//! training images `train-images.idx3-ubyte`, labels
//! `train-labels.idx1-ubyte`; test images `t10k-images.idx3-ubyte`, labels
//! `t10k-labels.idx1-ubyte`. Headers are big-endian u32 fields
//! `(magic, count, [rows, cols])` followed by flat unsigned bytes.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::{Dataset, Mode};
use crate::matrix::Matrix;
use crate::prelude::*;

const IMAGE_MAGIC: u32 = 2051;
const LABEL_MAGIC: u32 = 2049;

/// MNIST has 10 labels, 0 through 9.
const LABEL_COUNT: usize = 10;

pub struct MnistDataset {
    train: Vec<(Matrix<f64>, Matrix<f64>)>,
    test: Vec<(Matrix<f64>, Matrix<f64>)>,
}

impl MnistDataset {
    /// Loads the four idx files from `dir`.
    ///
    /// Pixels land as a `(rows * cols, 1)` column normalized to `[0, 1]`;
    /// labels are one-hot `(10, 1)` columns.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let train = load_pairs(
            &dir.join("train-images.idx3-ubyte"),
            &dir.join("train-labels.idx1-ubyte"),
        )?;
        let test = load_pairs(
            &dir.join("t10k-images.idx3-ubyte"),
            &dir.join("t10k-labels.idx1-ubyte"),
        )?;
        Ok(Self { train, test })
    }

    fn split(&self, mode: Mode) -> &[(Matrix<f64>, Matrix<f64>)] {
        match mode {
            Mode::Train => &self.train,
            Mode::Test => &self.test,
        }
    }
}

impl Dataset for MnistDataset {
    fn sample_count(&self, mode: Mode) -> usize {
        self.split(mode).len()
    }

    fn sample(&self, index: usize, mode: Mode) -> Result<(Matrix<f64>, Matrix<f64>)> {
        let pair = self.split(mode).get(index).ok_or(Error::IndexErr)?;
        Ok(pair.clone())
    }
}

fn load_pairs(images: &Path, labels: &Path) -> Result<Vec<(Matrix<f64>, Matrix<f64>)>> {
    let images = load_image_file(images)?;
    let labels = load_label_file(labels)?;
    if images.len() != labels.len() {
        return Err(Error::IoErr(format!(
            "{} images but {} labels",
            images.len(),
            labels.len()
        )));
    }

    Ok(images
        .into_iter()
        .zip(labels.into_iter().map(one_hot))
        .collect())
}

fn one_hot(label: u8) -> Matrix<f64> {
    let mut encoded = Matrix::new(LABEL_COUNT, 1);
    encoded[(label as usize, 0)] = 1.0;
    encoded
}

fn load_label_file(path: &Path) -> Result<Vec<u8>> {
    let mut reader = BufReader::new(File::open(path)?);
    expect_magic(&mut reader, LABEL_MAGIC, path)?;

    let count = read_u32_be(&mut reader)? as usize;
    let mut labels = vec![0u8; count];
    reader.read_exact(&mut labels)?;

    if let Some(bad) = labels.iter().find(|&&l| l as usize >= LABEL_COUNT) {
        return Err(Error::IoErr(format!(
            "{} holds label {bad}, outside 0..{LABEL_COUNT}",
            path.display()
        )));
    }
    Ok(labels)
}

fn load_image_file(path: &Path) -> Result<Vec<Matrix<f64>>> {
    let mut reader = BufReader::new(File::open(path)?);
    expect_magic(&mut reader, IMAGE_MAGIC, path)?;

    let count = read_u32_be(&mut reader)? as usize;
    let rows = read_u32_be(&mut reader)? as usize;
    let cols = read_u32_be(&mut reader)? as usize;

    let mut pixels = vec![0u8; rows * cols];
    let mut images = Vec::with_capacity(count);
    for _ in 0..count {
        reader.read_exact(&mut pixels)?;
        // Byte 0 is background, 255 full ink.
        images.push(Matrix::from_column(
            pixels.iter().map(|&b| b as f64 / 255.0).collect(),
        ));
    }
    Ok(images)
}

fn expect_magic<R: Read>(reader: &mut R, expected: u32, path: &Path) -> Result<()> {
    let magic = read_u32_be(reader)?;
    if magic != expected {
        return Err(Error::IoErr(format!(
            "{} has magic number {magic}, expected {expected}",
            path.display()
        )));
    }
    Ok(())
}

fn read_u32_be<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

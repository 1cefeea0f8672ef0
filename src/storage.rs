//! Checkpoint files: a little-endian u32 byte count followed by the raw
//! buffer. The buffer's meaning (parameter layout, shapes) is the caller's
//! business; see [`crate::neural::Network::to_bytes`].

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::prelude::*;

pub fn save_buffer(path: impl AsRef<Path>, buffer: &[u8]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&(buffer.len() as u32).to_le_bytes())?;
    writer.write_all(buffer)?;
    writer.flush()?;
    Ok(())
}

pub fn load_buffer(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);

    let mut size = [0u8; 4];
    reader.read_exact(&mut size)?;

    let mut buffer = vec![0u8; u32::from_le_bytes(size) as usize];
    reader.read_exact(&mut buffer)?;

    let mut trailing = [0u8; 1];
    if reader.read(&mut trailing)? != 0 {
        return Err(Error::IoErr(format!(
            "{} holds bytes past its declared length",
            path.display()
        )));
    }
    Ok(buffer)
}

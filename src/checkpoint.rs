//! Named-tensor checkpoints
//!
//! File format (little-endian):
//!
//! ```text
//! [0..8]   magic   b"CRNCKPT1"
//! [8..12]  count   u32   number of tensors
//! then per tensor:
//!          name_len u32, name (UTF-8), numel u64, numel × f32
//! ```
//!
//! Tensors are written in the model's parameter order. Loading matches them
//! by position and checks both the name and the length of every tensor.

use crate::error::{CausalError, Result};
use crate::models::CausalModel;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 8] = b"CRNCKPT1";

/// File name of the run-wide best checkpoint inside `model_dir`.
pub const BEST_MODEL_FILE: &str = "best_model.bin";

/// Serialize every trainable tensor of `model` into a byte buffer.
pub fn serialize_checkpoint(model: &mut dyn CausalModel) -> Vec<u8> {
    let params = model.parameters();
    let numel: usize = params.iter().map(|p| p.len()).sum();
    let mut buf = Vec::with_capacity(12 + numel * 4 + params.len() * 64);

    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&(params.len() as u32).to_le_bytes());
    for p in &params {
        buf.extend_from_slice(&(p.name.len() as u32).to_le_bytes());
        buf.extend_from_slice(p.name.as_bytes());
        buf.extend_from_slice(&(p.value.len() as u64).to_le_bytes());
        buf.reserve(p.value.len() * 4);
        for &v in p.value.iter() {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }
    buf
}

/// Atomically replace `path` with `buf` (write `<path>.tmp`, then rename).
pub fn flush_checkpoint(path: &Path, buf: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = tmp_path(path);
    {
        let mut f = File::create(&tmp)?;
        f.write_all(buf)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write the parameters of `model` to `path`.
pub fn save_checkpoint(path: impl AsRef<Path>, model: &mut dyn CausalModel) -> Result<()> {
    let buf = serialize_checkpoint(model);
    flush_checkpoint(path.as_ref(), &buf)
}

/// Overwrite the parameters of `model` with the tensors stored at `path`.
///
/// # Errors
///
/// [`CausalError::Io`] if the file cannot be read, [`CausalError::Checkpoint`]
/// for a bad header, a truncated file, or any tensor whose name or length does
/// not match the model.
pub fn load_checkpoint(path: impl AsRef<Path>, model: &mut dyn CausalModel) -> Result<()> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let mut reader = ByteReader {
        bytes: &bytes,
        pos: 0,
    };

    if reader.take(8)? != MAGIC {
        return Err(CausalError::Checkpoint(format!(
            "bad magic bytes in {}",
            path.display()
        )));
    }
    let count = reader.u32()? as usize;

    let mut params = model.parameters();
    if count != params.len() {
        return Err(CausalError::Checkpoint(format!(
            "{} holds {} tensors, model has {}",
            path.display(),
            count,
            params.len()
        )));
    }

    for p in params.iter_mut() {
        let name_len = reader.u32()? as usize;
        let name = std::str::from_utf8(reader.take(name_len)?)
            .map_err(|_| CausalError::Checkpoint("tensor name is not UTF-8".to_string()))?;
        if name != p.name {
            return Err(CausalError::Checkpoint(format!(
                "expected tensor '{}', found '{}'",
                p.name, name
            )));
        }
        let numel = reader.u64()? as usize;
        if numel != p.value.len() {
            return Err(CausalError::Checkpoint(format!(
                "tensor '{}' has {} values, model expects {}",
                name,
                numel,
                p.value.len()
            )));
        }
        let raw = reader.take(numel * 4)?;
        for (v, b) in p.value.iter_mut().zip(raw.chunks_exact(4)) {
            *v = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        }
    }

    if reader.pos != bytes.len() {
        return Err(CausalError::Checkpoint(format!(
            "{} trailing bytes after the last tensor",
            bytes.len() - reader.pos
        )));
    }
    Ok(())
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| CausalError::Checkpoint("unexpected end of checkpoint".to_string()))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }
}

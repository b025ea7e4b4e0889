//! Segment artifact compression using zstd.

use crate::error::CoreResult;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Stream-compresses a finalized segment into a `.zst` sibling artifact.
///
/// The source file is removed on success, so the compressed artifact is the
/// only remaining copy. This is a pure transformation: it holds no state and
/// touches nothing but the two paths involved.
///
/// # Errors
///
/// Returns an error if the source cannot be read, the artifact cannot be
/// written, or the encoder fails. The source file is left in place on error.
pub fn compress_artifact(path: &Path, level: i32) -> CoreResult<PathBuf> {
    let dest = PathBuf::from(format!("{}.zst", path.display()));

    let mut reader = BufReader::new(File::open(path)?);
    let writer = BufWriter::new(File::create(&dest)?);

    let mut encoder = zstd::stream::write::Encoder::new(writer, level)?;
    io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?;

    std::fs::remove_file(path)?;
    Ok(dest)
}

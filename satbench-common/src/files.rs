//! Reading and writing possibly compressed files

use crate::error::{Error, Result};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

/// File extension of Zstandard archives.
const ZSTD: &str = ".zst";
/// File extension of Gzip archives.
const GZIP: &str = ".gz";
/// File extension of Bzip2 archives.
const BZIP2: &str = ".bz2";
/// File extension of XZ archives.
const XZ: &str = ".xz";
/// File extension of LZ4 archives.
const LZ4: &str = ".lz4";

/// Strip the compression format off a filename.
///
/// If the filename ends with a known archive extension,
/// return the filname without extension and the extension.
/// Otherwise return the unmodified filename and the empty string.
pub fn compression_format_by_extension(filename: &str) -> (&str, &str) {
    let mut basename = filename;
    let mut compression_format = "";
    for extension in &[ZSTD, GZIP, BZIP2, LZ4, XZ] {
        if filename.ends_with(extension) {
            compression_format = extension;
            basename = &filename[0..filename.len() - extension.len()];
            break;
        }
    }
    (basename, compression_format)
}

/// The compression extension of a path, or the empty string.
fn compression_format(path: &Path) -> &'static str {
    let name = path.to_string_lossy();
    match compression_format_by_extension(&name).1 {
        ZSTD => ZSTD,
        GZIP => GZIP,
        BZIP2 => BZIP2,
        XZ => XZ,
        LZ4 => LZ4,
        _ => "",
    }
}

/// Open a file for reading.
pub fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|err| Error::file(path, err))
}

/// Read a whole file, transparently decompressing it based on its extension.
pub fn read_compressed_file(path: &Path) -> Result<Vec<u8>> {
    let file = open_file(path)?;
    let mut reader: Box<dyn Read> = match compression_format(path) {
        ZSTD => Box::new(zstd::stream::read::Decoder::new(file).map_err(|err| Error::file(path, err))?),
        GZIP => Box::new(flate2::read::GzDecoder::new(file)),
        BZIP2 => Box::new(bzip2::read::BzDecoder::new(file)),
        XZ => Box::new(xz2::read::XzDecoder::new(file)),
        LZ4 => Box::new(lz4::Decoder::new(file).map_err(|err| Error::file(path, err))?),
        _ => Box::new(BufReader::new(file)),
    };
    let mut contents = Vec::new();
    reader
        .read_to_end(&mut contents)
        .map_err(|err| Error::file(path, err))?;
    Ok(contents)
}

/// Write a whole file, compressing it based on its extension.
pub fn write_compressed_file(path: &Path, contents: &[u8]) -> Result<()> {
    write_compressed(path, contents).map_err(|err| Error::file(path, err))
}

fn write_compressed(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let file = BufWriter::new(File::create(path)?);
    let mut file = match compression_format(path) {
        ZSTD => {
            let mut encoder = zstd::stream::write::Encoder::new(file, 0)?;
            encoder.write_all(contents)?;
            encoder.finish()?
        }
        GZIP => {
            let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            encoder.write_all(contents)?;
            encoder.finish()?
        }
        BZIP2 => {
            let mut encoder = bzip2::write::BzEncoder::new(file, bzip2::Compression::default());
            encoder.write_all(contents)?;
            encoder.finish()?
        }
        XZ => {
            let mut encoder = xz2::write::XzEncoder::new(file, 6);
            encoder.write_all(contents)?;
            encoder.finish()?
        }
        LZ4 => {
            let mut encoder = lz4::EncoderBuilder::new().build(file)?;
            encoder.write_all(contents)?;
            let (file, result) = encoder.finish();
            result?;
            file
        }
        _ => {
            let mut file = file;
            file.write_all(contents)?;
            file
        }
    };
    file.flush()
}

/// Replace the file at `path` with `contents` so that readers never observe a
/// partially written file.
pub fn write_file_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    fs::write(&staging, contents).map_err(|err| Error::file(&staging, err))?;
    fs::rename(&staging, path).map_err(|err| Error::file(path, err))
}

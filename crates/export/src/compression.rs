//! Output/input compression layer.

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use portico_core::Compression;
use std::io::{self, Read, Write};

pub enum CompressedWriter<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
    Deflate(ZlibEncoder<W>),
}

impl<W: Write> CompressedWriter<W> {
    pub fn new(writer: W, compression: Compression) -> Self {
        let level = flate2::Compression::default();
        match compression {
            Compression::None => CompressedWriter::Plain(writer),
            Compression::Gzip => CompressedWriter::Gzip(GzEncoder::new(writer, level)),
            Compression::Deflate => CompressedWriter::Deflate(ZlibEncoder::new(writer, level)),
        }
    }

    pub fn is_compressed(&self) -> bool {
        !matches!(self, CompressedWriter::Plain(_))
    }

    /// Writes any trailer and hands back the underlying writer.
    pub fn finish(self) -> io::Result<W> {
        match self {
            CompressedWriter::Plain(mut w) => {
                w.flush()?;
                Ok(w)
            }
            CompressedWriter::Gzip(enc) => enc.finish(),
            CompressedWriter::Deflate(enc) => enc.finish(),
        }
    }
}

impl<W: Write> Write for CompressedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            CompressedWriter::Plain(w) => w.write(buf),
            CompressedWriter::Gzip(w) => w.write(buf),
            CompressedWriter::Deflate(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            CompressedWriter::Plain(w) => w.flush(),
            CompressedWriter::Gzip(w) => w.flush(),
            CompressedWriter::Deflate(w) => w.flush(),
        }
    }
}

pub enum CompressedReader<R: Read> {
    Plain(R),
    Gzip(GzDecoder<R>),
    Deflate(ZlibDecoder<R>),
}

impl<R: Read> CompressedReader<R> {
    pub fn new(reader: R, compression: Compression) -> Self {
        match compression {
            Compression::None => CompressedReader::Plain(reader),
            Compression::Gzip => CompressedReader::Gzip(GzDecoder::new(reader)),
            Compression::Deflate => CompressedReader::Deflate(ZlibDecoder::new(reader)),
        }
    }

    pub fn get_ref(&self) -> &R {
        match self {
            CompressedReader::Plain(r) => r,
            CompressedReader::Gzip(r) => r.get_ref(),
            CompressedReader::Deflate(r) => r.get_ref(),
        }
    }
}

impl<R: Read> Read for CompressedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            CompressedReader::Plain(r) => r.read(buf),
            CompressedReader::Gzip(r) => r.read(buf),
            CompressedReader::Deflate(r) => r.read(buf),
        }
    }
}

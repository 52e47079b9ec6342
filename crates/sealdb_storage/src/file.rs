//! Readers and writers over encrypted files.

use crate::backend::{FileReader, FileWriter};
use crate::desc::{FileDesc, FileKind};
use crate::dir::sync_dir;
use crate::encrypted::Shared;
use crate::error::{StorageError, StorageResult};
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use tracing::warn;

/// Plaintext of one file, decrypted in full when it was opened.
///
/// Dropping an unclosed reader releases it as [`close`](FileReader::close)
/// would.
#[derive(Debug)]
pub struct EncryptedReader {
    shared: Arc<Shared>,
    fd: FileDesc,
    data: Cursor<Vec<u8>>,
    closed: bool,
}

impl EncryptedReader {
    pub(crate) fn new(shared: Arc<Shared>, fd: FileDesc, plaintext: Vec<u8>) -> Self {
        Self {
            shared,
            fd,
            data: Cursor::new(plaintext),
            closed: false,
        }
    }

    /// Returns the descriptor this reader was opened for.
    #[must_use]
    pub fn fd(&self) -> FileDesc {
        self.fd
    }

    fn check_open(&self) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::Other, StorageError::Closed));
        }
        Ok(())
    }
}

impl Read for EncryptedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_open()?;
        self.data.read(buf)
    }
}

impl Seek for EncryptedReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.check_open()?;
        self.data.seek(pos)
    }
}

impl FileReader for EncryptedReader {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.check_open()?;
        let data = self.data.get_ref();
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn len(&self) -> u64 {
        self.data.get_ref().len() as u64
    }

    fn close(&mut self) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        self.closed = true;
        self.shared.file_closed();
        Ok(())
    }
}

impl Drop for EncryptedReader {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            self.shared.file_closed();
        }
    }
}

/// Buffers one file's plaintext and seals it to disk on sync.
///
/// Each [`sync`](FileWriter::sync) rewrites the whole file with a fresh
/// nonce, so a partially written buffer never reaches disk.
/// [`Write::flush`] does not touch disk.
///
/// Dropping an unclosed writer makes a best-effort close.
#[derive(Debug)]
pub struct EncryptedWriter {
    shared: Arc<Shared>,
    fd: FileDesc,
    file: File,
    buf: Vec<u8>,
    closed: bool,
}

impl EncryptedWriter {
    pub(crate) fn new(shared: Arc<Shared>, fd: FileDesc, file: File) -> Self {
        Self {
            shared,
            fd,
            file,
            buf: Vec::new(),
            closed: false,
        }
    }

    /// Returns the descriptor this writer was created for.
    #[must_use]
    pub fn fd(&self) -> FileDesc {
        self.fd
    }

    /// Number of plaintext bytes buffered so far.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn write_sealed(&mut self) -> StorageResult<()> {
        // Seal first, so a nonce failure leaves the previous contents intact.
        let sealed = self.shared.cipher.seal(self.fd, &self.buf)?;
        let fd = self.fd;

        self.file
            .set_len(0)
            .inspect_err(|e| warn!(error = %e, "truncate {fd}"))?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file
            .write_all(&sealed)
            .inspect_err(|e| warn!(error = %e, "write {fd}"))?;
        self.file
            .sync_all()
            .inspect_err(|e| warn!(error = %e, "sync {fd}"))?;

        if fd.kind == FileKind::Manifest {
            // The manifest's directory entry must be durable before CURRENT
            // can point at it.
            sync_dir(&self.shared.path).inspect_err(|e| warn!(error = %e, "sync directory"))?;
        }
        Ok(())
    }
}

impl Write for EncryptedWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::Other, StorageError::Closed));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FileWriter for EncryptedWriter {
    fn sync(&mut self) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        self.write_sealed()
    }

    fn close(&mut self) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        self.write_sealed()?;
        self.closed = true;
        self.shared.file_closed();
        Ok(())
    }
}

impl Drop for EncryptedWriter {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.write_sealed() {
                warn!(error = %e, fd = %self.fd, "writer dropped without close; seal failed");
            }
            self.closed = true;
            self.shared.file_closed();
        }
    }
}

/// Physical ZIP layer for serialized packages.
///
/// Wraps a `zip::ZipWriter` over an in-memory buffer. All entries are
/// deflated and carry a fixed modification timestamp so that serializing the
/// same part set twice yields byte-identical archives.
use crate::error::Result;
use crate::packuri::PackUri;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

pub struct ArchiveWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
}

impl ArchiveWriter {
    /// Create a writer targeting an in-memory buffer.
    pub fn new() -> Self {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options,
        }
    }

    /// Write one entry under the partname's membername.
    pub fn write(&mut self, pack_uri: &PackUri, blob: &[u8]) -> Result<()> {
        self.zip.start_file(pack_uri.membername(), self.options)?;
        self.zip.write_all(blob)?;
        Ok(())
    }

    /// Finish the central directory and return the archive bytes.
    pub fn finish(self) -> Result<Vec<u8>> {
        Ok(self.zip.finish()?.into_inner())
    }
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn test_round_trip() {
        let mut writer = ArchiveWriter::new();
        let uri = PackUri::new("/ppt/presentation.xml").unwrap();
        writer.write(&uri, b"<p:presentation/>").unwrap();
        let bytes = writer.finish().unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut entry = archive.by_name("ppt/presentation.xml").unwrap();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "<p:presentation/>");
    }

    #[test]
    fn test_deterministic_output() {
        let build = || {
            let mut writer = ArchiveWriter::new();
            writer
                .write(&PackUri::new("/a.xml").unwrap(), b"<a/>")
                .unwrap();
            writer
                .write(&PackUri::new("/b.xml").unwrap(), b"<b/>")
                .unwrap();
            writer.finish().unwrap()
        };
        assert_eq!(build(), build());
    }
}

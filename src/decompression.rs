use anyhow::{anyhow, Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::path::Path;

/// Compression detected from the first bytes of an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Zstd,
    Plain,
}

/// Detect compression format by magic bytes
/// gzip: 1F 8B 08, zstd: 28 B5 2F FD
pub fn detect_compression(head: &[u8]) -> Compression {
    if head.len() >= 3 && head[0] == 0x1F && head[1] == 0x8B && head[2] == 0x08 {
        Compression::Gzip
    } else if head.len() >= 4
        && head[0] == 0x28
        && head[1] == 0xB5
        && head[2] == 0x2F
        && head[3] == 0xFD
    {
        Compression::Zstd
    } else {
        Compression::Plain
    }
}

/// Wrap any reader with transparent gzip/zstd decompression
pub fn maybe_decompress<R: Read + Send + 'static>(mut reader: R) -> io::Result<Box<dyn BufRead + Send>> {
    let mut head = [0u8; 4];
    let mut filled = 0;
    // Short reads are legal; keep going until 4 bytes or EOF
    while filled < head.len() {
        let n = reader.read(&mut head[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    // Put the read bytes back in front using a cursor chain
    let chained = Cursor::new(head[..filled].to_vec()).chain(reader);

    Ok(match detect_compression(&head[..filled]) {
        Compression::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(chained))),
        Compression::Zstd => Box::new(BufReader::new(zstd::Decoder::new(chained)?)),
        Compression::Plain => Box::new(BufReader::new(chained)),
    })
}

/// Open a file, or stdin for "-", with decompression auto-detected
pub fn open_input(path: &str) -> Result<Box<dyn BufRead + Send>> {
    if path == "-" {
        return maybe_decompress(io::stdin()).context("Failed to read stdin");
    }

    let path_ref = Path::new(path);
    if let Some(extension) = path_ref.extension().and_then(|ext| ext.to_str()) {
        if extension.eq_ignore_ascii_case("zip") {
            return Err(anyhow!(
                "ZIP files are not supported; only gzip and zstd are decompressed. Extract it first: unzip {}",
                path_ref.display()
            ));
        }
    }

    let file = File::open(path_ref).with_context(|| format!("Failed to open {}", path))?;
    maybe_decompress(file).with_context(|| format!("Failed to detect compression of {}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn read_all(mut reader: Box<dyn BufRead + Send>) -> String {
        let mut text = String::new();
        reader.read_to_string(&mut text).expect("read");
        text
    }

    #[test]
    fn test_detect_compression() {
        assert_eq!(detect_compression(&[0x1F, 0x8B, 0x08, 0x00]), Compression::Gzip);
        assert_eq!(detect_compression(&[0x28, 0xB5, 0x2F, 0xFD]), Compression::Zstd);
        assert_eq!(detect_compression(b"abc"), Compression::Plain);
        assert_eq!(detect_compression(&[]), Compression::Plain);
    }

    #[test]
    fn test_plain_passthrough_keeps_prefix() {
        let reader = maybe_decompress(Cursor::new(b"hello\nworld\n".to_vec())).expect("open");
        assert_eq!(read_all(reader), "hello\nworld\n");
    }

    #[test]
    fn test_short_input_passthrough() {
        let reader = maybe_decompress(Cursor::new(b"hi".to_vec())).expect("open");
        assert_eq!(read_all(reader), "hi");
    }

    #[test]
    fn test_gzip_roundtrip() {
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"line one\nline two\n").expect("compress");
        let compressed = encoder.finish().expect("finish");

        let reader = maybe_decompress(Cursor::new(compressed)).expect("open");
        assert_eq!(read_all(reader), "line one\nline two\n");
    }

    #[test]
    fn test_zstd_roundtrip() {
        let compressed = zstd::encode_all(&b"zstd line\n"[..], 0).expect("compress");
        let reader = maybe_decompress(Cursor::new(compressed)).expect("open");
        assert_eq!(read_all(reader), "zstd line\n");
    }

    #[test]
    fn test_zip_rejected() {
        let err = match open_input("archive.zip") {
            Ok(_) => panic!("zip should be rejected"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("ZIP files are not supported"));
    }
}

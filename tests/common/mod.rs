pub mod mock_upstream;

use std::io::Write;

/// Write `content` to a fresh temp file usable as an API keys source.
pub fn keys_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

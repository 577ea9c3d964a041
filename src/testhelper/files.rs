use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use crate::operating::{self, FileReader};

/// Payloads up to this size are written before returning; every supported
/// platform's pipe buffer holds at least this much.
const INLINE_WRITE_LIMIT: usize = 16 * 1024;

/// Make every file opened for reading on this thread yield `contents`
///
/// The bytes go through an anonymous pipe, so they can be read once in
/// total no matter how many times or under which path the file is opened.
/// Restore the real filesystem with [`operating::reset_system`].
#[track_caller]
pub fn mock_file_contents(contents: impl AsRef<[u8]>) {
    let (reader, mut writer) = match io::pipe() {
        Ok(pair) => pair,
        Err(e) => panic!("Could not create pipe for mocked file: {}", e),
    };

    let contents = contents.as_ref();
    if contents.len() <= INLINE_WRITE_LIMIT {
        if let Err(e) = writer.write_all(contents) {
            panic!("Could not write mocked file contents: {}", e);
        }
        drop(writer);
    } else {
        // Too large for the pipe buffer: a writer thread feeds the pipe as
        // the test reads and closes it when done.
        let payload = contents.to_vec();
        std::thread::spawn(move || {
            if let Err(e) = writer.write_all(&payload) {
                tracing::trace!(error = %e, "mocked file was not fully read");
            }
        });
    }

    operating::update_system(move |sys| {
        sys.open_file_read = Arc::new(move |_: &Path, _: &OpenOptions| -> io::Result<FileReader> {
            Ok(Box::new(reader.try_clone()?) as FileReader)
        });
    });
}

//! Line files such as `.git/info/sparse-checkout`.

use std::io;
use std::path::Path;

/// Writes one line per entry, each terminated by a newline, replacing the
/// file. Missing parent directories are created.
///
/// # Errors
///
/// Returns the underlying I/O error.
pub async fn write_lines(path: &Path, lines: &[String]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut contents = String::new();
    for line in lines {
        contents.push_str(line);
        contents.push('\n');
    }
    tokio::fs::write(path, contents).await
}

/// Reads a file written by [`write_lines`].
///
/// # Errors
///
/// Returns the underlying I/O error.
pub async fn read_lines(path: &Path) -> io::Result<Vec<String>> {
    let contents = tokio::fs::read_to_string(path).await?;
    Ok(contents.lines().map(str::to_string).collect())
}

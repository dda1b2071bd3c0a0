//! JSON I/O handling for CLI
//!
//! - Input: a file path, or `-` for stdin
//! - Output: one JSON object per command on stdout
//! - UTF-8 only

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use serde_json::Value;

use super::errors::{CliError, CliResult};

const STDIN_PATH: &str = "-";

/// Read a whole input, from stdin when the path is `-`
pub fn read_input(path: &Path) -> CliResult<String> {
    let content = if path.as_os_str() == STDIN_PATH {
        let mut content = String::new();
        io::stdin().lock().read_to_string(&mut content)?;
        content
    } else {
        fs::read_to_string(path)
            .map_err(|e| CliError::io_error(format!("{}: {}", path.display(), e)))?
    };
    if content.trim().is_empty() {
        return Err(CliError::io_error("Empty input"));
    }
    Ok(content)
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_input_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{\"region\": \"1:1-10\"}}").unwrap();
        let content = read_input(file.path()).unwrap();
        assert!(content.contains("region"));
    }

    #[test]
    fn test_read_input_rejects_empty() {
        let file = NamedTempFile::new().unwrap();
        let err = read_input(file.path()).unwrap_err();
        assert_eq!(err.code_str(), "VS_CLI_IO_ERROR");
    }
}

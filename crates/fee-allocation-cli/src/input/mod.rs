pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;

/// Load a command's JSON input from `--input`, falling back to piped stdin.
pub fn read_input<T: DeserializeOwned>(
    path: Option<&str>,
    purpose: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return file::read_json(path);
    }
    match stdin::read_stdin()? {
        Some(data) => Ok(serde_json::from_str(&data)
            .map_err(|e| format!("Failed to parse stdin as {} input: {}", purpose, e))?),
        None => Err(format!("--input <file.json> or stdin required for {}", purpose).into()),
    }
}

//! pti-upload - Upload images to a PTI server.
//!
//! Each file given on the command line is posted to the server's upload
//! endpoint and the resulting public URL is printed on its own line.

use std::path::{Path, PathBuf};

use clap::Parser;
use lloggs::LoggingArgs;
use reqwest::blocking::{Client, multipart};
use serde::Deserialize;
use tracing::{debug, error, info};

use pti::{Hexcode, content_type_for_name, sanitize_file_name};

#[derive(Parser)]
#[command(name = "pti-upload")]
#[command(about = "Upload images to a PTI server")]
struct Args {
    /// Image files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Server URL (e.g., http://localhost:29911)
    #[arg(long, short, default_value = "http://localhost:29911")]
    server: String,

    /// Override the content type instead of guessing it from the extension
    #[arg(long)]
    content_type: Option<String>,

    #[command(flatten)]
    logging: LoggingArgs,
}

/// Response from a successful upload.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
    hexcode: Hexcode,
    stored_name: String,
}

/// Error response from the server.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum UploadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server error: {error}{}", detail.as_ref().map(|d| format!(" - {}", d)).unwrap_or_default())]
    Server {
        error: String,
        detail: Option<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{failures} of {total} uploads failed")]
    Incomplete { failures: usize, total: usize },
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    let _guard = args.logging.setup(|v| match v {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    })?;

    let client = Client::new();
    let server = args.server.trim_end_matches('/');
    let mut failures = 0;

    for path in &args.files {
        match upload_file(&client, server, path, args.content_type.as_deref()) {
            Ok(resp) => {
                info!(
                    path = ?path,
                    hexcode = %resp.hexcode,
                    stored_name = %resp.stored_name,
                    "Uploaded"
                );
                println!("{}", resp.url);
            }
            Err(e) => {
                failures += 1;
                error!(path = ?path, "{}", e);
            }
        }
    }

    if failures > 0 {
        return Err(UploadError::Incomplete {
            failures,
            total: args.files.len(),
        }
        .into());
    }

    Ok(())
}

fn upload_file(
    client: &Client,
    server_url: &str,
    path: &Path,
    content_type: Option<&str>,
) -> Result<UploadResponse, UploadError> {
    let file_name = sanitize_file_name(&path.to_string_lossy());
    let content_type = content_type
        .map(str::to_string)
        .unwrap_or_else(|| content_type_for_name(&file_name));
    let data = std::fs::read(path)?;
    debug!(?path, %file_name, %content_type, size = data.len(), "Read file");

    let part = multipart::Part::bytes(data)
        .file_name(file_name)
        .mime_str(&content_type)?;
    let form = multipart::Form::new().part("file", part);

    let url = format!("{}/upload", server_url);
    let resp = client.post(&url).multipart(form).send()?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text()?;
        let error_resp = serde_json::from_str::<ErrorResponse>(&body).unwrap_or(ErrorResponse {
            error: status.to_string(),
            detail: Some(body).filter(|b| !b.is_empty()),
        });
        return Err(UploadError::Server {
            error: error_resp.error,
            detail: error_resp.detail,
        });
    }

    Ok(resp.json()?)
}

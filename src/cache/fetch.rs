//! Transports that pull cache sources onto local disk.

use crate::core::cooker::CookContext;
use crate::core::error::FetchError;
use reqwest::blocking::Client;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;
use url::Url;

const STREAM_BUFFER_SIZE: usize = 8192;

/// Streams the bytes behind a source URL into a writer.
pub trait Fetcher: Send + Sync {
    /// Copy the source into `dest`, returning the number of bytes written.
    fn fetch(&self, source: &Url, dest: &mut dyn Write, ctx: &CookContext)
        -> Result<u64, FetchError>;
}

/// `http`, `https` and `file` sources.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("farmhand/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(
        &self,
        source: &Url,
        dest: &mut dyn Write,
        ctx: &CookContext,
    ) -> Result<u64, FetchError> {
        ctx.check()?;
        match source.scheme() {
            "http" | "https" => {
                debug!(url = %source, "http fetch");
                let mut response = self.client.get(source.clone()).send()?;
                let status = response.status();
                if !status.is_success() {
                    return Err(FetchError::Status {
                        url: source.to_string(),
                        status: status.as_u16(),
                    });
                }
                stream(&mut response, dest, ctx)
            }
            "file" => {
                let path = source
                    .to_file_path()
                    .map_err(|()| FetchError::UnsupportedScheme(source.to_string()))?;
                debug!(path = %path.display(), "file fetch");
                let mut file = std::fs::File::open(&path)?;
                stream(&mut file, dest, ctx)
            }
            other => Err(FetchError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// Chunked copy that checks for cancellation between chunks.
pub fn stream(
    reader: &mut dyn Read,
    dest: &mut dyn Write,
    ctx: &CookContext,
) -> Result<u64, FetchError> {
    let mut copied: u64 = 0;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];
    loop {
        ctx.check()?;
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        dest.write_all(&buffer[..n]).map_err(FetchError::Write)?;
        copied += n as u64;
    }
    dest.flush().map_err(FetchError::Write)?;
    Ok(copied)
}

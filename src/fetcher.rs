/// Transport to the fill controller
/// The supervisor only ever performs two exchanges: read the status report
/// and command a fill of all lines. Both return the raw response body; the
/// parser decides what the bytes mean. Network faults are a distinct error
/// type so callers can retry them without conflating a protocol mismatch.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("controller returned HTTP {0}")]
    BadStatus(u16),
}

pub trait Fetcher {
    fn fetch_status(&mut self) -> Result<Vec<u8>, NetworkError>;
    fn send_fill_command(&mut self) -> Result<Vec<u8>, NetworkError>;
}

/// Production transport: HTTP GET against the controller's two fixed
/// endpoints. No per-request timeout is set; a hung connection is handled by
/// the surrounding retry loop, same as a refused one.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    status_url: String,
    fill_url: String,
}

impl HttpFetcher {
    pub fn new(controller_addr: &str) -> Result<Self, NetworkError> {
        let client = reqwest::blocking::Client::builder().timeout(None).build()?;
        Ok(Self {
            client,
            status_url: format!("http://{controller_addr}/arduino/readstatus/0"),
            fill_url: format!("http://{controller_addr}/arduino/fillall/0"),
        })
    }

    fn get(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
        let resp = self.client.get(url).send()?;
        if !resp.status().is_success() {
            return Err(NetworkError::BadStatus(resp.status().as_u16()));
        }
        Ok(resp.bytes()?.to_vec())
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_status(&mut self) -> Result<Vec<u8>, NetworkError> {
        self.get(&self.status_url)
    }

    fn send_fill_command(&mut self) -> Result<Vec<u8>, NetworkError> {
        self.get(&self.fill_url)
    }
}

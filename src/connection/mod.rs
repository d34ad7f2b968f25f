mod connection;
mod state;

pub use connection::*;
pub use state::*;

use tokio::net::TcpStream;
use tokio::time::timeout;
use std::time::Duration;
use crate::{Error, Result};

/// Open the TCP connection to the ingest server
pub async fn connect_to_server(host: &str, port: u16, connect_timeout: Duration) -> Result<TcpStream> {
    let addr = format!("{}:{}", host, port);

    // Connect with timeout
    let stream = match timeout(connect_timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(Error::connection(format!("Connection to {} failed: {}", addr, e))),
        Err(_) => return Err(Error::timeout(format!("Connection to {} timed out", addr))),
    };

    stream.set_nodelay(true)?;
    Ok(stream)
}

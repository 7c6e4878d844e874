//! Serial-over-TCP transport to the radio coprocessor.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use meshfleet_middleware::LinkTransport;
use meshfleet_types::LinkError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tracing::{info, warn};

const READ_CHUNK: usize = 256;

pub struct TcpLink {
    writer: Mutex<OwnedWriteHalf>,
    reader: Mutex<Option<OwnedReadHalf>>,
}

impl TcpLink {
    pub async fn connect(addr: &str) -> Result<Self, LinkError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| LinkError::Io(format!("connect {addr}: {e}")))?;
        stream.set_nodelay(true).map_err(|e| LinkError::Io(e.to_string()))?;
        info!(addr, "link connected");
        let (reader, writer) = stream.into_split();
        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(Some(reader)),
        })
    }
}

#[async_trait]
impl LinkTransport for TcpLink {
    async fn transmit(&self, frame: Bytes) -> Result<(), LinkError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(&frame).await.map_err(|e| LinkError::Io(e.to_string()))
    }

    async fn chunk_stream(&self) -> BoxStream<'static, Bytes> {
        let Some(reader) = self.reader.lock().await.take() else {
            return stream::empty().boxed();
        };
        stream::unfold(reader, |mut reader| async move {
            let mut buf = vec![0u8; READ_CHUNK];
            match reader.read(&mut buf).await {
                Ok(0) => {
                    warn!("link closed by peer");
                    None
                }
                Ok(n) => {
                    buf.truncate(n);
                    Some((Bytes::from(buf), reader))
                }
                Err(e) => {
                    warn!(error = %e, "link read failed");
                    None
                }
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshfleet_types::{RobotAddress, WireMessage};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn frames_cross_the_socket_both_ways() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let peer = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut hello = [0u8; 3];
            sock.read_exact(&mut hello).await.unwrap();
            let added = WireMessage::RobotAdded { address: RobotAddress(9) }.encode().to_bytes();
            sock.write_all(&added).await.unwrap();
            hello
        });

        let link = TcpLink::connect(&addr).await.unwrap();
        let mut chunks = link.chunk_stream().await;
        let hello = WireMessage::Hello { echo: 0x1010 }.encode().to_bytes();
        link.transmit(hello.clone()).await.unwrap();

        assert_eq!(&peer.await.unwrap()[..], &hello[..]);

        let mut received = Vec::new();
        while received.len() < 9 {
            let chunk = chunks.next().await.expect("stream ended early");
            received.extend_from_slice(&chunk);
        }
        assert_eq!(received[0], 0x03);
        assert!(chunks.next().await.is_none(), "peer hung up");
        assert!(link.chunk_stream().await.next().await.is_none());
    }

    #[tokio::test]
    async fn connect_refused_is_io_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        assert!(matches!(TcpLink::connect(&addr).await, Err(LinkError::Io(_))));
    }
}

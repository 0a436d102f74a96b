use log::{debug, info};
use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::task::Poll;
use thiserror::Error;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tron_shared::{
    read_message, write_message, Direction, Handshake, Operation, ProtocolError, ServerUpdate,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("server closed the connection")]
    Closed,
}

/// One joined player session over TCP.
pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    handshake: Handshake,
}

impl Client {
    /// Connects, sends the join request and waits for the handshake reply.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        info!("Connected to {}", stream.peer_addr()?);

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        write_message(&mut writer, &Operation::JOIN.encode()).await?;
        let reply = read_message(&mut reader).await?.ok_or(ClientError::Closed)?;
        let handshake = Handshake::decode(&reply)?;
        info!(
            "Joined a {} player game on a {}x{} board",
            handshake.player_count, handshake.width, handshake.height
        );

        Ok(Client {
            reader,
            writer,
            handshake,
        })
    }

    pub fn handshake(&self) -> Handshake {
        self.handshake
    }

    pub async fn send_direction(&mut self, direction: Direction) -> Result<(), ClientError> {
        debug!("Sending {}", direction);
        write_message(&mut self.writer, &direction.encode()).await?;
        Ok(())
    }

    /// Waits for the next snapshot or the game over line.
    pub async fn receive_update(&mut self) -> Result<ServerUpdate, ClientError> {
        let message = read_message(&mut self.reader)
            .await?
            .ok_or(ClientError::Closed)?;
        let update = ServerUpdate::decode(&message, self.handshake.player_count)?;
        Ok(update)
    }

    /// Returns an update the server already sent without waiting for one.
    ///
    /// A crash tick is answered with the snapshot and the game over line back
    /// to back, and the server closes right after. Checking here before the
    /// next move picks up that second line.
    pub async fn try_receive_update(&mut self) -> Result<Option<ServerUpdate>, ClientError> {
        let pending = poll_fn(|cx| match Pin::new(&mut self.reader).poll_fill_buf(cx) {
            Poll::Ready(Ok(_)) => Poll::Ready(Ok(true)),
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => Poll::Ready(Ok(false)),
        })
        .await?;

        if !pending {
            return Ok(None);
        }
        self.receive_update().await.map(Some)
    }

    /// Sends one move and returns the server's answer for that tick.
    pub async fn step(&mut self, direction: Direction) -> Result<ServerUpdate, ClientError> {
        self.send_direction(direction).await?;
        self.receive_update().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tron_shared::{PlayerState, Snapshot};

    async fn fake_server<F, Fut>(script: F) -> std::net::SocketAddr
    where
        F: FnOnce(BufReader<OwnedReadHalf>, OwnedWriteHalf) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, writer) = stream.into_split();
            script(BufReader::new(reader), writer).await;
        });
        addr
    }

    #[tokio::test]
    async fn test_connect_and_step() {
        let addr = fake_server(|mut reader, mut writer| async move {
            let join = read_message(&mut reader).await.unwrap().unwrap();
            assert_eq!(join, "3");
            write_message(&mut writer, "1,4,4").await.unwrap();

            let direction = read_message(&mut reader).await.unwrap().unwrap();
            assert_eq!(direction, "2");
            write_message(&mut writer, "1.3.2.").await.unwrap();
        })
        .await;

        let mut client = Client::connect(addr).await.unwrap();
        assert_eq!(
            client.handshake(),
            Handshake {
                player_count: 1,
                width: 4,
                height: 4
            }
        );

        let update = client.step(Direction::Down).await.unwrap();
        assert_eq!(
            update,
            ServerUpdate::Snapshot(Snapshot::new(vec![PlayerState::new(
                1,
                3,
                Direction::Down
            )]))
        );
    }

    #[tokio::test]
    async fn test_rejection_is_a_protocol_error() {
        let addr = fake_server(|mut reader, mut writer| async move {
            read_message(&mut reader).await.unwrap();
            write_message(&mut writer, "error,bad join").await.unwrap();
        })
        .await;

        let result = Client::connect(addr).await;
        assert!(matches!(
            result,
            Err(ClientError::Protocol(ProtocolError::Rejected(_)))
        ));
    }

    #[tokio::test]
    async fn test_closed_connection() {
        let addr = fake_server(|mut reader, mut writer| async move {
            read_message(&mut reader).await.unwrap();
            write_message(&mut writer, "1,4,4").await.unwrap();
        })
        .await;

        let mut client = Client::connect(addr).await.unwrap();
        assert!(matches!(
            client.receive_update().await,
            Err(ClientError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_game_over_update() {
        let addr = fake_server(|mut reader, mut writer| async move {
            read_message(&mut reader).await.unwrap();
            write_message(&mut writer, "2,4,4").await.unwrap();
            write_message(&mut writer, "end,2,9").await.unwrap();
        })
        .await;

        let mut client = Client::connect(addr).await.unwrap();
        assert_eq!(
            client.receive_update().await.unwrap(),
            ServerUpdate::GameOver {
                crashed_player: 2,
                tick: 9
            }
        );
    }

    #[tokio::test]
    async fn test_game_over_after_crash_snapshot_is_picked_up() {
        let addr = fake_server(|mut reader, mut writer| async move {
            read_message(&mut reader).await.unwrap();
            write_message(&mut writer, "1,4,4").await.unwrap();

            read_message(&mut reader).await.unwrap();
            write_message(&mut writer, "0.0.1.").await.unwrap();
            write_message(&mut writer, "end,1,1").await.unwrap();
            // Hold the connection until the client is done
            let _ = read_message(&mut reader).await;
        })
        .await;

        let mut client = Client::connect(addr).await.unwrap();
        assert!(client.try_receive_update().await.unwrap().is_none());

        let update = client.step(Direction::Right).await.unwrap();
        assert!(matches!(update, ServerUpdate::Snapshot(_)));

        let pending = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                if let Some(update) = client.try_receive_update().await.unwrap() {
                    break update;
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(
            pending,
            ServerUpdate::GameOver {
                crashed_player: 1,
                tick: 1
            }
        );
    }
}

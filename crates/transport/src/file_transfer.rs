//! File transfer over a secure channel
//!
//! ```text
//! Initiator                               Responder
//!   |--- Request(GetImage) ------------------->|
//!   |<-- File{filename, bytes} ----------------|
//!   |--- Status(Ok) -------------------------->|
//! ```

use crate::channel::{HandshakeState, SecureChannel};
use crate::error::{ChannelError, Result};
use pixelpost_protocol::{AppMessage, FileRecord, RequestKind, Status};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Serves one configured file to peers that ask for it
#[derive(Debug, Clone)]
pub struct FileTransferService {
    image_path: PathBuf,
}

impl FileTransferService {
    pub fn new(image_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
        }
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    /// Send the file at `path` and return the receiver's acknowledgement
    ///
    /// Before the handshake a plaintext BAD_REQUEST status frame is written
    /// instead, the file is never read and the refusal is returned as
    /// `Ok(Status::BadRequest)`: it is the status the caller asked for, not a
    /// broken connection. A `Failed` channel gets no I/O at all and yields
    /// `ChannelNotSecure`.
    pub async fn send_file<S>(&self, channel: &mut SecureChannel<S>, path: &Path) -> Result<Status>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if channel.state() == HandshakeState::Failed {
            return Err(ChannelError::ChannelNotSecure);
        }

        if !channel.is_secure() {
            warn!("Refusing to send {} over an insecure channel", path.display());
            channel.send_status(Status::BadRequest).await?;
            return Ok(Status::BadRequest);
        }

        let filename = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => {
                channel
                    .send_message(&AppMessage::Status(Status::BadRequest))
                    .await?;
                return Err(ChannelError::BadRequest(format!(
                    "{} has no file name",
                    path.display()
                )));
            }
        };

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                channel
                    .send_message(&AppMessage::Status(Status::BadRequest))
                    .await?;
                return Err(ChannelError::Io(e));
            }
        };

        let size = bytes.len();
        channel
            .send_message(&AppMessage::File(FileRecord { filename, bytes }))
            .await?;

        match channel.recv_message().await? {
            AppMessage::Status(status) => {
                info!("Sent {} ({} bytes), peer answered {:?}", path.display(), size, status);
                Ok(status)
            }
            other => Err(ChannelError::BadRequest(format!(
                "expected acknowledgement, got {} message",
                other.kind()
            ))),
        }
    }

    /// Answer a single request from the peer
    ///
    /// Unlike [`send_file`](Self::send_file), an insecure channel is an error
    /// here: there is no request to answer, and [`serve`](Self::serve) has to
    /// stop rather than refuse forever.
    pub async fn serve_one<S>(&self, channel: &mut SecureChannel<S>) -> Result<Status>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if channel.state() == HandshakeState::Failed {
            return Err(ChannelError::ChannelNotSecure);
        }

        if !channel.is_secure() {
            channel.send_status(Status::BadRequest).await?;
            return Err(ChannelError::ChannelNotSecure);
        }

        match channel.recv_message().await? {
            AppMessage::Request(RequestKind::GetImage) => {
                debug!("Peer requested {}", self.image_path.display());
                self.send_file(channel, &self.image_path).await
            }
            other => {
                channel
                    .send_message(&AppMessage::Status(Status::BadRequest))
                    .await?;
                Err(ChannelError::BadRequest(format!(
                    "unexpected {} message",
                    other.kind()
                )))
            }
        }
    }

    /// Serve requests until the peer closes the connection
    pub async fn serve<S>(&self, channel: &mut SecureChannel<S>) -> Result<usize>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut served = 0;
        loop {
            match self.serve_one(channel).await {
                Ok(Status::Ok) => served += 1,
                Ok(Status::BadRequest) => warn!("Peer did not acknowledge the file"),
                Err(ChannelError::ConnectionClosed) => return Ok(served),
                Err(e) => return Err(e),
            }
        }
    }
}

/// Ask the responder for its image and acknowledge the delivery
pub async fn request_file<S>(channel: &mut SecureChannel<S>) -> Result<FileRecord>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    channel
        .send_message(&AppMessage::Request(RequestKind::GetImage))
        .await?;

    match channel.recv_message().await? {
        AppMessage::File(record) => {
            channel.send_message(&AppMessage::Status(Status::Ok)).await?;
            info!("Received {} ({} bytes)", record.filename, record.bytes.len());
            Ok(record)
        }
        AppMessage::Status(Status::BadRequest) => Err(ChannelError::BadRequest(
            "responder refused the file request".to_string(),
        )),
        other => Err(ChannelError::BadRequest(format!(
            "unexpected {} reply",
            other.kind()
        ))),
    }
}

/// Write `record` into `dir` under its final file name component
pub async fn save_record(dir: &Path, record: &FileRecord) -> Result<PathBuf> {
    let name = Path::new(&record.filename)
        .file_name()
        .ok_or_else(|| {
            ChannelError::BadRequest(format!("refusing file name {:?}", record.filename))
        })?;

    let target = dir.join(name);
    tokio::fs::create_dir_all(dir).await.map_err(ChannelError::Io)?;
    tokio::fs::write(&target, &record.bytes)
        .await
        .map_err(ChannelError::Io)?;

    debug!("Saved {} bytes to {}", record.bytes.len(), target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::tests::secure_pair;
    use crate::framer::{FramerConfig, WireFramer};
    use pixelpost_crypto::{Role, SessionCipher, SessionKey, NONCE_LEN};
    use tokio::io::{duplex, DuplexStream};

    fn image_fixture(bytes: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.png");
        std::fs::write(&path, bytes).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_send_file_acknowledged() {
        let (_dir, path) = image_fixture(b"\x89PNG\r\n\x1a\nnot really a cat");
        let (mut client, mut server) = secure_pair();

        let service = FileTransferService::new(&path);
        let server_task = tokio::spawn(async move {
            let status = service.send_file(&mut server, service.image_path()).await;
            (status, server)
        });

        let record = match client.recv_message().await.unwrap() {
            AppMessage::File(record) => record,
            other => panic!("expected file, got {:?}", other),
        };
        assert_eq!(record.filename, "cat.png");
        assert_eq!(record.bytes, b"\x89PNG\r\n\x1a\nnot really a cat");
        client
            .send_message(&AppMessage::Status(Status::Ok))
            .await
            .unwrap();

        let (status, _server) = server_task.await.unwrap();
        assert_eq!(status.unwrap(), Status::Ok);
    }

    #[tokio::test]
    async fn test_send_file_before_handshake() {
        let secret = b"this must never hit the wire";
        let (_dir, path) = image_fixture(secret);

        let (a, b) = duplex(64 * 1024);
        let mut raw = WireFramer::new(a, FramerConfig::default());
        let mut server = SecureChannel::new(b, FramerConfig::default());

        let service = FileTransferService::new(&path);
        let status = service.send_file(&mut server, &path).await.unwrap();
        assert_eq!(status, Status::BadRequest);

        let sent = server.bytes_sent();
        drop(server);

        assert_eq!(raw.read_frame().await.unwrap(), vec![Status::BadRequest.to_byte()]);
        assert!(matches!(
            raw.read_frame().await,
            Err(ChannelError::ConnectionClosed)
        ));
        assert_eq!(sent, 5);
    }

    /// Server channel that has already failed an integrity check
    async fn failed_channel() -> (WireFramer<DuplexStream>, SecureChannel<DuplexStream>) {
        let (a, b) = duplex(64 * 1024);
        let key = SessionKey::generate();

        let mut sender = SessionCipher::new(&key, Role::Initiator);
        let mut raw = WireFramer::new(a, FramerConfig::default());
        let mut server = SecureChannel::new(b, FramerConfig::default());
        server.install_cipher(SessionCipher::new(&key, Role::Responder));

        let mut ciphertext = sender.encrypt(b"Get image").unwrap();
        ciphertext[NONCE_LEN] ^= 0x01;
        raw.write_frame(&ciphertext).await.unwrap();

        assert!(matches!(server.recv().await, Err(ChannelError::Integrity)));
        assert_eq!(server.state(), HandshakeState::Failed);
        (raw, server)
    }

    #[tokio::test]
    async fn test_send_file_after_integrity_failure_is_silent() {
        let (_dir, path) = image_fixture(b"png");
        let (mut raw, mut server) = failed_channel().await;

        let before = server.bytes_sent();
        let service = FileTransferService::new(&path);
        assert!(matches!(
            service.send_file(&mut server, &path).await,
            Err(ChannelError::ChannelNotSecure)
        ));
        assert!(matches!(
            service.serve_one(&mut server).await,
            Err(ChannelError::ChannelNotSecure)
        ));
        assert_eq!(server.bytes_sent(), before);

        drop(server);
        assert!(matches!(
            raw.read_frame().await,
            Err(ChannelError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_missing_file_reported_to_peer() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.png");
        let (mut client, mut server) = secure_pair();

        let service = FileTransferService::new(&missing);
        let err = service.send_file(&mut server, &missing).await.unwrap_err();
        assert!(matches!(err, ChannelError::Io(_)));

        assert_eq!(
            client.recv_message().await.unwrap(),
            AppMessage::Status(Status::BadRequest)
        );
    }

    #[tokio::test]
    async fn test_request_file_round_trip() {
        let (_dir, path) = image_fixture(&[7u8; 100 * 1024]);
        let (mut client, mut server) = secure_pair();

        let service = FileTransferService::new(&path);
        let server_task = tokio::spawn(async move { service.serve(&mut server).await });

        let record = request_file(&mut client).await.unwrap();
        assert_eq!(record.filename, "cat.png");
        assert_eq!(record.bytes.len(), 100 * 1024);

        drop(client);
        assert_eq!(server_task.await.unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unexpected_request_rejected() {
        let (_dir, path) = image_fixture(b"png");
        let (mut client, mut server) = secure_pair();

        let service = FileTransferService::new(&path);
        let server_task = tokio::spawn(async move { service.serve_one(&mut server).await });

        client
            .send_message(&AppMessage::Status(Status::Ok))
            .await
            .unwrap();
        assert_eq!(
            client.recv_message().await.unwrap(),
            AppMessage::Status(Status::BadRequest)
        );

        let result = server_task.await.unwrap();
        assert!(matches!(result, Err(ChannelError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_request_file_refused() {
        let (mut client, mut server) = secure_pair();

        let server_task = tokio::spawn(async move {
            server.recv_message().await.unwrap();
            server
                .send_message(&AppMessage::Status(Status::BadRequest))
                .await
                .unwrap();
            server
        });

        let err = request_file(&mut client).await.unwrap_err();
        assert!(matches!(err, ChannelError::BadRequest(_)));
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_serve_one_requires_secure_channel() {
        let (a, b) = duplex(1024);
        let mut raw = WireFramer::new(a, FramerConfig::default());
        let mut server = SecureChannel::new(b, FramerConfig::default());

        let service = FileTransferService::new("cat.png");
        let err = service.serve_one(&mut server).await.unwrap_err();
        assert!(matches!(err, ChannelError::ChannelNotSecure));
        assert_eq!(raw.read_frame().await.unwrap(), vec![Status::BadRequest.to_byte()]);
    }

    #[tokio::test]
    async fn test_save_record_keeps_only_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let record = FileRecord {
            filename: "../../etc/cat.png".to_string(),
            bytes: b"meow".to_vec(),
        };

        let saved = save_record(dir.path(), &record).await.unwrap();
        assert_eq!(saved, dir.path().join("cat.png"));
        assert_eq!(std::fs::read(&saved).unwrap(), b"meow");
    }

    #[tokio::test]
    async fn test_save_record_rejects_bad_names() {
        let dir = tempfile::tempdir().unwrap();

        for name in ["", ".", ".."] {
            let record = FileRecord {
                filename: name.to_string(),
                bytes: Vec::new(),
            };
            assert!(matches!(
                save_record(dir.path(), &record).await,
                Err(ChannelError::BadRequest(_))
            ));
        }
    }
}

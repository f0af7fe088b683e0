//! Handshake Integration Tests
//!
//! Runs the RSA-OAEP handshake against a responder over loopback TCP.


use integration_harness::{image_fixture, spawn_responder};
use pixelpost_crypto::{RsaPeerKey, SessionKey};
use pixelpost_protocol::{Status, KEY_REQUEST};
use pixelpost_transport::{
    connect, ChannelError, FramerConfig, HandshakeState, Initiator, WireFramer,
    DEFAULT_CONNECT_TIMEOUT,
};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

async fn raw_framer(addr: std::net::SocketAddr) -> WireFramer<TcpStream> {
    let stream = TcpStream::connect(addr).await.expect("Failed to connect");
    WireFramer::new(stream, FramerConfig::default())
}

#[tokio::test]
async fn test_handshake_over_tcp() {
    let (_dir, image) = image_fixture();
    let mut server = spawn_responder(&image).await;

    let mut channel = connect(server.addr, DEFAULT_CONNECT_TIMEOUT, FramerConfig::default())
        .await
        .unwrap();
    Initiator::new().connect(&mut channel).await.unwrap();

    assert!(channel.is_secure());
    assert_eq!(channel.state(), HandshakeState::Secure);

    drop(channel);
    assert_eq!(server.next_outcome().await.unwrap(), 0);
}

#[tokio::test]
async fn test_wrong_first_message_rejected() {
    let (_dir, image) = image_fixture();
    let mut server = spawn_responder(&image).await;
    let mut raw = raw_framer(server.addr).await;

    raw.write_frame(b"Get image").await.unwrap();

    // BAD_REQUEST and nothing else, then the responder hangs up
    assert_eq!(raw.read_frame().await.unwrap(), vec![Status::BadRequest.to_byte()]);
    assert!(matches!(
        raw.read_frame().await,
        Err(ChannelError::ConnectionClosed)
    ));
    assert!(matches!(
        server.next_outcome().await,
        Err(ChannelError::BadRequest(_))
    ));
}

#[tokio::test]
async fn test_corrupted_session_key_rejected() {
    let (_dir, image) = image_fixture();
    let mut server = spawn_responder(&image).await;
    let mut raw = raw_framer(server.addr).await;

    raw.write_frame(KEY_REQUEST).await.unwrap();
    let peer = RsaPeerKey::import(&raw.read_frame().await.unwrap()).unwrap();
    assert_eq!(peer.modulus_bits(), 3072);

    let mut wrapped = peer.wrap_session_key(&SessionKey::generate()).unwrap();
    wrapped[0] ^= 0x01;
    raw.write_frame(&wrapped).await.unwrap();

    assert_eq!(raw.read_frame().await.unwrap(), vec![Status::BadRequest.to_byte()]);
    assert!(matches!(
        raw.read_frame().await,
        Err(ChannelError::ConnectionClosed)
    ));
    assert!(matches!(
        server.next_outcome().await,
        Err(ChannelError::Decryption)
    ));
}

#[tokio::test]
async fn test_oversized_handshake_frame_rejected() {
    let (_dir, image) = image_fixture();
    let mut server = spawn_responder(&image).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
    let mut raw = WireFramer::new(stream, FramerConfig::default());

    assert_eq!(raw.read_frame().await.unwrap(), vec![Status::BadRequest.to_byte()]);
    assert!(matches!(
        server.next_outcome().await,
        Err(ChannelError::MessageTooLarge { .. })
    ));
}

#[tokio::test]
async fn test_each_connection_gets_fresh_key() {
    let (_dir, image) = image_fixture();
    let server = spawn_responder(&image).await;

    let mut fingerprints = Vec::new();
    for _ in 0..2 {
        let mut raw = raw_framer(server.addr).await;
        raw.write_frame(KEY_REQUEST).await.unwrap();
        let peer = RsaPeerKey::import(&raw.read_frame().await.unwrap()).unwrap();
        fingerprints.push(peer.fingerprint());
    }

    assert_ne!(fingerprints[0], fingerprints[1]);
}

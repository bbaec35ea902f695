use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use ledsock::buffer::SharedBuffers;
use ledsock::compress::encode_compressed_frame;
use ledsock::config::IngressConfig;
use ledsock::network::response::{StatusResponse, STATUS_RESPONSE_SIZE};
use ledsock::network::wire::encode_pixel_frame;
use ledsock::servers::ingress::IngressServer;

async fn start_test_server() -> (std::net::SocketAddr, SharedBuffers) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = IngressConfig {
        receive_timeout_ms: 300,
        ..IngressConfig::default()
    };
    let (mut server, buffers) = IngressServer::with_buffer_manager(config);

    tokio::spawn(async move {
        server.run(listener).await.unwrap();
    });

    (addr, buffers)
}

async fn read_response(client: &mut TcpStream) -> StatusResponse {
    let mut reply = [0u8; STATUS_RESPONSE_SIZE];
    client.read_exact(&mut reply).await.unwrap();
    StatusResponse::decode(&reply).unwrap()
}

#[tokio::test]
async fn test_pixel_frame_gets_status_response() {
    let (addr, buffers) = start_test_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    client
        .write_all(&encode_pixel_frame(0, 0, 0, &[10, 20, 30, 40, 50, 60]))
        .await
        .unwrap();
    let first = read_response(&mut client).await;
    assert_eq!(first.size, STATUS_RESPONSE_SIZE as u32);
    assert_eq!(first.sequence, 0);
    assert_eq!(first.buffer_size, 500);
    assert_eq!(first.buffer_pos, 1);
    assert_eq!(first.brightness, 255.0);

    client
        .write_all(&encode_pixel_frame(0, 0, 0, &[1, 2, 3]))
        .await
        .unwrap();
    let second = read_response(&mut client).await;
    assert_eq!(second.sequence, 1);
    assert_eq!(second.buffer_pos, 2);

    let ring = buffers.0.lock().unwrap();
    assert_eq!(&ring.oldest().unwrap().colors[..], &[10, 20, 30, 40, 50, 60]);
}

#[tokio::test]
async fn test_sequence_survives_reconnect() {
    let (addr, _buffers) = start_test_server().await;
    let frame = encode_pixel_frame(0, 0, 0, &[0, 0, 0]);

    {
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&frame).await.unwrap();
        assert_eq!(read_response(&mut client).await.sequence, 0);
    }

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(&frame).await.unwrap();
    assert_eq!(read_response(&mut client).await.sequence, 1);
}

#[tokio::test]
async fn test_compressed_frame_is_buffered_silently() {
    let (addr, buffers) = start_test_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    let inner = encode_pixel_frame(2, 0, 0, &[7u8; 90]);
    client
        .write_all(&encode_compressed_frame(&inner).unwrap())
        .await
        .unwrap();

    // A plain frame afterwards proves the compressed one produced no reply
    client
        .write_all(&encode_pixel_frame(0, 0, 0, &[1, 1, 1]))
        .await
        .unwrap();
    let resp = read_response(&mut client).await;
    assert_eq!(resp.sequence, 0);
    assert_eq!(resp.buffer_pos, 2);

    let ring = buffers.0.lock().unwrap();
    assert_eq!(ring.oldest().unwrap().channel, 2);
}

#[tokio::test]
async fn test_unknown_command_closes_connection() {
    let (addr, _buffers) = start_test_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    client.write_all(&[0x00, 0x2A, 0x00, 0x00]).await.unwrap();
    let mut buf = [0u8; 1];
    let n = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf))
        .await
        .expect("server must close the connection")
        .unwrap_or(0);
    assert_eq!(n, 0);

    // The server goes back to accepting
    let mut next = TcpStream::connect(addr).await.unwrap();
    next.write_all(&encode_pixel_frame(0, 0, 0, &[5, 5, 5]))
        .await
        .unwrap();
    assert_eq!(read_response(&mut next).await.sequence, 0);
}

#[tokio::test]
async fn test_stalled_frame_times_out() {
    let (addr, _buffers) = start_test_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    // Half a header, then silence
    client.write_all(&[0x00, 0x03, 0x00, 0x00, 0x00, 0x00]).await.unwrap();
    let mut buf = [0u8; 1];
    let n = tokio::time::timeout(Duration::from_secs(3), client.read(&mut buf))
        .await
        .expect("server must drop the stalled connection")
        .unwrap_or(0);
    assert_eq!(n, 0);
}

use crate::*;

use burst_core::FILL_BYTE;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

const SLOW_TOTAL: u64 = 20_000;

/// With one slot taken, the next connection is closed without any data and
/// the listener keeps going. Once the slot frees, new clients are served.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn full_pool_sheds_connection() {
    // 200 chunks with 5ms pacing keeps the first unit busy for ~1s.
    let server = TestServer::start(send_plan(SLOW_TOTAL, 100, 5), 1).await.unwrap();

    let mut first = TcpStream::connect(server.addr).await.unwrap();
    let mut head = [0u8; 1];
    first.read_exact(&mut head).await.unwrap();
    assert_eq!(head[0], FILL_BYTE);
    assert_eq!(server.pool.active(), 1);

    let first_rest = tokio::spawn(async move {
        let mut rest = Vec::new();
        first.read_to_end(&mut rest).await.map(|_| rest.len() + 1)
    });

    let mut shed = TcpStream::connect(server.addr).await.unwrap();
    let mut got = Vec::new();
    // Orderly close or reset both mean "dropped"; neither carries payload.
    let _ = shed.read_to_end(&mut got).await;
    assert!(got.is_empty(), "shed client received {} bytes", got.len());

    assert_eq!(first_rest.await.unwrap().unwrap() as u64, SLOW_TOTAL);
    assert!(wait_until(Duration::from_secs(2), || server.pool.active() == 0).await);

    let mut third = TcpStream::connect(server.addr).await.unwrap();
    let mut all = Vec::new();
    third.read_to_end(&mut all).await.unwrap();
    assert_eq!(all.len() as u64, SLOW_TOTAL);

    server.stop().await.unwrap();
}

/// A client that vanishes mid-transfer only ends its own unit.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn aborted_client_releases_its_unit() {
    let server = TestServer::start(send_plan(REFERENCE_TOTAL, REFERENCE_CHUNK, 2), 2)
        .await
        .unwrap();

    {
        let mut quitter = TcpStream::connect(server.addr).await.unwrap();
        let mut head = [0u8; 16];
        quitter.read_exact(&mut head).await.unwrap();
        // Dropping with unread data pending resets the connection.
    }

    assert!(
        wait_until(Duration::from_secs(5), || server.pool.active() == 0).await,
        "send unit still running after peer reset"
    );

    let mut next = TcpStream::connect(server.addr).await.unwrap();
    let mut all = Vec::new();
    next.read_to_end(&mut all).await.unwrap();
    assert_eq!(all.len() as u64, REFERENCE_TOTAL);

    server.stop().await.unwrap();
}

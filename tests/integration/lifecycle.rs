use crate::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use burst_services::{run_cycle, ClientSupervisor, CycleOutcome, ReceiveOutcome};
use tokio::io::AsyncWriteExt;

const SMALL_TOTAL: u64 = 1_000;

/// Listener whose n-th connection is handled by `script(n, stream)`.
async fn scripted_server<F, Fut>(script: F) -> Result<(SocketAddr, Arc<AtomicUsize>)>
where
    F: Fn(usize, tokio::net::TcpStream) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
    let addr = listener.local_addr()?;
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(script(n, stream));
        }
    });
    Ok((addr, accepted))
}

/// Early close, then silence, then a full transfer: every cycle aims for
/// the whole payload on its own.
#[tokio::test]
async fn every_cycle_targets_full_payload() {
    let (addr, _) = scripted_server(|n, mut stream| async move {
        match n {
            0 => {
                let _ = stream.write_all(&[b'A'; 300]).await;
            }
            1 => tokio::time::sleep(Duration::from_secs(2)).await,
            _ => {
                let _ = stream.write_all(&[b'A'; SMALL_TOTAL as usize]).await;
            }
        }
    })
    .await
    .unwrap();

    let settings = client_settings(addr, SMALL_TOTAL, Duration::from_millis(150));
    let mut reports = Vec::new();
    for _ in 0..3 {
        match run_cycle(&settings).await {
            CycleOutcome::Completed(r) => reports.push(r),
            other => panic!("unexpected {other:?}"),
        }
    }

    assert!(reports.iter().all(|r| r.target == SMALL_TOTAL));
    assert_eq!((reports[0].received, reports[0].outcome), (300, ReceiveOutcome::PeerClosed));
    assert_eq!((reports[1].received, reports[1].outcome), (0, ReceiveOutcome::IdleTimeout));
    assert_eq!(reports[2].received, SMALL_TOTAL);
    assert!(reports[2].is_complete());
}

/// The supervisor keeps reconnecting until told to stop.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn supervisor_reconnects_until_shutdown() {
    let (addr, accepted) = scripted_server(|_, mut stream| async move {
        let _ = stream.write_all(&[b'A'; SMALL_TOTAL as usize]).await;
    })
    .await
    .unwrap();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let supervisor = ClientSupervisor::new(
        client_settings(addr, SMALL_TOTAL, Duration::from_secs(1)),
        LinkSignal::connected(),
        shutdown_rx,
    );
    let task = tokio::spawn(supervisor.run());

    assert!(
        wait_until(Duration::from_secs(5), || accepted.load(Ordering::SeqCst) >= 3).await,
        "client did not reconnect"
    );

    shutdown_tx.send(()).unwrap();
    task.await.unwrap().unwrap();
}

/// A client whose link never comes up gives up instead of connecting.
#[tokio::test]
async fn supervisor_requires_link() {
    let (addr, accepted) = scripted_server(|_, _| async {}).await.unwrap();

    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut settings = client_settings(addr, SMALL_TOTAL, Duration::from_secs(1));
    settings.link_timeout = Some(Duration::from_millis(50));

    let result = ClientSupervisor::new(settings, LinkSignal::new(), shutdown_rx).run().await;
    assert!(result.is_err());
    assert_eq!(accepted.load(Ordering::SeqCst), 0);
}

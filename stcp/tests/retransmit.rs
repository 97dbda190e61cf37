//! Integration tests for timeout and duplicate-ACK retransmission, window
//! admission and zero-window stalls.

mod common;

use std::time::Duration;

use stcp::packet::flags;
use stcp::{ConnError, Connection, StcpConfig};
use tokio::time::Instant;

use common::{client_for, fast_config, Peer};

/// Three identical ACKs resend the matching segment well before the RTO.
#[tokio::test]
async fn triple_duplicate_ack_triggers_fast_retransmit() {
    let config = StcpConfig {
        initial_rto: Duration::from_secs(3),
        max_rto: Duration::from_secs(6),
        mss: 4,
        ..StcpConfig::default()
    };
    let mut peer = Peer::bind().await;
    let sock = client_for(peer.addr()).await;
    let client = tokio::spawn(async move {
        let mut conn = Connection::open(sock, config).await?;
        conn.send(b"aaaabbbbcccc").await?;
        conn.flush().await?;
        Ok::<_, ConnError>(conn)
    });

    let base = peer.accept(100).await;
    for i in 0..3u32 {
        let seg = peer.recv(Duration::from_secs(1)).await.expect("data segment");
        assert_eq!(seg.header.seq, base.wrapping_add(4 * i));
    }

    // Segment "bbbb" is reported missing three times.
    let started = Instant::now();
    let missing = base.wrapping_add(4);
    for _ in 0..3 {
        peer.ack(missing, 100).await;
    }
    let resent = peer.recv(Duration::from_secs(1)).await.expect("fast retransmit");
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(resent.header.seq, missing);
    assert_eq!(resent.payload, b"bbbb");

    peer.ack(base.wrapping_add(12), 100).await;
    let conn = client.await.unwrap().expect("flush failed");
    assert!(conn.window.is_empty());
    assert_eq!(conn.window.bytes_in_flight(), 0);
}

/// An unacknowledged head is resent unchanged with a doubling gap, and a
/// fresh ACK snaps the RTO back to its initial value.
#[tokio::test]
async fn timeout_resends_head_with_backoff() {
    let config = StcpConfig {
        initial_rto: Duration::from_millis(100),
        max_rto: Duration::from_secs(2),
        ..StcpConfig::default()
    };
    let mut peer = Peer::bind().await;
    let sock = client_for(peer.addr()).await;
    let client = tokio::spawn(async move {
        let mut conn = Connection::open(sock, config).await?;
        conn.send(b"payload").await?;
        conn.flush().await?;
        Ok::<_, ConnError>(conn)
    });

    let base = peer.accept(5000).await;
    let original = peer.recv(Duration::from_secs(1)).await.expect("data");
    let t0 = Instant::now();
    let first = peer.recv(Duration::from_secs(2)).await.expect("1st retransmit");
    let t1 = Instant::now();
    let second = peer.recv(Duration::from_secs(2)).await.expect("2nd retransmit");
    let t2 = Instant::now();

    assert_eq!(first, original);
    assert_eq!(second, original);
    assert_eq!(original.header.seq, base);
    assert!(t2 - t1 > t1 - t0, "gap should grow: {:?} then {:?}", t1 - t0, t2 - t1);

    peer.ack(base.wrapping_add(7), 5000).await;
    let conn = client.await.unwrap().expect("flush failed");
    assert_eq!(conn.rto(), Duration::from_millis(100));
}

#[tokio::test]
async fn unacknowledged_data_exhausts_retries() {
    let config = StcpConfig {
        max_retries: 2,
        ..fast_config()
    };
    let mut peer = Peer::bind().await;
    let sock = client_for(peer.addr()).await;
    let client = tokio::spawn(async move {
        let mut conn = Connection::open(sock, config).await?;
        conn.send(b"never acked").await?;
        conn.flush().await
    });

    peer.accept(5000).await;
    let mut copies = 0;
    while peer.recv(Duration::from_secs(1)).await.is_some() {
        copies += 1;
    }

    let result = client.await.unwrap();
    assert!(matches!(result, Err(ConnError::MaxRetriesExceeded(3))), "{result:?}");
    assert_eq!(copies, 3);
}

/// A buffer larger than the window goes out in window-sized rounds.
#[tokio::test]
async fn send_larger_than_window_waits_for_room() {
    let config = StcpConfig {
        initial_rto: Duration::from_millis(500),
        max_rto: Duration::from_secs(2),
        mss: 10,
        ..StcpConfig::default()
    };
    let mut peer = Peer::bind().await;
    let sock = client_for(peer.addr()).await;
    let data: Vec<u8> = (0..100u8).collect();
    let expected = data.clone();
    let client = tokio::spawn(async move {
        let mut conn = Connection::open(sock, config).await?;
        conn.send(&data).await?;
        conn.flush().await?;
        Ok::<_, ConnError>(conn)
    });

    let base = peer.accept(30).await;
    let mut received = Vec::new();
    while received.len() < expected.len() {
        // At most one window's worth arrives before we acknowledge.
        let mut round = 0;
        while let Some(seg) = peer.recv(Duration::from_millis(30)).await {
            if seg.header.seq != base.wrapping_add(received.len() as u32) {
                continue; // a retransmission we already have
            }
            assert!(seg.payload.len() <= 10);
            round += seg.payload.len();
            received.extend_from_slice(&seg.payload);
            if round == 30 {
                break;
            }
        }
        assert!(round <= 30, "window overrun: {round}");
        peer.ack(base.wrapping_add(received.len() as u32), 30).await;
    }

    let conn = client.await.unwrap().expect("transfer failed");
    assert_eq!(received, expected);
    assert!(conn.window.is_empty());
}

/// A zero window stalls new data until a probe brings back a usable window.
#[tokio::test]
async fn zero_window_is_probed_until_it_opens() {
    let mut peer = Peer::bind().await;
    let sock = client_for(peer.addr()).await;
    let client = tokio::spawn(async move {
        let mut conn = Connection::open(sock, fast_config()).await?;
        conn.send(b"xyz").await?;
        conn.flush().await
    });

    let base = peer.accept(0).await;
    let probe = peer.recv(Duration::from_secs(1)).await.expect("window probe");
    assert!(probe.payload.is_empty());
    assert!(probe.has(flags::ACK));
    assert_eq!(probe.header.seq, base);

    peer.ack(base, 100).await;
    let data = loop {
        let seg = peer.recv(Duration::from_secs(1)).await.expect("data after window opens");
        if !seg.payload.is_empty() {
            break seg;
        }
    };
    assert_eq!(data.payload, b"xyz");
    peer.ack(base.wrapping_add(3), 100).await;

    client.await.unwrap().expect("flush failed");
}

/// A peer that keeps answering probes with a zero window is alive; the
/// sender keeps probing instead of running out of retries.
#[tokio::test]
async fn answered_zero_window_probes_do_not_exhaust_retries() {
    let config = StcpConfig {
        max_retries: 2,
        ..fast_config()
    };
    let mut peer = Peer::bind().await;
    let sock = client_for(peer.addr()).await;
    let client = tokio::spawn(async move {
        let mut conn = Connection::open(sock, config).await?;
        conn.send(b"xyz").await?;
        conn.flush().await
    });

    let base = peer.accept(0).await;
    let mut answered = 0;
    while answered < 6 {
        let probe = peer.recv(Duration::from_secs(2)).await.expect("window probe");
        assert!(probe.payload.is_empty());
        assert_eq!(probe.header.seq, base);
        peer.ack(base, 0).await;
        answered += 1;
    }

    peer.ack(base, 100).await;
    let data = loop {
        let seg = peer.recv(Duration::from_secs(2)).await.expect("data after window opens");
        if !seg.payload.is_empty() {
            break seg;
        }
    };
    assert_eq!(data.payload, b"xyz");
    peer.ack(base.wrapping_add(3), 100).await;

    client.await.unwrap().expect("zero window aborted the transfer");
}

/// When the fast retransmission is lost too, the head keeps being resent
/// with a growing gap until a fresh ACK arrives.
#[tokio::test]
async fn lost_fast_retransmit_backs_off_until_acked() {
    let config = StcpConfig {
        initial_rto: Duration::from_millis(100),
        max_rto: Duration::from_secs(2),
        mss: 4,
        ..StcpConfig::default()
    };
    let mut peer = Peer::bind().await;
    let sock = client_for(peer.addr()).await;
    let client = tokio::spawn(async move {
        let mut conn = Connection::open(sock, config).await?;
        conn.send(b"aaaabbbbcccc").await?;
        conn.flush().await?;
        Ok::<_, ConnError>(conn)
    });

    let base = peer.accept(100).await;
    for _ in 0..3 {
        peer.recv(Duration::from_secs(1)).await.expect("data segment");
    }
    let missing = base.wrapping_add(4);
    for _ in 0..3 {
        peer.ack(missing, 100).await;
    }

    let fast = peer.recv(Duration::from_secs(1)).await.expect("fast retransmit");
    let t0 = Instant::now();
    let first = peer.recv(Duration::from_secs(2)).await.expect("1st resend");
    let t1 = Instant::now();
    let second = peer.recv(Duration::from_secs(2)).await.expect("2nd resend");
    let t2 = Instant::now();

    for seg in [&fast, &first, &second] {
        assert_eq!(seg.header.seq, missing);
        assert_eq!(seg.payload, b"bbbb");
    }
    assert!(t2 - t1 > t1 - t0, "gap should grow: {:?} then {:?}", t1 - t0, t2 - t1);

    peer.ack(base.wrapping_add(12), 100).await;
    let conn = client.await.unwrap().expect("flush failed");
    assert!(conn.window.is_empty());
    assert_eq!(conn.rto(), Duration::from_millis(100));
}

#[tokio::test]
async fn lost_fast_retransmit_exhausts_retries() {
    let config = StcpConfig {
        max_retries: 2,
        mss: 4,
        ..fast_config()
    };
    let mut peer = Peer::bind().await;
    let sock = client_for(peer.addr()).await;
    let client = tokio::spawn(async move {
        let mut conn = Connection::open(sock, config).await?;
        conn.send(b"aaaabbbb").await?;
        conn.flush().await
    });

    let base = peer.accept(100).await;
    for _ in 0..2 {
        peer.recv(Duration::from_secs(1)).await.expect("data segment");
    }
    let missing = base.wrapping_add(4);
    for _ in 0..3 {
        peer.ack(missing, 100).await;
    }

    let mut copies = 0;
    while let Some(seg) = peer.recv(Duration::from_secs(1)).await {
        assert_eq!(seg.header.seq, missing);
        copies += 1;
    }

    let result = client.await.unwrap();
    assert!(matches!(result, Err(ConnError::MaxRetriesExceeded(3))), "{result:?}");
    // The fast retransmission plus one resend per tolerated timeout.
    assert_eq!(copies, 3);
}

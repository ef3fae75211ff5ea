use ecgstream::buffers::bounded;
use std::thread;
use tokio_test::{assert_pending, assert_ready_eq, task};

#[test]
fn test_drop_oldest_keeps_latest_three() {
    let (tx, rx) = bounded(3).unwrap();
    for v in 1..=5 {
        tx.send(v);
    }

    assert_eq!(rx.try_receive_all(), vec![3, 4, 5]);
    assert_eq!(tx.stats().evicted, 2);
}

#[test]
fn test_overflow_retains_last_capacity_values() {
    for capacity in [1usize, 2, 7, 64] {
        for sends in [capacity + 1, capacity * 3, capacity * 10 + 3] {
            let (tx, rx) = bounded(capacity).unwrap();
            for v in 0..sends {
                tx.send(v);
            }

            let expected: Vec<usize> = (sends - capacity..sends).collect();
            assert_eq!(rx.try_receive_all(), expected, "capacity {} sends {}", capacity, sends);
        }
    }
}

#[test]
fn test_receive_all_under_capacity() {
    let (tx, rx) = bounded(10).unwrap();
    for v in [0.5f32, -0.25, 1.0, 0.0] {
        tx.send(v);
    }

    assert_eq!(rx.try_receive_all(), vec![0.5, -0.25, 1.0, 0.0]);
    assert!(rx.try_receive_all().is_empty());
}

#[test]
fn test_close_keeps_buffered_values() {
    let (tx, rx) = bounded(4).unwrap();
    tx.send(1);
    tx.send(2);
    tx.close();
    tx.send(3);

    assert!(rx.is_closed());
    assert_eq!(rx.try_receive_all(), vec![1, 2]);
}

#[test]
fn test_recv_waits_for_send() {
    let (tx, mut rx) = bounded::<f32>(4).unwrap();
    let mut recv = task::spawn(rx.recv());

    assert_pending!(recv.poll());
    tx.send(0.75);
    assert!(recv.is_woken());
    assert_ready_eq!(recv.poll(), Some(0.75));
}

#[test]
fn test_recv_ends_after_close_and_drain() {
    let (tx, mut rx) = bounded::<u32>(4).unwrap();
    tx.send(9);
    tx.close();

    {
        let mut first = task::spawn(rx.recv());
        assert_ready_eq!(first.poll(), Some(9));
    }
    let mut second = task::spawn(rx.recv());
    assert_ready_eq!(second.poll(), None);
}

#[test]
fn test_close_wakes_pending_recv() {
    let (tx, mut rx) = bounded::<u32>(4).unwrap();
    let mut recv = task::spawn(rx.recv());

    assert_pending!(recv.poll());
    tx.close();
    assert!(recv.is_woken());
    assert_ready_eq!(recv.poll(), None);
}

#[test]
fn test_concurrent_send_preserves_order() {
    let (tx, rx) = bounded::<u64>(100).unwrap();
    const TOTAL: u64 = 50_000;

    let producer = thread::spawn(move || {
        for v in 0..TOTAL {
            tx.send(v);
        }
        tx.close();
    });

    let mut received = Vec::new();
    loop {
        let closed = rx.is_closed();
        let batch = rx.try_receive_all();
        assert!(batch.len() <= 100);
        received.extend(batch);
        if closed && rx.is_empty() {
            break;
        }
        thread::yield_now();
    }
    producer.join().unwrap();

    assert!(received.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(*received.last().unwrap(), TOTAL - 1);

    let stats = rx.stats();
    assert_eq!(stats.sent, TOTAL);
    assert_eq!(stats.evicted + received.len() as u64, TOTAL);
}

#[tokio::test]
async fn test_recv_across_tasks() {
    let (tx, mut rx) = bounded::<u32>(16).unwrap();

    let consumer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(v) = rx.recv().await {
            seen.push(v);
        }
        seen
    });

    for v in 0..10 {
        tx.send(v);
        tokio::task::yield_now().await;
    }
    tx.close();

    assert_eq!(consumer.await.unwrap(), (0..10).collect::<Vec<_>>());
}

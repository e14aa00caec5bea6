//! Stream primitive: backpressure, competing readers, closure and cancellation.

mod test_data_gen;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sluice::{Context, Halted, StreamConfig};
use test_data_gen::eventually;

fn ctx_with_capacity(capacity: usize) -> Context {
    Context::new(StreamConfig::default().with_capacity(capacity)).unwrap()
}

#[test]
fn test_writer_blocks_when_stream_is_full() {
    let ctx = ctx_with_capacity(2);
    let (tx, rx) = ctx.channel::<u32>();
    let sent = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&sent);
    let producer = thread::spawn(move || {
        for i in 0..10 {
            tx.send(i).unwrap();
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    thread::sleep(Duration::from_millis(50));
    assert_eq!(sent.load(Ordering::SeqCst), 2, "third write should block");
    assert_eq!(rx.len(), 2);
    assert_eq!(rx.capacity(), 2);

    assert_eq!(rx.recv(), Some(0));
    assert!(eventually(|| sent.load(Ordering::SeqCst) == 3));

    let rest: Vec<_> = rx.collect();
    assert_eq!(rest, (1..10).collect::<Vec<_>>());
    producer.join().unwrap();
}

#[test]
fn test_competing_readers_get_disjoint_values() {
    let ctx = ctx_with_capacity(16);
    let stream = ctx.from_iter(0..2000u32);

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let reader = stream.clone();
            thread::spawn(move || reader.collect::<Vec<_>>())
        })
        .collect();
    drop(stream);

    let mut seen = HashSet::new();
    let mut total = 0;
    for handle in readers {
        let part = handle.join().unwrap();
        total += part.len();
        seen.extend(part);
    }
    assert_eq!(total, 2000);
    assert_eq!(seen.len(), 2000);
}

#[test]
fn test_try_recv_on_empty_open_stream() {
    let ctx = ctx_with_capacity(4);
    let (tx, rx) = ctx.channel::<u8>();
    assert_eq!(rx.try_recv(), None);
    tx.send(7).unwrap();
    assert_eq!(rx.try_recv(), Some(7));
    drop(tx);
    assert_eq!(rx.recv(), None);
}

#[test]
fn test_cancel_unblocks_producer_and_reader() {
    let ctx = ctx_with_capacity(1);
    let (tx, rx) = ctx.channel::<u32>();
    tx.send(1).unwrap();

    let writer = thread::spawn(move || tx.send(2));
    let (_idle_tx, idle_rx) = ctx.channel::<u32>();
    let reader = thread::spawn(move || idle_rx.recv());

    thread::sleep(Duration::from_millis(20));
    ctx.cancel();

    assert_eq!(writer.join().unwrap(), Err(Halted::Cancelled));
    assert_eq!(reader.join().unwrap(), None);
    assert_eq!(rx.recv(), None);
}

#[test]
fn test_abandoned_stream_releases_producer() {
    let ctx = ctx_with_capacity(2);
    let stream = ctx.from_iter(0u64..);
    assert_eq!(stream.take(3).count(), 3);
    // `take` consumed and dropped the only reader.
    assert!(eventually(|| ctx.active_tasks() == 0));
}

#[test]
fn test_every_operator_task_exits_after_close() {
    let ctx = ctx_with_capacity(4);
    let out: Vec<_> = ctx
        .from_iter(0..100)
        .map(|x| x + 1)
        .filter(|x| x % 2 == 0)
        .window(7)
        .collect();
    assert_eq!(out.iter().map(Vec::len).sum::<usize>(), 50);
    assert!(eventually(|| ctx.active_tasks() == 0));
}

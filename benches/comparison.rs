//! Comparison benchmarks: relay queues vs channel crates

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use crossbeam_channel::bounded;
use relay_queue::{Blocking, MpmcQueue, TicketQueue};
use std::sync::mpsc::sync_channel;
use std::sync::Arc;
use std::thread;

const MESSAGES: usize = 100_000;
const BUFFER_SIZE: usize = 1024;

fn bench_1p_1c(c: &mut Criterion) {
    let mut group = c.benchmark_group("1p_1c");
    group.throughput(Throughput::Elements(MESSAGES as u64));

    group.bench_function("relay_ticket", |b| {
        b.iter(|| {
            let queue = Arc::new(TicketQueue::new(BUFFER_SIZE));
            let producer = {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..MESSAGES {
                        queue.push(black_box(i));
                    }
                })
            };
            let consumer = {
                let queue = queue.clone();
                thread::spawn(move || {
                    for _ in 0..MESSAGES {
                        black_box(queue.pop());
                    }
                })
            };
            producer.join().unwrap();
            consumer.join().unwrap();
        });
    });

    group.bench_function("relay_blocking_ring", |b| {
        b.iter(|| {
            let queue = Arc::new(Blocking::new(MpmcQueue::new(BUFFER_SIZE)));
            let producer = {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..MESSAGES {
                        queue.push(black_box(i));
                    }
                })
            };
            let consumer = {
                let queue = queue.clone();
                thread::spawn(move || {
                    for _ in 0..MESSAGES {
                        black_box(queue.pop());
                    }
                })
            };
            producer.join().unwrap();
            consumer.join().unwrap();
        });
    });

    group.bench_function("crossbeam_channel", |b| {
        b.iter(|| {
            let (tx, rx) = bounded::<usize>(BUFFER_SIZE);
            let producer = thread::spawn(move || {
                for i in 0..MESSAGES {
                    tx.send(black_box(i)).unwrap();
                }
            });
            let consumer = thread::spawn(move || {
                for _ in 0..MESSAGES {
                    rx.recv().unwrap();
                }
            });
            producer.join().unwrap();
            consumer.join().unwrap();
        });
    });

    group.bench_function("std_mpsc", |b| {
        b.iter(|| {
            let (tx, rx) = sync_channel::<usize>(BUFFER_SIZE);
            let producer = thread::spawn(move || {
                for i in 0..MESSAGES {
                    tx.send(black_box(i)).unwrap();
                }
            });
            let consumer = thread::spawn(move || {
                for _ in 0..MESSAGES {
                    rx.recv().unwrap();
                }
            });
            producer.join().unwrap();
            consumer.join().unwrap();
        });
    });

    group.finish();
}

fn bench_4p_4c(c: &mut Criterion) {
    let mut group = c.benchmark_group("4p_4c");
    group.throughput(Throughput::Elements(MESSAGES as u64));
    const WORKERS: usize = 4;
    const PER_WORKER: usize = MESSAGES / WORKERS;

    group.bench_function("relay_ticket", |b| {
        b.iter(|| {
            let queue = Arc::new(TicketQueue::new(BUFFER_SIZE));
            let mut handles = Vec::new();
            for p in 0..WORKERS {
                let queue = queue.clone();
                handles.push(thread::spawn(move || {
                    for i in 0..PER_WORKER {
                        queue.push(black_box(p * PER_WORKER + i));
                    }
                }));
            }
            for _ in 0..WORKERS {
                let queue = queue.clone();
                handles.push(thread::spawn(move || {
                    for _ in 0..PER_WORKER {
                        black_box(queue.pop());
                    }
                }));
            }
            for h in handles {
                h.join().unwrap();
            }
        });
    });

    group.bench_function("relay_blocking_ring", |b| {
        b.iter(|| {
            let queue = Arc::new(Blocking::new(MpmcQueue::new(BUFFER_SIZE)));
            let mut handles = Vec::new();
            for p in 0..WORKERS {
                let queue = queue.clone();
                handles.push(thread::spawn(move || {
                    for i in 0..PER_WORKER {
                        queue.push(black_box(p * PER_WORKER + i));
                    }
                }));
            }
            for _ in 0..WORKERS {
                let queue = queue.clone();
                handles.push(thread::spawn(move || {
                    for _ in 0..PER_WORKER {
                        black_box(queue.pop());
                    }
                }));
            }
            for h in handles {
                h.join().unwrap();
            }
        });
    });

    group.bench_function("crossbeam_channel", |b| {
        b.iter(|| {
            let (tx, rx) = bounded::<usize>(BUFFER_SIZE);
            let mut handles = Vec::new();
            for p in 0..WORKERS {
                let tx = tx.clone();
                handles.push(thread::spawn(move || {
                    for i in 0..PER_WORKER {
                        tx.send(black_box(p * PER_WORKER + i)).unwrap();
                    }
                }));
            }
            drop(tx);
            for _ in 0..WORKERS {
                let rx = rx.clone();
                handles.push(thread::spawn(move || {
                    for _ in 0..PER_WORKER {
                        rx.recv().unwrap();
                    }
                }));
            }
            for h in handles {
                h.join().unwrap();
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_1p_1c, bench_4p_4c);
criterion_main!(benches);

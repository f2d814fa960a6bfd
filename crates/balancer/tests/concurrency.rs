use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use framebal::{Balancer, BalancerConfig, BalancerRegistry, Continuation, Handle, ItemState};

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn public_types_cross_threads() {
    assert_send_sync::<Balancer>();
    assert_send_sync::<Handle>();
    assert_send_sync::<BalancerRegistry>();
}

#[test]
fn schedule_from_other_threads_while_ticking() {
    let b = Balancer::new("shared", BalancerConfig::new(8, 0.5, 400, 4)).unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let producers = 4;
    let per_producer = 50;

    thread::scope(|s| {
        for _ in 0..producers {
            let b = b.clone();
            let hits = Arc::clone(&hits);
            s.spawn(move || {
                for _ in 0..per_producer {
                    let hits = Arc::clone(&hits);
                    b.execute_once(
                        move |_| {
                            hits.fetch_add(1, Ordering::Relaxed);
                        },
                        0.0,
                    )
                    .unwrap();
                    thread::yield_now();
                }
            });
        }

        let mut now = 0.0;
        for _ in 0..100_000 {
            if hits.load(Ordering::Relaxed) == producers * per_producer {
                break;
            }
            now += 1.0 / 60.0;
            b.tick(now);
        }
    });

    assert_eq!(hits.load(Ordering::Relaxed), producers * per_producer);
    assert!(b.is_empty());
    assert_eq!(b.metrics().retired, (producers * per_producer) as u64);
}

#[test]
fn stop_from_another_thread() {
    let b = Balancer::new("shared", BalancerConfig::new(1, 1.0, 10, 1)).unwrap();
    let handle = b.schedule(|_| Continuation::Continue, 0.0, true).unwrap();
    b.tick(0.0);

    thread::scope(|s| {
        let handle = handle.clone();
        s.spawn(move || handle.stop());
    });

    assert_eq!(handle.state(), Some(ItemState::Cancelled));
    let report = b.tick(1.0);
    assert_eq!(report.executed, 0);
    assert!(b.is_empty());
}

#[test]
fn registry_ticks_from_worker_thread() {
    let registry = BalancerRegistry::with_presets().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    {
        let hits = Arc::clone(&hits);
        registry
            .get("ai")
            .unwrap()
            .execute(
                move |_| {
                    hits.fetch_add(1, Ordering::Relaxed);
                    Continuation::Continue
                },
                0.5,
            )
            .unwrap();
    }

    thread::scope(|s| {
        s.spawn(|| {
            for frame in 0..=60 {
                registry.tick_all(frame as f64 / 60.0);
            }
        });
    });

    // due at 0.5 and 1.0
    assert_eq!(hits.load(Ordering::Relaxed), 2);
}

//! End-to-end scenarios for the event dispatch loop.
//!
//! These tests exercise the real owning queue, which installs the
//! process-wide instance and the interrupt watcher, so they serialise on
//! a shared lock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use deskspan_queue::{
    Event, EventQueue, EventType, QueueConfig, SimpleEventBuffer, Target, TimerFired,
};

static INSTANCE: Mutex<()> = Mutex::new(());

fn exclusive() -> MutexGuard<'static, ()> {
    INSTANCE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Payload that counts its own destruction, for leak accounting.
struct DropGuard(Arc<AtomicUsize>);

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn register_post_dispatch_then_time_out() {
    let _guard = exclusive();
    let queue = EventQueue::new().expect("install queue");

    let foo = queue.register_type("foo");
    assert_eq!(foo.as_raw(), 5, "first client id follows the sentinel");

    let target = Target::new();
    let deliveries = Arc::new(AtomicUsize::new(0));
    {
        let deliveries = deliveries.clone();
        queue.adopt_handler(foo, target, move |event: &Event| {
            assert_eq!(event.data::<String>().map(String::as_str), Some("x"));
            deliveries.fetch_add(1, Ordering::SeqCst);
        });
    }

    queue.post(Event::with_data(foo, target, "x".to_string()));

    let event = queue
        .next_event(Some(Duration::from_secs(1)))
        .expect("one delivery");
    assert!(queue.dispatch(&event));
    assert_eq!(deliveries.load(Ordering::SeqCst), 1);

    let started = Instant::now();
    assert!(queue.next_event(Some(Duration::from_millis(100))).is_none());
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[test]
fn repeating_timer_accounts_for_every_period() {
    let _guard = exclusive();
    let queue = EventQueue::new().expect("install queue");

    let timer = queue.new_timer(Duration::from_millis(50), None);
    let started = Instant::now();
    let mut deliveries = 0u32;
    let mut missed = 0u32;

    while started.elapsed() < Duration::from_millis(280) {
        if let Some(event) = queue.next_event(Some(Duration::from_millis(10))) {
            assert_eq!(event.event_type(), EventType::TIMER);
            let fired = *event.data::<TimerFired>().expect("timer payload");
            assert_eq!(fired.timer, timer);
            deliveries += 1;
            missed += fired.count;
        }
    }
    queue.delete_timer(timer);

    // 280ms of a 50ms timer is five periods; delivered plus missed must
    // account for all of them, give or take scheduler jitter.
    let total = deliveries + missed;
    assert!(
        (4..=6).contains(&total),
        "expected about 5 periods, got {deliveries} deliveries and {missed} missed"
    );
}

#[test]
fn deleted_one_shot_timer_never_fires() {
    let _guard = exclusive();
    let queue = EventQueue::new().expect("install queue");

    let timer = queue.new_one_shot_timer(Duration::from_millis(100), None);
    thread::sleep(Duration::from_millis(50));
    queue.delete_timer(timer);

    assert!(queue.next_event(Some(Duration::from_millis(300))).is_none());
}

#[test]
fn typed_handler_wins_over_catch_all() {
    let _guard = exclusive();
    let queue = EventQueue::new().expect("install queue");

    let typed_type = queue.register_type("typed");
    let other_type = queue.register_type("other");
    let target = Target::new();
    let typed_hits = Arc::new(AtomicUsize::new(0));
    let fallback_hits = Arc::new(AtomicUsize::new(0));
    {
        let typed_hits = typed_hits.clone();
        queue.adopt_handler(typed_type, target, move |_: &Event| {
            typed_hits.fetch_add(1, Ordering::SeqCst);
        });
    }
    {
        let fallback_hits = fallback_hits.clone();
        queue.adopt_catch_all(target, move |_: &Event| {
            fallback_hits.fetch_add(1, Ordering::SeqCst);
        });
    }

    queue.post(Event::new(typed_type, target));
    queue.post(Event::new(other_type, target));
    for _ in 0..2 {
        let event = queue
            .next_event(Some(Duration::from_secs(1)))
            .expect("delivery");
        assert!(queue.dispatch(&event));
    }

    assert_eq!(typed_hits.load(Ordering::SeqCst), 1);
    assert_eq!(fallback_hits.load(Ordering::SeqCst), 1);
}

#[test]
fn concurrent_producers_deliver_everything_without_leaks() {
    let _guard = exclusive();
    let queue = EventQueue::new().expect("install queue");

    const PER_PRODUCER: usize = 1000;
    let ping = queue.register_type("ping");
    let target = Target::new();
    let drops = Arc::new(AtomicUsize::new(0));
    let deliveries = Arc::new(AtomicUsize::new(0));
    {
        let deliveries = deliveries.clone();
        queue.adopt_handler(ping, target, move |_: &Event| {
            deliveries.fetch_add(1, Ordering::SeqCst);
        });
    }

    let producers: Vec<_> = (0..2)
        .map(|_| {
            let handle = queue.handle();
            let drops = drops.clone();
            thread::spawn(move || {
                for _ in 0..PER_PRODUCER {
                    handle.post(Event::with_data(ping, target, DropGuard(drops.clone())));
                }
            })
        })
        .collect();

    let mut seen = 0;
    while seen < 2 * PER_PRODUCER {
        let event = queue
            .next_event(Some(Duration::from_secs(5)))
            .expect("delivery before timeout");
        assert!(queue.dispatch(&event));
        seen += 1;
    }

    for producer in producers {
        producer.join().expect("producer thread");
    }

    assert_eq!(deliveries.load(Ordering::SeqCst), 2 * PER_PRODUCER);
    assert_eq!(
        drops.load(Ordering::SeqCst),
        2 * PER_PRODUCER,
        "every payload must be destroyed exactly once"
    );
    assert!(queue.next_event(Some(Duration::ZERO)).is_none());
}

#[test]
fn raised_interrupt_surfaces_as_a_quit_event() {
    let _guard = exclusive();
    let queue = EventQueue::new().expect("install queue");

    signal_hook::low_level::raise(signal_hook::consts::SIGINT).expect("raise SIGINT");

    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        match queue.next_event(Some(Duration::from_millis(100))) {
            Some(event) if event.event_type() == EventType::QUIT => break,
            Some(_) => continue,
            None => assert!(Instant::now() < deadline, "no quit event within deadline"),
        }
    }
}

#[test]
fn swapping_the_buffer_drops_pending_payloads() {
    let _guard = exclusive();
    let queue = EventQueue::new().expect("install queue");

    let ping = queue.register_type("ping");
    let drops = Arc::new(AtomicUsize::new(0));
    queue.post(Event::with_data(ping, Target::none(), DropGuard(drops.clone())));
    queue.post(Event::with_data(ping, Target::none(), DropGuard(drops.clone())));
    assert!(!queue.is_empty());

    queue.adopt_buffer(SimpleEventBuffer::default());

    assert!(queue.is_empty());
    assert_eq!(drops.load(Ordering::SeqCst), 2);
    assert_eq!(queue.metrics().buffers_swapped, 1);
    assert!(queue.next_event(Some(Duration::ZERO)).is_none());
}

#[test]
fn full_buffer_drops_the_overflow_payload() {
    let _guard = exclusive();
    let mut config = QueueConfig::default();
    config.limits.max_pending_events = 2;
    let queue = EventQueue::with_config(config).expect("install queue");

    let ping = queue.register_type("ping");
    let drops = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        queue.post(Event::with_data(ping, Target::none(), DropGuard(drops.clone())));
    }

    // The refused post reclaimed its payload immediately.
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(queue.metrics().dropped, 1);

    let mut delivered = 0;
    while queue.next_event(Some(Duration::ZERO)).is_some() {
        delivered += 1;
    }
    assert_eq!(delivered, 2);
    assert_eq!(drops.load(Ordering::SeqCst), 3);
}

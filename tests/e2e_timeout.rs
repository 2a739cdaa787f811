//! Fixed-duration timeout E2E test suite.
//!
//! Drives the timeout operator through a virtual clock (plus two ambient
//! real-clock checks and one genuinely threaded race), covering: windows
//! that reset on arrival, deterministic expiry, fallback switching,
//! cancellation propagation, and race exclusivity.
//!
//! Run with: `cargo test --test e2e_timeout`

mod common {
    pub fn init_test_logging() {
        // Initialize tracing for tests if not already done
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_test_writer()
            .try_init();
    }
}

/// Phase tracking macro for structured test logging.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(test = $name, "=== TEST START ===");
    };
}

/// Assertion with logging for better test output.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        if !$cond {
            tracing::error!(
                message = $msg,
                expected = ?$expected,
                actual = ?$actual,
                "Assertion failed"
            );
        }
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use vigil::prelude::*;
use vigil::scheduler::VirtualScheduler;
use vigil::source::{create, fail, iter, just, never, DynObserver, Subject};
use vigil::timeout::Elapsed;

fn init_test(name: &str) {
    common::init_test_logging();
    test_phase!(name);
}

const WINDOW: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq)]
enum Fault {
    Quiet(Elapsed),
    Broken(&'static str),
}

impl From<Elapsed> for Fault {
    fn from(elapsed: Elapsed) -> Self {
        Self::Quiet(elapsed)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Seen {
    Item(&'static str),
    Error(Fault),
    Done,
}

#[derive(Default)]
struct Collect {
    seen: Mutex<Vec<Seen>>,
}

impl Collect {
    fn snapshot(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }

    fn saw_error(&self) -> bool {
        self.seen
            .lock()
            .iter()
            .any(|seen| matches!(seen, Seen::Error(_)))
    }
}

impl Observer for Collect {
    type Item = &'static str;
    type Error = Fault;

    fn on_next(&self, item: &'static str) {
        self.seen.lock().push(Seen::Item(item));
    }

    fn on_error(&self, error: Fault) {
        self.seen.lock().push(Seen::Error(error));
    }

    fn on_complete(&self) {
        self.seen.lock().push(Seen::Done);
    }
}

struct Fixture {
    subject: Subject<&'static str, Fault>,
    clock: Arc<VirtualScheduler>,
    collect: Arc<Collect>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            subject: Subject::new(),
            clock: Arc::new(VirtualScheduler::new()),
            collect: Arc::new(Collect::default()),
        }
    }

    fn scheduler(&self) -> Arc<dyn Scheduler> {
        self.clock.clone()
    }

    fn advance_secs(&self, secs: u64) {
        self.clock.advance_by(Duration::from_secs(secs));
    }
}

#[test]
fn no_timeout_when_first_value_is_within_window() {
    init_test("no_timeout_when_first_value_is_within_window");
    let fx = Fixture::new();
    let sub = fx
        .subject
        .clone()
        .timeout_on(WINDOW, fx.scheduler())
        .subscribe(fx.collect.clone());

    fx.advance_secs(2);
    fx.subject.next("One");
    assert_with_log!(
        fx.collect.snapshot() == vec![Seen::Item("One")],
        "value forwarded",
        vec![Seen::Item("One")],
        fx.collect.snapshot()
    );

    fx.advance_secs(2);
    assert_with_log!(!fx.collect.saw_error(), "no error", false, fx.collect.saw_error());
    sub.cancel();
}

#[test]
fn no_timeout_when_second_value_is_within_window() {
    init_test("no_timeout_when_second_value_is_within_window");
    let fx = Fixture::new();
    let sub = fx
        .subject
        .clone()
        .timeout_on(WINDOW, fx.scheduler())
        .subscribe(fx.collect.clone());

    fx.advance_secs(2);
    fx.subject.next("One");
    fx.advance_secs(2);
    fx.subject.next("Two");
    fx.advance_secs(2);

    let expected = vec![Seen::Item("One"), Seen::Item("Two")];
    assert_with_log!(
        fx.collect.snapshot() == expected,
        "both values forwarded, no error",
        expected,
        fx.collect.snapshot()
    );
    sub.cancel();
}

#[test]
fn times_out_when_first_value_never_arrives() {
    init_test("times_out_when_first_value_never_arrives");
    let fx = Fixture::new();
    let _sub = fx
        .subject
        .clone()
        .timeout_on(WINDOW, fx.scheduler())
        .subscribe(fx.collect.clone());

    fx.advance_secs(4);

    let seen = fx.collect.snapshot();
    assert_with_log!(seen.len() == 1, "exactly one signal", 1, seen.len());
    match &seen[0] {
        Seen::Error(Fault::Quiet(elapsed)) => {
            assert_with_log!(elapsed.window() == 0, "window 0 expired", 0, elapsed.window());
        }
        other => panic!("expected timeout error, got {other:?}"),
    }
    // The primary subscription was released by the expiry.
    assert_with_log!(
        fx.subject.observer_count() == 0,
        "primary unsubscribed",
        0,
        fx.subject.observer_count()
    );
}

// A value at t=2s resets the window; silence through t=2s+3s then
// delivers the timeout error with nothing lost.
#[test]
fn times_out_when_second_value_never_arrives() {
    init_test("times_out_when_second_value_never_arrives");
    let fx = Fixture::new();
    let _sub = fx
        .subject
        .clone()
        .timeout_on(WINDOW, fx.scheduler())
        .subscribe(fx.collect.clone());

    fx.advance_secs(2);
    fx.subject.next("One");
    fx.advance_secs(4);

    let seen = fx.collect.snapshot();
    assert_with_log!(seen.len() == 2, "value then timeout", 2, seen.len());
    assert_with_log!(
        seen[0] == Seen::Item("One"),
        "earlier value not lost",
        Seen::Item("One"),
        seen[0].clone()
    );
    assert_with_log!(
        matches!(&seen[1], Seen::Error(Fault::Quiet(_))),
        "timeout delivered once",
        "timeout error",
        seen[1].clone()
    );

    // Nothing further is ever delivered.
    fx.subject.next("Two");
    fx.advance_secs(10);
    assert_with_log!(fx.collect.snapshot().len() == 2, "stream closed", 2, fx.collect.snapshot().len());
}

#[test]
fn completion_inside_window_is_forwarded() {
    init_test("completion_inside_window_is_forwarded");
    let fx = Fixture::new();
    let sub = fx
        .subject
        .clone()
        .timeout_on(WINDOW, fx.scheduler())
        .subscribe(fx.collect.clone());

    fx.advance_secs(2);
    fx.subject.complete();
    fx.advance_secs(2);

    assert_with_log!(
        fx.collect.snapshot() == vec![Seen::Done],
        "completion forwarded, no error",
        vec![Seen::Done],
        fx.collect.snapshot()
    );
    sub.cancel();
}

#[test]
fn upstream_error_inside_window_is_forwarded_verbatim() {
    init_test("upstream_error_inside_window_is_forwarded_verbatim");
    let fx = Fixture::new();
    let sub = fx
        .subject
        .clone()
        .timeout_on(WINDOW, fx.scheduler())
        .subscribe(fx.collect.clone());

    fx.advance_secs(2);
    fx.subject.error(Fault::Broken("disk"));
    fx.advance_secs(2);

    assert_with_log!(
        fx.collect.snapshot() == vec![Seen::Error(Fault::Broken("disk"))],
        "upstream error forwarded as-is",
        vec![Seen::Error(Fault::Broken("disk"))],
        fx.collect.snapshot()
    );
    sub.cancel();
}

// "One" is accepted at t=2s, the window expires at t=5s, and the
// fallback's entire output follows in order.
#[test]
fn switches_to_fallback_when_window_expires() {
    init_test("switches_to_fallback_when_window_expires");
    let fx = Fixture::new();
    let fallback = iter(["a", "b", "c"]);
    let sub = fx
        .subject
        .clone()
        .timeout_or_on(WINDOW, fx.scheduler(), fallback)
        .subscribe(fx.collect.clone());

    fx.advance_secs(2);
    fx.subject.next("One");
    fx.advance_secs(4);
    // The primary is already disconnected; this value is not delivered.
    fx.subject.next("Two");

    let expected = vec![
        Seen::Item("One"),
        Seen::Item("a"),
        Seen::Item("b"),
        Seen::Item("c"),
        Seen::Done,
    ];
    assert_with_log!(
        fx.collect.snapshot() == expected,
        "fallback output in order, no timeout error",
        expected,
        fx.collect.snapshot()
    );

    // No further interactions afterwards.
    fx.advance_secs(10);
    fx.subject.next("Three");
    assert_with_log!(fx.collect.snapshot().len() == 5, "closed after fallback", 5, fx.collect.snapshot().len());
    sub.cancel();
}

#[test]
fn switches_to_fallback_even_when_upstream_later_errors() {
    init_test("switches_to_fallback_even_when_upstream_later_errors");
    let fx = Fixture::new();
    let fallback = iter(["a", "b", "c"]);
    let _sub = fx
        .subject
        .clone()
        .timeout_or_on(WINDOW, fx.scheduler(), fallback)
        .subscribe(fx.collect.clone());

    fx.advance_secs(2);
    fx.subject.next("One");
    fx.advance_secs(4);
    // Stale terminal from the disconnected primary: dropped.
    fx.subject.error(Fault::Broken("late"));

    let expected = vec![
        Seen::Item("One"),
        Seen::Item("a"),
        Seen::Item("b"),
        Seen::Item("c"),
        Seen::Done,
    ];
    assert_with_log!(
        fx.collect.snapshot() == expected,
        "late upstream error ignored after switch",
        expected,
        fx.collect.snapshot()
    );
}

#[test]
fn fallback_delivery_stops_on_cancellation() {
    init_test("fallback_delivery_stops_on_cancellation");
    let fx = Fixture::new();
    let fallback: Subject<&'static str, Fault> = Subject::new();
    let sub = fx
        .subject
        .clone()
        .timeout_or_on(WINDOW, fx.scheduler(), fallback.clone())
        .subscribe(fx.collect.clone());

    fx.advance_secs(2);
    fx.subject.next("One");
    fx.advance_secs(4);
    fx.subject.next("Two");

    fallback.next("a");
    fallback.next("b");
    sub.cancel();

    // Events sent to the fallback after cancellation are not observed.
    fallback.next("c");
    fallback.next("d");
    fallback.complete();

    let expected = vec![Seen::Item("One"), Seen::Item("a"), Seen::Item("b")];
    assert_with_log!(
        fx.collect.snapshot() == expected,
        "nothing delivered after cancel",
        expected,
        fx.collect.snapshot()
    );
    assert_with_log!(
        fallback.observer_count() == 0,
        "fallback subscription released",
        0,
        fallback.observer_count()
    );
}

#[test]
fn primary_subscription_is_released_on_timeout() {
    init_test("primary_subscription_is_released_on_timeout");
    let clock = Arc::new(VirtualScheduler::new());
    let collect = Arc::new(Collect::default());
    let released = Arc::new(AtomicBool::new(false));

    let probe = Arc::clone(&released);
    let source = create(move |_obs: DynObserver<&'static str, Fault>, sub: &Subscription| {
        let probe = Arc::clone(&probe);
        sub.on_cancel(move || probe.store(true, Ordering::SeqCst));
    });

    let scheduler: Arc<dyn Scheduler> = clock.clone();
    let _sub = source
        .timeout_on(Duration::from_millis(1000), scheduler)
        .subscribe(collect.clone());

    clock.advance_by(Duration::from_millis(2000));

    assert_with_log!(released.load(Ordering::SeqCst), "primary released", true, released.load(Ordering::SeqCst));
    let seen = collect.snapshot();
    assert_with_log!(
        matches!(seen.as_slice(), [Seen::Error(Fault::Quiet(_))]),
        "timeout error only",
        "one timeout error",
        seen
    );
}

#[test]
fn immediate_error_during_subscribe_releases_primary() {
    init_test("immediate_error_during_subscribe_releases_primary");
    let clock = Arc::new(VirtualScheduler::new());
    let collect = Arc::new(Collect::default());
    let released = Arc::new(AtomicBool::new(false));

    let probe = Arc::clone(&released);
    let source = create(move |obs: DynObserver<&'static str, Fault>, sub: &Subscription| {
        let probe = Arc::clone(&probe);
        sub.on_cancel(move || probe.store(true, Ordering::SeqCst));
        obs.on_error(Fault::Broken("io"));
    });

    let scheduler: Arc<dyn Scheduler> = clock.clone();
    let _sub = source
        .timeout_on(Duration::from_millis(1000), scheduler)
        .subscribe(collect.clone());

    clock.advance_by(Duration::from_millis(2000));

    assert_with_log!(released.load(Ordering::SeqCst), "primary released", true, released.load(Ordering::SeqCst));
    assert_with_log!(
        collect.snapshot() == vec![Seen::Error(Fault::Broken("io"))],
        "error forwarded, no timeout after it",
        vec![Seen::Error(Fault::Broken("io"))],
        collect.snapshot()
    );
}

// Race exclusivity under real threads: the producer is held back until
// the window has already been claimed by the expiry, then emits. The
// downstream must see the timeout outcome only.
#[test]
fn blocked_producer_loses_the_race_cleanly() {
    init_test("blocked_producer_loses_the_race_cleanly");
    let fx = Fixture::new();
    let sub = fx
        .subject
        .clone()
        .timeout_on(Duration::from_secs(1), fx.scheduler())
        .subscribe(fx.collect.clone());

    let (release, held) = mpsc::channel::<()>();
    let producer = {
        let subject = fx.subject.clone();
        std::thread::spawn(move || {
            held.recv().ok();
            subject.next("a");
            subject.complete();
        })
    };

    fx.advance_secs(2);
    release.send(()).ok();
    producer.join().expect("producer thread");

    let seen = fx.collect.snapshot();
    assert_with_log!(
        matches!(seen.as_slice(), [Seen::Error(Fault::Quiet(_))]),
        "timeout outcome only, nothing after it",
        "one timeout error",
        seen
    );
    sub.cancel();
}

#[test]
fn fallback_error_is_forwarded_not_reclassified() {
    init_test("fallback_error_is_forwarded_not_reclassified");
    let clock = Arc::new(VirtualScheduler::new());
    let collect = Arc::new(Collect::default());
    let scheduler: Arc<dyn Scheduler> = clock.clone();

    let _sub = never::<&'static str, Fault>()
        .timeout_or_on(Duration::from_secs(1), scheduler, fail(Fault::Broken("fallback")))
        .subscribe(collect.clone());

    clock.advance_by(Duration::from_secs(1));

    assert_with_log!(
        collect.snapshot() == vec![Seen::Error(Fault::Broken("fallback"))],
        "fallback error verbatim",
        vec![Seen::Error(Fault::Broken("fallback"))],
        collect.snapshot()
    );
}

#[test]
fn ambient_scheduler_passes_a_fast_source_through() {
    init_test("ambient_scheduler_passes_a_fast_source_through");
    let collect = Arc::new(Collect::default());
    let _sub = just("one")
        .timeout(Duration::from_secs(5))
        .subscribe(collect.clone());

    assert_with_log!(
        collect.snapshot() == vec![Seen::Item("one"), Seen::Done],
        "value and completion, no error",
        vec![Seen::Item("one"), Seen::Done],
        collect.snapshot()
    );
}

#[test]
fn ambient_scheduler_with_fallback_passes_through() {
    init_test("ambient_scheduler_with_fallback_passes_through");
    let collect = Arc::new(Collect::default());
    let _sub = just("one")
        .timeout_or(Duration::from_secs(5), just("two"))
        .subscribe(collect.clone());

    assert_with_log!(
        collect.snapshot() == vec![Seen::Item("one"), Seen::Done],
        "fallback untouched",
        vec![Seen::Item("one"), Seen::Done],
        collect.snapshot()
    );
}

// A shared subject feeds both the primary and (via a second wrapper) the
// fallback. The delivery log must show: value through the primary, the
// primary's release on timeout, then later values through the fallback
// wrapper only.
#[test]
fn shared_source_switch_preserves_ordering() {
    init_test("shared_source_switch_preserves_ordering");
    let clock = Arc::new(VirtualScheduler::new());
    let scheduler: Arc<dyn Scheduler> = clock.clone();
    let collect = Arc::new(Collect::default());
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let shared: Subject<&'static str, Fault> = Subject::new();

    struct Tap {
        downstream: DynObserver<&'static str, Fault>,
        log: Arc<Mutex<Vec<String>>>,
        also_timeout_line: bool,
    }

    impl Observer for Tap {
        type Item = &'static str;
        type Error = Fault;

        fn on_next(&self, item: &'static str) {
            self.log.lock().push(format!("Received value {item}"));
            if self.also_timeout_line {
                self.log.lock().push(format!("Timeout received value {item}"));
            }
            self.downstream.on_next(item);
        }

        fn on_error(&self, error: Fault) {
            self.downstream.on_error(error);
        }

        fn on_complete(&self) {
            self.downstream.on_complete();
        }
    }

    let tapped = |subject: Subject<&'static str, Fault>,
                  log: Arc<Mutex<Vec<String>>>,
                  also_timeout_line: bool,
                  unsubscribe_line: bool| {
        create(move |obs: DynObserver<&'static str, Fault>, sub: &Subscription| {
            let tap = Arc::new(Tap {
                downstream: obs,
                log: Arc::clone(&log),
                also_timeout_line,
            });
            sub.add(subject.subscribe(tap));
            if unsubscribe_line {
                let log = Arc::clone(&log);
                sub.on_cancel(move || log.lock().push("Unsubscribed".to_string()));
            }
        })
    };

    let primary = tapped(shared.clone(), Arc::clone(&log), false, true);
    let fallback = tapped(shared.clone(), Arc::clone(&log), true, false);

    let _sub = primary
        .timeout_or_on(Duration::from_secs(1), scheduler, fallback)
        .subscribe(collect.clone());

    shared.next("5");
    clock.advance_by(Duration::from_secs(2));
    shared.next("10");
    shared.complete();

    let expected_log = vec![
        "Received value 5".to_string(),
        "Unsubscribed".to_string(),
        "Received value 10".to_string(),
        "Timeout received value 10".to_string(),
    ];
    assert_with_log!(*log.lock() == expected_log, "delivery log order", expected_log, log.lock().clone());

    let expected = vec![Seen::Item("5"), Seen::Item("10"), Seen::Done];
    assert_with_log!(
        collect.snapshot() == expected,
        "downstream saw both values and the completion",
        expected,
        collect.snapshot()
    );
}

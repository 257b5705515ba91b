//! Error-path cvloop example
//!
//! Shows what a condition variable refuses to do and how failures reach
//! the caller:
//!
//! 1. A nested blocking wait is rejected
//! 2. `croak()` propagates an error through `recv()`
//! 3. Callback and readiness properties
//! 4. Waiting from inside the running top-level loop
//!
//! Every check is an assertion; the process exits non-zero on the first
//! one that does not hold.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use cvloop::{kinfo, CondVar, LoopConfig, RecvError, Runtime};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn main() {
    println!("=== cvloop Errors Example ===\n");

    let rt = Runtime::new(LoopConfig::from_env());

    recursive_wait(&rt);
    croak(&rt);
    properties(&rt);
    wait_inside_loop(&rt);

    kinfo!("{:?}", rt.registry().stats());
    println!("=== Example Complete ===");
}

fn recursive_wait(rt: &Runtime) {
    println!("EXAMPLE1");
    let cv1: CondVar<&'static str> = rt.condvar();
    let cv2: CondVar<&'static str> = rt.condvar();

    // cv1's producer tries to wait for cv2 first; that wait must fail
    {
        let (cv1, cv2) = (cv1.clone(), cv2.clone());
        rt.set_timeout(ms(100), move || {
            let err = cv2.recv().expect_err("nested recv must fail");
            assert_eq!(err, RecvError::ReentrantWait);
            assert_eq!(err.to_string(), "recursive blocking wait attempted");
            cv1.send("cv1value");
        });
    }
    {
        let cv2 = cv2.clone();
        rt.set_timeout(ms(200), move || cv2.send("cv2value"));
    }

    let got = cv1.recv().expect("cv1 resolves");
    println!("cv1.recv() finished, got: {:?}\n", got);

    assert!(!cv2.ready());
    assert_eq!(cv1.recv(), Ok(Some("cv1value")));
    assert_eq!(cv2.recv(), Ok(Some("cv2value")));
}

fn croak(rt: &Runtime) {
    println!("EXAMPLE2");
    let cv: CondVar<&'static str> = rt.condvar();
    {
        let cv = cv.clone();
        rt.set_timeout(ms(100), move || {
            println!("calling cv.croak(\"cv2value\")\n");
            cv.croak("cv2value".to_string());
        });
    }

    match cv.recv() {
        Err(RecvError::Croaked(e)) => assert_eq!(e, "cv2value"),
        other => panic!("expected croaked error, got {:?}", other),
    }
    // Every later recv raises it again
    assert!(cv.recv().is_err());
    assert!(cv.is_croaked());
}

fn properties(rt: &Runtime) {
    println!("EXAMPLE3");
    let cv: CondVar<&'static str> = rt.condvar();

    assert!(cv.cb().is_none(), "cb should be unset");
    let _ = cv.set_cb(|_| {});
    assert!(cv.cb().is_some(), "cb should be set");
    assert!(cv.clear_cb().is_some());
    assert!(cv.cb().is_none(), "cb should be cleared");
    assert!(!cv.ready(), "should not be ready");

    {
        let cv = cv.clone();
        rt.set_timeout(ms(100), move || cv.send("cv3value"));
    }

    let result1 = cv.recv().expect("first recv");
    let result2 = cv.recv().expect("second recv");

    assert!(cv.ready(), "should be ready");
    assert_eq!(result1, Some("cv3value"));
    assert_eq!(result1, result2);

    // First writer wins
    cv.send("ignored");
    assert_eq!(cv.recv(), Ok(Some("cv3value")));

    println!("cv.recv() finished, got: {:?}\n", result1);
}

fn wait_inside_loop(rt: &Runtime) {
    println!("EXAMPLE4");
    let outcome = Rc::new(RefCell::new(None));

    let cv: CondVar<&'static str> = rt.condvar();
    {
        let (sched, cv, outcome) = (rt.scheduler().clone(), cv.clone(), outcome.clone());
        rt.next_tick(move || {
            sched.next_tick(|| println!("this does print, second"));

            let producer = cv.clone();
            sched.set_timeout(ms(100), move || producer.send("nextTick result"));

            println!("this gets printed first");
            *outcome.borrow_mut() = Some(cv.recv());
        });
    }

    println!("next_tick stuff gets run after this");
    if let Err(e) = rt.run() {
        panic!("top-level run failed: {}", e);
    }

    let outcome = outcome.borrow_mut().take();
    match outcome {
        Some(Err(e)) => println!("recv inside the running loop failed: {}\n", e),
        other => panic!("expected a reentrant wait failure, got {:?}", other),
    }
    assert_eq!(cv.recv(), Ok(Some("nextTick result")));
}

//! Basic cvloop example
//!
//! Walks through the everyday uses of a condition variable:
//! a single blocking receive, several at once, a begin/end group, a
//! condition variable handed to a timer, and a callback subscriber.
//!
//! # Environment Variables
//!
//! - `CVL_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)
//! - `CVL_FLUSH_EPRINT=1` - Flush debug output immediately
//! - `CVL_LOG_TIME=1` - Prefix log lines with elapsed milliseconds

use std::error::Error;
use std::time::Duration;

use cvloop::{kdebug, kerror, kinfo, CondVar, Runtime};

// CVL_LOG_LEVEL=trace cargo run -p cvloop-basic
fn main() {
    println!("=== cvloop Basic Example ===\n");

    let rt = Runtime::from_env();

    if let Err(e) = run(&rt) {
        kerror!("example failed: {}", e);
        std::process::exit(1);
    }

    println!("=== Example Complete ===");
}

fn run(rt: &Runtime) -> Result<(), Box<dyn Error>> {
    single_recv(rt)?;
    several_at_once(rt)?;
    group(rt)?;
    as_timer_callback(rt)?;
    callback_subscriber(rt)?;
    Ok(())
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Block on one condition variable until a timer sends to it
fn single_recv(rt: &Runtime) -> Result<(), Box<dyn Error>> {
    let cv: CondVar<&'static str> = rt.condvar();
    println!("created {}", cv.id());

    let producer = cv.clone();
    rt.set_timeout(ms(1000), move || {
        println!("calling cv.send(\"asdf\")");
        producer.send("asdf");
    });

    println!("blocking on cv.recv() waiting for data");
    let got = cv.recv()?;
    println!("cv.recv() finished, got: {:?}\n", got);
    Ok(())
}

/// Waiting is per handle: cv2 and cv3 resolve first, but cv1 is awaited first
fn several_at_once(rt: &Runtime) -> Result<(), Box<dyn Error>> {
    let cv1: CondVar<&'static str> = rt.condvar();
    let cv2: CondVar<&'static str> = rt.condvar();
    let cv3: CondVar<&'static str> = rt.condvar();

    for (cv, delay, value) in [(&cv1, 200, "asdf1"), (&cv2, 100, "asdf2"), (&cv3, 100, "asdf3")] {
        let cv = cv.clone();
        rt.set_timeout(ms(delay), move || cv.send(value));
    }

    println!("cv1 got: {:?}", cv1.recv()?);
    println!("cv2 got: {:?}", cv2.recv()?);
    println!("cv3 got: {:?}\n", cv3.recv()?);
    Ok(())
}

/// Fan-in: the group-end callback supplies the value after the third end()
fn group(rt: &Runtime) -> Result<(), Box<dyn Error>> {
    let cv_nest: CondVar<&'static str> = rt.condvar();
    cv_nest.begin_with(|cv| {
        println!("called last end");
        cv.send("x");
    });
    cv_nest.begin();
    cv_nest.begin();

    for delay in [100, 200, 300] {
        let cv = cv_nest.clone();
        rt.set_timeout(ms(delay), move || {
            println!("calling end");
            cv.end();
        });
    }

    println!("cv_nest got: {:?}\n", cv_nest.recv()?);
    Ok(())
}

/// A condition variable is a valid timer callback and resolves with no value
fn as_timer_callback(rt: &Runtime) -> Result<(), Box<dyn Error>> {
    let cv_as_cb: CondVar<&'static str> = rt.condvar();
    rt.set_timeout(ms(100), cv_as_cb.clone());
    println!("cv_as_cb got: {:?}\n", cv_as_cb.recv()?);
    Ok(())
}

/// Subscribe with a callback and let the top-level loop deliver it
///
/// The recv() inside the callback is fine: by the time it runs the value
/// is already there, so it never has to pump the loop.
fn callback_subscriber(rt: &Runtime) -> Result<(), Box<dyn Error>> {
    let cv_cb: CondVar<&'static str> = rt.condvar();
    cv_cb.set_cb(|cv| match cv.recv() {
        Ok(got) => println!("cv_cb got: {:?}\n", got),
        Err(e) => kerror!("cv_cb failed: {}", e),
    });

    let producer = cv_cb.clone();
    rt.set_timeout(ms(1000), move || producer.send("cb result"));

    println!("waiting on callback cv to finish");
    let passes = rt.run()?;
    kdebug!("loop drained after {} passes", passes);
    kinfo!("{:?}", rt.registry().stats());
    Ok(())
}

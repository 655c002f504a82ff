//! Condition variable example
//!
//! Two green threads alternate strictly (0, 1, 0, 1, ...) twice over: first
//! with a bare condvar and a shared flag, then with the flag protected by a
//! mutex. `signal` runs the woken thread immediately.

use std::cell::Cell;
use std::rc::Rc;
use uthread::{Condvar, Mutex, Runtime, RuntimeConfig, SchedResult};

const TURNS: usize = 4;

/// Ping-pong on a flag with no mutex
fn without_mutex(rt: &Runtime) -> SchedResult<()> {
    let cv = Rc::new(Condvar::new(rt));
    let flag = Rc::new(Cell::new(0usize));

    let mut handles = Vec::new();
    for id in 0..2usize {
        let (rt2, cv, flag) = (rt.clone(), Rc::clone(&cv), Rc::clone(&flag));
        handles.push(rt.spawn(
            move |id: usize| {
                let mut turns = TURNS;
                while turns > 0 {
                    if flag.get() == id {
                        rt2.without_preemption(|| println!("thread {}: {}", id, turns));
                        turns -= 1;
                        flag.set((id + 1) % 2);
                        cv.signal();
                    } else {
                        cv.wait_unlocked();
                    }
                }
            },
            id,
        )?);
    }
    for h in handles {
        rt.join(h)?;
    }
    Ok(())
}

/// Ping-pong on a mutex-protected flag
fn with_mutex(rt: &Runtime) -> SchedResult<()> {
    let flag = Rc::new(Mutex::new(rt, 0usize));
    let cv = Rc::new(Condvar::new(rt));

    let mut handles = Vec::new();
    for id in 0..2usize {
        let (rt2, cv, flag) = (rt.clone(), Rc::clone(&cv), Rc::clone(&flag));
        handles.push(rt.spawn(
            move |id: usize| {
                for turn in (1..=TURNS).rev() {
                    let mut g = flag.lock();
                    while *g != id {
                        g = cv.wait(g);
                    }
                    rt2.without_preemption(|| println!("thread {}: {}", id, turn));
                    *g = (id + 1) % 2;
                    cv.signal();
                }
            },
            id,
        )?);
    }
    for h in handles {
        rt.join(h)?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== uthread Condvar Example ===\n");

    let rt = Runtime::new(RuntimeConfig::from_env())?;

    println!("-- condvar only --");
    without_mutex(&rt)?;

    println!("\n-- mutex + condvar --");
    with_mutex(&rt)?;

    println!("\n{}", rt.stats());
    println!("done");
    Ok(())
}

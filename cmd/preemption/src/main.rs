//! Preemption example
//!
//! 1. A CPU-bound thread that never yields spins until a second thread sets
//!    a flag. Only the timer can get the second thread onto the CPU.
//! 2. Two threads increment a mutex-protected counter; the total is exact
//!    however often they are preempted.
//!
//! # Environment Variables
//!
//! - `UTH_PREEMPT_US=100` - Timer period in microseconds (0 disables; this
//!   example then refuses to run)

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;
use uthread::{kinfo, kwarn, Mutex, Runtime, RuntimeConfig, SchedResult};

const INCREMENTS: u64 = 10_000;

fn spinner(rt: &Runtime) -> SchedResult<()> {
    let stop = Rc::new(Cell::new(false));
    let spins = rt.spawn(
        |stop: Rc<Cell<bool>>| {
            let mut spins = 0u64;
            while !stop.get() {
                spins = std::hint::black_box(spins + 1);
            }
            spins
        },
        Rc::clone(&stop),
    )?;
    let setter = rt.spawn(|stop: Rc<Cell<bool>>| stop.set(true), Rc::clone(&stop))?;

    let start = Instant::now();
    let spins = rt.join(spins)?;
    rt.join(setter)?;
    let elapsed = start.elapsed();
    rt.without_preemption(|| println!("spinner stopped after {} spins in {:?}", spins, elapsed));
    Ok(())
}

fn counter(rt: &Runtime) -> SchedResult<u64> {
    let count = Rc::new(Mutex::new(rt, 0u64));
    let mut handles = Vec::new();
    for _ in 0..2 {
        handles.push(rt.spawn(
            |count: Rc<Mutex<u64>>| {
                for _ in 0..INCREMENTS {
                    *count.lock() += 1;
                }
            },
            Rc::clone(&count),
        )?);
    }
    for h in handles {
        rt.join(h)?;
    }
    let total = *count.lock();
    Ok(total)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== uthread Preemption Example ===\n");

    let config = RuntimeConfig::from_env();
    if !config.preemption_enabled() {
        kwarn!("UTH_PREEMPT_US=0 disables the timer; the spinner would never stop");
        return Ok(());
    }
    let rt = Runtime::new(config)?;
    kinfo!("preemption period {:?}", rt.config().preempt_period);

    spinner(&rt)?;

    let total = counter(&rt)?;
    println!("x: {} (expected {})", total, 2 * INCREMENTS);

    println!("{}", rt.stats());
    println!("done");
    Ok(())
}

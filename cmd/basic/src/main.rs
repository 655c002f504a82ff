//! Basic uthread example
//!
//! Two green threads take turns printing a countdown, yielding after every
//! line, then main joins both and collects their results.
//!
//! # Environment Variables
//!
//! - `UTH_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)
//! - `UTH_PREEMPT_US=0` - Disable the preemption timer
//! - `UTH_STACK_SIZE=65536` - Stack size per green thread

use uthread::{kinfo, Runtime, RuntimeConfig};

// UTH_LOG_LEVEL=debug cargo run -p uthread-basic
fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== uthread Basic Example ===\n");

    let config = RuntimeConfig::from_env();
    config.print();
    let rt = Runtime::new(config)?;

    let handles = (0..2u32)
        .map(|id| {
            let rt2 = rt.clone();
            rt.spawn(
                move |id: u32| {
                    for turn in (1..=4).rev() {
                        rt2.without_preemption(|| println!("thread {}: {}", id, turn));
                        rt2.yield_now();
                    }
                    id * 10
                },
                id,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    kinfo!("spawned {} threads", handles.len());

    // Join in reverse: the second thread finishes last but is joined first
    let mut results = Vec::new();
    for h in handles.into_iter().rev() {
        let id = h.id();
        let value = rt.join(h)?;
        rt.without_preemption(|| println!("joined {} -> {}", id, value));
        results.push(value);
    }

    println!("\nresults: {:?}", results);
    println!("{}", rt.stats());
    println!("done");
    Ok(())
}

//! Target program for trying out ferrstack.
//!
//! Starts a few worker threads parked at different call depths, prints its
//! PID and then sleeps until killed:
//!
//! ```bash
//! cargo run -p ferrstack --example threaded_target
//! # in another terminal
//! ferrstack -p <PID> -v
//! ```

use std::thread;
use std::time::Duration;

#[inline(never)]
fn park(depth: u32)
{
    if depth == 0 {
        loop {
            thread::sleep(Duration::from_secs(1));
        }
    }
    park(depth - 1);
}

fn main()
{
    for depth in 1..=3 {
        thread::Builder::new()
            .name(format!("worker-{depth}"))
            .spawn(move || park(depth))
            .expect("failed to spawn worker");
    }

    println!("Hello! I am process {}", std::process::id());
    println!("Waiting for ferrstack... (Press Ctrl+C to exit)");
    park(0);
}

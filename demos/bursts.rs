//! Fire bursts of calls with random spacing at each kind of gate and print what gets through.
//! Set `TRACE=1` to see every gate decision.

use call_gate::{once, Debounce, DebounceConfig, Throttle};

use std::time::Duration;

use rand::{thread_rng, Rng};
use tokio::time::{sleep, Instant};

#[tokio::main]
async fn main() -> call_gate::Result<()> {
    let level = if std::env::var_os("TRACE").is_some() {
        tracing::Level::TRACE
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let start = Instant::now();

    let setup = once(|()| println!("Setting up at {:?}", Instant::now() - start));
    let throttled = Throttle::with_max(
        move |i: u32| {
            println!("Throttled call {} ran at {:?}", i, Instant::now() - start);
            i
        },
        Duration::from_millis(500),
        2,
    );
    let trailing = Debounce::new(
        move |i: u32| println!("Trailing debounce ran call {} at {:?}", i, Instant::now() - start),
        DebounceConfig::default().threshold(Duration::from_millis(150)),
    )?;
    let leading = Debounce::new(
        move |i: u32| println!("Leading debounce ran call {} at {:?}", i, Instant::now() - start),
        DebounceConfig::default().threshold(Duration::from_millis(150)).leading(),
    )?;

    let mut rng = thread_rng();

    for i in 0..40 {
        setup.call(());
        throttled.call(i);
        trailing.call(i);
        leading.call(i);

        // Mostly short gaps, with the occasional pause long enough to end a burst.
        let gap = if rng.gen_bool(0.1) {
            rng.gen_range(200..400)
        } else {
            rng.gen_range(10..100)
        };
        sleep(Duration::from_millis(gap)).await;
    }

    sleep(Duration::from_millis(300)).await;
    Ok(())
}

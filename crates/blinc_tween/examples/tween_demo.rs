//! Tween Demo
//!
//! Runs three tweens on the shared frame clock and prints their values:
//! a counter, a pulse with delays, repeats and pause/resume, and a fade
//! built with `create`.
//!
//! Run with: RUST_LOG=debug cargo run -p blinc_tween --example tween_demo

use blinc_tween::{create, set_frame_rate, Easing, FrameClock, Result, Tween};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    set_frame_rate(10)?;

    let (done_tx, done_rx) = mpsc::channel();

    // 0 -> 10 over one second, linear: prints roughly 1, 2, ..., 10
    let counter = Tween::builder(0.0_f32, 10.0, Duration::from_secs(1))
        .easing(Easing::Linear)
        .build()?;
    let tx = done_tx.clone();
    let _counter_sub = counter.subscribe_with(
        |value| println!("counter: {value:.2}"),
        move || {
            let _ = tx.send("counter");
        },
    );

    // Pulse a 2D position back and forth three times
    let pulse = Tween::builder([0.0_f32, 0.0], [100.0, 50.0], Duration::from_millis(500))
        .easing(Easing::EaseInOutSine)
        .repeat(3)
        .delay_before(Duration::from_millis(200))
        .delay_after(Duration::from_millis(100))
        .build()?;
    let tx = done_tx.clone();
    let _pulse_sub = pulse.subscribe_with(
        |[x, y]| println!("pulse: ({x:.1}, {y:.1})"),
        move || {
            let _ = tx.send("pulse");
        },
    );

    thread::sleep(Duration::from_millis(400));
    println!("pausing pulse at {:?}", pulse.elapsed());
    pulse.pause();
    thread::sleep(Duration::from_millis(300));
    pulse.resume();
    println!("resumed pulse at {:?}", pulse.elapsed());

    // A plain float tween on the default cubic curve
    let fade = create(1.0, 0.0, Duration::from_millis(600))?;
    let _fade_sub = fade.subscribe_fn(|opacity| println!("fade: {opacity:.3}"));

    drop(done_tx);
    for name in done_rx {
        println!("{name} completed");
    }

    let clock = FrameClock::current();
    println!(
        "clock {}fps: {} consumers, running = {}",
        clock.rate(),
        clock.consumer_count(),
        clock.is_running()
    );

    Ok(())
}

//! # Example: the process main thread as the looper
//!
//! The host prepares a looper, registers it as the main looper and runs the loop
//! on its own `main` thread. A background thread then:
//! - schedules a delayed greeting through a worker;
//! - schedules work on a second worker and disposes it before it is due;
//! - raises an error that lands in the installed error handler;
//! - quits the loop safely.
//!
//! Run with:
//! ```text
//! RUST_LOG=debug cargo run --example main_thread --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use loopsched::{
    Disposable, LogWriter, Looper, LooperConfig, Scheduler, Subscribe, TaskError, Worker,
    error_sink, install_main_looper, main_thread,
};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let (looper, runner) = Looper::builder(LooperConfig::named("main"))
        .with_subscribers(subs)
        .prepare();
    install_main_looper(looper.clone())
        .map_err(|l| anyhow::anyhow!("main looper already installed: {l:?}"))?;

    error_sink::set_error_handler(|thread, err| {
        tracing::warn!(
            thread = thread.name().unwrap_or("?"),
            error = %err,
            "error handler caught task error"
        );
    });

    let submitter = std::thread::Builder::new()
        .name("submitter".into())
        .spawn(move || -> anyhow::Result<()> {
            let scheduler = main_thread()?;

            let greeter = scheduler.create_worker();
            greeter.schedule_delayed(
                || {
                    tracing::info!("hello from the main looper");
                    Ok(())
                },
                Duration::from_millis(100),
            )?;

            let abandoned = scheduler.create_worker();
            let never = abandoned.schedule_delayed(
                || {
                    tracing::error!("this should never run");
                    Ok(())
                },
                Duration::from_millis(200),
            )?;
            abandoned.dispose();
            tracing::info!(disposed = never.is_disposed(), "abandoned worker disposed");

            scheduler.schedule(|| Err(TaskError::fail("simulated failure")))?;

            std::thread::sleep(Duration::from_millis(300));
            scheduler.looper().quit_safely();
            Ok(())
        })?;

    runner.run()?;
    submitter
        .join()
        .map_err(|_| anyhow::anyhow!("submitter thread panicked"))??;
    error_sink::clear_error_handler();
    Ok(())
}

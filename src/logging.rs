use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize standard structured logging.
/// `STORYWEAVE_LOG=debug` raises the level; repeated init calls are ignored
/// so CLI subcommands can share one entrypoint.
pub(crate) fn init() {
    let level = match std::env::var("STORYWEAVE_LOG").as_deref() {
        Ok("trace") => Level::TRACE,
        Ok("debug") => Level::DEBUG,
        Ok("warn") => Level::WARN,
        Ok("error") => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

use slog::{o, Discard, Drain, Level, Logger};
use slog_async::Async;
use slog_term::{CompactFormat, TermDecorator};

/// Creates the terminal [`Logger`] of a service.
///
/// Records below `Debug` are dropped unless the service is built in debug mode.
pub fn new_logger(service: &'static str) -> Logger {
    let level = if cfg!(debug_assertions) {
        Level::Trace
    } else {
        Level::Debug
    };

    let decorator = TermDecorator::new().build();
    let drain = CompactFormat::new(decorator).build().fuse();
    let drain = Async::new(drain).build().filter_level(level).fuse();

    Logger::root(drain, o!("service" => service))
}

/// A [`Logger`] dropping every record, used in tests.
pub fn discard_logger() -> Logger {
    Logger::root(Discard, o!())
}

//! A first-order linear-chain Conditional Random Field: training and tagging.
//!
//! The crate is organized leaf-first, mirroring the data flow described in
//! the design notes: numeric kernels at the bottom, an inference context on
//! top of those, a feature model and encoder on top of that, then the model
//! container, dictionary, corpus reader, training algorithms and CLI glue.

pub mod context;
pub mod corpus;
pub mod data;
pub mod dict;
pub mod encoder;
pub mod eval;
pub mod feature;
pub mod model;
pub mod numeric;
pub mod tagger;
pub mod train;

pub use context::Context;
pub use data::{Dataset, Instance, Item};
pub use dict::Dictionary;
pub use encoder::Encoder;
pub use eval::Evaluation;
pub use feature::{Feature, FeatureKind};
pub use model::Model;
pub use tagger::Tagger;

use std::fs::File;
use std::io::Write;
use std::sync::{Mutex, Once};

use chrono::Local;

/// Error taxonomy for the crate. Each variant maps onto one of the four
/// failure classes used throughout the design: malformed input, resource
/// exhaustion (left to the allocator, never constructed here), internal
/// logic violations (panics, not this type), and incompatible data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("corpus error: {0}")]
    Corpus(#[from] corpus::CorpusError),
    #[error("model error: {0}")]
    Model(#[from] model::ModelError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

static LOGGING: Once = Once::new();
static FILE_LOGGING: Mutex<Option<File>> = Mutex::new(None);

struct DynFileLogger;

impl Write for DynFileLogger {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match FILE_LOGGING.lock().expect("log file mutex poisoned").as_mut() {
            Some(f) => f.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match FILE_LOGGING.lock().expect("log file mutex poisoned").as_mut() {
            Some(f) => f.flush(),
            None => Ok(()),
        }
    }
}

/// Initializes the global logger once, dispatching to stdout and, if `path`
/// is given, to a log file as well. Safe to call repeatedly; only the first
/// call (per process) has any effect, matching the run-once init pattern
/// used by the rest of the ambient stack.
pub fn init_logging(path: Option<&std::path::Path>) {
    LOGGING.call_once(|| {
        if let Some(path) = path {
            let file = File::create(path).expect("log file should be creatable");
            *FILE_LOGGING.lock().expect("log file mutex poisoned") = Some(file);
        }

        fern::Dispatch::new()
            .format(|out, message, record| {
                let now = Local::now();
                out.finish(format_args!(
                    "[{} {} {}] {}",
                    now.format("%H:%M:%S"),
                    record.level(),
                    record.target(),
                    message
                ))
            })
            .level(log::LevelFilter::Info)
            .chain(std::io::stdout())
            .chain(Box::new(DynFileLogger) as Box<dyn Write + Send>)
            .apply()
            .expect("fern dispatch should install cleanly the first time");
    });
}

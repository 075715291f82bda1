mod engine;
mod identity;
mod model;
mod player;
mod recorder;
mod repl;
mod session;
mod store;
mod surface;
mod util;

pub use engine::*;
pub use identity::*;
pub use model::config::*;
pub use model::mapper::*;
pub use model::melody::*;
pub use model::note::*;
pub use player::*;
pub use recorder::{Clock, Recorder, RecorderEvent, RecorderState, ScheduledNote, SystemClock, build_schedule};
pub use repl::run as run_interactive;
pub use session::*;
pub use store::*;
pub use surface::*;
pub use util::*;

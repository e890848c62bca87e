mod broadcast;
mod config;
mod events;
mod util;

pub use broadcast::*;
pub use config::*;
pub use events::*;
pub use util::*;

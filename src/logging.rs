use std::fmt::{self, Display};

use colored::{Color, Colorize};
use log::{Level, LevelFilter, Metadata};

/// Crates of this workspace, with the label and colour their lines are printed with
const LOCAL_CRATES: [(&str, &str, Color); 4] = [
    ("huddle", "HUDDLE", Color::BrightCyan),
    ("huddle_server", "SERVER", Color::BrightGreen),
    ("huddle_collab", "COLLAB", Color::BrightMagenta),
    ("huddle_core", "CORE", Color::Blue),
];

/// Anything else only gets to log warnings and errors
const EXTERNAL_LEVEL: LevelFilter = LevelFilter::Warn;

pub fn init_logger() {
    let local_level = local_level(std::env::var("RUST_LOG").ok().as_deref());

    fern::Dispatch::new()
        .format(|out, message, record| {
            let now = chrono::Local::now();

            out.finish(format_args!(
                "{:^5} {} {:^8} {}",
                level_badge(record.level()),
                now.format("%H:%M:%S").to_string().bright_black(),
                Target::of(record.target()),
                message
            ))
        })
        .filter(move |meta| is_enabled(meta, local_level))
        .chain(std::io::stdout())
        .apply()
        .expect("logging is initialized")
}

/// Local crates log info and up, or everything when RUST_LOG asks for debug output
fn local_level(rust_log: Option<&str>) -> LevelFilter {
    match rust_log {
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn is_enabled(meta: &Metadata, local_level: LevelFilter) -> bool {
    let max = match Target::of(meta.target()) {
        Target::Local { .. } => local_level,
        Target::External(_) => EXTERNAL_LEVEL,
    };

    meta.level() <= max
}

/// Where a log line came from
enum Target<'a> {
    Local { label: &'static str, color: Color },
    External(&'a str),
}

impl<'a> Target<'a> {
    fn of(target: &'a str) -> Self {
        let krate = target.split("::").next().unwrap_or_default();

        LOCAL_CRATES
            .iter()
            .find(|(name, ..)| *name == krate)
            .map(|&(_, label, color)| Self::Local { label, color })
            .unwrap_or(Self::External(krate))
    }
}

impl Display for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match *self {
            Self::Local { label, color } => label.color(color),
            Self::External(name) => name.clear(),
        };

        Display::fmt(&label, f)
    }
}

fn level_badge(level: Level) -> String {
    let badge = match level {
        Level::Error => " ERR ".black().on_red().bold(),
        Level::Warn => " WRN ".black().on_yellow().bold(),
        Level::Info => " INF ".black().on_blue().bold(),
        Level::Debug => " DBG ".white().on_black(),
        Level::Trace => " TRC ".normal(),
    };

    badge.to_string()
}

use std::io::stdin;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sessionlog::{
    Config, FixedFile, InstantTicks, IntervalTicks, ManualTicks, PollMode, SessionFollower,
    SystemClock, TickSource, Track, TrackChange,
};
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod session;
use session::{dump, info, read_session_as_vec, test_roundtrip};

/// sessionlog command line tools
#[derive(Parser)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None
)]
struct Cli {
    /// TOML file with follower settings
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the configured poll mode
    #[arg(long, global = true, value_enum)]
    poll_mode: Option<PollArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum PollArg {
    Tail,
    Reread,
}

impl From<PollArg> for PollMode {
    fn from(arg: PollArg) -> Self {
        match arg {
            PollArg::Tail => PollMode::Tail,
            PollArg::Reread => PollMode::Reread,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show summary info for a session file (accepts .gz; use '-' for stdin)
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the records of a session file as a table
    Dump {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// One merged track per row instead of every record
        #[arg(long)]
        dedup: bool,
        /// Include fields without a dedicated column
        #[arg(long)]
        extra: bool,
    },
    /// Run parse -> serialize -> re-parse and compare the records
    Test {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Replay a session file through the deck and now-playing models
    Replay {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Number of ticks to run after reading the file
        #[arg(long, default_value_t = 1)]
        ticks: usize,
        /// Seconds of playback per tick
        #[arg(long, default_value_t = 30)]
        tick_secs: u64,
        /// Wait for Enter before each tick (a number ticks that many seconds)
        #[arg(long)]
        step: bool,
    },
    /// Follow a growing session file in real time
    Follow {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sessionlog=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config: {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(mode) = cli.poll_mode {
        config.poll_mode = mode.into();
    }
    debug!("{:?}", config);
    Ok(config)
}

fn stamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

fn follow(file: PathBuf, config: Config, ticks: &mut dyn TickSource) -> Result<()> {
    let mut follower = SessionFollower::new(FixedFile::new(&file), SystemClock, config);
    let bus = follower.bus_mut();
    bus.on_track_changes(|batch: &[TrackChange]| {
        for change in batch {
            println!(
                "{} deck {} {:<8} #{} {}",
                stamp(),
                change.deck(),
                change.kind(),
                change.track().row,
                change.track().label()
            );
        }
    });
    bus.on_now_playing(|track: Option<&Track>| match track {
        Some(t) => println!("{} now playing   #{} {}", stamp(), t.row, t.label()),
        None => println!("{} now playing   -", stamp()),
    });
    bus.on_scrobble(|track: &Track| {
        println!("{} scrobble      #{} {}", stamp(), track.row, track.label());
    });

    let stop = AtomicBool::new(false);
    follower
        .run(ticks, &stop)
        .with_context(|| format!("following {} failed", file.display()))
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Info { file } => {
            let bytes = read_session_as_vec(&file)?;
            info(&file, bytes)?;
        }
        Commands::Dump { file, dedup, extra } => {
            let bytes = read_session_as_vec(&file)?;
            dump(&file, bytes, dedup, extra)?;
        }
        Commands::Test { file } => {
            let bytes = read_session_as_vec(&file)?;
            test_roundtrip(&file, bytes)?;
        }
        Commands::Replay {
            file,
            ticks,
            tick_secs,
            step,
        } => {
            if step {
                follow(file, config, &mut ManualTicks::new(stdin().lock(), tick_secs))?;
            } else {
                follow(file, config, &mut InstantTicks::new(ticks, tick_secs))?;
            }
        }
        Commands::Follow { file } => {
            let mut ticks = IntervalTicks::every_secs(config.tick_interval_secs);
            follow(file, config, &mut ticks)?;
        }
    }

    Ok(())
}

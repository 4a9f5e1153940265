//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Entrain - binaural beat sessions from the terminal
#[derive(Parser, Debug)]
#[command(name = "entrain")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Engine config file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play a session on an output device
    Play {
        #[command(flatten)]
        session: SessionArgs,

        /// Output device name (see `entrain devices`)
        #[arg(short, long)]
        device: Option<String>,

        /// Preferred device sample rate
        #[arg(long)]
        sample_rate: Option<u32>,

        /// Stop after this many seconds even if the session is longer
        #[arg(long)]
        limit: Option<f64>,
    },

    /// Render a session to a WAV file
    Render {
        #[command(flatten)]
        session: SessionArgs,

        /// Output WAV path
        #[arg(short, long)]
        out: PathBuf,

        /// Sample rate of the file
        #[arg(long, default_value_t = 48_000)]
        sample_rate: u32,

        /// Sample format of the file
        #[arg(long, value_enum, default_value_t = BitDepth::Int16)]
        bits: BitDepth,
    },

    /// List the built-in presets
    Presets,

    /// List output devices
    Devices,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum BitDepth {
    /// 16-bit integer PCM
    #[value(name = "16")]
    Int16,
    /// 32-bit float
    #[value(name = "32")]
    Float32,
}

/// Where the stages of a session come from. Exactly one source is used:
/// a timeline file, a preset, or a single carrier/beat stage.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Built-in preset (see `entrain presets`)
    #[arg(short, long, conflicts_with = "timeline")]
    pub preset: Option<String>,

    /// Timeline file (JSON list of stages or `{ "stages": [...] }`)
    #[arg(short, long)]
    pub timeline: Option<PathBuf>,

    /// Carrier of a single-stage session, Hz
    #[arg(long, default_value_t = 200.0)]
    pub carrier: f64,

    /// Beat of a single-stage session, Hz
    #[arg(long, default_value_t = 10.0)]
    pub beat: f64,

    /// Duration of a single-stage session, seconds
    #[arg(long, default_value_t = 600.0)]
    pub duration: f64,

    /// Master volume 0..1 (overrides the config)
    #[arg(long)]
    pub volume: Option<f32>,
}

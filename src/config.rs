use clap::{Parser, ValueEnum};

#[derive(Parser, Debug, Clone)]
#[command(name = "vizdeck", version, about = "Audio-reactive terminal visualizer deck with mutating plugins")]
pub struct Config {
    #[arg(long, value_enum, default_value_t = AudioSource::Mic)]
    pub source: AudioSource,

    #[arg(long)]
    pub device: Option<String>,

    #[arg(long, default_value_t = false)]
    pub list_devices: bool,

    #[arg(long, value_enum, default_value_t = RendererMode::HalfBlock)]
    pub renderer: RendererMode,

    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    /// Visualizer to start on (id or name fragment). Defaults to the first
    /// registered one, or the last-used one when prefs are enabled.
    #[arg(long)]
    pub viz: Option<String>,

    #[arg(long, default_value_t = false)]
    pub random: bool,

    #[arg(long, default_value_t = false)]
    pub mutate: bool,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub sync_updates: bool,

    #[arg(long, default_value_t = false)]
    pub no_prefs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AudioSource {
    Mic,
    /// Built-in deterministic test signal; no capture device required.
    Synth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RendererMode {
    #[value(alias = "ansi", alias = "text")]
    Ascii,
    #[value(name = "half-block", alias = "halfblock", alias = "half_block", alias = "hb")]
    HalfBlock,
    #[value(alias = "hires", alias = "dots")]
    Braille,
}

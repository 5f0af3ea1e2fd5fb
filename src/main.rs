use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cfg = vizdeck::config::Config::parse();
    if cfg.list_devices {
        vizdeck::audio::list_input_devices()?;
        return Ok(());
    }

    vizdeck::app::run(cfg)
}

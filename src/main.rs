mod config;
mod facade;
mod gfx;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    let args = config::Args::parse();
    let config = config::Config::resolve(args)?;

    pollster::block_on(
        facade::run(config)
    )
}

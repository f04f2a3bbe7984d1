#![windows_subsystem = "windows"]

#[cfg(windows)]
mod d3d;
#[cfg(windows)]
mod graphics;
#[cfg(windows)]
mod system;

use common::{
    config::{build_command_line, Config},
    util::{init_logging, set_log_level},
};

#[cfg(windows)]
fn run(config: &Config) -> anyhow::Result<()> {
    let mut system = system::System::initialize(config)?;
    let result = system.run();

    std::mem::drop(system);

    d3d::report_live_objects();

    result
}

#[cfg(not(windows))]
fn run(_config: &Config) -> anyhow::Result<()> {
    anyhow::bail!("EngineDev needs Windows and Direct3D 12")
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let command_line = build_command_line();
    let config = Config::startup(&command_line);
    set_log_level(config.log_level());

    log::info!("starting {}", config.title());
    log::info!(
        "window: {}x{} ({}), vsync {}",
        config.window.width,
        config.window.height,
        if config.window.fullscreen {
            "fullscreen"
        } else {
            "windowed"
        },
        if config.graphics.vsync { "on" } else { "off" }
    );

    let result = run(&config);
    if let Err(e) = &result {
        log::error!("{e:#}");
    }

    log::info!("shut down");

    result
}

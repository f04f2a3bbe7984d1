use anyhow::{Context, Result};
use common::{
    config::Config,
    os::{App, Window},
};

use crate::graphics::Graphics;

/// Owns the window and everything drawn into it.
pub struct System {
    app: App,
    // Dropped before `window`: the swapchain must go before its window.
    graphics: Graphics,
    window: Window,
}

impl System {
    pub fn initialize(config: &Config) -> Result<Self> {
        let (app, window) = App::init(config).context("failed to create the window")?;
        let graphics =
            Graphics::initialize(&window, config).context("failed to initialize graphics")?;

        Ok(Self {
            app,
            graphics,
            window,
        })
    }

    /// Run until the window closes, escape is pressed or a frame fails.
    pub fn run(&mut self) -> Result<()> {
        while self.app.run() {
            if !self.frame()? {
                break;
            }
        }

        Ok(())
    }

    fn frame(&mut self) -> Result<bool> {
        if self.window.input().escape_pressed() {
            log::info!("escape pressed, shutting down");
            return Ok(false);
        }

        self.graphics.frame()?;

        Ok(true)
    }
}

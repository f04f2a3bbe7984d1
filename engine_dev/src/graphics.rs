use anyhow::Result;
use common::{config::Config, os::Window};

use crate::d3d::D3D;

pub struct Graphics {
    d3d: D3D,
}

impl Graphics {
    pub fn initialize(window: &Window, config: &Config) -> Result<Self> {
        let d3d = D3D::new(window, config)?;
        Ok(Self { d3d })
    }

    pub fn frame(&mut self) -> Result<()> {
        self.render()
    }

    fn render(&mut self) -> Result<()> {
        self.d3d.render()
    }
}

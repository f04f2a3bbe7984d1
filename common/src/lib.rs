pub mod config;
pub mod display;
pub mod input;
pub mod placement;
pub mod util;

#[cfg(windows)]
pub mod gfx;
#[cfg(windows)]
pub mod os;

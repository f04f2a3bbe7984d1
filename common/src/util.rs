use std::{ffi::CString, io};

use env_logger::{Builder, Env, Target};
use log::LevelFilter;

pub trait AsCString {
    fn as_c_string(&self) -> CString;
}

impl AsCString for String {
    fn as_c_string(&self) -> CString {
        CString::new(self.clone()).unwrap_or_default()
    }
}

impl AsCString for &str {
    fn as_c_string(&self) -> CString {
        self.to_string().as_c_string()
    }
}

/// Send `s` to the attached debugger. Without one the text goes nowhere.
#[cfg(windows)]
pub fn print_debug_string(s: &str) {
    use windows::{core::PCSTR, Win32::System::Diagnostics::Debug::OutputDebugStringA};

    let message = s.as_c_string();
    unsafe {
        OutputDebugStringA(PCSTR(message.as_ptr() as _));
    }
}

#[cfg(not(windows))]
pub fn print_debug_string(s: &str) {
    use std::io::Write;

    let _ = io::stderr().write_all(s.as_bytes());
}

/// Log sink for a GUI-subsystem process, which has no console to write to.
#[derive(Debug, Default)]
pub struct DebugOutput;

impl io::Write for DebugOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        print_debug_string(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Route `log` records to the debugger, starting at `info`.
///
/// Called before configuration is read so its records are kept. The
/// configured level is applied afterwards with [`set_log_level`].
pub fn init_logging() {
    let mut builder = Builder::new();
    builder
        .filter_level(LevelFilter::Trace)
        .parse_env(Env::default())
        .target(Target::Pipe(Box::new(DebugOutput)));

    if let Err(e) = builder.try_init() {
        print_debug_string(&format!("logger already initialized: {e}\n"));
        return;
    }

    set_log_level(LevelFilter::Info);
}

/// Change the active level. `RUST_LOG` takes precedence over `level`.
pub fn set_log_level(level: LevelFilter) {
    if std::env::var_os(LOG_ENV_VAR).is_none() {
        log::set_max_level(level);
    }
}

const LOG_ENV_VAR: &str = "RUST_LOG";

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn c_string_from_str() {
        assert_eq!("EngineDev".as_c_string().as_bytes(), b"EngineDev");
    }

    #[test]
    fn interior_nul_becomes_empty() {
        assert!("bad\0title".to_string().as_c_string().as_bytes().is_empty());
    }

    #[test]
    fn debug_output_accepts_everything() {
        let mut out = DebugOutput;
        assert_eq!(out.write(b"frame\n").unwrap(), 6);
        out.flush().unwrap();
    }

    #[test]
    fn logging_level_follows_configuration() {
        init_logging();
        init_logging();
        log::warn!("still alive");

        if std::env::var_os(LOG_ENV_VAR).is_none() {
            set_log_level(LevelFilter::Trace);
            assert_eq!(log::max_level(), LevelFilter::Trace);
            set_log_level(LevelFilter::Warn);
            assert_eq!(log::max_level(), LevelFilter::Warn);
        }
    }
}

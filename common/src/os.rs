use anyhow::{bail, Context, Result};
use windows::{
    core::{s, PCSTR},
    Win32::{
        Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, RECT, WPARAM},
        Graphics::Gdi::{
            ChangeDisplaySettingsA, GetStockObject, BLACK_BRUSH, CDS_FULLSCREEN, CDS_TYPE,
            DEVMODEA, DISP_CHANGE_SUCCESSFUL, DM_BITSPERPEL, DM_PELSHEIGHT, DM_PELSWIDTH, HBRUSH,
        },
        System::LibraryLoader::GetModuleHandleA,
        UI::{
            Input::KeyboardAndMouse::SetFocus,
            WindowsAndMessaging::{
                CreateWindowExA, DefWindowProcA, DestroyWindow, DispatchMessageA, GetClientRect,
                GetSystemMetrics, GetWindowLongPtrA, LoadCursorA, LoadIconA, MessageBoxA,
                PeekMessageA, PostQuitMessage, RegisterClassExA, SetForegroundWindow,
                SetWindowLongPtrA, ShowCursor, ShowWindow, TranslateMessage, UnregisterClassA,
                CREATESTRUCTA, CS_HREDRAW, CS_OWNDC, CS_VREDRAW, GWLP_USERDATA, IDC_ARROW,
                IDI_WINLOGO, MB_OK, MSG, PM_REMOVE, SM_CXSCREEN, SM_CYSCREEN, SW_HIDE, SW_SHOW,
                WM_CLOSE, WM_CREATE, WM_DESTROY, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WNDCLASSEXA,
                WS_CLIPCHILDREN, WS_CLIPSIBLINGS, WS_EX_APPWINDOW, WS_POPUP,
            },
        },
    },
};

use crate::{config::Config, input::KeyStates, placement::WindowPlacement, util::AsCString};

const CLASS_NAME: PCSTR = s!("EngineDev");

/// Per-window data reachable from the window procedure through `GWLP_USERDATA`.
#[derive(Debug, Default)]
struct WindowState {
    input: KeyStates,
}

pub struct Window {
    hwnd: HWND,
    instance: HINSTANCE,
    fullscreen: bool,
    // Boxed so the address handed to the window procedure stays put.
    state: Box<WindowState>,
}

impl Window {
    fn new(title: impl Into<String>, size: (i32, i32), fullscreen: bool) -> Result<Self> {
        let instance: HINSTANCE = unsafe { GetModuleHandleA(None) }?.into();

        let wc = WNDCLASSEXA {
            cbSize: std::mem::size_of::<WNDCLASSEXA>() as u32,
            style: CS_HREDRAW | CS_VREDRAW | CS_OWNDC,
            lpfnWndProc: Some(wndproc),
            hInstance: instance,
            hIcon: unsafe { LoadIconA(None, PCSTR(IDI_WINLOGO.0 as _)) }?,
            hIconSm: unsafe { LoadIconA(None, PCSTR(IDI_WINLOGO.0 as _)) }?,
            hCursor: unsafe { LoadCursorA(None, PCSTR(IDC_ARROW.0 as _)) }?,
            hbrBackground: HBRUSH(unsafe { GetStockObject(BLACK_BRUSH) }.0),
            lpszClassName: CLASS_NAME,
            ..Default::default()
        };

        if unsafe { RegisterClassExA(&wc) } == 0 {
            bail!("window class EngineDev is already registered");
        }

        // From here on, dropping `window` undoes whatever has been set up.
        let mut window = Self {
            hwnd: HWND::default(),
            instance,
            fullscreen,
            state: Box::default(),
        };

        let screen_size = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        let placement = WindowPlacement::resolve(size, screen_size, fullscreen);

        if fullscreen {
            enter_fullscreen_display_mode(placement.size());
        }

        let title = title.into();
        let state: *mut WindowState = &mut *window.state;

        window.hwnd = unsafe {
            CreateWindowExA(
                WS_EX_APPWINDOW,
                CLASS_NAME,
                PCSTR(title.as_c_string().as_ptr() as _),
                WS_CLIPSIBLINGS | WS_CLIPCHILDREN | WS_POPUP,
                placement.x,
                placement.y,
                placement.width,
                placement.height,
                None, // No parent window.
                None, // No menus.
                instance,
                Some(state as *const _),
            )
        }
        .context("failed to create the application window")?;

        if window.hwnd == HWND::default() {
            bail!("failed to create a window handle");
        }

        log::info!(
            "created {}x{} window at ({}, {}){}",
            placement.width,
            placement.height,
            placement.x,
            placement.y,
            if fullscreen { " in fullscreen" } else { "" }
        );

        Ok(window)
    }

    pub fn get_handle(&self) -> HWND {
        self.hwnd
    }

    pub fn get_physical_size(&self) -> (i32, i32) {
        let mut window_rect = RECT::default();
        if let Err(e) = unsafe { GetClientRect(self.hwnd, &mut window_rect) } {
            log::warn!("failed to get client rect {e}");
        }

        (
            window_rect.right - window_rect.left,
            window_rect.bottom - window_rect.top,
        )
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn input(&self) -> &KeyStates {
        &self.state.input
    }

    pub fn set_visible(&self, visible: bool) {
        let show = if visible { SW_SHOW } else { SW_HIDE };
        let _ = unsafe { ShowWindow(self.hwnd, show) };
    }

    /// Bring the window to the front, take keyboard focus and hide the cursor.
    fn activate(&self) {
        unsafe {
            let _ = SetForegroundWindow(self.hwnd);
            let _ = SetFocus(self.hwnd);
            ShowCursor(false);
        }
    }

    /// Modal error report, usable before any rendering works.
    pub fn show_message_box(&self, text: &str, caption: &str) {
        let text = text.as_c_string();
        let caption = caption.as_c_string();
        unsafe {
            MessageBoxA(
                self.hwnd,
                PCSTR(text.as_ptr() as _),
                PCSTR(caption.as_ptr() as _),
                MB_OK,
            );
        }
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        unsafe { ShowCursor(true) };

        if self.fullscreen {
            unsafe { ChangeDisplaySettingsA(None, CDS_TYPE(0)) };
        }

        if self.hwnd != HWND::default() {
            if let Err(e) = unsafe { DestroyWindow(self.hwnd) } {
                log::warn!("failed to destroy window {e}");
            }
            self.hwnd = HWND::default();
        }

        if let Err(e) = unsafe { UnregisterClassA(CLASS_NAME, self.instance) } {
            log::warn!("failed to unregister window class {e}");
        }
    }
}

fn enter_fullscreen_display_mode(size: (i32, i32)) {
    let dev_mode = DEVMODEA {
        dmSize: std::mem::size_of::<DEVMODEA>() as u16,
        dmPelsWidth: size.0 as u32,
        dmPelsHeight: size.1 as u32,
        dmBitsPerPel: 32,
        dmFields: DM_BITSPERPEL | DM_PELSWIDTH | DM_PELSHEIGHT,
        ..Default::default()
    };

    let result = unsafe { ChangeDisplaySettingsA(Some(&dev_mode as *const _), CDS_FULLSCREEN) };
    if result != DISP_CHANGE_SUCCESSFUL {
        log::warn!("failed to switch display to {}x{}: {result:?}", size.0, size.1);
    }
}

pub struct App {}

impl App {
    pub fn init(config: &Config) -> Result<(App, Window)> {
        let app = App {};

        let window = Window::new(
            config.title(),
            (config.window.width, config.window.height),
            config.window.fullscreen,
        )?;
        window.set_visible(true);
        window.activate();

        Ok((app, window))
    }

    /// Pump pending window messages. Returns `false` once the application should quit.
    pub fn run(&mut self) -> bool {
        let mut running = true;
        let mut message = MSG::default();
        while running {
            if unsafe { PeekMessageA(&mut message, None, 0, 0, PM_REMOVE).as_bool() } {
                unsafe {
                    let _ = TranslateMessage(&message);
                    DispatchMessageA(&message);
                }

                if message.message == WM_QUIT {
                    log::info!("quit requested");
                    running = false;
                    break;
                }
            } else {
                break;
            }
        }

        running
    }
}

fn window_wndproc(state: &mut WindowState, message: u32, wparam: WPARAM) -> bool {
    match message {
        WM_KEYDOWN => {
            let key = wparam.0 as u32;
            log::trace!("key down: {key:#04x}");
            state.input.key_down(key);
            true
        }

        WM_KEYUP => {
            let key = wparam.0 as u32;
            log::trace!("key up: {key:#04x}");
            state.input.key_up(key);
            true
        }

        _ => false,
    }
}

extern "system" fn wndproc(hwnd: HWND, message: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    match message {
        WM_CREATE => {
            let create_struct = unsafe { &*(lparam.0 as *const CREATESTRUCTA) };
            unsafe { SetWindowLongPtrA(hwnd, GWLP_USERDATA, create_struct.lpCreateParams as _) };
            LRESULT::default()
        }

        WM_DESTROY | WM_CLOSE => {
            unsafe { PostQuitMessage(0) };
            LRESULT::default()
        }

        _ => {
            let user_data = unsafe { GetWindowLongPtrA(hwnd, GWLP_USERDATA) };
            let state = std::ptr::NonNull::<WindowState>::new(user_data as _);
            let handled =
                state.is_some_and(|mut s| window_wndproc(unsafe { s.as_mut() }, message, wparam));

            if handled {
                LRESULT::default()
            } else {
                unsafe { DefWindowProcA(hwnd, message, wparam, lparam) }
            }
        }
    }
}

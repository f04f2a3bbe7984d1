/// Screen-space rectangle the application window is created with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowPlacement {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl WindowPlacement {
    /// Centre a window of `size` on a screen of `screen_size`.
    pub fn centered(size: (i32, i32), screen_size: (i32, i32)) -> Self {
        Self {
            x: (screen_size.0 - size.0) / 2,
            y: (screen_size.1 - size.1) / 2,
            width: size.0,
            height: size.1,
        }
    }

    /// Cover the whole screen.
    pub fn fullscreen(screen_size: (i32, i32)) -> Self {
        Self {
            x: 0,
            y: 0,
            width: screen_size.0,
            height: screen_size.1,
        }
    }

    pub fn resolve(size: (i32, i32), screen_size: (i32, i32), fullscreen: bool) -> Self {
        if fullscreen {
            Self::fullscreen(screen_size)
        } else {
            Self::centered(size, screen_size)
        }
    }

    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windowed_is_centered() {
        let placement = WindowPlacement::resolve((800, 600), (1920, 1080), false);
        assert_eq!(
            placement,
            WindowPlacement {
                x: 560,
                y: 240,
                width: 800,
                height: 600,
            }
        );
    }

    #[test]
    fn fullscreen_takes_the_screen() {
        let placement = WindowPlacement::resolve((800, 600), (2560, 1440), true);
        assert_eq!((placement.x, placement.y), (0, 0));
        assert_eq!(placement.size(), (2560, 1440));
    }

    #[test]
    fn window_larger_than_screen_goes_negative() {
        let placement = WindowPlacement::centered((1024, 768), (800, 600));
        assert_eq!((placement.x, placement.y), (-112, -84));
    }
}

/// Number of virtual-key codes tracked by [`KeyStates`].
pub const KEY_COUNT: usize = 256;

/// Virtual-key code of the escape key.
pub const VK_ESCAPE_CODE: u32 = 0x1B;

/// Pressed/released state for every virtual-key code, fed from window messages.
#[derive(Clone, Debug)]
pub struct KeyStates {
    keys: [bool; KEY_COUNT],
}

impl Default for KeyStates {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStates {
    pub fn new() -> Self {
        Self {
            keys: [false; KEY_COUNT],
        }
    }

    pub fn key_down(&mut self, key: u32) {
        if let Some(state) = self.keys.get_mut(key as usize) {
            *state = true;
        }
    }

    pub fn key_up(&mut self, key: u32) {
        if let Some(state) = self.keys.get_mut(key as usize) {
            *state = false;
        }
    }

    /// Codes outside the table are never down.
    pub fn is_key_down(&self, key: u32) -> bool {
        self.keys.get(key as usize).copied().unwrap_or(false)
    }

    /// Escape ends the application.
    pub fn escape_pressed(&self) -> bool {
        self.is_key_down(VK_ESCAPE_CODE)
    }

    pub fn reset(&mut self) {
        self.keys = [false; KEY_COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_keys_start_released() {
        let keys = KeyStates::new();
        assert!((0..KEY_COUNT as u32).all(|k| !keys.is_key_down(k)));
    }

    #[test]
    fn key_down_then_up() {
        let mut keys = KeyStates::default();
        keys.key_down(VK_ESCAPE_CODE);
        assert!(keys.is_key_down(VK_ESCAPE_CODE));
        assert!(!keys.is_key_down(0x41));

        keys.key_up(VK_ESCAPE_CODE);
        assert!(!keys.is_key_down(VK_ESCAPE_CODE));
    }

    #[test]
    fn repeated_key_down_is_idempotent() {
        let mut keys = KeyStates::new();
        keys.key_down(0x41);
        keys.key_down(0x41);
        keys.key_up(0x41);
        assert!(!keys.is_key_down(0x41));
    }

    #[test]
    fn out_of_range_codes_are_ignored() {
        let mut keys = KeyStates::new();
        keys.key_down(256);
        keys.key_down(u32::MAX);
        keys.key_up(1000);
        assert!(!keys.is_key_down(256));
        assert!(!keys.is_key_down(u32::MAX));
        assert!(!keys.is_key_down(0));
    }

    #[test]
    fn boundary_codes_are_tracked() {
        let mut keys = KeyStates::new();
        keys.key_down(0);
        keys.key_down(255);
        assert!(keys.is_key_down(0));
        assert!(keys.is_key_down(255));
    }

    #[test]
    fn escape_requests_exit_only_while_held() {
        let mut keys = KeyStates::new();
        assert!(!keys.escape_pressed());

        keys.key_down(0x51);
        assert!(!keys.escape_pressed());

        keys.key_down(VK_ESCAPE_CODE);
        assert!(keys.escape_pressed());

        keys.key_up(VK_ESCAPE_CODE);
        assert!(!keys.escape_pressed());
    }

    #[test]
    fn reset_releases_everything() {
        let mut keys = KeyStates::new();
        keys.key_down(0x20);
        keys.key_down(VK_ESCAPE_CODE);
        keys.reset();
        assert!(!keys.is_key_down(0x20));
        assert!(!keys.is_key_down(VK_ESCAPE_CODE));
    }
}

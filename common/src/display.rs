//! Platform-independent pieces of swapchain and adapter setup.

/// Number of back buffers in the swapchain.
pub const FRAME_COUNT: u32 = 2;

/// Longest adapter name kept, leaving room for a terminator in a 128-byte buffer.
pub const MAX_ADAPTER_NAME_LEN: usize = 127;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    pub refresh_rate: RefreshRate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshRate {
    pub numerator: u32,
    pub denominator: u32,
}

impl RefreshRate {
    /// Lets DXGI pick the rate.
    pub const UNLOCKED: RefreshRate = RefreshRate {
        numerator: 0,
        denominator: 1,
    };

    pub fn hz(&self) -> f32 {
        if self.denominator == 0 {
            0.0
        } else {
            self.numerator as f32 / self.denominator as f32
        }
    }
}

/// Refresh rate for the swapchain.
///
/// With vsync the rate of the last mode matching the back buffer size is used.
/// Without vsync, or when no mode matches, the rate is left to DXGI.
pub fn select_refresh_rate(
    modes: &[DisplayMode],
    width: u32,
    height: u32,
    vsync: bool,
) -> RefreshRate {
    if !vsync {
        return RefreshRate::UNLOCKED;
    }

    modes
        .iter()
        .rev()
        .find(|mode| mode.width == width && mode.height == height)
        .map(|mode| mode.refresh_rate)
        .filter(|rate| rate.denominator != 0)
        .unwrap_or(RefreshRate::UNLOCKED)
}

pub fn present_sync_interval(vsync: bool) -> u32 {
    if vsync {
        1
    } else {
        0
    }
}

/// Address of the `index`th descriptor in a heap starting at `heap_start`.
pub fn descriptor_offset(heap_start: usize, index: u32, increment: usize) -> usize {
    heap_start + index as usize * increment
}

/// CPU-side bookkeeping for a fence created at 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FenceCounter {
    next: u64,
}

impl Default for FenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FenceCounter {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_value(&self) -> u64 {
        self.next
    }

    /// Value to signal now. Every later signal uses a larger one.
    pub fn advance(&mut self) -> u64 {
        let value = self.next;
        self.next += 1;
        value
    }

    /// Whether the CPU must block until the GPU reaches `signalled`.
    pub fn must_wait(completed: u64, signalled: u64) -> bool {
        completed < signalled
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdapterInfo {
    pub name: String,
    pub dedicated_video_memory_mb: usize,
}

impl AdapterInfo {
    pub fn from_raw(description: &[u16], dedicated_video_memory: usize) -> Self {
        let len = description
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(description.len());
        let name = String::from_utf16_lossy(&description[..len])
            .chars()
            .take(MAX_ADAPTER_NAME_LEN)
            .collect();

        Self {
            name,
            dedicated_video_memory_mb: dedicated_video_memory / 1024 / 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(width: u32, height: u32, numerator: u32, denominator: u32) -> DisplayMode {
        DisplayMode {
            width,
            height,
            refresh_rate: RefreshRate {
                numerator,
                denominator,
            },
        }
    }

    #[test]
    fn vsync_uses_last_matching_mode() {
        let modes = [
            mode(800, 600, 60, 1),
            mode(1920, 1080, 60000, 1001),
            mode(800, 600, 144, 1),
            mode(1024, 768, 75, 1),
        ];

        let rate = select_refresh_rate(&modes, 800, 600, true);
        assert_eq!(
            rate,
            RefreshRate {
                numerator: 144,
                denominator: 1
            }
        );
    }

    #[test]
    fn no_vsync_is_unlocked() {
        let modes = [mode(800, 600, 60, 1)];
        assert_eq!(
            select_refresh_rate(&modes, 800, 600, false),
            RefreshRate::UNLOCKED
        );
    }

    #[test]
    fn no_matching_mode_is_unlocked() {
        let modes = [mode(1920, 1080, 60, 1)];
        assert_eq!(
            select_refresh_rate(&modes, 800, 600, true),
            RefreshRate::UNLOCKED
        );
        assert_eq!(select_refresh_rate(&[], 800, 600, true), RefreshRate::UNLOCKED);
    }

    #[test]
    fn zero_denominator_is_unlocked() {
        let modes = [mode(800, 600, 60, 0)];
        assert_eq!(
            select_refresh_rate(&modes, 800, 600, true),
            RefreshRate::UNLOCKED
        );
    }

    #[test]
    fn refresh_rate_in_hz() {
        assert_eq!(RefreshRate::UNLOCKED.hz(), 0.0);
        let rate = RefreshRate {
            numerator: 120,
            denominator: 2,
        };
        assert_eq!(rate.hz(), 60.0);
    }

    #[test]
    fn sync_interval_follows_vsync() {
        assert_eq!(present_sync_interval(true), 1);
        assert_eq!(present_sync_interval(false), 0);
    }

    #[test]
    fn descriptors_are_laid_out_by_increment() {
        assert_eq!(descriptor_offset(0x1000, 0, 32), 0x1000);
        assert_eq!(descriptor_offset(0x1000, 1, 32), 0x1020);
    }

    #[test]
    fn fence_values_start_above_the_initial_value() {
        let mut fence = FenceCounter::new();
        assert_eq!(fence.next_value(), 1);
        assert_eq!(fence.advance(), 1);
        assert_eq!(fence.advance(), 2);
        assert_eq!(fence.next_value(), 3);
    }

    #[test]
    fn wait_only_while_the_gpu_is_behind() {
        let mut fence = FenceCounter::default();
        let signalled = fence.advance();
        assert!(FenceCounter::must_wait(0, signalled));
        assert!(!FenceCounter::must_wait(signalled, signalled));
        assert!(!FenceCounter::must_wait(u64::MAX, signalled));
    }

    #[test]
    fn adapter_name_stops_at_nul() {
        let mut description = [0u16; 128];
        for (slot, c) in description.iter_mut().zip("Radeon RX".encode_utf16()) {
            *slot = c;
        }

        let info = AdapterInfo::from_raw(&description, 8 * 1024 * 1024 * 1024);
        assert_eq!(info.name, "Radeon RX");
        assert_eq!(info.dedicated_video_memory_mb, 8192);
    }

    #[test]
    fn adapter_name_is_truncated() {
        let description = vec![u16::from(b'x'); 200];
        let info = AdapterInfo::from_raw(&description, 1024 * 1024 + 1);
        assert_eq!(info.name.len(), MAX_ADAPTER_NAME_LEN);
        assert_eq!(info.dedicated_video_memory_mb, 1);
    }

    #[test]
    fn software_adapter_has_no_dedicated_memory() {
        let description: Vec<u16> = "Microsoft Basic Render Driver".encode_utf16().collect();
        let info = AdapterInfo::from_raw(&description, 0);
        assert_eq!(info.name, "Microsoft Basic Render Driver");
        assert_eq!(info.dedicated_video_memory_mb, 0);
    }
}

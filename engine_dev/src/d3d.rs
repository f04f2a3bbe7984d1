//! Direct3D 12 device, swapchain and the per-frame clear.

use anyhow::{Context, Result};
use common::{
    config::{Config, FeatureLevel},
    display::{
        present_sync_interval, select_refresh_rate, AdapterInfo, DisplayMode, FenceCounter,
        RefreshRate, FRAME_COUNT,
    },
    gfx::{cpu_descriptor_handle, transition_barrier},
    os::Window,
};
use windows::{
    core::Interface,
    Win32::{
        Foundation::{CloseHandle, HANDLE},
        Graphics::{
            Direct3D::{
                D3D_FEATURE_LEVEL, D3D_FEATURE_LEVEL_11_0, D3D_FEATURE_LEVEL_11_1,
                D3D_FEATURE_LEVEL_12_0, D3D_FEATURE_LEVEL_12_1,
            },
            Direct3D12::{
                D3D12CreateDevice, D3D12GetDebugInterface, ID3D12CommandAllocator,
                ID3D12CommandList, ID3D12CommandQueue, ID3D12Debug, ID3D12DescriptorHeap,
                ID3D12Device, ID3D12Fence, ID3D12GraphicsCommandList, ID3D12InfoQueue,
                ID3D12Resource, D3D12_COMMAND_LIST_TYPE_DIRECT, D3D12_COMMAND_QUEUE_DESC,
                D3D12_COMMAND_QUEUE_FLAG_NONE, D3D12_COMMAND_QUEUE_PRIORITY_NORMAL,
                D3D12_DESCRIPTOR_HEAP_DESC, D3D12_DESCRIPTOR_HEAP_FLAG_NONE,
                D3D12_DESCRIPTOR_HEAP_TYPE_RTV, D3D12_FENCE_FLAG_NONE, D3D12_INFO_QUEUE_FILTER,
                D3D12_INFO_QUEUE_FILTER_DESC,
                D3D12_MESSAGE_ID_CLEARRENDERTARGETVIEW_MISMATCHINGCLEARVALUE,
                D3D12_MESSAGE_ID_MAP_INVALID_NULLRANGE, D3D12_MESSAGE_ID_UNMAP_INVALID_NULLRANGE,
                D3D12_MESSAGE_SEVERITY_CORRUPTION, D3D12_MESSAGE_SEVERITY_ERROR,
                D3D12_MESSAGE_SEVERITY_INFO, D3D12_MESSAGE_SEVERITY_WARNING,
                D3D12_RESOURCE_STATE_PRESENT, D3D12_RESOURCE_STATE_RENDER_TARGET,
            },
            Dxgi::{
                Common::{
                    DXGI_FORMAT_R8G8B8A8_UNORM, DXGI_MODE_DESC, DXGI_MODE_SCALING_UNSPECIFIED,
                    DXGI_MODE_SCANLINE_ORDER_UNSPECIFIED, DXGI_RATIONAL, DXGI_SAMPLE_DESC,
                },
                CreateDXGIFactory2, DXGIGetDebugInterface1, IDXGIAdapter1, IDXGIDebug1,
                IDXGIFactory4, IDXGISwapChain3, DXGI_ADAPTER_FLAG, DXGI_ADAPTER_FLAG_NONE,
                DXGI_ADAPTER_FLAG_SOFTWARE, DXGI_CREATE_FACTORY_DEBUG, DXGI_CREATE_FACTORY_FLAGS,
                DXGI_DEBUG_ALL, DXGI_DEBUG_RLO_DETAIL, DXGI_DEBUG_RLO_IGNORE_INTERNAL,
                DXGI_ENUM_MODES_INTERLACED, DXGI_MWA_NO_ALT_ENTER, DXGI_PRESENT,
                DXGI_SWAP_CHAIN_DESC1, DXGI_SWAP_CHAIN_FULLSCREEN_DESC,
                DXGI_SWAP_EFFECT_FLIP_DISCARD, DXGI_USAGE_RENDER_TARGET_OUTPUT,
            },
        },
        System::Threading::{CreateEventA, WaitForSingleObject, INFINITE},
    },
};

fn d3d_feature_level(level: FeatureLevel) -> D3D_FEATURE_LEVEL {
    match level {
        FeatureLevel::Level11_0 => D3D_FEATURE_LEVEL_11_0,
        FeatureLevel::Level11_1 => D3D_FEATURE_LEVEL_11_1,
        FeatureLevel::Level12_0 => D3D_FEATURE_LEVEL_12_0,
        FeatureLevel::Level12_1 => D3D_FEATURE_LEVEL_12_1,
    }
}

fn debug_layer_enabled(config: &Config) -> bool {
    cfg!(debug_assertions) && config.debug.debug_layer
}

fn get_hardware_adapter(
    factory: &IDXGIFactory4,
    feature_level: FeatureLevel,
) -> Result<IDXGIAdapter1> {
    let mut i = 0;
    loop {
        let adapter = unsafe { factory.EnumAdapters1(i) }.with_context(|| {
            format!("no hardware adapter supports Direct3D 12 at feature level {feature_level}")
        })?;
        let desc = unsafe { adapter.GetDesc1() }?;
        i += 1;

        if (DXGI_ADAPTER_FLAG(desc.Flags as _) & DXGI_ADAPTER_FLAG_SOFTWARE)
            != DXGI_ADAPTER_FLAG_NONE
        {
            // Don't select the Basic Render Driver adapter.
            // Pass in "/warp" on the command line if you want a software adapter.
            continue;
        }

        // Check to see whether the adapter supports D3D12 but don't create the device yet.
        if unsafe {
            D3D12CreateDevice(
                &adapter,
                d3d_feature_level(feature_level),
                std::ptr::null_mut::<Option<ID3D12Device>>(),
            )
        }
        .is_ok()
        {
            return Ok(adapter);
        }
    }
}

fn enable_debug_layer() {
    unsafe {
        let mut debug: Option<ID3D12Debug> = None;
        if let Some(debug) = D3D12GetDebugInterface(&mut debug).ok().and(debug) {
            debug.EnableDebugLayer();
            log::debug!("D3D12 debug layer enabled");

            if let Ok(dxgi_debug) = DXGIGetDebugInterface1::<IDXGIDebug1>(0) {
                dxgi_debug.EnableLeakTrackingForThread();
            }
        } else {
            log::warn!("D3D12 debug layer requested but not available");
        }
    }
}

fn configure_info_queue(device: &ID3D12Device) -> Result<()> {
    unsafe {
        let info_queue = device.cast::<ID3D12InfoQueue>()?;
        info_queue.SetBreakOnSeverity(D3D12_MESSAGE_SEVERITY_CORRUPTION, true)?;
        info_queue.SetBreakOnSeverity(D3D12_MESSAGE_SEVERITY_ERROR, true)?;
        info_queue.SetBreakOnSeverity(D3D12_MESSAGE_SEVERITY_WARNING, true)?;

        let mut severities = [D3D12_MESSAGE_SEVERITY_INFO];
        let mut deny_ids = [
            D3D12_MESSAGE_ID_CLEARRENDERTARGETVIEW_MISMATCHINGCLEARVALUE,
            D3D12_MESSAGE_ID_MAP_INVALID_NULLRANGE,
            D3D12_MESSAGE_ID_UNMAP_INVALID_NULLRANGE,
        ];

        let filter = D3D12_INFO_QUEUE_FILTER {
            DenyList: D3D12_INFO_QUEUE_FILTER_DESC {
                NumSeverities: severities.len() as u32,
                pSeverityList: severities.as_mut_ptr(),
                NumIDs: deny_ids.len() as u32,
                pIDList: deny_ids.as_mut_ptr(),
                ..Default::default()
            },
            ..Default::default()
        };

        info_queue.PushStorageFilter(&filter)?;
    }

    Ok(())
}

fn create_device(
    window: &Window,
    config: &Config,
) -> Result<(IDXGIFactory4, IDXGIAdapter1, ID3D12Device)> {
    let debug = debug_layer_enabled(config);
    if debug {
        enable_debug_layer();
    }

    let dxgi_factory_flags = if debug {
        DXGI_CREATE_FACTORY_DEBUG
    } else {
        DXGI_CREATE_FACTORY_FLAGS(0)
    };

    let dxgi_factory: IDXGIFactory4 = unsafe { CreateDXGIFactory2(dxgi_factory_flags) }
        .context("failed to create the DXGI factory")?;

    let feature_level = config.graphics.feature_level;
    let created = if config.graphics.use_warp {
        unsafe { dxgi_factory.EnumWarpAdapter() }.context("failed to get the WARP adapter")
    } else {
        get_hardware_adapter(&dxgi_factory, feature_level)
    }
    .and_then(|adapter: IDXGIAdapter1| {
        let mut device: Option<ID3D12Device> = None;
        unsafe { D3D12CreateDevice(&adapter, d3d_feature_level(feature_level), &mut device) }?;
        let device = device.context("D3D12CreateDevice returned no device")?;
        Ok((adapter, device))
    });

    let (adapter, device) = match created {
        Ok(created) => created,
        Err(e) => {
            window.show_message_box(
                &format!(
                    "Could not create a DirectX {feature_level} device. \
                     Video card does not support DirectX {feature_level}."
                ),
                "DirectX Device Failure",
            );
            return Err(e.context(format!("failed to create a Direct3D {feature_level} device")));
        }
    };

    if debug {
        configure_info_queue(&device).context("failed to configure the info queue")?;
    }

    Ok((dxgi_factory, adapter, device))
}

/// Refresh rate of the adapter's primary output for a `width`x`height` back buffer.
fn query_refresh_rate(
    adapter: &IDXGIAdapter1,
    width: u32,
    height: u32,
    vsync: bool,
) -> Result<RefreshRate> {
    let output = match unsafe { adapter.EnumOutputs(0) } {
        Ok(output) => output,
        Err(e) => {
            // WARP and headless adapters have no outputs.
            log::warn!("adapter has no output ({e}), leaving refresh rate to DXGI");
            return Ok(RefreshRate::UNLOCKED);
        }
    };

    let mut num_modes = 0u32;
    unsafe {
        output.GetDisplayModeList(
            DXGI_FORMAT_R8G8B8A8_UNORM,
            DXGI_ENUM_MODES_INTERLACED,
            &mut num_modes,
            None,
        )
    }
    .context("failed to count display modes")?;

    let mut mode_descs = vec![DXGI_MODE_DESC::default(); num_modes as usize];
    unsafe {
        output.GetDisplayModeList(
            DXGI_FORMAT_R8G8B8A8_UNORM,
            DXGI_ENUM_MODES_INTERLACED,
            &mut num_modes,
            Some(mode_descs.as_mut_ptr()),
        )
    }
    .context("failed to list display modes")?;
    mode_descs.truncate(num_modes as usize);

    let modes: Vec<DisplayMode> = mode_descs
        .iter()
        .map(|mode| DisplayMode {
            width: mode.Width,
            height: mode.Height,
            refresh_rate: RefreshRate {
                numerator: mode.RefreshRate.Numerator,
                denominator: mode.RefreshRate.Denominator,
            },
        })
        .collect();

    Ok(select_refresh_rate(&modes, width, height, vsync))
}

pub fn report_live_objects() {
    unsafe {
        if cfg!(debug_assertions) {
            if let Ok(dxgi_debug) = DXGIGetDebugInterface1::<IDXGIDebug1>(0) {
                let _ = dxgi_debug.ReportLiveObjects(
                    DXGI_DEBUG_ALL,
                    DXGI_DEBUG_RLO_DETAIL | DXGI_DEBUG_RLO_IGNORE_INTERNAL,
                );
            }
        }
    }
}

#[allow(unused)]
pub struct D3D {
    vsync: bool,
    clear_color: [f32; 4],
    adapter_info: AdapterInfo,
    refresh_rate: RefreshRate,
    dxgi_factory: IDXGIFactory4,
    device: ID3D12Device,
    command_queue: ID3D12CommandQueue,
    swapchain: IDXGISwapChain3,
    frame_index: u32,
    rtv_heap: ID3D12DescriptorHeap,
    rtv_descriptor_size: usize,
    render_targets: Vec<ID3D12Resource>,
    command_allocator: ID3D12CommandAllocator,
    command_list: ID3D12GraphicsCommandList,
    fence: ID3D12Fence,
    fence_value: FenceCounter,
    fence_event: HANDLE,
}

impl D3D {
    pub fn new(window: &Window, config: &Config) -> Result<Self> {
        let vsync = config.graphics.vsync;

        let (dxgi_factory, adapter, device) = create_device(window, config)?;

        let command_queue: ID3D12CommandQueue = unsafe {
            device.CreateCommandQueue(&D3D12_COMMAND_QUEUE_DESC {
                Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
                Priority: D3D12_COMMAND_QUEUE_PRIORITY_NORMAL.0,
                Flags: D3D12_COMMAND_QUEUE_FLAG_NONE,
                NodeMask: 0,
            })
        }
        .context("failed to create the command queue")?;

        let (width, height) = window.get_physical_size();
        let (width, height) = (width as u32, height as u32);

        let refresh_rate = query_refresh_rate(&adapter, width, height, vsync)?;

        let desc = unsafe { adapter.GetDesc1() }.context("failed to describe the adapter")?;
        let adapter_info = AdapterInfo::from_raw(&desc.Description, desc.DedicatedVideoMemory);
        log::info!(
            "adapter: {} ({} MB dedicated video memory)",
            adapter_info.name,
            adapter_info.dedicated_video_memory_mb
        );
        log::info!(
            "refresh rate: {}/{} ({:.2} Hz), vsync {}",
            refresh_rate.numerator,
            refresh_rate.denominator,
            refresh_rate.hz(),
            if vsync { "on" } else { "off" }
        );

        let swapchain_desc = DXGI_SWAP_CHAIN_DESC1 {
            BufferCount: FRAME_COUNT,
            Width: width,
            Height: height,
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            ..Default::default()
        };

        let fullscreen_desc = DXGI_SWAP_CHAIN_FULLSCREEN_DESC {
            RefreshRate: DXGI_RATIONAL {
                Numerator: refresh_rate.numerator,
                Denominator: refresh_rate.denominator,
            },
            ScanlineOrdering: DXGI_MODE_SCANLINE_ORDER_UNSPECIFIED,
            Scaling: DXGI_MODE_SCALING_UNSPECIFIED,
            Windowed: true.into(),
        };

        let swapchain: IDXGISwapChain3 = unsafe {
            dxgi_factory.CreateSwapChainForHwnd(
                &command_queue,
                window.get_handle(),
                &swapchain_desc,
                Some(&fullscreen_desc as *const _),
                None,
            )
        }
        .context("failed to create the swapchain")?
        .cast()?;

        if window.is_fullscreen() {
            unsafe { swapchain.SetFullscreenState(true, None) }
                .context("failed to switch the swapchain to fullscreen")?;
        }

        unsafe {
            dxgi_factory.MakeWindowAssociation(window.get_handle(), DXGI_MWA_NO_ALT_ENTER)?;
        }

        let rtv_heap: ID3D12DescriptorHeap = unsafe {
            device.CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                NumDescriptors: FRAME_COUNT,
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
                Flags: D3D12_DESCRIPTOR_HEAP_FLAG_NONE,
                ..Default::default()
            })
        }
        .context("failed to create the RTV descriptor heap")?;

        let rtv_descriptor_size =
            unsafe { device.GetDescriptorHandleIncrementSize(D3D12_DESCRIPTOR_HEAP_TYPE_RTV) }
                as usize;

        let render_targets = (0..FRAME_COUNT)
            .map(|i| -> Result<ID3D12Resource> {
                let render_target: ID3D12Resource = unsafe { swapchain.GetBuffer(i) }
                    .with_context(|| format!("failed to get swapchain buffer {i}"))?;
                unsafe {
                    device.CreateRenderTargetView(
                        &render_target,
                        None,
                        cpu_descriptor_handle(&rtv_heap, i, rtv_descriptor_size),
                    )
                };
                Ok(render_target)
            })
            .collect::<Result<Vec<_>>>()?;

        let frame_index = unsafe { swapchain.GetCurrentBackBufferIndex() };

        let command_allocator: ID3D12CommandAllocator =
            unsafe { device.CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT) }
                .context("failed to create the command allocator")?;

        let command_list: ID3D12GraphicsCommandList = unsafe {
            device.CreateCommandList(0, D3D12_COMMAND_LIST_TYPE_DIRECT, &command_allocator, None)
        }
        .context("failed to create the command list")?;
        // Command lists are created recording.
        unsafe { command_list.Close() }?;

        let fence: ID3D12Fence = unsafe { device.CreateFence(0, D3D12_FENCE_FLAG_NONE) }
            .context("failed to create the fence")?;

        let fence_value = FenceCounter::new();

        let fence_event = unsafe { CreateEventA(None, false, false, None) }
            .context("failed to create the fence event")?;

        log::info!("Direct3D 12 initialized: {width}x{height}, {FRAME_COUNT} back buffers");

        Ok(Self {
            vsync,
            clear_color: config.graphics.clear_color,
            adapter_info,
            refresh_rate,
            dxgi_factory,
            device,
            command_queue,
            swapchain,
            frame_index,
            rtv_heap,
            rtv_descriptor_size,
            render_targets,
            command_allocator,
            command_list,
            fence,
            fence_value,
            fence_event,
        })
    }

    fn populate_command_list(&self) -> windows::core::Result<()> {
        // Command list allocators can only be reset when the associated
        // command lists have finished execution on the GPU.
        unsafe { self.command_allocator.Reset() }?;

        unsafe { self.command_list.Reset(&self.command_allocator, None) }?;

        let back_buffer = &self.render_targets[self.frame_index as usize];

        // Indicate that the back buffer will be used as a render target.
        let barrier = transition_barrier(
            back_buffer,
            D3D12_RESOURCE_STATE_PRESENT,
            D3D12_RESOURCE_STATE_RENDER_TARGET,
        );
        unsafe {
            self.command_list.ResourceBarrier(&[barrier]);
        }

        let rtv_handle =
            cpu_descriptor_handle(&self.rtv_heap, self.frame_index, self.rtv_descriptor_size);

        unsafe {
            self.command_list
                .OMSetRenderTargets(1, Some(&rtv_handle), false, None);

            self.command_list
                .ClearRenderTargetView(rtv_handle, &self.clear_color, None);

            // Indicate that the back buffer will now be used to present.
            let barrier = transition_barrier(
                back_buffer,
                D3D12_RESOURCE_STATE_RENDER_TARGET,
                D3D12_RESOURCE_STATE_PRESENT,
            );
            self.command_list.ResourceBarrier(&[barrier]);
        }

        unsafe { self.command_list.Close() }
    }

    /// Block until the GPU has finished everything submitted so far.
    fn wait_for_gpu(&mut self) -> Result<()> {
        let current_fence_value = self.fence_value.advance();

        unsafe { self.command_queue.Signal(&self.fence, current_fence_value) }
            .context("failed to signal fence")?;

        let completed = unsafe { self.fence.GetCompletedValue() };
        if FenceCounter::must_wait(completed, current_fence_value) {
            unsafe {
                self.fence
                    .SetEventOnCompletion(current_fence_value, self.fence_event)
            }
            .context("failed to set fence event completion value")?;

            unsafe { WaitForSingleObject(self.fence_event, INFINITE) };
        }

        Ok(())
    }

    fn wait_for_previous_frame(&mut self) -> Result<()> {
        // Waiting on every frame keeps the CPU and GPU in lockstep.
        self.wait_for_gpu()?;

        self.frame_index = unsafe { self.swapchain.GetCurrentBackBufferIndex() };

        Ok(())
    }

    pub fn render(&mut self) -> Result<()> {
        self.populate_command_list()
            .context("failed to populate command list")?;

        let command_list: ID3D12CommandList = self.command_list.cast()?;
        unsafe {
            self.command_queue
                .ExecuteCommandLists(&[Some(command_list)]);
        }

        unsafe {
            self.swapchain
                .Present(present_sync_interval(self.vsync), DXGI_PRESENT(0))
        }
        .ok()
        .context("failed to present the frame")?;

        self.wait_for_previous_frame()
    }
}

impl Drop for D3D {
    fn drop(&mut self) {
        // A failed frame can leave submitted work in flight.
        if let Err(e) = self.wait_for_gpu() {
            log::warn!("failed to wait for the GPU before shutdown {e:#}");
        }

        // Releasing a fullscreen swapchain is not allowed.
        if let Err(e) = unsafe { self.swapchain.SetFullscreenState(false, None) } {
            log::warn!("failed to leave fullscreen {e}");
        }

        if let Err(e) = unsafe { CloseHandle(self.fence_event) } {
            log::warn!("failed to close fence event {e}");
        }

        log::info!("Direct3D 12 shut down");
    }
}

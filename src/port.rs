// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Implements 'ports', which drive frames into a single render target.

A [`Port`] stands in for a window.  It owns an offscreen [`RenderTarget`] and a
[`CommandBuffer`], and calls a [`RenderClient`]'s lifecycle hooks: [`RenderClient::init`]
before the first frame, [`RenderClient::render`] once per frame, and [`RenderClient::release`]
when the port is released.

```
use batches_and_passes::device::{Device, DeviceConfig};
use batches_and_passes::port::{FrameContext, Port, PortConfig, RenderClient};
use batches_and_passes::resources::render_target::RenderTarget;
use batches_and_passes::Error;

struct Clear;
impl RenderClient for Clear {
    fn init(&mut self, _device: &Device, _target: &RenderTarget) -> Result<(), Error> {
        Ok(())
    }
    fn render(&mut self, frame: &mut FrameContext<'_>) -> Result<(), Error> {
        let target = frame.render_target().clone();
        let clear = frame.clear_color();
        let cb = frame.command_buffer();
        cb.begin_pass(&target, clear, Default::default(), None)?;
        cb.end_pass()
    }
    fn release(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

# test_executors::sleep_on(async {
let device = Device::new(DeviceConfig::default()).await.unwrap();
let mut port = Port::new(&device, PortConfig::default(), Clear).unwrap();
port.render_frame().unwrap();
port.render_frame().unwrap();
assert_eq!(port.reporter().latest_begun(), 1);
port.release().unwrap();
# });
```
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use wasm_safe_mutex::Mutex;

use crate::bittricks::{u32s_to_u64, u64_to_u32s};
use crate::command_buffer::{ClearColor, CommandBuffer};
use crate::device::Device;
use crate::error::{Error, MisuseError};
use crate::projection::{self, Matrix4};
use crate::resources::render_target::{PixelSize, RenderPassDescriptor, RenderTarget};
use crate::sys::time::Instant;

/// Configuration for [`Port::new`].
#[derive(Debug, Clone)]
pub struct PortConfig {
    pub size: PixelSize,
    pub render_pass: RenderPassDescriptor,
    pub clear_color: ClearColor,
    /// Vertical field of view of the frame projection, in degrees.
    pub field_of_view: f32,
    pub debug_name: &'static str,
}

impl Default for PortConfig {
    fn default() -> Self {
        PortConfig {
            size: PixelSize::new(800, 600),
            render_pass: RenderPassDescriptor::default(),
            clear_color: ClearColor::new(0.4, 0.7, 0.0, 1.0),
            field_of_view: 45.0,
            debug_name: "port",
        }
    }
}

/// Code that renders into a [`Port`].
pub trait RenderClient {
    /// Builds the client's resources.  Called once, before the first frame.
    fn init(&mut self, device: &Device, target: &RenderTarget) -> Result<(), Error>;
    /// Records one frame.  A pass left open is ended by the port.
    fn render(&mut self, frame: &mut FrameContext<'_>) -> Result<(), Error>;
    /// Releases the client's resources.
    fn release(&mut self) -> Result<(), Error>;
}

/// Everything a [`RenderClient`] needs for one frame.
#[derive(Debug)]
pub struct FrameContext<'a> {
    device: &'a Device,
    render_target: &'a RenderTarget,
    command_buffer: &'a mut CommandBuffer,
    projection: Matrix4,
    frame_index: u64,
    clear_color: ClearColor,
}

impl<'a> FrameContext<'a> {
    pub(crate) fn new(
        device: &'a Device,
        render_target: &'a RenderTarget,
        command_buffer: &'a mut CommandBuffer,
        projection: Matrix4,
        frame_index: u64,
        clear_color: ClearColor,
    ) -> FrameContext<'a> {
        FrameContext {
            device,
            render_target,
            command_buffer,
            projection,
            frame_index,
            clear_color,
        }
    }

    pub fn device(&self) -> &Device {
        self.device
    }
    pub fn render_target(&self) -> &RenderTarget {
        self.render_target
    }
    pub fn command_buffer(&mut self) -> &mut CommandBuffer {
        self.command_buffer
    }
    pub fn pixel_size(&self) -> PixelSize {
        self.render_target.pixel_size()
    }
    /// The projection for the current pixel size.  Equal between frames unless the port
    /// was resized.
    pub fn projection(&self) -> Matrix4 {
        self.projection
    }
    /// Counts from 0.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }
    pub fn clear_color(&self) -> ClearColor {
        self.clear_color
    }
}

/**
Guard type for tracking frame timing information.
Created when a frame begins and dropped when frame is complete.
*/
#[derive(Debug)]
struct FrameGuard {
    frame_start: Instant,
    cpu_end: Option<Instant>,
    gpu_end: Option<Instant>,
    port_reporter: Arc<PortReporterImpl>,
}

impl FrameGuard {
    fn new(port_reporter: Arc<PortReporterImpl>) -> Self {
        Self {
            frame_start: Instant::now(),
            cpu_end: None,
            gpu_end: None,
            port_reporter,
        }
    }
    fn mark_cpu_complete(&mut self) {
        self.cpu_end = Some(Instant::now());
    }
    fn mark_gpu_complete(&mut self) {
        self.gpu_end = Some(Instant::now());
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        //a failed frame still counts
        let cpu_end = self.cpu_end.unwrap_or_else(Instant::now);
        let gpu_end = self.gpu_end.unwrap_or(cpu_end);
        self.port_reporter.add_frame_info(FrameInfo {
            frame_start: self.frame_start,
            cpu_end,
            gpu_end,
        });
    }
}

/**
Complete timing information for a finished frame.
*/
#[derive(Debug, Clone, Copy)]
struct FrameInfo {
    frame_start: Instant,
    cpu_end: Instant,
    gpu_end: Instant,
}

impl FrameInfo {
    fn cpu_duration_ms(&self) -> i32 {
        self.cpu_end.duration_since(self.frame_start).as_millis() as i32
    }
    fn gpu_duration_ms(&self) -> i32 {
        self.gpu_end.duration_since(self.cpu_end).as_millis() as i32
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct FrameStatistics {
    fps: i32,
    ms: i32,
    cpu_ms: i32,
    min_elapsed_ms: i32,
}

#[derive(Debug)]
struct PortReporterImpl {
    frame_begun: AtomicU64,
    drawable_size: AtomicU64,
    frame_history: Mutex<Vec<FrameInfo>>,
    statistics: Mutex<FrameStatistics>,
}

impl PortReporterImpl {
    fn add_frame_info(&self, frame_info: FrameInfo) {
        const MAX_HISTORY: usize = 60;

        let mut history = self.frame_history.lock_sync();
        history.push(frame_info);
        if history.len() > MAX_HISTORY {
            let excess = history.len() - MAX_HISTORY;
            history.drain(..excess);
        }

        let mut statistics = self.statistics.lock_sync();
        if history.len() > 1 {
            let mut total_interval = 0.0;
            let mut min_interval = f64::MAX;
            for pair in history.windows(2) {
                let interval = pair[1]
                    .frame_start
                    .duration_since(pair[0].frame_start)
                    .as_secs_f64();
                total_interval += interval;
                min_interval = min_interval.min(interval);
            }
            let avg_interval = total_interval / (history.len() - 1) as f64;
            if avg_interval > 0.0 {
                statistics.fps = (1.0 / avg_interval).round() as i32;
            }
            statistics.min_elapsed_ms = (min_interval * 1000.0) as i32;
        }
        let frames = history.len() as i32;
        statistics.ms = history.iter().map(|f| f.gpu_duration_ms()).sum::<i32>() / frames;
        statistics.cpu_ms = history.iter().map(|f| f.cpu_duration_ms()).sum::<i32>() / frames;
    }
}

/**
A type that clients can use to find out about port activity and perform frame pacing.

Values are updated as frames run, with no synchronization guarantee relative to any
particular frame.
*/
#[derive(Debug, Clone)]
pub struct PortReporter {
    imp: Arc<PortReporterImpl>,
}

impl PortReporter {
    fn new(size: PixelSize) -> Self {
        PortReporter {
            imp: Arc::new(PortReporterImpl {
                frame_begun: AtomicU64::new(0),
                drawable_size: AtomicU64::new(u32s_to_u64(size.width, size.height)),
                frame_history: Mutex::new(Vec::new()),
                statistics: Mutex::new(FrameStatistics::default()),
            }),
        }
    }

    fn begin_frame(&self, frame: u64) {
        self.imp.frame_begun.store(frame, Ordering::Relaxed);
    }

    fn set_drawable_size(&self, size: PixelSize) {
        self.imp
            .drawable_size
            .store(u32s_to_u64(size.width, size.height), Ordering::Relaxed);
    }

    /// The index of the frame most recently begun.
    pub fn latest_begun(&self) -> u64 {
        self.imp.frame_begun.load(Ordering::Relaxed)
    }

    /// Returns a recent drawable size.
    pub fn drawable_size(&self) -> PixelSize {
        let (width, height) = u64_to_u32s(self.imp.drawable_size.load(Ordering::Relaxed));
        PixelSize::new(width, height)
    }

    /// Frames per second over recent frames.  0 until two frames have run.
    pub fn fps(&self) -> i32 {
        self.imp.statistics.with_sync(|s| s.fps)
    }

    /// Average time from the end of recording to the end of execution, in milliseconds.
    pub fn ms(&self) -> i32 {
        self.imp.statistics.with_sync(|s| s.ms)
    }

    /// Average recording time, in milliseconds.
    pub fn cpu_ms(&self) -> i32 {
        self.imp.statistics.with_sync(|s| s.cpu_ms)
    }

    /**
    Returns the minimum elapsed time between frames from recent samples, in milliseconds.

    This can be used by clients to predict their processing times for frame pacing.
    */
    pub fn min_elapsed_ms(&self) -> i32 {
        self.imp.statistics.with_sync(|s| s.min_elapsed_ms)
    }

    /// Frames with timing information.
    pub fn frames_recorded(&self) -> usize {
        self.imp.frame_history.with_sync(|h| h.len())
    }
}

/// Drives a [`RenderClient`] into an offscreen target.
#[derive(Debug)]
pub struct Port<C: RenderClient> {
    device: Device,
    config: PortConfig,
    render_target: RenderTarget,
    command_buffer: CommandBuffer,
    reporter: PortReporter,
    client: C,
    frame_index: u64,
    initialized: bool,
    released: bool,
}

impl<C: RenderClient> Port<C> {
    /// Creates the port's render target.  The client is initialized on the first frame.
    pub fn new(device: &Device, config: PortConfig, client: C) -> Result<Self, Error> {
        let render_target =
            device.new_labeled_render_target(config.debug_name, config.size, config.render_pass);
        render_target.create()?;
        logwise::info_sync!(
            "port {name} created at {width}x{height}",
            name = config.debug_name,
            width = config.size.width,
            height = config.size.height
        );
        Ok(Port {
            device: device.clone(),
            reporter: PortReporter::new(config.size),
            render_target,
            command_buffer: device.new_command_buffer(),
            config,
            client,
            frame_index: 0,
            initialized: false,
            released: false,
        })
    }

    fn require_live(&self) -> Result<(), Error> {
        if self.released {
            return Err(MisuseError::AlreadyReleased {
                label: self.config.debug_name.to_string(),
            }
            .logged());
        }
        Ok(())
    }

    /**
    Renders one frame.

    Initializes the client first if this is the first frame.  If the client leaves a pass
    open, the port ends it.
    */
    pub fn render_frame(&mut self) -> Result<(), Error> {
        self.require_live()?;
        if !self.initialized {
            if let Err(e) = self.client.init(&self.device, &self.render_target) {
                //init may have created resources before failing
                if let Err(release) = self.client.release() {
                    logwise::warn_sync!(
                        "releasing a client after failed init: {error}",
                        error = release.to_string()
                    );
                }
                return Err(e);
            }
            self.initialized = true;
        }
        let frame_index = self.frame_index;
        self.frame_index += 1;
        self.reporter.begin_frame(frame_index);
        let mut guard = FrameGuard::new(self.reporter.imp.clone());

        let size = self.render_target.pixel_size();
        let mut frame = FrameContext::new(
            &self.device,
            &self.render_target,
            &mut self.command_buffer,
            projection::frame_projection(size, self.config.field_of_view),
            frame_index,
            self.config.clear_color,
        );
        let rendered = self.client.render(&mut frame);
        guard.mark_cpu_complete();
        if self.command_buffer.is_recording() {
            logwise::warn_sync!(
                "frame {frame} left a pass open; ending it",
                frame = frame_index
            );
            self.command_buffer.end_pass()?;
        }
        guard.mark_gpu_complete();
        rendered
    }

    /// Replaces the render target with one of `size`.
    pub fn resize(&mut self, size: PixelSize) -> Result<(), Error> {
        self.require_live()?;
        if size == self.render_target.pixel_size() {
            return Ok(());
        }
        let render_target =
            self.device
                .new_labeled_render_target(self.config.debug_name, size, self.config.render_pass);
        render_target.create()?;
        self.render_target.release()?;
        self.render_target = render_target;
        self.config.size = size;
        self.reporter.set_drawable_size(size);
        logwise::info_sync!(
            "port {name} resized to {width}x{height}",
            name = self.config.debug_name,
            width = size.width,
            height = size.height
        );
        Ok(())
    }

    /// Releases the client, if it was initialized, then the render target.
    pub fn release(&mut self) -> Result<(), Error> {
        self.require_live()?;
        self.released = true;
        let client = if self.initialized {
            self.client.release()
        } else {
            Ok(())
        };
        let target = self.render_target.release();
        client.and(target)
    }

    pub fn reporter(&self) -> &PortReporter {
        &self.reporter
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn render_target(&self) -> &RenderTarget {
        &self.render_target
    }

    pub fn pixel_size(&self) -> PixelSize {
        self.render_target.pixel_size()
    }

    /// Frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frame_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceConfig;

    #[derive(Debug, Default)]
    struct Counting {
        inits: u32,
        frames: Vec<u64>,
        sizes: Vec<PixelSize>,
        releases: u32,
        leave_open: bool,
        fail_init: bool,
    }

    impl RenderClient for Counting {
        fn init(&mut self, _device: &Device, _target: &RenderTarget) -> Result<(), Error> {
            self.inits += 1;
            if self.fail_init {
                return Err(MisuseError::ResourceNotCreated {
                    label: "counting".to_string(),
                }
                .into());
            }
            Ok(())
        }
        fn render(&mut self, frame: &mut FrameContext<'_>) -> Result<(), Error> {
            self.frames.push(frame.frame_index());
            self.sizes.push(frame.pixel_size());
            if self.leave_open {
                let target = frame.render_target().clone();
                frame
                    .command_buffer()
                    .begin_pass(&target, ClearColor::BLACK, Default::default(), None)?;
            }
            Ok(())
        }
        fn release(&mut self) -> Result<(), Error> {
            self.releases += 1;
            Ok(())
        }
    }

    fn device() -> Device {
        test_executors::sleep_on(Device::new(DeviceConfig::default())).unwrap()
    }

    #[test]
    fn lifecycle_hooks_run_in_order() {
        let device = device();
        let mut port = Port::new(&device, PortConfig::default(), Counting::default()).unwrap();
        for _ in 0..3 {
            port.render_frame().unwrap();
        }
        assert_eq!(port.client().inits, 1);
        assert_eq!(port.client().frames, vec![0, 1, 2]);
        assert_eq!(port.reporter().latest_begun(), 2);
        assert_eq!(port.reporter().frames_recorded(), 3);
        port.release().unwrap();
        assert_eq!(port.client().releases, 1);
        assert!(port.render_frame().unwrap_err().is_misuse());
        assert!(port.release().unwrap_err().is_misuse());
    }

    #[test]
    fn resize_replaces_the_target() {
        let device = device();
        let mut port = Port::new(&device, PortConfig::default(), Counting::default()).unwrap();
        port.render_frame().unwrap();
        let old = port.render_target().clone();
        port.resize(PixelSize::new(320, 200)).unwrap();
        assert!(old.is_released());
        port.render_frame().unwrap();
        assert_eq!(
            port.client().sizes,
            vec![PixelSize::new(800, 600), PixelSize::new(320, 200)]
        );
        assert_eq!(port.reporter().drawable_size(), PixelSize::new(320, 200));
    }

    #[test]
    fn open_pass_is_ended() {
        let device = device();
        let client = Counting {
            leave_open: true,
            ..Default::default()
        };
        let mut port = Port::new(&device, PortConfig::default(), client).unwrap();
        port.render_frame().unwrap();
        port.render_frame().unwrap();
        assert_eq!(device.statistics().passes_executed, 2);
    }

    #[test]
    fn failed_init_releases_the_client() {
        let device = device();
        let client = Counting {
            fail_init: true,
            ..Default::default()
        };
        let mut port = Port::new(&device, PortConfig::default(), client).unwrap();
        assert!(port.render_frame().unwrap_err().is_misuse());
        assert_eq!(port.client().releases, 1);
        assert!(port.client().frames.is_empty());

        port.client_mut().fail_init = false;
        port.render_frame().unwrap();
        assert_eq!(port.client().inits, 2);
        port.release().unwrap();
        assert_eq!(port.client().releases, 2);
    }

    #[test]
    fn release_before_first_frame_skips_the_client() {
        let device = device();
        let mut port = Port::new(&device, PortConfig::default(), Counting::default()).unwrap();
        port.release().unwrap();
        assert_eq!(port.client().releases, 0);
        assert_eq!(port.client().inits, 0);
    }
}

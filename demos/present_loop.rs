//! Brings up a full Vulkan stack against a winit window and presents empty
//! frames until the window closes. Submissions run on the compute queue
//! while presentation stays on graphics, exercising the split-queue path.
//!
//! Run with `cargo run --example present_loop --features enable_tracing`.

use std::sync::Arc;

use ash::vk;
use ash_preflight::{
    Device, DeviceBuilder, FrameLoop, FrameLoopBuilder, Instance, InstanceBuilder,
    PhysicalDeviceSelector, QueueType, Swapchain, SwapchainBuilder, Version,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

const WINDOW_WIDTH: u32 = 800;
const WINDOW_HEIGHT: u32 = 600;

struct VulkanState {
    instance: Arc<Instance>,
    device: Arc<Device>,
    swapchain: Swapchain,
    image_views: Vec<vk::ImageView>,
    frame_loop: FrameLoop,
}

impl VulkanState {
    fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let instance = InstanceBuilder::new(Some(window))
            .app_name("Example Vulkan Application")
            .enable_validation_layers(true)
            .require_api_version(Version::new(1, 3, 0))
            .use_default_tracing_messenger()
            .build()?;

        let physical_device = PhysicalDeviceSelector::new(&instance)
            .minimum_version(Version::new(1, 3, 0))
            .required_features_1_3(
                vk::PhysicalDeviceVulkan13Features::default().synchronization2(true),
            )
            .select()?;
        tracing::info!(device = physical_device.name(), "Running on");

        let device = DeviceBuilder::new(physical_device, instance.clone()).build()?;

        let swapchain = SwapchainBuilder::new(instance.clone(), device.clone())
            .use_default_format_selection()
            .desired_present_mode(vk::PresentModeKHR::FIFO)
            .desired_extent(WINDOW_WIDTH, WINDOW_HEIGHT)
            .build()?;
        let image_views = swapchain.create_image_views()?;

        let frame_loop = FrameLoopBuilder::new(device.clone())
            .submit_queue(QueueType::Compute)
            .present_queue(QueueType::Graphics)
            .build()?;

        Ok(Self {
            instance,
            device,
            swapchain,
            image_views,
            frame_loop,
        })
    }

    fn draw(&mut self) -> anyhow::Result<()> {
        self.frame_loop.frame(&self.swapchain, |_cmd, _image| {
            // Record compute work here.
        })?;
        Ok(())
    }

    fn destroy(&self) {
        if let Err(err) = self.device.wait_idle() {
            tracing::error!(%err, "Device wait failed during teardown");
        }
        self.frame_loop.destroy();
        self.swapchain.destroy_image_views(&self.image_views);
        self.swapchain.destroy();
        self.device.destroy();
        self.instance.destroy();
    }
}

#[derive(Default)]
struct App {
    window: Option<Arc<Window>>,
    vulkan: Option<VulkanState>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title("Vulkan window")
            .with_inner_size(PhysicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT))
            .with_resizable(false);
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                eprintln!("Failed to create window: {err}");
                event_loop.exit();
                return;
            }
        };

        match VulkanState::new(window.clone()) {
            Ok(vulkan) => {
                self.vulkan = Some(vulkan);
                self.window = Some(window);
            }
            Err(err) => {
                eprintln!("Failed to bring up Vulkan: {err}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::RedrawRequested => {
                if let Some(vulkan) = self.vulkan.as_mut() {
                    if let Err(err) = vulkan.draw() {
                        tracing::error!(%err, "Frame failed");
                        event_loop.exit();
                    }
                }
            }
            _ => (),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(vulkan) = self.vulkan.take() {
            vulkan.destroy();
        }
        self.window = None;
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut app = App::default();
    event_loop.run_app(&mut app)?;

    Ok(())
}

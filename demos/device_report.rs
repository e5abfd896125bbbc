//! Prints what the Vulkan loader and the selected device offer, without
//! opening a window.

use ash_preflight::{DeviceBuilder, HostInfo, InstanceBuilder, PhysicalDeviceSelector, QueueType};

fn main() -> anyhow::Result<()> {
    let host = HostInfo::probe()?;
    println!("Loader supports Vulkan {}", host.loader_version);
    println!(
        "Validation layers available: {}",
        host.validation_layers_available
    );
    println!("Debug utils available: {}", host.debug_utils_available);
    println!("Instance layers: {}", host.available_layers.len());
    println!("Instance extensions: {}", host.available_extensions.len());

    let instance = InstanceBuilder::new(None)
        .app_name("device-report")
        .request_validation_layers(true)
        .headless(true)
        .build()?;
    println!("Instance created with Vulkan {}", instance.api_version);

    let physical_device = PhysicalDeviceSelector::new(&instance).select()?;
    println!(
        "Selected: {} ({:?}), Vulkan {}",
        physical_device.name(),
        physical_device.device_type(),
        physical_device.api_version()
    );

    let device = DeviceBuilder::new(physical_device, instance.clone()).build()?;
    for queue_type in [QueueType::Graphics, QueueType::Compute, QueueType::Transfer] {
        match device.get_queue_index(queue_type) {
            Ok(family) => println!("{queue_type:?} queue family: {family}"),
            Err(_) => println!("{queue_type:?} queue: unavailable"),
        }
    }

    device.destroy();
    instance.destroy();
    Ok(())
}

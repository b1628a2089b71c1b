use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::time::sleep;
use tracing::info;

use yoctoproxy_core::config::ConfigBuilder;
use yoctoproxy_functions::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults, then YOCTOPROXY__SECTION__KEY overrides
    let mut config = ConfigBuilder::new()
        .with_environment_prefix("YOCTOPROXY")
        .build()
        .context("Failed to load configuration")?;
    config.hub.poll_interval_ms = 50;
    yoctoproxy_core::init_with_config(&config).context("Failed to initialize logging")?;

    let library = Arc::new(SimulatedLibrary::new());
    let manager = SharedProxyManager::with_config(library.clone(), &config.proxy);

    // Proxies exist before any hardware shows up
    let motor = MotorProxy::find(manager.manager(), "cart");
    let sensor = SensorProxy::find(manager.manager(), "");
    info!("Motor online: {}, sensor online: {}", motor.is_online(), sensor.is_online());

    let mut events = manager.manager().subscribe()?;
    spawn_and_log("event_printer", async move {
        while let Ok(event) = events.recv().await {
            info!("Event: {}", event.to_json()?);
        }
        Ok::<_, Error>(())
    });

    let monitor = HubMonitor::new(config.hub.clone(), manager.clone());
    let hubs = monitor.register_hubs().await.context("Hub registration failed")?;
    info!("{} hub(s) registered", hubs);
    let handle = monitor.spawn();

    info!("Plugging a DC motor controller...");
    library.plug(
        SimModule::new("MOTORCTL-00001")
            .product_name("Yocto-Motor-DC")
            .with_named_function(FunctionClass::Motor, "motor", "cart")
            .with_function(FunctionClass::Sensor, "current"),
    );
    sleep(Duration::from_millis(200)).await;

    info!("Motor {} status {}", motor.hardware_id(), motor.motor_status());
    info!("Sensor {} reads {} {}", sensor.hardware_id(), sensor.current_value(), sensor.unit());

    motor.apply_driving_force(40.0)?;
    motor.driving_force_move(80.0, 1000)?;
    info!("Driving force now {}", motor.get_driving_force()?);

    if let Some(hw) = library.function("MOTORCTL-00001.current") {
        hw.push_value("1.250");
    }
    info!("Sensor after notification: {}", sensor.current_value());

    info!("Unplugging...");
    library.unplug("MOTORCTL-00001");
    sleep(Duration::from_millis(200)).await;
    info!("Motor online: {}, cached status {}", motor.is_online(), motor.motor_status());
    if let Err(e) = motor.get_motor_status() {
        info!("Direct read while offline: {}", e);
    }

    library.replug("MOTORCTL-00001");
    sleep(Duration::from_millis(200)).await;
    info!("Back online: {}", motor.is_online());
    motor.reset_status()?;
    info!("Status after reset: {}", motor.get_motor_status()?);

    handle.shutdown().await?;
    manager.manager().release_all();
    info!("Example completed!");
    Ok(())
}

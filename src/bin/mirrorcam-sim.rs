use anyhow::{bail, Context, Result};
use mirrorcam::router::RouterState;
use mirrorcam::testing::{SimulatedDisplays, SimulatedProvider};
use mirrorcam::{
    create_sink, CameraController, ControllerOptions, DisplayDescriptor, DisplayMonitor,
    MirrorCamConfig, SessionHolder, TomlPreferenceStore, UiState,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const ROUTER_TIMEOUT: Duration = Duration::from_secs(2);

struct Args {
    config: PathBuf,
    json: bool,
}

fn parse_args() -> Result<Args> {
    let args: Vec<String> = env::args().collect();
    let mut config = MirrorCamConfig::default_path();
    let mut json = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                match args.get(i) {
                    Some(path) => config = PathBuf::from(path),
                    None => bail!("--config requires a path"),
                }
            }
            "--json" => json = true,
            "--help" | "-h" => {
                println!("Usage: mirrorcam-sim [--config <path>] [--json]");
                std::process::exit(0);
            }
            other => bail!("Unknown argument: {}", other),
        }
        i += 1;
    }
    Ok(Args { config, json })
}

#[tokio::main]
async fn main() -> Result<()> {
    mirrorcam::init_logging();
    let args = parse_args()?;

    let config = MirrorCamConfig::load_from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let store = TomlPreferenceStore::open(&config.preferences.path)
        .with_context(|| format!("opening preferences {}", config.preferences.path))?;

    let provider = SimulatedProvider::new();
    let controller = CameraController::spawn(provider, ControllerOptions::from_config(&config));
    let mut holder = SessionHolder::new(controller.clone(), store, &config);

    let builtin = DisplayDescriptor::new(config.display.default_display_id, "Built-in screen");
    let displays = Arc::new(SimulatedDisplays::new(builtin));
    let monitor = DisplayMonitor::new(config.display.default_display_id);
    monitor
        .start_monitoring(displays.clone(), controller.clone())
        .await?;

    if let Err(fault) = holder.activate(create_sink("main").into_ready()).await {
        log::error!("{}", fault);
    }
    report("activated", &holder.ui_state(), args.json)?;

    // Out-of-range values are clamped before they reach the hardware.
    let zoom = holder.set_zoom(2.5);
    let exposure = holder.set_exposure_index(-10);
    let torch = holder.set_torch(true);
    for handle in [zoom, exposure, torch] {
        let operation = handle.operation();
        if let Err(fault) = handle.outcome().await {
            log::warn!("{} did not complete: {}", operation, fault);
        }
    }
    report("controls applied", &holder.ui_state(), args.json)?;

    let external_id = config.display.default_display_id.wrapping_add(1);
    displays.connect(DisplayDescriptor::new(external_id, "HDMI"));
    wait_for_router(&controller, |state| state.external_display.is_some()).await?;
    report("external display connected", &holder.ui_state(), args.json)?;

    // The presentation window materializes its surface.
    let external = create_sink("external").into_ready();
    controller.external_surface_ready(external_id, external);
    wait_for_router(&controller, |state| state.external_attached).await?;
    report("external surface attached", &holder.ui_state(), args.json)?;

    if let Err(fault) = holder.toggle_lens().await {
        log::error!("{}", fault);
    }
    if let Err(fault) = holder.set_torch(true).outcome().await {
        log::info!("Expected on a lens without flash: {}", fault);
    }
    report("lens toggled", &holder.ui_state(), args.json)?;

    displays.disconnect(external_id);
    wait_for_router(&controller, |state| state.external_display.is_none()).await?;
    report("external display disconnected", &holder.ui_state(), args.json)?;

    monitor.stop_monitoring().await?;
    holder.shutdown().await;
    report("shut down", &holder.ui_state(), args.json)?;
    Ok(())
}

async fn wait_for_router<F>(controller: &CameraController, condition: F) -> Result<()>
where
    F: FnMut(&RouterState) -> bool,
{
    let mut router = controller.watch_router();
    tokio::time::timeout(ROUTER_TIMEOUT, router.wait_for(condition))
        .await
        .context("timed out waiting for the surface router")?
        .context("camera controller stopped")?;
    Ok(())
}

fn report(step: &str, state: &UiState, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::json!({ "step": step, "state": serde_json::to_value(state)? })
        );
        return Ok(());
    }

    let caps = &state.capabilities;
    println!("== {} ==", step);
    println!(
        "  session: {:?}  lens: {}  mirror: {}",
        state.session_phase, state.lens, state.mirror_preview
    );
    if caps.zoom_supported {
        println!(
            "  zoom: {} ({:.1}..{:.1})",
            caps.zoom_label, caps.zoom_range.0, caps.zoom_range.1
        );
    } else {
        println!("  zoom: unsupported");
    }
    if caps.exposure_supported {
        println!(
            "  exposure: {} (index {} in {}..{})",
            caps.exposure_label, caps.exposure_index, caps.exposure_range.0, caps.exposure_range.1
        );
    } else {
        println!("  exposure: unsupported");
    }
    println!(
        "  torch: {}  white balance: {} of {:?}",
        match (caps.led_enabled, caps.led_is_on) {
            (false, _) => "unavailable",
            (true, true) => "on",
            (true, false) => "off",
        },
        state.selected_white_balance.label(),
        caps.white_balance_presets
            .iter()
            .map(|mode| mode.label())
            .collect::<Vec<_>>()
    );
    println!(
        "  external display indicator: {}",
        if state.external_indicator_visible {
            "visible"
        } else {
            "hidden"
        }
    );
    if let Some(fault) = &state.initialization_fault {
        println!("  initialization fault: {}", fault);
    }
    if let Some(fault) = &state.transient_fault {
        println!("  fault: {}", fault);
    }
    Ok(())
}

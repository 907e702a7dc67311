//! Session holder preference retention across restarts

use mirrorcam::testing::{HardwareCall, SimulatedProvider};
use mirrorcam::{
    create_sink, CameraController, ControllerOptions, LensFacing, MirrorCamConfig,
    SessionHolder, SessionPhase, TomlPreferenceStore, WhiteBalanceMode,
};
use tempfile::tempdir;

fn config_in(dir: &std::path::Path) -> MirrorCamConfig {
    let mut config = MirrorCamConfig::default();
    config.preferences.path = dir.join("prefs.toml").display().to_string();
    config
}

fn holder(
    provider: SimulatedProvider,
    config: &MirrorCamConfig,
) -> SessionHolder<TomlPreferenceStore> {
    let store = TomlPreferenceStore::open(&config.preferences.path).unwrap();
    let controller = CameraController::spawn(provider, ControllerOptions::from_config(config));
    SessionHolder::new(controller, store, config)
}

#[tokio::test]
async fn test_preferences_restored_after_restart() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());

    {
        let mut first = holder(SimulatedProvider::new(), &config);
        first.activate(create_sink("main").into_ready()).await.unwrap();
        first
            .set_white_balance(WhiteBalanceMode::Cloudy)
            .outcome()
            .await
            .unwrap();
        first.set_flip(true);
        first.shutdown().await;
    }

    let provider = SimulatedProvider::new();
    let mut second = holder(provider.clone(), &config);
    let prefs = second.preferences();
    assert_eq!(prefs.lens_facing, LensFacing::Back);
    assert!(prefs.flip_horizontal);
    assert_eq!(prefs.white_balance, WhiteBalanceMode::Cloudy);

    second.activate(create_sink("main").into_ready()).await.unwrap();
    second.set_zoom(1.0).outcome().await.unwrap();
    assert!(provider
        .calls()
        .contains(&HardwareCall::SetWhiteBalance(WhiteBalanceMode::Cloudy)));

    let state = second.ui_state();
    assert!(state.mirror_preview);
    assert_eq!(state.selected_white_balance, WhiteBalanceMode::Cloudy);
    assert_eq!(state.session_phase, SessionPhase::Bound);
    second.shutdown().await;
}

#[tokio::test]
async fn test_lens_choice_survives_failed_bind() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());

    {
        let provider = SimulatedProvider::new().without_lens(LensFacing::Front);
        let mut first = holder(provider, &config);
        first.activate(create_sink("main").into_ready()).await.unwrap();
        assert!(first.toggle_lens().await.is_err());

        let state = first.ui_state();
        assert_eq!(state.lens, LensFacing::Front);
        assert_eq!(state.session_phase, SessionPhase::Unbound);
        assert!(state.initialization_fault.is_some());
        assert!(!state.capabilities.zoom_supported);
        first.shutdown().await;
    }

    let provider = SimulatedProvider::new();
    let mut second = holder(provider.clone(), &config);
    let handle = second.activate(create_sink("main").into_ready()).await.unwrap();
    assert_eq!(handle.lens, LensFacing::Front);
    assert_eq!(provider.bound_lens(), Some(LensFacing::Front));
    second.shutdown().await;
}

#[tokio::test]
async fn test_default_lens_from_config() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.camera.default_lens = LensFacing::Front;

    let mut holder = holder(SimulatedProvider::new(), &config);
    let handle = holder.activate(create_sink("main").into_ready()).await.unwrap();
    assert_eq!(handle.lens, LensFacing::Front);

    let state = holder.ui_state();
    assert!(!state.capabilities.led_enabled);
    assert_eq!(
        state.capabilities.white_balance_presets,
        vec![WhiteBalanceMode::Auto]
    );
    holder.shutdown().await;
}

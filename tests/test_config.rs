use lumen::config::{ConfigError, IntegratorMode, RenderConfig};
use lumen::renderer::Renderer;
use lumen::scene;

#[test]
fn integrators_are_mutually_exclusive() {
    let mut config = RenderConfig {
        path_tracing_enabled: true,
        light_tracing_enabled: true,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ConflictingIntegrators)
    ));

    let mut config = RenderConfig {
        path_tracing_enabled: false,
        light_tracing_enabled: true,
        ibpt_enabled: true,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ConflictingIntegrators)
    ));
}

#[test]
fn single_integrator_is_accepted() {
    let mut config = RenderConfig {
        path_tracing_enabled: false,
        ibpt_enabled: true,
        ..Default::default()
    };
    assert!(config.validate().is_ok());
    assert_eq!(config.mode(), IntegratorMode::Sbdpt);
}

#[test]
fn cpu_fb_auto_enabled_by_save_interval() {
    let mut config = RenderConfig {
        cpu_fb: false,
        save_interval: 2.5,
        ..Default::default()
    };
    config.validate().unwrap();
    assert!(config.cpu_fb);
}

#[test]
fn cpu_fb_auto_enabled_by_shared_image() {
    let mut config = RenderConfig {
        cpu_fb: false,
        shared_image: Some("compositor".to_string()),
        ..Default::default()
    };
    config.validate().unwrap();
    assert!(config.cpu_fb);
}

#[test]
fn cpu_fb_stays_off_otherwise() {
    let mut config = RenderConfig::default();
    config.validate().unwrap();
    assert!(!config.cpu_fb);
}

#[test]
fn mmlt_requires_early_allocation() {
    let config = RenderConfig {
        width: 8,
        height: 8,
        enable_mlt: false,
        ..Default::default()
    };
    let mut renderer = Renderer::new(config).unwrap();
    assert!(matches!(
        renderer.set_mode(IntegratorMode::Mmlt),
        Err(ConfigError::MltNotPreallocated)
    ));
    // The renderer keeps its previous mode after the failed switch
    assert_eq!(renderer.mode(), IntegratorMode::PathTracing);
}

#[test]
fn mmlt_allowed_with_early_allocation() {
    let config = RenderConfig {
        width: 8,
        height: 8,
        enable_mlt: true,
        ..Default::default()
    };
    let mut renderer = Renderer::new(config).unwrap();
    assert!(renderer.set_mode(IntegratorMode::Mmlt).is_ok());
    assert_eq!(renderer.mode(), IntegratorMode::Mmlt);
}

#[test]
fn unknown_device_is_rejected() {
    let mut config = RenderConfig {
        device_id: 3,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::UnknownDevice(3))
    ));
}

#[test]
fn unknown_state_is_rejected() {
    assert!(matches!(
        scene::from_state("no_such_state"),
        Err(ConfigError::UnknownState(_))
    ));
    assert!(scene::from_state("test_42").is_ok());
    assert!(scene::from_state("furnace").is_ok());
    assert!(scene::from_state("empty_env").is_ok());
    assert!(scene::from_state("sphere_plane").is_ok());
}

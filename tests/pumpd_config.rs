use std::sync::Mutex;

use tempfile::NamedTempFile;

use framepump::{DeliveryPolicy, PumpdConfig};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "FRAMEPUMP_CONFIG",
        "FRAMEPUMP_POLICY",
        "FRAMEPUMP_ROTATION_DEGREES",
        "FRAMEPUMP_POOL_FRAMES",
        "FRAMEPUMP_TARGET_FPS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "policy": "every_frame",
        "rotation_degrees": 180,
        "pool": {
            "frames": 6,
            "width": 800,
            "height": 600
        },
        "feed": {
            "target_fps": 15
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("FRAMEPUMP_CONFIG", file.path());
    std::env::set_var("FRAMEPUMP_POLICY", "keep_latest");
    std::env::set_var("FRAMEPUMP_TARGET_FPS", "30");

    let cfg = PumpdConfig::load().expect("load config");

    assert_eq!(cfg.policy, DeliveryPolicy::KeepLatest);
    assert_eq!(cfg.rotation_degrees, 180);
    assert_eq!(cfg.pool.frames, 6);
    assert_eq!(cfg.pool.width, 800);
    assert_eq!(cfg.pool.height, 600);
    assert_eq!(cfg.feed.target_fps, 30);

    clear_env();
}

#[test]
fn defaults_apply_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = PumpdConfig::load().expect("load config");
    assert_eq!(cfg.policy, DeliveryPolicy::KeepLatest);
    assert_eq!(cfg.rotation_degrees, 0);
    assert_eq!(cfg.pool.frames, 4);
    assert_eq!(cfg.feed.target_fps, 10);
}

#[test]
fn invalid_rotation_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("FRAMEPUMP_ROTATION_DEGREES", "45");
    let result = PumpdConfig::load();
    clear_env();
    assert!(result.is_err());
}

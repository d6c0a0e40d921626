use super::load::{default_config_path, resolve_config_path};
use super::schema::*;
use std::sync::{Mutex, OnceLock};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap()
}

struct EnvGuard {
    key: &'static str,
    old: Option<std::ffi::OsString>,
}

impl EnvGuard {
    fn set(key: &'static str, val: &str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::set_var(key, val);
        }
        Self { key, old }
    }

    fn remove(key: &'static str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::remove_var(key);
        }
        Self { key, old }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match self.old.take() {
            Some(v) => unsafe {
                std::env::set_var(self.key, v);
            },
            None => unsafe {
                std::env::remove_var(self.key);
            },
        }
    }
}

#[test]
fn resolve_config_path_prefers_hifi_config_path() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("HIFI_CONFIG_PATH", "/tmp/hifi-test-config.toml");
    assert_eq!(
        resolve_config_path().unwrap(),
        std::path::PathBuf::from("/tmp/hifi-test-config.toml")
    );
}

#[test]
fn default_config_path_prefers_xdg_config_home() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("XDG_CONFIG_HOME", "/tmp/xdg-config-home");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-should-not-win");

    let p = default_config_path().unwrap();
    assert_eq!(
        p,
        std::path::PathBuf::from("/tmp/xdg-config-home")
            .join("hifi-player")
            .join("config.toml")
    );
}

#[test]
fn default_config_path_falls_back_to_home_dot_config() {
    let _lock = env_lock();
    let _g1 = EnvGuard::remove("XDG_CONFIG_HOME");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-dir");

    let p = default_config_path().unwrap();
    assert_eq!(
        p,
        std::path::PathBuf::from("/tmp/home-dir")
            .join(".config")
            .join("hifi-player")
            .join("config.toml")
    );
}

#[test]
fn settings_load_from_config_file() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
[library]
storage_path = "/srv/lullabies"
follow_links = false

[volume]
base = 3.0
initial = -1.0
min = -4.0
max = 1.5
step = 0.25

[engine]
tick_ms = 250

[history]
capacity = 16

[log]
level = "debug"
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("HIFI_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::remove("HIFI__ENGINE__TICK_MS");

    let s = Settings::load().unwrap();
    assert_eq!(s.library.storage_path, std::path::PathBuf::from("/srv/lullabies"));
    assert!(!s.library.follow_links);
    assert_eq!(s.volume.base, 3.0);
    assert_eq!(s.volume.initial, -1.0);
    assert_eq!(s.volume.min, -4.0);
    assert_eq!(s.volume.max, 1.5);
    assert_eq!(s.volume.step, 0.25);
    assert_eq!(s.engine.tick_ms, 250);
    assert_eq!(s.history.capacity, 16);
    assert_eq!(s.log.level, "debug");
    assert!(s.validate().is_ok());
}

#[test]
fn settings_missing_file_falls_back_to_defaults() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("absent.toml");
    let _g1 = EnvGuard::set("HIFI_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::remove("HIFI__ENGINE__TICK_MS");

    let s = Settings::load().unwrap();
    assert_eq!(s.library.storage_path, std::path::PathBuf::from("music"));
    assert_eq!(s.volume.step, 0.5);
    assert_eq!(s.volume.max, 2.0);
    assert_eq!(s.engine.tick_ms, 1000);
}

#[test]
fn settings_env_overrides_config_file() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
[engine]
tick_ms = 250
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("HIFI_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::set("HIFI__ENGINE__TICK_MS", "40");

    let s = Settings::load().unwrap();
    assert_eq!(s.engine.tick_ms, 40);
}

#[test]
fn validate_rejects_inconsistent_volume_bounds() {
    let mut s = Settings::default();
    assert!(s.validate().is_ok());

    s.volume.initial = 3.0;
    assert!(s.validate().unwrap_err().contains("volume.initial"));

    s = Settings::default();
    s.volume.step = 0.0;
    assert!(s.validate().is_err());

    s = Settings::default();
    s.engine.tick_ms = 0;
    assert!(s.validate().is_err());
}

// ABOUTME: Integration tests for configuration parsing and validation.
// ABOUTME: Tests defaults, discovery, env overrides and conversion into layer settings.

use kbox::config::*;
use kbox::error::{Error, ErrorKind};
use std::path::PathBuf;
use std::time::Duration;

/// Run `f` with the override variables cleared. temp-env serializes callers,
/// so tests that read the environment do not race each other.
fn without_overrides<R>(f: impl FnOnce() -> R) -> R {
    temp_env::with_vars([(ENV_PROVIDER_ROOT, None::<&str>), (ENV_SRC_ROOT, None)], f)
}

mod parsing {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.list_timeout, Duration::from_secs(30));
        assert_eq!(config.images.namespace, "kalabox");
        assert_eq!(config.images.tag, "stable");
        assert!(!config.build_local);
        assert_eq!(config.provider.vm_name, "Kalabox2");
        assert_eq!(config.provider.up_attempts, 3);
        assert_eq!(config.provider.down_attempts, 3);
        assert_eq!(config.provider.ip_repairs, 1);
        assert_eq!(config.provider.disk_size, None);
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
sys_conf_root: /opt/kalabox
sys_provider_root: /opt/kalabox/provider
src_root: /src
build_local: true
images:
  namespace: acme
  tag: dev
list_timeout: 1m 30s
provider:
  executable: /usr/bin/boot2docker
  vm_name: Dev
  up_attempts: 5
  down_attempts: 2
  ip_repairs: 0
  disk_size: 40000
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.sys_conf_root, Some(PathBuf::from("/opt/kalabox")));
        assert!(config.build_local);
        assert_eq!(config.images.namespace, "acme");
        assert_eq!(config.list_timeout, Duration::from_secs(90));
        assert_eq!(config.provider.vm_name, "Dev");
        assert_eq!(config.provider.up_attempts, 5);
        assert_eq!(config.provider.ip_repairs, 0);
        assert_eq!(config.provider.disk_size, Some(40000));
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = Config::from_yaml("images:\n  tag: edge\nprovider:\n  vm_name: Dev\n").unwrap();
        assert_eq!(config.images.namespace, "kalabox");
        assert_eq!(config.images.tag, "edge");
        assert_eq!(config.provider.up_attempts, 3);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_yaml("list_timout: 5s\n").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
        assert_eq!(err.kind(), ErrorKind::ConfigurationFatal);
    }

    #[test]
    fn bad_duration_is_rejected() {
        assert!(Config::from_yaml("list_timeout: soon\n").is_err());
    }

    #[test]
    fn empty_vm_name_is_rejected() {
        let err = Config::from_yaml("provider:\n  vm_name: ''\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}

mod discovery {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = without_overrides(|| Config::discover(dir.path())).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn finds_primary_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "build_local: true\n").unwrap();

        let config = without_overrides(|| Config::discover(dir.path())).unwrap();
        assert!(config.build_local);
    }

    #[test]
    fn primary_file_wins_over_alternatives() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "list_timeout: 10s\n").unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME_ALT), "list_timeout: 20s\n").unwrap();

        let config = without_overrides(|| Config::discover(dir.path())).unwrap();
        assert_eq!(config.list_timeout, Duration::from_secs(10));
    }

    #[test]
    fn finds_file_in_dot_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".kbox")).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME_DIR), "build_local: true\n").unwrap();

        let config = without_overrides(|| Config::discover(dir.path())).unwrap();
        assert!(config.build_local);
    }

    #[test]
    fn load_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "provider:\n  up_attempts: 0\n").unwrap();

        let err = without_overrides(|| Config::discover(dir.path())).unwrap_err();
        assert!(matches!(err, Error::ConfigFile { .. }));
        assert!(err.to_string().contains("kbox.yml"));
        assert_eq!(err.kind(), ErrorKind::ConfigurationFatal);
    }
}

mod overrides {
    use super::*;

    #[test]
    fn env_overrides_win_over_the_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILENAME),
            "sys_provider_root: /from/file\nsrc_root: /from/file/src\n",
        )
        .unwrap();

        temp_env::with_vars(
            [
                (ENV_PROVIDER_ROOT, Some("/from/env")),
                (ENV_SRC_ROOT, Some("/from/env/src")),
            ],
            || {
                let config = Config::discover(dir.path()).unwrap();
                assert_eq!(config.provider_root().unwrap(), PathBuf::from("/from/env"));
                assert_eq!(config.source_root().unwrap(), PathBuf::from("/from/env/src"));
            },
        );
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        temp_env::with_vars(
            [(ENV_PROVIDER_ROOT, Some("")), (ENV_SRC_ROOT, None)],
            || {
                let config = Config::discover(dir.path()).unwrap();
                assert_eq!(config.sys_provider_root, None);
            },
        );
    }

    #[test]
    fn unknown_home_points_at_sys_conf_root() {
        temp_env::with_vars(
            [
                ("HOME", None::<&str>),
                ("USERPROFILE", None),
                (ENV_PROVIDER_ROOT, None),
                (ENV_SRC_ROOT, None),
            ],
            || {
                let err = Config::default().provider_root().unwrap_err();
                assert!(matches!(err, Error::HomeDirUnknown));
                assert!(err.to_string().contains("sys_conf_root"));

                let config = Config::from_yaml("sys_conf_root: /opt/kalabox\n").unwrap();
                let settings = config.driver_settings().unwrap();
                assert_eq!(settings.root, PathBuf::from("/opt/kalabox/.provider"));
                assert!(config.provider_settings().is_ok());
            },
        );
    }

    #[test]
    fn provider_root_defaults_under_home() {
        temp_env::with_vars(
            [
                ("HOME", Some("/home/dev")),
                (ENV_PROVIDER_ROOT, None),
                (ENV_SRC_ROOT, None),
            ],
            || {
                let config = Config::default();
                assert_eq!(
                    config.provider_root().unwrap(),
                    PathBuf::from("/home/dev/.kalabox/.provider")
                );
            },
        );
    }
}

mod conversions {
    use super::*;

    fn config() -> Config {
        Config::from_yaml(
            r#"
sys_conf_root: /opt/kalabox
src_root: /src
build_local: true
list_timeout: 5s
provider:
  executable: /usr/bin/boot2docker
  up_attempts: 4
  disk_size: 20000
"#,
        )
        .unwrap()
    }

    #[test]
    fn driver_settings() {
        let settings = config().driver_settings().unwrap();
        assert_eq!(settings.executable, PathBuf::from("/usr/bin/boot2docker"));
        assert_eq!(settings.vm_name, "Kalabox2");
        assert_eq!(settings.root, PathBuf::from("/opt/kalabox/.provider"));
    }

    #[test]
    fn provider_settings() {
        let settings = config().provider_settings().unwrap();
        assert_eq!(settings.up_attempts, 4);
        assert_eq!(settings.disk_size, Some(20000));
        assert_eq!(
            settings.profile_path(),
            PathBuf::from("/opt/kalabox/.provider/profile")
        );
    }

    #[test]
    fn manager_and_image_settings() {
        let config = config();
        assert_eq!(config.manager_settings().list_timeout, Duration::from_secs(5));

        let images = config.image_settings().unwrap();
        assert!(images.build_local);
        assert_eq!(images.src_root, PathBuf::from("/src"));
        assert_eq!(images.images.tag, "stable");
    }
}

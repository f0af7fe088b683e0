
#[cfg(test)]
mod tests {
    use crate::config::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.bind.port(), 7878);
        assert_eq!(config.server.max_connections, 64);
        assert_eq!(config.files.image_path.to_str(), Some("cat.png"));
        assert_eq!(config.limits.max_frame_size, 64 * 1024 * 1024);
        assert_eq!(config.security.rsa_bits, 3072);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: DaemonConfig = toml::from_str(
            r#"
            [server]
            bind = "127.0.0.1:9000"

            [files]
            image_path = "/srv/pixelpost/cat.png"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind.to_string(), "127.0.0.1:9000");
        assert_eq!(config.server.max_connections, 64);
        assert_eq!(config.files.image_path.to_str(), Some("/srv/pixelpost/cat.png"));
        assert_eq!(config.limits.io_timeout_secs, 30);
    }

    #[test]
    fn test_limits_map_to_framer_config() {
        let config: DaemonConfig = toml::from_str(
            r#"
            [limits]
            max_frame_size = 1048576
            io_timeout_secs = 5
            "#,
        )
        .unwrap();

        let framer = config.framer_config();
        assert_eq!(framer.max_frame_size, 1024 * 1024);
        assert_eq!(framer.io_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_weak_rsa_rejected() {
        let config: DaemonConfig = toml::from_str(
            r#"
            [security]
            rsa_bits = 2048
            "#,
        )
        .unwrap();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stronger_rsa_accepted() {
        let mut config = DaemonConfig::default();
        config.security.rsa_bits = 4096;

        assert!(config.validate().is_ok());
        assert_eq!(config.handshake_config().rsa_bits, 4096);
    }

    #[test]
    fn test_zero_connections_rejected() {
        let mut config = DaemonConfig::default();
        config.server.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DaemonConfig::load_or_default(dir.path().join("daemon.toml"))
            .await
            .unwrap();
        assert_eq!(config.server.max_connections, 64);
    }

    #[tokio::test]
    async fn test_load_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.toml");
        std::fs::write(&path, "[security]\nrsa_bits = 1024\n").unwrap();

        assert!(DaemonConfig::load(&path).await.is_err());
    }
}

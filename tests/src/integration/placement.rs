//! # Placement Scenarios
//!
//! Upload-and-replace and move through the client, with the agent's files
//! checked on disk afterwards.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use fr_03_channel_client::{ChannelClient, ClientError};
    use shared_types::ApiResult;

    use crate::{agent_config, signer, signer_with, TestAgent, AES_KEY, HMAC_KEY};

    async fn agent_with_temp_root(temp_root: &std::path::Path) -> TestAgent {
        let mut config = agent_config();
        config.placement.temp_root = temp_root.to_path_buf();
        TestAgent::start_with(config).await
    }

    #[tokio::test]
    async fn test_upload_replaces_existing_file() {
        let temp_root = tempfile::tempdir().unwrap();
        let deploy = tempfile::tempdir().unwrap();
        let agent = agent_with_temp_root(temp_root.path()).await;

        let target = deploy.path().join("billing.jar");
        fs::write(&target, b"old build").unwrap();
        let local = deploy.path().join("build-output.jar");
        fs::write(&local, b"new build").unwrap();

        let client = ChannelClient::new(&agent.address(), signer()).unwrap();
        let result = client
            .upload(&local, target.to_str().unwrap())
            .await
            .unwrap();

        assert!(result.is_success(), "{result:?}");
        assert_eq!(result.data, target.display().to_string());
        assert_eq!(fs::read(&target).unwrap(), b"new build");
        assert_eq!(agent.metrics.snapshot().placements_ok, 1);
    }

    #[tokio::test]
    async fn test_upload_into_directory_uses_file_name() {
        let temp_root = tempfile::tempdir().unwrap();
        let deploy = tempfile::tempdir().unwrap();
        let source_dir = tempfile::tempdir().unwrap();
        let agent = agent_with_temp_root(temp_root.path()).await;

        let local = source_dir.path().join("web.tar");
        fs::write(&local, b"archive").unwrap();
        let target_dir = format!("{}/releases/", deploy.path().display());

        let client = ChannelClient::new(&agent.address(), signer()).unwrap();
        let result = client.upload(&local, &target_dir).await.unwrap();

        assert!(result.is_success(), "{result:?}");
        let placed = deploy.path().join("releases").join("web.tar");
        assert_eq!(fs::read(placed).unwrap(), b"archive");
    }

    #[tokio::test]
    async fn test_upload_over_directory_fails_in_body() {
        let temp_root = tempfile::tempdir().unwrap();
        let deploy = tempfile::tempdir().unwrap();
        let agent = agent_with_temp_root(temp_root.path()).await;

        let local = deploy.path().join("conf");
        fs::write(&local, b"x").unwrap();
        fs::create_dir(deploy.path().join("target")).unwrap();
        fs::create_dir(deploy.path().join("target").join("conf")).unwrap();

        let client = ChannelClient::new(&agent.address(), signer()).unwrap();
        let result = client
            .upload(&local, deploy.path().join("target").to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(result.code, ApiResult::FAILED);
        assert!(result.message.starts_with("upload failed"), "{}", result.message);
        assert_eq!(agent.metrics.snapshot().placements_failed, 1);
    }

    #[tokio::test]
    async fn test_move_file_never_overwrites() {
        let agent = TestAgent::start().await;
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.log");
        let target = dir.path().join("archive").join("a.log");
        fs::write(&source, b"log").unwrap();

        let client = ChannelClient::new(&agent.address(), signer()).unwrap();
        let result = client
            .move_file(source.to_str().unwrap(), target.to_str().unwrap())
            .await
            .unwrap();
        assert!(result.is_success(), "{result:?}");
        assert!(!source.exists());
        assert_eq!(fs::read(&target).unwrap(), b"log");

        fs::write(&source, b"second").unwrap();
        let result = client
            .move_file(source.to_str().unwrap(), target.to_str().unwrap())
            .await
            .unwrap();
        assert!(!result.is_success());
        assert_eq!(fs::read(&target).unwrap(), b"log");
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_move_requires_absolute_paths() {
        let agent = TestAgent::start().await;
        let client = ChannelClient::new(&agent.address(), signer()).unwrap();

        let result = client.move_file("relative.txt", "/tmp/x").await.unwrap();
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn test_placement_behind_auth_gate() {
        let temp_root = tempfile::tempdir().unwrap();
        let agent = agent_with_temp_root(temp_root.path()).await;
        let local = temp_root.path().join("payload");
        fs::write(&local, b"x").unwrap();

        let client =
            ChannelClient::new(&agent.address(), signer_with(AES_KEY, HMAC_KEY, "wrong")).unwrap();
        let err = tokio::time::timeout(
            Duration::from_secs(5),
            client.upload(&local, "/tmp/never-placed"),
        )
        .await
        .unwrap()
        .unwrap_err();

        assert!(matches!(err, ClientError::ConnectionClosed(_)), "{err:?}");
        let snapshot = agent.metrics.snapshot();
        assert_eq!(snapshot.placements_ok + snapshot.placements_failed, 0);
    }
}

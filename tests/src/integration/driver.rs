//! # Driver Scenarios
//!
//! A flow with every step type, run against a live agent.

#[cfg(all(test, unix))]
mod tests {
    use std::fs;
    use std::time::Duration;

    use fleet_driver::{Console, FlowFile, Runner};
    use tokio::sync::watch;

    use crate::{signer, signer_with, TestAgent, AES_KEY, HMAC_KEY};

    fn flow_json(host: &str, local: &str, remote: &str) -> String {
        format!(
            r#"{{
                "svc": {{
                    "ip": ["{host}"],
                    "flow": [
                        {{"type": "localCmd", "data": "echo packaged > {local}"}},
                        {{"type": "up", "data": "{local}", "data2": "{remote}"}},
                        {{"type": "cmd", "data": "cat {remote}"}}
                    ]
                }}
            }}"#
        )
    }

    #[tokio::test]
    async fn test_flow_runs_every_step_type() {
        let agent = TestAgent::start().await;
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("artifact.txt");
        let remote = dir.path().join("deployed").join("artifact.txt");
        let file = FlowFile::parse(&flow_json(
            &agent.address(),
            local.to_str().unwrap(),
            remote.to_str().unwrap(),
        ))
        .unwrap();

        let (_tx, rx) = watch::channel(false);
        let mut runner = Runner::new(signer(), rx, Console::new(Vec::new(), Vec::new()));
        let report = tokio::time::timeout(
            Duration::from_secs(20),
            runner.run(&file.select(&[], true).unwrap()),
        )
        .await
        .unwrap();

        assert!(report.is_success(), "{report:?}");
        assert_eq!(report.succeeded, 3);
        assert_eq!(fs::read_to_string(&remote).unwrap(), "packaged\n");

        let (out, _) = runner.into_console().into_inner();
        let out = String::from_utf8(out).unwrap();
        assert!(
            out.contains(&format!("[{}] packaged", agent.address())),
            "{out}"
        );
    }

    #[tokio::test]
    async fn test_rejected_envelope_fails_remote_steps() {
        let agent = TestAgent::start().await;
        let file = FlowFile::parse(&format!(
            r#"{{"svc": {{"ip": ["{}"], "flow": [{{"type": "cmd", "data": "uptime"}}]}}}}"#,
            agent.address()
        ))
        .unwrap();

        let (_tx, rx) = watch::channel(false);
        let mut runner = Runner::new(
            signer_with(AES_KEY, HMAC_KEY, "stale-secret"),
            rx,
            Console::new(Vec::new(), Vec::new()),
        );
        let report = runner.run(&file.select(&[], true).unwrap()).await;

        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(agent.metrics.snapshot().auth_rejected, 1);
    }

    #[tokio::test]
    async fn test_interrupt_closes_remote_command() {
        let agent = TestAgent::start().await;
        let file = FlowFile::parse(&format!(
            r#"{{"svc": {{"ip": ["{}"], "flow": [{{"type": "cmd", "data": "sleep 60"}}]}}}}"#,
            agent.address()
        ))
        .unwrap();

        let (tx, rx) = watch::channel(false);
        let mut runner = Runner::new(signer(), rx, Console::new(Vec::new(), Vec::new()));
        let metrics = agent.metrics.clone();
        tokio::spawn(async move {
            crate::wait_until(Duration::from_secs(5), || async {
                metrics.snapshot().sessions_active == 1
            })
            .await;
            let _ = tx.send(true);
        });

        let report = tokio::time::timeout(
            Duration::from_secs(10),
            runner.run(&file.select(&[], true).unwrap()),
        )
        .await
        .unwrap();

        assert!(report.interrupted);
        assert!(
            crate::wait_until(Duration::from_secs(2), || async {
                agent.metrics.snapshot().sessions_active == 0
            })
            .await
        );
    }
}

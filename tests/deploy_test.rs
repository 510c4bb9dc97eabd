mod common;

use std::time::Duration;

use common::{build_package, TestAgent, NODE};
use terminus_agent::common::error::AgentError;
use terminus_agent::common::task::{Operation, TaskStatus};
use terminus_agent::handler::deploy::{handle_deploy_app, DeployOptions};
use terminus_agent::server::worker::run_next_task;
use terminus_agent::traits::kv_store::KvStore;

const POP: Duration = Duration::from_millis(100);

#[tokio::test]
async fn queued_deploy_of_demo_package() {
    let agent = TestAgent::new();
    let package = agent.package(r#"{"application":"demo","version":"1.0"}"#);

    let handle = agent
        .ctx
        .queue
        .enqueue_named("deploy_app", serde_json::json!({ "package": package }))
        .await
        .unwrap();
    assert_eq!(run_next_task(&agent.ctx, POP).await.unwrap(), Some(handle.task_id));

    let record = handle.result().await.unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Complete, "{:?}", record.result);
    assert!(record.result["errors"].as_object().unwrap().is_empty());

    let config = agent.ctx.configs.get("demo").await.unwrap().unwrap();
    assert_eq!(config.version.as_deref(), Some("1.0"));
    let ports = config.ports(NODE).to_vec();
    assert_eq!(ports.len(), 1);
    assert!((15000..=40000).contains(&ports[0]));
    assert!(agent.ctx.ports.is_reserved(ports[0]).await.unwrap());
    assert!(agent.ctx.directory.contains("demo").await.unwrap());

    let conf = format!("demo_{}.conf", ports[0]);
    assert_eq!(
        agent.generated_files(),
        vec![format!("nginx/{}", conf), format!("supervisor/{}", conf)]
    );
    let supervisor = std::fs::read_to_string(agent.paths().supervisor_conf_dir().join(&conf)).unwrap();
    assert!(supervisor.contains(&format!("[program:demo_{}]", ports[0])));
    assert!(agent.paths().app_dir("demo").join("wsgi.py").is_file());
}

#[tokio::test]
async fn redeploy_keeps_uuid_and_ports() {
    let agent = TestAgent::new();
    let first = agent.package(r#"{"application":"demo","version":"1.0"}"#);
    handle_deploy_app(&agent.ctx, &first, DeployOptions::default()).await.unwrap();
    let before = agent.ctx.configs.get("demo").await.unwrap().unwrap();

    let second = agent.package(r#"{"application":"demo","version":"2.0","packages":["flask"]}"#);
    let result = handle_deploy_app(&agent.ctx, &second, DeployOptions::default()).await.unwrap();
    let after = agent.ctx.configs.get("demo").await.unwrap().unwrap();

    assert_eq!(after.version.as_deref(), Some("2.0"));
    assert_eq!(after.packages, vec!["flask".to_string()]);
    assert_eq!(after.uuid, before.uuid);
    assert!(after.uuid.is_some());
    assert_eq!(after.ports(NODE), before.ports(NODE));
    assert_eq!(agent.ctx.ports.reserved().await.unwrap().len(), 1);
    assert_eq!(result["ports"], serde_json::json!(before.ports(NODE)));
    assert_eq!(agent.generated_files().len(), 2);
}

#[tokio::test]
async fn package_without_manifest_fails_without_mutation() {
    let agent = TestAgent::new();
    let package = build_package(agent.root.path(), &[("wsgi.py", "application = None\n")]);

    let handle = agent
        .ctx
        .queue
        .enqueue(Operation::DeployApp {
            package,
            skip_provision: false,
            force_provision: false,
        })
        .await
        .unwrap();
    run_next_task(&agent.ctx, POP).await.unwrap();

    let record = handle.result().await.unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Error);
    assert!(record.result.as_str().unwrap().contains("manifest"));

    assert!(agent.ctx.configs.list().await.unwrap().is_empty());
    assert!(agent.ctx.ports.reserved().await.unwrap().is_empty());
    assert!(agent.ctx.directory.list().await.unwrap().is_empty());
    assert!(!agent.paths().apps_dir().exists());
    assert!(agent.generated_files().is_empty());
    assert!(agent.runner.calls().is_empty());
}

#[tokio::test]
async fn invalid_manifest_is_rejected() {
    let agent = TestAgent::new();
    let package = agent.package(r#"{"version":"1.0"}"#);
    let err = handle_deploy_app(&agent.ctx, &package, DeployOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::InvalidManifest(_)));
    assert!(agent.ctx.configs.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn provisions_environment_and_packages() {
    let agent = TestAgent::new();
    let package = build_package(
        agent.root.path(),
        &[
            (
                "demo/manifest.json",
                r#"{"application":"demo","packages":["flask","redis"],"runtime":"python3"}"#,
            ),
            ("demo/requirements.txt", "requests\n"),
            ("demo/wsgi.py", "application = None\n"),
        ],
    );
    handle_deploy_app(&agent.ctx, &package, DeployOptions::default()).await.unwrap();

    let env_dir = agent.paths().app_env_dir("demo");
    let pip = env_dir.join("bin").join("pip").display().to_string();
    let commands = agent.runner.commands();
    assert!(commands.contains(&"which python3".to_string()));
    assert!(commands.contains(&format!("virtualenv -p /usr/bin/python3 {}", env_dir.display())));
    assert!(commands.contains(&format!("{} install flask", pip)));
    assert!(commands.contains(&format!("{} install redis", pip)));
    assert!(commands.iter().any(|c| c.starts_with(&format!("{} install -r ", pip))
        && c.ends_with("requirements.txt")));
    // the single top-level directory is the package root
    assert!(agent.paths().app_dir("demo").join("wsgi.py").is_file());
}

#[tokio::test]
async fn skip_provision_runs_no_environment_commands() {
    let agent = TestAgent::new();
    let package = agent.package(r#"{"application":"demo","packages":["flask"]}"#);
    let options = DeployOptions {
        skip_provision: true,
        force_provision: false,
    };
    let result = handle_deploy_app(&agent.ctx, &package, options).await.unwrap();
    assert_eq!(result["output"]["provision"], "skipped");
    let programs = agent.runner.programs();
    assert!(!programs.iter().any(|p| p == "virtualenv" || p.ends_with("/pip")));
}

#[tokio::test]
async fn repository_source_is_cloned_at_revision() {
    let agent = TestAgent::new();
    let package = agent.package(
        r#"{"application":"demo","repo_type":"git","repo_url":"https://git.example/demo.git","repo_revision":"v1"}"#,
    );
    handle_deploy_app(&agent.ctx, &package, DeployOptions::default()).await.unwrap();

    let app_dir = agent.paths().app_dir("demo");
    let calls = agent.runner.calls();
    let clone = calls.iter().find(|c| c.program == "git" && c.args[0] == "clone").unwrap();
    assert_eq!(
        clone.args,
        vec![
            "clone".to_string(),
            "https://git.example/demo.git".to_string(),
            app_dir.display().to_string()
        ]
    );
    let checkout = calls.iter().find(|c| c.program == "git" && c.args[0] == "checkout").unwrap();
    assert_eq!(checkout.args[1], "v1");
    assert_eq!(checkout.cwd.as_deref(), Some(app_dir.as_path()));
}

#[tokio::test]
async fn failed_step_is_reported_and_deploy_continues() {
    let agent = TestAgent::new();
    agent.runner.set_status("virtualenv", 1);
    let package = agent.package(r#"{"application":"demo","packages":["flask"]}"#);

    let result = handle_deploy_app(&agent.ctx, &package, DeployOptions::default()).await.unwrap();
    assert!(result["errors"]["environment:create"].is_string());
    // later steps still ran
    assert_eq!(agent.generated_files().len(), 2);
    assert!(agent.ctx.directory.contains("demo").await.unwrap());
    assert!(agent.runner.programs().iter().any(|p| p == "supervisorctl"));
}

#[tokio::test]
async fn concurrent_deploys_get_distinct_ports() {
    let agent = TestAgent::new();
    let a = agent.package(r#"{"application":"alpha"}"#);
    let b = agent.package(r#"{"application":"beta"}"#);
    let (ra, rb) = tokio::join!(
        handle_deploy_app(&agent.ctx, &a, DeployOptions::default()),
        handle_deploy_app(&agent.ctx, &b, DeployOptions::default()),
    );
    let (ra, rb) = (ra.unwrap(), rb.unwrap());
    assert_ne!(ra["ports"], rb["ports"]);
    assert_eq!(agent.ctx.ports.reserved().await.unwrap().len(), 2);
}

#[tokio::test]
async fn deploy_over_corrupt_config_changes_nothing() {
    let agent = TestAgent::new();
    let key = terminus_agent::common::keys::application_key("demo");
    agent.ctx.store.set(&key, "{not json").await.unwrap();
    let package = agent.package(r#"{"application":"demo","version":"1.0"}"#);

    let handle = agent
        .ctx
        .queue
        .enqueue_named("deploy_app", serde_json::json!({ "package": package }))
        .await
        .unwrap();
    run_next_task(&agent.ctx, POP).await.unwrap();

    let record = handle.result().await.unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Error);
    assert!(record.result.as_str().unwrap().contains("corrupt"), "{:?}", record.result);
    assert!(agent.ctx.ports.reserved().await.unwrap().is_empty());
    assert!(agent.ctx.directory.list().await.unwrap().is_empty());
    assert!(agent.generated_files().is_empty());
    assert!(!agent.paths().app_dir("demo").exists());
    assert_eq!(agent.ctx.store.get(&key).await.unwrap().as_deref(), Some("{not json"));
}

mod common;

use common::FakeRunner;
use terminus_agent::common::config::RuntimeConfig;
use terminus_agent::provision::environment::{provision, ProvisionRequest};

#[tokio::test]
async fn existing_environment_only_installs() {
    let root = tempfile::tempdir().unwrap();
    let env_dir = root.path().join("ve/demo");
    std::fs::create_dir_all(&env_dir).unwrap();
    let runner = FakeRunner::default();
    let packages = vec!["flask".to_string()];
    let request = ProvisionRequest {
        env_dir: &env_dir,
        packages: &packages,
        requirements: None,
        runtime: Some("python3"),
        force: false,
    };

    let report = provision(&runner, &RuntimeConfig::default(), &request).await;
    assert!(report.is_clean());
    assert_eq!(
        runner.commands(),
        vec![format!("{}/bin/pip install flask", env_dir.display())]
    );
    assert!(report.output.contains_key("install:flask"));
}

#[tokio::test]
async fn force_recreates_environment() {
    let root = tempfile::tempdir().unwrap();
    let env_dir = root.path().join("ve/demo");
    std::fs::create_dir_all(env_dir.join("lib")).unwrap();
    let runner = FakeRunner::default();
    let request = ProvisionRequest {
        env_dir: &env_dir,
        packages: &[],
        requirements: None,
        runtime: None,
        force: true,
    };

    let report = provision(&runner, &RuntimeConfig::default(), &request).await;
    assert!(report.is_clean());
    assert!(!env_dir.join("lib").exists());
    assert_eq!(runner.commands(), vec![format!("virtualenv {}", env_dir.display())]);
}

#[tokio::test]
async fn failed_install_is_captured() {
    let root = tempfile::tempdir().unwrap();
    let env_dir = root.path().join("ve/demo");
    std::fs::create_dir_all(&env_dir).unwrap();
    let runner = FakeRunner::default();
    let pip = env_dir.join("bin/pip").display().to_string();
    runner.set_status(&pip, 1);
    let packages = vec!["nosuchpkg".to_string()];
    let request = ProvisionRequest {
        env_dir: &env_dir,
        packages: &packages,
        requirements: None,
        runtime: None,
        force: false,
    };

    let report = provision(&runner, &RuntimeConfig::default(), &request).await;
    assert!(report.errors["install:nosuchpkg"].contains("failed"));
}

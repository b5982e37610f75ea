//! End-to-end run against a mock tools server with a fake runtime.
#![cfg(unix)]

mod common;

use std::fs;

use atslaunch_core::config::PROJECT_DESCRIPTOR;
use atslaunch_core::provision::{Platform, CORE_TOOL, RUNTIME_TOOL};
use atslaunch_core::{
    LaunchError, PipelineDriver, PipelineState, RunConfiguration, RunOutcome, ToolRequirement,
    ToolRole,
};
use common::{feed_line, serve, serve_text, tgz};
use tempfile::TempDir;
use wiremock::MockServer;

const FEED_PATH: &str = "/tools/versions.csv";

const FAKE_JAVA: &str = r#"#!/bin/sh
echo "java $*" >> "$(dirname "$0")/../calls.log"
case "$*" in
  *com.ats.generator.Generator*)
    prev=""
    for a in "$@"; do
      if [ "$prev" = "-dest" ]; then dest="$a"; fi
      prev="$a"
    done
    mkdir -p "$dest/demo"
    echo "class Demo {}" > "$dest/demo/Demo.java"
    ;;
  *org.testng.TestNG*)
    test -d "$ATS_HOME/libs" || exit 8
    exit 3
    ;;
esac
"#;

const FAKE_JAVAC: &str = r#"#!/bin/sh
echo "javac $*" >> "$(dirname "$0")/../calls.log"
exit 0
"#;

struct Project {
    temp: TempDir,
    config: RunConfiguration,
}

async fn project_with_tools(server: &MockServer) -> Project {
    let temp = TempDir::new().unwrap();
    let project_dir = temp.path().join("project");
    fs::create_dir_all(project_dir.join("src/main/ats")).unwrap();
    fs::write(project_dir.join(PROJECT_DESCRIPTOR), "").unwrap();

    let feed = [
        feed_line(server, CORE_TOOL, "ats-3.1.0"),
        feed_line(server, RUNTIME_TOOL, "jdk-21"),
    ];
    serve_text(server, FEED_PATH, &feed.join("\n")).await;
    serve(
        server,
        "/bundles/ats-3.1.0.tgz",
        tgz(&[("ats-3.1.0/libs/ats.jar", &b"jar"[..], 0o644)]),
    )
    .await;
    serve(
        server,
        "/bundles/jdk-21.tgz",
        tgz(&[
            ("jdk-21/bin/java", FAKE_JAVA.as_bytes(), 0o644),
            ("jdk-21/bin/javac", FAKE_JAVAC.as_bytes(), 0o755),
        ]),
    )
    .await;

    let mut config = RunConfiguration::new(&project_dir, Platform::detect()).unwrap();
    config.tools_root = temp.path().join("tools");
    config.cache_root = temp.path().join("cache");
    config.catalog_url = format!("{}{}", server.uri(), FEED_PATH);
    config.suites = vec!["smoke".into()];

    Project { temp, config }
}

fn requirements() -> Vec<ToolRequirement> {
    vec![
        ToolRequirement::new(CORE_TOOL, ToolRole::CoreLibrary),
        ToolRequirement::new(RUNTIME_TOOL, ToolRole::Runtime),
    ]
}

#[tokio::test]
async fn test_full_run_provisions_and_reports_runner_exit_code() {
    let server = MockServer::start().await;
    let project = project_with_tools(&server).await;

    let mut driver = PipelineDriver::new(&project.config).with_requirements(requirements());
    let outcome = driver.run().await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed { exit_code: 3 });
    assert_eq!(driver.state(), PipelineState::Done);

    // bin/java ships without execute bits; the installer restores them.
    let calls =
        fs::read_to_string(project.temp.path().join("tools/jdk-21/calls.log")).unwrap();
    let programs: Vec<&str> = calls
        .lines()
        .map(|l| l.split_whitespace().next().unwrap())
        .collect();
    assert_eq!(programs, vec!["java", "javac", "java"]);

    let list = project
        .config
        .project_dir
        .join("target/generated/JavaClasses.list");
    assert_eq!(fs::read_to_string(list).unwrap(), "demo/Demo.java");
}

#[tokio::test]
async fn test_tools_only_run_stops_after_install() {
    let server = MockServer::start().await;
    let mut project = project_with_tools(&server).await;
    project.config.tools_only = true;

    let mut driver = PipelineDriver::new(&project.config).with_requirements(requirements());
    let outcome = driver.run().await.unwrap();

    assert_eq!(outcome, RunOutcome::ToolsInstalled);
    assert_eq!(outcome.exit_code(), 0);
    assert!(project.temp.path().join("tools/ats-3.1.0/libs/ats.jar").is_file());
    assert!(!project.temp.path().join("tools/jdk-21/calls.log").exists());
}

#[tokio::test]
async fn test_offline_run_without_tools_fails_provisioning() {
    let server = MockServer::start().await;
    let mut project = project_with_tools(&server).await;
    project.config.outbound = false;

    let mut driver = PipelineDriver::new(&project.config).with_requirements(requirements());
    let err = driver.run().await.unwrap_err();

    assert!(matches!(err, LaunchError::ToolNotFound { .. }), "{err}");
    assert_eq!(err.exit_code(), 3);
    assert_eq!(driver.state(), PipelineState::Failed);
}

#[tokio::test]
async fn test_clean_removes_stale_tools_then_reinstalls() {
    let server = MockServer::start().await;
    let mut project = project_with_tools(&server).await;
    project.config.clean = true;
    project.config.tools_only = true;

    let stale = project.temp.path().join("tools/jdk-17");
    fs::create_dir_all(&stale).unwrap();
    fs::create_dir_all(project.temp.path().join("cache/3.0.0/libs")).unwrap();

    let mut driver = PipelineDriver::new(&project.config).with_requirements(requirements());
    assert_eq!(driver.run().await.unwrap(), RunOutcome::ToolsInstalled);

    assert!(!stale.exists());
    assert!(!project.temp.path().join("cache").exists());
    assert!(project.temp.path().join("tools/jdk-21/bin/java").is_file());
}

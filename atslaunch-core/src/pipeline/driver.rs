//! The run state machine.
//!
//! ```text
//! Provisioning -> Generating -> Compiling -> Executing -> Done
//!       |              |            |            |
//!       +--------------+------------+------------+--> Failed
//! ```
//!
//! A tools-only run goes from `Provisioning` straight to `Done`.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{CoreVersion, RunConfiguration};
use crate::error::{LaunchError, Result, StageKind};
use crate::process::{LineSink, PassthroughSink, ProcessOrchestrator, RunnerOutputSink};
use crate::provision::{
    build_client, default_requirements, release_dir, ReleaseProvisioner, ToolEnvironment,
    ToolRequirement, ToolResolver, ToolRole, CORE_TOOL, RUNTIME_TOOL,
};

use super::stages::{StageBuilder, StageCommand};
use super::workspace::{
    copy_assets, remove_installed_components, reset_build_folders, write_class_list,
    ProjectLayout,
};

// ============================================================================
// States and Outcomes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Provisioning,
    Generating,
    Compiling,
    Executing,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;

        match (self, next) {
            (Provisioning, Generating) | (Provisioning, Done) => true,
            (Generating, Compiling) => true,
            (Compiling, Executing) => true,
            (Executing, Done) => true,
            (current, Failed) => !current.is_terminal(),
            _ => false,
        }
    }
}

/// How a run that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Tools were installed and no stage was requested.
    ToolsInstalled,
    /// All stages ran; carries the test runner's exit code.
    Completed { exit_code: i32 },
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ToolsInstalled => 0,
            Self::Completed { exit_code } => *exit_code,
        }
    }
}

// ============================================================================
// Pipeline Driver
// ============================================================================

/// Drives one run from provisioning to the test runner's exit.
pub struct PipelineDriver<'a> {
    config: &'a RunConfiguration,
    requirements: Vec<ToolRequirement>,
    orchestrator: ProcessOrchestrator,
    state: PipelineState,
}

impl<'a> PipelineDriver<'a> {
    pub fn new(config: &'a RunConfiguration) -> Self {
        Self {
            config,
            requirements: default_requirements(),
            orchestrator: ProcessOrchestrator,
            state: PipelineState::Provisioning,
        }
    }

    /// Replaces the default tool requirements.
    pub fn with_requirements(mut self, requirements: Vec<ToolRequirement>) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("Pipeline {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, error: LaunchError) -> LaunchError {
        if !self.state.is_terminal() {
            self.advance(PipelineState::Failed);
        }
        error
    }

    /// Runs every step the configuration asks for.
    pub async fn run(&mut self) -> Result<RunOutcome> {
        self.config.validate().map_err(|e| self.fail(e))?;

        if self.config.clean {
            remove_installed_components(self.config).map_err(|e| self.fail(e))?;
        }

        let env = self.provision().await?;

        if self.config.tools_only {
            info!("ATS tools and components installed");
            self.advance(PipelineState::Done);
            return Ok(RunOutcome::ToolsInstalled);
        }

        self.execute_stages(&env).await
    }

    // ========================================================================
    // Provisioning
    // ========================================================================

    /// Resolves every required tool and builds the stage environment.
    pub async fn provision(&mut self) -> Result<ToolEnvironment> {
        match self.try_provision().await {
            Ok(env) => Ok(env),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn try_provision(&self) -> Result<ToolEnvironment> {
        let client = build_client(self.config.platform, self.config.disable_tls_verification)?;
        let requirements = self.pin_core_release(&client).await;

        let resolver = ToolResolver::new(client, &self.config.tools_root, self.config.platform);
        let tools = resolver
            .resolve_all(&requirements, &self.config.resolution_mode())
            .await?;

        let env = ToolEnvironment::build(&tools);
        for (name, value) in &env.variables {
            info!("{} -> {}", name, value);
        }
        Ok(env)
    }

    /// Requirements with the core library pinned to a cached release, when
    /// one is configured and available.
    async fn pin_core_release(&self, client: &reqwest::Client) -> Vec<ToolRequirement> {
        let config = self.config;

        let pinned = match &config.core_version {
            Some(CoreVersion::Preinstalled(version)) => {
                info!("Core library version set by environment -> {}", version);
                Some(release_dir(&config.cache_root, version))
            }
            Some(CoreVersion::Provisioned(version)) => {
                let provisioner = ReleaseProvisioner::new(
                    client,
                    &config.cache_root,
                    &config.releases_url,
                    config.platform,
                );
                if config.outbound {
                    provisioner.provision(version).await
                } else {
                    provisioner.locate(version)
                }
            }
            None => None,
        };

        self.requirements
            .iter()
            .cloned()
            .map(|req| match &pinned {
                Some(dir) if req.role() == ToolRole::CoreLibrary => req.pinned(dir.clone()),
                _ => req,
            })
            .collect()
    }

    // ========================================================================
    // Stages
    // ========================================================================

    /// Generates, compiles and executes the project's test suites.
    ///
    /// Generation and compilation must exit 0; the execution stage's exit
    /// code is returned as-is.
    pub async fn execute_stages(&mut self, env: &ToolEnvironment) -> Result<RunOutcome> {
        match self.try_execute_stages(env).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn try_execute_stages(&mut self, env: &ToolEnvironment) -> Result<RunOutcome> {
        let missing = |tool: &str| LaunchError::ToolNotFound {
            tool: tool.to_string(),
            searched: self.config.tools_root.clone(),
        };
        let core_home = env.home_path().ok_or_else(|| missing(CORE_TOOL))?;
        let runtime_home = env.runtime_home().ok_or_else(|| missing(RUNTIME_TOOL))?;

        let layout = ProjectLayout::new(self.config);
        let stages = StageBuilder::new(&layout, core_home, runtime_home);
        let console = Arc::new(PassthroughSink);

        self.advance(PipelineState::Generating);
        reset_build_folders(&layout)?;
        info!("Project directory -> {}", layout.project_dir.display());
        info!("Generate java files -> {}", layout.generated_dir.display());
        self.run_checked(&stages.generation(), env, console.clone(), console.clone())
            .await?;

        self.advance(PipelineState::Compiling);
        write_class_list(&layout.generated_dir)?;
        copy_assets(&layout)?;
        info!("Compile classes to folder -> {}", layout.classes_dir.display());
        self.run_checked(&stages.compilation(), env, console.clone(), console.clone())
            .await?;

        self.advance(PipelineState::Executing);
        info!("Launch suite(s) execution -> {}", self.config.suites.join(","));
        let execution = stages.execution(self.config);
        let exit_code = self
            .run_stage(&execution, env, console, Arc::new(RunnerOutputSink))
            .await?;

        self.advance(PipelineState::Done);
        info!("Test execution finished with exit code {}", exit_code);
        Ok(RunOutcome::Completed { exit_code })
    }

    async fn run_stage<O, E>(
        &self,
        stage: &StageCommand,
        env: &ToolEnvironment,
        stdout: Arc<O>,
        stderr: Arc<E>,
    ) -> Result<i32>
    where
        O: LineSink,
        E: LineSink,
    {
        debug!(stage = %stage.kind, "Running {}", stage.argv.join(" "));
        self.orchestrator
            .run(&stage.argv, &stage.working_dir, &env.variables, stdout, stderr)
            .await
    }

    /// Runs a stage that must succeed.
    async fn run_checked<O, E>(
        &self,
        stage: &StageCommand,
        env: &ToolEnvironment,
        stdout: Arc<O>,
        stderr: Arc<E>,
    ) -> Result<()>
    where
        O: LineSink,
        E: LineSink,
    {
        let code = self.run_stage(stage, env, stdout, stderr).await?;
        if code == 0 {
            Ok(())
        } else {
            Err(stage_failure(stage.kind, code))
        }
    }
}

fn stage_failure(stage: StageKind, code: i32) -> LaunchError {
    LaunchError::StageFailure { stage, code }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PROJECT_DESCRIPTOR;
    use crate::provision::{Platform, ResolutionSource, ResolvedTool, ResolvedToolSet};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn test_transitions() {
        use PipelineState::*;

        assert!(Provisioning.can_transition_to(Generating));
        assert!(Provisioning.can_transition_to(Done));
        assert!(Generating.can_transition_to(Compiling));
        assert!(Compiling.can_transition_to(Executing));
        assert!(Executing.can_transition_to(Done));
        assert!(Compiling.can_transition_to(Failed));

        assert!(!Generating.can_transition_to(Executing));
        assert!(!Done.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Generating));
    }

    #[test]
    fn test_outcome_exit_codes() {
        assert_eq!(RunOutcome::ToolsInstalled.exit_code(), 0);
        assert_eq!(RunOutcome::Completed { exit_code: 7 }.exit_code(), 7);
    }

    #[tokio::test]
    async fn test_missing_descriptor_fails_before_provisioning() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = RunConfiguration::new(temp_dir.path(), Platform::detect()).unwrap();
        config.tools_root = temp_dir.path().join("tools");
        config.outbound = false;

        let mut driver = PipelineDriver::new(&config);
        let err = driver.run().await.unwrap_err();

        assert!(matches!(err, LaunchError::Configuration(_)));
        assert_eq!(driver.state(), PipelineState::Failed);
        assert!(!config.tools_root.exists());
    }

    #[cfg(unix)]
    mod stages {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Fake runtime whose `java` and `javac` append their arguments to
        /// `calls.log` next to the `bin` folder.
        const FAKE_JAVA: &str = r#"#!/bin/sh
log="$(dirname "$0")/../calls.log"
echo "java $*" >> "$log"
case "$*" in
  *com.ats.generator.Generator*)
    prev=""
    for a in "$@"; do
      if [ "$prev" = "-dest" ]; then dest="$a"; fi
      prev="$a"
    done
    mkdir -p "$dest/demo"
    echo "class Demo {}" > "$dest/demo/Demo.java"
    exit __GEN_EXIT__
    ;;
  *org.testng.TestNG*)
    echo "[main] INFO org.testng.internal.Utils - suite done" >&2
    echo "core=$ATS_HOME"
    exit 3
    ;;
esac
"#;

        const FAKE_JAVAC: &str = r#"#!/bin/sh
log="$(dirname "$0")/../calls.log"
echo "javac $*" >> "$log"
test -f JavaClasses.list || exit 9
prev=""
for a in "$@"; do
  if [ "$prev" = "-d" ]; then mkdir -p "$a"; fi
  prev="$a"
done
exit 0
"#;

        fn write_script(path: &Path, body: &str) {
            fs::write(path, body).unwrap();
            fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
        }

        struct Fixture {
            _temp: TempDir,
            config: RunConfiguration,
            env: ToolEnvironment,
            calls_log: std::path::PathBuf,
        }

        fn fixture(generation_exit: i32) -> Fixture {
            let temp = TempDir::new().unwrap();
            let project = temp.path().join("project");
            let core = temp.path().join("tools/ats-3.1.0");
            let runtime = temp.path().join("tools/jdk-21");

            fs::create_dir_all(&project).unwrap();
            fs::write(project.join(PROJECT_DESCRIPTOR), "").unwrap();
            fs::create_dir_all(core.join("libs")).unwrap();
            fs::create_dir_all(runtime.join("bin")).unwrap();

            write_script(
                &runtime.join("bin/java"),
                &FAKE_JAVA.replace("__GEN_EXIT__", &generation_exit.to_string()),
            );
            write_script(&runtime.join("bin/javac"), FAKE_JAVAC);

            let mut config = RunConfiguration::new(&project, Platform::detect()).unwrap();
            config.tools_root = temp.path().join("tools");
            config.cache_root = temp.path().join("cache");
            config.suites = vec!["smoke".into()];

            let tools = ResolvedToolSet::new(vec![
                ResolvedTool {
                    requirement: ToolRequirement::new(CORE_TOOL, ToolRole::CoreLibrary),
                    local_path: core,
                    remote_folder_name: None,
                    download_url: None,
                    source: ResolutionSource::LocalScan,
                },
                ResolvedTool {
                    requirement: ToolRequirement::new(RUNTIME_TOOL, ToolRole::Runtime),
                    local_path: runtime.clone(),
                    remote_folder_name: None,
                    download_url: None,
                    source: ResolutionSource::LocalScan,
                },
            ]);

            Fixture {
                calls_log: runtime.join("calls.log"),
                _temp: temp,
                config,
                env: ToolEnvironment::build(&tools),
            }
        }

        #[tokio::test]
        async fn test_stages_run_in_order_and_pass_exit_code() {
            let fx = fixture(0);
            let mut driver = PipelineDriver::new(&fx.config);

            let outcome = driver.execute_stages(&fx.env).await.unwrap();

            assert_eq!(outcome, RunOutcome::Completed { exit_code: 3 });
            assert_eq!(driver.state(), PipelineState::Done);

            let calls = fs::read_to_string(&fx.calls_log).unwrap();
            let programs: Vec<&str> = calls
                .lines()
                .map(|l| l.split_whitespace().next().unwrap())
                .collect();
            assert_eq!(programs, vec!["java", "javac", "java"]);
            assert!(calls.lines().next().unwrap().contains("com.ats.generator.Generator"));
            assert!(calls.lines().last().unwrap().ends_with("src/exec/smoke.xml"));

            let list = fx
                .config
                .project_dir
                .join("target/generated/JavaClasses.list");
            assert_eq!(fs::read_to_string(list).unwrap(), "demo/Demo.java");
        }

        #[tokio::test]
        async fn test_generation_failure_halts_before_compilation() {
            let fx = fixture(2);
            let mut driver = PipelineDriver::new(&fx.config);

            let err = driver.execute_stages(&fx.env).await.unwrap_err();

            assert!(matches!(
                err,
                LaunchError::StageFailure {
                    stage: StageKind::Generation,
                    code: 2
                }
            ));
            assert_ne!(err.exit_code(), 0);
            assert_eq!(driver.state(), PipelineState::Failed);

            let calls = fs::read_to_string(&fx.calls_log).unwrap();
            assert_eq!(calls.lines().count(), 1);
            assert!(!calls.contains("javac"));
        }

        #[tokio::test]
        async fn test_missing_runtime_binary_is_launch_failure() {
            let fx = fixture(0);
            fs::remove_file(fx.env.runtime_home().unwrap().join("bin/java")).unwrap();
            let mut driver = PipelineDriver::new(&fx.config);

            let err = driver.execute_stages(&fx.env).await.unwrap_err();
            assert!(matches!(err, LaunchError::ProcessLaunch { .. }));
            assert_eq!(driver.state(), PipelineState::Failed);
        }
    }
}

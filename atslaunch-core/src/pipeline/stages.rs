//! Command lines of the generation, compilation and execution stages.

use std::env::consts::EXE_SUFFIX;
use std::path::{Path, PathBuf};

use crate::config::RunConfiguration;
use crate::error::StageKind;

use super::workspace::{normalize_suite, ProjectLayout, CLASS_LIST_FILE};

const GENERATOR_CLASS: &str = "com.ats.generator.Generator";
const RUNNER_CLASS: &str = "org.testng.TestNG";

/// Classpath entry separator for the current platform.
#[inline]
fn classpath_separator() -> &'static str {
    #[cfg(windows)]
    {
        ";"
    }
    #[cfg(not(windows))]
    {
        ":"
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn libs_glob(home: &Path) -> String {
    format!("{}/libs/*", path_str(home))
}

/// A stage's process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
    pub kind: StageKind,
    pub argv: Vec<String>,
    pub working_dir: PathBuf,
}

/// Builds stage commands from the resolved core library and runtime.
#[derive(Debug, Clone)]
pub struct StageBuilder<'a> {
    layout: &'a ProjectLayout,
    core_home: &'a Path,
    runtime_home: &'a Path,
}

impl<'a> StageBuilder<'a> {
    pub fn new(layout: &'a ProjectLayout, core_home: &'a Path, runtime_home: &'a Path) -> Self {
        Self {
            layout,
            core_home,
            runtime_home,
        }
    }

    /// Path of a runtime binary such as `java` or `javac`.
    pub fn runtime_binary(&self, name: &str) -> PathBuf {
        self.runtime_home
            .join("bin")
            .join(format!("{}{}", name, EXE_SUFFIX))
    }

    pub fn generation(&self) -> StageCommand {
        StageCommand {
            kind: StageKind::Generation,
            argv: vec![
                path_str(&self.runtime_binary("java")),
                "-cp".into(),
                libs_glob(self.core_home),
                GENERATOR_CLASS.into(),
                "-prj".into(),
                path_str(&self.layout.project_dir),
                "-dest".into(),
                path_str(&self.layout.generated_dir),
                "-force".into(),
            ],
            working_dir: self.layout.project_dir.clone(),
        }
    }

    /// Compiles the sources listed in the manifest, run from the generated
    /// folder so the project's own `libs` is reachable as `../../libs`.
    pub fn compilation(&self) -> StageCommand {
        let classpath = ["../../libs/*".to_string(), libs_glob(self.core_home)]
            .join(classpath_separator());

        StageCommand {
            kind: StageKind::Compilation,
            argv: vec![
                path_str(&self.runtime_binary("javac")),
                "-cp".into(),
                classpath,
                "-d".into(),
                path_str(&self.layout.classes_dir),
                format!("@{}", CLASS_LIST_FILE),
            ],
            working_dir: self.layout.generated_dir.clone(),
        }
    }

    pub fn execution(&self, config: &RunConfiguration) -> StageCommand {
        let classpath = [
            libs_glob(self.core_home),
            path_str(&self.layout.classes_dir),
            "libs/*".to_string(),
        ]
        .join(classpath_separator());

        let mut argv = vec![
            path_str(&self.runtime_binary("java")),
            format!("-Dats-report={}", config.report_level),
            format!("-Dvalidation-report={}", u8::from(config.validation_report)),
            format!("-Dhtmlplayer={}", u8::from(config.html_player)),
            format!("-Doutbound-traffic={}", config.outbound),
            "-cp".into(),
            classpath,
            RUNNER_CLASS.into(),
            "-d".into(),
            path_str(&self.layout.output_dir),
        ];
        argv.extend(config.suites.iter().map(|s| normalize_suite(s)));

        StageCommand {
            kind: StageKind::Execution,
            argv,
            working_dir: self.layout.project_dir.clone(),
        }
    }
}

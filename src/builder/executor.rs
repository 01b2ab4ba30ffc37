//! Build execution.
//!
//! Modules run in leaf-first topological order. Within a module, compile
//! tasks fan out over a worker pool sized by `--jobs`; the link task runs
//! after the module's compiles and all dependency links succeeded. A failed
//! module skips its dependents while siblings continue, so one invocation
//! surfaces as many diagnostics as possible.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::builder::context::BuildContext;
use crate::builder::plan::{BuildPlan, CompileTask, LinkTask, TaskState};
use crate::errors::{BuildError, Result};
use crate::toolchain::CommandSpec;
use crate::util::fs::{ensure_dir, remove_dir_all_if_exists};
use crate::util::process::ProcessBuilder;

/// Outcome of one build invocation.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Link outputs of modules that built successfully.
    pub artifacts: Vec<PathBuf>,
    /// Modules with a failed compile or link task.
    pub failed: Vec<String>,
    /// Modules skipped because a dependency failed.
    pub skipped: Vec<String>,
}

impl BuildReport {
    pub fn success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Executes a build plan.
pub struct BuildExecutor<'a> {
    ctx: &'a BuildContext,
    verbose: bool,
}

impl<'a> BuildExecutor<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        BuildExecutor {
            ctx,
            verbose: false,
        }
    }

    /// Enable verbose output.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run the plan to completion, cancellation, or failure.
    pub fn execute(&self, plan: &BuildPlan) -> Result<BuildReport> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.ctx.effective_jobs())
            .build()
            .map_err(|e| BuildError::io(PathBuf::from("worker pool"), std::io::Error::other(e)))?;

        let total = plan.compile_count() + plan.link_count();
        let pb = if !self.verbose && total > 1 {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let mut statuses: Vec<TaskState> = Vec::with_capacity(plan.modules.len());
        let mut report = BuildReport::default();

        for module in &plan.modules {
            if self.ctx.cancel.is_cancelled() {
                return Err(BuildError::Cancelled);
            }

            if module
                .deps
                .iter()
                .any(|&d| statuses[d] != TaskState::Succeeded)
            {
                tracing::warn!(
                    module = module.name.as_str(),
                    "skipping: a dependency failed to build"
                );
                if let Some(pb) = &pb {
                    pb.inc(module.compiles.len() as u64 + 1);
                }
                report.skipped.push(module.name.clone());
                statuses.push(TaskState::Skipped);
                continue;
            }

            if self.ctx.clean {
                remove_dir_all_if_exists(&module.intermediate_dir)?;
            }
            // Compile tasks run with the intermediate directory as cwd; it
            // must exist even for modules with zero sources.
            ensure_dir(&module.intermediate_dir)?;

            tracing::debug!(
                module = module.name.as_str(),
                variant = module.variant_id.as_str(),
                "building"
            );

            let compile_states: Vec<TaskState> = pool.install(|| {
                module
                    .compiles
                    .par_iter()
                    .map(|task| self.run_compile(task, &module.intermediate_dir, &pb))
                    .collect()
            });

            if compile_states.contains(&TaskState::Cancelled) || self.ctx.cancel.is_cancelled() {
                return Err(BuildError::Cancelled);
            }

            if compile_states.contains(&TaskState::Failed) {
                if let Some(pb) = &pb {
                    pb.inc(1); // the link task that will not run
                }
                report.failed.push(module.name.clone());
                statuses.push(TaskState::Failed);
                continue;
            }

            match self.run_link(&module.link, &module.intermediate_dir, &pb) {
                TaskState::Succeeded => {
                    report.artifacts.push(module.link.output.clone());
                    statuses.push(TaskState::Succeeded);
                }
                TaskState::Cancelled => return Err(BuildError::Cancelled),
                _ => {
                    report.failed.push(module.name.clone());
                    statuses.push(TaskState::Failed);
                }
            }
        }

        if let Some(pb) = &pb {
            pb.finish_with_message("done");
        }

        Ok(report)
    }

    fn run_compile(
        &self,
        task: &CompileTask,
        cwd: &Path,
        pb: &Option<ProgressBar>,
    ) -> TaskState {
        let failure = |status: i32| BuildError::CompileFailure {
            module: task.module.clone(),
            source_file: task.source.clone(),
            status,
        };
        let state = self.run_task(&task.command, cwd, &task.module, &task.output, &failure);
        if let Some(pb) = pb {
            pb.inc(1);
        }
        state
    }

    fn run_link(&self, task: &LinkTask, cwd: &Path, pb: &Option<ProgressBar>) -> TaskState {
        let failure = |status: i32| BuildError::LinkFailure {
            module: task.module.clone(),
            output: task.output.clone(),
            status,
        };
        let state = self.run_task(&task.command, cwd, &task.module, &task.output, &failure);
        if let Some(pb) = pb {
            pb.inc(1);
        }
        state
    }

    fn run_task(
        &self,
        command: &CommandSpec,
        cwd: &Path,
        module: &str,
        output: &Path,
        failure: &dyn Fn(i32) -> BuildError,
    ) -> TaskState {
        if self.ctx.cancel.is_cancelled() {
            return TaskState::Cancelled;
        }

        if let Some(parent) = output.parent() {
            if let Err(e) = ensure_dir(parent) {
                tracing::error!(
                    kind = "IoError",
                    module,
                    detail = %e,
                    "failed to create output directory"
                );
                return TaskState::Failed;
            }
        }

        let mut cmd = ProcessBuilder::new(&command.program)
            .args(command.args.iter())
            .cwd(cwd);
        for (key, value) in &command.env {
            cmd = cmd.env(key, value);
        }

        if self.verbose {
            eprintln!("   {}", cmd.display_command());
        }

        let result = self.ctx.runner.run(&cmd, &self.ctx.cancel);
        match result {
            Ok(out) if out.cancelled => TaskState::Cancelled,
            Ok(out) => {
                // Child output is captured whole and emitted as one blob per
                // task, so concurrent tasks never interleave mid-diagnostic.
                let mut blob = String::new();
                blob.push_str(&String::from_utf8_lossy(&out.stdout));
                blob.push_str(&String::from_utf8_lossy(&out.stderr));
                if !blob.is_empty() {
                    eprint!("{}", blob);
                }

                if out.success() {
                    TaskState::Succeeded
                } else {
                    let err = failure(out.status.unwrap_or(-1));
                    tracing::error!(kind = err.kind(), module, detail = %err, "task failed");
                    TaskState::Failed
                }
            }
            Err(e) => {
                tracing::error!(
                    kind = e.kind(),
                    module,
                    detail = %e,
                    "task failed to start"
                );
                TaskState::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reference::ModuleReference;
    use crate::graph::instance::Instancer;
    use crate::graph::resolve::{ModuleGraph, ResolveMode};
    use crate::loader::TomlLoader;
    use crate::util::process::{CancelToken, ProcessOutput, ProcessRunner};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Instrumented runner: counts concurrent invocations and fails commands
    /// whose argv matches a needle.
    struct MockRunner {
        current: AtomicUsize,
        max_concurrent: AtomicUsize,
        delay: Duration,
        fail_needle: Option<String>,
        commands: Mutex<Vec<String>>,
    }

    impl MockRunner {
        fn new() -> Self {
            MockRunner {
                current: AtomicUsize::new(0),
                max_concurrent: AtomicUsize::new(0),
                delay: Duration::from_millis(0),
                fail_needle: None,
                commands: Mutex::new(Vec::new()),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn failing_on(mut self, needle: &str) -> Self {
            self.fail_needle = Some(needle.to_string());
            self
        }
    }

    impl ProcessRunner for MockRunner {
        fn run(&self, cmd: &ProcessBuilder, _cancel: &CancelToken) -> crate::errors::Result<ProcessOutput> {
            let live = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent.fetch_max(live, Ordering::SeqCst);

            std::thread::sleep(self.delay);
            self.commands.lock().unwrap().push(cmd.display_command());

            let fails = self
                .fail_needle
                .as_deref()
                .is_some_and(|needle| cmd.get_args().iter().any(|a| a.ends_with(needle)));

            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(ProcessOutput {
                status: Some(if fails { 1 } else { 0 }),
                stdout: Vec::new(),
                stderr: if fails { b"boom".to_vec() } else { Vec::new() },
                cancelled: false,
            })
        }
    }

    fn write(dir: &std::path::Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    fn plan_with_runner(
        dir: &std::path::Path,
        root: &str,
        runner: Arc<MockRunner>,
        jobs: Option<usize>,
    ) -> (BuildPlan, BuildContext) {
        let mut ctx = BuildContext::with_builtins().unwrap();
        ctx.target = "unix".to_string();
        ctx.require_tools = false;
        ctx.cache_root = None;
        ctx.jobs = jobs;
        ctx.runner = runner;

        let instancer = Instancer::new(
            Arc::new(TomlLoader::new()),
            "unix",
            "unix",
            None,
            false,
            false,
        );
        let graph = ModuleGraph::resolve(
            &instancer,
            &ModuleReference::new(root),
            dir,
            ResolveMode::Build,
        )
        .unwrap();
        let plan = BuildPlan::new(&graph, &ctx).unwrap();
        (plan, ctx)
    }

    #[test]
    fn test_jobs_cap_limits_concurrent_compiles() {
        let tmp = TempDir::new().unwrap();
        for name in ["a.c", "b.c", "c.c", "d.c"] {
            write(tmp.path(), name, "");
        }
        write(
            tmp.path(),
            "lib.ebuild",
            r#"
            [[modules]]
            name = "lib"
            type = "static-library"
            sources = ["a.c", "b.c", "c.c", "d.c"]
            "#,
        );

        let runner = Arc::new(MockRunner::new().with_delay(Duration::from_millis(30)));
        let (plan, ctx) = plan_with_runner(tmp.path(), "lib.ebuild", Arc::clone(&runner), Some(2));

        let report = BuildExecutor::new(&ctx).execute(&plan).unwrap();
        assert!(report.success());
        assert!(runner.max_concurrent.load(Ordering::SeqCst) <= 2);
        // 4 compiles + 1 archive.
        assert_eq!(runner.commands.lock().unwrap().len(), 5);
    }

    #[test]
    fn test_failed_dependency_skips_dependents_but_not_siblings() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "broken.c", "");
        write(
            tmp.path(),
            "broken.ebuild",
            r#"
            [[modules]]
            name = "broken"
            type = "static-library"
            sources = ["broken.c"]
            "#,
        );
        write(tmp.path(), "solid.c", "");
        write(
            tmp.path(),
            "solid.ebuild",
            r#"
            [[modules]]
            name = "solid"
            type = "static-library"
            sources = ["solid.c"]
            "#,
        );
        write(tmp.path(), "main.c", "");
        write(
            tmp.path(),
            "app.ebuild",
            r#"
            [[modules]]
            name = "app"
            type = "executable"
            sources = ["main.c"]

            [modules.dependencies]
            public = ["broken.ebuild", "solid.ebuild"]
            "#,
        );

        let runner = Arc::new(MockRunner::new().failing_on("broken.c"));
        let (plan, ctx) = plan_with_runner(tmp.path(), "app.ebuild", Arc::clone(&runner), None);

        let report = BuildExecutor::new(&ctx).execute(&plan).unwrap();
        assert!(!report.success());
        assert_eq!(report.failed, vec!["broken".to_string()]);
        assert_eq!(report.skipped, vec!["app".to_string()]);

        // The sibling still built and linked.
        let commands = runner.commands.lock().unwrap();
        assert!(commands.iter().any(|c| c.contains("libsolid.a")));
        // The dependent's link never ran.
        assert!(!commands.iter().any(|c| c.contains("app")));
    }

    #[test]
    fn test_cancelled_before_start() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.c", "");
        write(
            tmp.path(),
            "lib.ebuild",
            r#"
            [[modules]]
            name = "lib"
            type = "static-library"
            sources = ["a.c"]
            "#,
        );

        let runner = Arc::new(MockRunner::new());
        let (plan, ctx) = plan_with_runner(tmp.path(), "lib.ebuild", runner, None);
        ctx.cancel.cancel();

        let err = BuildExecutor::new(&ctx).execute(&plan).unwrap_err();
        assert_eq!(err.kind(), "Cancelled");
    }

    #[test]
    fn test_successful_build_reports_artifacts() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.c", "");
        write(
            tmp.path(),
            "lib.ebuild",
            r#"
            [[modules]]
            name = "lib"
            type = "static-library"
            sources = ["a.c"]
            "#,
        );

        let runner = Arc::new(MockRunner::new());
        let (plan, ctx) = plan_with_runner(tmp.path(), "lib.ebuild", runner, None);

        let report = BuildExecutor::new(&ctx).execute(&plan).unwrap();
        assert!(report.success());
        assert_eq!(report.artifacts.len(), 1);
        assert!(report.artifacts[0].ends_with("liblib.a") || report.artifacts[0].to_string_lossy().contains("liblib.a"));
    }
}

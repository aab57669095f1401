//! End-to-end pipeline runs against stub tools and injected back ends.
//!
//! The external tool chain is replaced with shell scripts and the back end
//! with in-process stubs, so every stage boundary and the terminal states of
//! the controller are exercised without any verifier installed.

use async_trait::async_trait;
use provex_backends::{
    BackendError, BackendRun, HealthStatus, VerificationBackend,
};
use provex_core::{PipelineArtifact, Property, RunConfig, ToolPaths, Verdict};
use provex_pipeline::{Controller, PipelineState};
use provex_witness::{parse_graphml, Branch, ExecutionTrace, TraceStep, WitnessKind};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Accepts the flag shapes of all the pipeline tools and copies its input
/// file to the `-o` target
const COPY_TOOL: &str = r#"
in=""
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    -c|-pta|--config) shift 2 ;;
    -*) shift ;;
    *) in="$1"; shift ;;
  esac
done
cp "$in" "$out"
"#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, "#!/bin/sh\n{body}").unwrap();
    let mut perms = file.metadata().unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn stub_tools(dir: &Path) -> ToolPaths {
    let copy = |name| Some(write_script(dir, name, COPY_TOOL));
    ToolPaths {
        slicer: copy("slicer.sh"),
        instrumenter: copy("instr.sh"),
        linker: copy("link.sh"),
        optimizer: copy("opt.sh"),
        symbolizer: copy("symbolize.sh"),
        backend: None,
    }
}

fn base_config(dir: &Path) -> RunConfig {
    let source = dir.join("main.c");
    std::fs::write(
        &source,
        "extern void __VERIFIER_error(void);\nint main(void) {\n  __VERIFIER_error();\n  return 0;\n}\n",
    )
    .unwrap();
    RunConfig {
        sources: vec![source],
        properties: vec![Property::parse("REACHCALL").unwrap()],
        witness_path: dir.join("witness.graphml"),
        tools: stub_tools(dir),
        ..Default::default()
    }
}

/// Back end that returns a canned result without spawning anything
struct StubBackend {
    result: fn() -> Result<BackendRun, BackendError>,
}

#[async_trait]
impl VerificationBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    fn required_tool_version(&self) -> &str {
        "0.0"
    }

    async fn run(
        &self,
        _bitcode: &PipelineArtifact,
        _config: &RunConfig,
        _deadline: Option<Duration>,
    ) -> Result<BackendRun, BackendError> {
        (self.result)()
    }

    async fn health_check(&self) -> HealthStatus {
        HealthStatus::Healthy
    }
}

/// Back end that ignores its deadline entirely
struct HangingBackend;

#[async_trait]
impl VerificationBackend for HangingBackend {
    fn name(&self) -> &str {
        "hang"
    }

    fn required_tool_version(&self) -> &str {
        "0.0"
    }

    async fn run(
        &self,
        _bitcode: &PipelineArtifact,
        _config: &RunConfig,
        _deadline: Option<Duration>,
    ) -> Result<BackendRun, BackendError> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        unreachable!("the controller must reap a back end that outlives its deadline")
    }

    async fn health_check(&self) -> HealthStatus {
        HealthStatus::Healthy
    }
}

fn proved() -> Result<BackendRun, BackendError> {
    Ok(BackendRun {
        verdict: Verdict::True,
        raw_output: "KLEE: done: completed paths = 4\n".to_string(),
        trace: None,
        duration: Duration::from_millis(5),
    })
}

fn violated() -> Result<BackendRun, BackendError> {
    let trace = ExecutionTrace::from_steps(vec![
        TraceStep::at_line(2).with_assumption("argc == 1"),
        TraceStep::at_line(3).with_branch(Branch::Then),
        TraceStep::at_line(3),
    ]);
    Ok(BackendRun {
        verdict: Verdict::False(Some(provex_core::PropertyKind::ReachCall)),
        raw_output: "KLEE: ERROR: main.c:3: external call\n".to_string(),
        trace: Some(trace),
        duration: Duration::from_millis(5),
    })
}

fn violated_unlabeled() -> Result<BackendRun, BackendError> {
    Ok(BackendRun {
        verdict: Verdict::False(None),
        raw_output: "VERIFICATION FAILED\n".to_string(),
        trace: None,
        duration: Duration::from_millis(5),
    })
}

fn crashed() -> Result<BackendRun, BackendError> {
    Err(BackendError::ExecutionFailed(
        "engine exited with signal 11".to_string(),
    ))
}

#[tokio::test]
async fn proved_run_completes_with_a_correctness_witness() {
    let dir = tempfile::tempdir().unwrap();
    let config = base_config(dir.path());
    let witness_path = config.witness_path.clone();

    let controller =
        Controller::with_backend(config, Box::new(StubBackend { result: proved })).unwrap();
    let outcome = controller.run().await.unwrap();

    assert_eq!(outcome.verdict, Verdict::True);
    assert_eq!(outcome.state, PipelineState::Done);
    assert_eq!(outcome.witness_path.as_deref(), Some(witness_path.as_path()));

    let witness = parse_graphml(&std::fs::read_to_string(&witness_path).unwrap()).unwrap();
    assert_eq!(witness.kind, WitnessKind::Correctness);
    assert_eq!(witness.nodes.len(), 1);
    assert!(witness.nodes[0].entry);
    assert!(witness.edges.is_empty());
    assert_eq!(witness.specification, vec!["REACHCALL".to_string()]);
}

#[tokio::test]
async fn violated_run_writes_the_counterexample_path() {
    let dir = tempfile::tempdir().unwrap();
    let config = base_config(dir.path());
    let witness_path = config.witness_path.clone();

    let controller =
        Controller::with_backend(config, Box::new(StubBackend { result: violated })).unwrap();
    let outcome = controller.run().await.unwrap();

    assert_eq!(outcome.verdict.to_string(), "false(unreach-call)");
    assert_eq!(outcome.state, PipelineState::Done);

    let witness = parse_graphml(&std::fs::read_to_string(&witness_path).unwrap()).unwrap();
    assert_eq!(witness.kind, WitnessKind::Violation);
    assert_eq!(witness.nodes.len(), 3);
    assert!(witness.nodes[0].entry);
    let last = witness.nodes.last().unwrap();
    assert!(last.violation && last.sink);
    assert_eq!(witness.edges.len(), 2);
    // edge annotations come from the record they lead into
    assert_eq!(witness.edges[0].line, Some(3));
    assert_eq!(witness.edges[0].control, Some(Branch::Then));
    assert_eq!(witness.edges[1].line, Some(3));
}

#[tokio::test]
async fn deadline_expiry_aborts_the_run_with_a_timeout_verdict() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.timeout_secs = 1;
    let witness_path = config.witness_path.clone();

    let controller = Controller::with_backend(config, Box::new(HangingBackend)).unwrap();
    let outcome = controller.run().await.unwrap();

    assert_eq!(outcome.verdict, Verdict::Timeout);
    assert_eq!(outcome.state, PipelineState::Aborted);
    // deadline plus the one-second reaping grace, not the full hang
    assert!(outcome.elapsed < Duration::from_secs(5));
    assert!(!witness_path.exists(), "no witness for an aborted run");
}

#[tokio::test]
async fn backend_crash_becomes_an_error_verdict_not_a_pipeline_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = base_config(dir.path());
    let witness_path = config.witness_path.clone();

    let controller =
        Controller::with_backend(config, Box::new(StubBackend { result: crashed })).unwrap();
    let outcome = controller.run().await.unwrap();

    assert!(matches!(outcome.verdict, Verdict::Error { .. }));
    assert_eq!(outcome.state, PipelineState::Done);
    assert!(!witness_path.exists(), "no witness for an inconclusive run");
}

#[tokio::test]
async fn unlabeled_violation_takes_the_configured_property() {
    let dir = tempfile::tempdir().unwrap();
    let config = base_config(dir.path());

    let controller =
        Controller::with_backend(config, Box::new(StubBackend { result: violated_unlabeled }))
            .unwrap();
    let outcome = controller.run().await.unwrap();

    // the only property under check names the violation
    assert_eq!(
        outcome.verdict,
        Verdict::False(Some(provex_core::PropertyKind::ReachCall))
    );
    assert_eq!(outcome.verdict.to_string(), "false(unreach-call)");
    assert_eq!(outcome.state, PipelineState::Done);
}

#[tokio::test]
async fn verification_disabled_stops_after_the_link_stage() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.verification_enabled = false;

    let controller =
        Controller::with_backend(config, Box::new(StubBackend { result: proved })).unwrap();
    let outcome = controller.run().await.unwrap();

    assert_eq!(outcome.state, PipelineState::Done);
    assert!(matches!(outcome.verdict, Verdict::Unknown { .. }));
}

#[tokio::test]
async fn witnesses_can_be_turned_off_without_changing_the_verdict() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.witness_enabled = false;
    let witness_path = config.witness_path.clone();

    let controller =
        Controller::with_backend(config, Box::new(StubBackend { result: violated })).unwrap();
    let outcome = controller.run().await.unwrap();

    assert_eq!(outcome.verdict.to_string(), "false(unreach-call)");
    assert!(outcome.witness_path.is_none());
    assert!(!witness_path.exists());
}

#[tokio::test]
async fn explicit_work_dir_is_used_and_retained() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("work");
    let mut config = base_config(dir.path());
    config.work_dir = Some(work.clone());

    let controller =
        Controller::with_backend(config, Box::new(StubBackend { result: proved })).unwrap();
    let outcome = controller.run().await.unwrap();

    assert_eq!(outcome.working_dir.as_deref(), Some(work.as_path()));
    assert!(work.join("linked.bc").exists());
}

#[tokio::test]
async fn save_files_retains_the_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.save_files = true;

    let controller =
        Controller::with_backend(config, Box::new(StubBackend { result: proved })).unwrap();
    let outcome = controller.run().await.unwrap();

    let workdir = outcome.working_dir.expect("working directory retained");
    assert!(workdir.join("unit.c").exists());
    assert!(workdir.join("normalized.c").exists());
    std::fs::remove_dir_all(workdir).unwrap();
}

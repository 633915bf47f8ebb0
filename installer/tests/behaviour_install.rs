//! Behaviour-driven tests for package installation.
//!
//! Each scenario builds a real package in a sandbox, stages it, and applies
//! it through recording collaborators so the order of target-system calls
//! can be checked.

mod support;

use appinstall::builder::PackageBuilder;
use appinstall::component::ScriptRole;
use appinstall::confirm::{ConfirmPolicy, PromptAnswer};
use appinstall::error::AppInstallError;
use appinstall::install::{InstallPhase, InstallReport, InstallState, InstallationTask, SkipReason};
use appinstall::options::InstallOptions;
use appinstall::target::RestoreRequest;
use appinstall::test_utils::{
    EventLog, RecordingScripts, RecordingSystem, ScriptedPrompter,
};
use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use support::Sandbox;

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

struct InstallWorld {
    sandbox: Sandbox,
    builder: PackageBuilder,
    existing: Vec<String>,
    answers: Vec<PromptAnswer>,
    options: InstallOptions,
    failing_script: Option<ScriptRole>,
    failing_restores: Vec<String>,
    failing_lodrun: bool,
    events: EventLog,
    outcome: Option<Outcome>,
}

struct Outcome {
    result: Result<InstallReport, AppInstallError>,
    state: InstallState,
    progress: String,
    asked: Vec<String>,
    restores: Vec<RestoreRequest>,
    lodruns: Vec<Utf8PathBuf>,
}

impl InstallWorld {
    fn outcome(&self) -> &Outcome {
        self.outcome.as_ref().expect("package installed")
    }

    fn report(&self) -> &InstallReport {
        match &self.outcome().result {
            Ok(report) => report,
            Err(err) => panic!("installation failed: {err}"),
        }
    }

    fn packaged(&self, relative: &str) -> Utf8PathBuf {
        self.sandbox.installed(&self.sandbox.src().join(relative))
    }
}

#[fixture]
fn world() -> InstallWorld {
    let sandbox = Sandbox::new();
    let builder = sandbox.builder();
    let options = sandbox.install_options();
    InstallWorld {
        sandbox,
        builder,
        existing: Vec::new(),
        answers: Vec::new(),
        options,
        failing_script: None,
        failing_restores: Vec::new(),
        failing_lodrun: false,
        events: EventLog::default(),
        outcome: None,
    }
}

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[given("the package contains a pre-install script")]
fn given_pre_script(world: &mut InstallWorld) {
    world.sandbox.write_source("pre.sh", "echo stopping\n");
    world.builder.add_pre_install("pre.sh").expect("pre script");
}

#[given("the package contains a post-install script")]
fn given_post_script(world: &mut InstallWorld) {
    world.sandbox.write_source("post.sh", "echo starting\n");
    world.builder.add_post_install("post.sh").expect("post script");
}

#[given("the package contains library \"{name}\"")]
fn given_library(world: &mut InstallWorld, name: String) {
    world.builder.add_library(&name).expect("valid library");
}

#[given("the package contains directory \"{name}\"")]
fn given_directory(world: &mut InstallWorld, name: String) {
    world.sandbox.make_source_dir(&name);
    world.builder.add_bare_directory(&name).expect("directory");
}

#[given("the package contains file \"{name}\"")]
fn given_file(world: &mut InstallWorld, name: String) {
    world.sandbox.write_source(&name, "[app]\nport = 8080\n");
    world.builder.add_file(&name).expect("file");
}

#[given("the package contains a lodrun library")]
fn given_lodrun(world: &mut InstallWorld) {
    world.sandbox.write_source("lodrun.savf", "SAVF:LODRUN");
    world.builder.set_lodrun_lib("lodrun.savf").expect("lodrun");
}

#[given("library \"{name}\" already exists on the target")]
fn given_existing_library(world: &mut InstallWorld, name: String) {
    world.existing.push(name);
}

#[given("the confirm policy is \"{policy}\"")]
fn given_policy(world: &mut InstallWorld, policy: String) {
    world.options.confirm = match policy.as_str() {
        "yes-to-all" => ConfirmPolicy::YesToAll,
        "continue" => ConfirmPolicy::ContinueIfNotDelete,
        "prompt" => ConfirmPolicy::PromptEach,
        other => panic!("unknown policy {other}"),
    };
}

#[given("the operator answers \"{answer}\"")]
fn given_answer(world: &mut InstallWorld, answer: String) {
    let answer = match answer.as_str() {
        "yes" => PromptAnswer::Yes,
        "no" => PromptAnswer::No,
        "all" => PromptAnswer::All,
        other => panic!("unknown answer {other}"),
    };
    world.answers.push(answer);
}

#[given("libraries are restored as \"{name}\"")]
fn given_rstlib(world: &mut InstallWorld, name: String) {
    world.options.rstlib_target = Some(name);
}

#[given("lodrun is enabled")]
fn given_lodrun_enabled(world: &mut InstallWorld) {
    world.options.run_lodrun = true;
}

#[given("the {role} script fails")]
fn given_failing_script(world: &mut InstallWorld, role: String) {
    world.failing_script = Some(match role.as_str() {
        "pre-install" => ScriptRole::Pre,
        "post-install" => ScriptRole::Post,
        other => panic!("unknown script role {other}"),
    });
}

#[given("restoring library \"{name}\" fails on the target")]
fn given_failing_restore(world: &mut InstallWorld, name: String) {
    world.failing_restores.push(name);
}

#[given("lodrun fails on the target")]
fn given_failing_lodrun(world: &mut InstallWorld) {
    world.failing_lodrun = true;
}

#[when("the package is installed")]
fn when_installed(world: &mut InstallWorld) {
    let built = support::build(&world.builder, &RecordingSystem::default());
    let layout = support::stage(&built.path, world.sandbox.staging_root());

    let mut system = RecordingSystem::with_events(world.events.clone())
        .with_existing(world.existing.iter().map(String::as_str));
    for name in &world.failing_restores {
        system = system.failing_restore_of(name);
    }
    if world.failing_lodrun {
        system = system.failing_lodrun();
    }
    let mut scripts = RecordingScripts::with_events(world.events.clone());
    if let Some(role) = world.failing_script {
        scripts = scripts.failing(role);
    }
    let mut prompter = ScriptedPrompter::new(world.answers.clone());

    let mut progress = Vec::new();
    let mut task = InstallationTask::new(&layout, &system, &scripts, &mut prompter);
    let result = task.run(&world.options, &mut progress);
    let state = task.state().clone();

    world.outcome = Some(Outcome {
        result,
        state,
        progress: String::from_utf8(progress).expect("UTF-8 progress"),
        asked: prompter.asked().to_vec(),
        restores: system.restores(),
        lodruns: system.lodruns(),
    });
}

#[then("the installation completes")]
fn then_completes(world: &mut InstallWorld) {
    let _ = world.report();
    assert_eq!(world.outcome().state, InstallState::Complete);
}

#[then("progress shows pre-install, restore, directory, file and post-install in that order")]
fn then_progress_order(world: &mut InstallWorld) {
    let progress = &world.outcome().progress;
    let positions: Vec<usize> = [
        "Running pre-install script",
        "Restoring library MYLIB",
        "Creating directory",
        "Installing ",
        "Running post-install script",
    ]
    .iter()
    .map(|needle| {
        progress
            .find(needle)
            .unwrap_or_else(|| panic!("missing {needle:?} in:\n{progress}"))
    })
    .collect();
    assert!(
        positions.is_sorted(),
        "steps out of order: {positions:?}\n{progress}"
    );

    let events = world.events.entries();
    assert_eq!(events.len(), 3, "unexpected events: {events:?}");
    assert!(events.first().is_some_and(|e| e.starts_with("script pre-install ")));
    assert_eq!(events.get(1).map(String::as_str), Some("restore MYLIB as MYLIB replace=true"));
    assert!(events.last().is_some_and(|e| e.starts_with("script post-install ")));
}

#[then("directory \"{name}\" exists under the install root")]
fn then_directory_exists(world: &mut InstallWorld, name: String) {
    let path = world.packaged(&name);
    assert!(path.is_dir(), "{path} is not a directory");
    let entries = std::fs::read_dir(&path).expect("read dir").count();
    assert_eq!(entries, 0, "bare directories carry no content");
}

#[then("file \"{name}\" exists under the install root")]
fn then_file_exists(world: &mut InstallWorld, name: String) {
    let path = world.packaged(&name);
    let contents = std::fs::read_to_string(&path).expect("installed file");
    assert_eq!(contents, "[app]\nport = 8080\n");
}

#[then("library \"{name}\" was restored as \"{target}\" replacing the existing one")]
fn then_restored_replacing(world: &mut InstallWorld, name: String, target: String) {
    let restore = world
        .outcome()
        .restores
        .iter()
        .find(|r| r.library == name)
        .unwrap_or_else(|| panic!("{name} was not restored"));
    assert_eq!(restore.restore_to, target);
    assert!(restore.replace);
}

#[then("library \"{name}\" was restored as \"{target}\"")]
fn then_restored(world: &mut InstallWorld, name: String, target: String) {
    let restored: Vec<(&str, &str)> = world
        .outcome()
        .restores
        .iter()
        .map(|r| (r.library.as_str(), r.restore_to.as_str()))
        .collect();
    assert!(
        restored.contains(&(name.as_str(), target.as_str())),
        "restores: {restored:?}"
    );
    assert!(world.report().restored.contains(&target));
}

#[then("no prompt was shown")]
fn then_no_prompt(world: &mut InstallWorld) {
    assert!(world.outcome().asked.is_empty());
}

#[then("the operator was asked about \"{name}\" only")]
fn then_asked_only(world: &mut InstallWorld, name: String) {
    assert_eq!(world.outcome().asked, vec![name]);
}

#[then("the report is partial and names \"{name}\"")]
fn then_partial(world: &mut InstallWorld, name: String) {
    let report = world.report();
    assert!(report.is_partial());
    let skipped: Vec<&str> = report.skipped.iter().map(|s| s.library.as_str()).collect();
    assert_eq!(skipped, [name.as_str()]);
    let expected = match world.options.confirm {
        ConfirmPolicy::PromptEach => SkipReason::Declined,
        ConfirmPolicy::ContinueIfNotDelete | ConfirmPolicy::YesToAll => SkipReason::RequiresDelete,
    };
    assert!(report.skipped.iter().all(|s| s.reason == expected));
}

#[then("the lodrun library ran")]
fn then_lodrun_ran(world: &mut InstallWorld) {
    assert_eq!(world.outcome().lodruns.len(), 1);
    assert!(world.report().lodrun_ran);
}

#[then("the lodrun library did not run")]
fn then_lodrun_skipped(world: &mut InstallWorld) {
    assert!(world.outcome().lodruns.is_empty());
    assert!(!world.report().lodrun_ran);
    assert!(world.outcome().progress.contains("Skipping lodrun library"));
}

#[then("the installation fails during the {step} step")]
fn then_fails_during(world: &mut InstallWorld, step: String) {
    let phase = InstallPhase::ALL
        .into_iter()
        .find(|phase| phase.to_string() == step)
        .unwrap_or_else(|| panic!("unknown step {step}"));
    let outcome = world.outcome();
    match &outcome.result {
        Err(AppInstallError::StepFailed { step, source }) => {
            assert_eq!(*step, phase);
            match phase {
                InstallPhase::PreInstall | InstallPhase::PostInstall => {
                    assert!(matches!(**source, AppInstallError::Script { .. }), "{source:?}");
                }
                InstallPhase::RestoringLibraries | InstallPhase::RunningLodrun => {
                    assert!(matches!(**source, AppInstallError::TargetSystem { .. }), "{source:?}");
                }
                InstallPhase::MaterializingFiles => {
                    assert!(matches!(**source, AppInstallError::Materialize { .. }), "{source:?}");
                }
            }
        }
        other => panic!("expected StepFailed, got {other:?}"),
    }
    assert!(
        matches!(&outcome.state, InstallState::Failed { step, .. } if *step == phase),
        "unexpected state {:?}",
        outcome.state
    );
}

#[then("no library restore was attempted")]
fn then_no_restore_attempted(world: &mut InstallWorld) {
    let events = world.events.entries();
    assert!(
        !events
            .iter()
            .any(|e| e.starts_with("restore ") || e.starts_with("exists ")),
        "unexpected events: {events:?}"
    );
    assert!(world.outcome().restores.is_empty());
}

#[then("library \"{name}\" was not restored")]
fn then_not_restored(world: &mut InstallWorld, name: String) {
    let events = world.events.entries();
    let prefix = format!("restore {name} ");
    assert!(
        !events.iter().any(|e| e.starts_with(&prefix)),
        "unexpected events: {events:?}"
    );
}

#[then("the post-install script did not run")]
fn then_post_not_run(world: &mut InstallWorld) {
    let events = world.events.entries();
    assert!(
        !events.iter().any(|e| e.starts_with("script post-install ")),
        "unexpected events: {events:?}"
    );
}

#[then("file \"{name}\" was not installed")]
fn then_file_missing(world: &mut InstallWorld, name: String) {
    assert!(!world.packaged(&name).exists());
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/package_install.feature",
    name = "Components install in pipeline order"
)]
fn scenario_pipeline_order(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/package_install.feature",
    name = "Yes-to-all replaces an existing library without asking"
)]
fn scenario_yes_to_all(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/package_install.feature",
    name = "Continue-if-not-delete skips existing libraries"
)]
fn scenario_continue_if_not_delete(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/package_install.feature",
    name = "Declining the prompt skips the library"
)]
fn scenario_declined(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/package_install.feature",
    name = "Answering all stops further prompts"
)]
fn scenario_answer_all(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/package_install.feature",
    name = "Libraries can be restored under another name"
)]
fn scenario_rstlib(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/package_install.feature",
    name = "The lodrun library runs when requested"
)]
fn scenario_lodrun_enabled(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/package_install.feature",
    name = "The lodrun library is skipped by default"
)]
fn scenario_lodrun_skipped(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/package_install.feature",
    name = "A failing post-install script fails the run"
)]
fn scenario_failing_post(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/package_install.feature",
    name = "A failing pre-install script stops before any library is restored"
)]
fn scenario_failing_pre(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/package_install.feature",
    name = "A restore failure other than an existing library is fatal under continue"
)]
fn scenario_continue_restore_failure(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/package_install.feature",
    name = "A failing lodrun library fails the run"
)]
fn scenario_failing_lodrun(world: InstallWorld) {
    let _ = world;
}

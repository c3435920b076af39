//! The restart controller reacting to git activity.

mod common;

use common::{harness, sample_config, write_project, Harness, ScriptedProbe};
use devstack::{Error, LifecycleEvent, RestartController, State};
use git2::Repository;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::Duration;

const ALL: &[&str] = &["db", "api", "hasura"];

fn write_remote_ref(root: &Path, branch: &str) -> PathBuf {
    let path = root.join(".git/refs/remotes/origin").join(branch);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "0123456789abcdef0123456789abcdef01234567\n").unwrap();
    path
}

fn git_project(root: &Path) -> Repository {
    let repo = Repository::init(root).unwrap();
    repo.set_head("refs/heads/main").unwrap();
    write_project(root, &[]);
    write_remote_ref(root, "main");
    repo
}

async fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn start(h: &Harness) -> tokio::task::JoinHandle<devstack::Result<()>> {
    h.env.init().await.unwrap();
    let controller = RestartController::new(h.env.clone()).unwrap();
    let run = tokio::spawn(controller.run());
    h.env.notify(LifecycleEvent::Execute);
    let env = h.env.clone();
    wait_for("first run", || env.state() == State::Active).await;
    run
}

#[tokio::test]
async fn init_watches_head_and_the_remote_ref() {
    let dir = tempfile::tempdir().unwrap();
    git_project(dir.path());
    let h = harness(sample_config(), dir.path(), ScriptedProbe::all_healthy(ALL), true);

    h.env.init().await.unwrap();

    assert_eq!(h.env.paths().branch.as_deref(), Some("main"));
    assert_eq!(
        h.watcher.paths(),
        vec![
            dir.path().join(".git/HEAD"),
            dir.path().join(".git/refs/remotes/origin/main"),
        ]
    );
}

#[tokio::test]
async fn only_one_controller_per_environment() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(sample_config(), dir.path(), ScriptedProbe::all_healthy(ALL), false);

    let _first = RestartController::new(h.env.clone()).unwrap();
    assert!(RestartController::new(h.env.clone()).is_err());
}

#[tokio::test]
async fn branch_switch_recreates_containers_for_the_new_branch() {
    let dir = tempfile::tempdir().unwrap();
    let repo = git_project(dir.path());
    let h = harness(sample_config(), dir.path(), ScriptedProbe::all_healthy(ALL), true);
    let run = start(&h).await;
    assert_eq!(h.env.paths().data_dir, dir.path().join(".nhost/main"));
    let old_db = h.env.service("db").unwrap().container_id().unwrap();

    repo.set_head("refs/heads/feature").unwrap();
    let feature_ref = write_remote_ref(dir.path(), "feature");
    assert!(h.watcher.trigger(&dir.path().join(".git/HEAD")));

    let (env, docker) = (h.env.clone(), h.docker.clone());
    wait_for("restart on feature", || {
        docker.removes.load(Ordering::SeqCst) == 3 && env.state() == State::Active
    })
    .await;

    assert_eq!(h.env.paths().branch.as_deref(), Some("feature"));
    assert_eq!(h.env.paths().data_dir, dir.path().join(".nhost/feature"));
    assert_eq!(h.docker.creates.load(Ordering::SeqCst), 6);
    assert_ne!(h.env.service("db").unwrap().container_id().unwrap(), old_db);
    assert_eq!(h.migrator.prepares(), 2);
    assert!(h.watcher.paths().contains(&feature_ref));

    h.env.notify(LifecycleEvent::ShutdownRequested);
    run.await.unwrap().unwrap();
    assert!(h.env.is_terminated());
}

#[tokio::test]
async fn checkout_during_a_restart_does_not_restart_twice() {
    let dir = tempfile::tempdir().unwrap();
    let repo = git_project(dir.path());
    let h = harness(sample_config(), dir.path(), ScriptedProbe::all_healthy(ALL), true);
    let run = start(&h).await;
    h.docker.delay_stops(Duration::from_millis(200));

    repo.set_head("refs/heads/feature").unwrap();
    let head = dir.path().join(".git/HEAD");
    assert!(h.watcher.trigger(&head));
    let env = h.env.clone();
    wait_for("containers stopping", || env.state() == State::ShuttingDown).await;
    assert!(h.watcher.trigger(&head));

    let (env, docker) = (h.env.clone(), h.docker.clone());
    wait_for("restart on feature", || {
        docker.removes.load(Ordering::SeqCst) == 3 && env.state() == State::Active
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(h.env.paths().branch.as_deref(), Some("feature"));
    assert_eq!(h.docker.stops.load(Ordering::SeqCst), 6);
    assert_eq!(h.docker.creates.load(Ordering::SeqCst), 6);

    h.env.notify(LifecycleEvent::ShutdownRequested);
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_during_a_branch_restart_skips_the_new_run() {
    let dir = tempfile::tempdir().unwrap();
    let repo = git_project(dir.path());
    let mut config = sample_config();
    config.healthcheck.attempts = 60;
    let h = harness(config, dir.path(), ScriptedProbe::all_healthy(ALL), true);
    let run = start(&h).await;
    h.docker.delay_stops(Duration::from_millis(200));
    h.probe.set_unhealthy("db");

    repo.set_head("refs/heads/feature").unwrap();
    assert!(h.watcher.trigger(&dir.path().join(".git/HEAD")));
    let env = h.env.clone();
    wait_for("containers stopping", || env.state() == State::ShuttingDown).await;

    h.env.notify(LifecycleEvent::ShutdownRequested);
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("controller stops without another run")
        .unwrap()
        .unwrap();

    assert!(h.env.is_terminated());
    assert_eq!(h.env.state(), State::Inactive);
    assert_eq!(h.docker.creates.load(Ordering::SeqCst), 3);
    assert_eq!(h.probe.probe_count("db"), 1);
}

#[tokio::test]
async fn remote_ref_update_reapplies_migrations_only() {
    let dir = tempfile::tempdir().unwrap();
    git_project(dir.path());
    let h = harness(sample_config(), dir.path(), ScriptedProbe::all_healthy(ALL), true);
    let run = start(&h).await;
    assert_eq!(h.migrator.prepares(), 1);

    assert!(h
        .watcher
        .trigger(&dir.path().join(".git/refs/remotes/origin/main")));

    let migrator = h.migrator.clone();
    wait_for("migrations", || migrator.prepares() == 2).await;
    assert_eq!(h.migrator.migrations.load(Ordering::SeqCst), 2);
    assert_eq!(h.docker.creates.load(Ordering::SeqCst), 3);
    assert_eq!(h.docker.stops.load(Ordering::SeqCst), 0);
    assert_eq!(h.env.state(), State::Active);

    h.env.notify(LifecycleEvent::ShutdownRequested);
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn migration_failure_after_ref_update_keeps_the_stack_running() {
    let dir = tempfile::tempdir().unwrap();
    git_project(dir.path());
    let h = harness(sample_config(), dir.path(), ScriptedProbe::all_healthy(ALL), true);
    let run = start(&h).await;

    h.migrator.fail_migrations();
    assert!(h
        .watcher
        .trigger(&dir.path().join(".git/refs/remotes/origin/main")));
    let migrator = h.migrator.clone();
    wait_for("migration attempt", || {
        migrator.migration_attempts.load(Ordering::SeqCst) == 2
    })
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.env.state(), State::Active);
    assert!(!h.env.is_terminated());
    assert_eq!(h.migrator.prepares(), 1);

    h.env.notify(LifecycleEvent::ShutdownRequested);
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_request_cleans_up_and_ends_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    git_project(dir.path());
    let h = harness(sample_config(), dir.path(), ScriptedProbe::all_healthy(ALL), true);
    let run = start(&h).await;

    h.env.notify(LifecycleEvent::ShutdownRequested);
    run.await.unwrap().unwrap();

    assert!(h.env.is_terminated());
    assert!(h.watcher.is_closed());
    assert_eq!(h.env.state(), State::Inactive);
    assert_eq!(h.docker.stops.load(Ordering::SeqCst), 3);
    // Stopped, not removed
    assert_eq!(h.docker.container_count(), 3);
    assert!(!h.watcher.trigger(&dir.path().join(".git/HEAD")));
}

#[tokio::test]
async fn shutdown_interrupts_a_pending_health_check() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), &[]);
    let h = harness(sample_config(), dir.path(), ScriptedProbe::new(), false);
    h.env.init().await.unwrap();
    let controller = RestartController::new(h.env.clone()).unwrap();
    let run = tokio::spawn(controller.run());

    h.env.notify(LifecycleEvent::Execute);
    let probe = h.probe.clone();
    wait_for("health polling", || probe.probe_count("db") > 0).await;
    assert_eq!(h.env.state(), State::Executing);

    h.env.notify(LifecycleEvent::ShutdownRequested);
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("controller stops promptly")
        .unwrap()
        .unwrap();

    assert!(h.env.is_terminated());
    assert_eq!(h.docker.stops.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn failed_first_run_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(sample_config(), dir.path(), ScriptedProbe::all_healthy(ALL), false);
    h.docker.fail_start("nhost_db");
    h.env.init().await.unwrap();
    let controller = RestartController::new(h.env.clone()).unwrap();

    h.env.notify(LifecycleEvent::Execute);
    let err = controller.run().await.unwrap_err();

    assert!(matches!(err, Error::ContainerStartFailed(ref name, _) if name == "db"));
    assert!(h.env.is_terminated());
}

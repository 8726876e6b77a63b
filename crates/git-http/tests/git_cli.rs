//! Push and clone with the real `git` client against a served router.

mod common;

use std::path::Path;

use common::{TOKEN, git_available, state};
use git_http::Visibility;
use tokio::net::TcpListener;
use tokio::process::Command;

async fn git(cwd: &Path, home: &Path, args: &[&str]) -> std::process::Output {
    let out = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .env("HOME", home)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .await
        .expect("spawn git");
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    out
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn push_then_clone_over_smart_http() {
    if !git_available() {
        eprintln!("Skipping test - git not installed");
        return;
    }

    let state = state().repo("acme", "widgets", Visibility::Public).build();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = state.app();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let scratch = tempfile::tempdir().unwrap();
    let home = scratch.path().join("home");
    let work = scratch.path().join("work");
    let clone = scratch.path().join("clone");
    std::fs::create_dir_all(&home).unwrap();
    std::fs::create_dir_all(&work).unwrap();

    let url = format!("http://{addr}/acme/widgets.git");
    let auth = format!("http.extraHeader=Authorization: Bearer {TOKEN}");

    git(&work, &home, &["init", "-q"]).await;
    std::fs::write(work.join("README.md"), "widgets\n").unwrap();
    git(&work, &home, &["add", "README.md"]).await;
    git(
        &work,
        &home,
        &["-c", "user.name=Tester", "-c", "user.email=tester@example.com", "commit", "-q", "-m", "initial"],
    )
    .await;
    git(&work, &home, &["-c", &auth, "push", "-q", &url, "HEAD:refs/heads/main"]).await;

    assert!(state.repo_path("acme", "widgets").join("refs/heads/main").exists()
        || state.repo_path("acme", "widgets").join("packed-refs").exists());

    git(
        scratch.path(),
        &home,
        &["clone", "-q", "--branch", "main", &url, clone.to_str().unwrap()],
    )
    .await;
    assert_eq!(std::fs::read_to_string(clone.join("README.md")).unwrap(), "widgets\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn anonymous_push_is_refused() {
    if !git_available() {
        eprintln!("Skipping test - git not installed");
        return;
    }

    let state = state().repo("acme", "widgets", Visibility::Public).build();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = state.app();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let scratch = tempfile::tempdir().unwrap();
    let home = scratch.path().join("home");
    let work = scratch.path().join("work");
    std::fs::create_dir_all(&home).unwrap();
    std::fs::create_dir_all(&work).unwrap();
    git(&work, &home, &["init", "-q"]).await;
    git(
        &work,
        &home,
        &["-c", "user.name=Tester", "-c", "user.email=tester@example.com", "commit", "-q", "--allow-empty", "-m", "x"],
    )
    .await;

    let out = Command::new("git")
        .args(["push", "-q", &format!("http://{addr}/acme/widgets.git"), "HEAD:refs/heads/main"])
        .current_dir(&work)
        .env("HOME", &home)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .await
        .unwrap();
    assert!(!out.status.success());
}

//! A real daemon served in-process, driven through the CLI runtime.

use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::node::Node;
use crate::server::run_daemon;
use crate::tests::support::{RunOutput, TEST_PEER_ID, TempRepo, run_cli};

fn run_against(repo: &TempRepo, command: &str) -> RunOutput {
    let mut args = vec!["ipfs"];
    args.extend(command.split_whitespace());
    args.extend(["--config", repo.paths().root().as_str()]);
    run_cli(args)
}

fn wait_for_record(repo: &TempRepo) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !repo.paths().api_path().exists() {
        assert!(Instant::now() < deadline, "daemon never advertised its address");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn daemon_serves_commands_until_shutdown() {
    let repo = TempRepo::new().expect("temp repo");
    repo.initialise_with_api("/ip4/127.0.0.1/tcp/0")
        .expect("initialise");
    let node = Arc::new(Node::open(repo.paths()).expect("open node"));

    let daemon = thread::spawn(move || {
        let mut out = Vec::new();
        let result = run_daemon(node, &mut out).map_err(|error| error.to_string());
        (result, String::from_utf8_lossy(&out).into_owned())
    });
    wait_for_record(&repo);

    let advertised = repo
        .paths()
        .read_api_address()
        .expect("read record")
        .expect("record present");
    assert!(
        !advertised.to_string().ends_with("/tcp/0"),
        "record must carry the bound port: {advertised}"
    );

    let id = run_against(&repo, "id");
    assert_eq!(id.exit_code, Some(ExitCode::SUCCESS), "{}", id.stderr_text());
    let report: serde_json::Value = serde_json::from_str(&id.stdout_text()).expect("json");
    assert_eq!(report["ID"], TEST_PEER_ID);

    let level = run_against(&repo, "log level info");
    assert_eq!(level.exit_code, Some(ExitCode::SUCCESS), "{}", level.stderr_text());
    assert_eq!(level.stdout_text(), "Changed log filter to 'info'\n");

    let served = run_against(&repo, "diag cmds");
    assert_eq!(served.exit_code, Some(ExitCode::SUCCESS), "{}", served.stderr_text());
    let stdout = served.stdout_text();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3, "unexpected history: {stdout}");
    assert!(lines[0].starts_with("1 ") && lines[0].ends_with(" ipfs id"));
    assert!(lines[1].starts_with("2 ") && lines[1].ends_with(" ipfs log level info"));
    assert!(lines[2].ends_with(" ipfs diag cmds"));

    let stop = run_against(&repo, "shutdown");
    assert_eq!(stop.exit_code, Some(ExitCode::SUCCESS), "{}", stop.stderr_text());
    assert_eq!(stop.stdout_text(), "Daemon is shutting down\n");

    let (result, output) = daemon.join().expect("daemon thread");
    result.expect("daemon exits cleanly");
    assert!(output.contains("Daemon is ready"));
    assert!(output.ends_with("Daemon stopped\n"));
    assert!(!repo.paths().api_path().exists());
}

#[test]
fn explicit_api_reaches_the_daemon() {
    let repo = TempRepo::new().expect("temp repo");
    repo.initialise_with_api("/ip4/127.0.0.1/tcp/0")
        .expect("initialise");
    let node = Arc::new(Node::open(repo.paths()).expect("open node"));
    let daemon = thread::spawn(move || {
        let mut out = Vec::new();
        run_daemon(node, &mut out).map_err(|error| error.to_string())
    });
    wait_for_record(&repo);
    let api = repo
        .paths()
        .read_api_address()
        .expect("read record")
        .expect("record present")
        .to_string();

    let shown = run_against(&repo, &format!("config show --api {api}"));
    assert_eq!(shown.exit_code, Some(ExitCode::SUCCESS), "{}", shown.stderr_text());
    assert!(shown.stdout_text().contains(TEST_PEER_ID));

    let stop = run_against(&repo, "shutdown");
    assert_eq!(stop.exit_code, Some(ExitCode::SUCCESS), "{}", stop.stderr_text());
    daemon
        .join()
        .expect("daemon thread")
        .expect("daemon exits cleanly");
}

//! End-to-end runs of the CLI runtime with captured output.

use std::cell::RefCell;
use std::process::ExitCode;

use rstest::rstest;

use crate::tests::support::{CannedResponse, TEST_PEER, TEST_PEER_ID, TestWorld, run_cli, world};

#[rstest]
#[case(&["ipfs", "version"])]
#[case(&["ipfs", "--version"])]
fn version_prints_the_package_version(#[case] args: &[&str]) {
    let output = run_cli(args.iter().copied());
    assert_eq!(output.exit_code, Some(ExitCode::SUCCESS));
    assert_eq!(
        output.stdout_text(),
        format!("ipfs version {}\n", env!("CARGO_PKG_VERSION"))
    );
}

#[rstest]
#[case(&["ipfs", "help"])]
#[case(&["ipfs", "--help"])]
#[case(&["ipfs", "-h"])]
fn root_help_lists_top_level_commands(#[case] args: &[&str]) {
    let output = run_cli(args.iter().copied());
    assert_eq!(output.exit_code, Some(ExitCode::SUCCESS));
    let stdout = output.stdout_text();
    assert!(stdout.contains("COMMANDS"), "stdout: {stdout}");
    assert!(stdout.contains("ipfs swarm"));
    assert!(!stdout.contains("ipfs swarm peers"));
    assert!(stdout.contains("--api <multiaddr>"));
}

#[rstest]
#[case(&["ipfs", "help", "swarm"])]
#[case(&["ipfs", "swarm", "--help"])]
fn group_help_lists_subcommands(#[case] args: &[&str]) {
    let output = run_cli(args.iter().copied());
    assert_eq!(output.exit_code, Some(ExitCode::SUCCESS));
    let stdout = output.stdout_text();
    assert!(stdout.contains("SUBCOMMANDS"), "stdout: {stdout}");
    assert!(stdout.contains("ipfs swarm peers"));
}

#[rstest]
#[case("bogus", "Error: unknown command \"bogus\"")]
#[case("swarm bogus", "Error: unknown command \"swarm bogus\"")]
#[case("swarm", "Error: 'ipfs swarm' requires a subcommand; see 'ipfs swarm --help'")]
#[case("log level", "Error: usage: ipfs log level <filter>")]
#[case("version extra", "Error: usage: ipfs version")]
fn command_line_mistakes_are_reported(
    world: RefCell<TestWorld>,
    #[case] command: &str,
    #[case] expected: &str,
) {
    let mut world = world.borrow_mut();
    world.run(command).expect("run");
    assert_eq!(world.exit_code(), Some(ExitCode::FAILURE));
    assert_eq!(world.stderr_text().trim_end(), expected);
    assert!(world.stdout_text().is_empty());
}

#[test]
fn invalid_api_flag_is_a_usage_error() {
    let output = run_cli(["ipfs", "id", "--api", "not-an-address"]);
    assert_eq!(output.exit_code, Some(ExitCode::FAILURE));
    assert!(output.stderr_text().contains("not-an-address"));
}

#[rstest]
fn local_run_reads_the_repository(world: RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    world.repo.initialise().expect("initialise");
    world.run("swarm peers").expect("run");
    assert_eq!(world.exit_code(), Some(ExitCode::SUCCESS));
    assert_eq!(world.stdout_text(), format!("{TEST_PEER}\n"));
}

#[rstest]
fn id_reports_the_repository_identity(world: RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    world.repo.initialise().expect("initialise");
    world.run("id").expect("run");
    assert_eq!(world.exit_code(), Some(ExitCode::SUCCESS));
    let report: serde_json::Value =
        serde_json::from_str(&world.stdout_text()).expect("id output is JSON");
    assert_eq!(report["ID"], TEST_PEER_ID);
    assert_eq!(report["Addresses"][0], "/ip4/127.0.0.1/tcp/5001");
}

#[rstest]
fn local_run_without_repository_fails(world: RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    world.run("id").expect("run");
    assert_eq!(world.exit_code(), Some(ExitCode::FAILURE));
    assert!(world.stderr_text().starts_with("Error: "));
}

#[rstest]
fn init_creates_the_repository_once(world: RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    world.run("init").expect("first init");
    assert_eq!(world.exit_code(), Some(ExitCode::SUCCESS));
    assert!(world.stdout_text().contains("peer identity: Qm"));
    assert!(world.repo.paths().is_initialized());

    world.run("init").expect("second init");
    assert_eq!(world.exit_code(), Some(ExitCode::FAILURE));
    assert!(world.stderr_text().contains("repository already initialised"));
}

#[rstest]
fn config_show_prints_the_document(world: RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    world.repo.initialise().expect("initialise");
    world.run("config show").expect("run");
    assert_eq!(world.exit_code(), Some(ExitCode::SUCCESS));
    assert!(world.stdout_text().contains(TEST_PEER_ID));
}

#[rstest]
fn commands_lists_every_command(world: RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    world.run("commands").expect("run");
    let stdout = world.stdout_text();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.first(), Some(&"ipfs"));
    assert!(lines.contains(&"ipfs swarm peers"));
    assert!(lines.contains(&"ipfs diag cmds"));
}

#[rstest]
fn advertised_daemon_receives_the_command(world: RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    world.repo.initialise().expect("initialise");
    world
        .start_daemon(CannedResponse::ok("/ip4/192.0.2.7/tcp/4001\n"))
        .expect("daemon");
    world.run("swarm peers").expect("run");
    assert_eq!(world.exit_code(), Some(ExitCode::SUCCESS));
    assert_eq!(world.stdout_text(), "/ip4/192.0.2.7/tcp/4001\n");
    assert_eq!(world.requests, ["/api/v0/swarm/peers"]);
}

#[rstest]
fn remote_arguments_travel_in_the_query(world: RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    world.repo.initialise().expect("initialise");
    world
        .start_daemon(CannedResponse::ok("Changed log filter to 'ipfs=debug'\n"))
        .expect("daemon");
    world.run("log level ipfs=debug").expect("run");
    assert_eq!(world.exit_code(), Some(ExitCode::SUCCESS));
    assert_eq!(world.requests, ["/api/v0/log/level?arg=ipfs%3Ddebug"]);
}

#[rstest]
fn remote_errors_surface_the_daemon_message(world: RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    world.repo.initialise().expect("initialise");
    world
        .start_daemon(CannedResponse::error(500, "datastore unavailable"))
        .expect("daemon");
    world.run("swarm peers").expect("run");
    assert_eq!(world.exit_code(), Some(ExitCode::FAILURE));
    assert_eq!(world.stderr_text().trim_end(), "Error: datastore unavailable");
    assert!(world.stdout_text().is_empty());
}

#[rstest]
fn dead_daemon_falls_back_to_local_execution(world: RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    world.repo.initialise().expect("initialise");
    world.advertise_dead_daemon().expect("advertise");
    world.run("swarm peers").expect("run");
    assert_eq!(world.exit_code(), Some(ExitCode::SUCCESS));
    assert_eq!(world.stdout_text(), format!("{TEST_PEER}\n"));
}

#[rstest]
fn explicit_api_never_falls_back(world: RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    world.repo.initialise().expect("initialise");
    let dead = crate::tests::support::unreachable_address().expect("address");
    world.explicit_api = Some(dead.to_string());
    world.run("swarm peers").expect("run");
    assert_eq!(world.exit_code(), Some(ExitCode::FAILURE));
    assert!(
        world
            .stderr_text()
            .starts_with(&format!("Error: failed to connect to daemon at {dead}")),
        "stderr: {}",
        world.stderr_text()
    );
}

#[rstest]
fn daemon_only_command_needs_a_daemon(world: RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    world.repo.initialise().expect("initialise");
    world.run("diag cmds").expect("run");
    assert_eq!(world.exit_code(), Some(ExitCode::FAILURE));
    assert_eq!(
        world.stderr_text().trim_end(),
        "Error: command must be run on the daemon: [diag cmds]"
    );
}

#[rstest]
fn client_only_command_rejects_explicit_api(world: RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    world.repo.initialise().expect("initialise");
    world.explicit_api = Some(String::from("/ip4/127.0.0.1/tcp/5001"));
    world.run("repo fsck").expect("run");
    assert_eq!(world.exit_code(), Some(ExitCode::FAILURE));
    assert_eq!(
        world.stderr_text().trim_end(),
        "Error: api flag specified but command cannot be run on the daemon"
    );
}

#[rstest]
fn repo_fsck_removes_a_stale_record(world: RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    world.repo.initialise().expect("initialise");
    world.advertise_dead_daemon().expect("advertise");
    world.run("repo fsck").expect("run");
    assert_eq!(world.exit_code(), Some(ExitCode::SUCCESS));
    assert!(world.stdout_text().starts_with("Removed stale API record"));
    assert!(!world.repo.paths().api_path().exists());
}

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

/// Runs the binary inside the snapshot's directory with home and XDG paths
/// pointed there too, so no config or `.env` from the host is picked up.
fn run_ridedesk(snapshot: &Path, args: &[&str]) -> Output {
    let workdir = snapshot.parent().expect("snapshot path has a parent");

    let mut command = Command::new(env!("CARGO_BIN_EXE_ridedesk"));
    for (key, _) in std::env::vars_os() {
        if key.to_string_lossy().starts_with("RIDEDESK") {
            command.env_remove(&key);
        }
    }

    command
        .arg("--snapshot")
        .arg(snapshot)
        .args(args)
        .current_dir(workdir)
        .env("HOME", workdir)
        .env("XDG_CONFIG_HOME", workdir.join(".config"))
        .env("XDG_DATA_HOME", workdir.join(".local/share"))
        .env("NO_COLOR", "1")
        .env("RUST_LOG", "error")
        .output()
        .expect("Failed to execute ridedesk command")
}

fn run_json(snapshot: &Path, args: &[&str]) -> Value {
    let mut full = vec!["--format", "json"];
    full.extend_from_slice(args);
    let output = run_ridedesk(snapshot, &full);
    assert!(
        output.status.success(),
        "command {:?} failed: {}",
        args,
        stderr_to_string(&output)
    );
    serde_json::from_slice(&output.stdout).expect("command should print JSON")
}

fn output_to_string(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr_to_string(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn create(snapshot: &Path, user_id: &str, user_type: &str, message: Option<&str>) -> Value {
    let mut args = vec![
        "sessions",
        "create",
        "--user-id",
        user_id,
        "--user-name",
        "Test User",
        "--user-type",
        user_type,
    ];
    if let Some(m) = message {
        args.push("--message");
        args.push(m);
    }
    run_json(snapshot, &args)
}

mod general_tests {
    use super::*;

    #[test]
    fn test_version_flag() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_ridedesk(&dir.path().join("chat.json"), &["--version"]);

        assert!(output.status.success());
        assert!(output_to_string(&output).contains("ridedesk 0.1.0"));
    }

    #[test]
    fn test_help_lists_commands() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_ridedesk(&dir.path().join("chat.json"), &["--help"]);
        let stdout = output_to_string(&output);

        assert!(output.status.success());
        for command in ["roster", "stats", "sessions", "watch", "config"] {
            assert!(stdout.contains(command), "help should mention {}", command);
        }
    }

    #[test]
    fn test_roster_uses_builtin_agents() {
        let dir = tempfile::tempdir().unwrap();
        let agents = run_json(&dir.path().join("chat.json"), &["roster"]);

        let agents = agents.as_array().unwrap();
        assert_eq!(agents.len(), 4);
        assert_eq!(agents[0]["id"], "agent-rider-1");
        assert_eq!(agents[0]["activeChats"], 0);
        assert_eq!(agents[0]["status"], "available");
    }

    #[test]
    fn test_config_reports_snapshot_override() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("override.json");
        let config = run_json(&snapshot, &["config"]);

        assert_eq!(
            config["storage"]["snapshot_path"],
            snapshot.display().to_string()
        );
        assert_eq!(config["roster"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_roster_reads_config_from_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ridedesk.toml"),
            r#"
[[roster]]
id = "night-rider"
name = "Nadia"
user_type = "rider"
max_chats = 2
"#,
        )
        .unwrap();

        let agents = run_json(&dir.path().join("chat.json"), &["roster"]);
        let agents = agents.as_array().unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0]["id"], "night-rider");
        assert_eq!(agents[0]["maxChats"], 2);
    }

    #[test]
    fn test_roster_text_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_ridedesk(&dir.path().join("chat.json"), &["roster"]);
        let stdout = output_to_string(&output);

        assert!(output.status.success());
        assert!(stdout.contains("Agent Roster"));
        assert!(stdout.contains("agent-driver-1"));
    }
}

mod session_flow_tests {
    use super::*;

    #[test]
    fn test_full_conversation_persists_between_runs() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("chat.json");

        let session = create(&snapshot, "rider-42", "rider", Some("driver took a detour"));
        let id = session["id"].as_str().unwrap().to_string();
        assert_eq!(session["status"], "connected");
        assert_eq!(session["agentId"], "agent-rider-1");
        assert!(snapshot.exists());

        let message = run_json(
            &snapshot,
            &["sessions", "send", &id, "Let me check the route", "--sender", "agent"],
        );
        assert_eq!(message["id"], 2);
        assert_eq!(message["sender"], "agent");

        let shown = run_json(&snapshot, &["sessions", "show", &id]);
        assert_eq!(shown["messages"].as_array().unwrap().len(), 2);
        assert_eq!(shown["lastMessage"], "Let me check the route");

        let closed = run_json(&snapshot, &["sessions", "close", &id]);
        assert_eq!(closed["status"], "closed");

        let stats = run_json(&snapshot, &["stats"]);
        assert_eq!(stats["stats"]["total"], 1);
        assert_eq!(stats["stats"]["closed"], 1);
        assert_eq!(stats["revision"], 3);

        let agents = run_json(&snapshot, &["roster"]);
        assert_eq!(agents[0]["activeChats"], 0);
    }

    #[test]
    fn test_waiting_sessions_and_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("chat.json");

        // agent-driver-1 and agent-driver-2 each take two chats.
        let mut ids = Vec::new();
        for i in 0..5 {
            let s = create(&snapshot, &format!("driver-{}", i), "driver", None);
            ids.push(s["id"].as_str().unwrap().to_string());
        }

        let waiting = run_json(&snapshot, &["sessions", "list", "--status", "waiting"]);
        let waiting = waiting.as_array().unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0]["id"], ids[4].as_str());

        run_json(&snapshot, &["sessions", "close", &ids[0]]);
        let swept = run_json(&snapshot, &["sessions", "sweep"]);
        assert_eq!(swept["assigned"], 1);
        assert_eq!(swept["waiting"], 0);

        let by_agent = run_json(
            &snapshot,
            &["sessions", "list", "--agent", "agent-driver-1", "--status", "connected"],
        );
        assert_eq!(by_agent.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_list_filters_by_user_type() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("chat.json");

        create(&snapshot, "r-1", "rider", None);
        create(&snapshot, "d-1", "driver", None);

        let riders = run_json(&snapshot, &["sessions", "list", "--user-type", "rider"]);
        let riders = riders.as_array().unwrap();
        assert_eq!(riders.len(), 1);
        assert_eq!(riders[0]["userType"], "rider");
    }
}

mod error_tests {
    use super::*;

    #[test]
    fn test_show_unknown_session_fails() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_ridedesk(
            &dir.path().join("chat.json"),
            &["sessions", "show", "does-not-exist"],
        );
        let stderr = stderr_to_string(&output);

        assert!(!output.status.success());
        assert_eq!(output.status.code(), Some(1));
        assert!(stderr.contains("Error"));
        assert!(stderr.contains("E1001"));
        assert!(stderr.contains("Suggestion"));
    }

    #[test]
    fn test_blank_message_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("chat.json");
        let session = create(&snapshot, "r-1", "rider", None);
        let id = session["id"].as_str().unwrap();

        let output = run_ridedesk(&snapshot, &["sessions", "send", id, "   "]);
        assert!(!output.status.success());
        assert!(stderr_to_string(&output).contains("E3001"));
    }

    #[test]
    fn test_send_to_closed_session_fails() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("chat.json");
        let session = create(&snapshot, "r-1", "rider", None);
        let id = session["id"].as_str().unwrap();

        run_json(&snapshot, &["sessions", "close", id]);
        let output = run_ridedesk(&snapshot, &["sessions", "send", id, "hello?"]);

        assert!(!output.status.success());
        assert!(stderr_to_string(&output).contains("E1002"));
    }

    #[test]
    fn test_unknown_user_type_fails() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_ridedesk(
            &dir.path().join("chat.json"),
            &[
                "sessions",
                "create",
                "--user-id",
                "x",
                "--user-name",
                "X",
                "--user-type",
                "courier",
            ],
        );

        assert!(!output.status.success());
        assert!(stderr_to_string(&output).contains("rider, driver"));
    }

    #[test]
    fn test_corrupt_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("chat.json");
        std::fs::write(&snapshot, "{ broken").unwrap();

        let output = run_ridedesk(&snapshot, &["stats"]);
        assert!(!output.status.success());
        assert!(stderr_to_string(&output).contains("E4003"));
        assert_eq!(std::fs::read_to_string(&snapshot).unwrap(), "{ broken");
    }
}

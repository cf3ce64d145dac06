use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

fn mlitwatch_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mlitwatch"));
    cmd.env("HOME", home);
    cmd.env_remove("MLITWATCH_CONFIG");
    cmd.env_remove("MLITWATCH_TARGET_URL");
    cmd.env_remove("MLITWATCH_SNAPSHOT_DIR");
    cmd.env_remove("MLITWATCH_REPORT_DIR");
    cmd.env_remove("MLITWATCH_ANALYSIS_MODEL");
    cmd.env_remove("MLITWATCH_ANALYSIS_MAX_TOKENS");
    cmd.env_remove("MLITWATCH_ANALYSIS_EXCERPT_CHARS");
    cmd.env_remove("MLITWATCH_NOTIFY_ENABLED");
    cmd.env_remove("CLAUDE_API_KEY");
    cmd.env_remove("SLACK_WEBHOOK_URL");
    cmd
}

fn run_monitor(home: &Path, url: &str, extra_args: &[&str]) -> Output {
    let mut cmd = mlitwatch_cmd(home);
    cmd.env("MLITWATCH_TARGET_URL", url);
    cmd.env("MLITWATCH_SNAPSHOT_DIR", home.join("data/snapshots"));
    cmd.env("MLITWATCH_REPORT_DIR", home.join("data/reports"));
    cmd.args(["run", "--json"]);
    cmd.args(extra_args);
    cmd.output().expect("run mlitwatch")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home = std::env::temp_dir().join(format!(
        "mlitwatch-lifecycle-test-{}-{seq}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

/// 監視対象ページのスタブ。与えた本文を1リクエストずつ順番に返す。
fn serve_bodies(bodies: Vec<&'static str>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    std::thread::spawn(move || {
        for body in bodies {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut buf = [0_u8; 8192];
            let _ = stream.read(&mut buf);
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    format!("http://{addr}/page")
}

fn snapshot_count(home: &Path) -> usize {
    let dir = home.join("data/snapshots");
    if !dir.exists() {
        return 0;
    }
    std::fs::read_dir(&dir)
        .expect("read snapshot dir")
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy().to_string();
            name.starts_with("snapshot-") && name.ends_with(".json")
        })
        .count()
}

fn parse_stdout(out: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&out.stdout);
    serde_json::from_str(&stdout).unwrap_or_else(|err| panic!("parse stdout: {err}: {stdout}"))
}

#[test]
fn first_run_unchanged_rerun_then_change() {
    let home = make_temp_home();
    let url = serve_bodies(vec!["PAGE_V1", "PAGE_V1", "PAGE_V2"]);

    // 初回: 履歴が空なのでスナップショットが1件できる。
    // APIキーが無いので解析はスキップされるが、終了コードは 0 のまま。
    let out = run_monitor(&home, &url, &[]);
    assert_eq!(
        out.status.code(),
        Some(0),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    let report = parse_stdout(&out);
    assert_eq!(report["outcome"], "changed_analysis_skipped");
    assert!(report["snapshot"]["captured_at_unix_nanos"].is_i64());
    assert_eq!(snapshot_count(&home), 1);
    assert!(!home.join("data/reports/latest.json").exists());

    // 同一内容の再実行: 追記ゼロ、変更なしレポートだけが更新される。
    let out = run_monitor(&home, &url, &[]);
    assert_eq!(out.status.code(), Some(0));
    let report = parse_stdout(&out);
    assert_eq!(report["outcome"], "unchanged");
    assert!(report.get("snapshot").is_none());
    assert_eq!(snapshot_count(&home), 1);

    let markdown =
        std::fs::read_to_string(home.join("data/reports/index.md")).expect("read markdown");
    assert!(markdown.contains("✨ 変更なし（前回から更新なし）"));
    let json =
        std::fs::read_to_string(home.join("data/reports/latest.json")).expect("read json");
    let value: serde_json::Value = serde_json::from_str(&json).expect("parse json");
    assert_eq!(value["analysis"]["change_detected"], false);
    assert_eq!(value["analysis"]["confidence"], "high");

    // 内容が変わると履歴が2件になる。
    let out = run_monitor(&home, &url, &[]);
    assert_eq!(out.status.code(), Some(0));
    let report = parse_stdout(&out);
    assert_eq!(report["outcome"], "changed_analysis_skipped");
    assert_eq!(snapshot_count(&home), 2);

    // 解析が未実施のサイクルではレポートは前回の「変更なし」のまま。
    let json =
        std::fs::read_to_string(home.join("data/reports/latest.json")).expect("read json");
    let value: serde_json::Value = serde_json::from_str(&json).expect("parse json");
    assert_eq!(value["analysis"]["change_detected"], false);

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn rerun_after_change_uses_new_baseline() {
    let home = make_temp_home();
    let url = serve_bodies(vec!["PAGE_V1", "PAGE_V2", "PAGE_V2"]);

    run_monitor(&home, &url, &[]);
    run_monitor(&home, &url, &[]);
    assert_eq!(snapshot_count(&home), 2);

    // 解析が失敗していても変更は永続化済みなので、再検出はされない。
    let out = run_monitor(&home, &url, &[]);
    assert_eq!(out.status.code(), Some(0));
    let report = parse_stdout(&out);
    assert_eq!(report["outcome"], "unchanged");
    assert_eq!(snapshot_count(&home), 2);

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn dry_run_persists_nothing() {
    let home = make_temp_home();
    let url = serve_bodies(vec!["PAGE_V1"]);

    let out = run_monitor(&home, &url, &["--dry-run"]);
    assert_eq!(out.status.code(), Some(0));
    let report = parse_stdout(&out);
    assert_eq!(report["outcome"], "dry_run");
    assert_eq!(snapshot_count(&home), 0);
    assert!(!home.join("data/reports").exists());

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn held_lock_rejects_run_without_appending() {
    let home = make_temp_home();
    let snapshot_dir = home.join("data/snapshots");
    std::fs::create_dir_all(&snapshot_dir).expect("create snapshot dir");
    std::fs::write(snapshot_dir.join(".lock"), "12345\n").expect("write lock");

    // ロックはページ取得より先に確認されるので、到達不能なURLでも構わない
    let out = run_monitor(&home, "http://127.0.0.1:1/page", &[]);
    assert_eq!(
        out.status.code(),
        Some(30),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert_eq!(snapshot_count(&home), 0);

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("別の監視実行が進行中です"), "stderr={stderr}");

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn lock_is_released_after_completed_run() {
    let home = make_temp_home();
    let url = serve_bodies(vec!["PAGE_V1", "PAGE_V1"]);

    let out = run_monitor(&home, &url, &[]);
    assert_eq!(out.status.code(), Some(0));
    assert!(!home.join("data/snapshots/.lock").exists());

    let out = run_monitor(&home, &url, &[]);
    assert_eq!(out.status.code(), Some(0));

    let _ = std::fs::remove_dir_all(&home);
}

use std::path::Path;
use std::process::{Command, Output};

const TOPIC: &str = r#"{
    "forum_name": "Tinkerers",
    "category_name": "Workshop",
    "board_name": "Lathes",
    "subject": "Chucks",
    "poster_name": "Alice",
    "post_time": "today",
    "topic_url": "https://forum.example/t/1",
    "posts": [{"id": 1, "subject": "Chucks", "author": "Alice", "time": "today", "body": "Hi"}]
}"#;

fn run(dir: &Path, args: &[&str]) -> Output {
    let input = dir.join("topic.json");
    std::fs::write(&input, TOPIC).unwrap();
    Command::new(env!("CARGO_BIN_EXE_topic-pdf"))
        .arg(&input)
        .arg("--trace")
        .arg("--no-remote-images")
        .args(args)
        .output()
        .unwrap()
}

/// Right ends of the ruled lines in a trace dump.
fn rule_ends(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|l| l.starts_with("line "))
        .filter_map(|l| l.split(' ').nth(3).map(str::to_string))
        .collect()
}

#[test]
fn page_size_flag_accepts_the_named_sizes() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(dir.path(), &["--page-size", "a4"]);
    assert!(out.status.success());
    let ends = rule_ends(&out);
    assert!(!ends.is_empty());
    assert!(ends.iter().all(|x| x == "195.0"), "{ends:?}");
}

#[test]
fn unknown_page_size_is_refused_by_the_parser() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(dir.path(), &["--page-size", "tabloid"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("tabloid"));
    assert!(stderr.contains("a4"), "possible values are listed: {stderr}");
}

#[test]
fn config_file_sets_options_and_flags_override_it() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("options.json");
    std::fs::write(&config, r#"{"geometry": {"size": "a5"}}"#).unwrap();
    let config = config.to_string_lossy().into_owned();

    let from_file = run(dir.path(), &["--config", &config]);
    assert!(from_file.status.success());
    assert!(rule_ends(&from_file).iter().all(|x| x == "133.0"));

    let overridden = run(dir.path(), &["--config", &config, "--page-size", "letter"]);
    assert!(overridden.status.success());
    assert!(rule_ends(&overridden).iter().all(|x| x == "200.9"));
}

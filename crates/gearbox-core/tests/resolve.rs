//! End-to-end resolution of manifests against files on disk

use gearbox_core::{
    generate, render, ErrorKind, GearOptions, KeyFilter, Manifest, OutputFormat, RenderOptions,
    Value,
};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn workspace(manifest: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "gearbox.toml", manifest);
    (dir, path)
}

#[test]
fn test_literal_environment() {
    let (_dir, manifest) = workspace(
        r#"
name = "svc"

[qa]
VAR = "hello"
"#,
    );

    let cfg = generate("qa", &manifest).unwrap();

    assert_eq!(cfg.len(), 1);
    assert_eq!(cfg["VAR"], Value::from("hello"));
}

#[test]
fn test_dotenv_text_at_sub_path() {
    let (dir, manifest) = workspace(
        r#"
name = "svc"

[qa]
var = { path = ["cfg.yaml", "db"], type = "dotenv" }
"#,
    );
    write(dir.path(), "cfg.yaml", "db: \"var=secretval\"\n");

    let cfg = generate("qa", &manifest).unwrap();

    assert_eq!(cfg["var"], Value::from("secretval"));
}

#[test]
fn test_dotenv_values_keep_dollar_signs() {
    let (dir, manifest) = workspace(
        r#"
name = "svc"

[qa]
PASS = { path = ["cfg.yaml", "db"], type = "dotenv" }
HOME_DIR = { path = "app.env" }
"#,
    );
    write(dir.path(), "cfg.yaml", "db: \"PASS=pa$word\"\n");
    write(dir.path(), "app.env", "HOME_DIR=$HOME/app\n");

    let cfg = generate("qa", &manifest).unwrap();

    assert_eq!(cfg["PASS"], Value::from("pa$word"));
    assert_eq!(cfg["HOME_DIR"], Value::from("$HOME/app"));
}

#[test]
fn test_collision_between_namespaces() {
    let (_dir, manifest) = workspace(
        r#"
name = "svc"

[qa]
token = "T"

[qa.enc]
token = "T"
"#,
    );

    let err = generate("qa", &manifest).unwrap_err();

    assert_eq!(
        err.kind,
        ErrorKind::Collision {
            name: "token".into()
        }
    );
    assert!(err.to_string().contains("token"));
}

#[test]
fn test_mixed_sources_keep_declaration_order() {
    let (dir, manifest) = workspace(
        r#"
name = "svc"

[prod]
APP_NAME = "svc"
DB_HOST = { path = ["cfg.yaml", "db"], name = "host" }
DB_PORT = { path = ["cfg.yaml", "db"], name = "port" }
API_KEY = { path = "secrets.env" }
FLAGS = { path = ["cfg.yaml", "flags"], type = "json{}" }
SETTINGS = { path = "settings.json", type = "whole" }
"#,
    );
    write(
        dir.path(),
        "cfg.yaml",
        "db:\n  host: db.internal\n  port: 5432\nflags: '{\"beta\": true, \"tiers\": [1, 2]}'\n",
    );
    write(dir.path(), "secrets.env", "API_KEY=abc123\n");
    write(dir.path(), "settings.json", r#"{"retries": 3}"#);

    let cfg = generate("prod", &manifest).unwrap();

    assert_eq!(
        cfg.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["APP_NAME", "host", "port", "API_KEY", "FLAGS", "SETTINGS"]
    );
    assert_eq!(cfg["host"], Value::from("db.internal"));
    assert_eq!(cfg["port"], Value::from("5432"));
    assert_eq!(cfg["API_KEY"], Value::from("abc123"));

    let flags = cfg["FLAGS"].as_mapping().unwrap();
    assert_eq!(flags["beta"], Value::Bool(true));
    assert_eq!(
        flags["tiers"],
        Value::Sequence(vec![Value::Integer(1), Value::Integer(2)])
    );
    assert_eq!(
        cfg["SETTINGS"].as_mapping().unwrap()["retries"],
        Value::Integer(3)
    );
}

#[test]
fn test_missing_source_file_aborts() {
    let (_dir, manifest) = workspace(
        r#"
name = "svc"

[qa]
OK = "fine"
DB = { path = "missing.yaml" }
"#,
    );

    let err = generate("qa", &manifest).unwrap_err();

    assert_eq!(err.kind, ErrorKind::Io);
    assert!(err.source_path.unwrap().ends_with("missing.yaml"));
}

#[test]
fn test_non_singular_query_fails() {
    let (dir, manifest) = workspace(
        r#"
name = "svc"

[qa]
server = { path = ["cfg.yaml", "servers[*]"] }
"#,
    );
    write(dir.path(), "cfg.yaml", "servers:\n  - name: a\n  - name: b\n");

    let err = generate("qa", &manifest).unwrap_err();

    assert_eq!(
        err.kind,
        ErrorKind::Query {
            sub_path: "servers[*]".into(),
            matches: 2
        }
    );
    assert_eq!(err.entry.as_deref(), Some("server"));
}

#[test]
fn test_serial_resolution_matches_parallel() {
    let (dir, manifest) = workspace(
        r#"
name = "svc"

[qa]
A = { path = "a.yaml" }
B = { path = "b.env" }
C = { path = "c.json" }
"#,
    );
    write(dir.path(), "a.yaml", "A: one\n");
    write(dir.path(), "b.env", "B=two\n");
    write(dir.path(), "c.json", r#"{"C": "three"}"#);

    let manifest = Manifest::load(&manifest).unwrap();
    let parallel = manifest.resolve("qa", GearOptions::default()).unwrap();
    let serial = manifest
        .resolve(
            "qa",
            GearOptions {
                parallel: false,
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(parallel, serial);
    assert_eq!(serial["C"], Value::from("three"));
}

#[test]
fn test_skip_encrypted_then_filter_and_render() {
    let (dir, manifest) = workspace(
        r#"
name = "svc"

[qa]
db_host = { path = "cfg.yaml" }
db_user = { path = "cfg.yaml" }

[qa.enc]
db_pass = { path = "secrets.yaml" }
"#,
    );
    write(dir.path(), "cfg.yaml", "db_host: localhost\ndb_user: admin\n");

    let manifest = Manifest::load(&manifest).unwrap();
    let cfg = manifest
        .resolve(
            "qa",
            GearOptions {
                skip_encrypted: true,
                ..Default::default()
            },
        )
        .unwrap();
    assert!(!cfg.contains_key("db_pass"));

    let filter = KeyFilter {
        keys: vec!["db_user".into(), "db_host".into()],
        not: Vec::new(),
        skip_encrypted: true,
    };
    let cfg = filter.apply(cfg).unwrap();
    let out = render(
        &cfg,
        &RenderOptions {
            export: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(
        out,
        "export DB_USER=\"admin\"\nexport DB_HOST=\"localhost\"\n"
    );

    let missing = KeyFilter {
        keys: vec!["db_pass".into()],
        not: Vec::new(),
        skip_encrypted: true,
    };
    let err = missing.apply(cfg.clone()).unwrap_err();
    assert!(err.help.unwrap().contains("--no-enc"));

    let raw = RenderOptions {
        format: OutputFormat::Raw,
        delimiter: Some(",".into()),
        ..Default::default()
    };
    assert_eq!(render(&cfg, &raw).unwrap(), "admin,localhost");
}

#[cfg(feature = "http")]
#[test]
fn test_http_source_next_to_local_file() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/shared/db.json")
        .with_status(200)
        .with_body(r#"{"db": {"host": "db.internal"}}"#)
        .expect(1)
        .create();

    let (dir, manifest) = workspace(&format!(
        r#"
name = "svc"

[qa]
DB_HOST = {{ path = ["{url}/shared/db.json", "db"], name = "host" }}
APP = {{ path = "local.yaml" }}
"#,
        url = server.url()
    ));
    write(dir.path(), "local.yaml", "APP: svc\n");

    let cfg = generate("qa", &manifest).unwrap();

    mock.assert();
    assert_eq!(cfg["host"], Value::from("db.internal"));
    assert_eq!(cfg["APP"], Value::from("svc"));
}

#[test]
fn test_unknown_environment() {
    let (_dir, manifest) = workspace("name = \"svc\"\n\n[qa]\nA = \"1\"\n");

    let err = generate("prod", &manifest).unwrap_err();

    assert_eq!(err.kind, ErrorKind::Schema);
    assert!(err.help.unwrap().contains("qa"));
}

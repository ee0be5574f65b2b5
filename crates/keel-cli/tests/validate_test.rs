//! End-to-end tests of the `keel validate` CLI entrypoint, run as a real
//! subprocess so exit codes and stdout/stderr framing are covered too.

use assert_cmd::Command;
use std::fs;

fn keel_cmd() -> Command {
    Command::cargo_bin("keel").expect("keel binary built")
}

#[test]
fn valid_schema_exits_zero_with_no_output() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("person.keel"),
        r#"
        model Person {
            fields {
                firstName Text @unique
            }
            operations {
                get getPerson(id)
            }
        }
        "#,
    )
    .unwrap();

    keel_cmd()
        .args(["validate", "--dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicates::str::is_empty());
}

#[test]
fn invalid_schema_exits_one_with_json_report() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("person.keel"), "model Person { fields { id Text } }").unwrap();

    keel_cmd()
        .args(["validate", "--dir"])
        .arg(dir.path())
        .assert()
        .code(1)
        .stdout(predicates::str::contains("ReservedFieldName"));
}

#[test]
fn missing_directory_exits_two() {
    keel_cmd()
        .args(["validate", "--dir", "/no/such/path/at/all"])
        .assert()
        .code(2);
}

//! End-to-end builds against an on-disk fixture repository.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

fn javelin_cmd() -> Command {
    Command::cargo_bin("javelin").unwrap()
}

/// Publish `com.fixture:lib:1.0` (a real jar plus POM) into a Maven-layout
/// directory and return the manifest snippet pointing at it.
fn publish_fixture_repo(repo: &Path) -> String {
    let dir = repo.join("com/fixture/lib/1.0");
    fs::create_dir_all(&dir).unwrap();

    let jar = fs::File::create(dir.join("lib-1.0.jar")).unwrap();
    let mut writer = zip::ZipWriter::new(jar);
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file("com/fixture/Lib.class", options).unwrap();
    writer.write_all(b"class bytes").unwrap();
    writer
        .start_file("META-INF/services/com.fixture.Spi", options)
        .unwrap();
    writer.write_all(b"com.fixture.Impl\n").unwrap();
    writer.finish().unwrap();

    fs::write(
        dir.join("lib-1.0.pom"),
        r#"<?xml version="1.0"?>
<project>
  <groupId>com.fixture</groupId>
  <artifactId>lib</artifactId>
  <version>1.0</version>
</project>
"#,
    )
    .unwrap();

    format!("file://{}", repo.display())
}

fn write_project(dir: &Path, repo_url: &str) {
    fs::write(
        dir.join("Javelin.toml"),
        format!(
            r#"
[project.app]
group = "com.example"
version = "1.0.0"
dependencies = ["com.fixture:lib:1.0"]

[repositories]
fixtures = "{repo_url}"
"#
        ),
    )
    .unwrap();
}

#[test]
fn external_classpath_resolves_from_file_repository() {
    let tmp = TempDir::new().unwrap();
    let repo_url = publish_fixture_repo(&tmp.path().join("repo"));
    write_project(tmp.path(), &repo_url);

    javelin_cmd()
        .current_dir(tmp.path())
        .args(["externalClasspath", "--machine-readable-output", "shell"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lib-1.0.jar"));
}

#[test]
fn dependency_tree_renders_coordinates() {
    let tmp = TempDir::new().unwrap();
    let repo_url = publish_fixture_repo(&tmp.path().join("repo"));
    write_project(tmp.path(), &repo_url);

    javelin_cmd()
        .current_dir(tmp.path())
        .args(["dependencyTree"])
        .assert()
        .success()
        .stdout(predicate::str::contains("com.fixture:lib:1.0"));
}

#[test]
fn missing_dependency_renders_attempt_tree() {
    let tmp = TempDir::new().unwrap();
    let repo_url = publish_fixture_repo(&tmp.path().join("repo"));
    fs::write(
        tmp.path().join("Javelin.toml"),
        format!(
            r#"
[project.app]
dependencies = ["com.fixture:ghost:9.9"]

[repositories.fixtures]
url = "{repo_url}"
authoritative = true
"#
        ),
    )
    .unwrap();

    javelin_cmd()
        .current_dir(tmp.path())
        .args(["externalClasspath"])
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("com.fixture:ghost:9.9")
                .and(predicate::str::contains("not found")),
        );
}

#[test]
fn assembly_merges_project_classes_and_dependencies() {
    let tmp = TempDir::new().unwrap();
    let repo_url = publish_fixture_repo(&tmp.path().join("repo"));
    write_project(tmp.path(), &repo_url);

    let classes = tmp.path().join("build/classes");
    fs::create_dir_all(classes.join("com/example")).unwrap();
    fs::write(classes.join("com/example/App.class"), b"app bytes").unwrap();

    let output = javelin_cmd()
        .current_dir(tmp.path())
        .args(["assembly", "--machine-readable-output", "shell"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let archive_path = String::from_utf8(output.stdout).unwrap().trim().to_string();
    assert!(archive_path.ends_with("app-assembly.jar"), "{archive_path}");

    // The archive holds both the project's classes and the dependency's.
    let file = fs::File::open(&archive_path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    assert!(names.iter().any(|n| n == "com/example/App.class"));
    assert!(names.iter().any(|n| n == "com/fixture/Lib.class"));
    assert!(names.iter().any(|n| n == "META-INF/services/com.fixture.Spi"));
}

#[test]
fn offline_resolution_uses_the_cache() {
    let tmp = TempDir::new().unwrap();
    let repo_dir = tmp.path().join("repo");
    let cache_dir = tmp.path().join("mirror");
    let repo_url = publish_fixture_repo(&repo_dir);
    fs::write(
        tmp.path().join("Javelin.toml"),
        format!(
            r#"
[project.app]
dependencies = ["com.fixture:lib:1.0"]

[repositories.fixtures]
url = "{repo_url}"
cache = "{}"
"#,
            cache_dir.display()
        ),
    )
    .unwrap();

    // First run warms the mirror.
    javelin_cmd()
        .current_dir(tmp.path())
        .args(["externalClasspath", "--machine-readable-output", "shell"])
        .assert()
        .success();

    // The upstream vanishes; offline resolution still succeeds from the
    // mirror.
    fs::remove_dir_all(&repo_dir).unwrap();
    javelin_cmd()
        .current_dir(tmp.path())
        .args(["externalClasspath", "--offline", "--machine-readable-output", "shell"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lib-1.0.jar"));
}

//! End-to-end resolution against on-disk fixture repositories.

use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};

use javelin_core::dependency::{DepScope, Dependency, DependencyExclusion, DependencyId};
use javelin_core::repository::{ChecksumPolicy, Repository};
use javelin_maven::fetcher::Fetcher;
use javelin_resolver::{resolve, resolve_with};

fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn version_dir(root: &Path, group: &str, name: &str, version: &str) -> PathBuf {
    root.join(group.replace('.', "/")).join(name).join(version)
}

/// Write a file plus its `.sha1` sidecar into a fixture repository.
fn publish(root: &Path, group: &str, name: &str, version: &str, filename: &str, content: &[u8]) {
    let dir = version_dir(root, group, name, version);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(filename), content).unwrap();
    std::fs::write(
        dir.join(format!("{filename}.sha1")),
        sha1_hex(content),
    )
    .unwrap();
}

/// Minimal POM for a fixture artifact.
fn pom_xml(group: &str, name: &str, version: &str, deps: &[(&str, &str, &str, Option<&str>)]) -> String {
    let mut xml = format!(
        "<?xml version=\"1.0\"?>\n<project>\n  <groupId>{group}</groupId>\n  <artifactId>{name}</artifactId>\n  <version>{version}</version>\n  <dependencies>\n"
    );
    for (g, n, v, scope) in deps {
        xml.push_str("    <dependency>\n");
        xml.push_str(&format!("      <groupId>{g}</groupId>\n"));
        xml.push_str(&format!("      <artifactId>{n}</artifactId>\n"));
        xml.push_str(&format!("      <version>{v}</version>\n"));
        if let Some(scope) = scope {
            xml.push_str(&format!("      <scope>{scope}</scope>\n"));
        }
        xml.push_str("    </dependency>\n");
    }
    xml.push_str("  </dependencies>\n</project>\n");
    xml
}

/// Publish a jar and its POM together.
fn publish_lib(
    root: &Path,
    group: &str,
    name: &str,
    version: &str,
    jar_content: &[u8],
    deps: &[(&str, &str, &str, Option<&str>)],
) {
    publish(root, group, name, version, &format!("{name}-{version}.jar"), jar_content);
    publish(
        root,
        group,
        name,
        version,
        &format!("{name}-{version}.pom"),
        pom_xml(group, name, version, deps).as_bytes(),
    );
}

fn cached_remote(name: &str, upstream: &Path, cache: &Path) -> Repository {
    Repository::remote(name, format!("file://{}", upstream.display()))
        .with_cache(Repository::local(format!("{name}-cache"), cache))
        .with_checksum_policy(ChecksumPolicy::Fail)
}

fn classpath_contents(resolution: &javelin_resolver::Resolution) -> Vec<Vec<u8>> {
    let mut contents: Vec<Vec<u8>> = resolution
        .classpath()
        .iter()
        .map(|p| std::fs::read(p).unwrap())
        .collect();
    contents.sort();
    contents
}

fn root_dep(group: &str, name: &str, version: &str) -> Dependency {
    Dependency::new(DependencyId::new(group, name, version))
}

#[test]
fn release_stability_and_offline_cache() {
    let upstream = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    publish_lib(upstream.path(), "some-group", "some-artifact", "1.0", b"v1.0", &[]);

    let repo = cached_remote("r1", upstream.path(), cache.path());
    let roots = [root_dep("some-group", "some-artifact", "1.0")];

    let fetcher = Fetcher::new(false).unwrap();
    let resolution = resolve(&roots, &[repo.clone()], &fetcher).unwrap();
    assert!(resolution.complete, "{}", resolution.error_report());
    assert_eq!(classpath_contents(&resolution), vec![b"v1.0".to_vec()]);

    // R1 becomes unreachable; the cache still answers.
    std::fs::remove_dir_all(upstream.path().join("some-group")).unwrap();
    let offline = Fetcher::new(true).unwrap();
    let resolution = resolve(&roots, &[repo], &offline).unwrap();
    assert!(resolution.complete, "{}", resolution.error_report());
    assert_eq!(classpath_contents(&resolution), vec![b"v1.0".to_vec()]);
}

#[test]
fn transitive_includes_older_dependency() {
    let upstream = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    publish_lib(upstream.path(), "some-group", "some-artifact", "1.0", b"v1.0", &[]);
    publish_lib(
        upstream.path(),
        "some-group",
        "some-artifact2",
        "1.1",
        b"v1.1",
        &[("some-group", "some-artifact", "1.0", None)],
    );

    let repo = cached_remote("r2", upstream.path(), cache.path());
    let roots = [root_dep("some-group", "some-artifact2", "1.1")];

    let fetcher = Fetcher::new(false).unwrap();
    let resolution = resolve(&roots, &[repo], &fetcher).unwrap();
    assert!(resolution.complete, "{}", resolution.error_report());
    assert_eq!(
        classpath_contents(&resolution),
        vec![b"v1.0".to_vec(), b"v1.1".to_vec()]
    );
}

#[test]
fn non_unique_snapshot_recheck_interval() {
    let upstream_old = tempfile::tempdir().unwrap();
    let upstream_new = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();

    for (root, content) in [
        (upstream_old.path(), b"v1.0-SNAPSHOT-1".as_slice()),
        (upstream_new.path(), b"v1.0-SNAPSHOT-2".as_slice()),
    ] {
        publish_lib(root, "snap-group", "snap-artifact", "1.0-SNAPSHOT", content, &[]);
    }

    let roots = [root_dep("snap-group", "snap-artifact", "1.0-SNAPSHOT")];
    let fetcher = Fetcher::new(false).unwrap();

    // Warm the cache from the old upstream.
    let daily = cached_remote("r3", upstream_old.path(), cache.path())
        .with_snapshot_recheck(Some(24 * 60 * 60));
    let resolution = resolve(&roots, &[daily], &fetcher).unwrap();
    assert_eq!(classpath_contents(&resolution), vec![b"v1.0-SNAPSHOT-1".to_vec()]);

    // Daily recheck: the fresh cache wins even though upstream changed.
    let daily_new = cached_remote("r3", upstream_new.path(), cache.path())
        .with_snapshot_recheck(Some(24 * 60 * 60));
    let resolution = resolve(&roots, &[daily_new], &fetcher).unwrap();
    assert_eq!(classpath_contents(&resolution), vec![b"v1.0-SNAPSHOT-1".to_vec()]);

    // Recheck 0: every resolution refetches the snapshot.
    let always = cached_remote("r3", upstream_new.path(), cache.path())
        .with_snapshot_recheck(Some(0));
    let resolution = resolve(&roots, &[always], &fetcher).unwrap();
    assert_eq!(classpath_contents(&resolution), vec![b"v1.0-SNAPSHOT-2".to_vec()]);
}

#[test]
fn unique_snapshot_pinned_by_override() {
    let repo_dir = tempfile::tempdir().unwrap();
    let group = "snap-group";
    let name = "unique-artifact";
    let version = "2.0-SNAPSHOT";

    publish(
        repo_dir.path(),
        group,
        name,
        version,
        "maven-metadata.xml",
        br#"<?xml version="1.0"?>
<metadata>
  <groupId>snap-group</groupId>
  <artifactId>unique-artifact</artifactId>
  <version>2.0-SNAPSHOT</version>
  <versioning>
    <snapshot>
      <timestamp>20190102.000000</timestamp>
      <buildNumber>2</buildNumber>
    </snapshot>
  </versioning>
</metadata>"#,
    );
    for (concrete, content) in [
        ("2.0-20190101.123456-1", b"v2.0-SNAPSHOT-1".as_slice()),
        ("2.0-20190102.000000-2", b"v2.0-SNAPSHOT-2".as_slice()),
    ] {
        publish(
            repo_dir.path(),
            group,
            name,
            version,
            &format!("{name}-{concrete}.jar"),
            content,
        );
        publish(
            repo_dir.path(),
            group,
            name,
            version,
            &format!("{name}-{concrete}.pom"),
            pom_xml(group, name, version, &[]).as_bytes(),
        );
    }

    let repo = Repository::local("r4", repo_dir.path());
    let pinned = Dependency::new(
        DependencyId::new(group, name, version).with_snapshot_version("20190101.123456-1"),
    );

    let fetcher = Fetcher::new(false).unwrap();
    let resolution = resolve(&[pinned], &[repo.clone()], &fetcher).unwrap();
    assert!(resolution.complete, "{}", resolution.error_report());
    assert_eq!(classpath_contents(&resolution), vec![b"v2.0-SNAPSHOT-1".to_vec()]);

    // Without the pin, the metadata picks the newest build.
    let unpinned = [root_dep(group, name, version)];
    let resolution = resolve(&unpinned, &[repo], &fetcher).unwrap();
    assert_eq!(classpath_contents(&resolution), vec![b"v2.0-SNAPSHOT-2".to_vec()]);
}

#[test]
fn test_scoped_transitives_stay_off_the_classpath() {
    let repo_dir = tempfile::tempdir().unwrap();
    publish_lib(repo_dir.path(), "org.testing", "testing-core", "9.9", b"testing", &[]);
    publish_lib(
        repo_dir.path(),
        "org.jline",
        "jline-terminal-jansi",
        "3.3.0",
        b"jline-terminal-jansi",
        &[("org.testing", "testing-core", "9.9", Some("test"))],
    );

    let repo = Repository::local("fixtures", repo_dir.path());
    let roots = [root_dep("org.jline", "jline-terminal-jansi", "3.3.0")];

    let fetcher = Fetcher::new(false).unwrap();
    let resolution = resolve(&roots, &[repo], &fetcher).unwrap();
    assert!(resolution.complete, "{}", resolution.error_report());

    let classpath = resolution.classpath();
    assert_eq!(classpath.len(), 1);
    assert!(classpath[0]
        .file_name()
        .unwrap()
        .to_string_lossy()
        .contains("jline-terminal-jansi-3.3.0.jar"));
}

#[test]
fn nearest_wins_then_first_declared() {
    let repo_dir = tempfile::tempdir().unwrap();
    publish_lib(repo_dir.path(), "g", "d", "1.0", b"d-1.0", &[]);
    publish_lib(repo_dir.path(), "g", "d", "2.0", b"d-2.0", &[]);
    publish_lib(repo_dir.path(), "g", "b", "1.0", b"b", &[("g", "d", "1.0", None)]);

    let repo = Repository::local("fixtures", repo_dir.path());
    // d:2.0 is a root (depth 1); b's d:1.0 sits at depth 2 and loses.
    let roots = [root_dep("g", "b", "1.0"), root_dep("g", "d", "2.0")];

    let fetcher = Fetcher::new(false).unwrap();
    let resolution = resolve(&roots, &[repo], &fetcher).unwrap();
    assert!(resolution.complete, "{}", resolution.error_report());

    let chosen = resolution
        .nodes
        .keys()
        .find(|id| id.name == "d")
        .unwrap();
    assert_eq!(chosen.version, "2.0");
    assert_eq!(resolution.conflicts.len(), 1);
    assert_eq!(resolution.conflicts.conflicts[0].requested.version, "1.0");
    assert_eq!(resolution.conflicts.conflicts[0].resolved_version, "2.0");
}

#[test]
fn exclusions_prune_transitives() {
    let repo_dir = tempfile::tempdir().unwrap();
    publish_lib(repo_dir.path(), "g", "noisy", "1.0", b"noisy", &[]);
    publish_lib(repo_dir.path(), "g", "lib", "1.0", b"lib", &[("g", "noisy", "1.0", None)]);

    let repo = Repository::local("fixtures", repo_dir.path());
    let roots = [root_dep("g", "lib", "1.0")
        .with_exclusions(vec![DependencyExclusion::of("g", "noisy")])];

    let fetcher = Fetcher::new(false).unwrap();
    let resolution = resolve(&roots, &[repo], &fetcher).unwrap();
    assert!(resolution.complete);
    assert_eq!(resolution.nodes.len(), 1);
    assert_eq!(classpath_contents(&resolution), vec![b"lib".to_vec()]);
}

#[test]
fn pom_packaging_yields_no_artifact() {
    let repo_dir = tempfile::tempdir().unwrap();
    let pom = "<?xml version=\"1.0\"?>\n<project>\n  <groupId>g</groupId>\n  <artifactId>parent</artifactId>\n  <version>1.0</version>\n  <packaging>pom</packaging>\n</project>\n";
    publish(repo_dir.path(), "g", "parent", "1.0", "parent-1.0.pom", pom.as_bytes());

    let repo = Repository::local("fixtures", repo_dir.path());
    let roots = [root_dep("g", "parent", "1.0")];

    let fetcher = Fetcher::new(false).unwrap();
    let resolution = resolve(&roots, &[repo], &fetcher).unwrap();
    assert!(resolution.complete, "{}", resolution.error_report());
    let node = resolution.nodes.values().next().unwrap();
    assert!(node.artifact.is_none());
    assert!(!node.has_error());
}

#[test]
fn failures_collected_across_branches() {
    let repo_dir = tempfile::tempdir().unwrap();
    publish_lib(
        repo_dir.path(),
        "g",
        "app",
        "1.0",
        b"app",
        &[("g", "missing-one", "1.0", None), ("g", "missing-two", "2.0", None)],
    );

    let repo = Repository::local("fixtures", repo_dir.path());
    let roots = [root_dep("g", "app", "1.0")];

    let fetcher = Fetcher::new(false).unwrap();
    let resolution = resolve(&roots, &[repo], &fetcher).unwrap();
    assert!(!resolution.complete);

    // Both failing branches are reported, not just the first.
    let failed = resolution.failed();
    assert_eq!(failed.len(), 2);
    let report = resolution.error_report();
    assert!(report.contains("g:missing-one:1.0"));
    assert!(report.contains("g:missing-two:2.0"));
    assert!(report.contains("fixtures: artifact not found"));
}

#[test]
fn authoritative_repository_stops_the_chain() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    publish_lib(second.path(), "g", "lib", "1.0", b"from-second", &[]);

    let authoritative = Repository::local("first", first.path()).authoritative();
    let fallback = Repository::local("second", second.path());

    let fetcher = Fetcher::new(false).unwrap();
    let roots = [root_dep("g", "lib", "1.0")];

    // The authoritative empty repository answers "not found" definitively.
    let resolution = resolve(&roots, &[authoritative, fallback.clone()], &fetcher).unwrap();
    assert!(!resolution.complete);
    assert!(resolution.error_report().contains("authoritative"));

    // Without the authoritative flag the chain falls through.
    let open = Repository::local("first", first.path());
    let resolution = resolve(&roots, &[open, fallback], &fetcher).unwrap();
    assert!(resolution.complete, "{}", resolution.error_report());
    assert_eq!(classpath_contents(&resolution), vec![b"from-second".to_vec()]);
}

#[test]
fn checksum_mismatch_respects_policy() {
    let upstream = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    publish_lib(upstream.path(), "g", "lib", "1.0", b"real", &[]);
    // Corrupt the jar sidecar after publishing.
    let dir = version_dir(upstream.path(), "g", "lib", "1.0");
    std::fs::write(dir.join("lib-1.0.jar.sha1"), "0000000000000000000000000000000000000000").unwrap();

    let roots = [root_dep("g", "lib", "1.0")];
    let fetcher = Fetcher::new(false).unwrap();

    let failing = cached_remote("up", upstream.path(), cache.path());
    let resolution = resolve(&roots, &[failing], &fetcher).unwrap();
    assert!(!resolution.complete);
    assert!(resolution.error_report().contains("SHA-1 mismatch"));

    let warning = cached_remote("up", upstream.path(), cache.path())
        .with_checksum_policy(ChecksumPolicy::Warn);
    let resolution = resolve(&roots, &[warning], &fetcher).unwrap();
    assert!(resolution.complete, "{}", resolution.error_report());
}

#[test]
fn id_rewrite_appends_classifier() {
    let repo_dir = tempfile::tempdir().unwrap();
    publish(
        repo_dir.path(),
        "g",
        "lib",
        "1.0",
        "lib-1.0-sources.jar",
        b"sources",
    );
    publish(
        repo_dir.path(),
        "g",
        "lib",
        "1.0",
        "lib-1.0.pom",
        pom_xml("g", "lib", "1.0", &[]).as_bytes(),
    );

    let repo = Repository::local("fixtures", repo_dir.path());
    let roots = [root_dep("g", "lib", "1.0")];

    let fetcher = Fetcher::new(false).unwrap();
    let rewrite = |id: DependencyId| id.with_classifier("sources").with_type("jar");
    let resolution = resolve_with(&roots, &[repo], &fetcher, Some(&rewrite)).unwrap();
    assert!(resolution.complete, "{}", resolution.error_report());
    assert_eq!(classpath_contents(&resolution), vec![b"sources".to_vec()]);
}

#[test]
fn scopes_recorded_on_nodes() {
    let repo_dir = tempfile::tempdir().unwrap();
    publish_lib(repo_dir.path(), "g", "rt", "1.0", b"rt", &[]);
    publish_lib(
        repo_dir.path(),
        "g",
        "lib",
        "1.0",
        b"lib",
        &[("g", "rt", "1.0", Some("runtime"))],
    );

    let repo = Repository::local("fixtures", repo_dir.path());
    let roots = [root_dep("g", "lib", "1.0")];

    let fetcher = Fetcher::new(false).unwrap();
    let resolution = resolve(&roots, &[repo], &fetcher).unwrap();
    let rt = resolution
        .nodes
        .values()
        .find(|n| n.id.name == "rt")
        .unwrap();
    assert_eq!(rt.scope, DepScope::Runtime);
}

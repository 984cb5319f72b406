//! Locking a resolution and resolving against the lock.

use cpkg::constants::LOCKFILE_NAME;
use cpkg::core::CpkgError;
use cpkg::graph::{NodeId, ResolutionEvent};
use cpkg::lockfile::GraphLockFile;
use cpkg::model::Profile;
use cpkg::test_utils::DirectoryFixture;

use super::common::{consumer, host, resolve, write_app};

#[test]
fn test_lock_round_trip_reproduces_graph() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "liba/1.0", "[requirements]\nrequires = [\"zlib/[>=1.2 <2]\"]\n").unwrap();
    fixture.add_recipe("cache", "zlib/1.2.11", "[package]\nrevision = \"r1\"\n").unwrap();
    let app = write_app(&fixture, &["liba/1.0"]);
    let config = fixture.config(&[]);
    let mut profile = Profile::default();
    profile.settings.insert("os".to_string(), "Linux".to_string());

    let first = resolve(&config, consumer(&app, profile.clone())).unwrap();
    let path = fixture.path().join(LOCKFILE_NAME);
    GraphLockFile::new(profile.clone(), first.root_reference.clone(), first.lock.clone()).save(&path).unwrap();

    // A newer zlib in range appears; the lock keeps the old one.
    fixture.add_recipe("cache", "zlib/1.2.13", "").unwrap();
    let loaded = GraphLockFile::load(&path).unwrap().unwrap();
    assert_eq!(loaded.profile, profile);
    assert_eq!(loaded.graph_lock, first.lock);

    let second = resolve(&config, consumer(&app, loaded.profile).with_lock(Some(loaded.graph_lock))).unwrap();
    let zlib = host(&second.graph, "zlib");
    assert_eq!(second.graph[zlib].reference.as_ref().unwrap().full_str(), "zlib/1.2.11#r1");
    assert_eq!(second.graph[zlib].id, first.graph[host(&first.graph, "zlib")].id);
    assert_eq!(second.lock, first.lock);
    assert!(!second.report.events().any(|event| matches!(event, ResolutionEvent::LockNodeAdded { .. })));

    // Without the lock the range moves on.
    let fresh = resolve(&config, consumer(&app, Profile::default())).unwrap();
    assert_eq!(fresh.graph[host(&fresh.graph, "zlib")].display_name(), "zlib/1.2.13");
}

#[test]
fn test_changed_revision_is_inconsistent_with_lock() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "zlib/1.2.11", "[package]\nrevision = \"r1\"\n").unwrap();
    let app = write_app(&fixture, &["zlib/1.2.11"]);
    let config = fixture.config(&[]);

    let first = resolve(&config, consumer(&app, Profile::default())).unwrap();
    fixture.add_recipe("cache", "zlib/1.2.11", "[package]\nrevision = \"r2\"\n").unwrap();

    let err = resolve(&config, consumer(&app, Profile::default()).with_lock(Some(first.lock))).unwrap_err();
    match err.downcast_ref::<CpkgError>() {
        Some(CpkgError::LockInconsistency {
            node_id,
            reason,
        }) => {
            assert_eq!(node_id, "1");
            assert!(reason.contains("r1") && reason.contains("r2"), "{reason}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_lock_grows_with_new_build_requirements() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "liba/1.0", "[requirements]\nbuild_requires = [\"cmake/3.20\"]\n").unwrap();
    fixture.add_recipe("cache", "cmake/3.20", "").unwrap();
    let app = write_app(&fixture, &["liba/1.0"]);
    let config = fixture.config(&[]);

    // Locked while build requirements were skipped.
    let first = resolve(&config, consumer(&app, Profile::default()).with_build_requires(false)).unwrap();
    assert_eq!(first.lock.nodes.len(), 2);

    let request = consumer(&app, Profile::default()).with_lock(Some(first.lock)).with_build_patterns(["missing"]);
    let second = resolve(&config, request).unwrap();
    assert_eq!(second.lock.nodes.len(), 3);
    assert!(second.report.events().any(|event| matches!(
        event,
        ResolutionEvent::LockNodeAdded { id } if *id == NodeId(2)
    )));
    let cmake = second.lock.node(NodeId(2)).unwrap();
    assert_eq!(cmake.reference.as_ref().unwrap().to_string(), "cmake/3.20");
    assert_eq!(second.lock.node(NodeId(1)).unwrap().build_requires, [NodeId(2)]);

    // Resolving against the grown lock is stable.
    let request =
        consumer(&app, Profile::default()).with_lock(Some(second.lock.clone())).with_build_patterns(["missing"]);
    let third = resolve(&config, request).unwrap();
    assert_eq!(third.lock, second.lock);
}

#[test]
fn test_unknown_lock_fields_survive_rewrite() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "zlib/1.2.11", "").unwrap();
    let app = write_app(&fixture, &["zlib/1.2.11"]);
    let first = resolve(&fixture.config(&[]), consumer(&app, Profile::default())).unwrap();

    let path = fixture.path().join(LOCKFILE_NAME);
    GraphLockFile::new(Profile::default(), first.root_reference, first.lock).save(&path).unwrap();
    let mut content = std::fs::read_to_string(&path).unwrap();
    content.push_str("\n[tooling]\ngenerator = \"ci\"\n");
    std::fs::write(&path, content).unwrap();

    let loaded = GraphLockFile::load(&path).unwrap().unwrap();
    loaded.save(&path).unwrap();
    let rewritten = std::fs::read_to_string(&path).unwrap();
    assert!(rewritten.starts_with("# Auto-generated lockfile - DO NOT EDIT"));
    assert!(rewritten.contains("[tooling]"));
    assert!(rewritten.contains("generator = \"ci\""));
}

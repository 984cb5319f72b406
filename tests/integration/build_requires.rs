//! Build requirements, profile policies and binary decisions.

use cpkg::graph::{BinaryStatus, EvalContext, ResolutionEvent};
use cpkg::model::Profile;
use cpkg::test_utils::DirectoryFixture;

use super::common::{consumer, host, names, resolve, write_app};

fn profile(content: &str) -> Profile {
    Profile::parse(content, "test-profile").unwrap()
}

#[test]
fn test_consumer_pattern_reaches_only_the_root() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "liba/1.0", "").unwrap();
    fixture.add_recipe("cache", "cmake/3.20", "").unwrap();
    let app = write_app(&fixture, &["liba/1.0"]);
    let profile = profile("[build_requires]\n\"&\" = [\"cmake/3.20\"]\n");

    let request = consumer(&app, profile).with_build_patterns(["missing"]);
    let resolution = resolve(&fixture.config(&[]), request).unwrap();
    let graph = &resolution.graph;
    let root = graph.root().unwrap();
    let liba = host(graph, "liba");

    assert_eq!(names(graph, graph.build_requires_of(root)), ["cmake/3.20"]);
    assert!(graph.build_requires_of(liba).is_empty());
    assert_eq!(graph[liba].binary, BinaryStatus::MustBuild);
    assert!(graph.find("cmake", EvalContext::BuildOf(graph[root].id)).is_some());
    assert!(graph.find("cmake", EvalContext::Host).is_none());
    assert_eq!(resolution.report.build_requires_added("app/1.0").collect::<Vec<_>>(), ["cmake/3.20"]);
}

#[test]
fn test_non_consumer_pattern_gives_each_build_its_own_tool() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "liba/1.0", "[requirements]\nrequires = [\"zlib/1.2.11\"]\n").unwrap();
    fixture.add_recipe("cache", "zlib/1.2.11", "").unwrap();
    fixture.add_recipe("cache", "ninja/1.10", "").unwrap();
    let app = write_app(&fixture, &["liba/1.0"]);
    let profile = profile("[build_requires]\n\"&!\" = [\"ninja/1.10\"]\n");

    let request = consumer(&app, profile).with_build_patterns(["missing"]);
    let resolution = resolve(&fixture.config(&[]), request).unwrap();
    let graph = &resolution.graph;

    assert!(graph.build_requires_of(graph.root().unwrap()).is_empty());
    for name in ["liba", "zlib"] {
        let node = host(graph, name);
        assert_eq!(names(graph, graph.build_requires_of(node)), ["ninja/1.10"]);
        let ninja = graph.find("ninja", EvalContext::BuildOf(graph[node].id)).unwrap();
        // The tool is built too, without picking up the rule again.
        assert!(graph.build_requires_of(ninja).is_empty());
    }
    assert_eq!(graph.len(), 5);
}

#[test]
fn test_conditional_build_requirements_follow_settings() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture
        .add_recipe(
            "cache",
            "liba/1.0",
            "[package]\nsettings = [\"os\"]\n\n[[build_requirements]]\nwhen = { os = \"Windows\" }\nrequires = [\"nasm/2.15\"]\n",
        )
        .unwrap();
    fixture.add_recipe("cache", "nasm/2.15", "").unwrap();
    let app = write_app(&fixture, &["liba/1.0"]);
    let config = fixture.config(&[]);

    let windows = consumer(&app, profile("[settings]\nos = \"Windows\"\n")).with_build_patterns(["missing"]);
    let resolution = resolve(&config, windows).unwrap();
    let liba = host(&resolution.graph, "liba");
    assert_eq!(names(&resolution.graph, resolution.graph.build_requires_of(liba)), ["nasm/2.15"]);
    let windows_id = resolution.graph[liba].package_id.clone();

    let linux = consumer(&app, profile("[settings]\nos = \"Linux\"\n")).with_build_patterns(["missing"]);
    let resolution = resolve(&config, linux).unwrap();
    let liba = host(&resolution.graph, "liba");
    assert!(resolution.graph.build_requires_of(liba).is_empty());
    // Declared settings feed the package id.
    assert!(windows_id.is_some());
    assert_ne!(resolution.graph[liba].package_id, windows_id);
}

#[test]
fn test_available_binary_skips_build_requirements() {
    let fixture = DirectoryFixture::new().unwrap();
    // cmake has no recipe anywhere: fetching it would fail.
    fixture.add_recipe("cache", "liba/1.0", "[requirements]\nbuild_requires = [\"cmake/3.20\"]\n").unwrap();
    let app = write_app(&fixture, &["liba/1.0"]);
    let config = fixture.config(&["center"]);

    let probe = resolve(&config, consumer(&app, Profile::default()).with_build_requires(false)).unwrap();
    let liba = host(&probe.graph, "liba");
    assert_eq!(probe.graph[liba].binary, BinaryStatus::Missing);
    let package_id = probe.graph[liba].package_id.clone().unwrap();

    fixture.add_binary("center", "liba/1.0", &package_id).unwrap();
    let resolution = resolve(&config, consumer(&app, Profile::default())).unwrap();
    let liba = host(&resolution.graph, "liba");
    assert_eq!(resolution.graph[liba].binary, BinaryStatus::Download);
    assert_eq!(resolution.graph[liba].binary_remote.as_deref(), Some("center"));
    assert!(resolution.graph.build_requires_of(liba).is_empty());

    fixture.add_binary("cache", "liba/1.0", &package_id).unwrap();
    let resolution = resolve(&config, consumer(&app, Profile::default())).unwrap();
    let liba = host(&resolution.graph, "liba");
    assert_eq!(resolution.graph[liba].binary, BinaryStatus::Cached);
    assert_eq!(resolution.graph[liba].binary_remote.as_deref(), Some("cache"));
}

#[test]
fn test_forced_build_expands_build_requirements() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "liba/1.0", "[requirements]\nbuild_requires = [\"cmake/3.20\"]\n").unwrap();
    fixture.add_recipe("cache", "cmake/3.20", "").unwrap();
    let app = write_app(&fixture, &["liba/1.0"]);
    let config = fixture.config(&[]);

    let probe = resolve(&config, consumer(&app, Profile::default()).with_build_requires(false)).unwrap();
    let package_id = probe.graph[host(&probe.graph, "liba")].package_id.clone().unwrap();
    fixture.add_binary("cache", "liba/1.0", &package_id).unwrap();

    let request = consumer(&app, Profile::default()).with_build_patterns(["liba"]);
    let resolution = resolve(&config, request).unwrap();
    let graph = &resolution.graph;
    let liba = host(graph, "liba");
    assert_eq!(graph[liba].binary, BinaryStatus::MustBuild);
    assert_eq!(names(graph, graph.build_requires_of(liba)), ["cmake/3.20"]);
    let cmake = graph.find("cmake", EvalContext::BuildOf(graph[liba].id)).unwrap();
    assert_eq!(graph[cmake].binary, BinaryStatus::Missing);

    assert!(!resolution.report.events().any(|event| matches!(event, ResolutionEvent::UnmatchedBuildPattern { .. })));
}

#[test]
fn test_profile_replaces_declared_tool_version() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "liba/1.0", "[requirements]\nbuild_requires = [\"cmake/3.16\"]\n").unwrap();
    fixture.add_recipe("cache", "cmake/3.20", "").unwrap();
    let app = write_app(&fixture, &["liba/1.0"]);
    let profile = profile("[build_requires]\n\"liba/*\" = [\"cmake/3.20\"]\n");

    let request = consumer(&app, profile).with_build_patterns(["missing"]);
    let resolution = resolve(&fixture.config(&[]), request).unwrap();
    let graph = &resolution.graph;
    let liba = host(graph, "liba");
    assert_eq!(names(graph, graph.build_requires_of(liba)), ["cmake/3.20"]);
}

#[test]
fn test_consumer_pattern_replaces_consumer_tool_version() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "toolX/1.0", "").unwrap();
    fixture.add_recipe("cache", "toolX/2.0", "").unwrap();
    let app = fixture
        .write(
            "app/cpkg.toml",
            "[package]\nname = \"app\"\nversion = \"1.0\"\n\n[requirements]\nbuild_requires = [\"toolX/1.0\"]\n",
        )
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf();
    let profile = profile("[build_requires]\n\"&\" = [\"toolX/2.0\"]\n");

    let resolution = resolve(&fixture.config(&[]), consumer(&app, profile)).unwrap();
    let graph = &resolution.graph;
    let root = graph.root().unwrap();
    assert_eq!(names(graph, graph.build_requires_of(root)), ["toolX/2.0"]);
    assert!(resolution.report.events().all(|event| !matches!(
        event,
        ResolutionEvent::BuildRequireAdded { reference, .. } if reference == "toolX/1.0"
    )));
}

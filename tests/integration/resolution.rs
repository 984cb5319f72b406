//! Regular requirements resolved against directory indexes.

use cpkg::core::CpkgError;
use cpkg::graph::{GraphRequest, NodeId, ResolutionEvent, RecipeKind, RootTarget};
use cpkg::model::{Profile, Reference};
use cpkg::test_utils::DirectoryFixture;

use super::common::{closure, consumer, host, names, references, resolve, write_app};

fn cpkg_error(err: &anyhow::Error) -> &CpkgError {
    err.downcast_ref::<CpkgError>().unwrap_or_else(|| panic!("not a CpkgError: {err:#}"))
}

#[test]
fn test_diamond_shares_one_node() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "liba/1.0", "[requirements]\nrequires = [\"zlib/1.2.11\"]\n").unwrap();
    fixture.add_recipe("cache", "libb/1.0", "[requirements]\nrequires = [\"zlib/1.2.11\"]\n").unwrap();
    fixture.add_recipe("cache", "zlib/1.2.11", "").unwrap();
    let app = write_app(&fixture, &["liba/1.0", "libb/1.0"]);

    let resolution = resolve(&fixture.config(&[]), consumer(&app, Profile::default())).unwrap();
    let graph = &resolution.graph;

    assert_eq!(graph.len(), 4);
    let zlib = host(graph, "zlib");
    assert_eq!(names(graph, graph.dependents(zlib)), ["liba/1.0", "libb/1.0"]);
    assert_eq!(graph[zlib].recipe_remote.as_deref(), Some("cache"));

    let root = graph.root().unwrap();
    assert_eq!(graph[root].kind, RecipeKind::Consumer);
    assert_eq!(graph[root].display_name(), "app/1.0");
    assert_eq!(resolution.root_reference, Some(Reference::new("app", "1.0")));
}

#[test]
fn test_resolution_is_idempotent() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "liba/1.0", "[requirements]\nrequires = [\"zlib/[>=1.2 <2]\"]\n").unwrap();
    fixture.add_recipe("cache", "zlib/1.2.11", "").unwrap();
    fixture.add_recipe("cache", "zlib/1.3", "").unwrap();
    let config = fixture.config(&[]);
    let request = references(&["liba/1.0"], Profile::default());

    let first = resolve(&config, request.clone()).unwrap();
    let second = resolve(&config, request).unwrap();

    assert_eq!(first.lock, second.lock);
    let describe = |resolution: &cpkg::graph::Resolution| -> Vec<(NodeId, String)> {
        let graph = &resolution.graph;
        graph.ordered_iterate(None).into_iter().map(|i| (graph[i].id, graph[i].display_name())).collect()
    };
    assert_eq!(describe(&first), describe(&second));
}

#[test]
fn test_range_picks_highest_match_across_remotes() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "A/1.0", "[requirements]\nrequires = [\"B/[>=1.0 <2.0]\"]\n").unwrap();
    fixture.add_recipe("center", "B/1.5", "").unwrap();
    fixture.add_recipe("center", "B/1.9", "").unwrap();
    fixture.add_recipe("center", "B/2.0", "").unwrap();

    let resolution =
        resolve(&fixture.config(&["center"]), references(&["A/1.0"], Profile::default())).unwrap();
    let b = host(&resolution.graph, "B");
    assert_eq!(resolution.graph[b].display_name(), "B/1.9");
    assert_eq!(resolution.graph[b].recipe_remote.as_deref(), Some("center"));

    let solved: Vec<_> = resolution.report.range_resolutions().collect();
    assert_eq!(solved, [("B/[>=1.0 <2.0]", "B/1.9")]);
}

#[test]
fn test_unsatisfiable_range() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "A/1.0", "[requirements]\nrequires = [\"B/[>=3.0]\"]\n").unwrap();
    fixture.add_recipe("cache", "B/2.0", "").unwrap();

    let err = resolve(&fixture.config(&[]), references(&["A/1.0"], Profile::default())).unwrap_err();
    match cpkg_error(&err) {
        CpkgError::NoMatchingVersion {
            requirer,
            ..
        } => assert_eq!(requirer, "A/1.0"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_conflict_names_both_sides() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "liba/1.0", "[requirements]\nrequires = [\"zlib/1.2.11\"]\n").unwrap();
    fixture.add_recipe("cache", "libb/1.0", "[requirements]\nrequires = [\"zlib/1.3\"]\n").unwrap();
    fixture.add_recipe("cache", "zlib/1.2.11", "").unwrap();
    fixture.add_recipe("cache", "zlib/1.3", "").unwrap();
    let app = write_app(&fixture, &["liba/1.0", "libb/1.0"]);

    let err = resolve(&fixture.config(&[]), consumer(&app, Profile::default())).unwrap_err();
    match cpkg_error(&err) {
        CpkgError::Conflict {
            name,
            existing,
            existing_required_by,
            requested,
            requirer,
        } => {
            assert_eq!(name, "zlib");
            assert_eq!(existing, "zlib/1.2.11");
            assert_eq!(existing_required_by, "liba/1.0");
            assert_eq!(requested, "zlib/1.3");
            assert_eq!(requirer, "libb/1.0");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_consumer_requirement_overrides_transitive_one() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "liba/1.0", "[requirements]\nrequires = [\"zlib/1.2.11\"]\n").unwrap();
    fixture.add_recipe("cache", "zlib/1.3", "").unwrap();
    let app = write_app(&fixture, &["liba/1.0", "zlib/1.3"]);

    let resolution = resolve(&fixture.config(&[]), consumer(&app, Profile::default())).unwrap();
    let graph = &resolution.graph;
    let zlib = host(graph, "zlib");
    assert_eq!(graph[zlib].display_name(), "zlib/1.3");
    assert_eq!(names(graph, graph.dependents(zlib)), ["app/1.0", "liba/1.0"]);

    assert!(resolution.report.events().any(|event| matches!(
        event,
        ResolutionEvent::RequirementOverridden { requirer, from, to }
            if requirer == "liba/1.0" && from == "zlib/1.2.11" && to == "zlib/1.3"
    )));
}

#[test]
fn test_override_entry_pins_without_requiring() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "liba/1.0", "[requirements]\nrequires = [\"zlib/1.2.11\"]\n").unwrap();
    fixture.add_recipe("cache", "libc/1.0", "").unwrap();
    fixture.add_recipe("cache", "zlib/1.3", "").unwrap();
    let app = fixture
        .write(
            "app/cpkg.toml",
            "[requirements]\nrequires = [\"liba/1.0\", { ref = \"zlib/1.3\", override = true }, \
             { ref = \"openssl/1.1.1\", override = true }, \"libc/1.0\"]\n",
        )
        .unwrap();

    let resolution = resolve(&fixture.config(&[]), consumer(&app, Profile::default())).unwrap();
    let graph = &resolution.graph;
    let root = graph.root().unwrap();

    assert_eq!(names(graph, graph.requires_of(root)), ["liba/1.0", "libc/1.0"]);
    assert_eq!(graph[host(graph, "zlib")].display_name(), "zlib/1.3");
    assert!(graph.find("openssl", cpkg::graph::EvalContext::Host).is_none());
}

#[test]
fn test_private_requirement_stays_out_of_closure() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture
        .add_recipe(
            "cache",
            "liba/1.0",
            "[requirements]\nrequires = [{ ref = \"zlib/1.2.11\", private = true }, \"fmt/9.0\"]\n",
        )
        .unwrap();
    fixture.add_recipe("cache", "zlib/1.2.11", "").unwrap();
    fixture.add_recipe("cache", "fmt/9.0", "").unwrap();
    let app = write_app(&fixture, &["liba/1.0"]);

    let resolution = resolve(&fixture.config(&[]), consumer(&app, Profile::default())).unwrap();
    let graph = &resolution.graph;
    let liba = host(graph, "liba");

    assert_eq!(closure(graph, liba), ["fmt"]);
    assert_eq!(closure(graph, graph.root().unwrap()), ["liba", "fmt"]);
    // Still in the graph, only hidden from consumers.
    assert_eq!(names(graph, graph.requires_of(liba)), ["zlib/1.2.11", "fmt/9.0"]);
}

#[test]
fn test_closure_order_follows_depth_not_declaration() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "liba/1.0", "[requirements]\nrequires = [\"zlib/1.2.11\"]\n").unwrap();
    fixture.add_recipe("cache", "zlib/1.2.11", "").unwrap();
    let config = fixture.config(&[]);

    for requires in [["zlib/1.2.11", "liba/1.0"], ["liba/1.0", "zlib/1.2.11"]] {
        let app = write_app(&fixture, &requires);
        let resolution = resolve(&config, consumer(&app, Profile::default())).unwrap();
        let graph = &resolution.graph;
        assert_eq!(closure(graph, graph.root().unwrap()), ["liba", "zlib"]);
    }
}

#[test]
fn test_cycle_is_reported_with_chain() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "A/1.0", "[requirements]\nrequires = [\"B/1.0\"]\n").unwrap();
    fixture.add_recipe("cache", "B/1.0", "[requirements]\nrequires = [\"A/1.0\"]\n").unwrap();

    let err = resolve(&fixture.config(&[]), references(&["A/1.0"], Profile::default())).unwrap_err();
    match cpkg_error(&err) {
        CpkgError::CyclicDependency {
            chain,
        } => assert_eq!(chain, "A -> B -> A"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_unknown_package_suggests_close_name() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "zlib/1.2.11", "").unwrap();

    let err = resolve(&fixture.config(&[]), references(&["zlb/1.2.11"], Profile::default())).unwrap_err();
    match cpkg_error(&err) {
        CpkgError::RecipeNotFound {
            reference,
            suggestion,
        } => {
            assert_eq!(reference, "zlb/1.2.11");
            assert_eq!(suggestion.as_deref(), Some("zlib"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_editable_package_is_loaded_from_its_folder() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "liba/1.0", "[requirements]\nrequires = [\"zlib/1.2.11\"]\n").unwrap();
    fixture.add_recipe("cache", "zlib/1.2.11", "").unwrap();
    let work = fixture
        .write("work/zlib/cpkg.toml", "[package]\nname = \"zlib\"\nversion = \"1.2.11\"\n")
        .unwrap();

    let mut config = fixture.config(&[]);
    config.editables.insert(
        "zlib/1.2.11".to_string(),
        work.parent().unwrap().display().to_string(),
    );

    let resolution = resolve(&config, references(&["liba/1.0"], Profile::default())).unwrap();
    let graph = &resolution.graph;
    let zlib = host(graph, "zlib");
    assert_eq!(graph[zlib].kind, RecipeKind::Editable);
    assert_eq!(graph[zlib].recipe_remote, None);
}

#[test]
fn test_single_reference_root() {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "zlib/1.2.11", "").unwrap();

    let request =
        GraphRequest::new(RootTarget::Reference(Reference::new("zlib", "1.2.11")), Profile::default());
    let resolution = resolve(&fixture.config(&[]), request).unwrap();
    let root = resolution.graph.root().unwrap();

    assert_eq!(resolution.graph[root].kind, RecipeKind::Virtual);
    assert_eq!(resolution.root_reference, Some(Reference::new("zlib", "1.2.11")));
    assert_eq!(names(&resolution.graph, resolution.graph.requires_of(root)), ["zlib/1.2.11"]);
}

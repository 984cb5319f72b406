//! Shared helpers: resolve against a [`DirectoryFixture`] the way the CLI does.

use anyhow::Result;
use cpkg::config::GlobalConfig;
use cpkg::graph::{
    DepsGraph, EvalContext, GraphManager, GraphRequest, PackageIdAnalyzer, Resolution, RootTarget,
};
use cpkg::loader::TomlRecipeLoader;
use cpkg::model::{Profile, Reference};
use cpkg::test_utils::DirectoryFixture;
use petgraph::graph::NodeIndex;
use std::path::Path;

pub fn resolve(config: &GlobalConfig, request: GraphRequest) -> Result<Resolution> {
    let registry = config.registry()?;
    let loader = TomlRecipeLoader::new();
    let analyzer = PackageIdAnalyzer::new(request.profile.clone(), config.package_id_mode);
    GraphManager::new(&loader, &registry, &analyzer)
        .with_editables(config.editable_paths()?)
        .with_revisions(config.revisions_enabled)
        .load_graph(request)
}

/// Request for the consumer recipe in `folder`.
pub fn consumer(folder: &Path, profile: Profile) -> GraphRequest {
    GraphRequest::new(RootTarget::Path(folder.to_path_buf()), profile)
}

/// Request for a virtual root requiring `references`.
pub fn references(references: &[&str], profile: Profile) -> GraphRequest {
    let references = references.iter().map(|text| Reference::parse(text).unwrap()).collect();
    GraphRequest::new(RootTarget::References(references), profile)
}

/// Write a consumer recipe `app/1.0` requiring `requires` under `app/`.
pub fn write_app(fixture: &DirectoryFixture, requires: &[&str]) -> std::path::PathBuf {
    let requires: Vec<String> = requires.iter().map(|r| format!("\"{r}\"")).collect();
    let content = format!(
        "[package]\nname = \"app\"\nversion = \"1.0\"\n\n[requirements]\nrequires = [{}]\n",
        requires.join(", ")
    );
    let file = fixture.write("app/cpkg.toml", &content).unwrap();
    file.parent().unwrap().to_path_buf()
}

pub fn host(graph: &DepsGraph, name: &str) -> NodeIndex {
    graph.find(name, EvalContext::Host).unwrap_or_else(|| panic!("no host node named {name}"))
}

pub fn names(graph: &DepsGraph, nodes: Vec<NodeIndex>) -> Vec<String> {
    nodes.into_iter().map(|index| graph[index].display_name()).collect()
}

pub fn closure(graph: &DepsGraph, index: NodeIndex) -> Vec<String> {
    graph[index].public_closure.keys().cloned().collect()
}

//! Behaviour-driven tests for publishing manifests and discovering versions.
//!
//! Publishing scenarios build a manifest from files in a scratch working
//! directory and store it in a directory repository. Discovery scenarios run
//! `check` against a scratch git repository and are skipped when `git` is
//! not installed.

use std::fs;
use std::path::{Path, PathBuf};

use metalink_common::testing::{
    FIRST_FILE, RepositoryGenerator, SECOND_FILE, git_available,
};
use metalink_common::{Manifest, parse_manifest};
use metalink_resource::check::check;
use metalink_resource::config::{MirrorFileConfig, Source};
use metalink_resource::error::ResourceError;
use metalink_resource::publish::publish;
use metalink_resource::request::{CheckRequest, OutParams, OutRequest, OutResponse, VersionRef};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Map, Value};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// World types
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PublishWorld {
    workdir: Option<TempDir>,
    mirror_templates: Vec<String>,
    rename: Option<String>,
    published: Option<Result<OutResponse, ResourceError>>,
    stored: Option<Manifest>,
    // Keep the repository and its cache alive for the lifetime of the
    // scenario.
    repository: Option<RepositoryGenerator>,
    cache: Option<TempDir>,
    current: Option<String>,
    versions: Option<Vec<VersionRef>>,
    skip_assertions: bool,
}

impl PublishWorld {
    fn workdir(&self) -> &Path {
        self.workdir.as_ref().expect("working directory set").path()
    }

    fn repository_dir(&self) -> PathBuf {
        self.workdir().join("repo")
    }

    fn response(&self) -> &OutResponse {
        match self.published.as_ref().expect("publish attempted") {
            Ok(response) => response,
            Err(err) => panic!("publish failed: {err}"),
        }
    }

    fn stored(&self) -> &Manifest {
        self.stored.as_ref().expect("stored manifest read")
    }
}

#[fixture]
fn world() -> PublishWorld {
    PublishWorld::default()
}

fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent dir");
    }
    fs::write(path, contents).expect("write file");
}

// ---------------------------------------------------------------------------
// Publishing steps
// ---------------------------------------------------------------------------

#[given("a working directory with two release files at version \"{version}\"")]
fn given_release_files(world: &mut PublishWorld, version: String) {
    let workdir = tempfile::tempdir().expect("working dir");
    let build = workdir.path().join("build");
    write_file(&build.join(FIRST_FILE.name), FIRST_FILE.contents);
    write_file(&build.join(SECOND_FILE.name), SECOND_FILE.contents);
    write_file(&build.join("version"), format!("{version}\n").as_bytes());
    world.workdir = Some(workdir);
}

#[given("a mirror destination \"{template}\"")]
fn given_mirror(world: &mut PublishWorld, template: String) {
    world.mirror_templates.push(template);
}

#[given("the manifest is renamed to \"{template}\"")]
fn given_rename(world: &mut PublishWorld, template: String) {
    world.rename = Some(template);
}

#[when("the files are published")]
fn when_published(world: &mut PublishWorld) {
    let mut source = Source::new(format!("file://{}", world.repository_dir().display()));
    source.mirror_files = world
        .mirror_templates
        .iter()
        .map(|template| MirrorFileConfig {
            destination: format!("file://{}/{template}", world.workdir().display()),
            ..MirrorFileConfig::default()
        })
        .collect();
    let request = OutRequest {
        source,
        params: OutParams {
            files: vec!["build/*.txt".to_owned()],
            version: Some("build/version".to_owned()),
            rename: world.rename.clone(),
            ..OutParams::default()
        },
    };
    let outcome = publish(&request, world.workdir());
    world.published = Some(outcome);
}

#[then("the response version is \"{version}\"")]
fn then_response_version(world: &mut PublishWorld, version: String) {
    assert_eq!(world.response().version.version, version);
}

#[then("the stored manifest \"{name}\" lists {count} files")]
fn then_stored_manifest(world: &mut PublishWorld, name: String, count: String) {
    let _ = world.response();
    let expected: usize = count.parse().expect("file count");
    let bytes = fs::read(world.repository_dir().join(&name)).expect("stored manifest");
    let manifest = parse_manifest(&bytes).expect("parses");
    assert_eq!(manifest.files.len(), expected);
    world.stored = Some(manifest);
}

#[then("every stored file has {count} location")]
fn then_location_count(world: &mut PublishWorld, count: String) {
    let expected: usize = count.parse().expect("location count");
    for file in &world.stored().files {
        assert_eq!(file.locations.len(), expected, "locations of {}", file.name);
    }
}

#[then("every stored location exists")]
fn then_locations_exist(world: &mut PublishWorld) {
    for file in &world.stored().files {
        for location in &file.locations {
            let path = location
                .url
                .strip_prefix("file://")
                .expect("file location");
            assert!(Path::new(path).exists(), "{path} should exist");
        }
    }
}

// ---------------------------------------------------------------------------
// Discovery steps
// ---------------------------------------------------------------------------

#[given("a git repository with component versions")]
fn given_git_repository(world: &mut PublishWorld) {
    if !git_available() {
        world.skip_assertions = true;
        rstest_bdd::skip!("git is not installed");
    }
    world.repository = Some(RepositoryGenerator::with_component_versions().expect("repository"));
    world.cache = Some(tempfile::tempdir().expect("cache dir"));
}

#[given("the current version is \"{version}\"")]
fn given_current_version(world: &mut PublishWorld, version: String) {
    world.current = Some(version);
}

#[when("the repository is checked")]
fn when_checked(world: &mut PublishWorld) {
    if world.skip_assertions {
        return;
    }
    let repository = world.repository.as_ref().expect("repository set");
    let cache = world.cache.as_ref().expect("cache set");
    let mut source = Source::new(format!(
        "git+file://{}//component",
        repository.path().display()
    ));
    let mut options = Map::new();
    options.insert(
        "cache_dir".to_owned(),
        Value::String(cache.path().display().to_string()),
    );
    source.options = options;
    let request = CheckRequest {
        source,
        version: world.current.clone().map(VersionRef::new),
    };
    world.versions = Some(check(&request).expect("check succeeds"));
}

#[then("the reported versions are \"{expected}\"")]
fn then_reported_versions(world: &mut PublishWorld, expected: String) {
    if world.skip_assertions {
        return;
    }
    let reported: Vec<&str> = world
        .versions
        .as_ref()
        .expect("check ran")
        .iter()
        .map(|v| v.version.as_str())
        .collect();
    assert_eq!(reported.join(", "), expected);
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/publish.feature",
    name = "Publish files to a content-addressed mirror"
)]
fn scenario_publish_to_mirror(world: PublishWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/publish.feature",
    name = "Publish under a custom name"
)]
fn scenario_publish_renamed(world: PublishWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/publish.feature",
    name = "Check a git repository without a current version"
)]
fn scenario_check_latest(world: PublishWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/publish.feature",
    name = "Check a git repository from a current version"
)]
fn scenario_check_from_current(world: PublishWorld) {
    let _ = world;
}

//! Republishing a fetched manifest.
//!
//! `in` leaves the manifest it fetched under `.resource/metalink.meta4`;
//! feeding that file back to `out` must keep every file's hashes, whether
//! the bytes are stored as-is or re-serialized after mirroring.

use std::fs;
use std::path::{Path, PathBuf};

use metalink_common::testing::FIXTURE_FILES;
use metalink_common::{HashAlgorithm, Manifest, ManifestFile, parse_manifest, write_manifest};
use metalink_resource::config::{MirrorFileConfig, Source as SourceConfig};
use metalink_resource::download::{MANIFEST_FILE, METADATA_DIR, fetch_from};
use metalink_resource::mirror::RetryPolicy;
use metalink_resource::publish::publish_to;
use metalink_resource::request::{InParams, InRequest, OutParams, OutRequest, VersionRef};
use metalink_resource::source::FileSource;
use rstest::rstest;
use tempfile::TempDir;

const VERSION: &str = "1.4.0";

struct Scratch {
    dir: TempDir,
}

impl Scratch {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("scratch dir");
        for sub in ["staged", "origin", "fetched", "published"] {
            fs::create_dir_all(dir.path().join(sub)).expect("scratch subdir");
        }
        Self { dir }
    }

    fn join(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Stage the fixture files and store a manifest listing every hash
    /// algorithm for each of them in the origin repository.
    fn release(&self) -> Manifest {
        let staged = self.join("staged");
        let mut manifest = Manifest::default();
        for fixture in FIXTURE_FILES {
            let path = fixture.write_into(&staged).expect("staged file");
            let mut file = fixture.manifest_entry(VERSION, &format!("file://{}", path.display()));
            for algorithm in HashAlgorithm::STRONGEST_FIRST {
                file.set_hash(algorithm, algorithm.digest_bytes(fixture.contents));
            }
            manifest.files.push(file);
        }
        let bytes = write_manifest(&manifest).expect("serializes");
        fs::write(self.join(&format!("origin/v{VERSION}.meta4")), bytes)
            .expect("origin manifest");
        manifest
    }

    fn fetch(&self) {
        let request = InRequest {
            source: SourceConfig::new("file:///origin"),
            version: VersionRef::new(VERSION),
            params: InParams::default(),
        };
        let mut origin = FileSource::new("file:///origin", self.join("origin"));
        fetch_from(&request, &mut origin, &self.join("fetched"), &mut Vec::new())
            .expect("fetches");
    }

    fn republish(&self, source: SourceConfig) -> Manifest {
        let params = OutParams {
            metalink: Some(format!("{METADATA_DIR}/{MANIFEST_FILE}")),
            ..OutParams::default()
        };
        let mut published = FileSource::new("file:///published", self.join("published"));
        let response = publish_to(
            &OutRequest { source, params },
            &self.join("fetched"),
            &mut published,
            &RetryPolicy::immediate(3),
        )
        .expect("republishes");
        assert_eq!(response.version.version, VERSION);
        read_manifest(&self.published_manifest())
    }

    fn published_manifest(&self) -> PathBuf {
        self.join(&format!("published/v{VERSION}.meta4"))
    }
}

fn read_manifest(path: &Path) -> Manifest {
    parse_manifest(&fs::read(path).expect("manifest bytes")).expect("parses")
}

fn assert_same_hashes(expected: &Manifest, actual: &Manifest) {
    assert_eq!(actual.files.len(), expected.files.len());
    for file in &expected.files {
        let republished: &ManifestFile = actual.file(&file.name).expect("file kept");
        assert_eq!(republished.size, file.size, "{}", file.name);
        for algorithm in HashAlgorithm::STRONGEST_FIRST {
            assert_eq!(
                republished.hash(algorithm),
                file.hash(algorithm),
                "{} {}",
                file.name,
                algorithm.name()
            );
        }
    }
}

#[rstest]
#[case::stored_verbatim(false)]
#[case::reserialized_after_mirroring(true)]
fn fetched_manifest_republishes_with_identical_hashes(#[case] mirrored: bool) {
    let scratch = Scratch::new();
    let release = scratch.release();
    scratch.fetch();
    let fetched_path = scratch.join(&format!("fetched/{METADATA_DIR}/{MANIFEST_FILE}"));
    let fetched = read_manifest(&fetched_path);
    assert_same_hashes(&release, &fetched);

    let mirror_dir = scratch.join("mirror");
    let mut source = SourceConfig::new("file:///published");
    if mirrored {
        source.mirror_files = vec![MirrorFileConfig {
            destination: format!("file://{}/{{{{.Name}}}}", mirror_dir.display()),
            ..MirrorFileConfig::default()
        }];
    }
    let republished = scratch.republish(source);

    assert_same_hashes(&release, &republished);
    if mirrored {
        for file in &republished.files {
            assert_eq!(file.locations.len(), 2, "{}", file.name);
            let copy = fs::read(mirror_dir.join(&file.name)).expect("mirrored copy");
            assert_eq!(
                file.hash(HashAlgorithm::Sha512),
                Some(HashAlgorithm::Sha512.digest_bytes(&copy).as_str())
            );
        }
    } else {
        let stored = fs::read(scratch.published_manifest()).expect("stored");
        assert_eq!(stored, fs::read(&fetched_path).expect("fetched bytes"));
    }
}

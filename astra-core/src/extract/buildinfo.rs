//! Debian `.buildinfo` extractor.
//!
//! A buildinfo document is scanned line by line. Scalar fields are captured
//! wherever they appear; four sections are entered by a header and left on a
//! blank line (or, for the signature, its END marker):
//!
//! ```text
//! Source: hello
//! Version: 2.10-3
//! Checksums-Sha256:
//!  5f2a...  52832 hello_2.10-3_amd64.deb
//! Installed-Build-Depends:
//!  autoconf (= 2.71-3),
//!  libc6 (= 2.36-9),
//! Environment:
//!  DEB_BUILD_OPTIONS="parallel=4"
//!
//! -----BEGIN PGP SIGNATURE-----
//! ...
//! -----END PGP SIGNATURE-----
//! ```
//!
//! Lines that do not parse contribute nothing; only an unreadable file fails.

use super::Extractor;
use super::signature::{self, BEGIN_SIGNATURE, END_SIGNATURE};
use crate::config::BuildinfoConfig;
use crate::error::ExtractError;
use crate::record::{Item, Record, RecordStream};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

/// `name (= version)` pairs in a dependency list.
static DEPENDENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z0-9.+:~\-]+) \(= ([^\)]+)\)").expect("dependency pattern"));

const PACKAGE_SUFFIXES: [&str; 3] = [".deb", ".udeb", ".ddeb"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Checksums,
    Depends,
    Environment,
    Signature,
}

/// A binary package listed under `Checksums-Sha256`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    pub hash: String,
    pub size: u64,
    pub filename: String,
}

/// An exact `name (= version)` build dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub version: String,
}

impl Dependency {
    pub fn id(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

/// The fields of one buildinfo document the extractor cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buildinfo {
    pub source: String,
    pub version: String,
    pub architecture: String,
    pub date: String,
    pub origin: String,
    pub binaries: Vec<Binary>,
    /// Distinct dependencies in order of first appearance.
    pub dependencies: Vec<Dependency>,
    pub environment: BTreeMap<String, String>,
    /// Armored signature lines, BEGIN and END markers included.
    pub signature: Vec<String>,
}

impl Buildinfo {
    /// Version truncated at the first `-`.
    pub fn upstream_version(&self) -> &str {
        self.version.split('-').next().unwrap_or_default()
    }

    /// `<source>_<upstream>.orig.tar.xz`
    pub fn tarball(&self) -> String {
        format!("{}_{}.orig.tar.xz", self.source, self.upstream_version())
    }

    pub fn step_id(&self) -> String {
        format!("build-{}@{}", self.source, self.version)
    }

    /// First signing key ID, if the signature block decodes.
    pub fn signing_key(&self) -> Option<String> {
        if self.signature.is_empty() {
            return None;
        }
        match signature::key_ids(&self.signature.join("\n")) {
            Ok(ids) => ids.into_iter().next(),
            Err(e) => {
                tracing::warn!(error = %e, source = %self.source, "unreadable signature block");
                None
            }
        }
    }
}

fn field<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    line.strip_prefix(name).map(str::trim)
}

/// Scan a buildinfo document.
pub fn parse_buildinfo(content: &str) -> Buildinfo {
    let mut info = Buildinfo::default();
    let mut section = Section::None;
    let mut seen_deps = HashSet::new();

    for line in content.lines() {
        if section == Section::Signature {
            info.signature.push(line.to_string());
            if line.starts_with(END_SIGNATURE) {
                section = Section::None;
            }
            continue;
        }
        if line.starts_with(BEGIN_SIGNATURE) {
            info.signature.push(line.to_string());
            section = Section::Signature;
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            section = Section::None;
            continue;
        }
        if section == Section::Environment && trimmed.contains(':') {
            // looks like the next header; handled below
            section = Section::None;
        }

        if let Some(value) = field(line, "Source:") {
            info.source = value.to_string();
        } else if let Some(value) = field(line, "Version:") {
            info.version = value.to_string();
        } else if let Some(value) = field(line, "Build-Architecture:") {
            info.architecture = value.to_string();
        } else if let Some(value) = field(line, "Build-Date:") {
            info.date = value.to_string();
        } else if let Some(value) = field(line, "Build-Origin:") {
            info.origin = value.to_string();
        } else if line.starts_with("Checksums-Sha256:") {
            section = Section::Checksums;
            continue;
        } else if let Some(rest) = field(line, "Installed-Build-Depends:") {
            section = Section::Depends;
            scan_dependencies(rest, &mut info, &mut seen_deps);
            continue;
        } else if line.starts_with("Environment:") {
            section = Section::Environment;
            continue;
        } else if line.starts_with(|c: char| !c.is_whitespace()) && trimmed.contains(':') {
            // any other field header closes the open section
            section = Section::None;
            continue;
        } else {
            match section {
                Section::Checksums => {
                    if let Some(binary) = parse_checksum(trimmed) {
                        info.binaries.push(binary);
                    }
                }
                Section::Depends => scan_dependencies(trimmed, &mut info, &mut seen_deps),
                Section::Environment => {
                    if let Some((key, value)) = trimmed.split_once('=') {
                        let key = key.trim();
                        if !key.is_empty() {
                            info.environment
                                .insert(key.to_string(), value.trim_matches('"').to_string());
                        }
                    }
                }
                Section::None | Section::Signature => {}
            }
            continue;
        }
        section = Section::None;
    }

    info
}

fn parse_checksum(line: &str) -> Option<Binary> {
    if !PACKAGE_SUFFIXES.iter().any(|suffix| line.ends_with(suffix)) {
        return None;
    }
    let parts: Vec<&str> = line.split_whitespace().collect();
    let [hash, size, filename] = parts.as_slice() else {
        return None;
    };
    Some(Binary {
        hash: hash.to_string(),
        size: size.parse().unwrap_or(0),
        filename: filename.to_string(),
    })
}

fn scan_dependencies(line: &str, info: &mut Buildinfo, seen: &mut HashSet<String>) {
    for caps in DEPENDENCY.captures_iter(line) {
        let dep = Dependency {
            name: caps[1].trim().to_string(),
            version: caps[2].trim().to_string(),
        };
        if seen.insert(dep.id()) {
            info.dependencies.push(dep);
        }
    }
}

/// Lower-cased first letter of a package name, the Debian pool key.
fn pool_prefix(name: &str) -> String {
    name.chars()
        .next()
        .map(|c| c.to_lowercase().to_string())
        .unwrap_or_default()
}

fn set(item: &mut Item, key: &str, value: &str) {
    if !value.is_empty() {
        item.attrs.insert(key.to_string(), value.to_string());
    }
}

/// Assemble the single record describing this build.
pub fn to_record(info: &Buildinfo, config: &BuildinfoConfig) -> Record {
    let mirror = config.mirror.trim_end_matches('/');
    let tarball = info.tarball();

    let mut resources = Vec::with_capacity(info.dependencies.len() + 1);
    for dep in &info.dependencies {
        let mut item = Item::new(dep.id(), &dep.name, "build-dependency")
            .with_attr(
                "uri",
                format!(
                    "{mirror}/pool/main/{}/{}_{}.deb",
                    pool_prefix(&dep.name),
                    dep.name,
                    dep.version
                ),
            )
            .with_attr("format", "deb")
            .with_attr("version", &dep.version);
        set(&mut item, "used_by", &info.origin);
        resources.push(item);
    }
    let mut tarball_item = Item::new(&tarball, &tarball, "tarball")
        .with_attr(
            "uri",
            format!(
                "{mirror}/pool/main/{}/{}/{tarball}",
                pool_prefix(&info.source),
                info.source
            ),
        )
        .with_attr("format", "orig.tar.xz");
    set(&mut tarball_item, "used_by", &info.origin);
    resources.push(tarball_item);

    let consumed: Vec<&str> = resources.iter().map(|r| r.id.as_str()).collect();
    let mut step = Item::new(
        info.step_id(),
        format!("{} {}", info.source, info.version).trim().to_string(),
        "build",
    )
    .with_attr("command", &config.build_command)
    .with_attr("phase", "build")
    .with_attr("consumed", consumed.join(","));
    set(&mut step, "timestamp", &info.date);
    set(&mut step, "architecture", &info.architecture);
    for (key, value) in &info.environment {
        step.attrs.insert(format!("env.{key}"), value.clone());
    }

    let mut principal = Item::new(&info.origin, &info.origin, "builder")
        .with_attr("trust_level", "signed")
        .with_attr("builder", &config.builder);
    if let Some(key) = info.signing_key() {
        principal.attrs.insert("pgp_key_id".into(), key);
    }

    let artifacts_out = info
        .binaries
        .iter()
        .map(|b| {
            let mut item = Item::new(&b.filename, &b.filename, "binary")
                .with_attr("content-hash", &b.hash)
                .with_attr("size", b.size.to_string());
            set(&mut item, "version", &info.version);
            item
        })
        .collect();

    Record {
        step,
        principal,
        artifacts_in: Vec::new(),
        artifacts_out,
        resources,
    }
}

/// Extractor for Debian buildinfo documents. One record per document.
#[derive(Debug, Clone, Default)]
pub struct BuildinfoExtractor {
    config: BuildinfoConfig,
}

impl BuildinfoExtractor {
    pub fn new(config: BuildinfoConfig) -> Self {
        Self { config }
    }
}

impl Extractor for BuildinfoExtractor {
    fn source(&self) -> &'static str {
        "build-info"
    }

    fn parse(&self, input: &str) -> Result<RecordStream, ExtractError> {
        let bytes = std::fs::read(input).map_err(|err| ExtractError::Read {
            path: Path::new(input).to_path_buf(),
            source: err,
        })?;
        let info = parse_buildinfo(&String::from_utf8_lossy(&bytes));
        tracing::debug!(
            source = %info.source,
            version = %info.version,
            binaries = info.binaries.len(),
            dependencies = info.dependencies.len(),
            "parsed buildinfo"
        );

        let mut stream = RecordStream::new(self.source());
        stream.records.push(to_record(&info, &self.config));
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::signature::tests::{armor, v4_signature};
    use pretty_assertions::assert_eq;

    fn document(signature: &str) -> String {
        format!(
            "-----BEGIN PGP SIGNED MESSAGE-----
Hash: SHA512

Format: 1.0
Source: hello
Binary: hello
Architecture: amd64
Version: 2.10-3
Checksums-Md5:
 0a1b2c3d 52832 hello_2.10-3_amd64.deb
Checksums-Sha256:
 5f2ac0b6e1a6  52832 hello_2.10-3_amd64.deb
 9c1d77ee04aa  notanumber hello-dbgsym_2.10-3_amd64.deb
 deadbeef 1200 hello_2.10-3.dsc
Build-Origin: debian
Build-Architecture: amd64
Build-Date: Sat, 13 Jan 2024 10:00:00 +0000
Build-Path: /build/reproducible-path/hello-2.10
Installed-Build-Depends:
 autoconf (= 2.71-3),
 libc6 (= 2.36-9), libfoo (= 1.2),
 libfoo (= 1.2),
 broken-line (>= 1.0),
Environment:
 DEB_BUILD_OPTIONS=\"parallel=4\"
 LANG=\"C.UTF-8\"
 SOURCE_DATE_EPOCH=\"1705140000\"

{signature}
"
        )
    }

    #[test]
    fn test_parse_fields_and_sections() {
        let info = parse_buildinfo(&document(""));
        assert_eq!(info.source, "hello");
        assert_eq!(info.version, "2.10-3");
        assert_eq!(info.architecture, "amd64");
        assert_eq!(info.date, "Sat, 13 Jan 2024 10:00:00 +0000");
        assert_eq!(info.origin, "debian");
        assert_eq!(
            info.binaries,
            vec![
                Binary {
                    hash: "5f2ac0b6e1a6".into(),
                    size: 52832,
                    filename: "hello_2.10-3_amd64.deb".into(),
                },
                Binary {
                    hash: "9c1d77ee04aa".into(),
                    size: 0,
                    filename: "hello-dbgsym_2.10-3_amd64.deb".into(),
                },
            ]
        );
        let deps: Vec<String> = info.dependencies.iter().map(Dependency::id).collect();
        assert_eq!(deps, vec!["autoconf@2.71-3", "libc6@2.36-9", "libfoo@1.2"]);
        assert_eq!(info.environment.len(), 3);
        assert_eq!(info.environment["DEB_BUILD_OPTIONS"], "parallel=4");
        assert_eq!(info.environment["LANG"], "C.UTF-8");
        assert!(info.signature.is_empty());
    }

    #[test]
    fn test_environment_ends_on_colon_line() {
        let info = parse_buildinfo(
            "Environment:\n A=\"1\"\nBuild-Origin: buildd\n B=\"2\"\n",
        );
        assert_eq!(info.environment.len(), 1);
        assert_eq!(info.origin, "buildd");
    }

    #[test]
    fn test_tarball_and_ids() {
        let info = parse_buildinfo("Source: hello\nVersion: 2.10-3\n");
        assert_eq!(info.upstream_version(), "2.10");
        assert_eq!(info.tarball(), "hello_2.10.orig.tar.xz");
        assert_eq!(info.step_id(), "build-hello@2.10-3");

        let native = parse_buildinfo("Source: tool\nVersion: 1.4\n");
        assert_eq!(native.tarball(), "tool_1.4.orig.tar.xz");
    }

    #[test]
    fn test_record_assembly() {
        let info = parse_buildinfo(&document(""));
        let record = to_record(&info, &BuildinfoConfig::default());

        assert_eq!(record.step.id, "build-hello@2.10-3");
        assert_eq!(record.step.attrs["command"], "dpkg-buildpackage");
        assert_eq!(record.step.attrs["architecture"], "amd64");
        assert_eq!(record.step.attrs["env.LANG"], "C.UTF-8");
        assert_eq!(
            record.step.attrs["consumed"],
            "autoconf@2.71-3,libc6@2.36-9,libfoo@1.2,hello_2.10.orig.tar.xz"
        );
        assert!(record.artifacts_in.is_empty());

        assert_eq!(record.principal.id, "debian");
        assert_eq!(record.principal.attrs["trust_level"], "signed");
        assert_eq!(record.principal.attrs["builder"], "Debian Build Infrastructure");
        assert!(!record.principal.attrs.contains_key("pgp_key_id"));

        assert_eq!(record.artifacts_out.len(), 2);
        assert_eq!(record.artifacts_out[0].kind, "binary");
        assert_eq!(record.artifacts_out[0].attrs["content-hash"], "5f2ac0b6e1a6");
        assert_eq!(record.artifacts_out[0].attrs["version"], "2.10-3");

        let libfoo = &record.resources[2];
        assert_eq!(libfoo.id, "libfoo@1.2");
        assert_eq!(libfoo.kind, "build-dependency");
        assert_eq!(
            libfoo.attrs["uri"],
            "https://deb.debian.org/debian/pool/main/l/libfoo_1.2.deb"
        );
        let tarball = record.resources.last().unwrap();
        assert_eq!(tarball.kind, "tarball");
        assert_eq!(
            tarball.attrs["uri"],
            "https://deb.debian.org/debian/pool/main/h/hello/hello_2.10.orig.tar.xz"
        );
        assert_eq!(tarball.attrs["used_by"], "debian");
    }

    #[test]
    fn test_signature_key_attached() {
        let issuer = [0xde, 0xad, 0xbe, 0xef, 0x00, 0x11, 0x22, 0x33];
        let sig = armor(&v4_signature(issuer));
        let info = parse_buildinfo(&document(&sig));
        assert_eq!(info.signature.first().map(String::as_str), Some(BEGIN_SIGNATURE));
        assert_eq!(info.signature.last().map(String::as_str), Some(END_SIGNATURE));

        let record = to_record(&info, &BuildinfoConfig::default());
        assert_eq!(record.principal.attrs["pgp_key_id"], "6d7e8f9012345678");
    }

    #[test]
    fn test_bad_signature_is_not_fatal() {
        let sig = format!("{BEGIN_SIGNATURE}\n\nnot/a/signature==\n{END_SIGNATURE}");
        let info = parse_buildinfo(&document(&sig));
        assert_eq!(info.signing_key(), None);
        let record = to_record(&info, &BuildinfoConfig::default());
        assert_eq!(record.principal.attrs["trust_level"], "signed");
        assert!(!record.principal.attrs.contains_key("pgp_key_id"));
    }

    #[test]
    fn test_extractor_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello_2.10-3_amd64.buildinfo");
        std::fs::write(&path, document("")).unwrap();

        let stream = BuildinfoExtractor::default()
            .parse(path.to_str().unwrap())
            .unwrap();
        assert_eq!(stream.source, "build-info");
        assert_eq!(stream.records.len(), 1);

        let err = BuildinfoExtractor::default()
            .parse(dir.path().join("missing").to_str().unwrap())
            .unwrap_err();
        assert!(matches!(err, ExtractError::Read { .. }));
    }
}

//! The version 1.0 image manifest.
//!
//! A manifest lists every artifact published for one image record. It is
//! uploaded as `{record_id}/manifest.json` and the record's `link` points at
//! it. The on-disk form is:
//!
//! ```text
//! {
//!     "artifacts": [
//!         {
//!             "link": {
//!                 "etag": "5a7531766b4fa34dfb475de137285d81",
//!                 "path": "s3://boot-images/F6C1CC79-9A5B-42B6-AD3F-E7EFCF22CAE8/initrd",
//!                 "type": "s3"
//!             },
//!             "md5": "5a7531766b4fa34dfb475de137285d81",
//!             "type": "application/vnd.cray.image.initrd"
//!         }
//!     ],
//!     "created": "2024-03-01 10:15:42.123456",
//!     "version": "1.0"
//! }
//! ```
//!
//! Keys are written in sorted order with four-space indentation. Struct
//! fields below are declared alphabetically so serde emits them that way.

use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactKind;
use crate::error::ManifestError;

/// The only manifest version this crate reads and writes.
pub const MANIFEST_VERSION: &str = "1.0";

/// Timestamp layout of the `created` field.
const CREATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Kind of store an artifact link points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LinkType {
    /// S3-compatible object store.
    #[default]
    #[serde(rename = "s3", alias = "objectstore")]
    S3,
}

/// Pointer to a stored object.
///
/// Used both for manifest entries and for the `link` field of image and
/// recipe records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactLink {
    /// Store-assigned ETag, without surrounding quotes.
    pub etag: String,
    /// Store URI, `s3://{bucket}/{key}`.
    pub path: String,
    /// Store type.
    #[serde(rename = "type")]
    pub link_type: LinkType,
}

impl ArtifactLink {
    /// Build an S3 link for `key` in `bucket`.
    pub fn s3(bucket: &str, key: &str, etag: impl Into<String>) -> Self {
        Self {
            etag: etag.into(),
            path: format!("s3://{}/{}", bucket, key),
            link_type: LinkType::S3,
        }
    }

    /// Split the link path into `(bucket, key)`.
    ///
    /// Returns None if the path is not an `s3://bucket/key` URI.
    pub fn bucket_and_key(&self) -> Option<(&str, &str)> {
        let rest: &str = self.path.strip_prefix("s3://")?;
        let (bucket, key) = rest.split_once('/')?;
        if bucket.is_empty() || key.is_empty() {
            return None;
        }
        Some((bucket, key))
    }
}

/// Outcome of uploading one artifact; also one manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Where the artifact was stored.
    pub link: ArtifactLink,
    /// MD5 checksum of the local file bytes.
    pub md5: String,
    /// MIME type of the artifact.
    #[serde(rename = "type")]
    pub mime_type: String,
}

impl UploadResult {
    /// Create a result for an artifact of `kind`.
    pub fn new(kind: ArtifactKind, link: ArtifactLink, checksum: impl Into<String>) -> Self {
        Self {
            link,
            md5: checksum.into(),
            mime_type: kind.mime_type().to_string(),
        }
    }

    /// Artifact kind, if the MIME type is one this crate knows.
    pub fn kind(&self) -> Option<ArtifactKind> {
        ArtifactKind::from_mime_type(&self.mime_type)
    }
}

/// Manifest document listing the artifacts of one image record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Upload results in upload order.
    pub artifacts: Vec<UploadResult>,
    /// Creation timestamp, kept verbatim so foreign manifests round-trip.
    pub created: String,
    /// Document version, always [`MANIFEST_VERSION`] for manifests we build.
    pub version: String,
}

impl Manifest {
    /// Build a manifest from upload results, stamped with the current time.
    ///
    /// Artifact order is preserved exactly as given.
    pub fn build(artifacts: Vec<UploadResult>) -> Self {
        let created: String = chrono::Local::now()
            .naive_local()
            .format(CREATED_FORMAT)
            .to_string();
        Self {
            artifacts,
            created,
            version: MANIFEST_VERSION.to_string(),
        }
    }

    /// Encode to the canonical JSON form (sorted keys, four-space indent).
    pub fn encode(&self) -> Result<String, ManifestError> {
        let mut buffer: Vec<u8> = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Decode a manifest, rejecting versions other than "1.0".
    pub fn decode(content: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(content)?;
        if manifest.version != MANIFEST_VERSION {
            return Err(ManifestError::UnsupportedVersion {
                version: manifest.version,
                expected: MANIFEST_VERSION,
            });
        }
        Ok(manifest)
    }

    /// Write the encoded manifest to `path`.
    pub fn write_to(&self, path: &Path) -> Result<(), ManifestError> {
        let content: String = self.encode()?;
        std::fs::write(path, content).map_err(|e| ManifestError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Checksum of the first entry of `kind`, if present.
    pub fn checksum_for(&self, kind: ArtifactKind) -> Option<&str> {
        self.artifacts
            .iter()
            .find(|a| a.kind() == Some(kind))
            .map(|a| a.md5.as_str())
    }

    /// Parsed creation time, if `created` uses the layout this crate writes.
    pub fn created_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.created, "%Y-%m-%d %H:%M:%S%.f").ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: ArtifactKind, md5: &str) -> UploadResult {
        let key: String = kind.object_key("3fa8");
        UploadResult::new(kind, ArtifactLink::s3("boot-images", &key, md5), md5)
    }

    #[test]
    fn test_build_preserves_order_and_version() {
        let manifest: Manifest = Manifest::build(vec![
            entry(ArtifactKind::Rootfs, "aa"),
            entry(ArtifactKind::Kernel, "bb"),
            entry(ArtifactKind::Initrd, "cc"),
        ]);

        assert_eq!(manifest.version, "1.0");
        let kinds: Vec<Option<ArtifactKind>> = manifest.artifacts.iter().map(|a| a.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                Some(ArtifactKind::Rootfs),
                Some(ArtifactKind::Kernel),
                Some(ArtifactKind::Initrd)
            ]
        );
        assert!(manifest.created_at().is_some());
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let manifest: Manifest = Manifest::build(vec![
            entry(ArtifactKind::Rootfs, "aa"),
            entry(ArtifactKind::BootParameters, "ee"),
        ]);

        let encoded: String = manifest.encode().unwrap();
        assert_eq!(Manifest::decode(&encoded).unwrap(), manifest);
    }

    #[test]
    fn test_encode_sorted_keys_and_indent() {
        let manifest = Manifest {
            artifacts: vec![entry(ArtifactKind::Kernel, "bb")],
            created: "2024-03-01 10:15:42.123456".to_string(),
            version: "1.0".to_string(),
        };
        let encoded: String = manifest.encode().unwrap();

        let artifacts_pos: usize = encoded.find("\"artifacts\"").unwrap();
        let created_pos: usize = encoded.find("\"created\"").unwrap();
        let version_pos: usize = encoded.find("\"version\"").unwrap();
        assert!(artifacts_pos < created_pos && created_pos < version_pos);
        assert!(encoded.contains("\n    \"created\": \"2024-03-01 10:15:42.123456\""));
        assert!(encoded.contains("\"path\": \"s3://boot-images/3fa8/kernel\""));
        assert!(encoded.contains("\"type\": \"s3\""));
    }

    #[test]
    fn test_decode_foreign_manifest() {
        let content: &str = r#"{"version":"1.0","created":"2019-05-02T20:27:10Z",
            "artifacts":[{"link":{"path":"s3://boot-images/x/rootfs","etag":"e1","type":"objectstore"},
                          "type":"application/vnd.cray.image.rootfs.squashfs","md5":"m1"},
                         {"link":{"path":"s3://boot-images/x/other","etag":"e2","type":"s3"},
                          "type":"application/x-something-else","md5":"m2"}]}"#;
        let manifest: Manifest = Manifest::decode(content).unwrap();

        assert_eq!(manifest.created, "2019-05-02T20:27:10Z");
        assert_eq!(manifest.checksum_for(ArtifactKind::Rootfs), Some("m1"));
        assert_eq!(manifest.artifacts[1].kind(), None);
        assert_eq!(manifest.artifacts[0].link.link_type, LinkType::S3);
        assert_eq!(Manifest::decode(&manifest.encode().unwrap()).unwrap(), manifest);
    }

    #[test]
    fn test_decode_rejects_other_versions() {
        let content: &str = r#"{"version":"2.0","created":"x","artifacts":[]}"#;
        assert!(matches!(
            Manifest::decode(content),
            Err(ManifestError::UnsupportedVersion { .. })
        ));
        assert!(matches!(Manifest::decode("not json"), Err(ManifestError::Json(_))));
    }

    #[test]
    fn test_link_bucket_and_key() {
        let link: ArtifactLink = ArtifactLink::s3("boot-images", "abc/manifest.json", "e");
        assert_eq!(link.bucket_and_key(), Some(("boot-images", "abc/manifest.json")));

        let bad = ArtifactLink {
            path: "http://example/abc".to_string(),
            ..link
        };
        assert_eq!(bad.bucket_and_key(), None);
    }
}

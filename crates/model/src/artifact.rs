//! Artifact kinds and their object-store layout.

use std::path::PathBuf;

/// The kinds of artifact an image build or recipe registration publishes.
///
/// The kind determines both the MIME type recorded in the manifest and the
/// suffix of the object-store key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    /// Root filesystem image (squashfs).
    Rootfs,
    /// Boot kernel.
    Kernel,
    /// Initial ramdisk.
    Initrd,
    /// Kernel with debug symbols.
    DebugKernel,
    /// Kernel command line parameters.
    BootParameters,
    /// Gzipped tar archive of a kiwi-ng recipe.
    RecipeArchive,
    /// The manifest document itself.
    Manifest,
}

/// Fixed upload (and manifest) order for image artifacts.
pub const IMAGE_ARTIFACT_ORDER: [ArtifactKind; 5] = [
    ArtifactKind::Rootfs,
    ArtifactKind::Kernel,
    ArtifactKind::Initrd,
    ArtifactKind::DebugKernel,
    ArtifactKind::BootParameters,
];

impl ArtifactKind {
    /// MIME type recorded in manifest entries for this kind.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ArtifactKind::Rootfs => "application/vnd.cray.image.rootfs.squashfs",
            ArtifactKind::Kernel => "application/vnd.cray.image.kernel",
            ArtifactKind::Initrd => "application/vnd.cray.image.initrd",
            ArtifactKind::DebugKernel => "application/vnd.cray.image.debug.kernel",
            ArtifactKind::BootParameters => "application/vnd.cray.image.parameters.boot",
            ArtifactKind::RecipeArchive => "application/x-compressed-tar",
            ArtifactKind::Manifest => "application/json",
        }
    }

    /// Reverse lookup from a manifest entry's MIME type.
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        [
            ArtifactKind::Rootfs,
            ArtifactKind::Kernel,
            ArtifactKind::Initrd,
            ArtifactKind::DebugKernel,
            ArtifactKind::BootParameters,
            ArtifactKind::RecipeArchive,
            ArtifactKind::Manifest,
        ]
        .into_iter()
        .find(|kind| kind.mime_type() == mime_type)
    }

    /// Final path segment of the object key for this kind.
    pub fn key_suffix(&self) -> &'static str {
        match self {
            ArtifactKind::Rootfs => "rootfs",
            ArtifactKind::Kernel => "kernel",
            ArtifactKind::Initrd => "initrd",
            ArtifactKind::DebugKernel => "debug_kernel",
            ArtifactKind::BootParameters => "boot_parameters",
            ArtifactKind::RecipeArchive => "recipe.tar.gz",
            ArtifactKind::Manifest => "manifest.json",
        }
    }

    /// Object-store key prefix owned by a record.
    ///
    /// Everything a record publishes lives under this prefix, which makes it
    /// the unit of rollback.
    ///
    /// Returns: `{record_id}/` for images, `recipes/{record_id}/` for recipes.
    pub fn record_prefix(&self, record_id: &str) -> String {
        match self {
            ArtifactKind::RecipeArchive => format!("recipes/{}/", record_id),
            _ => format!("{}/", record_id),
        }
    }

    /// Full object key for this kind under a record.
    pub fn object_key(&self, record_id: &str) -> String {
        format!("{}{}", self.record_prefix(record_id), self.key_suffix())
    }

    /// Position of this kind in [`IMAGE_ARTIFACT_ORDER`], if it is an image artifact.
    pub fn image_order(&self) -> Option<usize> {
        IMAGE_ARTIFACT_ORDER.iter().position(|k| k == self)
    }
}

/// One local file to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    /// What the file is.
    pub kind: ArtifactKind,
    /// Where the file lives on the local filesystem.
    pub local_path: PathBuf,
}

impl ArtifactSpec {
    /// Create a new artifact spec.
    pub fn new(kind: ArtifactKind, local_path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            local_path: local_path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_keys() {
        assert_eq!(ArtifactKind::Rootfs.object_key("abc"), "abc/rootfs");
        assert_eq!(ArtifactKind::DebugKernel.object_key("abc"), "abc/debug_kernel");
        assert_eq!(
            ArtifactKind::BootParameters.object_key("abc"),
            "abc/boot_parameters"
        );
        assert_eq!(ArtifactKind::Manifest.object_key("abc"), "abc/manifest.json");
        assert_eq!(
            ArtifactKind::RecipeArchive.object_key("abc"),
            "recipes/abc/recipe.tar.gz"
        );
    }

    #[test]
    fn test_record_prefix() {
        assert_eq!(ArtifactKind::Kernel.record_prefix("id-1"), "id-1/");
        assert_eq!(ArtifactKind::RecipeArchive.record_prefix("id-1"), "recipes/id-1/");
    }

    #[test]
    fn test_mime_type_reverse_lookup() {
        for kind in IMAGE_ARTIFACT_ORDER {
            assert_eq!(ArtifactKind::from_mime_type(kind.mime_type()), Some(kind));
        }
        assert_eq!(
            ArtifactKind::from_mime_type("application/json"),
            Some(ArtifactKind::Manifest)
        );
        assert_eq!(ArtifactKind::from_mime_type("text/plain"), None);
    }

    #[test]
    fn test_image_order() {
        assert_eq!(ArtifactKind::Rootfs.image_order(), Some(0));
        assert_eq!(ArtifactKind::BootParameters.image_order(), Some(4));
        assert_eq!(ArtifactKind::Manifest.image_order(), None);
    }
}

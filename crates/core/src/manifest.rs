//! Update manifest resolution.
//!
//! Two client-facing forms are produced from a platform's current [`Release`]:
//! - a JSON manifest answering "is there something newer than version X?"
//! - the aggregate `latest.yml` document fetched by desktop auto-updaters.
//!
//! Download URLs for each file are resolved with the following precedence:
//! 1. a custom base URL (the release's `downloadUrl`, else the deployment
//!    default), combined as `<base>/<platform>/<file>`
//! 2. the file's own `customUrl`
//! 3. a fallback: same-origin `/download/<platform>/<file>` for the JSON form,
//!    the bare file name for `latest.yml`

use crate::checksum::Checksum;
use crate::platform::Platform;
use crate::release::{Release, ReleaseFile};
use crate::version::ReleaseVersion;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// How to build a URL when neither a base URL nor a per-file URL applies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UrlFallback {
    /// Absolute URL on this server, e.g. `http://updates.local:3000`.
    SameOrigin { origin: String },
    /// Bare file name, resolved by the client against its fetch origin.
    Relative,
}

/// Resolves download URLs for the files of one release.
#[derive(Clone, Debug)]
pub struct UrlResolver<'a> {
    platform: Platform,
    base: Option<&'a str>,
    fallback: UrlFallback,
}

impl<'a> UrlResolver<'a> {
    /// Create a resolver for `release`.
    ///
    /// `default_base` is the deployment-wide custom download URL; the
    /// release's own `downloadUrl` takes priority over it. Empty strings are
    /// treated as unset.
    pub fn new(
        platform: Platform,
        release: &'a Release,
        default_base: Option<&'a str>,
        fallback: UrlFallback,
    ) -> Self {
        let base = release
            .download_url
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(default_base.filter(|s| !s.is_empty()));
        Self {
            platform,
            base,
            fallback,
        }
    }

    /// Resolve the URL for one file.
    pub fn resolve(&self, file: &ReleaseFile) -> String {
        if let Some(base) = self.base {
            let base = base.strip_suffix('/').unwrap_or(base);
            return format!("{}/{}/{}", base, self.platform, file.name);
        }
        if let Some(custom) = file.custom_url.as_deref().filter(|s| !s.is_empty()) {
            return custom.to_string();
        }
        match &self.fallback {
            UrlFallback::SameOrigin { origin } => {
                let origin = origin.strip_suffix('/').unwrap_or(origin);
                format!("{}/download/{}/{}", origin, self.platform, file.name)
            }
            UrlFallback::Relative => file.name.clone(),
        }
    }
}

/// A file entry in the JSON manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ManifestFile {
    pub url: String,
    pub sha256: Checksum,
    pub size: u64,
}

/// The JSON update manifest returned when a newer release exists.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateManifest {
    pub version: ReleaseVersion,
    pub files: Vec<ManifestFile>,
    /// URL of the primary file.
    pub url: String,
    /// Stored name of the primary file.
    pub path: String,
    /// Checksum of the primary file.
    pub sha256: Checksum,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub release_date: Option<OffsetDateTime>,
}

/// Outcome of an update check.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateCheck {
    /// The client is already on the current version or newer.
    NoUpdate,
    /// A newer release is available.
    Available(UpdateManifest),
}

/// Decide whether `client_version` should update to `release`.
///
/// Errors with `InvalidVersion` for a malformed client version and with
/// `NoReleases` when the platform has no artifacts.
pub fn resolve_update(
    platform: Platform,
    release: &Release,
    client_version: &str,
    default_base: Option<&str>,
    origin: &str,
) -> crate::Result<UpdateCheck> {
    let client_version = ReleaseVersion::parse(client_version)?;

    let Some(primary) = release.primary_file() else {
        return Err(crate::Error::NoReleases(platform.to_string()));
    };

    if !release.version.is_newer_than(&client_version) {
        return Ok(UpdateCheck::NoUpdate);
    }

    let resolver = UrlResolver::new(
        platform,
        release,
        default_base,
        UrlFallback::SameOrigin {
            origin: origin.to_string(),
        },
    );

    let files = release
        .files
        .iter()
        .map(|f| ManifestFile {
            url: resolver.resolve(f),
            sha256: f.checksum,
            size: f.size,
        })
        .collect();

    Ok(UpdateCheck::Available(UpdateManifest {
        version: release.version.clone(),
        files,
        url: resolver.resolve(primary),
        path: primary.name.clone(),
        sha256: primary.checksum,
        release_date: release.release_date,
    }))
}

/// Render the `latest.yml` document for a platform.
///
/// The `sha512` keys carry the stored hex digest; clients of this server
/// verify against that value.
pub fn render_latest_yml(
    platform: Platform,
    release: &Release,
    default_base: Option<&str>,
) -> crate::Result<String> {
    let Some(primary) = release.primary_file() else {
        return Err(crate::Error::NoReleases(platform.to_string()));
    };

    let resolver = UrlResolver::new(platform, release, default_base, UrlFallback::Relative);

    let mut lines = Vec::with_capacity(4 + release.files.len() * 3);
    lines.push(format!("version: {}", release.version));
    lines.push("files:".to_string());
    for file in &release.files {
        lines.push(format!("  - url: {}", resolver.resolve(file)));
        lines.push(format!("    sha512: {}", file.checksum));
        lines.push(format!("    size: {}", file.size));
    }
    lines.push(format!("path: {}", primary.name));
    lines.push(format!("sha512: {}", primary.checksum));
    if let Some(date) = release.release_date {
        let date = date
            .format(&Rfc3339)
            .map_err(|e| crate::Error::Serialization(e.to_string()))?;
        lines.push(format!("releaseDate: '{date}'"));
    }

    Ok(lines.join("\n") + "\n")
}

//! Debian-family backend
//!
//! Placement conventions and naming for deb-based distros, registered
//! under the `debian` target key.

use crate::assemble::ArtifactKind;

use super::DistroBackend;

pub struct DebBackend;

impl DistroBackend for DebBackend {
    fn key(&self) -> &'static str {
        "debian"
    }

    fn display_name(&self) -> &'static str {
        "Debian (deb)"
    }

    fn package_ext(&self) -> &'static str {
        "deb"
    }

    fn arch_tag(&self, arch: &str) -> String {
        match arch {
            // debian already uses the request-side names for these
            "amd64" | "arm64" => arch,
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "386" => "i386",
            other => other,
        }
        .to_string()
    }

    fn category_dir(&self, kind: ArtifactKind, package: &str) -> String {
        match kind {
            ArtifactKind::Binary => "/usr/bin".to_string(),
            ArtifactKind::Libexec => format!("/usr/lib/{package}"),
            ArtifactKind::Manpage => "/usr/share/man".to_string(),
            // debian keeps the license text as a copyright file in the
            // package doc directory
            ArtifactKind::Doc | ArtifactKind::License => format!("/usr/share/doc/{package}"),
            ArtifactKind::ConfigFile => "/etc".to_string(),
            ArtifactKind::DataDir => "/usr/share".to_string(),
            ArtifactKind::SystemdUnit => "/lib/systemd/system".to_string(),
            ArtifactKind::SystemdDropin => "/lib/systemd/system".to_string(),
        }
    }

    fn worker_image(&self) -> &'static str {
        "docker.io/library/debian:bookworm"
    }

    fn bootstrap_packages(&self) -> &'static [&'static str] {
        &[
            "build-essential",
            "debhelper",
            "dpkg-dev",
            "gnupg",
            "patch",
            "apt-utils",
        ]
    }

    fn repo_binary_dir(&self) -> &'static str {
        "pool/main"
    }

    fn repo_source_dir(&self) -> &'static str {
        "pool/sources"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arch_map() {
        let backend = DebBackend;
        assert_eq!(backend.arch_tag("amd64"), "amd64");
        assert_eq!(backend.arch_tag("x86_64"), "amd64");
        assert_eq!(backend.arch_tag("386"), "i386");
    }

    #[test]
    fn test_arch_map_passthrough_default() {
        let backend = DebBackend;
        assert_eq!(backend.arch_tag("mips64el"), "mips64el");
    }
}

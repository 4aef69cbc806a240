//! RPM-family backend
//!
//! Placement conventions and naming for rpm-based distros, registered
//! under the `fedora` target key.

use crate::assemble::ArtifactKind;

use super::DistroBackend;

pub struct RpmBackend;

impl DistroBackend for RpmBackend {
    fn key(&self) -> &'static str {
        "fedora"
    }

    fn display_name(&self) -> &'static str {
        "Fedora (rpm)"
    }

    fn package_ext(&self) -> &'static str {
        "rpm"
    }

    fn arch_tag(&self, arch: &str) -> String {
        match arch {
            "amd64" => "x86_64",
            "arm64" => "aarch64",
            "386" => "i686",
            "arm" => "armv7hl",
            "ppc64le" => "ppc64le",
            "s390x" => "s390x",
            other => other,
        }
        .to_string()
    }

    fn category_dir(&self, kind: ArtifactKind, package: &str) -> String {
        match kind {
            ArtifactKind::Binary => "/usr/bin".to_string(),
            ArtifactKind::Libexec => format!("/usr/libexec/{package}"),
            ArtifactKind::Manpage => "/usr/share/man".to_string(),
            ArtifactKind::Doc => format!("/usr/share/doc/{package}"),
            ArtifactKind::License => format!("/usr/share/licenses/{package}"),
            ArtifactKind::ConfigFile => "/etc".to_string(),
            ArtifactKind::DataDir => "/usr/share".to_string(),
            ArtifactKind::SystemdUnit => "/usr/lib/systemd/system".to_string(),
            ArtifactKind::SystemdDropin => "/usr/lib/systemd/system".to_string(),
        }
    }

    fn worker_image(&self) -> &'static str {
        "registry.fedoraproject.org/fedora:41"
    }

    fn bootstrap_packages(&self) -> &'static [&'static str] {
        &["rpm-build", "createrepo_c", "gnupg2", "patch", "tar", "gzip"]
    }

    fn repo_binary_dir(&self) -> &'static str {
        "RPMS"
    }

    fn repo_source_dir(&self) -> &'static str {
        "SRPMS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arch_map() {
        let backend = RpmBackend;
        assert_eq!(backend.arch_tag("amd64"), "x86_64");
        assert_eq!(backend.arch_tag("arm64"), "aarch64");
    }

    #[test]
    fn test_arch_map_passthrough_default() {
        let backend = RpmBackend;
        assert_eq!(backend.arch_tag("riscv64"), "riscv64");
    }

    #[test]
    fn test_license_dir_is_per_package() {
        let backend = RpmBackend;
        assert_eq!(
            backend.category_dir(ArtifactKind::License, "phony"),
            "/usr/share/licenses/phony"
        );
    }
}

//! The agent-runtime bundle uploaded into a fresh sandbox.
//!
//! The bundle is a bootstrap script plus a small manifest, written to a
//! fixed path. Setup runs once per sandbox and installs the `squad-agent`
//! binary; every subsequent agent process reuses it.

/// Directory inside the sandbox holding the runtime.
pub const RUNTIME_DIR: &str = "/opt/squad";

/// Path of the installed runtime binary.
pub const RUNTIME_BIN: &str = "/opt/squad/bin/squad-agent";

/// Path of the bootstrap script.
pub const INSTALL_SCRIPT: &str = "/opt/squad/install.sh";

/// Path of the bundle manifest.
pub const MANIFEST: &str = "/opt/squad/manifest.json";

/// One file of the runtime bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFile {
    pub path: &'static str,
    pub contents: String,
}

/// The full bundle for a given runtime binary source URL.
pub fn runtime_bundle(binary_url: &str) -> Vec<BundleFile> {
    vec![
        BundleFile {
            path: INSTALL_SCRIPT,
            contents: install_script(binary_url),
        },
        BundleFile {
            path: MANIFEST,
            contents: manifest(binary_url),
        },
    ]
}

/// The one-shot setup command. Safe to re-run; the install script exits
/// early when the binary is already present.
pub fn setup_command() -> String {
    format!("sh {INSTALL_SCRIPT}")
}

fn install_script(binary_url: &str) -> String {
    format!(
        r#"#!/bin/sh
set -eu

mkdir -p {RUNTIME_DIR}/bin
if [ -x {RUNTIME_BIN} ]; then
    echo "squad-agent already installed"
    exit 0
fi

curl -fsSL "{binary_url}" -o {RUNTIME_BIN}
chmod +x {RUNTIME_BIN}
echo "squad-agent installed"
"#
    )
}

fn manifest(binary_url: &str) -> String {
    serde_json::json!({
        "name": "squad-agent-runtime",
        "version": env!("CARGO_PKG_VERSION"),
        "entrypoint": RUNTIME_BIN,
        "source": binary_url,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_has_script_and_manifest() {
        let bundle = runtime_bundle("https://example.com/squad-agent");
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle[0].path, INSTALL_SCRIPT);
        assert_eq!(bundle[1].path, MANIFEST);
        assert!(bundle[0].contents.contains("https://example.com/squad-agent"));
    }

    #[test]
    fn test_install_script_is_idempotent_guarded() {
        let script = install_script("https://example.com/bin");
        assert!(script.contains("already installed"));
        assert!(script.starts_with("#!/bin/sh"));
    }

    #[test]
    fn test_manifest_parses() {
        let manifest: serde_json::Value = serde_json::from_str(&manifest("u")).unwrap();
        assert_eq!(manifest["entrypoint"], RUNTIME_BIN);
    }
}

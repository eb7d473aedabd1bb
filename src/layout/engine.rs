use super::{build_dot, LayoutError};
use crate::types::RelationsSnapshot;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Look a program up on `PATH`
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{}.exe", program));
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}

/// Runs Graphviz `dot` over snapshots.
///
/// Calls block until `dot` exits; there is no timeout.
#[derive(Debug, Clone)]
pub struct LayoutEngine {
    configured: Option<PathBuf>,
    dot_path: Option<PathBuf>,
    last_error: String,
}

impl LayoutEngine {
    pub fn new(configured: Option<PathBuf>) -> Self {
        let mut engine = Self {
            configured,
            dot_path: None,
            last_error: String::new(),
        };
        engine.reload();
        engine
    }

    /// Re-resolve the binary: the configured path if set, else `dot` on PATH
    pub fn reload(&mut self) {
        self.dot_path = self
            .configured
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| find_in_path("dot"));
        debug!(dot = ?self.dot_path, "layout engine resolved");
    }

    pub fn set_configured(&mut self, path: Option<PathBuf>) {
        self.configured = path;
        self.reload();
    }

    pub fn available(&self) -> bool {
        self.dot_path.is_some()
    }

    pub fn dot_path(&self) -> Option<&Path> {
        self.dot_path.as_deref()
    }

    /// Diagnostic text from the last run, empty when it succeeded silently
    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    /// Run `dot -T<format>` with `source` on stdin and return its stdout
    pub fn run(&self, format: &str, source: &str) -> Result<(Vec<u8>, String), LayoutError> {
        let path = self.dot_path.as_ref().ok_or(LayoutError::Unavailable)?;
        let io_err = |source: std::io::Error| LayoutError::Io {
            path: path.display().to_string(),
            source,
        };

        let mut command = Command::new(path);
        command
            .arg(format!("-T{}", format))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        debug!(dot = %path.display(), format, "running layout engine");
        let mut child = command.spawn().map_err(io_err)?;
        // dot may exit before reading everything; its stderr says why
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(source.as_bytes()),
            None => Ok(()),
        };
        let output = child.wait_with_output().map_err(io_err)?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "a signal".to_string());
            return Err(LayoutError::Failed { code, stderr });
        }
        written.map_err(io_err)?;
        Ok((output.stdout, stderr))
    }

    fn render(
        &mut self,
        format: &str,
        snapshot: &RelationsSnapshot,
        highlight: &HashSet<String>,
        focus: &HashSet<String>,
    ) -> Option<Vec<u8>> {
        let source = build_dot(snapshot, highlight, focus);
        match self.run(format, &source) {
            Ok((stdout, stderr)) => {
                self.last_error = stderr;
                Some(stdout)
            }
            Err(e) => {
                warn!(error = %e, "layout engine failed");
                self.last_error = match e {
                    LayoutError::Failed { stderr, .. } if !stderr.is_empty() => stderr,
                    other => other.to_string(),
                };
                None
            }
        }
    }

    /// `-Tplain` layout of the snapshot, empty on failure
    pub fn render_plain(
        &mut self,
        snapshot: &RelationsSnapshot,
        highlight: &HashSet<String>,
        focus: &HashSet<String>,
    ) -> String {
        self.render("plain", snapshot, highlight, focus)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default()
    }

    /// SVG rendering of the snapshot, `None` on failure
    pub fn render_svg(
        &mut self,
        snapshot: &RelationsSnapshot,
        highlight: &HashSet<String>,
        focus: &HashSet<String>,
    ) -> Option<Vec<u8>> {
        self.render("svg", snapshot, highlight, focus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::parse_plain;
    use crate::types::{FieldPair, LayerNode, RelationEdge};
    use std::collections::BTreeSet;

    fn snapshot() -> RelationsSnapshot {
        let mut snap = RelationsSnapshot::default();
        for id in ["parent", "child", "other"] {
            snap.layers.insert(id.into(), LayerNode::new(id, id));
        }
        snap.edges.push(RelationEdge {
            id: "child#0".into(),
            parent_layer_id: "parent".into(),
            child_layer_id: "child".into(),
            pairs: vec![FieldPair::new("id", "parent_id")],
        });
        snap
    }

    #[test]
    fn missing_binary_yields_empty_result_and_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = LayoutEngine::new(Some(dir.path().join("no-such-dot")));
        assert!(engine.available());

        let plain = engine.render_plain(&snapshot(), &HashSet::new(), &HashSet::new());
        assert!(plain.is_empty());
        assert!(engine.last_error().contains("no-such-dot"));
        assert!(engine
            .render_svg(&snapshot(), &HashSet::new(), &HashSet::new())
            .is_none());
    }

    #[cfg(unix)]
    #[test]
    fn early_exit_reports_the_engine_diagnostic() {
        // sh rejects -Tplain without reading stdin
        let engine = LayoutEngine::new(Some(PathBuf::from("/bin/sh")));
        let source = "digraph G { a -> b; }\n".repeat(100_000);

        match engine.run("plain", &source) {
            Err(LayoutError::Failed { stderr, .. }) => assert!(!stderr.is_empty()),
            other => panic!("expected the engine to fail, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn empty_configured_path_falls_back_to_search() {
        let engine = LayoutEngine::new(Some(PathBuf::new()));
        assert_eq!(engine.dot_path().map(Path::to_path_buf), find_in_path("dot"));
    }

    #[test]
    fn live_round_trip_when_dot_is_installed() {
        let mut engine = LayoutEngine::new(None);
        if !engine.available() {
            return;
        }
        let snap = snapshot();
        let layout = parse_plain(&engine.render_plain(&snap, &HashSet::new(), &HashSet::new()));

        let ids: BTreeSet<String> = layout.nodes.iter().map(|n| n.id.clone()).collect();
        assert_eq!(ids, snap.layers.keys().cloned().collect::<BTreeSet<_>>());
        assert_eq!(layout.edges.len(), 1);
        assert_eq!(layout.edges[0].tail, "parent");
        assert_eq!(layout.edges[0].head, "child");

        let svg = engine
            .render_svg(&snap, &HashSet::new(), &HashSet::new())
            .unwrap();
        assert!(String::from_utf8_lossy(&svg).contains("<svg"));
    }
}

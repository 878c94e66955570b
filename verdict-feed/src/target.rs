//! Render targets
//!
//! A render replaces the target's contents: `clear()`, then `append()` for
//! each fragment in order, then `commit()`.

use std::io::Write;
use std::path::PathBuf;
use tracing::debug;
use verdict_common::Result;

/// Output region for rendered fragments
pub trait RenderTarget {
    /// Empty the pending contents
    fn clear(&mut self) -> Result<()>;

    /// Append one fragment after the existing ones
    fn append(&mut self, fragment: &str) -> Result<()>;

    /// Publish the pending contents
    fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    /// Replace the contents with `fragments`, in order
    fn replace(&mut self, fragments: &[String]) -> Result<()> {
        self.clear()?;
        for fragment in fragments {
            self.append(fragment)?;
        }
        self.commit()
    }
}

/// Writes the rendered markup to a file, atomically per commit
#[derive(Debug)]
pub struct HtmlFileTarget {
    path: PathBuf,
    pending: String,
}

impl HtmlFileTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pending: String::new(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "render".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RenderTarget for HtmlFileTarget {
    fn clear(&mut self) -> Result<()> {
        self.pending.clear();
        Ok(())
    }

    fn append(&mut self, fragment: &str) -> Result<()> {
        self.pending.push_str(fragment);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let temp = self.temp_path();
        std::fs::write(&temp, self.pending.as_bytes())?;
        std::fs::rename(&temp, &self.path)?;
        debug!(
            path = %self.path.display(),
            bytes = self.pending.len(),
            "Wrote rendered markup"
        );
        Ok(())
    }
}

/// Prints the rendered markup to stdout on commit
#[derive(Debug, Default)]
pub struct StdoutTarget {
    pending: String,
}

impl StdoutTarget {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderTarget for StdoutTarget {
    fn clear(&mut self) -> Result<()> {
        self.pending.clear();
        Ok(())
    }

    fn append(&mut self, fragment: &str) -> Result<()> {
        self.pending.push_str(fragment);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "{}", self.pending)?;
        out.flush()?;
        Ok(())
    }
}

/// Keeps fragments in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryTarget {
    pending: Vec<String>,
    committed: Vec<String>,
    commits: usize,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fragments as of the last commit
    pub fn fragments(&self) -> &[String] {
        &self.committed
    }

    /// Concatenated markup as of the last commit
    pub fn html(&self) -> String {
        self.committed.concat()
    }

    /// Number of commits so far
    pub fn commits(&self) -> usize {
        self.commits
    }
}

impl RenderTarget for MemoryTarget {
    fn clear(&mut self) -> Result<()> {
        self.pending.clear();
        Ok(())
    }

    fn append(&mut self, fragment: &str) -> Result<()> {
        self.pending.push(fragment.to_string());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.committed = self.pending.clone();
        self.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_target_replaces_on_each_commit() {
        let mut target = MemoryTarget::new();
        target.replace(&["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(target.fragments(), &["a", "b"]);

        target.replace(&["c".to_string()]).unwrap();
        assert_eq!(target.html(), "c");
        assert_eq!(target.commits(), 2);
    }

    #[test]
    fn test_memory_target_uncommitted_appends_are_invisible() {
        let mut target = MemoryTarget::new();
        target.append("draft").unwrap();
        assert!(target.fragments().is_empty());
    }

    #[test]
    fn test_html_file_target_overwrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("charges.html");
        std::fs::write(&path, "stale content").unwrap();

        let mut target = HtmlFileTarget::new(&path);
        target
            .replace(&["<h4>one</h4>".to_string(), "<h4>two</h4>".to_string()])
            .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<h4>one</h4><h4>two</h4>");
        assert!(!dir.path().join("charges.html.tmp").exists());

        target.replace(&[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}

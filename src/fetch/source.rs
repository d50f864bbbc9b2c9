use anyhow::{anyhow, Context, Result};
use std::{
    fmt,
    path::{Path, PathBuf},
};
use url::Url;

/// Where one dataset's raw text comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    Http(Url),
    File(PathBuf),
}

impl Source {
    /// Classify a configured source string. `http(s)://` is fetched over the
    /// network, `file://` and bare paths are read from disk; relative paths are
    /// joined onto `data_dir`.
    pub fn resolve(raw: &str, data_dir: &Path) -> Result<Self> {
        let raw = raw.trim();
        let lower = raw.to_ascii_lowercase();

        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(raw).with_context(|| format!("parsing source URL {}", raw))?;
            return Ok(Source::Http(url));
        }
        if lower.starts_with("file://") {
            let url = Url::parse(raw).with_context(|| format!("parsing source URL {}", raw))?;
            let path = url
                .to_file_path()
                .map_err(|_| anyhow!("not a local file URL: {}", raw))?;
            return Ok(Source::File(path));
        }

        let path = Path::new(raw);
        if path.is_absolute() {
            Ok(Source::File(path.to_path_buf()))
        } else {
            Ok(Source::File(data_dir.join(path)))
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Http(url) => write!(f, "{}", url),
            Source::File(path) => write!(f, "{}", path.display()),
        }
    }
}

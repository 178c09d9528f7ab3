use anyhow::{Context, bail};
use polyfs::{File, Filesystem};
use polyfs_vfs::Credential;

/// Per-session shell state: the mount, the current directory and the
/// credential commands run under.
pub struct CliState {
    pub fs: Filesystem,
    pub root: File,
    pub cwd: File,
    pub pwd: String,
    pub cred: Credential,
    pub help: String,
    pub done: bool,
}

impl CliState {
    pub async fn new(fs: Filesystem, cred: Credential, help: String) -> anyhow::Result<Self> {
        let root = fs.root().await.context("resolving the root directory")?;
        Ok(Self {
            fs,
            cwd: root.clone(),
            root,
            pwd: "/".to_owned(),
            cred,
            help,
            done: false,
        })
    }

    /// Resolves a path relative to the cwd (or the root when absolute),
    /// one lookup per component.
    pub async fn resolve(&self, path: &str) -> anyhow::Result<File> {
        let mut file = if path.starts_with('/') {
            self.root.clone()
        } else {
            self.cwd.clone()
        };
        for component in path.split('/').filter(|c| !c.is_empty()) {
            file = file
                .lookup(&self.cred, component)
                .await
                .with_context(|| format!("{path}: looking up '{component}'"))?;
        }
        Ok(file)
    }

    /// Resolves the parent directory of `path` and hands back the leaf
    /// name, for create/remove style commands.
    pub async fn resolve_parent<'p>(&self, path: &'p str) -> anyhow::Result<(File, &'p str)> {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("{path}: no file name");
        }
        match trimmed.rsplit_once('/') {
            Some((dir, name)) => {
                let dir = if dir.is_empty() {
                    self.root.clone()
                } else {
                    self.resolve(dir).await?
                };
                Ok((dir, name))
            }
            None => Ok((self.cwd.clone(), trimmed)),
        }
    }

    /// The textual working directory after changing into `path`.
    #[must_use]
    pub fn normalized_pwd(&self, path: &str) -> String {
        let mut parts: Vec<&str> = if path.starts_with('/') {
            Vec::new()
        } else {
            self.pwd.split('/').filter(|c| !c.is_empty()).collect()
        };
        for component in path.split('/').filter(|c| !c.is_empty()) {
            match component {
                "." => {}
                ".." => {
                    parts.pop();
                }
                component => parts.push(component),
            }
        }
        if parts.is_empty() {
            "/".to_owned()
        } else {
            format!("/{}", parts.join("/"))
        }
    }
}

use crate::{FsError, Result};

/// A parsed mount target. Two shapes are accepted:
///
/// * `scheme://host[:port][/path]` for network filesystems;
/// * `scheme:path` for path-based schemes such as `objfs:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
}

impl Url {
    pub fn parse(url: &str) -> Result<Self> {
        let (scheme, rest) = url.split_once(':').ok_or(FsError::Invalid)?;
        if scheme.is_empty() {
            return Err(FsError::Invalid);
        }

        if let Some(rest) = rest.strip_prefix("//") {
            let (authority, path) = match rest.find('/') {
                Some(idx) => (&rest[..idx], &rest[idx..]),
                None => (rest, ""),
            };
            let (host, port) = match authority.rsplit_once(':') {
                Some((host, port)) => {
                    let port = port.parse::<u16>().map_err(|_| FsError::Invalid)?;
                    (host, Some(port))
                }
                None => (authority, None),
            };
            if host.is_empty() {
                return Err(FsError::Invalid);
            }
            Ok(Self {
                scheme: scheme.to_owned(),
                host: host.to_owned(),
                port,
                path: path.to_owned(),
            })
        } else {
            // Path-based scheme: everything after the colon is the path.
            Ok(Self {
                scheme: scheme.to_owned(),
                host: String::new(),
                port: None,
                path: rest.to_owned(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_url() {
        let url = Url::parse("nfs://server.example.com/export/home").expect("parses");
        assert_eq!(url.scheme, "nfs");
        assert_eq!(url.host, "server.example.com");
        assert_eq!(url.port, None);
        assert_eq!(url.path, "/export/home");
    }

    #[test]
    fn network_url_with_port() {
        let url = Url::parse("nfs://server:2049/export").expect("parses");
        assert_eq!(url.port, Some(2049));
        assert_eq!(url.path, "/export");
    }

    #[test]
    fn host_only() {
        let url = Url::parse("nfs://server").expect("parses");
        assert_eq!(url.host, "server");
        assert_eq!(url.path, "");
    }

    #[test]
    fn path_based_scheme() {
        let url = Url::parse("objfs:/var/db/fs").expect("parses");
        assert_eq!(url.scheme, "objfs");
        assert_eq!(url.host, "");
        assert_eq!(url.path, "/var/db/fs");
    }

    #[test]
    fn rejects_garbage() {
        assert!(Url::parse("no-scheme-here").is_err());
        assert!(Url::parse(":///nope").is_err());
        assert!(Url::parse("nfs://host:notaport/x").is_err());
    }
}

//! Server configuration.

use std::net::SocketAddr;
use url::Url;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// Externally reachable base URL, used to build webhook URLs.
    pub public_url: Option<Url>,
}

impl ServerConfig {
    /// The URL signal sources should post to, if a public URL is configured.
    ///
    /// The base is treated as a directory, so a path prefix such as
    /// `/relay` is kept.
    pub fn webhook_url(&self) -> Option<String> {
        let mut base = self.public_url.clone()?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join("webhook").ok().map(String::from)
    }
}

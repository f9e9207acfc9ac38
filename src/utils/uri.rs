//! Download URI validation and normalization.
//!
//! Every source accepted by the bot passes through [`parse_source`] before it
//! is allowed anywhere near the RPC bridge. The normalized form doubles as
//! the idempotency key for duplicate-submission detection.

use url::Url;

/// A validated download source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceUri {
    /// A magnet link with a BitTorrent info-hash.
    Magnet { raw: String, info_hash: String },
    /// An HTTP(S)/FTP URL.
    Web(Url),
}

impl SourceUri {
    /// The exact string to hand to Aria2.
    pub fn as_str(&self) -> &str {
        match self {
            SourceUri::Magnet { raw, .. } => raw,
            SourceUri::Web(url) => url.as_str(),
        }
    }

    /// Idempotency key: two submissions with the same key are the same
    /// download. Magnet links reduce to their info-hash; web URLs are
    /// compared with the fragment stripped.
    pub fn idempotency_key(&self) -> String {
        match self {
            SourceUri::Magnet { info_hash, .. } => format!("magnet:{}", info_hash),
            SourceUri::Web(url) => {
                let mut url = url.clone();
                url.set_fragment(None);
                url.to_string()
            }
        }
    }

    /// Initial display name before Aria2 reports the real one.
    pub fn display_name(&self) -> String {
        match self {
            SourceUri::Magnet { .. } => "magnet link".to_string(),
            SourceUri::Web(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|name| !name.is_empty())
                .map(|name| name.to_string())
                .unwrap_or_else(|| "download".to_string()),
        }
    }

    /// Output filename hint for Aria2's `out` option. Only meaningful for
    /// web URLs; torrents name their own files.
    pub fn out_name(&self) -> Option<String> {
        match self {
            SourceUri::Magnet { .. } => None,
            SourceUri::Web(_) => Some(self.display_name()),
        }
    }
}

/// Parse and validate user input into a [`SourceUri`].
///
/// Accepted: magnet links with a `urn:btih` info-hash (40 hex or 32 base32
/// characters), and HTTP/HTTPS/FTP URLs with a host.
pub fn parse_source(input: &str) -> Option<SourceUri> {
    let input = input.trim();
    let url = Url::parse(input).ok()?;

    match url.scheme() {
        "magnet" => {
            let info_hash = magnet_info_hash(&url)?;
            Some(SourceUri::Magnet {
                raw: input.to_string(),
                info_hash,
            })
        }
        "http" | "https" | "ftp" => {
            url.host_str()?;
            Some(SourceUri::Web(url))
        }
        _ => None,
    }
}

/// Extract and case-fold the `urn:btih` info-hash from a magnet link.
fn magnet_info_hash(url: &Url) -> Option<String> {
    let xt = url
        .query_pairs()
        .find(|(key, _)| key == "xt")
        .map(|(_, value)| value.into_owned())?;

    let hash = xt.strip_prefix("urn:btih:")?;
    let valid = match hash.len() {
        40 => hash.chars().all(|c| c.is_ascii_hexdigit()),
        32 => hash.chars().all(|c| c.is_ascii_alphanumeric()),
        _ => false,
    };
    valid.then(|| hash.to_ascii_lowercase())
}

use url::Url;

/// Why the host could not open an ad link.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpenLinkError {
    #[error("popup blocked by host")]
    Blocked,

    #[error("host cannot open links: {0}")]
    Unavailable(String),
}

/// Opens an external link in a new browsing context (tab, window, system
/// browser), without giving the opened page a handle back to the player.
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &Url) -> Result<(), OpenLinkError>;
}

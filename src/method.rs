//! Connection methods: how the user approves a session.
//!
//! | Method | When preferred | Payload |
//! |--------|----------------|---------|
//! | `Redirect` | platform can open the URL scheme | the deep link |
//! | `QrCode` | otherwise | PNG of the same URL |
//! | `Manual` | never automatically | the raw URL string |

use crate::error::{Error, Result};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;
use url::Url;

/// Pixels per QR module.
pub const QR_SCALE: u32 = 3;

/// PNG-encoded QR code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrCodeImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionMethod {
    Redirect(Url),
    QrCode(QrCodeImage),
    Manual(String),
}

impl ConnectionMethod {
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectionMethod::Redirect(_) => "redirect",
            ConnectionMethod::QrCode(_) => "qrcode",
            ConnectionMethod::Manual(_) => "manual",
        }
    }
}

/// Platform capability check for custom URL schemes.
pub trait Platform: Send + Sync {
    fn can_open_url(&self, url: &Url) -> bool;
}

/// No URL handler at all (servers, CLIs without a desktop session).
#[derive(Debug, Clone, Copy, Default)]
pub struct Headless;

impl Platform for Headless {
    fn can_open_url(&self, _url: &Url) -> bool {
        false
    }
}

/// Opens URLs whose scheme is registered.
#[derive(Debug, Clone, Default)]
pub struct SchemeAllowList {
    schemes: Vec<String>,
}

impl SchemeAllowList {
    pub fn new(schemes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { schemes: schemes.into_iter().map(|s| s.into().to_ascii_lowercase()).collect() }
    }
}

impl Platform for SchemeAllowList {
    fn can_open_url(&self, url: &Url) -> bool {
        self.schemes.iter().any(|s| s == url.scheme())
    }
}

fn parse_url(url: &str) -> Result<Url> {
    if url.trim().is_empty() {
        return Err(Error::Encoding("empty connection URL".into()));
    }
    Ok(Url::parse(url.trim())?)
}

/// Redirect if the platform can open `url`, QR code otherwise.
pub fn preferred_connection_method(url: &str, platform: &dyn Platform) -> Result<ConnectionMethod> {
    let parsed = parse_url(url)?;
    if platform.can_open_url(&parsed) {
        tracing::debug!(scheme = parsed.scheme(), "preferring redirect");
        Ok(ConnectionMethod::Redirect(parsed))
    } else {
        tracing::debug!(scheme = parsed.scheme(), "platform cannot open URL, preferring QR code");
        qr_connection_method(url)
    }
}

pub fn redirect_connection_method(url: &str) -> Result<ConnectionMethod> {
    Ok(ConnectionMethod::Redirect(parse_url(url)?))
}

pub fn qr_connection_method(url: &str) -> Result<ConnectionMethod> {
    parse_url(url)?;
    Ok(ConnectionMethod::QrCode(render_qr(url.trim().as_bytes())?))
}

pub fn manual_connection_method(url: &str) -> Result<ConnectionMethod> {
    parse_url(url)?;
    Ok(ConnectionMethod::Manual(url.trim().to_string()))
}

/// Render `data` as a PNG QR code, each module scaled to [`QR_SCALE`] pixels.
pub fn render_qr(data: &[u8]) -> Result<QrCodeImage> {
    let code = QrCode::with_error_correction_level(data, EcLevel::M)
        .map_err(|e| Error::Encoding(format!("qr: {e}")))?;
    let img = code
        .render::<Luma<u8>>()
        .module_dimensions(QR_SCALE, QR_SCALE)
        .build();
    let (width, height) = img.dimensions();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| Error::Encoding(format!("png: {e}")))?;
    Ok(QrCodeImage { png, width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINK: &str = "wc://wc?uri=wc%3AT1%401%3Fbridge%3Dhttps%253A%252F%252Fbridge.example";

    struct Always(bool);

    impl Platform for Always {
        fn can_open_url(&self, _url: &Url) -> bool {
            self.0
        }
    }

    #[test]
    fn redirect_iff_platform_can_open() {
        for can_open in [true, false] {
            let method = preferred_connection_method(LINK, &Always(can_open)).unwrap();
            match method {
                ConnectionMethod::Redirect(url) => {
                    assert!(can_open);
                    assert_eq!(url.as_str(), LINK);
                }
                ConnectionMethod::QrCode(img) => {
                    assert!(!can_open);
                    assert!(img.png.starts_with(b"\x89PNG"));
                }
                ConnectionMethod::Manual(_) => panic!("manual is never preferred"),
            }
        }
    }

    #[test]
    fn allow_list_matches_scheme() {
        let platform = SchemeAllowList::new(["WC"]);
        assert!(platform.can_open_url(&Url::parse(LINK).unwrap()));
        assert!(!platform.can_open_url(&Url::parse("https://example.com").unwrap()));
        assert!(!Headless.can_open_url(&Url::parse(LINK).unwrap()));
    }

    #[test]
    fn manual_keeps_raw_string() {
        assert_eq!(manual_connection_method(LINK).unwrap(), ConnectionMethod::Manual(LINK.into()));
    }

    #[test]
    fn empty_or_invalid_url_is_encoding_error() {
        assert!(matches!(preferred_connection_method("", &Headless), Err(Error::Encoding(_))));
        assert!(matches!(
            preferred_connection_method("no scheme", &Headless),
            Err(Error::Encoding(_))
        ));
        assert!(matches!(manual_connection_method("   "), Err(Error::Encoding(_))));
    }

    #[test]
    fn qr_is_scaled() {
        let img = render_qr(LINK.as_bytes()).unwrap();
        let code = QrCode::with_error_correction_level(LINK.as_bytes(), EcLevel::M).unwrap();
        let native = code.width() as u32;
        // four-module quiet zone on each side
        assert_eq!(img.width, (native + 8) * QR_SCALE);
        assert_eq!(img.width, img.height);
    }
}

//! Image-style locator builder.

use url::Url;

use super::DerivedLocator;
use crate::error::{PurgeError, PurgeResult};
use crate::invalidation::split_expression;

const STYLES_DIR: &str = "styles";

/// A named image style.
///
/// For `public://a/b.png` and style `thumbnail` the derivative is stored at
/// `{derivative_scheme}://styles/thumbnail/public/a/b.png` and served under
/// `{public_base_url}/styles/thumbnail/public/a/b.png`.
#[derive(Debug, Clone)]
pub struct ImageStyle {
    name: String,
    base_url: Url,
    derivative_scheme: String,
}

impl ImageStyle {
    pub fn new(
        name: impl Into<String>,
        public_base_url: &str,
        derivative_scheme: impl Into<String>,
    ) -> PurgeResult<Self> {
        let base_url = Url::parse(public_base_url).map_err(|e| {
            PurgeError::config(format!(
                "invalid public_base_url {:?}: {}",
                public_base_url, e
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(PurgeError::config(format!(
                "public_base_url can not be a base: {}",
                public_base_url
            )));
        }

        Ok(Self {
            name: name.into(),
            base_url,
            derivative_scheme: derivative_scheme.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locate(&self, expression: &str) -> PurgeResult<DerivedLocator> {
        let (scheme, target) =
            split_expression(expression).ok_or_else(|| PurgeError::Expansion {
                rule: self.name.clone(),
                message: format!("not a scheme://target expression: {}", expression),
            })?;
        let target = target.trim_start_matches('/');

        let storage_uri = format!(
            "{}://{}/{}/{}/{}",
            self.derivative_scheme, STYLES_DIR, self.name, scheme, target
        );

        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(STYLES_DIR)
                .push(&self.name)
                .push(scheme)
                .extend(target.split('/'));
        }

        Ok(DerivedLocator {
            rule: self.name.clone(),
            storage_uri,
            url: url.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_public_file() {
        let style = ImageStyle::new("thumbnail", "https://origin.example/files", "public").unwrap();
        let locator = style.locate("public://photos/cat.png").unwrap();

        assert_eq!(locator.rule, "thumbnail");
        assert_eq!(
            locator.storage_uri,
            "public://styles/thumbnail/public/photos/cat.png"
        );
        assert_eq!(
            locator.url,
            "https://origin.example/files/styles/thumbnail/public/photos/cat.png"
        );
    }

    #[test]
    fn test_trailing_slash_base_and_private_source() {
        let style = ImageStyle::new("large", "https://origin.example/files/", "public").unwrap();
        let locator = style.locate("private://a.jpg").unwrap();
        assert_eq!(locator.storage_uri, "public://styles/large/private/a.jpg");
        assert_eq!(
            locator.url,
            "https://origin.example/files/styles/large/private/a.jpg"
        );
    }

    #[test]
    fn test_segments_are_percent_encoded() {
        let style = ImageStyle::new("thumb", "https://origin.example", "public").unwrap();
        let locator = style.locate("public://my photos/cat #1.png").unwrap();
        assert_eq!(
            locator.url,
            "https://origin.example/styles/thumb/public/my%20photos/cat%20%231.png"
        );
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(ImageStyle::new("thumb", "not a url", "public").is_err());
        assert!(ImageStyle::new("thumb", "mailto:a@b.c", "public").is_err());

        let style = ImageStyle::new("thumb", "https://origin.example", "public").unwrap();
        assert!(matches!(
            style.locate("cat.png"),
            Err(PurgeError::Expansion { .. })
        ));
    }
}

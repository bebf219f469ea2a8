use serde::Deserialize;

/// A product pinned as a tag on top of a reel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub description: String,
}

impl Product {
    pub fn new(id: &str, name: &str, price: f64, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            price,
            description: description.to_string(),
        }
    }

    /// Price rendered with two decimals, e.g. `$129.99`
    pub fn display_price(&self) -> String {
        format!("${:.2}", self.price)
    }

    /// Text shown on the product tag
    pub fn tag_label(&self) -> String {
        format!("{} - {}", self.name, self.display_price())
    }
}

/// One video in the feed together with its product tags.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoEntry {
    pub id: String,
    pub video_url: String,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl VideoEntry {
    pub fn new(id: &str, video_url: &str, products: Vec<Product>) -> Self {
        Self {
            id: id.to_string(),
            video_url: video_url.to_string(),
            products,
        }
    }

    /// Whether the source locator is a URI rather than a filesystem path
    pub fn is_uri(&self) -> bool {
        self.video_url.contains("://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_label_uses_two_decimals() {
        let product = Product::new("p1", "Premium Collection", 129.99, "Limited edition set");
        assert_eq!(product.tag_label(), "Premium Collection - $129.99");

        let round = Product::new("p2", "Mug", 12.0, "");
        assert_eq!(round.display_price(), "$12.00");
    }

    #[test]
    fn test_uri_detection() {
        let remote = VideoEntry::new("1", "https://example.com/a.mp4", Vec::new());
        let local = VideoEntry::new("2", "/home/user/clip.webm", Vec::new());
        assert!(remote.is_uri());
        assert!(!local.is_uri());
    }
}

use std::collections::BTreeMap;

/// One transformation component, rendered as `key_value` pairs sorted by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transformation {
    params: BTreeMap<&'static str, String>,
}

impl Transformation {
    pub fn new() -> Self {
        Self::default()
    }

    /// `f_auto,q_auto`: let the CDN pick format and quality per client.
    pub fn optimized() -> Self {
        Self::new().fetch_format("auto").quality("auto")
    }

    /// Square auto-crop focused on the most interesting region.
    pub fn auto_crop(size: u32) -> Self {
        Self::new()
            .width(size)
            .height(size)
            .crop("auto")
            .gravity("auto")
    }

    pub fn width(self, width: u32) -> Self {
        self.set("w", width.to_string())
    }

    pub fn height(self, height: u32) -> Self {
        self.set("h", height.to_string())
    }

    pub fn crop(self, mode: &str) -> Self {
        self.set("c", mode)
    }

    pub fn gravity(self, gravity: &str) -> Self {
        self.set("g", gravity)
    }

    pub fn quality(self, quality: &str) -> Self {
        self.set("q", quality)
    }

    pub fn fetch_format(self, format: &str) -> Self {
        self.set("f", format)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    fn set(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.params.insert(key, value.into());
        self
    }
}

impl std::fmt::Display for Transformation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered = self
            .params
            .iter()
            .map(|(key, value)| format!("{}_{}", key, value))
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&rendered)
    }
}

/// Builds delivery URLs of the form
/// `{prefix}/{cloud}/image/upload/{transformation}/{version}/{public_id}`.
#[derive(Debug, Clone)]
pub struct CloudinaryUrl {
    delivery_prefix: String,
    cloud_name: String,
}

impl CloudinaryUrl {
    pub fn new(delivery_prefix: impl Into<String>, cloud_name: impl Into<String>) -> Self {
        Self {
            delivery_prefix: delivery_prefix.into().trim_end_matches('/').to_string(),
            cloud_name: cloud_name.into(),
        }
    }

    pub fn build(&self, public_id: &str, transformation: &Transformation) -> String {
        let mut segments = vec![
            self.delivery_prefix.clone(),
            self.cloud_name.clone(),
            "image".to_string(),
            "upload".to_string(),
        ];

        if !transformation.is_empty() {
            segments.push(transformation.to_string());
        }

        // Foldered ids get an explicit version so the folder is not read as a transformation.
        if public_id.contains('/') && !has_version_prefix(public_id) {
            segments.push("v1".to_string());
        }

        segments.push(public_id.to_string());
        segments.join("/")
    }
}

fn has_version_prefix(public_id: &str) -> bool {
    match public_id.split_once('/') {
        Some((head, _)) => {
            head.len() > 1
                && head.starts_with('v')
                && head[1..].chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> CloudinaryUrl {
        CloudinaryUrl::new("https://res.cloudinary.com/", "demo")
    }

    #[test]
    fn test_optimized_url() {
        assert_eq!(
            builder().build("generated_image", &Transformation::optimized()),
            "https://res.cloudinary.com/demo/image/upload/f_auto,q_auto/generated_image"
        );
    }

    #[test]
    fn test_auto_crop_url() {
        assert_eq!(
            builder().build("generated_image", &Transformation::auto_crop(500)),
            "https://res.cloudinary.com/demo/image/upload/c_auto,g_auto,h_500,w_500/generated_image"
        );
    }

    #[test]
    fn test_plain_and_foldered_ids() {
        let url = builder();
        assert_eq!(
            url.build("sample", &Transformation::new()),
            "https://res.cloudinary.com/demo/image/upload/sample"
        );
        assert_eq!(
            url.build("txt2img/sample", &Transformation::new()),
            "https://res.cloudinary.com/demo/image/upload/v1/txt2img/sample"
        );
        assert_eq!(
            url.build("v1712/txt2img/sample", &Transformation::new()),
            "https://res.cloudinary.com/demo/image/upload/v1712/txt2img/sample"
        );
    }
}

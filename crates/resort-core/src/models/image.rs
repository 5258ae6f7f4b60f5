use serde::{Deserialize, Deserializer, Serialize};

/// Ordered image URLs owned by one entity. Order is display order; duplicates are allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageCollection(Vec<String>);

impl ImageCollection {
    pub fn new(urls: Vec<String>) -> Self {
        Self(urls)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for ImageCollection {
    fn from(urls: Vec<String>) -> Self {
        Self(urls)
    }
}

impl From<Vec<&str>> for ImageCollection {
    fn from(urls: Vec<&str>) -> Self {
        Self(urls.into_iter().map(String::from).collect())
    }
}

impl FromIterator<String> for ImageCollection {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ImageCollection {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// An image collection together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedCollection {
    pub images: ImageCollection,
    pub version: i64,
}

/// Raw image update payload as sent by the admin and agency forms.
///
/// `images` is kept as untyped JSON because clients send arrays, single
/// strings and empty arrays with different meanings. `appendImages` arrives
/// either as a JSON boolean or as a form-encoded `"true"`/`"false"` string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpdateRequest {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub images: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub append_images: Option<bool>,
}

impl ImageUpdateRequest {
    pub fn append_one(url: impl Into<String>) -> Self {
        Self {
            image_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_images<I, S>(urls: I, append: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let urls: Vec<serde_json::Value> = urls
            .into_iter()
            .map(|u| serde_json::Value::String(u.into()))
            .collect();
        Self {
            image_url: None,
            images: Some(serde_json::Value::Array(urls)),
            append_images: Some(append),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagRepr {
    Bool(bool),
    Text(String),
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<FlagRepr>::deserialize(deserializer)?;
    Ok(raw.map(|flag| match flag {
        FlagRepr::Bool(b) => b,
        FlagRepr::Text(s) => s.trim().eq_ignore_ascii_case("true"),
    }))
}

/// The write an image update request resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageUpdate {
    AppendOne(String),
    AppendMany(Vec<String>),
    ReplaceAll(Vec<String>),
    NoChange,
}

impl ImageUpdate {
    /// Resolve a raw request into the single write it asks for.
    ///
    /// First match wins:
    /// 1. `imageUrl` set: append that URL, ignoring `images`
    /// 2. non-empty `images` array with `appendImages` true: append all
    /// 3. non-empty `images` array otherwise: replace the collection
    /// 4. empty `images` array: no change
    /// 5. scalar `images`: replace with a one-element collection
    /// 6. nothing set: no change
    pub fn from_request(request: &ImageUpdateRequest) -> Self {
        if let Some(url) = request
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
        {
            return ImageUpdate::AppendOne(url.to_string());
        }

        match request.images {
            Some(serde_json::Value::Array(ref items)) if items.is_empty() => ImageUpdate::NoChange,
            Some(serde_json::Value::Array(ref items)) => {
                let urls = items.iter().map(json_to_url).collect();
                if request.append_images.unwrap_or(false) {
                    ImageUpdate::AppendMany(urls)
                } else {
                    ImageUpdate::ReplaceAll(urls)
                }
            }
            Some(serde_json::Value::Null) | None => ImageUpdate::NoChange,
            Some(ref scalar) => ImageUpdate::ReplaceAll(vec![json_to_url(scalar)]),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImageUpdate::AppendOne(_) => "append_one",
            ImageUpdate::AppendMany(_) => "append_many",
            ImageUpdate::ReplaceAll(_) => "replace_all",
            ImageUpdate::NoChange => "no_change",
        }
    }

    pub fn is_no_change(&self) -> bool {
        matches!(self, ImageUpdate::NoChange)
    }
}

/// Strings are used verbatim; anything else by its JSON text.
fn json_to_url(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

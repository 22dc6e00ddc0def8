use std::collections::HashMap;

pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_TENANT_ID: &str = "X-Tenant-Id";
pub const MIME_JSON: &str = "application/json";

/// Returns the canonical format of a MIME header key: the first letter and any
/// letter following a hyphen are upper case, the rest are lower case. For example,
/// the canonical key for "accept-encoding" is "Accept-Encoding".
///
/// Keys containing bytes that are not valid in a header field name (such as a
/// space) are returned unchanged.
pub fn canonical_key(key: &str) -> String {
    if !key.bytes().all(is_token_byte) {
        return key.to_string();
    }

    let mut upper = true;
    let mut canonical = String::with_capacity(key.len());
    for c in key.chars() {
        let c = if upper {
            c.to_ascii_uppercase()
        } else {
            c.to_ascii_lowercase()
        };
        canonical.push(c);
        upper = c == '-';
    }
    canonical
}

/// Canonicalizes only the first character of a parameter name. The gateway
/// stores route and query parameters with an upper-cased first character,
/// in the same map style it uses for headers.
pub fn canonical_param(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => {
            let mut param = canonical_key(&first.to_string());
            param.push_str(chars.as_str());
            param
        }
        None => String::new(),
    }
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// HeaderMap is a multi-valued header map whose keys are stored in canonical
/// form, so every lookup is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderMap {
    inner: HashMap<String, Vec<String>>,
}

impl HeaderMap {
    /// Creates a new empty HeaderMap
    pub fn new() -> Self {
        HeaderMap {
            inner: HashMap::new(),
        }
    }

    /// Replaces every value of the key with a single value.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) -> Option<Vec<String>> {
        self.inner.insert(canonical_key(key), vec![value.into()])
    }

    /// Appends a value to the key, keeping the existing ones.
    pub fn append(&mut self, key: &str, value: impl Into<String>) {
        self.inner
            .entry(canonical_key(key))
            .or_default()
            .push(value.into());
    }

    /// Returns the first value of the key. An absent key or an empty value list
    /// both yield an empty string.
    pub fn get(&self, key: &str) -> &str {
        self.get_all(key)
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Returns every value of the key.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.inner
            .get(&canonical_key(key))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.inner.remove(&canonical_key(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(&canonical_key(key))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over the canonical keys and their values
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.inner.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderMap
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = HeaderMap::new();
        for (key, value) in iter {
            headers.append(key.as_ref(), value);
        }
        headers
    }
}

use ascii::AsciiString;
use duration_str::deserialize_option_duration;
use std::{fmt, marker::PhantomData, str::FromStr, time::Duration};
use url::Url;

/// Cross-origin policy for browser clients. When the section is absent the
/// server answers with a permissive policy (any origin, GET/POST/OPTIONS,
/// `Content-Type`).
#[derive(Clone, Default, Debug, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Whether credentials are allowed in cross-origin requests.
    pub allow_credentials: bool,
    /// Origins allowed to call the relay.
    pub allow_origins: Option<AnyOrUrlArray>,
    /// How long a preflight answer may be cached.
    #[serde(deserialize_with = "deserialize_option_duration")]
    pub max_age: Option<Duration>,
    /// Methods allowed in cross-origin requests.
    pub allow_methods: Option<AnyOrHttpMethodArray>,
    /// Request headers allowed in cross-origin requests.
    pub allow_headers: Option<AnyOrAsciiStringArray>,
    /// Response headers exposed to the browser.
    pub expose_headers: Option<AnyOrAsciiStringArray>,
}

/// HTTP methods accepted in the CORS configuration.
#[derive(Debug, PartialEq, Eq, Clone, Copy, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
    /// PATCH
    Patch,
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s.to_ascii_uppercase().as_str() {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "DELETE" => HttpMethod::Delete,
            "HEAD" => HttpMethod::Head,
            "OPTIONS" => HttpMethod::Options,
            "PATCH" => HttpMethod::Patch,
            _ => return Err(format!("Unsupported HTTP method: {s}")),
        };

        Ok(method)
    }
}

impl From<HttpMethod> for http::Method {
    fn from(value: HttpMethod) -> Self {
        match value {
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Post => http::Method::POST,
            HttpMethod::Put => http::Method::PUT,
            HttpMethod::Delete => http::Method::DELETE,
            HttpMethod::Head => http::Method::HEAD,
            HttpMethod::Options => http::Method::OPTIONS,
            HttpMethod::Patch => http::Method::PATCH,
        }
    }
}

/// Either `"*"` or a list of origins.
pub type AnyOrUrlArray = AnyOrArray<Url>;

/// Either `"*"` or a list of methods.
pub type AnyOrHttpMethodArray = AnyOrArray<HttpMethod>;

/// Either `"*"` or a list of header names.
pub type AnyOrAsciiStringArray = AnyOrArray<AsciiString>;

/// A wildcard or an explicit list of values. A single string other than
/// `"*"` is read as a one-element list.
#[derive(Clone, Debug, PartialEq)]
pub enum AnyOrArray<T> {
    /// Matches everything.
    Any,
    /// Matches only the listed values.
    Explicit(Vec<T>),
}

struct AnyOrArrayVisitor<T>(PhantomData<T>);

impl<'de, T> serde::de::Visitor<'de> for AnyOrArrayVisitor<T>
where
    T: serde::Deserialize<'de> + FromStr<Err: fmt::Display>,
{
    type Value = AnyOrArray<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("the string \"*\" or an array of values")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        if value == "*" {
            return Ok(AnyOrArray::Any);
        }

        let value = value.parse::<T>().map_err(E::custom)?;

        Ok(AnyOrArray::Explicit(vec![value]))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let mut values = Vec::with_capacity(seq.size_hint().unwrap_or_default());

        while let Some(value) = seq.next_element()? {
            values.push(value);
        }

        Ok(AnyOrArray::Explicit(values))
    }
}

impl<'de, T> serde::Deserialize<'de> for AnyOrArray<T>
where
    T: serde::Deserialize<'de> + FromStr<Err: fmt::Display>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(AnyOrArrayVisitor(PhantomData))
    }
}

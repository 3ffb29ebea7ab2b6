use std::time::Duration;

use config::{AnyOrAsciiStringArray, AnyOrHttpMethodArray, AnyOrUrlArray, CorsConfig};
use http::{HeaderName, HeaderValue, Method, header::CONTENT_TYPE};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer, ExposeHeaders};

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(3600);

/// Builds the CORS layer from `[server.cors]`, or the browser-friendly
/// default when the section is absent: any origin, `GET`, `POST` and
/// `OPTIONS`, and the `Content-Type` header.
pub(super) fn layer(config: Option<&CorsConfig>) -> CorsLayer {
    match config {
        Some(config) => generate(config),
        None => CorsLayer::new()
            .allow_origin(AllowOrigin::any())
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE])
            .max_age(PREFLIGHT_MAX_AGE),
    }
}

fn generate(config: &CorsConfig) -> CorsLayer {
    let mut cors = CorsLayer::new().allow_credentials(config.allow_credentials);

    if let Some(origins) = &config.allow_origins {
        cors = cors.allow_origin(allow_origin(origins));
    }

    if let Some(max_age) = config.max_age {
        cors = cors.max_age(max_age);
    }

    if let Some(methods) = &config.allow_methods {
        cors = cors.allow_methods(match methods {
            AnyOrHttpMethodArray::Any => AllowMethods::any(),
            AnyOrHttpMethodArray::Explicit(methods) => {
                let mut methods: Vec<Method> = methods.iter().map(|method| Method::from(*method)).collect();

                if !methods.contains(&Method::OPTIONS) {
                    methods.push(Method::OPTIONS);
                }

                AllowMethods::list(methods)
            }
        });
    }

    if let Some(headers) = &config.allow_headers {
        cors = cors.allow_headers(match headers {
            AnyOrAsciiStringArray::Any => AllowHeaders::any(),
            AnyOrAsciiStringArray::Explicit(headers) => AllowHeaders::list(header_names(headers)),
        });
    }

    if let Some(headers) = &config.expose_headers {
        cors = cors.expose_headers(match headers {
            AnyOrAsciiStringArray::Any => ExposeHeaders::any(),
            AnyOrAsciiStringArray::Explicit(headers) => ExposeHeaders::list(header_names(headers)),
        });
    }

    cors
}

fn allow_origin(origins: &AnyOrUrlArray) -> AllowOrigin {
    match origins {
        AnyOrUrlArray::Any => AllowOrigin::any(),
        AnyOrUrlArray::Explicit(origins) => {
            let origins = origins.iter().filter_map(|origin| {
                let origin = &origin[..url::Position::BeforePath];

                match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        log::warn!("Ignoring CORS origin '{origin}': {e}");
                        None
                    }
                }
            });

            AllowOrigin::list(origins)
        }
    }
}

fn header_names<H>(headers: &[H]) -> Vec<HeaderName>
where
    H: AsRef<[u8]> + std::fmt::Display,
{
    headers
        .iter()
        .filter_map(|header| match HeaderName::from_bytes(header.as_ref()) {
            Ok(name) => Some(name),
            Err(e) => {
                log::warn!("Ignoring CORS header '{header}': {e}");
                None
            }
        })
        .collect()
}

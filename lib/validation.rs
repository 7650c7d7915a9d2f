use ipext::IpExt;
use thiserror::Error;
use url::Url;
use validator::ValidationError;

#[derive(Error, Debug)]
pub enum WebhookUrlValidationError {
    #[error("failed to parse url: {0}")]
    InvalidUrl(String),

    #[error("unsupported url scheme: {0}. only 'https' is supported")]
    UnsupportedScheme(String),

    #[error("failed to resolve ip of url '{0}'")]
    Dns(String),

    #[error("domain resolves to non-routable ip: {0}")]
    NonRoutableIp(String),
}

pub fn validation_error(
    code: &'static str,
    message: String,
) -> ValidationError {
    let mut validation_e = ValidationError::new(code);
    validation_e.message = Some(message.into());
    validation_e
}

/// Webhook target URLs must be HTTPS and resolve to a publicly routable IP;
/// used both at trigger registration and by the sender at delivery time.
pub fn validate_webhook_url(
    url_string: &str,
) -> Result<(), WebhookUrlValidationError> {
    let url = Url::parse(url_string)
        .map_err(|e| WebhookUrlValidationError::InvalidUrl(e.to_string()))?;
    validate_endpoint_scheme(url.scheme())?;
    validate_endpoint_url_public_ip(&url)?;
    Ok(())
}

fn validate_endpoint_url_public_ip(
    url: &Url,
) -> Result<(), WebhookUrlValidationError> {
    if std::env::var("TRIGGERS__SKIP_PUBLIC_IP_VALIDATION").is_ok() {
        return Ok(());
    }
    // This function does the DNS resolution. Unfortunately, it's synchronous.
    let addrs = url
        .socket_addrs(|| None)
        .map_err(|_| WebhookUrlValidationError::Dns(url.to_string()))?;

    // To error on the safe side, a hostname is valid only if ALL its IPs are
    // publicly addressable.
    for addr in addrs {
        if !IpExt::is_global(&addr.ip()) {
            return Err(WebhookUrlValidationError::NonRoutableIp(
                addr.ip().to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_endpoint_scheme(
    scheme: &str,
) -> Result<(), WebhookUrlValidationError> {
    if scheme == "https" {
        Ok(())
    } else {
        Err(WebhookUrlValidationError::UnsupportedScheme(
            scheme.to_string(),
        ))
    }
}

impl From<WebhookUrlValidationError> for ValidationError {
    fn from(value: WebhookUrlValidationError) -> Self {
        validation_error("TARGET_URI_VALIDATION_FAILED", value.to_string())
    }
}

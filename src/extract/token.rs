use crate::authz::AuthzError;
use crate::header::HEADER_AUTHORIZATION;
use crate::request::RequestView;

/// Returns the caller's credential exactly as sent. It is forwarded to the
/// permissions service, never inspected.
pub fn bearer_token<R>(req: &R) -> Result<&str, AuthzError>
where
    R: RequestView + ?Sized,
{
    let token = req.header(HEADER_AUTHORIZATION);
    if token.trim().is_empty() {
        return Err(AuthzError::NoValidToken);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use reqwest::Url;

    use crate::request::GatewayRequest;

    use super::*;

    fn request(headers: &[(&str, &str)]) -> GatewayRequest {
        let mut builder =
            GatewayRequest::builder("GET", Url::parse("http://gateway/v1/widgets").unwrap());
        for (key, value) in headers {
            builder = builder.header(key, *value);
        }
        builder.build()
    }

    #[test]
    fn test_bearer_token() {
        let req = request(&[("authorization", "Bearer abc")]);
        assert_eq!(bearer_token(&req).unwrap(), "Bearer abc");

        // Anything non-empty is accepted and forwarded verbatim
        let req = request(&[("AUTHORIZATION", "opaque-token")]);
        assert_eq!(bearer_token(&req).unwrap(), "opaque-token");
    }

    #[test]
    fn test_no_token() {
        for headers in [
            vec![],
            vec![("Authorization", "")],
            vec![("Authorization", "   ")],
            vec![("X-Authorization", "Bearer abc")],
        ] {
            let req = request(&headers);
            assert!(
                matches!(bearer_token(&req), Err(AuthzError::NoValidToken)),
                "headers {headers:?}"
            );
        }
    }
}

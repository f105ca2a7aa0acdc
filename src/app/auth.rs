use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::middleware::Next;
use actix_web::{web, Error, HttpResponse};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

const REALM: &str = "Basic realm=\"strategic-analyst\"";

/// HTTP Basic gate. Open when no credentials are configured.
#[derive(Clone, Default)]
pub struct AuthGate {
  credentials: Option<(String, String)>,
}

impl AuthGate {
  pub fn new(credentials: Option<(String, String)>) -> Self {
    AuthGate { credentials }
  }

  pub fn is_open(&self) -> bool {
    self.credentials.is_none()
  }

  pub fn authorize(&self, authorization: Option<&str>) -> bool {
    let (user, password) = match &self.credentials {
      Some(credentials) => credentials,
      None => return true,
    };

    let encoded = match authorization.and_then(|value| value.trim().strip_prefix("Basic ")) {
      Some(encoded) => encoded.trim(),
      None => return false,
    };
    let decoded = match STANDARD.decode(encoded).ok().and_then(|bytes| String::from_utf8(bytes).ok()) {
      Some(decoded) => decoded,
      None => return false,
    };

    match decoded.split_once(':') {
      Some((given_user, given_password)) => same_secret(given_user, user) & same_secret(given_password, password),
      None => false,
    }
  }
}

/// Constant-time comparison over fixed-length SHA-256 digests.
fn same_secret(given: &str, expected: &str) -> bool {
  let given = Sha256::digest(given.as_bytes());
  let expected = Sha256::digest(expected.as_bytes());
  given.iter().zip(expected.iter()).fold(0u8, |diff, (a, b)| diff | (a ^ b)) == 0
}

/// Rejects every request except the health check unless it carries the configured credentials.
pub async fn require_credentials<B: MessageBody>(req: ServiceRequest, next: Next<B>) -> Result<ServiceResponse<EitherBody<B>>, Error> {
  let authorized = match req.app_data::<web::Data<AuthGate>>() {
    Some(gate) if req.path() != "/" => {
      let authorization = req.headers().get(header::AUTHORIZATION).and_then(|value| value.to_str().ok());
      gate.authorize(authorization)
    }
    _ => true,
  };

  if !authorized {
    log::warn!("Rejected unauthenticated request to {}", req.path());
    let response = HttpResponse::Unauthorized()
      .insert_header((header::WWW_AUTHENTICATE, REALM))
      .json(serde_json::json!({"error": "authentication required"}));
    return Ok(req.into_response(response).map_into_right_body());
  }

  let response = next.call(req).await?;
  return Ok(response.map_into_left_body());
}

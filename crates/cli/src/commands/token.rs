//! Token inspection.

use chrono::Utc;

use harbor_core::TokenClaims;

use super::CliError;

/// Print the claims carried by an id token.
///
/// The signature is not checked; this is a debugging aid.
///
/// # Errors
///
/// Returns an error if the token cannot be decoded.
pub fn inspect(id_token: &str) -> Result<(), CliError> {
    let claims = TokenClaims::decode(id_token.trim())?;
    let now = Utc::now();

    println!("username:   {}", claims.username);
    println!("subject:    {}", claims.subject.as_deref().unwrap_or("-"));
    println!("email:      {}", claims.email.as_deref().unwrap_or("-"));
    println!("role:       {}", claims.role);
    println!("expires_at: {}", claims.expires_at.to_rfc3339());
    if claims.is_expired_at(now) {
        println!("status:     expired");
    } else {
        let remaining = claims.expires_at - now;
        println!("status:     valid for {} more minutes", remaining.num_minutes());
    }
    Ok(())
}

use argon2::{
    Algorithm, Argon2, Params, ParamsBuilder, PasswordHash, PasswordHasher, PasswordVerifier,
    Version, password_hash::SaltString,
};
use rand::RngCore;

use crate::auth::{AuthError, AuthResult};

const SALT_LEN: usize = 16;

/// Keyed password hashing for inbox passwords.
///
/// Argon2id keyed with the site-wide secret: a stored hash only verifies
/// under the same secret it was made with. Hashes are PHC strings, so the
/// salt travels inside the stored value and can be recovered with
/// [`PasswordService::parse_hash`].
#[derive(Clone)]
pub struct PasswordService {
    secret: Vec<u8>,
    params: Params,
}

/// Hash and salt recovered from a stored PHC string.
#[derive(Debug, Clone)]
pub struct ParsedHash {
    pub hash: String,
    pub salt: SaltString,
}

impl PasswordService {
    pub fn new(secret: impl Into<Vec<u8>>) -> AuthResult<Self> {
        let mut builder = ParamsBuilder::new();
        builder.m_cost(19 * 1024); // 19 MiB
        builder.t_cost(2);
        builder.p_cost(1);
        let params = builder.build().map_err(AuthError::from)?;
        Ok(Self::with_params(secret, params))
    }

    pub fn with_params(secret: impl Into<Vec<u8>>, params: Params) -> Self {
        Self {
            secret: secret.into(),
            params,
        }
    }

    fn argon2(&self) -> AuthResult<Argon2<'_>> {
        let argon2 = Argon2::new_with_secret(
            &self.secret,
            Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )?;
        Ok(argon2)
    }

    pub fn generate_salt() -> AuthResult<SaltString> {
        let mut salt_bytes = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        Ok(SaltString::encode_b64(&salt_bytes)?)
    }

    /// Hash `password`, reusing `salt` when given and drawing a fresh one
    /// otherwise.
    pub fn make_hash(&self, password: &str, salt: Option<&SaltString>) -> AuthResult<String> {
        let fresh;
        let salt = match salt {
            Some(salt) => salt,
            None => {
                fresh = Self::generate_salt()?;
                &fresh
            }
        };

        let hash = self
            .argon2()?
            .hash_password(password.as_bytes(), salt)
            .map_err(AuthError::from)?
            .to_string();
        Ok(hash)
    }

    /// Split a stored hash string into its hash and salt.
    pub fn parse_hash(encoded: &str) -> AuthResult<ParsedHash> {
        let parsed = PasswordHash::new(encoded)?;
        let salt = parsed.salt.ok_or(AuthError::MissingSalt)?;
        let hash = parsed.hash.map(|h| h.to_string()).unwrap_or_default();
        Ok(ParsedHash {
            hash,
            salt: SaltString::from_b64(salt.as_str())?,
        })
    }

    /// Compare `password` against a stored hash. An empty stored hash never
    /// matches.
    pub fn check_password(&self, password: &str, encoded: &str) -> AuthResult<bool> {
        if encoded.is_empty() {
            return Ok(false);
        }
        let parsed = PasswordHash::new(encoded)?;
        match self.argon2()?.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(AuthError::from(err)),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_service(secret: &str) -> PasswordService {
    let params = Params::new(1024, 1, 1, None).expect("valid test params");
    PasswordService::with_params(secret, params)
}

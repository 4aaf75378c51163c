//! Login challenges: proof that a client holds the private key behind a
//! registered public key.
//!
//! The server draws a one-time scalar `d` and sends `C = d·B`. It keeps
//! `E = d·U` for the user's public key `U = u·B`. The client answers with
//! `u·C`, which equals `E` only if it knows `u`.

use subtle::ConstantTimeEq;

use crate::{
    env::Environment,
    keys::{PrivateKey, PublicKey},
};

/// A pending challenge held by the verifier.
///
/// Single use: [`Challenge::check`] consumes it.
#[derive(Debug)]
pub struct Challenge {
    point: PublicKey,
    expected: PublicKey,
}

impl Challenge {
    /// Issue a fresh challenge for `user`.
    pub fn issue(env: &impl Environment, user: &PublicKey) -> Self {
        let nonce = PrivateKey::generate(env);
        Self { point: nonce.public_key(), expected: nonce.challenge_response(user) }
    }

    /// The point to send to the client.
    pub fn point(&self) -> PublicKey {
        self.point
    }

    /// Check the client's response in constant time.
    pub fn check(self, response: &PublicKey) -> bool {
        let accepted: bool = self.expected.as_bytes()[..].ct_eq(&response.as_bytes()[..]).into();
        if !accepted {
            tracing::debug!("challenge response rejected");
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::testing::SeededEnv;

    #[test]
    fn owner_passes_challenge() {
        let env = SeededEnv::new(1);
        let user = PrivateKey::generate(&env);

        let challenge = Challenge::issue(&env, &user.public_key());
        let response = user.challenge_response(&challenge.point());

        assert!(challenge.check(&response));
    }

    #[test]
    fn other_key_fails_challenge() {
        let env = SeededEnv::new(2);
        let user = PrivateKey::generate(&env);
        let impostor = PrivateKey::generate(&env);

        let challenge = Challenge::issue(&env, &user.public_key());
        let response = impostor.challenge_response(&challenge.point());

        assert!(!challenge.check(&response));
    }

    #[test]
    fn challenges_are_fresh() {
        let env = SeededEnv::new(3);
        let user = PrivateKey::generate(&env).public_key();

        let first = Challenge::issue(&env, &user);
        let second = Challenge::issue(&env, &user);

        assert_ne!(first.point(), second.point());
    }

    #[test]
    fn replayed_response_fails_new_challenge() {
        let env = SeededEnv::new(4);
        let user = PrivateKey::generate(&env);

        let first = Challenge::issue(&env, &user.public_key());
        let response = user.challenge_response(&first.point());
        assert!(first.check(&response));

        let second = Challenge::issue(&env, &user.public_key());
        assert!(!second.check(&response));
    }
}

//! Shared RSA key material for unit tests.

use std::sync::OnceLock;

use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::EncodePublicKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha1::Sha1;

use crate::codec::base64_encode;
use crate::crypto::{PublicKey, PurchaseVerifier};

fn private_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| {
        RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("generate test key")
    })
}

pub(crate) fn test_key() -> PublicKey {
    let der = private_key()
        .to_public_key()
        .to_public_key_der()
        .expect("encode test key");
    PublicKey::from_der(der.as_bytes()).expect("parse test key")
}

pub(crate) fn test_key_base64() -> String {
    test_key().to_base64()
}

pub(crate) fn test_verifier() -> PurchaseVerifier {
    PurchaseVerifier::new(test_key())
}

pub(crate) fn sign(data: &str) -> String {
    let signer = SigningKey::<Sha1>::new(private_key().clone());
    base64_encode(signer.sign(data.as_bytes()).to_vec())
}

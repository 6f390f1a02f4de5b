use uuid::Uuid;

/// Pluggable payload transform applied to message bodies at the storage
/// boundary. The core never depends on a concrete algorithm; swapping the
/// implementation (e.g. for a per-conversation cipher) is a wiring change in
/// main.
pub trait MessageCrypto: Send + Sync {
    fn encrypt(&self, conversation_id: Uuid, plaintext: &str) -> String;
    fn decrypt(&self, conversation_id: Uuid, ciphertext: &str) -> String;
}

/// Identity transform: bodies are stored as-is. This is the default wiring;
/// at-rest protection is delegated to the database layer.
pub struct NoopCrypto;

impl MessageCrypto for NoopCrypto {
    fn encrypt(&self, _conversation_id: Uuid, plaintext: &str) -> String {
        plaintext.to_string()
    }

    fn decrypt(&self, _conversation_id: Uuid, ciphertext: &str) -> String {
        ciphertext.to_string()
    }
}

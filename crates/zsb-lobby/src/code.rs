use zsb_core::LOBBY_CODE_ALPHABET;
use zsb_core::LOBBY_CODE_LENGTH;

/// Generates a join code from the unambiguous alphabet (no 0/O, no 1/I).
/// Codes are sparse in a 32^8 space, which is what makes prefix-tolerant
/// joining safe.
pub fn generate_code() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    (0..LOBBY_CODE_LENGTH)
        .map(|_| LOBBY_CODE_ALPHABET[rng.random_range(0..LOBBY_CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn codes_use_only_the_unambiguous_alphabet() {
        for _ in 0..64 {
            let code = generate_code();
            assert_eq!(code.len(), LOBBY_CODE_LENGTH);
            assert!(code.bytes().all(|b| LOBBY_CODE_ALPHABET.contains(&b)));
        }
    }
}

//! Share-code generation.

use rand::{rngs::OsRng, Rng};

use crate::command::SHARE_CODE_LEN;

const LEADING: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const BODY: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate a share code: one uppercase letter followed by uppercase
/// alphanumerics. The leading letter keeps codes apart from numeric
/// delete commands.
pub fn generate() -> String {
    generate_with(&mut OsRng, SHARE_CODE_LEN)
}

pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    let mut code = String::with_capacity(len);
    if len == 0 {
        return code;
    }
    code.push(LEADING[rng.gen_range(0..LEADING.len())] as char);
    for _ in 1..len {
        code.push(BODY[rng.gen_range(0..BODY.len())] as char);
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;

    #[test]
    fn codes_have_fixed_shape() {
        for _ in 0..200 {
            let code = generate();
            assert_eq!(code.len(), SHARE_CODE_LEN);
            let mut chars = code.chars();
            assert!(chars.next().is_some_and(|c| c.is_ascii_uppercase()));
            assert!(chars.all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn generated_codes_parse_as_redemptions() {
        for _ in 0..50 {
            let code = generate();
            assert_eq!(Command::parse(&code), Command::RedeemShareCode(code.clone()));
        }
    }

    #[test]
    fn consecutive_codes_differ() {
        assert_ne!(generate(), generate());
    }
}

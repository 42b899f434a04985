use rand::Rng;

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 8;

/// 生成折扣码：可选前缀 + 8 位大写字母数字
pub fn generate_discount_code(prefix: Option<&str>) -> String {
    let mut rng = rand::thread_rng();
    let body: String = (0..CODE_LEN)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect();

    match prefix.map(str::trim).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}-{}", prefix.to_uppercase(), body),
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_discount_code_shape() {
        let code = generate_discount_code(None);
        assert_eq!(code.len(), CODE_LEN);
        assert!(
            code.chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn test_generate_discount_code_with_prefix() {
        let code = generate_discount_code(Some("spring"));
        assert!(code.starts_with("SPRING-"));
        assert_eq!(code.len(), "SPRING-".len() + CODE_LEN);

        // 空白前缀视为无前缀
        assert_eq!(generate_discount_code(Some("  ")).len(), CODE_LEN);
    }
}

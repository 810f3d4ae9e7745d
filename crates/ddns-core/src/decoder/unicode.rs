/// Reverse `\uXXXX` escapes into UTF-8 for display
///
/// Only Basic Multilingual Plane code points are decoded; surrogate halves and
/// malformed escapes are copied through verbatim. Never feed the output back
/// into matching logic.
pub fn decode_unicode_escapes(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut copied_to = 0;
    let mut i = 0;

    while i + 6 <= bytes.len() {
        if bytes[i] == b'\\' && bytes[i + 1] == b'u' {
            let decoded = std::str::from_utf8(&bytes[i + 2..i + 6])
                .ok()
                .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .and_then(char::from_u32);

            if let Some(ch) = decoded {
                out.push_str(&input[copied_to..i]);
                out.push(ch);
                i += 6;
                copied_to = i;
                continue;
            }
        }
        i += 1;
    }

    out.push_str(&input[copied_to..]);
    out
}

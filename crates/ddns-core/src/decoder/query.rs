use crate::error::ParseError;
use std::borrow::Cow;

/// Borrowed window over a decoded response body
///
/// Queries scan the bytes for a quoted key followed (whitespace-tolerant) by
/// `:` and resolve to the first structural match in document order. Duplicate
/// keys therefore resolve to their first occurrence. Sub-objects and array
/// elements are returned as narrower views over the same buffer; only the
/// values handed back to the caller are allocated.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct JsonView<'a> {
    bytes: &'a [u8],
    /// Absolute position of `bytes[0]` in the root buffer
    offset: usize,
}

impl std::fmt::Debug for JsonView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonView")
            .field("offset", &self.offset)
            .field("len", &self.bytes.len())
            .field("text", &self.as_str())
            .finish()
    }
}

impl<'a> JsonView<'a> {
    /// View over a whole response body
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// Raw bytes covered by this view
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Text of this view, lossily decoded
    pub fn as_str(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.bytes)
    }

    /// Position of this view inside the root buffer
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length of this view in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the view is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn sub(&self, start: usize, end: usize) -> JsonView<'a> {
        JsonView {
            bytes: &self.bytes[start..end],
            offset: self.offset + start,
        }
    }

    /// String value of the first `"key":` occurrence
    ///
    /// Simple escapes are resolved; `\uXXXX` sequences are returned verbatim.
    pub fn get_string(&self, key: &str) -> Result<String, ParseError> {
        let start = self.first_value(key)?;
        if self.bytes[start] != b'"' {
            return Err(type_mismatch(key, "string"));
        }
        let end = string_end(self.bytes, start).ok_or_else(|| {
            ParseError::InvalidFormat(format!(
                "unterminated string for \"{}\" at offset {}",
                key,
                self.offset + start
            ))
        })?;
        unescape(&self.bytes[start + 1..end])
    }

    /// Integer value of the first `"key":` occurrence
    pub fn get_int(&self, key: &str) -> Result<i64, ParseError> {
        let start = self.first_value(key)?;
        let rest = &self.bytes[start..];
        let digits_from = usize::from(rest.first() == Some(&b'-'));
        let len = rest[digits_from..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        let end = digits_from + len;

        if len == 0 || !is_delimiter(rest.get(end)) {
            return Err(type_mismatch(key, "integer"));
        }

        std::str::from_utf8(&rest[..end])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ParseError::InvalidFormat(format!("integer out of range for \"{}\"", key)))
    }

    /// Boolean value of the first `"key":` occurrence
    pub fn get_bool(&self, key: &str) -> Result<bool, ParseError> {
        let start = self.first_value(key)?;
        let rest = &self.bytes[start..];

        for (literal, value) in [(&b"true"[..], true), (&b"false"[..], false)] {
            if rest.starts_with(literal) && is_delimiter(rest.get(literal.len())) {
                return Ok(value);
            }
        }
        Err(type_mismatch(key, "boolean"))
    }

    /// Object value of the first `"key":{` occurrence, braces included
    pub fn get_object(&self, key: &str) -> Result<JsonView<'a>, ParseError> {
        let start = self.first_value_shaped(key, b'{', "object")?;
        let end = balanced_end(self.bytes, start).ok_or_else(|| {
            ParseError::InvalidFormat(format!("unbalanced braces in \"{}\"", key))
        })?;
        Ok(self.sub(start, end + 1))
    }

    /// First element of an array carrying `"match_key":"match_value"`
    ///
    /// With an empty `array_key` the view itself is searched: a root array is
    /// iterated element by element, a root object is treated as the single
    /// candidate. Matching compares raw text; no unescaping is performed.
    pub fn find_in_array(
        &self,
        array_key: &str,
        match_key: &str,
        match_value: &str,
    ) -> Result<JsonView<'a>, ParseError> {
        let not_found = || ParseError::ElementNotFound {
            key: match_key.to_string(),
            value: match_value.to_string(),
        };

        let array_start = if array_key.is_empty() {
            let root = skip_ws(self.bytes, 0);
            match self.bytes.get(root) {
                Some(b'[') => root,
                Some(b'{') => {
                    let end = balanced_end(self.bytes, root).ok_or_else(|| {
                        ParseError::InvalidFormat("unbalanced root object".to_string())
                    })?;
                    let candidate = self.sub(root, end + 1);
                    return if candidate.contains_pair(match_key, match_value) {
                        Ok(candidate)
                    } else {
                        Err(not_found())
                    };
                }
                _ => return Err(ParseError::InvalidFormat("body is not an object or array".to_string())),
            }
        } else {
            self.first_value_shaped(array_key, b'[', "array")?
        };

        self.search_elements(array_start, match_key, match_value)?
            .ok_or_else(not_found)
    }

    /// [`find_in_array`](Self::find_in_array) followed by [`get_string`](Self::get_string)
    pub fn get_string_from_array(
        &self,
        array_key: &str,
        match_key: &str,
        match_value: &str,
        field: &str,
    ) -> Result<String, ParseError> {
        self.find_in_array(array_key, match_key, match_value)?
            .get_string(field)
    }

    /// Same as [`get_string_from_array`](Self::get_string_from_array) without naming the array
    ///
    /// Covers both address-source shapes: a bare root array, or an object
    /// wrapping one. For a root object every array-valued member is searched
    /// in document order and the first matching element wins; an object
    /// without array members is itself the only candidate.
    pub fn quick_get_string_from_array(
        &self,
        match_key: &str,
        match_value: &str,
        field: &str,
    ) -> Result<String, ParseError> {
        let root = skip_ws(self.bytes, 0);
        if self.bytes.get(root) == Some(&b'{') {
            let close = balanced_end(self.bytes, root).ok_or_else(|| {
                ParseError::InvalidFormat("unbalanced root object".to_string())
            })?;
            let arrays = member_arrays(self.bytes, root, close);
            if !arrays.is_empty() {
                for array_start in arrays {
                    if let Some(element) = self.search_elements(array_start, match_key, match_value)? {
                        return element.get_string(field);
                    }
                }
                return Err(ParseError::ElementNotFound {
                    key: match_key.to_string(),
                    value: match_value.to_string(),
                });
            }
        }
        self.get_string_from_array("", match_key, match_value, field)
    }

    /// Walk the top-level elements of the array opening at `array_start`
    fn search_elements(
        &self,
        array_start: usize,
        match_key: &str,
        match_value: &str,
    ) -> Result<Option<JsonView<'a>>, ParseError> {
        let bytes = self.bytes;
        let array_end = balanced_end(bytes, array_start)
            .ok_or_else(|| ParseError::InvalidFormat("unbalanced array".to_string()))?;

        let mut i = array_start + 1;
        while i < array_end {
            i = skip_ws(bytes, i);
            match bytes[i] {
                b',' => i += 1,
                b']' => break,
                b'{' => {
                    let end = balanced_end(bytes, i).ok_or_else(|| {
                        ParseError::InvalidFormat("unbalanced array element".to_string())
                    })?;
                    let element = self.sub(i, end + 1);
                    if element.contains_pair(match_key, match_value) {
                        return Ok(Some(element));
                    }
                    i = end + 1;
                }
                b'[' => {
                    i = balanced_end(bytes, i).map_or(array_end, |end| end + 1);
                }
                b'"' => {
                    i = string_end(bytes, i).map_or(array_end, |end| end + 1);
                }
                _ => {
                    // Scalars: numbers, literals
                    while i < array_end && bytes[i] != b',' {
                        i += 1;
                    }
                }
            }
        }
        Ok(None)
    }

    /// Whether the raw text holds `"key"` `:` `"value"` anywhere
    fn contains_pair(&self, key: &str, value: &str) -> bool {
        let mut from = 0;
        while let Some((next, start)) = self.next_value(key, from) {
            let rest = &self.bytes[start..];
            if rest.first() == Some(&b'"')
                && rest[1..].starts_with(value.as_bytes())
                && rest.get(1 + value.len()) == Some(&b'"')
            {
                return true;
            }
            from = next;
        }
        false
    }

    /// Value start of the first structural `"key":` occurrence
    fn first_value(&self, key: &str) -> Result<usize, ParseError> {
        match self.next_value(key, 0) {
            Some((_, start)) if start < self.bytes.len() => Ok(start),
            Some(_) => Err(ParseError::InvalidFormat(format!(
                "missing value for \"{}\"",
                key
            ))),
            None => Err(ParseError::KeyNotFound(key.to_string())),
        }
    }

    /// Value start of the first `"key":` occurrence whose value opens with `open`
    fn first_value_shaped(
        &self,
        key: &str,
        open: u8,
        expected: &'static str,
    ) -> Result<usize, ParseError> {
        let mut seen = false;
        let mut from = 0;
        while let Some((next, start)) = self.next_value(key, from) {
            if self.bytes.get(start) == Some(&open) {
                return Ok(start);
            }
            seen = true;
            from = next;
        }
        if seen {
            Err(type_mismatch(key, expected))
        } else {
            Err(ParseError::KeyNotFound(key.to_string()))
        }
    }

    /// Next structural occurrence of `"key"` at or after `from`
    ///
    /// Returns `(resume, value_start)`; occurrences not followed by `:` (for
    /// example the same text used as a value) are skipped.
    fn next_value(&self, key: &str, mut from: usize) -> Option<(usize, usize)> {
        let bytes = self.bytes;
        let key = key.as_bytes();
        let needle_len = key.len() + 2;

        while from + needle_len <= bytes.len() {
            let hit = from
                + bytes[from..].windows(needle_len).position(|w| {
                    w[0] == b'"' && w[needle_len - 1] == b'"' && &w[1..needle_len - 1] == key
                })?;
            let after = hit + needle_len;
            let colon = skip_ws(bytes, after);
            if bytes.get(colon) == Some(&b':') {
                return Some((after, skip_ws(bytes, colon + 1)));
            }
            from = hit + 1;
        }
        None
    }
}

fn type_mismatch(key: &str, expected: &'static str) -> ParseError {
    ParseError::TypeMismatch {
        key: key.to_string(),
        expected,
    }
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn is_delimiter(byte: Option<&u8>) -> bool {
    match byte {
        None => true,
        Some(b) => b.is_ascii_whitespace() || matches!(b, b',' | b'}' | b']'),
    }
}

/// Index of the quote closing the string that opens at `start`
fn string_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Index of the bracket closing the one at `start`; brackets inside strings are ignored
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = string_end(bytes, i)?,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Opening offsets of the array-valued members of the object spanning `open..=close`
fn member_arrays(bytes: &[u8], open: usize, close: usize) -> Vec<usize> {
    let mut arrays = Vec::new();
    let mut i = open + 1;
    while i < close {
        match bytes[i] {
            b'"' => match string_end(bytes, i) {
                Some(end) => i = end,
                None => break,
            },
            b':' => {
                let value = skip_ws(bytes, i + 1);
                if bytes.get(value) == Some(&b'[') {
                    arrays.push(value);
                }
                i = value;
                continue;
            }
            b'{' | b'[' => match balanced_end(bytes, i) {
                Some(end) => i = end,
                None => break,
            },
            _ => {}
        }
        i += 1;
    }
    arrays
}

fn unescape(raw: &[u8]) -> Result<String, ParseError> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\\' && i + 1 < raw.len() {
            let resolved = match raw[i + 1] {
                b'"' => Some(b'"'),
                b'\\' => Some(b'\\'),
                b'/' => Some(b'/'),
                b'b' => Some(0x08),
                b'f' => Some(0x0c),
                b'n' => Some(b'\n'),
                b'r' => Some(b'\r'),
                b't' => Some(b'\t'),
                _ => None,
            };
            if let Some(byte) = resolved {
                out.push(byte);
                i += 2;
                continue;
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    String::from_utf8(out).map_err(|_| ParseError::InvalidFormat("string is not UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(text: &str) -> JsonView<'_> {
        JsonView::new(text.as_bytes())
    }

    #[test]
    fn root_object_is_its_own_element() {
        let body = r#"{"a":1,"Type":"IPv4","Ip":"203.0.113.5"}"#;
        let element = view(body).find_in_array("", "Type", "IPv4").unwrap();
        assert_eq!(element.get_string("Ip").unwrap(), "203.0.113.5");
    }

    #[test]
    fn first_matching_element_wins() {
        let body = r#"[{"Type":"IPv6","Ip":"::1"},{"Type":"IPv4","Ip":"192.168.1.1"},{"Type":"IPv4","Ip":"10.0.0.1"}]"#;
        let element = view(body).find_in_array("", "Type", "IPv4").unwrap();
        assert_eq!(element.get_string("Ip").unwrap(), "192.168.1.1");
        assert_eq!(element.offset(), body.find(r#"{"Type":"IPv4""#).unwrap());
    }

    #[test]
    fn whitespace_around_punctuation_is_tolerated() {
        let spaced = view("{\"Type\" :\n \"IPv4\",\"Ip\":\"1.2.3.4\"}");
        let compact = view(r#"{"Type":"IPv4","Ip":"1.2.3.4"}"#);

        for v in [spaced, compact] {
            let element = v.find_in_array("", "Type", "IPv4").unwrap();
            assert_eq!(element.get_string("Ip").unwrap(), "1.2.3.4");
        }
    }

    #[test]
    fn named_array_inside_wrapper() {
        let body = r#"{"code":0,"data":[{"Ip":"::2","Type":"IPv6"},{"Ip":"198.51.100.9","Type":"IPv4"}]}"#;
        let v = view(body);
        assert_eq!(
            v.get_string_from_array("data", "Type", "IPv4", "Ip").unwrap(),
            "198.51.100.9"
        );
        assert_eq!(
            v.quick_get_string_from_array("Type", "IPv4", "Ip").unwrap(),
            "198.51.100.9"
        );
    }

    #[test]
    fn quick_lookup_on_root_array() {
        let body = r#" [ {"Ip":"203.0.113.77","Type":"IPv4"} ] "#;
        assert_eq!(
            view(body)
                .quick_get_string_from_array("Type", "IPv4", "Ip")
                .unwrap(),
            "203.0.113.77"
        );
    }

    #[test]
    fn quick_lookup_skips_unrelated_arrays() {
        let body = r#"{"meta":{"hints":["geo"]},"tags":["edge"],"data":[{"Type":"IPv4","Ip":"203.0.113.5"}]}"#;
        let v = view(body);
        assert_eq!(
            v.quick_get_string_from_array("Type", "IPv4", "Ip").unwrap(),
            v.get_string_from_array("data", "Type", "IPv4", "Ip").unwrap()
        );
        assert_eq!(
            v.quick_get_string_from_array("Type", "IPv4", "Ip").unwrap(),
            "203.0.113.5"
        );

        let missing = r#"{"tags":["edge"],"data":[{"Type":"IPv6","Ip":"::1"}]}"#;
        assert!(matches!(
            view(missing).quick_get_string_from_array("Type", "IPv4", "Ip"),
            Err(ParseError::ElementNotFound { .. })
        ));
    }

    #[test]
    fn missing_element_and_key() {
        let body = r#"[{"Type":"IPv6","Ip":"::1"}]"#;
        assert_eq!(
            view(body).find_in_array("", "Type", "IPv4").unwrap_err(),
            ParseError::ElementNotFound {
                key: "Type".into(),
                value: "IPv4".into()
            }
        );
        assert_eq!(
            view(body).get_string("Missing").unwrap_err(),
            ParseError::KeyNotFound("Missing".into())
        );
        assert!(matches!(
            view(r#"{"list":[]}"#).find_in_array("records", "name", "www"),
            Err(ParseError::KeyNotFound(_))
        ));
    }

    #[test]
    fn match_value_must_be_exact() {
        let body = r#"[{"Type":"IPv4-mapped","Ip":"::ffff:1.2.3.4"},{"Type":"IPv4","Ip":"1.2.3.4"}]"#;
        let element = view(body).find_in_array("", "Type", "IPv4").unwrap();
        assert_eq!(element.get_string("Ip").unwrap(), "1.2.3.4");
    }

    #[test]
    fn key_text_used_as_value_is_skipped() {
        let body = r#"{"label":"Ip","Ip":"192.0.2.1"}"#;
        assert_eq!(view(body).get_string("Ip").unwrap(), "192.0.2.1");
    }

    #[test]
    fn duplicate_keys_resolve_to_first() {
        let body = r#"{"ttl":300,"ttl":600}"#;
        assert_eq!(view(body).get_int("ttl").unwrap(), 300);
    }

    #[test]
    fn typed_getters() {
        let body = r#"{"ttl": 600, "neg":-5, "ok" : true, "off":false, "name":"www", "big":99999999999999999999}"#;
        let v = view(body);
        assert_eq!(v.get_int("ttl").unwrap(), 600);
        assert_eq!(v.get_int("neg").unwrap(), -5);
        assert!(v.get_bool("ok").unwrap());
        assert!(!v.get_bool("off").unwrap());

        assert!(matches!(v.get_int("name"), Err(ParseError::TypeMismatch { .. })));
        assert!(matches!(v.get_bool("ttl"), Err(ParseError::TypeMismatch { .. })));
        assert!(matches!(v.get_string("ttl"), Err(ParseError::TypeMismatch { .. })));
        assert!(matches!(v.get_int("big"), Err(ParseError::InvalidFormat(_))));
    }

    #[test]
    fn quoted_number_is_not_an_integer() {
        let v = view(r#"{"ttl":"600"}"#);
        assert!(matches!(v.get_int("ttl"), Err(ParseError::TypeMismatch { .. })));
        assert_eq!(v.get_string("ttl").unwrap(), "600");
    }

    #[test]
    fn unterminated_string_is_invalid_format() {
        let v = view(r#"{"Ip":"1.2.3.4"#);
        assert!(matches!(v.get_string("Ip"), Err(ParseError::InvalidFormat(_))));
    }

    #[test]
    fn escapes_are_resolved_except_unicode() {
        let v = view(r#"{"message":"a \"quoted\" \/path\/ \u64cd"}"#);
        assert_eq!(
            v.get_string("message").unwrap(),
            r#"a "quoted" /path/ \u64cd"#
        );
    }

    #[test]
    fn get_object_returns_sub_view() {
        let body = r#"{"records":[{"status":"enabled"}],"status":{"code":"1","message":"{not a brace}"},"tail":1}"#;
        let v = view(body);
        let status = v.get_object("status").unwrap();

        assert_eq!(status.as_str(), r#"{"code":"1","message":"{not a brace}"}"#);
        assert_eq!(status.offset(), body.find(r#"{"code""#).unwrap());
        assert_eq!(status.get_string("code").unwrap(), "1");
        assert!(status.get_int("tail").is_err());
    }

    #[test]
    fn get_object_shape_errors() {
        assert!(matches!(
            view(r#"{"status":"enabled"}"#).get_object("status"),
            Err(ParseError::TypeMismatch { .. })
        ));
        assert!(matches!(
            view(r#"{"status":{"code":"1""#).get_object("status"),
            Err(ParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            view("{}").get_object("status"),
            Err(ParseError::KeyNotFound(_))
        ));
    }

    #[test]
    fn elements_with_nested_arrays_and_scalars_are_skipped() {
        let body = r#"{"records":[1,"x",[{"name":"www"}],{"name":"mail","type":"A"},{"name":"www","type":"A","value":"1.2.3.4"}]}"#;
        let element = view(body).find_in_array("records", "name", "www").unwrap();
        assert_eq!(element.get_string("value").unwrap(), "1.2.3.4");
    }

    #[test]
    fn unbalanced_array_is_invalid_format() {
        let body = r#"{"records":[{"name":"www"}"#;
        assert!(matches!(
            view(body).find_in_array("records", "name", "www"),
            Err(ParseError::InvalidFormat(_))
        ));
    }
}

//! Define-call wrapping and line accounting.
//!
//! A wrapped module is a single top-level `__d(…)` call whose factory holds
//! the lowered body. The wrapper carries no module id or dependency vector;
//! the serializer splices that tail in later, after ids are known, without
//! disturbing any byte that precedes the closing parenthesis.

use crate::mapping::RawMapping;

/// The factory's positional parameters, in the exact order the in-bundle
/// runtime supplies them.
pub const MODULE_FACTORY_PARAMS: &str =
    "global, _$$_REQUIRE, _$$_IMPORT_DEFAULT, _$$_IMPORT_ALL, module, exports, _dependencyMap";

/// Wrap a lowered module body. The result always ends with `})` so the
/// serializer can locate the splice point structurally.
pub fn wrap_module(body: &str) -> String {
    let body = body.strip_suffix('\n').unwrap_or(body);
    format!("__d(function ({MODULE_FACTORY_PARAMS}) {{\n{body}\n}})")
}

/// Count lines the way the serializer concatenates them: `\r\n`, `\r`, `\n`,
/// U+2028 and U+2029 all terminate a line, and one trailing terminator is
/// stripped before counting.
pub fn count_lines(code: &str) -> u32 {
    if code.is_empty() {
        return 1;
    }
    let stripped = strip_trailing_terminator(code);
    let mut count: u32 = 1;
    let mut chars = stripped.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                count += 1;
            }
            '\n' | '\u{2028}' | '\u{2029}' => count += 1,
            _ => {}
        }
    }
    count
}

fn strip_trailing_terminator(code: &str) -> &str {
    for terminator in ["\r\n", "\n", "\r", "\u{2028}", "\u{2029}"] {
        if let Some(stripped) = code.strip_suffix(terminator) {
            return stripped;
        }
    }
    code
}

/// Byte length of the last line of `code`.
fn last_line_len(code: &str) -> u32 {
    let start = code
        .rfind(['\n', '\r', '\u{2028}', '\u{2029}'])
        .map(|i| i + 1)
        .unwrap_or(0);
    (code.len() - start) as u32
}

/// Line-identity raw mappings for a wrapped module.
///
/// The built-in front-end rewrites within lines, so body line `i` of the
/// wrapped code corresponds to source line `i`; the wrapper header shifts
/// everything down by one. A terminating mapping one column past the end of
/// the last line makes out-of-bounds lookups resolve to nothing instead of
/// aliasing the final real mapping.
pub fn line_identity_mappings(source_line_count: u32, wrapped: &str) -> Vec<RawMapping> {
    let total_lines = count_lines(wrapped);
    let mut mappings = Vec::with_capacity(source_line_count as usize + 1);
    for line in 1..=source_line_count {
        mappings.push(RawMapping::source(line + 1, 0, line, 0));
    }
    mappings.push(RawMapping::generated(total_lines, last_line_len(wrapped)));
    mappings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_shape() {
        let wrapped = wrap_module("console.log('hi');");
        assert!(wrapped.starts_with(
            "__d(function (global, _$$_REQUIRE, _$$_IMPORT_DEFAULT, _$$_IMPORT_ALL, module, exports, _dependencyMap) {"
        ));
        assert!(wrapped.ends_with("})"));
        assert!(wrapped.contains("\nconsole.log('hi');\n"));
    }

    #[test]
    fn test_wrap_strips_one_trailing_newline() {
        let a = wrap_module("x;\n");
        let b = wrap_module("x;");
        assert_eq!(a, b);
    }

    #[test]
    fn test_count_lines_separators() {
        assert_eq!(count_lines("a"), 1);
        assert_eq!(count_lines("a\nb"), 2);
        assert_eq!(count_lines("a\r\nb\rc"), 3);
        assert_eq!(count_lines("a\u{2028}b\u{2029}c"), 3);
    }

    #[test]
    fn test_count_lines_strips_trailing_terminator() {
        assert_eq!(count_lines("a\n"), 1);
        assert_eq!(count_lines("a\r\n"), 1);
        assert_eq!(count_lines("a\nb\n"), 2);
    }

    #[test]
    fn test_wrapped_line_count() {
        // Header + 2 body lines + footer.
        let wrapped = wrap_module("const a = 1;\nconst b = 2;");
        assert_eq!(count_lines(&wrapped), 4);
    }

    #[test]
    fn test_line_identity_mappings() {
        let wrapped = wrap_module("const a = 1;\nconst b = 2;");
        let mappings = line_identity_mappings(2, &wrapped);

        // Two source lines plus the terminator.
        assert_eq!(mappings.len(), 3);
        assert_eq!(mappings[0], RawMapping::source(2, 0, 1, 0));
        assert_eq!(mappings[1], RawMapping::source(3, 0, 2, 0));

        let terminator = &mappings[2];
        assert!(!terminator.has_source());
        assert_eq!(terminator.generated_line, 4);
        assert_eq!(terminator.generated_column, 2); // past "})"
    }

    #[test]
    fn test_mappings_nondecreasing() {
        let wrapped = wrap_module("a;\nb;\nc;");
        let mappings = line_identity_mappings(3, &wrapped);
        for pair in mappings.windows(2) {
            let a = (pair[0].generated_line, pair[0].generated_column);
            let b = (pair[1].generated_line, pair[1].generated_column);
            assert!(a <= b);
        }
    }
}

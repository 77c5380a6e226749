//! ESM-to-runtime lowering.
//!
//! Rewrites import/export syntax and `require` calls onto the in-bundle
//! runtime's calling convention, assigning each distinct specifier a
//! dependency slot. Rewrites are line-preserving: every edited span is
//! replaced by text carrying the same number of newlines, so the i-th line
//! of the lowered body still corresponds to the i-th line of the source.
//! Locally re-exported bindings are assigned on a single appended line.

use std::path::Path;

use indexmap::IndexMap;

use crate::scanner::{tokenize, Token, TokenKind};
use crate::wrap::count_lines;
use crate::{Result, TransformError};

#[derive(Debug)]
pub struct LoweredModule {
    pub body: String,
    /// Distinct specifiers in slot order; slot `i` is addressed in the
    /// lowered code as `_dependencyMap[i]`.
    pub dependencies: Vec<String>,
    /// Line count of the original source, before the appended exports line.
    pub source_line_count: u32,
}

struct Edit {
    start: usize,
    end: usize,
    replacement: String,
}

struct Lowerer<'a> {
    path: &'a Path,
    source: &'a str,
    tokens: Vec<Token>,
    dev: bool,
    slots: IndexMap<String, usize>,
    edits: Vec<Edit>,
    appended_exports: Vec<String>,
    require_shadowed: bool,
}

pub fn lower(path: &Path, source: &str, dev: bool) -> Result<LoweredModule> {
    let tokens = tokenize(source);
    let require_shadowed = detect_require_shadowing(source, &tokens);
    if require_shadowed {
        tracing::debug!(path = %path.display(), "local `require` binding; skipping require collection");
    }

    let mut lowerer = Lowerer {
        path,
        source,
        tokens,
        dev,
        slots: IndexMap::new(),
        edits: Vec::new(),
        appended_exports: Vec::new(),
        require_shadowed,
    };
    lowerer.run()?;
    Ok(lowerer.finish())
}

/// A local binding of `require` disables require collection for the whole
/// file; scope-accurate shadowing belongs to the external AST pipeline.
fn detect_require_shadowing(source: &str, tokens: &[Token]) -> bool {
    tokens.windows(2).any(|pair| {
        let decl = pair[0].text(source);
        matches!(decl, "var" | "let" | "const" | "function")
            && matches!(pair[0].kind, TokenKind::Ident)
            && pair[1].is_ident(source, "require")
    })
}

impl<'a> Lowerer<'a> {
    fn run(&mut self) -> Result<()> {
        let mut i = 0;
        while i < self.tokens.len() {
            let tok = &self.tokens[i];
            if matches!(tok.kind, TokenKind::Ident) && !self.is_property_access(i) {
                match tok.text(self.source) {
                    "import" => {
                        i = self.lower_import(i)?;
                        continue;
                    }
                    "export" => {
                        i = self.lower_export(i)?;
                        continue;
                    }
                    "require" if !self.require_shadowed => {
                        i = self.lower_require(i)?;
                        continue;
                    }
                    _ => {}
                }
            }
            i += 1;
        }
        Ok(())
    }

    fn finish(self) -> LoweredModule {
        let source_line_count = count_lines(self.source);
        let mut edits = self.edits;
        edits.sort_by_key(|e| e.start);

        let mut body = String::with_capacity(self.source.len());
        let mut cursor = 0;
        for edit in &edits {
            body.push_str(&self.source[cursor..edit.start]);
            body.push_str(&edit.replacement);
            // Preserve the line structure of the replaced span.
            let newlines =
                memchr::memchr_iter(b'\n', self.source[edit.start..edit.end].as_bytes()).count();
            for _ in 0..newlines {
                body.push('\n');
            }
            cursor = edit.end;
        }
        body.push_str(&self.source[cursor..]);

        if !self.appended_exports.is_empty() {
            if !body.ends_with('\n') {
                body.push('\n');
            }
            body.push_str(&self.appended_exports.join(" "));
        }

        LoweredModule {
            body,
            dependencies: self.slots.keys().cloned().collect(),
            source_line_count,
        }
    }

    fn is_property_access(&self, i: usize) -> bool {
        i > 0 && self.tokens[i - 1].is_punct(b'.')
    }

    fn slot(&mut self, specifier: &str) -> Result<usize> {
        if specifier.is_empty() {
            return Err(TransformError::EmptySpecifier {
                path: self.path.to_path_buf(),
            });
        }
        let next = self.slots.len();
        Ok(*self.slots.entry(specifier.to_string()).or_insert(next))
    }

    fn require_call(&self, slot: usize, specifier: &str) -> String {
        if self.dev {
            format!("_$$_REQUIRE(_dependencyMap[{slot}], \"{specifier}\")")
        } else {
            format!("_$$_REQUIRE(_dependencyMap[{slot}])")
        }
    }

    fn import_default_call(&self, slot: usize, specifier: &str) -> String {
        if self.dev {
            format!("_$$_IMPORT_DEFAULT(_dependencyMap[{slot}], \"{specifier}\")")
        } else {
            format!("_$$_IMPORT_DEFAULT(_dependencyMap[{slot}])")
        }
    }

    fn import_all_call(&self, slot: usize, specifier: &str) -> String {
        if self.dev {
            format!("_$$_IMPORT_ALL(_dependencyMap[{slot}], \"{specifier}\")")
        } else {
            format!("_$$_IMPORT_ALL(_dependencyMap[{slot}])")
        }
    }

    fn str_value(&self, i: usize) -> Option<String> {
        match &self.tokens.get(i)?.kind {
            TokenKind::Str(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// End of the edited span: through the trailing `;` when present,
    /// otherwise through the given token.
    fn span_end(&self, last: usize) -> usize {
        match self.tokens.get(last + 1) {
            Some(tok) if tok.is_punct(b';') => tok.end,
            _ => self.tokens[last].end,
        }
    }

    fn edit(&mut self, start: usize, end: usize, replacement: String) {
        self.edits.push(Edit {
            start,
            end,
            replacement,
        });
    }

    /// Handle `import …` in all its forms. Returns the next token index.
    fn lower_import(&mut self, at: usize) -> Result<usize> {
        let start = self.tokens[at].start;
        let Some(next) = self.tokens.get(at + 1) else {
            return Ok(at + 1);
        };

        // `import(…)` — dynamic import.
        if next.is_punct(b'(') {
            if let Some(value) = self.str_value(at + 2) {
                if let Some(close) = self.tokens.get(at + 3).filter(|t| t.is_punct(b')')) {
                    let close_end = close.end;
                    let slot = self.slot(&value)?;
                    let call = self.import_all_call(slot, &value);
                    self.edit(
                        start,
                        close_end,
                        format!("Promise.resolve().then(function () {{ return {call}; }})"),
                    );
                    return Ok(at + 4);
                }
            }
            // Non-literal argument: leave untouched.
            return Ok(at + 1);
        }

        // `import.meta` and similar.
        if next.is_punct(b'.') {
            return Ok(at + 2);
        }

        // `import "spec";` — bare side-effect import.
        if let Some(value) = self.str_value(at + 1) {
            let end = self.span_end(at + 1);
            let slot = self.slot(&value)?;
            let call = self.require_call(slot, &value);
            self.edit(start, end, format!("{call};"));
            return Ok(at + 2);
        }

        // Type-only imports are erased.
        if next.is_ident(self.source, "type") || next.is_ident(self.source, "typeof") {
            if let Some(last) = self.find_from_string(at + 1) {
                let end = self.span_end(last);
                self.edit(start, end, String::new());
                return Ok(last + 1);
            }
            return Ok(at + 1);
        }

        // `import <clause> from "spec";`
        let Some(clause) = self.parse_import_clause(at + 1) else {
            return Ok(at + 1);
        };
        let Some(value) = self.str_value(clause.from_string) else {
            return Ok(at + 1);
        };
        let end = self.span_end(clause.from_string);
        let slot = self.slot(&value)?;

        let mut decls = Vec::new();
        if let Some(name) = &clause.default_name {
            decls.push(format!("{name} = {}", self.import_default_call(slot, &value)));
        }
        if let Some(name) = &clause.namespace_name {
            decls.push(format!("{name} = {}", self.import_all_call(slot, &value)));
        }
        if !clause.named.is_empty() {
            let pattern = clause
                .named
                .iter()
                .map(|(imported, local)| {
                    if imported == local {
                        imported.clone()
                    } else {
                        format!("{imported}: {local}")
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            decls.push(format!(
                "{{ {pattern} }} = {}",
                self.require_call(slot, &value)
            ));
        }

        let replacement = if decls.is_empty() {
            format!("{};", self.require_call(slot, &value))
        } else {
            format!("var {};", decls.join(", "))
        };
        self.edit(start, end, replacement);
        Ok(clause.from_string + 1)
    }

    fn lower_export(&mut self, at: usize) -> Result<usize> {
        let start = self.tokens[at].start;
        let Some(next) = self.tokens.get(at + 1) else {
            return Ok(at + 1);
        };

        // `export * from "s"` / `export * as ns from "s"`.
        if next.is_punct(b'*') {
            let mut cursor = at + 2;
            let mut ns_name = None;
            if self
                .tokens
                .get(cursor)
                .is_some_and(|t| t.is_ident(self.source, "as"))
            {
                ns_name = self.tokens.get(cursor + 1).map(|t| t.text(self.source).to_string());
                cursor += 2;
            }
            if !self
                .tokens
                .get(cursor)
                .is_some_and(|t| t.is_ident(self.source, "from"))
            {
                return Ok(at + 1);
            }
            let Some(value) = self.str_value(cursor + 1) else {
                return Ok(at + 1);
            };
            let end = self.span_end(cursor + 1);
            let slot = self.slot(&value)?;
            let call = self.require_call(slot, &value);
            let replacement = match ns_name {
                Some(name) => format!("exports.{name} = {};", self.import_all_call(slot, &value)),
                None => format!(
                    "(function (m) {{ for (var k in m) {{ if (k !== \"default\") exports[k] = m[k]; }} }})({call});"
                ),
            };
            self.edit(start, end, replacement);
            return Ok(cursor + 2);
        }

        // `export { a, b as c }` with or without `from`.
        if next.is_punct(b'{') {
            let Some((members, close)) = self.parse_named_members(at + 1) else {
                return Ok(at + 1);
            };
            if self
                .tokens
                .get(close + 1)
                .is_some_and(|t| t.is_ident(self.source, "from"))
            {
                let Some(value) = self.str_value(close + 2) else {
                    return Ok(at + 1);
                };
                let end = self.span_end(close + 2);
                let slot = self.slot(&value)?;
                let temp = format!("_$$_reexport{slot}");
                let mut stmts = vec![format!("var {temp} = {};", self.require_call(slot, &value))];
                for (imported, local) in &members {
                    stmts.push(format!("exports.{local} = {temp}.{imported};"));
                }
                self.edit(start, end, stmts.join(" "));
                return Ok(close + 3);
            }
            // Local export list: erase and assign at the end of the module.
            let end = self.span_end(close);
            self.edit(start, end, String::new());
            for (local, exported) in &members {
                self.appended_exports
                    .push(format!("exports.{exported} = {local};"));
            }
            return Ok(close + 1);
        }

        let word = next.text(self.source);
        match word {
            "default" => {
                self.edit(start, self.tokens[at + 1].end, "exports.default =".to_string());
                Ok(at + 2)
            }
            "const" | "let" | "var" => {
                self.edit(start, self.tokens[at + 1].start, String::new());
                // Simple declarators only; destructuring patterns are left
                // declared but unexported.
                if let Some(name_tok) = self.tokens.get(at + 2) {
                    if matches!(name_tok.kind, TokenKind::Ident) {
                        let name = name_tok.text(self.source).to_string();
                        self.appended_exports.push(format!("exports.{name} = {name};"));
                    }
                }
                Ok(at + 2)
            }
            "function" | "class" | "async" => {
                self.edit(start, self.tokens[at + 1].start, String::new());
                let mut cursor = at + 1;
                if word == "async" {
                    cursor += 1; // the `function` keyword
                }
                cursor += 1;
                if self.tokens.get(cursor).is_some_and(|t| t.is_punct(b'*')) {
                    cursor += 1;
                }
                if let Some(name_tok) = self.tokens.get(cursor) {
                    if matches!(name_tok.kind, TokenKind::Ident) {
                        let name = name_tok.text(self.source).to_string();
                        self.appended_exports.push(format!("exports.{name} = {name};"));
                    }
                }
                Ok(at + 2)
            }
            "type" => {
                // `export type X = …;` — erase through the statement end.
                if let Some(end_tok) = self.find_statement_semicolon(at + 1) {
                    self.edit(start, self.tokens[end_tok].end, String::new());
                    return Ok(end_tok + 1);
                }
                Ok(at + 1)
            }
            "interface" => {
                if let Some(end_tok) = self.find_matching_brace_from(at + 1) {
                    self.edit(start, self.tokens[end_tok].end, String::new());
                    return Ok(end_tok + 1);
                }
                Ok(at + 1)
            }
            _ => Ok(at + 1),
        }
    }

    fn lower_require(&mut self, at: usize) -> Result<usize> {
        // Object keys (`{ require: … }`) are not calls.
        if self.tokens.get(at + 1).is_some_and(|t| t.is_punct(b':')) {
            return Ok(at + 1);
        }
        if !self.tokens.get(at + 1).is_some_and(|t| t.is_punct(b'(')) {
            return Ok(at + 1);
        }
        let Some(value) = self.str_value(at + 2) else {
            // Non-literal argument: not statically extractable.
            return Ok(at + 1);
        };
        let Some(close) = self.tokens.get(at + 3).filter(|t| t.is_punct(b')')) else {
            return Ok(at + 1);
        };
        let (start, end) = (self.tokens[at].start, close.end);
        let slot = self.slot(&value)?;
        let call = self.require_call(slot, &value);
        self.edit(start, end, call);
        Ok(at + 4)
    }

    // -- clause parsing helpers --

    fn parse_import_clause(&self, mut i: usize) -> Option<ImportClause> {
        let mut clause = ImportClause::default();
        loop {
            let tok = self.tokens.get(i)?;
            if tok.is_ident(self.source, "from") {
                let TokenKind::Str(_) = self.tokens.get(i + 1)?.kind else {
                    return None;
                };
                clause.from_string = i + 1;
                return Some(clause);
            }
            match &tok.kind {
                TokenKind::Ident => {
                    clause.default_name = Some(tok.text(self.source).to_string());
                    i += 1;
                }
                TokenKind::Punct(b',') => i += 1,
                TokenKind::Punct(b'*') => {
                    if !self
                        .tokens
                        .get(i + 1)
                        .is_some_and(|t| t.is_ident(self.source, "as"))
                    {
                        return None;
                    }
                    clause.namespace_name =
                        Some(self.tokens.get(i + 2)?.text(self.source).to_string());
                    i += 3;
                }
                TokenKind::Punct(b'{') => {
                    let (members, close) = self.parse_named_members(i)?;
                    clause.named = members;
                    i = close + 1;
                }
                _ => return None,
            }
        }
    }

    /// Parse `{ a, b as c, … }` starting at the opening brace. Returns the
    /// member pairs `(imported, local)` and the index of the closing brace.
    fn parse_named_members(&self, open: usize) -> Option<(Vec<(String, String)>, usize)> {
        let mut members = Vec::new();
        let mut i = open + 1;
        loop {
            let tok = self.tokens.get(i)?;
            match &tok.kind {
                TokenKind::Punct(b'}') => return Some((members, i)),
                TokenKind::Punct(b',') => i += 1,
                TokenKind::Ident => {
                    let imported = tok.text(self.source).to_string();
                    if self
                        .tokens
                        .get(i + 1)
                        .is_some_and(|t| t.is_ident(self.source, "as"))
                    {
                        let local = self.tokens.get(i + 2)?.text(self.source).to_string();
                        members.push((imported, local));
                        i += 3;
                    } else {
                        members.push((imported.clone(), imported));
                        i += 1;
                    }
                }
                _ => return None,
            }
        }
    }

    /// Find the string token of a `… from "spec"` tail, scanning forward.
    fn find_from_string(&self, mut i: usize) -> Option<usize> {
        while let Some(tok) = self.tokens.get(i) {
            if tok.is_punct(b';') {
                return None;
            }
            if tok.is_ident(self.source, "from") {
                return match self.tokens.get(i + 1)?.kind {
                    TokenKind::Str(_) => Some(i + 1),
                    _ => None,
                };
            }
            i += 1;
        }
        None
    }

    fn find_statement_semicolon(&self, mut i: usize) -> Option<usize> {
        let mut depth = 0usize;
        while let Some(tok) = self.tokens.get(i) {
            match tok.kind {
                TokenKind::Punct(b'{') | TokenKind::Punct(b'(') | TokenKind::Punct(b'[') => {
                    depth += 1
                }
                TokenKind::Punct(b'}') | TokenKind::Punct(b')') | TokenKind::Punct(b']') => {
                    depth = depth.saturating_sub(1)
                }
                TokenKind::Punct(b';') if depth == 0 => return Some(i),
                _ => {}
            }
            i += 1;
        }
        None
    }

    fn find_matching_brace_from(&self, mut i: usize) -> Option<usize> {
        // Advance to the opening brace, then track depth.
        while let Some(tok) = self.tokens.get(i) {
            if tok.is_punct(b'{') {
                break;
            }
            i += 1;
        }
        let mut depth = 0usize;
        while let Some(tok) = self.tokens.get(i) {
            if tok.is_punct(b'{') {
                depth += 1;
            } else if tok.is_punct(b'}') {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            i += 1;
        }
        None
    }
}

#[derive(Default)]
struct ImportClause {
    default_name: Option<String>,
    namespace_name: Option<String>,
    named: Vec<(String, String)>,
    from_string: usize,
}

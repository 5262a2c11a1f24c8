//! Literal substitution
//!
//! A single left-to-right scan that, at each position, replaces the
//! longest chain literal starting there with its `{{name}}` placeholder.
//! Placeholders are emitted, never scanned, so one replacement cannot
//! feed another. Numeric literals only match where they are not part of
//! a longer number.

/// One literal and the placeholder replacing it.
#[derive(Debug, Clone)]
struct Rule {
    literal: String,
    placeholder: String,
    numeric: bool,
}

impl Rule {
    /// A numeric literal must not be glued to more digits on either side.
    fn matches_at(&self, prev: Option<char>, rest: &str) -> bool {
        if !rest.starts_with(self.literal.as_str()) {
            return false;
        }
        if !self.numeric {
            return true;
        }
        let before_ok = !prev.is_some_and(|c| c.is_ascii_digit() || c == '.');
        let mut after = rest[self.literal.len()..].chars();
        let after_ok = match after.next() {
            Some(c) if c.is_ascii_digit() => false,
            Some('.') => !after.next().is_some_and(|c| c.is_ascii_digit()),
            _ => true,
        };
        before_ok && after_ok
    }
}

fn is_numeric(literal: &str) -> bool {
    literal.bytes().any(|b| b.is_ascii_digit()) && serde_json::from_str::<serde_json::Number>(literal).is_ok()
}

/// Replaces chain literals with placeholders.
#[derive(Debug, Clone, Default)]
pub struct Substituter {
    /// longest literal first
    rules: Vec<Rule>,
}

impl Substituter {
    /// Build from `(literal, variable name)` pairs. Empty literals are ignored;
    /// for duplicate literals the first pair wins.
    pub fn new<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut rules: Vec<Rule> = Vec::new();
        for (literal, name) in pairs {
            if literal.is_empty() || rules.iter().any(|r| r.literal == literal) {
                continue;
            }
            rules.push(Rule {
                literal: literal.to_string(),
                placeholder: placeholder(name),
                numeric: is_numeric(literal),
            });
        }
        // stable sort keeps declaration order among equal lengths
        rules.sort_by(|a, b| b.literal.len().cmp(&a.literal.len()));
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rewrite `text`. Text containing no literal comes back unchanged.
    pub fn apply(&self, text: &str) -> String {
        self.scan(text, |run| run.to_string()).0
    }

    /// Rewrite one encoded component. Literals are looked up in `decoded`;
    /// when one is found the text around each placeholder is re-encoded
    /// with `encode`. Otherwise the encoded text is rewritten as it is.
    pub fn apply_encoded(&self, encoded: &str, decoded: &str, encode: impl Fn(&str) -> String) -> String {
        match self.scan(decoded, encode) {
            (rewritten, true) => rewritten,
            _ => self.apply(encoded),
        }
    }

    /// Scan once, passing every run of unmatched text through `escape`.
    /// The flag tells whether any literal was replaced.
    fn scan(&self, text: &str, escape: impl Fn(&str) -> String) -> (String, bool) {
        if self.rules.is_empty() {
            return (escape(text), false);
        }

        let mut out = String::with_capacity(text.len());
        let mut replaced = false;
        let mut run_start = 0;
        let mut pos = 0;
        let mut prev = None;
        while let Some(c) = text[pos..].chars().next() {
            let rest = &text[pos..];
            match self.rules.iter().find(|rule| rule.matches_at(prev, rest)) {
                Some(rule) => {
                    out.push_str(&escape(&text[run_start..pos]));
                    out.push_str(&rule.placeholder);
                    replaced = true;
                    pos += rule.literal.len();
                    run_start = pos;
                    prev = rule.literal.chars().next_back();
                }
                None => {
                    pos += c.len_utf8();
                    prev = Some(c);
                }
            }
        }
        out.push_str(&escape(&text[run_start..]));
        (out, replaced)
    }
}

/// `{{name}}`
pub fn placeholder(name: &str) -> String {
    format!("{{{{{}}}}}", name)
}

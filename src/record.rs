//! Parsing of tab-separated variant rows and their INFO annotations.

use crate::err::Error;

/// Minimal number of columns in a data row (CHROM, POS, ID, REF, ALT).
pub const MIN_FIELDS: usize = 5;

/// How INFO keys are matched against `;`-separated tokens.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyMatch {
    /// The key may appear anywhere in the token (`AF` matches `AF_ESP=0.1`).
    #[default]
    Contains,
    /// The text before the token's first `=` must equal the key.
    Exact,
}

/// Return the value of `token` for `key`, if any.
///
/// With `KeyMatch::Contains` this yields the text after the first `=` whenever
/// `key` occurs anywhere in `token`. Flag tokens without `=` never carry a value.
pub fn info_key_value<'a>(key: &str, token: &'a str, key_match: KeyMatch) -> Option<&'a str> {
    let (name, value) = token.split_once('=')?;
    let matches = match key_match {
        KeyMatch::Contains => token.contains(key),
        KeyMatch::Exact => name == key,
    };
    if matches {
        Some(value)
    } else {
        None
    }
}

/// The `;`-separated INFO column of a row.
#[derive(Debug, Clone, Copy)]
pub struct Annotations<'a> {
    raw: &'a str,
    key_match: KeyMatch,
}

impl<'a> Annotations<'a> {
    pub fn new(raw: &'a str, key_match: KeyMatch) -> Self {
        Self { raw, key_match }
    }

    /// Tokens in their original order.
    pub fn tokens(&self) -> impl Iterator<Item = &'a str> {
        self.raw.split(';')
    }

    /// Value of the first token matching `key` with a non-empty value.
    pub fn get(&self, key: &str) -> Option<&'a str> {
        let key_match = self.key_match;
        self.tokens()
            .filter_map(|token| info_key_value(key, token, key_match))
            .find(|value| !value.is_empty())
    }
}

/// One data row of the tabular file, split into columns.
#[derive(Debug, Clone)]
pub struct Row<'a> {
    line: &'a str,
    fields: Vec<&'a str>,
    key_match: KeyMatch,
}

impl<'a> Row<'a> {
    /// Split `line` into columns after stripping trailing whitespace.
    pub fn parse(line: &'a str, key_match: KeyMatch) -> Result<Self, Error> {
        let line = line.trim_end();
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < MIN_FIELDS {
            return Err(Error::malformed(
                line,
                format!(
                    "expected at least {} fields, got {}",
                    MIN_FIELDS,
                    fields.len()
                ),
            ));
        }
        Ok(Self {
            line,
            fields,
            key_match,
        })
    }

    /// The row as parsed, without trailing whitespace.
    pub fn line(&self) -> &'a str {
        self.line
    }

    pub fn chrom(&self) -> &'a str {
        self.fields[0]
    }

    pub fn pos(&self) -> &'a str {
        self.fields[1]
    }

    pub fn id(&self) -> &'a str {
        self.fields[2]
    }

    pub fn reference(&self) -> &'a str {
        self.fields[3]
    }

    pub fn alternative(&self) -> &'a str {
        self.fields[4]
    }

    /// Annotations from the last column present.
    ///
    /// Short rows have no INFO column; their last column is used instead.
    pub fn info(&self) -> Annotations<'a> {
        let last = self.fields.last().copied().unwrap_or_default();
        Annotations::new(last, self.key_match)
    }

    /// Number of columns.
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }
}

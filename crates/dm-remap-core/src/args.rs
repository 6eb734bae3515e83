//! Cursor over a target's argument text.
//!
//! Arguments are whitespace-delimited tokens. Every read advances the cursor
//! on success and leaves it untouched on failure, so a caller can report the
//! offending token and nothing has been consumed.

use crate::error::ArgError;

/// A cursor over whitespace-delimited argument tokens.
#[derive(Debug, Clone)]
pub struct ArgumentCursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> ArgumentCursor<'a> {
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    /// Locate the next token without consuming it.
    ///
    /// Returns the token and the byte offset just past it.
    fn peek(&self) -> Option<(&'a str, usize)> {
        let rest = &self.text[self.pos..];
        let start = rest.len() - rest.trim_start().len();
        let rest = &rest[start..];
        if rest.is_empty() {
            return None;
        }
        let len = rest.find(char::is_whitespace).unwrap_or(rest.len());
        Some((&rest[..len], self.pos + start + len))
    }

    /// Read the next token.
    ///
    /// # Errors
    ///
    /// Returns [`ArgError::Exhausted`] if no token remains.
    pub fn next_token(&mut self) -> Result<&'a str, ArgError> {
        let (token, end) = self.peek().ok_or(ArgError::Exhausted)?;
        self.pos = end;
        Ok(token)
    }

    /// Read the next token as an unsigned decimal number.
    ///
    /// # Errors
    ///
    /// Returns [`ArgError::Exhausted`] if no token remains, or
    /// [`ArgError::Malformed`] if the token is not a `u64`.
    pub fn next_u64(&mut self) -> Result<u64, ArgError> {
        let (token, end) = self.peek().ok_or(ArgError::Exhausted)?;
        // `u64::from_str` accepts a leading '+', argument text does not.
        if !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ArgError::Malformed {
                token: token.to_string(),
            });
        }
        let value = token.parse().map_err(|_| ArgError::Malformed {
            token: token.to_string(),
        })?;
        self.pos = end;
        Ok(value)
    }

    /// Check that every token has been consumed.
    ///
    /// # Errors
    ///
    /// Returns [`ArgError::Unexpected`] naming the first leftover token.
    pub fn expect_end(&self) -> Result<(), ArgError> {
        match self.peek() {
            None => Ok(()),
            Some((token, _)) => Err(ArgError::Unexpected {
                token: token.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.peek().is_none()
    }

    /// The unconsumed text, without leading whitespace.
    #[must_use]
    pub fn remaining(&self) -> &'a str {
        self.text[self.pos..].trim_start()
    }
}

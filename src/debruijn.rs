//! De Bruijn sequence generation for static-code brute forcing
//!
//! A de Bruijn sequence B(k, n) contains every length-n string over a k-symbol
//! alphabet exactly once when read cyclically, so transmitting it covers all
//! k^n fixed codes in k^n symbols instead of n * k^n.
//!
//! The sequence is built by concatenating, in lexicographic order, every
//! Lyndon word whose length divides n (Fredricksen-Kessler-Maiorana). The
//! words are produced iteratively from a single owned buffer, so the depth
//! of the classical recursive construction never materialises on the stack.

use thiserror::Error;

/// Refuse to build sequences longer than this many symbols
const MAX_SEQUENCE_LEN: usize = 1 << 28;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeBruijnError {
    #[error("alphabet must contain at least one symbol")]
    EmptyAlphabet,

    #[error("subsequence length must be at least 1")]
    ZeroLength,

    #[error("sequence of {k}^{n} symbols is too long to generate")]
    TooLong { k: usize, n: usize },
}

/// Symbols the sequence is written in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alphabet {
    /// Numeric arity k, symbols "0".."k-1"
    Arity(usize),
    /// Explicit symbols, arity is the list length
    Symbols(Vec<String>),
}

impl Alphabet {
    /// One symbol per character of `symbols`
    pub fn from_chars(symbols: &str) -> Self {
        Alphabet::Symbols(symbols.chars().map(String::from).collect())
    }

    fn into_symbols(self) -> Vec<String> {
        match self {
            Alphabet::Arity(k) => (0..k).map(|i| i.to_string()).collect(),
            Alphabet::Symbols(symbols) => symbols,
        }
    }
}

/// A generated cyclic de Bruijn sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeBruijnSequence {
    symbols: Vec<String>,
    order: usize,
    indices: Vec<usize>,
}

impl DeBruijnSequence {
    /// Alphabet size k
    pub fn arity(&self) -> usize {
        self.symbols.len()
    }

    /// Subsequence length n
    pub fn order(&self) -> usize {
        self.order
    }

    /// Sequence length, always k^n
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Symbol indices into the alphabet
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }
}

impl std::fmt::Display for DeBruijnSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &i in &self.indices {
            f.write_str(&self.symbols[i])?;
        }
        Ok(())
    }
}

/// Generate the de Bruijn sequence over `alphabet` with subsequence length `n`
pub fn generate(alphabet: Alphabet, n: usize) -> Result<DeBruijnSequence, DeBruijnError> {
    let symbols = alphabet.into_symbols();
    let k = symbols.len();
    if k == 0 {
        return Err(DeBruijnError::EmptyAlphabet);
    }
    if n == 0 {
        return Err(DeBruijnError::ZeroLength);
    }

    let expected_len = u32::try_from(n)
        .ok()
        .and_then(|exp| k.checked_pow(exp))
        .filter(|&len| len <= MAX_SEQUENCE_LEN)
        .ok_or(DeBruijnError::TooLong { k, n })?;

    let mut indices = Vec::with_capacity(expected_len);
    let mut word: Vec<usize> = Vec::with_capacity(n);
    word.push(0);

    loop {
        let lyndon_len = word.len();
        if n % lyndon_len == 0 {
            indices.extend_from_slice(&word);
        }

        // Extend periodically to length n, then strip trailing maximal symbols
        while word.len() < n {
            let next = word[word.len() - lyndon_len];
            word.push(next);
        }
        while word.last() == Some(&(k - 1)) {
            word.pop();
        }

        match word.last_mut() {
            Some(last) => *last += 1,
            None => break,
        }
    }

    debug_assert_eq!(indices.len(), expected_len);

    Ok(DeBruijnSequence {
        symbols,
        order: n,
        indices,
    })
}

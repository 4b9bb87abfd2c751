use indexmap::IndexMap;

use super::{Token, TokenKind};

/// Structural metadata for one token. All fields are indices into the same
/// arena; the whole store is discarded and rebuilt after every fixer pass, so
/// no index ever outlives the token sequence it was computed for.
#[derive(Debug, Clone, Default)]
pub(crate) struct Links {
    pub matching_bracket: Option<usize>,
    pub matching_paren: Option<usize>,
    pub scope_open: Option<usize>,
    pub scope_close: Option<usize>,
    pub scope_owner: Option<usize>,
    /// Enclosing parenthesis pairs, outermost first, keyed open → close.
    pub nesting_parens: IndexMap<usize, usize>,
    /// Enclosing scopes, outermost first, keyed owner index → owner kind.
    pub conditions: IndexMap<usize, TokenKind>,
    pub depth: u32,
}

/// Indexed, append-only-per-pass token sequence with structural metadata.
///
/// Built once from the raw tokenizer output; the matching-pair and nesting
/// links are computed here so every tokenizer implementation gets identical
/// structural semantics. Openers and closers always point at each other.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    tokens: Vec<Token>,
    links: Vec<Links>,
}

impl TokenStore {
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        let links = compute_links(&tokens);
        Self { tokens, links }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// # Panics
    /// Panics if `index` is out of bounds; use [`Self::get`] for a checked
    /// lookup.
    #[must_use]
    pub fn token(&self, index: usize) -> &Token {
        &self.tokens[index]
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    #[must_use]
    pub fn kind(&self, index: usize) -> TokenKind {
        self.tokens[index].kind
    }

    #[must_use]
    pub fn text(&self, index: usize) -> &str {
        &self.tokens[index].text
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    /// Matching square (or unowned curly) bracket for `index`, if any.
    #[must_use]
    pub fn matching_bracket(&self, index: usize) -> Option<usize> {
        self.links.get(index)?.matching_bracket
    }

    /// Matching parenthesis for `index`, if any.
    #[must_use]
    pub fn matching_paren(&self, index: usize) -> Option<usize> {
        self.links.get(index)?.matching_paren
    }

    pub fn scope_open(&self, index: usize) -> Option<usize> {
        self.links.get(index)?.scope_open
    }

    #[must_use]
    pub fn scope_close(&self, index: usize) -> Option<usize> {
        self.links.get(index)?.scope_close
    }

    #[must_use]
    pub fn scope_owner(&self, index: usize) -> Option<usize> {
        self.links.get(index)?.scope_owner
    }

    /// Enclosing parenthesis pairs for `index`, outermost first.
    #[must_use]
    pub fn nesting_parens(&self, index: usize) -> &IndexMap<usize, usize> {
        &self.links[index].nesting_parens
    }

    /// Enclosing scope conditions for `index`, outermost first, keyed by the
    /// owning keyword's index.
    #[must_use]
    pub fn conditions(&self, index: usize) -> &IndexMap<usize, TokenKind> {
        &self.links[index].conditions
    }

    #[must_use]
    pub fn depth(&self, index: usize) -> u32 {
        self.links[index].depth
    }
}

impl<'a> IntoIterator for &'a TokenStore {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}

/// Compute all structural links for a token sequence.
///
/// Two passes: the first matches bracket/paren/scope pairs with stacks, the
/// second assigns per-token nesting maps and depth from the pair map. A token
/// is not inside its own pair: openers and closers carry only the nesting of
/// pairs strictly enclosing them. Unbalanced input leaves the affected links
/// unset rather than failing.
fn compute_links(tokens: &[Token]) -> Vec<Links> {
    let mut links = vec![Links::default(); tokens.len()];

    // Pass 1: matching pairs and scope ownership.
    let mut paren_stack: Vec<usize> = Vec::new();
    let mut square_stack: Vec<usize> = Vec::new();
    let mut curly_stack: Vec<(usize, Option<usize>)> = Vec::new();
    let mut pending_owner: Option<usize> = None;

    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            kind if kind.creates_scope() => pending_owner = Some(i),
            // An abstract declaration or plain statement terminator releases
            // any keyword still waiting for its block. Semicolons inside a
            // condition header (for-loops) do not.
            TokenKind::Semicolon if paren_stack.is_empty() => pending_owner = None,
            TokenKind::OpenParen => paren_stack.push(i),
            TokenKind::CloseParen => {
                if let Some(open) = paren_stack.pop() {
                    links[open].matching_paren = Some(i);
                    links[i].matching_paren = Some(open);
                }
            }
            TokenKind::OpenSquare => square_stack.push(i),
            TokenKind::CloseSquare => {
                if let Some(open) = square_stack.pop() {
                    links[open].matching_bracket = Some(i);
                    links[i].matching_bracket = Some(open);
                }
            }
            TokenKind::OpenCurly => curly_stack.push((i, pending_owner.take())),
            TokenKind::CloseCurly => {
                if let Some((open, owner)) = curly_stack.pop() {
                    if let Some(owner) = owner {
                        for idx in [owner, open, i] {
                            links[idx].scope_open = Some(open);
                            links[idx].scope_close = Some(i);
                        }
                        links[open].scope_owner = Some(owner);
                        links[i].scope_owner = Some(owner);
                    } else {
                        links[open].matching_bracket = Some(i);
                        links[i].matching_bracket = Some(open);
                    }
                }
            }
            _ => {}
        }
    }

    // Pass 2: nesting maps and depth.
    let mut open_parens: Vec<usize> = Vec::new();
    let mut open_scopes: Vec<usize> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::CloseParen if links[i].matching_paren.is_some() => {
                if open_parens.last() == links[i].matching_paren.as_ref() {
                    open_parens.pop();
                }
            }
            TokenKind::CloseCurly
                if links[i].scope_owner.is_some()
                    && open_scopes.last() == links[i].scope_owner.as_ref() =>
            {
                open_scopes.pop();
            }
            _ => {}
        }

        let nesting_parens: IndexMap<usize, usize> = open_parens
            .iter()
            .map(|&open| (open, links[open].matching_paren.unwrap_or(open)))
            .collect();
        let conditions: IndexMap<usize, TokenKind> = open_scopes
            .iter()
            .map(|&owner| (owner, tokens[owner].kind))
            .collect();
        links[i].nesting_parens = nesting_parens;
        links[i].conditions = conditions;
        links[i].depth = u32::try_from(open_scopes.len()).unwrap_or(u32::MAX);

        match token.kind {
            TokenKind::OpenParen if links[i].matching_paren.is_some() => open_parens.push(i),
            TokenKind::OpenCurly => {
                if let Some(owner) = links[i].scope_owner {
                    open_scopes.push(owner);
                }
            }
            _ => {}
        }
    }

    links
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

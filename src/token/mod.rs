mod navigate;
mod store;

pub use navigate::TokenQuery;
pub use store::TokenStore;

/// Lexical category of a token.
///
/// This is the set of categories the engine itself must distinguish: structural
/// brackets, scope-owning keywords, statement glue, comment and markup kinds.
/// Everything a tokenizer cannot map onto one of these lands in [`Self::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    OpenTag,
    CloseTag,
    InlineHtml,
    Whitespace,
    Comment,
    DocCommentOpen,
    DocCommentClose,
    DocCommentStar,
    DocCommentString,
    DocCommentTag,
    Variable,
    Ident,
    StringLiteral,
    Number,
    If,
    ElseIf,
    Else,
    While,
    For,
    Foreach,
    Do,
    Switch,
    Case,
    Default,
    Function,
    Class,
    Interface,
    Trait,
    Return,
    Echo,
    OpenCurly,
    CloseCurly,
    OpenParen,
    CloseParen,
    OpenSquare,
    CloseSquare,
    Semicolon,
    Comma,
    Colon,
    DoubleArrow,
    Equals,
    Operator,
    Other,
}

/// Kinds that carry no meaning for statement structure: whitespace and every
/// comment flavor. Mirrors what sniffs conventionally skip when searching.
pub const EMPTY_KINDS: &[TokenKind] = &[
    TokenKind::Whitespace,
    TokenKind::Comment,
    TokenKind::DocCommentOpen,
    TokenKind::DocCommentClose,
    TokenKind::DocCommentStar,
    TokenKind::DocCommentString,
    TokenKind::DocCommentTag,
];

/// Kinds whose text is inspected for inline control directives.
pub const ANNOTATION_KINDS: &[TokenKind] = &[
    TokenKind::Comment,
    TokenKind::DocCommentString,
    TokenKind::DocCommentTag,
];

impl TokenKind {
    #[must_use]
    pub fn is_empty_kind(self) -> bool {
        EMPTY_KINDS.contains(&self)
    }

    #[must_use]
    pub fn is_annotation_bearing(self) -> bool {
        ANNOTATION_KINDS.contains(&self)
    }

    /// Whether a keyword of this kind owns the curly scope that follows it.
    #[must_use]
    pub const fn creates_scope(self) -> bool {
        matches!(
            self,
            Self::If
                | Self::ElseIf
                | Self::Else
                | Self::While
                | Self::For
                | Self::Foreach
                | Self::Do
                | Self::Switch
                | Self::Function
                | Self::Class
                | Self::Interface
                | Self::Trait
        )
    }
}

/// One lexical token. Its index is its position in the owning [`TokenStore`]
/// and is stable only within one tokenization pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Literal substring, post-normalization (tabs may already be expanded).
    pub text: String,
    /// Pre-normalization substring, present only when normalization altered
    /// the text. Fixes use this to restore exact original bytes for tokens
    /// they do not touch.
    pub original_text: Option<String>,
    /// 1-based source line.
    pub line: u32,
    /// 1-based source column.
    pub column: u32,
    /// Visual length of `text` (tab-width aware).
    pub length: u32,
}

impl Token {
    #[must_use]
    pub fn new(kind: TokenKind, text: impl Into<String>, line: u32, column: u32) -> Self {
        let text = text.into();
        let length = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
        Self {
            kind,
            text,
            original_text: None,
            line,
            column,
            length,
        }
    }

    /// The bytes this token contributes when source text is reconstructed:
    /// the original text when normalization changed it, the text otherwise.
    #[must_use]
    pub fn source_text(&self) -> &str {
        self.original_text.as_deref().unwrap_or(&self.text)
    }
}

/// The token-source format a file was tokenized as. Listeners declare which
/// formats they understand; the default everywhere is [`Self::Php`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceFormat {
    #[default]
    Php,
    Js,
    Css,
}

/// Unrecoverable tokenization failure. The engine converts this into one
/// internal warning on the file and marks the file ignored; it never aborts
/// the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizeError {
    pub message: String,
}

impl TokenizeError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tokenization failed: {}", self.message)
    }
}

impl std::error::Error for TokenizeError {}

/// Produces the raw token sequence for a piece of source text.
///
/// Implementations report position (1-based line/column), tab-aware visual
/// length, and `original_text` for tokens whose text was normalized. The
/// engine computes all structural links itself when it builds the
/// [`TokenStore`], so implementations only deal in flat lexical output.
pub trait Tokenizer: Send + Sync {
    /// The format this tokenizer produces, used to match listeners that
    /// declare format support.
    fn format(&self) -> SourceFormat;

    /// Tokenize `text`.
    ///
    /// # Errors
    /// Returns a [`TokenizeError`] with a human-readable message when the
    /// input is malformed beyond recovery (e.g. nesting depth exceeded).
    fn tokenize(
        &self,
        text: &str,
        tab_width: usize,
    ) -> std::result::Result<Vec<Token>, TokenizeError>;
}

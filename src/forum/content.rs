//! Content types and their renderers.
//!
//! The built-in types are a closed [`BuiltinType`] enum. Anything else can be
//! plugged in at runtime through [`ContentRenderer`]. Rendering an unknown
//! type falls back to `text`.

use super::puff::Puff;
use crate::config::PuffConfig;
use crate::dag::ContentHash;
use crate::error::{PuffError, Result};
use crate::wardrobe::IdentityObserver;
use pulldown_cmark::{html, Event, Options, Parser};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock, Mutex};
use tracing::debug;

/// Layout the markup will be shown in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ViewMode {
    /// Puffs laid out as boxes on a board.
    #[default]
    Box,
    /// Puffs listed as table rows.
    Table,
}

/// Turns puff content into markup.
pub trait ContentRenderer: Send + Sync {
    fn render(&self, content: &str, puff: &Puff, mode: ViewMode) -> String;
}

/// Content types that ship with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinType {
    Text,
    Bbcode,
    Image,
    Markdown,
    Pgn,
    Identity,
    Profile,
    File,
}

impl BuiltinType {
    pub const ALL: [BuiltinType; 8] = [
        BuiltinType::Text,
        BuiltinType::Bbcode,
        BuiltinType::Image,
        BuiltinType::Markdown,
        BuiltinType::Pgn,
        BuiltinType::Identity,
        BuiltinType::Profile,
        BuiltinType::File,
    ];

    /// Registry name of the type.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinType::Text => "text",
            BuiltinType::Bbcode => "bbcode",
            BuiltinType::Image => "image",
            BuiltinType::Markdown => "markdown",
            BuiltinType::Pgn => "PGN",
            BuiltinType::Identity => "identity",
            BuiltinType::Profile => "profile",
            BuiltinType::File => "file",
        }
    }
}

impl ContentRenderer for BuiltinType {
    fn render(&self, content: &str, puff: &Puff, mode: ViewMode) -> String {
        match self {
            BuiltinType::Text => {
                format!("<span>{}</span>", render_bbcode(content).replace('\n', "</br>"))
            }
            BuiltinType::Bbcode => render_bbcode(content).replace('\n', "<br />"),
            BuiltinType::Image | BuiltinType::Profile => render_image(content, mode),
            BuiltinType::Markdown => format!("<span>{}</span>", render_markdown(content)),
            BuiltinType::Pgn => render_pgn(content),
            BuiltinType::Identity => String::new(),
            BuiltinType::File => puff
                .payload()
                .extra_str("filename")
                .map(escape_html)
                .unwrap_or_default(),
        }
    }
}

/// Escapes the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_image(src: &str, mode: ViewMode) -> String {
    match mode {
        ViewMode::Table => format!("<img src=\"{}\" />", escape_html(src)),
        ViewMode::Box => format!("<img class=\"imgInBox\" src=\"{}\" />", escape_html(src)),
    }
}

static BBCODE_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?s)\[b\](.*?)\[/b\]", "<strong>$1</strong>"),
        (r"(?s)\[i\](.*?)\[/i\]", "<em>$1</em>"),
        (r"(?s)\[u\](.*?)\[/u\]", "<u>$1</u>"),
        (r"(?s)\[s\](.*?)\[/s\]", "<s>$1</s>"),
        (r"(?s)\[code\](.*?)\[/code\]", "<code>$1</code>"),
        (r"(?s)\[quote\](.*?)\[/quote\]", "<blockquote>$1</blockquote>"),
        (r"\[url=(https?://[^\]\s]+)\](.*?)\[/url\]", "<a href=\"$1\">$2</a>"),
        (r"\[url\](https?://[^\[\s]+)\[/url\]", "<a href=\"$1\">$1</a>"),
        (r"\[img\](https?://[^\[\s]+)\[/img\]", "<img src=\"$1\" />"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

static PGN_TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"^\[(\w+)\s+"([^"]*)"\]$"#).ok());

static PGN_MOVE_NUMBER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^\d+\.+$").ok());

fn render_bbcode(content: &str) -> String {
    let mut markup = escape_html(content);
    for (re, replacement) in BBCODE_RULES.iter() {
        markup = re.replace_all(&markup, *replacement).into_owned();
    }
    markup
}

fn render_markdown(content: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    // Raw HTML in the source is shown, not interpreted.
    let parser = Parser::new_ext(content, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}

/// Renders a chess game: the tag pairs as a table, then the moves.
fn render_pgn(content: &str) -> String {
    let mut tags = Vec::new();
    let mut movetext = String::new();

    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match PGN_TAG.as_ref().and_then(|re| re.captures(line)) {
            Some(caps) => tags.push((caps[1].to_string(), caps[2].to_string())),
            None => {
                movetext.push_str(line);
                movetext.push(' ');
            }
        }
    }

    let mut moves: Vec<(String, Option<String>)> = Vec::new();
    let mut result = None;
    for token in movetext.split_whitespace() {
        if matches!(token, "1-0" | "0-1" | "1/2-1/2" | "*") {
            result = Some(token);
            continue;
        }
        // "12.e4" style tokens carry the move number inline.
        let san = match token.rfind('.') {
            Some(pos)
                if PGN_MOVE_NUMBER
                    .as_ref()
                    .map_or(false, |re| re.is_match(&token[..=pos])) =>
            {
                &token[pos + 1..]
            }
            _ => token,
        };
        if san.is_empty() {
            continue;
        }
        match moves.last_mut() {
            Some((_, black)) if black.is_none() => *black = Some(san.to_string()),
            _ => moves.push((san.to_string(), None)),
        }
    }

    let mut out = String::from("<div class=\"pgn\">");
    if !tags.is_empty() {
        out.push_str("<table class=\"pgnTags\">");
        for (name, value) in &tags {
            out.push_str(&format!(
                "<tr><th>{}</th><td>{}</td></tr>",
                escape_html(name),
                escape_html(value)
            ));
        }
        out.push_str("</table>");
    }
    out.push_str("<ol class=\"pgnMoves\">");
    for (white, black) in &moves {
        out.push_str(&format!("<li>{}", escape_html(white)));
        if let Some(black) = black {
            out.push_str(&format!(" {}", escape_html(black)));
        }
        out.push_str("</li>");
    }
    out.push_str("</ol>");
    if let Some(result) = result {
        out.push_str(&format!("<span class=\"pgnResult\">{}</span>", escape_html(result)));
    }
    out.push_str("</div>");
    out
}

/// Rendered markup per puff and view mode.
///
/// Viewer-dependent output (decrypted content, for one) must not outlive an
/// identity switch, so the cache clears itself on every switch.
#[derive(Debug, Default)]
pub struct RenderCache {
    entries: Mutex<HashMap<(ContentHash, ViewMode), String>>,
    limit: Option<usize>,
}

impl RenderCache {
    /// An unbounded cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache that empties itself once it holds `limit` entries.
    pub fn with_capacity_limit(limit: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            limit: Some(limit),
        }
    }

    pub fn get(&self, sig: &ContentHash, mode: ViewMode) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(&(*sig, mode)).cloned())
    }

    pub fn insert(&self, sig: ContentHash, mode: ViewMode, markup: String) {
        if let Ok(mut entries) = self.entries.lock() {
            if self.limit.map_or(false, |limit| entries.len() >= limit) {
                debug!(entries = entries.len(), "render cache full, clearing");
                entries.clear();
            }
            entries.insert((sig, mode), markup);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IdentityObserver for RenderCache {
    fn before_identity_switch(&self, next: Option<&str>) {
        debug!(next = ?next, "clearing render cache");
        self.clear();
    }
}

/// Content types by name.
pub struct ContentRegistry {
    renderers: BTreeMap<String, Arc<dyn ContentRenderer>>,
    allowed: Option<Vec<String>>,
    cache: Arc<RenderCache>,
}

impl ContentRegistry {
    /// Creates a registry holding every built-in type the config allows.
    pub fn new(config: &PuffConfig) -> Self {
        let cache = match config.render_cache_limit {
            Some(limit) => RenderCache::with_capacity_limit(limit),
            None => RenderCache::new(),
        };
        let mut registry = Self {
            renderers: BTreeMap::new(),
            allowed: config.supported_content_types.clone(),
            cache: Arc::new(cache),
        };

        for builtin in BuiltinType::ALL {
            if let Err(e) = registry.register(builtin.name(), Arc::new(builtin)) {
                debug!(content_type = builtin.name(), error = %e, "built-in content type skipped");
            }
        }
        registry
    }

    /// Adds or replaces the renderer for `name`.
    pub fn register(&mut self, name: &str, renderer: Arc<dyn ContentRenderer>) -> Result<()> {
        if name.is_empty() {
            return Err(PuffError::config("Invalid content type name"));
        }
        if let Some(allowed) = &self.allowed {
            if !allowed.iter().any(|n| n == name) {
                return Err(PuffError::config(format!("Unsupported content type: {}", name)));
            }
        }

        self.renderers.insert(name.to_string(), renderer);
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.renderers.contains_key(name)
    }

    /// Registered type names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.renderers.keys().map(String::as_str).collect()
    }

    /// Renders `content` as `content_type`, falling back to `text`.
    pub fn render(&self, content_type: &str, content: &str, puff: &Puff, mode: ViewMode) -> String {
        match self
            .renderers
            .get(content_type)
            .or_else(|| self.renderers.get(BuiltinType::Text.name()))
        {
            Some(renderer) => renderer.render(content, puff, mode),
            None => BuiltinType::Text.render(content, puff, mode),
        }
    }

    /// Renders a puff's own content, through the cache.
    pub fn processed_content(&self, puff: &Puff, mode: ViewMode) -> String {
        if let Some(markup) = self.cache.get(puff.sig(), mode) {
            return markup;
        }

        let markup = self.render(&puff.payload().content_type, puff.content(), puff, mode);
        self.cache.insert(*puff.sig(), mode, markup.clone());
        markup
    }

    /// The render cache, for subscribing it to a wardrobe.
    pub fn cache(&self) -> Arc<RenderCache> {
        Arc::clone(&self.cache)
    }
}

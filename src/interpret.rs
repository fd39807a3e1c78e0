use std::collections::HashSet;

use crate::images::ImagePlacer;
use crate::images::inline::place_inline;
use crate::layout::{BLACK, BULLET_COLOR, DEFAULT_LINE_HEIGHT, LIST_LINE_HEIGHT, Pager, QUOTE_FONT_SIZE};
use crate::markup::{self, AttributeMap, Token};
use crate::model::Attachment;
use crate::sink::RenderSink;
use crate::style::{FontStyle, Style};

const PRE_FONT_SIZE: f32 = 7.0;
const CODE_FONT_SIZE: f32 = 8.0;
const BULLET: &str = "     » ";

fn has_class(attrs: &AttributeMap, class: &str) -> bool {
    attrs.get("class").is_some_and(|c| c.contains(class))
}

/// Walks one post body's tokens and turns each into pager calls.
pub struct Interpreter<'p, 'c, S: RenderSink> {
    pager: &'p mut Pager<S>,
    placer: &'p ImagePlacer<'c>,
    href: Option<String>,
    first_node: bool,
    list_depth: u32,
}

impl<'p, 'c, S: RenderSink> Interpreter<'p, 'c, S> {
    pub fn new(pager: &'p mut Pager<S>, placer: &'p ImagePlacer<'c>) -> Self {
        Self {
            pager,
            placer,
            href: None,
            first_node: true,
            list_depth: 0,
        }
    }

    pub fn run(&mut self, tokens: &[Token]) {
        for token in tokens {
            self.handle(token);
        }
    }

    pub fn handle(&mut self, token: &Token) {
        match token {
            Token::Text(text) => self.text(text),
            Token::Open { name, attrs } => {
                self.open_tag(name, attrs);
                self.first_node = false;
            }
            Token::Close(name) => self.close_tag(name),
        }
    }

    fn line_height(&self) -> f32 {
        self.pager.cursor.line_height
    }

    fn text(&mut self, text: &str) {
        match self.href.clone() {
            Some(url) => {
                let size = if self.pager.quote.is_open() {
                    QUOTE_FONT_SIZE
                } else {
                    self.pager.base_size()
                };
                self.pager.write_link(&url, text, size);
            }
            None => {
                let h = self.line_height();
                self.pager.write(h, text, None);
            }
        }
    }

    fn block_break(&mut self) {
        if !self.first_node {
            let h = self.line_height();
            self.pager.ln(h);
        }
    }

    fn open_tag(&mut self, name: &str, attrs: &AttributeMap) {
        match name {
            "b" | "strong" => self.pager.enable_style(Style::Bold),
            "i" | "em" => self.pager.enable_style(Style::Italic),
            "u" => self.pager.enable_style(Style::Underline),
            "pre" => {
                self.pager.style.clear(Style::Bold);
                self.pager.style.clear(Style::Italic);
                let mono = self.pager.mono_family().to_string();
                self.pager.set_font(&mono, PRE_FONT_SIZE);
                let h = self.line_height();
                self.pager.ln(h);
                self.pager.rule();
            }
            "blockquote" => self.pager.enter_blockquote(),
            "a" => self.href = attrs.get("href").filter(|h| !h.is_empty()).cloned(),
            "img" => place_inline(self.pager, self.placer, attrs),
            "ul" | "ol" => {
                self.list_depth += 1;
                self.pager.cursor.line_height = LIST_LINE_HEIGHT;
            }
            "li" => {
                let h = self.line_height();
                self.pager.set_text_color_transient(BULLET_COLOR);
                self.pager.write(h, BULLET, None);
                self.pager.restore_last_color();
            }
            "br" => {
                let h = self.line_height();
                self.pager.ln(h);
            }
            "p" => self.block_break(),
            "div" => {
                self.block_break();
                if has_class(attrs, "quoteheader") {
                    self.pager.enter_quote_header();
                } else if has_class(attrs, "codeheader") {
                    self.pager.rule();
                    let mono = self.pager.mono_family().to_string();
                    self.pager.set_font(&mono, CODE_FONT_SIZE);
                }
            }
            "hr" => {
                let h = self.line_height();
                self.pager.ln(h);
                self.pager.rule();
            }
            other => log::debug!("no rendering for <{other}>"),
        }
    }

    fn close_tag(&mut self, name: &str) {
        match name {
            "b" | "strong" => self.pager.disable_style(Style::Bold),
            "i" | "em" => self.pager.disable_style(Style::Italic),
            "u" => self.pager.disable_style(Style::Underline),
            "pre" => {
                let family = self.pager.base_family().to_string();
                let size = self.pager.base_size();
                self.pager.set_font(&family, size);
            }
            "blockquote" => self.pager.exit_quote(),
            "a" => self.href = None,
            "ul" | "ol" => {
                self.list_depth = self.list_depth.saturating_sub(1);
                if self.list_depth == 0 {
                    self.pager.cursor.line_height = DEFAULT_LINE_HEIGHT;
                }
            }
            _ => {}
        }
    }

    /// Closes whatever the markup left open so the next post starts clean.
    pub fn finish(self) {
        if self.pager.quote.is_open() {
            log::warn!("post body left {} quote level(s) open", self.pager.quote.depth);
            while self.pager.quote.is_open() {
                self.pager.exit_quote();
            }
        }
        if self.list_depth > 0 {
            self.pager.cursor.line_height = DEFAULT_LINE_HEIGHT;
        }
    }
}

/// Renders one post body at the cursor. Returns the ids of attachments that
/// were placed inline, which the attachment grid skips.
pub fn write_markup<S: RenderSink>(
    pager: &mut Pager<S>,
    placer: &ImagePlacer<'_>,
    html: &str,
    attachments: &[Attachment],
) -> HashSet<u32> {
    let mut used_inline = HashSet::new();
    let tokens = markup::resolve_inline_attachments(markup::parse(html), attachments, &mut used_inline);
    log::debug!("post body: {} tokens, {} inline attachments", tokens.len(), used_inline.len());

    pager.style = Default::default();
    let family = pager.base_family().to_string();
    let size = pager.base_size();
    pager.set_font_with_style(&family, FontStyle::REGULAR, size);
    pager.set_text_color(BLACK);

    let mut interpreter = Interpreter::new(pager, placer);
    interpreter.run(&tokens);
    interpreter.finish();
    used_inline
}

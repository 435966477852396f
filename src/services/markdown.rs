use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// A rendered block. Text is already Pango markup.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, markup: String },
    Paragraph(String),
    ListItem { depth: usize, markup: String },
    Code(String),
    Rule,
}

pub fn parse_markdown(input: &str) -> Vec<Block> {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let mut ctx = RenderContext::default();
    for event in Parser::new_ext(input, options) {
        ctx.handle_event(event);
    }
    ctx.finish()
}

/// Render Markdown into a single Pango markup string for a label.
pub fn to_pango_markup(input: &str) -> String {
    let blocks = parse_markdown(input);
    let mut markup = String::new();
    let mut previous: Option<&Block> = None;

    for block in &blocks {
        if let Some(prev) = previous {
            let tight = matches!(
                (prev, block),
                (Block::ListItem { .. }, Block::ListItem { .. })
            );
            markup.push_str(if tight { "\n" } else { "\n\n" });
        }
        match block {
            Block::Heading { level, markup: text } => {
                let size = match level {
                    1 => "xx-large",
                    2 => "x-large",
                    3 => "large",
                    _ => "medium",
                };
                markup.push_str(&format!(
                    "<span size=\"{}\" weight=\"bold\">{}</span>",
                    size, text
                ));
            }
            Block::Paragraph(text) => markup.push_str(text),
            Block::ListItem { depth, markup: text } => {
                markup.push_str(&"    ".repeat(depth.saturating_sub(1)));
                markup.push_str(if *depth > 1 { "◦  " } else { "•  " });
                markup.push_str(text);
            }
            Block::Code(code) => {
                markup.push_str("<tt>");
                markup.push_str(code);
                markup.push_str("</tt>");
            }
            Block::Rule => markup.push_str("──────────"),
        }
        previous = Some(block);
    }
    markup
}

#[derive(Default)]
struct RenderContext {
    blocks: Vec<Block>,
    current: String,
    heading: Option<u8>,
    list_depth: usize,
    code: Option<String>,
}

impl RenderContext {
    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.handle_start(tag),
            Event::End(tag) => self.handle_end(tag),
            Event::Text(text) => match &mut self.code {
                Some(code) => code.push_str(&text),
                None => self.current.push_str(&glib::markup_escape_text(&text)),
            },
            Event::Code(code) => {
                self.current.push_str("<tt>");
                self.current.push_str(&glib::markup_escape_text(&code));
                self.current.push_str("</tt>");
            }
            Event::SoftBreak => self.current.push(' '),
            Event::HardBreak => self.current.push('\n'),
            Event::Rule => {
                self.flush();
                self.blocks.push(Block::Rule);
            }
            _ => {}
        }
    }

    fn handle_start(&mut self, tag: Tag) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush();
                self.heading = Some(heading_level_to_u8(level));
            }
            Tag::Strong => self.current.push_str("<b>"),
            Tag::Emphasis => self.current.push_str("<i>"),
            Tag::Strikethrough => self.current.push_str("<s>"),
            Tag::Link { dest_url, .. } => {
                self.current.push_str("<a href=\"");
                self.current.push_str(&glib::markup_escape_text(&dest_url));
                self.current.push_str("\">");
            }
            Tag::CodeBlock(_) => {
                self.flush();
                self.code = Some(String::new());
            }
            Tag::List(_) => {
                // Text before a nested list belongs to the parent item.
                self.flush();
                self.list_depth += 1;
            }
            _ => {}
        }
    }

    fn handle_end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                if let Some(level) = self.heading.take() {
                    let markup = std::mem::take(&mut self.current).trim().to_string();
                    self.blocks.push(Block::Heading { level, markup });
                }
            }
            TagEnd::Strong => self.current.push_str("</b>"),
            TagEnd::Emphasis => self.current.push_str("</i>"),
            TagEnd::Strikethrough => self.current.push_str("</s>"),
            TagEnd::Link => self.current.push_str("</a>"),
            TagEnd::CodeBlock => {
                if let Some(code) = self.code.take() {
                    let code = code.trim_end_matches('\n');
                    self.blocks
                        .push(Block::Code(glib::markup_escape_text(code).to_string()));
                }
            }
            TagEnd::Paragraph | TagEnd::Item => self.flush(),
            TagEnd::List(_) => {
                self.flush();
                self.list_depth = self.list_depth.saturating_sub(1);
            }
            _ => {}
        }
    }

    fn flush(&mut self) {
        let text = std::mem::take(&mut self.current);
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let block = if self.list_depth > 0 {
            Block::ListItem {
                depth: self.list_depth,
                markup: text.to_string(),
            }
        } else {
            Block::Paragraph(text.to_string())
        };
        self.blocks.push(block);
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        self.blocks
    }
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_styles_escape() {
        let blocks = parse_markdown("**Dates:** 3/15 & *later* `AF007`");
        assert_eq!(
            blocks,
            vec![Block::Paragraph(
                "<b>Dates:</b> 3/15 &amp; <i>later</i> <tt>AF007</tt>".into()
            )]
        );
    }

    #[test]
    fn test_headings_and_lists() {
        let blocks = parse_markdown("# Trip Plan\n\n## Tasks\n\n- one\n  - nested\n- two\n");
        assert_eq!(
            blocks,
            vec![
                Block::Heading { level: 1, markup: "Trip Plan".into() },
                Block::Heading { level: 2, markup: "Tasks".into() },
                Block::ListItem { depth: 1, markup: "one".into() },
                Block::ListItem { depth: 2, markup: "nested".into() },
                Block::ListItem { depth: 1, markup: "two".into() },
            ]
        );
    }

    #[test]
    fn test_code_block_and_rule() {
        let blocks = parse_markdown("```\n<b>raw</b>\n```\n\n---\n\nafter");
        assert_eq!(blocks[0], Block::Code("&lt;b&gt;raw&lt;/b&gt;".into()));
        assert_eq!(blocks[1], Block::Rule);
        assert_eq!(blocks[2], Block::Paragraph("after".into()));
    }

    #[test]
    fn test_pango_output() {
        let markup = to_pango_markup("## Hotels\n\n- Rating: 4.5/5\n- Price: EUR 220/night");
        assert_eq!(
            markup,
            "<span size=\"x-large\" weight=\"bold\">Hotels</span>\n\n•  Rating: 4.5/5\n•  Price: EUR 220/night"
        );
    }

    #[test]
    fn test_links() {
        let markup = to_pango_markup("[map](https://example.com/?a=1&b=2)");
        assert_eq!(markup, "<a href=\"https://example.com/?a=1&amp;b=2\">map</a>");
    }
}

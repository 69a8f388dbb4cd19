//! RSS 2.0 feed maintenance for downloaded media
//!
//! Each feed is one XML file at `<content_dir>/<feed>.xml`; its media files
//! live in `<content_dir>/<feed>/`. Items are appended at the end of the
//! channel, existing content is copied through untouched.

use chrono::{DateTime, Local};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use super::HandlerError;

/// One downloaded file as it appears in the feed
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub description: String,
    pub webpage_url: String,
    /// Stored file name without extension
    pub file_stem: String,
    pub ext: String,
    pub file_size: Option<u64>,
    pub published: DateTime<Local>,
}

#[derive(Debug, Clone)]
pub struct Feed {
    content_dir: PathBuf,
    content_url: String,
    name: String,
    description: String,
}

impl Feed {
    pub fn new(
        content_dir: impl Into<PathBuf>,
        content_url: &str,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let content_url = if content_url.is_empty() || content_url.ends_with('/') {
            content_url.to_string()
        } else {
            format!("{}/", content_url)
        };

        Self {
            content_dir: content_dir.into(),
            content_url,
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.content_dir.join(format!("{}.xml", self.name))
    }

    pub fn media_dir(&self) -> PathBuf {
        self.content_dir.join(&self.name)
    }

    fn link(&self) -> String {
        format!("{}{}.xml", self.content_url, self.name)
    }

    fn media_url(&self, item: &FeedItem) -> String {
        format!("{}{}/{}.{}", self.content_url, self.name, item.file_stem, item.ext)
    }

    /// Append `item`, creating the feed first if it does not exist.
    ///
    /// Callers serialize writers of the same feed.
    pub async fn append(&self, item: &FeedItem) -> Result<(), HandlerError> {
        let path = self.path();
        fs::create_dir_all(&self.content_dir).await?;

        let existing = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                String::from_utf8(self.empty_document()?).map_err(feed_error)?
            }
            Err(e) => return Err(e.into()),
        };

        let updated = self.insert_item(&existing, item)?;
        write_atomically(&path, &updated).await?;

        info!(feed = %self.name, title = %item.title, "Feed item added");
        Ok(())
    }

    fn empty_document(&self) -> Result<Vec<u8>, HandlerError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);
        write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

        let mut rss = BytesStart::new("rss");
        rss.push_attribute(("version", "2.0"));
        write(&mut writer, Event::Start(rss))?;
        write(&mut writer, Event::Start(BytesStart::new("channel")))?;

        let link = self.link();
        for (tag, text) in [
            ("title", self.name.as_str()),
            ("link", link.as_str()),
            ("language", "ru"),
            ("copyright", "BSD"),
            ("description", self.description.as_str()),
            ("rating", "nonadult"),
        ] {
            text_element(&mut writer, tag, text)?;
        }

        write(&mut writer, Event::End(BytesEnd::new("channel")))?;
        write(&mut writer, Event::End(BytesEnd::new("rss")))?;
        Ok(writer.into_inner())
    }

    /// Copy `document`, writing the new item right before `</channel>`
    fn insert_item(&self, document: &str, item: &FeedItem) -> Result<Vec<u8>, HandlerError> {
        let mut reader = Reader::from_str(document);
        reader.config_mut().trim_text(true);
        let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);
        let mut inserted = false;

        loop {
            match reader.read_event().map_err(feed_error)? {
                Event::Eof => break,
                Event::End(end) if end.name().as_ref() == b"channel" => {
                    self.write_item(&mut writer, item)?;
                    inserted = true;
                    write(&mut writer, Event::End(end))?;
                }
                event => write(&mut writer, event)?,
            }
        }

        if !inserted {
            return Err(feed_error(format!("{} has no channel", self.path().display())));
        }
        Ok(writer.into_inner())
    }

    fn write_item(&self, writer: &mut Writer<Vec<u8>>, item: &FeedItem) -> Result<(), HandlerError> {
        write(writer, Event::Start(BytesStart::new("item")))?;

        let published = item.published.to_rfc2822();
        for (tag, text) in [
            ("title", item.title.as_str()),
            ("description", item.description.as_str()),
            ("link", item.webpage_url.as_str()),
            ("guid", item.webpage_url.as_str()),
            ("pubDate", published.as_str()),
        ] {
            text_element(writer, tag, text)?;
        }

        let url = self.media_url(item);
        let media_type = format!("audio/{}", item.ext);
        let length = item.file_size.map(|size| size.to_string());
        let mut enclosure = BytesStart::new("enclosure");
        enclosure.push_attribute(("url", url.as_str()));
        if let Some(length) = &length {
            enclosure.push_attribute(("length", length.as_str()));
        }
        enclosure.push_attribute(("type", media_type.as_str()));
        write(writer, Event::Empty(enclosure))?;

        write(writer, Event::End(BytesEnd::new("item")))
    }
}

fn text_element(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<(), HandlerError> {
    write(writer, Event::Start(BytesStart::new(tag)))?;
    write(writer, Event::Text(BytesText::new(text)))?;
    write(writer, Event::End(BytesEnd::new(tag)))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), HandlerError> {
    writer.write_event(event).map_err(feed_error)
}

fn feed_error(err: impl Display) -> HandlerError {
    HandlerError::Feed(err.to_string())
}

async fn write_atomically(path: &Path, content: &[u8]) -> Result<(), HandlerError> {
    let tmp = path.with_extension("xml.tmp");
    fs::write(&tmp, content).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

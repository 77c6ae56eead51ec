//! Stream tags and their translation to codec comments
//!
//! Tags arrive from two places: the application (tag setter) and the
//! stream itself (tag events). Both are [`TagList`]s keyed by generic tag
//! names. Before the comment header is written they are merged with a
//! [`MergeMode`] and every recognised tag is translated to the codec's
//! comment vocabulary. Tags without a comment key are dropped.

use crate::codec::CommentHeader;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use log::trace;
use std::collections::HashMap;
use std::fmt;

pub const TAG_TITLE: &str = "title";
pub const TAG_VERSION: &str = "version";
pub const TAG_ALBUM: &str = "album";
pub const TAG_ARTIST: &str = "artist";
pub const TAG_ALBUM_ARTIST: &str = "album-artist";
pub const TAG_PERFORMER: &str = "performer";
pub const TAG_COMPOSER: &str = "composer";
pub const TAG_TRACK_NUMBER: &str = "track-number";
pub const TAG_TRACK_COUNT: &str = "track-count";
pub const TAG_ALBUM_VOLUME_NUMBER: &str = "album-disc-number";
pub const TAG_ALBUM_VOLUME_COUNT: &str = "album-disc-count";
pub const TAG_COPYRIGHT: &str = "copyright";
pub const TAG_LICENSE: &str = "license";
pub const TAG_ORGANIZATION: &str = "organization";
pub const TAG_DESCRIPTION: &str = "description";
pub const TAG_GENRE: &str = "genre";
pub const TAG_DATE: &str = "date";
pub const TAG_CONTACT: &str = "contact";
pub const TAG_LOCATION: &str = "location";
pub const TAG_ISRC: &str = "isrc";
pub const TAG_COMMENT: &str = "comment";
pub const TAG_ENCODER: &str = "encoder";
pub const TAG_ENCODER_VERSION: &str = "encoder-version";
pub const TAG_LANGUAGE_CODE: &str = "language-code";

lazy_static! {
    /// Generic tag name to comment key
    static ref COMMENT_KEYS: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        map.insert(TAG_TITLE, "TITLE");
        map.insert(TAG_VERSION, "VERSION");
        map.insert(TAG_ALBUM, "ALBUM");
        map.insert(TAG_ARTIST, "ARTIST");
        map.insert(TAG_ALBUM_ARTIST, "ALBUMARTIST");
        map.insert(TAG_PERFORMER, "PERFORMER");
        map.insert(TAG_COMPOSER, "COMPOSER");
        map.insert(TAG_TRACK_NUMBER, "TRACKNUMBER");
        map.insert(TAG_TRACK_COUNT, "TRACKTOTAL");
        map.insert(TAG_ALBUM_VOLUME_NUMBER, "DISCNUMBER");
        map.insert(TAG_ALBUM_VOLUME_COUNT, "DISCTOTAL");
        map.insert(TAG_COPYRIGHT, "COPYRIGHT");
        map.insert(TAG_LICENSE, "LICENSE");
        map.insert(TAG_ORGANIZATION, "ORGANIZATION");
        map.insert(TAG_DESCRIPTION, "DESCRIPTION");
        map.insert(TAG_GENRE, "GENRE");
        map.insert(TAG_DATE, "DATE");
        map.insert(TAG_CONTACT, "CONTACT");
        map.insert(TAG_LOCATION, "LOCATION");
        map.insert(TAG_ISRC, "ISRC");
        map.insert(TAG_COMMENT, "COMMENT");
        map.insert(TAG_ENCODER, "ENCODER");
        map.insert(TAG_ENCODER_VERSION, "ENCODER_VERSION");
        map.insert(TAG_LANGUAGE_CODE, "LANGUAGE");
        map
    };
}

/// Comment key for a generic tag name, if the tag is recognised
pub fn comment_key(tag: &str) -> Option<&'static str> {
    COMMENT_KEYS.get(tag).copied()
}

/// A single tag value
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    String(String),
    UInt(u32),
    Date(NaiveDate),
    Double(f64),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::String(s) => write!(f, "{}", s),
            TagValue::UInt(n) => write!(f, "{}", n),
            TagValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            TagValue::Double(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::String(value.to_string())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::String(value)
    }
}

impl From<u32> for TagValue {
    fn from(value: u32) -> Self {
        TagValue::UInt(value)
    }
}

impl From<NaiveDate> for TagValue {
    fn from(value: NaiveDate) -> Self {
        TagValue::Date(value)
    }
}

/// How an incoming list combines with an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Drop everything existing, take the incoming list
    ReplaceAll,
    /// Incoming values replace existing values of the same tag
    Replace,
    /// Keep both, incoming values after existing ones
    Append,
    /// Keep both, incoming values before existing ones
    Prepend,
    /// Existing values win; incoming tags only fill gaps
    #[default]
    Keep,
    /// Ignore the incoming list
    KeepAll,
}

/// Ordered multi-valued tag list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagList {
    entries: Vec<(String, Vec<TagValue>)>,
}

impl TagList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct tags
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Append a value to `tag`
    pub fn add(&mut self, tag: &str, value: impl Into<TagValue>) {
        let value = value.into();
        match self.position(tag) {
            Some(i) => self.entries[i].1.push(value),
            None => self.entries.push((tag.to_string(), vec![value])),
        }
    }

    /// Values stored for `tag`
    pub fn get(&self, tag: &str) -> Option<&[TagValue]> {
        self.position(tag).map(|i| self.entries[i].1.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[TagValue])> {
        self.entries.iter().map(|(t, v)| (t.as_str(), v.as_slice()))
    }

    fn position(&self, tag: &str) -> Option<usize> {
        self.entries.iter().position(|(t, _)| t == tag)
    }

    /// Insert every tag of `from` into this list according to `mode`
    pub fn insert(&mut self, from: &TagList, mode: MergeMode) {
        if mode == MergeMode::ReplaceAll {
            self.entries.clear();
        }
        for (tag, values) in from.iter() {
            let existing = self.position(tag);
            match (mode, existing) {
                (MergeMode::KeepAll, _) | (MergeMode::Keep, Some(_)) => {}
                (_, None) => self.entries.push((tag.to_string(), values.to_vec())),
                (MergeMode::ReplaceAll | MergeMode::Replace, Some(i)) => {
                    self.entries[i].1 = values.to_vec();
                }
                (MergeMode::Append, Some(i)) => self.entries[i].1.extend_from_slice(values),
                (MergeMode::Prepend, Some(i)) => {
                    let mut merged = values.to_vec();
                    merged.append(&mut self.entries[i].1);
                    self.entries[i].1 = merged;
                }
            }
        }
    }

    /// Merge two optional lists into a new one
    ///
    /// `incoming` is merged into a copy of `base`; a missing side is treated
    /// as empty.
    pub fn merge(base: Option<&TagList>, incoming: Option<&TagList>, mode: MergeMode) -> TagList {
        let mut merged = base.cloned().unwrap_or_default();
        if let Some(incoming) = incoming {
            merged.insert(incoming, mode);
        }
        merged
    }
}

/// Build the codec comment structure from setter and stream tags
///
/// Returns an empty comment structure when neither list has tags.
pub fn build_comments(
    setter_tags: Option<&TagList>,
    stream_tags: Option<&TagList>,
    mode: MergeMode,
) -> CommentHeader {
    let mut comments = CommentHeader::new();
    let has_tags = |list: Option<&TagList>| list.map_or(false, |l| !l.is_empty());
    if !has_tags(setter_tags) && !has_tags(stream_tags) {
        return comments;
    }

    let merged = TagList::merge(setter_tags, stream_tags, mode);
    for (tag, values) in merged.iter() {
        let Some(key) = comment_key(tag) else {
            trace!("dropping tag {} without comment key", tag);
            continue;
        };
        for value in values {
            comments.add_tag(key, &value.to_string());
        }
    }
    comments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(entries: &[(&str, &str)]) -> TagList {
        let mut list = TagList::new();
        for (tag, value) in entries {
            list.add(tag, *value);
        }
        list
    }

    fn values(list: &TagList, tag: &str) -> Vec<String> {
        list.get(tag)
            .unwrap_or(&[])
            .iter()
            .map(|v| v.to_string())
            .collect()
    }

    #[test]
    fn test_value_rendering() {
        assert_eq!(TagValue::from(7u32).to_string(), "7");
        let date = NaiveDate::from_ymd_opt(2006, 3, 1).unwrap();
        assert_eq!(TagValue::from(date).to_string(), "2006-03-01");
        assert_eq!(TagValue::from("abc").to_string(), "abc");
    }

    #[test]
    fn test_merge_modes() {
        let user = list(&[(TAG_TITLE, "user"), (TAG_ARTIST, "me")]);
        let stream = list(&[(TAG_TITLE, "stream"), (TAG_ALBUM, "disc")]);

        let merged = TagList::merge(Some(&user), Some(&stream), MergeMode::Replace);
        assert_eq!(values(&merged, TAG_TITLE), vec!["stream"]);
        assert_eq!(values(&merged, TAG_ARTIST), vec!["me"]);
        assert_eq!(values(&merged, TAG_ALBUM), vec!["disc"]);

        let merged = TagList::merge(Some(&user), Some(&stream), MergeMode::Append);
        assert_eq!(values(&merged, TAG_TITLE), vec!["user", "stream"]);

        let merged = TagList::merge(Some(&user), Some(&stream), MergeMode::Prepend);
        assert_eq!(values(&merged, TAG_TITLE), vec!["stream", "user"]);

        let merged = TagList::merge(Some(&user), Some(&stream), MergeMode::Keep);
        assert_eq!(values(&merged, TAG_TITLE), vec!["user"]);
        assert_eq!(values(&merged, TAG_ALBUM), vec!["disc"]);

        let merged = TagList::merge(Some(&user), Some(&stream), MergeMode::KeepAll);
        assert_eq!(merged, user);

        let merged = TagList::merge(Some(&user), Some(&stream), MergeMode::ReplaceAll);
        assert_eq!(merged, stream);

        let merged = TagList::merge(None, Some(&stream), MergeMode::Keep);
        assert_eq!(merged, stream);
    }

    #[test]
    fn test_build_comments_translates_and_drops() {
        let mut user = TagList::new();
        user.add(TAG_TITLE, "Sine");
        user.add(TAG_TRACK_NUMBER, 3u32);
        user.add(TAG_DATE, NaiveDate::from_ymd_opt(1999, 12, 31).unwrap());
        user.add("beats-per-minute", TagValue::Double(120.0));

        let mut stream = TagList::new();
        stream.add(TAG_ARTIST, "A");
        stream.add(TAG_ARTIST, "B");

        let comments = build_comments(Some(&user), Some(&stream), MergeMode::Keep);
        assert_eq!(
            comments.entries(),
            &[
                ("TITLE".to_string(), "Sine".to_string()),
                ("TRACKNUMBER".to_string(), "3".to_string()),
                ("DATE".to_string(), "1999-12-31".to_string()),
                ("ARTIST".to_string(), "A".to_string()),
                ("ARTIST".to_string(), "B".to_string()),
            ]
        );
    }

    #[test]
    fn test_build_comments_empty() {
        let comments = build_comments(None, Some(&TagList::new()), MergeMode::Append);
        assert!(comments.is_empty());
    }
}

//! Virtual sub-items of continuous-time items.
//!
//! A movie or an audio book is browsed as a container whose children are
//! synthesized here: "Play"/"Resume", a "Chapters" menu and a "Seek" menu.
//! None of them exists in any source; they are recomputed from the item on
//! every request.
//!
//! On the wire a sub-item is a path segment `tag[args]#label` appended to
//! the item path with `///`:
//!
//! ```text
//! /Movies/Inception///p&position=60000#Resume (0:01:00/2:30:00)
//! /Movies/Inception///s#Seek///p&position=120000#Play from 0:02:00
//! /Movies/Inception///c#Chapters///p&chapter=2#The heist
//! ```
//!
//! Segments are parsed once into [`SubItem`] values; the rest of the crate
//! never looks at the string form.

use std::time::Duration;

use cdssource::Item;

use crate::paths::{SUB_ITEM_SEPARATOR, separators};

const MIN_REMAINING: Duration = Duration::from_secs(60);

/// What a sub-item segment designates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubItem {
    /// A playable entry, optionally starting at a position or a chapter.
    Play {
        position: Option<Duration>,
        chapter: Option<u32>,
    },
    /// Menu with one entry per seek interval.
    SeekMenu,
    /// Menu with one entry per chapter.
    ChapterMenu,
}

/// One synthesized child: what it does and how it is titled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub sub_item: SubItem,
    pub label: String,
}

impl Entry {
    fn play(position: Option<Duration>, chapter: Option<u32>, label: String) -> Self {
        Self {
            sub_item: SubItem::Play { position, chapter },
            label,
        }
    }

    pub fn is_play(&self) -> bool {
        matches!(self.sub_item, SubItem::Play { .. })
    }

    /// Wire form of the segment.
    pub fn encode(&self) -> String {
        let head = match &self.sub_item {
            SubItem::Play { position, chapter } => {
                let mut head = String::from("p");
                if let Some(position) = position {
                    head.push_str(&format!("&position={}", position.as_millis()));
                }
                if let Some(chapter) = chapter {
                    head.push_str(&format!("&chapter={chapter}"));
                }
                head
            }
            SubItem::SeekMenu => "s".to_string(),
            SubItem::ChapterMenu => "c".to_string(),
        };
        format!("{head}#{}", self.label)
    }

    /// Parses one segment; `None` for unknown tags or malformed arguments.
    pub fn parse(segment: &str) -> Option<Self> {
        let (head, label) = segment.split_once('#')?;
        let mut chars = head.chars();
        let tag = chars.next()?;
        let args = chars.as_str();

        let sub_item = match tag {
            'p' => {
                let mut position = None;
                let mut chapter = None;
                for pair in args.split('&').filter(|p| !p.is_empty()) {
                    let (key, value) = pair.split_once('=')?;
                    match key {
                        "position" => position = Some(Duration::from_millis(value.parse().ok()?)),
                        "chapter" => chapter = Some(value.parse().ok()?),
                        _ => {}
                    }
                }
                SubItem::Play { position, chapter }
            }
            's' if args.is_empty() => SubItem::SeekMenu,
            'c' if args.is_empty() => SubItem::ChapterMenu,
            _ => return None,
        };

        Some(Self {
            sub_item,
            label: label.to_string(),
        })
    }
}

/// A leaf path split into its item path and sub-item segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemAddress {
    /// Path of the item in its source.
    pub base: String,
    pub entries: Vec<Entry>,
}

impl ItemAddress {
    /// Parses a leaf path. Only the last segment may be a playable entry;
    /// anything else is rejected.
    pub fn parse(path: &str) -> Option<Self> {
        let seps = separators(path);
        let Some(&first) = seps.first() else {
            return Some(Self {
                base: path.to_string(),
                entries: Vec::new(),
            });
        };
        if first == 0 {
            return None;
        }

        let base = &path[..first];
        if base.ends_with('/') {
            return None;
        }

        let mut entries = Vec::with_capacity(seps.len());
        for (i, &start) in seps.iter().enumerate() {
            let from = start + SUB_ITEM_SEPARATOR.len();
            let to = seps.get(i + 1).copied().unwrap_or(path.len());
            entries.push(Entry::parse(&path[from..to])?);
        }

        let (_, menus) = entries.split_last()?;
        if menus.iter().any(Entry::is_play) {
            return None;
        }

        Some(Self {
            base: base.to_string(),
            entries,
        })
    }

    /// The segment this address designates, `None` for the item itself.
    pub fn selected(&self) -> Option<&Entry> {
        self.entries.last()
    }

    pub fn to_path(&self) -> String {
        let mut path = self.base.clone();
        for entry in &self.entries {
            path.push_str(SUB_ITEM_SEPARATOR);
            path.push_str(&entry.encode());
        }
        path
    }

    /// Path of the child `entry` of this address.
    pub fn child_path(&self, entry: &Entry) -> String {
        format!("{}{}{}", self.to_path(), SUB_ITEM_SEPARATOR, entry.encode())
    }
}

/// Point after which an item counts as watched:
/// `duration - max(duration / 10, 60s)`.
///
/// `None` when that point is before the start (items shorter than a
/// minute): such items always count as watched and never offer "Resume".
pub fn completion_threshold(duration: Duration) -> Option<Duration> {
    duration.checked_sub((duration / 10).max(MIN_REMAINING))
}

/// True once `last_position` is past the completion threshold.
pub fn is_completed(item: &Item) -> bool {
    match completion_threshold(item.duration) {
        Some(threshold) => item.last_position > threshold,
        None => true,
    }
}

/// `*` for watched items, `+` for partially watched ones.
pub fn watched_marker(item: &Item) -> Option<char> {
    if item.duration.is_zero() {
        None
    } else if is_completed(item) {
        Some('*')
    } else if !item.last_position.is_zero() {
        Some('+')
    } else {
        None
    }
}

/// Title prefixed with its watched marker.
pub fn marked_title(item: &Item) -> String {
    match watched_marker(item) {
        Some(marker) => format!("{marker}{}", item.title),
        None => item.title.clone(),
    }
}

/// `h:mm:ss`, hours unpadded.
pub fn format_time(duration: Duration) -> String {
    let seconds = duration.as_secs();
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Labels come from sources; slashes would clash with the separator.
fn sanitize_label(label: &str) -> String {
    label.replace('/', "-")
}

/// Computes the synthesized children of items.
#[derive(Debug, Clone)]
pub struct Expander {
    seek_interval: Duration,
}

impl Expander {
    pub fn new(seek_interval: Duration) -> Self {
        let seek_interval = if seek_interval.is_zero() {
            Duration::from_secs(120)
        } else {
            seek_interval
        };
        Self { seek_interval }
    }

    pub fn seek_interval(&self) -> Duration {
        self.seek_interval
    }

    /// Children of `item` itself (`selected == None`) or of one of its menus.
    /// Playable entries have no children.
    pub fn children(&self, item: &Item, selected: Option<&SubItem>) -> Vec<Entry> {
        match selected {
            None => self.play_seek_entries(item),
            Some(SubItem::SeekMenu) => self.seek_entries(item),
            Some(SubItem::ChapterMenu) => self.chapter_entries(item),
            Some(SubItem::Play { .. }) => Vec::new(),
        }
    }

    fn play_seek_entries(&self, item: &Item) -> Vec<Entry> {
        let mut entries = Vec::with_capacity(3);

        let resumable = !item.last_position.is_zero()
            && completion_threshold(item.duration).is_some_and(|t| item.last_position <= t);

        if resumable {
            entries.push(Entry::play(
                Some(item.last_position),
                None,
                format!(
                    "Resume ({}/{})",
                    format_time(item.last_position),
                    format_time(item.duration)
                ),
            ));
        } else {
            entries.push(Entry::play(
                None,
                None,
                format!("Play ({})", format_time(item.duration)),
            ));
        }

        if item.chapters.len() > 1 {
            entries.push(Entry {
                sub_item: SubItem::ChapterMenu,
                label: "Chapters".to_string(),
            });
        }

        if item.duration > self.seek_interval {
            entries.push(Entry {
                sub_item: SubItem::SeekMenu,
                label: "Seek".to_string(),
            });
        }

        entries
    }

    /// One entry per interval; the interval holding `last_position` is
    /// marked with `*`.
    fn seek_entries(&self, item: &Item) -> Vec<Entry> {
        let mut entries = Vec::new();
        let mut start = Duration::ZERO;
        while start < item.duration {
            let end = start + self.seek_interval;
            let title = format!("Play from {}", format_time(start));
            let current = !item.last_position.is_zero()
                && item.last_position >= start
                && item.last_position < end;
            let label = if current { format!("*{title}") } else { title };

            entries.push(Entry::play(Some(start), None, label));
            start = end;
        }
        entries
    }

    fn chapter_entries(&self, item: &Item) -> Vec<Entry> {
        item.chapters
            .iter()
            .enumerate()
            .map(|(i, chapter)| {
                let number = i as u32 + 1;
                let label = if chapter.title.is_empty() {
                    format!("Chapter {number}")
                } else {
                    sanitize_label(&chapter.title)
                };
                Entry::play(None, Some(number), label)
            })
            .collect()
    }

    /// The item to hand to the source when `entry` is played: titled after
    /// the entry and starting at its position or chapter.
    pub fn play_item(item: &Item, entry: Option<&Entry>) -> Item {
        let mut play = item.clone();
        let Some(entry) = entry else {
            return play;
        };

        if !entry.label.is_empty() {
            play.title = entry.label.clone();
        }
        if let SubItem::Play { position, chapter } = &entry.sub_item {
            if let Some(position) = position {
                play.position = *position;
            }
            if let Some(chapter) = chapter {
                play.chapter = *chapter;
            }
        }
        play
    }
}

impl Default for Expander {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

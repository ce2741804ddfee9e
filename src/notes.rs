use rand::Rng;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};

use crate::logger;

/// The 16 background tags a note can carry. Creation and recolor draw
/// uniformly from this list; the draw may repeat the current tag.
pub const PALETTE: [&str; 16] = [
    "red", "green", "yellow", "purple", "pink", "orange", "amber", "sky", "indigo", "fuchsia",
    "emerald", "lime", "teal", "cyan", "rose", "violet",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub description: String,
    // Wire name kept camelCase so existing exports stay readable.
    #[serde(rename = "backgroundColor")]
    pub background_color: String,
}

/// Terminal rendition of a palette tag. Tags not in the palette (hand-edited
/// storage) fall back to gray rather than failing.
pub fn tint(tag: &str) -> Color {
    match tag {
        "red" => Color::Rgb(254, 202, 202),
        "green" => Color::Rgb(187, 247, 208),
        "yellow" => Color::Rgb(254, 240, 138),
        "purple" => Color::Rgb(233, 213, 255),
        "pink" => Color::Rgb(251, 207, 232),
        "orange" => Color::Rgb(254, 215, 170),
        "amber" => Color::Rgb(253, 230, 138),
        "sky" => Color::Rgb(186, 230, 253),
        "indigo" => Color::Rgb(199, 210, 254),
        "fuchsia" => Color::Rgb(245, 208, 254),
        "emerald" => Color::Rgb(167, 243, 208),
        "lime" => Color::Rgb(217, 249, 157),
        "teal" => Color::Rgb(153, 246, 228),
        "cyan" => Color::Rgb(165, 243, 252),
        "rose" => Color::Rgb(254, 205, 211),
        "violet" => Color::Rgb(221, 214, 254),
        _ => Color::Rgb(209, 213, 219),
    }
}

fn random_tag() -> String {
    let i = rand::rng().random_range(0..PALETTE.len());
    PALETTE[i].to_string()
}

/// In-memory note collection. Insertion-ordered: create appends, edit and
/// recolor mutate in place, delete removes. Ids come from a counter seeded
/// past the largest stored id, so they stay unique across restarts.
#[derive(Debug, Default)]
pub struct NoteBook {
    notes: Vec<Note>,
    next_id: i64,
}

impl NoteBook {
    /// Builds a book from the raw stored value. `None` (never written) and
    /// malformed JSON both yield an empty book; a parse failure is logged
    /// but never propagated.
    pub fn from_stored(raw: Option<&str>) -> Self {
        let notes: Vec<Note> = match raw {
            Some(text) => match serde_json::from_str(text) {
                Ok(notes) => notes,
                Err(e) => {
                    logger::log(&format!(
                        "Stored notes failed to parse, starting empty: {}",
                        e
                    ));
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        let next_id = notes.iter().map(|n| n.id).max().unwrap_or(0) + 1;
        Self { notes, next_id }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(&self.notes)?)
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Appends a new note with a fresh id and a random palette tag. Returns
    /// `None` without touching the book if either field trims to empty.
    pub fn create(&mut self, title: &str, description: &str) -> Option<i64> {
        if title.trim().is_empty() || description.trim().is_empty() {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.notes.push(Note {
            id,
            title: title.to_string(),
            description: description.to_string(),
            background_color: random_tag(),
        });
        Some(id)
    }

    /// Replaces title and description on the matching note, keeping id and
    /// color. Returns false (no-op) for empty-after-trim fields or an
    /// unknown id.
    pub fn update(&mut self, id: i64, title: &str, description: &str) -> bool {
        if title.trim().is_empty() || description.trim().is_empty() {
            return false;
        }
        match self.notes.iter_mut().find(|n| n.id == id) {
            Some(note) => {
                note.title = title.to_string();
                note.description = description.to_string();
                true
            }
            None => false,
        }
    }

    /// Removes the matching note. Returns false if no note carries `id`.
    pub fn delete(&mut self, id: i64) -> bool {
        let before = self.notes.len();
        self.notes.retain(|n| n.id != id);
        self.notes.len() != before
    }

    /// Draws a fresh random tag for the matching note. The draw is
    /// inclusive: the same tag can come up again.
    pub fn recolor(&mut self, id: i64) -> bool {
        match self.notes.iter_mut().find(|n| n.id == id) {
            Some(note) => {
                note.background_color = random_tag();
                true
            }
            None => false,
        }
    }

    /// Case-insensitive substring filter on titles. An empty query matches
    /// everything. Order follows the book.
    pub fn filtered(&self, query: &str) -> Vec<&Note> {
        let query = query.to_lowercase();
        self.notes
            .iter()
            .filter(|n| n.title.to_lowercase().contains(&query))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book_with(entries: &[(&str, &str)]) -> NoteBook {
        let mut book = NoteBook::default();
        book.next_id = 1;
        for (title, description) in entries {
            book.create(title, description).expect("valid note");
        }
        book
    }

    #[test]
    fn create_appends_one_note_with_palette_color() {
        let mut book = book_with(&[]);
        let id = book.create("Groceries", "Milk, eggs").unwrap();
        assert_eq!(book.len(), 1);
        let note = &book.notes()[0];
        assert_eq!(note.id, id);
        assert_eq!(note.title, "Groceries");
        assert_eq!(note.description, "Milk, eggs");
        assert!(PALETTE.contains(&note.background_color.as_str()));
    }

    #[test]
    fn create_rejects_blank_fields() {
        let mut book = book_with(&[]);
        assert!(book.create("", "x").is_none());
        assert!(book.create("x", "").is_none());
        assert!(book.create("   ", "x").is_none());
        assert!(book.create("x", "\t\n").is_none());
        assert!(book.is_empty());
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let mut book = book_with(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let ids: Vec<i64> = book.notes().iter().map(|n| n.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));

        // Reload reseeds the counter past the largest stored id.
        let json = book.to_json().unwrap();
        let mut reloaded = NoteBook::from_stored(Some(&json));
        let new_id = reloaded.create("d", "4").unwrap();
        assert!(new_id > *ids.last().unwrap());
    }

    #[test]
    fn update_preserves_id_and_color() {
        let mut book = book_with(&[("old title", "old body")]);
        let original = book.notes()[0].clone();

        assert!(book.update(original.id, "new title", "new body"));
        let updated = &book.notes()[0];
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.background_color, original.background_color);
        assert_eq!(updated.title, "new title");
        assert_eq!(updated.description, "new body");
    }

    #[test]
    fn update_is_noop_on_blank_fields_or_unknown_id() {
        let mut book = book_with(&[("keep", "me")]);
        let snapshot: Vec<Note> = book.notes().to_vec();

        assert!(!book.update(book.notes()[0].id, " ", "body"));
        assert!(!book.update(book.notes()[0].id, "title", ""));
        assert!(!book.update(9999, "title", "body"));
        assert_eq!(book.notes(), snapshot.as_slice());
    }

    #[test]
    fn delete_removes_only_the_matching_note() {
        let mut book = book_with(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let middle = book.notes()[1].id;

        assert!(book.delete(middle));
        assert_eq!(book.len(), 2);
        assert_eq!(book.notes()[0].title, "a");
        assert_eq!(book.notes()[1].title, "c");

        assert!(!book.delete(middle));
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn search_is_case_insensitive_and_title_only() {
        let book = book_with(&[
            ("Groceries", "Milk, eggs"),
            ("Workout plan", "groceries are not in here"),
        ]);

        let all = book.filtered("");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "Groceries");

        assert_eq!(book.filtered("GRO").len(), 1);
        assert_eq!(book.filtered("gro").len(), 1);
        // Description text never matches.
        assert_eq!(book.filtered("milk").len(), 0);
        assert_eq!(book.filtered("grov").len(), 0);
    }

    #[test]
    fn json_round_trip_preserves_everything() {
        let book = book_with(&[("first", "one"), ("second", "two\nlines")]);
        let json = book.to_json().unwrap();
        let reloaded = NoteBook::from_stored(Some(&json));
        assert_eq!(reloaded.notes(), book.notes());
    }

    #[test]
    fn wire_format_uses_camel_case_color_field() {
        let mut book = book_with(&[("t", "d")]);
        book.notes[0].background_color = "teal".to_string();
        let value: serde_json::Value = serde_json::from_str(&book.to_json().unwrap()).unwrap();
        assert_eq!(value[0]["backgroundColor"], "teal");
        assert!(value[0].get("background_color").is_none());
    }

    #[test]
    fn malformed_or_absent_storage_loads_empty() {
        assert!(NoteBook::from_stored(None).is_empty());
        assert!(NoteBook::from_stored(Some("not json at all")).is_empty());
        assert!(NoteBook::from_stored(Some("{\"wrong\": \"shape\"}")).is_empty());
    }

    #[test]
    fn recolor_keeps_everything_but_the_tag() {
        let mut book = book_with(&[("t", "d")]);
        let before = book.notes()[0].clone();

        assert!(book.recolor(before.id));
        let after = &book.notes()[0];
        assert_eq!(after.id, before.id);
        assert_eq!(after.title, before.title);
        assert_eq!(after.description, before.description);
        assert!(PALETTE.contains(&after.background_color.as_str()));

        assert!(!book.recolor(9999));
    }

    // The full walk-through from the behavior checklist.
    #[test]
    fn groceries_scenario() {
        let mut book = NoteBook::from_stored(None);
        assert!(book.is_empty());

        let id = book.create("Groceries", "Milk, eggs").unwrap();
        assert_eq!(book.len(), 1);
        assert_eq!(book.notes()[0].title, "Groceries");

        assert!(book.create("", "x").is_none());
        assert_eq!(book.len(), 1);

        let before = book.notes()[0].clone();
        assert!(book.recolor(id));
        let after = book.notes()[0].clone();
        assert_eq!(after.id, before.id);
        assert_eq!(after.title, before.title);
        assert_eq!(after.description, before.description);

        assert!(book.filtered("grov").is_empty());
        assert_eq!(book.filtered("GRO").len(), 1);

        // Declined confirmation never reaches delete().
        assert_eq!(book.len(), 1);

        assert!(book.delete(id));
        assert!(book.is_empty());
    }
}
